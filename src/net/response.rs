//! Minimal HTTP response model.
//!
//! This struct represents a **fully buffered** HTTP response returned by the
//! network layer: final URL, status code + reason, headers and the raw body.
//! The backend client turns it into typed values with [`Response::json`].
use crate::errors::BackendError;
use http::HeaderMap;
use serde::de::DeserializeOwned;

#[derive(Debug)]
pub struct Response {
    /// Final URL of the response (after redirects, if any).
    pub url: url::Url,

    /// Numeric HTTP status code (e.g., `200`, `404`).
    pub status: u16,

    /// Reason phrase, `"Unknown"` for non-standard codes.
    pub status_text: String,

    pub headers: HeaderMap,

    pub body: Vec<u8>,
}

impl Response {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Fails with [`BackendError::Status`] unless the status is 2xx.
    pub fn error_for_status(self) -> Result<Self, BackendError> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(BackendError::Status {
                status: self.status,
                body: self.text(),
            })
        }
    }

    /// Decodes the body as JSON. An empty body decodes as JSON `null`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, BackendError> {
        let body: &[u8] = if self.body.iter().all(u8::is_ascii_whitespace) {
            b"null"
        } else {
            &self.body
        };
        serde_json::from_slice(body).map_err(|e| BackendError::MalformedResponse(e.to_string()))
    }
}
