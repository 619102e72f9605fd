use crate::cookies::CookieJarHandle;
use crate::net::Response;
use http::header::{CONTENT_TYPE, COOKIE};
use http::HeaderValue;
use reqwest::Method;
use std::time::Duration;
use url::Url;

/// Per-request options for [`fetch`].
#[derive(Debug, Default)]
pub struct FetchOptions<'a> {
    /// Jar to read request cookies from and store `Set-Cookie` into.
    pub jar: Option<&'a CookieJarHandle>,
    /// Sent as `X-CSRFToken`.
    pub csrf_token: Option<String>,
    pub timeout: Option<Duration>,
    /// JSON request body.
    pub json: Option<serde_json::Value>,
}

// Sends a request the way the storefront's API expects it and buffers the response
pub async fn fetch(
    client: &reqwest::Client,
    method: Method,
    url: Url,
    opts: FetchOptions<'_>,
) -> Result<Response, reqwest::Error> {
    let mut req = client
        .request(method.clone(), url.clone())
        .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
        .header("X-Requested-With", HeaderValue::from_static("XMLHttpRequest"));

    let cookie_header = opts.jar.and_then(|jar| jar.read().get_request_cookies(&url));
    if let Some(cookies) = cookie_header {
        req = req.header(COOKIE, cookies);
    }
    if let Some(token) = opts.csrf_token {
        req = req.header("X-CSRFToken", token);
    }
    if let Some(timeout) = opts.timeout {
        req = req.timeout(timeout);
    }
    if let Some(body) = &opts.json {
        req = req.json(body);
    }

    log::debug!("[net] {method} {url}");
    let res = req.send().await?;

    let final_url = res.url().clone();
    let status = res.status().as_u16();
    let status_text = res.status().canonical_reason().unwrap_or("Unknown").to_string();
    let headers = res.headers().clone();

    if let Some(jar) = opts.jar {
        jar.write().store_response_cookies(&final_url, &headers);
    }

    // Fetch body. We don't do streaming
    let body = res.bytes().await?.to_vec();
    log::debug!("[net] {method} {final_url} -> {status}");

    Ok(Response {
        url: final_url,
        status,
        status_text,
        headers,
        body,
    })
}
