//! Error types for the cart engine.
//!
//! Only checkout failures are ever handed back to the presentation layer.
//! Everything else (mirror failures, sync failures) is logged and published
//! as a [`CartEvent`](crate::events::CartEvent) instead.

/// Errors surfaced by cart operations.
#[derive(Debug, thiserror::Error)]
pub enum CartError {
    #[error("Invalid product ID format: {0:?}")]
    InvalidProductId(String),

    #[error(transparent)]
    Backend(#[from] BackendError),

    #[error("Backend is disabled")]
    BackendDisabled,

    #[error("Cart is empty")]
    EmptyCart,

    #[error("Checkout is already in progress")]
    CheckoutInProgress,

    #[error("{}", checkout_message(.0))]
    Checkout(#[source] BackendError),

    #[error("Cart worker is not running")]
    WorkerGone,

    #[error("Persistence error: {0}")]
    Persistence(String),
}

/// Errors produced while talking to the commerce backend.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Invalid response from server: {0}")]
    MalformedResponse(String),

    #[error("No checkout URL returned")]
    MissingCheckoutUrl,

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// The message shown to a shopper whose checkout request failed.
fn checkout_message(err: &BackendError) -> String {
    match err {
        BackendError::Status { status, body } if body.is_empty() => {
            format!("Checkout failed: {status} Unknown error")
        }
        BackendError::Status { status, body } => format!("Checkout failed: {status} {body}"),
        other => other.to_string(),
    }
}

impl BackendError {
    /// Short label used in logs and events.
    pub fn kind(&self) -> &'static str {
        match self {
            BackendError::Network(_) => "network",
            BackendError::Status { .. } => "status",
            BackendError::MalformedResponse(_) => "malformed",
            BackendError::MissingCheckoutUrl => "missing-checkout-url",
            BackendError::InvalidUrl(_) => "invalid-url",
        }
    }
}
