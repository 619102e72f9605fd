//! HTTP plumbing shared by the backend client.

mod fetch;
mod response;

pub use fetch::{fetch, FetchOptions};
pub use response::Response;
