//! HTTP/REST API adapter.
//!
//! Inbound adapter implementing REST endpoints that delegate to the product service.

mod controller;
mod request;
mod response;

pub use controller::{AppState, REQUEST_TIMEOUT_HEADER, create_router};
pub use request::*;
pub use response::*;
