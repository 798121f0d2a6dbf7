//! HTTP facade
//!
//! JSON routes over a [`FeedService`](crate::service::FeedService). The
//! caller identity arrives in the `x-caller-id` header.

pub mod error;
pub mod extractors;
pub mod routes;
pub mod server;

pub use error::ApiError;
pub use extractors::{Caller, CALLER_HEADER};
pub use server::{build_router, serve, ServerError};
