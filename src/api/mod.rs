//! HTTP API for the archive server

pub mod auth;
pub mod handlers;
pub mod response;
pub mod server;

pub use response::{ApiResponse, ErrorResponse, JsonRequest, PathParam, QueryParams};
pub use server::{create_app, shutdown_signal, start_api_server};
