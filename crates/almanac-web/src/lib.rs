//! HTTP API and event orchestration for Almanac.
//!
//! [`EventService`] owns the create/update/delete consistency contract
//! between event rows and their reminder jobs. The router wraps it with the
//! thin collaborator surfaces: registration/login, bearer-token auth, and
//! the holiday passthrough proxy.

mod auth;
mod error;
mod routes;
mod service;

pub use error::ApiError;
pub use routes::{AppState, create_router};
pub use service::{EventError, EventService};
