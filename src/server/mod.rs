//! HTTP/WebSocket control panel (`server` feature).
//!
//! Register → login → upload → start → watch the console → stop. The panel
//! never touches process state directly; everything goes through the
//! [`Supervisor`](crate::Supervisor) façade.

mod api;
mod auth;
mod ws;

pub use api::{router, AppState};
pub use auth::{AuthError, AuthService};
