//! HTTP surface: a single handler behind every path and method

pub mod hook;

use axum::Router;

use crate::SharedState;

pub use hook::{HookResponse, handle_hook};

pub fn router(state: SharedState) -> Router {
    Router::new().fallback(handle_hook).with_state(state)
}
