pub mod api;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod registry;
pub mod runner;
pub mod webhook;

use std::sync::Arc;

use dispatch::Dispatcher;

pub struct AppState {
    pub dispatcher: Dispatcher,
}

pub type SharedState = Arc<AppState>;
