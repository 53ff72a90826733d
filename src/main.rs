use merge_hook::AppState;
use merge_hook::api;
use merge_hook::config::Settings;
use merge_hook::dispatch::Dispatcher;
use merge_hook::logging::{ErrorLogFile, setup_logging};
use merge_hook::registry::ScriptRegistry;
use merge_hook::runner::{GlobalLock, ShellRunner};
use std::sync::Arc;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();

    let settings = Settings::from_env();

    // Logging is a prerequisite: no error log, no server
    let (error_writer, _log_guard) = match ErrorLogFile::new(&settings.log_dir).open() {
        Ok(opened) => opened,
        Err(e) => {
            eprintln!("Logging error: {}", e);
            std::process::exit(1);
        }
    };
    setup_logging(settings.log_channels, error_writer);

    let registry = ScriptRegistry::load_or_empty(&settings.config_path);
    let dispatcher = Dispatcher::new(
        registry,
        Arc::new(GlobalLock::new()),
        Arc::new(ShellRunner::new(&settings.shell)),
    );
    let state = Arc::new(AppState { dispatcher });

    let app = api::router(Arc::clone(&state));

    info!("Start server listening at {}", settings.bind_address);
    info!("Using config at {:?}", settings.config_path);
    let listener = match tokio::net::TcpListener::bind(&settings.bind_address).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Start server failed: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", e);
    }

    // Scripts are never killed; they outlive the listener
    let in_flight = state.dispatcher.in_flight();
    if in_flight > 0 {
        warn!("Shutting down with {} script run(s) still in flight", in_flight);
    }
    info!("Server stopped");
}

/// Resolves on SIGINT, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to install Ctrl-C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Received SIGINT, shutting down"),
        () = terminate => info!("Received SIGTERM, shutting down"),
    }
}
