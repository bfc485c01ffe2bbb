pub mod app;
pub mod bridge;
pub mod capture;
pub mod clipboard;
pub mod config;
pub mod delivery;
pub mod display;
pub mod error;
pub mod generation;
pub mod geometry;
pub mod logging;
pub mod notification;
pub mod pipeline;
pub mod state;
pub use error::{AppError, AppResult};

/// Entrypoint used by the binary and by desktop integrations.
pub fn run() -> AppResult<()> {
    logging::init();
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting SnipTex");

    let app = app::App::new(app::StartupConfig::from_args());
    app.start()
}
