use crate::bridge::BridgeError;
use thiserror::Error;

pub type AppResult<T> = std::result::Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Bridge(#[from] BridgeError),
    #[error("failed to register application: {0}")]
    Register(#[from] gtk4::glib::Error),
}
