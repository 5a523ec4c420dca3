//! Browser infrastructure for launching and managing the Chrome session

mod wrapper;

pub use wrapper::{BrowserWrapper, SearchSession};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BrowserError {
    #[error("Failed to find browser executable: {0}")]
    NotFound(String),

    #[error("Failed to launch browser: {0}")]
    LaunchFailed(String),

    #[error("Failed to create page: {0}")]
    PageCreationFailed(String),

    #[error("Failed to apply device emulation: {0}")]
    EmulationFailed(String),

    #[error("Navigation failed: {0}")]
    NavigationFailed(String),

    #[error("Browser session lost: {0}")]
    SessionLost(String),
}

pub type BrowserResult<T> = Result<T, BrowserError>;
