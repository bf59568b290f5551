//! Bearer credentials. Parley never issues or refreshes tokens itself; it
//! only reads one from configuration and attaches it to every request.

use std::fs;
use std::path::PathBuf;

use log::debug;

use super::ApiError;

pub trait TokenSource: Send + Sync {
    /// Returns the bearer token, or `ApiError::Auth` when none is available.
    fn token(&self) -> Result<String, ApiError>;
}

/// A token fixed at startup (config file or `PARLEY_TOKEN`).
pub struct StaticToken(Option<String>);

impl StaticToken {
    pub fn new(token: Option<String>) -> Self {
        Self(token)
    }
}

impl TokenSource for StaticToken {
    fn token(&self) -> Result<String, ApiError> {
        self.0
            .clone()
            .ok_or_else(|| ApiError::Auth(String::from("no token configured")))
    }
}

/// A token read from disk on every request.
pub struct FileToken {
    path: PathBuf,
}

impl FileToken {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl TokenSource for FileToken {
    fn token(&self) -> Result<String, ApiError> {
        let contents = fs::read_to_string(&self.path).map_err(|e| {
            ApiError::Auth(format!("cannot read token file {}: {e}", self.path.display()))
        })?;
        let token = contents.trim();
        if token.is_empty() {
            return Err(ApiError::Auth(format!(
                "token file {} is empty",
                self.path.display()
            )));
        }
        debug!("Read token from {}", self.path.display());
        Ok(token.to_string())
    }
}
