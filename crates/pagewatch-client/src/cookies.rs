use std::fs;
use std::path::{Path, PathBuf};

use pagewatch_core::error::AppError;

/// File-backed storage for browser session cookies.
///
/// The payload is the JSON the browser handed us, stored verbatim and handed
/// back on the next launch. Nothing here interprets cookie fields; the CDP
/// layer owns that format.
#[derive(Debug, Clone)]
pub struct CookieStore {
    path: PathBuf,
}

impl CookieStore {
    /// Store under `dir/cookies_<identifier>.json`.
    pub fn new(dir: impl AsRef<Path>, identifier: &str) -> Self {
        Self {
            path: dir.as_ref().join(format!("cookies_{identifier}.json")),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the stored cookie blob, or `None` if no file exists yet.
    pub fn load(&self) -> Result<Option<String>, AppError> {
        match fs::read_to_string(&self.path) {
            Ok(json) => Ok(Some(json)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::ConfigError(format!(
                "Failed to read cookie file {}: {e}",
                self.path.display()
            ))),
        }
    }

    pub fn save(&self, json: &str) -> Result<(), AppError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                AppError::ConfigError(format!(
                    "Failed to create cookie directory {}: {e}",
                    parent.display()
                ))
            })?;
        }
        fs::write(&self.path, json).map_err(|e| {
            AppError::ConfigError(format!(
                "Failed to write cookie file {}: {e}",
                self.path.display()
            ))
        })?;
        tracing::info!(path = %self.path.display(), "Saved session cookies");
        Ok(())
    }
}
