use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::PathBuf;

use weighboard_core::auth::Credentials;

pub struct Config {
    pub store_path: PathBuf,
    pub credentials_path: PathBuf,
}

impl Config {
    /// Resolve paths under the platform data directory.
    ///
    /// `store_override` replaces the default `board.db` sheet, e.g. to point
    /// at a shared `.csv` export.
    pub fn load(store_override: Option<PathBuf>) -> Result<Self> {
        let proj_dirs = ProjectDirs::from("", "", "weighboard")
            .context("Could not determine home directory")?;

        let data_dir = proj_dirs.data_dir().to_path_buf();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        let store_path = store_override.unwrap_or_else(|| data_dir.join("board.db"));
        let credentials_path = data_dir.join("users.json");

        Ok(Config {
            store_path,
            credentials_path,
        })
    }

    pub fn credentials(&self) -> Result<Credentials> {
        Credentials::load(&self.credentials_path)
    }
}
