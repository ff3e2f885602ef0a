use std::env;
use std::ffi::OsString;
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use directories::BaseDirs;

/// Environment variable that overrides the default database location.
pub const DB_PATH_ENV: &str = "REGISTRAR_DB_PATH";
/// Folder name used beneath the user's home directory for application data.
const DATA_DIR_NAME: &str = ".campus-registrar";
/// SQLite file name stored inside the application data directory.
const DB_FILE_NAME: &str = "registrar.sqlite";

/// Runtime settings for the binary. Storage functions take explicit paths;
/// only this type consults the environment.
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite file the store is opened from.
    pub db_path: PathBuf,
}

impl Config {
    /// Resolve settings in priority order: explicit override (the `--db` flag),
    /// then `REGISTRAR_DB_PATH`, then the per-user data directory.
    pub fn resolve(db_override: Option<PathBuf>) -> Result<Self> {
        Self::resolve_from(db_override, env::var_os(DB_PATH_ENV))
    }

    /// Same as [`Config::resolve`] with the environment value passed in. An
    /// empty value counts as unset.
    fn resolve_from(db_override: Option<PathBuf>, env_value: Option<OsString>) -> Result<Self> {
        let db_path = match db_override {
            Some(path) => path,
            None => match env_value {
                Some(path) if !path.is_empty() => PathBuf::from(path),
                _ => default_db_path()?,
            },
        };
        Ok(Config { db_path })
    }
}

/// Resolve the absolute path to the SQLite database inside the user's home.
fn default_db_path() -> Result<PathBuf> {
    let base_dirs = BaseDirs::new().ok_or_else(|| anyhow!("could not locate home directory"))?;
    Ok(base_dirs.home_dir().join(DATA_DIR_NAME).join(DB_FILE_NAME))
}
