//! Path utilities for REM directory resolution.

use anyhow::Result;
use std::path::PathBuf;

const REM_DIR: &str = ".rem";
const DB_FILE: &str = "rem.db";
const CONFIG_FILE: &str = "config.toml";

/// Environment variable to override the REM directory.
pub const REM_DIR_ENV: &str = "REM_DIR";

/// Resolve the REM data directory.
/// Priority: REM_DIR env var > ~/.rem/
pub fn resolve_rem_dir() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var(REM_DIR_ENV)
        && !dir.trim().is_empty()
    {
        return Ok(PathBuf::from(dir));
    }
    dirs::home_dir()
        .map(|h| h.join(REM_DIR))
        .ok_or_else(|| anyhow::anyhow!("Failed to determine home directory"))
}

/// Default database path: ~/.rem/rem.db
pub fn default_db_path() -> Result<PathBuf> {
    Ok(resolve_rem_dir()?.join(DB_FILE))
}

/// Default configuration path: ~/.rem/config.toml
pub fn config_path() -> Result<PathBuf> {
    Ok(resolve_rem_dir()?.join(CONFIG_FILE))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_names_live_under_rem_dir() {
        let dir = resolve_rem_dir().unwrap();
        assert_eq!(default_db_path().unwrap(), dir.join("rem.db"));
        assert_eq!(config_path().unwrap(), dir.join("config.toml"));
    }
}
