use std::path::Path;

use tracing::{debug, warn};

pub fn is_production() -> bool {
    dotenvy::var("ROCKET_PROFILE").unwrap_or_else(|_| "development".to_string()) == "production"
}

/// Loads the layered env files. Later files override earlier ones.
pub fn load_environment() -> Result<Vec<&'static str>, dotenvy::Error> {
    let env_files = if is_production() {
        ["config/common.env", "config/prod.env", ".secrets.env"]
    } else {
        ["config/common.env", "config/dev.env", ".secrets.env"]
    };

    let mut loaded = Vec::new();
    for env_file in env_files {
        if load_env_file(env_file)? {
            loaded.push(env_file);
        }
    }

    Ok(loaded)
}

fn load_env_file(path: &str) -> Result<bool, dotenvy::Error> {
    if !Path::new(path).exists() {
        warn!(path, "Environment file not found, skipping");
        return Ok(false);
    }

    dotenvy::from_filename_override(path)?;
    debug!(path, "Loaded environment file");
    Ok(true)
}
