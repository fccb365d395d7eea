use anyhow::{anyhow, Result};
use directories::ProjectDirs;
use std::path::PathBuf;

pub fn project_dirs() -> Result<ProjectDirs> {
    ProjectDirs::from("", "", "otp-cli")
        .ok_or_else(|| anyhow!("Couldn't find operating-system-specific configuration paths"))
}

pub fn config_file() -> Result<PathBuf> {
    Ok(project_dirs()?.config_dir().join("config.toml"))
}
