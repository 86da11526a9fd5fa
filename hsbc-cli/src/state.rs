use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

pub fn hsbc_parse_home() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".hsbc-parse"))
}

pub fn ensure_hsbc_parse_home() -> Result<PathBuf> {
    let dir = hsbc_parse_home()?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}
