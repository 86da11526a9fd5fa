use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::state::{ensure_hsbc_parse_home, hsbc_parse_home};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub output: OutputSection,
    pub normalizer: NormalizerSection,
    pub log: LogSection,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSection {
    /// Pretty-print JSON on stdout.
    pub pretty: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerSection {
    /// Regexes for extra page furniture (e.g. the mailing address block).
    pub extra_boilerplate: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogSection {
    pub level: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    Ok(hsbc_parse_home()?.join("config.toml"))
}

pub fn load_config() -> Result<Config> {
    let p = config_path()?;
    if !p.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(&p).with_context(|| format!("read {}", p.display()))?;
    parse_config(&s).with_context(|| format!("parse {}", p.display()))
}

fn parse_config(s: &str) -> Result<Config> {
    Ok(toml::from_str(s)?)
}

pub fn save_config(cfg: &Config) -> Result<()> {
    let p = ensure_hsbc_parse_home()?.join("config.toml");
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(&p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(())
}

pub fn init_config() -> Result<()> {
    let p = config_path()?;
    if p.exists() {
        println!("Config already exists: {}", p.display());
        return Ok(());
    }
    save_config(&Config::default())?;
    println!("Wrote {}", p.display());
    Ok(())
}

pub fn show_config() -> Result<()> {
    let cfg = load_config()?;
    print!("{}", toml::to_string_pretty(&cfg).context("serialize config")?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_config_uses_defaults() {
        let cfg = parse_config("[output]\npretty = true\n").unwrap();
        assert!(cfg.output.pretty);
        assert!(cfg.normalizer.extra_boilerplate.is_empty());
        assert_eq!(cfg.log.level, "warn");
    }

    #[test]
    fn test_extra_boilerplate_list() {
        let cfg = parse_config(
            r#"
[normalizer]
extra_boilerplate = ['^MR ', '^FLAT \d+']
"#,
        )
        .unwrap();
        assert_eq!(cfg.normalizer.extra_boilerplate.len(), 2);
        assert_eq!(cfg.normalizer.extra_boilerplate[1], r"^FLAT \d+");
    }

    #[test]
    fn test_default_round_trips_through_toml() {
        let s = toml::to_string_pretty(&Config::default()).unwrap();
        assert_eq!(parse_config(&s).unwrap(), Config::default());
    }
}
