use anyhow::{Context, Result};
use chrono_tz::Tz;
use levelup_core::{EngineConfig, LevelCurve};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::state::ensure_levelup_home;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub engine: EngineSection,
    pub advisor: AdvisorSection,
    pub watch: WatchSection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSection {
    /// IANA zone that decides when a calendar day starts.
    pub timezone: String,
    pub curve: LevelCurve,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AdvisorSection {
    /// OpenAI-compatible endpoint root.
    pub base_url: String,
    pub model: String,
    /// Name of the env var holding the API key.
    pub api_key_env: String,
    pub temperature: f32,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WatchSection {
    pub tick_seconds: u64,
}

impl Default for EngineSection {
    fn default() -> Self {
        Self {
            timezone: "UTC".to_string(),
            curve: LevelCurve::Flat,
        }
    }
}

impl Default for AdvisorSection {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            temperature: 0.4,
            timeout_secs: 30,
        }
    }
}

impl Default for WatchSection {
    fn default() -> Self {
        Self { tick_seconds: 60 }
    }
}

impl Config {
    pub fn engine_config(&self) -> Result<EngineConfig> {
        let timezone: Tz = self
            .engine
            .timezone
            .parse()
            .map_err(|_| anyhow::anyhow!("invalid timezone in config: {}", self.engine.timezone))?;
        Ok(EngineConfig {
            curve: self.engine.curve,
            timezone,
        })
    }
}

pub fn config_path() -> Result<PathBuf> {
    Ok(ensure_levelup_home()?.join("config.toml"))
}

pub fn parse_config(s: &str) -> Result<Config> {
    toml::from_str(s).context("parse config.toml")
}

pub fn load_config() -> Result<Config> {
    let p = config_path()?;
    if !p.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(&p).with_context(|| format!("read {}", p.display()))?;
    parse_config(&s)
}

pub fn save_config(cfg: &Config) -> Result<()> {
    let p = config_path()?;
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
    let cfg = Config::default();
    save_config(&cfg)?;
    println!("Wrote {}", p.display());
    Ok(())
}

pub fn show_config() -> Result<()> {
    let cfg = load_config()?;
    println!("# {}", config_path()?.display());
    print!("{}", toml::to_string_pretty(&cfg).context("serialize config")?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let cfg = parse_config("[engine]\ntimezone = \"America/Chicago\"\n").unwrap();
        assert_eq!(cfg.engine.timezone, "America/Chicago");
        assert_eq!(cfg.engine.curve, LevelCurve::Flat);
        assert_eq!(cfg.watch.tick_seconds, 60);
        assert_eq!(cfg.advisor.api_key_env, "OPENAI_API_KEY");

        let engine = cfg.engine_config().unwrap();
        assert_eq!(engine.timezone, chrono_tz::America::Chicago);
    }

    #[test]
    fn curve_and_bad_zone_are_checked() {
        let cfg = parse_config("[engine]\ncurve = \"geometric\"\ntimezone = \"Nowhere/Land\"\n").unwrap();
        assert_eq!(cfg.engine.curve, LevelCurve::Geometric);
        assert!(cfg.engine_config().is_err());

        assert!(parse_config("[engine]\ncurve = \"steep\"\n").is_err());
    }

    #[test]
    fn defaults_round_trip_through_toml() {
        let s = toml::to_string_pretty(&Config::default()).unwrap();
        let back = parse_config(&s).unwrap();
        assert_eq!(back.engine.timezone, "UTC");
        assert_eq!(back.advisor.model, "gpt-4o-mini");
    }
}
