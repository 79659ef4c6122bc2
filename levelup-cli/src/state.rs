use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use levelup_core::{BlobKey, PersistenceGateway, Session};
use serde_json::Value;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use crate::config::Config;

pub fn levelup_home() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("LEVELUP_HOME") {
        return Ok(PathBuf::from(dir));
    }
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".levelup"))
}

pub fn ensure_levelup_home() -> Result<PathBuf> {
    let dir = levelup_home()?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}

pub fn state_dir() -> Result<PathBuf> {
    Ok(ensure_levelup_home()?.join("state"))
}

/// Lock file guarding the whole load -> mutate -> flush span.
const LOCK_FILE: &str = "state.lock";

/// One pretty-printed JSON file per blob key.
#[derive(Debug)]
pub struct FileGateway {
    dir: PathBuf,
    /// Held exclusively until the gateway is dropped.
    lock: Option<File>,
}

impl FileGateway {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
        Ok(Self { dir, lock: None })
    }

    /// Block until no other process holds the state directory.
    pub fn lock_exclusive(mut self) -> Result<Self> {
        let path = self.lock_path();
        let file = File::create(&path).with_context(|| format!("create {}", path.display()))?;
        FileExt::lock_exclusive(&file)
            .with_context(|| format!("acquire state lock {}", path.display()))?;
        self.lock = Some(file);
        Ok(self)
    }

    pub fn is_locked(&self) -> bool {
        self.lock.is_some()
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn lock_path(&self) -> PathBuf {
        self.dir.join(LOCK_FILE)
    }

    fn path(&self, key: BlobKey) -> PathBuf {
        self.dir.join(format!("{}.json", key.as_str()))
    }
}

impl PersistenceGateway for FileGateway {
    fn load(&self, key: BlobKey) -> Result<Option<Value>> {
        let p = self.path(key);
        if !p.exists() {
            return Ok(None);
        }
        let s = fs::read_to_string(&p).with_context(|| format!("read {}", p.display()))?;
        let v = serde_json::from_str(&s).with_context(|| format!("parse {}", p.display()))?;
        Ok(Some(v))
    }

    fn save(&mut self, key: BlobKey, value: &Value) -> Result<()> {
        let p = self.path(key);
        let tmp = p.with_extension("json.tmp");
        let json = serde_json::to_string_pretty(value)?;
        fs::write(&tmp, json).with_context(|| format!("write {}", tmp.display()))?;
        fs::rename(&tmp, &p).with_context(|| format!("rename {} -> {}", tmp.display(), p.display()))?;
        Ok(())
    }
}

/// Load the session from `~/.levelup/state`, running the daily reset for `now`.
///
/// The returned gateway holds the state lock; drop it once flushed.
pub fn open_session(cfg: &Config, now: DateTime<Utc>) -> Result<(Session, FileGateway)> {
    open_session_in(state_dir()?, cfg, now)
}

pub fn open_session_in(
    dir: impl Into<PathBuf>,
    cfg: &Config,
    now: DateTime<Utc>,
) -> Result<(Session, FileGateway)> {
    let gateway = FileGateway::open(dir)?.lock_exclusive()?;
    let session = Session::load(&gateway, cfg.engine_config()?, now)
        .with_context(|| format!("load state from {}", gateway.dir().display()))?;
    Ok((session, gateway))
}
