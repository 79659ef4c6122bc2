//! PersistenceGateway contract: named JSON blobs, loaded once, saved after
//! every mutation.
//!
//! Writes are best-effort. The session never rolls back engine state because
//! a save failed; the blob simply stays dirty until the next flush.

use anyhow::Result;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::BTreeMap;

use crate::error::{EngineError, EngineResult};
use crate::session::SessionState;

/// Bumped whenever a blob's shape changes incompatibly.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum BlobKey {
    SchemaVersion,
    TotalXp,
    AttributeXp,
    Tasks,
    CompletedTasks,
    QuestTemplates,
    ReaperState,
    LastDailyResetDate,
    LastDeletionDate,
}

impl BlobKey {
    pub const ALL: [BlobKey; 9] = [
        BlobKey::SchemaVersion,
        BlobKey::TotalXp,
        BlobKey::AttributeXp,
        BlobKey::Tasks,
        BlobKey::CompletedTasks,
        BlobKey::QuestTemplates,
        BlobKey::ReaperState,
        BlobKey::LastDailyResetDate,
        BlobKey::LastDeletionDate,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BlobKey::SchemaVersion => "schemaVersion",
            BlobKey::TotalXp => "totalXp",
            BlobKey::AttributeXp => "attributeXp",
            BlobKey::Tasks => "tasks",
            BlobKey::CompletedTasks => "completedTasks",
            BlobKey::QuestTemplates => "questTemplates",
            BlobKey::ReaperState => "reaperState",
            BlobKey::LastDailyResetDate => "lastDailyResetDate",
            BlobKey::LastDeletionDate => "lastDeletionDate",
        }
    }
}

impl std::fmt::Display for BlobKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Durable key/value store owned by the host.
pub trait PersistenceGateway {
    fn load(&self, key: BlobKey) -> Result<Option<Value>>;
    fn save(&mut self, key: BlobKey, value: &Value) -> Result<()>;
}

/// In-process gateway for tests and embedding.
#[derive(Debug, Clone, Default)]
pub struct MemoryGateway {
    blobs: BTreeMap<String, Value>,
    reject_writes: bool,
    writes: usize,
}

impl MemoryGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// A gateway whose every `save` fails.
    pub fn read_only() -> Self {
        Self {
            reject_writes: true,
            ..Self::default()
        }
    }

    pub fn set_read_only(&mut self, read_only: bool) {
        self.reject_writes = read_only;
    }

    pub fn get(&self, key: BlobKey) -> Option<&Value> {
        self.blobs.get(key.as_str())
    }

    pub fn insert(&mut self, key: BlobKey, value: Value) {
        self.blobs.insert(key.as_str().to_string(), value);
    }

    /// Successful saves so far.
    pub fn writes(&self) -> usize {
        self.writes
    }
}

impl PersistenceGateway for MemoryGateway {
    fn load(&self, key: BlobKey) -> Result<Option<Value>> {
        Ok(self.blobs.get(key.as_str()).cloned())
    }

    fn save(&mut self, key: BlobKey, value: &Value) -> Result<()> {
        if self.reject_writes {
            anyhow::bail!("memory gateway is read-only");
        }
        self.blobs.insert(key.as_str().to_string(), value.clone());
        self.writes += 1;
        Ok(())
    }
}

fn persistence_error(key: BlobKey, err: impl std::fmt::Display) -> EngineError {
    EngineError::Persistence {
        key: key.to_string(),
        message: err.to_string(),
    }
}

fn read_blob<T: DeserializeOwned + Default>(
    gateway: &dyn PersistenceGateway,
    key: BlobKey,
) -> EngineResult<T> {
    match gateway.load(key).map_err(|e| persistence_error(key, e))? {
        None | Some(Value::Null) => Ok(T::default()),
        Some(v) => serde_json::from_value(v).map_err(|e| persistence_error(key, e)),
    }
}

fn to_blob<T: Serialize>(key: BlobKey, value: &T) -> EngineResult<Value> {
    serde_json::to_value(value).map_err(|e| persistence_error(key, e))
}

impl SessionState {
    /// Read every blob. Missing blobs fall back to empty defaults.
    pub fn read_from(gateway: &dyn PersistenceGateway) -> EngineResult<Self> {
        let version: Option<u32> = read_blob(gateway, BlobKey::SchemaVersion)?;
        if let Some(v) = version {
            if v > SCHEMA_VERSION {
                return Err(persistence_error(
                    BlobKey::SchemaVersion,
                    format!("stored schema v{v} is newer than supported v{SCHEMA_VERSION}"),
                ));
            }
        }

        Ok(SessionState {
            total_xp: read_blob(gateway, BlobKey::TotalXp)?,
            attribute_xp: read_blob(gateway, BlobKey::AttributeXp)?,
            tasks: read_blob(gateway, BlobKey::Tasks)?,
            completed_tasks: read_blob(gateway, BlobKey::CompletedTasks)?,
            quest_templates: read_blob(gateway, BlobKey::QuestTemplates)?,
            reaper_state: read_blob(gateway, BlobKey::ReaperState)?,
            last_daily_reset_date: read_blob(gateway, BlobKey::LastDailyResetDate)?,
            last_deletion_date: read_blob(gateway, BlobKey::LastDeletionDate)?,
        })
    }

    /// Serialize one blob.
    pub fn blob(&self, key: BlobKey) -> EngineResult<Value> {
        match key {
            BlobKey::SchemaVersion => to_blob(key, &SCHEMA_VERSION),
            BlobKey::TotalXp => to_blob(key, &self.total_xp),
            BlobKey::AttributeXp => to_blob(key, &self.attribute_xp),
            BlobKey::Tasks => to_blob(key, &self.tasks),
            BlobKey::CompletedTasks => to_blob(key, &self.completed_tasks),
            BlobKey::QuestTemplates => to_blob(key, &self.quest_templates),
            BlobKey::ReaperState => to_blob(key, &self.reaper_state),
            BlobKey::LastDailyResetDate => to_blob(key, &self.last_daily_reset_date),
            BlobKey::LastDeletionDate => to_blob(key, &self.last_deletion_date),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::Attribute;
    use serde_json::json;

    #[test]
    fn empty_gateway_reads_as_fresh_state() {
        let gw = MemoryGateway::new();
        let state = SessionState::read_from(&gw).unwrap();
        assert_eq!(state, SessionState::default());
    }

    #[test]
    fn newer_schema_is_rejected() {
        let mut gw = MemoryGateway::new();
        gw.insert(BlobKey::SchemaVersion, json!(SCHEMA_VERSION + 1));
        let err = SessionState::read_from(&gw).unwrap_err();
        assert!(matches!(err, EngineError::Persistence { .. }));
    }

    #[test]
    fn corrupt_blob_names_its_key() {
        let mut gw = MemoryGateway::new();
        gw.insert(BlobKey::TotalXp, json!("lots"));
        match SessionState::read_from(&gw).unwrap_err() {
            EngineError::Persistence { key, .. } => assert_eq!(key, "totalXp"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn blobs_use_camel_case_key_shapes() {
        let mut state = SessionState::default();
        state.total_xp = 120;
        state.attribute_xp.apply_delta(Attribute::Skills, 120);

        assert_eq!(state.blob(BlobKey::TotalXp).unwrap(), json!(120));
        assert_eq!(state.blob(BlobKey::AttributeXp).unwrap(), json!({"skills": 120}));
        assert_eq!(state.blob(BlobKey::Tasks).unwrap(), json!({"daily": [], "main": []}));
        assert_eq!(state.blob(BlobKey::LastDeletionDate).unwrap(), Value::Null);
    }

    #[test]
    fn read_only_gateway_rejects_saves() {
        let mut gw = MemoryGateway::read_only();
        assert!(gw.save(BlobKey::TotalXp, &json!(1)).is_err());
        assert_eq!(gw.writes(), 0);
        assert!(gw.get(BlobKey::TotalXp).is_none());
    }
}
