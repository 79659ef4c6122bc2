//! levelup-core: progression and reward engine for LevelUp List.
//!
//! Quests award XP that rolls up into a level and per-attribute stats.
//! Missed deadlines and lazy days cost XP. The host drives time by calling
//! `Session::tick(now, rng)`; the engine never reads the wall clock.

pub mod advisor;
pub mod attributes;
pub mod calendar;
pub mod error;
pub mod level;
pub mod persistence;
pub mod reaper;
pub mod session;
pub mod task;
pub mod templates;

pub use advisor::{Breakdown, BreakdownNode, XpSuggestion, parse_breakdown, parse_suggestion};
pub use attributes::{Attribute, AttributeLedger, AttributeStat, POINT_DIVISOR};
pub use calendar::{calendar_day, parse_local_deadline_to_utc};
pub use error::{EngineError, EngineResult};
pub use level::{LevelChange, LevelCurve, LevelInfo};
pub use persistence::{BlobKey, MemoryGateway, PersistenceGateway, SCHEMA_VERSION};
pub use reaper::{REAPER_TITLE, ReaperState, ReaperVerdict};
pub use session::{
    EngineConfig, ReaperOutcome, Resolution, Resolver, Session, SessionState, StartOutcome,
    TickReport,
};
pub use task::{Category, NewTask, QuestLists, SubTask, Task, TaskState};
pub use templates::QuestTemplate;
