//! Session-scoped store and the quest lifecycle.
//!
//! All XP, ledger, history and Reaper mutation goes through `Session`. Every
//! operation validates first and mutates second, so an `Err` leaves the
//! session untouched. Taking `&mut self` serializes triggers: a manual
//! complete and the overdue sweep can never both resolve one task.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use rand::Rng;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use crate::attributes::{AttributeLedger, AttributeStat};
use crate::calendar::calendar_day;
use crate::error::{EngineError, EngineResult};
use crate::level::{LevelChange, LevelCurve, LevelInfo};
use crate::persistence::{BlobKey, PersistenceGateway};
use crate::reaper::{ReaperState, ReaperVerdict, toll_entry};
use crate::task::{Category, NewTask, QuestLists, Task};
use crate::templates::QuestTemplate;

/// Everything the gateway stores. Level is derived, never stored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionState {
    pub total_xp: i64,
    pub attribute_xp: AttributeLedger,
    pub tasks: QuestLists,
    /// Most recent first.
    pub completed_tasks: Vec<Task>,
    pub quest_templates: Vec<QuestTemplate>,
    pub reaper_state: ReaperState,
    pub last_daily_reset_date: Option<NaiveDate>,
    pub last_deletion_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EngineConfig {
    pub curve: LevelCurve,
    /// Zone that defines a calendar day.
    pub timezone: Tz,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            curve: LevelCurve::Flat,
            timezone: Tz::UTC,
        }
    }
}

/// Who resolved a task. Decides the size of a deadline penalty.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolver {
    /// Manual completion: late means the full reward is reversed.
    User,
    /// Background overdue sweep: half the reward, rounded, is taken.
    Sweep,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    /// The history entry, `xp` holding the signed delta applied.
    pub task: Task,
    pub delta: i64,
    pub resolver: Resolver,
    pub level_change: Option<LevelChange>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started(DateTime<Utc>),
    /// Already armed; the original start time is kept.
    AlreadyStarted(DateTime<Utc>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReaperOutcome {
    pub verdict: ReaperVerdict,
    pub level_change: Option<LevelChange>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub expired: Vec<Resolution>,
    pub reaper: ReaperOutcome,
}

#[derive(Debug, Clone)]
pub struct Session {
    state: SessionState,
    config: EngineConfig,
    dirty: BTreeSet<BlobKey>,
}

/// Half the nominal reward, rounding .5 up.
pub fn sweep_penalty(xp: i64) -> i64 {
    let xp = xp.max(0);
    -(xp / 2 + xp % 2)
}

impl Session {
    pub fn new(config: EngineConfig) -> Self {
        Self::from_state(SessionState::default(), config)
    }

    pub fn from_state(state: SessionState, config: EngineConfig) -> Self {
        Self {
            state,
            config,
            dirty: BTreeSet::new(),
        }
    }

    /// Read all blobs once, then apply the daily reset for `now`.
    pub fn load(
        gateway: &dyn PersistenceGateway,
        config: EngineConfig,
        now: DateTime<Utc>,
    ) -> EngineResult<Self> {
        let state = SessionState::read_from(gateway)?;
        let mut session = Self::from_state(state, config);
        session.roll_daily(now);
        Ok(session)
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn total_xp(&self) -> i64 {
        self.state.total_xp
    }

    pub fn level_info(&self) -> LevelInfo {
        self.config.curve.level_info(self.state.total_xp)
    }

    pub fn ledger(&self) -> &AttributeLedger {
        &self.state.attribute_xp
    }

    pub fn stats(&self) -> Vec<AttributeStat> {
        self.state.attribute_xp.stats()
    }

    pub fn active(&self, category: Category) -> &[Task] {
        self.state.tasks.list(category)
    }

    pub fn task(&self, id: &str) -> Option<&Task> {
        self.state.tasks.get(id)
    }

    pub fn history(&self) -> &[Task] {
        &self.state.completed_tasks
    }

    /// Successful resolutions, excluding failures and Reaper tolls.
    pub fn quests_completed(&self) -> usize {
        self.state.completed_tasks.iter().filter(|t| !t.is_failure).count()
    }

    pub fn templates(&self) -> &[QuestTemplate] {
        &self.state.quest_templates
    }

    pub fn reaper_state(&self) -> &ReaperState {
        &self.state.reaper_state
    }

    pub fn today(&self, now: DateTime<Utc>) -> NaiveDate {
        calendar_day(now, self.config.timezone)
    }

    // ------------------------------------------------------------------
    // Daily reset
    // ------------------------------------------------------------------

    /// Clear the daily list when the stored reset date is not today.
    pub fn roll_daily(&mut self, now: DateTime<Utc>) -> bool {
        let today = self.today(now);
        if self.state.last_daily_reset_date == Some(today) {
            return false;
        }
        let cleared = self.state.tasks.daily.len();
        self.state.tasks.daily.clear();
        self.state.last_daily_reset_date = Some(today);
        self.mark(&[BlobKey::Tasks, BlobKey::LastDailyResetDate]);
        info!(%today, cleared, "daily quests reset");
        true
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    pub fn create(&mut self, new: NewTask) -> EngineResult<Task> {
        new.validate()?;
        let task = new.into_task(uuid::Uuid::new_v4().to_string());
        self.state.tasks.list_mut(task.category).push(task.clone());
        self.mark(&[BlobKey::Tasks]);
        info!(id = %task.id, title = %task.title, xp = task.xp, "quest created");
        Ok(task)
    }

    /// Arm the countdown on a task with a deadline. Starting twice is a no-op.
    pub fn start(&mut self, id: &str, now: DateTime<Utc>) -> EngineResult<StartOutcome> {
        let (category, idx) = self.locate(id)?;
        let task = &mut self.state.tasks.list_mut(category)[idx];
        if task.deadline.is_none() {
            return Err(EngineError::invalid_state(id, "only quests with a deadline can be started"));
        }
        if let Some(at) = task.started_at {
            debug!(%id, "quest already started");
            return Ok(StartOutcome::AlreadyStarted(at));
        }
        task.started_at = Some(now);
        self.mark(&[BlobKey::Tasks]);
        info!(%id, "quest countdown started");
        Ok(StartOutcome::Started(now))
    }

    /// User completes a quest. Late (strictly past the deadline) reverses the full reward.
    pub fn complete(&mut self, id: &str, now: DateTime<Utc>) -> EngineResult<Resolution> {
        let (category, idx) = self.locate(id)?;
        let task = &self.state.tasks.list(category)[idx];
        let delta = if task.is_overdue(now) { -task.xp } else { task.xp };
        Ok(self.resolve(category, idx, delta, now, Resolver::User))
    }

    /// Background failure of an overdue quest: half the reward is taken.
    pub fn expire(&mut self, id: &str, now: DateTime<Utc>) -> EngineResult<Resolution> {
        let (category, idx) = self.locate(id)?;
        let task = &self.state.tasks.list(category)[idx];
        if !task.is_overdue(now) {
            return Err(EngineError::invalid_state(id, "deadline has not passed"));
        }
        let delta = sweep_penalty(task.xp);
        Ok(self.resolve(category, idx, delta, now, Resolver::Sweep))
    }

    /// Expire every overdue active quest.
    pub fn sweep_overdue(&mut self, now: DateTime<Utc>) -> Vec<Resolution> {
        let overdue: Vec<String> = self
            .state
            .tasks
            .iter()
            .filter(|t| t.is_overdue(now))
            .map(|t| t.id.clone())
            .collect();

        overdue
            .iter()
            .filter_map(|id| self.expire(id, now).ok())
            .collect()
    }

    /// Remove an active quest with no XP effect. One deletion per calendar day.
    pub fn delete(&mut self, id: &str, now: DateTime<Utc>) -> EngineResult<Task> {
        let (category, idx) = self.locate(id)?;
        let today = self.today(now);
        if self.state.last_deletion_date == Some(today) {
            return Err(EngineError::RateLimited { day: today });
        }
        let task = self.state.tasks.list_mut(category).remove(idx);
        self.state.last_deletion_date = Some(today);
        self.mark(&[BlobKey::Tasks, BlobKey::LastDeletionDate]);
        info!(%id, title = %task.title, "quest deleted");
        Ok(task)
    }

    /// Tick a checklist item. Sub-tasks carry no XP of their own.
    pub fn set_subtask_completed(
        &mut self,
        task_id: &str,
        subtask_id: &str,
        completed: bool,
    ) -> EngineResult<()> {
        let (category, idx) = self.locate(task_id)?;
        let task = &mut self.state.tasks.list_mut(category)[idx];
        let node = task.find_subtask_mut(subtask_id).ok_or_else(|| EngineError::NotFound {
            kind: "sub-task",
            id: subtask_id.to_string(),
        })?;
        if node.completed != completed {
            node.completed = completed;
            self.mark(&[BlobKey::Tasks]);
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Templates
    // ------------------------------------------------------------------

    pub fn add_template(
        &mut self,
        title: &str,
        xp: i64,
        attribute: crate::attributes::Attribute,
    ) -> EngineResult<QuestTemplate> {
        let template = QuestTemplate::build(uuid::Uuid::new_v4().to_string(), title, xp, attribute)?;
        self.state.quest_templates.push(template.clone());
        self.mark(&[BlobKey::QuestTemplates]);
        Ok(template)
    }

    pub fn remove_template(&mut self, id: &str) -> EngineResult<QuestTemplate> {
        let idx = self
            .state
            .quest_templates
            .iter()
            .position(|t| t.id == id)
            .ok_or_else(|| EngineError::NotFound {
                kind: "template",
                id: id.to_string(),
            })?;
        let removed = self.state.quest_templates.remove(idx);
        self.mark(&[BlobKey::QuestTemplates]);
        Ok(removed)
    }

    pub fn create_from_template(
        &mut self,
        template_id: &str,
        category: Category,
        deadline: Option<DateTime<Utc>>,
    ) -> EngineResult<Task> {
        let template = self
            .state
            .quest_templates
            .iter()
            .find(|t| t.id == template_id)
            .ok_or_else(|| EngineError::NotFound {
                kind: "template",
                id: template_id.to_string(),
            })?;
        let new = template.instantiate(category, deadline);
        self.create(new)
    }

    // ------------------------------------------------------------------
    // Reaper + tick
    // ------------------------------------------------------------------

    /// One Reaper evaluation. At most one penalty per calendar day.
    pub fn run_reaper<R: Rng + ?Sized>(&mut self, now: DateTime<Utc>, rng: &mut R) -> ReaperOutcome {
        let today = self.today(now);
        let tz = self.config.timezone;
        let verdict = self
            .state
            .reaper_state
            .judge(today, &self.state.completed_tasks, tz, rng);

        let mut level_change = None;
        match verdict {
            ReaperVerdict::AlreadyChecked => {
                debug!(%today, "reaper already checked today");
            }
            ReaperVerdict::Spared { completed_yesterday } => {
                self.mark(&[BlobKey::ReaperState]);
                info!(%today, completed_yesterday, "reaper spared the hero");
            }
            ReaperVerdict::Penalized {
                penalty,
                attribute,
                consecutive_failures,
                completed_yesterday,
            } => {
                let before = self.state.total_xp;
                let level_before = self.config.curve.level(before);
                self.apply_delta(attribute, -penalty);
                level_change = self.config.curve.change(before, self.state.total_xp);

                let entry = toll_entry(format!("reaper-{today}"), attribute, penalty, now, level_before);
                self.state.completed_tasks.insert(0, entry);
                self.mark(&[
                    BlobKey::ReaperState,
                    BlobKey::TotalXp,
                    BlobKey::AttributeXp,
                    BlobKey::CompletedTasks,
                ]);
                warn!(
                    %today,
                    penalty,
                    %attribute,
                    consecutive_failures,
                    completed_yesterday,
                    "reaper took its toll"
                );
            }
        }

        ReaperOutcome {
            verdict,
            level_change,
        }
    }

    /// Periodic entry point: overdue sweep, then the Reaper.
    pub fn tick<R: Rng + ?Sized>(&mut self, now: DateTime<Utc>, rng: &mut R) -> TickReport {
        let expired = self.sweep_overdue(now);
        let reaper = self.run_reaper(now, rng);
        TickReport { expired, reaper }
    }

    // ------------------------------------------------------------------
    // Persistence
    // ------------------------------------------------------------------

    pub fn is_dirty(&self) -> bool {
        !self.dirty.is_empty()
    }

    /// Save every dirtied blob. Failed saves stay dirty for the next flush.
    ///
    /// Returns the number of blobs written.
    pub fn flush(&mut self, gateway: &mut dyn PersistenceGateway) -> usize {
        if self.dirty.is_empty() {
            return 0;
        }
        self.dirty.insert(BlobKey::SchemaVersion);

        let mut written = 0;
        let pending: Vec<BlobKey> = self.dirty.iter().copied().collect();
        for key in pending {
            let saved = self
                .state
                .blob(key)
                .map_err(anyhow::Error::from)
                .and_then(|v| gateway.save(key, &v));
            match saved {
                Ok(()) => {
                    self.dirty.remove(&key);
                    written += 1;
                }
                Err(e) => warn!(%key, error = %e, "failed to persist blob"),
            }
        }
        written
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn mark(&mut self, keys: &[BlobKey]) {
        self.dirty.extend(keys.iter().copied());
    }

    /// Find an active task, distinguishing "already resolved" from "unknown".
    fn locate(&self, id: &str) -> EngineResult<(Category, usize)> {
        if let Some(pos) = self.state.tasks.position(id) {
            return Ok(pos);
        }
        if self.state.completed_tasks.iter().any(|t| t.id == id) {
            return Err(EngineError::invalid_state(id, "quest is already resolved"));
        }
        Err(EngineError::task_not_found(id))
    }

    fn apply_delta(&mut self, attribute: crate::attributes::Attribute, delta: i64) {
        self.state.total_xp = self.state.total_xp.saturating_add(delta);
        self.state.attribute_xp.apply_delta(attribute, delta);
    }

    fn resolve(
        &mut self,
        category: Category,
        idx: usize,
        delta: i64,
        now: DateTime<Utc>,
        resolver: Resolver,
    ) -> Resolution {
        let mut task = self.state.tasks.list_mut(category).remove(idx);

        let before = self.state.total_xp;
        let level_before = self.config.curve.level(before);
        self.apply_delta(task.attribute, delta);
        let level_change = self.config.curve.change(before, self.state.total_xp);

        task.xp = delta;
        task.completed_at = Some(now);
        task.is_failure = delta < 0;
        task.level_at_completion = Some(level_before);
        self.state.completed_tasks.insert(0, task.clone());

        self.mark(&[
            BlobKey::Tasks,
            BlobKey::CompletedTasks,
            BlobKey::TotalXp,
            BlobKey::AttributeXp,
        ]);

        info!(
            id = %task.id,
            delta,
            failure = task.is_failure,
            ?resolver,
            total_xp = self.state.total_xp,
            "quest resolved"
        );
        if let Some(change) = level_change {
            info!(?change, "level changed");
        }

        Resolution {
            task,
            delta,
            resolver,
            level_change,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attributes::Attribute;
    use crate::persistence::MemoryGateway;
    use chrono::{Duration, TimeZone};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn at(d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 7, d, h, 0, 0).unwrap()
    }

    fn session() -> Session {
        Session::new(EngineConfig::default())
    }

    #[test]
    fn complete_on_time_awards_xp() {
        let mut s = session();
        let t = s
            .create(NewTask::new("Practice scales", 50).with_attribute(Attribute::Skills))
            .unwrap();

        let r = s.complete(&t.id, at(1, 9)).unwrap();
        assert_eq!(r.delta, 50);
        assert!(!r.task.is_failure);
        assert_eq!(r.resolver, Resolver::User);
        assert_eq!(s.total_xp(), 50);
        assert_eq!(s.ledger().cumulative_xp(Attribute::Skills), 50);
        assert!(s.active(Category::Main).is_empty());
        assert_eq!(s.history()[0].id, t.id);
        assert_eq!(s.history()[0].completed_at, Some(at(1, 9)));
    }

    #[test]
    fn complete_after_deadline_reverses_full_reward() {
        let mut s = session();
        let t = s
            .create(NewTask::new("Submit form", 50).with_deadline(at(1, 9)))
            .unwrap();

        let r = s.complete(&t.id, at(1, 10)).unwrap();
        assert_eq!(r.delta, -50);
        assert!(r.task.is_failure);
        assert_eq!(r.task.xp, -50);
        assert_eq!(s.total_xp(), -50);
    }

    #[test]
    fn complete_exactly_at_deadline_is_on_time() {
        let mut s = session();
        let t = s.create(NewTask::new("Edge", 20).with_deadline(at(1, 9))).unwrap();
        assert_eq!(s.complete(&t.id, at(1, 9)).unwrap().delta, 20);
    }

    #[test]
    fn expire_takes_half_and_never_twice() {
        let mut s = session();
        let t = s
            .create(NewTask::new("Read chapter", 40).with_deadline(at(1, 9)))
            .unwrap();

        let r = s.expire(&t.id, at(1, 10)).unwrap();
        assert_eq!(r.delta, -20);
        assert!(r.task.is_failure);
        assert_eq!(r.resolver, Resolver::Sweep);
        assert_eq!(s.total_xp(), -20);

        let again = s.expire(&t.id, at(1, 11)).unwrap_err();
        assert!(matches!(again, EngineError::InvalidState { .. }));
        assert_eq!(s.total_xp(), -20);
        assert_eq!(s.history().len(), 1);
    }

    #[test]
    fn expire_rounds_half_up_and_rejects_future_deadline() {
        assert_eq!(sweep_penalty(41), -21);
        assert_eq!(sweep_penalty(1), -1);

        let mut s = session();
        let t = s.create(NewTask::new("Later", 41).with_deadline(at(2, 9))).unwrap();
        assert!(matches!(
            s.expire(&t.id, at(1, 9)).unwrap_err(),
            EngineError::InvalidState { .. }
        ));
        assert_eq!(s.active(Category::Main).len(), 1);
    }

    #[test]
    fn expire_of_largest_reward_is_still_a_failure() {
        assert_eq!(sweep_penalty(i64::MAX), -(i64::MAX / 2) - 1);

        let mut s = session();
        let t = s
            .create(NewTask::new("Huge", i64::MAX).with_deadline(at(1, 9)))
            .unwrap();
        let r = s.expire(&t.id, at(1, 10)).unwrap();
        assert_eq!(r.delta, -(i64::MAX / 2) - 1);
        assert!(r.task.is_failure);
        assert_eq!(s.total_xp(), -(i64::MAX / 2) - 1);
        assert_eq!(s.level_info().level, 1);
    }

    #[test]
    fn sweep_and_manual_complete_cannot_both_resolve() {
        let mut s = session();
        let t = s.create(NewTask::new("Race", 30).with_deadline(at(1, 9))).unwrap();

        let swept = s.sweep_overdue(at(1, 10));
        assert_eq!(swept.len(), 1);
        assert!(s.complete(&t.id, at(1, 10)).is_err());
        assert_eq!(s.total_xp(), -15);
    }

    #[test]
    fn start_requires_deadline_and_is_idempotent() {
        let mut s = session();
        let open = s.create(NewTask::new("Open ended", 10)).unwrap();
        assert!(matches!(
            s.start(&open.id, at(1, 8)).unwrap_err(),
            EngineError::InvalidState { .. }
        ));

        let timed = s.create(NewTask::new("Timed", 10).with_deadline(at(1, 12))).unwrap();
        assert_eq!(s.start(&timed.id, at(1, 8)).unwrap(), StartOutcome::Started(at(1, 8)));
        assert_eq!(
            s.start(&timed.id, at(1, 9)).unwrap(),
            StartOutcome::AlreadyStarted(at(1, 8))
        );
        assert_eq!(s.task(&timed.id).unwrap().started_at, Some(at(1, 8)));
        assert_eq!(s.task(&timed.id).unwrap().state(), crate::task::TaskState::Armed);
    }

    #[test]
    fn unknown_ids_fail_without_mutation() {
        let mut s = session();
        s.create(NewTask::new("Keep", 10)).unwrap();
        let before = s.state().clone();

        assert!(matches!(s.complete("nope", at(1, 8)).unwrap_err(), EngineError::NotFound { .. }));
        assert!(matches!(s.start("nope", at(1, 8)).unwrap_err(), EngineError::NotFound { .. }));
        assert!(matches!(s.delete("nope", at(1, 8)).unwrap_err(), EngineError::NotFound { .. }));
        assert_eq!(s.state(), &before);
    }

    #[test]
    fn create_rejects_invalid_input() {
        let mut s = session();
        assert!(matches!(s.create(NewTask::new("", 10)).unwrap_err(), EngineError::Validation(_)));
        assert!(matches!(s.create(NewTask::new("x", 0)).unwrap_err(), EngineError::Validation(_)));
        assert!(s.state().tasks.is_empty());
        assert!(!s.is_dirty());
    }

    #[test]
    fn one_deletion_per_day() {
        let mut s = session();
        let a = s.create(NewTask::new("A", 10)).unwrap();
        let b = s.create(NewTask::new("B", 10)).unwrap();

        s.delete(&a.id, at(1, 8)).unwrap();
        let err = s.delete(&b.id, at(1, 20)).unwrap_err();
        assert!(matches!(err, EngineError::RateLimited { .. }));
        assert_eq!(s.active(Category::Main).len(), 1);
        assert_eq!(s.total_xp(), 0);

        s.delete(&b.id, at(2, 8)).unwrap();
        assert!(s.state().tasks.is_empty());
    }

    #[test]
    fn level_up_and_down_are_reported() {
        let mut s = session();
        let a = s.create(NewTask::new("Big", 120)).unwrap();
        let r = s.complete(&a.id, at(1, 8)).unwrap();
        assert_eq!(r.level_change, Some(LevelChange::Up { from: 1, to: 2 }));
        assert_eq!(r.task.level_at_completion, Some(1));

        let b = s.create(NewTask::new("Late", 30).with_deadline(at(1, 8))).unwrap();
        let r = s.complete(&b.id, at(1, 9)).unwrap();
        assert_eq!(r.level_change, Some(LevelChange::Down { from: 2, to: 1 }));
        assert_eq!(s.level_info().level, 1);

        let c = s.create(NewTask::new("Small", 5)).unwrap();
        assert_eq!(s.complete(&c.id, at(1, 10)).unwrap().level_change, None);
    }

    #[test]
    fn daily_reset_clears_only_daily_list() {
        let mut s = session();
        assert!(s.roll_daily(at(1, 8)));
        s.create(NewTask::new("Stretch", 10).with_category(Category::Daily)).unwrap();
        s.create(NewTask::new("Novel", 300)).unwrap();

        assert!(!s.roll_daily(at(1, 22)));
        assert_eq!(s.active(Category::Daily).len(), 1);

        assert!(s.roll_daily(at(2, 7)));
        assert!(s.active(Category::Daily).is_empty());
        assert_eq!(s.active(Category::Main).len(), 1);
    }

    #[test]
    fn subtasks_toggle_without_xp() {
        let mut s = session();
        let t = s
            .create(NewTask::new("Move house", 200).with_sub_tasks(vec![
                crate::task::SubTask::new("s1", "Pack books"),
            ]))
            .unwrap();
        s.set_subtask_completed(&t.id, "s1", true).unwrap();
        assert!(s.task(&t.id).unwrap().sub_tasks[0].completed);
        assert_eq!(s.total_xp(), 0);
        assert!(matches!(
            s.set_subtask_completed(&t.id, "s9", true).unwrap_err(),
            EngineError::NotFound { kind: "sub-task", .. }
        ));
    }

    #[test]
    fn templates_round_trip_into_quests() {
        let mut s = session();
        let tpl = s.add_template("Gym hour", 50, Attribute::Strength).unwrap();
        let q = s.create_from_template(&tpl.id, Category::Daily, None).unwrap();
        assert_eq!(q.xp, 50);
        assert_eq!(q.attribute, Attribute::Strength);
        assert_eq!(s.active(Category::Daily).len(), 1);

        s.remove_template(&tpl.id).unwrap();
        assert!(s.templates().is_empty());
        assert!(s.create_from_template(&tpl.id, Category::Main, None).is_err());
    }

    #[test]
    fn reaper_penalizes_short_day_once() {
        let mut s = session();
        for i in 0..2 {
            let t = s
                .create(NewTask::new(format!("quest {i}"), 10).with_attribute(Attribute::Academics))
                .unwrap();
            s.complete(&t.id, at(1, 12)).unwrap();
        }
        let mut rng = StdRng::seed_from_u64(11);

        let out = s.run_reaper(at(2, 0) + Duration::minutes(5), &mut rng);
        let ReaperVerdict::Penalized { penalty, attribute, consecutive_failures, .. } = out.verdict else {
            panic!("expected a penalty, got {:?}", out.verdict);
        };
        assert_eq!(penalty, 25);
        assert_eq!(consecutive_failures, 1);
        assert_eq!(s.total_xp(), 20 - 25);
        let expected_ledger = if attribute == Attribute::Academics { 20 - 25 } else { -25 };
        assert_eq!(s.ledger().cumulative_xp(attribute), expected_ledger);
        assert_eq!(s.history()[0].title, crate::reaper::REAPER_TITLE);
        assert_eq!(s.history()[0].xp, -25);

        let again = s.run_reaper(at(2, 18), &mut rng);
        assert_eq!(again.verdict, ReaperVerdict::AlreadyChecked);
        assert_eq!(s.total_xp(), -5);
    }

    #[test]
    fn tick_sweeps_then_consults_reaper() {
        let mut s = session();
        s.create(NewTask::new("Overdue", 40).with_deadline(at(1, 9))).unwrap();
        let mut rng = StdRng::seed_from_u64(12);

        let report = s.tick(at(1, 10), &mut rng);
        assert_eq!(report.expired.len(), 1);
        assert_eq!(report.expired[0].delta, -20);
        assert!(matches!(
            report.reaper.verdict,
            ReaperVerdict::Penalized { penalty: 25, completed_yesterday: 0, .. }
        ));
        assert_eq!(s.total_xp(), -20 - 25);

        let report = s.tick(at(1, 11), &mut rng);
        assert!(report.expired.is_empty());
        assert_eq!(report.reaper.verdict, ReaperVerdict::AlreadyChecked);
    }

    #[test]
    fn flush_writes_dirty_blobs_and_retries_failures() {
        let mut s = session();
        let mut gw = MemoryGateway::read_only();
        s.create(NewTask::new("Persist me", 10)).unwrap();

        assert_eq!(s.flush(&mut gw), 0);
        assert!(s.is_dirty());
        assert_eq!(s.active(Category::Main).len(), 1);

        gw.set_read_only(false);
        assert_eq!(s.flush(&mut gw), 2);
        assert!(!s.is_dirty());
        assert_eq!(gw.get(BlobKey::SchemaVersion), Some(&serde_json::json!(1)));
        assert_eq!(s.flush(&mut gw), 0);
    }
}
