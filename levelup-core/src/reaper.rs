//! The Reaper: once per calendar day, punish a day with too few completions.
//!
//! Evaluation is keyed on `last_checked_date`. The date is checked and set
//! in the same `&mut` call, so two triggers on the same day cannot both
//! penalize.
//!
//! Only the day immediately before "today" is inspected. If the app was
//! closed for several days, the skipped days are not evaluated.

use chrono::{DateTime, NaiveDate, Utc};
use chrono_tz::Tz;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::attributes::Attribute;
use crate::calendar::{calendar_day, previous_day};
use crate::task::Task;

pub const REAPER_TITLE: &str = "Reaper's Toll";

/// Successful completions per day needed to escape the Reaper.
pub const DAILY_QUOTA: usize = 3;

/// Penalty per consecutive failure, while escalation is linear.
pub const PENALTY_STEP: i64 = 25;

/// Beyond this many consecutive failures the penalty is random.
pub const LINEAR_ESCALATION_LIMIT: u32 = 3;

/// Exclusive upper bound of the random penalty.
pub const RANDOM_PENALTY_CEILING: i64 = 250;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReaperState {
    pub consecutive_failures: u32,
    #[serde(default)]
    pub last_checked_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaperVerdict {
    /// Already evaluated today.
    AlreadyChecked,
    /// Quota met yesterday; failure streak reset.
    Spared { completed_yesterday: usize },
    Penalized {
        penalty: i64,
        attribute: Attribute,
        consecutive_failures: u32,
        completed_yesterday: usize,
    },
}

/// Penalty magnitude for the Nth consecutive failure (N >= 1).
pub fn penalty_for<R: Rng + ?Sized>(consecutive_failures: u32, rng: &mut R) -> i64 {
    if consecutive_failures <= LINEAR_ESCALATION_LIMIT {
        PENALTY_STEP * consecutive_failures as i64
    } else {
        rng.gen_range(0..RANDOM_PENALTY_CEILING)
    }
}

pub fn random_attribute<R: Rng + ?Sized>(rng: &mut R) -> Attribute {
    Attribute::ALL[rng.gen_range(0..Attribute::ALL.len())]
}

/// Successful (non-failure) resolutions whose `completed_at` falls on `day` in `tz`.
pub fn successes_on(history: &[Task], day: NaiveDate, tz: Tz) -> usize {
    history
        .iter()
        .filter(|t| !t.is_failure)
        .filter_map(|t| t.completed_at)
        .filter(|at| calendar_day(*at, tz) == day)
        .count()
}

impl ReaperState {
    /// Run one evaluation for `today`, updating the streak and the checked date.
    ///
    /// The caller applies the returned penalty to XP and history.
    pub fn judge<R: Rng + ?Sized>(
        &mut self,
        today: NaiveDate,
        history: &[Task],
        tz: Tz,
        rng: &mut R,
    ) -> ReaperVerdict {
        if self.last_checked_date.is_some_and(|last| last >= today) {
            return ReaperVerdict::AlreadyChecked;
        }

        let completed_yesterday = successes_on(history, previous_day(today), tz);
        self.last_checked_date = Some(today);

        if completed_yesterday >= DAILY_QUOTA {
            self.consecutive_failures = 0;
            return ReaperVerdict::Spared { completed_yesterday };
        }

        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        ReaperVerdict::Penalized {
            penalty: penalty_for(self.consecutive_failures, rng),
            attribute: random_attribute(rng),
            consecutive_failures: self.consecutive_failures,
            completed_yesterday,
        }
    }
}

/// Synthetic history entry recording a Reaper penalty.
pub fn toll_entry(
    id: String,
    attribute: Attribute,
    penalty: i64,
    now: DateTime<Utc>,
    level_before: u32,
) -> Task {
    Task {
        id,
        title: REAPER_TITLE.to_string(),
        description: None,
        category: crate::task::Category::Main,
        attribute,
        xp: -penalty,
        deadline: None,
        started_at: None,
        completed_at: Some(now),
        is_failure: true,
        level_at_completion: Some(level_before),
        sub_tasks: Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::NewTask;
    use chrono::{Duration, TimeZone};
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 6, d).unwrap()
    }

    fn done_on(d: u32, failure: bool) -> Task {
        let mut t = NewTask::new("quest", 10).into_task(format!("q-{d}-{failure}"));
        t.completed_at = Some(Utc.with_ymd_and_hms(2026, 6, d, 15, 0, 0).unwrap());
        t.is_failure = failure;
        t
    }

    #[test]
    fn fresh_state_judges_yesterday() {
        let history = vec![done_on(9, false), done_on(9, false)];
        let mut s = ReaperState::default();
        let mut rng = StdRng::seed_from_u64(1);
        let verdict = s.judge(day(10), &history, Tz::UTC, &mut rng);
        assert!(matches!(
            verdict,
            ReaperVerdict::Penalized { penalty: 25, consecutive_failures: 1, completed_yesterday: 2, .. }
        ));
        assert_eq!(s.last_checked_date, Some(day(10)));
    }

    #[test]
    fn same_day_is_a_no_op() {
        let mut s = ReaperState {
            consecutive_failures: 0,
            last_checked_date: Some(day(9)),
        };
        let mut rng = StdRng::seed_from_u64(2);
        let first = s.judge(day(10), &[], Tz::UTC, &mut rng);
        assert!(matches!(first, ReaperVerdict::Penalized { penalty: 25, .. }));
        assert_eq!(s.judge(day(10), &[], Tz::UTC, &mut rng), ReaperVerdict::AlreadyChecked);
        assert_eq!(s.consecutive_failures, 1);
    }

    #[test]
    fn quota_met_resets_streak() {
        let history = vec![done_on(9, false), done_on(9, false), done_on(9, false)];
        let mut s = ReaperState {
            consecutive_failures: 2,
            last_checked_date: Some(day(9)),
        };
        let mut rng = StdRng::seed_from_u64(3);
        assert_eq!(
            s.judge(day(10), &history, Tz::UTC, &mut rng),
            ReaperVerdict::Spared { completed_yesterday: 3 }
        );
        assert_eq!(s.consecutive_failures, 0);
    }

    #[test]
    fn failures_and_other_days_do_not_count() {
        let history = vec![
            done_on(9, false),
            done_on(9, false),
            done_on(9, true),
            done_on(8, false),
            done_on(10, false),
        ];
        assert_eq!(successes_on(&history, day(9), Tz::UTC), 2);
    }

    #[test]
    fn linear_escalation_then_random() {
        let mut rng = StdRng::seed_from_u64(4);
        assert_eq!(penalty_for(1, &mut rng), 25);
        assert_eq!(penalty_for(2, &mut rng), 50);
        assert_eq!(penalty_for(3, &mut rng), 75);
        for _ in 0..200 {
            let p = penalty_for(4, &mut rng);
            assert!((0..250).contains(&p));
        }
    }

    #[test]
    fn multi_day_gap_collapses_into_one_evaluation() {
        let mut s = ReaperState {
            consecutive_failures: 0,
            last_checked_date: Some(day(1)),
        };
        let mut rng = StdRng::seed_from_u64(5);
        let v = s.judge(day(10), &[], Tz::UTC, &mut rng);
        assert!(matches!(
            v,
            ReaperVerdict::Penalized { consecutive_failures: 1, penalty: 25, .. }
        ));
        assert_eq!(s.last_checked_date, Some(day(10)));
    }

    #[test]
    fn toll_entry_is_a_failed_history_record() {
        let now = Utc.with_ymd_and_hms(2026, 6, 10, 0, 5, 0).unwrap();
        let t = toll_entry("r1".to_string(), Attribute::Academics, 50, now, 4);
        assert_eq!(t.title, REAPER_TITLE);
        assert_eq!(t.xp, -50);
        assert!(t.is_failure);
        assert_eq!(t.completed_at, Some(now));
        assert!(!t.is_overdue(now + Duration::days(1)));
    }
}
