//! Level curve: cumulative XP -> (level, progress within level).
//!
//! Level is never stored. Every read re-derives it from `total_xp`, so
//! penalties that push XP below a threshold drop the level again.

use serde::{Deserialize, Serialize};

/// XP needed to go from level 1 to level 2, for both curves.
pub const BASE_LEVEL_XP: i64 = 100;

/// The rule for how much XP each level-up costs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LevelCurve {
    /// Every level costs `BASE_LEVEL_XP`.
    #[default]
    Flat,
    /// Level L -> L+1 costs floor(BASE_LEVEL_XP * 1.5^(L-1)).
    Geometric,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LevelInfo {
    pub level: u32,
    pub xp_in_current_level: i64,
    pub xp_for_next_level: i64,
    /// 0.0 ..< 100.0
    pub progress: f64,
    pub total_xp: i64,
}

/// Direction of a level transition caused by a single XP delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LevelChange {
    Up { from: u32, to: u32 },
    Down { from: u32, to: u32 },
}

impl LevelCurve {
    /// XP required to advance from `level` to `level + 1`.
    pub fn xp_to_advance(&self, level: u32) -> i64 {
        match self {
            LevelCurve::Flat => BASE_LEVEL_XP,
            LevelCurve::Geometric => {
                let exp = level.saturating_sub(1) as i32;
                let cost = (BASE_LEVEL_XP as f64 * 1.5_f64.powi(exp)).floor();
                if cost >= i64::MAX as f64 {
                    i64::MAX
                } else {
                    cost as i64
                }
            }
        }
    }

    /// Cumulative XP at which `level` begins.
    pub fn xp_at_level_start(&self, level: u32) -> i64 {
        (1..level.max(1)).fold(0i64, |acc, l| acc.saturating_add(self.xp_to_advance(l)))
    }

    pub fn level_info(&self, total_xp: i64) -> LevelInfo {
        // Negative totals sit at the very start of level 1.
        let effective = total_xp.max(0);

        let (level, xp_at_start, xp_for_next) = match self {
            LevelCurve::Flat => {
                let level = (effective / BASE_LEVEL_XP).saturating_add(1);
                let level = u32::try_from(level).unwrap_or(u32::MAX);
                let start = effective - effective % BASE_LEVEL_XP;
                (level, start, BASE_LEVEL_XP)
            }
            LevelCurve::Geometric => {
                let mut level = 1u32;
                let mut start = 0i64;
                let mut next = self.xp_to_advance(level);
                while effective - start >= next {
                    start += next;
                    level += 1;
                    next = self.xp_to_advance(level);
                }
                (level, start, next)
            }
        };

        let xp_in_current_level = effective - xp_at_start;
        let progress = (xp_in_current_level as f64 / xp_for_next as f64 * 100.0).clamp(0.0, 100.0);

        LevelInfo {
            level,
            xp_in_current_level,
            xp_for_next_level: xp_for_next,
            progress,
            total_xp,
        }
    }

    pub fn level(&self, total_xp: i64) -> u32 {
        self.level_info(total_xp).level
    }

    /// Compare the level before and after a delta.
    pub fn change(&self, total_before: i64, total_after: i64) -> Option<LevelChange> {
        let from = self.level(total_before);
        let to = self.level(total_after);
        match to.cmp(&from) {
            std::cmp::Ordering::Greater => Some(LevelChange::Up { from, to }),
            std::cmp::Ordering::Less => Some(LevelChange::Down { from, to }),
            std::cmp::Ordering::Equal => None,
        }
    }
}

impl std::str::FromStr for LevelCurve {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "flat" => Ok(LevelCurve::Flat),
            "geometric" => Ok(LevelCurve::Geometric),
            other => Err(format!("unknown level curve: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_curve_starts_at_level_one() {
        let info = LevelCurve::Flat.level_info(0);
        assert_eq!(info.level, 1);
        assert_eq!(info.xp_in_current_level, 0);
        assert_eq!(info.xp_for_next_level, 100);
        assert_eq!(info.progress, 0.0);
    }

    #[test]
    fn flat_curve_boundary_resets_progress() {
        let info = LevelCurve::Flat.level_info(100);
        assert_eq!(info.level, 2);
        assert_eq!(info.progress, 0.0);

        let info = LevelCurve::Flat.level_info(250);
        assert_eq!(info.level, 3);
        assert_eq!(info.xp_in_current_level, 50);
        assert_eq!(info.progress, 50.0);
    }

    #[test]
    fn negative_total_stays_at_level_one() {
        let info = LevelCurve::Flat.level_info(-40);
        assert_eq!(info.level, 1);
        assert_eq!(info.xp_in_current_level, 0);
        assert_eq!(info.progress, 0.0);
        assert_eq!(info.total_xp, -40);
    }

    #[test]
    fn geometric_curve_thresholds() {
        let c = LevelCurve::Geometric;
        assert_eq!(c.xp_to_advance(1), 100);
        assert_eq!(c.xp_to_advance(2), 150);
        assert_eq!(c.xp_to_advance(3), 225);
        assert_eq!(c.xp_to_advance(4), 337);
        assert_eq!(c.xp_to_advance(5), 506);

        assert_eq!(c.level(99), 1);
        assert_eq!(c.level(100), 2);
        assert_eq!(c.level(249), 2);
        assert_eq!(c.level(250), 3);
        assert_eq!(c.xp_at_level_start(4), 475);

        let info = c.level_info(325);
        assert_eq!(info.level, 3);
        assert_eq!(info.xp_in_current_level, 75);
        assert_eq!(info.xp_for_next_level, 225);
    }

    #[test]
    fn progress_stays_in_range_and_is_monotone_within_level() {
        for curve in [LevelCurve::Flat, LevelCurve::Geometric] {
            let mut prev: Option<LevelInfo> = None;
            for xp in 0..2_000 {
                let info = curve.level_info(xp);
                assert!(info.level >= 1);
                assert!(info.progress >= 0.0 && info.progress < 100.0, "xp={xp}");
                assert_eq!(info, curve.level_info(xp));
                if let Some(p) = prev {
                    if p.level == info.level {
                        assert!(info.progress >= p.progress);
                    }
                }
                prev = Some(info);
            }
        }
    }

    #[test]
    fn penalties_can_lower_the_level() {
        let c = LevelCurve::Flat;
        assert_eq!(c.change(90, 140), Some(LevelChange::Up { from: 1, to: 2 }));
        assert_eq!(c.change(140, 90), Some(LevelChange::Down { from: 2, to: 1 }));
        assert_eq!(c.change(110, 150), None);
    }

    #[test]
    fn curve_parses_from_config_strings() {
        assert_eq!("flat".parse::<LevelCurve>().unwrap(), LevelCurve::Flat);
        assert_eq!(" Geometric ".parse::<LevelCurve>().unwrap(), LevelCurve::Geometric);
        assert!("steep".parse::<LevelCurve>().is_err());
    }
}
