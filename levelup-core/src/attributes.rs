//! Attribute ledger: per-attribute cumulative XP and derived points.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// XP per attribute point.
pub const POINT_DIVISOR: i64 = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Attribute {
    #[serde(rename = "str")]
    Strength,
    #[serde(rename = "int")]
    Intelligence,
    #[serde(rename = "skills")]
    Skills,
    #[serde(rename = "academics")]
    Academics,
}

impl Attribute {
    pub const ALL: [Attribute; 4] = [
        Attribute::Strength,
        Attribute::Intelligence,
        Attribute::Skills,
        Attribute::Academics,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Attribute::Strength => "STR",
            Attribute::Intelligence => "INT",
            Attribute::Skills => "SKILLS",
            Attribute::Academics => "ACADEMICS",
        }
    }
}

impl std::fmt::Display for Attribute {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

impl std::str::FromStr for Attribute {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "str" | "strength" => Ok(Attribute::Strength),
            "int" | "intelligence" => Ok(Attribute::Intelligence),
            "skills" | "skill" => Ok(Attribute::Skills),
            "academics" | "academic" => Ok(Attribute::Academics),
            other => Err(format!("unknown attribute: {other}")),
        }
    }
}

/// One row of the stats view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct AttributeStat {
    pub attribute: Attribute,
    pub cumulative_xp: i64,
    /// floor(cumulative / 50); negative when the ledger is negative.
    pub points: i64,
    /// `points` clamped at zero for display.
    pub display_points: i64,
    /// Always in 0..POINT_DIVISOR.
    pub xp_toward_next_point: i64,
}

/// Running sum of every XP delta ever applied, keyed by attribute.
///
/// No floor, no ceiling, never reset.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttributeLedger {
    xp: BTreeMap<Attribute, i64>,
}

impl AttributeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply_delta(&mut self, attribute: Attribute, delta: i64) -> i64 {
        let slot = self.xp.entry(attribute).or_insert(0);
        *slot = slot.saturating_add(delta);
        *slot
    }

    pub fn cumulative_xp(&self, attribute: Attribute) -> i64 {
        self.xp.get(&attribute).copied().unwrap_or(0)
    }

    pub fn points_for(&self, attribute: Attribute) -> i64 {
        self.cumulative_xp(attribute).div_euclid(POINT_DIVISOR)
    }

    pub fn progress_toward_next_point(&self, attribute: Attribute) -> i64 {
        self.cumulative_xp(attribute).rem_euclid(POINT_DIVISOR)
    }

    pub fn stat(&self, attribute: Attribute) -> AttributeStat {
        let points = self.points_for(attribute);
        AttributeStat {
            attribute,
            cumulative_xp: self.cumulative_xp(attribute),
            points,
            display_points: points.max(0),
            xp_toward_next_point: self.progress_toward_next_point(attribute),
        }
    }

    pub fn stats(&self) -> Vec<AttributeStat> {
        Attribute::ALL.iter().map(|a| self.stat(*a)).collect()
    }
}
