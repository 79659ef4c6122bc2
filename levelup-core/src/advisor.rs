//! Prompt advisor contract: XP suggestions and task breakdowns.
//!
//! Advisor output is untrusted. It is parsed leniently here and then goes
//! through the same validation as manual entry before touching a session.

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

use crate::attributes::Attribute;
use crate::error::{EngineError, EngineResult};
use crate::task::{Category, NewTask, SubTask, validate_title, validate_xp};

static FENCED_JSON: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```(?:json)?\s*(\{.*\})\s*```").expect("valid regex"));

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct XpSuggestion {
    pub suggested_xp_value: f64,
    #[serde(default)]
    pub reasoning: String,
}

impl XpSuggestion {
    /// Zero suggestion used whenever the advisor cannot help.
    pub fn unavailable(reasoning: impl Into<String>) -> Self {
        Self {
            suggested_xp_value: 0.0,
            reasoning: reasoning.into(),
        }
    }

    /// The suggestion as a usable quest reward, if it is one.
    pub fn xp(&self) -> Option<i64> {
        rounded_xp(self.suggested_xp_value).ok()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BreakdownNode {
    pub title: String,
    pub xp: f64,
    #[serde(default)]
    pub sub_tasks: Vec<BreakdownNode>,
}

/// A complex quest decomposed into a sub-task tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Breakdown {
    pub title: String,
    pub xp: f64,
    #[serde(default)]
    pub sub_tasks: Vec<BreakdownNode>,
}

impl Breakdown {
    /// Build a quest whose checklist mirrors the breakdown tree.
    ///
    /// Every node must have a title and a positive (rounded) XP value.
    pub fn into_new_task(self, category: Category, attribute: Attribute) -> EngineResult<NewTask> {
        validate_title(&self.title)?;
        let xp = rounded_xp(self.xp)?;
        let mut counter = 0usize;
        let sub_tasks = convert_children(self.sub_tasks, &mut counter)?;
        Ok(NewTask::new(self.title, xp)
            .with_category(category)
            .with_attribute(attribute)
            .with_sub_tasks(sub_tasks))
    }
}

fn convert_children(nodes: Vec<BreakdownNode>, counter: &mut usize) -> EngineResult<Vec<SubTask>> {
    nodes
        .into_iter()
        .map(|n| {
            validate_title(&n.title)?;
            let xp = rounded_xp(n.xp)?;
            *counter += 1;
            let id = format!("sub-{}-{}", *counter, uuid::Uuid::new_v4().simple());
            let children = convert_children(n.sub_tasks, counter)?;
            Ok(SubTask::new(id, n.title.trim())
                .with_xp(xp)
                .with_children(children))
        })
        .collect()
}

fn rounded_xp(value: f64) -> EngineResult<i64> {
    if !value.is_finite() {
        return Err(EngineError::Validation(format!("xp must be a number, got {value}")));
    }
    let xp = value.round();
    if xp > i64::MAX as f64 {
        return Err(EngineError::Validation(format!("xp out of range: {value}")));
    }
    let xp = xp as i64;
    validate_xp(xp)?;
    Ok(xp)
}

/// Pull a JSON object out of a model reply (fenced block, or first `{` to last `}`).
pub fn extract_json(text: &str) -> Option<&str> {
    if let Some(c) = FENCED_JSON.captures(text) {
        return c.get(1).map(|m| m.as_str());
    }
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (end > start).then(|| &text[start..=end])
}

pub fn parse_suggestion(reply: &str) -> Result<XpSuggestion> {
    let json = extract_json(reply).context("no JSON object in advisor reply")?;
    serde_json::from_str(json).context("parse xp suggestion")
}

pub fn parse_breakdown(reply: &str) -> Result<Breakdown> {
    let json = extract_json(reply).context("no JSON object in advisor reply")?;
    serde_json::from_str(json).context("parse task breakdown")
}
