//! Quest model: active tasks, resolved history entries, and sub-task trees.
//!
//! The same `Task` record lives in the active pool while `completed_at` is
//! `None` and moves into history once it is set. There is no third state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::attributes::Attribute;
use crate::error::{EngineError, EngineResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Daily,
    Main,
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Category::Daily => "daily",
            Category::Main => "main",
        })
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "daily" => Ok(Category::Daily),
            "main" => Ok(Category::Main),
            other => Err(format!("unknown category: {other}")),
        }
    }
}

/// Lifecycle position of a task, derived from its timestamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Active,
    /// Deadline set and countdown started.
    Armed,
    ResolvedSuccess,
    ResolvedFailure,
}

/// Checklist node. Parents own their children; no back references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubTask {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub xp: i64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_tasks: Vec<SubTask>,
}

impl SubTask {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            completed: false,
            xp: 0,
            sub_tasks: Vec::new(),
        }
    }

    pub fn with_xp(mut self, xp: i64) -> Self {
        self.xp = xp;
        self
    }

    pub fn with_children(mut self, children: Vec<SubTask>) -> Self {
        self.sub_tasks = children;
        self
    }

    /// Depth-first search for a node by id.
    pub fn find_mut(&mut self, id: &str) -> Option<&mut SubTask> {
        if self.id == id {
            return Some(self);
        }
        self.sub_tasks.iter_mut().find_map(|c| c.find_mut(id))
    }

    /// Number of nodes in this subtree, including self.
    pub fn count(&self) -> usize {
        1 + self.sub_tasks.iter().map(SubTask::count).sum::<usize>()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub category: Category,
    pub attribute: Attribute,

    /// Nominal reward while active; the signed delta actually applied once resolved.
    pub xp: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_failure: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level_at_completion: Option<u32>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_tasks: Vec<SubTask>,
}

impl Task {
    pub fn state(&self) -> TaskState {
        match (self.completed_at, self.is_failure) {
            (Some(_), true) => TaskState::ResolvedFailure,
            (Some(_), false) => TaskState::ResolvedSuccess,
            (None, _) if self.deadline.is_some() && self.started_at.is_some() => TaskState::Armed,
            (None, _) => TaskState::Active,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.completed_at.is_some()
    }

    /// Strictly past the deadline at `now`. Tasks without a deadline never are.
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        self.deadline.is_some_and(|d| now > d)
    }

    pub fn find_subtask_mut(&mut self, id: &str) -> Option<&mut SubTask> {
        self.sub_tasks.iter_mut().find_map(|s| s.find_mut(id))
    }
}

/// The active pool, split the way the quest board shows it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestLists {
    #[serde(default)]
    pub daily: Vec<Task>,
    #[serde(default)]
    pub main: Vec<Task>,
}

impl QuestLists {
    pub fn list(&self, category: Category) -> &[Task] {
        match category {
            Category::Daily => &self.daily,
            Category::Main => &self.main,
        }
    }

    pub fn list_mut(&mut self, category: Category) -> &mut Vec<Task> {
        match category {
            Category::Daily => &mut self.daily,
            Category::Main => &mut self.main,
        }
    }

    /// Where an active task sits, if anywhere.
    pub fn position(&self, id: &str) -> Option<(Category, usize)> {
        [Category::Daily, Category::Main].into_iter().find_map(|c| {
            self.list(c)
                .iter()
                .position(|t| t.id == id)
                .map(|i| (c, i))
        })
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.iter().find(|t| t.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.daily.iter().chain(self.main.iter())
    }

    pub fn len(&self) -> usize {
        self.daily.len() + self.main.len()
    }

    pub fn is_empty(&self) -> bool {
        self.daily.is_empty() && self.main.is_empty()
    }
}

/// Input for creating a quest, from the user or from an advisor.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub category: Category,
    pub attribute: Attribute,
    pub xp: i64,
    pub deadline: Option<DateTime<Utc>>,
    pub sub_tasks: Vec<SubTask>,
}

impl NewTask {
    pub fn new(title: impl Into<String>, xp: i64) -> Self {
        Self {
            title: title.into(),
            description: None,
            category: Category::Main,
            attribute: Attribute::Skills,
            xp,
            deadline: None,
            sub_tasks: Vec::new(),
        }
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.category = category;
        self
    }

    pub fn with_attribute(mut self, attribute: Attribute) -> Self {
        self.attribute = attribute;
        self
    }

    pub fn with_deadline(mut self, deadline: DateTime<Utc>) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        let d = description.into();
        self.description = if d.trim().is_empty() { None } else { Some(d) };
        self
    }

    pub fn with_sub_tasks(mut self, sub_tasks: Vec<SubTask>) -> Self {
        self.sub_tasks = sub_tasks;
        self
    }

    pub fn validate(&self) -> EngineResult<()> {
        validate_title(&self.title)?;
        validate_xp(self.xp)
    }

    pub(crate) fn into_task(self, id: String) -> Task {
        Task {
            id,
            title: self.title.trim().to_string(),
            description: self.description,
            category: self.category,
            attribute: self.attribute,
            xp: self.xp,
            deadline: self.deadline,
            started_at: None,
            completed_at: None,
            is_failure: false,
            level_at_completion: None,
            sub_tasks: self.sub_tasks,
        }
    }
}

pub(crate) fn validate_title(title: &str) -> EngineResult<()> {
    if title.trim().is_empty() {
        return Err(EngineError::Validation("title must not be empty".to_string()));
    }
    Ok(())
}

pub(crate) fn validate_xp(xp: i64) -> EngineResult<()> {
    if xp <= 0 {
        return Err(EngineError::Validation(format!(
            "xp must be a positive integer, got {xp}"
        )));
    }
    Ok(())
}
