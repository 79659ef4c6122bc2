//! Reusable quest templates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::attributes::Attribute;
use crate::error::EngineResult;
use crate::task::{Category, NewTask, validate_title, validate_xp};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestTemplate {
    pub id: String,
    pub title: String,
    pub xp: i64,
    pub attribute: Attribute,
}

impl QuestTemplate {
    pub(crate) fn build(
        id: String,
        title: &str,
        xp: i64,
        attribute: Attribute,
    ) -> EngineResult<Self> {
        validate_title(title)?;
        validate_xp(xp)?;
        Ok(Self {
            id,
            title: title.trim().to_string(),
            xp,
            attribute,
        })
    }

    /// A fresh quest carrying this template's title, XP and attribute.
    pub fn instantiate(&self, category: Category, deadline: Option<DateTime<Utc>>) -> NewTask {
        let t = NewTask::new(self.title.clone(), self.xp)
            .with_attribute(self.attribute)
            .with_category(category);
        match deadline {
            Some(d) => t.with_deadline(d),
            None => t,
        }
    }
}
