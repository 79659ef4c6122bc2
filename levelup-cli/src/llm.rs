//! HTTP-backed prompt advisors (XP suggestion, task breakdown).
//!
//! Failures never reach the engine: suggestions degrade to zero XP and a
//! failed breakdown is reported as unavailable.

use anyhow::{Context, Result, bail};
use levelup_core::{Breakdown, XpSuggestion, parse_breakdown, parse_suggestion};
use reqwest::header::AUTHORIZATION;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;

use crate::config::AdvisorSection;

const SUGGEST_SYSTEM: &str = "You estimate XP rewards for a gamified to-do list. \
Weigh the effort, complexity and importance of the task. \
Reference scale: walk the dog 10, laundry 15, one hour at the gym 50, write a blog post 100, \
organize the garage 200, finish a major work project 500, learn a new programming language 1000. \
Reply with JSON only: {\"suggestedXpValue\": <number>, \"reasoning\": \"<one or two sentences>\"}.";

const BREAKDOWN_SYSTEM: &str = "You split a complex task into smaller actionable sub-tasks for a \
gamified to-do list. Build a tree at most two levels below the task itself. Every node needs an \
XP value; a parent is worth roughly the sum of its children plus a small completion bonus, and \
smaller steps are worth less. Reply with JSON only: \
{\"title\": \"...\", \"xp\": <number>, \"subTasks\": [{\"title\": \"...\", \"xp\": <number>, \"subTasks\": [...]}]}.";

#[derive(Debug, Clone)]
pub struct Advisor {
    base_url: String,
    model: String,
    api_key: String,
    temperature: f32,
    client: reqwest::Client,
}

impl Advisor {
    /// `None` when the configured API key env var is unset.
    pub fn from_config(section: &AdvisorSection) -> Result<Option<Self>> {
        let Ok(api_key) = std::env::var(&section.api_key_env) else {
            return Ok(None);
        };
        if api_key.trim().is_empty() {
            return Ok(None);
        }
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(section.timeout_secs.max(1)))
            .build()
            .context("build http client")?;
        Ok(Some(Self {
            base_url: section.base_url.trim_end_matches('/').to_string(),
            model: section.model.clone(),
            api_key,
            temperature: section.temperature,
            client,
        }))
    }

    async fn chat(&self, system: &str, user: &str) -> Result<String> {
        #[derive(Serialize)]
        struct Msg<'a> {
            role: &'a str,
            content: &'a str,
        }

        #[derive(Serialize)]
        struct Req<'a> {
            model: &'a str,
            messages: Vec<Msg<'a>>,
            temperature: f32,
        }

        #[derive(Deserialize)]
        struct Resp {
            choices: Vec<Choice>,
        }

        #[derive(Deserialize)]
        struct Choice {
            message: MsgOut,
        }

        #[derive(Deserialize)]
        struct MsgOut {
            content: Option<String>,
        }

        let body = Req {
            model: &self.model,
            messages: vec![
                Msg {
                    role: "system",
                    content: system,
                },
                Msg {
                    role: "user",
                    content: user,
                },
            ],
            temperature: self.temperature,
        };

        let resp = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await
            .context("advisor request")?;

        let status = resp.status();
        if !status.is_success() {
            let txt = resp.text().await.unwrap_or_default();
            bail!("advisor error: {status} {txt}");
        }

        let out: Resp = resp.json().await.context("parse advisor response")?;
        let content = out
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();

        Ok(content.trim().to_string())
    }
}

/// Suggest an XP value. Never fails; problems become a zero suggestion.
pub async fn suggest_xp(advisor: Option<&Advisor>, description: &str) -> XpSuggestion {
    if description.trim().is_empty() {
        return XpSuggestion::unavailable("Please provide a task description to get a suggestion.");
    }
    let Some(advisor) = advisor else {
        return XpSuggestion::unavailable("No advisor configured; set the API key env var from config.toml.");
    };

    let reply = advisor
        .chat(SUGGEST_SYSTEM, &format!("Task description: {}", description.trim()))
        .await
        .and_then(|r| parse_suggestion(&r));

    match reply {
        Ok(s) => s,
        Err(e) => {
            warn!(error = %e, "xp suggestion failed");
            XpSuggestion::unavailable("Sorry, I couldn't come up with a suggestion right now.")
        }
    }
}

/// Break a task title into a sub-task tree.
pub async fn breakdown(advisor: Option<&Advisor>, title: &str) -> Result<Breakdown> {
    if title.trim().is_empty() {
        bail!("a task title is required for a breakdown");
    }
    let advisor = advisor.context("no advisor configured; breakdown unavailable")?;
    let reply = advisor
        .chat(BREAKDOWN_SYSTEM, &format!("Break down this task: {}", title.trim()))
        .await?;
    parse_breakdown(&reply)
}
