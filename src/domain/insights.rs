use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::CallId;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insights {
    pub call_id: CallId,
    pub summary: String,
    pub pain_points: Vec<String>,
    pub objections: Vec<String>,
    pub next_actions: Vec<String>,
    pub tags: Vec<String>,
    pub updated_at: DateTime<Utc>,
}

/// Shape the language model is asked to return for insight extraction.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct InsightsDraft {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub pain_points: Vec<String>,
    #[serde(default)]
    pub objections: Vec<String>,
    #[serde(default)]
    pub next_actions: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Insights {
    pub fn from_draft(call_id: CallId, draft: InsightsDraft) -> Self {
        Self {
            call_id,
            summary: draft.summary.trim().to_string(),
            pain_points: clean_list(draft.pain_points),
            objections: clean_list(draft.objections),
            next_actions: clean_list(draft.next_actions),
            tags: clean_list(draft.tags),
            updated_at: Utc::now(),
        }
    }

    pub fn empty(call_id: CallId) -> Self {
        Self::from_draft(call_id, InsightsDraft::default())
    }

    pub fn is_empty(&self) -> bool {
        self.summary.is_empty()
            && self.pain_points.is_empty()
            && self.objections.is_empty()
            && self.next_actions.is_empty()
            && self.tags.is_empty()
    }
}

fn clean_list(items: Vec<String>) -> Vec<String> {
    items
        .into_iter()
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty())
        .collect()
}
