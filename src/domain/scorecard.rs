use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::CallId;

pub const MAX_ITEM_SCORE: f64 = 10.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Scorecard {
    pub call_id: CallId,
    pub template_key: String,
    pub items: Vec<ScoredItem>,
    pub total_score: f64,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredItem {
    pub key: String,
    pub weight: f64,
    pub score: f64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct ScorecardTemplate {
    pub key: String,
    pub items: Vec<TemplateItem>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TemplateItem {
    pub key: String,
    pub label: String,
    #[serde(default)]
    pub description: String,
    pub weight: f64,
}

/// Raw per-item score as returned by the language model.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RawItemScore {
    pub key: String,
    pub score: f64,
}

impl Scorecard {
    /// Builds a scorecard from model output, taking weights from the template.
    ///
    /// Keys unknown to the template are dropped, duplicate keys keep the first
    /// score, and scores are clamped to `0..=MAX_ITEM_SCORE`.
    pub fn from_scores(call_id: CallId, template: &ScorecardTemplate, raw: &[RawItemScore]) -> Self {
        let mut items: Vec<ScoredItem> = Vec::with_capacity(template.items.len());
        for template_item in &template.items {
            let Some(raw_score) = raw.iter().find(|r| r.key == template_item.key) else {
                continue;
            };
            let score = if raw_score.score.is_finite() {
                raw_score.score.clamp(0.0, MAX_ITEM_SCORE)
            } else {
                0.0
            };
            items.push(ScoredItem {
                key: template_item.key.clone(),
                weight: template_item.weight,
                score,
            });
        }

        Self::from_items(call_id, template.key.clone(), items)
    }

    pub fn from_items(call_id: CallId, template_key: String, items: Vec<ScoredItem>) -> Self {
        let total_score = weighted_total(&items);
        Self {
            call_id,
            template_key,
            items,
            total_score,
            updated_at: Utc::now(),
        }
    }

    pub fn empty(call_id: CallId, template_key: impl Into<String>) -> Self {
        Self::from_items(call_id, template_key.into(), Vec::new())
    }
}

/// Weighted mean of item scores; zero when there is nothing to weigh.
pub fn weighted_total(items: &[ScoredItem]) -> f64 {
    let weight_sum: f64 = items.iter().map(|i| i.weight).sum();
    if weight_sum <= 0.0 {
        return 0.0;
    }
    let weighted: f64 = items.iter().map(|i| i.weight * i.score).sum();
    (weighted / weight_sum * 100.0).round() / 100.0
}
