use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};

use super::{AiRouter, GenResult};
use crate::application::ports::{AnalysisError, CallAnalyzer, GenerationRequest};
use crate::domain::{
    Insights, InsightsDraft, MAX_ITEM_SCORE, RawItemScore, Scorecard, ScorecardTemplate,
    Transcript,
};

pub const DEFAULT_MAX_TRANSCRIPT_CHARS: usize = 24_000;

const ANALYSIS_TEMPERATURE: f32 = 0.2;
const INSIGHTS_MAX_TOKENS: u32 = 1_024;
const SCORING_MAX_TOKENS: u32 = 768;

/// `CallAnalyzer` backed by the AI router, asking for schema-constrained JSON.
pub struct RoutedCallAnalyzer {
    router: Arc<AiRouter>,
    max_transcript_chars: usize,
}

#[derive(Deserialize)]
struct ScoringDraft {
    #[serde(default)]
    items: Vec<RawItemScore>,
}

impl RoutedCallAnalyzer {
    pub fn new(router: Arc<AiRouter>, max_transcript_chars: usize) -> Self {
        Self {
            router,
            max_transcript_chars: max_transcript_chars.max(1),
        }
    }

    fn render_transcript(&self, transcript: &Transcript) -> String {
        let rendered = if transcript.utterances.iter().any(|u| u.speaker.is_some()) {
            transcript
                .utterances
                .iter()
                .map(|u| format!("{}: {}", u.speaker.as_deref().unwrap_or("Unknown"), u.text.trim()))
                .collect::<Vec<_>>()
                .join("\n")
        } else {
            transcript.text.trim().to_string()
        };

        if rendered.chars().count() <= self.max_transcript_chars {
            rendered
        } else {
            rendered.chars().take(self.max_transcript_chars).collect()
        }
    }

    async fn generate_json(&self, request: GenerationRequest) -> Result<Value, AnalysisError> {
        let result = self.router.route(&request).await;
        into_json(result)
    }
}

#[async_trait]
impl CallAnalyzer for RoutedCallAnalyzer {
    async fn extract_insights(
        &self,
        transcript: &Transcript,
        locale: &str,
    ) -> Result<Insights, AnalysisError> {
        let prompt = format!(
            "You analyse sales call transcripts. Reply in the locale \"{locale}\".\n\
             Return a JSON object with: summary (2-4 sentences), pain_points, objections, \
             next_actions and tags (arrays of short strings). Use empty arrays when nothing applies.\n\n\
             Transcript:\n{}",
            self.render_transcript(transcript)
        );
        let request = GenerationRequest::new(prompt)
            .with_json_schema(insights_schema())
            .with_temperature(ANALYSIS_TEMPERATURE)
            .with_max_output_tokens(INSIGHTS_MAX_TOKENS);

        let json = self.generate_json(request).await?;
        let draft: InsightsDraft = serde_json::from_value(json)
            .map_err(|e| AnalysisError::InvalidOutput(e.to_string()))?;
        Ok(Insights::from_draft(transcript.call_id, draft))
    }

    async fn score_call(
        &self,
        transcript: &Transcript,
        template: &ScorecardTemplate,
        locale: &str,
    ) -> Result<Scorecard, AnalysisError> {
        if template.items.is_empty() {
            return Ok(Scorecard::empty(transcript.call_id, template.key.clone()));
        }

        let criteria = template
            .items
            .iter()
            .map(|item| {
                if item.description.is_empty() {
                    format!("- {} ({})", item.key, item.label)
                } else {
                    format!("- {} ({}): {}", item.key, item.label, item.description)
                }
            })
            .collect::<Vec<_>>()
            .join("\n");
        let prompt = format!(
            "You grade sales calls against a scorecard. Write any text in the locale \"{locale}\".\n\
             Score every criterion from 0 to {MAX_ITEM_SCORE} and return a JSON object \
             {{\"items\": [{{\"key\": ..., \"score\": ...}}]}}.\n\n\
             Criteria:\n{criteria}\n\nTranscript:\n{}",
            self.render_transcript(transcript)
        );
        let keys: Vec<&str> = template.items.iter().map(|i| i.key.as_str()).collect();
        let request = GenerationRequest::new(prompt)
            .with_json_schema(scoring_schema(&keys))
            .with_temperature(ANALYSIS_TEMPERATURE)
            .with_max_output_tokens(SCORING_MAX_TOKENS);

        let json = self.generate_json(request).await?;
        let draft: ScoringDraft = serde_json::from_value(json)
            .map_err(|e| AnalysisError::InvalidOutput(e.to_string()))?;
        Ok(Scorecard::from_scores(transcript.call_id, template, &draft.items))
    }
}

fn into_json(result: GenResult) -> Result<Value, AnalysisError> {
    if !result.ok {
        let (message, retriable) = result
            .error
            .map(|e| (e.message, e.retriable))
            .unwrap_or_else(|| ("unknown generation failure".to_string(), true));
        return Err(AnalysisError::Generation {
            provider: result.provider.unwrap_or_else(|| "none".to_string()),
            message,
            retriable,
        });
    }
    result
        .json
        .ok_or_else(|| AnalysisError::InvalidOutput("router returned no JSON".to_string()))
}

fn string_array() -> Value {
    json!({ "type": "array", "items": { "type": "string" } })
}

pub fn insights_schema() -> Value {
    json!({
        "type": "object",
        "properties": {
            "summary": { "type": "string" },
            "pain_points": string_array(),
            "objections": string_array(),
            "next_actions": string_array(),
            "tags": string_array(),
        },
        "required": ["summary", "pain_points", "objections", "next_actions", "tags"],
    })
}

pub fn scoring_schema(keys: &[&str]) -> Value {
    json!({
        "type": "object",
        "properties": {
            "items": {
                "type": "array",
                "items": {
                    "type": "object",
                    "properties": {
                        "key": { "type": "string", "enum": keys },
                        "score": { "type": "number", "minimum": 0, "maximum": MAX_ITEM_SCORE },
                    },
                    "required": ["key", "score"],
                },
            },
        },
        "required": ["items"],
    })
}
