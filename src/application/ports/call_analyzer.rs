use async_trait::async_trait;

use crate::domain::{Insights, Scorecard, ScorecardTemplate, Transcript};

/// Language-model analysis of a finished transcript.
#[async_trait]
pub trait CallAnalyzer: Send + Sync {
    async fn extract_insights(
        &self,
        transcript: &Transcript,
        locale: &str,
    ) -> Result<Insights, AnalysisError>;

    async fn score_call(
        &self,
        transcript: &Transcript,
        template: &ScorecardTemplate,
        locale: &str,
    ) -> Result<Scorecard, AnalysisError>;
}

#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error("generation failed via {provider}: {message}")]
    Generation {
        provider: String,
        message: String,
        retriable: bool,
    },
    #[error("invalid model output: {0}")]
    InvalidOutput(String),
}
