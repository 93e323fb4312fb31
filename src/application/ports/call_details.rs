use serde::Serialize;

use crate::domain::{Call, CrmEvent, Insights, Recording, Scorecard, Segment, Transcript};

/// A call with every artifact the pipeline has produced for it.
#[derive(Debug, Clone, Serialize)]
pub struct CallDetails {
    pub call: Call,
    pub recording: Option<Recording>,
    pub transcript: Option<Transcript>,
    pub segments: Vec<Segment>,
    pub insights: Option<Insights>,
    pub scorecard: Option<Scorecard>,
    pub crm_events: Vec<CrmEvent>,
}
