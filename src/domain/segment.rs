use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use super::CallId;

/// A labeled slice of a transcript.
///
/// Segments carry no generated identifiers: `(call_id, ordinal)` is the key,
/// so recomputing them from an unchanged transcript yields identical rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment {
    pub call_id: CallId,
    pub ordinal: u32,
    pub label: SegmentLabel,
    pub start_char: usize,
    pub end_char: usize,
    pub start_ms: Option<u64>,
    pub end_ms: Option<u64>,
    pub excerpt: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SegmentLabel {
    Greeting,
    Discovery,
    Pricing,
    Objection,
    Competitor,
    NextSteps,
    Closing,
}

impl SegmentLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SegmentLabel::Greeting => "greeting",
            SegmentLabel::Discovery => "discovery",
            SegmentLabel::Pricing => "pricing",
            SegmentLabel::Objection => "objection",
            SegmentLabel::Competitor => "competitor",
            SegmentLabel::NextSteps => "next_steps",
            SegmentLabel::Closing => "closing",
        }
    }
}

impl FromStr for SegmentLabel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "greeting" => Ok(SegmentLabel::Greeting),
            "discovery" => Ok(SegmentLabel::Discovery),
            "pricing" => Ok(SegmentLabel::Pricing),
            "objection" => Ok(SegmentLabel::Objection),
            "competitor" => Ok(SegmentLabel::Competitor),
            "next_steps" => Ok(SegmentLabel::NextSteps),
            "closing" => Ok(SegmentLabel::Closing),
            _ => Err(format!("Invalid segment label: {}", s)),
        }
    }
}

impl fmt::Display for SegmentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
