mod call;
mod call_id;
mod call_status;
mod crm_event;
mod embedding;
mod insights;
mod job;
mod job_status;
mod recording;
mod scorecard;
mod segment;
mod storage_key;
mod transcript;

pub use call::{Call, NewCall, mask_phone_number};
pub use call_id::CallId;
pub use call_status::CallStatus;
pub use crm_event::{CrmEvent, CrmEventStatus};
pub use embedding::Embedding;
pub use insights::{Insights, InsightsDraft};
pub use job::{CallJob, JobId};
pub use job_status::JobStatus;
pub use recording::{AudioFormat, Recording};
pub use scorecard::{
    MAX_ITEM_SCORE, RawItemScore, ScoredItem, Scorecard, ScorecardTemplate, TemplateItem,
    weighted_total,
};
pub use segment::{Segment, SegmentLabel};
pub use storage_key::StorageKey;
pub use transcript::{Transcript, Utterance, WordTiming};
