use async_trait::async_trait;
use uuid::Uuid;

use super::{CallDetails, CallFilter, CallPage, RepositoryError};
use crate::domain::{
    Call, CallId, CallStatus, CrmEvent, CrmEventStatus, Insights, NewCall, Recording, Scorecard,
    Segment, Transcript,
};

#[async_trait]
pub trait CallRepository: Send + Sync {
    /// Returns the call with `new_call.external_id`, creating it if absent.
    /// The flag is `true` only when this invocation created the row.
    async fn find_or_create(&self, new_call: &NewCall) -> Result<(Call, bool), RepositoryError>;

    async fn get_by_id(&self, id: CallId) -> Result<Option<Call>, RepositoryError>;

    async fn get_by_external_id(&self, external_id: &str)
    -> Result<Option<Call>, RepositoryError>;

    async fn update_status(&self, id: CallId, status: CallStatus) -> Result<(), RepositoryError>;

    async fn list(&self, filter: &CallFilter) -> Result<CallPage, RepositoryError>;

    async fn upsert_recording(&self, recording: &Recording) -> Result<(), RepositoryError>;

    async fn upsert_transcript(&self, transcript: &Transcript) -> Result<(), RepositoryError>;

    /// Deletes every segment of the call, then inserts `segments`.
    async fn replace_segments(
        &self,
        call_id: CallId,
        segments: &[Segment],
    ) -> Result<(), RepositoryError>;

    async fn upsert_insights(&self, insights: &Insights) -> Result<(), RepositoryError>;

    async fn upsert_scorecard(&self, scorecard: &Scorecard) -> Result<(), RepositoryError>;

    async fn create_crm_event(&self, event: &CrmEvent) -> Result<(), RepositoryError>;

    async fn update_crm_event(
        &self,
        id: Uuid,
        status: CrmEventStatus,
        error_message: Option<&str>,
    ) -> Result<(), RepositoryError>;

    async fn get_details(&self, id: CallId) -> Result<Option<CallDetails>, RepositoryError>;
}
