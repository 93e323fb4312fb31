use std::collections::HashMap;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use uuid::Uuid;

use crate::application::ports::{CallDetails, CallFilter, CallPage, CallRepository, RepositoryError};
use crate::domain::{
    Call, CallId, CallStatus, CrmEvent, CrmEventStatus, Insights, NewCall, Recording, Scorecard,
    Segment, Transcript,
};

#[derive(Default)]
struct Tables {
    calls: HashMap<CallId, Call>,
    by_external_id: HashMap<String, CallId>,
    recordings: HashMap<CallId, Recording>,
    transcripts: HashMap<CallId, Transcript>,
    segments: HashMap<CallId, Vec<Segment>>,
    insights: HashMap<CallId, Insights>,
    scorecards: HashMap<CallId, Scorecard>,
    crm_events: Vec<CrmEvent>,
}

impl Tables {
    fn require_call(&self, id: CallId) -> Result<(), RepositoryError> {
        if self.calls.contains_key(&id) {
            Ok(())
        } else {
            Err(RepositoryError::ConstraintViolation(format!(
                "call {} does not exist",
                id
            )))
        }
    }
}

/// Process-local call store with the same uniqueness and parent rules as the
/// Postgres schema.
#[derive(Default)]
pub struct InMemoryCallRepository {
    tables: RwLock<Tables>,
}

impl InMemoryCallRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn call_count(&self) -> usize {
        self.tables.read().calls.len()
    }

    pub fn crm_events_for(&self, call_id: CallId) -> Vec<CrmEvent> {
        self.tables
            .read()
            .crm_events
            .iter()
            .filter(|e| e.call_id == call_id)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl CallRepository for InMemoryCallRepository {
    async fn find_or_create(&self, new_call: &NewCall) -> Result<(Call, bool), RepositoryError> {
        let mut tables = self.tables.write();
        if let Some(id) = tables.by_external_id.get(&new_call.external_id) {
            let existing = tables
                .calls
                .get(id)
                .cloned()
                .ok_or_else(|| RepositoryError::NotFound(new_call.external_id.clone()))?;
            return Ok((existing, false));
        }

        let call = Call::new(new_call.clone());
        tables
            .by_external_id
            .insert(call.external_id.clone(), call.id);
        tables.calls.insert(call.id, call.clone());
        Ok((call, true))
    }

    async fn get_by_id(&self, id: CallId) -> Result<Option<Call>, RepositoryError> {
        Ok(self.tables.read().calls.get(&id).cloned())
    }

    async fn get_by_external_id(&self, external_id: &str) -> Result<Option<Call>, RepositoryError> {
        let tables = self.tables.read();
        Ok(tables
            .by_external_id
            .get(external_id)
            .and_then(|id| tables.calls.get(id))
            .cloned())
    }

    async fn update_status(&self, id: CallId, status: CallStatus) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write();
        let call = tables
            .calls
            .get_mut(&id)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;
        call.status = status;
        call.updated_at = Utc::now();
        Ok(())
    }

    async fn list(&self, filter: &CallFilter) -> Result<CallPage, RepositoryError> {
        let tables = self.tables.read();
        let mut matching: Vec<&Call> = tables
            .calls
            .values()
            .filter(|call| {
                filter
                    .query
                    .as_deref()
                    .is_none_or(|query| call.matches_query(query))
            })
            .collect();
        matching.sort_by(|a, b| {
            b.occurred_at
                .cmp(&a.occurred_at)
                .then_with(|| a.id.as_uuid().cmp(&b.id.as_uuid()))
        });

        let total = matching.len() as u64;
        let items = matching
            .into_iter()
            .skip(filter.offset() as usize)
            .take(filter.page_size as usize)
            .cloned()
            .collect();

        Ok(CallPage {
            items,
            page: filter.page,
            page_size: filter.page_size,
            total,
        })
    }

    async fn upsert_recording(&self, recording: &Recording) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write();
        tables.require_call(recording.call_id)?;
        tables
            .recordings
            .insert(recording.call_id, recording.clone());
        Ok(())
    }

    async fn upsert_transcript(&self, transcript: &Transcript) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write();
        tables.require_call(transcript.call_id)?;
        tables
            .transcripts
            .insert(transcript.call_id, transcript.clone());
        Ok(())
    }

    async fn replace_segments(&self, call_id: CallId, segments: &[Segment]) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write();
        tables.require_call(call_id)?;
        tables.segments.insert(call_id, segments.to_vec());
        Ok(())
    }

    async fn upsert_insights(&self, insights: &Insights) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write();
        tables.require_call(insights.call_id)?;
        tables.insights.insert(insights.call_id, insights.clone());
        Ok(())
    }

    async fn upsert_scorecard(&self, scorecard: &Scorecard) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write();
        tables.require_call(scorecard.call_id)?;
        tables
            .scorecards
            .insert(scorecard.call_id, scorecard.clone());
        Ok(())
    }

    async fn create_crm_event(&self, event: &CrmEvent) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write();
        tables.require_call(event.call_id)?;
        tables.crm_events.push(event.clone());
        Ok(())
    }

    async fn update_crm_event(
        &self,
        id: Uuid,
        status: CrmEventStatus,
        error_message: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let mut tables = self.tables.write();
        let event = tables
            .crm_events
            .iter_mut()
            .find(|e| e.id == id)
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;
        event.status = status;
        event.error_message = error_message.map(str::to_string);
        event.updated_at = Utc::now();
        Ok(())
    }

    async fn get_details(&self, id: CallId) -> Result<Option<CallDetails>, RepositoryError> {
        let tables = self.tables.read();
        let Some(call) = tables.calls.get(&id).cloned() else {
            return Ok(None);
        };

        let mut segments = tables.segments.get(&id).cloned().unwrap_or_default();
        segments.sort_by_key(|s| s.ordinal);

        Ok(Some(CallDetails {
            call,
            recording: tables.recordings.get(&id).cloned(),
            transcript: tables.transcripts.get(&id).cloned(),
            segments,
            insights: tables.insights.get(&id).cloned(),
            scorecard: tables.scorecards.get(&id).cloned(),
            crm_events: tables
                .crm_events
                .iter()
                .filter(|e| e.call_id == id)
                .cloned()
                .collect(),
        }))
    }
}
