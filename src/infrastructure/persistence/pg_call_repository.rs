use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use tracing::instrument;
use uuid::Uuid;

use super::map_sqlx_error;
use crate::application::ports::{CallDetails, CallFilter, CallPage, CallRepository, RepositoryError};
use crate::domain::{
    AudioFormat, Call, CallId, CallStatus, CrmEvent, CrmEventStatus, Insights, NewCall, Recording,
    ScoredItem, Scorecard, Segment, SegmentLabel, StorageKey, Transcript, Utterance, WordTiming,
};

const CALL_COLUMNS: &str = "id, external_id, from_number, to_number, agent_id, duration_secs, \
     recording_url, status, consent, occurred_at, created_at, updated_at";

pub struct PgCallRepository {
    pool: PgPool,
}

impl PgCallRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn fetch_call_where(&self, clause: &str, value: CallKey<'_>) -> Result<Option<Call>, RepositoryError> {
        let sql = format!("SELECT {} FROM calls WHERE {} = $1", CALL_COLUMNS, clause);
        let query = sqlx::query_as::<_, CallRow>(&sql);
        let query = match value {
            CallKey::Id(id) => query.bind(id),
            CallKey::External(external_id) => query.bind(external_id),
        };
        query
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?
            .map(Call::try_from)
            .transpose()
    }
}

enum CallKey<'a> {
    Id(Uuid),
    External(&'a str),
}

#[derive(FromRow)]
struct CallRow {
    id: Uuid,
    external_id: String,
    from_number: String,
    to_number: String,
    agent_id: String,
    duration_secs: Option<i32>,
    recording_url: Option<String>,
    status: String,
    consent: bool,
    occurred_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<CallRow> for Call {
    type Error = RepositoryError;

    fn try_from(r: CallRow) -> Result<Self, Self::Error> {
        Ok(Call {
            id: CallId::from_uuid(r.id),
            external_id: r.external_id,
            from_number: r.from_number,
            to_number: r.to_number,
            agent_id: r.agent_id,
            duration_secs: r.duration_secs.and_then(|d| u32::try_from(d).ok()),
            recording_url: r.recording_url,
            status: r.status.parse::<CallStatus>().map_err(RepositoryError::QueryFailed)?,
            consent: r.consent,
            occurred_at: r.occurred_at,
            created_at: r.created_at,
            updated_at: r.updated_at,
        })
    }
}

#[derive(FromRow)]
struct RecordingRow {
    call_id: Uuid,
    storage_key: String,
    source_url: String,
    format: String,
    size_bytes: i64,
    created_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct TranscriptRow {
    call_id: Uuid,
    language: String,
    text: String,
    words: Json<Vec<WordTiming>>,
    utterances: Json<Vec<Utterance>>,
    updated_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct SegmentRow {
    call_id: Uuid,
    ordinal: i32,
    label: String,
    start_char: i32,
    end_char: i32,
    start_ms: Option<i64>,
    end_ms: Option<i64>,
    excerpt: String,
}

#[derive(FromRow)]
struct InsightsRow {
    call_id: Uuid,
    summary: String,
    pain_points: Json<Vec<String>>,
    objections: Json<Vec<String>>,
    next_actions: Json<Vec<String>>,
    tags: Json<Vec<String>>,
    updated_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct ScorecardRow {
    call_id: Uuid,
    template_key: String,
    items: Json<Vec<ScoredItem>>,
    total_score: f64,
    updated_at: DateTime<Utc>,
}

#[derive(FromRow)]
struct CrmEventRow {
    id: Uuid,
    call_id: Uuid,
    target: String,
    payload: serde_json::Value,
    status: String,
    error_message: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[async_trait]
impl CallRepository for PgCallRepository {
    #[instrument(skip(self, new_call), fields(external_id = %new_call.external_id))]
    async fn find_or_create(&self, new_call: &NewCall) -> Result<(Call, bool), RepositoryError> {
        let call = Call::new(new_call.clone());
        let sql = format!(
            r#"
            INSERT INTO calls ({cols})
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            ON CONFLICT (external_id) DO NOTHING
            RETURNING {cols}
            "#,
            cols = CALL_COLUMNS
        );

        let inserted = sqlx::query_as::<_, CallRow>(&sql)
            .bind(call.id.as_uuid())
            .bind(&call.external_id)
            .bind(&call.from_number)
            .bind(&call.to_number)
            .bind(&call.agent_id)
            .bind(call.duration_secs.map(|d| d as i32))
            .bind(&call.recording_url)
            .bind(call.status.as_str())
            .bind(call.consent)
            .bind(call.occurred_at)
            .bind(call.created_at)
            .bind(call.updated_at)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        if let Some(row) = inserted {
            return Ok((Call::try_from(row)?, true));
        }

        let existing = self
            .fetch_call_where("external_id", CallKey::External(&new_call.external_id))
            .await?
            .ok_or_else(|| RepositoryError::NotFound(new_call.external_id.clone()))?;
        Ok((existing, false))
    }

    #[instrument(skip(self), fields(call_id = %id))]
    async fn get_by_id(&self, id: CallId) -> Result<Option<Call>, RepositoryError> {
        self.fetch_call_where("id", CallKey::Id(id.as_uuid())).await
    }

    #[instrument(skip(self))]
    async fn get_by_external_id(&self, external_id: &str) -> Result<Option<Call>, RepositoryError> {
        self.fetch_call_where("external_id", CallKey::External(external_id))
            .await
    }

    #[instrument(skip(self), fields(call_id = %id, status = %status))]
    async fn update_status(&self, id: CallId, status: CallStatus) -> Result<(), RepositoryError> {
        let result = sqlx::query("UPDATE calls SET status = $1, updated_at = $2 WHERE id = $3")
            .bind(status.as_str())
            .bind(Utc::now())
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(id.to_string()));
        }
        Ok(())
    }

    #[instrument(skip(self, filter), fields(page = filter.page, page_size = filter.page_size))]
    async fn list(&self, filter: &CallFilter) -> Result<CallPage, RepositoryError> {
        let pattern = filter.query.as_deref().map(like_pattern);
        let predicate = "($1::TEXT IS NULL OR from_number ILIKE $1 OR to_number ILIKE $1 \
                         OR agent_id ILIKE $1 OR external_id ILIKE $1)";

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM calls WHERE {}", predicate))
            .bind(&pattern)
            .fetch_one(&self.pool)
            .await
            .map_err(map_sqlx_error)?;

        let rows = sqlx::query_as::<_, CallRow>(&format!(
            "SELECT {} FROM calls WHERE {} ORDER BY occurred_at DESC, id LIMIT $2 OFFSET $3",
            CALL_COLUMNS, predicate
        ))
        .bind(&pattern)
        .bind(i64::from(filter.page_size))
        .bind(filter.offset() as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        Ok(CallPage {
            items: rows
                .into_iter()
                .map(Call::try_from)
                .collect::<Result<Vec<_>, _>>()?,
            page: filter.page,
            page_size: filter.page_size,
            total: total.max(0) as u64,
        })
    }

    #[instrument(skip(self, recording), fields(call_id = %recording.call_id))]
    async fn upsert_recording(&self, recording: &Recording) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO recordings (call_id, storage_key, source_url, format, size_bytes, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (call_id) DO UPDATE
            SET storage_key = EXCLUDED.storage_key,
                source_url = EXCLUDED.source_url,
                format = EXCLUDED.format,
                size_bytes = EXCLUDED.size_bytes
            "#,
        )
        .bind(recording.call_id.as_uuid())
        .bind(recording.storage_key.as_str())
        .bind(&recording.source_url)
        .bind(recording.format.as_str())
        .bind(recording.size_bytes as i64)
        .bind(recording.created_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    #[instrument(skip(self, transcript), fields(call_id = %transcript.call_id))]
    async fn upsert_transcript(&self, transcript: &Transcript) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO transcripts (call_id, language, text, words, utterances, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (call_id) DO UPDATE
            SET language = EXCLUDED.language,
                text = EXCLUDED.text,
                words = EXCLUDED.words,
                utterances = EXCLUDED.utterances,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(transcript.call_id.as_uuid())
        .bind(&transcript.language)
        .bind(&transcript.text)
        .bind(Json(&transcript.words))
        .bind(Json(&transcript.utterances))
        .bind(transcript.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    #[instrument(skip(self, segments), fields(call_id = %call_id, count = segments.len()))]
    async fn replace_segments(&self, call_id: CallId, segments: &[Segment]) -> Result<(), RepositoryError> {
        let mut tx = self.pool.begin().await.map_err(map_sqlx_error)?;

        sqlx::query("DELETE FROM segments WHERE call_id = $1")
            .bind(call_id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;

        for segment in segments {
            sqlx::query(
                r#"
                INSERT INTO segments (call_id, ordinal, label, start_char, end_char, start_ms, end_ms, excerpt)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(call_id.as_uuid())
            .bind(segment.ordinal as i32)
            .bind(segment.label.as_str())
            .bind(segment.start_char as i32)
            .bind(segment.end_char as i32)
            .bind(segment.start_ms.map(|ms| ms as i64))
            .bind(segment.end_ms.map(|ms| ms as i64))
            .bind(&segment.excerpt)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx_error)?;
        }

        tx.commit().await.map_err(map_sqlx_error)?;
        Ok(())
    }

    #[instrument(skip(self, insights), fields(call_id = %insights.call_id))]
    async fn upsert_insights(&self, insights: &Insights) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO insights (call_id, summary, pain_points, objections, next_actions, tags, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT (call_id) DO UPDATE
            SET summary = EXCLUDED.summary,
                pain_points = EXCLUDED.pain_points,
                objections = EXCLUDED.objections,
                next_actions = EXCLUDED.next_actions,
                tags = EXCLUDED.tags,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(insights.call_id.as_uuid())
        .bind(&insights.summary)
        .bind(Json(&insights.pain_points))
        .bind(Json(&insights.objections))
        .bind(Json(&insights.next_actions))
        .bind(Json(&insights.tags))
        .bind(insights.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    #[instrument(skip(self, scorecard), fields(call_id = %scorecard.call_id))]
    async fn upsert_scorecard(&self, scorecard: &Scorecard) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO scorecards (call_id, template_key, items, total_score, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (call_id) DO UPDATE
            SET template_key = EXCLUDED.template_key,
                items = EXCLUDED.items,
                total_score = EXCLUDED.total_score,
                updated_at = EXCLUDED.updated_at
            "#,
        )
        .bind(scorecard.call_id.as_uuid())
        .bind(&scorecard.template_key)
        .bind(Json(&scorecard.items))
        .bind(scorecard.total_score)
        .bind(scorecard.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    #[instrument(skip(self, event), fields(call_id = %event.call_id, target = %event.target))]
    async fn create_crm_event(&self, event: &CrmEvent) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"
            INSERT INTO crm_events (id, call_id, target, payload, status, error_message, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(event.id)
        .bind(event.call_id.as_uuid())
        .bind(&event.target)
        .bind(&event.payload)
        .bind(event.status.as_str())
        .bind(&event.error_message)
        .bind(event.created_at)
        .bind(event.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;
        Ok(())
    }

    #[instrument(skip(self, error_message), fields(event_id = %id, status = %status))]
    async fn update_crm_event(
        &self,
        id: Uuid,
        status: CrmEventStatus,
        error_message: Option<&str>,
    ) -> Result<(), RepositoryError> {
        let result = sqlx::query(
            "UPDATE crm_events SET status = $1, error_message = $2, updated_at = $3 WHERE id = $4",
        )
        .bind(status.as_str())
        .bind(error_message)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.pool)
        .await
        .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound(id.to_string()));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(call_id = %id))]
    async fn get_details(&self, id: CallId) -> Result<Option<CallDetails>, RepositoryError> {
        let Some(call) = self.get_by_id(id).await? else {
            return Ok(None);
        };
        let call_id = id.as_uuid();

        let recording = sqlx::query_as::<_, RecordingRow>(
            "SELECT call_id, storage_key, source_url, format, size_bytes, created_at FROM recordings WHERE call_id = $1",
        )
        .bind(call_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?
        .map(|r| -> Result<Recording, RepositoryError> {
            Ok(Recording {
                call_id: CallId::from_uuid(r.call_id),
                storage_key: StorageKey::from_raw(r.storage_key),
                source_url: r.source_url,
                format: r.format.parse::<AudioFormat>().map_err(RepositoryError::QueryFailed)?,
                size_bytes: r.size_bytes.max(0) as u64,
                created_at: r.created_at,
            })
        })
        .transpose()?;

        let transcript = sqlx::query_as::<_, TranscriptRow>(
            "SELECT call_id, language, text, words, utterances, updated_at FROM transcripts WHERE call_id = $1",
        )
        .bind(call_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?
        .map(|r| Transcript {
            call_id: CallId::from_uuid(r.call_id),
            language: r.language,
            text: r.text,
            words: r.words.0,
            utterances: r.utterances.0,
            updated_at: r.updated_at,
        });

        let segments = sqlx::query_as::<_, SegmentRow>(
            "SELECT call_id, ordinal, label, start_char, end_char, start_ms, end_ms, excerpt \
             FROM segments WHERE call_id = $1 ORDER BY ordinal",
        )
        .bind(call_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?
        .into_iter()
        .map(|r| -> Result<Segment, RepositoryError> {
            Ok(Segment {
                call_id: CallId::from_uuid(r.call_id),
                ordinal: r.ordinal.max(0) as u32,
                label: r.label.parse::<SegmentLabel>().map_err(RepositoryError::QueryFailed)?,
                start_char: r.start_char.max(0) as usize,
                end_char: r.end_char.max(0) as usize,
                start_ms: r.start_ms.map(|ms| ms.max(0) as u64),
                end_ms: r.end_ms.map(|ms| ms.max(0) as u64),
                excerpt: r.excerpt,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

        let insights = sqlx::query_as::<_, InsightsRow>(
            "SELECT call_id, summary, pain_points, objections, next_actions, tags, updated_at \
             FROM insights WHERE call_id = $1",
        )
        .bind(call_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?
        .map(|r| Insights {
            call_id: CallId::from_uuid(r.call_id),
            summary: r.summary,
            pain_points: r.pain_points.0,
            objections: r.objections.0,
            next_actions: r.next_actions.0,
            tags: r.tags.0,
            updated_at: r.updated_at,
        });

        let scorecard = sqlx::query_as::<_, ScorecardRow>(
            "SELECT call_id, template_key, items, total_score, updated_at FROM scorecards WHERE call_id = $1",
        )
        .bind(call_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_sqlx_error)?
        .map(|r| Scorecard {
            call_id: CallId::from_uuid(r.call_id),
            template_key: r.template_key,
            items: r.items.0,
            total_score: r.total_score,
            updated_at: r.updated_at,
        });

        let crm_events = sqlx::query_as::<_, CrmEventRow>(
            "SELECT id, call_id, target, payload, status, error_message, created_at, updated_at \
             FROM crm_events WHERE call_id = $1 ORDER BY created_at",
        )
        .bind(call_id)
        .fetch_all(&self.pool)
        .await
        .map_err(map_sqlx_error)?
        .into_iter()
        .map(|r| -> Result<CrmEvent, RepositoryError> {
            Ok(CrmEvent {
                id: r.id,
                call_id: CallId::from_uuid(r.call_id),
                target: r.target,
                payload: r.payload,
                status: r.status.parse::<CrmEventStatus>().map_err(RepositoryError::QueryFailed)?,
                error_message: r.error_message,
                created_at: r.created_at,
                updated_at: r.updated_at,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

        Ok(Some(CallDetails {
            call,
            recording,
            transcript,
            segments,
            insights,
            scorecard,
            crm_events,
        }))
    }
}

/// `%needle%` with LIKE metacharacters escaped.
fn like_pattern(query: &str) -> String {
    let escaped = query
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}
