pub mod cache;
pub mod crm;
pub mod fetch;
pub mod llm;
pub mod observability;
pub mod persistence;
pub mod storage;
pub mod transcription;
