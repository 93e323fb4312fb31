mod http_recording_fetcher;

pub use http_recording_fetcher::HttpRecordingFetcher;
