mod disabled_transcriber;
mod openai_whisper_transcriber;
mod transcriber_factory;

pub use disabled_transcriber::DisabledTranscriber;
pub use openai_whisper_transcriber::OpenAiWhisperTranscriber;
pub use transcriber_factory::TranscriberFactory;
