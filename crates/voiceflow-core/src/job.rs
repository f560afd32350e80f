use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::ids::JobId;

/// Bucket for client-supplied input artifacts awaiting processing.
pub const BUCKET_UNPROCESSED: &str = "unprocessed";
/// Bucket for synthesized output artifacts.
pub const BUCKET_PROCESSED: &str = "processed";

/// Pipeline branch selector. Immutable once submitted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobMode {
    #[serde(rename = "stt")]
    SpeechToText,
    #[serde(rename = "tts")]
    TextToSpeech,
}

impl fmt::Display for JobMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SpeechToText => write!(f, "stt"),
            Self::TextToSpeech => write!(f, "tts"),
        }
    }
}

impl FromStr for JobMode {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stt" => Ok(Self::SpeechToText),
            "tts" => Ok(Self::TextToSpeech),
            other => Err(format!("unknown job mode: {other}")),
        }
    }
}

/// A fully-qualified object store location. The bucket is carried explicitly
/// rather than inferred from the key text.
#[derive(Clone, Debug, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectRef {
    pub bucket: String,
    pub key: String,
}

impl ObjectRef {
    pub fn new(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    /// Canonical location of a job's uploaded input audio.
    ///
    /// Artifacts live under a `{job_id}/` prefix so everything belonging to
    /// one job stays groupable for cleanup, and so reprocessing after a
    /// redelivery overwrites rather than accumulates.
    pub fn input_for(job_id: &JobId) -> Self {
        Self::new(BUCKET_UNPROCESSED, format!("{job_id}/input.wav"))
    }

    /// Canonical location of a job's synthesized output audio.
    pub fn output_for(job_id: &JobId) -> Self {
        Self::new(BUCKET_PROCESSED, format!("{job_id}/output.wav"))
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.bucket, self.key)
    }
}

/// The input half of a work item, tagged by kind.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum JobInput {
    /// An uploaded audio artifact (speech-to-text).
    Audio { object: ObjectRef },
    /// Inline text to synthesize (text-to-speech).
    Text { text: String },
}

/// One unit of work as it travels through the queue. Immutable once enqueued;
/// the dispatcher treats it as read-only.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkItem {
    pub job_id: JobId,
    pub mode: JobMode,
    pub input: JobInput,
}

impl WorkItem {
    pub fn transcription(job_id: JobId, object: ObjectRef) -> Self {
        Self {
            job_id,
            mode: JobMode::SpeechToText,
            input: JobInput::Audio { object },
        }
    }

    pub fn synthesis(job_id: JobId, text: impl Into<String>) -> Self {
        Self {
            job_id,
            mode: JobMode::TextToSpeech,
            input: JobInput::Text { text: text.into() },
        }
    }
}
