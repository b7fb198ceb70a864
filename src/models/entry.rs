//! Entry types and identifiers.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for an entry.
///
/// Generated at save time as `<epoch millis>-<random suffix>`, so ids sort
/// roughly by creation time and never collide within one installation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(String);

impl EntryId {
    /// Creates an entry ID from an existing string.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Generates a fresh ID for an entry written at `now_millis`.
    #[must_use]
    pub fn generate(now_millis: i64) -> Self {
        let random = uuid::Uuid::new_v4().simple().to_string();
        Self(format!("{now_millis}-{}", &random[..9]))
    }

    /// Returns the ID as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for EntryId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for EntryId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One journaled moment.
///
/// All timestamps are Unix epoch milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    /// Unique identifier, immutable after creation.
    pub id: EntryId,
    /// When the entry was created.
    pub created_at: i64,
    /// When the moment was recorded; drives the "today" window.
    pub recorded_at: i64,
    /// Refreshed on every mutating write.
    pub updated_at: i64,
    /// The prompt the user answered, if any.
    pub prompt: Option<String>,
    /// Length of the audio clip in seconds.
    pub duration_seconds: Option<f64>,
    /// Playable audio on this device. Always present.
    pub audio_local_uri: String,
    /// Reserved for sync.
    pub audio_remote_uri: Option<String>,
    /// Attached photo on this device.
    pub photo_local_uri: Option<String>,
    /// Reserved for sync.
    pub photo_remote_uri: Option<String>,
    /// Transcribed text of the audio.
    pub transcript: Option<String>,
    /// Serialized JSON transcript segments (reserved).
    pub transcript_segments: Option<String>,
    /// Whether a transcript was present at write time.
    pub transcribed: bool,
    /// Serialized JSON tags (reserved).
    pub tags: Option<String>,
    /// Marked as favourite by the user.
    pub favourite: bool,
}

/// Input for saving a new entry.
///
/// Only `audio_local_uri` is required. `created_at` and `recorded_at` are
/// normally left empty and filled with the write time; seeding and imports
/// may supply them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreateEntryInput {
    /// Playable audio on this device.
    pub audio_local_uri: String,
    /// The prompt the user answered.
    pub prompt: Option<String>,
    /// Length of the audio clip in seconds.
    pub duration_seconds: Option<f64>,
    /// Attached photo on this device.
    pub photo_local_uri: Option<String>,
    /// Transcribed text of the audio.
    pub transcript: Option<String>,
    /// Explicit recording time (epoch millis).
    pub recorded_at: Option<i64>,
    /// Explicit creation time (epoch millis).
    pub created_at: Option<i64>,
}

impl CreateEntryInput {
    /// Creates an input referencing the given audio file.
    #[must_use]
    pub fn new(audio_local_uri: impl Into<String>) -> Self {
        Self {
            audio_local_uri: audio_local_uri.into(),
            ..Self::default()
        }
    }

    /// Sets the prompt.
    #[must_use]
    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    /// Sets the transcript.
    #[must_use]
    pub fn with_transcript(mut self, transcript: impl Into<String>) -> Self {
        self.transcript = Some(transcript.into());
        self
    }

    /// Sets the audio duration.
    #[must_use]
    pub const fn with_duration(mut self, seconds: f64) -> Self {
        self.duration_seconds = Some(seconds);
        self
    }

    /// Sets the photo URI.
    #[must_use]
    pub fn with_photo(mut self, uri: impl Into<String>) -> Self {
        self.photo_local_uri = Some(uri.into());
        self
    }

    /// Sets the recording time.
    #[must_use]
    pub const fn with_recorded_at(mut self, millis: i64) -> Self {
        self.recorded_at = Some(millis);
        self
    }

    /// Sets the creation time.
    #[must_use]
    pub const fn with_created_at(mut self, millis: i64) -> Self {
        self.created_at = Some(millis);
        self
    }
}

/// Timestamps assigned to a new entry at write time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AssignedTimestamps {
    /// Creation time.
    pub created_at: i64,
    /// Recording time.
    pub recorded_at: i64,
    /// Last update time.
    pub updated_at: i64,
}

impl AssignedTimestamps {
    /// Resolves the timestamps for `input` written at `now`.
    ///
    /// `created_at` falls back to `recorded_at`, then to `now`. `updated_at`
    /// mirrors an explicitly supplied `created_at` so seeded entries look
    /// untouched.
    #[must_use]
    pub fn resolve(input: &CreateEntryInput, now: i64) -> Self {
        let created_at = input.created_at.or(input.recorded_at).unwrap_or(now);
        let recorded_at = input.recorded_at.unwrap_or(now);
        let updated_at = if input.created_at.is_some() {
            created_at
        } else {
            now
        };
        Self {
            created_at,
            recorded_at,
            updated_at,
        }
    }
}

/// Maps an empty string to `None`.
pub(crate) fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
