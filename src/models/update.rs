//! Partial updates for entries.
//!
//! A field left out of an update must stay untouched, while a field explicitly
//! set to `null` must be cleared. [`FieldUpdate`] keeps those two cases apart
//! instead of collapsing both into `None`.

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Tri-state change for a nullable column.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum FieldUpdate<T> {
    /// Leave the stored value as it is.
    #[default]
    Unchanged,
    /// Set the column to NULL.
    Clear,
    /// Set the column to a new value.
    Set(T),
}

impl<T> FieldUpdate<T> {
    /// Returns `true` if this field does not change the row.
    #[must_use]
    pub const fn is_unchanged(&self) -> bool {
        matches!(self, Self::Unchanged)
    }

    /// Returns the new column value, or `None` when the field is unchanged.
    ///
    /// The inner `Option` is the value to write (`None` meaning NULL).
    #[must_use]
    pub const fn as_change(&self) -> Option<Option<&T>> {
        match self {
            Self::Unchanged => None,
            Self::Clear => Some(None),
            Self::Set(value) => Some(Some(value)),
        }
    }
}

impl<T> From<Option<T>> for FieldUpdate<T> {
    /// Converts an explicit value: `None` clears, `Some` sets.
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Clear, Self::Set)
    }
}

impl<T: Serialize> Serialize for FieldUpdate<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Set(value) => serializer.serialize_some(value),
            Self::Unchanged | Self::Clear => serializer.serialize_none(),
        }
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for FieldUpdate<T> {
    /// A present key deserializes to `Set` or `Clear`; an absent key falls back
    /// to `Default` (`Unchanged`) through `#[serde(default)]` on the container.
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Option::<T>::deserialize(deserializer).map(Self::from)
    }
}

/// Partial update of an entry.
///
/// `updated_at` is always refreshed, even when every field is unchanged.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntryUpdate {
    /// New prompt.
    #[serde(skip_serializing_if = "FieldUpdate::is_unchanged")]
    pub prompt: FieldUpdate<String>,
    /// New transcript; also re-derives `transcribed`.
    #[serde(skip_serializing_if = "FieldUpdate::is_unchanged")]
    pub transcript: FieldUpdate<String>,
    /// New serialized transcript segments.
    #[serde(skip_serializing_if = "FieldUpdate::is_unchanged")]
    pub transcript_segments: FieldUpdate<String>,
    /// New audio duration.
    #[serde(skip_serializing_if = "FieldUpdate::is_unchanged")]
    pub duration_seconds: FieldUpdate<f64>,
    /// Replacement local audio. Never nullable: `Clear` is rejected.
    #[serde(skip_serializing_if = "FieldUpdate::is_unchanged")]
    pub audio_local_uri: FieldUpdate<String>,
    /// New remote audio reference.
    #[serde(skip_serializing_if = "FieldUpdate::is_unchanged")]
    pub audio_remote_uri: FieldUpdate<String>,
    /// New local photo.
    #[serde(skip_serializing_if = "FieldUpdate::is_unchanged")]
    pub photo_local_uri: FieldUpdate<String>,
    /// New remote photo reference.
    #[serde(skip_serializing_if = "FieldUpdate::is_unchanged")]
    pub photo_remote_uri: FieldUpdate<String>,
    /// New serialized tags.
    #[serde(skip_serializing_if = "FieldUpdate::is_unchanged")]
    pub tags: FieldUpdate<String>,
    /// New favourite flag.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub favourite: Option<bool>,
}

impl EntryUpdate {
    /// Creates an update that changes nothing but `updated_at`.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets or clears the prompt.
    #[must_use]
    pub fn prompt(mut self, prompt: Option<impl Into<String>>) -> Self {
        self.prompt = prompt.map(Into::into).into();
        self
    }

    /// Sets or clears the transcript.
    #[must_use]
    pub fn transcript(mut self, transcript: Option<impl Into<String>>) -> Self {
        self.transcript = transcript.map(Into::into).into();
        self
    }

    /// Replaces the local audio file.
    #[must_use]
    pub fn audio_local_uri(mut self, uri: impl Into<String>) -> Self {
        self.audio_local_uri = FieldUpdate::Set(uri.into());
        self
    }

    /// Sets or clears the local photo.
    #[must_use]
    pub fn photo_local_uri(mut self, uri: Option<impl Into<String>>) -> Self {
        self.photo_local_uri = uri.map(Into::into).into();
        self
    }

    /// Sets the favourite flag.
    #[must_use]
    pub const fn favourite(mut self, favourite: bool) -> Self {
        self.favourite = Some(favourite);
        self
    }

    /// Returns `true` if the searchable text (prompt or transcript) changes.
    #[must_use]
    pub const fn touches_search_text(&self) -> bool {
        !self.prompt.is_unchanged() || !self.transcript.is_unchanged()
    }

    /// Returns `true` if no column other than `updated_at` changes.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.prompt.is_unchanged()
            && self.transcript.is_unchanged()
            && self.transcript_segments.is_unchanged()
            && self.duration_seconds.is_unchanged()
            && self.audio_local_uri.is_unchanged()
            && self.audio_remote_uri.is_unchanged()
            && self.photo_local_uri.is_unchanged()
            && self.photo_remote_uri.is_unchanged()
            && self.tags.is_unchanged()
            && self.favourite.is_none()
    }
}
