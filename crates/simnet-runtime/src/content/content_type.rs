//! Content types and step content values.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString, IntoStaticStr};

/// File extensions recognized as image media.
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "png", "jpeg"];

/// File extensions recognized as audio media.
pub const AUDIO_EXTENSIONS: &[&str] = &["wav", "mp3", "aac", "flac"];

/// Closed set of content types flowing between nodes.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(AsRefStr, Display, EnumString, IntoStaticStr)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ContentType {
    /// Plain text.
    Text,
    /// Path to an image file.
    Image,
    /// Path to an audio file.
    Audio,
    /// Anything else.
    #[default]
    Unknown,
}

impl ContentType {
    /// Parses a content type label, mapping unrecognized labels to [`ContentType::Unknown`].
    pub fn from_label(label: &str) -> Self {
        label.trim().parse().unwrap_or_default()
    }

    /// Returns whether this content type refers to a media file.
    pub const fn is_media(&self) -> bool {
        matches!(self, Self::Image | Self::Audio)
    }
}

impl From<MediaKind> for ContentType {
    fn from(kind: MediaKind) -> Self {
        match kind {
            MediaKind::Image => Self::Image,
            MediaKind::Audio => Self::Audio,
        }
    }
}

/// Media family detected from a file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// Image file.
    Image,
    /// Audio file.
    Audio,
}

impl MediaKind {
    /// Detects a media file name by extension.
    ///
    /// The first `.` must not be the leading character, and the value must end with one
    /// of the known extensions (case-insensitive).
    pub fn sniff(value: &str) -> Option<Self> {
        if value.find('.')? == 0 {
            return None;
        }

        let dot = value.rfind('.')?;
        let extension = &value[dot + 1..];
        let matches = |known: &[&str]| known.iter().any(|e| extension.eq_ignore_ascii_case(e));

        if matches(IMAGE_EXTENSIONS) {
            Some(Self::Image)
        } else if matches(AUDIO_EXTENSIONS) {
            Some(Self::Audio)
        } else {
            None
        }
    }

    /// Detects a media file path: like [`MediaKind::sniff`], but the value must
    /// also contain a path separator.
    pub fn sniff_path(value: &str) -> Option<Self> {
        if !value.contains(['/', '\\']) {
            return None;
        }

        Self::sniff(value)
    }
}

/// A `(content type, value)` pair recorded for a node at one step.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepContent {
    /// Type of the value.
    pub content_type: ContentType,
    /// Raw value: text, or a media file path.
    pub value: String,
}

impl StepContent {
    /// Creates a new step content.
    pub fn new(content_type: ContentType, value: impl Into<String>) -> Self {
        Self {
            content_type,
            value: value.into(),
        }
    }

    /// Creates a text step content.
    pub fn text(value: impl Into<String>) -> Self {
        Self::new(ContentType::Text, value)
    }

    /// Returns whether the value carries any content.
    pub fn is_present(&self) -> bool {
        !self.value.is_empty()
    }
}
