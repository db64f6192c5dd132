use std::fmt;

use serde::{Deserialize, Serialize};

/// Requested output resolution. Anything unrecognised resolves to [`Quality::Auto`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Quality {
    #[serde(rename = "1440p")]
    P1440,
    #[serde(rename = "1080p")]
    P1080,
    #[serde(rename = "720p")]
    P720,
    #[serde(rename = "540p")]
    P540,
    #[serde(rename = "360p")]
    P360,
    /// The source's native resolution as reported by the API.
    #[default]
    #[serde(rename = "auto")]
    Auto,
}

impl Quality {
    pub const ALL: [Quality; 6] = [
        Quality::P1440,
        Quality::P1080,
        Quality::P720,
        Quality::P540,
        Quality::P360,
        Quality::Auto,
    ];

    /// Strict lookup, used where an unknown token must not be mistaken for a quality.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|q| q.label() == label)
    }

    /// Lenient lookup: unknown labels fall back to `Auto`.
    pub fn parse(label: &str) -> Self {
        Self::from_label(label).unwrap_or_default()
    }

    pub fn label(self) -> &'static str {
        match self {
            Quality::P1440 => "1440p",
            Quality::P1080 => "1080p",
            Quality::P720 => "720p",
            Quality::P540 => "540p",
            Quality::P360 => "360p",
            Quality::Auto => "auto",
        }
    }

    /// Pixel height, `None` for `Auto`.
    pub fn height(self) -> Option<u32> {
        match self {
            Quality::P1440 => Some(1440),
            Quality::P1080 => Some(1080),
            Quality::P720 => Some(720),
            Quality::P540 => Some(540),
            Quality::P360 => Some(360),
            Quality::Auto => None,
        }
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Height component of a `WxH` resolution string, e.g. `1080` for `1920x1080`.
pub fn resolution_height(resolution: &str) -> Option<u32> {
    resolution.rsplit('x').next()?.trim().parse().ok()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestEntry {
    pub url: String,
    pub duration_ms: u64,
}

/// Ordered segment list of one VOD. Entry order is playback order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    title: String,
    entries: Vec<ManifestEntry>,
}

impl Manifest {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            entries: Vec::new(),
        }
    }

    pub fn add(&mut self, url: impl Into<String>, duration_ms: u64) {
        self.entries.push(ManifestEntry {
            url: url.into(),
            duration_ms,
        });
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_duration_ms(&self) -> u64 {
        self.entries.iter().map(|e| e.duration_ms).sum()
    }
}
