// SPDX-License-Identifier: MPL-2.0
//! Sources of animated-image bytes with a stable sharing identity.
//!
//! Two sequences with the same identity are treated as the same shareable
//! animation; the playback registry trusts the identity contract and never
//! validates it.

use iced::widget::image;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Something that can supply raw animated-image bytes under a stable identity.
pub trait ImageSequence: Send + Sync {
    /// Stable key, unique per logical image source. All playback sharing
    /// is keyed on this value.
    fn identity(&self) -> &str;

    /// The raw encoded animation. `None` means the sequence currently
    /// cannot supply data (missing file, failed fetch), in which case no
    /// decode is attempted.
    ///
    /// May block (e.g. a network fetch); only ever called from a playback
    /// decode thread, never from the UI thread.
    fn bytes(&self) -> Option<Arc<Vec<u8>>>;

    /// Fallback image shown when animation is disabled.
    fn placeholder(&self) -> Option<image::Handle> {
        None
    }
}

/// An animation held entirely in memory.
#[derive(Debug, Clone)]
pub struct MemorySequence {
    identity: String,
    bytes: Arc<Vec<u8>>,
    placeholder: Option<image::Handle>,
}

impl MemorySequence {
    pub fn new(identity: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            identity: identity.into(),
            bytes: Arc::new(bytes),
            placeholder: None,
        }
    }

    /// Sets the still image shown when animation is disabled.
    #[must_use]
    pub fn with_placeholder(mut self, placeholder: image::Handle) -> Self {
        self.placeholder = Some(placeholder);
        self
    }
}

impl ImageSequence for MemorySequence {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn bytes(&self) -> Option<Arc<Vec<u8>>> {
        Some(Arc::clone(&self.bytes))
    }

    fn placeholder(&self) -> Option<image::Handle> {
        self.placeholder.clone()
    }
}

/// Where a [`LocatorSequence`] fetches its bytes from.
#[derive(Debug, Clone)]
pub enum Locator {
    /// A file on disk, read with `std::fs`.
    Path(PathBuf),

    /// An HTTP(S) location, fetched with a blocking request.
    Url(String),
}

/// An animation fetched on demand from a path or URL.
///
/// Fetching happens synchronously inside `bytes()`, on the decode thread.
/// Fetch failures are logged and reported as missing data, which leaves the
/// viewer on its placeholder; no error crosses the frame stream.
#[derive(Debug, Clone)]
pub struct LocatorSequence {
    identity: String,
    locator: Locator,
    placeholder: Option<image::Handle>,
}

impl LocatorSequence {
    /// Creates a sequence reading from a file path. The identity defaults
    /// to the path itself.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        Self {
            identity: path.display().to_string(),
            locator: Locator::Path(path),
            placeholder: None,
        }
    }

    /// Creates a sequence fetching from a URL. The identity defaults to
    /// the URL itself.
    pub fn from_url(url: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            identity: url.clone(),
            locator: Locator::Url(url),
            placeholder: None,
        }
    }

    /// Overrides the sharing identity.
    #[must_use]
    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = identity.into();
        self
    }

    /// Sets the still image shown when animation is disabled.
    #[must_use]
    pub fn with_placeholder(mut self, placeholder: image::Handle) -> Self {
        self.placeholder = Some(placeholder);
        self
    }

    fn fetch(&self) -> crate::error::Result<Vec<u8>> {
        match &self.locator {
            Locator::Path(path) => Ok(std::fs::read(path)?),
            Locator::Url(url) => {
                let response = reqwest::blocking::get(url)?.error_for_status()?;
                Ok(response.bytes()?.to_vec())
            }
        }
    }
}

impl ImageSequence for LocatorSequence {
    fn identity(&self) -> &str {
        &self.identity
    }

    fn bytes(&self) -> Option<Arc<Vec<u8>>> {
        match self.fetch() {
            Ok(bytes) => Some(Arc::new(bytes)),
            Err(e) => {
                tracing::warn!(identity = %self.identity, "failed to fetch animation bytes: {e}");
                None
            }
        }
    }

    fn placeholder(&self) -> Option<image::Handle> {
        self.placeholder.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_sequence_supplies_bytes() {
        let sequence = MemorySequence::new("logo.gif", vec![1, 2, 3]);
        assert_eq!(sequence.identity(), "logo.gif");
        assert_eq!(sequence.bytes().unwrap().as_slice(), &[1, 2, 3]);
        assert!(sequence.placeholder().is_none());
    }

    #[test]
    fn memory_sequence_placeholder_roundtrip() {
        let placeholder = image::Handle::from_rgba(1, 1, vec![0, 0, 0, 0]);
        let sequence = MemorySequence::new("a", vec![]).with_placeholder(placeholder);
        assert!(sequence.placeholder().is_some());
    }

    #[test]
    fn path_sequence_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("anim.gif");
        std::fs::write(&path, b"GIF89a").unwrap();

        let sequence = LocatorSequence::from_path(&path);
        assert_eq!(sequence.identity(), path.display().to_string());
        assert_eq!(sequence.bytes().unwrap().as_slice(), b"GIF89a");
    }

    #[test]
    fn missing_file_reports_no_bytes() {
        let sequence = LocatorSequence::from_path("/nonexistent/anim.gif");
        assert!(sequence.bytes().is_none());
    }

    #[test]
    fn identity_can_be_overridden() {
        let sequence = LocatorSequence::from_url("https://example.com/a.gif")
            .with_identity("shared-key");
        assert_eq!(sequence.identity(), "shared-key");
    }
}
