// SPDX-License-Identifier: MPL-2.0
use std::fmt;

/// Crate-wide error type.
///
/// Playback failures never cross the frame stream to subscribers; these
/// errors surface only on the control paths (starting playback, decoding,
/// fetching bytes for a locator).
#[derive(Debug, Clone)]
pub enum Error {
    /// File or thread-spawn I/O failure.
    Io(String),

    /// The byte buffer could not be decoded as an animated image.
    Decode(String),

    /// Fetching bytes for a locator-based sequence failed.
    Fetch(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O Error: {}", e),
            Error::Decode(e) => write!(f, "Decode Error: {}", e),
            Error::Fetch(e) => write!(f, "Fetch Error: {}", e),
        }
    }
}

impl std::error::Error for Error {}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<image_rs::ImageError> for Error {
    fn from(err: image_rs::ImageError) -> Self {
        Error::Decode(err.to_string())
    }
}

impl From<webp_animation::Error> for Error {
    fn from(err: webp_animation::Error) -> Self {
        Error::Decode(format!("{:?}", err))
    }
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        Error::Fetch(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
