// SPDX-License-Identifier: MPL-2.0
//! Animated WebP backend using the `webp-animation` crate.
//!
//! `webp-animation` wraps Google's libwebp, which reports per-frame
//! timestamps rather than delays; `timestamp(i)` is when frame `i` ends,
//! so each delay is the difference from the previous timestamp.

use super::{FrameData, MIN_FRAME_DELAY};
use crate::error::Result;
use std::sync::Arc;
use std::time::Duration;

/// Decodes every frame of an animated WebP into RGBA buffers with delays.
pub(crate) fn decode_frames(bytes: &[u8]) -> Result<Vec<FrameData>> {
    let decoder = webp_animation::Decoder::new(bytes)?;
    let (width, height) = decoder.dimensions();

    let mut frames = Vec::new();
    let mut prev_timestamp_ms = 0i32;
    for frame in decoder {
        let timestamp_ms = frame.timestamp();
        let delay_ms = (timestamp_ms - prev_timestamp_ms).max(0) as u64;
        prev_timestamp_ms = timestamp_ms;

        frames.push(FrameData {
            rgba: Arc::new(frame.data().to_vec()),
            width,
            height,
            delay: Duration::from_millis(delay_ms).max(MIN_FRAME_DELAY),
        });
    }

    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_garbage_bytes() {
        assert!(decode_frames(b"RIFF....WEBP but not really").is_err());
    }
}
