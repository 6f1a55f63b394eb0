// SPDX-License-Identifier: MPL-2.0
//! GIF backend built on the `image` crate's animation decoder.

use super::{FrameData, MIN_FRAME_DELAY};
use crate::error::Result;
use image_rs::codecs::gif::GifDecoder;
use image_rs::AnimationDecoder;
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

/// Decodes every frame of a GIF into RGBA buffers with their delays.
pub(crate) fn decode_frames(bytes: &[u8]) -> Result<Vec<FrameData>> {
    let decoder = GifDecoder::new(Cursor::new(bytes))?;

    let mut frames = Vec::new();
    for frame in decoder.into_frames() {
        let frame = frame?;
        let delay = Duration::from(frame.delay()).max(MIN_FRAME_DELAY);
        let buffer = frame.into_buffer();
        let (width, height) = (buffer.width(), buffer.height());

        frames.push(FrameData {
            rgba: Arc::new(buffer.into_raw()),
            width,
            height,
            delay,
        });
    }

    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image_rs::codecs::gif::GifEncoder;
    use image_rs::{Delay, Rgba, RgbaImage};

    #[test]
    fn decodes_all_frames_with_delays() {
        let mut bytes = Vec::new();
        {
            let mut encoder = GifEncoder::new(&mut bytes);
            for i in 0..3u8 {
                let image = RgbaImage::from_pixel(2, 2, Rgba([i * 50, 10, 20, 255]));
                let frame =
                    image_rs::Frame::from_parts(image, 0, 0, Delay::from_numer_denom_ms(30, 1));
                encoder.encode_frame(frame).unwrap();
            }
        }

        let frames = decode_frames(&bytes).unwrap();
        assert_eq!(frames.len(), 3);
        for frame in &frames {
            assert_eq!(frame.width, 2);
            assert_eq!(frame.height, 2);
            assert_eq!(frame.rgba.len(), 2 * 2 * 4);
            assert_eq!(frame.delay, Duration::from_millis(30));
        }
    }

    #[test]
    fn rejects_garbage_bytes() {
        assert!(decode_frames(b"GIF89a but not really").is_err());
    }
}
