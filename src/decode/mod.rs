// SPDX-License-Identifier: MPL-2.0
//! Frame decoding for animated images (GIF, animated WebP).
//!
//! The decoder walks the animation frame by frame, invoking a synchronous
//! per-frame callback with the decoder's own pacing: each frame is delivered,
//! then the decoder sleeps for that frame's delay before delivering the next.
//! Frame indices increase strictly by one and wrap back to 0 at the end of
//! a loop. The callback's return value is the backpressure signal: returning
//! [`FrameControl::Halt`] stops the decoder at that frame boundary.

mod gif;
mod webp;

use crate::error::{Error, Result};
use iced::widget::image;
use std::sync::Arc;
use std::time::Duration;

/// Minimum per-frame delay. Malformed animations declare a zero delay;
/// clamping keeps the pacing loop from spinning.
pub const MIN_FRAME_DELAY: Duration = Duration::from_millis(10);

/// One decoded frame, ready for display.
///
/// Pixel data is shared behind an `Arc`, so cloning a frame (for broadcast
/// to multiple subscribers) is cheap.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Position of this frame within the animation (0-based, wraps per loop).
    pub index: usize,

    /// RGBA pixel data (width × height × 4 bytes).
    pub rgba: Arc<Vec<u8>>,

    /// Frame width in pixels.
    pub width: u32,

    /// Frame height in pixels.
    pub height: u32,

    /// How long this frame should stay on screen.
    pub delay: Duration,
}

impl Frame {
    /// Returns an iced image handle for this frame.
    pub fn handle(&self) -> image::Handle {
        image::Handle::from_rgba(self.width, self.height, self.rgba.to_vec())
    }

    /// Returns the total pixel-data size in bytes.
    pub fn size_bytes(&self) -> usize {
        self.rgba.len()
    }
}

/// Signal returned by the per-frame callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameControl {
    /// Keep decoding; deliver the next frame after this frame's delay.
    Continue,

    /// Stop decoding at this frame boundary.
    Halt,
}

/// A source of paced, per-frame callbacks for one animation.
///
/// This is the seam between the playback engine and the actual decoding
/// backend; tests substitute scripted implementations to exercise the
/// playback guards.
pub trait FrameDecoder: Send + Sync {
    /// Decodes `bytes` and invokes `on_frame` once per frame, in index order,
    /// wrapping to 0 at the end of each loop, until the callback halts.
    ///
    /// Blocks for the duration of playback; callers run it on a dedicated
    /// thread.
    fn animate(
        &self,
        bytes: &[u8],
        on_frame: &mut dyn FnMut(usize, Frame) -> FrameControl,
    ) -> Result<()>;
}

/// Pixel data for one frame as produced by a format backend.
pub(crate) struct FrameData {
    pub rgba: Arc<Vec<u8>>,
    pub width: u32,
    pub height: u32,
    pub delay: Duration,
}

/// Animated image formats recognized by magic bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Format {
    Gif,
    Webp,
}

/// Identifies the animation format from the first bytes of the buffer.
fn sniff_format(bytes: &[u8]) -> Option<Format> {
    if bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a") {
        return Some(Format::Gif);
    }
    if bytes.len() >= 12 && &bytes[0..4] == b"RIFF" && &bytes[8..12] == b"WEBP" {
        return Some(Format::Webp);
    }
    None
}

/// Decoder that dispatches on the buffer's magic bytes, so callers never
/// declare the format up front.
///
/// All frames are decoded into memory up front (animated images are short),
/// then replayed in an endless paced loop until the callback halts.
#[derive(Debug, Default)]
pub struct SniffingDecoder;

impl FrameDecoder for SniffingDecoder {
    fn animate(
        &self,
        bytes: &[u8],
        on_frame: &mut dyn FnMut(usize, Frame) -> FrameControl,
    ) -> Result<()> {
        let frames = match sniff_format(bytes) {
            Some(Format::Gif) => gif::decode_frames(bytes)?,
            Some(Format::Webp) => webp::decode_frames(bytes)?,
            None => {
                return Err(Error::Decode(
                    "unrecognized animated image format".to_string(),
                ))
            }
        };

        if frames.is_empty() {
            return Err(Error::Decode("animation contains no frames".to_string()));
        }

        loop {
            for (index, data) in frames.iter().enumerate() {
                let frame = Frame {
                    index,
                    rgba: Arc::clone(&data.rgba),
                    width: data.width,
                    height: data.height,
                    delay: data.delay,
                };

                if on_frame(index, frame) == FrameControl::Halt {
                    return Ok(());
                }

                std::thread::sleep(data.delay);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image_rs::codecs::gif::{GifEncoder, Repeat};
    use image_rs::{Delay, Rgba, RgbaImage};

    /// Encodes an in-memory GIF with `count` solid-color frames.
    fn encode_test_gif(count: u8, delay_ms: u32) -> Vec<u8> {
        let mut bytes = Vec::new();
        {
            let mut encoder = GifEncoder::new(&mut bytes);
            encoder.set_repeat(Repeat::Infinite).unwrap();
            for i in 0..count {
                let image = RgbaImage::from_pixel(4, 4, Rgba([i * 40, 0, 0, 255]));
                let frame = image_rs::Frame::from_parts(
                    image,
                    0,
                    0,
                    Delay::from_numer_denom_ms(delay_ms, 1),
                );
                encoder.encode_frame(frame).unwrap();
            }
        }
        bytes
    }

    #[test]
    fn sniffs_gif_magic() {
        assert_eq!(sniff_format(b"GIF89a-rest"), Some(Format::Gif));
        assert_eq!(sniff_format(b"GIF87a-rest"), Some(Format::Gif));
    }

    #[test]
    fn sniffs_webp_magic() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"RIFF");
        bytes.extend_from_slice(&[0, 0, 0, 0]);
        bytes.extend_from_slice(b"WEBP");
        assert_eq!(sniff_format(&bytes), Some(Format::Webp));
    }

    #[test]
    fn rejects_unknown_magic() {
        assert_eq!(sniff_format(b"\x89PNG\r\n\x1a\n"), None);
        assert_eq!(sniff_format(b""), None);
    }

    #[test]
    fn animate_rejects_unknown_format() {
        let result = SniffingDecoder.animate(b"not an animation", &mut |_, _| {
            panic!("callback must not run for undecodable bytes")
        });
        assert!(matches!(result, Err(Error::Decode(_))));
    }

    #[test]
    fn animate_loops_gif_frames_in_order() {
        let bytes = encode_test_gif(3, 10);

        let mut seen = Vec::new();
        SniffingDecoder
            .animate(&bytes, &mut |index, frame| {
                assert_eq!(index, frame.index);
                assert_eq!(frame.width, 4);
                assert_eq!(frame.height, 4);
                seen.push(index);
                if seen.len() == 5 {
                    FrameControl::Halt
                } else {
                    FrameControl::Continue
                }
            })
            .unwrap();

        // Three frames, then the loop wraps back to index 0.
        assert_eq!(seen, vec![0, 1, 2, 0, 1]);
    }

    #[test]
    fn frames_carry_distinct_pixels() {
        let bytes = encode_test_gif(2, 10);

        let mut first_pixels = Vec::new();
        SniffingDecoder
            .animate(&bytes, &mut |index, frame| {
                first_pixels.push(frame.rgba[0]);
                if index == 1 {
                    FrameControl::Halt
                } else {
                    FrameControl::Continue
                }
            })
            .unwrap();

        assert_eq!(first_pixels.len(), 2);
        assert_ne!(first_pixels[0], first_pixels[1]);
    }

    #[test]
    fn zero_delay_is_clamped() {
        let bytes = encode_test_gif(2, 0);

        SniffingDecoder
            .animate(&bytes, &mut |_, frame| {
                assert!(frame.delay >= MIN_FRAME_DELAY);
                FrameControl::Halt
            })
            .unwrap();
    }

    #[test]
    fn frame_handle_and_size() {
        let frame = Frame {
            index: 0,
            rgba: Arc::new(vec![0u8; 4 * 4 * 4]),
            width: 4,
            height: 4,
            delay: Duration::from_millis(20),
        };
        assert_eq!(frame.size_bytes(), 64);
        let _handle = frame.handle();
    }
}
