// SPDX-License-Identifier: MPL-2.0
//! `iced_flipbook` plays animated images (GIF, animated WebP) inside an
//! Iced UI, sharing one decode pipeline per image identity.
//!
//! Any number of views can show the same animation at once: the first
//! subscriber to an identity starts a decode loop on a dedicated background
//! thread, every frame is broadcast to all current subscribers, and the
//! loop stops and the per-identity state is collected once the last
//! subscriber leaves. At most one decode loop ever runs per identity.
//!
//! The building blocks, bottom up:
//!
//! - [`sequence::ImageSequence`] supplies raw animation bytes under a
//!   stable identity (in-memory, file path, or URL).
//! - [`decode::FrameDecoder`] turns bytes into paced per-frame callbacks.
//! - [`playback::PlaybackHandler`] runs one decode loop per identity and
//!   broadcasts frames to its subscribers.
//! - [`registry::AnimationRegistry`] maps identity to handler, creating
//!   handlers lazily and collecting them when idle.
//! - [`view`] bridges a frame stream into an iced subscription and renders
//!   the latest frame.

#![doc(html_root_url = "https://docs.rs/iced_flipbook/0.1.0")]

pub mod decode;
pub mod error;
pub mod playback;
pub mod registry;
pub mod sequence;
pub mod view;

pub use decode::{Frame, FrameControl, FrameDecoder, SniffingDecoder};
pub use error::{Error, Result};
pub use playback::{FrameStream, PlaybackHandler};
pub use registry::AnimationRegistry;
pub use sequence::{ImageSequence, Locator, LocatorSequence, MemorySequence};
pub use view::{ContentMode, FrameEvent, PlaybackOptions};
