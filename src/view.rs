// SPDX-License-Identifier: MPL-2.0
//! Iced view binding for shared animation playback.
//!
//! This is the thin presentation layer over the playback core: an iced
//! subscription that forwards decoded frames into the application's update
//! loop, and a view helper that renders the most recent frame (or the
//! sequence's placeholder when animation is disabled).

use crate::decode::Frame;
use crate::registry::AnimationRegistry;
use crate::sequence::ImageSequence;
use iced::futures::SinkExt;
use iced::stream;
use iced::widget::image;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// How a frame is fitted into the view's bounds. Presentation-only; has no
/// effect on decoding or sharing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentMode {
    /// Scale to fit entirely inside the bounds, preserving aspect ratio.
    #[default]
    Fit,

    /// Scale to cover the bounds, preserving aspect ratio and cropping.
    Fill,
}

impl ContentMode {
    /// The equivalent iced content fit.
    pub fn content_fit(self) -> iced::ContentFit {
        match self {
            ContentMode::Fit => iced::ContentFit::Contain,
            ContentMode::Fill => iced::ContentFit::Cover,
        }
    }
}

/// Per-view playback options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaybackOptions {
    /// When false the view never subscribes and shows the sequence's
    /// placeholder instead.
    pub animated: bool,

    /// How frames are fitted into the view bounds.
    pub content_mode: ContentMode,
}

impl Default for PlaybackOptions {
    fn default() -> Self {
        Self {
            animated: true,
            content_mode: ContentMode::Fit,
        }
    }
}

/// Messages emitted by the playback subscription.
///
/// When playback halts the subscription simply stops emitting; the view
/// keeps showing the last frame it rendered.
#[derive(Debug, Clone)]
pub enum FrameEvent {
    /// A new frame is ready; render it and discard the previous one.
    Frame(Frame),
}

/// Subscription ID for one view's playback stream.
/// Distinct views of the same identity need distinct sessions, otherwise
/// iced would collapse their subscriptions into one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct FlipbookId {
    identity: String,
    session: u64,
}

/// Data for one view's playback subscription. Hashes as its [`FlipbookId`]
/// only, so the captured handles don't affect the subscription's identity.
struct FlipbookWorker {
    id: FlipbookId,
    registry: AnimationRegistry,
    sequence: Arc<dyn ImageSequence>,
}

impl std::hash::Hash for FlipbookWorker {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

/// Creates a subscription that plays `sequence` and delivers its frames.
///
/// The subscription acquires the shared playback stream for the sequence's
/// identity when it starts and unsubscribes when iced drops it, so playback
/// for an identity runs exactly while at least one view subscribes to it.
/// `session_id` must be unique per view instance.
///
/// Callers with `animated == false` in their options should simply not run
/// this subscription and render the placeholder via [`view`].
pub fn frames(
    registry: &AnimationRegistry,
    sequence: Arc<dyn ImageSequence>,
    session_id: u64,
) -> iced::Subscription<FrameEvent> {
    let worker = FlipbookWorker {
        id: FlipbookId {
            identity: sequence.identity().to_owned(),
            session: session_id,
        },
        registry: registry.clone(),
        sequence,
    };

    iced::Subscription::run_with(worker, |worker| {
        let registry = worker.registry.clone();
        let sequence = worker.sequence.clone();

        stream::channel(
            16,
            move |mut output: iced::futures::channel::mpsc::Sender<FrameEvent>| async move {
                let mut frames = match registry.acquire_shared(sequence) {
                    Ok(frames) => frames,
                    Err(e) => {
                        tracing::warn!("animation playback failed to start: {e}");
                        return;
                    }
                };

                while let Some(frame) = frames.recv().await {
                    if output.send(FrameEvent::Frame(frame)).await.is_err() {
                        return;
                    }
                }
            },
        )
    })
}

/// Renders the most recent frame, falling back to the sequence's
/// placeholder, then to a blank image.
pub fn view<'a, Message: 'a>(
    frame: Option<&Frame>,
    sequence: &dyn ImageSequence,
    options: PlaybackOptions,
) -> iced::Element<'a, Message> {
    let handle = match frame {
        Some(frame) if options.animated => frame.handle(),
        _ => sequence.placeholder().unwrap_or_else(blank_handle),
    };

    iced::widget::Image::new(handle)
        .content_fit(options.content_mode.content_fit())
        .into()
}

/// 1×1 transparent image for sequences with no placeholder.
fn blank_handle() -> image::Handle {
    image::Handle::from_rgba(1, 1, vec![0, 0, 0, 0])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_animated_and_fitted() {
        let options = PlaybackOptions::default();
        assert!(options.animated);
        assert_eq!(options.content_mode, ContentMode::Fit);
    }

    #[test]
    fn content_mode_maps_to_iced_fit() {
        assert_eq!(ContentMode::Fit.content_fit(), iced::ContentFit::Contain);
        assert_eq!(ContentMode::Fill.content_fit(), iced::ContentFit::Cover);
    }

    #[test]
    fn options_roundtrip_through_serde() {
        let options = PlaybackOptions {
            animated: false,
            content_mode: ContentMode::Fill,
        };
        let json = serde_json::to_string(&options).unwrap();
        let back: PlaybackOptions = serde_json::from_str(&json).unwrap();
        assert_eq!(back, options);
    }

    #[test]
    fn distinct_sessions_have_distinct_ids() {
        let a = FlipbookId {
            identity: "x".into(),
            session: 1,
        };
        let b = FlipbookId {
            identity: "x".into(),
            session: 2,
        };
        assert_ne!(a, b);
    }
}
