// SPDX-License-Identifier: MPL-2.0
//! Per-identity playback engine.
//!
//! A [`PlaybackHandler`] owns the single decode loop for one image identity.
//! It counts subscribers, starts the loop lazily on the first subscription,
//! stops it cooperatively when the last subscriber leaves, and broadcasts
//! every decoded frame to all attached subscribers in decode order.
//!
//! The decode loop runs on a dedicated OS thread named after the identity,
//! so distinct identities decode fully in parallel while all work for one
//! identity stays serialized. Stopping is cooperative: unsubscribing sets a
//! flag that the loop observes at its next frame boundary. A handler whose
//! loop is still winding down signals a condition variable on halt, and a
//! fresh subscription waits on that signal before starting a new loop, so
//! at most one loop per identity ever runs.

use crate::decode::{Frame, FrameControl, FrameDecoder};
use crate::error::{Error, Result};
use crate::sequence::ImageSequence;
use std::fmt;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;

/// Frames buffered per subscriber before the oldest are dropped. Slow
/// subscribers skip to the newest frames; only the latest matters for
/// display.
const FRAME_CHANNEL_CAPACITY: usize = 16;

/// Sentinel for "no frame decoded yet this run".
const NO_FRAME: i64 = -1;

/// Callback invoked whenever the handler may have become collectable
/// (its decode loop halted, or its last subscriber left while no loop
/// was running). The registry installs its eviction check here.
pub(crate) type IdleHook = Box<dyn Fn() + Send + Sync>;

struct HandlerState {
    subscribers: usize,
    animating: bool,
    stop_requested: bool,
    last_frame_index: i64,
}

/// Playback engine for a single image identity.
///
/// Owned exclusively by the registry; subscribers hold a [`FrameStream`],
/// never the handler itself.
pub struct PlaybackHandler {
    sequence: Arc<dyn ImageSequence>,
    decoder: Arc<dyn FrameDecoder>,
    state: Mutex<HandlerState>,
    /// Signalled whenever the decode loop halts (`animating` flips false).
    halted: Condvar,
    frames: broadcast::Sender<Frame>,
    idle_hook: IdleHook,
}

impl PlaybackHandler {
    pub(crate) fn new(
        sequence: Arc<dyn ImageSequence>,
        decoder: Arc<dyn FrameDecoder>,
        idle_hook: IdleHook,
    ) -> Self {
        let (frames, _) = broadcast::channel(FRAME_CHANNEL_CAPACITY);
        Self {
            sequence,
            decoder,
            state: Mutex::new(HandlerState {
                subscribers: 0,
                animating: false,
                stop_requested: false,
                last_frame_index: NO_FRAME,
            }),
            halted: Condvar::new(),
            frames,
            idle_hook,
        }
    }

    /// The sharing identity this handler plays.
    pub fn identity(&self) -> &str {
        self.sequence.identity()
    }

    /// Number of currently attached subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.lock_state().subscribers
    }

    /// Whether the decode loop is currently running.
    pub fn is_animating(&self) -> bool {
        self.lock_state().animating
    }

    /// A poisoned state mutex means a decode thread panicked mid-update;
    /// the state itself is a handful of scalars that remain meaningful,
    /// so recover the guard rather than propagate the panic.
    fn lock_state(&self) -> MutexGuard<'_, HandlerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Attaches a subscriber and returns its frame stream.
    ///
    /// On the 0→1 transition this starts the decode loop. If a previous
    /// loop is still observing its stop, this blocks (briefly, at most one
    /// frame delay) until that loop has fully halted, then starts fresh.
    pub(crate) fn subscribe(self: &Arc<Self>) -> Result<FrameStream> {
        let (stream, first) = self.attach();
        if first {
            self.start_decode_loop()?;
        }
        Ok(stream)
    }

    /// Registers a subscriber without starting playback, returning its
    /// stream and whether this was the 0→1 transition.
    ///
    /// Never blocks beyond the state lock, so the registry can call it
    /// inside its map critical section; a handler with an attached
    /// subscriber is never evicted.
    pub(crate) fn attach(self: &Arc<Self>) -> (FrameStream, bool) {
        let mut state = self.lock_state();
        state.subscribers += 1;
        let first = state.subscribers == 1;

        // Created while holding the state lock: the decode loop cannot emit
        // a frame before this receiver exists, so subscribers see every
        // frame from their join point onward.
        let receiver = self.frames.subscribe();
        drop(state);

        let stream = FrameStream {
            receiver,
            _guard: SubscriberGuard {
                handler: Arc::clone(self),
            },
        };
        (stream, first)
    }

    /// Starts the decode loop after a 0→1 attach. If the previous loop is
    /// still observing its stop, waits until it has fully halted, then
    /// starts fresh; the wait lasts at most one frame delay.
    pub(crate) fn start_decode_loop(self: &Arc<Self>) -> Result<()> {
        let mut state = self.lock_state();
        while state.animating {
            state = self
                .halted
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        }

        state.stop_requested = false;
        state.last_frame_index = NO_FRAME;
        state.animating = true;

        let handler = Arc::clone(self);
        let spawned = std::thread::Builder::new()
            .name(decode_thread_name(self.identity()))
            .spawn(move || handler.run_decode_loop());

        if let Err(e) = spawned {
            state.animating = false;
            return Err(Error::Io(format!("failed to spawn decode thread: {e}")));
        }

        Ok(())
    }

    fn unsubscribe(&self) {
        let mut state = self.lock_state();
        state.subscribers = state.subscribers.saturating_sub(1);
        if state.subscribers > 0 {
            return;
        }

        if state.animating {
            // Cooperative stop: the loop observes this at its next frame
            // boundary and halts there.
            state.stop_requested = true;
        } else {
            // No loop is running (it already halted, or never started
            // because bytes were missing), so no halt will come along to
            // trigger collection; run the idle check now.
            drop(state);
            (self.idle_hook)();
        }
    }

    /// Body of the decode thread.
    fn run_decode_loop(self: Arc<Self>) {
        let identity = self.identity().to_owned();
        tracing::debug!(identity = %identity, "decode loop starting");

        match self.sequence.bytes() {
            Some(bytes) => {
                let result = self
                    .decoder
                    .animate(&bytes, &mut |index, frame| self.on_frame(index, frame));
                if let Err(e) = result {
                    tracing::warn!(identity = %identity, "decode failed: {e}");
                }
            }
            None => {
                tracing::debug!(identity = %identity, "no bytes available; nothing to decode");
            }
        }

        let mut state = self.lock_state();
        state.animating = false;
        state.stop_requested = false;
        state.last_frame_index = NO_FRAME;
        drop(state);

        self.halted.notify_all();
        (self.idle_hook)();
        tracing::debug!(identity = %identity, "decode loop halted");
    }

    /// Per-frame decode callback.
    ///
    /// Emits the frame only while subscribers remain, no stop is pending,
    /// and the frame index is continuous: the immediate successor of the
    /// last emitted index, the first frame of a run, or a wrap back to 0
    /// at the end of a loop. Anything else is treated as end-of-stream.
    fn on_frame(&self, index: usize, frame: Frame) -> FrameControl {
        let mut state = self.lock_state();

        let continuous = state.last_frame_index == NO_FRAME
            || index as i64 == state.last_frame_index + 1
            || index == 0;

        if state.subscribers == 0 || state.stop_requested || !continuous {
            if !continuous {
                tracing::debug!(
                    identity = %self.identity(),
                    index,
                    last = state.last_frame_index,
                    "frame index discontinuity; halting decode"
                );
            }
            return FrameControl::Halt;
        }

        state.last_frame_index = index as i64;
        drop(state);

        // Err means no receiver happens to be attached right now; the
        // subscriber count check above already gates emission, so a racing
        // disconnect is harmless.
        let _ = self.frames.send(frame);
        FrameControl::Continue
    }
}

impl fmt::Debug for PlaybackHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock_state();
        f.debug_struct("PlaybackHandler")
            .field("identity", &self.identity())
            .field("subscribers", &state.subscribers)
            .field("animating", &state.animating)
            .field("stop_requested", &state.stop_requested)
            .finish()
    }
}

/// OS thread names are length-limited on most platforms; keep a recognizable
/// prefix of the identity.
fn decode_thread_name(identity: &str) -> String {
    let short: String = identity.chars().take(24).collect();
    format!("flipbook-{short}")
}

/// A subscriber's handle on one identity's frame broadcast.
///
/// Dropping the stream is the unsubscribe operation; when the last stream
/// for an identity is dropped, its decode loop stops at the next frame
/// boundary and the handler becomes collectable.
pub struct FrameStream {
    receiver: broadcast::Receiver<Frame>,
    _guard: SubscriberGuard,
}

impl FrameStream {
    /// Waits for the next decoded frame.
    ///
    /// A subscriber that falls behind skips ahead to the newest frames;
    /// only the latest frame matters for display. When playback halts the
    /// stream drains whatever is buffered and then stays pending: no
    /// end-of-stream value is delivered, and views keep the last frame
    /// they rendered.
    pub async fn recv(&mut self) -> Option<Frame> {
        loop {
            match self.receiver.recv().await {
                Ok(frame) => return Some(frame),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::trace!(skipped, "subscriber lagged; skipping to newest frames");
                }
                // The guard keeps the handler, and with it the sender,
                // alive for as long as this stream exists.
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Returns the next frame if one is already buffered.
    pub fn try_recv(&mut self) -> Option<Frame> {
        use broadcast::error::TryRecvError;
        loop {
            match self.receiver.try_recv() {
                Ok(frame) => return Some(frame),
                Err(TryRecvError::Lagged(_)) => continue,
                Err(TryRecvError::Empty | TryRecvError::Closed) => return None,
            }
        }
    }
}

impl fmt::Debug for FrameStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FrameStream")
            .field("identity", &self._guard.handler.identity())
            .finish()
    }
}

struct SubscriberGuard {
    handler: Arc<PlaybackHandler>,
}

impl Drop for SubscriberGuard {
    fn drop(&mut self) {
        self.handler.unsubscribe();
    }
}
