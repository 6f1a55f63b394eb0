// SPDX-License-Identifier: MPL-2.0
//! The process-wide map from image identity to playback handler.
//!
//! [`AnimationRegistry`] is an explicit shared service rather than a hidden
//! global: an application constructs one instance and hands clones of the
//! handle to every view that plays animations. All clones share the same
//! map, which is what guarantees at most one decode loop per identity.
//!
//! Handlers are created on first acquire of a new identity and collected
//! once they have zero subscribers and their decode loop has fully halted.
//! The collection check runs whenever a loop halts, and also when the last
//! subscriber of a handler whose loop never started detaches, so identities
//! with missing bytes do not linger.

use crate::decode::{FrameDecoder, SniffingDecoder};
use crate::error::Result;
use crate::playback::{FrameStream, PlaybackHandler};
use crate::sequence::ImageSequence;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

/// Shared handle to the identity → handler map.
///
/// Cloning is cheap; all clones refer to the same registry.
#[derive(Clone)]
pub struct AnimationRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    handlers: Mutex<HashMap<String, Arc<PlaybackHandler>>>,
    decoder: Arc<dyn FrameDecoder>,
}

impl RegistryInner {
    fn lock_handlers(&self) -> MutexGuard<'_, HashMap<String, Arc<PlaybackHandler>>> {
        self.handlers.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Removes the handler if it has fully stopped with no subscribers.
    fn evict_if_idle(&self, identity: &str) {
        let mut handlers = self.lock_handlers();
        let idle = handlers
            .get(identity)
            .is_some_and(|handler| handler.subscriber_count() == 0 && !handler.is_animating());
        if idle {
            handlers.remove(identity);
            tracing::debug!(identity, "evicted idle playback handler");
        }
    }
}

impl AnimationRegistry {
    /// Creates a registry using the default format-sniffing decoder.
    pub fn new() -> Self {
        Self::with_decoder(Arc::new(SniffingDecoder))
    }

    /// Creates a registry with a custom decoder backend.
    pub fn with_decoder(decoder: Arc<dyn FrameDecoder>) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                handlers: Mutex::new(HashMap::new()),
                decoder,
            }),
        }
    }

    /// Subscribes to the animation for `sequence`'s identity, creating the
    /// playback handler on first use and reusing it otherwise.
    ///
    /// The returned stream yields decoded frames until it is dropped;
    /// dropping it is the unsubscribe operation.
    pub fn acquire<S: ImageSequence + 'static>(&self, sequence: S) -> Result<FrameStream> {
        self.acquire_shared(Arc::new(sequence))
    }

    /// [`acquire`](Self::acquire) for a sequence that is already shared.
    pub fn acquire_shared(&self, sequence: Arc<dyn ImageSequence>) -> Result<FrameStream> {
        let identity = sequence.identity().to_owned();

        let (handler, stream, first) = {
            let mut handlers = self.inner.lock_handlers();

            let handler = match handlers.get(&identity) {
                Some(handler) => Arc::clone(handler),
                None => {
                    let handler = Arc::new(PlaybackHandler::new(
                        Arc::clone(&sequence),
                        Arc::clone(&self.inner.decoder),
                        self.idle_hook(&identity),
                    ));
                    handlers.insert(identity.clone(), Arc::clone(&handler));
                    tracing::debug!(identity = %identity, "created playback handler");
                    handler
                }
            };

            // Attaching inside the critical section pins the handler: a
            // halting decode loop's eviction check runs after this lock is
            // released and sees the new subscriber. Attach never blocks, so
            // the map lock is held only briefly.
            let (stream, first) = handler.attach();
            (handler, stream, first)
        };

        // Waiting out a pending stop can last up to one frame delay; it
        // happens outside the map lock so acquires for other identities
        // never stall behind a restart of this one.
        if first {
            if let Err(e) = handler.start_decode_loop() {
                // Dropping the stream detaches the subscriber, which lets
                // the idle hook evict the now-unused handler.
                drop(stream);
                return Err(e);
            }
        }

        Ok(stream)
    }

    /// Number of identities with a live handler.
    pub fn len(&self) -> usize {
        self.inner.lock_handlers().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether a handler currently exists for `identity`.
    pub fn contains(&self, identity: &str) -> bool {
        self.inner.lock_handlers().contains_key(identity)
    }

    /// Eviction callback installed into each handler; holds the registry
    /// weakly so a dropped registry never keeps handlers alive.
    fn idle_hook(&self, identity: &str) -> Box<dyn Fn() + Send + Sync> {
        let registry: Weak<RegistryInner> = Arc::downgrade(&self.inner);
        let identity = identity.to_owned();
        Box::new(move || {
            if let Some(registry) = registry.upgrade() {
                registry.evict_if_idle(&identity);
            }
        })
    }
}

impl Default for AnimationRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for AnimationRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AnimationRegistry")
            .field("handlers", &self.len())
            .finish()
    }
}
