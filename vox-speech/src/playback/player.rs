//! Sequential audio chunk player
//!
//! Owns the single decode/output channel. Chunks play strictly in enqueue
//! order through one iterative dispatch loop; there is no recursive
//! completion chaining, so arbitrarily long sessions use constant stack.
//!
//! Interruption uses a monotonic generation counter: `stop()` and `reset()`
//! increment it, and every continuation captures the generation when it
//! starts and discards its result if the counter has moved. A chunk that
//! was mid-decode when `stop()` arrived therefore produces no playback and
//! no events.

use crate::audio::decoder::ChunkDecoder;
use crate::audio::output::AudioSink;
use crate::audio::resampler;
use crate::events::SpeechEvent;
use crate::playback::AudioChunk;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::broadcast;
use tracing::{debug, warn};

/// Player lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    /// No chunks queued or playing.
    Idle,
    /// The dispatch loop is feeding the output clock.
    Playing,
    /// The output clock is suspended; queue and active chunk are untouched.
    Paused,
}

impl std::fmt::Display for PlayerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PlayerState::Idle => write!(f, "idle"),
            PlayerState::Playing => write!(f, "playing"),
            PlayerState::Paused => write!(f, "paused"),
        }
    }
}

/// Sequential chunk player over a decoder and an output sink.
///
/// Clone-cheap handle; all clones share the same queue and state.
#[derive(Clone)]
pub struct AudioPlayer {
    inner: Arc<PlayerInner>,
}

struct PlayerInner {
    queue: Mutex<VecDeque<AudioChunk>>,
    state: Mutex<PlayerState>,
    /// Incremented by `stop()`/`reset()`; stale continuations compare
    /// against their captured value and bail out.
    generation: AtomicU64,
    decoder: Arc<dyn ChunkDecoder>,
    sink: Arc<dyn AudioSink>,
    events: broadcast::Sender<SpeechEvent>,
}

impl AudioPlayer {
    /// Open a player over the default output device with the symphonia
    /// decoder.
    pub fn open_default() -> crate::Result<Self> {
        let decoder = Arc::new(crate::audio::SymphoniaDecoder::new());
        let sink = Arc::new(crate::audio::CpalSink::open()?);
        Ok(Self::new(decoder, sink))
    }

    /// Create a player over the given decoder and sink.
    pub fn new(decoder: Arc<dyn ChunkDecoder>, sink: Arc<dyn AudioSink>) -> Self {
        let (events, _) = broadcast::channel(64);
        Self {
            inner: Arc::new(PlayerInner {
                queue: Mutex::new(VecDeque::new()),
                state: Mutex::new(PlayerState::Idle),
                generation: AtomicU64::new(0),
                decoder,
                sink,
                events,
            }),
        }
    }

    /// Subscribe to playback events (ended / chunk error).
    pub fn subscribe(&self) -> broadcast::Receiver<SpeechEvent> {
        self.inner.events.subscribe()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> PlayerState {
        *self.inner.state.lock().unwrap()
    }

    /// Number of chunks waiting behind the active one.
    pub fn queued(&self) -> usize {
        self.inner.queue.lock().unwrap().len()
    }

    /// Append a chunk; starts playback immediately when idle.
    pub fn queue_chunk(&self, chunk: AudioChunk) {
        let inner = &self.inner;
        inner.queue.lock().unwrap().push_back(chunk);

        let mut state = inner.state.lock().unwrap();
        if *state == PlayerState::Idle {
            *state = PlayerState::Playing;
            let generation = inner.generation.load(Ordering::SeqCst);
            let task = Arc::clone(inner);
            tokio::spawn(async move {
                task.dispatch(generation).await;
            });
        }
    }

    /// Suspend the output clock. Queue and active chunk are unaffected.
    pub fn pause(&self) {
        let mut state = self.inner.state.lock().unwrap();
        if *state == PlayerState::Playing {
            *state = PlayerState::Paused;
            self.inner.sink.set_paused(true);
            debug!("playback paused");
        }
    }

    /// Resume a paused output clock.
    pub fn resume(&self) {
        let mut state = self.inner.state.lock().unwrap();
        if *state == PlayerState::Paused {
            *state = PlayerState::Playing;
            self.inner.sink.set_paused(false);
            debug!("playback resumed");
        }
    }

    /// Interrupt playback: clear the queue, discard buffered audio and
    /// invalidate every in-flight continuation.
    ///
    /// Idempotent; safe to call from any state, including mid-decode.
    pub fn stop(&self) {
        let mut state = self.inner.state.lock().unwrap();
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        self.inner.queue.lock().unwrap().clear();
        self.inner.sink.halt();
        self.inner.sink.set_paused(false);
        *state = PlayerState::Idle;
        debug!("playback stopped");
    }

    /// Stop and restore a fresh, playable state for a new session.
    pub fn reset(&self) {
        self.stop();
    }
}

impl PlayerInner {
    /// Iterative dispatch loop: single guarded entry point for every chunk
    /// transition. Runs until the queue drains or the generation moves.
    async fn dispatch(self: Arc<Self>, generation: u64) {
        loop {
            if self.stale(generation) {
                return;
            }

            let chunk = self.queue.lock().unwrap().pop_front();
            let Some(chunk) = chunk else {
                match self.quiesce(generation).await {
                    Quiescence::Ended | Quiescence::Stale => return,
                    // A chunk arrived while the clock was draining.
                    Quiescence::Refilled => continue,
                }
            };

            let decoded = self.decoder.decode(&chunk.data).await;

            // A stop while decoding discards the result: no playback, no
            // callbacks for this chunk.
            if self.stale(generation) {
                return;
            }

            let decoded = match decoded {
                Ok(audio) => audio,
                Err(e) => {
                    warn!("chunk decode failed: {}", e);
                    let _ = self.events.send(SpeechEvent::ChunkError {
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            let samples = match resampler::to_output_rate(
                &decoded.samples,
                decoded.sample_rate,
                decoded.channels,
            ) {
                Ok(samples) => samples,
                Err(e) => {
                    warn!("chunk resample failed: {}", e);
                    let _ = self.events.send(SpeechEvent::ChunkError {
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            if let Err(e) = self.sink.write(&samples).await {
                if self.stale(generation) {
                    return;
                }
                warn!("sink write failed: {}", e);
                let _ = self.events.send(SpeechEvent::ChunkError {
                    error: e.to_string(),
                });
            }
        }
    }

    /// Queue drained: wait for the clock to consume buffered audio, then
    /// transition to idle and report the end of the session exactly once.
    ///
    /// The queue is re-checked under the state lock so a chunk enqueued
    /// during the drain is picked up by this loop instead of stranding
    /// behind an idle state.
    async fn quiesce(&self, generation: u64) -> Quiescence {
        if let Err(e) = self.sink.drain().await {
            warn!("sink drain failed: {}", e);
        }

        let outcome = {
            let mut state = self.state.lock().unwrap();
            if self.generation.load(Ordering::SeqCst) != generation {
                Quiescence::Stale
            } else if !self.queue.lock().unwrap().is_empty() {
                Quiescence::Refilled
            } else {
                *state = PlayerState::Idle;
                Quiescence::Ended
            }
        };

        if outcome == Quiescence::Ended {
            debug!("playback queue drained");
            let _ = self.events.send(SpeechEvent::PlaybackEnded);
        }
        outcome
    }

    fn stale(&self, generation: u64) -> bool {
        self.generation.load(Ordering::SeqCst) != generation
    }
}

/// Outcome of a drain-and-idle attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quiescence {
    /// Session over; the ended event was emitted.
    Ended,
    /// New chunks arrived during the drain; keep dispatching.
    Refilled,
    /// A stop invalidated this loop; no event.
    Stale,
}
