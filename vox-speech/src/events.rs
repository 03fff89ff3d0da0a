//! Playback event types
//!
//! The player reports session milestones over a broadcast channel instead
//! of stored callbacks; subscribers receive each event at most once per
//! emission.

/// Events emitted by [`crate::AudioPlayer`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechEvent {
    /// The queue drained and the output clock consumed everything.
    ///
    /// Emitted exactly once per quiescence; never emitted for a session
    /// that was interrupted by `stop()`.
    PlaybackEnded,

    /// One chunk failed to decode or play.
    ///
    /// Playback continues with the next queued chunk; an empty queue after
    /// a failure still ends the session via [`SpeechEvent::PlaybackEnded`].
    ChunkError { error: String },
}
