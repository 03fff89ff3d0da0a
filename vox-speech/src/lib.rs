//! # Vox Speech Engine (vox-speech)
//!
//! Client-side speech pipeline: decides where streamed text is cut into
//! speakable chunks, then decodes and plays the synthesized audio for those
//! chunks strictly in order.
//!
//! **Purpose:** Buffer incremental assistant text into prosody-friendly
//! chunks, and own the single audio output channel so that queued audio
//! chunks play back-to-back, survive decode failures, and can be
//! interrupted at any moment without stale continuations firing.

pub mod audio;
pub mod chunker;
pub mod error;
pub mod events;
pub mod playback;

pub use chunker::{TextBuffer, TextChunk};
pub use error::{Error, Result};
pub use events::SpeechEvent;
pub use playback::{AudioChunk, AudioPlayer, PlayerState};
