//! Playback engine and chunk queue

pub mod player;

pub use player::{AudioPlayer, PlayerState};

/// One synthesized audio chunk, still encoded.
///
/// Ownership transfers to the player on enqueue; the queue is the sole
/// owner until the chunk is played or discarded by `stop()`.
#[derive(Debug, Clone)]
pub struct AudioChunk {
    pub data: Vec<u8>,
}

impl AudioChunk {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }
}
