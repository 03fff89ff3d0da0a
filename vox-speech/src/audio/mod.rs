//! Audio decode, resample and output

pub mod decoder;
pub mod output;
pub mod resampler;

pub use decoder::{ChunkDecoder, DecodedAudio, SymphoniaDecoder};
pub use output::{AudioSink, CpalSink};
pub use resampler::OUTPUT_SAMPLE_RATE;
