//! Audio chunk decoder using symphonia
//!
//! Decodes one in-memory encoded chunk (WAV, MP3, FLAC) to interleaved f32
//! PCM. Each chunk is a complete, self-contained encoded stream as returned
//! by the synthesis boundary.

use crate::error::{Error, Result};
use async_trait::async_trait;
use std::io::Cursor;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::{debug, warn};

/// Decoded PCM audio for one chunk.
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// Interleaved samples, -1.0 to 1.0.
    pub samples: Vec<f32>,
    /// Source sample rate (before resampling).
    pub sample_rate: u32,
    /// Source channel count (1 = mono, 2 = stereo).
    pub channels: u16,
}

impl DecodedAudio {
    /// Number of frames (samples per channel).
    pub fn frames(&self) -> usize {
        if self.channels == 0 {
            0
        } else {
            self.samples.len() / self.channels as usize
        }
    }
}

/// Decodes one encoded audio chunk to PCM.
///
/// The seam exists so the playback engine can be exercised without real
/// codec work; production uses [`SymphoniaDecoder`].
#[async_trait]
pub trait ChunkDecoder: Send + Sync {
    async fn decode(&self, data: &[u8]) -> Result<DecodedAudio>;
}

/// Symphonia-backed chunk decoder.
pub struct SymphoniaDecoder;

impl SymphoniaDecoder {
    pub fn new() -> Self {
        Self
    }
}

impl Default for SymphoniaDecoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChunkDecoder for SymphoniaDecoder {
    async fn decode(&self, data: &[u8]) -> Result<DecodedAudio> {
        let owned = data.to_vec();
        // Codec work is CPU-bound; keep it off the async workers.
        tokio::task::spawn_blocking(move || decode_bytes(owned))
            .await
            .map_err(|e| Error::Decode(format!("decode task failed: {e}")))?
    }
}

/// Decode a complete encoded stream held in memory.
fn decode_bytes(data: Vec<u8>) -> Result<DecodedAudio> {
    let cursor = Cursor::new(data);
    let mss = MediaSourceStream::new(Box::new(cursor), Default::default());

    let probed = symphonia::default::get_probe()
        .format(
            &Hint::new(),
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| Error::Decode(format!("Failed to probe format: {e}")))?;

    let mut format = probed.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| Error::Decode("No audio track found".to_string()))?;

    let track_id = track.id;
    let codec_params = track.codec_params.clone();

    let sample_rate = codec_params
        .sample_rate
        .ok_or_else(|| Error::Decode("Sample rate not found".to_string()))?;

    let channels = codec_params
        .channels
        .map(|c| c.count() as u16)
        .ok_or_else(|| Error::Decode("Channel count not found".to_string()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| Error::Decode(format!("Failed to create decoder: {e}")))?;

    let mut samples = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => {
                warn!("Error reading packet: {}", e);
                break;
            }
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                if sample_buf.is_none() {
                    let spec = *decoded.spec();
                    sample_buf = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
                }
                if let Some(buf) = sample_buf.as_mut() {
                    buf.copy_interleaved_ref(decoded);
                    samples.extend_from_slice(buf.samples());
                }
            }
            Err(e) => {
                warn!("Decode error: {}", e);
                continue;
            }
        }
    }

    if samples.is_empty() {
        return Err(Error::Decode("Chunk contained no audio".to_string()));
    }

    debug!(
        "Decoded {} samples ({} frames) at {}Hz, {} channels",
        samples.len(),
        samples.len() / channels.max(1) as usize,
        sample_rate,
        channels
    );

    Ok(DecodedAudio {
        samples,
        sample_rate,
        channels,
    })
}
