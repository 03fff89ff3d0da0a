//! Audio output using cpal
//!
//! A dedicated thread owns the cpal stream; the async side talks to it
//! through a lock-free ring buffer plus a few atomics. The device callback
//! only pops frames, emits silence while paused, and performs the clear
//! requested by `halt()` (the callback owns the consumer half, so the clear
//! happens at the next callback period).

use crate::error::{Error, Result};
use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{BufferSize, SampleFormat, SampleRate, StreamConfig};
use ringbuf::{traits::*, HeapCons, HeapProd, HeapRb};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::resampler::OUTPUT_SAMPLE_RATE;

/// Ring capacity in samples (stereo interleaved): ~185ms at 44.1kHz.
const RING_CAPACITY: usize = 16384;

/// Poll interval while waiting for ring space or drain.
const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// Destination for decoded, rate-converted audio.
///
/// `write` may wait for buffer space; a concurrent [`halt`](AudioSink::halt)
/// makes it discard the remainder and return. `drain` resolves once the
/// output clock has consumed everything buffered.
#[async_trait]
pub trait AudioSink: Send + Sync {
    async fn write(&self, samples: &[f32]) -> Result<()>;
    async fn drain(&self) -> Result<()>;
    /// Suspend or resume the output clock without dropping buffered audio.
    fn set_paused(&self, paused: bool);
    /// Discard everything buffered, immediately and without playing it.
    fn halt(&self);
}

/// Shared flags between the async side and the device callback.
struct SinkShared {
    paused: AtomicBool,
    clear_requested: AtomicBool,
    /// Bumped by `halt()`; in-flight writes compare and bail out.
    halt_epoch: AtomicU64,
    shutdown: AtomicBool,
}

/// cpal-backed sink playing 44.1kHz interleaved stereo f32.
pub struct CpalSink {
    shared: Arc<SinkShared>,
    producer: Mutex<HeapProd<f32>>,
}

impl CpalSink {
    /// Open the default output device.
    pub fn open() -> Result<Self> {
        let ring = HeapRb::<f32>::new(RING_CAPACITY);
        let (producer, consumer) = ring.split();

        let shared = Arc::new(SinkShared {
            paused: AtomicBool::new(false),
            clear_requested: AtomicBool::new(false),
            halt_epoch: AtomicU64::new(0),
            shutdown: AtomicBool::new(false),
        });

        let (ready_tx, ready_rx) = std::sync::mpsc::channel();
        let thread_shared = Arc::clone(&shared);

        std::thread::Builder::new()
            .name("vox-audio-output".to_string())
            .spawn(move || run_output_thread(consumer, thread_shared, ready_tx))
            .map_err(|e| Error::Output(format!("Failed to spawn output thread: {e}")))?;

        match ready_rx.recv() {
            Ok(Ok(())) => {
                info!("Audio output opened at {}Hz stereo", OUTPUT_SAMPLE_RATE);
                Ok(Self {
                    shared,
                    producer: Mutex::new(producer),
                })
            }
            Ok(Err(e)) => Err(Error::Output(e)),
            Err(_) => Err(Error::Output("Output thread died during init".to_string())),
        }
    }
}

impl Drop for CpalSink {
    fn drop(&mut self) {
        self.shared.shutdown.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl AudioSink for CpalSink {
    async fn write(&self, samples: &[f32]) -> Result<()> {
        let epoch = self.shared.halt_epoch.load(Ordering::SeqCst);
        let mut offset = 0;

        while offset < samples.len() {
            if self.shared.halt_epoch.load(Ordering::SeqCst) != epoch {
                // Halted mid-write: the rest of this chunk is dead.
                return Ok(());
            }
            let pushed = self.producer.lock().unwrap().push_slice(&samples[offset..]);
            offset += pushed;
            if pushed == 0 {
                sleep(POLL_INTERVAL).await;
            }
        }
        Ok(())
    }

    async fn drain(&self) -> Result<()> {
        let epoch = self.shared.halt_epoch.load(Ordering::SeqCst);
        loop {
            if self.shared.halt_epoch.load(Ordering::SeqCst) != epoch {
                return Ok(());
            }
            let occupied = self.producer.lock().unwrap().occupied_len();
            if occupied == 0 {
                return Ok(());
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    fn set_paused(&self, paused: bool) {
        self.shared.paused.store(paused, Ordering::SeqCst);
    }

    fn halt(&self) {
        self.shared.halt_epoch.fetch_add(1, Ordering::SeqCst);
        self.shared.clear_requested.store(true, Ordering::SeqCst);
    }
}

/// Dedicated thread body: owns the cpal stream for its whole lifetime.
fn run_output_thread(
    consumer: HeapCons<f32>,
    shared: Arc<SinkShared>,
    ready_tx: std::sync::mpsc::Sender<std::result::Result<(), String>>,
) {
    let stream = match build_stream(consumer, Arc::clone(&shared)) {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready_tx.send(Err(format!("Failed to start stream: {e}")));
        return;
    }

    let _ = ready_tx.send(Ok(()));

    while !shared.shutdown.load(Ordering::SeqCst) {
        std::thread::sleep(Duration::from_millis(50));
    }
    debug!("Audio output thread shutting down");
    // Stream is dropped here, closing the device.
}

/// Build the output stream at the fixed working rate.
fn build_stream(
    mut consumer: HeapCons<f32>,
    shared: Arc<SinkShared>,
) -> std::result::Result<cpal::Stream, String> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| "No output device available".to_string())?;

    let supported = device
        .default_output_config()
        .map_err(|e| format!("Failed to get device config: {e}"))?;

    let config = StreamConfig {
        channels: 2,
        sample_rate: SampleRate(OUTPUT_SAMPLE_RATE),
        buffer_size: BufferSize::Default,
    };

    let err_fn = |e| warn!("Audio stream error: {}", e);

    let stream = match supported.sample_format() {
        SampleFormat::F32 => device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    if shared.clear_requested.swap(false, Ordering::SeqCst) {
                        consumer.clear();
                    }
                    if shared.paused.load(Ordering::SeqCst) {
                        data.fill(0.0);
                        return;
                    }
                    let popped = consumer.pop_slice(data);
                    // Underrun: pad with silence.
                    data[popped..].fill(0.0);
                },
                err_fn,
                None,
            )
            .map_err(|e| format!("Failed to build f32 stream: {e}"))?,
        SampleFormat::I16 => device
            .build_output_stream(
                &config,
                move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                    if shared.clear_requested.swap(false, Ordering::SeqCst) {
                        consumer.clear();
                    }
                    if shared.paused.load(Ordering::SeqCst) {
                        data.fill(0);
                        return;
                    }
                    for sample in data.iter_mut() {
                        let value = consumer.try_pop().unwrap_or(0.0).clamp(-1.0, 1.0);
                        *sample = (value * i16::MAX as f32) as i16;
                    }
                },
                err_fn,
                None,
            )
            .map_err(|e| format!("Failed to build i16 stream: {e}"))?,
        other => return Err(format!("Unsupported sample format: {other:?}")),
    };

    Ok(stream)
}
