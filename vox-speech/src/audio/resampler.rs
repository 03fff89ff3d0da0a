//! Sample rate conversion using rubato
//!
//! The output clock runs at a fixed 44.1 kHz stereo; every decoded chunk is
//! converted here before it reaches the sink.

use crate::error::{Error, Result};
use rubato::{FastFixedIn, PolynomialDegree, Resampler as RubatoResampler};
use tracing::debug;

/// Fixed output sample rate for all playback
pub const OUTPUT_SAMPLE_RATE: u32 = 44100;

/// Convert decoded audio to interleaved stereo at [`OUTPUT_SAMPLE_RATE`].
///
/// Mono input is duplicated onto both channels. Synthesis output is mono or
/// stereo; anything wider is rejected.
pub fn to_output_rate(input: &[f32], input_rate: u32, channels: u16) -> Result<Vec<f32>> {
    if !(1..=2).contains(&channels) {
        return Err(Error::Resample(format!(
            "Unsupported channel count: {channels}"
        )));
    }
    if input.is_empty() {
        return Ok(Vec::new());
    }

    let resampled = if input_rate == OUTPUT_SAMPLE_RATE {
        input.to_vec()
    } else {
        debug!(
            "Resampling from {}Hz to {}Hz ({} channels)",
            input_rate, OUTPUT_SAMPLE_RATE, channels
        );

        let planar_input = deinterleave(input, channels);
        let input_frames = planar_input[0].len();

        let mut resampler = FastFixedIn::<f32>::new(
            OUTPUT_SAMPLE_RATE as f64 / input_rate as f64,
            1.0,
            PolynomialDegree::Septic,
            input_frames,
            channels as usize,
        )
        .map_err(|e| Error::Resample(format!("Failed to create resampler: {e}")))?;

        let planar_output = resampler
            .process(&planar_input, None)
            .map_err(|e| Error::Resample(format!("Resampling failed: {e}")))?;

        interleave(planar_output)
    };

    Ok(if channels == 1 {
        mono_to_stereo(&resampled)
    } else {
        resampled
    })
}

/// Convert interleaved samples to planar format.
fn deinterleave(samples: &[f32], channels: u16) -> Vec<Vec<f32>> {
    let num_channels = channels as usize;
    let num_frames = samples.len() / num_channels;

    let mut planar = vec![Vec::with_capacity(num_frames); num_channels];
    for frame_idx in 0..num_frames {
        for (ch_idx, channel) in planar.iter_mut().enumerate() {
            channel.push(samples[frame_idx * num_channels + ch_idx]);
        }
    }
    planar
}

/// Convert planar samples to interleaved format.
fn interleave(planar: Vec<Vec<f32>>) -> Vec<f32> {
    if planar.is_empty() {
        return Vec::new();
    }

    let num_channels = planar.len();
    let num_frames = planar[0].len();
    let mut interleaved = Vec::with_capacity(num_frames * num_channels);

    for frame_idx in 0..num_frames {
        for channel in planar.iter().take(num_channels) {
            interleaved.push(channel[frame_idx]);
        }
    }
    interleaved
}

/// Duplicate a mono signal onto two interleaved channels.
fn mono_to_stereo(mono: &[f32]) -> Vec<f32> {
    let mut stereo = Vec::with_capacity(mono.len() * 2);
    for &sample in mono {
        stereo.push(sample);
        stereo.push(sample);
    }
    stereo
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_rate_stereo_passes_through() {
        let input = vec![0.1, 0.2, 0.3, 0.4];
        let output = to_output_rate(&input, OUTPUT_SAMPLE_RATE, 2).unwrap();
        assert_eq!(output, input);
    }

    #[test]
    fn same_rate_mono_is_upmixed() {
        let input = vec![0.5, -0.5];
        let output = to_output_rate(&input, OUTPUT_SAMPLE_RATE, 1).unwrap();
        assert_eq!(output, vec![0.5, 0.5, -0.5, -0.5]);
    }

    #[test]
    fn resampling_changes_frame_count_proportionally() {
        // 22050 Hz mono, 2205 frames = 100ms
        let input: Vec<f32> = (0..2205)
            .map(|i| (i as f32 / 22050.0 * 440.0 * 2.0 * std::f32::consts::PI).sin())
            .collect();
        let output = to_output_rate(&input, 22050, 1).unwrap();

        // Stereo at double the rate: about 4x the samples.
        let out_frames = output.len() / 2;
        let expected = 2205 * 2;
        let tolerance = expected / 10;
        assert!(
            (out_frames as i64 - expected as i64).unsigned_abs() as usize <= tolerance,
            "got {out_frames} frames, expected about {expected}"
        );
    }

    #[test]
    fn too_many_channels_rejected() {
        let result = to_output_rate(&[0.0; 12], 44100, 6);
        assert!(matches!(result, Err(Error::Resample(_))));
    }

    #[test]
    fn empty_input_yields_empty_output() {
        assert!(to_output_rate(&[], 22050, 1).unwrap().is_empty());
    }

    #[test]
    fn deinterleave_splits_channels() {
        let interleaved = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let planar = deinterleave(&interleaved, 2);
        assert_eq!(planar[0], vec![1.0, 3.0, 5.0]);
        assert_eq!(planar[1], vec![2.0, 4.0, 6.0]);
    }

    #[test]
    fn interleave_round_trips() {
        let planar = vec![vec![1.0, 3.0], vec![2.0, 4.0]];
        assert_eq!(interleave(planar), vec![1.0, 2.0, 3.0, 4.0]);
    }
}
