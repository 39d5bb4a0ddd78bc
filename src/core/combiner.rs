//! Merges same-role stems into one track.
//!
//! Inputs are a set: duplicates are ignored and paths are sorted before they
//! are decoded, so every permutation of the same inputs produces the same
//! bytes. Inputs are aligned before combining: resampled to the highest sample
//! rate present, mono widened to the widest layout, and truncated to the
//! shortest length.

use ndarray::{Array2, Array3, ArrayView1, Axis};
use num_complex::Complex32;
use rayon::prelude::*;
use std::{
    collections::BTreeSet,
    fs,
    path::{Path, PathBuf},
};
use tracing::{debug, info, warn};

use crate::{
    core::{
        audio::{read_audio, write_audio},
        dsp::{
            deinterleave, interleave, istft_centered, resample, stft_centered, widen_mono,
            SPECTRAL_HOP, SPECTRAL_N_FFT,
        },
    },
    error::{EnsembleError, Result},
    types::{AudioData, CombinationMethod},
};

/// Combines the audio files in `paths` into `output_path`, encoded according
/// to its extension.
pub fn combine<P: AsRef<Path>>(
    paths: &[P],
    method: CombinationMethod,
    output_path: &Path,
) -> Result<PathBuf> {
    let inputs: BTreeSet<PathBuf> = paths.iter().map(|p| p.as_ref().to_path_buf()).collect();
    if inputs.is_empty() {
        return Err(EnsembleError::combination("no input stems"));
    }
    let inputs: Vec<PathBuf> = inputs.into_iter().collect();

    info!(
        "Combining {} stems with {} into {:?}",
        inputs.len(),
        method,
        output_path
    );

    let decoded: Vec<AudioData> = inputs
        .par_iter()
        .map(|p| {
            read_audio(p).map_err(|e| {
                EnsembleError::combination(format!("failed to read {:?}: {:#}", p, e))
            })
        })
        .collect::<Result<_>>()?;

    let combined = combine_audio(decoded, method)?;

    if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    write_audio(output_path, &combined).map_err(|e| {
        EnsembleError::combination(format!("failed to write {:?}: {:#}", output_path, e))
    })?;

    Ok(output_path.to_path_buf())
}

/// Combines already-decoded inputs. Input order is significant only through
/// floating-point summation order; [`combine`] fixes it by sorting paths.
pub fn combine_audio(inputs: Vec<AudioData>, method: CombinationMethod) -> Result<AudioData> {
    let aligned = align(inputs)?;
    let (n_inputs, channels, frames) = aligned.stack.dim();
    debug!(
        "Aligned {} inputs: {} channels, {} frames at {} Hz",
        n_inputs, channels, frames, aligned.sample_rate
    );

    let planar: Vec<Vec<f32>> = if method.is_spectral() {
        combine_spectral(&aligned.stack, method)
    } else {
        combine_wave(&aligned.stack, method)
            .outer_iter()
            .map(|ch| ch.to_vec())
            .collect()
    };

    Ok(AudioData {
        samples: interleave(&planar),
        sample_rate: aligned.sample_rate,
        channels: channels as u16,
    })
}

struct Aligned {
    /// `[input, channel, frame]`
    stack: Array3<f32>,
    sample_rate: u32,
}

fn align(inputs: Vec<AudioData>) -> Result<Aligned> {
    if inputs.is_empty() {
        return Err(EnsembleError::combination("no input stems"));
    }

    let sample_rate = inputs.iter().map(|a| a.sample_rate).max().unwrap_or(0);
    let channels = inputs.iter().map(|a| a.channels).max().unwrap_or(0) as usize;
    if sample_rate == 0 || channels == 0 {
        return Err(EnsembleError::combination("input has no audio layout"));
    }

    let mut planar_inputs = Vec::with_capacity(inputs.len());
    for audio in inputs {
        let audio = if audio.sample_rate != sample_rate {
            warn!(
                "Resampling stem from {} Hz to {} Hz before combining",
                audio.sample_rate, sample_rate
            );
            resample(&audio, sample_rate)
                .map_err(|e| EnsembleError::combination(format!("resampling failed: {e:#}")))?
        } else {
            audio
        };

        if audio.channels as usize != channels && audio.channels != 1 {
            return Err(EnsembleError::combination(format!(
                "incompatible channel layouts: {} vs {}",
                audio.channels, channels
            )));
        }
        planar_inputs.push(widen_mono(deinterleave(&audio.samples, audio.channels), channels));
    }

    let lengths: Vec<usize> = planar_inputs
        .iter()
        .map(|p| p.first().map(Vec::len).unwrap_or(0))
        .collect();
    let frames = lengths.iter().copied().min().unwrap_or(0);
    let longest = lengths.iter().copied().max().unwrap_or(0);
    if frames == 0 {
        return Err(EnsembleError::combination("input stem has no samples"));
    }
    if longest != frames {
        warn!(
            "Stem lengths differ ({} to {} frames); truncating to the shortest",
            frames, longest
        );
    }

    let stack = Array3::from_shape_fn((planar_inputs.len(), channels, frames), |(i, c, t)| {
        planar_inputs[i][c][t]
    });

    Ok(Aligned { stack, sample_rate })
}

fn combine_wave(stack: &Array3<f32>, method: CombinationMethod) -> Array2<f32> {
    let stat: fn(ArrayView1<f32>) -> f32 = match method {
        CombinationMethod::MedianWave => median,
        CombinationMethod::MaxWave => loudest,
        CombinationMethod::MinWave => quietest,
        _ => mean,
    };
    stack.map_axis(Axis(0), stat)
}

fn mean(lane: ArrayView1<f32>) -> f32 {
    lane.sum() / lane.len() as f32
}

fn median(lane: ArrayView1<f32>) -> f32 {
    let mut values = lane.to_vec();
    values.sort_by(f32::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

/// Value with the largest magnitude, sign preserved.
fn loudest(lane: ArrayView1<f32>) -> f32 {
    lane.iter()
        .copied()
        .reduce(|best, x| if x.abs() > best.abs() { x } else { best })
        .unwrap_or(0.0)
}

/// Value with the smallest magnitude, sign preserved.
fn quietest(lane: ArrayView1<f32>) -> f32 {
    lane.iter()
        .copied()
        .reduce(|best, x| if x.abs() < best.abs() { x } else { best })
        .unwrap_or(0.0)
}

fn combine_spectral(stack: &Array3<f32>, method: CombinationMethod) -> Vec<Vec<f32>> {
    let (_, channels, frames) = stack.dim();

    (0..channels)
        .into_par_iter()
        .map(|c| {
            let specs: Vec<Array2<Complex32>> = stack
                .outer_iter()
                .map(|input| {
                    let signal = input.index_axis(Axis(0), c).to_vec();
                    stft_centered(&signal, SPECTRAL_N_FFT, SPECTRAL_HOP)
                })
                .collect();

            let dim = specs[0].dim();
            let merged = Array2::from_shape_fn(dim, |idx| {
                let bins = specs.iter().map(|s| s[idx]);
                match method {
                    CombinationMethod::MaxFft => strongest_bin(bins),
                    CombinationMethod::MinFft => weakest_bin(bins),
                    _ => mean_magnitude_bin(bins),
                }
            });

            istft_centered(&merged, SPECTRAL_N_FFT, SPECTRAL_HOP, frames)
        })
        .collect()
}

/// Mean magnitude, with the phase of the summed inputs.
fn mean_magnitude_bin(bins: impl Iterator<Item = Complex32>) -> Complex32 {
    let mut sum = Complex32::new(0.0, 0.0);
    let mut magnitude = 0.0f32;
    let mut n = 0usize;
    for b in bins {
        sum += b;
        magnitude += b.norm();
        n += 1;
    }
    if n == 0 {
        return sum;
    }
    Complex32::from_polar(magnitude / n as f32, sum.arg())
}

fn strongest_bin(bins: impl Iterator<Item = Complex32>) -> Complex32 {
    bins.reduce(|best, b| if b.norm_sqr() > best.norm_sqr() { b } else { best })
        .unwrap_or_default()
}

fn weakest_bin(bins: impl Iterator<Item = Complex32>) -> Complex32 {
    bins.reduce(|best, b| if b.norm_sqr() < best.norm_sqr() { b } else { best })
        .unwrap_or_default()
}
