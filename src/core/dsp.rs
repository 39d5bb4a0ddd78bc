use anyhow::{bail, Result};
use ndarray::Array2;
use num_complex::Complex32;
use once_cell::sync::Lazy;
use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};
use rustfft::{num_traits::Zero, Fft, FftPlanner};
use std::sync::Arc;

use crate::types::AudioData;

/// Frame size used by the spectral combination methods.
pub const SPECTRAL_N_FFT: usize = 2048;
/// Hop between spectral frames (75% overlap).
pub const SPECTRAL_HOP: usize = 512;

struct FftCache {
    fft_forward: Arc<dyn Fft<f32>>,
    fft_inverse: Arc<dyn Fft<f32>>,
    hann_window: Vec<f32>,
}

impl FftCache {
    fn new(n_fft: usize) -> Self {
        let mut planner = FftPlanner::new();
        FftCache {
            fft_forward: planner.plan_fft_forward(n_fft),
            fft_inverse: planner.plan_fft_inverse(n_fft),
            hann_window: compute_hann(n_fft),
        }
    }
}

static FFT_CACHE_DEFAULT: Lazy<FftCache> = Lazy::new(|| FftCache::new(SPECTRAL_N_FFT));

fn with_fft_cache<R>(n_fft: usize, f: impl FnOnce(&FftCache) -> R) -> R {
    if n_fft == SPECTRAL_N_FFT {
        f(&FFT_CACHE_DEFAULT)
    } else {
        f(&FftCache::new(n_fft))
    }
}

fn compute_hann(n_fft: usize) -> Vec<f32> {
    if n_fft <= 1 {
        return vec![1.0];
    }
    let denom = (n_fft - 1) as f32;
    (0..n_fft)
        .map(|i| 0.5 - 0.5 * (2.0 * std::f32::consts::PI * (i as f32) / denom).cos())
        .collect()
}

/// Splits interleaved samples into one buffer per channel.
pub fn deinterleave(interleaved: &[f32], channels: u16) -> Vec<Vec<f32>> {
    let ch = channels.max(1) as usize;
    let frames = interleaved.len() / ch;
    let mut out = vec![Vec::with_capacity(frames); ch];
    for frame in interleaved.chunks_exact(ch) {
        for (c, &s) in frame.iter().enumerate() {
            out[c].push(s);
        }
    }
    out
}

/// Inverse of [`deinterleave`]; stops at the shortest channel.
pub fn interleave(planar: &[Vec<f32>]) -> Vec<f32> {
    let frames = planar.iter().map(Vec::len).min().unwrap_or(0);
    let mut out = Vec::with_capacity(frames * planar.len());
    for i in 0..frames {
        for channel in planar {
            out.push(channel[i]);
        }
    }
    out
}

/// Duplicates a mono signal across `channels`; other layouts pass through.
pub fn widen_mono(planar: Vec<Vec<f32>>, channels: usize) -> Vec<Vec<f32>> {
    if planar.len() == 1 && channels > 1 {
        vec![planar[0].clone(); channels]
    } else {
        planar
    }
}

/// Centered STFT of one channel with a Hann window.
/// Returns shape `[frames, n_fft / 2 + 1]` with `frames = 1 + len / hop`.
pub fn stft_centered(signal: &[f32], n_fft: usize, hop: usize) -> Array2<Complex32> {
    let t = signal.len();
    let pad = n_fft / 2;

    let mut padded = vec![0.0f32; pad + t + pad];
    padded[pad..pad + t].copy_from_slice(signal);

    let frames = 1 + (t / hop);
    let f_bins = n_fft / 2 + 1;
    let mut out = Array2::<Complex32>::zeros((frames, f_bins));

    with_fft_cache(n_fft, |cache| {
        let mut buf = vec![Complex32::zero(); n_fft];
        for fr in 0..frames {
            let start = fr * hop;
            let frame = &padded[start..start + n_fft];

            for i in 0..n_fft {
                buf[i] = Complex32::new(frame[i] * cache.hann_window[i], 0.0);
            }

            cache.fft_forward.process(&mut buf);

            for fi in 0..f_bins {
                out[(fr, fi)] = buf[fi];
            }
        }
    });

    out
}

/// Weighted overlap-add inverse of [`stft_centered`].
pub fn istft_centered(
    spec: &Array2<Complex32>,
    n_fft: usize,
    hop: usize,
    target_length: usize,
) -> Vec<f32> {
    let (frames, f_bins) = spec.dim();
    let pad = n_fft / 2;
    let padded_length = target_length + 2 * pad;

    let mut out = vec![0.0f32; padded_length];
    let mut window_sum = vec![0.0f32; padded_length];
    let scale = 1.0 / (n_fft as f32);

    with_fft_cache(n_fft, |cache| {
        let mut buf = vec![Complex32::zero(); n_fft];
        for fr in 0..frames {
            buf.fill(Complex32::zero());

            for fi in 0..f_bins.min(n_fft / 2 + 1) {
                buf[fi] = spec[(fr, fi)];
            }
            // Hermitian mirror for a real output
            for fi in 1..(n_fft / 2) {
                buf[n_fft - fi] = buf[fi].conj();
            }
            buf[0].im = 0.0;
            buf[n_fft / 2].im = 0.0;

            cache.fft_inverse.process(&mut buf);

            let start = fr * hop;
            for i in 0..n_fft {
                let pos = start + i;
                if pos < padded_length {
                    let w = cache.hann_window[i];
                    out[pos] += buf[i].re * w * scale;
                    window_sum[pos] += w * w;
                }
            }
        }
    });

    for (sample, sum) in out.iter_mut().zip(&window_sum) {
        if *sum > 1e-10 {
            *sample /= sum;
        }
    }

    let end = (pad + target_length).min(out.len());
    if end > pad {
        out[pad..end].to_vec()
    } else {
        vec![0.0; target_length]
    }
}

/// Sinc resampling of every channel to `target_rate`.
pub fn resample(audio: &AudioData, target_rate: u32) -> Result<AudioData> {
    if audio.sample_rate == target_rate {
        return Ok(audio.clone());
    }
    if audio.sample_rate == 0 || target_rate == 0 {
        bail!("Cannot resample from {} Hz to {} Hz", audio.sample_rate, target_rate);
    }

    let channel_data = deinterleave(&audio.samples, audio.channels);
    let frames = channel_data.first().map(Vec::len).unwrap_or(0);
    if frames == 0 {
        return Ok(AudioData {
            samples: Vec::new(),
            sample_rate: target_rate,
            channels: audio.channels,
        });
    }

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = target_rate as f64 / audio.sample_rate as f64;
    let mut resampler =
        SincFixedIn::<f32>::new(ratio, 2.0, params, frames, channel_data.len())?;
    let delay = resampler.output_delay();
    let target_frames = (frames as f64 * ratio).round() as usize;
    let mut resampled = resampler.process(&channel_data, None)?;

    // Flush the filter tail so the end of the signal survives the delay trim.
    while resampled[0].len() < delay + target_frames {
        let tail = resampler.process_partial(None::<&[Vec<f32>]>, None)?;
        if tail[0].is_empty() {
            break;
        }
        for (ch, t) in resampled.iter_mut().zip(tail) {
            ch.extend(t);
        }
    }

    let trimmed: Vec<Vec<f32>> = resampled
        .into_iter()
        .map(|ch| {
            let mut ch: Vec<f32> = ch.into_iter().skip(delay).take(target_frames).collect();
            ch.resize(target_frames, 0.0);
            ch
        })
        .collect();

    Ok(AudioData {
        samples: interleave(&trimmed),
        sample_rate: target_rate,
        channels: audio.channels,
    })
}
