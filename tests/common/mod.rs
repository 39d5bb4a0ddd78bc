#![allow(dead_code)]

use std::f32::consts::PI;
use std::path::{Path, PathBuf};

use ensemble_separator_core::{write_audio, AudioData};

pub const SR: u32 = 44_100;

/// Interleaved sine, same tone on every channel.
pub fn sine(freq: f32, amp: f32, frames: usize, channels: u16, sample_rate: u32) -> AudioData {
    let mut samples = Vec::with_capacity(frames * channels as usize);
    for i in 0..frames {
        let t = i as f32 / sample_rate as f32;
        let s = (2.0 * PI * freq * t).sin() * amp;
        for _ in 0..channels {
            samples.push(s);
        }
    }
    AudioData {
        samples,
        sample_rate,
        channels,
    }
}

pub fn write_sine(path: &Path, freq: f32, amp: f32, frames: usize, channels: u16) -> PathBuf {
    write_audio(path, &sine(freq, amp, frames, channels, SR)).unwrap();
    path.to_path_buf()
}

pub fn read_wav(path: &Path) -> (hound::WavSpec, Vec<f32>) {
    let reader = hound::WavReader::open(path).unwrap();
    let spec = reader.spec();
    let samples = reader.into_samples::<f32>().map(|s| s.unwrap()).collect();
    (spec, samples)
}
