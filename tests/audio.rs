mod common;

use approx::assert_abs_diff_eq;
use common::{sine, SR};
use ensemble_separator_core::{read_audio, write_audio, write_audio_as, OutputFormat};
use std::fs;
use tempfile::tempdir;

#[test]
fn float_wav_reads_back_through_decoder() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tone.wav");
    let audio = sine(440.0, 0.25, 3000, 2, SR);
    write_audio(&path, &audio).unwrap();

    let read = read_audio(&path).unwrap();
    assert_eq!(read.sample_rate, SR);
    assert_eq!(read.channels, 2);
    assert_eq!(read.frames(), 3000);
    for (a, b) in read.samples.iter().zip(&audio.samples) {
        assert_abs_diff_eq!(*a, *b, epsilon = 1e-6);
    }
}

#[test]
fn reads_16_bit_pcm() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("pcm16.wav");
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 22_050,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    for i in 0..1000 {
        writer.write_sample(((i % 100) as i16 - 50) * 300).unwrap();
    }
    writer.finalize().unwrap();

    let read = read_audio(&path).unwrap();
    assert_eq!(read.sample_rate, 22_050);
    assert_eq!(read.channels, 1);
    assert_eq!(read.samples.len(), 1000);
    assert!(read.samples.iter().all(|s| s.abs() <= 1.0));
}

#[test]
fn garbage_is_an_error() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad.wav");
    fs::write(&path, b"definitely not RIFF").unwrap();
    assert!(read_audio(&path).is_err());
    assert!(read_audio(dir.path().join("absent.wav")).is_err());
}

#[test]
fn flac_output_is_lossless_at_24_bits() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tone.flac");
    let audio = sine(330.0, 0.5, 5000, 2, SR);
    write_audio(&path, &audio).unwrap();

    let read = read_audio(&path).unwrap();
    assert_eq!(read.sample_rate, SR);
    assert_eq!(read.channels, 2);
    assert_eq!(read.frames(), 5000);
    for (a, b) in read.samples.iter().zip(&audio.samples) {
        assert_abs_diff_eq!(*a, *b, epsilon = 1e-5);
    }
}

#[test]
fn mp3_output_decodes_with_the_same_layout() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("tone.mp3");
    let audio = sine(440.0, 0.4, SR as usize, 2, SR);
    write_audio_as(&path, &audio, OutputFormat::Mp3).unwrap();

    let read = read_audio(&path).unwrap();
    assert_eq!(read.sample_rate, SR);
    assert_eq!(read.channels, 2);
    assert!(read.frames() >= SR as usize / 2, "{} frames", read.frames());
    let peak = read.samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
    assert!(peak > 0.2 && peak < 0.6, "peak {peak}");
}

#[test]
fn formats_without_an_encoder_are_rejected() {
    let dir = tempdir().unwrap();
    let audio = sine(440.0, 0.4, 100, 2, SR);
    assert!(write_audio(dir.path().join("x.ogg"), &audio).is_err());
    assert!(write_audio(dir.path().join("x.xyz"), &audio).is_err());
    let surround = sine(440.0, 0.4, 100, 6, SR);
    assert!(write_audio_as(dir.path().join("x.mp3"), &surround, OutputFormat::Mp3).is_err());
    assert!(!dir.path().join("x.ogg").exists());
}
