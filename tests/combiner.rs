mod common;

use approx::assert_abs_diff_eq;
use common::{read_wav, sine, write_sine, SR};
use ensemble_separator_core::{
    combine, combine_audio, write_audio, AudioData, CombinationMethod, EnsembleError,
};
use std::{fs, path::PathBuf};
use tempfile::tempdir;

fn constant(values: &[f32], channels: u16) -> AudioData {
    AudioData {
        samples: values.to_vec(),
        sample_rate: SR,
        channels,
    }
}

#[test]
fn wave_statistics_per_sample() {
    let inputs = || {
        vec![
            constant(&[0.1, -0.8, 0.3], 1),
            constant(&[0.5, 0.2, -0.3], 1),
            constant(&[-0.6, 0.4, 0.0], 1),
        ]
    };

    let avg = combine_audio(inputs(), CombinationMethod::AvgWave).unwrap();
    assert_abs_diff_eq!(avg.samples[0], 0.0, epsilon = 1e-6);
    assert_abs_diff_eq!(avg.samples[1], -0.0666667, epsilon = 1e-6);
    assert_abs_diff_eq!(avg.samples[2], 0.0, epsilon = 1e-6);

    let median = combine_audio(inputs(), CombinationMethod::MedianWave).unwrap();
    assert_eq!(median.samples, vec![0.1, 0.2, 0.0]);

    let max = combine_audio(inputs(), CombinationMethod::MaxWave).unwrap();
    assert_eq!(max.samples, vec![-0.6, -0.8, 0.3]);

    let min = combine_audio(inputs(), CombinationMethod::MinWave).unwrap();
    assert_eq!(min.samples, vec![0.1, 0.2, 0.0]);
}

#[test]
fn median_of_even_count_averages_middle_pair() {
    let out = combine_audio(
        vec![constant(&[0.1], 1), constant(&[0.4], 1)],
        CombinationMethod::MedianWave,
    )
    .unwrap();
    assert_abs_diff_eq!(out.samples[0], 0.25, epsilon = 1e-7);
}

#[test]
fn lengths_truncate_to_shortest() {
    let out = combine_audio(
        vec![constant(&[0.2, 0.2, 0.2, 0.2], 2), constant(&[0.4, 0.4], 2)],
        CombinationMethod::AvgWave,
    )
    .unwrap();
    assert_eq!(out.channels, 2);
    assert_eq!(out.frames(), 1);
    assert_abs_diff_eq!(out.samples[0], 0.3, epsilon = 1e-6);
}

#[test]
fn mono_is_widened_to_stereo() {
    let out = combine_audio(
        vec![constant(&[0.2, 0.4], 2), constant(&[0.6], 1)],
        CombinationMethod::AvgWave,
    )
    .unwrap();
    assert_eq!(out.channels, 2);
    assert_abs_diff_eq!(out.samples[0], 0.4, epsilon = 1e-6);
    assert_abs_diff_eq!(out.samples[1], 0.5, epsilon = 1e-6);
}

#[test]
fn incompatible_layouts_fail() {
    let err = combine_audio(
        vec![constant(&[0.0; 6], 2), constant(&[0.0; 6], 3)],
        CombinationMethod::AvgWave,
    )
    .unwrap_err();
    assert!(matches!(err, EnsembleError::Combination { role: None, .. }));
}

#[test]
fn empty_audio_fails() {
    let err = combine_audio(
        vec![constant(&[], 2), constant(&[0.1, 0.1], 2)],
        CombinationMethod::AvgWave,
    )
    .unwrap_err();
    assert!(matches!(err, EnsembleError::Combination { .. }));
}

#[test]
fn mismatched_rates_resample_to_highest() {
    let low = sine(440.0, 0.3, 3000, 1, 22_050);
    let high = sine(440.0, 0.3, 6000, 1, SR);
    let out = combine_audio(vec![low, high], CombinationMethod::AvgWave).unwrap();
    assert_eq!(out.sample_rate, SR);
    assert!(out.frames() > 5000);
}

#[test]
fn spectral_methods_preserve_identical_inputs() {
    let frames = 8192;
    let tone = sine(440.0, 0.4, frames, 2, SR);
    for method in [
        CombinationMethod::AvgFft,
        CombinationMethod::MinFft,
        CombinationMethod::MaxFft,
    ] {
        let out = combine_audio(vec![tone.clone(), tone.clone(), tone.clone()], method).unwrap();
        assert_eq!(out.frames(), frames);
        for (a, b) in out.samples.iter().zip(&tone.samples) {
            assert_abs_diff_eq!(*a, *b, epsilon = 1e-3);
        }
    }
}

#[test]
fn max_fft_keeps_louder_source() {
    let frames = 8192;
    let quiet = sine(440.0, 0.05, frames, 1, SR);
    let loud = sine(440.0, 0.5, frames, 1, SR);
    let max = combine_audio(vec![quiet.clone(), loud.clone()], CombinationMethod::MaxFft).unwrap();
    let min = combine_audio(vec![quiet.clone(), loud.clone()], CombinationMethod::MinFft).unwrap();

    let peak = |a: &AudioData| a.samples.iter().fold(0.0f32, |m, s| m.max(s.abs()));
    assert_abs_diff_eq!(peak(&max), 0.5, epsilon = 0.02);
    assert_abs_diff_eq!(peak(&min), 0.05, epsilon = 0.01);
}

#[test]
fn combine_writes_float_wav() {
    let dir = tempdir().unwrap();
    let a = write_sine(&dir.path().join("a.wav"), 220.0, 0.2, 2000, 2);
    let b = write_sine(&dir.path().join("b.wav"), 330.0, 0.2, 2000, 2);
    let out_path = dir.path().join("out").join("song_ensemble_vocals_avg_wave.wav");

    let out = combine(&[a, b], CombinationMethod::AvgWave, &out_path).unwrap();
    assert_eq!(out, out_path);

    let (spec, samples) = read_wav(&out);
    assert_eq!(spec.channels, 2);
    assert_eq!(spec.sample_rate, SR);
    assert_eq!(spec.sample_format, hound::SampleFormat::Float);
    assert_eq!(samples.len(), 4000);
}

#[test]
fn combine_is_order_invariant_for_every_method() {
    let dir = tempdir().unwrap();
    let inputs: Vec<PathBuf> = [(220.0, 0.3), (330.0, 0.2), (550.0, 0.45)]
        .iter()
        .enumerate()
        .map(|(i, (f, a))| write_sine(&dir.path().join(format!("in_{i}.wav")), *f, *a, 6000, 2))
        .collect();
    let reversed: Vec<PathBuf> = inputs.iter().rev().cloned().collect();
    let rotated = vec![inputs[1].clone(), inputs[2].clone(), inputs[0].clone()];

    for method in CombinationMethod::ALL {
        let reference = dir.path().join(format!("ref_{method}.wav"));
        combine(&inputs, method, &reference).unwrap();
        let expected = fs::read(&reference).unwrap();

        for (n, order) in [&reversed, &rotated].into_iter().enumerate() {
            let out = dir.path().join(format!("perm{n}_{method}.wav"));
            combine(order, method, &out).unwrap();
            assert_eq!(fs::read(&out).unwrap(), expected, "{method} differs for permutation {n}");
        }
    }
}

#[test]
fn duplicate_paths_count_once() {
    let dir = tempdir().unwrap();
    let a = write_sine(&dir.path().join("a.wav"), 220.0, 0.5, 1000, 1);
    write_audio(
        dir.path().join("zero.wav"),
        &AudioData {
            samples: vec![0.0; 1000],
            sample_rate: SR,
            channels: 1,
        },
    )
    .unwrap();
    let zero = dir.path().join("zero.wav");

    let once = dir.path().join("once.wav");
    let twice = dir.path().join("twice.wav");
    combine(&[a.clone(), zero.clone()], CombinationMethod::AvgWave, &once).unwrap();
    combine(&[a.clone(), a, zero], CombinationMethod::AvgWave, &twice).unwrap();
    assert_eq!(fs::read(&once).unwrap(), fs::read(&twice).unwrap());
}

#[test]
fn combine_requires_inputs_and_readable_files() {
    let dir = tempdir().unwrap();
    let out = dir.path().join("out.wav");

    let none: [PathBuf; 0] = [];
    assert!(matches!(
        combine(&none, CombinationMethod::AvgWave, &out),
        Err(EnsembleError::Combination { .. })
    ));

    let bogus = dir.path().join("bogus.wav");
    fs::write(&bogus, b"not audio").unwrap();
    assert!(matches!(
        combine(&[bogus], CombinationMethod::AvgWave, &out),
        Err(EnsembleError::Combination { .. })
    ));
    assert!(!out.exists());
}
