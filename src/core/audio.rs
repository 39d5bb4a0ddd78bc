use std::{
    fs::{self, File},
    path::Path,
};

use anyhow::{anyhow, bail, Context, Result};
use flac_bound::{FlacEncoder, WriteWrapper};
use hound::WavWriter;
use symphonia::core::{
    audio::SampleBuffer, codecs::DecoderOptions, errors::Error as SymphoniaError,
    formats::FormatOptions, io::MediaSourceStream, meta::MetadataOptions, probe::Hint,
};
use symphonia::default::{get_codecs, get_probe};
use tracing::debug;

use crate::types::{AudioData, OutputFormat};

/// Decodes any container symphonia knows into interleaved `f32` samples.
pub fn read_audio<P: AsRef<Path>>(path: P) -> Result<AudioData> {
    let path: &Path = path.as_ref();

    let file: File =
        File::open(path).with_context(|| format!("Failed to open audio file: {:?}", path))?;

    let mss: MediaSourceStream = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint: Hint = Hint::new();

    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .with_context(|| format!("Unrecognized audio format: {:?}", path))?;

    let mut format = probed.format;
    let track = format.default_track().context("No default track found")?;
    let track_id = track.id;

    let mut decoder = get_codecs().make(&track.codec_params, &DecoderOptions::default())?;

    let mut samples: Vec<f32> = Vec::new();
    let mut sample_rate: u32 = track.codec_params.sample_rate.unwrap_or(0);
    let mut channels: u16 = track
        .codec_params
        .channels
        .map(|c| c.count() as u16)
        .unwrap_or(0);

    while let Ok(packet) = format.next_packet() {
        if packet.track_id() != track_id {
            continue;
        }
        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(SymphoniaError::DecodeError(msg)) => {
                debug!("Skipping undecodable packet in {:?}: {}", path, msg);
                continue;
            }
            Err(e) => return Err(e.into()),
        };
        sample_rate = decoded.spec().rate;
        channels = decoded.spec().channels.count() as u16;

        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec());
        buffer.copy_interleaved_ref(decoded);

        samples.extend_from_slice(buffer.samples());
    }

    if channels == 0 || sample_rate == 0 {
        bail!("Audio file has no channel layout or sample rate: {:?}", path);
    }

    debug!(
        "Read audio {:?}: sample_rate={}, channels={}, samples={}",
        path,
        sample_rate,
        channels,
        samples.len()
    );

    Ok(AudioData {
        samples,
        sample_rate,
        channels,
    })
}

const FLAC_BITS: u32 = 24;
const FLAC_BLOCK_FRAMES: usize = 4096;

/// Writes interleaved samples, picking the encoder from the file extension.
/// A path without an extension is written as WAV.
pub fn write_audio<P: AsRef<Path>>(path: P, audio: &AudioData) -> Result<()> {
    let path = path.as_ref();
    let format = match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => ext.parse::<OutputFormat>()?,
        None => OutputFormat::Wav,
    };
    write_audio_as(path, audio, format)
}

/// Writes interleaved samples in `format`: 32-bit float WAV, 24-bit FLAC or
/// 320 kbps MP3.
pub fn write_audio_as<P: AsRef<Path>>(
    path: P,
    audio: &AudioData,
    format: OutputFormat,
) -> Result<()> {
    let path = path.as_ref();
    if audio.channels == 0 {
        bail!("Cannot write audio without channels to {:?}", path);
    }

    let bytes = match format {
        OutputFormat::Wav => return write_wav(path, audio),
        OutputFormat::Flac => encode_flac(audio)?,
        OutputFormat::Mp3 => encode_mp3(audio)?,
        other => bail!("No encoder for {} output", other),
    };
    fs::write(path, bytes).with_context(|| format!("Failed to write {:?}", path))?;
    debug!("Wrote {} frames as {} to {:?}", audio.frames(), format, path);
    Ok(())
}

fn write_wav(path: &Path, audio: &AudioData) -> Result<()> {
    let spec = hound::WavSpec {
        channels: audio.channels,
        sample_rate: audio.sample_rate,
        bits_per_sample: 32,
        sample_format: hound::SampleFormat::Float,
    };

    let mut writer = WavWriter::create(path, spec)
        .with_context(|| format!("Failed to create WAV file: {:?}", path))?;
    for sample in &audio.samples {
        writer.write_sample(*sample)?;
    }

    writer.finalize()?;
    Ok(())
}

fn encode_flac(audio: &AudioData) -> Result<Vec<u8>> {
    let channels = audio.channels as usize;
    let scale = ((1i64 << (FLAC_BITS - 1)) - 1) as f32;
    let samples: Vec<i32> = audio
        .samples
        .iter()
        .map(|s| (s.clamp(-1.0, 1.0) * scale).round() as i32)
        .collect();

    let mut output = Vec::new();
    {
        let config = FlacEncoder::new()
            .context("FLAC encoder init failed")?
            .channels(channels as u32)
            .sample_rate(audio.sample_rate)
            .bits_per_sample(FLAC_BITS)
            .compression_level(5);

        let mut wrapper = WriteWrapper(&mut output);
        let mut encoder = config
            .init_write(&mut wrapper)
            .map_err(|e| anyhow!("FLAC init write failed: {:?}", e))?;

        for block in samples.chunks(FLAC_BLOCK_FRAMES * channels) {
            encoder
                .process_interleaved(block, (block.len() / channels) as u32)
                .map_err(|_| anyhow!("FLAC process failed"))?;
        }
        encoder
            .finish()
            .map_err(|_| anyhow!("FLAC finish failed"))?;
    }
    Ok(output)
}

fn encode_mp3(audio: &AudioData) -> Result<Vec<u8>> {
    use mp3lame_encoder::{Bitrate, Builder, DualPcm, FlushNoGap, Quality};

    let channels = audio.channels as usize;
    if channels > 2 {
        bail!("MP3 output supports at most 2 channels, got {}", channels);
    }

    let mut builder = Builder::new().context("LAME encoder init failed")?;
    builder
        .set_num_channels(audio.channels as u8)
        .map_err(|e| anyhow!("LAME set channels failed: {:?}", e))?;
    builder
        .set_sample_rate(audio.sample_rate)
        .map_err(|e| anyhow!("LAME set sample rate failed: {:?}", e))?;
    builder
        .set_brate(Bitrate::Kbps320)
        .map_err(|e| anyhow!("LAME set bitrate failed: {:?}", e))?;
    builder
        .set_quality(Quality::Best)
        .map_err(|e| anyhow!("LAME set quality failed: {:?}", e))?;
    let mut encoder = builder
        .build()
        .map_err(|e| anyhow!("LAME build failed: {:?}", e))?;

    let to_i16 = |s: f32| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
    let frames = audio.frames();
    let (left, right): (Vec<i16>, Vec<i16>) = audio
        .samples
        .chunks_exact(channels)
        .map(|frame| (to_i16(frame[0]), to_i16(frame[channels - 1])))
        .unzip();

    let mut output: Vec<u8> =
        Vec::with_capacity(mp3lame_encoder::max_required_buffer_size(frames));
    let encoded = encoder
        .encode(
            DualPcm {
                left: &left,
                right: &right,
            },
            output.spare_capacity_mut(),
        )
        .map_err(|e| anyhow!("LAME encode failed: {:?}", e))?;
    // SAFETY: the encoder initialised `encoded` bytes of spare capacity.
    unsafe {
        output.set_len(encoded);
    }

    output.reserve(7200);
    let flushed = encoder
        .flush::<FlushNoGap>(output.spare_capacity_mut())
        .map_err(|e| anyhow!("LAME flush failed: {:?}", e))?;
    // SAFETY: as above, for the flushed tail.
    unsafe {
        output.set_len(output.len() + flushed);
    }

    Ok(output)
}
