use std::path::Path;
use symphonia::core::audio::{AudioBufferRef, Signal};
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

use super::{downmix, AudioBuffer};

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("unsupported format: {0}")]
    UnsupportedFormat(String),
    #[error("invalid header: {0}")]
    InvalidHeader(String),
    #[error("truncated data: {0}")]
    Truncated(String),
    #[error("decode error: {0}")]
    Decoder(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Decode any supported container to mono f32 PCM at its native rate (spec §4.1).
/// `.wav` goes through the hand-validated fallback path; everything else
/// through `symphonia`.
pub fn load_audio(path: &Path) -> Result<AudioBuffer, DecodeError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();

    if ext == "wav" {
        decode_wav_fallback(path)
    } else {
        decode_with_symphonia(path)
    }
}

fn decode_with_symphonia(path: &Path) -> Result<AudioBuffer, DecodeError> {
    let file = std::fs::File::open(path)?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| DecodeError::UnsupportedFormat(e.to_string()))?;

    let mut format = probed.format;
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != symphonia::core::codecs::CODEC_TYPE_NULL)
        .ok_or_else(|| DecodeError::UnsupportedFormat("no audio track".to_string()))?;
    let track_id = track.id;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| DecodeError::Decoder(e.to_string()))?;

    let mut samples: Vec<f32> = Vec::new();
    let mut rate: u32 = 44100;

    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break
            }
            Err(e) => return Err(DecodeError::Decoder(e.to_string())),
        };

        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                rate = spec.rate;
                let channels = spec.channels.count() as u16;
                let interleaved = audio_buffer_to_interleaved(&decoded);
                samples.extend(downmix(&interleaved, channels));
            }
            Err(symphonia::core::errors::Error::DecodeError(_)) => continue,
            Err(e) => return Err(DecodeError::Decoder(e.to_string())),
        }
    }

    if samples.is_empty() {
        return Err(DecodeError::Truncated("no samples decoded".to_string()));
    }

    Ok(AudioBuffer { samples, rate })
}

fn audio_buffer_to_interleaved(decoded: &AudioBufferRef) -> Vec<f32> {
    match decoded {
        AudioBufferRef::F32(buf) => interleave(buf),
        AudioBufferRef::S16(buf) => interleave_converting(buf, |s| s as f32 / i16::MAX as f32),
        AudioBufferRef::S32(buf) => interleave_converting(buf, |s| s as f32 / i32::MAX as f32),
        AudioBufferRef::U8(buf) => {
            interleave_converting(buf, |s| (s as f32 - 128.0) / 128.0)
        }
        _ => Vec::new(),
    }
}

fn interleave(buf: &symphonia::core::audio::AudioBuffer<f32>) -> Vec<f32> {
    let channels = buf.spec().channels.count();
    let frames = buf.frames();
    let mut out = Vec::with_capacity(frames * channels);
    for i in 0..frames {
        for ch in 0..channels {
            out.push(buf.chan(ch)[i]);
        }
    }
    out
}

fn interleave_converting<S: symphonia::core::sample::Sample>(
    buf: &symphonia::core::audio::AudioBuffer<S>,
    convert: impl Fn(S) -> f32,
) -> Vec<f32> {
    let channels = buf.spec().channels.count();
    let frames = buf.frames();
    let mut out = Vec::with_capacity(frames * channels);
    for i in 0..frames {
        for ch in 0..channels {
            out.push(convert(buf.chan(ch)[i]));
        }
    }
    out
}

/// Hand-validated PCM-WAV fallback decoder (spec §4.1): validates RIFF/WAVE
/// magic, channel count in 1..16, rate in 1..192000, and bit depth of 16
/// (refuses otherwise) without depending on a general container prober.
fn decode_wav_fallback(path: &Path) -> Result<AudioBuffer, DecodeError> {
    let data = std::fs::read(path)?;
    if data.len() < 44 {
        return Err(DecodeError::Truncated("file shorter than WAV header".to_string()));
    }
    if &data[0..4] != b"RIFF" || &data[8..12] != b"WAVE" {
        return Err(DecodeError::InvalidHeader("missing RIFF/WAVE magic".to_string()));
    }

    let mut pos = 12usize;
    let mut channels: Option<u16> = None;
    let mut rate: Option<u32> = None;
    let mut bits_per_sample: Option<u16> = None;
    let mut data_chunk: Option<&[u8]> = None;

    while pos + 8 <= data.len() {
        let chunk_id = &data[pos..pos + 4];
        let chunk_size = u32::from_le_bytes(data[pos + 4..pos + 8].try_into().unwrap()) as usize;
        let chunk_start = pos + 8;
        let chunk_end = (chunk_start + chunk_size).min(data.len());
        if chunk_start > data.len() {
            return Err(DecodeError::Truncated("chunk header past end of file".to_string()));
        }

        match chunk_id {
            b"fmt " => {
                let fmt = &data[chunk_start..chunk_end];
                if fmt.len() < 16 {
                    return Err(DecodeError::InvalidHeader("fmt chunk too small".to_string()));
                }
                channels = Some(u16::from_le_bytes(fmt[2..4].try_into().unwrap()));
                rate = Some(u32::from_le_bytes(fmt[4..8].try_into().unwrap()));
                bits_per_sample = Some(u16::from_le_bytes(fmt[14..16].try_into().unwrap()));
            }
            b"data" => {
                data_chunk = Some(&data[chunk_start..chunk_end]);
            }
            _ => {}
        }

        pos = chunk_end + (chunk_size % 2); // chunks are word-aligned
    }

    let channels = channels.ok_or_else(|| DecodeError::InvalidHeader("missing fmt chunk".to_string()))?;
    let rate = rate.ok_or_else(|| DecodeError::InvalidHeader("missing fmt chunk".to_string()))?;
    let bits_per_sample =
        bits_per_sample.ok_or_else(|| DecodeError::InvalidHeader("missing fmt chunk".to_string()))?;
    let data_chunk = data_chunk.ok_or_else(|| DecodeError::Truncated("missing data chunk".to_string()))?;

    if channels == 0 || channels > 16 {
        return Err(DecodeError::UnsupportedFormat(format!(
            "channel count {channels} out of range 1..16"
        )));
    }
    if rate == 0 || rate > 192_000 {
        return Err(DecodeError::UnsupportedFormat(format!(
            "sample rate {rate} out of range 1..192000"
        )));
    }
    if bits_per_sample != 16 {
        return Err(DecodeError::UnsupportedFormat(format!(
            "unsupported bit depth {bits_per_sample}, only 16-bit is supported by the fallback decoder"
        )));
    }

    let sample_count = data_chunk.len() / 2;
    let mut interleaved = Vec::with_capacity(sample_count);
    for chunk in data_chunk.chunks_exact(2) {
        let s = i16::from_le_bytes([chunk[0], chunk[1]]);
        interleaved.push(s as f32 / i16::MAX as f32);
    }

    let samples = downmix(&interleaved, channels);
    Ok(AudioBuffer { samples, rate })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_test_wav(path: &Path, channels: u16, rate: u32, bits: u16, samples: &[i16]) {
        let mut data = Vec::new();
        data.extend_from_slice(b"RIFF");
        let data_bytes = samples.len() * 2;
        let riff_size = 36 + data_bytes;
        data.extend_from_slice(&(riff_size as u32).to_le_bytes());
        data.extend_from_slice(b"WAVE");
        data.extend_from_slice(b"fmt ");
        data.extend_from_slice(&16u32.to_le_bytes());
        data.extend_from_slice(&1u16.to_le_bytes()); // PCM
        data.extend_from_slice(&channels.to_le_bytes());
        data.extend_from_slice(&rate.to_le_bytes());
        let byte_rate = rate * channels as u32 * (bits as u32 / 8);
        data.extend_from_slice(&byte_rate.to_le_bytes());
        let block_align = channels * (bits / 8);
        data.extend_from_slice(&block_align.to_le_bytes());
        data.extend_from_slice(&bits.to_le_bytes());
        data.extend_from_slice(b"data");
        data.extend_from_slice(&(data_bytes as u32).to_le_bytes());
        for s in samples {
            data.extend_from_slice(&s.to_le_bytes());
        }
        std::fs::write(path, data).unwrap();
    }

    #[test]
    fn decodes_valid_mono_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.wav");
        write_test_wav(&path, 1, 44100, 16, &[0, 1000, -1000, 32767]);

        let buf = decode_wav_fallback(&path).unwrap();
        assert_eq!(buf.rate, 44100);
        assert_eq!(buf.samples.len(), 4);
    }

    #[test]
    fn downmixes_stereo() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        write_test_wav(&path, 2, 44100, 16, &[1000, -1000, 2000, 2000]);
        let buf = decode_wav_fallback(&path).unwrap();
        assert_eq!(buf.samples.len(), 2);
        assert!((buf.samples[0]).abs() < 1e-6);
    }

    #[test]
    fn rejects_bad_magic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.wav");
        std::fs::write(&path, b"not a wav file at all, too short").unwrap();
        assert!(decode_wav_fallback(&path).is_err());
    }

    #[test]
    fn rejects_unsupported_bit_depth() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("24bit.wav");
        // Manually build a 24-bit fmt chunk header to trigger the refusal path.
        let mut data = Vec::new();
        data.extend_from_slice(b"RIFF");
        data.extend_from_slice(&36u32.to_le_bytes());
        data.extend_from_slice(b"WAVE");
        data.extend_from_slice(b"fmt ");
        data.extend_from_slice(&16u32.to_le_bytes());
        data.extend_from_slice(&1u16.to_le_bytes());
        data.extend_from_slice(&1u16.to_le_bytes());
        data.extend_from_slice(&44100u32.to_le_bytes());
        data.extend_from_slice(&(44100 * 3u32).to_le_bytes());
        data.extend_from_slice(&3u16.to_le_bytes());
        data.extend_from_slice(&24u16.to_le_bytes());
        data.extend_from_slice(b"data");
        data.extend_from_slice(&0u32.to_le_bytes());
        std::fs::write(&path, data).unwrap();

        assert!(decode_wav_fallback(&path).is_err());
    }
}
