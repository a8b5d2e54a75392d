use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("encoder initialization failed: {0}")]
    Init(String),
    #[error("encoder flush failed: {0}")]
    Flush(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Emit 16-bit PCM mono WAV, little-endian, conventional RIFF header (spec §6).
pub fn encode_wav(path: &Path, samples: &[f32], rate: u32) -> Result<(), EncodeError> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer =
        hound::WavWriter::create(path, spec).map_err(|e| EncodeError::Init(e.to_string()))?;
    for &s in samples {
        let clamped = s.clamp(-1.0, 1.0);
        let quantized = (clamped * i16::MAX as f32) as i16;
        writer
            .write_sample(quantized)
            .map_err(|e| EncodeError::Flush(e.to_string()))?;
    }
    writer.finalize().map_err(|e| EncodeError::Flush(e.to_string()))
}

/// CBR mono MP3 at `kbps` (default 192), quality setting moderate (spec §6).
pub fn encode_mp3(path: &Path, samples: &[f32], rate: u32, kbps: u32) -> Result<(), EncodeError> {
    use mp3lame_encoder::{Bitrate, Builder, FlushNoGap, Quality};

    let bitrate = match kbps {
        0..=96 => Bitrate::Kbps96,
        97..=128 => Bitrate::Kbps128,
        129..=160 => Bitrate::Kbps160,
        161..=192 => Bitrate::Kbps192,
        193..=224 => Bitrate::Kbps224,
        _ => Bitrate::Kbps256,
    };

    let mut builder = Builder::new().ok_or_else(|| EncodeError::Init("lame init failed".to_string()))?;
    builder
        .set_num_channels(1)
        .map_err(|e| EncodeError::Init(format!("{e:?}")))?;
    builder
        .set_sample_rate(rate)
        .map_err(|e| EncodeError::Init(format!("{e:?}")))?;
    builder
        .set_brate(bitrate)
        .map_err(|e| EncodeError::Init(format!("{e:?}")))?;
    builder
        .set_quality(Quality::Ok)
        .map_err(|e| EncodeError::Init(format!("{e:?}")))?;
    let mut encoder = builder
        .build()
        .map_err(|e| EncodeError::Init(format!("{e:?}")))?;

    let pcm: Vec<i16> = samples
        .iter()
        .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
        .collect();

    let mut mp3_buf = Vec::with_capacity(pcm.len() / 2 + 7200);
    let input = mp3lame_encoder::MonoPcm(&pcm);
    encoder
        .encode_to_vec(input, &mut mp3_buf)
        .map_err(|e| EncodeError::Flush(format!("{e:?}")))?;
    encoder
        .flush_to_vec::<FlushNoGap>(&mut mp3_buf)
        .map_err(|e| EncodeError::Flush(format!("{e:?}")))?;

    std::fs::write(path, mp3_buf)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wav_round_trips_through_decoder() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.wav");
        let samples = vec![0.0, 0.5, -0.5, 0.25];
        encode_wav(&path, &samples, 44100).unwrap();

        let decoded = crate::io::load_audio(&path).unwrap();
        assert_eq!(decoded.rate, 44100);
        assert_eq!(decoded.samples.len(), samples.len());
        for (a, b) in decoded.samples.iter().zip(samples.iter()) {
            assert!((a - b).abs() < 0.001);
        }
    }
}
