pub mod decode;
pub mod encode;
pub mod tags;

pub use decode::{load_audio, DecodeError};
pub use encode::{encode_mp3, encode_wav, EncodeError};
pub use tags::{read_tags, TagInfo};

/// Mono 32-bit-float PCM at its container's native sample rate (spec §4.1).
#[derive(Debug, Clone)]
pub struct AudioBuffer {
    pub samples: Vec<f32>,
    pub rate: u32,
}

impl AudioBuffer {
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.rate.max(1) as f64
    }
}

/// Down-mix interleaved multi-channel samples to mono by arithmetic mean.
pub fn downmix(interleaved: &[f32], channels: u16) -> Vec<f32> {
    let channels = channels.max(1) as usize;
    interleaved
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn downmix_averages_channels() {
        let stereo = vec![1.0, -1.0, 0.5, 0.5];
        let mono = downmix(&stereo, 2);
        assert_eq!(mono, vec![0.0, 0.5]);
    }
}
