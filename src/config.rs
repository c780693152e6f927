//! Parameters of a pipeline run, as read from a YAML file.

use crate::error::{self, Result};
use crate::noise::{NoiseEstimator, NoiseParameters};
use crate::profile::{EnhancementProfile, Profile};
use crate::vad::VadParameters;
use crate::window::{Window, WindowType};

use std::collections::BTreeMap;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};
use snafu::{ensure, ResultExt};


#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Parameters {
    #[serde(default)]
    pub stft: StftParameters,

    #[serde(default)]
    pub noise: NoiseParameters,

    #[serde(default)]
    pub vad: VadParameters,

    #[serde(default)]
    pub resources: ResourceParameters,

    /// Replacements for the built-in profile tables.
    #[serde(default)]
    pub profiles: BTreeMap<Profile, EnhancementProfile>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct StftParameters {
    #[serde(default = "param_defaults::stft_window")]
    pub window: Window,

    #[serde(default = "param_defaults::block_length")]
    pub block_length: f64,          // in seconds

    #[serde(default = "param_defaults::overlap")]
    pub overlap: f64,               // fraction of block length

    #[serde(default)]
    pub fft_length: Option<usize>,
}

impl Default for StftParameters {
    fn default() -> Self {
        StftParameters {
            window: param_defaults::stft_window(),
            block_length: param_defaults::block_length(),
            overlap: param_defaults::overlap(),
            fft_length: None,
        }
    }
}

/// Frame length, hop and FFT length in samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Framing {
    pub frame_len: usize,
    pub hop: usize,
    pub fft_len: usize,
}

impl StftParameters {
    pub fn framing(&self, sample_rate: u32) -> Framing {
        let frame_len = ((self.block_length * sample_rate as f64).round() as usize).max(1);
        let overlap = ((self.overlap * frame_len as f64).round() as usize).min(frame_len - 1);
        let fft_len = self.fft_length.unwrap_or(frame_len);

        Framing { frame_len, hop: frame_len - overlap, fft_len }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct ResourceParameters {
    /// Upper bound for the memory of one spectrum, in bytes.
    #[serde(default = "param_defaults::max_spectrum_bytes")]
    pub max_spectrum_bytes: usize,
}

impl Default for ResourceParameters {
    fn default() -> Self {
        ResourceParameters {
            max_spectrum_bytes: param_defaults::max_spectrum_bytes(),
        }
    }
}


impl Parameters {
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let params: Parameters = serde_yaml::from_reader(reader).context(error::ConfigSnafu)?;
        params.validate()?;
        Ok(params)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = std::fs::File::open(path).context(error::ConfigIoSnafu)?;
        Self::from_reader(file)
    }

    /// The profile table to use for `profile`, honoring overrides.
    pub fn profile(&self, profile: Profile) -> EnhancementProfile {
        self.profiles.get(&profile)
            .cloned()
            .unwrap_or_else(|| EnhancementProfile::for_profile(profile))
    }

    pub fn validate(&self) -> Result<()> {
        let stft = &self.stft;
        ensure!(stft.block_length > 0.0, error::InvalidParametersSnafu {
            reason: format!("block length must be positive, got {}", stft.block_length),
        });
        ensure!(stft.overlap >= 0.0 && stft.overlap < 1.0, error::InvalidParametersSnafu {
            reason: format!("overlap must be in [0, 1), got {}", stft.overlap),
        });

        match self.noise.estimator {
            NoiseEstimator::QuietFrames { quantile } => {
                ensure!(quantile > 0.0 && quantile <= 1.0, error::InvalidParametersSnafu {
                    reason: format!("noise quantile must be in (0, 1], got {}", quantile),
                });
            },
            NoiseEstimator::Leading { duration } => {
                ensure!(duration > 0.0, error::InvalidParametersSnafu {
                    reason: format!("leading noise duration must be positive, got {}", duration),
                });
            },
        }

        let vad = &self.vad;
        ensure!(vad.frame_length > 0.0 && vad.hop_length > 0.0, error::InvalidParametersSnafu {
            reason: "voice activity frames must have positive length".to_string(),
        });
        ensure!(vad.floor_percentile <= vad.peak_percentile, error::InvalidParametersSnafu {
            reason: "voice activity floor percentile exceeds peak percentile".to_string(),
        });
        ensure!(0.0 <= vad.min_speech_share && vad.min_speech_share <= vad.max_speech_share
                && vad.max_speech_share <= 1.0, error::InvalidParametersSnafu {
            reason: format!("speech share bounds [{}, {}] are not an interval in [0, 1]",
                            vad.min_speech_share, vad.max_speech_share),
        });

        for profile in self.profiles.values() {
            profile.validate()?;
        }

        Ok(())
    }
}


mod param_defaults {
    use super::*;

    pub fn stft_window() -> Window {
        Window {
            ty: WindowType::Hann,
            periodic: true,
            sqrt: false,
        }
    }

    pub fn block_length() -> f64 {
        0.064       // 64 ms, 1024 samples at 16 kHz
    }

    pub fn overlap() -> f64 {
        0.75
    }

    pub fn max_spectrum_bytes() -> usize {
        1 << 30     // 1 GiB
    }
}
