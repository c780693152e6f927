//! Built-in enhancement profiles.

use crate::clarity::ClarityParameters;
use crate::error::{self, Error, Result};
use crate::level::LevelBounds;
use crate::vad::GateParameters;
use crate::wiener::{Placement, WienerParameters};

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use snafu::ensure;


#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum Profile {
    Low,
    Medium,
    High,
    Advanced,
    Extreme,
}

impl Profile {
    /// All profiles, from least to most aggressive.
    pub const ALL: [Profile; 5] = [
        Profile::Low,
        Profile::Medium,
        Profile::High,
        Profile::Advanced,
        Profile::Extreme,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Profile::Low      => "low",
            Profile::Medium   => "medium",
            Profile::High     => "high",
            Profile::Advanced => "advanced",
            Profile::Extreme  => "extreme",
        }
    }
}

impl fmt::Display for Profile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Profile {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Profile::ALL.iter()
            .copied()
            .find(|p| p.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| error::InvalidProfileSnafu { name: s }.build())
    }
}

impl Default for Profile {
    fn default() -> Self {
        Profile::Medium
    }
}


/// Whether the noise profile is estimated once or after every pass.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum NoiseMode {
    Fixed,
    Adaptive,
}

impl Default for NoiseMode {
    fn default() -> Self {
        NoiseMode::Fixed
    }
}


/// Immutable set of tuning values driving one pipeline run.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct EnhancementProfile {
    /// Over-subtraction factor of the first pass.
    pub alpha: f64,

    /// Increase of the over-subtraction factor per pass.
    #[serde(default)]
    pub alpha_step: f64,

    /// Spectral floor as fraction of the input magnitude.
    pub beta: f64,

    pub passes: usize,

    /// Number of bands for multi-band subtraction, `0` disables it.
    #[serde(default)]
    pub bands: usize,

    #[serde(default)]
    pub wiener: Option<WienerParameters>,

    #[serde(default)]
    pub clarity: Option<ClarityParameters>,

    #[serde(default)]
    pub vad: Option<GateParameters>,

    pub min_gain_db: f64,
    pub max_gain_db: f64,

    #[serde(default)]
    pub noise_mode: NoiseMode,
}

impl EnhancementProfile {
    pub fn for_profile(profile: Profile) -> Self {
        match profile {
            Profile::Low => EnhancementProfile {
                alpha: 1.2,
                alpha_step: 0.0,
                beta: 0.4,
                passes: 1,
                bands: 0,
                wiener: None,
                clarity: None,
                vad: None,
                min_gain_db: 0.0,
                max_gain_db: 6.0,
                noise_mode: NoiseMode::Fixed,
            },
            Profile::Medium => EnhancementProfile {
                alpha: 2.0,
                alpha_step: 0.5,
                beta: 0.2,
                passes: 2,
                bands: 0,
                wiener: Some(WienerParameters { min_gain: 0.2, exponent: 1.0, placement: Placement::Before }),
                clarity: Some(ClarityParameters::moderate()),
                vad: Some(GateParameters { floor: 0.3, smoothing: 0.020 }),
                min_gain_db: 1.0,
                max_gain_db: 8.0,
                noise_mode: NoiseMode::Fixed,
            },
            Profile::High => EnhancementProfile {
                alpha: 3.0,
                alpha_step: 0.5,
                beta: 0.1,
                passes: 2,
                bands: 4,
                wiener: Some(WienerParameters { min_gain: 0.15, exponent: 1.0, placement: Placement::Before }),
                clarity: Some(ClarityParameters::moderate()),
                vad: Some(GateParameters { floor: 0.3, smoothing: 0.020 }),
                min_gain_db: 2.0,
                max_gain_db: 10.0,
                noise_mode: NoiseMode::Fixed,
            },
            Profile::Advanced => EnhancementProfile {
                alpha: 5.0,
                alpha_step: 1.0,
                beta: 0.02,
                passes: 3,
                bands: 6,
                wiener: Some(WienerParameters { min_gain: 0.1, exponent: 1.2, placement: Placement::Interleaved }),
                clarity: Some(ClarityParameters::strong()),
                vad: Some(GateParameters { floor: 0.2, smoothing: 0.015 }),
                min_gain_db: 2.0,
                max_gain_db: 12.0,
                noise_mode: NoiseMode::Fixed,
            },
            Profile::Extreme => EnhancementProfile {
                alpha: 12.0,
                alpha_step: 1.0,
                beta: 0.00005,
                passes: 3,
                bands: 8,
                wiener: Some(WienerParameters { min_gain: 0.1, exponent: 1.5, placement: Placement::Interleaved }),
                clarity: Some(ClarityParameters::aggressive()),
                vad: Some(GateParameters { floor: 0.01, smoothing: 0.010 }),
                min_gain_db: 2.0,
                max_gain_db: 12.0,
                noise_mode: NoiseMode::Fixed,
            },
        }
    }

    pub fn level_bounds(&self) -> LevelBounds {
        LevelBounds {
            min_gain_db: self.min_gain_db,
            max_gain_db: self.max_gain_db,
        }
    }

    pub fn validate(&self) -> Result<()> {
        ensure!(self.alpha >= 0.0 && self.alpha_step >= 0.0, error::InvalidParametersSnafu {
            reason: format!("over-subtraction factor must be non-negative, got {} (+{} per pass)",
                            self.alpha, self.alpha_step),
        });

        ensure!(self.beta > 0.0 && self.beta < 1.0, error::InvalidParametersSnafu {
            reason: format!("spectral floor must be in (0, 1), got {}", self.beta),
        });
        ensure!((1..=5).contains(&self.passes), error::InvalidParametersSnafu {
            reason: format!("pass count must be between 1 and 5, got {}", self.passes),
        });
        ensure!(self.min_gain_db.is_finite() && self.max_gain_db >= self.min_gain_db, error::InvalidParametersSnafu {
            reason: format!("invalid gain bounds [{}, {}] dB", self.min_gain_db, self.max_gain_db),
        });

        if let Some(w) = &self.wiener {
            ensure!(w.min_gain > 0.0 && w.min_gain <= 1.0 && w.exponent > 0.0, error::InvalidParametersSnafu {
                reason: format!("invalid wiener parameters {:?}", w),
            });
        }

        if let Some(g) = &self.vad {
            ensure!((0.0..=0.3).contains(&g.floor) && g.smoothing >= 0.0, error::InvalidParametersSnafu {
                reason: format!("invalid gate parameters {:?}", g),
            });
        }

        Ok(())
    }
}
