//! Spectral speech enhancement.
//!
//! Denoises a mono speech recording with a fixed, profile-driven chain of
//! spectral subtraction, Wiener gain, multi-band subtraction, clarity
//! emphasis, voice-activity gating and loudness restoration. See
//! [`pipeline`] for the stage order and [`profile`] for the built-in tuning
//! tables.

pub mod clarity;
pub mod config;
pub mod error;
pub mod ft;
pub mod level;
pub mod math;
pub mod multiband;
pub mod noise;
pub mod pipeline;
pub mod proc;
pub mod profile;
pub mod subtraction;
pub mod vad;
pub mod wave;
pub mod wiener;
pub mod window;

#[cfg(test)]
mod synth;

pub use config::Parameters;
pub use error::{Error, ErrorKind, Result};
pub use pipeline::{enhance, Enhanced, Enhancer, FallbackPipeline, Pipeline, Report, Stage, Tier};
pub use profile::{EnhancementProfile, Profile};
pub use wave::Waveform;
