//! Profile orchestration.
//!
//! A run walks through the stages
//!
//! ```text
//! NoiseEstimation -> SpectralProcessing (x passes) -> MultiBand? -> ClarityEmphasis?
//!     -> Synthesis -> VadGating? -> LevelRestoration
//! ```
//!
//! where the profile alone decides which optional stages run. [`Enhancer`]
//! probes the analysis parameters once and serves runs either through the
//! configured [`Pipeline`] or through the minimal [`FallbackPipeline`].

use crate::clarity::ClarityMask;
use crate::config::{Framing, Parameters, ResourceParameters, StftParameters};
use crate::error::{self, Result};
use crate::ft::{self, InversionMethod, Istft, IstftBuilder, Padding, Stft, StftBuilder};
use crate::level::{self, LevelReport};
use crate::math::{self, Real};
use crate::multiband;
use crate::noise::{NoiseParameters, NoiseProfile, NoiseSource};
use crate::proc::utils::process_spectrum;
use crate::profile::{EnhancementProfile, NoiseMode, Profile};
use crate::subtraction::{self, apply_floor, SpectralSubtraction};
use crate::vad::{VadParameters, VoiceActivityGate};
use crate::wave::Waveform;
use crate::wiener::{self, Placement, WienerFilter, WienerParameters};
use crate::window::Window;

use ndarray::{Array1, Array2, Axis};
use num::Complex;
use serde::Serialize;
use snafu::ensure;
use tracing::{debug, info, warn};


/// Which implementation served a run.
#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Tier {
    Primary,
    Fallback,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum Stage {
    NoiseEstimation,
    SpectralProcessing { pass: usize },
    MultiBand,
    ClarityEmphasis,
    Synthesis,
    VadGating,
    LevelRestoration,
}

#[derive(Serialize, Debug, Clone)]
pub struct Report {
    pub profile: Profile,
    pub tier: Tier,
    pub stages: Vec<Stage>,
    pub noise_source: NoiseSource,

    /// Energy change (in dB) of the frames the noise was estimated from,
    /// between analysis and synthesis.
    pub residual_noise_db: Option<f64>,

    pub level: LevelReport,
}

#[derive(Debug, Clone)]
pub struct Enhanced<T> {
    pub waveform: Waveform<T>,
    pub report: Report,
}


#[derive(Default)]
struct Trace {
    stages: Vec<Stage>,
}

impl Trace {
    fn enter(&mut self, stage: Stage) {
        debug!(?stage, "entering stage");
        self.stages.push(stage);
    }
}

fn build_analysis<T: Real>(window: &Window, framing: Framing) -> Result<(Stft<T>, Istft<T>)> {
    let window = window.build::<T>(framing.frame_len);
    let overlap = framing.frame_len - framing.hop;

    let stft = StftBuilder::with_len(window.as_ref(), framing.fft_len)
        .overlap(overlap)
        .padding(Padding::Zero)
        .build()?;

    let istft = IstftBuilder::with_len(window.as_ref(), framing.fft_len)
        .overlap(overlap)
        .padding(Padding::Zero)
        .method(InversionMethod::Weighted)
        .remove_padding(true)
        .build()?;

    Ok((stft, istft))
}

fn check_resources<T>(frames: usize, bins: usize, resources: &ResourceParameters) -> Result<()> {
    let bytes = frames
        .saturating_mul(bins)
        .saturating_mul(std::mem::size_of::<Complex<T>>());

    ensure!(bytes <= resources.max_spectrum_bytes, error::ResourceExceededSnafu {
        frames,
        bins,
        bytes,
        limit: resources.max_spectrum_bytes,
    });

    Ok(())
}

/// Energy ratio (in dB) of `after` to `before` over the given frames.
fn residual_db<T: Real>(before: &Array2<Complex<T>>, after: &Array2<Complex<T>>, frames: &[usize]) -> Option<f64> {
    let energy = |s: &Array2<Complex<T>>| -> f64 {
        frames.iter()
            .map(|&i| s.index_axis(Axis(0), i).iter().map(|c| c.norm_sqr().to_f64_unchecked()).sum::<f64>())
            .sum()
    };

    let (e0, e1) = (energy(before), energy(after));
    if frames.is_empty() || e0 <= math::EPSILON {
        return None;
    }

    Some(math::power_to_db(math::safe_div(e1, e0, 1.0)))
}

fn apply_wiener<T: Real>(spectrum: Array2<Complex<T>>, noise: &NoiseProfile<T>, params: &WienerParameters)
    -> Array2<Complex<T>>
{
    process_spectrum(&mut WienerFilter::new(noise, params), &spectrum)
}

fn finish<T: Real>(input: &Waveform<T>, samples: Array1<T>, report: Report) -> Result<Enhanced<T>> {
    ensure!(samples.iter().all(|x| x.is_finite()), error::NumericInstabilitySnafu {
        stage: "level restoration",
    });

    info!(profile = %report.profile, tier = ?report.tier, stages = report.stages.len(),
          noise = ?report.noise_source, gain_db = report.level.gain_db,
          ceiling_limited = report.level.ceiling_limited, "enhancement finished");

    let waveform = Waveform::new(samples, input.sample_rate())?;
    Ok(Enhanced { waveform, report })
}

fn pass_through<T: Real>(input: &Waveform<T>, profile: Profile, settings: &EnhancementProfile, tier: Tier,
                         mut trace: Trace) -> Result<Enhanced<T>> {
    debug!("input is silent, passing it through");

    trace.enter(Stage::LevelRestoration);
    let (samples, level) = level::restore(input.samples(), input.samples(), &settings.level_bounds());

    let report = Report {
        profile,
        tier,
        stages: trace.stages,
        noise_source: NoiseSource::Silent,
        residual_noise_db: None,
        level,
    };

    finish(input, samples, report)
}


/// The full, profile-driven enhancement pipeline.
#[derive(Debug, Clone)]
pub struct Pipeline {
    profile: Profile,
    settings: EnhancementProfile,
    stft: StftParameters,
    noise: NoiseParameters,
    vad: VadParameters,
    resources: ResourceParameters,
}

impl Pipeline {
    pub fn new(profile: Profile, params: &Parameters) -> Result<Self> {
        params.validate()?;

        let settings = params.profile(profile);
        settings.validate()?;

        Ok(Pipeline {
            profile,
            settings,
            stft: params.stft.clone(),
            noise: params.noise,
            vad: params.vad,
            resources: params.resources,
        })
    }

    pub fn enhance<T: Real>(&self, input: &Waveform<T>) -> Result<Enhanced<T>> {
        let sample_rate = input.sample_rate();
        let samples = input.samples();
        let settings = &self.settings;

        let framing = self.stft.framing(sample_rate);
        let (stft, istft) = build_analysis::<T>(&self.stft.window, framing)?;
        check_resources::<T>(stft.num_frames(samples.len()), framing.fft_len, &self.resources)?;

        let mut trace = Trace::default();

        trace.enter(Stage::NoiseEstimation);
        let spectrum = stft.process(samples);
        let noise = self.noise.estimate::<T, _>(&spectrum, framing.hop, sample_rate);

        if noise.is_silent() {
            return pass_through(input, self.profile, settings, Tier::Primary, trace);
        }

        let noise_source = noise.source();
        let noise_frames = noise.frames().to_vec();

        let beta = T::from_unchecked(settings.beta);
        let wiener = settings.wiener;

        // noise still present in `current`
        let mut residual = noise.clone();
        let mut current = spectrum.clone();

        if let Some(w) = wiener.filter(|w| w.placement == Placement::Before) {
            current = apply_wiener(current, &residual, &w);
            apply_floor(&mut current, &spectrum, beta);
            residual = wiener::residual_noise(&residual, &w).floored(&noise, beta);
        }

        for pass in 0..settings.passes {
            trace.enter(Stage::SpectralProcessing { pass: pass + 1 });

            let alpha = T::from_unchecked(settings.alpha + settings.alpha_step * pass as f64);
            current = process_spectrum(&mut SpectralSubtraction::new(&residual, alpha, beta), &current);
            apply_floor(&mut current, &spectrum, beta);
            residual = subtraction::residual_noise(&residual, alpha, beta).floored(&noise, beta);

            if let Some(w) = wiener.filter(|w| w.placement == Placement::Interleaved) {
                current = apply_wiener(current, &residual, &w);
                apply_floor(&mut current, &spectrum, beta);
                residual = wiener::residual_noise(&residual, &w).floored(&noise, beta);
            }

            if settings.noise_mode == NoiseMode::Adaptive && pass + 1 < settings.passes {
                let update = self.noise.estimate::<T, _>(&current, framing.hop, sample_rate);
                if !update.is_silent() {
                    residual = update.floored(&noise, beta);
                }
            }
        }

        let freqs = stft.spectrum_freqs(sample_rate as f64);
        let nyquist = sample_rate as f64 / 2.0;

        if settings.bands > 0 {
            trace.enter(Stage::MultiBand);

            let mut bands = multiband::processor(&residual, &freqs, settings.bands, nyquist,
                                                 settings.alpha, settings.beta);
            current = process_spectrum(&mut bands, &current);
            apply_floor(&mut current, &spectrum, beta);
        }

        if let Some(clarity) = &settings.clarity {
            trace.enter(Stage::ClarityEmphasis);
            current = process_spectrum(&mut ClarityMask::new(&freqs, clarity), &current);
        }

        let residual_noise_db = residual_db(&spectrum, &current, &noise_frames);

        trace.enter(Stage::Synthesis);
        let mut output = istft.process(&current, samples.len());

        if let Some(gate) = settings.vad {
            trace.enter(Stage::VadGating);
            output = VoiceActivityGate::new(self.vad, gate).apply(samples, &output, sample_rate);
        }

        trace.enter(Stage::LevelRestoration);
        let (output, level) = level::restore(samples, &output, &settings.level_bounds());

        let report = Report {
            profile: self.profile,
            tier: Tier::Primary,
            stages: trace.stages,
            noise_source,
            residual_noise_db,
            level,
        };

        finish(input, output, report)
    }
}


/// Minimal pipeline: one subtraction pass on a fixed analysis, followed by
/// level restoration.
#[derive(Debug, Clone)]
pub struct FallbackPipeline {
    profile: Profile,
    settings: EnhancementProfile,
    noise: NoiseParameters,
    resources: ResourceParameters,
}

impl FallbackPipeline {
    pub const FRAME_LEN: usize = 512;
    pub const HOP: usize = 256;

    pub fn new(profile: Profile, params: &Parameters) -> Result<Self> {
        params.validate()?;

        let settings = params.profile(profile);
        settings.validate()?;

        Ok(FallbackPipeline {
            profile,
            settings,
            noise: params.noise,
            resources: params.resources,
        })
    }

    pub fn enhance<T: Real>(&self, input: &Waveform<T>) -> Result<Enhanced<T>> {
        let sample_rate = input.sample_rate();
        let samples = input.samples();
        let settings = &self.settings;

        let framing = Framing { frame_len: Self::FRAME_LEN, hop: Self::HOP, fft_len: Self::FRAME_LEN };
        let (stft, istft) = build_analysis::<T>(&Window::default(), framing)?;
        check_resources::<T>(stft.num_frames(samples.len()), framing.fft_len, &self.resources)?;

        let mut trace = Trace::default();

        trace.enter(Stage::NoiseEstimation);
        let spectrum = stft.process(samples);
        let noise = self.noise.estimate::<T, _>(&spectrum, framing.hop, sample_rate);

        if noise.is_silent() {
            return pass_through(input, self.profile, settings, Tier::Fallback, trace);
        }

        trace.enter(Stage::SpectralProcessing { pass: 1 });
        let alpha = T::from_unchecked(settings.alpha);
        let beta = T::from_unchecked(settings.beta);
        let current = subtraction::subtract_passes(&spectrum, &noise, alpha, T::zero(), beta, 1);

        let residual_noise_db = residual_db(&spectrum, &current, noise.frames());

        trace.enter(Stage::Synthesis);
        let output = istft.process(&current, samples.len());

        trace.enter(Stage::LevelRestoration);
        let (output, level) = level::restore(samples, &output, &settings.level_bounds());

        let report = Report {
            profile: self.profile,
            tier: Tier::Fallback,
            stages: trace.stages,
            noise_source: noise.source(),
            residual_noise_db,
            level,
        };

        finish(input, output, report)
    }
}


/// Check that the configured analysis can be run at `sample_rate`.
pub fn probe(stft: &StftParameters, sample_rate: u32) -> std::result::Result<(), String> {
    let framing = stft.framing(sample_rate);

    if framing.fft_len < framing.frame_len {
        return Err(format!("FFT length {} is shorter than the frame length {}", framing.fft_len, framing.frame_len));
    }

    let window = stft.window.build::<f64>(framing.frame_len);
    if !ft::check_nola(window.as_ref(), framing.hop, 1e-6) {
        return Err(format!("window does not satisfy NOLA with hop {}", framing.hop));
    }

    build_analysis::<f64>(&stft.window, framing)
        .map(|_| ())
        .map_err(|e| e.to_string())
}


/// Enhancement entry point serving runs from the tier chosen by [`probe`].
#[derive(Debug, Clone)]
pub enum Enhancer {
    Primary(Pipeline),
    Fallback(FallbackPipeline),
}

impl Enhancer {
    pub fn new(profile: Profile, params: &Parameters, sample_rate: u32) -> Result<Self> {
        let primary = Pipeline::new(profile, params)?;

        match probe(&params.stft, sample_rate) {
            Ok(()) => Ok(Enhancer::Primary(primary)),
            Err(reason) => {
                warn!(%reason, "analysis parameters unusable, using fallback pipeline");
                Ok(Enhancer::Fallback(FallbackPipeline::new(profile, params)?))
            },
        }
    }

    pub fn tier(&self) -> Tier {
        match self {
            Enhancer::Primary(_)  => Tier::Primary,
            Enhancer::Fallback(_) => Tier::Fallback,
        }
    }

    pub fn enhance<T: Real>(&self, input: &Waveform<T>) -> Result<Enhanced<T>> {
        match self {
            Enhancer::Primary(p)  => p.enhance(input),
            Enhancer::Fallback(p) => p.enhance(input),
        }
    }
}

/// Enhance `input` with a built-in profile and default parameters.
pub fn enhance<T: Real>(input: &Waveform<T>, profile: Profile) -> Result<Enhanced<T>> {
    Enhancer::new(profile, &Parameters::default(), input.sample_rate())?.enhance(input)
}
