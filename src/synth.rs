//! Deterministic synthetic test signals, shared by unit and integration tests.

use std::f64::consts::PI;

use ndarray::Array1;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};


pub fn tone(frequency: f64, amplitude: f64, len: usize, sample_rate: u32) -> Array1<f64> {
    let w = 2.0 * PI * frequency / sample_rate as f64;
    Array1::from_shape_fn(len, |i| amplitude * (w * i as f64).sin())
}

/// Uniform noise in `[-amplitude, amplitude]`.
pub fn uniform_noise(len: usize, amplitude: f64, seed: u64) -> Array1<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    Array1::from_shape_fn(len, |_| rng.gen_range(-amplitude..=amplitude))
}

/// Sum of harmonics of a 200 Hz fundamental with a slow (2 Hz) intonation
/// envelope, chopped into syllables by pauses.
pub fn speech_like(len: usize, sample_rate: u32) -> Array1<f64> {
    let harmonics = [(200.0, 0.3), (400.0, 0.15), (600.0, 0.1), (800.0, 0.05)];
    let fs = sample_rate as f64;

    // 150 ms pause, then a 250 ms syllable
    let pause = (0.15 * fs) as usize;
    let period = (0.40 * fs) as usize;

    Array1::from_shape_fn(len, |i| {
        if i % period < pause {
            return 0.0;
        }

        let t = i as f64 / fs;
        let envelope = 0.5 + 0.5 * (2.0 * PI * 2.0 * t).sin();
        let voice: f64 = harmonics.iter().map(|(f, a)| a * (2.0 * PI * f * t).sin()).sum();

        voice * envelope
    })
}

pub fn rms(x: &Array1<f64>) -> f64 {
    (x.iter().map(|v| v * v).sum::<f64>() / x.len().max(1) as f64).sqrt()
}

/// Add `noise` scaled such that the mixture has the given SNR (in dB).
pub fn mix_at_snr(signal: &Array1<f64>, noise: &Array1<f64>, snr_db: f64) -> Array1<f64> {
    let scale = rms(signal) / (rms(noise) * 10f64.powf(snr_db / 20.0)).max(1e-12);
    signal + &noise.mapv(|n| n * scale)
}

/// Scale `x` so that its absolute peak equals `peak`.
pub fn scale_to_peak(x: &Array1<f64>, peak: f64) -> Array1<f64> {
    let current = x.iter().fold(0.0_f64, |a, v| a.max(v.abs()));
    if current <= 0.0 {
        return x.clone();
    }

    x.mapv(|v| v * peak / current)
}

/// Tone bursts separated by silence, mixed with uniform noise of the given
/// amplitude and scaled to an overall peak of 0.8: a 200 Hz tone (amplitude
/// 0.2) in the first and third second of a 4 s, 16 kHz signal.
pub fn gated_tone_scenario(noise_amplitude: f64, seed: u64) -> (Array1<f64>, u32) {
    let sample_rate = 16000;
    let len = 4 * sample_rate as usize;

    let tone = tone(200.0, 0.2, len, sample_rate);
    let noise = uniform_noise(len, noise_amplitude, seed);

    let mixture = Array1::from_shape_fn(len, |i| {
        let active = i < 16000 || (32000..48000).contains(&i);
        noise[i] + if active { tone[i] } else { 0.0 }
    });

    (scale_to_peak(&mixture, 0.8), sample_rate)
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn noise_is_deterministic_and_bounded() {
        let a = uniform_noise(1000, 0.05, 1);
        let b = uniform_noise(1000, 0.05, 1);
        assert_eq!(a, b);
        assert!(a.iter().all(|v| v.abs() <= 0.05));
    }

    #[test]
    fn mixing_hits_snr() {
        let s = tone(440.0, 0.5, 16000, 16000);
        let n = uniform_noise(16000, 1.0, 2);
        let x = mix_at_snr(&s, &n, 5.0);

        let noise = &x - &s;
        let snr = 20.0 * (rms(&s) / rms(&noise)).log10();
        assert!((snr - 5.0).abs() < 1e-9);
    }

    #[test]
    fn speech_starts_with_a_pause() {
        let x = speech_like(16000, 16000);
        assert!(x.slice(ndarray::s![..2400]).iter().all(|v| *v == 0.0));
        assert!(x.slice(ndarray::s![2400..6400]).iter().any(|v| v.abs() > 0.1));
    }

    #[test]
    fn scenario_peak() {
        let (x, sr) = gated_tone_scenario(0.3, 3);
        assert_eq!(sr, 16000);
        assert_eq!(x.len(), 64000);

        let peak = x.iter().fold(0.0_f64, |a, v| a.max(v.abs()));
        assert!((peak - 0.8).abs() < 1e-12);
    }
}
