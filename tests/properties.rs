mod common;

use common::synth;

use ndarray::{s, Array1};

use spenh::ft::{InversionMethod, IstftBuilder, Padding, StftBuilder};
use spenh::level::CLIPPING_CEILING;
use spenh::proc::utils::process_spectrum;
use spenh::subtraction::{subtract_passes, SpectralSubtraction};
use spenh::{enhance, noise, window};
use spenh::{EnhancementProfile, ErrorKind, Profile, Waveform};


const SAMPLE_RATE: u32 = 16000;

fn peak(x: &Array1<f64>) -> f64 {
    x.iter().fold(0.0, |a, v| a.max(v.abs()))
}

fn mean_square(x: &[f64]) -> f64 {
    x.iter().map(|v| v * v).sum::<f64>() / x.len().max(1) as f64
}

fn noisy_speech(len: usize, snr_db: f64, seed: u64) -> Array1<f64> {
    let speech = synth::speech_like(len, SAMPLE_RATE);
    let noise = synth::uniform_noise(len, 1.0, seed);
    synth::mix_at_snr(&speech, &noise, snr_db)
}

fn run(samples: Array1<f64>, profile: Profile) -> spenh::Enhanced<f64> {
    let input = Waveform::new(samples, SAMPLE_RATE).unwrap();
    enhance(&input, profile).unwrap()
}


#[test]
fn analysis_synthesis_reconstructs_input() {
    let frame = 1024;
    let hop = 256;

    let w = window::periodic(window::hann::<f64>(frame));
    let stft = StftBuilder::new(&w).overlap(frame - hop).padding(Padding::Zero).build().unwrap();
    let istft = IstftBuilder::new(&w)
        .overlap(frame - hop)
        .padding(Padding::Zero)
        .method(InversionMethod::Weighted)
        .remove_padding(true)
        .build()
        .unwrap();

    for (i, &len) in [1024, 1500, 4096, 16037].iter().enumerate() {
        let x = synth::uniform_noise(len, 0.9, i as u64);
        let y = istft.process(&stft.process(&x), len);

        assert_eq!(y.len(), len);
        for (a, b) in x.iter().zip(y.iter()) {
            assert!((a - b).abs() < 1e-9, "len {}: {} vs {}", len, a, b);
        }
    }
}

#[test]
fn analysis_synthesis_reconstructs_input_with_half_overlap() {
    let w = window::periodic(window::hamming::<f64>(512));
    let stft = StftBuilder::new(&w).overlap(256).padding(Padding::Zero).build().unwrap();
    let istft = IstftBuilder::new(&w)
        .overlap(256)
        .padding(Padding::Zero)
        .method(InversionMethod::Weighted)
        .remove_padding(true)
        .build()
        .unwrap();

    let x = noisy_speech(8000, 10.0, 11);
    let y = istft.process(&stft.process(&x), x.len());

    for (a, b) in x.iter().zip(y.iter()) {
        assert!((a - b).abs() < 1e-9);
    }
}

#[test]
fn subtraction_never_drops_below_spectral_floor() {
    let w = window::periodic(window::hann::<f64>(1024));
    let stft = StftBuilder::new(&w).overlap(768).padding(Padding::Zero).build().unwrap();

    let x = noisy_speech(32000, 5.0, 1);
    let spectrum = stft.process(&x);
    let estimate = noise::estimate(&spectrum, 0.15);

    for &p in Profile::ALL.iter() {
        let settings = EnhancementProfile::for_profile(p);
        let mut current = spectrum.clone();

        for pass in 0..settings.passes {
            let alpha = settings.alpha + settings.alpha_step * pass as f64;
            let mut sub = SpectralSubtraction::new(&estimate, alpha, settings.beta);
            let next = process_spectrum(&mut sub, &current);

            for (a, b) in current.iter().zip(next.iter()) {
                assert!(b.norm() >= settings.beta * a.norm() * (1.0 - 1e-12),
                        "{}: {} < {} * {}", p, b.norm(), settings.beta, a.norm());
            }

            current = next;
        }

        let out = subtract_passes(&spectrum, &estimate, settings.alpha, settings.alpha_step, settings.beta,
                                  settings.passes);
        for (a, b) in spectrum.iter().zip(out.iter()) {
            assert!(b.norm() >= settings.beta * a.norm() * (1.0 - 1e-12),
                    "{} after all passes: {} < {} * {}", p, b.norm(), settings.beta, a.norm());
        }
    }
}

#[test]
fn loudness_is_kept_unless_limited() {
    let x = synth::scale_to_peak(&noisy_speech(32000, 15.0, 2), 0.5);
    let in_rms = synth::rms(&x);

    for &p in Profile::ALL.iter() {
        let settings = EnhancementProfile::for_profile(p);
        let out = run(x.clone(), p);
        let y = out.waveform.samples();
        let level = out.report.level;

        if level.ceiling_limited {
            assert!(peak(y) <= CLIPPING_CEILING, "{}", p);
        } else {
            assert!(!level.boost_capped, "{}: boost capped at {} dB", p, level.gain_db);

            let target = in_rms * 10f64.powf(settings.min_gain_db / 20.0);
            assert!(synth::rms(y) >= target * (1.0 - 1e-9), "{}: {} < {}", p, synth::rms(y), target);
        }
    }
}

#[test]
fn heavy_profiles_keep_speech_in_loud_noise() {
    for &seed in [12u64, 13].iter() {
        let x = synth::scale_to_peak(&noisy_speech(32000, 0.0, seed), 0.5);
        let in_rms = synth::rms(&x);

        for &p in Profile::ALL.iter() {
            let settings = EnhancementProfile::for_profile(p);
            let out = run(x.clone(), p);
            let y = out.waveform.samples();
            let level = out.report.level;

            assert!(!level.boost_capped, "{} (seed {}): boost capped at {} dB", p, seed, level.gain_db);

            if !level.ceiling_limited {
                let target = in_rms * 10f64.powf(settings.min_gain_db / 20.0);
                assert!(synth::rms(y) >= target * (1.0 - 1e-9), "{} (seed {}): {} < {}", p, seed, synth::rms(y), target);
            }

            // the syllables, not the pauses, carry the output
            let speech = synth::speech_like(x.len(), SAMPLE_RATE);
            let (mut active, mut pause) = (Vec::new(), Vec::new());
            for (v, s) in y.iter().zip(speech.iter()) {
                if *s == 0.0 { pause.push(*v) } else { active.push(*v) }
            }
            assert!(mean_square(&active) > mean_square(&pause), "{} (seed {})", p, seed);
        }
    }
}

#[test]
fn output_never_exceeds_ceiling() {
    let len = 24000;

    let inputs = vec![
        synth::scale_to_peak(&noisy_speech(len, 5.0, 3), 1.0),
        synth::scale_to_peak(&noisy_speech(len, 30.0, 4), 0.99),
        synth::uniform_noise(len, 1.0, 5),
        synth::scale_to_peak(&synth::tone(3000.0, 1.0, len, SAMPLE_RATE), 1.0),
        synth::uniform_noise(300, 0.8, 6),
        {
            let mut clicks = synth::uniform_noise(len, 0.001, 7);
            for i in (1000..len).step_by(4000) {
                clicks[i] = 1.0;
                clicks[i + 1] = -1.0;
            }
            clicks
        },
    ];

    for (i, x) in inputs.into_iter().enumerate() {
        for &p in Profile::ALL.iter() {
            let out = run(x.clone(), p);
            let y = out.waveform.samples();

            assert_eq!(y.len(), x.len());
            assert!(y.iter().all(|v| v.is_finite()));
            assert!(peak(y) <= CLIPPING_CEILING, "input {}, {}: peak {}", i, p, peak(y));
        }
    }
}

#[test]
fn stronger_profiles_leave_less_noise() {
    let x = noisy_speech(32000, 5.0, 8);

    let residuals: Vec<f64> = Profile::ALL.iter()
        .map(|&p| run(x.clone(), p).report.residual_noise_db.unwrap())
        .collect();

    for (pair, names) in residuals.windows(2).zip(Profile::ALL.windows(2)) {
        assert!(pair[1] < pair[0], "{} ({} dB) vs {} ({} dB)", names[1], pair[1], names[0], pair[0]);
    }

    // the weakest profile must do something at all, and the measure must not
    // bottom out at the dB clamp
    assert!(residuals[0] < -1.0);
    assert!(residuals.iter().all(|r| *r > -119.0), "{:?}", residuals);
}

#[test]
fn stronger_subtraction_leaves_less_noise() {
    let w = window::periodic(window::hann::<f64>(1024));
    let stft = StftBuilder::new(&w).overlap(768).padding(Padding::Zero).build().unwrap();

    let spectrum = stft.process(&noisy_speech(32000, 5.0, 9));
    let estimate = noise::estimate(&spectrum, 0.15);

    let energy = |s: &ndarray::Array2<num::Complex<f64>>| -> f64 {
        estimate.frames().iter()
            .map(|&i| s.row(i).iter().map(|c| c.norm_sqr()).sum::<f64>())
            .sum()
    };

    let residuals: Vec<f64> = Profile::ALL.iter()
        .map(|&p| {
            let c = EnhancementProfile::for_profile(p);
            energy(&subtract_passes(&spectrum, &estimate, c.alpha, c.alpha_step, c.beta, c.passes))
        })
        .collect();

    for pair in residuals.windows(2) {
        assert!(pair[1] < pair[0], "{:?}", residuals);
    }
}

#[test]
fn gated_tone_keeps_tone_and_removes_gaps() {
    let tone = |s: &Array1<f64>| {
        let mut v = s.slice(s![0..16000]).to_vec();
        v.extend(s.slice(s![32000..48000]).iter());
        v
    };
    let gaps = |s: &Array1<f64>| {
        let mut v = s.slice(s![16000..32000]).to_vec();
        v.extend(s.slice(s![48000..64000]).iter());
        v
    };

    for &amplitude in [0.05, 0.2, 0.3].iter() {
        for &seed in [1u64, 2, 3].iter() {
            let (x, sample_rate) = synth::gated_tone_scenario(amplitude, seed);
            assert_eq!(sample_rate, SAMPLE_RATE);

            let out = run(x.clone(), Profile::Extreme);
            let y = out.waveform.samples();
            assert!(out.report.stages.contains(&spenh::Stage::VadGating));

            let tone_out = mean_square(&tone(y));
            let gaps_out = mean_square(&gaps(y));
            let ratio_db = 10.0 * (gaps_out / tone_out).log10();
            assert!(ratio_db < -40.0, "noise {}, seed {}: gaps at {} dB relative to tone", amplitude, seed, ratio_db);

            let drop_db = 10.0 * (tone_out / mean_square(&tone(&x))).log10();
            assert!(drop_db >= -6.0, "noise {}, seed {}: tone dropped by {} dB", amplitude, seed, -drop_db);

            assert!(peak(y) <= 0.99);
        }
    }
}

#[test]
fn noise_only_input_is_not_amplified() {
    let white = synth::uniform_noise(32000, 0.3, 10);

    // crude low-pass noise
    let mut brown = Array1::<f64>::zeros(32000);
    for i in 1..brown.len() {
        brown[i] = 0.95 * brown[i - 1] + 0.05 * white[i];
    }
    let brown = synth::scale_to_peak(&brown, 0.5);

    for x in [white, brown].iter() {
        let in_rms = synth::rms(x);

        for &p in Profile::ALL.iter() {
            let settings = EnhancementProfile::for_profile(p);
            let out = run(x.clone(), p);

            let limit = in_rms * 10f64.powf(settings.min_gain_db / 20.0);
            assert!(synth::rms(out.waveform.samples()) <= limit * (1.0 + 1e-9), "{}", p);
        }
    }
}

#[test]
fn rejects_bad_input() {
    let err = Waveform::new(Array1::<f64>::zeros(0), SAMPLE_RATE).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    let err = "ultra".parse::<Profile>().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidProfile);
}
