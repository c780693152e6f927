//! Static speech clarity emphasis mask.

use crate::math::Real;
use crate::proc::{utils, Processor};

use ndarray::{Array1, ArrayBase, ArrayView1, ArrayViewMut1, Data, Ix1};
use num::{Complex, Float};
use serde::{Deserialize, Serialize};


/// Gains of the clarity mask per frequency region.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct ClarityParameters {
    /// Below 80 Hz.
    #[serde(default = "param_defaults::rumble")]
    pub rumble: f64,

    /// 80 Hz to 250 Hz.
    pub fundamental: f64,

    /// 250 Hz to 800 Hz.
    pub formant: f64,

    /// 800 Hz to 4 kHz.
    pub intelligibility: f64,

    /// 2 kHz to 4 kHz, overrides `intelligibility` if set.
    #[serde(default)]
    pub consonant: Option<f64>,

    /// Above 7 kHz.
    #[serde(default = "param_defaults::air")]
    pub air: f64,
}

impl ClarityParameters {
    pub fn moderate() -> Self {
        ClarityParameters {
            rumble: param_defaults::rumble(),
            fundamental: 1.2,
            formant: 1.3,
            intelligibility: 1.5,
            consonant: None,
            air: param_defaults::air(),
        }
    }

    pub fn strong() -> Self {
        ClarityParameters {
            fundamental: 1.5,
            formant: 2.0,
            intelligibility: 2.5,
            ..Self::moderate()
        }
    }

    pub fn aggressive() -> Self {
        ClarityParameters {
            fundamental: 2.0,
            formant: 2.5,
            intelligibility: 3.5,
            consonant: Some(4.0),
            ..Self::moderate()
        }
    }

    /// Mask value at absolute frequency `f` (in Hz).
    pub fn gain_at(&self, f: f64) -> f64 {
        match f {
            f if f < 80.0   => self.rumble,
            f if f < 250.0  => self.fundamental,
            f if f < 800.0  => self.formant,
            f if f < 2000.0 => self.intelligibility,
            f if f < 4000.0 => self.consonant.unwrap_or(self.intelligibility),
            f if f > 7000.0 => self.air,
            _               => 1.0,
        }
    }
}

mod param_defaults {
    pub fn rumble() -> f64 {
        0.1
    }

    pub fn air() -> f64 {
        0.3
    }
}


#[derive(Debug, Clone)]
pub struct ClarityMask<T> {
    gains: Array1<T>,
}

impl<T: Real> ClarityMask<T> {
    /// Build the mask for the given (signed) bin frequencies.
    pub fn new<D>(freqs: &ArrayBase<D, Ix1>, params: &ClarityParameters) -> Self
    where
        D: Data<Elem = T>,
    {
        let gains = freqs.mapv(|f| T::from_unchecked(params.gain_at(Float::abs(f).to_f64_unchecked())));
        ClarityMask { gains }
    }

    pub fn gains(&self) -> ArrayView1<T> {
        self.gains.view()
    }
}

impl<T: Real> Processor<T> for ClarityMask<T> {
    fn block_size(&self) -> usize {
        self.gains.len()
    }

    fn process(&mut self, spectrum_in: ArrayView1<Complex<T>>, spectrum_out: ArrayViewMut1<Complex<T>>) {
        let gains = &self.gains;
        utils::map_magnitude(spectrum_in, spectrum_out, |k, m| m * gains[k]);
    }
}
