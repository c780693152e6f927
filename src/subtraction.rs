//! Magnitude spectral subtraction with a spectral floor.

use crate::math::{self, Real};
use crate::noise::NoiseProfile;
use crate::proc::{utils, Processor};

use ndarray::{Array1, Array2, ArrayBase, ArrayView1, ArrayViewMut1, Data, Ix2, Zip};
use num::{Complex, Float};


/// `max(magnitude - alpha * noise, beta * magnitude)`.
pub fn subtract<T: Float>(magnitude: T, noise: T, alpha: T, beta: T) -> T {
    (magnitude - alpha * noise).max(beta * magnitude)
}

/// Noise left in each bin after subtracting `noise` from itself.
pub fn residual_noise<T: Real>(noise: &NoiseProfile<T>, alpha: T, beta: T) -> NoiseProfile<T> {
    noise.map(|_, n| subtract(n, n, alpha, beta))
}

/// Raise every bin of `spectrum` to at least `beta` times the magnitude of
/// the same bin in `reference`.
///
/// Raised bins keep their phase. Bins that were zeroed take the phase of the
/// reference.
pub fn apply_floor<T, D>(spectrum: &mut Array2<Complex<T>>, reference: &ArrayBase<D, Ix2>, beta: T)
where
    T: Real,
    D: Data<Elem = Complex<T>>,
{
    let eps = T::from_unchecked(math::EPSILON);

    Zip::from(spectrum).and(reference).for_each(|c, r| {
        let floor = beta * r.norm();
        let m = c.norm();

        if m < floor {
            *c = if m > eps { *c * (floor / m) } else { *r * beta };
        }
    });
}


/// Spectral subtraction with a (possibly bin-dependent) over-subtraction
/// factor. The phase of each bin is left untouched.
#[derive(Debug, Clone)]
pub struct SpectralSubtraction<T> {
    noise: Array1<T>,
    alpha: Array1<T>,
    beta: T,
}

impl<T: Real> SpectralSubtraction<T> {
    pub fn new(noise: &NoiseProfile<T>, alpha: T, beta: T) -> Self {
        let noise = noise.magnitudes().to_owned();
        let alpha = Array1::from_elem(noise.len(), alpha);

        SpectralSubtraction { noise, alpha, beta }
    }

    /// Subtraction with one factor per bin.
    pub fn with_bin_alpha(noise: &NoiseProfile<T>, alpha: Array1<T>, beta: T) -> Self {
        assert_eq!(noise.magnitudes().len(), alpha.len());

        SpectralSubtraction {
            noise: noise.magnitudes().to_owned(),
            alpha,
            beta,
        }
    }
}

impl<T: Real> Processor<T> for SpectralSubtraction<T> {
    fn block_size(&self) -> usize {
        self.noise.len()
    }

    fn process(&mut self, spectrum_in: ArrayView1<Complex<T>>, spectrum_out: ArrayViewMut1<Complex<T>>) {
        let (noise, alpha, beta) = (&self.noise, &self.alpha, self.beta);

        utils::map_magnitude(spectrum_in, spectrum_out, |k, m| subtract(m, noise[k], alpha[k], beta));
    }
}


/// Run `passes` rounds of subtraction, each on the output of the previous
/// one. Pass `p` (counting from zero) uses `alpha + p * alpha_step`.
///
/// Every pass subtracts only the noise the earlier passes left behind, and
/// no bin ends up below `beta` times its input magnitude.
pub fn subtract_passes<T, D>(spectrum: &ArrayBase<D, Ix2>, noise: &NoiseProfile<T>, alpha: T, alpha_step: T,
                             beta: T, passes: usize) -> Array2<Complex<T>>
where
    T: Real,
    D: Data<Elem = Complex<T>>,
{
    let mut current = spectrum.to_owned();
    let mut residual = noise.clone();

    for p in 0..passes {
        let alpha = alpha + alpha_step * T::from_usize_unchecked(p);

        current = utils::process_spectrum(&mut SpectralSubtraction::new(&residual, alpha, beta), &current);
        apply_floor(&mut current, spectrum, beta);

        residual = residual_noise(&residual, alpha, beta).floored(noise, beta);
    }

    current
}
