//! Per-frame spectral processing.

pub mod utils;


use ndarray::{ArrayView1, ArrayViewMut1};
use num::Complex;


/// A stage that maps one spectral frame to another.
///
/// Implementations see the full (two-sided) FFT frame and must keep
/// conjugate symmetry, i.e. treat bin `k` and bin `n - k` alike.
pub trait Processor<T> {
    fn block_size(&self) -> usize;
    fn process(&mut self, spectrum_in: ArrayView1<Complex<T>>, spectrum_out: ArrayViewMut1<Complex<T>>);
}

impl<T, P> Processor<T> for Box<P>
where
    P: Processor<T> + ?Sized,
{
    fn block_size(&self) -> usize {
        self.as_ref().block_size()
    }

    fn process(&mut self, spectrum_in: ArrayView1<Complex<T>>, spectrum_out: ArrayViewMut1<Complex<T>>) {
        self.as_mut().process(spectrum_in, spectrum_out)
    }
}

impl<T, P> Processor<T> for &mut P
where
    P: Processor<T> + ?Sized,
{
    fn block_size(&self) -> usize {
        (**self).block_size()
    }

    fn process(&mut self, spectrum_in: ArrayView1<Complex<T>>, spectrum_out: ArrayViewMut1<Complex<T>>) {
        (**self).process(spectrum_in, spectrum_out)
    }
}
