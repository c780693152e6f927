use super::Processor;

use crate::math::{self, Real};

use ndarray::{Array2, ArrayBase, ArrayView1, ArrayViewMut1, Axis, Data, DataMut, Ix2, Zip};
use num::Complex;


pub fn process_spectrum_into<T, P, D1, D2>(processor: &mut P, input: &ArrayBase<D1, Ix2>, output: &mut ArrayBase<D2, Ix2>)
where
    P: Processor<T> + ?Sized,
    D1: Data<Elem = Complex<T>>,
    D2: DataMut<Elem = Complex<T>>,
{
    assert_eq!(processor.block_size(), input.shape()[1], "processor block size does not match the frame length");
    assert_eq!(input.shape(), output.shape());

    for (y_in, y_out) in input.axis_iter(Axis(0)).zip(output.axis_iter_mut(Axis(0))) {
        processor.process(y_in, y_out);
    }
}

pub fn process_spectrum<T, P, D>(processor: &mut P, input: &ArrayBase<D, Ix2>) -> Array2<Complex<T>>
where
    T: Real,
    P: Processor<T> + ?Sized,
    D: Data<Elem = Complex<T>>,
{
    let mut output = Array2::zeros(input.raw_dim());
    process_spectrum_into(processor, input, &mut output);
    output
}

/// Replace the magnitude of every bin by `f(bin, magnitude)`, keeping the phase.
pub fn map_magnitude<T, F>(spectrum_in: ArrayView1<Complex<T>>, mut spectrum_out: ArrayViewMut1<Complex<T>>, mut f: F)
where
    T: Real,
    F: FnMut(usize, T) -> T,
{
    let eps = T::from_unchecked(math::EPSILON);

    Zip::indexed(&mut spectrum_out).and(&spectrum_in).for_each(|k, y, x| {
        let m = x.norm();
        let target = f(k, m);

        *y = if m > eps {
            *x * (target / m)
        } else {
            Complex::new(target, T::zero())
        };
    });
}
