//! Short-time Fourier transform and its inverse.

use crate::error::{self, Result};
use crate::math::{self, NumCastUnchecked, Real};
use crate::window::WindowFunction;

use std::sync::Arc;

use ndarray::{s, Array1, Array2, ArrayBase, ArrayView1, Axis, Data, Ix1, Ix2};
use num::{Complex, Float, Zero};
use rustfft::{Fft, FftPlanner};
use snafu::ensure;


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Padding {
    /// Start with the first full frame, zero-fill only the last one.
    None,

    /// Pad `frame_len - hop` zeros on both sides, so every input sample is
    /// covered by the same number of frames.
    Zero,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InversionMethod {
    Basic,      // overlap-add
    Weighted,   // weighted overlap-add
}


fn overlap_sums<T: Float>(window: &Array1<T>, hop: usize, power: i32) -> Array1<T> {
    let mut sums = Array1::from_elem(hop, T::zero());
    for (i, w) in window.iter().enumerate() {
        sums[i % hop] = sums[i % hop] + w.powi(power);
    }
    sums
}

/// Check the non-zero overlap-add condition: the squared window summed over
/// all shifts never drops below `eps`.
pub fn check_nola<T, W>(window: &W, hop: usize, eps: T) -> bool
where
    T: Float,
    W: WindowFunction<T> + ?Sized,
{
    if hop == 0 || hop > window.len() {
        return false;
    }

    let sums = overlap_sums(&window.to_array(), hop, 2);
    sums.fold(T::infinity(), |a, b| a.min(*b)) > eps
}

/// Check the (weak) constant overlap-add condition for the given inversion
/// method.
pub fn check_cola<T, W>(window: &W, hop: usize, method: InversionMethod, eps: T) -> bool
where
    T: Float,
    W: WindowFunction<T> + ?Sized,
{
    if hop == 0 || hop > window.len() {
        return false;
    }

    let power = match method {
        InversionMethod::Basic    => 1,
        InversionMethod::Weighted => 2,
    };

    let sums = overlap_sums(&window.to_array(), hop, power);
    let mean = sums.iter().fold(T::zero(), |a, b| a + *b) / T::from(hop).unwrap_or_else(T::one);
    sums.fold(T::zero(), |a, b| a.max((*b - mean).abs())) < eps
}

/// Signed center frequency of each FFT bin, in `numpy.fft.fftfreq` order.
pub fn spectrum_freqs<T: Float + NumCastUnchecked>(fft_len: usize, sample_rate: f64) -> Array1<T> {
    let df = sample_rate / fft_len as f64;

    Array1::from_shape_fn(fft_len, |k| {
        if k < (fft_len + 1) / 2 {
            T::from_unchecked(k as f64 * df)
        } else {
            T::from_unchecked((k as f64 - fft_len as f64) * df)
        }
    })
}


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Framing {
    frame_len: usize,
    hop: usize,
    padding: Padding,
}

impl Framing {
    fn front(&self) -> usize {
        match self.padding {
            Padding::None => 0,
            Padding::Zero => self.frame_len - self.hop,
        }
    }

    fn num_frames(&self, len: usize) -> usize {
        let covered = len + 2 * self.front();

        if covered <= self.frame_len {
            1
        } else {
            (covered - self.frame_len + self.hop - 1) / self.hop + 1
        }
    }

    fn padded_len(&self, len: usize) -> usize {
        (self.num_frames(len) - 1) * self.hop + self.frame_len
    }
}

fn validate_framing(frame_len: usize, fft_len: usize, overlap: usize) -> Result<()> {
    ensure!(frame_len > 0, error::InvalidParametersSnafu {
        reason: "window must not be empty".to_string(),
    });
    ensure!(overlap < frame_len, error::InvalidParametersSnafu {
        reason: format!("overlap ({}) must be smaller than the frame length ({})", overlap, frame_len),
    });
    ensure!(fft_len >= frame_len, error::InvalidParametersSnafu {
        reason: format!("FFT length ({}) must not be smaller than the frame length ({})", fft_len, frame_len),
    });
    Ok(())
}


pub struct StftBuilder<T> {
    window: Array1<T>,
    fft_len: usize,
    overlap: Option<usize>,
    padding: Padding,
}

impl<T: Real> StftBuilder<T> {
    pub fn new<W>(window: &W) -> Self
    where
        W: WindowFunction<T> + ?Sized,
    {
        Self::with_len(window, window.len())
    }

    pub fn with_len<W>(window: &W, fft_len: usize) -> Self
    where
        W: WindowFunction<T> + ?Sized,
    {
        StftBuilder {
            window: window.to_array(),
            fft_len,
            overlap: None,
            padding: Padding::None,
        }
    }

    pub fn overlap(mut self, overlap: usize) -> Self {
        self.overlap = Some(overlap);
        self
    }

    pub fn padding(mut self, padding: Padding) -> Self {
        self.padding = padding;
        self
    }

    pub fn build(self) -> Result<Stft<T>> {
        let frame_len = self.window.len();
        let overlap = self.overlap.unwrap_or(frame_len / 2);
        validate_framing(frame_len, self.fft_len, overlap)?;

        let fft = FftPlanner::new().plan_fft_forward(self.fft_len);

        Ok(Stft {
            framing: Framing { frame_len, hop: frame_len - overlap, padding: self.padding },
            fft_len: self.fft_len,
            window: self.window,
            fft,
        })
    }
}


pub struct Stft<T> {
    framing: Framing,
    fft_len: usize,
    window: Array1<T>,
    fft: Arc<dyn Fft<T>>,
}

impl<T: Real> Stft<T> {
    pub fn frame_len(&self) -> usize {
        self.framing.frame_len
    }

    pub fn hop(&self) -> usize {
        self.framing.hop
    }

    pub fn fft_len(&self) -> usize {
        self.fft_len
    }

    pub fn num_frames(&self, len: usize) -> usize {
        self.framing.num_frames(len)
    }

    pub fn spectrum_freqs(&self, sample_rate: f64) -> Array1<T> {
        spectrum_freqs(self.fft_len, sample_rate)
    }

    /// Transform a real signal into a `(frames, fft_len)` complex spectrum.
    pub fn process<D>(&self, input: &ArrayBase<D, Ix1>) -> Array2<Complex<T>>
    where
        D: Data<Elem = T>,
    {
        let frames = self.num_frames(input.len());
        let front = self.framing.front() as isize;

        let mut output = Array2::zeros((frames, self.fft_len));
        let mut buffer = vec![Complex::zero(); self.fft_len];

        for (k, mut row) in output.axis_iter_mut(Axis(0)).enumerate() {
            let start = (k * self.framing.hop) as isize - front;

            buffer.iter_mut().for_each(|v| *v = Complex::zero());
            for (i, w) in self.window.iter().enumerate() {
                let idx = start + i as isize;
                if idx >= 0 && (idx as usize) < input.len() {
                    buffer[i] = Complex::new(input[idx as usize] * *w, T::zero());
                }
            }

            self.fft.process(&mut buffer);
            row.assign(&ArrayView1::from(&buffer[..]));
        }

        output
    }
}


pub struct IstftBuilder<T> {
    window: Array1<T>,
    fft_len: usize,
    overlap: Option<usize>,
    padding: Padding,
    method: InversionMethod,
    remove_padding: bool,
}

impl<T: Real> IstftBuilder<T> {
    pub fn new<W>(window: &W) -> Self
    where
        W: WindowFunction<T> + ?Sized,
    {
        Self::with_len(window, window.len())
    }

    pub fn with_len<W>(window: &W, fft_len: usize) -> Self
    where
        W: WindowFunction<T> + ?Sized,
    {
        IstftBuilder {
            window: window.to_array(),
            fft_len,
            overlap: None,
            padding: Padding::None,
            method: InversionMethod::Weighted,
            remove_padding: false,
        }
    }

    pub fn overlap(mut self, overlap: usize) -> Self {
        self.overlap = Some(overlap);
        self
    }

    pub fn padding(mut self, padding: Padding) -> Self {
        self.padding = padding;
        self
    }

    pub fn method(mut self, method: InversionMethod) -> Self {
        self.method = method;
        self
    }

    pub fn remove_padding(mut self, remove: bool) -> Self {
        self.remove_padding = remove;
        self
    }

    pub fn build(self) -> Result<Istft<T>> {
        let frame_len = self.window.len();
        let overlap = self.overlap.unwrap_or(frame_len / 2);
        validate_framing(frame_len, self.fft_len, overlap)?;

        let ifft = FftPlanner::new().plan_fft_inverse(self.fft_len);

        Ok(Istft {
            framing: Framing { frame_len, hop: frame_len - overlap, padding: self.padding },
            fft_len: self.fft_len,
            window: self.window,
            method: self.method,
            remove_padding: self.remove_padding,
            ifft,
        })
    }
}


pub struct Istft<T> {
    framing: Framing,
    fft_len: usize,
    window: Array1<T>,
    method: InversionMethod,
    remove_padding: bool,
    ifft: Arc<dyn Fft<T>>,
}

impl<T: Real> Istft<T> {
    /// Overlap-add the spectrum back into a signal.
    ///
    /// With `remove_padding` set, the output is aligned to and truncated to
    /// `len` samples (the length of the analyzed signal). Otherwise the full
    /// padded signal is returned.
    pub fn process<D>(&self, spectrum: &ArrayBase<D, Ix2>, len: usize) -> Array1<T>
    where
        D: Data<Elem = Complex<T>>,
    {
        let frames = spectrum.shape()[0];
        let total = (frames.max(1) - 1) * self.framing.hop + self.framing.frame_len;
        let scale = T::one() / T::from_usize_unchecked(self.fft_len);

        let mut output = Array1::zeros(total);
        let mut norm = Array1::zeros(total);
        let mut buffer = vec![Complex::zero(); self.fft_len];

        for (k, row) in spectrum.axis_iter(Axis(0)).enumerate() {
            buffer.iter_mut().zip(row.iter()).for_each(|(b, v)| *b = *v);
            self.ifft.process(&mut buffer);

            let start = k * self.framing.hop;
            for (i, w) in self.window.iter().enumerate() {
                let x = buffer[i].re * scale;

                match self.method {
                    InversionMethod::Basic => {
                        output[start + i] += x;
                        norm[start + i] += *w;
                    },
                    InversionMethod::Weighted => {
                        output[start + i] += x * *w;
                        norm[start + i] += *w * *w;
                    },
                }
            }
        }

        let eps = T::from_unchecked(math::EPSILON);
        output.zip_mut_with(&norm, |x, n| {
            *x = if *n > eps { math::safe_div(*x, *n, T::zero()) } else { T::zero() };
        });

        if !self.remove_padding {
            return output;
        }

        let front = self.framing.front().min(output.len());
        let end = (front + len).min(output.len());

        let mut trimmed = Array1::zeros(len);
        trimmed.slice_mut(s![..end - front]).assign(&output.slice(s![front..end]));
        trimmed
    }

    /// Length of the padded signal before `remove_padding` is applied.
    pub fn padded_len(&self, len: usize) -> usize {
        self.framing.padded_len(len)
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::window;

    fn analysis(frame_len: usize, hop: usize) -> (Stft<f64>, Istft<f64>) {
        let w = window::periodic(window::hann::<f64>(frame_len));

        let stft = StftBuilder::new(&w)
            .overlap(frame_len - hop)
            .padding(Padding::Zero)
            .build()
            .unwrap();

        let istft = IstftBuilder::new(&w)
            .overlap(frame_len - hop)
            .padding(Padding::Zero)
            .method(InversionMethod::Weighted)
            .remove_padding(true)
            .build()
            .unwrap();

        (stft, istft)
    }

    #[test]
    fn reconstructs_signal() {
        let x = Array1::from_shape_fn(1000, |i| ((i * 37 % 101) as f64 / 50.0) - 1.0);
        let (stft, istft) = analysis(256, 64);

        let spec = stft.process(&x);
        assert_eq!(spec.shape()[1], 256);

        let y = istft.process(&spec, x.len());
        assert_eq!(y.len(), x.len());
        for (a, b) in x.iter().zip(y.iter()) {
            assert!((a - b).abs() < 1e-9, "{} vs {}", a, b);
        }
    }

    #[test]
    fn reconstructs_signal_shorter_than_a_frame() {
        let x = Array1::from_shape_fn(100, |i| (i as f64 * 0.1).sin());
        let (stft, istft) = analysis(256, 128);

        let y = istft.process(&stft.process(&x), x.len());
        assert_eq!(y.len(), 100);
        for (a, b) in x.iter().zip(y.iter()) {
            assert!((a - b).abs() < 1e-9);
        }
    }

    #[test]
    fn zero_padding_covers_tail() {
        let (stft, istft) = analysis(8, 2);
        // 6 zeros in front, frames must reach 6 samples past the end
        assert_eq!(stft.num_frames(10), 8);
        assert_eq!(istft.padded_len(10), 22);
    }

    #[test]
    fn rejects_invalid_framing() {
        let w = window::hann::<f64>(64);
        assert!(StftBuilder::new(&w).overlap(64).build().is_err());
        assert!(StftBuilder::with_len(&w, 32).build().is_err());
    }

    #[test]
    fn overlap_conditions() {
        let w = window::periodic(window::hann::<f64>(512));
        assert!(check_nola(&w, 128, 1e-6));
        assert!(check_cola(&w, 256, InversionMethod::Basic, 1e-9));
        assert!(check_cola(&w, 128, InversionMethod::Weighted, 1e-9));
        assert!(!check_cola(&w, 200, InversionMethod::Basic, 1e-3));

        let rect = window::rectangular::<f64>(16);
        assert!(!check_nola(&rect, 17, 1e-6));
        assert!(!check_nola(&rect, 0, 1e-6));
    }

    #[test]
    fn bin_frequencies_are_signed() {
        let f: Array1<f64> = spectrum_freqs(8, 8000.0);
        assert_eq!(f.to_vec(), vec![0.0, 1000.0, 2000.0, 3000.0, -4000.0, -3000.0, -2000.0, -1000.0]);
    }
}
