//! Mono waveforms and WAV file I/O.

use crate::error::{self, Result};
use crate::math::Real;

use std::io::{Read, Seek, Write};
use std::path::Path;

use dasp::sample::{FromSample, Sample, I24};
use hound::{SampleFormat, WavReader, WavSamples, WavSpec, WavWriter};
use ndarray::{Array1, Array2, ArrayBase, Axis, Data, Ix2};
use num::Zero;
use snafu::{ensure, ResultExt};


/// Single-channel signal with its sample rate.
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform<T> {
    samples: Array1<T>,
    sample_rate: u32,
}

impl<T: Real> Waveform<T> {
    /// Wrap `samples`, rejecting empty or non-finite input.
    pub fn new(samples: Array1<T>, sample_rate: u32) -> Result<Self> {
        ensure!(!samples.is_empty(), error::InvalidInputSnafu {
            reason: "waveform is empty".to_string(),
        });
        ensure!(sample_rate > 0, error::InvalidInputSnafu {
            reason: "sample rate must be positive".to_string(),
        });
        ensure!(samples.iter().all(|x| x.is_finite()), error::InvalidInputSnafu {
            reason: "waveform contains non-finite samples".to_string(),
        });

        Ok(Waveform { samples, sample_rate })
    }

    /// Build from a `(samples, channels)` array. Only mono data is accepted.
    pub fn from_channels<D>(data: &ArrayBase<D, Ix2>, sample_rate: u32) -> Result<Self>
    where
        D: Data<Elem = T>,
    {
        let channels = data.shape()[1];
        ensure!(channels == 1, error::InvalidInputSnafu {
            reason: format!("expected a single channel, got {}", channels),
        });

        Self::new(data.index_axis(Axis(1), 0).to_owned(), sample_rate)
    }

    pub fn samples(&self) -> &Array1<T> {
        &self.samples
    }

    pub fn into_samples(self) -> Array1<T> {
        self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds.
    pub fn duration(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }
}


pub trait WavReaderExt {
    /// Read all samples as `(samples, channels)`, converting from the stored
    /// format to `T`.
    fn collect_convert<S, T>(self) -> Result<(Array2<T>, WavSpec)>
    where
        T: Sample + FromSample<S> + Zero + Clone,
        S: RawSample,
        S::Raw: hound::Sample;

    /// Like [`collect_convert`](WavReaderExt::collect_convert), dispatching on
    /// the format found in the header.
    fn collect_convert_dyn<T>(self) -> Result<(Array2<T>, WavSpec)>
    where
        T: Sample + FromSignedSample + FromSample<f32> + Zero + Clone;
}

impl<R: Read> WavReaderExt for WavReader<R> {
    fn collect_convert<S, T>(mut self) -> Result<(Array2<T>, WavSpec)>
    where
        T: Sample + FromSample<S> + Zero + Clone,
        S: RawSample,
        S::Raw: hound::Sample,
    {
        let spec = self.spec();
        let samples = self.duration() as usize;
        let channels = spec.channels as usize;

        let mut iter = Convert::<_, S, T> {
            iter: self.samples(),
            _p: std::marker::PhantomData,
        };

        let mut data = Array2::zeros((samples, channels));
        for i in 0..samples {
            for c in 0..channels {
                data[(i, c)] = match iter.next() {
                    Some(x) => x.context(error::WavSnafu)?,
                    None => {
                        return error::InvalidInputSnafu { reason: "truncated WAV data".to_string() }.fail();
                    },
                };
            }
        }

        Ok((data, spec))
    }

    fn collect_convert_dyn<T>(self) -> Result<(Array2<T>, WavSpec)>
    where
        T: Sample + FromSignedSample + FromSample<f32> + Zero + Clone,
    {
        let spec = self.spec();

        match (spec.sample_format, spec.bits_per_sample) {
            (SampleFormat::Float, 32) => self.collect_convert::<f32, T>(),
            (SampleFormat::Int,    8) => self.collect_convert::<i8, T>(),
            (SampleFormat::Int,   16) => self.collect_convert::<i16, T>(),
            (SampleFormat::Int,   24) => self.collect_convert::<I24, T>(),
            (SampleFormat::Int,   32) => self.collect_convert::<i32, T>(),
            (format, bits) => error::InvalidInputSnafu {
                reason: format!("unsupported WAV sample format: {:?} with {} bits", format, bits),
            }.fail(),
        }
    }
}


/// Sample type as stored in a WAV file.
pub trait RawSample: Sample {
    type Raw: Copy;

    fn from_raw(raw: Self::Raw) -> Self;
}

impl RawSample for i8 {
    type Raw = i8;

    fn from_raw(raw: Self::Raw) -> Self { raw }
}

impl RawSample for i16 {
    type Raw = i16;

    fn from_raw(raw: Self::Raw) -> Self { raw }
}

impl RawSample for I24 {
    type Raw = i32;

    fn from_raw(raw: Self::Raw) -> Self { I24::new_unchecked(raw) }
}

impl RawSample for i32 {
    type Raw = i32;

    fn from_raw(raw: Self::Raw) -> Self { raw }
}

impl RawSample for f32 {
    type Raw = f32;

    fn from_raw(raw: Self::Raw) -> Self { raw }
}


pub trait FromSignedSample: FromSample<i8> + FromSample<i16> + FromSample<I24> + FromSample<i32> {}

impl<T> FromSignedSample for T
where
    T: FromSample<i8> + FromSample<i16> + FromSample<I24> + FromSample<i32>
{}


struct Convert<'r, R, S, T>
where
    S: RawSample,
    S::Raw: hound::Sample,
{
    iter: WavSamples<'r, R, S::Raw>,
    _p: std::marker::PhantomData<*const T>,
}

impl<'r, R, S, T> Iterator for Convert<'r, R, S, T>
where
    R: Read,
    S: RawSample,
    S::Raw: hound::Sample,
    T: Sample + FromSample<S>,
{
    type Item = Result<T, hound::Error>;

    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next().map(|s| s.map(|s: S::Raw| T::from_sample(S::from_raw(s))))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.iter.size_hint()
    }
}


/// Read a mono WAV file into a waveform with samples in `[-1, 1]`.
pub fn read_wav<T, P>(path: P) -> Result<Waveform<T>>
where
    T: Real + Sample + FromSignedSample + FromSample<f32>,
    P: AsRef<Path>,
{
    let reader = WavReader::open(path).context(error::WavSnafu)?;
    let (data, spec) = reader.collect_convert_dyn::<T>()?;

    Waveform::from_channels(&data, spec.sample_rate)
}

fn float_spec(sample_rate: u32) -> WavSpec {
    WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 32,
        sample_format: SampleFormat::Float,
    }
}

fn write_samples<T, W>(mut writer: WavWriter<W>, waveform: &Waveform<T>) -> Result<()>
where
    T: Real,
    W: Write + Seek,
{
    for x in waveform.samples().iter() {
        writer.write_sample(x.to_f64_unchecked() as f32).context(error::WavSnafu)?;
    }

    writer.finalize().context(error::WavSnafu)
}

/// Write a waveform as 32-bit float mono WAV.
pub fn write_wav_to<T, W>(writer: W, waveform: &Waveform<T>) -> Result<()>
where
    T: Real,
    W: Write + Seek,
{
    let writer = WavWriter::new(writer, float_spec(waveform.sample_rate())).context(error::WavSnafu)?;
    write_samples(writer, waveform)
}

pub fn write_wav<T, P>(path: P, waveform: &Waveform<T>) -> Result<()>
where
    T: Real,
    P: AsRef<Path>,
{
    let writer = WavWriter::create(path, float_spec(waveform.sample_rate())).context(error::WavSnafu)?;
    write_samples(writer, waveform)
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::io::Cursor;

    #[test]
    fn rejects_empty_and_non_finite() {
        let e = Waveform::<f64>::new(Array1::zeros(0), 16000).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::InvalidInput);

        let e = Waveform::new(Array1::from(vec![0.0, f64::NAN]), 16000).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn rejects_multichannel() {
        let data = Array2::<f64>::zeros((10, 2));
        let e = Waveform::from_channels(&data, 16000).unwrap_err();
        assert_eq!(e.kind(), ErrorKind::InvalidInput);
    }

    #[test]
    fn float_wav_roundtrip() {
        let w = Waveform::new(Array1::from(vec![0.0, 0.5, -0.25, 1.0]), 8000).unwrap();

        let mut buf = Cursor::new(Vec::new());
        write_wav_to(&mut buf, &w).unwrap();

        buf.set_position(0);
        let (data, spec) = WavReader::new(buf).unwrap().collect_convert_dyn::<f64>().unwrap();

        assert_eq!(spec.sample_rate, 8000);
        let read = Waveform::from_channels(&data, spec.sample_rate).unwrap();
        assert_eq!(read.samples(), w.samples());
    }

    #[test]
    fn converts_int16() {
        let spec = WavSpec { channels: 1, sample_rate: 16000, bits_per_sample: 16, sample_format: SampleFormat::Int };

        let mut buf = Cursor::new(Vec::new());
        {
            let mut writer = WavWriter::new(&mut buf, spec).unwrap();
            for x in [0i16, 16384, -32768].iter() {
                writer.write_sample(*x).unwrap();
            }
            writer.finalize().unwrap();
        }

        buf.set_position(0);
        let (data, _) = WavReader::new(buf).unwrap().collect_convert_dyn::<f64>().unwrap();
        assert_eq!(data.column(0).to_vec(), vec![0.0, 0.5, -1.0]);
    }
}
