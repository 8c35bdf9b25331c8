//! Real-signal spectral transforms between HRIRs and HRTFs
//!
//! Only the non-redundant half of the spectrum (`len / 2 + 1` bins) is kept;
//! the inverse assumes Hermitian symmetry for the discarded half.

use std::sync::Arc;

use ndarray::{Array3, Axis};
use num_complex::Complex64;
use rayon::prelude::*;
use realfft::{ComplexToReal, RealFftPlanner, RealToComplex};

use crate::binaural::Ear;
use crate::data::{ImpulseResponseSet, TransferFunctionSet};
use crate::error::{ShError, ShResult};

/// Planned forward/inverse real FFT pair for one transform length
pub struct SpectralTransform {
    fft_len: usize,
    fft_forward: Arc<dyn RealToComplex<f64>>,
    fft_inverse: Arc<dyn ComplexToReal<f64>>,
}

impl SpectralTransform {
    /// Plan transforms of `fft_len` samples
    pub fn new(fft_len: usize) -> ShResult<Self> {
        if fft_len == 0 {
            return Err(ShError::InvalidParameter("FFT length must be non-zero".into()));
        }
        let mut planner = RealFftPlanner::<f64>::new();
        Ok(Self {
            fft_len,
            fft_forward: planner.plan_fft_forward(fft_len),
            fft_inverse: planner.plan_fft_inverse(fft_len),
        })
    }

    /// Transform length
    pub fn fft_len(&self) -> usize {
        self.fft_len
    }

    /// Number of one-sided bins
    pub fn num_bins(&self) -> usize {
        self.fft_len / 2 + 1
    }

    /// Zero-padded one-sided spectrum of a real signal
    pub fn forward(&self, signal: &[f64]) -> ShResult<Vec<Complex64>> {
        if signal.len() > self.fft_len {
            return Err(ShError::InvalidParameter(format!(
                "signal of {} samples does not fit a {}-point transform",
                signal.len(),
                self.fft_len
            )));
        }

        let mut input = self.fft_forward.make_input_vec();
        input[..signal.len()].copy_from_slice(signal);
        let mut spectrum = self.fft_forward.make_output_vec();

        self.fft_forward
            .process(&mut input, &mut spectrum)
            .map_err(|e| ShError::Fft(e.to_string()))?;

        Ok(spectrum)
    }

    /// Real signal from a one-sided spectrum
    pub fn inverse(&self, spectrum: &[Complex64]) -> ShResult<Vec<f64>> {
        if spectrum.len() != self.num_bins() {
            return Err(ShError::mismatch("frequency bins", self.num_bins(), spectrum.len()));
        }

        let mut input = spectrum.to_vec();
        // DC and Nyquist of a real signal carry no imaginary part
        input[0].im = 0.0;
        if self.fft_len % 2 == 0 {
            let last = input.len() - 1;
            input[last].im = 0.0;
        }

        let mut output = self.fft_inverse.make_output_vec();
        self.fft_inverse
            .process(&mut input, &mut output)
            .map_err(|e| ShError::Fft(e.to_string()))?;

        let scale = 1.0 / self.fft_len as f64;
        for s in &mut output {
            *s *= scale;
        }

        Ok(output)
    }

    /// Transform every (direction, ear) response of a set
    pub fn forward_set(&self, irs: &ImpulseResponseSet) -> ShResult<TransferFunctionSet> {
        let num_dirs = irs.num_directions();
        let spectra: Vec<[Vec<Complex64>; 2]> = (0..num_dirs)
            .into_par_iter()
            .map(|dir| -> ShResult<[Vec<Complex64>; 2]> {
                Ok([
                    self.forward(&irs.response(dir, Ear::Left))?,
                    self.forward(&irs.response(dir, Ear::Right))?,
                ])
            })
            .collect::<ShResult<_>>()?;

        let mut data = Array3::<Complex64>::zeros((self.num_bins(), num_dirs, Ear::ALL.len()));
        for (dir, pair) in spectra.iter().enumerate() {
            for ear in Ear::ALL {
                for (bin, &value) in pair[ear.index()].iter().enumerate() {
                    data[[bin, dir, ear.index()]] = value;
                }
            }
        }

        TransferFunctionSet::new(data, irs.sample_rate(), self.fft_len)
    }

    /// Inverse-transform every (direction, ear) spectrum of a set
    pub fn inverse_set(&self, tf: &TransferFunctionSet) -> ShResult<ImpulseResponseSet> {
        if tf.fft_len() != self.fft_len {
            return Err(ShError::mismatch("FFT length", self.fft_len, tf.fft_len()));
        }

        let num_dirs = tf.num_directions();
        let responses: Vec<[Vec<f64>; 2]> = (0..num_dirs)
            .into_par_iter()
            .map(|dir| -> ShResult<[Vec<f64>; 2]> {
                let left = tf.ear(Ear::Left).index_axis(Axis(1), dir).to_vec();
                let right = tf.ear(Ear::Right).index_axis(Axis(1), dir).to_vec();
                Ok([self.inverse(&left)?, self.inverse(&right)?])
            })
            .collect::<ShResult<_>>()?;

        let mut data = Array3::<f64>::zeros((self.fft_len, num_dirs, Ear::ALL.len()));
        for (dir, pair) in responses.iter().enumerate() {
            for ear in Ear::ALL {
                for (n, &s) in pair[ear.index()].iter().enumerate() {
                    data[[n, dir, ear.index()]] = s;
                }
            }
        }

        ImpulseResponseSet::new(data, tf.sample_rate())
    }
}

/// One-sided spectrum of `signal` zero-padded to `pad_len` (default: its own length)
pub fn forward(signal: &[f64], pad_len: Option<usize>) -> ShResult<Vec<Complex64>> {
    SpectralTransform::new(pad_len.unwrap_or(signal.len()))?.forward(signal)
}

/// Real `pad_len`-sample signal from a one-sided spectrum
pub fn inverse(spectrum: &[Complex64], pad_len: usize) -> ShResult<Vec<f64>> {
    SpectralTransform::new(pad_len)?.inverse(spectrum)
}

impl ImpulseResponseSet {
    /// Spectra of all responses, zero-padded to `pad_len` (default: response length)
    pub fn to_transfer_functions(&self, pad_len: Option<usize>) -> ShResult<TransferFunctionSet> {
        SpectralTransform::new(pad_len.unwrap_or(self.num_samples()))?.forward_set(self)
    }
}

impl TransferFunctionSet {
    /// Impulse responses of `fft_len` samples
    pub fn to_impulse_responses(&self) -> ShResult<ImpulseResponseSet> {
        SpectralTransform::new(self.fft_len())?.inverse_set(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_impulse_is_flat() {
        let spectrum = forward(&[1.0, 0.0, 0.0, 0.0], None).unwrap();
        assert_eq!(spectrum.len(), 3);
        for bin in &spectrum {
            assert_abs_diff_eq!(bin.re, 1.0, epsilon = 1e-12);
            assert_abs_diff_eq!(bin.im, 0.0, epsilon = 1e-12);
        }
    }

    #[test]
    fn test_zero_padding() {
        let spectrum = forward(&[1.0, 1.0], Some(8)).unwrap();
        assert_eq!(spectrum.len(), 5);
        assert_abs_diff_eq!(spectrum[0].re, 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(spectrum[4].norm(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_roundtrip_even_and_odd() {
        for len in [16usize, 15] {
            let x: Vec<f64> = (0..len).map(|i| ((i * 7 % 5) as f64 - 2.0) * 0.3).collect();
            let y = inverse(&forward(&x, None).unwrap(), len).unwrap();
            for (a, b) in x.iter().zip(y.iter()) {
                assert_abs_diff_eq!(a, b, epsilon = 1e-12);
            }
        }
    }

    #[test]
    fn test_rejects_bad_lengths() {
        assert!(forward(&[1.0; 8], Some(4)).is_err());
        assert!(inverse(&[Complex64::new(1.0, 0.0); 4], 8).is_err());
        assert!(SpectralTransform::new(0).is_err());
    }

    #[test]
    fn test_inverse_ignores_imaginary_dc() {
        let mut spectrum = forward(&[0.5, -0.25, 0.0, 0.125], None).unwrap();
        spectrum[0].im = 3.0;
        spectrum[2].im = -1.0;
        let y = inverse(&spectrum, 4).unwrap();
        assert_abs_diff_eq!(y[0], 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(y[3], 0.125, epsilon = 1e-12);
    }
}
