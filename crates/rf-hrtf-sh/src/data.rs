//! Binaural impulse-response and transfer-function sets

use ndarray::{Array3, ArrayView2, Axis};
use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::binaural::Ear;
use crate::error::{ShError, ShResult};

/// Time-domain HRIRs indexed by (sample, direction, ear)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImpulseResponseSet {
    data: Array3<f64>,
    sample_rate: u32,
}

impl ImpulseResponseSet {
    /// Wrap an (sample, direction, ear) array
    pub fn new(data: Array3<f64>, sample_rate: u32) -> ShResult<Self> {
        let (samples, _, ears) = data.dim();
        if ears != Ear::ALL.len() {
            return Err(ShError::mismatch("ear channels", Ear::ALL.len(), ears));
        }
        if samples == 0 {
            return Err(ShError::InvalidParameter("impulse responses are empty".into()));
        }
        if sample_rate == 0 {
            return Err(ShError::InvalidParameter("sample rate must be non-zero".into()));
        }
        Ok(Self { data, sample_rate })
    }

    /// Raw samples
    pub fn data(&self) -> &Array3<f64> {
        &self.data
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Impulse-response length in samples
    pub fn num_samples(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    /// Number of measured directions
    pub fn num_directions(&self) -> usize {
        self.data.len_of(Axis(1))
    }

    /// One impulse response
    pub fn response(&self, direction: usize, ear: Ear) -> Vec<f64> {
        self.data
            .index_axis(Axis(2), ear.index())
            .index_axis(Axis(1), direction)
            .to_vec()
    }
}

/// One-sided binaural spectra indexed by (bin, direction, ear)
///
/// Bin 0 is DC, the last bin is `fft_len / 2`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransferFunctionSet {
    data: Array3<Complex64>,
    sample_rate: u32,
    fft_len: usize,
}

impl TransferFunctionSet {
    /// Wrap an (bin, direction, ear) array produced by an `fft_len` point transform
    pub fn new(data: Array3<Complex64>, sample_rate: u32, fft_len: usize) -> ShResult<Self> {
        let (bins, _, ears) = data.dim();
        if ears != Ear::ALL.len() {
            return Err(ShError::mismatch("ear channels", Ear::ALL.len(), ears));
        }
        if fft_len == 0 {
            return Err(ShError::InvalidParameter("FFT length must be non-zero".into()));
        }
        if bins != fft_len / 2 + 1 {
            return Err(ShError::mismatch("frequency bins", fft_len / 2 + 1, bins));
        }
        if sample_rate == 0 {
            return Err(ShError::InvalidParameter("sample rate must be non-zero".into()));
        }
        Ok(Self {
            data,
            sample_rate,
            fft_len,
        })
    }

    /// Complex spectra
    pub fn data(&self) -> &Array3<Complex64> {
        &self.data
    }

    /// Consume into the raw array
    pub fn into_data(self) -> Array3<Complex64> {
        self.data
    }

    /// Sample rate in Hz
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Length of the time-domain transform
    pub fn fft_len(&self) -> usize {
        self.fft_len
    }

    /// Number of frequency bins
    pub fn num_bins(&self) -> usize {
        self.data.len_of(Axis(0))
    }

    /// Number of directions
    pub fn num_directions(&self) -> usize {
        self.data.len_of(Axis(1))
    }

    /// Frequency of a bin in Hz
    pub fn bin_frequency(&self, bin: usize) -> f64 {
        bin as f64 * self.sample_rate as f64 / self.fft_len as f64
    }

    /// Frequencies of all bins in Hz
    pub fn frequencies(&self) -> Vec<f64> {
        (0..self.num_bins()).map(|k| self.bin_frequency(k)).collect()
    }

    /// Nyquist frequency in Hz
    pub fn nyquist(&self) -> f64 {
        self.sample_rate as f64 / 2.0
    }

    /// (bin, direction) view for one ear
    pub fn ear(&self, ear: Ear) -> ArrayView2<'_, Complex64> {
        self.data.index_axis(Axis(2), ear.index())
    }

    /// SHA-256 over shape, rate and spectrum bit patterns
    pub fn fingerprint(&self) -> String {
        let mut hasher = Sha256::new();
        let (bins, dirs, ears) = self.data.dim();
        for v in [bins, dirs, ears, self.fft_len] {
            hasher.update((v as u64).to_le_bytes());
        }
        hasher.update(self.sample_rate.to_le_bytes());
        for h in self.data.iter() {
            hasher.update(h.re.to_bits().to_le_bytes());
            hasher.update(h.im.to_bits().to_le_bytes());
        }
        hex::encode(hasher.finalize())
    }

    /// Same metadata, new spectra
    pub(crate) fn with_data(&self, data: Array3<Complex64>) -> ShResult<Self> {
        Self::new(data, self.sample_rate, self.fft_len)
    }
}
