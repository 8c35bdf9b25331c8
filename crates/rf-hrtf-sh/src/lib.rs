//! ReelForge HRTF Spherical-Harmonic Codec
//!
//! Compact, order-limited representation of binaural HRTF sets:
//!
//! ## Encoding
//! - Real orthonormal SH (N3D, ACN) up to order 64
//! - Least-squares fit via SVD pseudo-inverse, minimum-norm when rank deficient
//! - Truncated, Time-Aligned, MagLS and BiMagLS strategies
//! - Optional smoothing of the MagLS phase recursion
//!
//! ## Decoding
//! - Interpolation at arbitrary directions
//! - Ear-delay restoration for aligned strategies
//!
//! ## Tooling
//! - Real FFT between impulse responses and transfer functions
//! - Rigid-sphere synthetic HRTFs
//! - Reconstruction error metrics
//! - Content-addressed coefficient cache

pub mod binaural;
pub mod cache;
pub mod codec;
pub mod config;
pub mod data;
pub mod grid;
pub mod metrics;
pub mod sh;
pub mod spectral;

mod error;

pub use binaural::{Ear, HeadGeometry, SyntheticHrtf};
pub use cache::{CacheKey, CoefficientCache};
pub use codec::{
    cutoff_frequency, decode, encode, EncodingStrategy, ShCoefficientSet, ShDecoder, ShEncoder,
};
pub use config::EncoderConfig;
pub use data::{ImpulseResponseSet, TransferFunctionSet};
pub use error::{ShError, ShResult};
pub use grid::DirectionGrid;
pub use metrics::ErrorReport;
pub use sh::{ShBasis, ShOrder};
pub use spectral::SpectralTransform;
