// ============================================================================
// HRTF SH Codec Property Tests
// End-to-end encode/decode behavior on synthetic rigid-sphere HRTFs
// ============================================================================

//! Codec property test suite
//!
//! Every test builds HRTFs from the analytic rigid-sphere model, encodes them
//! and checks a property of the reconstruction.

use approx::assert_relative_eq;
use rf_hrtf_sh::metrics::{band_mean, magnitude_error_db, phase_delay_error, relative_error};
use rf_hrtf_sh::{
    cutoff_frequency, decode, encode, DirectionGrid, EncoderConfig, EncodingStrategy, ErrorReport,
    HeadGeometry, ShBasis, ShCoefficientSet, ShDecoder, ShEncoder, ShError, ShOrder,
    SyntheticHrtf, TransferFunctionSet,
};

// ============================================================================
// TEST UTILITIES
// ============================================================================

const SAMPLE_RATE: u32 = 48000;
const IR_LENGTH: usize = 128;

fn order(n: usize) -> ShOrder {
    ShOrder::new(n).unwrap()
}

/// Synthetic HRTFs measured on `grid`
fn measure(grid: &DirectionGrid) -> TransferFunctionSet {
    SyntheticHrtf::new(SAMPLE_RATE, IR_LENGTH)
        .unwrap()
        .transfer_functions(grid)
        .unwrap()
}

/// Encode then decode on the measurement grid itself
fn reconstruct(
    grid: &DirectionGrid,
    tf: &TransferFunctionSet,
    n: usize,
    strategy: EncodingStrategy,
) -> TransferFunctionSet {
    let set = encode(tf, grid, order(n), strategy, &EncoderConfig::default()).unwrap();
    set.interpolate(grid).unwrap()
}

// ============================================================================
// ROUND TRIPS
// ============================================================================

#[test]
fn test_spectral_roundtrip() {
    let grid = DirectionGrid::fibonacci(24).unwrap();
    let irs = SyntheticHrtf::new(SAMPLE_RATE, IR_LENGTH)
        .unwrap()
        .impulse_responses(&grid)
        .unwrap();

    let back = irs.to_transfer_functions(None).unwrap().to_impulse_responses().unwrap();
    for (a, b) in irs.data().iter().zip(back.data().iter()) {
        assert!((a - b).abs() < 1e-12);
    }
}

#[test]
fn test_truncated_roundtrip_square_basis() {
    // 16 directions at order 3: the basis is square and non-singular
    let grid = DirectionGrid::fibonacci(16).unwrap();
    let tf = measure(&grid);

    let decoded = reconstruct(&grid, &tf, 3, EncodingStrategy::Truncated);
    assert!(relative_error(&decoded, &tf).unwrap() < 1e-6);
}

#[test]
fn test_time_aligned_roundtrip_square_basis() {
    let grid = DirectionGrid::fibonacci(16).unwrap();
    let tf = measure(&grid);

    let decoded = reconstruct(&grid, &tf, 3, EncodingStrategy::TimeAligned);
    assert!(relative_error(&decoded, &tf).unwrap() < 1e-6);
}

#[test]
fn test_magls_square_basis_reproduces_magnitude() {
    let grid = DirectionGrid::fibonacci(16).unwrap();
    let tf = measure(&grid);

    for strategy in [EncodingStrategy::MagLs, EncodingStrategy::BiMagLs] {
        let decoded = reconstruct(&grid, &tf, 3, strategy);
        for (e, r) in decoded.data().iter().zip(tf.data().iter()) {
            assert!((e.norm() - r.norm()).abs() <= 1e-6 * r.norm().max(1e-3));
        }
    }
}

// ============================================================================
// ORDER SWEEP
// ============================================================================

#[test]
fn test_magnitude_error_decreases_with_order() {
    // Dense measurement grid, errors taken at directions it does not contain
    let grid = DirectionGrid::fibonacci(900).unwrap();
    let target = DirectionGrid::fibonacci(97).unwrap();
    let tf = measure(&grid);
    let reference = measure(&target);
    let freqs = reference.frequencies();
    let orders = [1, 3, 5, 10, 20];

    let mut errors = vec![Vec::new(); EncodingStrategy::ALL.len()];
    for n in orders {
        let encoder = ShEncoder::new(&grid, order(n), EncoderConfig::default()).unwrap();
        for (s, strategy) in EncodingStrategy::ALL.into_iter().enumerate() {
            let decoded = encoder.encode(&tf, strategy).unwrap().interpolate(&target).unwrap();
            let mag = magnitude_error_db(&decoded, &reference, None).unwrap();
            errors[s].push(band_mean(&mag, &freqs, 0.0, reference.nyquist()).unwrap());
        }
    }

    for (strategy, curve) in EncodingStrategy::ALL.into_iter().zip(&errors) {
        for pair in curve.windows(2) {
            assert!(pair[1] <= pair[0], "{} magnitude error over orders {:?}: {:?}", strategy, orders, curve);
        }
        assert!(curve[4] < curve[0]);
    }
}

// ============================================================================
// STRATEGY COMPARISONS
// ============================================================================

#[test]
fn test_magls_improves_magnitude_above_cutoff() {
    let grid = DirectionGrid::fibonacci(200).unwrap();
    let tf = measure(&grid);
    let fc = cutoff_frequency(order(3), &HeadGeometry::default(), 3000.0);
    let freqs = tf.frequencies();

    let error_above = |strategy| {
        let decoded = reconstruct(&grid, &tf, 3, strategy);
        let mag = magnitude_error_db(&decoded, &tf, Some(&grid)).unwrap();
        band_mean(&mag, &freqs, fc, tf.nyquist()).unwrap()
    };

    let truncated = error_above(EncodingStrategy::Truncated);
    let magls = error_above(EncodingStrategy::MagLs);
    let time_aligned = error_above(EncodingStrategy::TimeAligned);
    let bimagls = error_above(EncodingStrategy::BiMagLs);

    assert!(magls < truncated, "MagLS {:.2} dB vs Truncated {:.2} dB", magls, truncated);
    assert!(bimagls < time_aligned, "BiMagLS {:.2} dB vs TA {:.2} dB", bimagls, time_aligned);
}

#[test]
fn test_ear_alignment_improves_phase_below_cutoff() {
    let grid = DirectionGrid::fibonacci(200).unwrap();
    let target = DirectionGrid::fibonacci(57).unwrap();
    let tf = measure(&grid);
    let reference = measure(&target);
    let fc = cutoff_frequency(order(3), &HeadGeometry::default(), 3000.0);
    let freqs = reference.frequencies();
    // 3000 Hz is the first MagLS bin, so the band stops one bin short of it
    let top = fc - reference.bin_frequency(1);

    let phase_error = |strategy| {
        let set = encode(&tf, &grid, order(3), strategy, &EncoderConfig::default()).unwrap();
        let decoded = set.interpolate(&target).unwrap();
        let phase = phase_delay_error(&decoded, &reference, None).unwrap();
        band_mean(&phase, &freqs, 500.0, top).unwrap()
    };

    let truncated = phase_error(EncodingStrategy::Truncated);
    let time_aligned = phase_error(EncodingStrategy::TimeAligned);
    let magls = phase_error(EncodingStrategy::MagLs);
    let bimagls = phase_error(EncodingStrategy::BiMagLs);

    assert!(time_aligned < truncated, "TA {:e} s vs Truncated {:e} s", time_aligned, truncated);
    assert!(bimagls < magls, "BiMagLS {:e} s vs MagLS {:e} s", bimagls, magls);

    // Below the cutoff the MagLS variants are their ordinary-fit counterparts
    assert_relative_eq!(bimagls, time_aligned, max_relative = 1e-12);
    assert_relative_eq!(magls, truncated, max_relative = 1e-12);
}

#[test]
fn test_error_report_uses_set_cutoff() {
    let grid = DirectionGrid::fibonacci(100).unwrap();
    let tf = measure(&grid);

    let set = encode(&tf, &grid, order(3), EncodingStrategy::BiMagLs, &EncoderConfig::default()).unwrap();
    let decoded = set.interpolate(&grid).unwrap();
    let report = ErrorReport::compute(&decoded, &tf, Some(&grid), set.cutoff_hz()).unwrap();
    assert_eq!(report.split_hz, Some(3000.0));
    assert!(report.magnitude_db_high.is_some());
    assert!(report.phase_delay_low_s.is_some());

    // Cutoff past Nyquist: no MagLS band to report on
    let config = EncoderConfig {
        min_cutoff_hz: 30000.0,
        ..EncoderConfig::default()
    };
    let set = encode(&tf, &grid, order(3), EncodingStrategy::BiMagLs, &config).unwrap();
    let decoded = set.interpolate(&grid).unwrap();
    let report = ErrorReport::compute(&decoded, &tf, Some(&grid), set.cutoff_hz()).unwrap();
    assert_eq!(report.split_hz, None);
    assert_eq!(report.magnitude_db_high, None);
    assert!(report.phase_delay_low_s.unwrap().is_finite());
}

#[test]
fn test_magls_matches_truncated_below_cutoff() {
    let grid = DirectionGrid::fibonacci(100).unwrap();
    let tf = measure(&grid);
    let config = EncoderConfig::default();

    let truncated = encode(&tf, &grid, order(3), EncodingStrategy::Truncated, &config).unwrap();
    let magls = encode(&tf, &grid, order(3), EncodingStrategy::MagLs, &config).unwrap();
    assert_eq!(magls.cutoff_hz(), Some(3000.0));
    assert_eq!(truncated.cutoff_hz(), None);

    // 375 Hz bins: 3000 Hz is bin 8
    for bin in 0..8 {
        for q in 0..16 {
            for ear in 0..2 {
                assert_eq!(magls.coefficients()[[q, bin, ear]], truncated.coefficients()[[q, bin, ear]]);
            }
        }
    }
}

// ============================================================================
// CUTOFF
// ============================================================================

#[test]
fn test_cutoff_formula() {
    let geometry = HeadGeometry::new(0.0875, 343.0).unwrap();
    assert_relative_eq!(cutoff_frequency(order(3), &geometry, 0.0), 1871.66, max_relative = 1e-4);
    assert_eq!(cutoff_frequency(order(3), &geometry, 3000.0), 3000.0);

    let encoder = ShEncoder::new(
        &DirectionGrid::fibonacci(64).unwrap(),
        order(3),
        EncoderConfig::default(),
    )
    .unwrap();
    assert_eq!(encoder.cutoff_frequency(), 3000.0);
}

// ============================================================================
// DETERMINISM AND DEGENERATE INPUT
// ============================================================================

#[test]
fn test_encoding_is_deterministic() {
    let grid = DirectionGrid::fibonacci(80).unwrap();
    let tf = measure(&grid);
    let config = EncoderConfig::refined();

    for strategy in EncodingStrategy::ALL {
        let a = encode(&tf, &grid, order(4), strategy, &config).unwrap();
        let b = encode(&tf, &grid, order(4), strategy, &config).unwrap();
        assert_eq!(a, b);
    }
}

#[test]
fn test_rank_deficient_grid_stays_finite() {
    // 36 coefficients from 20 directions
    let grid = DirectionGrid::fibonacci(20).unwrap();
    let tf = measure(&grid);
    let basis = ShBasis::new(&grid, order(5)).unwrap();
    assert!(basis.is_rank_deficient());

    let target = DirectionGrid::horizontal_ring(36).unwrap();
    for strategy in EncodingStrategy::ALL {
        let set = encode(&tf, &grid, order(5), strategy, &EncoderConfig::default()).unwrap();
        assert!(set.coefficients().iter().all(|c| c.re.is_finite() && c.im.is_finite()));

        let decoded = set.interpolate(&target).unwrap();
        assert!(decoded.data().iter().all(|c| c.re.is_finite() && c.im.is_finite()));
    }
}

#[test]
fn test_decode_rejects_higher_order() {
    let grid = DirectionGrid::fibonacci(50).unwrap();
    let tf = measure(&grid);
    let set = encode(&tf, &grid, order(2), EncodingStrategy::MagLs, &EncoderConfig::default()).unwrap();

    assert!(matches!(
        decode(&set, &grid, order(4), None),
        Err(ShError::InvalidOrder(_))
    ));
    assert!(decode(&set, &grid, order(1), None).is_ok());
}

// ============================================================================
// INTERPOLATION AND PERSISTENCE
// ============================================================================

#[test]
fn test_interpolation_at_unmeasured_directions() {
    let grid = DirectionGrid::fibonacci(300).unwrap();
    let target = DirectionGrid::horizontal_ring(72).unwrap();
    let tf = measure(&grid);
    let reference = measure(&target);

    let config = EncoderConfig::default();
    let low = encode(&tf, &grid, order(3), EncodingStrategy::TimeAligned, &config)
        .unwrap()
        .interpolate(&target)
        .unwrap();
    let high = encode(&tf, &grid, order(10), EncodingStrategy::TimeAligned, &config)
        .unwrap()
        .interpolate(&target)
        .unwrap();

    assert!(relative_error(&high, &reference).unwrap() < relative_error(&low, &reference).unwrap());
}

#[test]
fn test_coefficients_survive_json() {
    let grid = DirectionGrid::fibonacci(40).unwrap();
    let tf = measure(&grid);
    let set = encode(&tf, &grid, order(3), EncodingStrategy::BiMagLs, &EncoderConfig::default()).unwrap();

    let restored = ShCoefficientSet::from_json(&set.to_json().unwrap()).unwrap();
    assert_eq!(restored.order(), set.order());
    assert_eq!(restored.strategy(), set.strategy());
    assert_eq!(restored.geometry(), set.geometry());

    let target = DirectionGrid::fibonacci(11).unwrap();
    let decoder = ShDecoder::new(&target, order(3)).unwrap();
    let a = decoder.decode_set(&set).unwrap();
    let b = decoder.decode_set(&restored).unwrap();
    assert!(relative_error(&b, &a).unwrap() < 1e-12);
}
