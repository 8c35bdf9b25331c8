//! Ear-alignment phase for a rigid spherical head

use std::f64::consts::{FRAC_PI_2, PI};

use ndarray::{Array3, Zip};
use num_complex::Complex64;

use super::{Ear, HeadGeometry};
use crate::data::TransferFunctionSet;
use crate::error::{ShError, ShResult};
use crate::grid::{unit_vector, DirectionGrid};

/// Extra far-field path from the source to `ear` relative to the head centre (m)
///
/// Woodworth model: an ear facing the source (angle α to the ear axis ≤ 90°)
/// is reached `r cos α` earlier; a shadowed ear is reached `r (α - 90°)` later,
/// the wave travelling around the sphere.
pub fn path_length_difference(azimuth: f64, elevation: f64, ear: Ear, radius: f64) -> f64 {
    let u = unit_vector(azimuth, elevation);
    let axis = ear.axis();
    let cos_alpha = (u[0] * axis[0] + u[1] * axis[1] + u[2] * axis[2]).clamp(-1.0, 1.0);
    let alpha = cos_alpha.acos();

    if alpha <= FRAC_PI_2 {
        -radius * cos_alpha
    } else {
        radius * (alpha - FRAC_PI_2)
    }
}

/// Ear-alignment phase (radians) indexed by (bin, direction, ear)
///
/// `phase = ω · Δ / c` with Δ the path-length difference, i.e. the negated
/// propagation phase of each ear. Multiplying a spectrum by `exp(+i·phase)`
/// removes the inter-aural delay; `exp(-i·phase)` puts it back.
pub fn ear_alignment_phase(
    frequencies: &[f64],
    grid: &DirectionGrid,
    geometry: &HeadGeometry,
) -> Array3<f64> {
    let delays: Vec<[f64; 2]> = grid
        .iter()
        .map(|(az, el)| {
            Ear::ALL.map(|ear| {
                path_length_difference(az, el, ear, geometry.radius) / geometry.speed_of_sound
            })
        })
        .collect();

    Array3::from_shape_fn(
        (frequencies.len(), grid.len(), Ear::ALL.len()),
        |(bin, dir, ear)| 2.0 * PI * frequencies[bin] * delays[dir][ear],
    )
}

/// Remove the inter-aural delay: H · exp(+i·phase)
pub fn align(
    tf: &TransferFunctionSet,
    grid: &DirectionGrid,
    geometry: &HeadGeometry,
) -> ShResult<TransferFunctionSet> {
    apply_phase(tf, grid, geometry, 1.0)
}

/// Reinstate the inter-aural delay: H · exp(-i·phase)
pub fn restore(
    tf: &TransferFunctionSet,
    grid: &DirectionGrid,
    geometry: &HeadGeometry,
) -> ShResult<TransferFunctionSet> {
    apply_phase(tf, grid, geometry, -1.0)
}

fn apply_phase(
    tf: &TransferFunctionSet,
    grid: &DirectionGrid,
    geometry: &HeadGeometry,
    sign: f64,
) -> ShResult<TransferFunctionSet> {
    if tf.num_directions() != grid.len() {
        return Err(ShError::mismatch("directions", grid.len(), tf.num_directions()));
    }
    geometry.validate()?;

    let phase = ear_alignment_phase(&tf.frequencies(), grid, geometry);
    let mut data = tf.data().clone();
    Zip::from(&mut data)
        .and(&phase)
        .for_each(|h, &p| *h *= Complex64::from_polar(1.0, sign * p));

    tf.with_data(data)
}
