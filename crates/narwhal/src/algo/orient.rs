//! Rigid post-pass: recentring and principal-axis alignment.

use crate::math::Vector3D;
use nalgebra as na;

pub fn centroid(positions: &[Vector3D]) -> Vector3D {
    if positions.is_empty() {
        return Vector3D::ZERO;
    }
    positions.iter().copied().sum::<Vector3D>() * (1.0 / positions.len() as f64)
}

/// Translates `positions` so their centroid is the origin.
pub fn recenter(positions: &mut [Vector3D]) {
    let c = centroid(positions);
    for p in positions.iter_mut() {
        *p = *p - c;
    }
}

/// Rotates `positions` about their centroid so the principal axes land on x, y, z in
/// decreasing-variance order.
///
/// The rotation is proper (no reflection). Degenerate clouds (fewer than two points, or a
/// covariance that fails to decompose into finite values) are left untouched.
pub fn align_principal_axes(positions: &mut [Vector3D]) {
    if positions.len() < 2 {
        return;
    }
    let c = centroid(positions);
    let mut cov = na::Matrix3::<f64>::zeros();
    for &p in positions.iter() {
        let d = na::Vector3::new(p.x - c.x, p.y - c.y, p.z - c.z);
        cov += d * d.transpose();
    }
    cov /= positions.len() as f64;

    let eigen = na::SymmetricEigen::new(cov);
    let mut order = [0usize, 1, 2];
    order.sort_by(|&a, &b| eigen.eigenvalues[b].total_cmp(&eigen.eigenvalues[a]));

    let mut rotation = na::Matrix3::<f64>::zeros();
    for (row, &col) in order.iter().enumerate() {
        rotation.set_row(row, &eigen.eigenvectors.column(col).transpose());
    }
    if rotation.determinant() < 0.0 {
        let flipped = -rotation.row(2);
        rotation.set_row(2, &flipped);
    }
    if rotation.iter().any(|v| !v.is_finite()) {
        tracing::debug!("principal-axis decomposition not finite; skipping alignment");
        return;
    }

    for p in positions.iter_mut() {
        let d = na::Vector3::new(p.x - c.x, p.y - c.y, p.z - c.z);
        let r = rotation * d;
        *p = Vector3D::new(r.x + c.x, r.y + c.y, r.z + c.z);
    }
}
