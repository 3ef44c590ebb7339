//! Panel geometry: plane fit, winding order, fan area.
//!
//! All inputs are topology-local positions.

use std::cmp::Ordering;
use std::f64::consts::TAU;

use nalgebra::Vector3;

/// Least-squares plane through `points`: `(centroid, unit normal)`.
///
/// Covariance method with a weighted sum of the three cofactor directions,
/// each weighted by its determinant squared and sign-aligned with the running
/// sum. Robust to points that are not exactly coplanar. `None` for fewer than
/// three points or when the direction is shorter than `eps` (collinear or
/// coincident points).
pub fn plane_fit(points: &[Vector3<f64>], eps: f64) -> Option<(Vector3<f64>, Vector3<f64>)> {
    let n = points.len();
    if n < 3 {
        return None;
    }
    let nf = n as f64;
    let centroid = points.iter().sum::<Vector3<f64>>() / nf;
    // Rescale to unit mean spread so the determinant weights stay O(1).
    let spread = points.iter().map(|p| (p - centroid).norm()).sum::<f64>() / nf;
    if spread <= 0.0 || !spread.is_finite() {
        return None;
    }
    let (mut xx, mut xy, mut xz, mut yy, mut yz, mut zz) = (0.0, 0.0, 0.0, 0.0, 0.0, 0.0);
    for p in points {
        let r = (p - centroid) / spread;
        xx += r.x * r.x;
        xy += r.x * r.y;
        xz += r.x * r.z;
        yy += r.y * r.y;
        yz += r.y * r.z;
        zz += r.z * r.z;
    }
    let (xx, xy, xz, yy, yz, zz) = (xx / nf, xy / nf, xz / nf, yy / nf, yz / nf, zz / nf);

    let det_x = yy * zz - yz * yz;
    let det_y = xx * zz - xz * xz;
    let det_z = xx * yy - xy * xy;
    let axes = [
        (det_x, Vector3::new(det_x, xz * yz - xy * zz, xy * yz - xz * yy)),
        (det_y, Vector3::new(xz * yz - xy * zz, det_y, xy * xz - yz * xx)),
        (det_z, Vector3::new(xy * yz - xz * yy, xy * xz - yz * xx, det_z)),
    ];
    let mut weighted = Vector3::zeros();
    for (det, axis) in axes {
        let mut w = det * det;
        if weighted.dot(&axis) < 0.0 {
            w = -w;
        }
        weighted += axis * w;
    }
    let normal = weighted.try_normalize(eps)?;
    normal.iter().all(|c| c.is_finite()).then_some((centroid, normal))
}

/// Permutation that sorts `points` counterclockwise about `normal`.
///
/// The first point stays first (angle zero); the others follow by angle in
/// [0, 2π), ties keeping input order. Reordering an already ordered list is a
/// no-op.
pub fn reorder_nodes(points: &[Vector3<f64>], center: Vector3<f64>, normal: Vector3<f64>) -> Vec<usize> {
    let Some(first) = points.first() else {
        return Vec::new();
    };
    let rel = first - center;
    let x_dir = (rel - normal * rel.dot(&normal))
        .try_normalize(f64::EPSILON)
        .unwrap_or_else(|| any_perpendicular(&normal));
    let y_dir = normal.cross(&x_dir);
    let mut angles: Vec<(f64, usize)> = points
        .iter()
        .enumerate()
        .map(|(i, p)| {
            if i == 0 {
                return (0.0, i);
            }
            let r = p - center;
            let angle = r.dot(&y_dir).atan2(r.dot(&x_dir));
            (if angle < 0.0 { angle + TAU } else { angle }, i)
        })
        .collect();
    angles.sort_by(|a, b| a.0.partial_cmp(&b.0).unwrap_or(Ordering::Equal));
    angles.into_iter().map(|(_, i)| i).collect()
}

/// Sum of triangle areas from `center` to each consecutive pair (closing edge included).
pub fn triangle_fan_area(center: Vector3<f64>, ordered: &[Vector3<f64>]) -> f64 {
    let n = ordered.len();
    if n < 2 {
        return 0.0;
    }
    (0..n)
        .map(|i| triangle_area(center, ordered[i], ordered[(i + 1) % n]))
        .sum()
}

#[inline]
pub fn triangle_area(a: Vector3<f64>, b: Vector3<f64>, c: Vector3<f64>) -> f64 {
    (b - a).cross(&(c - a)).norm() * 0.5
}

fn any_perpendicular(normal: &Vector3<f64>) -> Vector3<f64> {
    let helper = if normal.x.abs() < 0.9 {
        Vector3::x()
    } else {
        Vector3::y()
    };
    normal.cross(&helper).normalize()
}
