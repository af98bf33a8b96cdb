use nalgebra::{Isometry3, Matrix3, Point3, Rotation3, Translation3, Unit, UnitQuaternion, Vector3};
use std::f64::consts::PI;

pub fn rotation_from_axis_angle(axis: &Vector3<f64>, angle_degrees: f64) -> Rotation3<f64> {
    Rotation3::from_axis_angle(&Unit::new_normalize(*axis), angle_degrees.to_radians())
}

pub fn distance(a: &Point3<f64>, b: &Point3<f64>) -> f64 {
    (a - b).norm()
}

/// Angle a-b-c at vertex `b`, in radians within [0, π].
pub fn angle(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>) -> f64 {
    let ba = a - b;
    let bc = c - b;
    ba.cross(&bc).norm().atan2(ba.dot(&bc))
}

/// Dihedral a-b-c-d in radians within (-π, π].
pub fn dihedral(a: &Point3<f64>, b: &Point3<f64>, c: &Point3<f64>, d: &Point3<f64>) -> f64 {
    let b1 = b - a;
    let b2 = c - b;
    let b3 = d - c;
    let n1 = b1.cross(&b2);
    let n2 = b2.cross(&b3);
    let x = n1.dot(&n2);
    let y = n1.cross(&n2).dot(&b2.normalize());
    y.atan2(x)
}

/// Wraps an angular difference into [-π, π).
pub fn wrap_angle(delta: f64) -> f64 {
    (delta + PI).rem_euclid(2.0 * PI) - PI
}

pub fn centroid(points: &[Point3<f64>]) -> Option<Point3<f64>> {
    if points.is_empty() {
        return None;
    }
    let sum = points
        .iter()
        .fold(Vector3::zeros(), |acc, p| acc + p.coords);
    Some(Point3::from(sum / points.len() as f64))
}

/// Largest distance from the centroid to any point.
pub fn max_radius(points: &[Point3<f64>]) -> Option<f64> {
    let center = centroid(points)?;
    Some(
        points
            .iter()
            .map(|p| distance(p, &center))
            .fold(0.0, f64::max),
    )
}

pub fn calculate_rmsd(coords1: &[Point3<f64>], coords2: &[Point3<f64>]) -> Option<f64> {
    if coords1.len() != coords2.len() || coords1.is_empty() {
        return None;
    }
    let n = coords1.len() as f64;
    let squared_dist_sum: f64 = coords1
        .iter()
        .zip(coords2.iter())
        .map(|(p1, p2)| (p1 - p2).norm_squared())
        .sum();
    Some((squared_dist_sum / n).sqrt())
}

/// Finds the rigid transform that best superimposes `mobile` onto `reference` (Kabsch).
///
/// Returns `None` if the point sets differ in length, hold fewer than three points, or the
/// covariance decomposition fails.
pub fn kabsch_superposition(
    mobile: &[Point3<f64>],
    reference: &[Point3<f64>],
) -> Option<Isometry3<f64>> {
    if mobile.len() != reference.len() || mobile.len() < 3 {
        return None;
    }
    let mobile_center = centroid(mobile)?;
    let reference_center = centroid(reference)?;

    let mut covariance = Matrix3::zeros();
    for (m, r) in mobile.iter().zip(reference) {
        covariance += (m - mobile_center) * (r - reference_center).transpose();
    }

    let svd = covariance.svd(true, true);
    let u = svd.u?;
    let v_t = svd.v_t?;
    let mut v = v_t.transpose();
    if (v * u.transpose()).determinant() < 0.0 {
        let mut last = v.column_mut(2);
        last *= -1.0;
    }
    let rotation = Rotation3::from_matrix_unchecked(v * u.transpose());

    let translation = reference_center.coords - rotation * mobile_center.coords;
    Some(Isometry3::from_parts(
        Translation3::from(translation),
        UnitQuaternion::from_rotation_matrix(&rotation),
    ))
}
