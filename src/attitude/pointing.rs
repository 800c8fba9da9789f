use super::quaternion::{DEGENERATE_NORM, Quaternion};
use crate::error::Error;
use nalgebra::Vector3;
use tracing::debug;
use uom::si::{angle::radian, f64::Angle};

/// Returns the unit vector along `v`.
fn unit(v: &Vector3<f64>, what: &'static str) -> Result<Vector3<f64>, Error> {
    let magnitude = v.norm();
    if !(magnitude > DEGENERATE_NORM) || !magnitude.is_finite() {
        return Err(Error::DegenerateInput { what, magnitude });
    }

    Ok(v / magnitude)
}

/// Computes the minimal rotation that carries `reference` onto `target`.
///
/// Both directions are normalized before use. When they are parallel the identity is
/// returned. When they are antiparallel every axis perpendicular to `reference` gives a
/// minimal rotation, so [`Error::AmbiguousRotation`] is returned instead of guessing; see
/// [`attitude_toward_or`] to supply the axis.
pub fn attitude_toward(
    reference: &Vector3<f64>,
    target: &Vector3<f64>,
) -> Result<Quaternion, Error> {
    let reference = unit(reference, "reference direction")?;
    let target = unit(target, "target direction")?;

    // Clamp protects against dot products just outside [-1, 1].
    let cos = reference.dot(&target).clamp(-1.0, 1.0);
    let axis = reference.cross(&target);
    let sin = axis.norm();

    if sin <= DEGENERATE_NORM {
        return match cos > 0.0 {
            true => Ok(Quaternion::identity()),
            false => Err(Error::AmbiguousRotation),
        };
    }

    let angle = sin.atan2(cos);
    debug!(angle_rad = angle, "solved attitude toward target");
    Quaternion::from_axis_angle(&axis, Angle::new::<radian>(angle))
}

/// Same as [`attitude_toward`] but resolves the antiparallel case with a half turn about
/// `fallback_axis`.
///
/// Only the part of `fallback_axis` perpendicular to `reference` is used, so it fails with
/// [`Error::DegenerateInput`] if `fallback_axis` is parallel to `reference`.
pub fn attitude_toward_or(
    reference: &Vector3<f64>,
    target: &Vector3<f64>,
    fallback_axis: &Vector3<f64>,
) -> Result<Quaternion, Error> {
    match attitude_toward(reference, target) {
        Err(Error::AmbiguousRotation) => {
            let reference = unit(reference, "reference direction")?;
            let perpendicular = fallback_axis - reference * reference.dot(fallback_axis);
            let axis = unit(&perpendicular, "fallback axis perpendicular to reference")?;
            Quaternion::from_axis_angle(&axis, Angle::HALF_TURN)
        }
        result => result,
    }
}

/// Computes the attitude that points `boresight` from `eye` toward `target`.
pub fn look_at(
    boresight: &Vector3<f64>,
    eye: &Vector3<f64>,
    target: &Vector3<f64>,
) -> Result<Quaternion, Error> {
    attitude_toward(boresight, &(target - eye))
}
