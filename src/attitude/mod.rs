//! Attitudes as unit quaternions and the solvers that point a camera boresight.

pub mod pointing;
pub mod quaternion;

pub use pointing::{attitude_toward, attitude_toward_or, look_at};
pub use quaternion::{Quaternion, ScalarOrder};
