// #![warn(missing_docs)]

//! Attitude, Pointing and Image Patch Utilities for Remote Rendering

#[allow(missing_docs)]
pub mod error;

pub mod attitude;
pub mod celestial;
pub mod check;
pub mod image;
pub mod psf;
pub mod scene;
pub mod session;

/// Re-exports of the types most callers need.
pub mod prelude {
    pub use crate::attitude::{Quaternion, ScalarOrder, attitude_toward, attitude_toward_or, look_at};
    pub use crate::celestial::{Equatorial, look_at_star};
    pub use crate::error::Error;
    pub use crate::image::{Image, Patch, Window};
    pub use crate::session::{
        Session, SessionConfig,
        protocol::{Conventions, Frontward, ImageFormat, SceneSettings},
    };
}
