//! JSON scene descriptions that drive a [`Session`] from configuration files.

use crate::{
    attitude::{Quaternion, look_at},
    celestial::{Equatorial, look_at_star},
    error::Error,
    image::Image,
    psf::{Psf, PsfConfig},
    session::{
        Session,
        protocol::{Conventions, ImageFormat, PsfKernel, RenderMode, SceneSettings},
        transport::Transport,
    },
};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeMap, fs, path::Path};
use tracing::info;
use uom::si::{angle::degree, f64::Angle};

/// Name of the camera object on the server.
pub const CAMERA: &str = "camera";

/// A rotation of `angle_deg` degrees about `axis`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Rotation {
    pub axis: [f64; 3],
    pub angle_deg: f64,
}

/// Folds `rotations` into one attitude, applying the first one first.
fn attitude_from(rotations: &[Rotation]) -> Result<Quaternion, Error> {
    Quaternion::from_rotations(rotations.iter().map(|r| {
        (
            Vector3::from(r.axis),
            Angle::new::<degree>(r.angle_deg),
        )
    }))
}

/// A named shape or material model with scalar parameters.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    pub model: String,
    #[serde(default)]
    pub params: BTreeMap<String, f64>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Body {
    pub name: String,
    pub shape: String,
    pub material: String,
    #[serde(default)]
    pub textures: Vec<String>,
    #[serde(default)]
    pub position: [f64; 3],
    #[serde(default)]
    pub rotations: Vec<Rotation>,
}

/// How the camera attitude is chosen.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Pointing {
    /// A sequence of rotations applied to the boresight in order.
    Rotations { rotations: Vec<Rotation> },

    /// Point the boresight from the camera position at `target`.
    LookAt { target: [f64; 3] },

    /// Point the boresight at a star given in sexagesimal right ascension and declination.
    Star { ra: String, dec: String },

    /// Point the boresight at one of the bundled example stars.
    ExampleStar { name: String },
}

impl Default for Pointing {
    fn default() -> Self {
        Pointing::Rotations {
            rotations: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    #[serde(default)]
    pub position: [f64; 3],
    #[serde(default)]
    pub pointing: Pointing,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SceneConfig {
    #[serde(default)]
    pub conventions: Conventions,
    pub fov_deg: f64,
    /// Image size as `(width, height)` in pixels.
    pub image_size: (u32, u32),
    pub samples_per_pixel: u32,
    #[serde(default)]
    pub mode: RenderMode,
    #[serde(default)]
    pub psf: Option<PsfConfig>,
    /// Star map file used as background.
    #[serde(default)]
    pub background: Option<String>,
    #[serde(default)]
    pub sun_power: Option<[f64; 4]>,
    #[serde(default)]
    pub shapes: Vec<Entity>,
    #[serde(default)]
    pub brdfs: Vec<Entity>,
    #[serde(default)]
    pub bodies: Vec<Body>,
    #[serde(default)]
    pub camera: Camera,
    #[serde(default)]
    pub output: ImageFormat,
}

impl SceneConfig {
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, Error> {
        let serialized = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&serialized)?)
    }

    /// Scene wide settings sent before any entity is created.
    pub fn settings(&self) -> Result<SceneSettings, Error> {
        let psf = match self.psf {
            Some(config) => Some(PsfKernel::from(&Psf::try_from(config)?)),
            None => None,
        };

        Ok(SceneSettings {
            conventions: self.conventions,
            fov_deg: self.fov_deg,
            image_size: self.image_size,
            samples_per_pixel: self.samples_per_pixel,
            mode: self.mode,
            psf,
        })
    }

    /// Solves the camera attitude for the configured pointing.
    pub fn camera_attitude(&self) -> Result<Quaternion, Error> {
        let boresight = self.conventions.boresight();
        match &self.camera.pointing {
            Pointing::Rotations { rotations } => attitude_from(rotations),
            Pointing::LookAt { target } => look_at(
                &boresight,
                &Vector3::from(self.camera.position),
                &Vector3::from(*target),
            ),
            Pointing::Star { ra, dec } => {
                look_at_star(&boresight, &Equatorial::from_sexagesimal(ra, dec)?)
            }
            Pointing::ExampleStar { name } => {
                look_at_star(&boresight, &Equatorial::example_star(name)?)
            }
        }
    }

    /// Builds the scene on the server behind `session`.
    pub fn apply<T: Transport>(&self, session: &mut Session<T>) -> Result<(), Error> {
        session.configure_scene(&self.settings()?)?;

        for shape in &self.shapes {
            session.create_shape(&shape.name, &shape.model, shape.params.clone())?;
        }

        for brdf in &self.brdfs {
            session.create_brdf(&brdf.name, &brdf.model, brdf.params.clone())?;
        }

        for body in &self.bodies {
            session.create_body(&body.name, &body.shape, &body.material, &body.textures)?;
            session.set_object_position(&body.name, &Vector3::from(body.position))?;
            session.set_object_attitude(&body.name, &attitude_from(&body.rotations)?)?;
        }

        if let Some(starmap) = &self.background {
            session.set_background(starmap)?;
        }

        if let Some(power) = self.sun_power {
            session.set_sun_power(power)?;
        }

        session.set_object_position(CAMERA, &Vector3::from(self.camera.position))?;
        session.set_object_attitude(CAMERA, &self.camera_attitude()?)?;

        info!(bodies = self.bodies.len(), "scene applied");
        Ok(())
    }

    /// Builds the scene, renders it and fetches the image in the configured output format.
    pub fn render<T: Transport>(&self, session: &mut Session<T>) -> Result<Image, Error> {
        self.apply(session)?;
        session.render()?;
        session.image(self.output)
    }
}
