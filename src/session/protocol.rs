//! Messages exchanged with the render server.
//!
//! Each request and response is a single JSON object. Requests are tagged by `op`,
//! responses by `status`.

use crate::{
    attitude::ScalarOrder,
    error::Error,
    image::Image,
    psf::Psf,
};
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Camera axis that points out of the lens.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Frontward {
    X,
    Y,
    #[default]
    Z,
}

impl Frontward {
    pub fn axis(&self) -> Vector3<f64> {
        match self {
            Frontward::X => Vector3::x(),
            Frontward::Y => Vector3::y(),
            Frontward::Z => Vector3::z(),
        }
    }
}

/// Quaternion layout and camera boresight agreed with the server.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conventions {
    pub scalar: ScalarOrder,
    pub frontward: Frontward,
}

impl Conventions {
    /// The camera boresight before any attitude is applied.
    pub fn boresight(&self) -> Vector3<f64> {
        self.frontward.axis()
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RenderMode {
    #[default]
    Raytracing,
    PathTracing,
    Preview,
}

/// A point spread function as sent over the wire.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PsfKernel {
    pub rows: usize,
    pub cols: usize,
    pub support_distance: usize,
    pub weights: Vec<f64>,
}

impl From<&Psf> for PsfKernel {
    fn from(psf: &Psf) -> Self {
        Self {
            rows: psf.rows(),
            cols: psf.cols(),
            support_distance: psf.support_distance(),
            weights: psf.as_slice().to_vec(),
        }
    }
}

/// Scene wide settings applied before any body is created.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SceneSettings {
    pub conventions: Conventions,
    pub fov_deg: f64,
    /// Image size as `(width, height)` in pixels.
    pub image_size: (u32, u32),
    pub samples_per_pixel: u32,
    #[serde(default)]
    pub mode: RenderMode,
    #[serde(default)]
    pub psf: Option<PsfKernel>,
}

impl Default for SceneSettings {
    fn default() -> Self {
        Self {
            conventions: Conventions::default(),
            fov_deg: 10.0,
            image_size: (512, 512),
            samples_per_pixel: 16,
            mode: RenderMode::default(),
            psf: None,
        }
    }
}

/// Pixel layout of an image requested from the server.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImageFormat {
    Gray8,
    Rgba8,
    #[default]
    #[serde(rename = "gray32f")]
    Gray32F,
    VarianceMap,
    Spectral,
}

impl ImageFormat {
    /// Number of channels the server returns for this format.
    ///
    /// Spectral projections carry a server defined number of bands and return `None`.
    pub fn channels(&self) -> Option<usize> {
        match self {
            ImageFormat::Gray8 | ImageFormat::Gray32F => Some(1),
            ImageFormat::Rgba8 | ImageFormat::VarianceMap => Some(4),
            ImageFormat::Spectral => None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Request {
    Version,
    ConfigureScene(SceneSettings),
    CreateShape {
        name: String,
        model: String,
        params: BTreeMap<String, f64>,
    },
    CreateBrdf {
        name: String,
        model: String,
        params: BTreeMap<String, f64>,
    },
    CreateBody {
        name: String,
        shape: String,
        material: String,
        textures: Vec<String>,
    },
    SetObjectPosition {
        name: String,
        position: [f64; 3],
    },
    SetObjectAttitude {
        name: String,
        attitude: [f64; 4],
    },
    SetBackground {
        starmap: String,
    },
    SetSunPower {
        power: [f64; 4],
    },
    Render,
    GetImage {
        format: ImageFormat,
    },
    Reset,
    Close,
}

impl Request {
    /// Short name of the operation, used in logs.
    pub fn op(&self) -> &'static str {
        match self {
            Request::Version => "version",
            Request::ConfigureScene(_) => "configure_scene",
            Request::CreateShape { .. } => "create_shape",
            Request::CreateBrdf { .. } => "create_brdf",
            Request::CreateBody { .. } => "create_body",
            Request::SetObjectPosition { .. } => "set_object_position",
            Request::SetObjectAttitude { .. } => "set_object_attitude",
            Request::SetBackground { .. } => "set_background",
            Request::SetSunPower { .. } => "set_sun_power",
            Request::Render => "render",
            Request::GetImage { .. } => "get_image",
            Request::Reset => "reset",
            Request::Close => "close",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response {
    Ok,
    Version { version: String },
    Image(Frame),
    Error { message: String },
}

/// Raw pixels returned by the server, row-major with interleaved channels.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    pub format: ImageFormat,
    pub rows: usize,
    pub cols: usize,
    pub channels: usize,
    pub data: Vec<f32>,
}

impl Frame {
    /// Checks that the sample count matches the frame geometry.
    pub fn validate(&self) -> Result<(), Error> {
        let expected = self
            .rows
            .checked_mul(self.cols)
            .and_then(|pixels| pixels.checked_mul(self.channels));
        if self.channels == 0 || expected != Some(self.data.len()) {
            return Err(Error::InvalidInput(format!(
                "{:?} frame of {}x{}x{} holds {} samples",
                self.format,
                self.rows,
                self.cols,
                self.channels,
                self.data.len()
            )));
        }

        match self.format.channels() {
            Some(channels) if channels != self.channels => Err(Error::InvalidInput(format!(
                "expected {channels} channels for {:?} but got: {}",
                self.format, self.channels
            ))),
            _ => Ok(()),
        }
    }

    /// Collapses the frame into a single channel image by averaging channels.
    ///
    /// The alpha channel of RGBA frames is ignored.
    pub fn into_image(self) -> Result<Image, Error> {
        self.validate()?;

        let used = match self.format {
            ImageFormat::Rgba8 => 3,
            _ => self.channels,
        };

        let pixels = self
            .data
            .chunks_exact(self.channels)
            .map(|px| px[..used].iter().map(|v| *v as f64).sum::<f64>() / used as f64)
            .collect();

        Image::from_vec(self.rows, self.cols, pixels)
    }
}
