use super::{
    protocol::{Frame, ImageFormat, Request, Response, SceneSettings},
    transport::Transport,
};
use crate::error::Error;
use std::time::Duration;

/// An in-memory render server.
///
/// Records every request it receives. Unless frames are queued with
/// [`MockTransport::with_frames`], each render produces a dark frame of the configured
/// size holding a single point source at its center, blurred by the configured PSF.
#[derive(Clone, Debug)]
pub struct MockTransport {
    version: String,
    settings: SceneSettings,
    frames: Vec<Frame>,
    frame_index: usize,
    requests: Vec<Request>,
    rendered: bool,
    closed: bool,
    render_error: Option<String>,
    render_time: Duration,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    pub fn new() -> Self {
        Self {
            version: "mock-1.0".into(),
            settings: SceneSettings::default(),
            frames: Vec::new(),
            frame_index: 0,
            requests: Vec::new(),
            rendered: false,
            closed: false,
            render_error: None,
            render_time: Duration::ZERO,
        }
    }

    /// Serve `frames` in order, repeating the last one once exhausted.
    pub fn with_frames(mut self, frames: Vec<Frame>) -> Self {
        self.frames = frames;
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Make every render fail with `message`.
    pub fn with_render_error(mut self, message: impl Into<String>) -> Self {
        self.render_error = Some(message.into());
        self
    }

    /// Make every render take `render_time`, which times out if it exceeds the deadline.
    pub fn with_render_time(mut self, render_time: Duration) -> Self {
        self.render_time = render_time;
        self
    }

    /// Every request received so far, oldest first.
    pub fn requests(&self) -> &[Request] {
        &self.requests
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn next_frame(&mut self, format: ImageFormat) -> Frame {
        if let Some(frame) = self
            .frames
            .get(self.frame_index)
            .or_else(|| self.frames.last())
        {
            let frame = frame.clone();
            self.frame_index += 1;
            return frame;
        }

        self.point_source(format)
    }

    fn point_source(&self, format: ImageFormat) -> Frame {
        let (width, height) = self.settings.image_size;
        let (rows, cols) = (height as usize, width as usize);
        let channels = format.channels().unwrap_or(1);

        let mut intensity = vec![0.0f32; rows * cols];
        let (center_row, center_col) = (rows / 2, cols / 2);
        match &self.settings.psf {
            Some(psf) if !psf.weights.is_empty() => {
                for (i, w) in psf.weights.iter().enumerate() {
                    let row = (center_row + i / psf.cols).checked_sub(psf.rows / 2);
                    let col = (center_col + i % psf.cols).checked_sub(psf.cols / 2);
                    match (row, col) {
                        (Some(row), Some(col)) if row < rows && col < cols => {
                            intensity[row * cols + col] += *w as f32;
                        }
                        _ => {}
                    }
                }
            }
            _ => {
                if let Some(px) = intensity.get_mut(center_row * cols + center_col) {
                    *px = 1.0;
                }
            }
        }

        let data = intensity
            .into_iter()
            .flat_map(|v| match format {
                ImageFormat::Gray8 => vec![(v * 255.).round()],
                ImageFormat::Rgba8 => {
                    let v = (v * 255.).round();
                    vec![v, v, v, 255.]
                }
                _ => vec![v; channels],
            })
            .collect();

        Frame {
            format,
            rows,
            cols,
            channels,
            data,
        }
    }
}

impl Transport for MockTransport {
    fn exchange(&mut self, request: &Request, timeout: Duration) -> Result<Response, Error> {
        if self.closed {
            return Err(Error::Connection {
                address: "mock".into(),
                source: std::io::ErrorKind::NotConnected.into(),
            });
        }

        self.requests.push(request.clone());

        let response = match request {
            Request::Version => Response::Version {
                version: self.version.clone(),
            },
            Request::ConfigureScene(settings) => {
                self.settings = settings.clone();
                Response::Ok
            }
            Request::Render => {
                if self.render_time > timeout {
                    return Err(Error::Timeout { timeout });
                }

                match &self.render_error {
                    Some(message) => Response::Error {
                        message: message.clone(),
                    },
                    None => {
                        self.rendered = true;
                        Response::Ok
                    }
                }
            }
            Request::GetImage { format } => match self.rendered {
                true => Response::Image(self.next_frame(*format)),
                false => Response::Error {
                    message: "no image has been rendered".into(),
                },
            },
            Request::Reset => {
                self.settings = SceneSettings::default();
                self.rendered = false;
                Response::Ok
            }
            Request::Close => {
                self.closed = true;
                Response::Ok
            }
            _ => Response::Ok,
        };

        Ok(response)
    }
}
