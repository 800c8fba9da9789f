//! A client session with the render server.
//!
//! A [`Session`] owns its connection. Every operation borrows it mutably, so one session
//! never has two requests in flight. Run one session per concurrent render.

pub mod mock;
pub mod protocol;
pub mod transport;

use crate::{
    attitude::{Quaternion, ScalarOrder},
    error::Error,
    image::Image,
};
use nalgebra::Vector3;
use protocol::{Frame, ImageFormat, Request, Response, SceneSettings};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    io::{BufRead, Write},
    time::Duration,
};
use tracing::{debug, info, warn};
use transport::{TcpTransport, Transport};

pub use mock::MockTransport;

/// Where the render server lives and how long to wait for it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub host: String,
    pub port: u16,
    #[serde(with = "seconds")]
    pub connect_timeout: Duration,
    #[serde(with = "seconds")]
    pub request_timeout: Duration,
    #[serde(with = "seconds")]
    pub render_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 5151,
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            render_timeout: Duration::from_secs(600),
        }
    }
}

mod seconds {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let secs = f64::deserialize(deserializer)?;
        match Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)? {
            duration if duration.is_zero() => {
                Err(serde::de::Error::custom("timeout must be greater than zero"))
            }
            duration => Ok(duration),
        }
    }
}

pub struct Session<T: Transport = TcpTransport> {
    transport: T,
    config: SessionConfig,
    scalar: ScalarOrder,
    recording: Option<Vec<Request>>,
}

impl Session<TcpTransport> {
    /// Connects to the render server at `host:port` with default timeouts.
    pub fn connect(host: &str, port: u16) -> Result<Self, Error> {
        Self::connect_with(SessionConfig {
            host: host.into(),
            port,
            ..Default::default()
        })
    }

    pub fn connect_with(config: SessionConfig) -> Result<Self, Error> {
        let transport = TcpTransport::connect(&config.host, config.port, config.connect_timeout)?;
        info!(address = transport.address(), "connected to render server");
        Ok(Self::with_transport(transport, config))
    }
}

impl<T: Transport> Session<T> {
    /// Wraps an already connected transport.
    pub fn with_transport(transport: T, config: SessionConfig) -> Self {
        Self {
            transport,
            config,
            scalar: ScalarOrder::default(),
            recording: None,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    fn request(&mut self, request: Request, timeout: Duration) -> Result<Response, Error> {
        debug!(op = request.op(), "sending request");
        let response = match self.transport.exchange(&request, timeout)? {
            Response::Error { message } => {
                warn!(op = request.op(), %message, "render server reported an error");
                return Err(Error::Render(message));
            }
            response => response,
        };

        if let Some(log) = &mut self.recording {
            if changes_scene(&request) {
                log.push(request);
            }
        }
        Ok(response)
    }

    /// Starts recording every request that changes the scene, dropping any earlier log.
    ///
    /// Queries and the final close are left out of the log.
    pub fn record(&mut self) {
        info!("recording session");
        self.recording = Some(Vec::new());
    }

    /// Requests recorded since [`Session::record`], oldest first.
    pub fn recorded(&self) -> &[Request] {
        self.recording.as_deref().unwrap_or_default()
    }

    /// Writes the recorded requests to `writer` as JSON lines.
    pub fn write_replay<W: Write>(&self, mut writer: W) -> Result<(), Error> {
        for request in self.recorded() {
            serde_json::to_writer(&mut writer, request)?;
            writer.write_all(b"\n")?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Recorded requests as JSON lines.
    pub fn replay_log(&self) -> Result<String, Error> {
        let mut log = Vec::new();
        self.write_replay(&mut log)?;
        String::from_utf8(log).map_err(|err| Error::InvalidInput(err.to_string()))
    }

    /// Re-issues requests read as JSON lines from `reader`, returning how many were sent.
    ///
    /// Blank lines are skipped. Replay stops at the first request the server rejects.
    pub fn replay<R: BufRead>(&mut self, reader: R) -> Result<usize, Error> {
        let mut sent = 0;
        for line in reader.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }

            let request: Request = serde_json::from_str(&line)?;
            match request {
                Request::ConfigureScene(settings) => self.configure_scene(&settings)?,
                Request::Render => self.render()?,
                Request::Reset => self.reset()?,
                Request::Close => {
                    return Err(Error::InvalidInput(
                        "replay cannot close the session".into(),
                    ));
                }
                request => {
                    self.request(request, self.config.request_timeout)?;
                }
            }
            sent += 1;
        }

        info!(requests = sent, "replayed session");
        Ok(sent)
    }

    fn expect_ok(&mut self, request: Request) -> Result<(), Error> {
        let op = request.op();
        match self.request(request, self.config.request_timeout)? {
            Response::Ok => Ok(()),
            other => Err(unexpected(op, &other)),
        }
    }

    /// Returns the version string reported by the server.
    pub fn version(&mut self) -> Result<String, Error> {
        match self.request(Request::Version, self.config.request_timeout)? {
            Response::Version { version } => Ok(version),
            other => Err(unexpected("version", &other)),
        }
    }

    /// Sets conventions, camera, sampling and PSF for the scene.
    ///
    /// Attitudes sent afterwards use the scalar position chosen by `settings`.
    pub fn configure_scene(&mut self, settings: &SceneSettings) -> Result<(), Error> {
        self.expect_ok(Request::ConfigureScene(settings.clone()))?;
        self.scalar = settings.conventions.scalar;
        Ok(())
    }

    pub fn create_shape(
        &mut self,
        name: &str,
        model: &str,
        params: BTreeMap<String, f64>,
    ) -> Result<(), Error> {
        self.expect_ok(Request::CreateShape {
            name: name.into(),
            model: model.into(),
            params,
        })
    }

    pub fn create_brdf(
        &mut self,
        name: &str,
        model: &str,
        params: BTreeMap<String, f64>,
    ) -> Result<(), Error> {
        self.expect_ok(Request::CreateBrdf {
            name: name.into(),
            model: model.into(),
            params,
        })
    }

    pub fn create_body(
        &mut self,
        name: &str,
        shape: &str,
        material: &str,
        textures: &[String],
    ) -> Result<(), Error> {
        self.expect_ok(Request::CreateBody {
            name: name.into(),
            shape: shape.into(),
            material: material.into(),
            textures: textures.to_vec(),
        })
    }

    pub fn set_object_position(&mut self, name: &str, position: &Vector3<f64>) -> Result<(), Error> {
        self.expect_ok(Request::SetObjectPosition {
            name: name.into(),
            position: [position.x, position.y, position.z],
        })
    }

    pub fn set_object_attitude(&mut self, name: &str, attitude: &Quaternion) -> Result<(), Error> {
        self.expect_ok(Request::SetObjectAttitude {
            name: name.into(),
            attitude: attitude.components(self.scalar),
        })
    }

    /// Uses the star map file `starmap` as the scene background.
    pub fn set_background(&mut self, starmap: &str) -> Result<(), Error> {
        self.expect_ok(Request::SetBackground {
            starmap: starmap.into(),
        })
    }

    pub fn set_sun_power(&mut self, power: [f64; 4]) -> Result<(), Error> {
        self.expect_ok(Request::SetSunPower { power })
    }

    /// Renders the scene, blocking until the server finishes or the render timeout elapses.
    pub fn render(&mut self) -> Result<(), Error> {
        info!(timeout = ?self.config.render_timeout, "rendering");
        match self.request(Request::Render, self.config.render_timeout)? {
            Response::Ok => Ok(()),
            other => Err(unexpected("render", &other)),
        }
    }

    /// Fetches the last rendered image in `format` without collapsing its channels.
    pub fn frame(&mut self, format: ImageFormat) -> Result<Frame, Error> {
        match self.request(Request::GetImage { format }, self.config.request_timeout)? {
            Response::Image(frame) => {
                frame.validate()?;
                debug!(rows = frame.rows, cols = frame.cols, channels = frame.channels, "received frame");
                Ok(frame)
            }
            other => Err(unexpected("get_image", &other)),
        }
    }

    /// Fetches the last rendered image in `format` as a single channel image.
    pub fn image(&mut self, format: ImageFormat) -> Result<Image, Error> {
        self.frame(format)?.into_image()
    }

    /// Drops every entity and setting on the server so the session can build a new scene.
    pub fn reset(&mut self) -> Result<(), Error> {
        self.expect_ok(Request::Reset)?;
        self.scalar = ScalarOrder::default();
        Ok(())
    }

    /// Releases the server side state and ends the session.
    pub fn close(mut self) -> Result<T, Error> {
        self.expect_ok(Request::Close)?;
        info!("closed render server session");
        Ok(self.transport)
    }
}

fn changes_scene(request: &Request) -> bool {
    !matches!(
        request,
        Request::Version | Request::GetImage { .. } | Request::Close
    )
}

fn unexpected(op: &str, response: &Response) -> Error {
    Error::Render(format!("unexpected response to {op}: {response:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{psf::Psf, session::protocol::PsfKernel};

    #[test]
    fn default_config() {
        let config = SessionConfig::default();
        assert_eq!((config.host.as_str(), config.port), ("localhost", 5151));
    }

    #[test]
    fn config_timeouts_in_seconds() {
        let config: SessionConfig =
            serde_json::from_str(r#"{ "port": 6000, "render_timeout": 2.5 }"#).unwrap();
        assert_eq!(config.port, 6000);
        assert_eq!(config.host, "localhost");
        assert_eq!(config.render_timeout, Duration::from_millis(2500));

        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["render_timeout"], 2.5);
    }

    #[test]
    fn negative_timeout_rejected() {
        assert!(serde_json::from_str::<SessionConfig>(r#"{ "request_timeout": -1 }"#).is_err());
    }

    #[test]
    fn zero_timeout_rejected() {
        assert!(serde_json::from_str::<SessionConfig>(r#"{ "render_timeout": 0 }"#).is_err());
        assert!(serde_json::from_str::<SessionConfig>(r#"{ "connect_timeout": 0.0 }"#).is_err());
    }

    #[test]
    fn attitude_follows_conventions() {
        let mut session = Session::with_transport(MockTransport::new(), SessionConfig::default());
        let q = Quaternion::new(0.0, 0.0, 0.5f64.sqrt(), 0.5f64.sqrt());

        session.set_object_attitude("camera", &q).unwrap();
        let mut settings = SceneSettings::default();
        settings.conventions.scalar = ScalarOrder::First;
        session.configure_scene(&settings).unwrap();
        session.set_object_attitude("camera", &q).unwrap();

        let attitudes: Vec<[f64; 4]> = session
            .transport()
            .requests()
            .iter()
            .filter_map(|request| match request {
                Request::SetObjectAttitude { attitude, .. } => Some(*attitude),
                _ => None,
            })
            .collect();
        assert_eq!(attitudes[0], q.components(ScalarOrder::Last));
        assert_eq!(attitudes[1], q.components(ScalarOrder::First));
    }

    #[test]
    fn server_error_becomes_render_error() {
        let mock = MockTransport::new().with_render_error("scene is empty");
        let mut session = Session::with_transport(mock, SessionConfig::default());

        match session.render() {
            Err(Error::Render(message)) => assert_eq!(message, "scene is empty"),
            other => panic!("expected a render error but got: {other:?}"),
        }
    }

    #[test]
    fn render_uses_render_timeout() {
        let mock = MockTransport::new().with_render_time(Duration::from_secs(60));
        let config = SessionConfig {
            render_timeout: Duration::from_secs(30),
            ..Default::default()
        };
        let mut session = Session::with_transport(mock, config);

        assert!(matches!(
            session.render(),
            Err(Error::Timeout { timeout }) if timeout == Duration::from_secs(30)
        ));
    }

    #[test]
    fn replayed_scene_renders_the_same_image() {
        let mut settings = SceneSettings::default();
        settings.image_size = (9, 7);
        settings.psf = Some(PsfKernel::from(&Psf::gaussian(3, 1.0).unwrap()));

        let mut original = Session::with_transport(MockTransport::new(), SessionConfig::default());
        original.record();
        original.version().unwrap();
        original.configure_scene(&settings).unwrap();
        original
            .set_object_position("camera", &Vector3::new(0.0, 0.0, 5.0))
            .unwrap();
        original.render().unwrap();
        let expected = original.image(ImageFormat::Gray32F).unwrap();

        let log = original.replay_log().unwrap();
        assert_eq!(log.lines().count(), 3);
        assert_eq!(original.recorded()[0], Request::ConfigureScene(settings));

        let mut replayed = Session::with_transport(MockTransport::new(), SessionConfig::default());
        assert_eq!(replayed.replay(log.as_bytes()).unwrap(), 3);
        assert_eq!(replayed.image(ImageFormat::Gray32F).unwrap(), expected);
    }

    #[test]
    fn nothing_recorded_before_record() {
        let mut session = Session::with_transport(MockTransport::new(), SessionConfig::default());
        session.render().unwrap();
        assert!(session.recorded().is_empty());
        assert_eq!(session.replay_log().unwrap(), "");
    }

    #[test]
    fn replay_refuses_close() {
        let mut session = Session::with_transport(MockTransport::new(), SessionConfig::default());
        assert!(matches!(
            session.replay("{\"op\":\"close\"}\n".as_bytes()),
            Err(Error::InvalidInput(_))
        ));
        assert!(!session.transport().is_closed());
    }

    #[test]
    fn close_consumes_session() {
        let session = Session::with_transport(MockTransport::new(), SessionConfig::default());
        let transport = session.close().unwrap();
        assert!(transport.is_closed());
    }
}
