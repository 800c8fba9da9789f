use nalgebra::Vector3;
use skyshot::{
    prelude::*,
    session::{
        MockTransport,
        protocol::{Frame, Request, Response},
    },
};
use std::{
    io::{BufRead, BufReader, Write},
    net::TcpListener,
    thread,
    time::Duration,
};

fn frame(rows: usize, cols: usize, value: f32) -> Frame {
    Frame {
        format: ImageFormat::Gray32F,
        rows,
        cols,
        channels: 1,
        data: vec![value; rows * cols],
    }
}

/// Serves one client, answering every request until it closes the session.
fn fake_server() -> (u16, thread::JoinHandle<Vec<Request>>) {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();

    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let mut writer = stream;
        let mut received = Vec::new();

        loop {
            let mut line = String::new();
            if reader.read_line(&mut line).unwrap() == 0 {
                break;
            }

            let request: Request = serde_json::from_str(&line).unwrap();
            let response = match &request {
                Request::Version => Response::Version {
                    version: "fake-2.0".into(),
                },
                Request::GetImage { .. } => Response::Image(frame(2, 3, 0.25)),
                Request::SetBackground { .. } => Response::Error {
                    message: "star map not found".into(),
                },
                _ => Response::Ok,
            };

            let mut reply = serde_json::to_string(&response).unwrap();
            reply.push('\n');
            writer.write_all(reply.as_bytes()).unwrap();

            let done = request == Request::Close;
            received.push(request);
            if done {
                break;
            }
        }

        received
    });

    (port, handle)
}

#[test]
fn tcp_session_lifecycle() {
    let (port, server) = fake_server();

    let mut session = Session::connect("127.0.0.1", port).unwrap();
    assert_eq!(session.version().unwrap(), "fake-2.0");

    session.configure_scene(&SceneSettings::default()).unwrap();
    session
        .set_object_position("camera", &Vector3::new(1.0, 2.0, 3.0))
        .unwrap();

    match session.set_background("missing.tiff") {
        Err(Error::Render(message)) => assert_eq!(message, "star map not found"),
        other => panic!("expected a render error but got: {other:?}"),
    }

    session.render().unwrap();
    let image = session.image(ImageFormat::Gray32F).unwrap();
    assert_eq!((image.rows(), image.cols()), (2, 3));
    assert_eq!(image.get(1, 2), Some(0.25));

    session.close().unwrap();

    let received = server.join().unwrap();
    assert_eq!(received.first(), Some(&Request::Version));
    assert_eq!(received.last(), Some(&Request::Close));
    assert!(received.contains(&Request::SetObjectPosition {
        name: "camera".into(),
        position: [1.0, 2.0, 3.0],
    }));
}

#[test]
fn unreachable_server() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);

    let config = SessionConfig {
        host: "127.0.0.1".into(),
        port,
        connect_timeout: Duration::from_secs(1),
        ..Default::default()
    };
    assert!(matches!(Session::connect_with(config), Err(Error::Connection { .. })));
}

#[test]
fn reset_allows_a_new_scene() {
    let mock = MockTransport::new().with_frames(vec![frame(1, 1, 1.0), frame(1, 1, 2.0)]);
    let mut session = Session::with_transport(mock, SessionConfig::default());

    session.render().unwrap();
    assert_eq!(session.image(ImageFormat::Gray32F).unwrap().as_slice(), &[1.0]);

    session.reset().unwrap();
    assert!(matches!(session.image(ImageFormat::Gray32F), Err(Error::Render(_))));

    session.render().unwrap();
    assert_eq!(session.image(ImageFormat::Gray32F).unwrap().as_slice(), &[2.0]);
}

#[test]
fn malformed_frame_is_rejected() {
    let mut bad = frame(2, 2, 0.0);
    bad.data.pop();
    let mut session = Session::with_transport(
        MockTransport::new().with_frames(vec![bad]),
        SessionConfig::default(),
    );

    session.render().unwrap();
    assert!(matches!(
        session.frame(ImageFormat::Gray32F),
        Err(Error::InvalidInput(_))
    ));
}

#[test]
fn render_timeout() {
    let config = SessionConfig {
        render_timeout: Duration::from_millis(10),
        ..Default::default()
    };
    let mock = MockTransport::new().with_render_time(Duration::from_secs(1));
    let mut session = Session::with_transport(mock, config);

    assert!(matches!(session.render(), Err(Error::Timeout { .. })));
}

#[test]
fn late_render_reply_does_not_answer_the_next_request() {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let server = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let mut writer = stream;

        let mut line = String::new();
        while reader.read_line(&mut line).unwrap_or(0) > 0 {
            let request: Request = serde_json::from_str(&line).unwrap();
            if request == Request::Render {
                thread::sleep(Duration::from_millis(300));
            }
            let response = match request {
                Request::Version => Response::Version {
                    version: "fake-2.0".into(),
                },
                _ => Response::Ok,
            };
            let mut reply = serde_json::to_string(&response).unwrap();
            reply.push('\n');
            if writer.write_all(reply.as_bytes()).is_err() {
                break;
            }
            line.clear();
        }
    });

    let config = SessionConfig {
        host: "127.0.0.1".into(),
        port,
        render_timeout: Duration::from_millis(50),
        ..Default::default()
    };
    let mut session = Session::connect_with(config).unwrap();

    assert!(matches!(session.render(), Err(Error::Timeout { .. })));
    thread::sleep(Duration::from_millis(400));
    assert!(matches!(session.version(), Err(Error::Connection { .. })));

    drop(session);
    server.join().unwrap();
}
