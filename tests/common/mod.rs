#![allow(dead_code)]

use std::io::Write;
use std::sync::{Arc, Mutex};

use pathrouter::config::AppConfig;
use pathrouter::router::{PathRouter, Resolve};
use pathrouter::server::{App, Environ};

/// What the transport saw for one request.
#[derive(Debug)]
pub struct Captured {
    pub status: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Captured {
    pub fn status_code(&self) -> u16 {
        self.status
            .split(' ')
            .next()
            .and_then(|code| code.parse().ok())
            .unwrap_or_default()
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn text(&self) -> &str {
        std::str::from_utf8(&self.body).unwrap()
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

/// Run one request through the gateway entry point.
pub fn call(app: &App, environ: Environ) -> Captured {
    let mut status = String::new();
    let mut headers = Vec::new();
    let body = app.call(environ, |line, list| {
        status = line.to_string();
        headers = list.to_vec();
    });
    Captured {
        status,
        headers,
        body: body.into_bytes(),
    }
}

pub fn app<R: Resolve + 'static>(resolver: R) -> App {
    App::new(resolver, AppConfig::default())
}

pub fn router_app(router: PathRouter) -> App {
    app(router)
}

/// `MakeWriter` collecting formatted log lines in memory.
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

impl Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogBuffer {
    type Writer = LogBuffer;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Install a thread-local subscriber writing into a [`LogBuffer`].
pub fn capture_logs() -> (LogBuffer, tracing::subscriber::DefaultGuard) {
    let buffer = LogBuffer::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(buffer.clone())
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .finish();
    let guard = tracing::subscriber::set_default(subscriber);
    (buffer, guard)
}
