//! http.rs
//! Thin JSON transport over the control surface.
//!
//! Routes:
//! - `POST /api/joystick` `{x, y}`
//! - `POST /api/sliders`  `{headH?, headV?, waist?}`
//! - `POST /api/stop`
//! - `POST /api/home` (blocks for the settle time)
//! - `GET  /api/status`
//!
//! Each request is handled on its own thread so a blocking `home` does not
//! hold up joystick updates.

use log::{debug, error, info};
use serde_json::{Value, json};
use std::{
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    thread,
    time::Duration,
};
use tiny_http::{Header, Method, Request, Response, Server};

use crate::teleop::{
    intent::{JoystickUpdate, SliderUpdate},
    surface::ControlSurface,
};
use crate::utils::error::{Result, RobotError};

const ACCEPT_POLL: Duration = Duration::from_millis(200);

#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    pub status: u16,
    pub body: Value,
}

impl Reply {
    fn ok(body: Value) -> Self {
        Self { status: 200, body }
    }

    fn error(status: u16, message: impl ToString) -> Self {
        Self {
            status,
            body: json!({ "status": "error", "message": message.to_string() }),
        }
    }
}

/// Maps one request onto the control surface. Transport-free, so it is
/// testable without sockets.
pub fn route(surface: &ControlSurface, method: &Method, path: &str, body: &str) -> Reply {
    let path = path.split('?').next().unwrap_or(path);
    match (method, path) {
        (Method::Post, "/api/joystick") => {
            let update: JoystickUpdate = match serde_json::from_str(body) {
                Ok(u) => u,
                Err(e) => return Reply::error(400, RobotError::InvalidInput(e.to_string())),
            };
            match surface.joystick(update) {
                Ok(s) => Reply::ok(json!({ "status": "success", "x": s.x, "y": s.y })),
                Err(e) => Reply::error(400, e),
            }
        }
        (Method::Post, "/api/sliders") => {
            let update: SliderUpdate = match serde_json::from_str(body) {
                Ok(u) => u,
                Err(e) => return Reply::error(400, RobotError::InvalidInput(e.to_string())),
            };
            let s = surface.sliders(update);
            Reply::ok(json!({
                "status": "success",
                "headH": s.head_h,
                "headV": s.head_v,
                "waist": s.waist,
            }))
        }
        (Method::Post, "/api/stop") => match surface.stop() {
            Ok(_) => Reply::ok(json!({ "status": "stopped" })),
            Err(e) => Reply::error(500, e),
        },
        (Method::Post, "/api/home") => match surface.home() {
            Ok(_) => Reply::ok(json!({ "status": "homed" })),
            Err(e) => Reply::error(500, e),
        },
        (Method::Get, "/api/status") => match serde_json::to_value(surface.status()) {
            Ok(v) => Reply::ok(v),
            Err(e) => Reply::error(500, e),
        },
        (_, "/api/joystick" | "/api/sliders" | "/api/stop" | "/api/home" | "/api/status") => {
            Reply::error(405, "method not allowed")
        }
        _ => Reply::error(404, "not found"),
    }
}

pub struct HttpServer {
    server: Server,
    running: Arc<AtomicBool>,
}

impl HttpServer {
    pub fn bind(addr: &str) -> Result<Self> {
        let server = Server::http(addr)
            .map_err(|e| RobotError::Io(std::io::Error::other(format!("bind {}: {}", addr, e))))?;
        info!("control server listening on http://{}", addr);
        Ok(Self { server, running: Arc::new(AtomicBool::new(true)) })
    }

    /// Bound TCP address; useful when binding to port 0.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.server.server_addr().to_ip()
    }

    /// Flag that ends the accept loop when cleared.
    pub fn running_flag(&self) -> Arc<AtomicBool> {
        self.running.clone()
    }

    /// Accept loop on a dedicated thread; one thread per request.
    pub fn spawn(self, surface: ControlSurface) -> Result<thread::JoinHandle<()>> {
        Ok(thread::Builder::new()
            .name("http-accept".into())
            .spawn(move || self.accept_loop(surface))?)
    }

    fn accept_loop(self, surface: ControlSurface) {
        while self.running.load(Ordering::Acquire) {
            match self.server.recv_timeout(ACCEPT_POLL) {
                Ok(Some(request)) => {
                    let surface = surface.clone();
                    let spawned = thread::Builder::new()
                        .name("http-request".into())
                        .spawn(move || handle_request(request, &surface));
                    if let Err(e) = spawned {
                        error!("failed to spawn request handler: {}", e);
                    }
                }
                Ok(None) => {}
                Err(e) => error!("accept error: {}", e),
            }
        }
        info!("control server exiting accept loop");
    }
}

fn handle_request(mut request: Request, surface: &ControlSurface) {
    let mut body = String::new();
    let reply = match request.as_reader().read_to_string(&mut body) {
        Ok(_) => route(surface, request.method(), request.url(), &body),
        Err(e) => Reply::error(400, format!("unreadable body: {}", e)),
    };
    debug!("{} {} -> {}", request.method(), request.url(), reply.status);

    let mut response = Response::from_string(reply.body.to_string()).with_status_code(reply.status);
    if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]) {
        response = response.with_header(header);
    }
    if let Err(e) = request.respond(response) {
        error!("failed to send response: {}", e);
    }
}
