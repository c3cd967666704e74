
//! # Teleoperation Server Entry Point
//!
//! Connects to the servo controller, applies servo limits, starts the 20 Hz
//! control loop and serves the joystick API until Ctrl-C.
//!
//! ## Startup (any failure exits with status 1)
//! - Config from `$ROBOT_CONFIG` (JSON), defaults otherwise.
//! - Bus: Maestro on the configured serial port, or the simulated bus.
//! - Session: joint map validated, wheels configured and stopped, loop started.
//! - HTTP: `tiny_http` on `http_bind` (default `0.0.0.0:5000`).
//!
//! ## Shutdown
//! Accept loop stopped → control loop stopped (bounded wait, final wheel stop)
//! → wheels stopped again → bus closed.

use log::{error, info, warn};
use std::{process::ExitCode, sync::atomic::Ordering};

use teleop_core::{
    actuator::{bus::BusHandle, maestro::MaestroController, simulated::SimulatedBus},
    server::http::HttpServer,
    teleop::session::TeleopSession,
    utils::config::{DriverKind, RobotConfig},
    Result,
};

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    env_logger::init();
    info!("=== TELEOP SERVER START ===");

    let config = match RobotConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("failed to load configuration: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let bus = match connect_bus(&config) {
        Ok(bus) => bus,
        Err(e) => {
            error!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    let mut session = match TeleopSession::initialize(&config, bus) {
        Ok(session) => session,
        Err(e) => {
            error!("robot initialization failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = session.start() {
        error!("failed to start control loop: {}", e);
        let _ = session.shutdown();
        return ExitCode::FAILURE;
    }

    let http = match HttpServer::bind(&config.http_bind)
        .and_then(|server| {
            let flag = server.running_flag();
            server.spawn(session.surface()).map(|handle| (flag, handle))
        }) {
        Ok(http) => http,
        Err(e) => {
            error!("failed to start control server: {}", e);
            let _ = session.shutdown();
            return ExitCode::FAILURE;
        }
    };

    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("shutdown requested"),
        Err(e) => error!("failed to listen for Ctrl-C: {}", e),
    }

    let (http_running, http_handle) = http;
    http_running.store(false, Ordering::Release);
    if http_handle.join().is_err() {
        error!("accept thread panicked");
    }

    match session.shutdown() {
        Ok(()) => {
            info!("=== TELEOP SERVER FINISHED ===");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("unclean shutdown: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn connect_bus(config: &RobotConfig) -> Result<BusHandle> {
    match config.driver {
        DriverKind::Maestro => {
            info!("connecting to Maestro controller on {}...", config.serial.port);
            Ok(BusHandle::new(MaestroController::connect(&config.serial)?))
        }
        DriverKind::Simulated => {
            warn!("using simulated servo bus (fault rate {})", config.sim_fault_rate);
            Ok(BusHandle::new(SimulatedBus::with_fault_rate(config.sim_fault_rate)))
        }
    }
}
