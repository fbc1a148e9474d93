//! Host simulator.
//!
//! Runs the full firmware core against a synthetic PPG source and serves
//! the control surface on the configured port:
//!
//! ```text
//! pulseox-sim [config.json]
//!
//! PULSEOX_SIM_HR=72 PULSEOX_SIM_SPO2=98 RUST_LOG=debug pulseox-sim
//! curl -X POST localhost:8080/start -d '{"name":"Ana"}'
//! curl localhost:8080/status
//! ```

use std::env;
use std::fs;

use anyhow::{Context, Result};
use log::info;

use pulseox::adapters::http_server::HttpServer;
use pulseox::adapters::log_presenter::LogPresenter;
use pulseox::adapters::log_sink::LogEventSink;
use pulseox::adapters::time::SystemClock;
use pulseox::app::ports::Ports;
use pulseox::app::service::AppService;
use pulseox::config::SystemConfig;
use pulseox::sensors::estimator::RatioOfRatiosEstimator;
use pulseox::sensors::simulated::SimulatedPpg;

/// Port used when no config file overrides it; 80 needs privileges.
const SIM_HTTP_PORT: u16 = 8080;

fn env_f32(name: &str, default: f32) -> Result<f32> {
    match env::var(name) {
        Ok(v) => v.parse().with_context(|| format!("{name}={v:?} is not a number")),
        Err(_) => Ok(default),
    }
}

fn load_config() -> Result<SystemConfig> {
    let Some(path) = env::args().nth(1) else {
        return Ok(SystemConfig {
            http_port: SIM_HTTP_PORT,
            ..SystemConfig::default()
        });
    };
    let bytes = fs::read(&path).with_context(|| format!("reading {path}"))?;
    let config = SystemConfig::from_json(&bytes).with_context(|| format!("loading {path}"))?;
    info!("Config loaded from {path}");
    Ok(config)
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let config = load_config()?;
    let hr = env_f32("PULSEOX_SIM_HR", 72.0)?;
    let spo2 = env_f32("PULSEOX_SIM_SPO2", 98.0)?;
    info!("Simulating a {hr} bpm / {spo2}% subject at {} Hz", config.sample_rate_hz);

    let mut sensor = SimulatedPpg::new(config.sample_rate_hz, hr, spo2);
    let mut estimator = RatioOfRatiosEstimator::new(config.sample_rate_hz);
    let mut presenter = LogPresenter::new();
    let mut clock = SystemClock::new();
    let mut http = HttpServer::bind(config.http_port)
        .with_context(|| format!("binding port {}", config.http_port))?;
    let mut events = LogEventSink::new();

    let mut app = AppService::new(config);
    let mut io = Ports {
        sensor: &mut sensor,
        estimator: &mut estimator,
        presenter: &mut presenter,
        clock: &mut clock,
        control: &mut http,
        events: &mut events,
    };
    app.start(&mut io);
    app.run(&mut io)
}
