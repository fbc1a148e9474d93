//! Pulse-oximetry firmware: device entry point.
//!
//! Hexagonal architecture driven by a single cooperative control loop.
//!
//! ```text
//! ┌────────────────────────────────────────────────────────────────┐
//! │                      Adapters (outer ring)                     │
//! │                                                                │
//! │  Max30102 (I2C)    RatioOfRatios   LogPresenter  SystemClock   │
//! │  (SensorPort)      (Estimator)     (Presenter)   (ClockPort)   │
//! │  HttpServer        LogEventSink                                │
//! │  (ControlPort)     (EventSink)                                 │
//! │                                                                │
//! │  ──────────────── Port Trait Boundary ───────────────────      │
//! │                                                                │
//! │  ┌────────────────────────────────────────────────────────┐    │
//! │  │              AppService (pure logic)                   │    │
//! │  │  FSM · MeasurementSession · CooperativeScheduler       │    │
//! │  └────────────────────────────────────────────────────────┘    │
//! └────────────────────────────────────────────────────────────────┘
//! ```
#![deny(unused_must_use)]

use anyhow::{Result, anyhow};
use esp_idf_hal::i2c::{I2cConfig, I2cDriver};
use esp_idf_hal::modem::Modem;
use esp_idf_hal::peripherals::Peripherals;
use esp_idf_hal::units::FromValueType;
use esp_idf_svc::eventloop::EspSystemEventLoop;
use esp_idf_svc::nvs::EspDefaultNvsPartition;
use esp_idf_svc::wifi::{AuthMethod, BlockingWifi, ClientConfiguration, Configuration, EspWifi};
use log::{info, warn};

use pulseox::adapters::http_server::HttpServer;
use pulseox::adapters::log_presenter::LogPresenter;
use pulseox::adapters::log_sink::LogEventSink;
use pulseox::adapters::time::SystemClock;
use pulseox::app::ports::Ports;
use pulseox::app::service::AppService;
use pulseox::config::SystemConfig;
use pulseox::drivers::max30102::Max30102;
use pulseox::drivers::watchdog::Watchdog;
use pulseox::sensors::estimator::RatioOfRatiosEstimator;

/// Station credentials, baked in at build time.
const WIFI_SSID: Option<&str> = option_env!("PULSEOX_WIFI_SSID");
const WIFI_PASS: &str = match option_env!("PULSEOX_WIFI_PASS") {
    Some(p) => p,
    None => "",
};

/// Join the configured access point.  Association policy is out of scope;
/// a failed join leaves the loop running with the display only.
fn join_wifi(modem: Modem) -> Result<Option<BlockingWifi<EspWifi<'static>>>> {
    let Some(ssid) = WIFI_SSID else {
        warn!("WiFi: no PULSEOX_WIFI_SSID at build time, control surface unreachable");
        return Ok(None);
    };

    let sysloop = EspSystemEventLoop::take()?;
    let nvs = EspDefaultNvsPartition::take()?;
    let mut wifi = BlockingWifi::wrap(EspWifi::new(modem, sysloop.clone(), Some(nvs))?, sysloop)?;

    wifi.set_configuration(&Configuration::Client(ClientConfiguration {
        ssid: ssid.try_into().map_err(|_| anyhow!("SSID too long"))?,
        password: WIFI_PASS
            .try_into()
            .map_err(|_| anyhow!("WiFi password too long"))?,
        auth_method: if WIFI_PASS.is_empty() {
            AuthMethod::None
        } else {
            AuthMethod::WPA2Personal
        },
        ..Default::default()
    }))?;

    wifi.start()?;
    let joined = wifi.connect().and_then(|()| wifi.wait_netif_up());
    if let Err(e) = joined {
        warn!("WiFi: join '{}' failed ({}), continuing offline", ssid, e);
        return Ok(Some(wifi));
    }
    let ip = wifi.wifi().sta_netif().get_ip_info()?;
    info!("WiFi: joined '{}' as {}", ssid, ip.ip);
    Ok(Some(wifi))
}

fn main() -> Result<()> {
    // ── 1. ESP-IDF bootstrap ──────────────────────────────────
    esp_idf_svc::sys::link_patches();
    esp_idf_logger::init()?;

    info!("╔══════════════════════════════════════╗");
    info!("║  PulseOx v{}                      ║", env!("CARGO_PKG_VERSION"));
    info!("╚══════════════════════════════════════╝");

    let config = SystemConfig::default();
    config.validate()?;

    // ── 2. Peripherals ────────────────────────────────────────
    let peripherals = Peripherals::take()?;
    let _wifi = join_wifi(peripherals.modem)?;

    let i2c = I2cDriver::new(
        peripherals.i2c0,
        peripherals.pins.gpio21, // SDA
        peripherals.pins.gpio22, // SCL
        &I2cConfig::new().baudrate(400.kHz().into()),
    )?;

    // ── 3. Adapters ───────────────────────────────────────────
    let mut sensor = Max30102::new(i2c, config.sensor_i2c_address);
    let mut estimator = RatioOfRatiosEstimator::new(config.sample_rate_hz);
    let mut presenter = LogPresenter::new();
    let mut clock = SystemClock::new().with_watchdog(Watchdog::default());
    let mut http = HttpServer::bind(config.http_port)?;
    let mut events = LogEventSink::new();

    // ── 4. App service ────────────────────────────────────────
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

    info!("System ready. Entering control loop.");
    app.run(&mut io)
}
