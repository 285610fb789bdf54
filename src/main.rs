//! # OBC Comms
//!
//! Host runner for the flight-computer communication core.
//!
//! Loads the configuration, brings up every configured UART port and sends a
//! CRC-tagged, optionally PN9-whitened beacon on the beacon port at a fixed
//! interval while draining whatever the ports receive.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use bytes::{BufMut, Bytes, BytesMut};
use tracing::{debug, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use obc_comms::config::{Backend, Config, LoggingConfig, RadioConfig};
use obc_comms::crc::crc16;
use obc_comms::pn9::pn9;
use obc_comms::serial::SerialBackend;
use obc_comms::shake::ShakeContext;
use obc_comms::uart::{PortId, SimulatedUart, UartDriver, UartHardware};

/// Configuration file used when none is given on the command line
const DEFAULT_CONFIG_PATH: &str = "config/default.toml";

/// Beacon frame marker
const BEACON_MAGIC: &[u8; 3] = b"BCN";

/// Marker + sequence number + timestamp + CRC-16
const BEACON_LEN: usize = 3 + 4 + 8 + 2;

/// Main loop poll period
const POLL_PERIOD: Duration = Duration::from_millis(10);

/// Build a beacon frame: `BCN | seq (u32 BE) | unix time (i64 BE) | CRC-16`
///
/// When whitening is enabled the whole frame, CRC included, is XORed with the
/// PN9 sequence starting at the configured preroll.
fn build_beacon(seq: u32, timestamp: i64, radio: &RadioConfig) -> Bytes {
    let mut frame = BytesMut::with_capacity(BEACON_LEN);
    frame.put_slice(BEACON_MAGIC);
    frame.put_u32(seq);
    frame.put_i64(timestamp);
    let crc = crc16(&frame);
    frame.put_u16(crc);

    if radio.whitening {
        whiten(&mut frame, radio.pn9_preroll);
    }

    frame.freeze()
}

fn whiten(data: &mut [u8], preroll: u32) {
    let mut keystream = vec![0u8; data.len()];
    pn9(&mut keystream, preroll);
    for (byte, key) in data.iter_mut().zip(keystream) {
        *byte ^= key;
    }
}

/// Node identifier derived from the configuration text
fn node_id(config: &Config, config_text: &str) -> Result<String> {
    let mut ctx = ShakeContext::new(config.shake.variant, config.shake.output_length)?;
    ctx.update(b"obc-comms node id\0")?;
    ctx.update(config_text.as_bytes())?;

    let mut id = vec![0u8; config.shake.output_length];
    ctx.out(&mut id)?;
    Ok(hex::encode(id))
}

fn init_logging(logging: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .context("invalid log filter")?;

    if logging.directory.is_empty() {
        tracing_subscriber::fmt().with_env_filter(filter).init();
        return Ok(None);
    }

    let appender = tracing_appender::rolling::daily(&logging.directory, "obc-comms.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .init();
    Ok(Some(guard))
}

fn build_hardware(config: &Config, runtime: &tokio::runtime::Runtime) -> Result<Box<dyn UartHardware>> {
    match config.uart.backend {
        Backend::Loopback => Ok(Box::new(SimulatedUart::loopback())),
        Backend::Serial => {
            let mut backend = SerialBackend::new(runtime.handle().clone());
            for port in &config.uart.ports {
                backend = backend.with_device(PortId::new(port.index)?, port.device.clone());
            }
            Ok(Box::new(backend))
        }
    }
}

fn main() -> Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string());

    let (config, config_text) = if Path::new(&config_path).exists() {
        let text = std::fs::read_to_string(&config_path)
            .with_context(|| format!("failed to read {}", config_path))?;
        let config = Config::parse(&text).with_context(|| format!("invalid config {}", config_path))?;
        (config, text)
    } else {
        (Config::default(), String::new())
    };

    let _log_guard = init_logging(&config.logging)?;
    info!("OBC Comms v{} starting...", env!("CARGO_PKG_VERSION"));
    if config_text.is_empty() {
        warn!("{} not found, using built-in defaults", config_path);
    }
    info!("Node ID: {}", node_id(&config, &config_text)?);

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()?;

    let hardware = build_hardware(&config, &runtime)?;
    let mut driver = UartDriver::new(hardware, config.uart.driver_settings())?;
    for port in &config.uart.ports {
        driver
            .init(port.index, port.baud_rate)
            .with_context(|| format!("failed to initialise UART {}", port.index))?;
    }

    let running = Arc::new(AtomicBool::new(true));
    {
        let running = running.clone();
        runtime.spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                running.store(false, Ordering::SeqCst);
            }
        });
    }

    let beacon_port = config.radio.beacon_port;
    let beacon_interval = Duration::from_millis(config.radio.beacon_interval_ms);
    let mut last_beacon: Option<Instant> = None;
    let mut seq: u32 = 0;
    let mut received_total: u64 = 0;

    info!(
        "Sending beacons on UART {} every {}ms (whitening {})",
        beacon_port,
        config.radio.beacon_interval_ms,
        if config.radio.whitening { "on" } else { "off" }
    );
    info!("Press Ctrl+C to exit");

    while running.load(Ordering::SeqCst) {
        if last_beacon.map_or(true, |t| t.elapsed() >= beacon_interval) {
            let beacon = build_beacon(seq, chrono::Utc::now().timestamp(), &config.radio);
            driver.putb(beacon_port, &beacon)?;
            debug!("Beacon {} sent ({} bytes)", seq, beacon.len());
            seq = seq.wrapping_add(1);
            last_beacon = Some(Instant::now());
        }

        for port in &config.uart.ports {
            let mut received = Vec::new();
            while let Some(byte) = driver.getc_nonblocking(port.index)? {
                received.push(byte);
            }
            if !received.is_empty() {
                received_total += received.len() as u64;
                debug!("UART {} received {} bytes: {:02X?}", port.index, received.len(), received);
            }
        }

        std::thread::sleep(POLL_PERIOD);
    }

    info!("Received Ctrl+C, shutting down...");
    info!("Total beacons sent: {}, bytes received: {}", seq, received_total);
    Ok(())
}
