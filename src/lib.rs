//! # OBC Comms Library
//!
//! Communication and data-integrity core for a satellite flight computer.
//!
//! This library provides the UART transport driver, CRC checksums, the PN9
//! radio whitening sequence and an incremental SHAKE hash, plus a host serial
//! bridge backend for running the driver against real devices.

pub mod config;
pub mod crc;
pub mod error;
pub mod pn9;
pub mod serial;
pub mod shake;
pub mod uart;
