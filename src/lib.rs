// This is part of ramses-rf.rs.
// See README.md and LICENSE.txt for details.

//! # ramses-rf.rs
//!
//! A Rust library for processing Honeywell RAMSES-II RF protocol data, as
//! used by evohome and compatible heating controllers.
//!
//!
//! ## Features
//!
//! - Frames and validates the gateway's ASCII line protocol (live or from a
//!   packet log)
//! - Decodes ~50 opcode-specific payload shapes into typed records,
//!   including the OpenTherm sublayer
//! - Reconstructs the installation (systems, zones, DHW, devices) by
//!   eavesdropping the decoded messages
//! - Sends commands with at-least-once delivery under a QoS retry engine
//! - Transfers zone schedules (zlib-compressed fragments) and pages through
//!   the controller's fault log
//!
//!
//! ## Supported Devices
//!
//! * Honeywell evohome (ATC928 colour controller) and its peripherals
//! * HR92/HR80 radiator valves, HCE80 underfloor controllers, BDR91 relays
//! * R8810 OpenTherm bridges, CS92 hot water sensors, the round thermostats
//! * An HGI80 (or evofw3-compatible) serial gateway on the host side
//!
//!
//! ## Examples
//!
//! ### Reconstruct an installation from a packet log.
//!
//! ```rust
//! use ramses_rf::{Config, Gateway, LogReader};
//!
//! let log = "\
//! 2020-11-28T08:02:15.301351 045  I --- 01:145038 --:------ 01:145038 1F09 003 FF073F\n\
//! 2020-11-28T08:02:15.411236 045  I --- 01:145038 --:------ 01:145038 0005 004 00080300\n\
//! 2020-11-28T08:02:16.326712 045  I --- 01:145038 --:------ 01:145038 2309 006 0007D0010834\n";
//!
//! let mut gwy = Gateway::new(Config::default());
//! let mut reader = LogReader::new(log.as_bytes());
//!
//! gwy.start_replay(&mut reader).unwrap();
//!
//! let system = gwy.evo().expect("a controller was seen");
//! assert_eq!(2, system.zones.len());
//! println!("{}", gwy.schema_json());
//! ```
//!
//! ### Drive a serial gateway over TCP (e.g. ser2net).
//!
//! ```rust,no_run
//! use std::net::TcpStream;
//! use std::time::Duration;
//!
//! use ramses_rf::{Command, Config, Gateway, PacketStream};
//!
//! let port = TcpStream::connect("192.168.1.100:5000").expect("Unable to connect");
//! let mut stream = PacketStream::new(port.try_clone().unwrap(), port);
//!
//! let mut gwy = Gateway::new(Config::default());
//! let ctl = "01:145038".parse().unwrap();
//! gwy.send_cmd(&mut stream, Command::get_system_mode(ctl));
//!
//! let schedule = gwy
//!     .get_zone_schedule(&mut stream, ctl, 0x01, Duration::from_secs(30))
//!     .expect("schedule retrieved");
//! println!("{:?}", schedule);
//! ```

#![warn(missing_docs)]
#![deny(missing_debug_implementations)]

#[cfg(test)]
mod test_utils;

mod error;
pub use error::{Error, Result};

mod address;
pub use address::Address;

mod packet;
pub use packet::{Packet, Verb, MAX_PAYLOAD_LEN};

mod header;
pub use header::Header;

mod command;
pub use command::{Callback, Command, Priority, Qos};

mod line_buffer;
pub use line_buffer::LineBuffer;

mod read_with_timeout;
pub use read_with_timeout::ReadWithTimeout;

mod packet_reader;
pub use packet_reader::PacketReader;

mod packet_writer;
pub use packet_writer::PacketWriter;

mod transmit_queue;
pub use transmit_queue::{QosState, TransmitQueue};

mod packet_stream;
pub use packet_stream::PacketStream;

mod log_reader;
pub use log_reader::LogReader;

mod log_writer;
pub use log_writer::LogWriter;

mod file_list_reader;
pub use file_list_reader::FileListReader;

pub mod parsers;
pub use parsers::{MsgIndex, Payload, Temp};

pub mod opentherm;

mod message;
pub use message::Message;

mod device;
pub use device::{Device, DeviceIx, DeviceKind};

mod zone;
pub use zone::{DhwZone, Zone, ZoneKind};

pub mod schedule;
pub use schedule::{DaySchedule, FragmentAssembly, Schedule, Switchpoint};

mod fault_log;
pub use fault_log::FaultLog;

mod system;
pub use system::{System, SystemIx};

mod config;
pub use config::{Config, DeviceList, InstallationSchema, KnownDevice};

mod router;

mod gateway;
pub use gateway::Gateway;
