use std::collections::HashMap;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{Duration as ChronoDuration, Local};
use log::{debug, info, warn};
use serde_json::json;

use crate::{
    address::Address,
    command::{Command, Priority, Qos},
    config::{Config, DeviceList, InstallationSchema, KnownDevice},
    device::{self, Device, DeviceIx},
    error::{Error, Result},
    fault_log::FaultLog,
    log_reader::LogReader,
    log_writer::LogWriter,
    message::Message,
    packet::Packet,
    packet_stream::PacketStream,
    parsers::Temp,
    read_with_timeout::ReadWithTimeout,
    router,
    schedule::{self, Schedule},
    system::{System, SystemIx},
    zone::ZoneKind,
};

/// How long one service pass of the event loop waits for a packet.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How long a graceful shutdown keeps servicing the outbound queue.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

/// A schedule fetched this recently is served from the cache.
const SCHEDULE_MAX_AGE_SECS: i64 = 300;

/// The gateway: owns the reconstructed entity graph and the event loop.
///
/// Packets flow in from a serial [`PacketStream`] (or a [`LogReader`]
/// replay), are parsed into [`Message`]s, and are routed into the graph; the
/// router is the only place the graph is mutated. Entities are created on
/// first observation (or from the installation schema at startup) and live
/// for the process lifetime.
pub struct Gateway {
    /// The configuration block.
    pub config: Config,

    pub(crate) devices: Vec<Device>,
    pub(crate) device_ix: HashMap<Address, DeviceIx>,
    pub(crate) systems: Vec<System>,
    pub(crate) system_ix: HashMap<Address, SystemIx>,

    known_devices: DeviceList,
    allowlist: DeviceList,
    blocklist: DeviceList,

    pub(crate) prev_msg: Option<Message>,
    handlers: Vec<Box<dyn FnMut(&Message)>>,
    shutdown: Arc<AtomicBool>,
}

impl Gateway {
    /// Constructs a `Gateway` with the given configuration.
    pub fn new(config: Config) -> Gateway {
        Gateway {
            config,
            devices: Vec::new(),
            device_ix: HashMap::new(),
            systems: Vec::new(),
            system_ix: HashMap::new(),
            known_devices: DeviceList::new(),
            allowlist: DeviceList::new(),
            blocklist: DeviceList::new(),
            prev_msg: None,
            handlers: Vec::new(),
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Installs the allowlist: only these devices are processed.
    ///
    /// At most one of the allowlist/blocklist is honoured; installing one
    /// clears the other.
    pub fn set_allowlist(&mut self, list: DeviceList) {
        self.allowlist = list;
        self.blocklist = DeviceList::new();
        self.config.enforce_allowlist = true;
        self.config.enforce_blocklist = false;
    }

    /// Installs the blocklist: these devices are dropped.
    pub fn set_blocklist(&mut self, list: DeviceList) {
        self.blocklist = list;
        self.allowlist = DeviceList::new();
        self.config.enforce_allowlist = false;
        self.config.enforce_blocklist = true;
    }

    /// Loads the known-devices map (friendly names and ignore flags).
    pub fn load_known_devices(&mut self, list: DeviceList) {
        for (device_id, attrs) in &list {
            if let Ok(addr) = device_id.parse::<Address>() {
                if let Some(&ix) = self.device_ix.get(&addr) {
                    self.devices[ix.0].friendly_name = attrs.friendly_name.clone();
                    self.devices[ix.0].ignored = attrs.ignore;
                }
            }
        }
        self.known_devices = list;
    }

    /// Serializes the known-devices map, merged with the observed devices.
    pub fn save_known_devices(&self) -> Result<String> {
        let mut list = self.known_devices.clone();
        for dev in &self.devices {
            let entry = list.entry(dev.addr.to_string()).or_insert_with(KnownDevice::default);
            if entry.friendly_name.is_none() {
                entry.friendly_name = dev.friendly_name.clone();
            }
            entry.ignore = dev.ignored;
        }
        crate::config::save_device_list(&list)
    }

    /// Subscribes a callback to every routed message.
    pub fn subscribe<F: FnMut(&Message) + 'static>(&mut self, handler: F) {
        self.handlers.push(Box::new(handler));
    }

    /// Returns a handle that cancels [`start`](Gateway::start) when set.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        self.shutdown.clone()
    }

    // arena accessors

    /// Looks up a device by address.
    pub fn device(&self, addr: Address) -> Option<&Device> {
        self.device_ix.get(&addr).map(|ix| &self.devices[ix.0])
    }

    /// Iterates over all known devices.
    pub fn devices(&self) -> impl Iterator<Item = &Device> {
        self.devices.iter()
    }

    /// Looks up a system by its controller address.
    pub fn system(&self, ctl: Address) -> Option<&System> {
        self.system_ix.get(&ctl).map(|ix| &self.systems[ix.0])
    }

    /// The first (usually only) system.
    pub fn evo(&self) -> Option<&System> {
        self.systems.first()
    }

    pub(crate) fn device_mut(&mut self, ix: DeviceIx) -> &mut Device {
        &mut self.devices[ix.0]
    }

    pub(crate) fn system_mut(&mut self, ix: SystemIx) -> &mut System {
        &mut self.systems[ix.0]
    }

    /// Returns a device's arena handle, creating the device on first
    /// observation. Sentinel and gateway addresses yield no device.
    pub(crate) fn get_or_create_device(&mut self, addr: Address) -> Option<DeviceIx> {
        if !addr.is_device() || addr.is_gateway() {
            return None;
        }
        if let Some(&ix) = self.device_ix.get(&addr) {
            return Some(ix);
        }

        let mut dev = Device::new(addr);
        if let Some(attrs) = self.known_devices.get(&addr.to_string()) {
            dev.friendly_name = attrs.friendly_name.clone();
            dev.ignored = attrs.ignore;
        }
        let ix = DeviceIx(self.devices.len());
        self.devices.push(dev);
        self.device_ix.insert(addr, ix);
        Some(ix)
    }

    /// Returns a controller's system handle, creating the system on first
    /// observation. A second controller is a hard error unless a filter
    /// list keeps one of them out.
    pub(crate) fn get_or_create_system(&mut self, ctl_ix: DeviceIx) -> Result<SystemIx> {
        let ctl_addr = self.devices[ctl_ix.0].addr;
        if let Some(&ix) = self.system_ix.get(&ctl_addr) {
            return Ok(ix);
        }
        if let Some(other) = self.systems.first() {
            return Err(Error::MultipleControllers(format!(
                "{} and {}",
                other.ctl_addr, ctl_addr
            )));
        }

        self.devices[ctl_ix.0].set_ctl(ctl_ix)?;
        let ix = SystemIx(self.systems.len());
        self.systems.push(System::new(ctl_ix, ctl_addr));
        self.system_ix.insert(ctl_addr, ix);
        Ok(ix)
    }

    /// Pre-populates the entity graph from an installation schema.
    pub fn load_schema(&mut self, schema: &InstallationSchema) -> Result<()> {
        let ctl: Address = schema
            .controller
            .parse()
            .map_err(|_| Error::Schema(format!("invalid controller: {:?}", schema.controller)))?;
        let ctl_ix = self
            .get_or_create_device(ctl)
            .ok_or_else(|| Error::Schema(format!("not a device: {ctl}")))?;
        let sys_ix = self.get_or_create_system(ctl_ix)?;

        if let Some(htg) = &schema.system.heating_control {
            let addr: Address = htg
                .parse()
                .map_err(|_| Error::Schema(format!("invalid device id: {htg:?}")))?;
            if let Some(ix) = self.get_or_create_device(addr) {
                self.devices[ix.0].set_ctl(ctl_ix)?;
                self.devices[ix.0].domain_id = Some(0xFC);
                self.systems[sys_ix.0].set_htg_control(ix)?;
            }
        }

        if let Some(dhw) = &schema.stored_hotwater {
            for (device_id, role) in [
                (&dhw.hotwater_sensor, 0u8),
                (&dhw.hotwater_valve, 1),
                (&dhw.heating_valve, 2),
            ] {
                let Some(device_id) = device_id else { continue };
                let addr: Address = device_id
                    .parse()
                    .map_err(|_| Error::Schema(format!("invalid device id: {device_id:?}")))?;
                let Some(ix) = self.get_or_create_device(addr) else {
                    continue;
                };
                self.devices[ix.0].set_ctl(ctl_ix)?;
                self.devices[ix.0].domain_id = Some(0xFA);
                let dhw_zone = self.systems[sys_ix.0].get_or_create_dhw();
                match role {
                    0 => dhw_zone.set_sensor(ix)?,
                    1 => dhw_zone.set_hotwater_valve(ix)?,
                    _ => dhw_zone.set_heating_valve(ix)?,
                }
            }
        }

        let max_zones = self.config.max_zones;
        for (zone_idx, zone_schema) in &schema.zones {
            let idx = u8::from_str_radix(zone_idx, 16)
                .map_err(|_| Error::Schema(format!("invalid zone idx: {zone_idx:?}")))?;

            if let Some(heating_type) = &zone_schema.heating_type {
                let kind = ZoneKind::from_slug(heating_type)
                    .ok_or_else(|| Error::Schema(format!("unknown zone type: {heating_type:?}")))?;
                self.systems[sys_ix.0]
                    .get_or_create_zone(idx, max_zones)?
                    .set_kind(kind)?;
            } else {
                self.systems[sys_ix.0].get_or_create_zone(idx, max_zones)?;
            }

            if let Some(sensor) = &zone_schema.sensor {
                let addr: Address = sensor
                    .parse()
                    .map_err(|_| Error::Schema(format!("invalid device id: {sensor:?}")))?;
                if let Some(ix) = self.get_or_create_device(addr) {
                    self.devices[ix.0].set_ctl(ctl_ix)?;
                    self.devices[ix.0].set_zone_idx(idx)?;
                    self.systems[sys_ix.0]
                        .get_or_create_zone(idx, max_zones)?
                        .set_sensor(ix)?;
                }
            }

            for device_id in &zone_schema.devices {
                let addr: Address = device_id
                    .parse()
                    .map_err(|_| Error::Schema(format!("invalid device id: {device_id:?}")))?;
                if let Some(ix) = self.get_or_create_device(addr) {
                    self.devices[ix.0].set_ctl(ctl_ix)?;
                    self.devices[ix.0].set_zone_idx(idx)?;
                    self.systems[sys_ix.0]
                        .get_or_create_zone(idx, max_zones)?
                        .add_device(ix);
                }
            }
        }

        for device_id in &schema.orphans {
            let addr: Address = device_id
                .parse()
                .map_err(|_| Error::Schema(format!("invalid device id: {device_id:?}")))?;
            if let Some(ix) = self.get_or_create_device(addr) {
                self.devices[ix.0].set_ctl(ctl_ix)?;
            }
        }

        Ok(())
    }

    // the pipeline

    /// Returns `true` if the packet passes the filter lists.
    fn is_wanted(&self, pkt: &Packet) -> bool {
        let src = pkt.src.to_string();
        if self.config.enforce_allowlist && !self.allowlist.is_empty() {
            return self.allowlist.contains_key(&src);
        }
        if self.config.enforce_blocklist && self.blocklist.contains_key(&src) {
            return false;
        }
        if let Some(dev) = self.device(pkt.src) {
            if dev.ignored {
                return false;
            }
        }
        true
    }

    /// Parses a packet and routes the message into the entity graph.
    ///
    /// Packet-level failures are logged and dropped (`Ok(None)`); an
    /// entity-level corrupt-state fault propagates to the caller.
    pub fn process_packet(&mut self, pkt: Packet) -> Result<Option<Message>> {
        if !self.is_wanted(&pkt) {
            return Ok(None);
        }

        let src_is_gateway = pkt.src.is_gateway();
        let pkt_line = pkt.to_line();
        let msg = match Message::new(pkt, self.config.max_zones) {
            Ok(msg) => msg,
            Err(err) => {
                // the host gateway may legitimately emit odd packets
                if src_is_gateway {
                    info!("{pkt_line} < validation error (this is OK to ignore): {err}");
                } else {
                    warn!("{pkt_line} < validation error: {err}");
                }
                return Ok(None);
            }
        };

        // 18:/RQs are unreliable; the corresponding RPs are what matter
        if msg.src().is_gateway() {
            return Ok(Some(msg));
        }

        router::route_message(self, &msg)?;

        let mut handlers = std::mem::take(&mut self.handlers);
        for handler in &mut handlers {
            handler(&msg);
        }
        handlers.extend(self.handlers.drain(..));
        self.handlers = handlers;

        self.prev_msg = Some(msg.clone());
        Ok(Some(msg))
    }

    /// Services the stream once: transmit, read, parse, route, callbacks.
    pub fn pump<R: ReadWithTimeout, W: Write>(
        &mut self,
        stream: &mut PacketStream<R, W>,
        timeout: Duration,
    ) -> Result<Option<Message>> {
        let Some(pkt) = stream.poll(timeout)? else {
            return Ok(None);
        };

        let msg = self.process_packet(pkt)?;
        if let Some(msg) = &msg {
            stream.message_received(msg, Instant::now());
        }
        Ok(msg)
    }

    /// Submits a command, honouring `disable_sending`.
    pub fn send_cmd<R: ReadWithTimeout, W: Write>(
        &mut self,
        stream: &mut PacketStream<R, W>,
        cmd: Command,
    ) {
        if self.config.disable_sending {
            debug!("{cmd} < dropped (sending is disabled)");
            return;
        }
        stream.send_command(cmd);
    }

    /// Enqueues a device's routine poll codes at low priority.
    pub fn poll_device<R: ReadWithTimeout, W: Write>(
        &mut self,
        stream: &mut PacketStream<R, W>,
        addr: Address,
    ) {
        let qos = Qos::default().with_priority(Priority::Low).with_retries(0);
        for &code in device::poll_codes(addr.dev_type()) {
            let cmd = match code {
                0x000C => Command::get_zone_devices(addr, 0, 0x00),
                0x10E0 => Command::get_device_info(addr),
                0x1100 => Command::get_tpi_params(addr),
                0x313F => Command::get_system_time(addr),
                0x10A0 => Command::get_dhw_params(addr),
                0x1260 => Command::get_dhw_temp(addr),
                0x3220 => Command::get_opentherm(addr, 0x00),
                0x3EF1 => Command::get_actuator_cycle(addr),
                0x0016 => Command::get_rf_check(addr),
                code => Command::new(crate::packet::Verb::Rq, addr, code, vec![0x00]),
            };
            self.send_cmd(stream, cmd.with_qos(qos));
        }
    }

    /// Runs the event loop over a serial stream until cancelled (or the
    /// transport is lost). A graceful shutdown drains the outbound queue and
    /// flushes the known-devices persistence.
    pub fn start<R: ReadWithTimeout, W: Write>(
        &mut self,
        stream: &mut PacketStream<R, W>,
    ) -> Result<()> {
        if let Some(path) = &self.config.packet_log {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            stream.set_packet_log(LogWriter::new(Box::new(file)));
        }

        while !self.shutdown.load(Ordering::Relaxed) {
            self.pump(stream, POLL_INTERVAL)?;
        }

        let drain_until = Instant::now() + DRAIN_TIMEOUT;
        while !stream.is_idle() && Instant::now() < drain_until {
            self.pump(stream, POLL_INTERVAL)?;
        }

        self.shutdown()
    }

    /// Replays a packet log until EOF.
    pub fn start_replay<R: std::io::Read>(&mut self, reader: &mut LogReader<R>) -> Result<()> {
        while let Some(pkt) = reader.read_packet()? {
            if self.shutdown.load(Ordering::Relaxed) {
                break;
            }
            self.process_packet(pkt)?;
        }
        self.shutdown()
    }

    /// Flushes the known-devices persistence (graceful shutdown only).
    pub fn shutdown(&mut self) -> Result<()> {
        if let Some(path) = self.config.known_devices.clone() {
            debug!("shutdown: updating the known-devices file");
            std::fs::write(path, self.save_known_devices()?)?;
        }
        Ok(())
    }

    // the multi-fragment protocol clients

    /// Fetches a zone's weekly schedule, serialised by the per-system
    /// schedule lock.
    ///
    /// A schedule assembled within the last five minutes is returned from
    /// the cache without re-fetching. The operation fails with a timeout
    /// error once `timeout` lapses, leaving partial state cleared.
    pub fn get_zone_schedule<R: ReadWithTimeout, W: Write>(
        &mut self,
        stream: &mut PacketStream<R, W>,
        ctl: Address,
        zone_idx: u8,
        timeout: Duration,
    ) -> Result<Schedule> {
        let max_zones = self.config.max_zones;
        let ctl_ix = self
            .get_or_create_device(ctl)
            .ok_or_else(|| Error::Schema(format!("not a controller: {ctl}")))?;
        let sys_ix = self.get_or_create_system(ctl_ix)?;

        let started_dtm = Local::now().naive_local();
        {
            let zone = self.systems[sys_ix.0].get_or_create_zone(zone_idx, max_zones)?;
            if let (Some(schedule), Some(dtm)) = (&zone.schedule, zone.schedule_dtm) {
                if started_dtm - dtm < ChronoDuration::seconds(SCHEDULE_MAX_AGE_SECS) {
                    return Ok(schedule.clone());
                }
            }
            zone.schedule_assembly.reset();
        }

        self.systems[sys_ix.0].acquire_schedule_lock(zone_idx)?;

        let qos = Qos::default().with_priority(Priority::High).with_retries(3);
        self.send_cmd(
            stream,
            Command::get_schedule_fragment(ctl, zone_idx, 1, 0).with_qos(qos),
        );
        let mut requested = 1u8;

        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() >= deadline {
                let zone = self.systems[sys_ix.0].get_or_create_zone(zone_idx, max_zones)?;
                zone.schedule_assembly.reset();
                self.systems[sys_ix.0].release_schedule_lock();
                return Err(Error::Timeout(format!(
                    "schedule of zone {zone_idx:02X} not retrieved"
                )));
            }

            self.pump(stream, POLL_INTERVAL)?;

            let (done, next_missing, total) = {
                let zone = self.systems[sys_ix.0].get_or_create_zone(zone_idx, max_zones)?;
                let done = zone.schedule_dtm.map_or(false, |dtm| dtm >= started_dtm);
                (done, zone.schedule_assembly.next_missing(), zone.schedule_assembly.total())
            };

            if done {
                self.systems[sys_ix.0].release_schedule_lock();
                let zone = self.systems[sys_ix.0].get_or_create_zone(zone_idx, max_zones)?;
                return zone
                    .schedule
                    .clone()
                    .ok_or_else(|| Error::CorruptPayload("schedule went missing".to_string()));
            }

            if let Some(next) = next_missing {
                if next != requested || stream.is_idle() {
                    requested = next;
                    self.send_cmd(
                        stream,
                        Command::get_schedule_fragment(ctl, zone_idx, next, total).with_qos(qos),
                    );
                }
            }
        }
    }

    /// Writes a zone's weekly schedule, fragment by fragment.
    pub fn set_zone_schedule<R: ReadWithTimeout, W: Write>(
        &mut self,
        stream: &mut PacketStream<R, W>,
        ctl: Address,
        schedule: &Schedule,
        timeout: Duration,
    ) -> Result<()> {
        let max_zones = self.config.max_zones;
        let zone_idx = schedule.zone_idx;
        let ctl_ix = self
            .get_or_create_device(ctl)
            .ok_or_else(|| Error::Schema(format!("not a controller: {ctl}")))?;
        let sys_ix = self.get_or_create_system(ctl_ix)?;
        self.systems[sys_ix.0].acquire_schedule_lock(zone_idx)?;

        let fragments = schedule::fragments_from_schedule(schedule)?;
        let total = fragments.len() as u8;
        let qos = Qos::default().with_priority(Priority::High).with_retries(3);
        for (at, fragment) in fragments.iter().enumerate() {
            self.send_cmd(
                stream,
                Command::set_schedule_fragment(ctl, zone_idx, at as u8 + 1, total, fragment)
                    .with_qos(qos),
            );
        }

        let deadline = Instant::now() + timeout;
        while !stream.is_idle() {
            if Instant::now() >= deadline {
                self.systems[sys_ix.0].release_schedule_lock();
                return Err(Error::Timeout(format!(
                    "schedule of zone {zone_idx:02X} not written"
                )));
            }
            self.pump(stream, POLL_INTERVAL)?;
        }

        let zone = self.systems[sys_ix.0].get_or_create_zone(zone_idx, max_zones)?;
        zone.schedule = Some(schedule.clone());
        zone.schedule_dtm = Some(Local::now().naive_local());
        self.systems[sys_ix.0].release_schedule_lock();
        Ok(())
    }

    /// Pages through the controller's fault log until the null-record
    /// sentinel, at low priority.
    pub fn get_fault_log<R: ReadWithTimeout, W: Write>(
        &mut self,
        stream: &mut PacketStream<R, W>,
        ctl: Address,
        timeout: Duration,
    ) -> Result<FaultLog> {
        let ctl_ix = self
            .get_or_create_device(ctl)
            .ok_or_else(|| Error::Schema(format!("not a controller: {ctl}")))?;
        let sys_ix = self.get_or_create_system(ctl_ix)?;
        self.systems[sys_ix.0].fault_log.reset();

        let qos = Qos::default().with_priority(Priority::Low).with_retries(2);
        self.send_cmd(stream, Command::get_fault_log_entry(ctl, 0).with_qos(qos));
        let mut requested = 0u8;

        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() >= deadline {
                self.systems[sys_ix.0].fault_log.reset();
                return Err(Error::Timeout("fault log not retrieved".to_string()));
            }

            self.pump(stream, POLL_INTERVAL)?;

            let (complete, last_idx) = {
                let log = &self.systems[sys_ix.0].fault_log;
                (log.is_complete(), log.last_idx())
            };
            if complete {
                return Ok(self.systems[sys_ix.0].fault_log.clone());
            }
            if let Some(last) = last_idx {
                if last >= requested && last < 63 {
                    requested = last + 1;
                    self.send_cmd(
                        stream,
                        Command::get_fault_log_entry(ctl, requested).with_qos(qos),
                    );
                }
            }
        }
    }

    // snapshots

    /// The reconstructed installation schema, as JSON.
    pub fn schema_json(&self) -> serde_json::Value {
        let mut root = json!({
            "main_controller": self.evo().map(|sys| sys.ctl_addr.to_string()),
        });

        for sys in &self.systems {
            let zones: serde_json::Value = sys
                .zones
                .values()
                .map(|zone| {
                    (
                        format!("{:02X}", zone.idx),
                        json!({
                            "heating_type": zone.kind.map(ZoneKind::slug),
                            "sensor": zone.sensor.map(|ix| self.devices[ix.0].addr.to_string()),
                            "devices": zone
                                .devices
                                .iter()
                                .map(|ix| self.devices[ix.0].addr.to_string())
                                .collect::<Vec<_>>(),
                        }),
                    )
                })
                .collect::<serde_json::Map<_, _>>()
                .into();

            let stored_hotwater = sys.dhw.as_ref().map(|dhw| {
                json!({
                    "hotwater_sensor": dhw.sensor.map(|ix| self.devices[ix.0].addr.to_string()),
                    "hotwater_valve": dhw
                        .hotwater_valve
                        .map(|ix| self.devices[ix.0].addr.to_string()),
                    "heating_valve": dhw
                        .heating_valve
                        .map(|ix| self.devices[ix.0].addr.to_string()),
                })
            });

            let mut orphans: Vec<String> = self
                .devices
                .iter()
                .filter(|dev| {
                    dev.ctl == Some(sys.ctl)
                        && dev.zone_idx.is_none()
                        && dev.domain_id.is_none()
                        && !dev.is_controller()
                })
                .map(|dev| dev.addr.to_string())
                .collect();
            orphans.sort();

            root[sys.ctl_addr.to_string()] = json!({
                "system": {
                    "heating_control": sys
                        .htg_control
                        .map(|ix| self.devices[ix.0].addr.to_string()),
                },
                "stored_hotwater": stored_hotwater,
                "zones": zones,
                "orphans": orphans,
            });
        }

        root
    }

    /// The live state of the graph, as JSON.
    pub fn status_json(&self) -> serde_json::Value {
        fn temp_json(temp: Option<Temp>) -> serde_json::Value {
            match temp {
                Some(Temp::Celsius(value)) => json!(value),
                Some(Temp::Off) => json!(false),
                None => serde_json::Value::Null,
            }
        }

        let mut root = json!({});
        for sys in &self.systems {
            let zones: serde_json::Value = sys
                .zones
                .values()
                .map(|zone| {
                    (
                        format!("{:02X}", zone.idx),
                        json!({
                            "name": zone.name,
                            "setpoint": temp_json(zone.setpoint),
                            "temperature": temp_json(zone.temperature),
                            "heat_demand": zone.heat_demand,
                            "window_open": zone.window_open,
                            "mode": zone.mode.as_ref().map(|mode| format!("{:?}", mode.mode)),
                        }),
                    )
                })
                .collect::<serde_json::Map<_, _>>()
                .into();

            root[sys.ctl_addr.to_string()] = json!({
                "system_mode": sys.mode.as_ref().map(|mode| format!("{:?}", mode.mode)),
                "datetime": sys.datetime.map(|dtm| dtm.to_string()),
                "language": sys.language,
                "heat_demand": sys.heat_demand,
                "relay_demands": sys
                    .relay_demands
                    .iter()
                    .map(|(domain, demand)| (format!("{domain:02X}"), json!(demand)))
                    .collect::<serde_json::Map<_, _>>(),
                "stored_hotwater": sys.dhw.as_ref().map(|dhw| {
                    json!({
                        "temperature": temp_json(dhw.temperature),
                        "relay_demand": dhw.relay_demand,
                    })
                }),
                "fault_log": {
                    "complete": sys.fault_log.is_complete(),
                    "entries": sys.fault_log.entries().len(),
                },
                "zones": zones,
            });
        }

        root
    }

    /// The device-level state, as JSON.
    pub fn params_json(&self) -> serde_json::Value {
        let devices: serde_json::Map<String, serde_json::Value> = self
            .devices
            .iter()
            .map(|dev| {
                (
                    dev.addr.to_string(),
                    json!({
                        "description": device::type_description(dev.addr.dev_type()),
                        "friendly_name": dev.friendly_name,
                        "battery_low": dev.battery_low,
                        "hardware_info": dev
                            .hardware_info
                            .as_ref()
                            .map(|info| info.description.clone()),
                    }),
                )
            })
            .collect();

        json!({ "devices": devices })
    }
}

impl std::fmt::Debug for Gateway {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.debug_struct("Gateway")
            .field("devices", &self.devices.len())
            .field("systems", &self.systems.len())
            .finish()
    }
}
