//! The message router: the only place the entity graph is mutated.
//!
//! For every valid message the router creates any missing entities, applies
//! the payload to the source/destination device, the owning system and any
//! affected zone, and runs the eavesdropping discovery passes (zone sensors,
//! the heating relay, the DHW sensor).

use log::{debug, warn};

use crate::{
    address::Address,
    device::{self, DeviceIx},
    error::Result,
    gateway::Gateway,
    message::Message,
    packet::Verb,
    parsers::{DeviceClass, MsgIndex, Payload, Temp},
    schedule,
    system::{SystemIx, TempCycle},
    zone::{DhwModeInfo, DhwParamsInfo, ZoneKind, ZoneModeInfo},
};

/// Routes one parsed message into the entity graph.
pub(crate) fn route_message(gwy: &mut Gateway, msg: &Message) -> Result<()> {
    create_devices(gwy, msg)?;
    create_zones(gwy, msg)?;
    update_device_state(gwy, msg)?;
    update_system_state(gwy, msg)?;
    discover_heat_relay(gwy, msg)?;
    discover_dhw_sensor(gwy, msg)?;
    match_zone_sensors(gwy, msg)?;
    Ok(())
}

/// Resolves a controller address to its system, if the device is a known
/// controller.
fn system_of(gwy: &mut Gateway, ctl: Address) -> Option<(DeviceIx, SystemIx)> {
    let &ctl_ix = gwy.device_ix.get(&ctl)?;
    if !gwy.devices[ctl_ix.0].is_controller() {
        return None;
    }
    let &sys_ix = gwy.system_ix.get(&ctl)?;
    Some((ctl_ix, sys_ix))
}

/// Creates any missing source or destination devices (and their systems).
fn create_devices(gwy: &mut Gateway, msg: &Message) -> Result<()> {
    let (src, dst) = (msg.src(), msg.dst());

    // a 000C reply also names the zone's member devices
    if msg.code() == 0x000C && msg.verb() == Verb::Rp && src.dev_type() == 1 {
        if let Some(ctl_ix) = gwy.get_or_create_device(src) {
            gwy.get_or_create_system(ctl_ix)?;
            if let Some(dst_ix) = gwy.get_or_create_device(dst) {
                gwy.device_mut(dst_ix).set_ctl(ctl_ix)?;
            }
            if let Payload::ZoneDevices { devices, .. } = &msg.payload {
                for &addr in devices {
                    if let Some(ix) = gwy.get_or_create_device(addr) {
                        gwy.device_mut(ix).set_ctl(ctl_ix)?;
                    }
                }
            }
        }
        return Ok(());
    }

    // a UFH controller's 000C names its own controller
    if msg.code() == 0x000C && msg.verb() == Verb::Rp && src.dev_type() == 2 {
        if let Payload::ZoneDevices { devices, .. } = &msg.payload {
            if let Some(&first) = devices.first() {
                if first.is_controller() {
                    if let (Some(ctl_ix), Some(src_ix)) =
                        (gwy.get_or_create_device(first), gwy.get_or_create_device(src))
                    {
                        gwy.get_or_create_system(ctl_ix)?;
                        gwy.device_mut(src_ix).set_ctl(ctl_ix)?;
                    }
                }
            }
        }
        return Ok(());
    }

    if src.is_controller() {
        if let Some(ctl_ix) = gwy.get_or_create_device(src) {
            gwy.get_or_create_system(ctl_ix)?;
            if let Some(dst_ix) = gwy.get_or_create_device(dst) {
                gwy.device_mut(dst_ix).set_ctl(ctl_ix)?;
            }
        }
        return Ok(());
    }

    if dst.is_controller() {
        if let Some(ctl_ix) = gwy.get_or_create_device(dst) {
            gwy.get_or_create_system(ctl_ix)?;
            if let Some(src_ix) = gwy.get_or_create_device(src) {
                gwy.device_mut(src_ix).set_ctl(ctl_ix)?;
            }
        }
        return Ok(());
    }

    gwy.get_or_create_device(src);
    gwy.get_or_create_device(dst);
    Ok(())
}

/// Creates and binds zones from `0005` masks and `000C` device lists, and
/// from the controller's self-broadcast arrays.
fn create_zones(gwy: &mut Gateway, msg: &Message) -> Result<()> {
    if !matches!(msg.src().dev_type(), 1 | 23) {
        return Ok(());
    }
    let Some((ctl_ix, sys_ix)) = system_of(gwy, msg.src()) else {
        return Ok(());
    };
    let max_zones = gwy.config.max_zones;

    match &msg.payload {
        // one bit per possible zone idx
        Payload::SystemZones(recs) => {
            for rec in recs {
                let kind = ZoneKind::from_type_byte(rec.zone_type);
                if kind.is_none() && !matches!(rec.zone_type, 0x00 | 0x04) {
                    continue;
                }
                for (idx, flag) in rec.zone_mask.iter().enumerate() {
                    if !flag {
                        continue;
                    }
                    let zone = gwy
                        .system_mut(sys_ix)
                        .get_or_create_zone(idx as u8, max_zones)?;
                    if let Some(kind) = kind {
                        zone.set_kind(kind)?;
                    }
                }
            }
        }

        Payload::ZoneDevices {
            device_class,
            devices,
        } if msg.verb() == Verb::Rp && !devices.is_empty() => {
            let device_ixs: Vec<DeviceIx> = devices
                .iter()
                .filter_map(|&addr| gwy.get_or_create_device(addr))
                .collect();
            let Some(&first) = device_ixs.first() else {
                return Ok(());
            };

            match device_class {
                DeviceClass::ZoneSensor => {
                    if let MsgIndex::Zone(zone_idx) = msg.index {
                        gwy.device_mut(first).set_zone_idx(zone_idx)?;
                        gwy.system_mut(sys_ix)
                            .get_or_create_zone(zone_idx, max_zones)?
                            .set_sensor(first)?;
                    }
                }
                DeviceClass::ZoneActuators => {
                    if let MsgIndex::Zone(zone_idx) = msg.index {
                        for &ix in &device_ixs {
                            gwy.device_mut(ix).set_zone_idx(zone_idx)?;
                            gwy.system_mut(sys_ix)
                                .get_or_create_zone(zone_idx, max_zones)?
                                .add_device(ix);
                        }
                    }
                }
                DeviceClass::HtgControl => {
                    gwy.device_mut(first).set_ctl(ctl_ix)?;
                    gwy.device_mut(first).domain_id = Some(0xFC);
                    gwy.system_mut(sys_ix).set_htg_control(first)?;
                }
                DeviceClass::DhwSensor => {
                    gwy.device_mut(first).domain_id = Some(0xFA);
                    gwy.system_mut(sys_ix).get_or_create_dhw().set_sensor(first)?;
                }
                DeviceClass::DhwValve => {
                    gwy.device_mut(first).domain_id = Some(0xFA);
                    gwy.system_mut(sys_ix)
                        .get_or_create_dhw()
                        .set_hotwater_valve(first)?;
                }
                DeviceClass::HeatingValve => {
                    gwy.device_mut(first).domain_id = Some(0xF9);
                    gwy.system_mut(sys_ix)
                        .get_or_create_dhw()
                        .set_heating_valve(first)?;
                }
                _ => {}
            }
        }

        // the sync-cycle arrays reveal which zones exist
        Payload::ZoneConfigArray(recs) => {
            for rec in recs {
                gwy.system_mut(sys_ix)
                    .get_or_create_zone(rec.zone_idx, max_zones)?;
            }
        }
        Payload::SetpointArray(recs) => {
            for rec in recs {
                gwy.system_mut(sys_ix)
                    .get_or_create_zone(rec.zone_idx, max_zones)?;
            }
        }
        Payload::TemperatureArray(recs) => {
            for rec in recs {
                gwy.system_mut(sys_ix)
                    .get_or_create_zone(rec.zone_idx, max_zones)?;
            }
        }

        _ => {}
    }
    Ok(())
}

/// Applies the payload to the source device's role-specific state.
fn update_device_state(gwy: &mut Gateway, msg: &Message) -> Result<()> {
    let Some(&src_ix) = gwy.device_ix.get(&msg.src()) else {
        return Ok(());
    };

    // the UFH circuit map comes from the controller's own 000C replies
    if let (MsgIndex::UfhCircuit { idx, zone_idx: Some(zone_idx) }, 2) =
        (msg.index, msg.src().dev_type())
    {
        gwy.device_mut(src_ix).ufh_circuits.insert(idx, zone_idx);
    }

    let dev = gwy.device_mut(src_ix);
    match &msg.payload {
        Payload::Temperature(rec) if matches!(msg.verb(), Verb::I | Verb::Rp) => {
            dev.temperature = rec.temperature;
            dev.temperature_dtm = Some(msg.dtm());
        }
        Payload::Setpoint(rec) if matches!(msg.verb(), Verb::I | Verb::W) => {
            dev.setpoint = rec.setpoint;
        }
        Payload::BatteryState {
            low_battery,
            battery_level,
        } => {
            dev.battery_low = Some(*low_battery);
            dev.battery_level = *battery_level;
        }
        Payload::WindowState { window_open } => {
            dev.window_open = *window_open;
        }
        Payload::HeatDemand(rec) => {
            dev.heat_demand = rec.heat_demand;
        }
        Payload::RelayDemand { relay_demand } => {
            dev.relay_demand = *relay_demand;
        }
        Payload::ActuatorState {
            actuator_enabled,
            modulation_level,
            ..
        } => {
            dev.actuator_enabled = Some(*actuator_enabled);
            dev.modulation_level = *modulation_level;
        }
        Payload::ActuatorCycle {
            actuator_enabled,
            modulation_level,
            ..
        } => {
            dev.actuator_enabled = Some(*actuator_enabled);
            dev.modulation_level = *modulation_level;
        }
        Payload::BoilerSetpoint { setpoint } if msg.verb() == Verb::Rp => {
            dev.boiler_setpoint = *setpoint;
        }
        Payload::OpenTherm { id, .. } if msg.verb() == Verb::Rp => {
            dev.opentherm.insert(*id, msg.payload.clone());
        }
        Payload::DeviceInfo {
            description,
            firmware,
            manufactured,
            ..
        } => {
            dev.hardware_info = Some(device::HardwareInfo {
                description: description.clone(),
                firmware: *firmware,
                manufactured: *manufactured,
            });
        }
        _ => {}
    }
    Ok(())
}

/// Applies the payload to the owning system, its zones and its DHW.
fn update_system_state(gwy: &mut Gateway, msg: &Message) -> Result<()> {
    // resolve the system: the source itself, or the source's controller
    let sys_ix = match system_of(gwy, msg.src()) {
        Some((_, sys_ix)) => Some(sys_ix),
        None => gwy
            .device_ix
            .get(&msg.src())
            .and_then(|&ix| gwy.devices[ix.0].ctl)
            .map(|ctl_ix| gwy.devices[ctl_ix.0].addr)
            .and_then(|ctl| gwy.system_ix.get(&ctl).copied()),
    };
    let Some(sys_ix) = sys_ix else {
        return Ok(());
    };
    let max_zones = gwy.config.max_zones;
    let src_is_ctl = gwy.systems[sys_ix.0].ctl_addr == msg.src();

    match &msg.payload {
        Payload::SystemSync { remaining_seconds } => {
            gwy.system_mut(sys_ix).sync_remaining = Some(*remaining_seconds);
        }
        Payload::SystemMode { system_mode, until } if matches!(msg.verb(), Verb::I | Verb::Rp) => {
            gwy.system_mut(sys_ix).mode = Some(crate::system::SystemModeInfo {
                mode: *system_mode,
                until: *until,
            });
        }
        Payload::Datetime { datetime, .. } if matches!(msg.verb(), Verb::I | Verb::Rp) => {
            gwy.system_mut(sys_ix).datetime = Some(*datetime);
        }
        Payload::Language { language } if matches!(msg.verb(), Verb::I | Verb::Rp) => {
            gwy.system_mut(sys_ix).language = language.clone();
        }

        Payload::RelayDemand { relay_demand } => match msg.index {
            MsgIndex::Domain(domain) => {
                if let Some(demand) = relay_demand {
                    gwy.system_mut(sys_ix).relay_demands.insert(domain, *demand);
                    if domain == 0xFA {
                        if let Some(dhw) = &mut gwy.system_mut(sys_ix).dhw {
                            dhw.relay_demand = Some(*demand);
                        }
                    }
                }
            }
            MsgIndex::Zone(zone_idx) if src_is_ctl => {
                let zone = gwy
                    .system_mut(sys_ix)
                    .get_or_create_zone(zone_idx, max_zones)?;
                if zone.kind.is_none() {
                    // might eventually turn out to be a zone valve
                    zone.set_kind(ZoneKind::Electric)?;
                }
            }
            _ => {}
        },

        Payload::RelayFailsafe(recs) => {
            for rec in recs {
                if let (MsgIndex::Domain(domain), Some(enabled)) =
                    (rec.index, rec.failsafe_enabled)
                {
                    gwy.system_mut(sys_ix).relay_failsafes.insert(domain, enabled);
                }
            }
        }

        Payload::HeatDemand(rec) => match rec.index {
            MsgIndex::Domain(0xFC) => {
                gwy.system_mut(sys_ix).heat_demand = rec.heat_demand;
            }
            MsgIndex::Zone(zone_idx) if src_is_ctl => {
                let zone = gwy
                    .system_mut(sys_ix)
                    .get_or_create_zone(zone_idx, max_zones)?;
                zone.heat_demand = rec.heat_demand;
            }
            _ => {}
        },

        Payload::FaultLogEntry(rec) if src_is_ctl => {
            gwy.system_mut(sys_ix).fault_log.add_entry(*rec);
        }
        Payload::FaultLogNull if src_is_ctl && msg.verb() == Verb::Rp => {
            gwy.system_mut(sys_ix).fault_log.set_complete();
        }

        Payload::ScheduleFragment {
            frag_index,
            frag_total,
            fragment,
            ..
        } if src_is_ctl && msg.verb() == Verb::Rp => {
            if let MsgIndex::Zone(zone_idx) = msg.index {
                let dtm = msg.dtm();
                let zone = gwy
                    .system_mut(sys_ix)
                    .get_or_create_zone(zone_idx, max_zones)?;
                zone.schedule_assembly
                    .add(dtm, *frag_index, *frag_total, fragment.clone());

                if let Some(fragments) = zone.schedule_assembly.fragments() {
                    match schedule::schedule_from_fragments(&fragments) {
                        Ok(sched) => {
                            debug!("zone {zone_idx:02X}: schedule assembled");
                            zone.schedule = Some(sched);
                            zone.schedule_dtm = Some(dtm);
                        }
                        Err(err) => warn!("invalid schedule fragments: {err}"),
                    }
                    zone.schedule_assembly.reset();
                }
            }
        }

        Payload::ZoneName { name } if matches!(msg.verb(), Verb::I | Verb::Rp) => {
            if let MsgIndex::Zone(zone_idx) = msg.index {
                gwy.system_mut(sys_ix)
                    .get_or_create_zone(zone_idx, max_zones)?
                    .name = name.clone();
            }
        }

        Payload::ZoneConfig(rec) => {
            if let MsgIndex::Zone(_) = msg.index {
                gwy.system_mut(sys_ix)
                    .get_or_create_zone(rec.zone_idx, max_zones)?
                    .config = Some(*rec);
            }
        }
        Payload::ZoneConfigArray(recs) => {
            for rec in recs {
                gwy.system_mut(sys_ix)
                    .get_or_create_zone(rec.zone_idx, max_zones)?
                    .config = Some(*rec);
            }
        }

        Payload::Setpoint(rec) if src_is_ctl => {
            if let MsgIndex::Zone(_) = msg.index {
                gwy.system_mut(sys_ix)
                    .get_or_create_zone(rec.zone_idx, max_zones)?
                    .setpoint = rec.setpoint;
            }
        }
        Payload::SetpointArray(recs) => {
            for rec in recs {
                gwy.system_mut(sys_ix)
                    .get_or_create_zone(rec.zone_idx, max_zones)?
                    .setpoint = rec.setpoint;
            }
        }

        Payload::Temperature(rec) if src_is_ctl => {
            if let MsgIndex::Zone(_) = msg.index {
                gwy.system_mut(sys_ix)
                    .get_or_create_zone(rec.zone_idx, max_zones)?
                    .temperature = rec.temperature;
            }
        }
        Payload::TemperatureArray(recs) => {
            for rec in recs {
                gwy.system_mut(sys_ix)
                    .get_or_create_zone(rec.zone_idx, max_zones)?
                    .temperature = rec.temperature;
            }
        }

        Payload::ZoneMode {
            mode,
            setpoint,
            until,
        } if matches!(msg.verb(), Verb::I | Verb::Rp) => {
            if let MsgIndex::Zone(zone_idx) = msg.index {
                let zone = gwy
                    .system_mut(sys_ix)
                    .get_or_create_zone(zone_idx, max_zones)?;
                zone.mode = Some(ZoneModeInfo {
                    mode: *mode,
                    setpoint: *setpoint,
                    until: *until,
                });
                zone.setpoint = *setpoint;
            }
        }

        Payload::WindowState { window_open } if src_is_ctl => {
            if let MsgIndex::Zone(zone_idx) = msg.index {
                gwy.system_mut(sys_ix)
                    .get_or_create_zone(zone_idx, max_zones)?
                    .window_open = *window_open;
            }
        }

        Payload::DhwParams {
            setpoint,
            overrun,
            differential,
        } => {
            gwy.system_mut(sys_ix).get_or_create_dhw().params = Some(DhwParamsInfo {
                setpoint: *setpoint,
                overrun: *overrun,
                differential: *differential,
            });
        }
        Payload::DhwTemp { temperature } if matches!(msg.verb(), Verb::I | Verb::Rp) => {
            gwy.system_mut(sys_ix).get_or_create_dhw().temperature = *temperature;
        }
        Payload::DhwMode {
            active,
            mode,
            until,
        } if matches!(msg.verb(), Verb::I | Verb::Rp) => {
            gwy.system_mut(sys_ix).get_or_create_dhw().mode = Some(DhwModeInfo {
                active: *active,
                mode: *mode,
                until: *until,
            });
        }

        _ => {}
    }
    Ok(())
}

/// Promotes a `10:`/`13:` device to the system's heating control.
///
/// There are three ways to find the relay, most to least reliable: the
/// `3220` RQ to a `10:`, the `3EF0` RQ to a `10:`/`13:`, and the `3B00` I/I
/// exchange between a `13:` and the controller.
fn discover_heat_relay(gwy: &mut Gateway, msg: &Message) -> Result<()> {
    let heater: Option<(Address, Address)> = match (msg.verb(), msg.code()) {
        (Verb::Rq, 0x3220) if msg.src().is_controller() && msg.dst().dev_type() == 10 => {
            Some((msg.src(), msg.dst()))
        }
        (Verb::Rq, 0x3EF0)
            if msg.src().is_controller() && matches!(msg.dst().dev_type(), 10 | 13) =>
        {
            Some((msg.src(), msg.dst()))
        }
        (Verb::I, 0x3B00) if msg.src().dev_type() == 1 => match &gwy.prev_msg {
            Some(prev)
                if prev.code() == 0x3B00
                    && prev.verb() == Verb::I
                    && prev.src().dev_type() == 13 =>
            {
                Some((msg.src(), prev.src()))
            }
            _ => None,
        },
        _ => None,
    };

    let Some((ctl, heater)) = heater else {
        return Ok(());
    };
    let Some((ctl_ix, sys_ix)) = system_of(gwy, ctl) else {
        return Ok(());
    };
    let Some(heater_ix) = gwy.get_or_create_device(heater) else {
        return Ok(());
    };

    gwy.device_mut(heater_ix).set_ctl(ctl_ix)?;
    gwy.device_mut(heater_ix).domain_id = Some(0xFC);
    gwy.system_mut(sys_ix).set_htg_control(heater_ix)
}

/// Binds a `07:` device as the DHW sensor on a `10A0` reply from the
/// controller.
fn discover_dhw_sensor(gwy: &mut Gateway, msg: &Message) -> Result<()> {
    if msg.verb() != Verb::Rp || msg.code() != 0x10A0 || msg.dst().dev_type() != 7 {
        return Ok(());
    }
    let Some((ctl_ix, sys_ix)) = system_of(gwy, msg.src()) else {
        return Ok(());
    };
    let Some(sensor_ix) = gwy.get_or_create_device(msg.dst()) else {
        return Ok(());
    };

    gwy.device_mut(sensor_ix).set_ctl(ctl_ix)?;
    gwy.device_mut(sensor_ix).domain_id = Some(0xFA);
    gwy.system_mut(sys_ix).get_or_create_dhw().set_sensor(sensor_ix)
}

/// Matches sensorless zones to sensors by eavesdropping temperatures.
///
/// When two consecutive controller `30C9` arrays fall within the current
/// `1F09` sync window, each zone whose temperature changed *uniquely* is
/// matched to the single external sensor reporting the same temperature in
/// the same window. If exactly one zone remains sensorless afterwards, the
/// controller itself is assigned by exclusion.
fn match_zone_sensors(gwy: &mut Gateway, msg: &Message) -> Result<()> {
    let Payload::TemperatureArray(temps) = &msg.payload else {
        return Ok(());
    };
    if msg.verb() != Verb::I {
        return Ok(());
    }
    let Some((ctl_ix, sys_ix)) = system_of(gwy, msg.src()) else {
        return Ok(());
    };

    let prev = gwy.system_mut(sys_ix).prev_temp_cycle.replace(TempCycle {
        dtm: msg.dtm(),
        temps: temps.clone(),
    });
    let Some(prev) = prev else {
        return Ok(());
    };

    let sensorless = gwy.systems[sys_ix.0].sensorless_zones();
    if sensorless.is_empty() {
        return Ok(());
    }

    // only compare against the array from the last sync cycle
    let Some(window_secs) = gwy.systems[sys_ix.0].sync_remaining else {
        return Ok(());
    };
    if msg.dtm() > prev.dtm + chrono::Duration::milliseconds((window_secs * 1000.0) as i64) {
        return Ok(());
    }

    // zones with changed temps this cycle
    let changed: Vec<(u8, Option<Temp>)> = temps
        .iter()
        .filter(|rec| !prev.temps.contains(rec))
        .map(|rec| (rec.zone_idx, rec.temperature))
        .collect();
    if changed.is_empty() {
        return Ok(());
    }
    debug!("changed zones (from 30C9): {changed:?}");

    // ...with unique non-null temps, and no sensor
    let testable: Vec<(u8, Temp)> = changed
        .iter()
        .filter_map(|&(zone_idx, temp)| temp.map(|temp| (zone_idx, temp)))
        .filter(|(zone_idx, temp)| {
            sensorless.contains(zone_idx)
                && changed
                    .iter()
                    .all(|&(other, other_temp)| other == *zone_idx || other_temp != Some(*temp))
        })
        .collect();

    // sensors that reported a temperature during the last cycle
    let candidates: Vec<DeviceIx> = gwy
        .devices
        .iter()
        .enumerate()
        .filter(|(_, dev)| {
            (dev.ctl.is_none() || dev.ctl == Some(ctl_ix))
                && device::has_zone_sensor(dev.addr.dev_type())
                && dev.temperature.is_some()
                && dev.temperature_dtm.map_or(false, |dtm| dtm > prev.dtm)
        })
        .map(|(at, _)| DeviceIx(at))
        .collect();

    let max_zones = gwy.config.max_zones;
    for &(zone_idx, temp) in &testable {
        let matching: Vec<DeviceIx> = candidates
            .iter()
            .copied()
            .filter(|&ix| {
                let dev = &gwy.devices[ix.0];
                dev.temperature == Some(temp)
                    && (dev.zone_idx.is_none() || dev.zone_idx == Some(zone_idx))
            })
            .collect();

        if let [sensor_ix] = matching[..] {
            debug!("zone {zone_idx:02X}: matched sensor {}", gwy.devices[sensor_ix.0].addr);
            gwy.device_mut(sensor_ix).set_ctl(ctl_ix)?;
            gwy.device_mut(sensor_ix).set_zone_idx(zone_idx)?;
            gwy.system_mut(sys_ix)
                .get_or_create_zone(zone_idx, max_zones)?
                .set_sensor(sensor_ix)?;
        }
    }

    // now see if the controller itself can be allocated, by exclusion
    if gwy.devices[ctl_ix.0].zone_idx.is_some() {
        return Ok(());
    }
    let sensorless = gwy.systems[sys_ix.0].sensorless_zones();
    let [zone_idx] = sensorless[..] else {
        return Ok(());
    };
    let Some(&(_, Some(temp))) = changed.iter().find(|(idx, _)| *idx == zone_idx) else {
        return Ok(());
    };

    let still_matching = candidates.iter().any(|&ix| {
        let dev = &gwy.devices[ix.0];
        dev.temperature == Some(temp) && (dev.zone_idx.is_none() || dev.zone_idx == Some(zone_idx))
    });
    if !still_matching {
        debug!("zone {zone_idx:02X}: matched the controller by exclusion");
        gwy.device_mut(ctl_ix).set_zone_idx(zone_idx)?;
        gwy.system_mut(sys_ix)
            .get_or_create_zone(zone_idx, max_zones)?
            .set_sensor(ctl_ix)?;
    }
    Ok(())
}
