//! Association pass run once per unit after all banks are decoded.
//!
//! The built trigger bank and the module data banks of a block may appear in
//! any order, so trigger times and configurations are attached here rather
//! than while decoding. For each hit the linker looks for, in order:
//!
//! 1. the trigger time reported by the same module (rocid, slot, trigger number),
//! 2. the event trigger time from the built trigger bank,
//!
//! and the most recent [`ModuleConfig`] covering the hit's crate and slot for
//! the hit's module family.

use crate::config::LinkFlags;
use crate::model::{
    Caen1290Config, DecodedEvent, F1TdcConfig, Fadc125Config, Fadc250Config, ModuleConfig,
    ModuleParams, ModuleTriggerTime,
};
use std::ops::DerefMut;

/// Link every event of a unit.
pub fn link_events<E: DerefMut<Target = DecodedEvent>>(events: &mut [E], flags: &LinkFlags) {
    for event in events.iter_mut() {
        link_event(event, flags);
    }
}

/// Link the hits of one event to its trigger time and module configuration.
pub fn link_event(event: &mut DecodedEvent, flags: &LinkFlags) {
    if event.run_number == 0 {
        if let Some(info) = event.coda_event_info {
            event.run_number = info.run_number;
        }
    }
    if event.trigger_time.is_none() {
        event.trigger_time = event.trigger_times.first().map(|t| t.time);
    }

    let DecodedEvent {
        trigger_time,
        trigger_times,
        module_configs,
        channels,
        ..
    } = event;
    let trigger_time = *trigger_time;
    let trigger_times: &[ModuleTriggerTime] = trigger_times;
    let module_configs: &[ModuleConfig] = module_configs;
    let link_time = |rocid, slot, itrigger| {
        module_trigger_time(trigger_times, rocid, slot, itrigger).or(trigger_time)
    };

    for bucket in channels.iter_mut() {
        if flags.f250 {
            for hit in &mut bucket.fadc250 {
                if flags.trigger_time {
                    hit.trigger_time = link_time(hit.rocid, hit.slot, hit.itrigger);
                }
                if flags.config {
                    hit.config = find_config(module_configs, hit.rocid, hit.slot, fadc250_params);
                }
            }
        }
        if flags.f125 {
            for hit in &mut bucket.fadc125 {
                if flags.trigger_time {
                    hit.trigger_time = link_time(hit.rocid, hit.slot, hit.itrigger);
                }
                if flags.config {
                    hit.config = find_config(module_configs, hit.rocid, hit.slot, fadc125_params);
                }
            }
        }
        if flags.f1tdc {
            for hit in &mut bucket.f1tdc {
                if flags.trigger_time {
                    hit.trigger_time = link_time(hit.rocid, hit.slot, hit.itrigger);
                }
                if flags.config {
                    hit.config = find_config(module_configs, hit.rocid, hit.slot, f1tdc_params);
                }
            }
        }
        if flags.caen1290 {
            for hit in &mut bucket.caen1290 {
                if flags.trigger_time {
                    hit.trigger_time = link_time(hit.rocid, hit.slot, hit.itrigger);
                }
                if flags.config {
                    hit.config = find_config(module_configs, hit.rocid, hit.slot, caen1290_params);
                }
            }
        }
    }
}

fn module_trigger_time(
    times: &[ModuleTriggerTime],
    rocid: u32,
    slot: u32,
    itrigger: u32,
) -> Option<u64> {
    times
        .iter()
        .find(|t| t.rocid == rocid && t.slot == slot && t.itrigger == itrigger)
        .map(|t| t.time)
}

fn find_config<T>(
    configs: &[ModuleConfig],
    rocid: u32,
    slot: u32,
    pick: fn(&ModuleParams) -> Option<T>,
) -> Option<T> {
    configs
        .iter()
        .rev()
        .filter(|c| c.covers(rocid, slot))
        .find_map(|c| pick(&c.params))
}

fn fadc250_params(params: &ModuleParams) -> Option<Fadc250Config> {
    match params {
        ModuleParams::Fadc250(cfg) => Some(*cfg),
        _ => None,
    }
}

fn fadc125_params(params: &ModuleParams) -> Option<Fadc125Config> {
    match params {
        ModuleParams::Fadc125(cfg) => Some(*cfg),
        _ => None,
    }
}

fn f1tdc_params(params: &ModuleParams) -> Option<F1TdcConfig> {
    match params {
        ModuleParams::F1Tdc(cfg) => Some(*cfg),
        _ => None,
    }
}

fn caen1290_params(params: &ModuleParams) -> Option<Caen1290Config> {
    match params {
        ModuleParams::Caen1290(cfg) => Some(*cfg),
        _ => None,
    }
}
