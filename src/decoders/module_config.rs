//! Module configuration bank (detector id 0x055).
//!
//! A sequence of records `nvals << 24 | slot_mask` followed by `nvals`
//! parameter words `ptype << 16 | value`. The high byte of `ptype` names the
//! module family, so one record may carry parameters for several families;
//! each family present becomes its own [`ModuleConfig`]. Configuration applies
//! to the whole block, so every event receives every record.

use crate::cursor::WordCursor;
use crate::error::DecodeError;
use crate::model::{
    Caen1290Config, DecodedEvent, F1TdcConfig, Fadc125Config, Fadc250Config, ModuleConfig,
    ModuleParams,
};
use std::ops::DerefMut;
use tracing::trace;

/// Parameter type codes.
pub mod ptype {
    /// f250 samples after threshold.
    pub const F250_NSA: u32 = 0x0501;
    /// f250 samples before threshold.
    pub const F250_NSB: u32 = 0x0502;
    /// f250 NSA + NSB.
    pub const F250_NSA_NSB: u32 = 0x0503;
    /// f250 pedestal samples.
    pub const F250_NPED: u32 = 0x0504;

    /// F1 reference count.
    pub const F1_REFCNT: u32 = 0x0601;
    /// F1 trigger window.
    pub const F1_TRIGWIN: u32 = 0x0602;
    /// F1 trigger latency.
    pub const F1_TRIGLAT: u32 = 0x0603;
    /// F1 high-speed divider.
    pub const F1_HSDIV: u32 = 0x0604;
    /// F1 bin size.
    pub const F1_BINSIZE: u32 = 0x0605;
    /// F1 reference clock divider.
    pub const F1_REFCLKDIV: u32 = 0x0606;

    /// f125 samples after threshold.
    pub const F125_NSA: u32 = 0x0F01;
    /// f125 samples before threshold.
    pub const F125_NSB: u32 = 0x0F02;
    /// f125 NSA + NSB.
    pub const F125_NSA_NSB: u32 = 0x0F03;
    /// f125 pedestal samples.
    pub const F125_NPED: u32 = 0x0F04;
    /// f125 window width.
    pub const F125_WINWIDTH: u32 = 0x0F05;

    /// CAEN match window width.
    pub const CAEN_WINWIDTH: u32 = 0x1001;
    /// CAEN match window offset.
    pub const CAEN_WINOFFSET: u32 = 0x1002;

    /// Family byte of f250 parameters.
    pub const FAMILY_F250: u32 = 0x05;
    /// Family byte of F1 parameters.
    pub const FAMILY_F1: u32 = 0x06;
    /// Family byte of f125 parameters.
    pub const FAMILY_F125: u32 = 0x0F;
    /// Family byte of CAEN parameters.
    pub const FAMILY_CAEN: u32 = 0x10;
}

#[derive(Default)]
struct RecordParams {
    f250: Option<Fadc250Config>,
    f125: Option<Fadc125Config>,
    f1: Option<F1TdcConfig>,
    caen: Option<Caen1290Config>,
}

impl RecordParams {
    fn apply(&mut self, code: u32, value: u16) {
        match code >> 8 {
            ptype::FAMILY_F250 => {
                let cfg = self.f250.get_or_insert_with(Fadc250Config::default);
                match code {
                    ptype::F250_NSA => cfg.nsa = Some(value),
                    ptype::F250_NSB => cfg.nsb = Some(value),
                    ptype::F250_NSA_NSB => cfg.nsa_nsb = Some(value),
                    ptype::F250_NPED => cfg.nped = Some(value),
                    _ => trace!(ptype = code, "Unknown f250 parameter"),
                }
            }
            ptype::FAMILY_F125 => {
                let cfg = self.f125.get_or_insert_with(Fadc125Config::default);
                match code {
                    ptype::F125_NSA => cfg.nsa = Some(value),
                    ptype::F125_NSB => cfg.nsb = Some(value),
                    ptype::F125_NSA_NSB => cfg.nsa_nsb = Some(value),
                    ptype::F125_NPED => cfg.nped = Some(value),
                    ptype::F125_WINWIDTH => cfg.win_width = Some(value),
                    _ => trace!(ptype = code, "Unknown f125 parameter"),
                }
            }
            ptype::FAMILY_F1 => {
                let cfg = self.f1.get_or_insert_with(F1TdcConfig::default);
                match code {
                    ptype::F1_REFCNT => cfg.refcnt = Some(value),
                    ptype::F1_TRIGWIN => cfg.trigwin = Some(value),
                    ptype::F1_TRIGLAT => cfg.triglat = Some(value),
                    ptype::F1_HSDIV => cfg.hsdiv = Some(value),
                    ptype::F1_BINSIZE => cfg.binsize = Some(value),
                    ptype::F1_REFCLKDIV => cfg.refclkdiv = Some(value),
                    _ => trace!(ptype = code, "Unknown F1TDC parameter"),
                }
            }
            ptype::FAMILY_CAEN => {
                let cfg = self.caen.get_or_insert_with(Caen1290Config::default);
                match code {
                    ptype::CAEN_WINWIDTH => cfg.window_width = Some(value),
                    ptype::CAEN_WINOFFSET => cfg.window_offset = Some(value),
                    _ => trace!(ptype = code, "Unknown CAEN1290 parameter"),
                }
            }
            _ => trace!(ptype = code, "Parameter for unknown module family"),
        }
    }

    fn into_params(self) -> impl Iterator<Item = ModuleParams> {
        [
            self.f250.map(ModuleParams::Fadc250),
            self.f125.map(ModuleParams::Fadc125),
            self.f1.map(ModuleParams::F1Tdc),
            self.caen.map(ModuleParams::Caen1290),
        ]
        .into_iter()
        .flatten()
    }
}

/// Decode a module configuration bank.
pub fn decode<E: DerefMut<Target = DecodedEvent>>(
    mut cur: WordCursor<'_>,
    rocid: u32,
    events: &mut [E],
) -> Result<(), DecodeError> {
    let mut configs = Vec::new();
    while !cur.is_empty() {
        let header = cur.next_word()?;
        let slot_mask = header & 0xFF_FFFF;
        let nvals = (header >> 24) as usize;

        let mut params = RecordParams::default();
        for &word in cur.take(nvals)? {
            params.apply(word >> 16, (word & 0xFFFF) as u16);
        }
        configs.extend(params.into_params().map(|params| ModuleConfig {
            rocid,
            slot_mask,
            params,
        }));
    }

    for event in events.iter_mut() {
        event.module_configs.extend_from_slice(&configs);
    }
    Ok(())
}
