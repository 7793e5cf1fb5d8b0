//! Typed records produced by the module decoders.

use crate::layout::ModuleType;
use serde::Serialize;

/// f250 flash ADC window raw data for one channel and trigger.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Fadc250WindowRawData {
    /// Readout controller.
    pub rocid: u32,
    /// Slot.
    pub slot: u32,
    /// Channel (0-15).
    pub channel: u32,
    /// Module trigger number.
    pub itrigger: u32,
    /// 13-bit ADC samples.
    pub samples: Vec<u16>,
    /// At least one sample had its "not valid" bit set.
    pub invalid_samples: bool,
    /// At least one sample had its overflow bit set.
    pub overflow: bool,
    /// Trigger time, filled by the linker.
    pub trigger_time: Option<u64>,
    /// Module configuration, filled by the linker.
    pub config: Option<Fadc250Config>,
}

/// f125 flash ADC window raw data for one channel and trigger.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Fadc125WindowRawData {
    /// Readout controller.
    pub rocid: u32,
    /// Slot.
    pub slot: u32,
    /// Channel (0-71).
    pub channel: u32,
    /// Module trigger number.
    pub itrigger: u32,
    /// 12-bit ADC samples.
    pub samples: Vec<u16>,
    /// Trigger time, filled by the linker.
    pub trigger_time: Option<u64>,
    /// Module configuration, filled by the linker.
    pub config: Option<Fadc125Config>,
}

/// One F1 TDC hit, addressed by front-panel channel.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct F1TdcHit {
    /// Readout controller.
    pub rocid: u32,
    /// Slot.
    pub slot: u32,
    /// Front-panel channel.
    pub channel: u32,
    /// Module trigger number.
    pub itrigger: u32,
    /// Chip number.
    pub chip: u32,
    /// Channel on chip.
    pub chan_on_chip: u32,
    /// 16-bit TDC time.
    pub time: u32,
    /// F1TDC32 or F1TDC48.
    pub module_type: ModuleType,
    /// Trigger time, filled by the linker.
    pub trigger_time: Option<u64>,
    /// Module configuration, filled by the linker.
    pub config: Option<F1TdcConfig>,
}

/// Leading or trailing edge of a CAEN TDC measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Edge {
    /// Leading edge.
    Leading,
    /// Trailing edge.
    Trailing,
}

/// One CAEN 1290 TDC measurement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Caen1290Hit {
    /// Readout controller.
    pub rocid: u32,
    /// Slot (GEO address).
    pub slot: u32,
    /// Channel.
    pub channel: u32,
    /// Event count from the global header.
    pub itrigger: u32,
    /// Edge.
    pub edge: Edge,
    /// 21-bit TDC time.
    pub time: u32,
    /// Trigger time, filled by the linker.
    pub trigger_time: Option<u64>,
    /// Module configuration, filled by the linker.
    pub config: Option<Caen1290Config>,
}

/// Trigger time reported by a module for one trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModuleTriggerTime {
    /// Readout controller.
    pub rocid: u32,
    /// Slot.
    pub slot: u32,
    /// Module trigger number.
    pub itrigger: u32,
    /// Trigger time in module clock ticks.
    pub time: u64,
}

/// Event information from the built trigger bank.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CodaEventInfo {
    /// Run number (0 when the bank carries no run info).
    pub run_number: u32,
    /// Run type.
    pub run_type: u32,
    /// Event number.
    pub event_number: u64,
    /// Event type.
    pub event_type: u16,
    /// Average timestamp over all ROCs (0 when absent).
    pub avg_timestamp: u64,
}

/// Per-ROC information from the built trigger bank.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CodaRocInfo {
    /// Readout controller.
    pub rocid: u32,
    /// 64-bit timestamp.
    pub timestamp: u64,
    /// Remaining ROC words.
    pub misc: Vec<u32>,
}

/// CODA run-control event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ControlKind {
    /// Sync.
    Sync,
    /// Prestart.
    Prestart,
    /// Go.
    Go,
    /// Pause.
    Pause,
    /// End.
    End,
}

/// A CODA run-control event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ControlEvent {
    /// Event kind.
    pub kind: ControlKind,
    /// Unix time of the transition.
    pub time: u32,
    /// Payload words after the time.
    pub words: Vec<u32>,
}

/// One EPICS `name=value` entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EpicsValue {
    /// Unix time of the EPICS readout.
    pub timestamp: u32,
    /// Process variable name.
    pub name: String,
    /// Value as written by the producer.
    pub value: String,
}

/// Register dump of one module from a BOR bank.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BorModule {
    /// Readout controller.
    pub rocid: u32,
    /// Slot.
    pub slot: u32,
    /// Module type.
    pub module_type: ModuleType,
    /// Raw register words.
    pub registers: Vec<u32>,
}

/// Trigger supervisor scalers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TsScalers {
    /// Sync event counter.
    pub nsync: u32,
    /// Integrated trigger count.
    pub int_count: u32,
    /// Integrated live time.
    pub live_time: u32,
    /// Integrated busy time.
    pub busy_time: u32,
    /// Instantaneous live time.
    pub live_inst: u32,
    /// Unix time of the readout.
    pub time: u32,
    /// GTP trigger bit counts.
    pub gtp_scalers: Vec<u32>,
    /// Front-panel trigger bit counts.
    pub fp_scalers: Vec<u32>,
    /// GTP trigger bit rates.
    pub gtp_rate: Vec<u32>,
    /// Front-panel trigger bit rates.
    pub fp_rate: Vec<u32>,
}

/// Header of an f250 scaler bank; the counts go to the channel map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct F250ScalerHeader {
    /// Readout controller.
    pub rocid: u32,
    /// Sync event counter.
    pub nsync: u32,
    /// Trigger number of the readout.
    pub trig_number: u32,
    /// Scaler bank version.
    pub version: u32,
}

/// L3 event tag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EventTag {
    /// Event status bits.
    pub event_status: u64,
    /// L3 status bits.
    pub l3_status: u64,
    /// L3 decision.
    pub l3_decision: u32,
    /// L3 algorithm id.
    pub l3_algorithm: u32,
}

/// f250 configuration parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Fadc250Config {
    /// Samples after threshold crossing.
    pub nsa: Option<u16>,
    /// Samples before threshold crossing.
    pub nsb: Option<u16>,
    /// NSA + NSB.
    pub nsa_nsb: Option<u16>,
    /// Pedestal samples.
    pub nped: Option<u16>,
}

/// f125 configuration parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Fadc125Config {
    /// Samples after threshold crossing.
    pub nsa: Option<u16>,
    /// Samples before threshold crossing.
    pub nsb: Option<u16>,
    /// NSA + NSB.
    pub nsa_nsb: Option<u16>,
    /// Pedestal samples.
    pub nped: Option<u16>,
    /// Window width.
    pub win_width: Option<u16>,
}

/// F1 TDC configuration parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct F1TdcConfig {
    /// Reference count.
    pub refcnt: Option<u16>,
    /// Trigger window.
    pub trigwin: Option<u16>,
    /// Trigger latency.
    pub triglat: Option<u16>,
    /// High-speed divider.
    pub hsdiv: Option<u16>,
    /// Bin size.
    pub binsize: Option<u16>,
    /// Reference clock divider.
    pub refclkdiv: Option<u16>,
}

/// CAEN 1290 configuration parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Caen1290Config {
    /// Match window width.
    pub window_width: Option<u16>,
    /// Match window offset.
    pub window_offset: Option<u16>,
}

/// Parameters for one module family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleParams {
    /// f250 parameters.
    Fadc250(Fadc250Config),
    /// f125 parameters.
    Fadc125(Fadc125Config),
    /// F1 TDC parameters.
    F1Tdc(F1TdcConfig),
    /// CAEN 1290 parameters.
    Caen1290(Caen1290Config),
}

/// Configuration record for the slots selected by `slot_mask` in one crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModuleConfig {
    /// Readout controller.
    pub rocid: u32,
    /// Bit `n` selects slot `n`.
    pub slot_mask: u32,
    /// Parameters.
    pub params: ModuleParams,
}

impl ModuleConfig {
    /// Whether this record applies to `slot`.
    #[must_use]
    pub fn covers(&self, rocid: u32, slot: u32) -> bool {
        self.rocid == rocid && slot < 32 && self.slot_mask & (1 << slot) != 0
    }
}

/// Offline reconstructed vertex.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Vertex {
    /// x position.
    pub x: f32,
    /// y position.
    pub y: f32,
    /// z position.
    pub z: f32,
    /// Time.
    pub t: f32,
    /// Fit chi-square.
    pub chi2: f32,
    /// Fit degrees of freedom.
    pub ndf: u32,
}

/// Offline RF bunch time.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct RfBunch {
    /// RF time.
    pub time: f32,
    /// Variance of the RF time.
    pub time_variance: f32,
    /// Number of votes for the selected bunch.
    pub num_votes: u32,
}
