//! Wire-format constants.
//!
//! Tags, data type codes and module word layouts of the readout stream. These
//! are a fixed hardware protocol; the decoders reference them by name so the
//! bit positions live in one place.

/// EVIO data type codes carried in bank, segment and tag-segment headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
pub enum DataType {
    /// 0x0: 32-bit words of unknown meaning.
    Unknown32,
    /// 0x1: unsigned 32-bit integers.
    U32,
    /// 0x2: 32-bit floats.
    F32,
    /// 0x3: 8-bit characters.
    Char8,
    /// 0x4: signed 16-bit integers.
    I16,
    /// 0x5: unsigned 16-bit integers.
    U16,
    /// 0x6: signed 8-bit integers.
    I8,
    /// 0x7: unsigned 8-bit integers.
    U8,
    /// 0x8: 64-bit floats.
    F64,
    /// 0x9: signed 64-bit integers.
    I64,
    /// 0xa: unsigned 64-bit integers.
    U64,
    /// 0xb: signed 32-bit integers.
    I32,
    /// 0xc: container of tag-segments.
    TagSegment,
    /// 0xd / 0x20: container of segments.
    Segment,
    /// 0xe / 0x10: container of banks.
    Bank,
    /// 0xf: composite data.
    Composite,
    /// Any other code.
    Other(u32),
}

impl DataType {
    /// Decode a 6-bit type code.
    #[must_use]
    pub fn from_code(code: u32) -> Self {
        match code {
            0x0 => DataType::Unknown32,
            0x1 => DataType::U32,
            0x2 => DataType::F32,
            0x3 => DataType::Char8,
            0x4 => DataType::I16,
            0x5 => DataType::U16,
            0x6 => DataType::I8,
            0x7 => DataType::U8,
            0x8 => DataType::F64,
            0x9 => DataType::I64,
            0xa => DataType::U64,
            0xb => DataType::I32,
            0xc => DataType::TagSegment,
            0xd | 0x20 => DataType::Segment,
            0xe | 0x10 => DataType::Bank,
            0xf => DataType::Composite,
            other => DataType::Other(other),
        }
    }

    /// Wire code (the canonical one for containers with two codes).
    #[must_use]
    pub fn code(self) -> u32 {
        match self {
            DataType::Unknown32 => 0x0,
            DataType::U32 => 0x1,
            DataType::F32 => 0x2,
            DataType::Char8 => 0x3,
            DataType::I16 => 0x4,
            DataType::U16 => 0x5,
            DataType::I8 => 0x6,
            DataType::U8 => 0x7,
            DataType::F64 => 0x8,
            DataType::I64 => 0x9,
            DataType::U64 => 0xa,
            DataType::I32 => 0xb,
            DataType::TagSegment => 0xc,
            DataType::Segment => 0xd,
            DataType::Bank => 0xe,
            DataType::Composite => 0xf,
            DataType::Other(code) => code,
        }
    }

    /// Whether the payload is itself a list of headers.
    #[must_use]
    pub fn is_container(self) -> bool {
        matches!(
            self,
            DataType::Bank | DataType::Segment | DataType::TagSegment
        )
    }
}

/// Top-level bank tags.
pub mod tag {
    /// Event-tag (L3 decision) bank.
    pub const EVENT_TAG: u32 = 0x0056;
    /// EPICS slow-control bank.
    pub const EPICS: u32 = 0x0060;
    /// Segment inside an EPICS bank holding the timestamp.
    pub const EPICS_TIME: u32 = 0x0061;
    /// Segment inside an EPICS bank holding a `name=value` string.
    pub const EPICS_VALUE: u32 = 0x0062;
    /// Beginning-of-run (module register dump) bank.
    pub const BOR: u32 = 0x0070;
    /// Crate bank inside a BOR bank.
    pub const BOR_CRATE: u32 = 0x0071;

    /// CODA sync control event.
    pub const SYNC: u32 = 0xFFD0;
    /// CODA prestart control event.
    pub const PRESTART: u32 = 0xFFD1;
    /// CODA go control event.
    pub const GO: u32 = 0xFFD2;
    /// CODA pause control event.
    pub const PAUSE: u32 = 0xFFD3;
    /// CODA end control event.
    pub const END: u32 = 0xFFD4;

    /// Built physics event.
    pub const PHYSICS: u32 = 0xFF50;
    /// Built physics event with sync flag.
    pub const PHYSICS_SYNC: u32 = 0xFF58;
    /// Built physics event (alternate builder).
    pub const PHYSICS_ALT: u32 = 0xFF70;
    /// Built physics event with sync flag (alternate builder).
    pub const PHYSICS_ALT_SYNC: u32 = 0xFF78;

    /// Built trigger bank tags occupy 0xFF20..=0xFF2F.
    pub const BUILT_TRIGGER_MASK: u32 = 0xFFF0;
    /// Base of the built trigger bank tag range.
    pub const BUILT_TRIGGER: u32 = 0xFF20;
    /// Built trigger bank carries per-event timestamps.
    pub const BUILT_TRIGGER_TIMESTAMPS: u32 = 0x1;
    /// Built trigger bank carries run number and type.
    pub const BUILT_TRIGGER_RUN_INFO: u32 = 0x2;

    /// Whether `tag` is a built physics event.
    #[must_use]
    pub fn is_physics(tag: u32) -> bool {
        matches!(tag, PHYSICS | PHYSICS_SYNC | PHYSICS_ALT | PHYSICS_ALT_SYNC)
    }

    /// Whether `tag` is a physics event with the sync flag set.
    #[must_use]
    pub fn is_sync_physics(tag: u32) -> bool {
        matches!(tag, PHYSICS_SYNC | PHYSICS_ALT_SYNC)
    }

    /// Whether `tag` is a built trigger bank.
    #[must_use]
    pub fn is_built_trigger(tag: u32) -> bool {
        tag & BUILT_TRIGGER_MASK == BUILT_TRIGGER
    }

    /// Whether `tag` is a CODA control event.
    #[must_use]
    pub fn is_control(tag: u32) -> bool {
        (SYNC..=END).contains(&tag)
    }
}

/// Detector ids of data-block banks inside a ROC data bank.
pub mod det {
    /// CAEN 1290 TDC data.
    pub const CAEN1290: u32 = 0x014;
    /// Module configuration parameters.
    pub const MODULE_CONFIG: u32 = 0x055;
    /// Event tag written by the L3 farm.
    pub const EVENT_TAG: u32 = 0x056;
    /// Trigger supervisor scalers.
    pub const TS_SCALERS: u32 = 0xE02;
    /// f250 per-channel scalers.
    pub const F250_SCALERS: u32 = 0xE05;
    /// JLab VME module data (f250, f125, F1TDC, TI/TS).
    pub const JLAB_MODULES: u32 = 0xE10;
    /// Offline reconstructed vertex (full 16-bit tag).
    pub const VERTEX: u32 = 0x5555;
    /// Offline RF bunch time (full 16-bit tag).
    pub const RF_BUNCH: u32 = 0x5556;

    /// Filler word padding the start of some data-block banks.
    pub const FILLER: u32 = 0xF800_FAFA;
}

/// Hardware module type ids (bits 21-18 of a JLab block header).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModuleType {
    /// 0: unknown.
    Unknown,
    /// 1: VME crate CPU.
    VmeCpu,
    /// 2: trigger interface.
    Tid,
    /// 3: 250 MHz flash ADC.
    Fadc250,
    /// 4: 125 MHz flash ADC.
    Fadc125,
    /// 5: 32-channel F1 TDC.
    F1Tdc32,
    /// 6: 48-channel F1 TDC.
    F1Tdc48,
    /// 7: trigger supervisor.
    JlabTs,
    /// 8: trigger distribution.
    Td,
    /// 9: sub-system processor.
    Ssp,
    /// 10: discriminator.
    JlabDisc,
    /// 11: CAEN 1190 TDC.
    Caen1190,
    /// 12: CAEN 1290 TDC.
    Caen1290,
}

impl ModuleType {
    /// Decode a module type id; unassigned ids map to [`ModuleType::Unknown`].
    #[must_use]
    pub fn from_id(id: u32) -> Self {
        match id {
            1 => ModuleType::VmeCpu,
            2 => ModuleType::Tid,
            3 => ModuleType::Fadc250,
            4 => ModuleType::Fadc125,
            5 => ModuleType::F1Tdc32,
            6 => ModuleType::F1Tdc48,
            7 => ModuleType::JlabTs,
            8 => ModuleType::Td,
            9 => ModuleType::Ssp,
            10 => ModuleType::JlabDisc,
            11 => ModuleType::Caen1190,
            12 => ModuleType::Caen1290,
            _ => ModuleType::Unknown,
        }
    }

    /// Wire id.
    #[must_use]
    pub fn id(self) -> u32 {
        match self {
            ModuleType::Unknown => 0,
            ModuleType::VmeCpu => 1,
            ModuleType::Tid => 2,
            ModuleType::Fadc250 => 3,
            ModuleType::Fadc125 => 4,
            ModuleType::F1Tdc32 => 5,
            ModuleType::F1Tdc48 => 6,
            ModuleType::JlabTs => 7,
            ModuleType::Td => 8,
            ModuleType::Ssp => 9,
            ModuleType::JlabDisc => 10,
            ModuleType::Caen1190 => 11,
            ModuleType::Caen1290 => 12,
        }
    }
}

/// JLab module data-type-defining words.
pub mod jlab {
    /// Bit marking a data-type-defining word.
    pub const TYPE_DEFINING: u32 = 0x8000_0000;
    /// Block header.
    pub const BLOCK_HEADER: u32 = 0;
    /// Block trailer.
    pub const BLOCK_TRAILER: u32 = 1;
    /// Event header.
    pub const EVENT_HEADER: u32 = 2;
    /// Trigger time (two words).
    pub const TRIGGER_TIME: u32 = 3;
    /// Window raw data.
    pub const WINDOW_RAW_DATA: u32 = 4;
    /// Event trailer.
    pub const EVENT_TRAILER: u32 = 13;
    /// Data not valid.
    pub const DATA_NOT_VALID: u32 = 14;
    /// Filler.
    pub const FILLER: u32 = 15;

    /// Whether `word` starts a new data type.
    #[inline]
    #[must_use]
    pub fn is_type_defining(word: u32) -> bool {
        word & TYPE_DEFINING != 0
    }

    /// Data type of a type-defining word.
    #[inline]
    #[must_use]
    pub fn data_type(word: u32) -> u32 {
        (word >> 27) & 0xF
    }

    /// Slot number of a block header.
    #[inline]
    #[must_use]
    pub fn slot(word: u32) -> u32 {
        (word >> 22) & 0x1F
    }

    /// Module type id of a block header.
    #[inline]
    #[must_use]
    pub fn module_id(word: u32) -> u32 {
        (word >> 18) & 0xF
    }

    /// Trigger number of an event header.
    #[inline]
    #[must_use]
    pub fn trigger_number(word: u32) -> u32 {
        word & 0x3F_FFFF
    }

    /// 24-bit payload of a trigger time word.
    #[inline]
    #[must_use]
    pub fn time_bits(word: u32) -> u64 {
        u64::from(word & 0xFF_FFFF)
    }
}

/// F1 TDC words (5-bit type field).
pub mod f1 {
    /// Block header.
    pub const BLOCK_HEADER: u32 = 0x10;
    /// Block trailer.
    pub const BLOCK_TRAILER: u32 = 0x11;
    /// Event header.
    pub const EVENT_HEADER: u32 = 0x12;
    /// Trigger time.
    pub const TRIGGER_TIME: u32 = 0x13;
    /// Chip header.
    pub const CHIP_HEADER: u32 = 0x18;
    /// Hit data.
    pub const DATA: u32 = 0x19;
    /// Filler.
    pub const FILLER: u32 = 0x1F;

    /// 5-bit word type.
    #[inline]
    #[must_use]
    pub fn word_type(word: u32) -> u32 {
        (word >> 27) & 0x1F
    }

    /// Chip number of a data word.
    #[inline]
    #[must_use]
    pub fn chip(word: u32) -> u32 {
        (word >> 19) & 0x7
    }

    /// Channel-on-chip of a data word.
    #[inline]
    #[must_use]
    pub fn chan_on_chip(word: u32) -> u32 {
        (word >> 16) & 0x7
    }

    /// Time of a data word.
    #[inline]
    #[must_use]
    pub fn time(word: u32) -> u32 {
        word & 0xFFFF
    }
}

/// CAEN 1290 words (5-bit type field).
pub mod caen {
    /// TDC measurement.
    pub const MEASUREMENT: u32 = 0x00;
    /// TDC header.
    pub const TDC_HEADER: u32 = 0x01;
    /// TDC trailer.
    pub const TDC_TRAILER: u32 = 0x03;
    /// TDC error.
    pub const TDC_ERROR: u32 = 0x04;
    /// Global header.
    pub const GLOBAL_HEADER: u32 = 0x08;
    /// Global trailer.
    pub const GLOBAL_TRAILER: u32 = 0x10;
    /// Extended trigger time tag.
    pub const EXT_TRIGGER_TIME: u32 = 0x11;
    /// Filler.
    pub const FILLER: u32 = 0x18;

    /// 5-bit word type.
    #[inline]
    #[must_use]
    pub fn word_type(word: u32) -> u32 {
        word >> 27
    }
}

/// Word counts of fixed-size records.
pub mod size {
    /// Trigger supervisor scaler record.
    pub const TS_SCALERS: usize = 102;
    /// Event tag record.
    pub const EVENT_TAG: usize = 6;
    /// Vertex record.
    pub const VERTEX: usize = 6;
    /// RF bunch record.
    pub const RF_BUNCH: usize = 3;
    /// Trigger supervisor GTP scaler channels.
    pub const TS_GTP: usize = 32;
    /// Trigger supervisor front-panel scaler channels.
    pub const TS_FP: usize = 16;
}
