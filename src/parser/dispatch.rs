//! Tagged dispatch from bank tags and module types to decoders.
//!
//! The parser never switches on raw integers itself: every top-level tag and
//! every data-block detector id is classified here into a [`TopLevel`] or
//! [`Dispatch`] variant, with the configured enable switches already applied.
//! An unrecognized combination classifies as `Unknown`, which the parser skips
//! with a diagnostic.

use crate::config::{DecodeConfig, LinkFlags, ParseFlags};
use crate::layout::{det, tag, ModuleType};
use crate::model::ControlKind;
use std::collections::HashSet;

/// Leaf decoders reachable from a ROC data bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataBlock {
    /// JLab VME module data (f250, f125, F1TDC, TI/TS).
    JlabModules,
    /// CAEN 1290 TDC data.
    Caen1290,
    /// Module configuration parameters.
    ModuleConfig,
    /// Event tag.
    EventTag,
    /// Trigger supervisor scalers.
    TsScalers,
    /// f250 scalers.
    F250Scalers,
    /// Offline vertex.
    Vertex,
    /// Offline RF bunch.
    RfBunch,
}

/// Result of classifying a data-block bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Decode with the given decoder.
    Decode(DataBlock),
    /// Known, but disabled by configuration.
    Disabled(DataBlock),
    /// No decoder for this tag.
    Unknown,
}

/// Result of classifying a top-level bank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TopLevel {
    /// Built physics event; `sync` is set for sync-flagged tags.
    Physics {
        /// Sync flag.
        sync: bool,
    },
    /// Run-control event.
    Control(ControlKind),
    /// EPICS slow-control bank.
    Epics,
    /// Beginning-of-run bank.
    Bor,
    /// A data-block bank found at top level (event tag, scalers, offline banks).
    Block(DataBlock),
    /// Known, but disabled by configuration.
    Disabled,
    /// No decoder for this tag.
    Unknown,
}

/// Classification table built once from the parse switches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchTable {
    parse: ParseFlags,
}

impl DispatchTable {
    /// Table honouring `parse`.
    #[must_use]
    pub fn new(parse: ParseFlags) -> Self {
        Self { parse }
    }

    /// Parse switches this table was built from.
    #[must_use]
    pub fn parse_flags(&self) -> &ParseFlags {
        &self.parse
    }

    fn enabled(&self, block: DataBlock) -> bool {
        match block {
            DataBlock::JlabModules => {
                self.parse.f250 || self.parse.f125 || self.parse.f1tdc || self.parse.trigger
            }
            DataBlock::Caen1290 => self.parse.caen1290,
            DataBlock::ModuleConfig => self.parse.module_config,
            DataBlock::EventTag => self.parse.event_tag,
            DataBlock::TsScalers | DataBlock::F250Scalers => self.parse.scalers,
            DataBlock::Vertex | DataBlock::RfBunch => self.parse.offline,
        }
    }

    fn gate(&self, block: DataBlock) -> Dispatch {
        if self.enabled(block) {
            Dispatch::Decode(block)
        } else {
            Dispatch::Disabled(block)
        }
    }

    /// Classify a data-block bank by its full 16-bit tag.
    #[must_use]
    pub fn classify_data(&self, bank_tag: u32) -> Dispatch {
        // Offline banks use the full tag; everything else the 12-bit detector id.
        match bank_tag {
            det::VERTEX => return self.gate(DataBlock::Vertex),
            det::RF_BUNCH => return self.gate(DataBlock::RfBunch),
            _ => {}
        }
        let block = match bank_tag & 0xFFF {
            det::CAEN1290 => DataBlock::Caen1290,
            det::MODULE_CONFIG => DataBlock::ModuleConfig,
            det::EVENT_TAG => DataBlock::EventTag,
            det::TS_SCALERS => DataBlock::TsScalers,
            det::F250_SCALERS => DataBlock::F250Scalers,
            det::JLAB_MODULES => DataBlock::JlabModules,
            _ => return Dispatch::Unknown,
        };
        self.gate(block)
    }

    /// Classify a top-level bank by its tag.
    #[must_use]
    pub fn classify_top(&self, bank_tag: u32) -> TopLevel {
        if tag::is_physics(bank_tag) {
            return TopLevel::Physics {
                sync: tag::is_sync_physics(bank_tag),
            };
        }
        if tag::is_control(bank_tag) {
            if !self.parse.control {
                return TopLevel::Disabled;
            }
            let kind = match bank_tag {
                tag::SYNC => ControlKind::Sync,
                tag::PRESTART => ControlKind::Prestart,
                tag::GO => ControlKind::Go,
                tag::PAUSE => ControlKind::Pause,
                _ => ControlKind::End,
            };
            return TopLevel::Control(kind);
        }
        match bank_tag {
            tag::EPICS if self.parse.epics => TopLevel::Epics,
            tag::BOR if self.parse.bor => TopLevel::Bor,
            tag::EPICS | tag::BOR => TopLevel::Disabled,
            tag::EVENT_TAG | det::TS_SCALERS | det::VERTEX | det::RF_BUNCH => {
                match self.classify_data(bank_tag) {
                    Dispatch::Decode(block) => TopLevel::Block(block),
                    Dispatch::Disabled(_) => TopLevel::Disabled,
                    Dispatch::Unknown => TopLevel::Unknown,
                }
            }
            _ => TopLevel::Unknown,
        }
    }

    /// Whether hits from `module` should be decoded inside JLab module data.
    #[must_use]
    pub fn module_enabled(&self, module: ModuleType) -> bool {
        match module {
            ModuleType::Fadc250 => self.parse.f250,
            ModuleType::Fadc125 => self.parse.f125,
            ModuleType::F1Tdc32 | ModuleType::F1Tdc48 => self.parse.f1tdc,
            ModuleType::Caen1290 => self.parse.caen1290,
            ModuleType::Tid | ModuleType::JlabTs | ModuleType::Td => self.parse.trigger,
            ModuleType::Unknown
            | ModuleType::VmeCpu
            | ModuleType::Ssp
            | ModuleType::JlabDisc
            | ModuleType::Caen1190 => false,
        }
    }
}

/// Everything a worker needs to decode a unit, built once per pipeline.
#[derive(Debug, Clone)]
pub struct DecodeOptions {
    /// Tag classification.
    pub dispatch: DispatchTable,
    /// Readout controllers to decode; `None` decodes all.
    pub rocids: Option<HashSet<u32>>,
    /// Association switches.
    pub link: LinkFlags,
    /// Maximum events per unit.
    pub max_events: usize,
    /// Run number forced onto every event.
    pub run_number_override: Option<u32>,
    /// Reuse limit for channel-hit buckets.
    pub object_reuse_limit: Option<u32>,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self::from_config(&DecodeConfig::default())
    }
}

impl DecodeOptions {
    /// Options derived from the decoder configuration.
    #[must_use]
    pub fn from_config(config: &DecodeConfig) -> Self {
        Self {
            dispatch: DispatchTable::new(config.parse),
            rocids: (!config.rocids.is_empty())
                .then(|| config.rocids.iter().copied().collect()),
            link: config.link,
            max_events: config.max_events_per_unit,
            run_number_override: config.run_number_override,
            object_reuse_limit: config.object_reuse_limit(),
        }
    }

    /// Whether `rocid` is on the allow-list.
    #[must_use]
    pub fn rocid_allowed(&self, rocid: u32) -> bool {
        self.rocids
            .as_ref()
            .map_or(true, |allowed| allowed.contains(&rocid))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_data_blocks() {
        let table = DispatchTable::new(ParseFlags::default());
        assert_eq!(
            table.classify_data(0x0E10),
            Dispatch::Decode(DataBlock::JlabModules)
        );
        assert_eq!(
            table.classify_data(0x1014),
            Dispatch::Decode(DataBlock::Caen1290)
        );
        assert_eq!(
            table.classify_data(det::VERTEX),
            Dispatch::Decode(DataBlock::Vertex)
        );
        assert_eq!(table.classify_data(0x0123), Dispatch::Unknown);
    }

    #[test]
    fn test_disabled_blocks() {
        let parse = ParseFlags {
            scalers: false,
            ..ParseFlags::default()
        };
        let table = DispatchTable::new(parse);
        assert_eq!(
            table.classify_data(0x0E02),
            Dispatch::Disabled(DataBlock::TsScalers)
        );
        assert_eq!(table.classify_top(0x0E02), TopLevel::Disabled);
    }

    #[test]
    fn test_classify_top_level() {
        let table = DispatchTable::new(ParseFlags::default());
        assert_eq!(table.classify_top(0xFF58), TopLevel::Physics { sync: true });
        assert_eq!(
            table.classify_top(0xFFD1),
            TopLevel::Control(ControlKind::Prestart)
        );
        assert_eq!(table.classify_top(0x0060), TopLevel::Epics);
        assert_eq!(
            table.classify_top(0x0056),
            TopLevel::Block(DataBlock::EventTag)
        );
        assert_eq!(table.classify_top(0x1234), TopLevel::Unknown);
    }

    #[test]
    fn test_module_enable_switches() {
        let parse = ParseFlags {
            f125: false,
            ..ParseFlags::default()
        };
        let table = DispatchTable::new(parse);
        assert!(table.module_enabled(ModuleType::Fadc250));
        assert!(!table.module_enabled(ModuleType::Fadc125));
        assert!(!table.module_enabled(ModuleType::Ssp));
    }

    #[test]
    fn test_rocid_allow_list() {
        let config = DecodeConfig {
            rocids: vec![11, 12],
            ..DecodeConfig::default()
        };
        let options = DecodeOptions::from_config(&config);
        assert!(options.rocid_allowed(11));
        assert!(!options.rocid_allowed(13));
        assert!(DecodeOptions::default().rocid_allowed(99));
    }
}
