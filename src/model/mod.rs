//! Decoded event model.
//!
//! A [`DecodedEvent`] holds everything decoded for one physical trigger. Hit
//! data is keyed by [`ChannelKey`] (rocid, slot, channel) in a [`ChannelMap`],
//! which keeps one [`ChannelHits`] bucket per channel with one collection per
//! module family.
//!
//! Events are pooled. [`DecodedEvent::reset`] clears the contents but keeps
//! allocated buckets on a spare list so the next event filled from the same
//! object reuses them.

pub mod records;

pub use records::*;

use serde::{Serialize, Serializer};
use std::collections::HashMap;

/// Physical address of a readout channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ChannelKey {
    /// Readout controller.
    pub rocid: u32,
    /// Slot.
    pub slot: u32,
    /// Channel (front-panel numbering for TDCs).
    pub channel: u32,
}

impl ChannelKey {
    /// Build a key.
    #[must_use]
    pub fn new(rocid: u32, slot: u32, channel: u32) -> Self {
        Self {
            rocid,
            slot,
            channel,
        }
    }
}

/// All hits recorded on one channel in one event, in stream order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChannelHits {
    /// Channel address.
    pub key: ChannelKey,
    /// f250 windows.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fadc250: Vec<Fadc250WindowRawData>,
    /// f125 windows.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fadc125: Vec<Fadc125WindowRawData>,
    /// F1 TDC hits.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub f1tdc: Vec<F1TdcHit>,
    /// CAEN 1290 hits.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub caen1290: Vec<Caen1290Hit>,
    /// Scaler counts.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub scaler_counts: Vec<u32>,
    #[serde(skip)]
    uses: u32,
}

impl ChannelHits {
    /// Whether the bucket holds no hits at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fadc250.is_empty()
            && self.fadc125.is_empty()
            && self.f1tdc.is_empty()
            && self.caen1290.is_empty()
            && self.scaler_counts.is_empty()
    }

    fn clear(&mut self) {
        self.fadc250.clear();
        self.fadc125.clear();
        self.f1tdc.clear();
        self.caen1290.clear();
        self.scaler_counts.clear();
    }
}

/// Channel-keyed hit buckets with bucket recycling.
#[derive(Debug, Clone, Default)]
pub struct ChannelMap {
    hits: Vec<ChannelHits>,
    index: HashMap<ChannelKey, usize>,
    spare: Vec<ChannelHits>,
    max_reuse: Option<u32>,
}

impl ChannelMap {
    /// Empty map whose buckets are dropped after `max_reuse` events.
    #[must_use]
    pub fn with_reuse_limit(max_reuse: Option<u32>) -> Self {
        Self {
            max_reuse,
            ..Self::default()
        }
    }

    /// Bucket for `key`, created (or taken from the spare list) on first use.
    pub fn channel_mut(&mut self, key: ChannelKey) -> &mut ChannelHits {
        let idx = match self.index.get(&key) {
            Some(&idx) => idx,
            None => {
                let mut bucket = self.spare.pop().unwrap_or_default();
                bucket.key = key;
                bucket.uses = bucket.uses.saturating_add(1);
                self.hits.push(bucket);
                let idx = self.hits.len() - 1;
                self.index.insert(key, idx);
                idx
            }
        };
        &mut self.hits[idx]
    }

    /// Bucket for `key`, if any hits were recorded on it.
    #[must_use]
    pub fn get(&self, key: &ChannelKey) -> Option<&ChannelHits> {
        self.index.get(key).map(|&idx| &self.hits[idx])
    }

    /// Buckets in first-hit order.
    pub fn iter(&self) -> std::slice::Iter<'_, ChannelHits> {
        self.hits.iter()
    }

    /// Mutable buckets in first-hit order.
    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, ChannelHits> {
        self.hits.iter_mut()
    }

    /// Number of channels with hits.
    #[must_use]
    pub fn len(&self) -> usize {
        self.hits.len()
    }

    /// Whether no channel has hits.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.hits.is_empty()
    }

    /// Buckets resting on the spare list.
    #[must_use]
    pub fn spare_len(&self) -> usize {
        self.spare.len()
    }

    /// Clear all buckets, keeping the ones under the reuse limit as spares.
    pub fn reset(&mut self) {
        self.index.clear();
        for mut bucket in self.hits.drain(..) {
            if self.max_reuse.is_some_and(|limit| bucket.uses >= limit) {
                continue;
            }
            bucket.clear();
            self.spare.push(bucket);
        }
    }
}

impl Serialize for ChannelMap {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(&self.hits)
    }
}

/// One physical trigger decoded from a block.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DecodedEvent {
    /// Event number.
    pub event_number: u64,
    /// Run number.
    pub run_number: u32,
    /// Event type from the built trigger bank.
    pub event_type: u16,
    /// Event trigger time, set by the trigger bank or the linker.
    pub trigger_time: Option<u64>,
    /// Event came from a physics block with the sync flag.
    pub sync_flag: bool,
    /// Built trigger bank summary.
    pub coda_event_info: Option<CodaEventInfo>,
    /// Per-ROC built trigger bank entries.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub roc_info: Vec<CodaRocInfo>,
    /// Module trigger times.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub trigger_times: Vec<ModuleTriggerTime>,
    /// Run-control event, for control blocks.
    pub control: Option<ControlEvent>,
    /// EPICS values.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub epics: Vec<EpicsValue>,
    /// BOR register dumps.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub bor: Vec<BorModule>,
    /// Trigger supervisor scalers.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ts_scalers: Vec<TsScalers>,
    /// f250 scaler bank headers.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub f250_scalers: Vec<F250ScalerHeader>,
    /// L3 event tag.
    pub event_tag: Option<EventTag>,
    /// Module configuration records.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub module_configs: Vec<ModuleConfig>,
    /// Offline vertices.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub vertices: Vec<Vertex>,
    /// Offline RF bunch times.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rf_bunches: Vec<RfBunch>,
    /// Hit data by channel.
    pub channels: ChannelMap,
}

impl DecodedEvent {
    /// Empty event whose channel buckets are replaced after `max_object_reuse` events.
    #[must_use]
    pub fn new(max_object_reuse: Option<u32>) -> Self {
        Self {
            channels: ChannelMap::with_reuse_limit(max_object_reuse),
            ..Self::default()
        }
    }

    /// Clear every field, keeping allocations for reuse.
    pub fn reset(&mut self) {
        self.event_number = 0;
        self.run_number = 0;
        self.event_type = 0;
        self.trigger_time = None;
        self.sync_flag = false;
        self.coda_event_info = None;
        self.roc_info.clear();
        self.trigger_times.clear();
        self.control = None;
        self.epics.clear();
        self.bor.clear();
        self.ts_scalers.clear();
        self.f250_scalers.clear();
        self.event_tag = None;
        self.module_configs.clear();
        self.vertices.clear();
        self.rf_bunches.clear();
        self.channels.reset();
    }

    /// Total number of hit records across all channels.
    #[must_use]
    pub fn hit_count(&self) -> usize {
        self.channels
            .iter()
            .map(|c| c.fadc250.len() + c.fadc125.len() + c.f1tdc.len() + c.caen1290.len())
            .sum()
    }

    /// Whether nothing at all was decoded into this event.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
            && self.coda_event_info.is_none()
            && self.control.is_none()
            && self.epics.is_empty()
            && self.bor.is_empty()
            && self.ts_scalers.is_empty()
            && self.f250_scalers.is_empty()
            && self.event_tag.is_none()
            && self.module_configs.is_empty()
            && self.vertices.is_empty()
            && self.rf_bunches.is_empty()
            && self.trigger_times.is_empty()
    }
}
