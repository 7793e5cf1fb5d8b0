//! Block-level decoding through the public parser API.

mod common;

use common::{bank, f250_block, physics_block, ROCID, RUN, SLOT};
use evio_pool::{PoolSettings, RecyclePool};
use rust_evio::config::DecodeConfig;
use rust_evio::layout::{det, DataType};
use rust_evio::linker::link_events;
use rust_evio::model::ChannelKey;
use rust_evio::parser::{parse_block, DecodeOptions};
use rust_evio::swap::{swap_block, swap_block_to_foreign};
use rust_evio::{DecodeError, DecodedEvent};

fn pool() -> RecyclePool<DecodedEvent> {
    RecyclePool::new(PoolSettings::default(), || DecodedEvent::new(None), DecodedEvent::reset)
}

#[test]
fn test_physics_block_fills_every_event() {
    let words = physics_block(100, 4);
    let mut events = parse_block(&words, &DecodeOptions::default(), &mut pool()).unwrap();
    link_events(&mut events, &DecodeConfig::default().link);

    assert_eq!(events.len(), 4);
    for (i, event) in events.iter().enumerate() {
        assert_eq!(event.event_number, 100 + i as u64);
        assert_eq!(event.run_number, RUN);
        assert_eq!(event.roc_info.len(), 1);
        assert_eq!(event.trigger_times.len(), 1);

        let key = ChannelKey::new(ROCID, SLOT, i as u32 % 16);
        let window = &event.channels.get(&key).unwrap().fadc250[0];
        assert_eq!(window.samples, vec![i as u16, i as u16 + 1]);
        assert_eq!(window.trigger_time, Some(event.trigger_times[0].time));
    }
}

#[test]
fn test_rocid_allow_list() {
    let mut config = DecodeConfig::default();
    config.rocids = vec![ROCID + 1];
    let options = DecodeOptions::from_config(&config);

    let events = parse_block(&physics_block(0, 2), &options, &mut pool()).unwrap();
    assert_eq!(events.len(), 2);
    assert!(events.iter().all(|e| e.channels.is_empty()));
    assert!(events.iter().all(|e| e.coda_event_info.is_some()));
}

#[test]
fn test_disabled_f250_leaves_trigger_data() {
    let mut config = DecodeConfig::default();
    config.parse.f250 = false;
    let options = DecodeOptions::from_config(&config);

    let events = parse_block(&physics_block(0, 3), &options, &mut pool()).unwrap();
    assert!(events.iter().all(|e| e.channels.is_empty()));
    assert_eq!(events[2].event_number, 2);
}

#[test]
fn test_more_event_headers_than_events() {
    let data = bank(det::JLAB_MODULES, DataType::U32, 0, &f250_block(SLOT, 0, 3));
    let roc = bank(ROCID, DataType::Bank, 2, &data);
    let words = bank(0xFF50, DataType::Bank, 2, &roc);

    let err = parse_block(&words, &DecodeOptions::default(), &mut pool()).unwrap_err();
    assert!(matches!(err, DecodeError::EventCountMismatch { .. }));
}

#[test]
fn test_foreign_block_decodes_after_swap() {
    let native = physics_block(7, 3);
    let mut words = native.clone();
    swap_block_to_foreign(&mut words).unwrap();
    assert_ne!(words, native);
    swap_block(&mut words).unwrap();
    assert_eq!(words, native);

    let events = parse_block(&words, &DecodeOptions::default(), &mut pool()).unwrap();
    assert_eq!(events[0].event_number, 7);
}
