//! Fuzz target for the EVIO file reader.
//!
//! Tests:
//! - Arbitrary bytes never panic the reader
//! - The reader always reaches a terminal status

#![no_main]

use libfuzzer_sys::fuzz_target;
use rust_evio::reader::{BlockReader, EvioFileReader, ReadStatus};
use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    let mut reader = EvioFileReader::from_reader("fuzz.evio", Cursor::new(data.to_vec()));
    let mut buffer = vec![0u32; 256];
    for _ in 0..1024 {
        match reader.read(&mut buffer).status {
            ReadStatus::Ok { .. } => {}
            ReadStatus::BufferTooSmall { required } if required <= 1 << 20 => {
                buffer.resize(required, 0);
            }
            _ => return,
        }
    }
});
