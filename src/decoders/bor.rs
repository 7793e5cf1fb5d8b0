//! Beginning-of-run bank: register dumps of every module in every crate.
//!
//! ```text
//! BOR bank (tag 0x70)
//! └── crate bank (tag 0x71, num = rocid)
//!     └── module bank (tag = module type id)
//!         └── records: slot << 16 | nwords, then nwords register words
//! ```

use super::first_event;
use crate::cursor::WordCursor;
use crate::error::DecodeError;
use crate::layout::{tag, DataType, ModuleType};
use crate::model::{BorModule, DecodedEvent};
use crate::parser::{BankHeader, DecodeOptions};
use std::ops::DerefMut;
use tracing::{debug, trace};

fn expect_banks(header: &BankHeader, context: &'static str) -> Result<(), DecodeError> {
    if header.data_type == DataType::Bank {
        Ok(())
    } else {
        Err(DecodeError::UnexpectedType {
            context,
            data_type: header.data_type.code(),
        })
    }
}

/// Decode a BOR bank into the single event allocated for it.
pub fn decode<E: DerefMut<Target = DecodedEvent>>(
    header: &BankHeader,
    mut cur: WordCursor<'_>,
    options: &DecodeOptions,
    events: &mut [E],
) -> Result<(), DecodeError> {
    expect_banks(header, "BOR bank")?;
    let event = first_event(events, "BOR bank")?;

    while !cur.is_empty() {
        let (crate_bank, mut modules) = BankHeader::read(&mut cur)?;
        if crate_bank.tag != tag::BOR_CRATE {
            debug!(tag = crate_bank.tag, "Skipping unexpected bank in BOR");
            continue;
        }
        let rocid = crate_bank.num;
        if !options.rocid_allowed(rocid) {
            trace!(rocid, "Skipping BOR crate not on the allow-list");
            continue;
        }
        expect_banks(&crate_bank, "BOR crate bank")?;

        while !modules.is_empty() {
            let (module_bank, mut records) = BankHeader::read(&mut modules)?;
            let module_type = ModuleType::from_id(module_bank.tag);
            while !records.is_empty() {
                let head = records.next_word()?;
                let nwords = (head & 0xFFFF) as usize;
                event.bor.push(BorModule {
                    rocid,
                    slot: head >> 16,
                    module_type,
                    registers: records.take(nwords)?.to_vec(),
                });
            }
        }
    }
    Ok(())
}
