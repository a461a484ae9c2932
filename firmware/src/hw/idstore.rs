//! Flash-backed identity store.
//!
//! The identity record lives in the last 2 KiB page of flash, away from
//! the firmware image. A save erases the page and programs one eight-byte
//! record; a blank page loads as "no identity stored".

use embassy_stm32::flash::{Blocking, Error as FlashError, Flash};
use ranging_core::node::{IdentityStore, NodeId};

use crate::idrecord;

/// Total flash size of the STM32G0B1KE.
const FLASH_SIZE: u32 = 512 * 1024;
/// Erase granularity.
const PAGE_SIZE: u32 = 2 * 1024;
/// Offset of the identity page, the last page of flash.
const RECORD_OFFSET: u32 = FLASH_SIZE - PAGE_SIZE;

pub struct FlashIdStore<'d> {
    flash: Flash<'d, Blocking>,
}

impl<'d> FlashIdStore<'d> {
    pub fn new(flash: Flash<'d, Blocking>) -> Self {
        Self { flash }
    }
}

impl IdentityStore for FlashIdStore<'_> {
    type Error = FlashError;

    fn load(&mut self) -> Result<Option<NodeId>, FlashError> {
        let mut record = [0_u8; idrecord::RECORD_SIZE];
        self.flash.blocking_read(RECORD_OFFSET, &mut record)?;
        Ok(idrecord::decode(&record))
    }

    fn save(&mut self, id: NodeId) -> Result<(), FlashError> {
        self.flash
            .blocking_erase(RECORD_OFFSET, RECORD_OFFSET + PAGE_SIZE)?;
        self.flash
            .blocking_write(RECORD_OFFSET, &idrecord::encode(id))
    }
}
