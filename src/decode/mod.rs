//! Decoder management
//!
//! Several independent decode streams coexist, each bound to a slot in a
//! fixed-capacity table and addressed by integer index.

mod slots;

pub use slots::{DecoderSlotTable, Slot, SlotState};
