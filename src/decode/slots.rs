//! Fixed-capacity decoder slot table

use crate::config::{DecoderConfig, MAX_DECODER_SLOTS};
use crate::engine::{DecodeEngine, EngineFactory};
use crate::error::{Error, Result};

/// One addressable decoder
#[derive(Default)]
pub enum Slot {
    /// No engine instance
    #[default]
    Empty,
    /// Initialized engine bound to this index
    Ready(Box<dyn DecodeEngine>),
}

impl Slot {
    pub fn is_ready(&self) -> bool {
        matches!(self, Slot::Ready(_))
    }

    pub fn state(&self) -> SlotState {
        match self {
            Slot::Empty => SlotState::Empty,
            Slot::Ready(_) => SlotState::Ready,
        }
    }
}

impl std::fmt::Debug for Slot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Slot::Empty => "Empty",
            Slot::Ready(_) => "Ready",
        })
    }
}

/// Observable slot state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Empty,
    Ready,
}

/// Decoder slot table, addressed by integer index.
///
/// Indices arrive from the embedding caller as signed integers; anything
/// outside `[0, capacity)` is rejected before the table is touched.
pub struct DecoderSlotTable {
    slots: Vec<Slot>,
    config: DecoderConfig,
}

impl DecoderSlotTable {
    pub fn new(config: DecoderConfig) -> Self {
        Self::with_capacity(MAX_DECODER_SLOTS, config)
    }

    pub fn with_capacity(capacity: usize, config: DecoderConfig) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, Slot::default);
        Self { slots, config }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Map a caller index to a table position
    pub fn check_index(&self, index: i32) -> Result<usize> {
        usize::try_from(index)
            .ok()
            .filter(|&i| i < self.slots.len())
            .ok_or(Error::InvalidSlot(index))
    }

    /// State of a slot; out-of-range indices read as `Empty`
    pub fn state(&self, index: i32) -> SlotState {
        self.check_index(index)
            .map(|i| self.slots[i].state())
            .unwrap_or(SlotState::Empty)
    }

    /// Number of `Ready` slots
    pub fn ready_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_ready()).count()
    }

    /// Tear down whatever is at `index` and bind a fresh decoder.
    ///
    /// On failure the slot is left `Empty`.
    pub fn init_slot(&mut self, factory: &dyn EngineFactory, index: i32) -> Result<()> {
        let i = self.check_index(index)?;
        self.slots[i] = Slot::Empty;

        let engine = factory.create_decoder(&self.config).map_err(|e| {
            tracing::warn!(slot = i, error = %e, "Failed to create decoder");
            e
        })?;
        self.slots[i] = Slot::Ready(engine);

        tracing::debug!(slot = i, backend = factory.name(), "Decoder slot initialized");
        Ok(())
    }

    /// Tear down the decoder at `index`. No-op if empty or out of range.
    pub fn deinit_slot(&mut self, index: i32) {
        let Ok(i) = self.check_index(index) else {
            return;
        };
        if std::mem::take(&mut self.slots[i]).is_ready() {
            tracing::debug!(slot = i, "Decoder slot released");
        }
    }

    /// Tear down every slot, then initialize `[0, count)`.
    ///
    /// `count` is clamped to the capacity. The first failure stops the loop:
    /// slots before it stay `Ready`, the failing slot and the rest are `Empty`.
    pub fn reinit_all(&mut self, factory: &dyn EngineFactory, count: i32) -> Result<()> {
        self.clear();

        let count = usize::try_from(count).unwrap_or(0).min(self.capacity());
        for i in 0..count {
            // i < capacity <= MAX_DECODER_SLOTS, so the cast is lossless
            self.init_slot(factory, i as i32)?;
        }

        tracing::info!(count, backend = factory.name(), "Decoder pool initialized");
        Ok(())
    }

    /// Tear down every slot
    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            *slot = Slot::Empty;
        }
    }

    /// Borrow the engine at `index` for a decode call
    pub fn engine_mut(&mut self, index: i32) -> Result<&mut dyn DecodeEngine> {
        let i = self.check_index(index)?;
        match &mut self.slots[i] {
            Slot::Ready(engine) => Ok(engine.as_mut()),
            Slot::Empty => Err(Error::SlotEmpty(i)),
        }
    }
}

impl std::fmt::Debug for DecoderSlotTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DecoderSlotTable")
            .field("capacity", &self.capacity())
            .field("ready", &self.ready_count())
            .finish()
    }
}
