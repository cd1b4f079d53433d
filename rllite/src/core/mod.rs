//! Shared building blocks.

pub mod weights_slot;

pub use weights_slot::{weights_slot, SharedWeightsSlot, WeightsSlot};
