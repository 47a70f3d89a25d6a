//! Mixing: per-sample blend of two PCM streams with ramped gains

pub mod blend;
pub mod engine;
pub mod envelope;

pub use blend::{apply_gain, blend_chunks};
pub use engine::MixEngine;
pub use envelope::VolumeEnvelope;
