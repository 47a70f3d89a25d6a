//! Decode side of the pipeline: one symphonia-backed decoder per track,
//! feeding a bounded PCM chunk queue from a dedicated worker task.

pub mod channel;
pub mod decoder;
pub mod queue;

pub use channel::DecodeChannel;
pub use decoder::{TrackDecoder, TrackFormat};
pub use queue::ChunkQueue;

/// One unit of decoded PCM data: interleaved signed 16-bit little-endian
/// samples. Length is always an even number of bytes.
pub type PcmChunk = Vec<u8>;
