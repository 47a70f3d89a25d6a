//! Output sinks: where mixed PCM goes
//!
//! The mix loop writes through the `OutputSink` trait so the audio device
//! can be swapped for a capturing sink in tests. `write` is async because
//! the real sink applies backpressure when the device buffer is full.

pub mod cpal_sink;

pub use cpal_sink::CpalSink;

use crate::error::Result;
use futures::future::BoxFuture;

/// Destination for mixed 16-bit little-endian PCM.
///
/// Lifecycle: `start` begins consumption, `stop` halts it (writes made
/// while stopped are discarded), `release` frees the device. `stop` and
/// `release` are safe to call more than once.
pub trait OutputSink: Send {
    /// Begin consuming written PCM.
    fn start(&mut self) -> Result<()>;

    /// Queue a chunk of mixed PCM, waiting while the sink is full.
    /// Chunks written while the sink is not started are dropped silently.
    fn write<'a>(&'a mut self, pcm: &'a [u8]) -> BoxFuture<'a, Result<()>>;

    /// Halt consumption and discard anything not yet played.
    fn stop(&mut self) -> Result<()>;

    /// Free the underlying device. The sink is unusable afterwards.
    fn release(&mut self);
}
