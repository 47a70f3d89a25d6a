//! Mix loop: drains both decode queues in lockstep into the output sink

use crate::decode::queue::ChunkQueue;
use crate::mix::blend::{apply_gain, blend_chunks};
use crate::mix::envelope::VolumeEnvelope;
use crate::output::OutputSink;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Consumes one chunk per iteration from each track, blends them under the
/// current envelope, and writes the result to the sink. Consumption is
/// lockstep: a slow decoder on either side paces the whole loop, which is
/// what keeps the two tracks sample-aligned.
pub struct MixEngine {
    vocal: Arc<ChunkQueue>,
    accomp: Arc<ChunkQueue>,
    sink: Box<dyn OutputSink>,
    envelope: VolumeEnvelope,
    vocal_active: Arc<AtomicBool>,
}

impl MixEngine {
    pub fn new(
        vocal: Arc<ChunkQueue>,
        accomp: Arc<ChunkQueue>,
        sink: Box<dyn OutputSink>,
        envelope: VolumeEnvelope,
        vocal_active: Arc<AtomicBool>,
    ) -> Self {
        Self {
            vocal,
            accomp,
            sink,
            envelope,
            vocal_active,
        }
    }

    /// Run until both tracks are exhausted or the sink fails, then stop
    /// the sink exactly once.
    pub async fn run(mut self) {
        debug!("mix loop started");
        let mut iterations = 0u64;

        loop {
            let vocal = self.vocal.take().await;
            let accomp = self.accomp.take().await;

            // One envelope step per iteration, regardless of which tracks
            // still have data, so a crossfade keeps progressing while a
            // lone track drains out
            let vocal_active = self.vocal_active.load(Ordering::Acquire);
            self.envelope.advance(vocal_active);

            let mixed = match (vocal, accomp) {
                (None, None) => break,
                (Some(v), Some(a)) => {
                    blend_chunks(&v, &a, self.envelope.vocal_gain(), self.envelope.accomp_gain())
                }
                (Some(v), None) => apply_gain(&v, self.envelope.vocal_gain()),
                (None, Some(a)) => apply_gain(&a, self.envelope.accomp_gain()),
            };

            if let Err(e) = self.sink.write(&mixed).await {
                error!("sink write failed, ending playback: {}", e);
                break;
            }
            iterations += 1;
        }

        info!("mix loop finished after {} iterations", iterations);
        if let Err(e) = self.sink.stop() {
            warn!("sink stop after mix loop failed: {}", e);
        }
    }
}
