//! Decode channel: one compressed track, one worker, one bounded queue
//!
//! Owns a `TrackDecoder` and a `ChunkQueue`; `start` spawns a worker task
//! that pulls packets, decodes them, and pushes PCM chunks into the queue.
//! The queue's capacity is the backpressure mechanism coupling decode speed
//! to consumption speed.
//!
//! Pause is a cooperative flag checked between decode iterations, so a
//! paused channel never holds the queue hostage: chunks already buffered or
//! in flight stay takeable. Stop ends the stream immediately by closing the
//! queue, which also releases a worker parked on a full queue.

use crate::decode::decoder::{TrackDecoder, TrackFormat};
use crate::decode::queue::ChunkQueue;
use crate::decode::PcmChunk;
use crate::error::{Error, Result};
use std::io::Write;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

pub struct DecodeChannel {
    label: String,
    queue: Arc<ChunkQueue>,
    track_format: TrackFormat,

    /// Decoder held until `start` hands it to the worker
    decoder: Mutex<Option<TrackDecoder>>,

    /// Cooperative pause flag observed by the worker between iterations
    pause_tx: watch::Sender<bool>,

    /// Stop flag observed by the worker at each iteration
    stop_flag: Arc<AtomicBool>,

    started: AtomicBool,
    released: AtomicBool,
    worker: Mutex<Option<JoinHandle<()>>>,

    /// Raw PCM tap for debugging: every produced chunk is appended here
    pcm_dump: Mutex<Option<std::fs::File>>,
}

impl DecodeChannel {
    /// Open a source file and configure the channel for it.
    ///
    /// Selects the first audio-typed track. Must succeed before `start`.
    ///
    /// # Errors
    /// - `FileRead` if the source cannot be opened
    /// - `UnsupportedMedia` if no audio track is found or its codec has no
    ///   decoder
    pub fn open(path: &Path, queue_capacity: usize, label: impl Into<String>) -> Result<Self> {
        let label = label.into();
        let decoder = TrackDecoder::open(path)?;
        let track_format = decoder.track_format();

        info!(
            "[{}] channel configured: {} ({}Hz, {} channels)",
            label,
            path.display(),
            track_format.sample_rate,
            track_format.channels
        );

        let (pause_tx, _) = watch::channel(false);

        Ok(Self {
            label,
            queue: Arc::new(ChunkQueue::new(queue_capacity)),
            track_format,
            decoder: Mutex::new(Some(decoder)),
            pause_tx,
            stop_flag: Arc::new(AtomicBool::new(false)),
            started: AtomicBool::new(false),
            released: AtomicBool::new(false),
            worker: Mutex::new(None),
            pcm_dump: Mutex::new(None),
        })
    }

    /// Sample rate and channel count of the configured track.
    pub fn track_format(&self) -> TrackFormat {
        self.track_format
    }

    /// Write every decoded chunk to a raw PCM file as well (debug tap).
    /// Must be called before `start` to take effect.
    pub fn set_pcm_dump(&self, path: &Path) -> Result<()> {
        let file = std::fs::File::create(path).map_err(|e| Error::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        *self.pcm_dump.lock().unwrap() = Some(file);
        Ok(())
    }

    /// Start the decode worker. Idempotent: a second call is a no-op.
    pub fn start(&self) {
        if self.started.swap(true, Ordering::AcqRel) {
            debug!("[{}] start ignored: already started", self.label);
            return;
        }

        let decoder = match self.decoder.lock().unwrap().take() {
            Some(decoder) => decoder,
            None => {
                warn!("[{}] start ignored: decoder already released", self.label);
                return;
            }
        };
        let dump = self.pcm_dump.lock().unwrap().take();

        let queue = Arc::clone(&self.queue);
        let stop_flag = Arc::clone(&self.stop_flag);
        let pause_rx = self.pause_tx.subscribe();
        let label = self.label.clone();

        let handle = tokio::spawn(async move {
            run_worker(decoder, queue, pause_rx, stop_flag, dump, label).await;
        });
        *self.worker.lock().unwrap() = Some(handle);
    }

    /// Suspend the decode worker without discarding queued or in-flight
    /// chunks. The queue keeps draining through `take_chunk`.
    pub fn pause(&self) {
        debug!("[{}] pause", self.label);
        // send_replace updates the flag even while no worker subscribes
        // yet, so a pause issued before start still takes effect
        self.pause_tx.send_replace(true);
    }

    /// Resume a paused worker.
    pub fn resume(&self) {
        debug!("[{}] resume", self.label);
        self.pause_tx.send_replace(false);
    }

    /// Signal end-of-stream immediately: the worker stops pulling encoded
    /// data at its next opportunity and the queue is cleared, releasing
    /// anyone parked on it. Safe to call repeatedly.
    pub fn stop(&self) {
        debug!("[{}] stop", self.label);
        self.stop_flag.store(true, Ordering::Release);
        // Wake a worker parked in the pause loop so it can observe the flag
        self.pause_tx.send_replace(false);
        self.queue.close();
    }

    /// Take the next decoded chunk, waiting while none is available.
    /// Returns None only at definitive completion: end-of-stream with the
    /// queue drained.
    pub async fn take_chunk(&self) -> Option<PcmChunk> {
        self.queue.take().await
    }

    /// True once the source is fully consumed and propagated to the queue,
    /// or `stop` was called. Chunks may still be queued for draining.
    pub fn is_end_of_stream(&self) -> bool {
        self.queue.is_end_of_stream()
    }

    /// Number of chunks currently buffered.
    pub fn queued_chunks(&self) -> usize {
        self.queue.len()
    }

    /// Handle to the channel's queue (consumer side for the mix loop).
    pub fn queue(&self) -> Arc<ChunkQueue> {
        Arc::clone(&self.queue)
    }

    /// Release the decoder and source handle. Irreversible; subsequent
    /// calls are no-ops.
    pub fn release(&self) {
        if self.released.swap(true, Ordering::AcqRel) {
            return;
        }
        info!("[{}] releasing channel", self.label);
        self.stop();
        if let Some(handle) = self.worker.lock().unwrap().take() {
            handle.abort();
        }
        self.decoder.lock().unwrap().take();
    }
}

impl Drop for DecodeChannel {
    fn drop(&mut self) {
        self.release();
    }
}

/// Worker loop: read packet, decode, push. Runs until the source is
/// exhausted, a decode fault occurs, or stop is requested.
async fn run_worker(
    mut decoder: TrackDecoder,
    queue: Arc<ChunkQueue>,
    mut pause_rx: watch::Receiver<bool>,
    stop_flag: Arc<AtomicBool>,
    mut dump: Option<std::fs::File>,
    label: String,
) {
    debug!("[{}] decode worker started", label);
    let mut chunks = 0u64;

    'decode: loop {
        if stop_flag.load(Ordering::Acquire) {
            break;
        }

        // Cooperative pause: park between iterations, never mid-push
        while *pause_rx.borrow() {
            if pause_rx.changed().await.is_err() {
                break 'decode;
            }
            if stop_flag.load(Ordering::Acquire) {
                break 'decode;
            }
        }

        match decoder.next_chunk() {
            Ok(Some(chunk)) => {
                if let Some(file) = dump.as_mut() {
                    if let Err(e) = file.write_all(&chunk) {
                        warn!("[{}] PCM dump write failed, disabling tap: {}", label, e);
                        dump = None;
                    }
                }
                chunks += 1;
                // May park here when the queue is full: intentional
                // backpressure coupling decode speed to playback speed
                if !queue.push(chunk).await {
                    break;
                }
            }
            Ok(None) => {
                info!("[{}] decoding complete after {} chunks", label, chunks);
                break;
            }
            Err(e) => {
                // Not resumable mid-stream: end this channel's stream and
                // let the mix loop degrade to the other track
                warn!("[{}] decode fault, ending stream: {}", label, e);
                break;
            }
        }
    }

    queue.finish();
    debug!("[{}] decode worker exited", label);
}
