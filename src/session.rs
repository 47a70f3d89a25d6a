//! Karaoke session: lifecycle orchestration over decode, mix, and output
//!
//! One session plays one pair of tracks. The lifecycle is one-way:
//! prepare -> start -> (pause/resume)* -> stop -> release, with release
//! legal from any state. A stopped session can be prepared again; a
//! released one is finished for good.

use crate::config::EngineConfig;
use crate::decode::channel::DecodeChannel;
use crate::error::{Error, Result};
use crate::mix::{MixEngine, VolumeEnvelope};
use crate::output::{CpalSink, OutputSink};
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Preparing,
    Ready,
    Playing,
    Paused,
    Stopped,
    Released,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionState::Uninitialized => "uninitialized",
            SessionState::Preparing => "preparing",
            SessionState::Ready => "ready",
            SessionState::Playing => "playing",
            SessionState::Paused => "paused",
            SessionState::Stopped => "stopped",
            SessionState::Released => "released",
        };
        f.write_str(s)
    }
}

/// Builds the output sink once the track format is known at prepare time.
/// Tests substitute a capturing sink through this seam.
pub type SinkFactory =
    Arc<dyn Fn(u32, u16) -> Result<Box<dyn OutputSink>> + Send + Sync>;

struct Inner {
    state: SessionState,
    vocal: Option<Arc<DecodeChannel>>,
    accomp: Option<Arc<DecodeChannel>>,
    /// Held between prepare and start, then moved into the mix loop
    sink: Option<Box<dyn OutputSink>>,
    prepare_task: Option<JoinHandle<()>>,
    mix_task: Option<JoinHandle<()>>,
}

pub struct KaraokeSession {
    config: EngineConfig,
    vocal_path: PathBuf,
    accomp_path: PathBuf,
    /// True selects the vocal (original) track; false the accompaniment.
    /// Accompaniment is the default selection for a karaoke session.
    vocal_active: Arc<AtomicBool>,
    sink_factory: SinkFactory,
    inner: Arc<Mutex<Inner>>,
}

impl KaraokeSession {
    /// Session playing to the system audio device.
    pub fn new(
        config: EngineConfig,
        vocal_path: impl Into<PathBuf>,
        accomp_path: impl Into<PathBuf>,
    ) -> Self {
        let device = config.output_device.clone();
        let buffer_frames = config.sink_buffer_frames;
        let factory: SinkFactory = Arc::new(move |sample_rate, channels| {
            let sink = CpalSink::open(sample_rate, channels, device.clone(), buffer_frames)?;
            Ok(Box::new(sink) as Box<dyn OutputSink>)
        });
        Self::with_sink_factory(config, vocal_path, accomp_path, factory)
    }

    /// Session with a caller-provided sink, for tests and alternate
    /// outputs.
    pub fn with_sink_factory(
        config: EngineConfig,
        vocal_path: impl Into<PathBuf>,
        accomp_path: impl Into<PathBuf>,
        sink_factory: SinkFactory,
    ) -> Self {
        Self {
            config,
            vocal_path: vocal_path.into(),
            accomp_path: accomp_path.into(),
            vocal_active: Arc::new(AtomicBool::new(false)),
            sink_factory,
            inner: Arc::new(Mutex::new(Inner {
                state: SessionState::Uninitialized,
                vocal: None,
                accomp: None,
                sink: None,
                prepare_task: None,
                mix_task: None,
            })),
        }
    }

    pub fn state(&self) -> SessionState {
        self.inner.lock().unwrap().state
    }

    /// Select which track is heard. Takes effect over the next mix
    /// iterations as the gain ramp converges; callable in any state.
    pub fn set_active_track(&self, vocal: bool) {
        debug!(
            "active track -> {}",
            if vocal { "vocal" } else { "accompaniment" }
        );
        self.vocal_active.store(vocal, Ordering::Release);
    }

    pub fn vocal_active(&self) -> bool {
        self.vocal_active.load(Ordering::Acquire)
    }

    /// Open both tracks and the output sink in the background.
    ///
    /// Returns immediately with a receiver that resolves once the session
    /// is ready (or failed to prepare). Releasing the session cancels the
    /// notification; the receiver then yields a channel-closed error.
    ///
    /// # Errors
    /// - `InvalidArgument` if either path is empty
    /// - `InvalidState` unless the session is uninitialized or stopped
    pub fn prepare(&self) -> Result<oneshot::Receiver<Result<()>>> {
        if self.vocal_path.as_os_str().is_empty() || self.accomp_path.as_os_str().is_empty() {
            return Err(Error::InvalidArgument(
                "track paths must not be empty".to_string(),
            ));
        }

        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            SessionState::Uninitialized | SessionState::Stopped => {}
            state => {
                return Err(Error::InvalidState(format!(
                    "cannot prepare while {}",
                    state
                )));
            }
        }
        inner.state = SessionState::Preparing;
        // Re-prepare after stop starts from scratch
        inner.vocal = None;
        inner.accomp = None;
        inner.sink = None;
        inner.mix_task = None;

        let (done_tx, done_rx) = oneshot::channel();
        let task = tokio::spawn(prepare_task(
            Arc::clone(&self.inner),
            self.vocal_path.clone(),
            self.accomp_path.clone(),
            self.config.queue_capacity,
            Arc::clone(&self.sink_factory),
            done_tx,
        ));
        inner.prepare_task = Some(task);
        Ok(done_rx)
    }

    /// Begin playback. Requires a completed prepare.
    pub fn start(&self) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.state != SessionState::Ready {
            return Err(Error::InvalidState(format!(
                "cannot start while {}",
                inner.state
            )));
        }

        let vocal = inner
            .vocal
            .clone()
            .ok_or_else(|| Error::InvalidState("no vocal channel".to_string()))?;
        let accomp = inner
            .accomp
            .clone()
            .ok_or_else(|| Error::InvalidState("no accompaniment channel".to_string()))?;
        let mut sink = inner
            .sink
            .take()
            .ok_or_else(|| Error::InvalidState("no output sink".to_string()))?;

        if let Err(e) = sink.start() {
            inner.sink = Some(sink);
            return Err(e);
        }

        vocal.start();
        accomp.start();

        // Envelope begins settled on the current selection so playback
        // opens without a ramp
        let envelope =
            VolumeEnvelope::at_target(self.vocal_active(), self.config.ramp_step);
        let engine = MixEngine::new(
            vocal.queue(),
            accomp.queue(),
            sink,
            envelope,
            Arc::clone(&self.vocal_active),
        );
        inner.mix_task = Some(tokio::spawn(engine.run()));
        inner.state = SessionState::Playing;
        info!("playback started");
        Ok(())
    }

    /// Suspend decoding. Buffered audio keeps draining to the sink, so
    /// the pause lands after at most the queued chunks play out.
    pub fn pause(&self) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            SessionState::Playing => {
                if let Some(ch) = &inner.vocal {
                    ch.pause();
                }
                if let Some(ch) = &inner.accomp {
                    ch.pause();
                }
                inner.state = SessionState::Paused;
                info!("playback paused");
                Ok(())
            }
            SessionState::Paused => Ok(()),
            state => Err(Error::InvalidState(format!("cannot pause while {}", state))),
        }
    }

    /// Resume decoding after a pause.
    pub fn resume(&self) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            SessionState::Paused => {
                if let Some(ch) = &inner.vocal {
                    ch.resume();
                }
                if let Some(ch) = &inner.accomp {
                    ch.resume();
                }
                inner.state = SessionState::Playing;
                info!("playback resumed");
                Ok(())
            }
            SessionState::Playing => Ok(()),
            state => Err(Error::InvalidState(format!(
                "cannot resume while {}",
                state
            ))),
        }
    }

    /// End playback: both decode streams are closed and queued chunks are
    /// discarded, so the mix loop winds down within one iteration.
    /// Idempotent.
    pub fn stop(&self) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        match inner.state {
            SessionState::Playing | SessionState::Paused => {
                if let Some(ch) = &inner.vocal {
                    ch.stop();
                }
                if let Some(ch) = &inner.accomp {
                    ch.stop();
                }
                inner.state = SessionState::Stopped;
                info!("playback stopped");
                Ok(())
            }
            SessionState::Stopped => Ok(()),
            state => Err(Error::InvalidState(format!("cannot stop while {}", state))),
        }
    }

    /// Tear everything down. Legal from any state and idempotent; a
    /// prepare still in flight is cancelled, not awaited.
    pub fn release(&self) {
        let mut inner = self.inner.lock().unwrap();
        if inner.state == SessionState::Released {
            return;
        }
        info!("releasing session (was {})", inner.state);

        if let Some(task) = inner.prepare_task.take() {
            task.abort();
        }
        if let Some(ch) = inner.vocal.take() {
            ch.release();
        }
        if let Some(ch) = inner.accomp.take() {
            ch.release();
        }
        if let Some(task) = inner.mix_task.take() {
            // Dropping the mix task drops the sink with it
            task.abort();
        }
        inner.sink.take();
        inner.state = SessionState::Released;
    }
}

impl Drop for KaraokeSession {
    fn drop(&mut self) {
        self.release();
    }
}

/// Background half of prepare: open both channels, derive the output
/// format from the vocal track, build the sink, and flip to ready.
async fn prepare_task(
    shared: Arc<Mutex<Inner>>,
    vocal_path: PathBuf,
    accomp_path: PathBuf,
    capacity: usize,
    sink_factory: SinkFactory,
    done_tx: oneshot::Sender<Result<()>>,
) {
    let opened = tokio::task::spawn_blocking(move || {
        let vocal = DecodeChannel::open(&vocal_path, capacity, "vocal")?;
        let accomp = DecodeChannel::open(&accomp_path, capacity, "accompaniment")?;

        let vf = vocal.track_format();
        let af = accomp.track_format();
        if vf != af {
            warn!(
                "track formats differ: vocal {}Hz/{}ch, accompaniment {}Hz/{}ch",
                vf.sample_rate, vf.channels, af.sample_rate, af.channels
            );
        }

        // Output format follows the vocal track
        let sink = sink_factory(vf.sample_rate, vf.channels)?;
        Ok::<_, Error>((vocal, accomp, sink))
    })
    .await;

    let result = match opened {
        Ok(result) => result,
        Err(_) => Err(Error::InvalidState("prepare task failed".to_string())),
    };

    match result {
        Ok((vocal, accomp, sink)) => {
            let mut inner = shared.lock().unwrap();
            if inner.state != SessionState::Preparing {
                // Released (or otherwise moved on) while we were opening
                return;
            }
            inner.vocal = Some(Arc::new(vocal));
            inner.accomp = Some(Arc::new(accomp));
            inner.sink = Some(sink);
            inner.state = SessionState::Ready;
            drop(inner);
            let _ = done_tx.send(Ok(()));
        }
        Err(e) => {
            let mut inner = shared.lock().unwrap();
            if inner.state == SessionState::Preparing {
                inner.state = SessionState::Uninitialized;
            }
            drop(inner);
            let _ = done_tx.send(Err(e));
        }
    }
}
