//! Audio device sink using cpal
//!
//! The cpal `Stream` is not `Send`, so a dedicated thread owns it for the
//! sink's whole lifetime and takes commands over a channel. PCM travels
//! from `write` to the audio callback through a lock-free SPSC ring
//! buffer; the callback fills with silence on underrun and never blocks.

use crate::error::{Error, Result};
use crate::output::OutputSink;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, SampleFormat, SampleRate, Stream, StreamConfig};
use futures::future::BoxFuture;
use ringbuf::{traits::*, HeapRb};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use tokio::sync::Notify;
use tracing::{debug, error, info, warn};

enum SinkCommand {
    Start(mpsc::Sender<Result<()>>),
    Stop,
    Release,
}

/// Plays mixed PCM on an audio output device.
///
/// Writes are dropped while the sink is not started, matching a device
/// that only consumes in the playing state. `stop` pauses the stream and
/// abandons buffered samples; they are discarded when the device is
/// released rather than played out.
pub struct CpalSink {
    producer: ringbuf::HeapProd<i16>,
    space: Arc<Notify>,
    playing: Arc<AtomicBool>,
    /// Set by the stream error callback; surfaced on the next write
    stream_error: Arc<AtomicBool>,
    cmd_tx: mpsc::Sender<SinkCommand>,
    audio_thread: Option<std::thread::JoinHandle<()>>,
}

impl CpalSink {
    /// Open the output device and build a stream matching the track
    /// format. Fails if no device config supports the requested sample
    /// rate and channel count.
    ///
    /// `buffer_frames` sizes the ring buffer between the mix loop and the
    /// audio callback; larger values tolerate more scheduling jitter at
    /// the cost of latency.
    pub fn open(
        sample_rate: u32,
        channels: u16,
        device_name: Option<String>,
        buffer_frames: usize,
    ) -> Result<Self> {
        let ring = HeapRb::<i16>::new(buffer_frames.max(1) * usize::from(channels.max(1)));
        let (producer, consumer) = ring.split();

        let space = Arc::new(Notify::new());
        let playing = Arc::new(AtomicBool::new(false));
        let stream_error = Arc::new(AtomicBool::new(false));

        let (cmd_tx, cmd_rx) = mpsc::channel();
        let (ready_tx, ready_rx) = mpsc::channel();

        let thread_space = Arc::clone(&space);
        let thread_error = Arc::clone(&stream_error);
        let audio_thread = std::thread::Builder::new()
            .name("audio-sink".into())
            .spawn(move || {
                audio_thread_main(
                    sample_rate,
                    channels,
                    device_name,
                    consumer,
                    thread_space,
                    thread_error,
                    cmd_rx,
                    ready_tx,
                );
            })
            .map_err(|e| Error::AudioOutput(format!("Failed to spawn audio thread: {}", e)))?;

        // Construction handshake: the thread reports whether the device
        // and stream opened successfully
        ready_rx
            .recv()
            .map_err(|_| Error::AudioOutput("Audio thread exited during setup".to_string()))??;

        Ok(Self {
            producer,
            space,
            playing,
            stream_error,
            cmd_tx,
            audio_thread: Some(audio_thread),
        })
    }
}

impl OutputSink for CpalSink {
    fn start(&mut self) -> Result<()> {
        let (reply_tx, reply_rx) = mpsc::channel();
        self.cmd_tx
            .send(SinkCommand::Start(reply_tx))
            .map_err(|_| Error::AudioOutput("Audio thread is gone".to_string()))?;
        reply_rx
            .recv()
            .map_err(|_| Error::AudioOutput("Audio thread is gone".to_string()))??;
        self.playing.store(true, Ordering::Release);
        Ok(())
    }

    fn write<'a>(&'a mut self, pcm: &'a [u8]) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            if self.stream_error.load(Ordering::Acquire) {
                return Err(Error::AudioOutput("Audio stream failed".to_string()));
            }
            if !self.playing.load(Ordering::Acquire) {
                return Ok(());
            }

            let samples: Vec<i16> = pcm
                .chunks_exact(2)
                .map(|p| i16::from_le_bytes([p[0], p[1]]))
                .collect();

            let mut written = 0;
            while written < samples.len() {
                written += self.producer.push_slice(&samples[written..]);
                if written < samples.len() {
                    if self.stream_error.load(Ordering::Acquire) {
                        return Err(Error::AudioOutput("Audio stream failed".to_string()));
                    }
                    if !self.playing.load(Ordering::Acquire) {
                        return Ok(());
                    }
                    // Callback frees space and notifies once per buffer
                    self.space.notified().await;
                }
            }
            Ok(())
        })
    }

    fn stop(&mut self) -> Result<()> {
        if !self.playing.swap(false, Ordering::AcqRel) {
            return Ok(());
        }
        debug!("stopping audio sink");
        self.cmd_tx
            .send(SinkCommand::Stop)
            .map_err(|_| Error::AudioOutput("Audio thread is gone".to_string()))
    }

    fn release(&mut self) {
        self.playing.store(false, Ordering::Release);
        if let Some(handle) = self.audio_thread.take() {
            let _ = self.cmd_tx.send(SinkCommand::Release);
            if handle.join().is_err() {
                warn!("audio thread panicked during release");
            }
        }
    }
}

impl Drop for CpalSink {
    fn drop(&mut self) {
        self.release();
    }
}

/// Owns the cpal stream. Builds it paused, then serves commands until
/// released or the handle side is dropped.
#[allow(clippy::too_many_arguments)]
fn audio_thread_main(
    sample_rate: u32,
    channels: u16,
    device_name: Option<String>,
    consumer: ringbuf::HeapCons<i16>,
    space: Arc<Notify>,
    stream_error: Arc<AtomicBool>,
    cmd_rx: mpsc::Receiver<SinkCommand>,
    ready_tx: mpsc::Sender<Result<()>>,
) {
    let stream = match build_stream(sample_rate, channels, device_name, consumer, space, stream_error)
    {
        Ok(stream) => {
            let _ = ready_tx.send(Ok(()));
            stream
        }
        Err(e) => {
            let _ = ready_tx.send(Err(e));
            return;
        }
    };

    loop {
        match cmd_rx.recv() {
            Ok(SinkCommand::Start(reply)) => {
                let result = stream
                    .play()
                    .map_err(|e| Error::AudioOutput(format!("Failed to start stream: {}", e)));
                let _ = reply.send(result);
            }
            Ok(SinkCommand::Stop) => {
                if let Err(e) = stream.pause() {
                    warn!("Failed to pause stream on stop: {}", e);
                }
            }
            Ok(SinkCommand::Release) | Err(_) => break,
        }
    }

    debug!("audio thread exiting");
    drop(stream);
}

fn build_stream(
    sample_rate: u32,
    channels: u16,
    device_name: Option<String>,
    mut consumer: ringbuf::HeapCons<i16>,
    space: Arc<Notify>,
    stream_error: Arc<AtomicBool>,
) -> Result<Stream> {
    let device = open_device(device_name)?;
    let (config, sample_format) = find_config(&device, sample_rate, channels)?;

    debug!(
        "Audio config: sample_rate={}, channels={}, format={:?}",
        config.sample_rate.0, config.channels, sample_format
    );

    let err_flag = Arc::clone(&stream_error);
    let err_space = Arc::clone(&space);
    let error_callback = move |err| {
        error!("Audio stream error: {}", err);
        err_flag.store(true, Ordering::SeqCst);
        // A fatal error ends data callbacks, so wake any writer parked on
        // ring space to let it observe the failure
        err_space.notify_one();
    };

    let stream = match sample_format {
        SampleFormat::I16 => device
            .build_output_stream(
                &config,
                move |data: &mut [i16], _: &cpal::OutputCallbackInfo| {
                    let filled = consumer.pop_slice(data);
                    for slot in &mut data[filled..] {
                        *slot = 0;
                    }
                    space.notify_one();
                },
                error_callback,
                None,
            )
            .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))?,
        SampleFormat::F32 => device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    for slot in data.iter_mut() {
                        *slot = match consumer.try_pop() {
                            Some(sample) => f32::from(sample) / 32768.0,
                            None => 0.0,
                        };
                    }
                    space.notify_one();
                },
                error_callback,
                None,
            )
            .map_err(|e| Error::AudioOutput(format!("Failed to build stream: {}", e)))?,
        other => {
            return Err(Error::AudioOutput(format!(
                "Unsupported sample format: {:?}",
                other
            )));
        }
    };

    // Built paused; playback begins on the Start command
    if let Err(e) = stream.pause() {
        warn!("Could not pause freshly built stream: {}", e);
    }
    Ok(stream)
}

fn open_device(device_name: Option<String>) -> Result<Device> {
    let host = cpal::default_host();

    if let Some(name) = device_name {
        let mut devices = host
            .output_devices()
            .map_err(|e| Error::AudioOutput(format!("Failed to enumerate devices: {}", e)))?;

        if let Some(device) = devices.find(|d| d.name().ok().as_deref() == Some(name.as_str())) {
            info!("Using requested audio device: {}", name);
            return Ok(device);
        }
        warn!("Requested device '{}' not found, falling back to default", name);
    }

    let device = host
        .default_output_device()
        .ok_or_else(|| Error::AudioOutput("No default output device found".to_string()))?;
    info!(
        "Using default audio device: {}",
        device.name().unwrap_or_else(|_| "Unknown".to_string())
    );
    Ok(device)
}

/// Find a device config carrying the track's exact rate and channel
/// count. Resampling is out of scope, so a device that cannot do the
/// native rate is an error rather than a pitch shift.
fn find_config(
    device: &Device,
    sample_rate: u32,
    channels: u16,
) -> Result<(StreamConfig, SampleFormat)> {
    let configs = device
        .supported_output_configs()
        .map_err(|e| Error::AudioOutput(format!("Failed to get device configs: {}", e)))?;

    let mut fallback = None;
    for supported in configs {
        if supported.channels() != channels
            || supported.min_sample_rate().0 > sample_rate
            || supported.max_sample_rate().0 < sample_rate
        {
            continue;
        }
        match supported.sample_format() {
            // Native i16 avoids per-sample conversion in the callback
            SampleFormat::I16 => {
                let config = supported.with_sample_rate(SampleRate(sample_rate)).config();
                return Ok((config, SampleFormat::I16));
            }
            SampleFormat::F32 if fallback.is_none() => {
                fallback = Some(supported.with_sample_rate(SampleRate(sample_rate)));
            }
            _ => {}
        }
    }

    if let Some(supported) = fallback {
        let sample_format = supported.sample_format();
        return Ok((supported.config(), sample_format));
    }

    Err(Error::AudioOutput(format!(
        "No device config supports {}Hz {}-channel output",
        sample_rate, channels
    )))
}
