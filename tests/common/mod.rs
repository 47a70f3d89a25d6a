//! Shared test fixtures: WAV generation and a capturing output sink
#![allow(dead_code)]

use futures::future::BoxFuture;
use karaoke_engine::{OutputSink, Result};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Write a 16-bit mono PCM WAV with the given samples.
pub fn write_wav(path: &Path, samples: &[i16], sample_rate: u32) {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec).unwrap();
    for &s in samples {
        writer.write_sample(s).unwrap();
    }
    writer.finalize().unwrap();
}

/// WAV fixture in a temp dir; returns (dir guard, file path).
pub fn wav_fixture(name: &str, samples: &[i16]) -> (tempfile::TempDir, PathBuf) {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(name);
    write_wav(&path, samples, 44100);
    (dir, path)
}

/// Observable state of a `CaptureSink`, shared with the test body after
/// the sink itself moves into the mix loop.
#[derive(Clone, Default)]
pub struct CaptureHandle {
    pub written: Arc<Mutex<Vec<Vec<u8>>>>,
    pub stop_count: Arc<AtomicUsize>,
    pub started: Arc<AtomicBool>,
    pub released: Arc<AtomicBool>,
}

impl CaptureHandle {
    pub fn chunks(&self) -> Vec<Vec<u8>> {
        self.written.lock().unwrap().clone()
    }

    pub fn all_samples(&self) -> Vec<i16> {
        self.written
            .lock()
            .unwrap()
            .iter()
            .flatten()
            .copied()
            .collect::<Vec<u8>>()
            .chunks_exact(2)
            .map(|p| i16::from_le_bytes([p[0], p[1]]))
            .collect()
    }

    pub fn stops(&self) -> usize {
        self.stop_count.load(Ordering::SeqCst)
    }
}

/// Records everything written to it instead of playing audio.
pub struct CaptureSink {
    handle: CaptureHandle,
}

impl CaptureSink {
    pub fn new() -> (Self, CaptureHandle) {
        let handle = CaptureHandle::default();
        (
            Self {
                handle: handle.clone(),
            },
            handle,
        )
    }
}

impl OutputSink for CaptureSink {
    fn start(&mut self) -> Result<()> {
        self.handle.started.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn write<'a>(&'a mut self, pcm: &'a [u8]) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.handle.written.lock().unwrap().push(pcm.to_vec());
            Ok(())
        })
    }

    fn stop(&mut self) -> Result<()> {
        self.handle.stop_count.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn release(&mut self) {
        self.handle.released.store(true, Ordering::SeqCst);
    }
}

/// Poll until `cond` holds or the timeout elapses; panics on timeout.
pub async fn wait_for(what: &str, mut cond: impl FnMut() -> bool) {
    let deadline = std::time::Instant::now() + std::time::Duration::from_secs(5);
    while !cond() {
        if std::time::Instant::now() > deadline {
            panic!("timed out waiting for {}", what);
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
}
