//! Mix loop behavior with hand-fed queues and a capturing sink

mod common;

use common::CaptureSink;
use karaoke_engine::decode::ChunkQueue;
use karaoke_engine::mix::{MixEngine, VolumeEnvelope};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

fn pcm(samples: &[i16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_le_bytes()).collect()
}

fn samples(buf: &[u8]) -> Vec<i16> {
    buf.chunks_exact(2)
        .map(|p| i16::from_le_bytes([p[0], p[1]]))
        .collect()
}

struct Fixture {
    vocal: Arc<ChunkQueue>,
    accomp: Arc<ChunkQueue>,
    vocal_active: Arc<AtomicBool>,
}

fn engine_with(
    envelope: VolumeEnvelope,
    vocal_active: bool,
) -> (Fixture, MixEngine, common::CaptureHandle) {
    let vocal = Arc::new(ChunkQueue::new(16));
    let accomp = Arc::new(ChunkQueue::new(16));
    let active = Arc::new(AtomicBool::new(vocal_active));
    let (sink, handle) = CaptureSink::new();
    let engine = MixEngine::new(
        Arc::clone(&vocal),
        Arc::clone(&accomp),
        Box::new(sink),
        envelope,
        Arc::clone(&active),
    );
    (
        Fixture {
            vocal,
            accomp,
            vocal_active: active,
        },
        engine,
        handle,
    )
}

#[tokio::test]
async fn test_blends_both_tracks_and_stops_sink_once() {
    let (fx, engine, handle) = engine_with(VolumeEnvelope::at_target(true, 2), true);

    assert!(fx.vocal.push(pcm(&[100, 200])).await);
    assert!(fx.vocal.push(pcm(&[300, 400])).await);
    assert!(fx.accomp.push(pcm(&[10, 20])).await);
    assert!(fx.accomp.push(pcm(&[30, 40])).await);
    fx.vocal.finish();
    fx.accomp.finish();

    engine.run().await;

    // Vocal at 100%, accompaniment at 0%: output is the vocal track
    let chunks = handle.chunks();
    assert_eq!(chunks.len(), 2);
    assert_eq!(samples(&chunks[0]), vec![100, 200]);
    assert_eq!(samples(&chunks[1]), vec![300, 400]);
    assert_eq!(handle.stops(), 1);
}

#[tokio::test]
async fn test_uneven_track_lengths_drain_the_longer_alone() {
    let (fx, engine, handle) = engine_with(VolumeEnvelope::at_target(true, 2), true);

    assert!(fx.vocal.push(pcm(&[1, 2])).await);
    assert!(fx.vocal.push(pcm(&[3, 4])).await);
    assert!(fx.vocal.push(pcm(&[5, 6])).await);
    assert!(fx.accomp.push(pcm(&[100, 100])).await);
    fx.vocal.finish();
    fx.accomp.finish();

    engine.run().await;

    // Third iteration sees only the vocal side; it passes through at its
    // own gain rather than ending playback early
    let chunks = handle.chunks();
    assert_eq!(chunks.len(), 3);
    assert_eq!(samples(&chunks[0]), vec![1, 2]);
    assert_eq!(samples(&chunks[1]), vec![3, 4]);
    assert_eq!(samples(&chunks[2]), vec![5, 6]);
}

#[tokio::test]
async fn test_crossfade_ramps_gains_per_iteration() {
    // Envelope settled on vocal, but the selection says accompaniment:
    // each iteration moves both gains one 50-point step
    let (fx, engine, handle) = engine_with(VolumeEnvelope::at_target(true, 50), false);

    for _ in 0..3 {
        assert!(fx.vocal.push(pcm(&[1000])).await);
        assert!(fx.accomp.push(pcm(&[2000])).await);
    }
    fx.vocal.finish();
    fx.accomp.finish();

    engine.run().await;

    let chunks = handle.chunks();
    assert_eq!(chunks.len(), 3);
    // Iteration 1: vocal 50%, accomp 50%
    assert_eq!(samples(&chunks[0]), vec![500 + 1000]);
    // Iteration 2 onward: vocal 0%, accomp 100%
    assert_eq!(samples(&chunks[1]), vec![2000]);
    assert_eq!(samples(&chunks[2]), vec![2000]);
}

#[tokio::test]
async fn test_empty_streams_produce_no_output_but_stop_the_sink() {
    let (fx, engine, handle) = engine_with(VolumeEnvelope::at_target(false, 2), false);

    fx.vocal.finish();
    fx.accomp.finish();

    engine.run().await;

    assert!(handle.chunks().is_empty());
    assert_eq!(handle.stops(), 1);
}

#[tokio::test]
async fn test_switch_mid_playback_takes_effect_on_later_chunks() {
    let (fx, engine, handle) = engine_with(VolumeEnvelope::at_target(false, 100), false);

    for _ in 0..4 {
        assert!(fx.vocal.push(pcm(&[1000])).await);
        assert!(fx.accomp.push(pcm(&[300])).await);
    }
    fx.vocal.finish();
    fx.accomp.finish();

    // Flip before the loop runs; with a full-size step the very first
    // iteration lands on the new targets
    fx.vocal_active.store(true, std::sync::atomic::Ordering::SeqCst);
    engine.run().await;

    let chunks = handle.chunks();
    assert_eq!(chunks.len(), 4);
    for chunk in &chunks {
        assert_eq!(samples(chunk), vec![1000]);
    }
}
