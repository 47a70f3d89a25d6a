//! Karaoke dual-track playback engine
//!
//! Plays a song as two synchronized compressed tracks, one carrying the
//! original vocal mix and one the accompaniment. Each track is decoded on
//! its own worker into a bounded PCM queue; a mix loop drains both queues
//! in lockstep, blends them under a ramped per-track gain envelope, and
//! streams the result to an audio sink. Flipping the active track
//! crossfades between the two instead of cutting.
//!
//! Typical use:
//! ```no_run
//! # async fn demo() -> karaoke_engine::Result<()> {
//! use karaoke_engine::{EngineConfig, KaraokeSession};
//!
//! let session = KaraokeSession::new(
//!     EngineConfig::default(),
//!     "song_vocal.mp3",
//!     "song_accomp.mp3",
//! );
//! let ready = session.prepare()?;
//! ready.await.map_err(|_| {
//!     karaoke_engine::Error::InvalidState("prepare cancelled".into())
//! })??;
//! session.start()?;
//! session.set_active_track(true);
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod decode;
pub mod error;
pub mod mix;
pub mod output;
pub mod session;

pub use config::EngineConfig;
pub use error::{Error, Result};
pub use output::OutputSink;
pub use session::{KaraokeSession, SessionState};
