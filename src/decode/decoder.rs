//! Compressed-track decoder using symphonia
//!
//! Opens one media file, selects its first audio track, and yields decoded
//! PCM chunks packet by packet. Output is interleaved signed 16-bit
//! little-endian bytes, one chunk per compressed packet.

use crate::decode::PcmChunk;
use crate::error::{Error, Result};
use std::path::{Path, PathBuf};
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::{FormatOptions, FormatReader};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tracing::debug;

/// Audio track parameters discovered at open time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackFormat {
    pub sample_rate: u32,
    pub channels: u16,
}

/// Streaming decoder for one audio track.
///
/// Owns the demuxer and the codec instance; `next_chunk` advances one
/// compressed packet at a time so the caller controls pacing.
pub struct TrackDecoder {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    track_format: TrackFormat,
    sample_buf: Option<SampleBuffer<i16>>,
    path: PathBuf,
    finished: bool,
}

impl TrackDecoder {
    /// Open a media file and select its first audio track.
    ///
    /// # Errors
    /// - `FileRead` if the file cannot be opened
    /// - `UnsupportedMedia` if the container cannot be probed, no audio
    ///   track exists, or no decoder is available for its codec
    pub fn open(path: &Path) -> Result<Self> {
        debug!("Opening media source: {}", path.display());

        let file = std::fs::File::open(path).map_err(|e| Error::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        // Hint the probe with the file extension
        let mut hint = Hint::new();
        if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(ext);
        }

        let probed = symphonia::default::get_probe()
            .format(
                &hint,
                mss,
                &FormatOptions::default(),
                &MetadataOptions::default(),
            )
            .map_err(|e| {
                Error::UnsupportedMedia(format!("{}: probe failed: {}", path.display(), e))
            })?;

        let format = probed.format;

        // First audio-typed track wins
        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| {
                Error::UnsupportedMedia(format!("{}: no audio track found", path.display()))
            })?;

        let track_id = track.id;
        let codec_params = track.codec_params.clone();

        let sample_rate = codec_params.sample_rate.ok_or_else(|| {
            Error::UnsupportedMedia(format!("{}: sample rate not declared", path.display()))
        })?;
        let channels = codec_params
            .channels
            .map(|c| c.count() as u16)
            .ok_or_else(|| {
                Error::UnsupportedMedia(format!("{}: channel count not declared", path.display()))
            })?;

        let decoder = symphonia::default::get_codecs()
            .make(&codec_params, &DecoderOptions::default())
            .map_err(|e| {
                Error::UnsupportedMedia(format!(
                    "{}: no decoder for codec: {}",
                    path.display(),
                    e
                ))
            })?;

        debug!(
            "Audio track selected: {} ({}Hz, {} channels)",
            path.display(),
            sample_rate,
            channels
        );

        Ok(Self {
            format,
            decoder,
            track_id,
            track_format: TrackFormat {
                sample_rate,
                channels,
            },
            sample_buf: None,
            path: path.to_path_buf(),
            finished: false,
        })
    }

    /// Sample rate and channel count of the selected track.
    pub fn track_format(&self) -> TrackFormat {
        self.track_format
    }

    /// Path of the source file (for logging).
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Decode the next packet, returning one PCM chunk.
    ///
    /// Returns `Ok(None)` once the source is fully consumed. A decode fault
    /// is returned as an error; a corrupt stream is not resumable mid-decode,
    /// so callers should treat it as end-of-stream for this track.
    pub fn next_chunk(&mut self) -> Result<Option<PcmChunk>> {
        if self.finished {
            return Ok(None);
        }

        loop {
            let packet = match self.format.next_packet() {
                Ok(packet) => packet,
                Err(symphonia::core::errors::Error::IoError(ref e))
                    if e.kind() == std::io::ErrorKind::UnexpectedEof =>
                {
                    debug!("{}: reached end of source", self.path.display());
                    self.finished = true;
                    return Ok(None);
                }
                Err(e) => {
                    self.finished = true;
                    return Err(Error::Decode(format!(
                        "{}: packet read failed: {}",
                        self.path.display(),
                        e
                    )));
                }
            };

            // Skip packets belonging to other tracks
            if packet.track_id() != self.track_id {
                continue;
            }

            let decoded = match self.decoder.decode(&packet) {
                Ok(decoded) => decoded,
                Err(e) => {
                    self.finished = true;
                    return Err(Error::Decode(format!(
                        "{}: decode failed: {}",
                        self.path.display(),
                        e
                    )));
                }
            };

            if decoded.frames() == 0 {
                continue;
            }

            // Lazily size the interleave buffer to the decoder's capacity
            if self.sample_buf.is_none() {
                let spec = *decoded.spec();
                let duration = decoded.capacity() as u64;
                self.sample_buf = Some(SampleBuffer::<i16>::new(duration, spec));
            }

            if let Some(buf) = self.sample_buf.as_mut() {
                buf.copy_interleaved_ref(decoded);

                let mut chunk = Vec::with_capacity(buf.samples().len() * 2);
                for sample in buf.samples() {
                    chunk.extend_from_slice(&sample.to_le_bytes());
                }
                return Ok(Some(chunk));
            }
        }
    }

    /// True once the source has been fully consumed or a decode fault ended
    /// the stream.
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}
