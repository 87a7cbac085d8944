//! Audio capture capability
//!
//! A `CaptureSource` grants a `CaptureStream` (the permission boundary), and
//! each spoken item records through one `CaptureSegment` scoped to that
//! utterance. Capture streams are not Send on every platform; run the
//! recording pipeline on a current-thread runtime.

pub mod recorder;
#[cfg(feature = "system-capture")]
pub mod system;

use async_trait::async_trait;
use thiserror::Error;

/// Audio format profile specifying sample rate and channel count
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AudioProfile {
    pub sample_rate: u32,
    pub channels: u16,
}

/// Profile artifacts are recorded at
pub const RECORDING_PROFILE: AudioProfile = AudioProfile {
    sample_rate: 16_000,
    channels: 1,
};

/// What the capture grant should include. Video is requested for host
/// compatibility and discarded immediately after the grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureRequest {
    pub audio: bool,
    pub video: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackKind {
    Audio,
    Video,
}

#[derive(Debug, Error)]
pub enum CaptureError {
    /// The user or host refused the capture grant. Terminal, not retryable.
    #[error("capture permission denied")]
    PermissionDenied,

    #[error("capture grant has no audio track")]
    NoAudioTrack,

    #[error("capture device error: {0}")]
    Device(String),

    #[error("recorder error: {0}")]
    Recorder(String),
}

#[async_trait(?Send)]
pub trait CaptureSource {
    /// Request a capture grant from the host. Denial is terminal for the run.
    async fn request(&self, request: CaptureRequest) -> Result<Box<dyn CaptureStream>, CaptureError>;
}

pub trait CaptureStream {
    /// Number of tracks still running
    fn active_tracks(&self) -> usize;

    /// Stop one track kind, leaving the others running
    fn stop_track(&mut self, kind: TrackKind);

    /// Start a recording segment bound to the stream's audio track
    fn begin_segment(&mut self) -> Result<Box<dyn CaptureSegment>, CaptureError>;

    /// Stop every remaining track, ending the grant
    fn release(&mut self);
}

#[async_trait(?Send)]
pub trait CaptureSegment {
    /// Stop the segment and return the assembled artifact payload
    async fn finish(self: Box<Self>) -> Result<Vec<u8>, CaptureError>;
}
