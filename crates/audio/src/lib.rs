//! Audio plane for the voice session
//!
//! Two halves:
//! - [`capture`]: a worker on the capture side that converts float sample
//!   blocks to PCM16 frames and posts them toward the session.
//! - [`playback`]: a scheduler that turns arbitrarily-sized inbound PCM16
//!   chunks into a gapless playback timeline and supports barge-in
//!   cancellation.

pub mod capture;
pub mod playback;

pub use capture::{CaptureControl, CaptureHandle, CaptureStatus, CaptureWorker};
pub use playback::{PlaybackScheduler, SinkCommand};
