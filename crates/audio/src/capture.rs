//! Capture-side conversion worker
//!
//! The worker stands in for the audio-rendering thread: it owns an inbox
//! of float sample blocks, converts each block to PCM16 and posts the
//! frame onward. It shares no memory with the rest of the session; all
//! communication is one-way message passing.

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use podium_core::pcm16_from_f32;

/// Messages accepted by the capture worker
#[derive(Debug)]
pub enum CaptureControl {
    /// One rendered block of float samples in [-1.0, 1.0]
    Block(Vec<f32>),
    /// Stop capturing; the worker returns a terminal status
    Stop,
}

/// Terminal status returned by the worker's run loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureStatus {
    /// Stop was requested (or the capture device went away)
    Stopped,
    /// The frame consumer went away first
    ConsumerGone,
}

/// Handle owned by the capture device layer.
///
/// Posting never blocks the caller: if the inbox is full the block is
/// dropped with a warning. Frames are small and frequent, so dropped
/// blocks degrade quality briefly rather than breaking the session.
#[derive(Clone)]
pub struct CaptureHandle {
    tx: mpsc::Sender<CaptureControl>,
}

impl CaptureHandle {
    /// Post one block of captured samples. Ownership moves to the worker.
    pub fn post_block(&self, samples: Vec<f32>) {
        if let Err(e) = self.tx.try_send(CaptureControl::Block(samples)) {
            tracing::warn!("capture inbox full, dropping block: {}", e);
        }
    }

    /// Request the worker to stop. The worker acknowledges by returning
    /// its terminal status on the next loop iteration.
    pub fn stop(&self) {
        let _ = self.tx.try_send(CaptureControl::Stop);
    }
}

/// Converts float blocks to PCM16 frames until stopped
pub struct CaptureWorker {
    inbox: mpsc::Receiver<CaptureControl>,
    frames: mpsc::Sender<Vec<u8>>,
}

impl CaptureWorker {
    /// Spawn a capture worker posting PCM16 frames into `frames`.
    ///
    /// Returns the handle for the device layer and the worker's join
    /// handle, which resolves to the terminal status.
    pub fn spawn(frames: mpsc::Sender<Vec<u8>>) -> (CaptureHandle, JoinHandle<CaptureStatus>) {
        let (tx, inbox) = mpsc::channel(64);
        let worker = CaptureWorker { inbox, frames };
        let handle = tokio::spawn(worker.run());
        (CaptureHandle { tx }, handle)
    }

    async fn run(mut self) -> CaptureStatus {
        let mut frame_count: u64 = 0;

        loop {
            match self.inbox.recv().await {
                Some(CaptureControl::Block(samples)) => {
                    if samples.is_empty() {
                        continue;
                    }
                    let frame = pcm16_from_f32(&samples);
                    frame_count += 1;
                    if self.frames.send(frame).await.is_err() {
                        tracing::debug!(
                            "capture frame consumer gone after {} frames",
                            frame_count
                        );
                        return CaptureStatus::ConsumerGone;
                    }
                },
                Some(CaptureControl::Stop) | None => {
                    tracing::debug!("capture worker stopped after {} frames", frame_count);
                    return CaptureStatus::Stopped;
                },
            }
        }
    }
}
