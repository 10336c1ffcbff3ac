//! Gapless playback scheduling
//!
//! Inbound agent audio arrives as arbitrarily-sized PCM16 bursts, faster
//! than real time while the agent is speaking. The scheduler assigns each
//! chunk a start time of `max(now, next_available)` so consecutive chunks
//! play back-to-back with no gap and no overlap, and a chunk arriving
//! after the backlog drained starts immediately.
//!
//! The scheduler does bookkeeping only; actual rendering happens in a
//! device sink consuming [`SinkCommand`]s. Each scheduled source is
//! tracked until its natural end (or until [`PlaybackScheduler::interrupt`]
//! cancels it), which is what backs the "agent is speaking" predicate the
//! controller uses for barge-in.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::AbortHandle;
use tokio::time::Instant;

use podium_core::{f32_from_pcm16, SampleRate, BYTES_PER_SAMPLE};

/// Commands sent to the device sink
#[derive(Debug, Clone)]
pub enum SinkCommand {
    /// Render `samples` starting at `start`
    Play {
        source_id: u64,
        samples: Arc<[f32]>,
        start: Instant,
    },
    /// Stop everything currently rendering or queued
    CancelAll,
}

#[derive(Default)]
struct SchedulerState {
    /// End of the last scheduled chunk; None means schedule from "now"
    next_available: Option<Instant>,
    /// Sources still occupying the timeline, by id
    sources: HashMap<u64, AbortHandle>,
    next_id: u64,
}

/// Schedules inbound PCM16 chunks for seamless playback
pub struct PlaybackScheduler {
    sample_rate: SampleRate,
    state: Arc<Mutex<SchedulerState>>,
    sink: mpsc::Sender<SinkCommand>,
}

impl PlaybackScheduler {
    pub fn new(sample_rate: SampleRate, sink: mpsc::Sender<SinkCommand>) -> Self {
        Self {
            sample_rate,
            state: Arc::new(Mutex::new(SchedulerState::default())),
            sink,
        }
    }

    /// Schedule one inbound chunk.
    ///
    /// Malformed chunks (odd length or shorter than one sample) are
    /// dropped with a warning and leave the timeline untouched. A sink
    /// failure likewise drops only the affected chunk.
    pub fn enqueue(&self, chunk: &[u8]) {
        if chunk.len() < BYTES_PER_SAMPLE || chunk.len() % BYTES_PER_SAMPLE != 0 {
            tracing::warn!("dropping malformed audio chunk of {} bytes", chunk.len());
            return;
        }

        let samples: Arc<[f32]> = f32_from_pcm16(chunk).into();
        let duration =
            Duration::from_secs_f64(samples.len() as f64 / self.sample_rate.as_u32() as f64);
        let now = Instant::now();

        let mut state = self.state.lock();
        let start = match state.next_available {
            Some(t) if t > now => t,
            _ => now,
        };
        let end = start + duration;
        let source_id = state.next_id;

        if let Err(e) = self.sink.try_send(SinkCommand::Play {
            source_id,
            samples,
            start,
        }) {
            tracing::warn!("playback sink unavailable, dropping chunk: {}", e);
            return;
        }

        state.next_id += 1;
        state.next_available = Some(end);

        // Source removes itself from the tracking set at its natural end.
        let tracked = Arc::clone(&self.state);
        let completion = tokio::spawn(async move {
            tokio::time::sleep_until(end).await;
            tracked.lock().sources.remove(&source_id);
        });
        state.sources.insert(source_id, completion.abort_handle());
    }

    /// Cancel all in-flight playback and reset the timeline to "now".
    ///
    /// Idempotent: cancelling sources that already finished is a no-op.
    pub fn interrupt(&self) {
        let mut state = self.state.lock();
        if !state.sources.is_empty() {
            tracing::debug!("interrupting {} scheduled sources", state.sources.len());
        }
        for (_, handle) in state.sources.drain() {
            handle.abort();
        }
        state.next_available = None;
        drop(state);

        let _ = self.sink.try_send(SinkCommand::CancelAll);
    }

    /// True while any scheduled source has not yet finished playing
    pub fn is_speaking(&self) -> bool {
        !self.state.lock().sources.is_empty()
    }
}
