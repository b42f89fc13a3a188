use std::fmt;
use std::time::Instant;

/// Opaque identity of one open connection.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Per-connection frame accounting. Lives exactly as long as the connection.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Session {
    pub last_frame_at: Option<Instant>,
    pub frames_processed: u64,
}

/// Accounting snapshot returned for each frame of a known session.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct FrameStats {
    /// Instantaneous rate from the gap since the previous frame. `None` for
    /// the first frame and when both frames share a timestamp.
    pub fps: Option<f64>,
    pub frames_processed: u64,
    /// True on every `sample_interval`-th frame.
    pub sampled: bool,
}

impl Session {
    /// Records one frame arriving at `now`.
    pub fn record_frame(&mut self, now: Instant, sample_interval: u64) -> FrameStats {
        let fps = self.last_frame_at.and_then(|last| {
            let elapsed = now.saturating_duration_since(last).as_secs_f64();
            (elapsed > 0.0).then(|| 1.0 / elapsed)
        });
        self.frames_processed += 1;
        self.last_frame_at = Some(now);
        FrameStats {
            fps,
            frames_processed: self.frames_processed,
            sampled: sample_interval > 0 && self.frames_processed % sample_interval == 0,
        }
    }
}
