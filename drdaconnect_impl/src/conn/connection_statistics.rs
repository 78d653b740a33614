use crate::protocol::{frame_buffer::Flushed, request::Sent};

// docu is written at re-exports of the frontend crate (drdaconnect/lib.rs)
#[derive(Debug, Clone)]
pub struct ConnectionStatistics {
    exchanges: u32,
    frames_sent: u64,
    frames_received: u64,
    continuations_sent: u64,
    continuations_received: u64,
    bytes_sent: u64,
    bytes_received: u64,
    degraded_lobs: u32,
    session_resets: u32,
    shrunk_oversized_buffer_count: u32,
    created_at: time::OffsetDateTime,
    last_reset_at: time::OffsetDateTime,
}
impl Default for ConnectionStatistics {
    fn default() -> Self {
        let timestamp = time::OffsetDateTime::now_utc();
        Self {
            created_at: timestamp,
            last_reset_at: timestamp,
            exchanges: 0,
            frames_sent: 0,
            frames_received: 0,
            continuations_sent: 0,
            continuations_received: 0,
            bytes_sent: 0,
            bytes_received: 0,
            degraded_lobs: 0,
            session_resets: 0,
            shrunk_oversized_buffer_count: 0,
        }
    }
}
impl ConnectionStatistics {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Sets all counters back to zero.
    pub fn reset(&mut self) {
        *self = Self {
            created_at: self.created_at,
            last_reset_at: time::OffsetDateTime::now_utc(),
            ..Default::default()
        };
    }

    pub(crate) fn add_request(&mut self, sent: &Sent) {
        let Flushed {
            bytes,
            frames,
            continuations,
            shrunk,
        } = sent.flushed;
        self.exchanges += 1;
        self.frames_sent += frames as u64;
        self.continuations_sent += continuations as u64;
        self.bytes_sent += bytes as u64;
        self.degraded_lobs += u32::try_from(sent.degraded.len()).unwrap_or(u32::MAX);
        if shrunk {
            self.shrunk_oversized_buffer_count += 1;
        }
    }

    pub(crate) fn add_reply(&mut self, frames: usize, continuations: usize, bytes: u64) {
        self.frames_received += frames as u64;
        self.continuations_received += continuations as u64;
        self.bytes_received += bytes;
    }

    pub(crate) fn add_session_reset(&mut self) {
        self.session_resets += 1;
    }

    /// Returns the number of request chains that were sent since the last reset.
    pub fn exchanges(&self) -> u32 {
        self.exchanges
    }

    /// Returns the number of frames sent, and received.
    pub fn frames(&self) -> (u64, u64) {
        (self.frames_sent, self.frames_received)
    }

    /// Returns the number of continuation segments sent, and received.
    pub fn continuations(&self) -> (u64, u64) {
        (self.continuations_sent, self.continuations_received)
    }

    /// Returns the number of bytes sent, and received.
    pub fn bytes(&self) -> (u64, u64) {
        (self.bytes_sent, self.bytes_received)
    }

    /// Returns the number of LOB parameters that were sent zero-padded or cut,
    /// because their source failed or misreported its length.
    pub fn degraded_lobs(&self) -> u32 {
        self.degraded_lobs
    }

    /// Returns the number of session resets.
    pub fn session_resets(&self) -> u32 {
        self.session_resets
    }

    /// Returns the creation time.
    pub fn created_at(&self) -> time::OffsetDateTime {
        self.created_at
    }

    /// Returns the time of the last reset of the statistics.
    pub fn last_reset_at(&self) -> time::OffsetDateTime {
        self.last_reset_at
    }
}

impl std::fmt::Display for ConnectionStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Connection statistics")?;
        writeln!(f, "Created at:     {}", self.created_at)?;
        writeln!(f, "Last reset at:  {}", self.last_reset_at)?;
        writeln!(f, "Request chains:           {}", self.exchanges)?;
        writeln!(f, "Session resets:           {}", self.session_resets)?;
        writeln!(
            f,
            "Buffer was shrunk:        {}",
            self.shrunk_oversized_buffer_count
        )?;
        writeln!(f, "Sent")?;
        writeln!(f, "  - frames:               {}", self.frames_sent)?;
        writeln!(f, "  - continuations:        {}", self.continuations_sent)?;
        writeln!(f, "  - bytes:                {}", self.bytes_sent)?;
        writeln!(f, "  - degraded LOBs:        {}", self.degraded_lobs)?;
        writeln!(f, "Received")?;
        writeln!(f, "  - frames:               {}", self.frames_received)?;
        writeln!(
            f,
            "  - continuations:        {}",
            self.continuations_received
        )?;
        writeln!(f, "  - bytes:                {}", self.bytes_received)?;
        Ok(())
    }
}
