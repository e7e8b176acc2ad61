// /////////////////////////////////////////////////////////////////////////////
// Plexd Node Agent
// Copyright (c) 2025 Michael Gardner, A Bit of Help, Inc.
// SPDX-License-Identifier: BSD-3-Clause
// See LICENSE file in the project root.
// /////////////////////////////////////////////////////////////////////////////

//! # Bounded Output Capture
//!
//! In-memory writer that accepts every byte but stores only up to a cap.
//!
//! Hook processes write to pipes drained into [`LimitedBuffer`]s. The
//! buffer reports every byte as accepted, so the drain loop keeps reading
//! and the external process never blocks on a full stdout/stderr pipe;
//! bytes beyond the cap are discarded. When anything was discarded, the
//! rendered string ends with the truncation marker.

use tokio::io::{AsyncRead, AsyncReadExt};

/// Marker appended to a stream that exceeded its cap.
pub const TRUNCATION_MARKER: &str = "\n...[truncated]";

/// Byte buffer with a hard storage cap and accept-everything semantics.
#[derive(Debug)]
pub struct LimitedBuffer {
    cap: usize,
    data: Vec<u8>,
    accepted: u64,
}

impl LimitedBuffer {
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            data: Vec::new(),
            accepted: 0,
        }
    }

    /// Accepts `chunk`, storing at most the remaining capacity.
    pub fn accept(&mut self, chunk: &[u8]) {
        self.accepted += chunk.len() as u64;
        let remaining = self.cap.saturating_sub(self.data.len());
        if remaining > 0 {
            let take = remaining.min(chunk.len());
            self.data.extend_from_slice(&chunk[..take]);
        }
    }

    /// True when at least one byte was discarded.
    pub fn truncated(&self) -> bool {
        self.accepted > self.data.len() as u64
    }

    /// Stored byte count (never exceeds the cap).
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Renders the stored bytes, appending the truncation marker when
    /// bytes were discarded.
    pub fn into_string_lossy(self) -> String {
        let mut text = String::from_utf8_lossy(&self.data).into_owned();
        if self.accepted > self.data.len() as u64 {
            text.push_str(TRUNCATION_MARKER);
        }
        text
    }
}

impl std::io::Write for LimitedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.accept(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Drains `reader` to EOF into a [`LimitedBuffer`] with the given cap.
///
/// Used for child process pipes: reading continues past the cap so the
/// child never back-pressures on a full pipe.
pub async fn drain_into_limited<R>(mut reader: R, cap: usize) -> LimitedBuffer
where
    R: AsyncRead + Unpin,
{
    let mut buffer = LimitedBuffer::new(cap);
    let mut chunk = vec![0u8; 8 * 1024];
    loop {
        match reader.read(&mut chunk).await {
            Ok(0) | Err(_) => break,
            Ok(n) => buffer.accept(&chunk[..n]),
        }
    }
    buffer
}
