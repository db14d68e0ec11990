//! Framed send/recv with correlation checking.

use super::connection::Connection;
use super::{DrdaError, DrdaResult};
use crate::protocol::{DecodeError, EncodeError, Frame, HEADER_LEN};
use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

impl Connection {
    /// Next correlation id; 0 is never used.
    pub(crate) fn next_correlation_id(&mut self) -> u16 {
        let id = self.next_correlation;
        self.next_correlation = match self.next_correlation.wrapping_add(1) {
            0 => 1,
            n => n,
        };
        id
    }

    /// Build a request with a fresh correlation id, send it and read the
    /// reply carrying the same id.
    pub(crate) async fn request<F>(&mut self, build: F) -> DrdaResult<Frame>
    where
        F: FnOnce(u16) -> Result<BytesMut, EncodeError>,
    {
        let correlation_id = self.next_correlation_id();
        let msg = build(correlation_id)?;
        self.send(&msg).await?;
        let frame = self.recv().await?;
        if frame.correlation_id() != correlation_id {
            return Err(DecodeError::CorrelationMismatch {
                expected: correlation_id,
                found: frame.correlation_id(),
            }
            .into());
        }
        Ok(frame)
    }

    pub(crate) async fn send(&mut self, msg: &[u8]) -> DrdaResult<()> {
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| DrdaError::Connection("stream is closed".to_string()))?;
        stream.write_all(msg).await?;
        stream.flush().await?;
        Ok(())
    }

    /// Read exactly one frame, using the length in its header.
    pub(crate) async fn recv(&mut self) -> DrdaResult<Frame> {
        loop {
            if self.buffer.len() >= HEADER_LEN {
                let len = u16::from_be_bytes([self.buffer[0], self.buffer[1]]) as usize;
                if len < HEADER_LEN {
                    return Err(DecodeError::LengthMismatch {
                        what: "frame",
                        declared: len,
                        actual: self.buffer.len(),
                    }
                    .into());
                }
                if self.buffer.len() >= len {
                    let bytes = self.buffer.split_to(len).freeze();
                    return Ok(Frame::parse(bytes)?);
                }
            }

            let stream = self
                .stream
                .as_mut()
                .ok_or_else(|| DrdaError::Connection("stream is closed".to_string()))?;
            let n = stream.read_buf(&mut self.buffer).await?;
            if n == 0 {
                return Err(DrdaError::Connection("Connection closed".to_string()));
            }
        }
    }
}
