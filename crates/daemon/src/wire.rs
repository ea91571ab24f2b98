// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wire framing: 4-byte big-endian length prefix + JSON payload.
//!
//! Streams use [`read_message`]/[`write_message`]; the status inbox uses the
//! datagram forms, where the length prefix is carried inside the datagram
//! (redundantly, since the datagram boundary already frames the message).

use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::protocol::{decode, encode, Message, ProtocolError};

/// Maximum framed body size on stream transports (1 MB).
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024;

/// Maximum datagram size on the status inbox.
pub const MAX_DATAGRAM_SIZE: usize = 500;

/// Inactivity deadline for reads on the command endpoint.
pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(15);

/// Encodes a message with its length prefix, ready to write.
pub fn frame(msg: &Message) -> Result<Vec<u8>, ProtocolError> {
    let body = encode(msg)?;
    if body.len() > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: body.len(),
            max: MAX_MESSAGE_SIZE,
        });
    }
    let mut buf = Vec::with_capacity(body.len() + 4);
    buf.extend_from_slice(&(body.len() as u32).to_be_bytes());
    buf.extend_from_slice(&body);
    Ok(buf)
}

/// Reads one length-prefixed message from an async reader.
///
/// EOF on the length prefix means the peer closed between messages and maps
/// to [`ProtocolError::ConnectionClosed`]; EOF inside the body is an I/O
/// error (the peer died mid-frame).
pub async fn read_message<R: AsyncReadExt + Unpin>(reader: &mut R) -> Result<Message, ProtocolError> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
            return Err(ProtocolError::ConnectionClosed);
        }
        Err(e) => return Err(ProtocolError::Io(e)),
    }
    let len = u32::from_be_bytes(len_buf) as usize;

    if len > MAX_MESSAGE_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: len,
            max: MAX_MESSAGE_SIZE,
        });
    }

    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf).await?;
    decode(&buf)
}

/// Reads one message, failing with [`ProtocolError::Timeout`] on expiry.
pub async fn read_message_timeout<R: AsyncReadExt + Unpin>(
    reader: &mut R,
    timeout: Duration,
) -> Result<Message, ProtocolError> {
    tokio::time::timeout(timeout, read_message(reader))
        .await
        .map_err(|_| ProtocolError::Timeout)?
}

/// Writes one length-prefixed message to an async writer.
pub async fn write_message<W: AsyncWriteExt + Unpin>(
    writer: &mut W,
    msg: &Message,
) -> Result<(), ProtocolError> {
    let data = frame(msg)?;
    writer.write_all(&data).await?;
    writer.flush().await?;
    Ok(())
}

/// Encodes a message for datagram transport, enforcing the datagram bound.
pub fn encode_datagram(msg: &Message) -> Result<Vec<u8>, ProtocolError> {
    let data = frame(msg)?;
    if data.len() > MAX_DATAGRAM_SIZE {
        return Err(ProtocolError::MessageTooLarge {
            size: data.len(),
            max: MAX_DATAGRAM_SIZE,
        });
    }
    Ok(data)
}

/// Decodes one datagram, tolerating trailing padding after the framed body.
pub fn decode_datagram(datagram: &[u8]) -> Result<Message, ProtocolError> {
    if datagram.len() < 4 {
        return Err(ProtocolError::TruncatedDatagram);
    }
    let (header, rest) = datagram.split_at(4);
    let header: [u8; 4] = header
        .try_into()
        .map_err(|_| ProtocolError::TruncatedDatagram)?;
    let len = u32::from_be_bytes(header) as usize;
    let body = rest.get(..len).ok_or(ProtocolError::TruncatedDatagram)?;
    decode(body)
}

#[cfg(test)]
#[path = "wire_tests.rs"]
mod tests;
