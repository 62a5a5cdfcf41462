//! Newline framing
//!
//! Frames are UTF-8 text terminated by `\n` (a `\r` before it is dropped).
//! [`FrameReader::next_frame`] keeps partial input in its own buffer, so a
//! call cancelled by a timeout loses nothing.

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::error::FrameError;
use crate::protocol::MAX_FRAME_LEN;

/// Splits an async byte stream into text frames
pub struct FrameReader<R> {
    reader: R,
    buf: BytesMut,
    max_len: usize,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    pub fn new(reader: R) -> Self {
        Self::with_max_len(reader, MAX_FRAME_LEN)
    }

    pub fn with_max_len(reader: R, max_len: usize) -> Self {
        Self {
            reader,
            buf: BytesMut::with_capacity(max_len + 1),
            max_len,
        }
    }

    /// Read the next frame. `Ok(None)` means the peer closed the stream.
    ///
    /// Cancel safe.
    pub async fn next_frame(&mut self) -> Result<Option<String>, FrameError> {
        loop {
            if let Some(frame) = self.take_frame()? {
                return Ok(Some(frame));
            }
            if self.buf.len() > self.max_len {
                return Err(FrameError::TooLong(self.max_len));
            }

            let n = self.reader.read_buf(&mut self.buf).await?;
            if n == 0 {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                // Unterminated tail before close still counts as a frame
                let tail = self.buf.split();
                return decode(strip_cr(tail)).map(Some);
            }
        }
    }

    pub fn into_inner(self) -> R {
        self.reader
    }

    fn take_frame(&mut self) -> Result<Option<String>, FrameError> {
        let Some(pos) = self.buf.iter().position(|b| *b == b'\n') else {
            return Ok(None);
        };
        if pos > self.max_len {
            return Err(FrameError::TooLong(self.max_len));
        }

        let mut line = self.buf.split_to(pos + 1);
        line.truncate(pos);
        decode(strip_cr(line)).map(Some)
    }
}

fn strip_cr(mut line: BytesMut) -> BytesMut {
    if line.last() == Some(&b'\r') {
        line.truncate(line.len() - 1);
    }
    line
}

fn decode(line: BytesMut) -> Result<String, FrameError> {
    String::from_utf8(line.to_vec()).map_err(|_| FrameError::InvalidUtf8)
}

/// Encode `text` as one frame
pub fn encode_frame(text: &str) -> Bytes {
    let mut buf = BytesMut::with_capacity(text.len() + 1);
    buf.put_slice(text.as_bytes());
    buf.put_u8(b'\n');
    buf.freeze()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;

    #[tokio::test]
    async fn test_splits_frames() {
        let input: &[u8] = b"USER:alice\nhello\r\n\nlast";
        let mut reader = FrameReader::new(input);

        assert_eq!(reader.next_frame().await.unwrap().as_deref(), Some("USER:alice"));
        assert_eq!(reader.next_frame().await.unwrap().as_deref(), Some("hello"));
        assert_eq!(reader.next_frame().await.unwrap().as_deref(), Some(""));
        assert_eq!(reader.next_frame().await.unwrap().as_deref(), Some("last"));
        assert_eq!(reader.next_frame().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_too_long() {
        let input = vec![b'a'; 64];
        let mut reader = FrameReader::with_max_len(&input[..], 16);
        assert!(matches!(reader.next_frame().await, Err(FrameError::TooLong(16))));
    }

    #[tokio::test]
    async fn test_invalid_utf8() {
        let input: &[u8] = &[0xff, 0xfe, b'\n'];
        let mut reader = FrameReader::new(input);
        assert!(matches!(reader.next_frame().await, Err(FrameError::InvalidUtf8)));
    }

    #[tokio::test]
    async fn test_cancelled_read_keeps_partial_frame() {
        let (mut tx, rx) = tokio::io::duplex(64);
        let mut reader = FrameReader::new(rx);

        tx.write_all(b"hel").await.unwrap();
        let first = tokio::time::timeout(Duration::from_millis(50), reader.next_frame()).await;
        assert!(first.is_err());

        tx.write_all(b"lo\n").await.unwrap();
        assert_eq!(reader.next_frame().await.unwrap().as_deref(), Some("hello"));
    }

    #[test]
    fn test_encode_frame() {
        assert_eq!(&encode_frame("hi")[..], b"hi\n");
    }
}
