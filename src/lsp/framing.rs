//! Content-Length framing of the LSP byte stream
//!
//! LSP messages arrive as `Content-Length: N\r\n\r\n{json}`. The input is an
//! arbitrarily chunked byte stream, so [`MessageStreamSplitter`] buffers
//! partial frames across reads and hands out complete bodies only.

use std::io::{self, ErrorKind, Read, Write};

use thiserror::Error;

use crate::config::{DEFAULT_MAX_MESSAGE_BYTES, DEFAULT_READ_CHUNK_BYTES, MAX_HEADER_BYTES};

const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

#[derive(Debug, Error)]
pub enum FramingError {
    #[error("failed to read input: {0}")]
    Read(#[from] io::Error),

    #[error("input stream closed")]
    EndOfStream,

    #[error("malformed header: {0}")]
    MalformedHeader(String),

    #[error("missing Content-Length header")]
    MissingContentLength,

    #[error("invalid Content-Length value {0:?}")]
    InvalidContentLength(String),

    #[error("message of {size} bytes exceeds the limit of {limit} bytes")]
    MessageTooLarge { size: usize, limit: usize },

    #[error("header exceeds {limit} bytes without a terminating blank line")]
    HeaderTooLarge { limit: usize },
}

/// Result of one read from a [`ByteSource`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadStatus {
    /// This many bytes were written to the buffer; zero means none available yet
    Read(usize),
    Closed,
}

/// Supplier of raw input bytes
pub trait ByteSource {
    fn read_bytes(&mut self, buf: &mut [u8]) -> io::Result<ReadStatus>;
}

impl<F> ByteSource for F
where
    F: FnMut(&mut [u8]) -> io::Result<ReadStatus>,
{
    fn read_bytes(&mut self, buf: &mut [u8]) -> io::Result<ReadStatus> {
        self(buf)
    }
}

/// [`ByteSource`] over any [`Read`]. `Ok(0)` is end of stream; interrupted
/// and would-block reads count as "nothing yet".
pub struct ReaderSource<R> {
    reader: R,
}

impl<R: Read> ReaderSource<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

impl<R: Read> ByteSource for ReaderSource<R> {
    fn read_bytes(&mut self, buf: &mut [u8]) -> io::Result<ReadStatus> {
        match self.reader.read(buf) {
            Ok(0) => Ok(ReadStatus::Closed),
            Ok(n) => Ok(ReadStatus::Read(n)),
            Err(e) if matches!(e.kind(), ErrorKind::Interrupted | ErrorKind::WouldBlock) => {
                Ok(ReadStatus::Read(0))
            }
            Err(e) => Err(e),
        }
    }
}

/// One complete message: raw header block and body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    pub header: &'a str,
    pub body: &'a [u8],
}

impl Frame<'_> {
    /// Value of a header field, matched case-insensitively
    pub fn header_value(&self, name: &str) -> Option<&str> {
        header_fields(self.header)
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value)
    }
}

/// Reassembles frames from a chunked byte stream
#[derive(Debug)]
pub struct MessageStreamSplitter {
    buffer: Vec<u8>,
    /// Receives each read before the bytes are appended to `buffer`
    scratch: Box<[u8]>,
    max_message_bytes: usize,
    largest_body_seen: usize,
    frames_seen: u64,
}

impl Default for MessageStreamSplitter {
    fn default() -> Self {
        Self::new(DEFAULT_READ_CHUNK_BYTES, DEFAULT_MAX_MESSAGE_BYTES)
    }
}

impl MessageStreamSplitter {
    pub fn new(read_chunk_bytes: usize, max_message_bytes: usize) -> Self {
        Self {
            buffer: Vec::new(),
            scratch: vec![0; read_chunk_bytes.max(1)].into_boxed_slice(),
            max_message_bytes,
            largest_body_seen: 0,
            frames_seen: 0,
        }
    }

    /// Reads once from `source` and passes every frame completed by the new
    /// bytes to `processor`, in order. Incomplete data stays buffered for the
    /// next call. Returns the number of frames processed.
    pub fn pull_from<S, P>(&mut self, source: &mut S, mut processor: P) -> Result<usize, FramingError>
    where
        S: ByteSource + ?Sized,
        P: FnMut(Frame<'_>),
    {
        match source.read_bytes(&mut self.scratch)? {
            ReadStatus::Closed => Err(FramingError::EndOfStream),
            ReadStatus::Read(n) => {
                let read = n.min(self.scratch.len());
                self.buffer.extend_from_slice(&self.scratch[..read]);
                self.extract_frames(&mut processor)
            }
        }
    }

    fn extract_frames<P>(&mut self, processor: &mut P) -> Result<usize, FramingError>
    where
        P: FnMut(Frame<'_>),
    {
        let mut consumed = 0;
        let mut frames = 0;

        loop {
            let pending = &self.buffer[consumed..];
            let Some(header_len) = find_terminator(pending) else {
                if pending.len() > MAX_HEADER_BYTES + HEADER_TERMINATOR.len() {
                    return Err(FramingError::HeaderTooLarge {
                        limit: MAX_HEADER_BYTES,
                    });
                }
                break;
            };
            if header_len > MAX_HEADER_BYTES {
                return Err(FramingError::HeaderTooLarge {
                    limit: MAX_HEADER_BYTES,
                });
            }

            let header = std::str::from_utf8(&pending[..header_len])
                .map_err(|e| FramingError::MalformedHeader(e.to_string()))?;
            let content_length = parse_content_length(header)?;
            if content_length > self.max_message_bytes {
                return Err(FramingError::MessageTooLarge {
                    size: content_length,
                    limit: self.max_message_bytes,
                });
            }

            let body_start = header_len + HEADER_TERMINATOR.len();
            let frame_len = body_start + content_length;
            if pending.len() < frame_len {
                break;
            }

            self.largest_body_seen = self.largest_body_seen.max(content_length);
            self.frames_seen += 1;
            processor(Frame {
                header,
                body: &pending[body_start..frame_len],
            });
            consumed += frame_len;
            frames += 1;
        }

        self.buffer.drain(..consumed);
        Ok(frames)
    }

    /// Size of the largest message body extracted so far
    pub fn largest_body_seen(&self) -> usize {
        self.largest_body_seen
    }

    /// Number of complete frames extracted so far
    pub fn frames_seen(&self) -> u64 {
        self.frames_seen
    }

    /// Bytes received but not yet part of a complete frame
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }
}

/// Writes `body` as one frame and flushes.
pub fn write_frame<W: Write + ?Sized>(writer: &mut W, body: &[u8]) -> io::Result<()> {
    write!(writer, "Content-Length: {}\r\n\r\n", body.len())?;
    writer.write_all(body)?;
    writer.flush()
}

fn find_terminator(bytes: &[u8]) -> Option<usize> {
    bytes
        .windows(HEADER_TERMINATOR.len())
        .position(|window| window == HEADER_TERMINATOR)
}

fn header_fields(header: &str) -> impl Iterator<Item = (&str, &str)> {
    header
        .split("\r\n")
        .filter_map(|line| line.split_once(':'))
        .map(|(key, value)| (key.trim(), value.trim()))
}

fn parse_content_length(header: &str) -> Result<usize, FramingError> {
    let (_, value) = header_fields(header)
        .find(|(key, _)| key.eq_ignore_ascii_case("Content-Length"))
        .ok_or(FramingError::MissingContentLength)?;
    value
        .parse()
        .map_err(|_| FramingError::InvalidContentLength(value.to_string()))
}
