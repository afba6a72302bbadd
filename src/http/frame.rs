//! Header block framing off a live stream.

use crate::{
    config::ServerConfig, errors::ErrorKind, http::types::decode_ascii,
    server::shutdown::ShutdownListener,
};
use memchr::memmem;
use std::time::Duration;
use tokio::{
    io::{AsyncRead, AsyncReadExt},
    time::timeout,
};

const TERMINATOR: &[u8] = b"\r\n\r\n";

/// A complete header block, terminator included.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct HeaderFrame {
    pub(crate) text: String,
    /// Bytes past the terminator that the bulk pre-read already consumed.
    pub(crate) excess: Vec<u8>,
}

/// Reads exactly up to the end of the header section.
///
/// The first read pulls `min_read` bytes in one go (the shortest legal
/// request). After that the reader goes one byte at a time until the
/// buffer ends with `\r\n\r\n`, so nothing past the header boundary is
/// taken from the stream. Every read has its own timeout. A timeout, a
/// short read or EOF is terminal: there is no retry.
#[derive(Debug, Clone)]
pub(crate) struct FrameReader {
    read_timeout: Duration,
    min_read: usize,
    max_size: usize,
}

impl FrameReader {
    #[inline]
    pub(crate) fn new(config: &ServerConfig) -> Self {
        Self {
            read_timeout: config.read_timeout(),
            min_read: config.min_header_read,
            max_size: config.max_header_size,
        }
    }

    pub(crate) async fn read<R>(
        &self,
        stream: &mut R,
        shutdown: &mut ShutdownListener,
    ) -> Result<HeaderFrame, ErrorKind>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        let mut buffer = vec![0; self.min_read];
        self.read_exact(stream, &mut buffer, shutdown).await?;

        if let Some(pos) = memmem::find(&buffer, TERMINATOR) {
            let excess = buffer.split_off(pos + TERMINATOR.len());
            return Ok(HeaderFrame {
                text: decode_ascii(&buffer),
                excess,
            });
        }

        let mut byte = [0; 1];
        while !buffer.ends_with(TERMINATOR) {
            if buffer.len() >= self.max_size {
                return Err(ErrorKind::HeaderTooLarge(self.max_size));
            }

            self.read_exact(stream, &mut byte, shutdown).await?;
            buffer.push(byte[0]);
        }

        Ok(HeaderFrame {
            text: decode_ascii(&buffer),
            excess: Vec::new(),
        })
    }

    #[inline]
    async fn read_exact<R>(
        &self,
        stream: &mut R,
        buf: &mut [u8],
        shutdown: &mut ShutdownListener,
    ) -> Result<(), ErrorKind>
    where
        R: AsyncRead + Unpin + ?Sized,
    {
        tokio::select! {
            biased;

            _ = shutdown.cancelled() => Err(ErrorKind::Cancelled),
            result = timeout(self.read_timeout, stream.read_exact(buf)) => match result {
                Ok(Ok(_)) => Ok(()),
                // EOF before `buf` is full, a reset, or the timer firing
                Ok(Err(_)) | Err(_) => Err(ErrorKind::IncompleteRequest),
            },
        }
    }
}
