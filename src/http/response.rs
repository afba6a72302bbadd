//! Write side of a connection.

use crate::{
    collaborators::{DefaultPages, Statistics},
    errors::ErrorKind,
    http::endpoint::Endpoint,
    server::shutdown::ShutdownListener,
};
use std::{fmt, future::Future, io, sync::Arc, time::Duration};
use tokio::{
    io::{AsyncRead, AsyncWrite, AsyncWriteExt},
    time::timeout,
};

/// Any bidirectional byte stream a connection can run on.
///
/// Implemented for every type that qualifies; in production this is a
/// [`TcpStream`](tokio::net::TcpStream), in tests a
/// [`DuplexStream`](tokio::io::DuplexStream).
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send + 'static {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send + 'static> Transport for T {}

/// Response sink bound to the connection the request arrived on.
///
/// Bytes are written as given, the sink adds no framing of its own. The
/// consumer is expected to produce a complete HTTP message and then call
/// [`close`](Response::close).
///
/// # Examples
/// ```no_run
/// use handoff_web::{Context, StatusCode};
///
/// async fn answer(mut ctx: Context) -> Result<(), handoff_web::ErrorKind> {
///     let resp = ctx.response_mut();
///
///     resp.send(StatusCode::Ok.into_first_line()).await?;
///     resp.send(b"content-length: 2\r\nconnection: close\r\n\r\nok").await?;
///     resp.close().await
/// }
/// ```
pub struct Response {
    pub(crate) stream: Box<dyn Transport>,
    remote: Endpoint,

    write_timeout: Duration,
    json_errors: bool,
    statistics: Arc<dyn Statistics>,
    pages: Arc<dyn DefaultPages>,
    pub(crate) shutdown: ShutdownListener,

    bytes_sent: u64,
    sent: bool,
}

impl fmt::Debug for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Response")
            .field("remote", &self.remote)
            .field("write_timeout", &self.write_timeout)
            .field("bytes_sent", &self.bytes_sent)
            .field("sent", &self.sent)
            .finish_non_exhaustive()
    }
}

/// Everything a [`Response`] needs besides its stream.
#[derive(Clone)]
pub(crate) struct ResponseParts {
    pub(crate) write_timeout: Duration,
    pub(crate) json_errors: bool,
    pub(crate) statistics: Arc<dyn Statistics>,
    pub(crate) pages: Arc<dyn DefaultPages>,
}

impl Response {
    #[inline]
    pub(crate) fn new(
        stream: Box<dyn Transport>,
        remote: Endpoint,
        parts: ResponseParts,
        shutdown: ShutdownListener,
    ) -> Self {
        Self {
            stream,
            remote,

            write_timeout: parts.write_timeout,
            json_errors: parts.json_errors,
            statistics: parts.statistics,
            pages: parts.pages,
            shutdown,

            bytes_sent: 0,
            sent: false,
        }
    }

    /// Writes `bytes` in full within the write timeout.
    ///
    /// # Errors
    /// [`ErrorKind::Io`] on a socket error or a timeout
    /// ([`TimedOut`](io::ErrorKind::TimedOut)), [`ErrorKind::Cancelled`]
    /// if the server stops first.
    pub async fn send(&mut self, bytes: &[u8]) -> Result<(), ErrorKind> {
        guarded(&mut self.shutdown, self.write_timeout, self.stream.write_all(bytes))
            .await?
            .ok_or_else(timed_out)?;

        self.bytes_sent += bytes.len() as u64;
        self.sent = true;
        self.statistics.record_bytes_sent(bytes.len() as u64);

        Ok(())
    }

    /// Sends the canned response for `error`.
    ///
    /// The body comes from [`DefaultPages`] when it has one for the status,
    /// otherwise it is the built-in JSON document (or nothing, with
    /// `json_errors` off).
    pub async fn send_error(&mut self, error: &ErrorKind) -> Result<(), ErrorKind> {
        let status = error.status();

        match self.pages.default_page(status) {
            Some((content_type, body)) => {
                let mut resp = Vec::with_capacity(128 + body.len());
                resp.extend_from_slice(status.into_first_line());
                resp.extend_from_slice(
                    format!(
                        "connection: close\r\ncontent-length: {}\r\ncontent-type: {}\r\n\r\n",
                        body.len(),
                        content_type
                    )
                    .as_bytes(),
                );
                resp.extend_from_slice(&body);

                self.send(&resp).await
            }
            None => self.send(error.as_http(self.json_errors)).await,
        }
    }

    /// Flushes and shuts down the write side.
    pub async fn close(&mut self) -> Result<(), ErrorKind> {
        let stream = &mut self.stream;
        let close = async move {
            stream.flush().await?;
            stream.shutdown().await
        };

        guarded(&mut self.shutdown, self.write_timeout, close)
            .await?
            .ok_or_else(timed_out)
    }

    #[inline(always)]
    pub const fn remote(&self) -> &Endpoint {
        &self.remote
    }

    /// Total bytes written so far.
    #[inline(always)]
    pub const fn bytes_sent(&self) -> u64 {
        self.bytes_sent
    }

    /// `true` once any write succeeded.
    #[inline(always)]
    pub const fn is_sent(&self) -> bool {
        self.sent
    }
}

/// Runs one socket operation under `limit`, abandoning it as soon as
/// shutdown fires. `Ok(None)` means the timer ran out.
pub(crate) async fn guarded<F, T>(
    shutdown: &mut ShutdownListener,
    limit: Duration,
    op: F,
) -> Result<Option<T>, ErrorKind>
where
    F: Future<Output = io::Result<T>>,
{
    tokio::select! {
        biased;

        _ = shutdown.cancelled() => Err(ErrorKind::Cancelled),
        result = timeout(limit, op) => match result {
            Ok(Ok(value)) => Ok(Some(value)),
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Ok(None),
        },
    }
}

#[inline]
fn timed_out() -> ErrorKind {
    io::Error::from(io::ErrorKind::TimedOut).into()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{server::shutdown::Shutdown, StatusCode};
    use std::sync::atomic::{AtomicU64, Ordering};
    use tokio::io::{duplex, AsyncReadExt, DuplexStream};

    #[derive(Default)]
    pub(crate) struct Counter(pub(crate) AtomicU64);

    impl Statistics for Counter {
        fn record_bytes_sent(&self, bytes: u64) {
            self.0.fetch_add(bytes, Ordering::Relaxed);
        }
    }

    struct Pages;

    impl DefaultPages for Pages {
        fn default_page(&self, status: StatusCode) -> Option<(String, Vec<u8>)> {
            match status {
                StatusCode::BadRequest => Some(("text/plain".into(), b"bad".to_vec())),
                _ => None,
            }
        }
    }

    pub(crate) fn parts(json_errors: bool) -> ResponseParts {
        ResponseParts {
            write_timeout: Duration::from_secs(5),
            json_errors,
            statistics: Arc::new(()),
            pages: Arc::new(()),
        }
    }

    /// A listener whose server is already gone, so it never fires.
    pub(crate) fn idle() -> ShutdownListener {
        Shutdown::new().listener()
    }

    fn response_with(
        parts: ResponseParts,
        buffer: usize,
        shutdown: ShutdownListener,
    ) -> (Response, DuplexStream) {
        let (client, server) = duplex(buffer);
        let remote = Endpoint::parse("127.0.0.1:4000").unwrap();
        (Response::new(Box::new(server), remote, parts, shutdown), client)
    }

    fn response(parts: ResponseParts) -> (Response, DuplexStream) {
        response_with(parts, 4096, idle())
    }

    async fn read_all(mut client: DuplexStream) -> String {
        let mut buf = String::new();
        client.read_to_string(&mut buf).await.unwrap();
        buf
    }

    #[tokio::test]
    async fn send_counts_bytes() {
        let counter = Arc::new(Counter::default());
        let (mut resp, client) = response(ResponseParts {
            statistics: counter.clone(),
            ..parts(true)
        });

        assert!(!resp.is_sent());
        resp.send(b"HTTP/1.1 204 No Content\r\n").await.unwrap();
        resp.send(b"\r\n").await.unwrap();
        resp.close().await.unwrap();

        assert!(resp.is_sent());
        assert_eq!(resp.bytes_sent(), 27);
        assert_eq!(counter.0.load(Ordering::Relaxed), 27);
        assert_eq!(resp.remote().port(), 4000);
        drop(resp);

        assert_eq!(read_all(client).await, "HTTP/1.1 204 No Content\r\n\r\n");
    }

    #[tokio::test]
    async fn builtin_error_pages() {
        for (json, expected) in [
            (true, ErrorKind::MalformedRequestLine.as_http(true)),
            (false, b"HTTP/1.1 400 Bad Request\r\nconnection: close\r\ncontent-length: 0\r\n\r\n"
                .as_slice()),
        ] {
            let (mut resp, client) = response(parts(json));
            resp.send_error(&ErrorKind::MalformedRequestLine).await.unwrap();
            drop(resp);

            assert_eq!(read_all(client).await.as_bytes(), expected);
        }
    }

    #[tokio::test]
    async fn custom_error_pages() {
        let (mut resp, client) = response(ResponseParts {
            pages: Arc::new(Pages),
            ..parts(true)
        });
        resp.send_error(&ErrorKind::UnsupportedMethod("BREW".into()))
            .await
            .unwrap();
        drop(resp);

        assert_eq!(
            read_all(client).await,
            "HTTP/1.1 400 Bad Request\r\nconnection: close\r\ncontent-length: 3\r\n\
             content-type: text/plain\r\n\r\nbad"
        );

        // No custom page for 431, falls back to the built-in one
        let (mut resp, client) = response(ResponseParts {
            pages: Arc::new(Pages),
            ..parts(true)
        });
        resp.send_error(&ErrorKind::HeaderTooLarge(64)).await.unwrap();
        drop(resp);

        assert!(read_all(client)
            .await
            .starts_with("HTTP/1.1 431 Request Header Fields Too Large\r\n"));
    }

    #[tokio::test]
    async fn send_after_peer_gone() {
        let (mut resp, client) = response(parts(true));
        drop(client);

        assert!(matches!(resp.send(b"data").await, Err(ErrorKind::Io(_))));
        assert!(!resp.is_sent());
        assert_eq!(resp.bytes_sent(), 0);
    }

    #[tokio::test]
    async fn stop_aborts_blocked_send() {
        let shutdown = Shutdown::new();
        // The peer never reads, so a write larger than the pipe blocks
        let (mut resp, _client) = response_with(parts(true), 16, shutdown.listener());

        let writer = tokio::spawn(async move { resp.send(&[b'x'; 64]).await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        shutdown.trigger();

        let result = timeout(Duration::from_secs(1), writer).await.unwrap().unwrap();
        assert_eq!(result, Err(ErrorKind::Cancelled));
    }

    #[tokio::test]
    async fn nothing_is_sent_after_stop() {
        let shutdown = Shutdown::new();
        let (mut resp, client) = response_with(parts(true), 4096, shutdown.listener());
        shutdown.trigger();

        assert_eq!(resp.send(b"late").await, Err(ErrorKind::Cancelled));
        assert_eq!(resp.close().await, Err(ErrorKind::Cancelled));
        assert!(!resp.is_sent());
        drop(resp);

        assert_eq!(read_all(client).await, "");
    }
}
