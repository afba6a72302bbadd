use crate::{
    collaborators::RouteTable,
    errors::ErrorKind,
    http::{
        endpoint::Endpoint,
        request::Request,
        response::{guarded, Response},
    },
};
use std::time::Duration;
use tokio::io::AsyncReadExt;

const BODY_CHUNK: usize = 8 * 1024;

/// One accepted request and the sink to answer it.
///
/// Created by the server once the header block is framed and parsed,
/// then handed to the consumer through
/// [`Server::get_context`](crate::Server::get_context). The request is
/// read-only; the response and the body are the consumer's to drive.
#[derive(Debug)]
pub struct Context {
    request: Request,
    response: Response,
    excess: Vec<u8>,
    read_timeout: Duration,
}

impl Context {
    #[inline]
    pub(crate) fn new(
        request: Request,
        response: Response,
        excess: Vec<u8>,
        read_timeout: Duration,
    ) -> Self {
        Self {
            request,
            response,
            excess,
            read_timeout,
        }
    }

    #[inline(always)]
    pub const fn request(&self) -> &Request {
        &self.request
    }

    #[inline(always)]
    pub const fn response(&self) -> &Response {
        &self.response
    }

    #[inline(always)]
    pub fn response_mut(&mut self) -> &mut Response {
        &mut self.response
    }

    #[inline(always)]
    pub const fn remote(&self) -> &Endpoint {
        self.request.remote()
    }

    #[inline]
    pub fn into_parts(self) -> (Request, Response) {
        (self.request, self.response)
    }

    /// Reads exactly [`content_length`](Request::content_length) body bytes.
    ///
    /// Bytes the header framing already took off the stream come first.
    /// Each socket read has the configured read timeout. Calling it a
    /// second time reads from wherever the stream is now, so call it once.
    ///
    /// # Errors
    /// [`BodyMismatch`](ErrorKind::BodyMismatch) when the peer closes or
    /// stalls before the declared length arrives, [`Io`](ErrorKind::Io) on
    /// a socket error, [`Cancelled`](ErrorKind::Cancelled) once the server
    /// stops.
    pub async fn read_body(&mut self) -> Result<Vec<u8>, ErrorKind> {
        let expected = self.request.content_length();

        let mut body = std::mem::take(&mut self.excess);
        body.truncate(usize::try_from(expected).unwrap_or(usize::MAX));

        let mut chunk = [0; BODY_CHUNK];
        while (body.len() as u64) < expected {
            let want = (expected - body.len() as u64).min(BODY_CHUNK as u64) as usize;

            let response = &mut self.response;
            let read = guarded(
                &mut response.shutdown,
                self.read_timeout,
                response.stream.read(&mut chunk[..want]),
            )
            .await?
            .unwrap_or(0);

            if read == 0 {
                return Err(ErrorKind::BodyMismatch {
                    expected,
                    available: body.len() as u64,
                });
            }
            body.extend_from_slice(&chunk[..read]);
        }

        Ok(body)
    }

    /// Looks the request up in `table` by method and URL path.
    #[inline]
    pub fn route<'t, T>(&self, table: &'t T) -> Option<&'t T::Handler>
    where
        T: RouteTable + ?Sized,
    {
        table.match_route(self.request.method(), self.request.path())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        http::response::tests::{idle, parts},
        server::shutdown::{Shutdown, ShutdownListener},
        Method,
    };
    use tokio::{
        io::{duplex, AsyncWriteExt, DuplexStream},
        time::timeout,
    };

    fn context(header: &str, excess: &[u8]) -> (Context, DuplexStream) {
        context_with(header, excess, idle())
    }

    fn context_with(
        header: &str,
        excess: &[u8],
        shutdown: ShutdownListener,
    ) -> (Context, DuplexStream) {
        let remote = Endpoint::parse("10.0.0.2:5555").unwrap();
        let request = Request::parse(header, remote.clone()).unwrap();

        let (client, server) = duplex(1024);
        let response = Response::new(Box::new(server), remote, parts(true), shutdown);

        let ctx = Context::new(request, response, excess.to_vec(), Duration::from_secs(5));
        (ctx, client)
    }

    #[tokio::test]
    async fn body_starts_with_excess() {
        let (mut ctx, mut client) =
            context("POST / HTTP/1.1\r\nContent-Length: 5\r\n\r\n", b"hel");
        client.write_all(b"lo").await.unwrap();

        assert_eq!(ctx.read_body().await.unwrap(), b"hello");
        assert_eq!(ctx.remote().address(), "10.0.0.2");
    }

    #[tokio::test]
    async fn excess_past_body_is_ignored() {
        let (mut ctx, _client) =
            context("POST / HTTP/1.1\r\nContent-Length: 2\r\n\r\n", b"okGET /next");

        assert_eq!(ctx.read_body().await.unwrap(), b"ok");
    }

    #[tokio::test]
    async fn no_body() {
        let (mut ctx, _client) = context("GET / HTTP/1.1\r\n\r\n", b"");
        assert!(ctx.read_body().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn body_larger_than_one_chunk() {
        let len = BODY_CHUNK * 2 + 11;
        let (mut ctx, mut client) = context(
            &format!("PUT /blob HTTP/1.1\r\nContent-Length: {len}\r\n\r\n"),
            b"",
        );

        let writer = tokio::spawn(async move {
            client.write_all(&vec![b'x'; len]).await.unwrap();
            client
        });

        let body = ctx.read_body().await.unwrap();
        assert_eq!(body.len(), len);
        assert!(body.iter().all(|&b| b == b'x'));
        drop(writer.await.unwrap());
    }

    #[tokio::test]
    async fn short_body() {
        let (mut ctx, mut client) =
            context("POST / HTTP/1.1\r\nContent-Length: 5\r\n\r\n", b"a");
        client.write_all(b"b").await.unwrap();
        drop(client);

        assert_eq!(
            ctx.read_body().await,
            Err(ErrorKind::BodyMismatch {
                expected: 5,
                available: 2
            })
        );
    }

    #[tokio::test(start_paused = true)]
    async fn stalled_body() {
        let (mut ctx, client) = context("POST / HTTP/1.1\r\nContent-Length: 3\r\n\r\n", b"");

        assert_eq!(
            ctx.read_body().await,
            Err(ErrorKind::BodyMismatch {
                expected: 3,
                available: 0
            })
        );
        drop(client);
    }

    #[tokio::test]
    async fn stop_aborts_body_read() {
        let shutdown = Shutdown::new();
        let (mut ctx, _client) = context_with(
            "POST / HTTP/1.1\r\nContent-Length: 5\r\n\r\n",
            b"",
            shutdown.listener(),
        );

        // Read timeout is 5s, cancellation must not wait for it
        let reader = tokio::spawn(async move { ctx.read_body().await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        shutdown.trigger();

        let result = timeout(Duration::from_secs(1), reader).await.unwrap().unwrap();
        assert_eq!(result, Err(ErrorKind::Cancelled));
    }

    #[test]
    fn route() {
        #[rustfmt::skip]
        let routes: &[(Method, &str, &str)] = &[
            (Method::Get,  "/users", "list"),
            (Method::Post, "/users", "create"),
        ];

        let (ctx, _client) = context("POST /users?page=2 HTTP/1.1\r\n\r\n", b"");
        assert_eq!(ctx.route(routes), Some(&"create"));

        let (ctx, _client) = context("DELETE /users HTTP/1.1\r\n\r\n", b"");
        assert_eq!(ctx.route(routes), None);

        let (request, response) = ctx.into_parts();
        assert_eq!(request.method(), Method::Delete);
        assert!(!response.is_sent());
    }
}
