use crate::{
    collaborators::{AccessControl, DefaultPages, Statistics},
    config::{ServerConfig, WaitStrategy},
    http::{context::Context, response::ResponseParts},
    server::{
        connection::HttpConnection,
        queue::ContextQueue,
        shutdown::Shutdown,
    },
};
use std::{
    io,
    net::SocketAddr,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

/// An HTTP/1.1 front end that parses requests and queues them for a
/// consumer instead of handling them itself.
///
/// Each accepted connection gets its own task, which reads exactly one
/// header block, parses it and pushes a [`Context`] onto the queue. The
/// consumer pulls contexts with [`get_context`](Server::get_context) and
/// answers through [`Context::response_mut`].
///
/// # Examples
///
/// ```no_run
/// use handoff_web::{config::ServerConfig, Server, StatusCode};
///
/// #[tokio::main]
/// async fn main() -> std::io::Result<()> {
///     let server = Server::bind(ServerConfig::default()).await?;
///     server.start();
///
///     while let Some(mut ctx) = server.get_context().await {
///         let resp = ctx.response_mut();
///         let _ = resp.send(StatusCode::NoContent.into_first_line()).await;
///         let _ = resp.send(b"connection: close\r\n\r\n").await;
///         let _ = resp.close().await;
///     }
///     Ok(())
/// }
/// ```
pub struct Server {
    listener: Arc<TcpListener>,
    config: ServerConfig,
    wait: WaitStrategy,

    queue: Arc<ContextQueue>,
    connection: Arc<HttpConnection>,
    shutdown: Shutdown,
    started: AtomicBool,
}

impl Server {
    /// Creates a new builder for configuring the server instance.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// # #[tokio::main]
    /// # async fn main() {
    /// use tokio::net::TcpListener;
    /// use handoff_web::Server;
    ///
    /// let server = Server::builder()
    ///     .listener(TcpListener::bind("127.0.0.1:8080").await.unwrap())
    ///     .build();
    /// # }
    /// ```
    #[inline]
    pub fn builder() -> ServerBuilder {
        ServerBuilder {
            listener: None,
            config: None,
            access: Arc::new(()),
            statistics: Arc::new(()),
            pages: Arc::new(()),
        }
    }

    /// Binds `bind_address:port` from `config` and builds a server with
    /// the default collaborators.
    ///
    /// # Errors
    /// [`InvalidInput`](io::ErrorKind::InvalidInput) when
    /// [`ServerConfig::validate`] rejects `config`, otherwise whatever the
    /// bind fails with.
    pub async fn bind(config: ServerConfig) -> io::Result<Self> {
        config
            .validate()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        let listener = TcpListener::bind(config.listen_addr()).await?;
        Ok(Self::builder().listener(listener).config(config).build())
    }

    /// Spawns the accept loop. Calling it again has no effect.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(&self) {
        if self.started.swap(true, Ordering::AcqRel) {
            return;
        }

        let listener = self.listener.clone();
        let connection = self.connection.clone();
        let shutdown = self.shutdown.clone();

        tokio::spawn(async move {
            let mut stop = shutdown.listener();
            info!(addr = ?listener.local_addr().ok(), "accepting connections");

            loop {
                let accepted = tokio::select! {
                    biased;

                    _ = stop.cancelled() => break,
                    accepted = listener.accept() => accepted,
                };

                match accepted {
                    Ok((stream, peer)) => {
                        debug!(%peer, "connection accepted");

                        let connection = connection.clone();
                        let listener = shutdown.listener();
                        tokio::spawn(async move { connection.run(stream, peer, listener).await });
                    }
                    Err(e) => warn!(error = %e, "accept failed"),
                }
            }

            info!("accept loop stopped");
        });
    }

    /// Waits for the next queued [`Context`].
    ///
    /// Returns `None` once [`stop`](Server::stop) has been called.
    #[inline]
    pub async fn get_context(&self) -> Option<Context> {
        self.queue
            .dequeue(&self.wait, &mut self.shutdown.listener())
            .await
    }

    /// Stops accepting, aborts connections still reading their header and
    /// wakes every pending [`get_context`](Server::get_context).
    pub fn stop(&self) {
        if !self.shutdown.is_triggered() {
            info!(pending = self.queue.len(), "stopping server");
        }
        self.shutdown.trigger();
    }

    #[inline]
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Number of contexts waiting for the consumer.
    #[inline]
    pub fn queue_len(&self) -> usize {
        self.queue.len()
    }

    #[inline(always)]
    pub const fn config(&self) -> &ServerConfig {
        &self.config
    }
}

//

/// Builder for configuring and creating [`Server`] instances.
pub struct ServerBuilder {
    listener: Option<TcpListener>,
    config: Option<ServerConfig>,

    access: Arc<dyn AccessControl>,
    statistics: Arc<dyn Statistics>,
    pages: Arc<dyn DefaultPages>,
}

impl ServerBuilder {
    /// Sets the TCP listener that the server will use to accept connections.
    ///
    /// **This is a required component.** The `bind_address` and `port` of
    /// the [`config`](Self::config) are ignored when a listener is given.
    #[inline(always)]
    pub fn listener(mut self, listener: TcpListener) -> Self {
        self.listener = Some(listener);
        self
    }

    /// Timeouts, framing limits and queue behaviour. Defaults to
    /// [`ServerConfig::default`].
    ///
    /// Taken as is. Run [`ServerConfig::validate`] first, or go through
    /// [`Server::bind`] which does.
    #[inline(always)]
    pub fn config(mut self, config: ServerConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Installs the check run on every parsed request before it is queued.
    ///
    /// For more information, see [AccessControl](crate::AccessControl)
    #[inline(always)]
    pub fn access_control<A: AccessControl>(mut self, access: A) -> Self {
        self.access = Arc::new(access);
        self
    }

    /// Receives the byte counts of every [`Response`](crate::Response) write.
    #[inline(always)]
    pub fn statistics<T: Statistics>(mut self, statistics: T) -> Self {
        self.statistics = Arc::new(statistics);
        self
    }

    /// Supplies bodies for canned error responses.
    #[inline(always)]
    pub fn pages<P: DefaultPages>(mut self, pages: P) -> Self {
        self.pages = Arc::new(pages);
        self
    }

    /// Finalizes the builder and constructs a [`Server`] instance.
    ///
    /// # Panics
    ///
    /// Panics when the `listener` method was not called, with the message
    /// ``The `listener` method must be called to create``.
    #[inline]
    #[track_caller]
    pub fn build(self) -> Server {
        let listener = self
            .listener
            .expect("The `listener` method must be called to create");
        let config = self.config.unwrap_or_default();

        let queue = Arc::new(ContextQueue::new());
        let response_parts = ResponseParts {
            write_timeout: config.write_timeout(),
            json_errors: config.json_errors,
            statistics: self.statistics,
            pages: self.pages,
        };
        let connection =
            HttpConnection::new(&config, queue.clone(), self.access, response_parts);

        Server {
            listener: Arc::new(listener),
            wait: config.wait_strategy(),
            config,

            queue,
            connection: Arc::new(connection),
            shutdown: Shutdown::new(),
            started: AtomicBool::new(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ErrorKind, Method};
    use std::time::Duration;
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpStream,
        time::timeout,
    };

    async fn server(access_denied: bool) -> Server {
        struct Deny;

        impl AccessControl for Deny {
            fn permit(&self, _: &str) -> bool {
                false
            }
        }

        let config = ServerConfig {
            port: 0,
            poll_interval_ms: 1,
            ..ServerConfig::default()
        };
        let listener = TcpListener::bind(config.listen_addr()).await.unwrap();

        let builder = Server::builder().listener(listener).config(config);
        let server = match access_denied {
            true => builder.access_control(Deny).build(),
            false => builder.build(),
        };
        server.start();
        server
    }

    #[tokio::test]
    async fn bind_rejects_invalid_config() {
        #[rustfmt::skip]
        let cases = [
            ServerConfig { min_header_read: 64, max_header_size: 32, ..ServerConfig::default() },
            ServerConfig { min_header_read: 0,                        ..ServerConfig::default() },
            ServerConfig { read_timeout_ms: 0,                        ..ServerConfig::default() },
            ServerConfig { bind_address: " ".into(),                  ..ServerConfig::default() },
        ];

        for config in cases {
            let config = ServerConfig { port: 0, ..config };
            match Server::bind(config).await {
                Ok(_) => panic!("invalid config was bound"),
                Err(e) => assert_eq!(e.kind(), io::ErrorKind::InvalidInput, "{e}"),
            }
        }

        let server = Server::bind(ServerConfig { port: 0, ..ServerConfig::default() }).await;
        assert!(server.is_ok());
    }

    async fn connect(server: &Server, request: &[u8]) -> TcpStream {
        let mut client = TcpStream::connect(server.local_addr().unwrap()).await.unwrap();
        client.write_all(request).await.unwrap();
        client
    }

    async fn read_all(client: &mut TcpStream) -> String {
        let mut buf = String::new();
        timeout(Duration::from_secs(5), client.read_to_string(&mut buf))
            .await
            .unwrap()
            .unwrap();
        buf
    }

    #[tokio::test]
    async fn valid_request_yields_context() {
        let server = server(false).await;
        let mut client = connect(&server, b"GET /hello?name=web HTTP/1.1\r\nHost: h\r\n\r\n").await;

        let mut ctx = timeout(Duration::from_secs(5), server.get_context())
            .await
            .unwrap()
            .unwrap();

        assert_eq!(ctx.request().method(), Method::Get);
        assert_eq!(ctx.request().path(), "/hello");
        assert_eq!(ctx.request().query().get("name"), Some(Some("web")));
        assert_eq!(ctx.remote().address(), "127.0.0.1");

        let resp = ctx.response_mut();
        resp.send(b"HTTP/1.1 200 OK\r\ncontent-length: 2\r\n\r\nhi").await.unwrap();
        resp.close().await.unwrap();
        drop(ctx);

        assert_eq!(read_all(&mut client).await, "HTTP/1.1 200 OK\r\ncontent-length: 2\r\n\r\nhi");
        server.stop();
    }

    #[tokio::test]
    async fn contexts_arrive_in_order() {
        let server = server(false).await;

        let mut clients = Vec::new();
        for i in 0..5 {
            clients.push(connect(&server, format!("GET /{i} HTTP/1.1\r\n\r\n").as_bytes()).await);

            // One at a time so the queue order is deterministic
            while server.queue_len() <= i {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        }

        for i in 0..5 {
            let ctx = server.get_context().await.unwrap();
            assert_eq!(ctx.request().path(), format!("/{i}"));
        }
        assert_eq!(server.queue_len(), 0);
        server.stop();
    }

    #[tokio::test]
    async fn malformed_request_yields_400() {
        let server = server(false).await;
        let mut client = connect(&server, b"GET /only-two-fields\r\n\r\n").await;

        let response = read_all(&mut client).await;
        assert_eq!(response.as_bytes(), ErrorKind::MalformedRequestLine.as_http(true));
        assert!(response.starts_with("HTTP/1.1 400 Bad Request\r\n"));
        assert_eq!(server.queue_len(), 0);
        server.stop();
    }

    #[tokio::test]
    async fn denied_connection_is_closed() {
        let server = server(true).await;
        let mut client = connect(&server, b"GET / HTTP/1.1\r\n\r\n").await;

        assert_eq!(read_all(&mut client).await, "");
        assert_eq!(server.queue_len(), 0);
        server.stop();
    }

    #[tokio::test]
    async fn stop_releases_everyone() {
        let server = Arc::new(server(false).await);

        // Mid-header connection
        let mut client = connect(&server, b"GET / HTTP/1.1\r\nHost:").await;

        let consumer = {
            let server = server.clone();
            tokio::spawn(async move { server.get_context().await.is_none() })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;

        server.stop();
        assert!(timeout(Duration::from_secs(1), consumer).await.unwrap().unwrap());
        assert_eq!(read_all(&mut client).await, "");
        assert!(server.get_context().await.is_none());
    }
}
