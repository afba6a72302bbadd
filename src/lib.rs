//! handoff_web - HTTP/1.1 header framing with a queued hand-off to the consumer
//!
//! The server owns the socket side only: it accepts connections, reads
//! exactly one header block off each, parses it and pushes the result,
//! together with a sink bound to the same stream, onto a FIFO queue. What
//! happens next is up to whoever pulls from that queue.
//!
//! # Pipeline
//!
//! ```text
//!  accept ==> frame reader ==> request parser ==> access check ==> queue
//!                                    ||                             ||
//!                        canned 4xx + close            consumer: get_context()
//! ```
//!
//! - **Framing** - a bulk pre-read of the shortest legal request, then a
//!   byte at a time up to `\r\n\r\n`, each read with its own timeout
//! - **Parsing** - method, target [`Url`](url::Url), query, header
//!   multi-map, cookies and the usual derived fields
//! - **Hand-off** - a lock-free queue the consumer polls with a
//!   configurable [`WaitStrategy`](config::WaitStrategy)
//! - **Shutdown** - [`Server::stop`] cancels the accept loop, every
//!   pending header read and every waiting consumer
//!
//! # Examples
//!
//! ```no_run
//! use handoff_web::{config::ServerConfig, Server, StatusCode};
//!
//! #[tokio::main]
//! async fn main() -> std::io::Result<()> {
//!     let server = Server::bind(ServerConfig::default()).await?;
//!     server.start();
//!
//!     while let Some(mut ctx) = server.get_context().await {
//!         let body = format!("Hello {}", ctx.request().path());
//!         let head = format!("content-length: {}\r\nconnection: close\r\n\r\n", body.len());
//!
//!         let resp = ctx.response_mut();
//!         let _ = resp.send(StatusCode::Ok.into_first_line()).await;
//!         let _ = resp.send(head.as_bytes()).await;
//!         let _ = resp.send(body.as_bytes()).await;
//!         let _ = resp.close().await;
//!     }
//!     Ok(())
//! }
//! ```
//!
//! Routing stays on the consumer side:
//! ```
//! use handoff_web::{Method, RouteTable};
//!
//! #[rustfmt::skip]
//! let routes: &[(Method, &str, fn() -> &'static str)] = &[
//!     (Method::Get,  "/",       || "index"),
//!     (Method::Post, "/upload", || "upload"),
//! ];
//!
//! let handler = routes.match_route(Method::Post, "/upload").unwrap();
//! assert_eq!(handler(), "upload");
//! ```

pub(crate) mod http {
    pub(crate) mod context;
    pub(crate) mod endpoint;
    pub(crate) mod frame;
    pub mod query;
    pub(crate) mod request;
    pub(crate) mod response;
    pub(crate) mod types;
}
pub(crate) mod server {
    pub(crate) mod connection;
    pub(crate) mod queue;
    pub(crate) mod server_impl;
    pub(crate) mod shutdown;
}
pub(crate) mod collaborators;
pub mod config;
pub(crate) mod errors;

pub use crate::{
    collaborators::{AccessControl, DefaultPages, RouteTable, Statistics},
    errors::{ErrorKind, IoError},
    http::{
        context::Context,
        endpoint::Endpoint,
        query,
        request::Request,
        response::{Response, Transport},
        types::{Cookie, Cookies, Headers, Method, StatusCode},
    },
    server::{
        queue::ContextQueue,
        server_impl::{Server, ServerBuilder},
        shutdown::{Shutdown, ShutdownListener},
    },
};
pub use url::Url;
