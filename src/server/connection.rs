use crate::{
    collaborators::AccessControl,
    config::ServerConfig,
    errors::ErrorKind,
    http::{
        context::Context,
        endpoint::Endpoint,
        frame::FrameReader,
        request::Request,
        response::{Response, ResponseParts, Transport},
    },
    server::{queue::ContextQueue, shutdown::ShutdownListener},
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tracing::{debug, info, warn};

/// Per-server state every connection task shares.
pub(crate) struct HttpConnection {
    frame_reader: FrameReader,
    read_timeout: Duration,
    queue_depth_warning: usize,

    queue: Arc<ContextQueue>,
    access: Arc<dyn AccessControl>,
    response_parts: ResponseParts,
}

impl HttpConnection {
    #[inline]
    pub(crate) fn new(
        config: &ServerConfig,
        queue: Arc<ContextQueue>,
        access: Arc<dyn AccessControl>,
        response_parts: ResponseParts,
    ) -> Self {
        Self {
            frame_reader: FrameReader::new(config),
            read_timeout: config.read_timeout(),
            queue_depth_warning: config.queue_depth_warning,

            queue,
            access,
            response_parts,
        }
    }

    /// Frames, parses and enqueues the single request of one connection.
    ///
    /// Never fails: every outcome other than a queued [`Context`] ends
    /// with the stream being dropped.
    pub(crate) async fn run<S: Transport>(
        &self,
        stream: S,
        peer: SocketAddr,
        mut shutdown: ShutdownListener,
    ) {
        let remote = match Endpoint::parse(&peer.to_string()) {
            Ok(remote) => remote,
            Err(e) => {
                warn!(%peer, error = %e, "unusable peer address");
                return;
            }
        };
        let mut stream: Box<dyn Transport> = Box::new(stream);

        let frame = match self.frame_reader.read(&mut stream, &mut shutdown).await {
            Ok(frame) => frame,
            Err(e @ ErrorKind::HeaderTooLarge(_)) => {
                warn!(peer = %remote, error = %e, "dropping connection");
                return;
            }
            Err(e) => {
                debug!(peer = %remote, error = %e, "no header block");
                return;
            }
        };

        let request = match Request::parse(&frame.text, remote.clone()) {
            Ok(request) => request,
            Err(e) => {
                debug!(peer = %remote, error = %e, status = e.status().as_u16(), "rejected request");
                self.reject(stream, remote, &e, shutdown).await;
                return;
            }
        };

        if !self.access.permit(remote.address()) {
            info!(peer = %remote, "access denied");
            return;
        }

        debug!(
            peer = %remote,
            method = %request.method(),
            uri = request.raw_target(),
            "request accepted"
        );

        let response = Response::new(stream, remote, self.response_parts.clone(), shutdown);
        let depth = self.queue.enqueue(Context::new(
            request,
            response,
            frame.excess,
            self.read_timeout,
        ));

        if depth >= self.queue_depth_warning {
            warn!(depth, limit = self.queue_depth_warning, "context queue is backing up");
        }
    }

    async fn reject(
        &self,
        stream: Box<dyn Transport>,
        remote: Endpoint,
        error: &ErrorKind,
        shutdown: ShutdownListener,
    ) {
        let mut response = Response::new(stream, remote, self.response_parts.clone(), shutdown);

        let result = match response.send_error(error).await {
            Ok(()) => response.close().await,
            Err(e) => Err(e),
        };
        if let Err(e) = result {
            debug!(peer = %response.remote(), error = %e, "failed to send error response");
        }
    }
}
