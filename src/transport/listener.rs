//! Owner-side listening endpoint.

use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::error::{TransportError, TransportResult};

/// Listening socket that hands out exactly one connection.
///
/// `start` is idempotent: calling it while already listening returns the
/// existing binding instead of opening a second socket. `stop` is safe to call
/// from any state.
#[derive(Debug, Default)]
pub struct EndpointListener {
    listener: Option<TcpListener>,
    local_addr: Option<SocketAddr>,
}

impl EndpointListener {
    /// Create an idle listener.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind to `addr`, or return the existing binding if already listening.
    pub async fn start(&mut self, addr: SocketAddr) -> TransportResult<SocketAddr> {
        if let Some(existing) = self.local_addr.filter(|_| self.listener.is_some()) {
            debug!(local = %existing, "listener already started");
            return Ok(existing);
        }

        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| TransportError::Bind { addr, source })?;
        let local = listener
            .local_addr()
            .map_err(|source| TransportError::Bind { addr, source })?;

        info!(local = %local, "listening");
        self.listener = Some(listener);
        self.local_addr = Some(local);
        Ok(local)
    }

    /// Bound address while listening.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr.filter(|_| self.listener.is_some())
    }

    /// Whether a socket is held.
    pub fn is_listening(&self) -> bool {
        self.listener.is_some()
    }

    /// Wait for one inbound connection, or until `cancel` fires.
    pub async fn accept_once(
        &self,
        cancel: &CancellationToken,
    ) -> TransportResult<(TcpStream, SocketAddr)> {
        let listener = self.listener.as_ref().ok_or(TransportError::NotListening)?;

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(TransportError::Cancelled),
            accepted = listener.accept() => {
                let (stream, remote) = accepted.map_err(TransportError::Accept)?;
                info!(peer = %remote, "accepted connection");
                Ok((stream, remote))
            }
        }
    }

    /// Close every further inbound connection until `cancel` fires.
    ///
    /// Returns how many connections were turned away.
    pub async fn reject_until(&self, cancel: &CancellationToken) -> usize {
        let Some(listener) = self.listener.as_ref() else {
            return 0;
        };

        let mut rejected = 0;
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return rejected,
                accepted = listener.accept() => match accepted {
                    Ok((stream, remote)) => {
                        warn!(
                            peer = %remote,
                            "rejecting inbound connection: session already connected"
                        );
                        drop(stream);
                        rejected += 1;
                    }
                    Err(e) => {
                        // Transient accept errors (e.g. fd exhaustion) must not
                        // take down the established session.
                        debug!(error = %e, "accept error while rejecting");
                        tokio::task::yield_now().await;
                    }
                }
            }
        }
    }

    /// Release the listening socket. Idempotent.
    pub fn stop(&mut self) {
        if self.listener.take().is_some() {
            debug!(local = ?self.local_addr, "listener stopped");
        }
        self.local_addr = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::AsyncReadExt;

    fn any_port() -> SocketAddr {
        "127.0.0.1:0".parse().unwrap()
    }

    #[tokio::test]
    async fn test_start_is_idempotent() {
        let mut listener = EndpointListener::new();
        let first = listener.start(any_port()).await.unwrap();
        let second = listener.start(any_port()).await.unwrap();
        assert_eq!(first, second);
        assert!(listener.is_listening());
    }

    #[tokio::test]
    async fn test_bind_conflict() {
        let mut first = EndpointListener::new();
        let addr = first.start(any_port()).await.unwrap();

        let mut second = EndpointListener::new();
        assert!(matches!(
            second.start(addr).await,
            Err(TransportError::Bind { .. })
        ));
        assert!(!second.is_listening());
    }

    #[tokio::test]
    async fn test_stop_is_idempotent() {
        let mut listener = EndpointListener::new();
        listener.stop();

        let addr = listener.start(any_port()).await.unwrap();
        listener.stop();
        listener.stop();
        assert!(!listener.is_listening());
        assert_eq!(listener.local_addr(), None);

        // Socket released: nothing accepts any more.
        assert!(TcpStream::connect(addr).await.is_err());
    }

    #[tokio::test]
    async fn test_accept_requires_start() {
        let listener = EndpointListener::new();
        let cancel = CancellationToken::new();
        assert!(matches!(
            listener.accept_once(&cancel).await,
            Err(TransportError::NotListening)
        ));
    }

    #[tokio::test]
    async fn test_accept_once() {
        let mut listener = EndpointListener::new();
        let addr = listener.start(any_port()).await.unwrap();
        let cancel = CancellationToken::new();

        let client = tokio::spawn(async move { TcpStream::connect(addr).await.unwrap() });
        let (_stream, remote) = listener.accept_once(&cancel).await.unwrap();
        let client = client.await.unwrap();
        assert_eq!(remote, client.local_addr().unwrap());
    }

    #[tokio::test]
    async fn test_accept_cancelled() {
        let mut listener = EndpointListener::new();
        listener.start(any_port()).await.unwrap();
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let result = tokio::time::timeout(Duration::from_secs(1), listener.accept_once(&cancel))
            .await
            .expect("cancellation must be prompt");
        assert!(matches!(result, Err(TransportError::Cancelled)));
    }

    #[tokio::test]
    async fn test_reject_until_closes_extra_connections() {
        let mut listener = EndpointListener::new();
        let addr = listener.start(any_port()).await.unwrap();
        let cancel = CancellationToken::new();

        let extra = tokio::spawn(async move {
            let mut stream = TcpStream::connect(addr).await.unwrap();
            let mut buf = [0u8; 8];
            // Rejected connections are closed immediately.
            stream.read(&mut buf).await.unwrap_or(0)
        });

        let rejecting = {
            let cancel = cancel.clone();
            async move { listener.reject_until(&cancel).await }
        };
        let handle = tokio::spawn(rejecting);

        assert_eq!(extra.await.unwrap(), 0);
        cancel.cancel();
        assert_eq!(handle.await.unwrap(), 1);
    }
}
