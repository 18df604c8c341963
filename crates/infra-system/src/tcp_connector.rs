// TCP management connector
// Holds a loopback TCP session to the process's management port
use async_trait::async_trait;
use futures::task::noop_waker_ref;
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use tokio::io::ReadBuf;
use tokio::net::TcpStream;
use tracing::debug;

use hostmon_core::port::{ConnectionError, ManagementConnection, ManagementConnector, ManagementEndpoint};

/// Opens a TCP session per endpoint
///
/// Connect timeouts are imposed by the caller.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcpManagementConnector;

impl TcpManagementConnector {
    pub fn new() -> Self {
        Self
    }
}

/// `host:port` reachable for an endpoint
///
/// Remote URLs look like `service:jmx:rmi:///jndi/rmi://host:port/jmxrmi`;
/// local attach addresses are either such a URL or a bare `host:port`.
pub fn socket_address(endpoint: &ManagementEndpoint) -> Option<String> {
    let address = endpoint.address();
    let tail = match address.rfind("rmi://") {
        Some(idx) => &address[idx + "rmi://".len()..],
        None => address,
    };
    let authority = tail.split('/').next().unwrap_or(tail);
    authority.contains(':').then(|| authority.to_string())
}

struct TcpConnection {
    peer: String,
    stream: Mutex<Option<TcpStream>>,
}

impl ManagementConnection for TcpConnection {
    fn close(&self) -> Result<(), ConnectionError> {
        let stream = self
            .stream
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if stream.is_some() {
            debug!(peer = %self.peer, "Management session closed");
        }
        Ok(())
    }

    /// Open until closed locally or until the peer shuts the session down
    fn is_open(&self) -> bool {
        let guard = self.stream.lock().unwrap_or_else(PoisonError::into_inner);
        let Some(stream) = guard.as_ref() else {
            return false;
        };

        let mut byte = [0u8; 1];
        let mut buf = ReadBuf::new(&mut byte);
        let mut cx = Context::from_waker(noop_waker_ref());
        match stream.poll_peek(&mut cx, &mut buf) {
            Poll::Pending => true,
            Poll::Ready(Ok(n)) => n > 0,
            Poll::Ready(Err(e)) => {
                debug!(peer = %self.peer, error = %e, "Management session failed");
                false
            }
        }
    }
}

#[async_trait]
impl ManagementConnector for TcpManagementConnector {
    async fn connect(
        &self,
        endpoint: &ManagementEndpoint,
    ) -> Result<Arc<dyn ManagementConnection>, ConnectionError> {
        let peer = socket_address(endpoint).ok_or_else(|| ConnectionError::ConnectFailed {
            endpoint: endpoint.to_string(),
            reason: "no host:port in endpoint address".to_string(),
        })?;

        let stream = TcpStream::connect(&peer)
            .await
            .map_err(|e| ConnectionError::ConnectFailed {
                endpoint: endpoint.to_string(),
                reason: e.to_string(),
            })?;

        debug!(peer = %peer, "Management session opened");
        Ok(Arc::new(TcpConnection {
            peer,
            stream: Mutex::new(Some(stream)),
        }))
    }
}
