//! # Request transports.
//!
//! A [`Transport`] binds a [`Listener`]; each accepted [`Exchange`] is one
//! request/response pair. Framing belongs to the transport:
//!
//! - [`TcpTransport`]: one JSON request line, one JSON response line, close.
//! - [`ChannelTransport`]: in-process requests via [`ChannelClient`].
//!
//! Reading the request body is deferred to the worker that serves the
//! exchange, so a slow client never stalls the accept loop.

use std::io;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard, mpsc, oneshot};

use crate::error::{DispatchError, ServiceError};

/// Upper bound on one request line.
const MAX_REQUEST_BYTES: u64 = 64 * 1024;

/// One accepted request/response pair.
pub struct Exchange {
    /// Remote identity for logs.
    pub peer: String,
    /// Body reader and response writer.
    pub connection: Box<dyn Connection>,
}

/// Request side of an exchange.
#[async_trait]
pub trait Connection: Send {
    /// Reads the complete request body.
    async fn read_request(&mut self) -> Result<Vec<u8>, DispatchError>;

    /// Sends the response body and finishes the exchange.
    async fn respond(&mut self, body: &[u8]) -> Result<(), DispatchError>;
}

/// Bound request source.
#[async_trait]
pub trait Listener: Send {
    /// Next exchange. `Ok(None)` means the source is closed for good.
    async fn accept(&mut self) -> Result<Option<Exchange>, DispatchError>;

    /// Address actually bound, if meaningful.
    fn local_addr(&self) -> Option<String> {
        None
    }
}

/// Binds listeners; called once per dispatcher execution context.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Binds the configured endpoint.
    async fn bind(&self) -> Result<Box<dyn Listener>, ServiceError>;

    /// Configured endpoint, for logs.
    fn endpoint(&self) -> String;
}

// ---- TCP ----

/// Line-delimited JSON over TCP.
#[derive(Clone, Debug)]
pub struct TcpTransport {
    addr: String,
    read_timeout: Duration,
}

impl TcpTransport {
    /// Transport binding `addr` (e.g. `127.0.0.1:8080`).
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            read_timeout: Duration::from_secs(10),
        }
    }

    /// Maximum wait for a client's request line.
    #[must_use]
    pub fn with_read_timeout(mut self, d: Duration) -> Self {
        self.read_timeout = d;
        self
    }
}

#[async_trait]
impl Transport for TcpTransport {
    async fn bind(&self) -> Result<Box<dyn Listener>, ServiceError> {
        let inner = TcpListener::bind(&self.addr)
            .await
            .map_err(|source| ServiceError::Bind {
                endpoint: self.addr.clone(),
                source,
            })?;
        Ok(Box::new(TcpRequestListener {
            inner,
            read_timeout: self.read_timeout,
        }))
    }

    fn endpoint(&self) -> String {
        self.addr.clone()
    }
}

struct TcpRequestListener {
    inner: TcpListener,
    read_timeout: Duration,
}

#[async_trait]
impl Listener for TcpRequestListener {
    async fn accept(&mut self) -> Result<Option<Exchange>, DispatchError> {
        let (stream, peer) = self.inner.accept().await?;
        Ok(Some(Exchange {
            peer: peer.to_string(),
            connection: Box::new(TcpConnection {
                stream: BufReader::new(stream),
                read_timeout: self.read_timeout,
            }),
        }))
    }

    fn local_addr(&self) -> Option<String> {
        self.inner.local_addr().ok().map(|a| a.to_string())
    }
}

struct TcpConnection {
    stream: BufReader<TcpStream>,
    read_timeout: Duration,
}

#[async_trait]
impl Connection for TcpConnection {
    async fn read_request(&mut self) -> Result<Vec<u8>, DispatchError> {
        let mut line = Vec::new();
        let mut limited = (&mut self.stream).take(MAX_REQUEST_BYTES);
        let n = tokio::time::timeout(self.read_timeout, limited.read_until(b'\n', &mut line))
            .await
            .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "request read timed out"))??;
        if n == 0 {
            return Err(DispatchError::BadRequest {
                details: "empty request".to_string(),
            });
        }
        Ok(line)
    }

    async fn respond(&mut self, body: &[u8]) -> Result<(), DispatchError> {
        let stream = self.stream.get_mut();
        stream.write_all(body).await?;
        stream.write_all(b"\n").await?;
        stream.flush().await?;
        stream.shutdown().await?;
        Ok(())
    }
}

/// Sends one request line to `addr` and returns the response line.
pub async fn tcp_request(addr: &str, body: &[u8]) -> Result<Vec<u8>, DispatchError> {
    let stream = TcpStream::connect(addr).await?;
    let mut stream = BufReader::new(stream);
    stream.get_mut().write_all(body).await?;
    stream.get_mut().write_all(b"\n").await?;
    stream.get_mut().flush().await?;

    let mut line = Vec::new();
    stream.read_until(b'\n', &mut line).await?;
    if line.last() == Some(&b'\n') {
        line.pop();
    }
    Ok(line)
}

// ---- in-process ----

type Request = (Vec<u8>, oneshot::Sender<Vec<u8>>);

/// In-process transport; requests come from [`ChannelClient`]s.
///
/// The receiving end outlives listeners, so requests sent while the
/// dispatcher is down wait for the next bind.
#[derive(Clone)]
pub struct ChannelTransport {
    rx: Arc<AsyncMutex<mpsc::UnboundedReceiver<Request>>>,
}

/// Sending side of a [`ChannelTransport`]. Cheap to clone.
#[derive(Clone)]
pub struct ChannelClient {
    tx: mpsc::UnboundedSender<Request>,
}

impl ChannelTransport {
    /// Transport and its client.
    pub fn new() -> (Self, ChannelClient) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Self {
                rx: Arc::new(AsyncMutex::new(rx)),
            },
            ChannelClient { tx },
        )
    }
}

impl ChannelClient {
    /// Queues a request; the receiver yields the response.
    pub fn send(&self, body: Vec<u8>) -> Result<oneshot::Receiver<Vec<u8>>, DispatchError> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send((body, reply))
            .map_err(|_| io::Error::new(io::ErrorKind::NotConnected, "transport dropped"))?;
        Ok(rx)
    }

    /// Sends a request and waits for its response.
    pub async fn call(&self, body: Vec<u8>) -> Result<Vec<u8>, DispatchError> {
        let rx = self.send(body)?;
        rx.await.map_err(|_| {
            DispatchError::Io(io::Error::new(
                io::ErrorKind::ConnectionAborted,
                "request dropped without response",
            ))
        })
    }
}

#[async_trait]
impl Transport for ChannelTransport {
    async fn bind(&self) -> Result<Box<dyn Listener>, ServiceError> {
        let rx = Arc::clone(&self.rx).lock_owned().await;
        Ok(Box::new(ChannelListener { rx, seq: 0 }))
    }

    fn endpoint(&self) -> String {
        "in-process channel".to_string()
    }
}

struct ChannelListener {
    rx: OwnedMutexGuard<mpsc::UnboundedReceiver<Request>>,
    seq: u64,
}

#[async_trait]
impl Listener for ChannelListener {
    async fn accept(&mut self) -> Result<Option<Exchange>, DispatchError> {
        let Some((body, reply)) = self.rx.recv().await else {
            return Ok(None);
        };
        self.seq += 1;
        Ok(Some(Exchange {
            peer: format!("channel#{}", self.seq),
            connection: Box::new(ChannelConnection {
                body: Some(body),
                reply: Some(reply),
            }),
        }))
    }
}

struct ChannelConnection {
    body: Option<Vec<u8>>,
    reply: Option<oneshot::Sender<Vec<u8>>>,
}

#[async_trait]
impl Connection for ChannelConnection {
    async fn read_request(&mut self) -> Result<Vec<u8>, DispatchError> {
        self.body.take().ok_or_else(|| DispatchError::BadRequest {
            details: "request already read".to_string(),
        })
    }

    async fn respond(&mut self, body: &[u8]) -> Result<(), DispatchError> {
        let reply = self.reply.take().ok_or_else(|| {
            io::Error::new(io::ErrorKind::BrokenPipe, "response already sent")
        })?;
        reply
            .send(body.to_vec())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "client went away"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn channel_round_trip() {
        let (transport, client) = ChannelTransport::new();
        let mut listener = transport.bind().await.unwrap();
        let pending = client.send(b"ping".to_vec()).unwrap();

        let mut ex = listener.accept().await.unwrap().unwrap();
        assert_eq!(ex.connection.read_request().await.unwrap(), b"ping");
        ex.connection.respond(b"pong").await.unwrap();
        assert_eq!(pending.await.unwrap(), b"pong");
    }

    #[tokio::test]
    async fn tcp_line_exchange() {
        let transport = TcpTransport::new("127.0.0.1:0");
        let mut listener = transport.bind().await.unwrap();
        let addr = listener.local_addr().unwrap();

        let client = tokio::spawn(async move { tcp_request(&addr, b"{\"a\":1}").await });
        let mut ex = listener.accept().await.unwrap().unwrap();
        let body = ex.connection.read_request().await.unwrap();
        assert_eq!(body, b"{\"a\":1}\n");
        ex.connection.respond(b"{\"ok\":true}").await.unwrap();
        assert_eq!(client.await.unwrap().unwrap(), b"{\"ok\":true}");
    }

    #[tokio::test]
    async fn tcp_bind_failure_is_a_bind_error() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap().to_string();
        let err = TcpTransport::new(addr).bind().await.err().unwrap();
        assert_eq!(err.as_label(), "service_bind_failed");
    }
}
