//! Control socket listener
//!
//! One listening socket per session, bound to localhost. Each launched
//! instance arms the listener for exactly one inbound connection; the
//! connection's events are delivered to the host loop in strict order:
//! `Established` once, then `Message` per decoded document, then
//! `Ended` exactly once. Unarmed connections are never accepted.

use std::net::SocketAddr;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tracing::{debug, error, info, warn};

use blendlink_protocol::{HostCodec, InstanceResponse};
use blendlink_utils::{BlendlinkError, Result};

use crate::host::HostEvent;
use crate::process::{InstanceChannel, ProcessId};

/// Depth of the per-connection outbound queue
const OUTBOUND_QUEUE: usize = 32;

/// Events describing one armed connection's life
#[derive(Debug)]
pub enum ConnectionEvent {
    /// The instance connected; the channel sends requests to it
    Established {
        process: ProcessId,
        channel: InstanceChannel,
    },
    /// One complete document arrived from the instance
    Message {
        process: ProcessId,
        response: InstanceResponse,
    },
    /// The connection is gone (peer disconnect or I/O failure); no
    /// further events follow for this process
    Ended { process: ProcessId },
}

/// The session-wide control listener
#[derive(Debug)]
pub struct ControlListener {
    port: u16,
    inner: Option<Arc<TcpListener>>,
}

impl ControlListener {
    pub fn new(port: u16) -> Self {
        Self { port, inner: None }
    }

    pub fn is_open(&self) -> bool {
        self.inner.is_some()
    }

    /// Address the listener is bound to, once open
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.inner.as_ref()?.local_addr().ok()
    }

    /// Bind the listener, reusing it if already open
    ///
    /// A taken port is reported to the caller, never retried here.
    pub async fn open(&mut self) -> Result<()> {
        if self.inner.is_some() {
            return Ok(());
        }

        let listener = TcpListener::bind(("127.0.0.1", self.port))
            .await
            .map_err(|e| BlendlinkError::ListenerUnavailable {
                port: self.port,
                source: e,
            })?;

        info!("control listener bound to {}", listener.local_addr()?);
        self.inner = Some(Arc::new(listener));
        Ok(())
    }

    /// Arm the listener for one inbound connection on behalf of a
    /// launched instance
    ///
    /// One-shot: the spawned task consumes exactly one connection and
    /// attributes it to `process`.
    pub fn arm(&self, process: ProcessId, events: mpsc::Sender<HostEvent>) -> Result<()> {
        let listener = self
            .inner
            .clone()
            .ok_or_else(|| BlendlinkError::internal("control listener is not open"))?;

        tokio::spawn(serve_connection(listener, process, events));
        Ok(())
    }
}

/// Accept one connection and pump its events to the host loop
async fn serve_connection(
    listener: Arc<TcpListener>,
    process: ProcessId,
    events: mpsc::Sender<HostEvent>,
) {
    let (stream, peer) = match listener.accept().await {
        Ok(accepted) => accepted,
        Err(e) => {
            // No connection was established, so no events are owed
            error!("accept failed for {}: {}", process, e);
            return;
        }
    };
    debug!("{} connected from {}", process, peer);

    let (mut sink, mut stream) = Framed::new(stream, HostCodec::new()).split();
    let (outbound_tx, mut outbound_rx) = mpsc::channel(OUTBOUND_QUEUE);

    let writer = tokio::spawn(async move {
        while let Some(request) = outbound_rx.recv().await {
            if let Err(e) = sink.send(request).await {
                warn!("send to instance failed: {}", e);
                break;
            }
        }
    });

    let established = HostEvent::Connection(ConnectionEvent::Established {
        process,
        channel: InstanceChannel::new(outbound_tx),
    });
    if events.send(established).await.is_err() {
        writer.abort();
        return;
    }

    // Malformed documents are skipped inside the codec; an error here
    // is an I/O failure or an oversized frame and ends the connection
    while let Some(item) = stream.next().await {
        match item {
            Ok(response) => {
                let message = HostEvent::Connection(ConnectionEvent::Message { process, response });
                if events.send(message).await.is_err() {
                    break;
                }
            }
            Err(e) => {
                warn!("connection to {} failed: {}", process, e);
                break;
            }
        }
    }

    writer.abort();
    let _ = events
        .send(HostEvent::Connection(ConnectionEvent::Ended { process }))
        .await;
    debug!("{} connection ended", process);
}

#[cfg(test)]
mod tests {
    use super::*;
    use blendlink_protocol::{HostRequest, InstanceCodec};
    use std::time::Duration;
    use tokio::net::TcpStream;

    fn unwrap_connection(event: HostEvent) -> ConnectionEvent {
        match event {
            HostEvent::Connection(inner) => inner,
            other => panic!("expected connection event, got {:?}", other),
        }
    }

    async fn open_listener() -> ControlListener {
        let mut listener = ControlListener::new(0);
        listener.open().await.unwrap();
        listener
    }

    // ==================== Open Tests ====================

    #[tokio::test]
    async fn test_open_is_idempotent() {
        let mut listener = open_listener().await;
        let addr = listener.local_addr().unwrap();

        listener.open().await.unwrap();
        assert_eq!(listener.local_addr().unwrap(), addr);
    }

    #[tokio::test]
    async fn test_open_fails_loudly_when_port_taken() {
        let holder = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let port = holder.local_addr().unwrap().port();

        let mut listener = ControlListener::new(port);
        let result = listener.open().await;
        assert!(matches!(
            result,
            Err(BlendlinkError::ListenerUnavailable { port: p, .. }) if p == port
        ));
        assert!(!listener.is_open());
    }

    #[tokio::test]
    async fn test_arm_before_open_fails() {
        let listener = ControlListener::new(0);
        let (tx, _rx) = mpsc::channel(8);
        assert!(listener.arm(ProcessId::new(), tx).is_err());
    }

    // ==================== Connection Event Tests ====================

    #[tokio::test]
    async fn test_event_order_established_message_ended() {
        let listener = open_listener().await;
        let addr = listener.local_addr().unwrap();
        let (tx, mut rx) = mpsc::channel(8);

        let process = ProcessId::new();
        listener.arm(process, tx).unwrap();

        let stream = TcpStream::connect(addr).await.unwrap();
        let mut instance = Framed::new(stream, InstanceCodec::new());

        // Established first, exactly once
        let event = unwrap_connection(rx.recv().await.unwrap());
        assert!(matches!(
            event,
            ConnectionEvent::Established { process: p, .. } if p == process
        ));

        // Then one Message per document, in order
        let response = InstanceResponse::PluginFolder {
            plugin_path: "/addons/x".into(),
        };
        instance.send(response.clone()).await.unwrap();

        let event = unwrap_connection(rx.recv().await.unwrap());
        match event {
            ConnectionEvent::Message {
                process: p,
                response: received,
            } => {
                assert_eq!(p, process);
                assert_eq!(received, response);
            }
            other => panic!("expected message, got {:?}", other),
        }

        // Then exactly one Ended on peer disconnect
        drop(instance);
        let event = unwrap_connection(rx.recv().await.unwrap());
        assert!(matches!(
            event,
            ConnectionEvent::Ended { process: p } if p == process
        ));
    }

    #[tokio::test]
    async fn test_channel_reaches_instance() {
        let listener = open_listener().await;
        let addr = listener.local_addr().unwrap();
        let (tx, mut rx) = mpsc::channel(8);

        let process = ProcessId::new();
        listener.arm(process, tx).unwrap();

        let stream = TcpStream::connect(addr).await.unwrap();
        let mut instance = Framed::new(stream, InstanceCodec::new());

        let channel = match unwrap_connection(rx.recv().await.unwrap()) {
            ConnectionEvent::Established { channel, .. } => channel,
            other => panic!("expected established, got {:?}", other),
        };

        let request = HostRequest::PluginRefresh {
            name_list: vec!["measure_tools".into()],
        };
        assert!(channel.try_send(request.clone()));

        let received = instance.next().await.unwrap().unwrap();
        assert_eq!(received, request);
    }

    #[tokio::test]
    async fn test_malformed_document_does_not_end_connection() {
        use tokio::io::AsyncWriteExt;

        let listener = open_listener().await;
        let addr = listener.local_addr().unwrap();
        let (tx, mut rx) = mpsc::channel(8);

        listener.arm(ProcessId::new(), tx).unwrap();

        let mut stream = TcpStream::connect(addr).await.unwrap();
        assert!(matches!(
            unwrap_connection(rx.recv().await.unwrap()),
            ConnectionEvent::Established { .. }
        ));

        // A framed blob that is not JSON
        let garbage = b"!!definitely not json!!";
        stream
            .write_all(&(garbage.len() as u32).to_be_bytes())
            .await
            .unwrap();
        stream.write_all(garbage).await.unwrap();

        // Followed by a valid document on the same connection
        let mut buf = bytes::BytesMut::new();
        let mut codec = InstanceCodec::new();
        use tokio_util::codec::Encoder;
        codec
            .encode(InstanceResponse::PluginRefresh { status: "ok".into() }, &mut buf)
            .unwrap();
        stream.write_all(&buf).await.unwrap();

        // The malformed frame is skipped; the valid one arrives
        let event = unwrap_connection(rx.recv().await.unwrap());
        assert!(matches!(event, ConnectionEvent::Message { .. }));
    }

    #[tokio::test]
    async fn test_unarmed_connections_see_no_events() {
        let listener = open_listener().await;
        let addr = listener.local_addr().unwrap();
        let (_tx, mut rx) = mpsc::channel::<HostEvent>(8);

        // Connect without arming; the TCP handshake may complete in the
        // backlog, but no events are ever delivered
        let _stream = TcpStream::connect(addr).await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(rx.try_recv().is_err());
    }
}
