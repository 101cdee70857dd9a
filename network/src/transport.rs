//! TCP transport: line-framed JSON over a listener socket plus an outbound
//! writer task.
//!
//! Inbound frames from every connection funnel into one channel per node, so
//! dispatch is serialized. Outbound delivery dials per frame and is
//! best-effort; failures surface to the caller through the retry table, not
//! through the transport.

use crate::NetworkError;
use ember_messages::{decode_frame, Message, MAX_FRAME_SIZE};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Bind a listener and spawn the accept loop.
///
/// Each accepted connection gets a read loop that decodes newline-delimited
/// frames and forwards them (with the remote address) to `inbound_tx`.
/// Returns the bound local address and the accept-task handle.
pub async fn spawn_listener(
    listen_addr: &str,
    inbound_tx: mpsc::Sender<(Message, String)>,
) -> Result<(std::net::SocketAddr, JoinHandle<()>), NetworkError> {
    let listener = TcpListener::bind(listen_addr).await?;
    let local_addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        loop {
            let (stream, remote) = match listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                    continue;
                }
            };
            let inbound = inbound_tx.clone();
            tokio::spawn(async move {
                read_frames(stream, remote.to_string(), inbound).await;
            });
        }
    });

    Ok((local_addr, handle))
}

/// Read loop for one connection.
async fn read_frames(stream: TcpStream, remote: String, inbound: mpsc::Sender<(Message, String)>) {
    let mut lines = BufReader::new(stream).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                if line.len() > MAX_FRAME_SIZE {
                    tracing::warn!(remote = %remote, len = line.len(), "oversize frame dropped");
                    continue;
                }
                match decode_frame(line.as_bytes()) {
                    Ok(message) => {
                        if inbound.send((message, remote.clone())).await.is_err() {
                            return; // node shut down
                        }
                    }
                    Err(e) => {
                        tracing::warn!(remote = %remote, error = %e, "undecodable frame dropped");
                    }
                }
            }
            Ok(None) => return, // peer closed
            Err(e) => {
                tracing::debug!(remote = %remote, error = %e, "read loop ended");
                return;
            }
        }
    }
}

/// Spawn the task that drains the broadcaster's outbound queue onto TCP.
///
/// `resolve` maps a peer id to its dial address; unknown or unreachable
/// peers just drop the frame (delivery is best-effort by contract).
pub fn spawn_outbound_writer(
    mut outbound_rx: mpsc::Receiver<(String, Vec<u8>)>,
    resolve: impl Fn(&str) -> Option<String> + Send + 'static,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some((peer_id, frame)) = outbound_rx.recv().await {
            let Some(address) = resolve(&peer_id) else {
                tracing::debug!(peer = %peer_id, "no address for peer, frame dropped");
                continue;
            };
            if let Err(e) = write_frame(&address, &frame).await {
                tracing::debug!(peer = %peer_id, %address, error = %e, "send failed");
            }
        }
    })
}

async fn write_frame(address: &str, frame: &[u8]) -> Result<(), NetworkError> {
    let mut stream = TcpStream::connect(address)
        .await
        .map_err(|e| NetworkError::PeerUnreachable(format!("{address}: {e}")))?;
    stream.write_all(frame).await?;
    stream.flush().await?;
    Ok(())
}
