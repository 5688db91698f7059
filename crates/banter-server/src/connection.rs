//! TCP accept loop and per-connection handler tasks.

use std::net::SocketAddr;
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_util::codec::Framed;
use tracing::{debug, info, warn};

use banter_shared::EnvelopeCodec;

use crate::error::Result;
use crate::registry::Outbound;
use crate::router::{self, ConnState, Flow};
use crate::state::RelayState;

/// Accept connections forever, spawning one handler task per socket.
pub async fn accept_loop(listener: TcpListener, state: Arc<RelayState>) -> Result<()> {
    loop {
        let (socket, addr) = listener.accept().await?;
        debug!(%addr, "new connection");
        let state = Arc::clone(&state);
        tokio::spawn(async move {
            handle_connection(socket, addr, state).await;
            debug!(%addr, "connection closed");
        });
    }
}

/// Drive one client connection until it logs out, errors, or is kicked.
///
/// The loop multiplexes inbound frames with the connection's outbound
/// queue. Whatever the exit path — voluntary logout, peer close,
/// protocol error, or a close command queued by a kick — the bound
/// session (if any) is removed from the registry exactly once before
/// the socket drops.
async fn handle_connection(socket: TcpStream, addr: SocketAddr, state: Arc<RelayState>) {
    let mut framed = Framed::new(socket, EnvelopeCodec);
    let (tx, mut rx) = mpsc::unbounded_channel();
    let mut conn = ConnState::new(tx);

    loop {
        tokio::select! {
            frame = framed.next() => {
                let envelope = match frame {
                    Some(Ok(envelope)) => envelope,
                    Some(Err(e)) => {
                        warn!(%addr, error = %e, "protocol error");
                        break;
                    }
                    None => break, // Peer closed the connection.
                };

                match router::dispatch(&state, &mut conn, envelope).await {
                    Flow::Continue => {}
                    Flow::Disconnect => break,
                }
            }

            command = rx.recv() => match command {
                Some(Outbound::Deliver(envelope)) => {
                    if framed.send(envelope).await.is_err() {
                        break;
                    }
                }
                Some(Outbound::Close) | None => break,
            }
        }
    }

    // A duplicate login may already own this username; remove_connection
    // only clears the entry while it still points at this connection.
    if let Some(username) = conn.username.take() {
        if state.registry.remove_connection(&username, &conn.tx).await {
            info!(%addr, user = %username, "session closed");
        }
    }
}
