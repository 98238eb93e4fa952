//! Per-connection handler: event decoding, dispatch, and delivery.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Attach an outbound channel and send `connected`
//!   2. Loop: decode inbound events and dispatch them to the coordinator,
//!      drain the outbound channel into the socket, close when idle
//!   3. On exit (for any reason), the guard runs disconnect cleanup

use std::sync::Arc;
use std::time::Instant;

use gambit_presence::{IdentityProvider, LoginClaim};
use gambit_protocol::{ClientEvent, Codec, ConnectionId, ServerEvent};
use gambit_room::PersistenceSink;
use gambit_transport::{Connection, WebSocketConnection};

use crate::GambitError;
use crate::server::ServerState;

/// Drop guard that runs disconnect cleanup when the handler exits.
///
/// `Drop` is synchronous, so the async cleanup is spawned as its own task.
struct ConnectionGuard<I: IdentityProvider, P: PersistenceSink, C: Codec> {
    connection_id: ConnectionId,
    state: Arc<ServerState<I, P, C>>,
}

impl<I, P, C> Drop for ConnectionGuard<I, P, C>
where
    I: IdentityProvider,
    P: PersistenceSink,
    C: Codec,
{
    fn drop(&mut self) {
        let connection_id = self.connection_id;
        let state = Arc::clone(&self.state);
        tokio::spawn(async move {
            state.coordinator.disconnect(connection_id).await;
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<I, P, C>(
    conn: WebSocketConnection,
    state: Arc<ServerState<I, P, C>>,
) -> Result<(), GambitError>
where
    I: IdentityProvider,
    P: PersistenceSink,
    C: Codec,
{
    let conn_id = conn.id();
    let start = Instant::now();
    tracing::debug!(%conn_id, "handling new connection");

    let mut outbound = state.coordinator.connect(conn_id).await;
    let _guard = ConnectionGuard {
        connection_id: conn_id,
        state: Arc::clone(&state),
    };

    send_event(
        &conn,
        &state.codec,
        &ServerEvent::Connected {
            connection_id: conn_id,
            server_time: elapsed_millis(&start),
        },
    )
    .await?;

    let mut deadline = tokio::time::Instant::now() + state.idle_timeout;

    loop {
        tokio::select! {
            inbound = conn.recv() => {
                let data = match inbound {
                    Ok(Some(data)) => data,
                    Ok(None) => {
                        tracing::info!(%conn_id, "connection closed cleanly");
                        break;
                    }
                    Err(e) => {
                        tracing::debug!(%conn_id, error = %e, "recv error");
                        break;
                    }
                };
                deadline = tokio::time::Instant::now() + state.idle_timeout;

                let event: ClientEvent = match state.codec.decode(&data) {
                    Ok(event) => event,
                    Err(e) => {
                        tracing::debug!(
                            %conn_id,
                            error = %e,
                            "failed to decode event"
                        );
                        continue;
                    }
                };

                match dispatch(&conn, &state, event, &start).await {
                    Ok(()) => {}
                    Err(GambitError::Transport(e)) => {
                        tracing::debug!(%conn_id, error = %e, "send failed");
                        break;
                    }
                    Err(e) => {
                        tracing::debug!(%conn_id, error = %e, "event rejected");
                    }
                }
            }

            Some(event) = outbound.recv() => {
                send_event(&conn, &state.codec, &event).await?;
            }

            _ = tokio::time::sleep_until(deadline) => {
                tracing::info!(%conn_id, "connection idle, closing");
                break;
            }
        }
    }

    if let Err(e) = conn.close().await {
        tracing::debug!(%conn_id, error = %e, "close failed");
    }
    // _guard drops here → disconnect cleanup fires.
    Ok(())
}

/// Routes one client event to the coordinator.
///
/// Refusals (conflicts, bad logins) have already been answered to the
/// client by the time an error comes back here.
async fn dispatch<I, P, C>(
    conn: &WebSocketConnection,
    state: &Arc<ServerState<I, P, C>>,
    event: ClientEvent,
    start: &Instant,
) -> Result<(), GambitError>
where
    I: IdentityProvider,
    P: PersistenceSink,
    C: Codec,
{
    let conn_id = conn.id();
    let coordinator = &state.coordinator;

    match event {
        ClientEvent::Login { id, full_name } => {
            let entry = coordinator
                .login(conn_id, LoginClaim { id, full_name })
                .await?;
            tracing::info!(
                %conn_id,
                user_id = %entry.user_id,
                "user logged in"
            );
        }

        ClientEvent::Logout { connection_id } => {
            let removed = coordinator.logout(conn_id, connection_id).await;
            if let Some(entry) = removed {
                tracing::info!(
                    %conn_id,
                    user_id = %entry.user_id,
                    "user logged out"
                );
            }
        }

        ClientEvent::SendChallenge {
            opponent_id,
            challenger,
        } => {
            coordinator
                .send_challenge(conn_id, opponent_id, challenger)
                .await?;
        }

        ClientEvent::AcceptChallenge {
            room_id,
            challenger,
            challenged_to,
        } => {
            coordinator
                .accept_challenge(conn_id, room_id, challenger, challenged_to)
                .await?;
        }

        ClientEvent::DeclineChallenge {
            challenger,
            challenged_to,
        } => {
            coordinator
                .decline_challenge(challenger, challenged_to)
                .await;
        }

        ClientEvent::UpdateBoard {
            board,
            room_id,
            is_x_next,
        } => {
            if !coordinator
                .apply_move(conn_id, &room_id, board, is_x_next)
                .await
            {
                tracing::debug!(
                    %conn_id,
                    %room_id,
                    "move for unknown room dropped"
                );
            }
        }

        ClientEvent::LeaveRoom {
            room_id,
            user_id,
            full_name,
        } => {
            coordinator.member_left(&room_id, &user_id, &full_name).await;
        }

        ClientEvent::ProfileVisit {
            visited_user_id,
            visitor_name,
            visitor_id,
        } => {
            coordinator
                .profile_visit(visitor_id, visitor_name, visited_user_id)
                .await;
        }

        ClientEvent::Heartbeat { client_time } => {
            let ack = ServerEvent::HeartbeatAck {
                client_time,
                server_time: elapsed_millis(start),
            };
            send_event(conn, &state.codec, &ack).await?;
        }
    }

    Ok(())
}

/// Encodes and writes one event straight to the socket.
async fn send_event(
    conn: &WebSocketConnection,
    codec: &impl Codec,
    event: &ServerEvent,
) -> Result<(), GambitError> {
    let bytes = codec.encode(event)?;
    conn.send(&bytes).await.map_err(GambitError::Transport)?;
    Ok(())
}

fn elapsed_millis(start: &Instant) -> u64 {
    start.elapsed().as_millis() as u64
}
