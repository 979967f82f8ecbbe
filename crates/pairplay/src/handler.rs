//! Per-connection handler: classification, identity, and request routing.
//!
//! Each accepted connection gets its own Tokio task running this handler.
//! The flow is:
//!   1. Pick the connection class from the upgrade path (close if unknown)
//!   2. Resolve the identity hint from the `token` query parameter
//!   3. Register with the coordinator and start the writer task
//!   4. Loop: receive frames → decode → forward to the coordinator → ack
//!
//! Acks and broadcasts share one outbound queue per connection, drained by
//! the writer task, so frames leave in the order the coordinator produced
//! them. The writer also pings on `ping_interval`; pongs count as activity,
//! so only peers that stop answering hit `idle_timeout`. A host that merely
//! watches its room keeps it alive.

use std::sync::Arc;

use pairplay_protocol::{
    Ack, AckData, AckProbe, Codec, ConnectionId, ControllerRequest, DisplayRequest, Request,
    ServerEvent,
};
use pairplay_room::{CoordinatorHandle, RoomError};
use pairplay_session::{ConnectionClass, IdentityResolver, Outbound, Session};
use pairplay_transport::{Connection, Frame, WebSocketConnection};
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};

use crate::server::ServerState;
use crate::PairplayError;

/// Drop guard that tells the coordinator a connection is gone.
///
/// Runs even if the handler returns early with an error. `Drop` is
/// synchronous, so the disconnect is sent from a spawned task.
struct DisconnectGuard {
    connection_id: ConnectionId,
    coordinator: CoordinatorHandle,
}

impl Drop for DisconnectGuard {
    fn drop(&mut self) {
        let connection_id = self.connection_id;
        let coordinator = self.coordinator.clone();
        tokio::spawn(async move {
            if let Err(e) = coordinator.disconnect(connection_id).await {
                tracing::debug!(%connection_id, error = %e, "disconnect not delivered");
            }
        });
    }
}

/// Handles a single connection from accept to close.
pub(crate) async fn handle_connection<R, C>(
    conn: WebSocketConnection,
    state: Arc<ServerState<R, C>>,
) -> Result<(), PairplayError>
where
    R: IdentityResolver,
    C: Codec,
{
    let conn = Arc::new(conn);
    let connection_id = conn.id();
    let request = conn.request().clone();

    let Some(class) = ConnectionClass::from_path(&request.path) else {
        tracing::debug!(%connection_id, path = %request.path, "unknown endpoint, closing");
        conn.close().await?;
        return Ok(());
    };

    let identity = state.resolver.resolve(request.query_param("token")).await;
    let (outbound, outbound_rx) = mpsc::unbounded_channel();
    state
        .coordinator
        .connect(Session::new(connection_id, class, identity), outbound.clone())
        .await?;
    let _guard = DisconnectGuard {
        connection_id,
        coordinator: state.coordinator.clone(),
    };

    let writer = tokio::spawn(write_loop(
        Arc::clone(&conn),
        Arc::clone(&state),
        outbound_rx,
    ));
    tracing::info!(%connection_id, %class, "connection opened");

    loop {
        let data = match tokio::time::timeout(state.idle_timeout, conn.recv()).await {
            Ok(Ok(Some(Frame::Data(data)))) => data,
            Ok(Ok(Some(Frame::Heartbeat))) => continue,
            Ok(Ok(None)) => {
                tracing::info!(%connection_id, "connection closed cleanly");
                break;
            }
            Ok(Err(e)) => {
                tracing::debug!(%connection_id, error = %e, "recv error");
                break;
            }
            Err(_) => {
                tracing::info!(%connection_id, "no frames or pongs, closing");
                break;
            }
        };

        let (ack, result) = match class {
            ConnectionClass::Display => handle_display_frame(&state, connection_id, &data).await,
            ConnectionClass::Controller => {
                handle_controller_frame(&state, connection_id, &data).await
            }
        };
        reply(&outbound, connection_id, ack, result);
    }

    writer.abort();
    if let Err(e) = conn.close().await {
        tracing::debug!(%connection_id, error = %e, "close frame not sent");
    }
    // _guard drops here → coordinator disconnect fires.
    Ok(())
}

/// Drains the outbound queue into the socket, pinging between events.
async fn write_loop<R, C>(
    conn: Arc<WebSocketConnection>,
    state: Arc<ServerState<R, C>>,
    mut outbound: mpsc::UnboundedReceiver<ServerEvent>,
) where
    R: IdentityResolver,
    C: Codec,
{
    let connection_id = conn.id();
    let mut heartbeat = tokio::time::interval_at(
        Instant::now() + state.ping_interval,
        state.ping_interval,
    );
    heartbeat.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        let event = tokio::select! {
            event = outbound.recv() => match event {
                Some(event) => event,
                None => break,
            },
            _ = heartbeat.tick() => {
                if let Err(e) = conn.ping().await {
                    tracing::debug!(%connection_id, error = %e, "ping failed, stopping writer");
                    break;
                }
                continue;
            }
        };
        let text = match state.codec.encode(&event) {
            Ok(text) => text,
            Err(e) => {
                tracing::warn!(%connection_id, error = %e, "failed to encode event");
                continue;
            }
        };
        if let Err(e) = conn.send_text(&text).await {
            tracing::debug!(%connection_id, error = %e, "send failed, stopping writer");
            break;
        }
    }
}

type Outcome = (Option<u64>, Result<AckData, RoomError>);

async fn handle_display_frame<R, C>(
    state: &ServerState<R, C>,
    connection_id: ConnectionId,
    data: &[u8],
) -> Outcome
where
    R: IdentityResolver,
    C: Codec,
{
    let request: Request<DisplayRequest> = match state.codec.decode(data) {
        Ok(request) => request,
        Err(e) => return undecodable(&state.codec, connection_id, data, e),
    };

    let coordinator = &state.coordinator;
    let result = match request.body {
        DisplayRequest::CreateRoom(req) => coordinator.create_room(connection_id, req).await,
        DisplayRequest::JoinRoomByPin { pin } => {
            coordinator.join_room_by_pin(connection_id, pin).await
        }
        DisplayRequest::ToggleReady(req) => coordinator.toggle_ready(connection_id, req).await,
        DisplayRequest::StartGame(req) => coordinator.start_game(connection_id, req).await,
        DisplayRequest::Join { channel } => coordinator.join_channel(connection_id, channel).await,
        DisplayRequest::Message(relay) => coordinator.relay(connection_id, relay).await,
        DisplayRequest::ButtonClicked(click) => coordinator.button_clicked(click).await,
        DisplayRequest::Ping => Ok(pong()),
    };
    (request.ack, result)
}

async fn handle_controller_frame<R, C>(
    state: &ServerState<R, C>,
    connection_id: ConnectionId,
    data: &[u8],
) -> Outcome
where
    R: IdentityResolver,
    C: Codec,
{
    let request: Request<ControllerRequest> = match state.codec.decode(data) {
        Ok(request) => request,
        Err(e) => return undecodable(&state.codec, connection_id, data, e),
    };

    let coordinator = &state.coordinator;
    let result = match request.body {
        ControllerRequest::JoinRoomByPin { pin } => coordinator.find_room(pin).await,
        ControllerRequest::PairWithPlayer(req) => coordinator.pair(connection_id, req).await,
        ControllerRequest::ControllerInput(input) => {
            coordinator.forward_input(connection_id, input).await
        }
        ControllerRequest::Ping => Ok(pong()),
    };
    (request.ack, result)
}

/// Recovers the `ack` id from a frame that didn't decode, if it has one.
fn undecodable(
    codec: &impl Codec,
    connection_id: ConnectionId,
    data: &[u8],
    error: pairplay_protocol::ProtocolError,
) -> Outcome {
    tracing::debug!(%connection_id, error = %error, "failed to decode frame");
    let ack = codec
        .decode::<AckProbe>(data)
        .ok()
        .and_then(|probe| probe.ack);
    (ack, Err(RoomError::Malformed(error.to_string())))
}

fn pong() -> AckData {
    AckData::Pong {
        reply: "pong".into(),
    }
}

/// Queues the acknowledgement for a request that carried an `ack` id.
fn reply(
    outbound: &Outbound,
    connection_id: ConnectionId,
    ack: Option<u64>,
    result: Result<AckData, RoomError>,
) {
    let frame = match (ack, result) {
        (Some(ack), Ok(data)) => Ack::ok(ack, data),
        (Some(ack), Err(e)) => {
            tracing::debug!(%connection_id, ack, error = %e, "request rejected");
            Ack::err(ack, e)
        }
        (None, Ok(_)) => return,
        (None, Err(e)) => {
            tracing::debug!(%connection_id, error = %e, "request without ack id failed");
            return;
        }
    };
    if outbound.send(ServerEvent::Ack(frame)).is_err() {
        tracing::debug!(%connection_id, "writer gone, ack dropped");
    }
}
