//! The coordinator actor: one Tokio task that owns every room.
//!
//! All registry mutation goes through this task's command channel, so each
//! request runs to completion before the next one starts. That is what
//! makes PIN/code allocation collision-free, keeps `all_ready` consistent
//! with a concurrent toggle, and stops a disconnect from racing a join.
//!
//! Broadcasts are queued on the recipients' outbound channels *inside* the
//! actor turn, before the reply is sent back. A gateway that pushes its
//! acknowledgement onto the same outbound queue therefore always delivers
//! the broadcast first.

use std::collections::HashMap;

use pairplay_protocol::{
    AckData, ButtonClick, ConnectionId, ControllerConnected, ControllerInput, ControllerInputEvent,
    CreateRoom, GameCountdown, GameStart, PairWithPlayer, PairingCode, Pin, PlayerView, Relay,
    RelayedMessage, RoomId, RoomPlayersUpdated, RosterChange, ServerEvent, StartGame,
    ToggleReady,
};
use pairplay_session::{ConnectionClass, Outbound, Session, SessionError, SessionManager};
use tokio::sync::{mpsc, oneshot};
use tokio::task::AbortHandle;

use crate::error::Lookup;
use crate::reconcile::Departure;
use crate::registry::{Room, unix_millis};
use crate::{MatchRecorder, RoomConfig, RoomError, RoomRegistry, StartPlan};

type Reply<T> = oneshot::Sender<Result<T, RoomError>>;

/// Commands sent to the coordinator through its channel.
///
/// Request variants carry a `oneshot` reply channel; the caller waits on
/// it for the outcome.
enum Command {
    Connect {
        session: Session,
        outbound: Outbound,
        reply: Reply<()>,
    },
    Disconnect {
        connection: ConnectionId,
    },
    CreateRoom {
        host: ConnectionId,
        request: CreateRoom,
        reply: Reply<AckData>,
    },
    JoinRoomByPin {
        occupant: ConnectionId,
        pin: String,
        reply: Reply<AckData>,
    },
    FindRoom {
        pin: String,
        reply: Reply<AckData>,
    },
    ToggleReady {
        occupant: ConnectionId,
        request: ToggleReady,
        reply: Reply<AckData>,
    },
    StartGame {
        requester: ConnectionId,
        request: StartGame,
        reply: Reply<AckData>,
    },
    Pair {
        controller: ConnectionId,
        request: PairWithPlayer,
        reply: Reply<AckData>,
    },
    ForwardInput {
        controller: ConnectionId,
        input: ControllerInput,
        reply: Reply<AckData>,
    },
    JoinChannel {
        connection: ConnectionId,
        channel: String,
        reply: Reply<AckData>,
    },
    Relay {
        from: ConnectionId,
        relay: Relay,
        reply: Reply<AckData>,
    },
    ButtonClicked {
        click: ButtonClick,
        reply: Reply<AckData>,
    },
    /// Posted by a countdown timer when it elapses.
    FireStart {
        room_id: RoomId,
        game_type: String,
        players: Vec<PlayerView>,
    },
    Room {
        room_id: RoomId,
        reply: Reply<Option<Room>>,
    },
    Stats {
        reply: Reply<CoordinatorStats>,
    },
}

/// Counters describing the coordinator's current load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CoordinatorStats {
    pub rooms: usize,
    pub live_pairing_codes: usize,
    pub sessions: usize,
    /// Countdowns scheduled but not yet fired.
    pub pending_countdowns: usize,
}

// ---------------------------------------------------------------------------
// Handle
// ---------------------------------------------------------------------------

/// Handle to the running coordinator. Cheap to clone.
///
/// Every method fails with [`RoomError::Unavailable`] once the coordinator
/// task has stopped.
#[derive(Clone)]
pub struct CoordinatorHandle {
    sender: mpsc::Sender<Command>,
}

impl CoordinatorHandle {
    async fn request<T>(&self, build: impl FnOnce(Reply<T>) -> Command) -> Result<T, RoomError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.sender
            .send(build(reply_tx))
            .await
            .map_err(|_| RoomError::Unavailable)?;
        reply_rx.await.map_err(|_| RoomError::Unavailable)?
    }

    /// Registers a new connection and the queue its socket writer drains.
    pub async fn connect(&self, session: Session, outbound: Outbound) -> Result<(), RoomError> {
        self.request(|reply| Command::Connect {
            session,
            outbound,
            reply,
        })
        .await
    }

    /// Tears down everything the connection held. Fire-and-forget.
    pub async fn disconnect(&self, connection: ConnectionId) -> Result<(), RoomError> {
        self.sender
            .send(Command::Disconnect { connection })
            .await
            .map_err(|_| RoomError::Unavailable)
    }

    /// Creates a room hosted by `host` and seats the host in it.
    pub async fn create_room(
        &self,
        host: ConnectionId,
        request: CreateRoom,
    ) -> Result<AckData, RoomError> {
        self.request(|reply| Command::CreateRoom {
            host,
            request,
            reply,
        })
        .await
    }

    /// Seats a display in the room with this PIN.
    pub async fn join_room_by_pin(
        &self,
        occupant: ConnectionId,
        pin: String,
    ) -> Result<AckData, RoomError> {
        self.request(|reply| Command::JoinRoomByPin {
            occupant,
            pin,
            reply,
        })
        .await
    }

    /// Looks a room up by PIN without taking a seat (controller flow).
    pub async fn find_room(&self, pin: String) -> Result<AckData, RoomError> {
        self.request(|reply| Command::FindRoom { pin, reply }).await
    }

    pub async fn toggle_ready(
        &self,
        occupant: ConnectionId,
        request: ToggleReady,
    ) -> Result<AckData, RoomError> {
        self.request(|reply| Command::ToggleReady {
            occupant,
            request,
            reply,
        })
        .await
    }

    /// Host only: start the countdown for the room.
    pub async fn start_game(
        &self,
        requester: ConnectionId,
        request: StartGame,
    ) -> Result<AckData, RoomError> {
        self.request(|reply| Command::StartGame {
            requester,
            request,
            reply,
        })
        .await
    }

    pub async fn pair(
        &self,
        controller: ConnectionId,
        request: PairWithPlayer,
    ) -> Result<AckData, RoomError> {
        self.request(|reply| Command::Pair {
            controller,
            request,
            reply,
        })
        .await
    }

    /// Forwards controller input to the displays of its seat's room.
    pub async fn forward_input(
        &self,
        controller: ConnectionId,
        input: ControllerInput,
    ) -> Result<AckData, RoomError> {
        self.request(|reply| Command::ForwardInput {
            controller,
            input,
            reply,
        })
        .await
    }

    /// Subscribes a display to a named broadcast channel.
    pub async fn join_channel(
        &self,
        connection: ConnectionId,
        channel: String,
    ) -> Result<AckData, RoomError> {
        self.request(|reply| Command::JoinChannel {
            connection,
            channel,
            reply,
        })
        .await
    }

    pub async fn relay(&self, from: ConnectionId, relay: Relay) -> Result<AckData, RoomError> {
        self.request(|reply| Command::Relay { from, relay, reply })
            .await
    }

    /// Echoes a screen button press to the displays of `click.room`.
    pub async fn button_clicked(&self, click: ButtonClick) -> Result<AckData, RoomError> {
        self.request(|reply| Command::ButtonClicked { click, reply })
            .await
    }

    /// A copy of the room as it is now, if it exists.
    pub async fn room(&self, room_id: RoomId) -> Result<Option<Room>, RoomError> {
        self.request(|reply| Command::Room { room_id, reply }).await
    }

    pub async fn stats(&self) -> Result<CoordinatorStats, RoomError> {
        self.request(|reply| Command::Stats { reply }).await
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

/// The internal coordinator state. Runs inside a Tokio task.
struct Coordinator {
    registry: RoomRegistry,
    sessions: SessionManager,
    /// Pending countdown timers, aborted when their room is destroyed.
    timers: HashMap<RoomId, AbortHandle>,
    recorder: Box<dyn MatchRecorder>,
    config: RoomConfig,
    receiver: mpsc::Receiver<Command>,
    /// Lets timers post back without keeping the actor alive.
    weak_self: mpsc::WeakSender<Command>,
}

/// Spawns the coordinator task and returns a handle to it.
///
/// The task stops once every [`CoordinatorHandle`] has been dropped.
pub fn spawn_coordinator<M: MatchRecorder>(config: RoomConfig, recorder: M) -> CoordinatorHandle {
    let (tx, rx) = mpsc::channel(config.command_buffer.max(1));

    let actor = Coordinator {
        registry: RoomRegistry::new(&config),
        sessions: SessionManager::new(),
        timers: HashMap::new(),
        recorder: Box::new(recorder),
        config,
        receiver: rx,
        weak_self: tx.downgrade(),
    };

    tokio::spawn(actor.run());

    CoordinatorHandle { sender: tx }
}

impl Coordinator {
    async fn run(mut self) {
        tracing::info!("room coordinator started");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle(cmd);
        }

        for (_, timer) in self.timers.drain() {
            timer.abort();
        }
        tracing::info!("room coordinator stopped");
    }

    fn handle(&mut self, cmd: Command) {
        match cmd {
            Command::Connect {
                session,
                outbound,
                reply,
            } => {
                let result = self
                    .sessions
                    .register(session, outbound)
                    .map_err(RoomError::from);
                let _ = reply.send(result);
            }
            Command::Disconnect { connection } => self.handle_disconnect(connection),
            Command::CreateRoom {
                host,
                request,
                reply,
            } => {
                let _ = reply.send(self.handle_create_room(host, request));
            }
            Command::JoinRoomByPin {
                occupant,
                pin,
                reply,
            } => {
                let _ = reply.send(self.handle_join_room_by_pin(occupant, &pin));
            }
            Command::FindRoom { pin, reply } => {
                let _ = reply.send(self.handle_find_room(&pin));
            }
            Command::ToggleReady {
                occupant,
                request,
                reply,
            } => {
                let _ = reply.send(self.handle_toggle_ready(occupant, request));
            }
            Command::StartGame {
                requester,
                request,
                reply,
            } => {
                let _ = reply.send(self.handle_start_game(requester, request));
            }
            Command::Pair {
                controller,
                request,
                reply,
            } => {
                let _ = reply.send(self.handle_pair(controller, &request));
            }
            Command::ForwardInput {
                controller,
                input,
                reply,
            } => {
                let _ = reply.send(self.handle_forward_input(controller, input));
            }
            Command::JoinChannel {
                connection,
                channel,
                reply,
            } => {
                let _ = reply.send(self.handle_join_channel(connection, channel));
            }
            Command::Relay { from, relay, reply } => {
                let _ = reply.send(self.handle_relay(from, relay));
            }
            Command::ButtonClicked { click, reply } => {
                let _ = reply.send(Ok(self.handle_button_clicked(click)));
            }
            Command::FireStart {
                room_id,
                game_type,
                players,
            } => self.handle_fire_start(room_id, game_type, players),
            Command::Room { room_id, reply } => {
                let _ = reply.send(Ok(self.registry.room(&room_id).cloned()));
            }
            Command::Stats { reply } => {
                let _ = reply.send(Ok(CoordinatorStats {
                    rooms: self.registry.room_count(),
                    live_pairing_codes: self.registry.live_pairing_codes(),
                    sessions: self.sessions.len(),
                    pending_countdowns: self.timers.len(),
                }));
            }
        }
    }

    // -- Helpers ----------------------------------------------------------

    /// Fails unless `connection` is a registered display.
    fn require_display(&self, connection: ConnectionId) -> Result<&Session, RoomError> {
        let session = self
            .sessions
            .get(connection)
            .ok_or(SessionError::NotFound(connection))?;
        if session.class != ConnectionClass::Display {
            return Err(SessionError::NotSubscribable(connection).into());
        }
        Ok(session)
    }

    /// Sends the room's roster to every display subscribed to it, each
    /// with its own seat marked.
    fn broadcast_roster(&self, room_id: &RoomId, change: Option<RosterChange>) {
        let Some(room) = self.registry.room(room_id) else {
            return;
        };
        let snapshot = room.snapshot();
        let delivered = self.sessions.broadcast_with(room_id.as_str(), |member| {
            ServerEvent::RoomPlayersUpdated(RoomPlayersUpdated {
                snapshot: snapshot.viewed_by(&member.to_string()),
                change: change.clone(),
            })
        });
        tracing::debug!(%room_id, delivered, "roster broadcast");
    }

    fn parse_pin(raw: &str) -> Result<Pin, RoomError> {
        Pin::parse(raw).map_err(|e| RoomError::Malformed(e.to_string()))
    }

    // -- Room lifecycle -----------------------------------------------------

    fn handle_create_room(
        &mut self,
        host: ConnectionId,
        request: CreateRoom,
    ) -> Result<AckData, RoomError> {
        let session = self.require_display(host)?;
        let username = session.username().map(str::to_string);
        let host_user = session.identity.user_id.clone();

        let room_id = self
            .registry
            .create_room(host, request.name.as_deref(), request.max_seats)?
            .id
            .clone();

        // The host takes seat 1 straight away.
        let joined = match self.registry.join_seat(&room_id, host, username.as_deref()) {
            Ok(joined) => joined,
            Err(e) => {
                self.registry.destroy_room(&room_id);
                return Err(e);
            }
        };
        self.sessions.subscribe(host, room_id.as_str())?;

        let room = self
            .registry
            .room(&room_id)
            .ok_or(RoomError::NotFound(Lookup::Room))?;
        self.recorder.room_created(room, host_user.as_deref());
        let ack = AckData::RoomCreated {
            room_id: room.id.clone(),
            pin: room.pin.clone(),
            room_name: room.name.clone(),
            max_seats: room.max_seats,
            seat_number: joined.seat.seat_number,
            pairing_code: joined.seat.pairing_code.clone(),
        };

        self.broadcast_roster(
            &room_id,
            Some(RosterChange::PlayerJoined {
                player_id: host.to_string(),
            }),
        );
        Ok(ack)
    }

    fn handle_join_room_by_pin(
        &mut self,
        occupant: ConnectionId,
        pin: &str,
    ) -> Result<AckData, RoomError> {
        let username = self
            .require_display(occupant)?
            .username()
            .map(str::to_string);
        let pin = Self::parse_pin(pin)?;
        let room = self.registry.find_room_by_pin(&pin)?;
        let (room_id, room_name) = (room.id.clone(), room.name.clone());

        let joined = self
            .registry
            .join_seat(&room_id, occupant, username.as_deref())?;
        self.sessions.subscribe(occupant, room_id.as_str())?;

        let change = joined.is_new.then(|| RosterChange::PlayerJoined {
            player_id: occupant.to_string(),
        });
        self.broadcast_roster(&room_id, change);

        Ok(AckData::SeatJoined {
            room_id,
            room_name,
            seat_number: joined.seat.seat_number,
            pairing_code: joined.seat.pairing_code,
            player_id: occupant.to_string(),
        })
    }

    fn handle_find_room(&self, pin: &str) -> Result<AckData, RoomError> {
        let pin = Self::parse_pin(pin)?;
        let room = self.registry.find_room_by_pin(&pin)?;
        Ok(AckData::RoomFound {
            room_id: room.id.clone(),
            room_name: room.name.clone(),
            waiting_for_pairing_code: true,
        })
    }

    fn handle_toggle_ready(
        &mut self,
        occupant: ConnectionId,
        request: ToggleReady,
    ) -> Result<AckData, RoomError> {
        let ToggleReady { room_id, ready } = request;
        self.registry.toggle_ready(&room_id, occupant, ready)?;
        self.broadcast_roster(
            &room_id,
            Some(RosterChange::ReadyChanged {
                player_id: occupant.to_string(),
                ready,
            }),
        );
        Ok(AckData::ReadyUpdated { room_id, ready })
    }

    fn handle_start_game(
        &mut self,
        requester: ConnectionId,
        request: StartGame,
    ) -> Result<AckData, RoomError> {
        let game_type = request
            .game_type
            .filter(|kind| !kind.trim().is_empty())
            .unwrap_or_else(|| self.config.default_game_type.clone());

        let plan = self.registry.request_start(
            &request.room_id,
            requester,
            game_type,
            self.config.countdown,
            unix_millis(),
        )?;

        let countdown = ServerEvent::GameCountdown(GameCountdown {
            room_id: plan.room_id.clone(),
            start_at: plan.start_at,
            duration_ms: plan.countdown.as_millis() as u64,
            game_type: plan.game_type.clone(),
        });
        self.sessions.broadcast(plan.room_id.as_str(), &countdown);

        let ack = AckData::CountdownStarted {
            room_id: plan.room_id.clone(),
            start_at: plan.start_at,
            duration_ms: plan.countdown.as_millis() as u64,
        };
        self.schedule_start(plan);
        Ok(ack)
    }

    /// Spawns the timer that posts `FireStart` after the countdown.
    fn schedule_start(&mut self, plan: StartPlan) {
        let weak = self.weak_self.clone();
        let StartPlan {
            room_id,
            game_type,
            countdown,
            players,
            ..
        } = plan;

        let fire_room = room_id.clone();
        let task = tokio::spawn(async move {
            tokio::time::sleep(countdown).await;
            if let Some(sender) = weak.upgrade() {
                let _ = sender
                    .send(Command::FireStart {
                        room_id: fire_room,
                        game_type,
                        players,
                    })
                    .await;
            }
        });

        if let Some(stale) = self.timers.insert(room_id, task.abort_handle()) {
            stale.abort();
        }
    }

    fn handle_fire_start(&mut self, room_id: RoomId, game_type: String, players: Vec<PlayerView>) {
        self.timers.remove(&room_id);
        if !self.registry.complete_start(&room_id) {
            tracing::debug!(%room_id, "countdown fired for a room that is gone, skipping");
            return;
        }

        self.recorder.round_started(&room_id, &game_type);
        let event = ServerEvent::GameStart(GameStart {
            room_id: room_id.clone(),
            game_type,
            players,
        });
        let delivered = self.sessions.broadcast(room_id.as_str(), &event);
        tracing::debug!(%room_id, delivered, "game start broadcast");
    }

    // -- Controllers ------------------------------------------------------

    fn handle_pair(
        &mut self,
        controller: ConnectionId,
        request: &PairWithPlayer,
    ) -> Result<AckData, RoomError> {
        let pin = Self::parse_pin(&request.room_pin)?;
        let code = PairingCode::parse(&request.pairing_code)
            .map_err(|e| RoomError::Malformed(e.to_string()))?;

        let pairing = self.registry.pair(&pin, &code, controller)?;

        if let Some(previous) = pairing.replaced {
            tracing::debug!(room_id = %pairing.room_id, %previous, "previous controller displaced");
        }
        if let Some((room_id, occupant)) = &pairing.released {
            self.broadcast_roster(
                room_id,
                Some(RosterChange::ControllerDisconnected {
                    player_id: occupant.to_string(),
                }),
            );
        }

        self.sessions.send_to(
            pairing.occupant,
            ServerEvent::ControllerConnected(ControllerConnected {
                room_id: pairing.room_id.clone(),
                seat_number: pairing.seat_number,
                controller_id: controller.to_string(),
            }),
        );
        self.broadcast_roster(
            &pairing.room_id,
            Some(RosterChange::ControllerConnected {
                player_id: pairing.occupant.to_string(),
            }),
        );

        Ok(AckData::Paired {
            room_id: pairing.room_id,
            room_name: pairing.room_name,
            seat_number: pairing.seat_number,
            player_id: pairing.occupant.to_string(),
        })
    }

    fn handle_forward_input(
        &self,
        controller: ConnectionId,
        input: ControllerInput,
    ) -> Result<AckData, RoomError> {
        let (room, seat) = self
            .registry
            .seat_for_controller(controller)
            .ok_or(RoomError::Precondition("Controller is not paired with a seat"))?;

        let event = ServerEvent::ControllerInput(ControllerInputEvent {
            player_id: seat.occupant.to_string(),
            seat_number: seat.seat_number,
            action: input.action,
            timestamp: input.timestamp.unwrap_or_else(unix_millis),
            joystick_x: input.joystick_x,
            joystick_y: input.joystick_y,
        });
        let delivered = self.sessions.broadcast(room.id.as_str(), &event);
        Ok(AckData::InputForwarded {
            seat_number: seat.seat_number,
            delivered,
        })
    }

    // -- Channels ---------------------------------------------------------

    fn handle_join_channel(
        &mut self,
        connection: ConnectionId,
        channel: String,
    ) -> Result<AckData, RoomError> {
        if channel.trim().is_empty() {
            return Err(RoomError::Malformed("channel name is empty".into()));
        }
        self.require_display(connection)?;
        self.sessions.subscribe(connection, &channel)?;

        let notice = ServerEvent::System {
            msg: format!("User {connection} joined {channel}"),
        };
        for member in self.sessions.members(&channel) {
            if member != connection {
                self.sessions.send_to(member, notice.clone());
            }
        }
        tracing::debug!(%connection, %channel, "joined channel");
        Ok(AckData::ChannelJoined { room: channel })
    }

    fn handle_relay(&self, from: ConnectionId, relay: Relay) -> Result<AckData, RoomError> {
        let Relay { room, data } = relay;
        let event = ServerEvent::Message(RelayedMessage {
            from: from.to_string(),
            room: room.clone(),
            data,
        });
        let delivered = match room.as_deref() {
            Some(channel) => self.sessions.broadcast(channel, &event),
            None => self.sessions.broadcast_class(ConnectionClass::Display, &event),
        };
        Ok(AckData::Relayed { delivered })
    }

    /// Without a room the click goes nowhere.
    fn handle_button_clicked(&self, click: ButtonClick) -> AckData {
        let delivered = match click.room {
            Some(channel) => self.sessions.broadcast(
                &channel,
                &ServerEvent::FrontClicked {
                    from: "frontend".into(),
                    ts: click.ts,
                },
            ),
            None => 0,
        };
        AckData::Relayed { delivered }
    }

    // -- Disconnects ------------------------------------------------------

    fn handle_disconnect(&mut self, connection: ConnectionId) {
        self.sessions.unregister(connection);

        for departure in self.registry.remove_by_connection(connection) {
            tracing::debug!(%connection, room_id = %departure.room_id(), "applying departure");
            match departure {
                Departure::RoomClosed { room } => {
                    if let Some(timer) = self.timers.remove(&room.id) {
                        timer.abort();
                        tracing::info!(room_id = %room.id, "pending countdown cancelled");
                    }
                    let notice = ServerEvent::RoomClosed {
                        room_id: room.id.clone(),
                    };
                    for member in self.sessions.close_channel(room.id.as_str()) {
                        self.sessions.send_to(member, notice.clone());
                    }
                }
                Departure::SeatRemoved { room_id, seat } => {
                    self.broadcast_roster(
                        &room_id,
                        Some(RosterChange::PlayerDisconnected {
                            player_id: seat.occupant.to_string(),
                        }),
                    );
                }
                Departure::ControllerUnpaired {
                    room_id, occupant, ..
                } => {
                    self.broadcast_roster(
                        &room_id,
                        Some(RosterChange::ControllerDisconnected {
                            player_id: occupant.to_string(),
                        }),
                    );
                }
            }
        }

        tracing::debug!(%connection, "connection reconciled");
    }
}
