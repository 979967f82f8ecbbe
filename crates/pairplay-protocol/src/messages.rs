//! Requests and events exchanged with displays and controllers.
//!
//! Inbound frames are wrapped in [`Request`], which pulls the optional
//! `ack` id off the frame and hands the rest to the per-class request
//! enum. Outbound frames are always a [`ServerEvent`].

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::{PairingCode, Pin, PlayerView, RoomId, RoomSnapshot};

// ---------------------------------------------------------------------------
// Inbound
// ---------------------------------------------------------------------------

/// An inbound request plus the acknowledgement id the client is waiting on.
///
/// `#[serde(flatten)]` means the request fields sit next to `ack` in the
/// same JSON object instead of being nested under `body`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request<T> {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ack: Option<u64>,
    #[serde(flatten)]
    pub body: T,
}

/// Pulls just the `ack` id out of a frame that failed to decode, so the
/// sender can still be told its request was malformed.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct AckProbe {
    #[serde(default)]
    pub ack: Option<u64>,
}

/// Accepts a code typed as either a JSON string or a JSON number.
///
/// Some clients send the PIN as `4821`, others as `"4821"`.
fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(u64),
    }

    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    })
}

/// Requests a display connection (`/game`) may send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum DisplayRequest {
    /// Create a room and take seat 1 in it.
    CreateRoom(CreateRoom),
    /// Take a seat in the room with this PIN.
    JoinRoomByPin {
        #[serde(deserialize_with = "string_or_number")]
        pin: String,
    },
    /// Mark the sender's seat ready or not ready.
    ToggleReady(ToggleReady),
    /// Host only: start the countdown.
    StartGame(StartGame),
    /// Subscribe to a named broadcast channel.
    Join { channel: String },
    /// Relay a payload to a channel.
    Message(Relay),
    /// A button on the big screen was pressed; echoed to the room as
    /// `front_clicked`.
    ButtonClicked(ButtonClick),
    Ping,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateRoom {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default, alias = "maxPlayers")]
    pub max_seats: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleReady {
    pub room_id: RoomId,
    pub ready: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartGame {
    pub room_id: RoomId,
    #[serde(default)]
    pub game_type: Option<String>,
}

/// A relayed message. Without a `room` it is echoed to every display.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Relay {
    #[serde(default)]
    pub room: Option<String>,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ButtonClick {
    #[serde(default)]
    pub room: Option<String>,
    /// Client timestamp, passed through untouched.
    #[serde(default)]
    pub ts: Value,
}

/// Requests a controller connection (`/mobile`) may send.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ControllerRequest {
    /// Look a room up by PIN without taking a seat.
    JoinRoomByPin {
        #[serde(deserialize_with = "string_or_number")]
        pin: String,
    },
    /// Bind this controller to the seat showing `pairing_code`.
    PairWithPlayer(PairWithPlayer),
    /// Input to forward to the displays of the paired seat's room.
    ControllerInput(ControllerInput),
    Ping,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairWithPlayer {
    #[serde(deserialize_with = "string_or_number")]
    pub room_pin: String,
    #[serde(alias = "deviceCode", deserialize_with = "string_or_number")]
    pub pairing_code: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerInput {
    pub action: String,
    #[serde(default)]
    pub timestamp: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joystick_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joystick_y: Option<f64>,
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

/// Every frame the server sends.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ServerEvent {
    /// The single reply to a request that carried an `ack` id.
    Ack(Ack),
    RoomPlayersUpdated(RoomPlayersUpdated),
    /// The host left; the room no longer exists.
    #[serde(rename_all = "camelCase")]
    RoomClosed { room_id: RoomId },
    /// Sent to a seat's occupant when a controller pairs with it.
    ControllerConnected(ControllerConnected),
    ControllerInput(ControllerInputEvent),
    GameCountdown(GameCountdown),
    GameStart(GameStart),
    System { msg: String },
    Message(RelayedMessage),
    FrontClicked { from: String, ts: Value },
}

/// Acknowledgement payload.
///
/// On success the fields of `data` are merged into the frame:
///
/// ```text
/// {"event":"ack","ack":4,"success":true,"roomId":"room_1_x","seatNumber":2,...}
/// {"event":"ack","ack":5,"success":false,"error":"Room is full"}
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ack {
    pub ack: u64,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(flatten)]
    pub data: Option<AckData>,
}

impl Ack {
    /// A successful acknowledgement carrying `data`.
    pub fn ok(ack: u64, data: AckData) -> Self {
        Self {
            ack,
            success: true,
            error: None,
            data: Some(data),
        }
    }

    /// A failed acknowledgement; `error` is the failure's display string.
    pub fn err(ack: u64, error: impl ToString) -> Self {
        Self {
            ack,
            success: false,
            error: Some(error.to_string()),
            data: None,
        }
    }
}

/// Success payloads, one per request kind.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum AckData {
    #[serde(rename_all = "camelCase")]
    RoomCreated {
        room_id: RoomId,
        pin: Pin,
        room_name: String,
        max_seats: usize,
        seat_number: u32,
        pairing_code: PairingCode,
    },
    #[serde(rename_all = "camelCase")]
    SeatJoined {
        room_id: RoomId,
        room_name: String,
        seat_number: u32,
        pairing_code: PairingCode,
        player_id: String,
    },
    /// Controller PIN lookup; the next step is entering a pairing code.
    #[serde(rename_all = "camelCase")]
    RoomFound {
        room_id: RoomId,
        room_name: String,
        waiting_for_pairing_code: bool,
    },
    #[serde(rename_all = "camelCase")]
    Paired {
        room_id: RoomId,
        room_name: String,
        seat_number: u32,
        player_id: String,
    },
    #[serde(rename_all = "camelCase")]
    ReadyUpdated { room_id: RoomId, ready: bool },
    #[serde(rename_all = "camelCase")]
    CountdownStarted {
        room_id: RoomId,
        start_at: u64,
        duration_ms: u64,
    },
    /// Controller input was forwarded to `delivered` displays.
    #[serde(rename_all = "camelCase")]
    InputForwarded { seat_number: u32, delivered: usize },
    Relayed { delivered: usize },
    ChannelJoined { room: String },
    Pong { reply: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoomPlayersUpdated {
    #[serde(flatten)]
    pub snapshot: RoomSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub change: Option<RosterChange>,
}

/// What caused a `room_players_updated` broadcast.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RosterChange {
    #[serde(rename_all = "camelCase")]
    PlayerJoined { player_id: String },
    #[serde(rename_all = "camelCase")]
    PlayerDisconnected { player_id: String },
    #[serde(rename_all = "camelCase")]
    ControllerConnected { player_id: String },
    #[serde(rename_all = "camelCase")]
    ControllerDisconnected { player_id: String },
    #[serde(rename_all = "camelCase")]
    ReadyChanged { player_id: String, ready: bool },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerConnected {
    pub room_id: RoomId,
    pub seat_number: u32,
    pub controller_id: String,
}

/// Controller input as forwarded to the displays of the room.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControllerInputEvent {
    /// The seat occupant's id, not the controller's.
    pub player_id: String,
    pub seat_number: u32,
    pub action: String,
    pub timestamp: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub joystick_x: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub joystick_y: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameCountdown {
    pub room_id: RoomId,
    /// Unix millis at which the round starts.
    pub start_at: u64,
    pub duration_ms: u64,
    pub game_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GameStart {
    pub room_id: RoomId,
    pub game_type: String,
    pub players: Vec<PlayerView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelayedMessage {
    pub from: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub room: Option<String>,
    pub data: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn decode_display(raw: &str) -> Request<DisplayRequest> {
        serde_json::from_str(raw).unwrap()
    }

    fn decode_controller(raw: &str) -> Request<ControllerRequest> {
        serde_json::from_str(raw).unwrap()
    }

    // =====================================================================
    // Inbound
    // =====================================================================

    #[test]
    fn test_create_room_with_ack_and_defaults() {
        let req = decode_display(r#"{"event":"create_room","ack":7}"#);
        assert_eq!(req.ack, Some(7));
        assert_eq!(req.body, DisplayRequest::CreateRoom(CreateRoom::default()));
    }

    #[test]
    fn test_create_room_accepts_max_players_alias() {
        let req = decode_display(r#"{"event":"create_room","name":"Den","maxPlayers":2}"#);
        assert_eq!(req.ack, None);
        assert_eq!(
            req.body,
            DisplayRequest::CreateRoom(CreateRoom {
                name: Some("Den".into()),
                max_seats: Some(2),
            })
        );
    }

    #[test]
    fn test_join_room_by_pin_accepts_numeric_pin() {
        let req = decode_display(r#"{"event":"join_room_by_pin","pin":4821}"#);
        assert_eq!(req.body, DisplayRequest::JoinRoomByPin { pin: "4821".into() });
    }

    #[test]
    fn test_toggle_ready_and_start_game_use_camel_case() {
        let req = decode_display(r#"{"event":"toggle_ready","roomId":"room_1_a","ready":true}"#);
        assert_eq!(
            req.body,
            DisplayRequest::ToggleReady(ToggleReady {
                room_id: RoomId::new("room_1_a"),
                ready: true,
            })
        );

        let req = decode_display(r#"{"event":"start_game","roomId":"room_1_a","gameType":"race"}"#);
        assert_eq!(
            req.body,
            DisplayRequest::StartGame(StartGame {
                room_id: RoomId::new("room_1_a"),
                game_type: Some("race".into()),
            })
        );
    }

    #[test]
    fn test_message_relay_and_ping() {
        let req = decode_display(r#"{"event":"message","room":"lobby","data":{"hi":1}}"#);
        assert_eq!(
            req.body,
            DisplayRequest::Message(Relay {
                room: Some("lobby".into()),
                data: json!({"hi": 1}),
            })
        );

        let req = decode_display(r#"{"event":"ping","ack":1}"#);
        assert_eq!(req.body, DisplayRequest::Ping);
    }

    #[test]
    fn test_button_clicked_keeps_timestamp_verbatim() {
        let req = decode_display(r#"{"event":"button_clicked","room":"room_1_a","ts":1700000000123}"#);
        assert_eq!(
            req.body,
            DisplayRequest::ButtonClicked(ButtonClick {
                room: Some("room_1_a".into()),
                ts: json!(1700000000123u64),
            })
        );

        let json = serde_json::to_value(ServerEvent::FrontClicked {
            from: "frontend".into(),
            ts: json!(1700000000123u64),
        })
        .unwrap();
        assert_eq!(
            json,
            json!({"event":"front_clicked","from":"frontend","ts":1700000000123u64})
        );
    }

    #[test]
    fn test_pair_with_player_accepts_device_code_alias() {
        let req = decode_controller(
            r#"{"event":"pair_with_player","ack":2,"roomPin":"4821","deviceCode":"317"}"#,
        );
        assert_eq!(req.ack, Some(2));
        assert_eq!(
            req.body,
            ControllerRequest::PairWithPlayer(PairWithPlayer {
                room_pin: "4821".into(),
                pairing_code: "317".into(),
            })
        );
    }

    #[test]
    fn test_controller_input_optional_axes() {
        let req = decode_controller(
            r#"{"event":"controller_input","action":"move","joystickX":0.5,"joystickY":-1.0}"#,
        );
        let ControllerRequest::ControllerInput(input) = req.body else {
            panic!("expected controller input");
        };
        assert_eq!(input.action, "move");
        assert_eq!(input.timestamp, None);
        assert_eq!(input.joystick_x, Some(0.5));
        assert_eq!(input.joystick_y, Some(-1.0));
    }

    #[test]
    fn test_display_only_event_rejected_on_controller() {
        let result: Result<Request<ControllerRequest>, _> =
            serde_json::from_str(r#"{"event":"start_game","roomId":"room_1_a"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_unknown_event_rejected() {
        let result: Result<Request<DisplayRequest>, _> =
            serde_json::from_str(r#"{"event":"fly_to_moon"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_ack_probe_reads_ack_from_bad_request() {
        let probe: AckProbe =
            serde_json::from_str(r#"{"event":"toggle_ready","ack":9,"ready":"yes"}"#).unwrap();
        assert_eq!(probe.ack, Some(9));

        let probe: AckProbe = serde_json::from_str(r#"{"event":"nope"}"#).unwrap();
        assert_eq!(probe.ack, None);
    }

    // =====================================================================
    // Outbound
    // =====================================================================

    #[test]
    fn test_ack_success_merges_payload() {
        let event = ServerEvent::Ack(Ack::ok(
            4,
            AckData::SeatJoined {
                room_id: RoomId::new("room_1_a"),
                room_name: "Room 4821".into(),
                seat_number: 2,
                pairing_code: PairingCode::parse("317").unwrap(),
                player_id: "conn-3".into(),
            },
        ));
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["event"], "ack");
        assert_eq!(json["ack"], 4);
        assert_eq!(json["success"], true);
        assert_eq!(json["roomId"], "room_1_a");
        assert_eq!(json["seatNumber"], 2);
        assert_eq!(json["pairingCode"], "317");
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_ack_failure_carries_error_only() {
        let event = ServerEvent::Ack(Ack::err(5, "Room is full"));
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(
            json,
            json!({"event":"ack","ack":5,"success":false,"error":"Room is full"})
        );
    }

    #[test]
    fn test_room_players_updated_flattens_snapshot() {
        let event = ServerEvent::RoomPlayersUpdated(RoomPlayersUpdated {
            snapshot: RoomSnapshot {
                room_id: RoomId::new("room_1_a"),
                room_name: "Den".into(),
                players: vec![],
            },
            change: Some(RosterChange::PlayerJoined {
                player_id: "conn-2".into(),
            }),
        });
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["event"], "room_players_updated");
        assert_eq!(json["roomId"], "room_1_a");
        assert_eq!(json["roomName"], "Den");
        assert_eq!(json["players"], json!([]));
        assert_eq!(json["change"]["kind"], "player_joined");
        assert_eq!(json["change"]["playerId"], "conn-2");
    }

    #[test]
    fn test_game_countdown_wire_format() {
        let event = ServerEvent::GameCountdown(GameCountdown {
            room_id: RoomId::new("room_1_a"),
            start_at: 1_700_000_003_000,
            duration_ms: 3000,
            game_type: "race".into(),
        });
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(
            json,
            json!({
                "event": "game_countdown",
                "roomId": "room_1_a",
                "startAt": 1_700_000_003_000_u64,
                "durationMs": 3000,
                "gameType": "race"
            })
        );
    }

    #[test]
    fn test_room_closed_and_system_events() {
        let json = serde_json::to_value(ServerEvent::RoomClosed {
            room_id: RoomId::new("room_2_b"),
        })
        .unwrap();
        assert_eq!(json, json!({"event":"room_closed","roomId":"room_2_b"}));

        let json = serde_json::to_value(ServerEvent::System { msg: "hi".into() }).unwrap();
        assert_eq!(json, json!({"event":"system","msg":"hi"}));
    }

    #[test]
    fn test_controller_input_event_omits_missing_axes() {
        let event = ServerEvent::ControllerInput(ControllerInputEvent {
            player_id: "conn-1".into(),
            seat_number: 1,
            action: "jump".into(),
            timestamp: 12,
            joystick_x: None,
            joystick_y: None,
        });
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["event"], "controller_input");
        assert_eq!(json["playerId"], "conn-1");
        assert!(json.get("joystickX").is_none());
    }
}
