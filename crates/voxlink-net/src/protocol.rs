//! The session wire protocol.
//!
//! Inbound frames are single JSON objects whose fields the server sets
//! independently; one frame may carry several messages. Outbound frames are
//! JSON objects, optionally preceded by a one-digit message-class prefix the
//! server routes on: `0` for authentication, `1` for position updates, none
//! for chat and seed announcements.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Prefix for authentication-class frames.
pub const AUTH_PREFIX: char = '0';

/// Prefix for position-class frames.
pub const POSITION_PREFIX: char = '1';

/// Separator between tokens in a batched peer-joined announcement.
pub const TOKEN_DELIMITER: &str = "___";

/// Errors raised while decoding or encoding frames.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The frame was not a JSON object.
    #[error("malformed frame: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// A decoded inbound frame. Every field is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InboundFrame {
    set_ws_token: Option<Value>,
    set_token: Option<Value>,
    fail_login: Option<Value>,
    set_new_ws_token: Option<Value>,
    game_disconnected_message: Option<Value>,
    set_user_mount: Option<Value>,
    set_seed: Option<Value>,
    set_user_name: Option<Value>,
    game_message: Option<Value>,
    x: Option<Value>,
    z: Option<Value>,
    y: Option<Value>,
    c: Option<Value>,
    chat_message: Option<Value>,
    user_name: Option<Value>,
    ws_token: Option<Value>,
    chat_server_message: Option<Value>,
}

/// One meaningful message extracted from an [`InboundFrame`].
#[derive(Debug, Clone, PartialEq)]
pub enum InboundMessage {
    /// Session token assigned by the server on connect.
    WsToken(String),
    /// Account token: authentication succeeded.
    UserToken(String),
    /// Authentication failed, with the server's reason.
    LoginFailed(String),
    /// One or more peers joined.
    PeersJoined(Vec<String>),
    /// A peer left.
    PeerLeft(String),
    /// Number of peers in the session, including this one.
    RosterSize(u32),
    /// World seed announced by the host.
    Seed(String),
    /// Display name assigned to this client.
    UserName(String),
    /// A peer moved.
    PeerPosition {
        /// Peer session token.
        token: String,
        /// World X.
        x: f64,
        /// World Z.
        z: f64,
        /// World Y.
        y: f64,
        /// Camera yaw.
        camera_angle: f64,
    },
    /// A chat line from a player.
    Chat {
        /// Sender's display name.
        user_name: String,
        /// Message text.
        text: String,
        /// Sender's session token, if the server included it.
        ws_token: Option<String>,
    },
    /// A chat line from the server itself.
    ServerChat(String),
}

/// A field counts as present when it is a non-empty string, a non-zero
/// number, or `true`. Anything else is treated as absent.
fn text(field: &Option<Value>) -> Option<String> {
    match field.as_ref()? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        Value::Bool(true) => Some("true".to_string()),
        _ => None,
    }
}

/// Coordinates arrive as numbers or numeric strings.
fn number(field: &Option<Value>) -> Option<f64> {
    let value: f64 = match field.as_ref()? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse().ok()?,
        _ => return None,
    };
    value.is_finite().then_some(value)
}

impl InboundFrame {
    /// Decode one frame.
    pub fn parse(raw: &str) -> Result<Self, ProtocolError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// The messages carried by this frame, in the order they must be applied.
    ///
    /// Fields that are present but unusable (a non-numeric roster size, a
    /// position with missing coordinates) are skipped.
    pub fn messages(&self) -> Vec<InboundMessage> {
        let mut out = Vec::new();

        if let Some(token) = text(&self.set_ws_token) {
            out.push(InboundMessage::WsToken(token));
        }
        if let Some(token) = text(&self.set_token) {
            out.push(InboundMessage::UserToken(token));
        }
        if let Some(reason) = text(&self.fail_login) {
            out.push(InboundMessage::LoginFailed(reason));
        }
        if let Some(batch) = text(&self.set_new_ws_token) {
            let tokens = batch
                .split(TOKEN_DELIMITER)
                .filter(|t| !t.is_empty())
                .map(str::to_string)
                .collect();
            out.push(InboundMessage::PeersJoined(tokens));
        }
        if let Some(token) = text(&self.game_disconnected_message) {
            out.push(InboundMessage::PeerLeft(token));
        }
        if let Some(size) = text(&self.set_user_mount) {
            match size.trim().parse() {
                Ok(size) => out.push(InboundMessage::RosterSize(size)),
                Err(_) => tracing::debug!("Ignoring non-numeric roster size {:?}", size),
            }
        }
        if let Some(seed) = text(&self.set_seed) {
            out.push(InboundMessage::Seed(seed));
        }
        if let Some(name) = text(&self.set_user_name) {
            out.push(InboundMessage::UserName(name));
        }
        if let Some(token) = text(&self.game_message) {
            match (
                number(&self.x),
                number(&self.z),
                number(&self.y),
                number(&self.c),
            ) {
                (Some(x), Some(z), Some(y), Some(camera_angle)) => {
                    out.push(InboundMessage::PeerPosition {
                        token,
                        x,
                        z,
                        y,
                        camera_angle,
                    })
                }
                _ => tracing::debug!("Ignoring position update with bad coordinates"),
            }
        }
        if let Some(message) = text(&self.chat_message) {
            out.push(InboundMessage::Chat {
                user_name: text(&self.user_name).unwrap_or_default(),
                text: message,
                ws_token: text(&self.ws_token),
            });
        }
        if let Some(message) = text(&self.chat_server_message) {
            out.push(InboundMessage::ServerChat(message));
        }

        out
    }
}

// ---------------------------------------------------------------------------
// Outbound
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct PasswordLogin<'a> {
    ask: &'static str,
    login: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TokenLogin<'a> {
    ask: &'static str,
    user_token: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PositionUpdate<'a> {
    game_message: &'a str,
    x: String,
    z: String,
    y: String,
    c: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SeedAnnouncement<'a> {
    set_seed: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ChatLine<'a> {
    user_name: &'a str,
    ws_token: &'a str,
    chat_message: &'a str,
}

fn prefixed<T: Serialize>(prefix: char, body: &T) -> Result<String, ProtocolError> {
    let json = serde_json::to_string(body)?;
    let mut out = String::with_capacity(json.len() + 1);
    out.push(prefix);
    out.push_str(&json);
    Ok(out)
}

/// `0{"ask":"loginThroughPass","login":..,"password":..}`
pub fn encode_password_login(login: &str, password: &str) -> Result<String, ProtocolError> {
    prefixed(
        AUTH_PREFIX,
        &PasswordLogin {
            ask: "loginThroughPass",
            login,
            password,
        },
    )
}

/// `0{"ask":"register","userToken":..}`
pub fn encode_token_login(user_token: &str) -> Result<String, ProtocolError> {
    prefixed(
        AUTH_PREFIX,
        &TokenLogin {
            ask: "register",
            user_token,
        },
    )
}

/// `1{"gameMessage":token,"x":..,"z":..,"y":..,"c":..}`; coordinates are sent
/// as strings.
pub fn encode_position(
    ws_token: &str,
    x: f64,
    y: f64,
    z: f64,
    camera_angle: f64,
) -> Result<String, ProtocolError> {
    prefixed(
        POSITION_PREFIX,
        &PositionUpdate {
            game_message: ws_token,
            x: x.to_string(),
            z: z.to_string(),
            y: y.to_string(),
            c: camera_angle.to_string(),
        },
    )
}

/// `{"setSeed":seed}`
pub fn encode_seed(seed: &str) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(&SeedAnnouncement { set_seed: seed })?)
}

/// `{"userName":..,"wsToken":..,"chatMessage":..}`
pub fn encode_chat(user_name: &str, ws_token: &str, text: &str) -> Result<String, ProtocolError> {
    Ok(serde_json::to_string(&ChatLine {
        user_name,
        ws_token,
        chat_message: text,
    })?)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn messages(raw: &str) -> Vec<InboundMessage> {
        InboundFrame::parse(raw).unwrap().messages()
    }

    #[test]
    fn test_single_field_frames() {
        assert_eq!(
            messages(r#"{"setWsToken":"t1"}"#),
            vec![InboundMessage::WsToken("t1".into())]
        );
        assert_eq!(
            messages(r#"{"setSeed":"abc"}"#),
            vec![InboundMessage::Seed("abc".into())]
        );
        assert_eq!(
            messages(r#"{"chatServerMessage":"hi"}"#),
            vec![InboundMessage::ServerChat("hi".into())]
        );
    }

    #[test]
    fn test_roster_size_accepts_string_or_number() {
        assert_eq!(
            messages(r#"{"setUserMount":"1"}"#),
            vec![InboundMessage::RosterSize(1)]
        );
        assert_eq!(
            messages(r#"{"setUserMount":3}"#),
            vec![InboundMessage::RosterSize(3)]
        );
        assert!(messages(r#"{"setUserMount":"many"}"#).is_empty());
    }

    #[test]
    fn test_joined_tokens_are_split() {
        assert_eq!(
            messages(r#"{"setNewWsToken":"a___b______c"}"#),
            vec![InboundMessage::PeersJoined(vec![
                "a".into(),
                "b".into(),
                "c".into()
            ])]
        );
    }

    #[test]
    fn test_position_with_string_coordinates() {
        assert_eq!(
            messages(r#"{"gameMessage":"p2","x":"1.5","z":"-3","y":"20","c":0.25}"#),
            vec![InboundMessage::PeerPosition {
                token: "p2".into(),
                x: 1.5,
                z: -3.0,
                y: 20.0,
                camera_angle: 0.25,
            }]
        );
        assert!(messages(r#"{"gameMessage":"p2","x":"1"}"#).is_empty());
    }

    #[test]
    fn test_chat_carries_sender() {
        assert_eq!(
            messages(r#"{"chatMessage":"hello","userName":"bob","wsToken":"t9"}"#),
            vec![InboundMessage::Chat {
                user_name: "bob".into(),
                text: "hello".into(),
                ws_token: Some("t9".into()),
            }]
        );
    }

    #[test]
    fn test_multi_field_frame_keeps_order() {
        let got = messages(r#"{"setUserMount":"2","setWsToken":"me","setSeed":"s"}"#);
        assert_eq!(
            got,
            vec![
                InboundMessage::WsToken("me".into()),
                InboundMessage::RosterSize(2),
                InboundMessage::Seed("s".into()),
            ]
        );
    }

    #[test]
    fn test_falsy_fields_are_absent() {
        assert!(messages(r#"{"setSeed":"","failLogin":false,"setUserMount":0}"#).is_empty());
        assert!(messages(r#"{"unknown":"x"}"#).is_empty());
    }

    #[test]
    fn test_malformed_frames_error() {
        assert!(InboundFrame::parse("not json").is_err());
        assert!(InboundFrame::parse("42").is_err());
        assert!(InboundFrame::parse(r#""text""#).is_err());
    }

    #[test]
    fn test_outbound_prefixes() {
        assert_eq!(
            encode_password_login("alex", "secret").unwrap(),
            r#"0{"ask":"loginThroughPass","login":"alex","password":"secret"}"#
        );
        assert_eq!(
            encode_token_login("tok").unwrap(),
            r#"0{"ask":"register","userToken":"tok"}"#
        );
        assert_eq!(
            encode_position("me", 1.5, 20.0, -3.0, 0.0).unwrap(),
            r#"1{"gameMessage":"me","x":"1.5","z":"-3","y":"20","c":"0"}"#
        );
        assert_eq!(encode_seed("abc").unwrap(), r#"{"setSeed":"abc"}"#);
        assert_eq!(
            encode_chat("bob", "t9", "hi").unwrap(),
            r#"{"userName":"bob","wsToken":"t9","chatMessage":"hi"}"#
        );
    }

    #[test]
    fn test_outbound_escapes_quotes() {
        let chat = encode_chat("bob", "t9", r#"say "hi""#).unwrap();
        let value: Value = serde_json::from_str(&chat).unwrap();
        assert_eq!(value["chatMessage"], r#"say "hi""#);
    }
}
