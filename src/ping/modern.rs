use std::{
    io::{Read, Write},
    time::Instant,
};

use serde::Deserialize;
use serde_json::Value;

use crate::{
    conf::Conf,
    share::create_tcp_socket,
    status::{DebugPayload, ServerStatus},
    varint::{encode_varint, read_varint_capture},
    McstatError,
};

/// Handshake next state requesting the status screen.
const NEXT_STATE_STATUS: i32 = 1;

/// Status packets cannot be larger than 2^21 bytes.
const MAX_STATUS_LEN: i32 = 0x20_0000;

#[derive(Deserialize)]
struct StatusJson {
    version: Option<VersionJson>,
    players: Option<PlayersJson>,
    description: Option<Value>,
}

#[derive(Deserialize)]
struct VersionJson {
    name: String,
    protocol: i64,
}

#[derive(Deserialize)]
struct PlayersJson {
    online: i64,
    max: i64,
    sample: Option<Vec<SamplePlayer>>,
}

#[derive(Deserialize)]
struct SamplePlayer {
    name: String,
}

/// Ping a server using the
/// [1.7+ protocol](https://wiki.vg/Server_List_Ping#Current_.281.7.2B.29).
///
/// Latency is measured from sending the handshake to the arrival of the
/// response length prefix, so transferring a large JSON body does not
/// inflate the measurement.
pub fn ping(conf: &Conf) -> Result<ServerStatus, McstatError> {
    let mut socket = create_tcp_socket(conf)?;
    let handshake_packet = build_handshake_packet(conf);
    let status_request_packet = build_status_request_packet();

    let started = Instant::now();

    socket.write_all(&handshake_packet)?;
    socket.write_all(&status_request_packet)?;

    let mut raw = Vec::new();
    let _packet_len = read_varint_capture(&mut socket, &mut raw)?;
    let latency_ms = started.elapsed().as_millis() as u64;
    let packet_id = read_varint_capture(&mut socket, &mut raw)?;

    if packet_id != 0x00 {
        return Err(McstatError::BadReply(format!(
            "expected status packet id 0x00, got {:#04x}",
            packet_id
        )));
    }

    let body_len = read_varint_capture(&mut socket, &mut raw)?;

    if !(0..=MAX_STATUS_LEN).contains(&body_len) {
        return Err(McstatError::BadReply(format!(
            "unreasonable JSON length: {}",
            body_len
        )));
    }

    // read_exact loops over partial reads until the full body arrived.
    let mut body = vec![0u8; body_len as usize];

    socket.read_exact(&mut body)?;

    let json = serde_json::from_slice::<StatusJson>(&body)?;
    let mut status = build_status(json, latency_ms);

    if conf.debug {
        raw.extend_from_slice(&body);
        status.debug = Some(DebugPayload {
            request: [handshake_packet, status_request_packet].concat(),
            response: raw,
        });
    }

    Ok(status)
}

fn build_status(json: StatusJson, latency_ms: u64) -> ServerStatus {
    let mut status = ServerStatus {
        latency_ms,
        ..ServerStatus::default()
    };

    if let Some(version) = json.version {
        status.server_version = Some(version.name);
        status.protocol_version = Some(version.protocol);
    }

    if let Some(players) = json.players {
        status.player_count = Some(players.online);
        status.player_max = Some(players.max);
        status.players = Some(
            players
                .sample
                .unwrap_or_default()
                .into_iter()
                .map(|player| player.name)
                .collect(),
        );
    }

    // The description is chat-component JSON in the wild. Plain strings
    // pass through verbatim, structured values keep their JSON form.
    status.motd = json.description.map(|desc| match desc {
        Value::String(text) => text,
        other => other.to_string(),
    });

    status
}

/// Build the handshake [packet](https://wiki.vg/Protocol#Packet_format).
fn build_handshake_packet(conf: &Conf) -> Vec<u8> {
    let mut packet_data = Vec::<u8>::new();

    // By convention -1 when pinging to determine the version, see
    // protocol version [numbers](https://wiki.vg/Protocol_version_numbers).
    packet_data.extend(encode_varint(-1));
    // Server address, UTF-8 prefixed with its byte length as a VarInt.
    packet_data.extend(encode_varint(conf.host.len() as i32));
    packet_data.extend(conf.host.as_bytes());
    packet_data.extend(conf.port.to_be_bytes());
    packet_data.extend(encode_varint(NEXT_STATE_STATUS));

    wrap_packet(packet_data)
}

/// Build the empty status request packet.
fn build_status_request_packet() -> Vec<u8> {
    wrap_packet(Vec::new())
}

/// Frame a packet id 0x00 payload with the outer length VarInt.
fn wrap_packet(packet_data: Vec<u8>) -> Vec<u8> {
    let mut packet = encode_varint(1 + packet_data.len() as i32);

    packet.extend(encode_varint(0x00));
    packet.extend(packet_data);

    packet
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_request_is_two_bytes() {
        assert_eq!(build_status_request_packet(), vec![0x01, 0x00]);
    }

    #[test]
    fn handshake_carries_host_and_port() {
        let conf = Conf::create_with_port("mc.example.com", 25566);
        let packet = build_handshake_packet(&conf);

        // Outer length, packet id, protocol version -1 (5 bytes).
        assert_eq!(packet[1], 0x00);
        assert_eq!(&packet[2..7], &[0xFF, 0xFF, 0xFF, 0xFF, 0x0F]);
        assert_eq!(packet[7] as usize, conf.host.len());
        assert_eq!(&packet[8..8 + conf.host.len()], conf.host.as_bytes());
        assert_eq!(
            &packet[8 + conf.host.len()..10 + conf.host.len()],
            &25566u16.to_be_bytes()
        );
        assert_eq!(*packet.last().unwrap(), 0x01);
    }

    #[test]
    fn plain_description_passes_through() {
        let json = serde_json::from_str::<StatusJson>(
            r#"{
                "version": {"name": "1.20.4", "protocol": 765},
                "players": {"online": 3, "max": 20, "sample": [{"name": "Alice", "id": "0-0"}]},
                "description": "A Minecraft Server"
            }"#,
        )
        .unwrap();
        let status = build_status(json, 11);

        assert_eq!(status.motd.as_deref(), Some("A Minecraft Server"));
        assert_eq!(status.server_version.as_deref(), Some("1.20.4"));
        assert_eq!(status.protocol_version, Some(765));
        assert_eq!(status.player_count, Some(3));
        assert_eq!(status.player_max, Some(20));
        assert_eq!(status.players, Some(vec!["Alice".into()]));
        assert_eq!(status.latency_ms, 11);
    }

    #[test]
    fn structured_description_keeps_json_form() {
        let json = serde_json::from_str::<StatusJson>(
            r#"{"description": {"text": "styled"}}"#,
        )
        .unwrap();
        let status = build_status(json, 0);

        assert_eq!(status.motd.as_deref(), Some(r#"{"text":"styled"}"#));
        assert_eq!(status.player_count, None);
        assert_eq!(status.players, None);
    }

    #[test]
    fn missing_sample_yields_empty_player_list() {
        let json = serde_json::from_str::<StatusJson>(
            r#"{"players": {"online": 0, "max": 20}}"#,
        )
        .unwrap();
        let status = build_status(json, 0);

        assert_eq!(status.players, Some(vec![]));
    }
}
