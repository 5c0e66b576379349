use std::{net::UdpSocket, time::Instant};

use rand::Rng;

use crate::{
    conf::Conf,
    share::{create_udp_socket, parse_int, recv_datagram, PacketReader},
    status::ServerStatus,
    McstatError,
};

const MAGIC: [u8; 2] = [0xFE, 0xFD];
const PACKET_TYPE_HANDSHAKE: u8 = 0x09;
const PACKET_TYPE_STAT: u8 = 0x00;

/// Session ids keep only the low nibble of every byte so they survive the
/// server's string round trip.
const SESSION_ID_MASK: u32 = 0x0F0F0F0F;

/// Byte literal preceding the full query key/value section.
const KV_SECTION_PREAMBLE: [u8; 11] = [
    0x73, 0x70, 0x6C, 0x69, 0x74, 0x6E, 0x75, 0x6D, 0x00, 0x80, 0x00,
];

/// Byte literal separating the key/value section from the player list.
const PLAYER_SECTION_PREAMBLE: [u8; 10] =
    [0x01, 0x70, 0x6C, 0x61, 0x79, 0x65, 0x72, 0x5F, 0x00, 0x00];

/// Transient handshake state for one query call.
///
/// The socket closes when the session drops at the end of the call;
/// sessions are never reused.
struct Session {
    socket: UdpSocket,
    session_id: u32,
    challenge_token: i32,
    latency_ms: u64,
}

/// Get basic [stat](https://wiki.vg/Query#Basic_stat) info.
///
/// Latency covers the handshake round trip only.
pub fn basic_query(conf: &Conf) -> Result<ServerStatus, McstatError> {
    let session = start_session(conf)?;
    let body = stat_request(&session, false)?;

    process_basic_body(&body, session.latency_ms)
}

/// Get full [stat](https://wiki.vg/Query#Full_stat) info, including the
/// plugin and player lists.
pub fn full_query(conf: &Conf) -> Result<ServerStatus, McstatError> {
    let session = start_session(conf)?;
    let body = stat_request(&session, true)?;

    process_full_body(&body, session.latency_ms)
}

/// Perform the challenge-token [handshake](https://wiki.vg/Query#Handshake).
fn start_session(conf: &Conf) -> Result<Session, McstatError> {
    let socket = create_udp_socket(conf)?;
    let session_id = rand::rng().random_range(1..=u32::MAX) & SESSION_ID_MASK;

    let mut handshake = Vec::from(MAGIC);

    handshake.push(PACKET_TYPE_HANDSHAKE);
    handshake.extend(session_id.to_be_bytes());

    let started = Instant::now();

    socket.send(&handshake)?;

    let response = recv_datagram(&socket)?;
    let latency_ms = started.elapsed().as_millis() as u64;
    let mut reader = PacketReader::new(&response);
    let packet_type = reader.read_u8()?;
    let echoed_id = reader.read_u32_be()?;

    if packet_type != PACKET_TYPE_HANDSHAKE || echoed_id != session_id {
        tracing::warn!(packet_type, echoed_id, session_id, "handshake response rejected");

        return Err(McstatError::BadHandshake(format!(
            "got type {:#04x} session id {:#010x}, expected type 0x09 session id {:#010x}",
            packet_type, echoed_id, session_id
        )));
    }

    // The challenge token is a null-terminated ASCII integer.
    let token = reader.read_nt_str()?;
    let challenge_token = token.trim().parse::<i32>().map_err(|_| {
        McstatError::BadHandshake(format!("challenge token is not an integer: {:?}", token))
    })?;

    tracing::debug!(challenge_token, latency_ms, "query handshake complete");

    Ok(Session {
        socket,
        session_id,
        challenge_token,
        latency_ms,
    })
}

/// Send a stat [request](https://wiki.vg/Query#Request_2) and return the
/// validated response body.
fn stat_request(session: &Session, full_query: bool) -> Result<Vec<u8>, McstatError> {
    let mut request = Vec::from(MAGIC);

    request.push(PACKET_TYPE_STAT);
    request.extend(session.session_id.to_be_bytes());
    request.extend(session.challenge_token.to_be_bytes());

    if full_query {
        // Full stat is selected by padding the payload to 8 bytes.
        request.extend([0u8; 4]);
    }

    session.socket.send(&request)?;

    let response = recv_datagram(&session.socket)?;
    let mut reader = PacketReader::new(&response);
    let packet_type = reader.read_u8()?;
    let echoed_id = reader.read_u32_be()?;

    if packet_type != PACKET_TYPE_STAT || echoed_id != session.session_id {
        tracing::warn!(
            packet_type,
            echoed_id,
            session_id = session.session_id,
            "stat response rejected"
        );

        return Err(McstatError::BadQueryResponse(format!(
            "got type {:#04x} session id {:#010x}, expected type 0x00 session id {:#010x}",
            packet_type, echoed_id, session.session_id
        )));
    }

    Ok(response[5..].to_vec())
}

/// Five null-terminated strings, a little-endian port and the ip.
fn process_basic_body(body: &[u8], latency_ms: u64) -> Result<ServerStatus, McstatError> {
    let mut reader = PacketReader::new(body);
    let motd = reader.read_nt_str()?;
    let gametype = reader.read_nt_str()?;
    let map = reader.read_nt_str()?;
    let player_count = parse_int(&reader.read_nt_str()?, "player_count")?;
    let player_max = parse_int(&reader.read_nt_str()?, "player_max")?;
    let port = reader.read_u16_le()?;
    let ip = reader.read_nt_str()?;

    Ok(ServerStatus {
        motd: Some(motd),
        gametype: Some(gametype),
        map: Some(map),
        player_count: Some(player_count),
        player_max: Some(player_max),
        port: Some(port),
        ip: Some(ip),
        latency_ms,
        ..ServerStatus::default()
    })
}

/// Padded key/value section followed by the padded player list.
fn process_full_body(body: &[u8], latency_ms: u64) -> Result<ServerStatus, McstatError> {
    let mut reader = PacketReader::new(body);
    let mut status = ServerStatus {
        latency_ms,
        ..ServerStatus::default()
    };

    reader.expect(&KV_SECTION_PREAMBLE)?;

    loop {
        let (key, value) = reader.read_nt_kv()?;

        if key.is_empty() {
            break;
        }

        match key.as_str() {
            "numplayers" => status.player_count = Some(parse_int(&value, "numplayers")?),
            "maxplayers" => status.player_max = Some(parse_int(&value, "maxplayers")?),
            "hostname" => status.motd = Some(value),
            "hostip" => status.ip = Some(value),
            "hostport" => {
                status.port = Some(value.trim().parse::<u16>().map_err(|_| {
                    McstatError::MalformedField(format!("hostport: {:?}", value))
                })?)
            }
            "gametype" => status.gametype = Some(value),
            "map" => status.map = Some(value),
            "version" => status.server_version = Some(value),
            "plugins" => status.plugins = Some(process_plugins(&value)),
            other => tracing::debug!(key = other, "ignoring unmapped stat key"),
        }
    }

    reader.expect(&PLAYER_SECTION_PREAMBLE)?;

    let mut players = Vec::new();

    loop {
        let player = reader.read_nt_str()?;

        if player.is_empty() {
            break;
        }

        players.push(player);
    }

    status.players = Some(players);

    Ok(status)
}

/// Plugin list format: `SERVER_MOD_NAME[: PLUGIN_NAME(; PLUGIN_NAME...)]`.
fn process_plugins(plugin_str: &str) -> Vec<String> {
    let plugin_str = plugin_str.trim();

    if plugin_str.is_empty() {
        return Vec::new();
    }

    match plugin_str.split_once(':') {
        Some((_server_mod, plugins)) => plugins
            .split(';')
            .map(|plugin| plugin.trim().to_string())
            .collect(),
        None => vec![plugin_str.into()],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn basic_body_field_mapping() {
        let mut body = Vec::new();

        body.extend(b"A\0SMP\0world\03\020\0");
        body.extend(25565u16.to_le_bytes());
        body.extend(b"1.2.3.4\0");

        let status = process_basic_body(&body, 3).unwrap();

        assert_eq!(status.motd.as_deref(), Some("A"));
        assert_eq!(status.gametype.as_deref(), Some("SMP"));
        assert_eq!(status.map.as_deref(), Some("world"));
        assert_eq!(status.player_count, Some(3));
        assert_eq!(status.player_max, Some(20));
        assert_eq!(status.port, Some(25565));
        assert_eq!(status.ip.as_deref(), Some("1.2.3.4"));
        assert_eq!(status.latency_ms, 3);
        assert_eq!(status.players, None);
    }

    fn full_body(kv: &[(&str, &str)], players: &[&str]) -> Vec<u8> {
        let mut body = Vec::from(KV_SECTION_PREAMBLE);

        for (key, value) in kv {
            body.extend(key.as_bytes());
            body.push(0x00);
            body.extend(value.as_bytes());
            body.push(0x00);
        }

        body.push(0x00);
        body.extend(PLAYER_SECTION_PREAMBLE);

        for player in players {
            body.extend(player.as_bytes());
            body.push(0x00);
        }

        body.push(0x00);

        body
    }

    #[test]
    fn full_body_key_remap() {
        let body = full_body(
            &[
                ("hostname", "MyServer"),
                ("gametype", "SMP"),
                ("game_id", "MINECRAFT"),
                ("version", "1.20.4"),
                ("plugins", "Paper: Essentials; WorldEdit"),
                ("map", "world"),
                ("numplayers", "3"),
                ("maxplayers", "20"),
                ("hostport", "25565"),
                ("hostip", "1.2.3.4"),
            ],
            &["Alice", "Bob"],
        );
        let status = process_full_body(&body, 0).unwrap();

        assert_eq!(status.motd.as_deref(), Some("MyServer"));
        assert_eq!(status.player_count, Some(3));
        assert_eq!(status.player_max, Some(20));
        assert_eq!(status.server_version.as_deref(), Some("1.20.4"));
        assert_eq!(status.port, Some(25565));
        assert_eq!(status.ip.as_deref(), Some("1.2.3.4"));
        assert_eq!(
            status.plugins,
            Some(vec!["Essentials".into(), "WorldEdit".into()])
        );
        assert_eq!(status.players, Some(vec!["Alice".into(), "Bob".into()]));
    }

    #[test]
    fn corrupted_preamble_names_the_byte() {
        let mut body = full_body(&[("numplayers", "3")], &[]);

        // Corrupt one byte of the 11-byte preamble.
        body[4] ^= 0xFF;

        match process_full_body(&body, 0) {
            Err(McstatError::ProtocolMismatch { position, .. }) => assert_eq!(position, 4),
            other => panic!("expected ProtocolMismatch, got {:?}", other),
        }
    }

    #[test]
    fn empty_player_list() {
        let status = process_full_body(&full_body(&[], &[]), 0).unwrap();

        assert_eq!(status.players, Some(vec![]));
        assert_eq!(status.player_count, None);
    }

    #[test]
    fn plugin_string_forms() {
        assert!(process_plugins("").is_empty());
        assert_eq!(process_plugins("CraftBukkit"), vec!["CraftBukkit"]);
        assert_eq!(
            process_plugins("Paper: Essentials; WorldEdit"),
            vec!["Essentials", "WorldEdit"]
        );
    }
}
