use std::{
    io::{ErrorKind, Read, Write},
    time::Instant,
};

use crate::{
    conf::Conf,
    share::{bufs_to_utf16_str, create_tcp_socket, parse_int, str_to_utf16_bufs},
    status::{DebugPayload, ServerStatus},
    McstatError,
};

/// Channel name of the plugin-message sub-packet requesting host info.
const PING_HOST_CHANNEL: &str = "MC|PingHost";

/// Protocol version advertised in the request (1.6.x).
const PROTOCOL_VERSION: u8 = 0x49;

/// Port placeholder at the end of the request. Servers answer regardless
/// of the value, 25565 by convention.
const PORT_PLACEHOLDER: u32 = 25565;

/// Legacy responses fit well below this; longer data is cut off.
const MAX_RESPONSE_LEN: u64 = 2048;

/// Ping a server [before 1.7](https://wiki.vg/Server_List_Ping#1.4_to_1.5).
///
/// Latency covers the whole connect + request + response exchange.
pub fn ping(conf: &Conf) -> Result<ServerStatus, McstatError> {
    let request = build_request(&conf.host);
    let started = Instant::now();
    let mut socket = create_tcp_socket(conf)?;

    socket.write_all(&request)?;

    let mut response = Vec::new();

    if let Err(err) = Read::by_ref(&mut socket)
        .take(MAX_RESPONSE_LEN)
        .read_to_end(&mut response)
    {
        // A read timeout only fails the probe when nothing arrived at all;
        // a server that answered but kept the connection open is fine.
        let timed_out = matches!(err.kind(), ErrorKind::TimedOut | ErrorKind::WouldBlock);

        if !timed_out || response.is_empty() {
            return Err(err.into());
        }
    }

    let latency_ms = started.elapsed().as_millis() as u64;
    let mut status = process_response(&response, latency_ms)?;

    if conf.debug {
        status.debug = Some(DebugPayload { request, response });
    }

    Ok(status)
}

/// Build the 0xFE01 ping with the 0xFA "MC|PingHost" plugin message.
fn build_request(host: &str) -> Vec<u8> {
    let channel = str_to_utf16_bufs(PING_HOST_CHANNEL);
    let host_utf16 = str_to_utf16_bufs(host);
    let mut request = vec![0xFE, 0x01, 0xFA];

    request.extend(((channel.len() / 2) as u16).to_be_bytes());
    request.extend(channel);
    // Length of the rest: protocol byte + host length prefix + host + port.
    request.extend(((7 + host_utf16.len()) as u16).to_be_bytes());
    request.push(PROTOCOL_VERSION);
    request.extend(((host_utf16.len() / 2) as u16).to_be_bytes());
    request.extend(host_utf16);
    request.extend(PORT_PLACEHOLDER.to_be_bytes());

    request
}

fn process_response(bufs: &[u8], latency_ms: u64) -> Result<ServerStatus, McstatError> {
    match bufs.first() {
        Some(&0xFF) => {}
        Some(&buf) => {
            return Err(McstatError::BadReply(format!(
                "expected first byte 0xFF, got 0x{:02X}",
                buf
            )));
        }
        None => return Err(McstatError::BadReply("empty response".into())),
    }

    // Strip the kick id and the u16 length of the string that follows.
    let payload = bufs_to_utf16_str(bufs.get(3..).unwrap_or_default())?;

    // "§1", then protocol version, server version, MOTD, player count and
    // max players, all separated by null code points.
    let fields = payload.split('\0').collect::<Vec<_>>();

    if fields.len() < 6 {
        return Err(McstatError::BadReply(format!(
            "expected 6 response fields, got {}",
            fields.len()
        )));
    }

    Ok(ServerStatus {
        protocol_version: Some(parse_int(fields[1], "protocol_version")?),
        server_version: Some(fields[2].into()),
        motd: Some(fields[3].into()),
        player_count: Some(parse_int(fields[4], "player_count")?),
        player_max: Some(parse_int(fields[5], "player_max")?),
        latency_ms,
        ..ServerStatus::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn encode_response(fields: &[&str]) -> Vec<u8> {
        let payload = str_to_utf16_bufs(&fields.join("\0"));
        let mut bufs = vec![0xFF];

        bufs.extend(((payload.len() / 2) as u16).to_be_bytes());
        bufs.extend(payload);

        bufs
    }

    #[test]
    fn request_layout() {
        let request = build_request("example.com");

        assert_eq!(&request[..3], &[0xFE, 0x01, 0xFA]);
        // Channel name length in UTF-16 units.
        assert_eq!(&request[3..5], &[0x00, 0x0B]);
        // Remainder length: 7 + 2 * len("example.com").
        let offset = 5 + 2 * PING_HOST_CHANNEL.len();
        assert_eq!(
            &request[offset..offset + 2],
            &(7u16 + 22).to_be_bytes()
        );
        assert_eq!(request[offset + 2], PROTOCOL_VERSION);
        assert_eq!(&request[request.len() - 4..], &25565u32.to_be_bytes());
    }

    #[test]
    fn parses_well_formed_response() {
        let bufs = encode_response(&["§1", "73", "1.6.2", "A Minecraft Server", "5", "30"]);
        let status = process_response(&bufs, 7).unwrap();

        assert_eq!(status.protocol_version, Some(73));
        assert_eq!(status.server_version.as_deref(), Some("1.6.2"));
        assert_eq!(status.motd.as_deref(), Some("A Minecraft Server"));
        assert_eq!(status.player_count, Some(5));
        assert_eq!(status.player_max, Some(30));
        assert_eq!(status.latency_ms, 7);
    }

    #[test]
    fn rejects_wrong_marker_byte() {
        assert!(matches!(
            process_response(&[0x00, 0x01, 0x02], 0),
            Err(McstatError::BadReply(_))
        ));
        assert!(matches!(
            process_response(&[], 0),
            Err(McstatError::BadReply(_))
        ));
    }

    #[test]
    fn rejects_missing_fields() {
        let bufs = encode_response(&["§1", "73", "1.6.2"]);

        assert!(matches!(
            process_response(&bufs, 0),
            Err(McstatError::BadReply(_))
        ));
    }
}
