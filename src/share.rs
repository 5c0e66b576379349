use std::{
    io,
    net::{Ipv4Addr, SocketAddr, TcpStream, ToSocketAddrs, UdpSocket},
    time::{SystemTime, UNIX_EPOCH},
};

use crate::{conf::Conf, McstatError};

/// Hard cap on null-terminated string reads from untrusted peers.
pub const MAX_STRING_LEN: usize = 1024;

/// A query response occupies at most one UDP datagram.
const MAX_DATAGRAM_LEN: usize = 65_535;

/// Milliseconds since the Unix epoch. A clock set before the epoch
/// collapses to 0 rather than failing a probe over a timestamp.
pub fn epoch_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|t| t.as_millis() as u64)
        .unwrap_or_default()
}

fn resolve(conf: &Conf) -> Result<SocketAddr, McstatError> {
    let mut addrs = (conf.host.as_str(), conf.port)
        .to_socket_addrs()
        .map_err(|source| McstatError::Connect {
            addr: conf.to_string(),
            source,
        })?;

    addrs.next().ok_or_else(|| McstatError::Connect {
        addr: conf.to_string(),
        source: io::Error::new(io::ErrorKind::NotFound, "hostname resolved to no addresses"),
    })
}

/// Open a TCP connection bounded by the configured timeout on connect,
/// send and receive. The stream is closed when it goes out of scope on
/// any exit path.
pub fn create_tcp_socket(conf: &Conf) -> Result<TcpStream, McstatError> {
    let socket =
        TcpStream::connect_timeout(&resolve(conf)?, conf.timeout).map_err(|source| {
            McstatError::Connect {
                addr: conf.to_string(),
                source,
            }
        })?;

    socket.set_read_timeout(Some(conf.timeout))?;
    socket.set_write_timeout(Some(conf.timeout))?;

    Ok(socket)
}

/// Open a UDP socket connected to the target.
///
/// Binds an ephemeral local port so concurrent probes never contend over
/// the same bind address.
pub fn create_udp_socket(conf: &Conf) -> Result<UdpSocket, McstatError> {
    let socket = UdpSocket::bind((Ipv4Addr::UNSPECIFIED, 0))?;

    socket.set_read_timeout(Some(conf.timeout))?;
    socket.set_write_timeout(Some(conf.timeout))?;
    socket
        .connect(resolve(conf)?)
        .map_err(|source| McstatError::Connect {
            addr: conf.to_string(),
            source,
        })?;

    Ok(socket)
}

/// Receive one datagram from the connected socket.
pub fn recv_datagram(socket: &UdpSocket) -> Result<Vec<u8>, McstatError> {
    let mut bufs = vec![0u8; MAX_DATAGRAM_LEN];
    let received = socket.recv(&mut bufs)?;

    bufs.truncate(received);

    Ok(bufs)
}

/// Decode a UTF-16BE byte buffer into a string.
pub fn bufs_to_utf16_str(bufs: &[u8]) -> Result<String, McstatError> {
    if bufs.len() % 2 != 0 {
        return Err(McstatError::MalformedField(format!(
            "UTF-16 data must have an even length, got: {}",
            bufs.len()
        )));
    }

    Ok(String::from_utf16_lossy(
        bufs.chunks(2)
            .map(|chunk| u16::from_be_bytes([chunk[0], chunk[1]]))
            .collect::<Vec<_>>()
            .as_slice(),
    ))
}

/// Encode a string as UTF-16BE bytes.
pub fn str_to_utf16_bufs(s: &str) -> Vec<u8> {
    s.encode_utf16().flat_map(|unit| unit.to_be_bytes()).collect()
}

pub fn parse_int(field: &str, name: &str) -> Result<i64, McstatError> {
    field
        .trim()
        .parse()
        .map_err(|_| McstatError::MalformedField(format!("{}: {:?}", name, field)))
}

/// Cursor over one received packet.
///
/// Every read is bounds-checked so a truncated or hostile response fails
/// with a typed error instead of running off the buffer.
pub struct PacketReader<'a> {
    bufs: &'a [u8],
    pos: usize,
}

impl<'a> PacketReader<'a> {
    pub fn new(bufs: &'a [u8]) -> Self {
        Self { bufs, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.bufs.len() - self.pos
    }

    pub fn read_u8(&mut self) -> Result<u8, McstatError> {
        match self.bufs.get(self.pos) {
            Some(&buf) => {
                self.pos += 1;

                Ok(buf)
            }
            None => Err(McstatError::Truncated),
        }
    }

    pub fn read_bytes(&mut self, size: usize) -> Result<&'a [u8], McstatError> {
        if self.remaining() < size {
            return Err(McstatError::ShortRead {
                want: size,
                got: self.remaining(),
            });
        }

        let bufs = &self.bufs[self.pos..self.pos + size];
        self.pos += size;

        Ok(bufs)
    }

    pub fn read_u16_le(&mut self) -> Result<u16, McstatError> {
        let bufs = self.read_bytes(2)?;

        Ok(u16::from_le_bytes([bufs[0], bufs[1]]))
    }

    pub fn read_u32_be(&mut self) -> Result<u32, McstatError> {
        let bufs = self.read_bytes(4)?;

        Ok(u32::from_be_bytes([bufs[0], bufs[1], bufs[2], bufs[3]]))
    }

    /// Read a null-terminated string, decoded lossily as UTF-8.
    ///
    /// Bounded by [MAX_STRING_LEN] so a peer that never sends the
    /// terminator cannot drag the read out indefinitely.
    pub fn read_nt_str(&mut self) -> Result<String, McstatError> {
        let mut result = Vec::new();

        loop {
            if result.len() >= MAX_STRING_LEN {
                return Err(McstatError::StringTooLong {
                    limit: MAX_STRING_LEN,
                });
            }

            match self.read_u8()? {
                0x00 => break,
                buf => result.push(buf),
            }
        }

        Ok(String::from_utf8_lossy(result.as_slice()).into())
    }

    /// Read one key/value pair. An empty key ends the section and leaves
    /// the value empty without consuming further bytes.
    pub fn read_nt_kv(&mut self) -> Result<(String, String), McstatError> {
        let key = self.read_nt_str()?;

        if key.is_empty() {
            return Ok((key, String::new()));
        }

        let value = self.read_nt_str()?;

        Ok((key, value))
    }

    /// Compare the next bytes against `expected` byte-for-byte, failing on
    /// the first divergence with a hex dump of both sides.
    pub fn expect(&mut self, expected: &[u8]) -> Result<(), McstatError> {
        let mut received = Vec::with_capacity(expected.len());

        for (position, &expected_byte) in expected.iter().enumerate() {
            let received_byte = self.read_u8()?;

            received.push(received_byte);

            if received_byte != expected_byte {
                return Err(McstatError::ProtocolMismatch {
                    expected: to_hex(expected),
                    received: to_hex(&received),
                    byte: received_byte,
                    position,
                });
            }
        }

        Ok(())
    }
}

fn to_hex(bufs: &[u8]) -> String {
    bufs.iter().map(|buf| format!("{:02x}", buf)).collect()
}
