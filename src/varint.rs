use std::io::Read;

use crate::McstatError;

const SEGMENT_BITS: u32 = 0x7F;
const CONTINUE_BIT: u8 = 0x80;

/// An i32 takes at most 5 groups of 7 bits.
pub const MAX_VARINT_LEN: usize = 5;

/// Encode the given number as a [VarInt](https://wiki.vg/Protocol#VarInt_and_VarLong).
pub fn encode_varint(num: i32) -> Vec<u8> {
    // Negative values always use the maximum number of bytes: the encoding
    // works on the two's complement representation, hence the u32 cast.
    let mut num = num as u32;
    let mut result = Vec::<u8>::new();

    loop {
        if (num & !SEGMENT_BITS) == 0 {
            result.push(num as u8);

            return result;
        }

        result.push(((num & SEGMENT_BITS) as u8) | CONTINUE_BIT);
        num >>= 7;
    }
}

/// Decode a complete VarInt from a buffer.
#[allow(dead_code)]
pub fn decode_varint(bufs: &[u8]) -> Result<i32, McstatError> {
    if bufs.len() > MAX_VARINT_LEN {
        return Err(McstatError::VarIntTooLong);
    }

    match bufs.last() {
        Some(&last) => {
            // A set continuation bit on the final byte means the value
            // extends past the buffer.
            if last & CONTINUE_BIT != 0 {
                return Err(McstatError::Truncated);
            }

            let mut result = 0i32;

            for (i, &buf) in bufs.iter().enumerate() {
                result |= ((buf as u32 & SEGMENT_BITS) as i32) << (i * 7);
            }

            Ok(result)
        }
        None => Err(McstatError::Truncated),
    }
}

/// Decode a VarInt directly from a stream.
#[allow(dead_code)]
pub fn read_varint<R: Read>(reader: &mut R) -> Result<i32, McstatError> {
    let mut raw = Vec::new();

    read_varint_capture(reader, &mut raw)
}

/// Decode a VarInt from a stream, appending every consumed byte to `raw`.
///
/// Reads one byte at a time and fails with
/// [McstatError::VarIntTooLong] once a sixth byte would be needed, so an
/// unterminated stream from a hostile peer cannot spin forever.
pub fn read_varint_capture<R: Read>(reader: &mut R, raw: &mut Vec<u8>) -> Result<i32, McstatError> {
    let mut result = 0i32;
    let mut byte = [0u8; 1];

    for pos in 0..=MAX_VARINT_LEN {
        if pos == MAX_VARINT_LEN {
            return Err(McstatError::VarIntTooLong);
        }

        reader.read_exact(&mut byte)?;
        raw.push(byte[0]);
        result |= ((byte[0] as u32 & SEGMENT_BITS) as i32) << (pos * 7);

        if byte[0] & CONTINUE_BIT == 0 {
            break;
        }
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn round_trip() {
        for num in [
            0,
            1,
            127,
            128,
            255,
            25565,
            2097151,
            i32::MAX,
            -1,
            i32::MIN,
        ] {
            let encoded = encode_varint(num);

            assert!(encoded.len() <= MAX_VARINT_LEN);
            assert_eq!(decode_varint(&encoded).unwrap(), num);
            assert_eq!(read_varint(&mut Cursor::new(&encoded)).unwrap(), num);
        }
    }

    #[test]
    fn known_encodings() {
        assert_eq!(encode_varint(0), vec![0x00]);
        assert_eq!(encode_varint(255), vec![0xFF, 0x01]);
        assert_eq!(encode_varint(25565), vec![0xDD, 0xC7, 0x01]);
        assert_eq!(
            encode_varint(-1),
            vec![0xFF, 0xFF, 0xFF, 0xFF, 0x0F],
        );
    }

    #[test]
    fn unterminated_stream_is_rejected() {
        // Six continuation bytes: the decode must stop at five.
        let bufs = [0x80u8; 6];

        assert!(matches!(
            read_varint(&mut Cursor::new(&bufs)),
            Err(McstatError::VarIntTooLong)
        ));
        assert!(matches!(
            decode_varint(&bufs),
            Err(McstatError::VarIntTooLong)
        ));
    }

    #[test]
    fn truncated_buffer_is_rejected() {
        assert!(matches!(decode_varint(&[]), Err(McstatError::Truncated)));
        assert!(matches!(
            decode_varint(&[0xDD, 0xC7]),
            Err(McstatError::Truncated)
        ));
        assert!(matches!(
            read_varint(&mut Cursor::new(&[0x80u8, 0x80])),
            Err(McstatError::Truncated)
        ));
    }
}
