use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{PacketError, Result};
use crate::message::{DisplayMessage, Packet, MAX_TEXT_LEN};

/// Packet header: PBC (2) + version (1) + flags (1) + screen (2) = 6 bytes.
pub const PACKET_HEADER_SIZE: usize = 6;

/// Message header: index (2) + control (2) + text length (2) = 6 bytes.
pub const MESSAGE_HEADER_SIZE: usize = 6;

/// Index and control word, after which the control-data flag is checked.
const MESSAGE_PREFIX_SIZE: usize = 4;

/// Size of the PBC field itself; the count covers everything after it.
const PBC_SIZE: usize = 2;

/// Encode a packet into its wire format.
///
/// Wire format (all integers little-endian):
/// ```text
/// ┌──────────┬─────────┬───────┬──────────┬───────────────────────┐
/// │ PBC (2B) │ Ver (1) │ Flags │ Screen   │ Message *             │
/// │ len - 2  │         │ (1B)  │ (2B)     │                       │
/// └──────────┴─────────┴───────┴──────────┴───────────────────────┘
/// Message: Index (2B) │ Control (2B) │ TextLen (2B) │ Text
/// ```
pub fn encode(packet: &Packet) -> Result<Bytes> {
    let body_len: usize = packet
        .messages
        .iter()
        .map(|msg| MESSAGE_HEADER_SIZE + msg.text.len())
        .sum();

    let mut dst = BytesMut::with_capacity(PACKET_HEADER_SIZE + body_len);
    dst.put_u16_le(0); // PBC, patched once the length is known
    dst.put_u8(packet.version);
    dst.put_u8(packet.flags);
    dst.put_u16_le(packet.screen);

    for msg in &packet.messages {
        encode_message(msg, &mut dst)?;
    }

    let pbc = dst.len() - PBC_SIZE;
    if pbc > usize::from(u16::MAX) {
        return Err(PacketError::PacketTooLong {
            len: pbc,
            max: usize::from(u16::MAX),
        });
    }
    dst[..PBC_SIZE].copy_from_slice(&(pbc as u16).to_le_bytes());

    Ok(dst.freeze())
}

fn encode_message(msg: &DisplayMessage, dst: &mut BytesMut) -> Result<()> {
    if msg.text.len() > MAX_TEXT_LEN {
        return Err(PacketError::TextTooLong {
            index: msg.index,
            len: msg.text.len(),
            max: MAX_TEXT_LEN,
        });
    }

    dst.put_u16_le(msg.index);
    dst.put_u16_le(msg.control);
    dst.put_u16_le(msg.text.len() as u16);
    dst.put_slice(&msg.text);
    Ok(())
}

/// Decode one complete, unframed packet.
///
/// The whole slice must be the packet: the byte count is checked against
/// the slice length and every byte after the header must belong to a
/// complete message.
pub fn decode(src: &[u8]) -> Result<Packet> {
    if src.len() < PACKET_HEADER_SIZE {
        return Err(PacketError::TooShort {
            len: src.len(),
            min: PACKET_HEADER_SIZE,
        });
    }

    let declared = read_u16(src, 0);
    let actual = src.len() - PBC_SIZE;
    if usize::from(declared) != actual {
        return Err(PacketError::LengthMismatch { declared, actual });
    }

    let mut packet = Packet {
        version: src[2],
        flags: src[3],
        screen: read_u16(src, 4),
        messages: Vec::new(),
    };

    let mut cursor = PACKET_HEADER_SIZE;
    while cursor < src.len() {
        let (msg, next) = decode_message(src, cursor)?;
        packet.messages.push(msg);
        cursor = next;
    }

    Ok(packet)
}

fn decode_message(src: &[u8], offset: usize) -> Result<(DisplayMessage, usize)> {
    ensure_available(src, offset, MESSAGE_PREFIX_SIZE)?;
    let index = read_u16(src, offset);
    let control = read_u16(src, offset + 2);

    let msg = DisplayMessage::with_control(index, control, Bytes::new());
    if msg.is_control_data() {
        return Err(PacketError::UnsupportedControlData { index });
    }

    let len_offset = offset + MESSAGE_PREFIX_SIZE;
    ensure_available(src, len_offset, 2)?;
    let text_len = usize::from(read_u16(src, len_offset));

    let text_offset = len_offset + 2;
    ensure_available(src, text_offset, text_len)?;
    let text = Bytes::copy_from_slice(&src[text_offset..text_offset + text_len]);

    Ok((DisplayMessage { text, ..msg }, text_offset + text_len))
}

fn ensure_available(src: &[u8], offset: usize, needed: usize) -> Result<()> {
    let available = src.len().saturating_sub(offset);
    if available < needed {
        return Err(PacketError::Truncated {
            offset,
            needed,
            available,
        });
    }
    Ok(())
}

fn read_u16(src: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([src[offset], src[offset + 1]])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Tally;

    fn cam1() -> Packet {
        Packet::new(0).with_message(DisplayMessage::with_control(1, 0x00D5, "CAM 1"))
    }

    #[test]
    fn encodes_reference_packet() {
        let wire = encode(&cam1()).unwrap();
        assert_eq!(
            wire.as_ref(),
            &[
                0x0F, 0x00, // PBC
                0x00, // version
                0x00, // flags
                0x00, 0x00, // screen
                0x01, 0x00, // index
                0xD5, 0x00, // control
                0x05, 0x00, // text length
                b'C', b'A', b'M', b' ', b'1',
            ]
        );
    }

    #[test]
    fn decodes_reference_packet() {
        let wire = encode(&cam1()).unwrap();
        let packet = decode(&wire).unwrap();
        assert_eq!(packet, cam1());

        let msg = &packet.messages[0];
        assert_eq!(msg.brightness(), 3);
        assert_eq!(msg.left_tally(), Tally::Red);
        assert_eq!(msg.text_tally(), Tally::Red);
        assert_eq!(msg.right_tally(), Tally::Red);
        assert_eq!(msg.text.as_ref(), b"CAM 1");
    }

    #[test]
    fn roundtrip_preserves_message_order_and_fields() {
        let packet = Packet {
            version: 0,
            flags: 0x00,
            screen: 0x1234,
            messages: vec![
                DisplayMessage::new(9, "PGM").with_tallies(Tally::Red, Tally::Off, Tally::Off),
                DisplayMessage::new(2, "").with_brightness(1),
                DisplayMessage::new(0xFFFF, vec![0xFE; 40])
                    .with_tallies(Tally::Amber, Tally::Green, Tally::Red),
                DisplayMessage::new(4, vec![b'x'; MAX_TEXT_LEN]),
            ],
        };

        let wire = encode(&packet).unwrap();
        assert_eq!(decode(&wire).unwrap(), packet);
    }

    #[test]
    fn empty_packet_is_header_only() {
        let packet = Packet {
            version: 3,
            flags: 0x01,
            screen: 0xBEEF,
            messages: Vec::new(),
        };
        let wire = encode(&packet).unwrap();

        assert_eq!(wire.as_ref(), &[0x04, 0x00, 0x03, 0x01, 0xEF, 0xBE]);
        assert_eq!(decode(&wire).unwrap(), packet);
    }

    #[test]
    fn pbc_counts_bytes_after_itself() {
        let packets = [
            Packet::new(0),
            cam1(),
            cam1().with_message(DisplayMessage::new(2, vec![b'y'; 300])),
        ];

        for packet in packets {
            let wire = encode(&packet).unwrap();
            let pbc = u16::from_le_bytes([wire[0], wire[1]]);
            assert_eq!(usize::from(pbc), wire.len() - 2);
        }
    }

    #[test]
    fn text_too_long_rejected() {
        let packet =
            Packet::new(0).with_message(DisplayMessage::new(5, vec![b'z'; MAX_TEXT_LEN + 1]));
        let err = encode(&packet).unwrap_err();
        assert_eq!(
            err,
            PacketError::TextTooLong {
                index: 5,
                len: MAX_TEXT_LEN + 1,
                max: MAX_TEXT_LEN,
            }
        );
    }

    #[test]
    fn packet_too_long_rejected() {
        let mut packet = Packet::new(0);
        for index in 0..40 {
            packet
                .messages
                .push(DisplayMessage::new(index, vec![b'a'; MAX_TEXT_LEN]));
        }
        let err = encode(&packet).unwrap_err();
        assert!(matches!(err, PacketError::PacketTooLong { .. }));
    }

    #[test]
    fn too_short_rejected() {
        for len in 0..PACKET_HEADER_SIZE {
            let err = decode(&vec![0u8; len]).unwrap_err();
            assert_eq!(err, PacketError::TooShort { len, min: 6 });
        }
    }

    #[test]
    fn corrupted_pbc_rejected() {
        let wire = encode(&cam1()).unwrap();
        let true_pbc = (wire.len() - 2) as u16;

        for pbc in [0u16, 4, true_pbc - 1, true_pbc + 1, 0x0F00, u16::MAX] {
            let mut bad = wire.to_vec();
            bad[..2].copy_from_slice(&pbc.to_le_bytes());
            let err = decode(&bad).unwrap_err();
            assert_eq!(
                err,
                PacketError::LengthMismatch {
                    declared: pbc,
                    actual: wire.len() - 2,
                }
            );
        }
    }

    #[test]
    fn control_data_rejected_in_any_message() {
        let packet = Packet::new(0)
            .with_message(DisplayMessage::new(1, "A"))
            .with_message(DisplayMessage::new(2, "B"))
            .with_message(DisplayMessage::new(3, "C"));
        let wire = encode(&packet).unwrap();

        // control word high byte of message n sits at 6 + n * 7 + 3
        for (n, index) in [1u16, 2, 3].into_iter().enumerate() {
            let mut bad = wire.to_vec();
            bad[PACKET_HEADER_SIZE + n * 7 + 3] |= 0x80;
            let err = decode(&bad).unwrap_err();
            assert_eq!(err, PacketError::UnsupportedControlData { index });
        }
    }

    #[test]
    fn declared_text_past_end_is_truncated() {
        let mut wire = encode(&cam1()).unwrap().to_vec();
        // text length 5 -> 6, one byte more than present
        wire[10] = 6;
        let err = decode(&wire).unwrap_err();
        assert_eq!(
            err,
            PacketError::Truncated {
                offset: 12,
                needed: 6,
                available: 5,
            }
        );
    }

    #[test]
    fn partial_message_header_is_truncated() {
        // header + index + control, missing text length
        let mut wire = vec![0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00];
        let err = decode(&wire).unwrap_err();
        assert_eq!(
            err,
            PacketError::Truncated {
                offset: 10,
                needed: 2,
                available: 0,
            }
        );

        // a lone trailing byte after a complete message
        wire = encode(&cam1()).unwrap().to_vec();
        wire.push(0xAA);
        let pbc = (wire.len() - 2) as u16;
        wire[..2].copy_from_slice(&pbc.to_le_bytes());
        let err = decode(&wire).unwrap_err();
        assert!(matches!(err, PacketError::Truncated { offset: 17, .. }));
    }

    #[test]
    fn control_flag_checked_before_text_length() {
        // index + control with bit 15, no length field at all
        let wire = vec![0x08, 0x00, 0x00, 0x00, 0x00, 0x00, 0x07, 0x00, 0x00, 0x80];
        let err = decode(&wire).unwrap_err();
        assert_eq!(err, PacketError::UnsupportedControlData { index: 7 });
    }
}
