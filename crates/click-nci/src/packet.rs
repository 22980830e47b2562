//! NCI packet encoding, decoding, segmentation and reassembly.
//!
//! Every packet carries a 3-byte header:
//!
//! ```text
//! control: +----+-----+-----+  +-----+  +-----+  +---------------+
//!          | MT | PBF | GID |  | OID |  | LEN |  | payload[..LEN]|
//!          +----+-----+-----+  +-----+  +-----+  +---------------+
//!           3b    1b    4b       6b       8b
//!
//! data:    | MT | PBF | ConnID | RFU | LEN | payload[..LEN] |
//! ```
//!
//! A logical message longer than one packet is split into segments; every
//! segment except the last has PBF set.

use bytes::{BufMut, Bytes, BytesMut};
use log::{trace, warn};

use crate::constants::*;
use crate::error::{NciError, NciResult};

/// The 3-bit message type in the first header byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageType {
    Data,
    Command,
    Response,
    Notification,
}

impl MessageType {
    pub fn from_bits(mt: u8) -> NciResult<Self> {
        match mt {
            MT_DATA => Ok(MessageType::Data),
            MT_CTRL_CMD => Ok(MessageType::Command),
            MT_CTRL_RSP => Ok(MessageType::Response),
            MT_CTRL_NTF => Ok(MessageType::Notification),
            other => Err(NciError::UnknownMt(other)),
        }
    }

    pub fn bits(self) -> u8 {
        match self {
            MessageType::Data => MT_DATA,
            MessageType::Command => MT_CTRL_CMD,
            MessageType::Response => MT_CTRL_RSP,
            MessageType::Notification => MT_CTRL_NTF,
        }
    }
}

/// Packet header without the PBF and length fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PacketHeader {
    /// Command, response or notification.
    Control { mt: MessageType, gid: u8, oid: u8 },
    /// Data on a logical connection.
    Data { conn_id: u8 },
}

impl PacketHeader {
    pub fn message_type(&self) -> MessageType {
        match self {
            PacketHeader::Control { mt, .. } => *mt,
            PacketHeader::Data { .. } => MessageType::Data,
        }
    }

    fn validate(&self) -> NciResult<()> {
        match *self {
            PacketHeader::Control { mt: MessageType::Data, .. } => Err(NciError::InvalidParameter),
            PacketHeader::Control { gid, oid, .. } if gid > GID_MASK || oid > OID_MASK => {
                Err(NciError::InvalidParameter)
            }
            PacketHeader::Data { conn_id } if conn_id > CONN_ID_MASK => Err(NciError::InvalidParameter),
            _ => Ok(()),
        }
    }
}

/// One NCI packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub header: PacketHeader,
    /// Packet boundary flag: more segments follow.
    pub pbf: bool,
    pub payload: Vec<u8>,
}

impl Packet {
    /// Build an unsegmented control packet.
    pub fn control(mt: MessageType, gid: u8, oid: u8, payload: &[u8]) -> NciResult<Self> {
        Packet::new(PacketHeader::Control { mt, gid, oid }, false, payload)
    }

    /// Build an unsegmented data packet.
    pub fn data(conn_id: u8, payload: &[u8]) -> NciResult<Self> {
        Packet::new(PacketHeader::Data { conn_id }, false, payload)
    }

    pub fn new(header: PacketHeader, pbf: bool, payload: &[u8]) -> NciResult<Self> {
        header.validate()?;
        if payload.len() > NCI_PACKET_PAYLOAD_MAX_LEN {
            return Err(NciError::PayloadExceedMtu {
                max: NCI_PACKET_PAYLOAD_MAX_LEN,
                actual: payload.len(),
            });
        }
        Ok(Packet {
            header,
            pbf,
            payload: payload.to_vec(),
        })
    }

    /// Serialize header and payload.
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(NCI_PACKET_HEADER_LEN + self.payload.len());
        let pbf = if self.pbf { PBF_MASK } else { 0 };
        match self.header {
            PacketHeader::Control { mt, gid, oid } => {
                buf.put_u8((mt.bits() << MT_SHIFT) | pbf | (gid & GID_MASK));
                buf.put_u8(oid & OID_MASK);
            }
            PacketHeader::Data { conn_id } => {
                buf.put_u8((MT_DATA << MT_SHIFT) | pbf | (conn_id & CONN_ID_MASK));
                buf.put_u8(0);
            }
        }
        // `new` caps the payload at 255 bytes.
        buf.put_u8(self.payload.len() as u8);
        buf.extend_from_slice(&self.payload);
        buf
    }

    /// Parse one packet from the start of `bytes`. Trailing bytes are ignored.
    pub fn decode(bytes: &[u8]) -> NciResult<Self> {
        if bytes.len() < NCI_PACKET_HEADER_LEN {
            return Err(NciError::PacketTooShort {
                expected: NCI_PACKET_HEADER_LEN,
                actual: bytes.len(),
            });
        }

        let mt = MessageType::from_bits((bytes[0] & MT_MASK) >> MT_SHIFT)?;
        let pbf = bytes[0] & PBF_MASK != 0;
        let len = bytes[2] as usize;
        if bytes.len() < NCI_PACKET_HEADER_LEN + len {
            return Err(NciError::PacketTooShort {
                expected: NCI_PACKET_HEADER_LEN + len,
                actual: bytes.len(),
            });
        }

        let header = match mt {
            MessageType::Data => PacketHeader::Data {
                conn_id: bytes[0] & CONN_ID_MASK,
            },
            _ => PacketHeader::Control {
                mt,
                gid: bytes[0] & GID_MASK,
                oid: bytes[1] & OID_MASK,
            },
        };

        Ok(Packet {
            header,
            pbf,
            payload: bytes[NCI_PACKET_HEADER_LEN..NCI_PACKET_HEADER_LEN + len].to_vec(),
        })
    }
}

/// Split `payload` into packets of at most `max_payload` bytes.
///
/// An empty payload still produces one (empty) packet.
pub fn segment(header: PacketHeader, payload: &[u8], max_payload: usize) -> NciResult<Vec<Packet>> {
    if max_payload == 0 || max_payload > NCI_PACKET_PAYLOAD_MAX_LEN {
        return Err(NciError::InvalidParameter);
    }
    if payload.is_empty() {
        return Ok(vec![Packet::new(header, false, payload)?]);
    }

    let count = payload.len().div_ceil(max_payload);
    payload
        .chunks(max_payload)
        .enumerate()
        .map(|(i, chunk)| Packet::new(header, i + 1 < count, chunk))
        .collect()
}

/// A complete logical message, possibly joined from several segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub header: PacketHeader,
    pub payload: Bytes,
}

/// Joins PBF segments back into messages.
#[derive(Debug)]
pub struct Reassembler {
    buffer: BytesMut,
    pending: Option<PacketHeader>,
}

impl Default for Reassembler {
    fn default() -> Self {
        Self::new()
    }
}

impl Reassembler {
    pub fn new() -> Self {
        Reassembler {
            buffer: BytesMut::with_capacity(NCI_MESSAGE_MAX_LEN),
            pending: None,
        }
    }

    /// Add a packet. Returns the message once its last segment has arrived.
    ///
    /// A segment with a different header than the message in progress
    /// discards the partial message. Messages longer than
    /// [`NCI_MESSAGE_MAX_LEN`] are dropped with [`NciError::PayloadExceedMtu`].
    pub fn push(&mut self, packet: Packet) -> NciResult<Option<Message>> {
        if let Some(pending) = self.pending {
            if pending != packet.header {
                warn!(
                    "nci: segment for {:?} interrupts message for {:?}, dropping {} bytes",
                    packet.header,
                    pending,
                    self.buffer.len()
                );
                self.clear();
            }
        }

        let total = self.buffer.len() + packet.payload.len();
        if total > NCI_MESSAGE_MAX_LEN {
            self.clear();
            return Err(NciError::PayloadExceedMtu {
                max: NCI_MESSAGE_MAX_LEN,
                actual: total,
            });
        }

        self.buffer.extend_from_slice(&packet.payload);
        if packet.pbf {
            self.pending = Some(packet.header);
            trace!("nci: segment buffered, {} bytes so far", self.buffer.len());
            return Ok(None);
        }

        self.pending = None;
        Ok(Some(Message {
            header: packet.header,
            payload: self.buffer.split().freeze(),
        }))
    }

    /// Number of bytes of the message in progress.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len()
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_packet_wire_format() {
        let packet = Packet::control(
            MessageType::Command,
            GID_RF_MANAGEMENT,
            OID_RF_DISCOVER,
            &[0x01, 0x00],
        )
        .unwrap();
        let bytes = packet.encode();
        assert_eq!(bytes, vec![0x21, 0x03, 0x02, 0x01, 0x00]);

        let decoded = Packet::decode(&bytes).unwrap();
        assert_eq!(decoded, packet);
        assert_eq!(
            decoded.header,
            PacketHeader::Control {
                mt: MessageType::Command,
                gid: 0x01,
                oid: 0x03
            }
        );
        assert_eq!(decoded.payload, vec![0x01, 0x00]);
    }

    #[test]
    fn test_data_packet_header() {
        let packet = Packet::new(PacketHeader::Data { conn_id: 0 }, true, &[0x30, 0x04]).unwrap();
        assert_eq!(packet.encode(), vec![0x10, 0x00, 0x02, 0x30, 0x04]);
    }

    #[test]
    fn test_decode_errors() {
        assert_eq!(
            Packet::decode(&[0x40, 0x00]),
            Err(NciError::PacketTooShort { expected: 3, actual: 2 })
        );
        assert_eq!(
            Packet::decode(&[0x40, 0x00, 0x03, 0x00]),
            Err(NciError::PacketTooShort { expected: 6, actual: 4 })
        );
        assert_eq!(Packet::decode(&[0x80, 0x00, 0x00]), Err(NciError::UnknownMt(4)));
    }

    #[test]
    fn test_payload_limit() {
        assert!(Packet::data(0, &[0u8; 255]).is_ok());
        assert_eq!(
            Packet::data(0, &[0u8; 256]),
            Err(NciError::PayloadExceedMtu { max: 255, actual: 256 })
        );
        assert_eq!(Packet::data(16, &[]), Err(NciError::InvalidParameter));
        assert_eq!(
            Packet::control(MessageType::Command, 0x10, 0, &[]),
            Err(NciError::InvalidParameter)
        );
    }

    #[test]
    fn test_segment_and_reassemble() {
        let payload: Vec<u8> = (0..=255u8).chain(0..100).collect();
        let packets = segment(PacketHeader::Data { conn_id: 0 }, &payload, 100).unwrap();
        assert_eq!(packets.len(), 4);
        assert!(packets[..3].iter().all(|p| p.pbf));
        assert!(!packets[3].pbf);
        assert_eq!(packets[3].payload.len(), 56);

        let mut reassembler = Reassembler::new();
        let mut message = None;
        for packet in packets {
            message = reassembler.push(packet).unwrap();
        }
        let message = message.unwrap();
        assert_eq!(message.payload.as_ref(), payload.as_slice());
        assert_eq!(reassembler.buffered_len(), 0);
    }

    #[test]
    fn test_segment_empty_payload() {
        let packets = segment(PacketHeader::Data { conn_id: 1 }, &[], 32).unwrap();
        assert_eq!(packets.len(), 1);
        assert!(!packets[0].pbf);
        assert_eq!(segment(PacketHeader::Data { conn_id: 1 }, &[1], 0), Err(NciError::InvalidParameter));
    }

    #[test]
    fn test_reassembler_overflow() {
        let mut reassembler = Reassembler::new();
        let header = PacketHeader::Data { conn_id: 0 };
        for _ in 0..4 {
            let segment = Packet::new(header, true, &[0u8; 255]).unwrap();
            assert_eq!(reassembler.push(segment), Ok(None));
        }
        let last = Packet::new(header, false, &[0u8; 10]).unwrap();
        assert_eq!(
            reassembler.push(last),
            Err(NciError::PayloadExceedMtu { max: 1024, actual: 1030 })
        );
        assert_eq!(reassembler.buffered_len(), 0);
    }

    #[test]
    fn test_reassembler_header_change_drops_partial() {
        let mut reassembler = Reassembler::new();
        let first = Packet::new(PacketHeader::Data { conn_id: 0 }, true, &[1, 2, 3]).unwrap();
        reassembler.push(first).unwrap();

        let other = Packet::data(1, &[9]).unwrap();
        let message = reassembler.push(other).unwrap().unwrap();
        assert_eq!(message.header, PacketHeader::Data { conn_id: 1 });
        assert_eq!(message.payload.as_ref(), &[9]);
    }
}
