//! NCI error types.

use thiserror::Error;

/// Errors raised while building, sending, receiving or decoding NCI packets.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NciError {
    /// Message type is not data, response or notification.
    #[error("unknown message type: {0}")]
    UnknownMt(u8),

    /// Group identifier has no decoder.
    #[error("unknown group identifier: 0x{0:X}")]
    UnknownGid(u8),

    /// Opcode identifier has no decoder in its group.
    #[error("unknown opcode identifier 0x{oid:02X} in group 0x{gid:X}")]
    UnknownOid {
        /// Group the opcode was received in.
        gid: u8,
        /// The opcode itself.
        oid: u8,
    },

    /// Payload is larger than a single packet or a reassembled message can carry.
    #[error("payload exceeds MTU: maximum {max} bytes, got {actual}")]
    PayloadExceedMtu {
        /// Allowed payload length.
        max: usize,
        /// Requested payload length.
        actual: usize,
    },

    /// The transport (I2C or VEN pin) failed.
    #[error("transport failure: {0}")]
    Tml(&'static str),

    /// Argument outside the range the controller accepts.
    #[error("invalid parameter")]
    InvalidParameter,

    /// Packet shorter than its header or its declared length.
    #[error("packet too short: expected at least {expected} bytes, got {actual}")]
    PacketTooShort {
        /// Expected minimum length.
        expected: usize,
        /// Actual length received.
        actual: usize,
    },

    /// Payload field missing or inconsistent.
    #[error("malformed payload at offset {offset}: {message}")]
    Malformed {
        /// Byte offset into the payload.
        offset: usize,
        /// What was wrong.
        message: &'static str,
    },
}

impl NciError {
    /// Shorthand for [`NciError::Malformed`].
    pub fn malformed(offset: usize, message: &'static str) -> Self {
        NciError::Malformed { offset, message }
    }
}

pub type NciResult<T> = Result<T, NciError>;
