//! SMS-SUBMIT PDU encoding (3GPP TS 23.040, GSM 03.38 default alphabet).
//!
//! The PDU is sent as one line of uppercase hex after `AT+CMGS=<tpdu_len>`,
//! terminated by SUB (`0x1A`).
//!
//! ```text
//! 00        SMSC length (use the SMSC stored on the SIM)
//! 11        first octet: SMS-SUBMIT, relative validity period
//! 00        TP-MR
//! 0B 91 ..  TP-DA: digit count, type of address, semi-octets
//! 00        TP-PID
//! 00        TP-DCS: GSM 7-bit
//! AA        TP-VP: 4 days
//! 0A ..     TP-UDL (septets), packed TP-UD
//! ```
//!
//! The protocol fields are fixed; only the destination and text vary.

use click_at::{AtError, AtResult};
use heapless::{String, Vec};

/// PDU buffer size.
pub const PDU_MAX_LEN: usize = 255;

/// Septets in a single-part message.
pub const SMS_MAX_SEPTETS: usize = 160;

/// Packed user data for [`SMS_MAX_SEPTETS`].
pub const SMS_MAX_PACKED: usize = 140;

/// Longest destination address in digits.
pub const ADDRESS_MAX_DIGITS: usize = 20;

/// SMS-SUBMIT, TP-VPF relative.
pub const FIRST_OCTET: u8 = 0x11;
pub const MESSAGE_REFERENCE: u8 = 0x00;
pub const PROTOCOL_ID: u8 = 0x00;
/// GSM 7-bit default alphabet.
pub const DATA_CODING: u8 = 0x00;
/// (0xAA - 166) days = 4 days.
pub const VALIDITY_PERIOD: u8 = 0xAA;

const TOA_INTERNATIONAL: u8 = 0x91;
const TOA_UNKNOWN: u8 = 0x81;
const ESCAPE: u8 = 0x1B;
const SEPTET_CR: u8 = 0x0D;

/// GSM 03.38 default alphabet, indexed by septet value.
const GSM7_BASIC: [char; 128] = [
    '@', '£', '$', '¥', 'è', 'é', 'ù', 'ì', 'ò', 'Ç', '\n', 'Ø', 'ø', '\r', 'Å', 'å',
    'Δ', '_', 'Φ', 'Γ', 'Λ', 'Ω', 'Π', 'Ψ', 'Σ', 'Θ', 'Ξ', '\u{1B}', 'Æ', 'æ', 'ß', 'É',
    ' ', '!', '"', '#', '¤', '%', '&', '\'', '(', ')', '*', '+', ',', '-', '.', '/',
    '0', '1', '2', '3', '4', '5', '6', '7', '8', '9', ':', ';', '<', '=', '>', '?',
    '¡', 'A', 'B', 'C', 'D', 'E', 'F', 'G', 'H', 'I', 'J', 'K', 'L', 'M', 'N', 'O',
    'P', 'Q', 'R', 'S', 'T', 'U', 'V', 'W', 'X', 'Y', 'Z', 'Ä', 'Ö', 'Ñ', 'Ü', '§',
    '¿', 'a', 'b', 'c', 'd', 'e', 'f', 'g', 'h', 'i', 'j', 'k', 'l', 'm', 'n', 'o',
    'p', 'q', 'r', 's', 't', 'u', 'v', 'w', 'x', 'y', 'z', 'ä', 'ö', 'ñ', 'ü', 'à',
];

/// Map text to default-alphabet septets.
///
/// Characters outside the basic table (including the extension table, which
/// would need escape sequences) are rejected.
pub fn encode_gsm7(text: &str) -> AtResult<Vec<u8, SMS_MAX_SEPTETS>> {
    let count = text.chars().count();
    if count > SMS_MAX_SEPTETS {
        return Err(AtError::BufferOverflow {
            max: SMS_MAX_SEPTETS,
            actual: count,
        });
    }
    let mut septets = Vec::new();
    for ch in text.chars() {
        let septet = GSM7_BASIC
            .iter()
            .position(|&c| c == ch)
            .filter(|&index| index != ESCAPE as usize)
            .ok_or(AtError::InvalidParameter)?;
        // Length was checked above.
        let _ = septets.push(septet as u8);
    }
    Ok(septets)
}

/// Map septets back to text.
pub fn decode_gsm7(septets: &[u8]) -> std::string::String {
    septets
        .iter()
        .map(|&s| GSM7_BASIC[usize::from(s & 0x7F)])
        .collect()
}

/// Pack septets LSB-first into `ceil(7n / 8)` octets.
///
/// When the last octet has 7 unused bits, they carry CR so the receiver does
/// not read an extra `@`.
pub fn pack_septets(septets: &[u8]) -> AtResult<Vec<u8, SMS_MAX_PACKED>> {
    if septets.len() > SMS_MAX_SEPTETS {
        return Err(AtError::BufferOverflow {
            max: SMS_MAX_SEPTETS,
            actual: septets.len(),
        });
    }
    let packed_len = (septets.len() * 7).div_ceil(8);
    let mut packed: Vec<u8, SMS_MAX_PACKED> = Vec::new();
    packed
        .resize(packed_len, 0)
        .map_err(|_| AtError::AllocationFailed)?;

    for (index, &septet) in septets.iter().enumerate() {
        let septet = septet & 0x7F;
        let bit = index * 7;
        let (byte, shift) = (bit / 8, bit % 8);
        packed[byte] |= septet << shift;
        if shift > 1 {
            packed[byte + 1] |= septet >> (8 - shift);
        }
    }

    if septets.len() % 8 == 7 {
        if let Some(last) = packed.last_mut() {
            *last |= SEPTET_CR << 1;
        }
    }
    Ok(packed)
}

/// Unpack `count` septets from packed user data.
pub fn unpack_septets(packed: &[u8], count: usize) -> AtResult<Vec<u8, SMS_MAX_SEPTETS>> {
    if count > SMS_MAX_SEPTETS {
        return Err(AtError::BufferOverflow {
            max: SMS_MAX_SEPTETS,
            actual: count,
        });
    }
    if packed.len() < (count * 7).div_ceil(8) {
        return Err(AtError::InvalidParameter);
    }
    let mut septets = Vec::new();
    for index in 0..count {
        let bit = index * 7;
        let (byte, shift) = (bit / 8, bit % 8);
        let mut value = packed[byte] >> shift;
        if shift > 1 {
            value |= packed[byte + 1] << (8 - shift);
        }
        let _ = septets.push(value & 0x7F);
    }
    Ok(septets)
}

/// Encode a destination address: digit count, type of address, swapped
/// semi-octets padded with `F`.
pub fn encode_address(number: &str) -> AtResult<Vec<u8, 12>> {
    let (toa, digits) = match number.strip_prefix('+') {
        Some(rest) => (TOA_INTERNATIONAL, rest),
        None => (TOA_UNKNOWN, number),
    };
    if digits.is_empty()
        || digits.len() > ADDRESS_MAX_DIGITS
        || !digits.bytes().all(|b| b.is_ascii_digit())
    {
        return Err(AtError::InvalidParameter);
    }

    let mut out = Vec::new();
    let _ = out.push(digits.len() as u8);
    let _ = out.push(toa);
    for pair in digits.as_bytes().chunks(2) {
        let low = pair[0] - b'0';
        let high = pair.get(1).map_or(0x0F, |d| d - b'0');
        let _ = out.push((high << 4) | low);
    }
    Ok(out)
}

/// An SMS-SUBMIT message with the fixed protocol fields above.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmsSubmitPdu<'a> {
    pub destination: &'a str,
    pub text: &'a str,
}

impl<'a> SmsSubmitPdu<'a> {
    pub fn new(destination: &'a str, text: &'a str) -> Self {
        SmsSubmitPdu { destination, text }
    }

    /// Encode the full PDU including the leading SMSC length octet.
    pub fn encode(&self) -> AtResult<Vec<u8, PDU_MAX_LEN>> {
        let address = encode_address(self.destination)?;
        let septets = encode_gsm7(self.text)?;
        let user_data = pack_septets(&septets)?;

        let mut pdu: Vec<u8, PDU_MAX_LEN> = Vec::new();
        let header = [0x00, FIRST_OCTET, MESSAGE_REFERENCE];
        let trailer = [
            PROTOCOL_ID,
            DATA_CODING,
            VALIDITY_PERIOD,
            septets.len() as u8,
        ];
        for part in [&header[..], &address[..], &trailer[..], &user_data[..]] {
            pdu.extend_from_slice(part)
                .map_err(|_| AtError::BufferOverflow {
                    max: PDU_MAX_LEN,
                    actual: pdu.len() + part.len(),
                })?;
        }
        Ok(pdu)
    }
}

/// Octets counted by `AT+CMGS=<length>`: everything after the SMSC field.
pub fn tpdu_len(pdu: &[u8]) -> usize {
    match pdu.first() {
        Some(&smsc_len) => pdu.len().saturating_sub(1 + usize::from(smsc_len)),
        None => 0,
    }
}

/// Uppercase hex rendering for the `AT+CMGS` payload.
pub fn to_hex(pdu: &[u8]) -> AtResult<String<{ 2 * PDU_MAX_LEN }>> {
    let mut out = String::new();
    out.push_str(&hex::encode_upper(pdu))
        .map_err(|_| AtError::BufferOverflow {
            max: 2 * PDU_MAX_LEN,
            actual: 2 * pdu.len(),
        })?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_pack_hello() {
        let septets = encode_gsm7("hello").unwrap();
        let packed = pack_septets(&septets).unwrap();
        assert_eq!(packed.as_slice(), &[0xE8, 0x32, 0x9B, 0xFD, 0x06]);
    }

    #[test]
    fn test_seven_septets_padded_with_cr() {
        let septets = encode_gsm7("1234567").unwrap();
        let packed = pack_septets(&septets).unwrap();
        assert_eq!(packed.len(), 7);
        assert_eq!(packed[6] >> 1, SEPTET_CR);

        let unpacked = unpack_septets(&packed, 7).unwrap();
        assert_eq!(decode_gsm7(&unpacked), "1234567");
    }

    #[test]
    fn test_encode_address() {
        let address = encode_address("+46708251358").unwrap();
        assert_eq!(address.as_slice(), &[0x0B, 0x91, 0x64, 0x07, 0x28, 0x15, 0x53, 0xF8]);

        let national = encode_address("0123").unwrap();
        assert_eq!(national.as_slice(), &[0x04, 0x81, 0x10, 0x32]);

        assert_eq!(encode_address("+"), Err(AtError::InvalidParameter));
        assert_eq!(encode_address("12a4"), Err(AtError::InvalidParameter));
    }

    #[test]
    fn test_submit_pdu() {
        let pdu = SmsSubmitPdu::new("+46708251358", "hellohello").encode().unwrap();
        assert_eq!(
            to_hex(&pdu).unwrap().as_str(),
            "0011000B916407281553F80000AA0AE8329BFD4697D9EC37"
        );
        assert_eq!(tpdu_len(&pdu), 23);
    }

    #[test]
    fn test_rejects_unsupported_text() {
        assert_eq!(encode_gsm7("€"), Err(AtError::InvalidParameter));
        assert_eq!(encode_gsm7("{"), Err(AtError::InvalidParameter));
        let long = "a".repeat(161);
        assert_eq!(
            encode_gsm7(&long),
            Err(AtError::BufferOverflow { max: 160, actual: 161 })
        );
    }

    #[test]
    fn test_full_length_message() {
        let text = "x".repeat(SMS_MAX_SEPTETS);
        let pdu = SmsSubmitPdu::new("+15551234567", &text).encode().unwrap();
        // 15 header octets + 140 user data octets
        assert_eq!(pdu.len(), 15 + SMS_MAX_PACKED);
    }

    fn gsm7_text() -> impl Strategy<Value = std::string::String> {
        proptest::collection::vec(0usize..128, 0..=SMS_MAX_SEPTETS).prop_map(|indices| {
            indices
                .into_iter()
                .filter(|&i| i != ESCAPE as usize)
                .map(|i| GSM7_BASIC[i])
                .collect()
        })
    }

    proptest! {
        #[test]
        fn prop_pack_unpack_round_trip(text in gsm7_text()) {
            let septets = encode_gsm7(&text).unwrap();
            let packed = pack_septets(&septets).unwrap();
            prop_assert_eq!(packed.len(), (septets.len() * 7).div_ceil(8));

            let unpacked = unpack_septets(&packed, septets.len()).unwrap();
            prop_assert_eq!(decode_gsm7(&unpacked), text);
        }
    }
}
