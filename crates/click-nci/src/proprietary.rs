//! NXP proprietary extension (GID 0xF).
//!
//! Opcodes the driver does not know are not errors here: the controller
//! emits vendor notifications freely and they are dropped as
//! [`NciEvent::None`].

use log::debug;

use crate::constants::*;
use crate::decode::Reader;
use crate::error::NciResult;
use crate::event::NciEvent;

/// Standby behaviour selected by `NCI_PROPRIETARY_SET_POWER_MODE`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerMode {
    StandbyDisabled = 0x00,
    StandbyEnabled = 0x01,
}

pub(crate) fn decode_rsp(oid: u8, payload: &[u8]) -> NciResult<NciEvent> {
    let mut r = Reader::new(payload);
    let event = match oid {
        OID_PROP_SET_POWER_MODE => NciEvent::PropSetPowerModeRsp { status: r.u8("status")? },
        OID_PROP_ACT => NciEvent::PropActRsp {
            status: r.u8("status")?,
            info: r.rest().to_vec(),
        },
        OID_PROP_ISO_DEP_PRESENCE_CHECK => NciEvent::PropIsoDepPresenceCheckRsp { status: r.u8("status")? },
        _ => ignored("response", oid),
    };
    Ok(event)
}

pub(crate) fn decode_ntf(oid: u8, payload: &[u8]) -> NciResult<NciEvent> {
    let mut r = Reader::new(payload);
    let event = match oid {
        OID_PROP_ISO_DEP_PRESENCE_CHECK => NciEvent::PropIsoDepPresenceCheckNtf {
            present: r.u8("presence")? == 0x01,
        },
        _ => ignored("notification", oid),
    };
    Ok(event)
}

fn ignored(kind: &str, oid: u8) -> NciEvent {
    debug!("nci: ignoring proprietary {} 0x{:02X}", kind, oid);
    NciEvent::None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_opcodes() {
        assert_eq!(
            decode_rsp(OID_PROP_ACT, &[0x00, 0x08, 0x01, 0x12]),
            Ok(NciEvent::PropActRsp {
                status: 0x00,
                info: vec![0x08, 0x01, 0x12]
            })
        );
        assert_eq!(
            decode_ntf(OID_PROP_ISO_DEP_PRESENCE_CHECK, &[0x01]),
            Ok(NciEvent::PropIsoDepPresenceCheckNtf { present: true })
        );
    }

    #[test]
    fn test_unknown_opcode_is_dropped() {
        assert_eq!(decode_rsp(0x3E, &[0x00]), Ok(NciEvent::None));
        assert_eq!(decode_ntf(0x21, &[]), Ok(NciEvent::None));
    }
}
