//! Incoming packet dispatch: MT, then GID, then OID.
//!
//! Each per-opcode decoder reads only the fields its message defines and
//! reports truncation as [`NciError::Malformed`] with the failing offset.

use log::warn;

use crate::constants::*;
use crate::error::{NciError, NciResult};
use crate::event::*;
use crate::packet::{MessageType, Packet, PacketHeader};
use crate::proprietary;

/// Cursor over a payload with bounds-checked reads.
pub(crate) struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub(crate) fn new(buf: &'a [u8]) -> Self {
        Reader { buf, pos: 0 }
    }

    pub(crate) fn u8(&mut self, field: &'static str) -> NciResult<u8> {
        let byte = *self
            .buf
            .get(self.pos)
            .ok_or(NciError::malformed(self.pos, field))?;
        self.pos += 1;
        Ok(byte)
    }

    pub(crate) fn u16_le(&mut self, field: &'static str) -> NciResult<u16> {
        let bytes = self.bytes(2, field)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub(crate) fn u32_le(&mut self, field: &'static str) -> NciResult<u32> {
        let bytes = self.bytes(4, field)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub(crate) fn bytes(&mut self, len: usize, field: &'static str) -> NciResult<&'a [u8]> {
        let end = self.pos + len;
        if end > self.buf.len() {
            return Err(NciError::malformed(self.pos, field));
        }
        let bytes = &self.buf[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    /// Optional trailing byte.
    pub(crate) fn opt_u8(&mut self) -> Option<u8> {
        let byte = self.buf.get(self.pos).copied();
        if byte.is_some() {
            self.pos += 1;
        }
        byte
    }

    pub(crate) fn rest(&mut self) -> &'a [u8] {
        let rest = &self.buf[self.pos.min(self.buf.len())..];
        self.pos = self.buf.len();
        rest
    }

    fn tlvs(&mut self, count: u8) -> NciResult<Vec<Tlv>> {
        let mut tlvs = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let tag = self.u8("tlv tag")?;
            let len = self.u8("tlv length")?;
            let value = self.bytes(len as usize, "tlv value")?;
            tlvs.push(Tlv::new(tag, value));
        }
        Ok(tlvs)
    }

    fn counted(&mut self, field: &'static str) -> NciResult<&'a [u8]> {
        let count = self.u8(field)?;
        self.bytes(count as usize, field)
    }
}

/// Decode a single unsegmented packet.
pub fn decode_event(packet: &Packet) -> NciResult<NciEvent> {
    decode_message(&packet.header, &packet.payload)
}

/// Decode a complete (reassembled) message.
pub fn decode_message(header: &PacketHeader, payload: &[u8]) -> NciResult<NciEvent> {
    match *header {
        PacketHeader::Data { conn_id } => Ok(NciEvent::Data {
            conn_id,
            payload: payload.to_vec(),
        }),
        PacketHeader::Control { mt: MessageType::Response, gid, oid } => match gid {
            GID_CORE => decode_core_rsp(oid, payload),
            GID_RF_MANAGEMENT => decode_rf_rsp(oid, payload),
            GID_NFCEE_MANAGEMENT => decode_nfcee_rsp(oid, payload),
            GID_PROPRIETARY => proprietary::decode_rsp(oid, payload),
            _ => Err(unknown_gid(gid)),
        },
        PacketHeader::Control { mt: MessageType::Notification, gid, oid } => match gid {
            GID_CORE => decode_core_ntf(oid, payload),
            GID_RF_MANAGEMENT => decode_rf_ntf(oid, payload),
            GID_NFCEE_MANAGEMENT => decode_nfcee_ntf(oid, payload),
            GID_PROPRIETARY => proprietary::decode_ntf(oid, payload),
            _ => Err(unknown_gid(gid)),
        },
        PacketHeader::Control { mt, .. } => {
            warn!("nci: unexpected {:?} from controller", mt);
            Err(NciError::UnknownMt(mt.bits()))
        }
    }
}

fn unknown_gid(gid: u8) -> NciError {
    warn!("nci: unknown GID 0x{:X}", gid);
    NciError::UnknownGid(gid)
}

fn unknown_oid(gid: u8, oid: u8) -> NciError {
    warn!("nci: unknown OID 0x{:02X} in GID 0x{:X}", oid, gid);
    NciError::UnknownOid { gid, oid }
}

fn status(payload: &[u8]) -> NciResult<u8> {
    Reader::new(payload).u8("status")
}

// ============================================================================
// NCI Core
// ============================================================================

fn decode_core_rsp(oid: u8, payload: &[u8]) -> NciResult<NciEvent> {
    let mut r = Reader::new(payload);
    let event = match oid {
        OID_CORE_RESET => NciEvent::CoreResetRsp(CoreResetRsp {
            status: r.u8("status")?,
            nci_version: r.opt_u8(),
            config_status: r.opt_u8(),
        }),
        OID_CORE_INIT => {
            let status = r.u8("status")?;
            let nfcc_features = r.u32_le("nfcc features")?;
            let rf_interfaces = r.counted("rf interfaces")?.to_vec();
            NciEvent::CoreInitRsp(CoreInitRsp {
                status,
                nfcc_features,
                rf_interfaces,
                max_logical_connections: r.u8("max logical connections")?,
                max_routing_table_size: r.u16_le("max routing table size")?,
                max_control_payload: r.u8("max control payload")?,
                max_large_parameter_size: r.u16_le("max large parameter size")?,
                manufacturer_id: r.u8("manufacturer id")?,
                manufacturer_info: r.rest().to_vec(),
            })
        }
        OID_CORE_SET_CONFIG => {
            let status = r.u8("status")?;
            let invalid_params = if r.opt_u8().is_some() {
                r.rest().to_vec()
            } else {
                Vec::new()
            };
            NciEvent::CoreSetConfigRsp(CoreSetConfigRsp { status, invalid_params })
        }
        OID_CORE_GET_CONFIG => {
            let status = r.u8("status")?;
            let count = r.u8("parameter count")?;
            NciEvent::CoreGetConfigRsp(CoreGetConfigRsp {
                status,
                params: r.tlvs(count)?,
            })
        }
        OID_CORE_CONN_CREATE => NciEvent::CoreConnCreateRsp(CoreConnCreateRsp {
            status: r.u8("status")?,
            max_data_payload: r.u8("max data payload")?,
            initial_credits: r.u8("initial credits")?,
            conn_id: r.u8("conn id")?,
        }),
        OID_CORE_CONN_CLOSE => NciEvent::CoreConnCloseRsp { status: status(payload)? },
        OID_CORE_SET_POWER_SUB_STATE => NciEvent::CoreSetPowerSubStateRsp { status: status(payload)? },
        _ => return Err(unknown_oid(GID_CORE, oid)),
    };
    Ok(event)
}

fn decode_core_ntf(oid: u8, payload: &[u8]) -> NciResult<NciEvent> {
    let mut r = Reader::new(payload);
    let event = match oid {
        OID_CORE_RESET => NciEvent::CoreResetNtf(CoreResetNtf {
            reason: r.u8("reason")?,
            config_status: r.opt_u8(),
        }),
        OID_CORE_CONN_CREDITS => {
            let count = r.u8("entry count")?;
            let mut entries = Vec::with_capacity(count as usize);
            for _ in 0..count {
                entries.push(ConnCredits {
                    conn_id: r.u8("conn id")?,
                    credits: r.u8("credits")?,
                });
            }
            NciEvent::CoreConnCreditsNtf(entries)
        }
        OID_CORE_GENERIC_ERROR => NciEvent::CoreGenericErrorNtf { status: status(payload)? },
        OID_CORE_INTERFACE_ERROR => NciEvent::CoreInterfaceErrorNtf(CoreInterfaceErrorNtf {
            status: r.u8("status")?,
            conn_id: r.u8("conn id")?,
        }),
        _ => return Err(unknown_oid(GID_CORE, oid)),
    };
    Ok(event)
}

// ============================================================================
// RF Management
// ============================================================================

fn decode_rf_rsp(oid: u8, payload: &[u8]) -> NciResult<NciEvent> {
    let event = match oid {
        OID_RF_DISCOVER_MAP => NciEvent::RfDiscoverMapRsp { status: status(payload)? },
        OID_RF_SET_LISTEN_MODE_ROUTING => NciEvent::RfSetListenModeRoutingRsp { status: status(payload)? },
        OID_RF_GET_LISTEN_MODE_ROUTING => NciEvent::RfGetListenModeRoutingRsp { status: status(payload)? },
        OID_RF_DISCOVER => NciEvent::RfDiscoverRsp { status: status(payload)? },
        OID_RF_DISCOVER_SELECT => NciEvent::RfDiscoverSelectRsp { status: status(payload)? },
        OID_RF_DEACTIVATE => NciEvent::RfDeactivateRsp { status: status(payload)? },
        OID_RF_T3T_POLLING => NciEvent::RfT3tPollingRsp { status: status(payload)? },
        OID_RF_PARAMETER_UPDATE => {
            let mut r = Reader::new(payload);
            let status = r.u8("status")?;
            let invalid_params = match r.opt_u8() {
                Some(count) => r.bytes(count as usize, "invalid parameters")?.to_vec(),
                None => Vec::new(),
            };
            NciEvent::RfParameterUpdateRsp { status, invalid_params }
        }
        _ => return Err(unknown_oid(GID_RF_MANAGEMENT, oid)),
    };
    Ok(event)
}

fn decode_rf_ntf(oid: u8, payload: &[u8]) -> NciResult<NciEvent> {
    let mut r = Reader::new(payload);
    let event = match oid {
        OID_RF_DISCOVER => {
            let discovery_id = r.u8("discovery id")?;
            let protocol = r.u8("protocol")?;
            let mode_tech = r.u8("mode/technology")?;
            let params = tech_params(mode_tech, r.counted("tech params")?)?;
            NciEvent::RfDiscoverNtf(RfDiscoverNtf {
                discovery_id,
                protocol,
                mode_tech,
                params,
                notification_type: r.u8("notification type")?,
            })
        }
        OID_RF_INTF_ACTIVATED => {
            let discovery_id = r.u8("discovery id")?;
            let interface = r.u8("interface")?;
            let protocol = r.u8("protocol")?;
            let mode_tech = r.u8("mode/technology")?;
            let max_data_payload = r.u8("max data payload")?;
            let initial_credits = r.u8("initial credits")?;
            let params = tech_params(mode_tech, r.counted("tech params")?)?;
            NciEvent::RfIntfActivatedNtf(RfIntfActivatedNtf {
                discovery_id,
                interface,
                protocol,
                mode_tech,
                max_data_payload,
                initial_credits,
                params,
                data_mode_tech: r.u8("data exchange mode/technology")?,
                tx_bit_rate: r.u8("tx bit rate")?,
                rx_bit_rate: r.u8("rx bit rate")?,
                activation_params: r.counted("activation params")?.to_vec(),
            })
        }
        OID_RF_DEACTIVATE => NciEvent::RfDeactivateNtf(RfDeactivateNtf {
            deactivation_type: r.u8("deactivation type")?,
            reason: r.u8("reason")?,
        }),
        OID_RF_FIELD_INFO => NciEvent::RfFieldInfoNtf {
            field_on: r.u8("field status")? & 0x01 != 0,
        },
        OID_RF_T3T_POLLING => NciEvent::RfT3tPollingNtf(RfT3tPollingNtf {
            status: r.u8("status")?,
            responses: r.u8("response count")?,
            data: r.rest().to_vec(),
        }),
        OID_RF_NFCEE_ACTION => {
            let nfcee_id = r.u8("nfcee id")?;
            let trigger = r.u8("trigger")?;
            NciEvent::RfNfceeActionNtf(RfNfceeActionNtf {
                nfcee_id,
                trigger,
                data: r.counted("supporting data")?.to_vec(),
            })
        }
        OID_RF_NFCEE_DISCOVERY_REQ => {
            let count = r.u8("entry count")?;
            NciEvent::RfNfceeDiscoveryReqNtf {
                entries: r.tlvs(count)?,
            }
        }
        _ => return Err(unknown_oid(GID_RF_MANAGEMENT, oid)),
    };
    Ok(event)
}

/// Decode technology parameters; only NFC-A poll mode is broken out.
fn tech_params(mode_tech: u8, raw: &[u8]) -> NciResult<TechParams> {
    if mode_tech != (MODE_POLL | TECH_PASSIVE_NFCA) {
        return Ok(TechParams::Raw(raw.to_vec()));
    }

    let mut r = Reader::new(raw);
    let sens_res = r.bytes(2, "sens_res")?;
    let nfcid1 = r.counted("nfcid1")?;
    if !matches!(nfcid1.len(), 0 | 4 | 7 | 10) {
        return Err(NciError::malformed(2, "nfcid1 length"));
    }
    let sel_res = match r.opt_u8() {
        Some(0) | None => None,
        Some(1) => Some(r.u8("sel_res")?),
        Some(_) => return Err(NciError::malformed(3 + nfcid1.len(), "sel_res length")),
    };
    Ok(TechParams::NfcAPoll(NfcAPollParams {
        sens_res: [sens_res[0], sens_res[1]],
        nfcid1: nfcid1.to_vec(),
        sel_res,
    }))
}

// ============================================================================
// NFCEE Management
// ============================================================================

fn decode_nfcee_rsp(oid: u8, payload: &[u8]) -> NciResult<NciEvent> {
    let mut r = Reader::new(payload);
    let event = match oid {
        OID_NFCEE_DISCOVER => NciEvent::NfceeDiscoverRsp(NfceeDiscoverRsp {
            status: r.u8("status")?,
            nfcee_count: r.opt_u8().unwrap_or(0),
        }),
        OID_NFCEE_MODE_SET => NciEvent::NfceeModeSetRsp { status: status(payload)? },
        _ => return Err(unknown_oid(GID_NFCEE_MANAGEMENT, oid)),
    };
    Ok(event)
}

fn decode_nfcee_ntf(oid: u8, payload: &[u8]) -> NciResult<NciEvent> {
    let mut r = Reader::new(payload);
    let event = match oid {
        OID_NFCEE_DISCOVER => {
            let nfcee_id = r.u8("nfcee id")?;
            let nfcee_status = r.u8("nfcee status")?;
            let protocols = r.counted("protocols")?.to_vec();
            let info = match r.opt_u8() {
                Some(count) => r.tlvs(count)?,
                None => Vec::new(),
            };
            NciEvent::NfceeDiscoverNtf(NfceeDiscoverNtf {
                nfcee_id,
                nfcee_status,
                protocols,
                info,
            })
        }
        OID_NFCEE_STATUS => NciEvent::NfceeStatusNtf(NfceeStatusNtf {
            nfcee_id: r.u8("nfcee id")?,
            nfcee_status: r.u8("nfcee status")?,
        }),
        _ => return Err(unknown_oid(GID_NFCEE_MANAGEMENT, oid)),
    };
    Ok(event)
}
