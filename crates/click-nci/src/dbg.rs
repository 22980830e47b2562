//! Human-readable names and logging for packets and events.

use log::{debug, log_enabled, trace, Level};

use crate::constants::*;
use crate::event::{NciEvent, TechParams};

impl NciEvent {
    /// NCI message name, e.g. `"CORE_RESET_RSP"`.
    pub fn name(&self) -> &'static str {
        match self {
            NciEvent::None => "NONE",
            NciEvent::CoreResetRsp(_) => "CORE_RESET_RSP",
            NciEvent::CoreResetNtf(_) => "CORE_RESET_NTF",
            NciEvent::CoreInitRsp(_) => "CORE_INIT_RSP",
            NciEvent::CoreSetConfigRsp(_) => "CORE_SET_CONFIG_RSP",
            NciEvent::CoreGetConfigRsp(_) => "CORE_GET_CONFIG_RSP",
            NciEvent::CoreConnCreateRsp(_) => "CORE_CONN_CREATE_RSP",
            NciEvent::CoreConnCloseRsp { .. } => "CORE_CONN_CLOSE_RSP",
            NciEvent::CoreConnCreditsNtf(_) => "CORE_CONN_CREDITS_NTF",
            NciEvent::CoreGenericErrorNtf { .. } => "CORE_GENERIC_ERROR_NTF",
            NciEvent::CoreInterfaceErrorNtf(_) => "CORE_INTERFACE_ERROR_NTF",
            NciEvent::CoreSetPowerSubStateRsp { .. } => "CORE_SET_POWER_SUB_STATE_RSP",
            NciEvent::RfDiscoverMapRsp { .. } => "RF_DISCOVER_MAP_RSP",
            NciEvent::RfSetListenModeRoutingRsp { .. } => "RF_SET_LISTEN_MODE_ROUTING_RSP",
            NciEvent::RfGetListenModeRoutingRsp { .. } => "RF_GET_LISTEN_MODE_ROUTING_RSP",
            NciEvent::RfDiscoverRsp { .. } => "RF_DISCOVER_RSP",
            NciEvent::RfDiscoverNtf(_) => "RF_DISCOVER_NTF",
            NciEvent::RfDiscoverSelectRsp { .. } => "RF_DISCOVER_SELECT_RSP",
            NciEvent::RfIntfActivatedNtf(_) => "RF_INTF_ACTIVATED_NTF",
            NciEvent::RfDeactivateRsp { .. } => "RF_DEACTIVATE_RSP",
            NciEvent::RfDeactivateNtf(_) => "RF_DEACTIVATE_NTF",
            NciEvent::RfFieldInfoNtf { .. } => "RF_FIELD_INFO_NTF",
            NciEvent::RfT3tPollingRsp { .. } => "RF_T3T_POLLING_RSP",
            NciEvent::RfT3tPollingNtf(_) => "RF_T3T_POLLING_NTF",
            NciEvent::RfNfceeActionNtf(_) => "RF_NFCEE_ACTION_NTF",
            NciEvent::RfNfceeDiscoveryReqNtf { .. } => "RF_NFCEE_DISCOVERY_REQ_NTF",
            NciEvent::RfParameterUpdateRsp { .. } => "RF_PARAMETER_UPDATE_RSP",
            NciEvent::NfceeDiscoverRsp(_) => "NFCEE_DISCOVER_RSP",
            NciEvent::NfceeDiscoverNtf(_) => "NFCEE_DISCOVER_NTF",
            NciEvent::NfceeModeSetRsp { .. } => "NFCEE_MODE_SET_RSP",
            NciEvent::NfceeStatusNtf(_) => "NFCEE_STATUS_NTF",
            NciEvent::Data { .. } => "DATA",
            NciEvent::PropSetPowerModeRsp { .. } => "PROP_SET_POWER_MODE_RSP",
            NciEvent::PropActRsp { .. } => "PROP_ACT_RSP",
            NciEvent::PropIsoDepPresenceCheckRsp { .. } => "PROP_ISO_DEP_PRESENCE_CHECK_RSP",
            NciEvent::PropIsoDepPresenceCheckNtf { .. } => "PROP_ISO_DEP_PRESENCE_CHECK_NTF",
        }
    }
}

pub fn status_name(status: u8) -> &'static str {
    match status {
        STATUS_OK => "OK",
        STATUS_REJECTED => "REJECTED",
        STATUS_RF_FRAME_CORRUPTED => "RF_FRAME_CORRUPTED",
        STATUS_FAILED => "FAILED",
        STATUS_NOT_INITIALIZED => "NOT_INITIALIZED",
        STATUS_SYNTAX_ERROR => "SYNTAX_ERROR",
        STATUS_SEMANTIC_ERROR => "SEMANTIC_ERROR",
        STATUS_INVALID_PARAM => "INVALID_PARAM",
        STATUS_MESSAGE_SIZE_EXCEEDED => "MESSAGE_SIZE_EXCEEDED",
        STATUS_DISCOVERY_ALREADY_STARTED => "DISCOVERY_ALREADY_STARTED",
        STATUS_DISCOVERY_TARGET_ACTIVATION_FAILED => "DISCOVERY_TARGET_ACTIVATION_FAILED",
        STATUS_DISCOVERY_TEAR_DOWN => "DISCOVERY_TEAR_DOWN",
        STATUS_RF_TRANSMISSION_ERROR => "RF_TRANSMISSION_ERROR",
        STATUS_RF_PROTOCOL_ERROR => "RF_PROTOCOL_ERROR",
        STATUS_RF_TIMEOUT_ERROR => "RF_TIMEOUT_ERROR",
        STATUS_NFCEE_INTERFACE_ACTIVATION_FAILED => "NFCEE_INTERFACE_ACTIVATION_FAILED",
        STATUS_NFCEE_TRANSMISSION_ERROR => "NFCEE_TRANSMISSION_ERROR",
        STATUS_NFCEE_PROTOCOL_ERROR => "NFCEE_PROTOCOL_ERROR",
        STATUS_NFCEE_TIMEOUT_ERROR => "NFCEE_TIMEOUT_ERROR",
        _ => "UNKNOWN",
    }
}

pub fn protocol_name(protocol: u8) -> &'static str {
    match protocol {
        PROTOCOL_UNDETERMINED => "UNDETERMINED",
        PROTOCOL_T1T => "T1T",
        PROTOCOL_T2T => "T2T",
        PROTOCOL_T3T => "T3T",
        PROTOCOL_ISO_DEP => "ISO_DEP",
        PROTOCOL_NFC_DEP => "NFC_DEP",
        PROTOCOL_MIFARE => "MIFARE",
        _ => "UNKNOWN",
    }
}

pub fn interface_name(interface: u8) -> &'static str {
    match interface {
        INTERFACE_NFCEE_DIRECT => "NFCEE_DIRECT",
        INTERFACE_FRAME => "FRAME",
        INTERFACE_ISO_DEP => "ISO_DEP",
        INTERFACE_NFC_DEP => "NFC_DEP",
        INTERFACE_TAG_CMD => "TAG_CMD",
        _ => "UNKNOWN",
    }
}

/// Trace a raw packet; `direction` is `"tx"` or `"rx"`.
pub fn log_packet(direction: &str, bytes: &[u8]) {
    if log_enabled!(Level::Trace) {
        trace!("nci {}: {}", direction, hex::encode_upper(bytes));
    }
}

/// Log a decoded event with its most useful fields.
pub fn log_event(event: &NciEvent) {
    match event {
        NciEvent::None => {}
        NciEvent::RfIntfActivatedNtf(act) => {
            debug!(
                "nci: {} protocol={} interface={} max_payload={}",
                event.name(),
                protocol_name(act.protocol),
                interface_name(act.interface),
                act.max_data_payload
            );
            if let TechParams::NfcAPoll(params) = &act.params {
                debug!("nci: NFCID1 {}", hex::encode_upper(&params.nfcid1));
            }
        }
        NciEvent::RfDiscoverNtf(ntf) => debug!(
            "nci: {} id={} protocol={} more={}",
            event.name(),
            ntf.discovery_id,
            protocol_name(ntf.protocol),
            ntf.more_to_come()
        ),
        NciEvent::Data { conn_id, payload } => {
            debug!("nci: DATA conn={} {}", conn_id, hex::encode_upper(payload))
        }
        _ => match event.status() {
            Some(status) => debug!("nci: {} status={}", event.name(), status_name(status)),
            None => debug!("nci: {}", event.name()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names() {
        assert_eq!(NciEvent::None.name(), "NONE");
        assert_eq!(NciEvent::RfDeactivateRsp { status: 0 }.name(), "RF_DEACTIVATE_RSP");
        assert_eq!(status_name(STATUS_RF_TIMEOUT_ERROR), "RF_TIMEOUT_ERROR");
        assert_eq!(status_name(0x7F), "UNKNOWN");
        assert_eq!(protocol_name(PROTOCOL_T2T), "T2T");
        assert_eq!(interface_name(INTERFACE_TAG_CMD), "TAG_CMD");
    }
}
