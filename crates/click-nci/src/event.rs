//! Decoded NCI responses and notifications.

use crate::constants::*;

/// A type-length-value parameter, as used by configuration, connection
/// and routing messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tlv {
    pub tag: u8,
    pub value: Vec<u8>,
}

impl Tlv {
    pub fn new(tag: u8, value: &[u8]) -> Self {
        Tlv {
            tag,
            value: value.to_vec(),
        }
    }
}

/// RF technology specific parameters of a discovered or activated target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TechParams {
    NfcAPoll(NfcAPollParams),
    /// Any other technology/mode, undecoded.
    Raw(Vec<u8>),
}

/// NFC-A poll mode parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NfcAPollParams {
    pub sens_res: [u8; 2],
    /// 0, 4, 7 or 10 bytes.
    pub nfcid1: Vec<u8>,
    pub sel_res: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreResetRsp {
    pub status: u8,
    pub nci_version: Option<u8>,
    pub config_status: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreResetNtf {
    pub reason: u8,
    pub config_status: Option<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreInitRsp {
    pub status: u8,
    pub nfcc_features: u32,
    pub rf_interfaces: Vec<u8>,
    pub max_logical_connections: u8,
    pub max_routing_table_size: u16,
    pub max_control_payload: u8,
    pub max_large_parameter_size: u16,
    pub manufacturer_id: u8,
    pub manufacturer_info: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreSetConfigRsp {
    pub status: u8,
    /// Identifiers of parameters the controller rejected.
    pub invalid_params: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreGetConfigRsp {
    pub status: u8,
    pub params: Vec<Tlv>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreConnCreateRsp {
    pub status: u8,
    pub max_data_payload: u8,
    pub initial_credits: u8,
    pub conn_id: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnCredits {
    pub conn_id: u8,
    pub credits: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreInterfaceErrorNtf {
    pub status: u8,
    pub conn_id: u8,
}

/// One remote endpoint found during discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RfDiscoverNtf {
    pub discovery_id: u8,
    pub protocol: u8,
    pub mode_tech: u8,
    pub params: TechParams,
    /// [`DISCOVER_NTF_LAST`], [`DISCOVER_NTF_LAST_LIMIT`] or [`DISCOVER_NTF_MORE`].
    pub notification_type: u8,
}

impl RfDiscoverNtf {
    pub fn more_to_come(&self) -> bool {
        self.notification_type == DISCOVER_NTF_MORE
    }
}

/// An RF interface was activated on a remote endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RfIntfActivatedNtf {
    pub discovery_id: u8,
    pub interface: u8,
    pub protocol: u8,
    pub mode_tech: u8,
    pub max_data_payload: u8,
    pub initial_credits: u8,
    pub params: TechParams,
    pub data_mode_tech: u8,
    pub tx_bit_rate: u8,
    pub rx_bit_rate: u8,
    pub activation_params: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RfDeactivateNtf {
    pub deactivation_type: u8,
    pub reason: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RfT3tPollingNtf {
    pub status: u8,
    pub responses: u8,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RfNfceeActionNtf {
    pub nfcee_id: u8,
    pub trigger: u8,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NfceeDiscoverRsp {
    pub status: u8,
    pub nfcee_count: u8,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NfceeDiscoverNtf {
    pub nfcee_id: u8,
    pub nfcee_status: u8,
    pub protocols: Vec<u8>,
    pub info: Vec<Tlv>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NfceeStatusNtf {
    pub nfcee_id: u8,
    pub nfcee_status: u8,
}

/// The last dispatched response or notification.
///
/// `None` means no new packet was decoded on the last poll.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NciEvent {
    #[default]
    None,

    // NCI core
    CoreResetRsp(CoreResetRsp),
    CoreResetNtf(CoreResetNtf),
    CoreInitRsp(CoreInitRsp),
    CoreSetConfigRsp(CoreSetConfigRsp),
    CoreGetConfigRsp(CoreGetConfigRsp),
    CoreConnCreateRsp(CoreConnCreateRsp),
    CoreConnCloseRsp { status: u8 },
    CoreConnCreditsNtf(Vec<ConnCredits>),
    CoreGenericErrorNtf { status: u8 },
    CoreInterfaceErrorNtf(CoreInterfaceErrorNtf),
    CoreSetPowerSubStateRsp { status: u8 },

    // RF management
    RfDiscoverMapRsp { status: u8 },
    RfSetListenModeRoutingRsp { status: u8 },
    RfGetListenModeRoutingRsp { status: u8 },
    RfDiscoverRsp { status: u8 },
    RfDiscoverNtf(RfDiscoverNtf),
    RfDiscoverSelectRsp { status: u8 },
    RfIntfActivatedNtf(RfIntfActivatedNtf),
    RfDeactivateRsp { status: u8 },
    RfDeactivateNtf(RfDeactivateNtf),
    RfFieldInfoNtf { field_on: bool },
    RfT3tPollingRsp { status: u8 },
    RfT3tPollingNtf(RfT3tPollingNtf),
    RfNfceeActionNtf(RfNfceeActionNtf),
    RfNfceeDiscoveryReqNtf { entries: Vec<Tlv> },
    RfParameterUpdateRsp { status: u8, invalid_params: Vec<u8> },

    // NFCEE management
    NfceeDiscoverRsp(NfceeDiscoverRsp),
    NfceeDiscoverNtf(NfceeDiscoverNtf),
    NfceeModeSetRsp { status: u8 },
    NfceeStatusNtf(NfceeStatusNtf),

    /// Data received on a logical connection.
    Data { conn_id: u8, payload: Vec<u8> },

    // NXP proprietary
    PropSetPowerModeRsp { status: u8 },
    PropActRsp { status: u8, info: Vec<u8> },
    PropIsoDepPresenceCheckRsp { status: u8 },
    PropIsoDepPresenceCheckNtf { present: bool },
}

impl NciEvent {
    pub fn is_none(&self) -> bool {
        matches!(self, NciEvent::None)
    }

    /// Status byte of a response, if the event carries one.
    pub fn status(&self) -> Option<u8> {
        match self {
            NciEvent::CoreResetRsp(rsp) => Some(rsp.status),
            NciEvent::CoreInitRsp(rsp) => Some(rsp.status),
            NciEvent::CoreSetConfigRsp(rsp) => Some(rsp.status),
            NciEvent::CoreGetConfigRsp(rsp) => Some(rsp.status),
            NciEvent::CoreConnCreateRsp(rsp) => Some(rsp.status),
            NciEvent::NfceeDiscoverRsp(rsp) => Some(rsp.status),
            NciEvent::CoreConnCloseRsp { status }
            | NciEvent::CoreGenericErrorNtf { status }
            | NciEvent::CoreSetPowerSubStateRsp { status }
            | NciEvent::RfDiscoverMapRsp { status }
            | NciEvent::RfSetListenModeRoutingRsp { status }
            | NciEvent::RfGetListenModeRoutingRsp { status }
            | NciEvent::RfDiscoverRsp { status }
            | NciEvent::RfDiscoverSelectRsp { status }
            | NciEvent::RfDeactivateRsp { status }
            | NciEvent::RfT3tPollingRsp { status }
            | NciEvent::RfParameterUpdateRsp { status, .. }
            | NciEvent::NfceeModeSetRsp { status }
            | NciEvent::PropSetPowerModeRsp { status }
            | NciEvent::PropActRsp { status, .. }
            | NciEvent::PropIsoDepPresenceCheckRsp { status } => Some(*status),
            NciEvent::CoreInterfaceErrorNtf(ntf) => Some(ntf.status),
            NciEvent::RfT3tPollingNtf(ntf) => Some(ntf.status),
            _ => None,
        }
    }
}
