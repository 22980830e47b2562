//! NCI constants
//!
//! Message types, group and opcode identifiers, status codes and RF
//! parameters from the NFC Forum NCI 1.0 specification, plus the NXP
//! proprietary opcodes implemented by the PN7150.

// ============================================================================
// Packet Layout
// ============================================================================

/// Header length: MT/PBF/GID (or ConnID), OID, payload length.
pub const NCI_PACKET_HEADER_LEN: usize = 3;
/// Maximum payload of a single packet.
pub const NCI_PACKET_PAYLOAD_MAX_LEN: usize = 255;
/// Maximum packet length on the wire.
pub const NCI_PACKET_MAX_LEN: usize = NCI_PACKET_HEADER_LEN + NCI_PACKET_PAYLOAD_MAX_LEN;
/// Largest segmented message the reassembler accepts.
pub const NCI_MESSAGE_MAX_LEN: usize = 1024;

pub const MT_SHIFT: u8 = 5;
pub const MT_MASK: u8 = 0xE0;
pub const PBF_MASK: u8 = 0x10;
pub const GID_MASK: u8 = 0x0F;
pub const CONN_ID_MASK: u8 = 0x0F;
pub const OID_MASK: u8 = 0x3F;

// ============================================================================
// Message Types
// ============================================================================

pub const MT_DATA: u8 = 0x00;
pub const MT_CTRL_CMD: u8 = 0x01;
pub const MT_CTRL_RSP: u8 = 0x02;
pub const MT_CTRL_NTF: u8 = 0x03;

// ============================================================================
// Group Identifiers
// ============================================================================

pub const GID_CORE: u8 = 0x00;
pub const GID_RF_MANAGEMENT: u8 = 0x01;
pub const GID_NFCEE_MANAGEMENT: u8 = 0x02;
pub const GID_PROPRIETARY: u8 = 0x0F;

// ============================================================================
// Opcode Identifiers: NCI Core
// ============================================================================

pub const OID_CORE_RESET: u8 = 0x00;
pub const OID_CORE_INIT: u8 = 0x01;
pub const OID_CORE_SET_CONFIG: u8 = 0x02;
pub const OID_CORE_GET_CONFIG: u8 = 0x03;
pub const OID_CORE_CONN_CREATE: u8 = 0x04;
pub const OID_CORE_CONN_CLOSE: u8 = 0x05;
pub const OID_CORE_CONN_CREDITS: u8 = 0x06;
pub const OID_CORE_GENERIC_ERROR: u8 = 0x07;
pub const OID_CORE_INTERFACE_ERROR: u8 = 0x08;
pub const OID_CORE_SET_POWER_SUB_STATE: u8 = 0x09;

// ============================================================================
// Opcode Identifiers: RF Management
// ============================================================================

pub const OID_RF_DISCOVER_MAP: u8 = 0x00;
pub const OID_RF_SET_LISTEN_MODE_ROUTING: u8 = 0x01;
pub const OID_RF_GET_LISTEN_MODE_ROUTING: u8 = 0x02;
pub const OID_RF_DISCOVER: u8 = 0x03;
pub const OID_RF_DISCOVER_SELECT: u8 = 0x04;
pub const OID_RF_INTF_ACTIVATED: u8 = 0x05;
pub const OID_RF_DEACTIVATE: u8 = 0x06;
pub const OID_RF_FIELD_INFO: u8 = 0x07;
pub const OID_RF_T3T_POLLING: u8 = 0x08;
pub const OID_RF_NFCEE_ACTION: u8 = 0x09;
pub const OID_RF_NFCEE_DISCOVERY_REQ: u8 = 0x0A;
pub const OID_RF_PARAMETER_UPDATE: u8 = 0x0B;

// ============================================================================
// Opcode Identifiers: NFCEE Management
// ============================================================================

pub const OID_NFCEE_DISCOVER: u8 = 0x00;
pub const OID_NFCEE_MODE_SET: u8 = 0x01;
pub const OID_NFCEE_STATUS: u8 = 0x02;

// ============================================================================
// Opcode Identifiers: NXP Proprietary
// ============================================================================

pub const OID_PROP_SET_POWER_MODE: u8 = 0x00;
pub const OID_PROP_ACT: u8 = 0x02;
pub const OID_PROP_ISO_DEP_PRESENCE_CHECK: u8 = 0x11;

// ============================================================================
// Status Codes
// ============================================================================

pub const STATUS_OK: u8 = 0x00;
pub const STATUS_REJECTED: u8 = 0x01;
pub const STATUS_RF_FRAME_CORRUPTED: u8 = 0x02;
pub const STATUS_FAILED: u8 = 0x03;
pub const STATUS_NOT_INITIALIZED: u8 = 0x04;
pub const STATUS_SYNTAX_ERROR: u8 = 0x05;
pub const STATUS_SEMANTIC_ERROR: u8 = 0x06;
pub const STATUS_INVALID_PARAM: u8 = 0x09;
pub const STATUS_MESSAGE_SIZE_EXCEEDED: u8 = 0x0A;
pub const STATUS_DISCOVERY_ALREADY_STARTED: u8 = 0xA0;
pub const STATUS_DISCOVERY_TARGET_ACTIVATION_FAILED: u8 = 0xA1;
pub const STATUS_DISCOVERY_TEAR_DOWN: u8 = 0xA2;
pub const STATUS_RF_TRANSMISSION_ERROR: u8 = 0xB0;
pub const STATUS_RF_PROTOCOL_ERROR: u8 = 0xB1;
pub const STATUS_RF_TIMEOUT_ERROR: u8 = 0xB2;
pub const STATUS_NFCEE_INTERFACE_ACTIVATION_FAILED: u8 = 0xC0;
pub const STATUS_NFCEE_TRANSMISSION_ERROR: u8 = 0xC1;
pub const STATUS_NFCEE_PROTOCOL_ERROR: u8 = 0xC2;
pub const STATUS_NFCEE_TIMEOUT_ERROR: u8 = 0xC3;

// ============================================================================
// Reset
// ============================================================================

pub const RESET_TYPE_KEEP_CONFIG: u8 = 0x00;
pub const RESET_TYPE_RESET_CONFIG: u8 = 0x01;

// ============================================================================
// RF Protocols
// ============================================================================

pub const PROTOCOL_UNDETERMINED: u8 = 0x00;
pub const PROTOCOL_T1T: u8 = 0x01;
pub const PROTOCOL_T2T: u8 = 0x02;
pub const PROTOCOL_T3T: u8 = 0x03;
pub const PROTOCOL_ISO_DEP: u8 = 0x04;
pub const PROTOCOL_NFC_DEP: u8 = 0x05;
/// NXP proprietary MIFARE Classic.
pub const PROTOCOL_MIFARE: u8 = 0x80;

// ============================================================================
// RF Interfaces
// ============================================================================

pub const INTERFACE_NFCEE_DIRECT: u8 = 0x00;
pub const INTERFACE_FRAME: u8 = 0x01;
pub const INTERFACE_ISO_DEP: u8 = 0x02;
pub const INTERFACE_NFC_DEP: u8 = 0x03;
/// NXP proprietary MIFARE Classic interface.
pub const INTERFACE_TAG_CMD: u8 = 0x80;

// ============================================================================
// RF Technology and Mode
// ============================================================================

pub const MODE_POLL: u8 = 0x00;
pub const MODE_LISTEN: u8 = 0x80;

pub const TECH_PASSIVE_NFCA: u8 = 0x00;
pub const TECH_PASSIVE_NFCB: u8 = 0x01;
pub const TECH_PASSIVE_NFCF: u8 = 0x02;
pub const TECH_ACTIVE_NFCA: u8 = 0x03;
pub const TECH_ACTIVE_NFCF: u8 = 0x05;
pub const TECH_PASSIVE_15693: u8 = 0x06;

/// Discover map mode bits.
pub const MAP_MODE_POLL: u8 = 0x01;
pub const MAP_MODE_LISTEN: u8 = 0x02;

// ============================================================================
// Deactivation
// ============================================================================

pub const DEACTIVATION_IDLE: u8 = 0x00;
pub const DEACTIVATION_SLEEP: u8 = 0x01;
pub const DEACTIVATION_SLEEP_AF: u8 = 0x02;
pub const DEACTIVATION_DISCOVERY: u8 = 0x03;

pub const DEACTIVATION_REASON_DH_REQUEST: u8 = 0x00;
pub const DEACTIVATION_REASON_ENDPOINT_REQUEST: u8 = 0x01;
pub const DEACTIVATION_REASON_RF_LINK_LOSS: u8 = 0x02;
pub const DEACTIVATION_REASON_BAD_AFI: u8 = 0x03;

// ============================================================================
// Discovery Notification Types
// ============================================================================

pub const DISCOVER_NTF_LAST: u8 = 0x00;
pub const DISCOVER_NTF_LAST_LIMIT: u8 = 0x01;
pub const DISCOVER_NTF_MORE: u8 = 0x02;

// ============================================================================
// Connections
// ============================================================================

/// Static RF connection, created on interface activation.
pub const CONN_ID_STATIC_RF: u8 = 0x00;
/// Static HCI connection.
pub const CONN_ID_STATIC_HCI: u8 = 0x01;

// ============================================================================
// PN7150
// ============================================================================

/// 7-bit I2C address with ADR0 = ADR1 = 0.
pub const PN7150_I2C_ADDRESS: u8 = 0x28;
