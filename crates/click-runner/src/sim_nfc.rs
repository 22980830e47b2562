//! A simulated PN7150 with one NFC-A Type 2 Tag in its field.
//!
//! Commands are answered synchronously from [`NciTransport::write`]. Every
//! queued packet keeps the IRQ flag raised until it has been read.

use std::collections::VecDeque;

use click_nci::*;
use tracing::{debug, trace};

/// UID of the simulated tag.
pub const TAG_UID: [u8; 7] = [0x04, 0xA1, 0xB2, 0xC3, 0xD4, 0xE5, 0xF6];

/// T2T READ command code.
pub const T2T_READ: u8 = 0x30;

const FIRMWARE_VERSION: [u8; 3] = [0x08, 0x01, 0x12];
const T2T_PAGE_SIZE: usize = 4;
const T2T_READ_LEN: usize = 16;

/// Tag memory: UID and lock bytes, capability container, then an NDEF
/// message holding the URI `https://example.com`.
fn tag_memory() -> Vec<u8> {
    let mut memory = vec![0u8; 64];
    memory[..3].copy_from_slice(&TAG_UID[..3]);
    memory[4..8].copy_from_slice(&TAG_UID[3..]);
    memory[12..16].copy_from_slice(&[0xE1, 0x10, 0x06, 0x00]);
    let ndef = [
        0x03, 0x10, 0xD1, 0x01, 0x0C, 0x55, 0x04, b'e', b'x', b'a', b'm', b'p', b'l', b'e', b'.', b'c', b'o', b'm',
        0xFE,
    ];
    memory[16..16 + ndef.len()].copy_from_slice(&ndef);
    memory
}

pub struct SimPn7150 {
    pending: VecDeque<Vec<u8>>,
    irq: Option<PacketReady>,
    memory: Vec<u8>,
    initialized: bool,
    discovering: bool,
    activated: bool,
    activations: u32,
    sent: Vec<Vec<u8>>,
}

impl Default for SimPn7150 {
    fn default() -> Self {
        Self::new()
    }
}

impl SimPn7150 {
    pub fn new() -> Self {
        SimPn7150 {
            pending: VecDeque::new(),
            irq: None,
            memory: tag_memory(),
            initialized: false,
            discovering: false,
            activated: false,
            activations: 0,
            sent: Vec::new(),
        }
    }

    /// Connect the IRQ line.
    pub fn attach_irq(&mut self, irq: PacketReady) {
        self.irq = Some(irq);
        self.raise_irq();
    }

    /// Packets received from the host.
    pub fn sent(&self) -> &[Vec<u8>] {
        &self.sent
    }

    pub fn activations(&self) -> u32 {
        self.activations
    }

    fn raise_irq(&self) {
        if let (Some(irq), false) = (&self.irq, self.pending.is_empty()) {
            irq.notify();
        }
    }

    fn queue(&mut self, packet: Packet) {
        self.pending.push_back(packet.encode());
    }

    fn control(&mut self, mt: MessageType, gid: u8, oid: u8, payload: &[u8]) {
        // Every payload built here is far below the packet limit.
        if let Ok(packet) = Packet::control(mt, gid, oid, payload) {
            self.queue(packet);
        }
    }

    fn respond(&mut self, gid: u8, oid: u8, payload: &[u8]) {
        self.control(MessageType::Response, gid, oid, payload);
    }

    fn notify(&mut self, gid: u8, oid: u8, payload: &[u8]) {
        self.control(MessageType::Notification, gid, oid, payload);
    }

    fn activate_tag(&mut self) {
        let mut payload = vec![
            0x01,
            INTERFACE_FRAME,
            PROTOCOL_T2T,
            MODE_POLL | TECH_PASSIVE_NFCA,
            0xFF,
            0x01,
        ];
        let mut params = vec![0x44, 0x00, TAG_UID.len() as u8];
        params.extend_from_slice(&TAG_UID);
        params.extend_from_slice(&[0x01, 0x00]);
        payload.push(params.len() as u8);
        payload.extend_from_slice(&params);
        payload.extend_from_slice(&[MODE_POLL | TECH_PASSIVE_NFCA, 0x00, 0x00, 0x00]);

        self.activated = true;
        self.activations += 1;
        debug!(activations = self.activations, "sim pn7150: tag activated");
        self.notify(GID_RF_MANAGEMENT, OID_RF_INTF_ACTIVATED, &payload);
    }

    fn handle_command(&mut self, gid: u8, oid: u8, payload: &[u8]) {
        match (gid, oid) {
            (GID_CORE, OID_CORE_RESET) => {
                self.initialized = false;
                self.discovering = false;
                self.activated = false;
                let reset_type = payload.first().copied().unwrap_or(RESET_TYPE_KEEP_CONFIG);
                self.respond(GID_CORE, OID_CORE_RESET, &[STATUS_OK, 0x10, reset_type]);
            }
            (GID_CORE, OID_CORE_INIT) => {
                self.initialized = true;
                let mut rsp = vec![STATUS_OK, 0x1E, 0x03, 0x00, 0x00];
                rsp.extend_from_slice(&[0x04, INTERFACE_NFCEE_DIRECT, INTERFACE_FRAME, INTERFACE_ISO_DEP, INTERFACE_TAG_CMD]);
                rsp.extend_from_slice(&[0x01, 0x00, 0x02, 0xFF, 0x00, 0x01, 0x04]);
                rsp.extend_from_slice(&[0x50, 0x10, 0x00, 0x00]);
                self.respond(GID_CORE, OID_CORE_INIT, &rsp);
            }
            (GID_CORE, OID_CORE_SET_CONFIG) => self.respond(GID_CORE, OID_CORE_SET_CONFIG, &[STATUS_OK, 0x00]),
            (GID_PROPRIETARY, OID_PROP_ACT) => {
                let mut rsp = vec![STATUS_OK];
                rsp.extend_from_slice(&FIRMWARE_VERSION);
                self.respond(GID_PROPRIETARY, OID_PROP_ACT, &rsp);
            }
            (GID_PROPRIETARY, OID_PROP_SET_POWER_MODE) => {
                self.respond(GID_PROPRIETARY, OID_PROP_SET_POWER_MODE, &[STATUS_OK])
            }
            (GID_RF_MANAGEMENT, OID_RF_DISCOVER_MAP) => {
                let status = if self.initialized { STATUS_OK } else { STATUS_NOT_INITIALIZED };
                self.respond(GID_RF_MANAGEMENT, OID_RF_DISCOVER_MAP, &[status]);
            }
            (GID_RF_MANAGEMENT, OID_RF_DISCOVER) => {
                if !self.initialized {
                    return self.respond(GID_RF_MANAGEMENT, OID_RF_DISCOVER, &[STATUS_NOT_INITIALIZED]);
                }
                if self.discovering {
                    return self.respond(GID_RF_MANAGEMENT, OID_RF_DISCOVER, &[STATUS_DISCOVERY_ALREADY_STARTED]);
                }
                self.discovering = true;
                self.respond(GID_RF_MANAGEMENT, OID_RF_DISCOVER, &[STATUS_OK]);
                self.activate_tag();
            }
            (GID_RF_MANAGEMENT, OID_RF_DEACTIVATE) => {
                let kind = payload.first().copied().unwrap_or(DEACTIVATION_IDLE);
                self.respond(GID_RF_MANAGEMENT, OID_RF_DEACTIVATE, &[STATUS_OK]);
                self.notify(GID_RF_MANAGEMENT, OID_RF_DEACTIVATE, &[kind, DEACTIVATION_REASON_DH_REQUEST]);
                self.activated = false;
                if kind == DEACTIVATION_DISCOVERY {
                    // The tag is still in the field.
                    self.activate_tag();
                } else {
                    self.discovering = false;
                }
            }
            _ => {
                debug!(gid, oid, "sim pn7150: unsupported command");
                self.respond(gid, oid, &[STATUS_REJECTED]);
            }
        }
    }

    fn handle_data(&mut self, conn_id: u8, payload: &[u8]) {
        if conn_id != CONN_ID_STATIC_RF || !self.activated {
            self.notify(GID_CORE, OID_CORE_INTERFACE_ERROR, &[STATUS_REJECTED, conn_id]);
            return;
        }
        let response = match payload {
            [T2T_READ, block] => {
                let start = *block as usize * T2T_PAGE_SIZE;
                // Reads wrap around the end of memory.
                let mut data: Vec<u8> = (0..T2T_READ_LEN)
                    .map(|i| self.memory[(start + i) % self.memory.len()])
                    .collect();
                data.push(STATUS_OK);
                data
            }
            // NACK
            _ => vec![0x00, STATUS_OK],
        };
        if let Ok(packet) = Packet::data(conn_id, &response) {
            self.queue(packet);
        }
        self.notify(GID_CORE, OID_CORE_CONN_CREDITS, &[0x01, conn_id, 0x01]);
    }
}

impl NciTransport for SimPn7150 {
    fn write(&mut self, bytes: &[u8]) -> NciResult<()> {
        let packet = Packet::decode(bytes)?;
        trace!(bytes = %hex::encode_upper(bytes), "sim pn7150: rx");
        self.sent.push(bytes.to_vec());
        match packet.header {
            PacketHeader::Control {
                mt: MessageType::Command,
                gid,
                oid,
            } => self.handle_command(gid, oid, &packet.payload),
            PacketHeader::Data { conn_id } => self.handle_data(conn_id, &packet.payload),
            PacketHeader::Control { mt, .. } => return Err(NciError::UnknownMt(mt.bits())),
        }
        self.raise_irq();
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> NciResult<usize> {
        let packet = self.pending.pop_front().ok_or(NciError::Tml("no packet pending"))?;
        if buf.len() < packet.len() {
            return Err(NciError::InvalidParameter);
        }
        buf[..packet.len()].copy_from_slice(&packet);
        self.raise_irq();
        Ok(packet.len())
    }
}
