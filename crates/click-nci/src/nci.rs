//! The NCI context: send commands, poll for events.
//!
//! Reception is split in two halves. The IRQ handler only calls
//! [`PacketReady::notify`]; the main loop calls [`Nci::get_event`], which
//! does the blocking transport read and the decode.
//!
//! There is a single receive buffer and a single event slot. A packet read
//! on one poll replaces the event of the previous poll, so the caller must
//! finish with an event before polling again. When the controller has
//! several packets pending, it keeps IRQ asserted and each poll drains one.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use log::debug;

use crate::constants::*;
use crate::dbg::{log_event, log_packet};
use crate::decode::decode_message;
use crate::error::{NciError, NciResult};
use crate::event::{NciEvent, Tlv};
use crate::packet::{segment, MessageType, Packet, PacketHeader, Reassembler};
use crate::proprietary::PowerMode;
use crate::tml::NciTransport;

/// Flag set from interrupt context when the controller has a packet.
///
/// Cloning shares the flag.
#[derive(Debug, Clone, Default)]
pub struct PacketReady(Arc<AtomicBool>);

impl PacketReady {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mark a packet as pending. Safe to call from an IRQ handler or another thread.
    pub fn notify(&self) {
        self.0.store(true, Ordering::Release);
    }

    /// Consume the flag; returns whether it was set.
    pub fn take(&self) -> bool {
        self.0.swap(false, Ordering::AcqRel)
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// One entry of an `RF_DISCOVER_MAP_CMD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoverMapping {
    pub protocol: u8,
    /// [`MAP_MODE_POLL`] and/or [`MAP_MODE_LISTEN`].
    pub mode: u8,
    pub interface: u8,
}

/// One entry of an `RF_DISCOVER_CMD`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoverConfig {
    pub mode_tech: u8,
    /// Polling frequency in discovery periods; 1 polls every period.
    pub frequency: u8,
}

/// NCI host context over a transport.
pub struct Nci<T> {
    transport: T,
    ready: PacketReady,
    rx: [u8; NCI_PACKET_MAX_LEN],
    reassembler: Reassembler,
    event: NciEvent,
    max_data_payload: usize,
}

impl<T: NciTransport> Nci<T> {
    pub fn new(transport: T) -> Self {
        Nci {
            transport,
            ready: PacketReady::new(),
            rx: [0; NCI_PACKET_MAX_LEN],
            reassembler: Reassembler::new(),
            event: NciEvent::None,
            max_data_payload: NCI_PACKET_PAYLOAD_MAX_LEN,
        }
    }

    /// Handle to give to the IRQ handler.
    pub fn packet_ready(&self) -> PacketReady {
        self.ready.clone()
    }

    /// Same as calling [`PacketReady::notify`] on the shared handle.
    pub fn notify_incoming_packet(&self) {
        self.ready.notify();
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// The event decoded by the last successful poll.
    pub fn event(&self) -> &NciEvent {
        &self.event
    }

    /// Largest data packet payload on the active RF connection.
    pub fn max_data_payload(&self) -> usize {
        self.max_data_payload
    }

    /// Poll for a packet.
    ///
    /// Returns [`NciEvent::None`] when no packet was signalled or when the
    /// packet was a non-final segment. On error the previous event is left
    /// in place and must not be trusted.
    pub fn get_event(&mut self) -> NciResult<&NciEvent> {
        if !self.ready.take() {
            self.event = NciEvent::None;
            return Ok(&self.event);
        }
        let len = self.transport.read(&mut self.rx)?;
        log_packet("rx", &self.rx[..len]);
        let packet = Packet::decode(&self.rx[..len])?;
        self.dispatch(packet)
    }

    /// Decode and dispatch a packet obtained outside [`Nci::get_event`].
    pub fn process_packet(&mut self, bytes: &[u8]) -> NciResult<&NciEvent> {
        log_packet("rx", bytes);
        let packet = Packet::decode(bytes)?;
        self.dispatch(packet)
    }

    fn dispatch(&mut self, packet: Packet) -> NciResult<&NciEvent> {
        let Some(message) = self.reassembler.push(packet)? else {
            self.event = NciEvent::None;
            return Ok(&self.event);
        };
        let event = decode_message(&message.header, &message.payload)?;

        match &event {
            NciEvent::RfIntfActivatedNtf(act) => self.set_max_data_payload(act.max_data_payload),
            NciEvent::CoreConnCreateRsp(rsp) if rsp.status == STATUS_OK => {
                self.set_max_data_payload(rsp.max_data_payload)
            }
            _ => {}
        }
        log_event(&event);
        self.event = event;
        Ok(&self.event)
    }

    fn set_max_data_payload(&mut self, max: u8) {
        // Zero would make segmentation impossible.
        self.max_data_payload = (max as usize).clamp(1, NCI_PACKET_PAYLOAD_MAX_LEN);
        debug!("nci: max data payload {}", self.max_data_payload);
    }

    // ------------------------------------------------------------------------
    // Sending
    // ------------------------------------------------------------------------

    /// Send one control command.
    pub fn control_packet_send(&mut self, gid: u8, oid: u8, payload: &[u8]) -> NciResult<()> {
        let packet = Packet::control(MessageType::Command, gid, oid, payload)?;
        self.send(&packet)
    }

    /// Send data on a connection, segmented at the connection's max payload.
    pub fn data_packet_send(&mut self, conn_id: u8, payload: &[u8]) -> NciResult<()> {
        if payload.len() > NCI_MESSAGE_MAX_LEN {
            return Err(NciError::PayloadExceedMtu {
                max: NCI_MESSAGE_MAX_LEN,
                actual: payload.len(),
            });
        }
        for packet in segment(PacketHeader::Data { conn_id }, payload, self.max_data_payload)? {
            self.send(&packet)?;
        }
        Ok(())
    }

    fn send(&mut self, packet: &Packet) -> NciResult<()> {
        let bytes = packet.encode();
        log_packet("tx", &bytes);
        self.transport.write(&bytes)
    }

    // ------------------------------------------------------------------------
    // NCI core
    // ------------------------------------------------------------------------

    /// `reset_type` is [`RESET_TYPE_KEEP_CONFIG`] or [`RESET_TYPE_RESET_CONFIG`].
    pub fn core_reset(&mut self, reset_type: u8) -> NciResult<()> {
        if reset_type > RESET_TYPE_RESET_CONFIG {
            return Err(NciError::InvalidParameter);
        }
        self.reassembler.clear();
        self.max_data_payload = NCI_PACKET_PAYLOAD_MAX_LEN;
        self.control_packet_send(GID_CORE, OID_CORE_RESET, &[reset_type])
    }

    pub fn core_init(&mut self) -> NciResult<()> {
        self.control_packet_send(GID_CORE, OID_CORE_INIT, &[])
    }

    pub fn core_set_config(&mut self, params: &[Tlv]) -> NciResult<()> {
        let mut payload = Vec::new();
        payload.push(count(params.len())?);
        put_tlvs(&mut payload, params)?;
        self.control_packet_send(GID_CORE, OID_CORE_SET_CONFIG, &payload)
    }

    pub fn core_get_config(&mut self, ids: &[u8]) -> NciResult<()> {
        let mut payload = Vec::with_capacity(1 + ids.len());
        payload.push(count(ids.len())?);
        payload.extend_from_slice(ids);
        self.control_packet_send(GID_CORE, OID_CORE_GET_CONFIG, &payload)
    }

    pub fn core_conn_create(&mut self, destination_type: u8, params: &[Tlv]) -> NciResult<()> {
        let mut payload = vec![destination_type, count(params.len())?];
        put_tlvs(&mut payload, params)?;
        self.control_packet_send(GID_CORE, OID_CORE_CONN_CREATE, &payload)
    }

    pub fn core_conn_close(&mut self, conn_id: u8) -> NciResult<()> {
        self.control_packet_send(GID_CORE, OID_CORE_CONN_CLOSE, &[conn_id])
    }

    // ------------------------------------------------------------------------
    // RF management
    // ------------------------------------------------------------------------

    pub fn rf_discover_map(&mut self, mappings: &[DiscoverMapping]) -> NciResult<()> {
        let mut payload = Vec::with_capacity(1 + 3 * mappings.len());
        payload.push(count(mappings.len())?);
        for m in mappings {
            payload.extend_from_slice(&[m.protocol, m.mode, m.interface]);
        }
        self.control_packet_send(GID_RF_MANAGEMENT, OID_RF_DISCOVER_MAP, &payload)
    }

    /// `more` marks that another routing command follows.
    pub fn rf_set_listen_mode_routing(&mut self, more: bool, entries: &[Tlv]) -> NciResult<()> {
        let mut payload = vec![more as u8, count(entries.len())?];
        put_tlvs(&mut payload, entries)?;
        self.control_packet_send(GID_RF_MANAGEMENT, OID_RF_SET_LISTEN_MODE_ROUTING, &payload)
    }

    pub fn rf_discover(&mut self, configs: &[DiscoverConfig]) -> NciResult<()> {
        let mut payload = Vec::with_capacity(1 + 2 * configs.len());
        payload.push(count(configs.len())?);
        for c in configs {
            payload.extend_from_slice(&[c.mode_tech, c.frequency]);
        }
        self.control_packet_send(GID_RF_MANAGEMENT, OID_RF_DISCOVER, &payload)
    }

    pub fn rf_discover_select(&mut self, discovery_id: u8, protocol: u8, interface: u8) -> NciResult<()> {
        self.control_packet_send(
            GID_RF_MANAGEMENT,
            OID_RF_DISCOVER_SELECT,
            &[discovery_id, protocol, interface],
        )
    }

    pub fn rf_deactivate(&mut self, deactivation_type: u8) -> NciResult<()> {
        if deactivation_type > DEACTIVATION_DISCOVERY {
            return Err(NciError::InvalidParameter);
        }
        self.control_packet_send(GID_RF_MANAGEMENT, OID_RF_DEACTIVATE, &[deactivation_type])
    }

    // ------------------------------------------------------------------------
    // NFCEE management
    // ------------------------------------------------------------------------

    pub fn nfcee_discover(&mut self, enable: bool) -> NciResult<()> {
        self.control_packet_send(GID_NFCEE_MANAGEMENT, OID_NFCEE_DISCOVER, &[enable as u8])
    }

    pub fn nfcee_mode_set(&mut self, nfcee_id: u8, enable: bool) -> NciResult<()> {
        self.control_packet_send(GID_NFCEE_MANAGEMENT, OID_NFCEE_MODE_SET, &[nfcee_id, enable as u8])
    }

    // ------------------------------------------------------------------------
    // NXP proprietary
    // ------------------------------------------------------------------------

    /// Enable the proprietary extension; answered with the firmware version.
    pub fn prop_act(&mut self) -> NciResult<()> {
        self.control_packet_send(GID_PROPRIETARY, OID_PROP_ACT, &[])
    }

    pub fn prop_set_power_mode(&mut self, mode: PowerMode) -> NciResult<()> {
        self.control_packet_send(GID_PROPRIETARY, OID_PROP_SET_POWER_MODE, &[mode as u8])
    }

    pub fn prop_iso_dep_presence_check(&mut self) -> NciResult<()> {
        self.control_packet_send(GID_PROPRIETARY, OID_PROP_ISO_DEP_PRESENCE_CHECK, &[])
    }
}

fn count(len: usize) -> NciResult<u8> {
    u8::try_from(len).map_err(|_| NciError::InvalidParameter)
}

fn put_tlvs(payload: &mut Vec<u8>, tlvs: &[Tlv]) -> NciResult<()> {
    for tlv in tlvs {
        payload.push(tlv.tag);
        payload.push(count(tlv.value.len())?);
        payload.extend_from_slice(&tlv.value);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    #[derive(Default)]
    struct Loopback {
        sent: Vec<Vec<u8>>,
        rx: VecDeque<Vec<u8>>,
    }

    impl NciTransport for Loopback {
        fn write(&mut self, packet: &[u8]) -> NciResult<()> {
            self.sent.push(packet.to_vec());
            Ok(())
        }

        fn read(&mut self, buf: &mut [u8]) -> NciResult<usize> {
            let packet = self.rx.pop_front().ok_or(NciError::Tml("empty"))?;
            buf[..packet.len()].copy_from_slice(&packet);
            Ok(packet.len())
        }
    }

    #[test]
    fn test_no_packet_means_none() {
        let mut nci = Nci::new(Loopback::default());
        assert_eq!(nci.get_event(), Ok(&NciEvent::None));
        assert!(nci.transport().sent.is_empty());
    }

    #[test]
    fn test_command_encoding() {
        let mut nci = Nci::new(Loopback::default());
        nci.core_reset(RESET_TYPE_RESET_CONFIG).unwrap();
        nci.rf_discover(&[DiscoverConfig {
            mode_tech: MODE_POLL | TECH_PASSIVE_NFCA,
            frequency: 1,
        }])
        .unwrap();
        nci.rf_discover_map(&[DiscoverMapping {
            protocol: PROTOCOL_ISO_DEP,
            mode: MAP_MODE_POLL,
            interface: INTERFACE_ISO_DEP,
        }])
        .unwrap();
        nci.core_set_config(&[Tlv::new(0x00, &[0x1E])]).unwrap();
        nci.prop_set_power_mode(PowerMode::StandbyEnabled).unwrap();

        assert_eq!(
            nci.transport().sent,
            vec![
                vec![0x20, 0x00, 0x01, 0x01],
                vec![0x21, 0x03, 0x03, 0x01, 0x00, 0x01],
                vec![0x21, 0x00, 0x04, 0x01, 0x04, 0x01, 0x02],
                vec![0x20, 0x02, 0x04, 0x01, 0x00, 0x01, 0x1E],
                vec![0x2F, 0x00, 0x01, 0x01],
            ]
        );
    }

    #[test]
    fn test_invalid_arguments_send_nothing() {
        let mut nci = Nci::new(Loopback::default());
        assert_eq!(nci.core_reset(2), Err(NciError::InvalidParameter));
        assert_eq!(nci.rf_deactivate(4), Err(NciError::InvalidParameter));
        assert_eq!(nci.core_get_config(&[0u8; 256]), Err(NciError::InvalidParameter));
        assert!(nci.transport().sent.is_empty());
    }

    #[test]
    fn test_data_segmented_at_negotiated_payload() {
        let mut nci = Nci::new(Loopback::default());
        let activated = [
            0x61, 0x05, 0x0F, 0x01, 0x01, 0x02, 0x00, 0x02, 0x01, 0x04, 0x44, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
            0x00,
        ];
        nci.process_packet(&activated).unwrap();
        assert_eq!(nci.max_data_payload(), 2);

        nci.data_packet_send(0, &[1, 2, 3, 4, 5]).unwrap();
        assert_eq!(
            nci.transport().sent,
            vec![
                vec![0x10, 0x00, 0x02, 1, 2],
                vec![0x10, 0x00, 0x02, 3, 4],
                vec![0x00, 0x00, 0x01, 5],
            ]
        );
    }

    #[test]
    fn test_unknown_oid_keeps_previous_event() {
        let mut nci = Nci::new(Loopback::default());
        nci.process_packet(&[0x40, 0x00, 0x03, 0x00, 0x10, 0x01]).unwrap();
        assert_eq!(nci.event().name(), "CORE_RESET_RSP");

        let result = nci.process_packet(&[0x40, 0x0F, 0x01, 0x00]);
        assert_eq!(result, Err(NciError::UnknownOid { gid: GID_CORE, oid: 0x0F }));
        assert_eq!(nci.event().name(), "CORE_RESET_RSP");
    }

    #[test]
    fn test_segmented_notification() {
        let mut nci = Nci::new(Loopback::default());
        assert_eq!(nci.process_packet(&[0x71, 0x06, 0x01, 0x03]), Ok(&NciEvent::None));
        let event = nci.process_packet(&[0x61, 0x06, 0x01, 0x00]).unwrap();
        assert_eq!(event.name(), "RF_DEACTIVATE_NTF");
    }

    #[test]
    fn test_packet_ready_flag() {
        let ready = PacketReady::new();
        let isr = ready.clone();
        assert!(!ready.take());
        isr.notify();
        isr.notify();
        assert!(ready.is_set());
        assert!(ready.take());
        assert!(!ready.take());
    }
}
