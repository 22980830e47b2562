//! Host context tests against a scripted controller.

use click_nci::*;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

/// Answers each command with canned packets and raises IRQ while any are pending.
#[derive(Clone, Default)]
struct Controller {
    inner: Arc<Mutex<ControllerState>>,
}

#[derive(Default)]
struct ControllerState {
    pending: VecDeque<Vec<u8>>,
    sent: Vec<Vec<u8>>,
    irq: Option<PacketReady>,
}

impl Controller {
    fn attach(&self, irq: PacketReady) {
        self.inner.lock().unwrap().irq = Some(irq);
    }

    fn queue(&self, packet: Vec<u8>) {
        let mut state = self.inner.lock().unwrap();
        state.pending.push_back(packet);
        if let Some(irq) = &state.irq {
            irq.notify();
        }
    }

    fn sent(&self) -> Vec<Vec<u8>> {
        self.inner.lock().unwrap().sent.clone()
    }
}

impl NciTransport for Controller {
    fn write(&mut self, packet: &[u8]) -> NciResult<()> {
        let replies: Vec<Vec<u8>> = match packet {
            [0x20, 0x00, ..] => vec![vec![0x40, 0x00, 0x03, 0x00, 0x10, 0x01]],
            [0x20, 0x01, ..] => vec![vec![
                0x40, 0x01, 0x14, 0x00, 0x1E, 0x03, 0x00, 0x00, 0x03, 0x00, 0x01, 0x02, 0x01, 0x00, 0x02, 0xFF,
                0x00, 0x01, 0x04, 0x50, 0x10, 0x00, 0x00,
            ]],
            [0x21, 0x03, ..] => vec![
                vec![0x41, 0x03, 0x01, 0x00],
                vec![
                    0x61, 0x05, 0x17, 0x01, 0x01, 0x02, 0x00, 0xFB, 0x01, 0x0C, 0x44, 0x00, 0x07, 0x04, 0xA1, 0xB2,
                    0xC3, 0xD4, 0xE5, 0xF6, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00,
                ],
            ],
            _ => vec![],
        };
        let mut state = self.inner.lock().unwrap();
        state.sent.push(packet.to_vec());
        state.pending.extend(replies);
        if !state.pending.is_empty() {
            if let Some(irq) = &state.irq {
                irq.notify();
            }
        }
        Ok(())
    }

    fn read(&mut self, buf: &mut [u8]) -> NciResult<usize> {
        let mut state = self.inner.lock().unwrap();
        let packet = state.pending.pop_front().ok_or(NciError::Tml("nothing to read"))?;
        buf[..packet.len()].copy_from_slice(&packet);
        // Level-triggered: IRQ stays asserted while packets remain.
        if !state.pending.is_empty() {
            if let Some(irq) = &state.irq {
                irq.notify();
            }
        }
        Ok(packet.len())
    }
}

fn context() -> (Nci<Controller>, Controller) {
    let controller = Controller::default();
    let nci = Nci::new(controller.clone());
    controller.attach(nci.packet_ready());
    (nci, controller)
}

/// Poll until an event other than `None` arrives.
fn next_event(nci: &mut Nci<Controller>) -> NciEvent {
    for _ in 0..100 {
        let event = nci.get_event().unwrap();
        if !event.is_none() {
            return event.clone();
        }
    }
    panic!("no event");
}

#[test]
fn test_discover_command_bytes() {
    let (mut nci, controller) = context();
    nci.rf_discover(&[DiscoverConfig {
        mode_tech: MODE_POLL | TECH_PASSIVE_NFCA,
        frequency: 1,
    }])
    .unwrap();
    assert_eq!(controller.sent()[0][..3], [0x21, 0x03, 0x03]);

    let packet = Packet::control(MessageType::Command, GID_RF_MANAGEMENT, OID_RF_DISCOVER, &[0x01, 0x00]).unwrap();
    assert_eq!(packet.encode(), vec![0x21, 0x03, 0x02, 0x01, 0x00]);
}

#[test]
fn test_reset_init_discover_flow() {
    let (mut nci, _controller) = context();

    nci.core_reset(RESET_TYPE_RESET_CONFIG).unwrap();
    assert_eq!(next_event(&mut nci).name(), "CORE_RESET_RSP");

    nci.core_init().unwrap();
    let NciEvent::CoreInitRsp(init) = next_event(&mut nci) else {
        panic!("expected CORE_INIT_RSP");
    };
    assert_eq!(init.status, STATUS_OK);
    assert_eq!(init.rf_interfaces, vec![0x00, 0x01, 0x02]);

    nci.rf_discover(&[DiscoverConfig {
        mode_tech: MODE_POLL | TECH_PASSIVE_NFCA,
        frequency: 1,
    }])
    .unwrap();
    assert_eq!(next_event(&mut nci), NciEvent::RfDiscoverRsp { status: STATUS_OK });

    let NciEvent::RfIntfActivatedNtf(act) = next_event(&mut nci) else {
        panic!("expected RF_INTF_ACTIVATED_NTF");
    };
    assert_eq!(act.protocol, PROTOCOL_T2T);
    let TechParams::NfcAPoll(params) = act.params else {
        panic!("expected NFC-A parameters");
    };
    assert_eq!(params.nfcid1, vec![0x04, 0xA1, 0xB2, 0xC3, 0xD4, 0xE5, 0xF6]);
    assert_eq!(nci.max_data_payload(), 0xFB);

    // Drained: nothing further is signalled.
    assert!(nci.get_event().unwrap().is_none());
}

#[test]
fn test_unknown_oid_leaves_event_stale() {
    let (mut nci, controller) = context();
    nci.core_reset(RESET_TYPE_KEEP_CONFIG).unwrap();
    let first = next_event(&mut nci);

    controller.queue(vec![0x40, 0x0F, 0x01, 0x00]);
    assert_eq!(nci.get_event(), Err(NciError::UnknownOid { gid: GID_CORE, oid: 0x0F }));
    assert_eq!(nci.event(), &first);
}

#[test]
fn test_unknown_proprietary_notification_is_ignored() {
    let (mut nci, controller) = context();
    controller.queue(vec![0x6F, 0x24, 0x01, 0x00]);
    assert_eq!(nci.get_event(), Ok(&NciEvent::None));
}

#[test]
fn test_irq_from_another_thread() {
    let (mut nci, controller) = context();
    let irq = nci.packet_ready();

    // The "interrupt" stores the packet and raises the flag from another thread.
    let isr = thread::spawn(move || {
        thread::sleep(Duration::from_millis(5));
        controller.inner.lock().unwrap().pending.push_back(vec![0x60, 0x07, 0x01, 0x01]);
        irq.notify();
    });

    let mut event = NciEvent::None;
    for _ in 0..10_000 {
        event = nci.get_event().unwrap().clone();
        if !event.is_none() {
            break;
        }
        thread::sleep(Duration::from_micros(100));
    }
    isr.join().unwrap();
    assert_eq!(event, NciEvent::CoreGenericErrorNtf { status: STATUS_REJECTED });
}
