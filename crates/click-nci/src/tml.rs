//! Transport mapping layer: NCI packets over I2C.
//!
//! The PN7150 signals a pending packet on its IRQ line; the host then reads
//! the 3-byte header and, in a second transfer, the payload it announces.
//! Writes may be NACKed while the controller wakes from standby and are
//! retried.

use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::i2c::I2c;
use log::{debug, warn};

use crate::config::NfcConfig;
use crate::constants::{NCI_PACKET_HEADER_LEN, NCI_PACKET_MAX_LEN};
use crate::error::{NciError, NciResult};

/// Byte transport for whole NCI packets.
pub trait NciTransport {
    /// Send one encoded packet.
    fn write(&mut self, packet: &[u8]) -> NciResult<()>;

    /// Read one packet into `buf`; returns its length including the header.
    fn read(&mut self, buf: &mut [u8]) -> NciResult<usize>;
}

/// I2C transport with VEN (enable) control.
pub struct Tml<I2C, VEN, D> {
    i2c: I2C,
    ven: VEN,
    delay: D,
    config: NfcConfig,
}

impl<I2C, VEN, D> Tml<I2C, VEN, D>
where
    I2C: I2c,
    VEN: OutputPin,
    D: DelayNs,
{
    pub fn new(i2c: I2C, ven: VEN, delay: D, config: NfcConfig) -> Self {
        Tml {
            i2c,
            ven,
            delay,
            config,
        }
    }

    /// Hardware reset: pull VEN low, release it and wait for the controller to boot.
    pub fn reset(&mut self) -> NciResult<()> {
        self.ven.set_low().map_err(|_| NciError::Tml("VEN low"))?;
        self.delay.delay_ms(self.config.ven_pulse_ms);
        self.ven.set_high().map_err(|_| NciError::Tml("VEN high"))?;
        self.delay.delay_ms(self.config.ven_pulse_ms);
        debug!("nci: controller reset");
        Ok(())
    }

    pub fn release(self) -> (I2C, VEN, D) {
        (self.i2c, self.ven, self.delay)
    }
}

impl<I2C, VEN, D> NciTransport for Tml<I2C, VEN, D>
where
    I2C: I2c,
    VEN: OutputPin,
    D: DelayNs,
{
    fn write(&mut self, packet: &[u8]) -> NciResult<()> {
        let address = self.config.i2c_address;
        let mut attempt = 0;
        loop {
            match self.i2c.write(address, packet) {
                Ok(()) => return Ok(()),
                Err(_) if attempt < self.config.write_retries => {
                    attempt += 1;
                    debug!("nci: I2C write NACK, retry {}", attempt);
                    self.delay.delay_ms(self.config.retry_delay_ms);
                }
                Err(_) => {
                    warn!("nci: I2C write failed after {} attempts", attempt + 1);
                    return Err(NciError::Tml("I2C write"));
                }
            }
        }
    }

    fn read(&mut self, buf: &mut [u8]) -> NciResult<usize> {
        if buf.len() < NCI_PACKET_MAX_LEN {
            return Err(NciError::InvalidParameter);
        }
        let address = self.config.i2c_address;
        self.i2c
            .read(address, &mut buf[..NCI_PACKET_HEADER_LEN])
            .map_err(|_| NciError::Tml("I2C read header"))?;

        let len = buf[2] as usize;
        if len > 0 {
            self.i2c
                .read(address, &mut buf[NCI_PACKET_HEADER_LEN..NCI_PACKET_HEADER_LEN + len])
                .map_err(|_| NciError::Tml("I2C read payload"))?;
        }
        Ok(NCI_PACKET_HEADER_LEN + len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embedded_hal::i2c::{ErrorKind, ErrorType, Operation};
    use std::collections::VecDeque;
    use std::convert::Infallible;

    #[derive(Default)]
    struct Bus {
        nacks: u8,
        writes: Vec<Vec<u8>>,
        rx: VecDeque<u8>,
        reads: Vec<usize>,
    }

    impl ErrorType for Bus {
        type Error = ErrorKind;
    }

    impl I2c for Bus {
        fn transaction(&mut self, address: u8, operations: &mut [Operation<'_>]) -> Result<(), ErrorKind> {
            assert_eq!(address, 0x28);
            for op in operations {
                match op {
                    Operation::Write(bytes) => {
                        if self.nacks > 0 {
                            self.nacks -= 1;
                            return Err(ErrorKind::Other);
                        }
                        self.writes.push(bytes.to_vec());
                    }
                    Operation::Read(buf) => {
                        self.reads.push(buf.len());
                        for b in buf.iter_mut() {
                            *b = self.rx.pop_front().ok_or(ErrorKind::Other)?;
                        }
                    }
                }
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct Ven(Vec<bool>);

    impl embedded_hal::digital::ErrorType for Ven {
        type Error = Infallible;
    }

    impl OutputPin for Ven {
        fn set_low(&mut self) -> Result<(), Infallible> {
            self.0.push(false);
            Ok(())
        }

        fn set_high(&mut self) -> Result<(), Infallible> {
            self.0.push(true);
            Ok(())
        }
    }

    #[derive(Default)]
    struct Delay(u32);

    impl DelayNs for Delay {
        fn delay_ns(&mut self, ns: u32) {
            self.0 += ns / 1_000_000;
        }

        fn delay_ms(&mut self, ms: u32) {
            self.0 += ms;
        }
    }

    fn tml(bus: Bus) -> Tml<Bus, Ven, Delay> {
        Tml::new(bus, Ven::default(), Delay::default(), NfcConfig::default())
    }

    #[test]
    fn test_reset_pulses_ven() {
        let mut tml = tml(Bus::default());
        tml.reset().unwrap();
        let (_, ven, delay) = tml.release();
        assert_eq!(ven.0, vec![false, true]);
        assert_eq!(delay.0, 20);
    }

    #[test]
    fn test_write_retries_then_succeeds() {
        let mut tml = tml(Bus {
            nacks: 2,
            ..Bus::default()
        });
        tml.write(&[0x20, 0x00, 0x01, 0x01]).unwrap();
        let (bus, _, delay) = tml.release();
        assert_eq!(bus.writes, vec![vec![0x20, 0x00, 0x01, 0x01]]);
        assert_eq!(delay.0, 20);
    }

    #[test]
    fn test_write_gives_up() {
        let mut tml = tml(Bus {
            nacks: 10,
            ..Bus::default()
        });
        assert_eq!(tml.write(&[0x20, 0x01, 0x00]), Err(NciError::Tml("I2C write")));
    }

    #[test]
    fn test_read_header_then_payload() {
        let mut tml = tml(Bus {
            rx: VecDeque::from(vec![0x40, 0x00, 0x03, 0x00, 0x10, 0x01]),
            ..Bus::default()
        });
        let mut buf = [0u8; NCI_PACKET_MAX_LEN];
        assert_eq!(tml.read(&mut buf), Ok(6));
        assert_eq!(&buf[..6], &[0x40, 0x00, 0x03, 0x00, 0x10, 0x01]);
        let (bus, _, _) = tml.release();
        assert_eq!(bus.reads, vec![3, 3]);
    }

    #[test]
    fn test_read_needs_full_buffer() {
        let mut tml = tml(Bus::default());
        let mut buf = [0u8; 16];
        assert_eq!(tml.read(&mut buf), Err(NciError::InvalidParameter));
    }
}
