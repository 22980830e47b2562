//! NXP PN7150 NCI host driver.
//!
//! This crate speaks the NFC Forum NFC Controller Interface to a PN7150
//! over I2C. It is split into layers:
//!
//! - [`packet`]: the 3-byte-header wire format, segmentation and reassembly
//! - [`decode`]: MT → GID → OID dispatch into typed [`NciEvent`]s
//! - [`proprietary`]: the NXP extension (GID 0xF)
//! - [`tml`]: the I2C transport with VEN reset and write retries
//! - [`Nci`]: the host context with one method per supported command
//!
//! # Example
//!
//! ```rust,ignore
//! use click_nci::{Nci, NciEvent, RESET_TYPE_RESET_CONFIG};
//!
//! let mut nci = Nci::new(tml);
//! let irq = nci.packet_ready(); // hand to the IRQ handler: irq.notify()
//!
//! nci.core_reset(RESET_TYPE_RESET_CONFIG)?;
//! loop {
//!     match nci.get_event()? {
//!         NciEvent::CoreResetRsp(_) => nci.core_init()?,
//!         NciEvent::None => {}
//!         other => log::info!("{}", other.name()),
//!     }
//! }
//! ```

mod config;
mod constants;
pub mod dbg;
pub mod decode;
mod error;
mod event;
mod nci;
pub mod packet;
pub mod proprietary;
pub mod tml;

pub use config::*;
pub use constants::*;
pub use decode::{decode_event, decode_message};
pub use error::*;
pub use event::*;
pub use nci::*;
pub use packet::{segment, Message, MessageType, Packet, PacketHeader, Reassembler};
pub use proprietary::PowerMode;
pub use tml::{NciTransport, Tml};
