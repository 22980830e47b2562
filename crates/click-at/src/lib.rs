//! AT Command Scheduler
//!
//! This crate drives a half-duplex AT command channel (a cellular modem on a
//! UART) from a single-threaded super-loop. It provides:
//!
//! - [`AtCommand`] descriptors built incrementally with a fixed 300-byte text cap
//! - [`LineReader`], byte-at-a-time line framing with prompt and echo handling
//! - [`AtPlatform`], the `NotInitialized → Ready → Transmit → Ready` driver with
//!   per-command timeouts
//! - [`AtScheduler`], a 20-slot FIFO that runs one command at a time and writes
//!   the sequence result into an [`AtOutput`]
//! - [`EventListeners`], polled completion callbacks
//!
//! # Protocol Overview
//!
//! - **Commands** (host → modem): ASCII text terminated with `\r`
//! - **Responses** (modem → host): lines terminated with `\r\n`, ending with a
//!   final result code (`OK`, `ERROR`, `+CME ERROR: <n>`)
//! - **Data mode**: the modem sends `"> "` and waits for a payload
//!
//! # Example
//!
//! ```rust,ignore
//! use click_at::{handlers, AtCommand, AtScheduler, Status};
//!
//! let mut scheduler = AtScheduler::new(uart);
//! scheduler.init();
//! scheduler.add_cmd_to_q(AtCommand::new("AT+GSN", handlers::collect_data, 300)?)?;
//! scheduler.start_scheduler()?;
//! loop {
//!     scheduler.process(now_ms());
//!     if scheduler.output().status() == Status::Ok {
//!         break;
//!     }
//! }
//! ```

mod codec;
mod command;
mod error;
mod events;
pub mod handlers;
mod output;
mod platform;
mod scheduler;
mod timer;

pub use codec::*;
pub use command::*;
pub use error::*;
pub use events::*;
pub use output::*;
pub use platform::*;
pub use scheduler::*;
pub use timer::*;
