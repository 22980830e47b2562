//! Completion listeners polled from the super-loop.
//!
//! A listener watches the output status for an expected value and fires its
//! callback once. It also fires when the sequence ends in `Fail`, or when its
//! own deadline passes, so a caller is never left waiting on a sequence that
//! cannot reach the expected state.

use crate::output::{AtOutput, Status};

/// Callback invoked when a listener fires.
pub type EventCallback = Box<dyn FnMut(&AtOutput)>;

/// Why a listener fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Trigger {
    Matched,
    Failed,
    Expired,
}

struct EventListener {
    expected: Status,
    deadline: Option<u64>,
    callback: EventCallback,
}

/// Registered listeners.
#[derive(Default)]
pub struct EventListeners {
    listeners: Vec<EventListener>,
}

impl EventListeners {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. `timeout_ms == 0` waits forever.
    pub fn listen(&mut self, expected: Status, timeout_ms: u32, now_ms: u64, callback: EventCallback) {
        let deadline = (timeout_ms > 0).then(|| now_ms.saturating_add(u64::from(timeout_ms)));
        self.listeners.push(EventListener {
            expected,
            deadline,
            callback,
        });
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }

    /// Fire and retire every listener whose condition holds.
    pub fn process(&mut self, output: &AtOutput, now_ms: u64) {
        self.listeners.retain_mut(|listener| {
            let trigger = if output.status() == listener.expected {
                Some(Trigger::Matched)
            } else if output.status() == Status::Fail {
                Some(Trigger::Failed)
            } else if listener.deadline.is_some_and(|deadline| now_ms >= deadline) {
                Some(Trigger::Expired)
            } else {
                None
            };
            match trigger {
                Some(trigger) => {
                    log::debug!("at: listener fired ({:?}, status {:?})", trigger, output.status());
                    (listener.callback)(output);
                    false
                }
                None => true,
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::rc::Rc;

    #[test]
    fn test_fires_once_on_match() {
        let fired = Rc::new(Cell::new(0));
        let counter = fired.clone();
        let mut listeners = EventListeners::new();
        listeners.listen(Status::Ok, 0, 0, Box::new(move |_: &AtOutput| counter.set(counter.get() + 1)));

        let mut output = AtOutput::new();
        output.set_status(Status::Busy);
        listeners.process(&output, 10);
        assert_eq!(fired.get(), 0);

        output.set_status(Status::Ok);
        listeners.process(&output, 20);
        listeners.process(&output, 30);
        assert_eq!(fired.get(), 1);
        assert!(listeners.is_empty());
    }

    #[test]
    fn test_fires_on_failure() {
        let seen = Rc::new(Cell::new(Status::NotInitialized));
        let slot = seen.clone();
        let mut listeners = EventListeners::new();
        listeners.listen(Status::Ok, 0, 0, Box::new(move |out: &AtOutput| slot.set(out.status())));

        let mut output = AtOutput::new();
        output.set_status(Status::Fail);
        listeners.process(&output, 0);
        assert_eq!(seen.get(), Status::Fail);
    }

    #[test]
    fn test_expires() {
        let fired = Rc::new(Cell::new(false));
        let flag = fired.clone();
        let mut listeners = EventListeners::new();
        listeners.listen(Status::Ok, 100, 0, Box::new(move |_: &AtOutput| flag.set(true)));

        let mut output = AtOutput::new();
        output.set_status(Status::Busy);
        listeners.process(&output, 99);
        assert!(!fired.get());
        listeners.process(&output, 100);
        assert!(fired.get());
        assert_eq!(listeners.len(), 0);
    }
}
