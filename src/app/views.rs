//! Published read views.
//!
//! The orchestrator writes copies of everything the facade serves into a
//! single `embassy-sync` blocking mutex after each change.  Readers on any
//! thread take the lock only long enough to clone out, so they never wait
//! on the protocol session.

use core::cell::RefCell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;

use crate::alarms::Alert;
use crate::machine::MachineState;
use crate::metrics::{MetricSample, MetricsSummary};
use crate::protocol::session::SessionState;

/// Everything readers can see, replaced field by field under the lock.
#[derive(Debug, Clone)]
pub struct Published {
    /// `None` until the first snapshot after start-up.
    pub state: Option<MachineState>,
    pub session: SessionState,
    pub alerts: Vec<Alert>,
    pub history: Vec<Alert>,
    pub metrics: Vec<MetricSample>,
    pub summary: MetricsSummary,
}

impl Default for Published {
    fn default() -> Self {
        Self {
            state: None,
            session: SessionState::Disconnected,
            alerts: Vec::new(),
            history: Vec::new(),
            metrics: Vec::new(),
            summary: MetricsSummary::default(),
        }
    }
}

pub struct Views {
    inner: Mutex<CriticalSectionRawMutex, RefCell<Published>>,
}

impl Default for Views {
    fn default() -> Self {
        Self::new()
    }
}

impl Views {
    pub fn new() -> Self {
        Self { inner: Mutex::new(RefCell::new(Published::default())) }
    }

    /// Mutate under the lock.
    pub fn update(&self, f: impl FnOnce(&mut Published)) {
        self.inner.lock(|cell| f(&mut cell.borrow_mut()));
    }

    /// Copy one projection out under the lock.
    pub fn read<T>(&self, f: impl FnOnce(&Published) -> T) -> T {
        self.inner.lock(|cell| f(&cell.borrow()))
    }
}
