//! Scripted read-only resources for MockMetalClient
//!
//! Gateways, virtual circuits, IP reservations and spot market requests are
//! only ever polled, so the mock replays a fixed sequence of snapshots.

use crate::error::MetalError;
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// Sequence of snapshots returned by successive fetches
///
/// `None` entries are answered with a 404. The last entry sticks once the
/// sequence is exhausted.
#[derive(Debug, Clone)]
pub struct Script<T> {
    steps: VecDeque<Option<T>>,
}

impl<T: Clone> Script<T> {
    pub fn new(steps: Vec<Option<T>>) -> Self {
        Self { steps: steps.into() }
    }

    fn advance(&mut self) -> Option<T> {
        if self.steps.len() > 1 {
            self.steps.pop_front().flatten()
        } else {
            self.steps.front().cloned().flatten()
        }
    }
}

pub(super) fn next<T: Clone>(
    store: &Arc<Mutex<HashMap<String, Script<T>>>>,
    kind: &str,
    id: &str,
) -> Result<T, MetalError> {
    store
        .lock()
        .unwrap()
        .get_mut(id)
        .and_then(Script::advance)
        .ok_or_else(|| MetalError::NotFound(format!("{} {} not found", kind, id)))
}
