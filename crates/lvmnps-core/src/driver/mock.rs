// Scripted in-memory driver for unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use super::{DriverError, PowerDriver};
use crate::model::PowerState;

/// How a scripted call behaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Behavior {
    Succeed,
    /// Never completes.
    Hang,
    /// Completes successfully after the delay.
    Delay(Duration),
    /// Fails with a transport error.
    Fail,
    /// Fails with an authentication error.
    Deny,
}

/// Counters shared between a test and the driver it handed out.
#[derive(Debug, Default)]
pub(crate) struct Probe {
    pub connects: AtomicUsize,
    pub network_calls: AtomicUsize,
    pub resets: AtomicUsize,
}

impl Probe {
    pub(crate) fn network_calls(&self) -> usize {
        self.network_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn connects(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    pub(crate) fn resets(&self) -> usize {
        self.resets.load(Ordering::SeqCst)
    }
}

pub(crate) struct MockDriver {
    connect: Behavior,
    disconnect: Behavior,
    read: Behavior,
    outlets: Vec<bool>,
    /// Outlets that ignore writes.
    locked: Vec<u32>,
    probe: Arc<Probe>,
}

impl MockDriver {
    pub(crate) fn new(outlets: usize) -> Self {
        Self {
            connect: Behavior::Succeed,
            disconnect: Behavior::Succeed,
            read: Behavior::Succeed,
            outlets: vec![false; outlets],
            locked: Vec::new(),
            probe: Arc::new(Probe::default()),
        }
    }

    pub(crate) fn on_connect(mut self, behavior: Behavior) -> Self {
        self.connect = behavior;
        self
    }

    pub(crate) fn on_disconnect(mut self, behavior: Behavior) -> Self {
        self.disconnect = behavior;
        self
    }

    pub(crate) fn on_read(mut self, behavior: Behavior) -> Self {
        self.read = behavior;
        self
    }

    pub(crate) fn with_locked(mut self, index: u32) -> Self {
        self.locked.push(index);
        self
    }

    pub(crate) fn probe(&self) -> Arc<Probe> {
        Arc::clone(&self.probe)
    }

    pub(crate) fn boxed(self) -> Box<dyn PowerDriver> {
        Box::new(self)
    }

    async fn act(&self, behavior: Behavior) -> Result<(), DriverError> {
        self.probe.network_calls.fetch_add(1, Ordering::SeqCst);
        match behavior {
            Behavior::Succeed => Ok(()),
            Behavior::Hang => std::future::pending().await,
            Behavior::Delay(delay) => {
                tokio::time::sleep(delay).await;
                Ok(())
            }
            Behavior::Fail => Err(DriverError::Transport("connection reset by peer".into())),
            Behavior::Deny => Err(DriverError::Auth("bad password".into())),
        }
    }
}

#[async_trait]
impl PowerDriver for MockDriver {
    async fn connect(&mut self) -> Result<usize, DriverError> {
        self.probe.connects.fetch_add(1, Ordering::SeqCst);
        self.act(self.connect).await?;
        Ok(self.outlets.len())
    }

    async fn disconnect(&mut self) -> Result<(), DriverError> {
        self.act(self.disconnect).await
    }

    async fn read_outlets(&mut self) -> Result<Vec<PowerState>, DriverError> {
        self.act(self.read).await?;
        Ok(self.outlets.iter().copied().map(PowerState::from).collect())
    }

    async fn write_outlet(&mut self, index: u32, on: bool) -> Result<PowerState, DriverError> {
        self.act(Behavior::Succeed).await?;
        let slot = index
            .checked_sub(1)
            .and_then(|i| usize::try_from(i).ok())
            .and_then(|i| self.outlets.get_mut(i))
            .ok_or_else(|| DriverError::Rejected(format!("no outlet {index}")))?;
        if !self.locked.contains(&index) {
            *slot = on;
        }
        Ok(PowerState::from(*slot))
    }

    async fn cycle_outlet(&mut self, _index: u32) -> Result<(), DriverError> {
        self.act(Behavior::Succeed).await
    }

    fn reset(&mut self) {
        self.probe.resets.fetch_add(1, Ordering::SeqCst);
    }
}
