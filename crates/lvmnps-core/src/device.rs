// ── Device handle ──
//
// Live connection object for one configured switch. The driver sits
// behind a per-device mutex so outlet and status requests against the
// same switch serialise, while the connection status lives in a `watch`
// channel and can be read without waiting on that mutex.

use std::time::Duration;

use tokio::sync::{Mutex, MutexGuard, watch};
use tokio::time::{Instant, timeout, timeout_at};
use tracing::{debug, info, warn};

use crate::config::DeviceConfig;
use crate::driver::{DriverError, PowerDriver};
use crate::error::CoreError;
use crate::model::{ConnectionStatus, DesiredState, DeviceSnapshot, OutletState, PowerState};

/// How a disconnect ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectOutcome {
    /// Already disconnected; nothing was done.
    Skipped,
    /// The driver closed the connection within the grace period.
    Graceful,
    /// The grace period ran out and the handle was released locally.
    Forced,
}

pub struct DeviceHandle {
    config: DeviceConfig,
    status: watch::Sender<ConnectionStatus>,
    driver: Mutex<Box<dyn PowerDriver>>,
}

impl std::fmt::Debug for DeviceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceHandle")
            .field("name", &self.config.name)
            .field("status", &self.status())
            .finish_non_exhaustive()
    }
}

impl DeviceHandle {
    pub fn new(config: DeviceConfig, driver: Box<dyn PowerDriver>) -> Self {
        let (status, _) = watch::channel(ConnectionStatus::Disconnected);
        Self {
            config,
            status,
            driver: Mutex::new(driver),
        }
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.config
    }

    pub fn outlet_count(&self) -> u32 {
        self.config.outlets
    }

    /// Current connection status (never waits on in-flight requests).
    pub fn status(&self) -> ConnectionStatus {
        *self.status.borrow()
    }

    /// Subscribe to connection status changes.
    pub fn subscribe(&self) -> watch::Receiver<ConnectionStatus> {
        self.status.subscribe()
    }

    // ── Connection lifecycle ─────────────────────────────────────

    /// Connect and authenticate within `limit`.
    ///
    /// On failure or timeout the handle ends up `Failed` with the driver's
    /// session state dropped. Dropping the returned future mid-flight has
    /// the same effect.
    pub async fn connect(&self, limit: Duration) -> Result<(), CoreError> {
        self.status.send_replace(ConnectionStatus::Connecting);
        let guard = StatusGuard::arm(self, ConnectionStatus::Failed);
        debug!(device = %self.name(), "connecting");

        let attempt = async {
            let mut driver = self.driver.lock().await;
            let result = driver.connect().await;
            if result.is_err() {
                driver.reset();
            }
            result
        };

        let result = match timeout(limit, attempt).await {
            Ok(Ok(reported)) => {
                if u32::try_from(reported).ok() != Some(self.outlet_count()) {
                    warn!(
                        device = %self.name(),
                        reported,
                        configured = self.outlet_count(),
                        "device reports a different outlet count; using configured value"
                    );
                }
                self.status.send_replace(ConnectionStatus::Connected);
                info!(device = %self.name(), "connected");
                Ok(())
            }
            Ok(Err(source)) => {
                self.status.send_replace(ConnectionStatus::Failed);
                Err(CoreError::Connect {
                    name: self.name().to_owned(),
                    source,
                })
            }
            Err(_) => {
                self.release(ConnectionStatus::Failed);
                Err(self.timeout_error(limit))
            }
        };
        guard.disarm();
        result
    }

    /// Disconnect, allowing the driver up to `grace` to close cleanly.
    ///
    /// Idempotent. Whatever happens remotely, the handle ends up
    /// `Disconnected`.
    pub async fn disconnect(&self, grace: Duration) -> DisconnectOutcome {
        if self.status() == ConnectionStatus::Disconnected {
            return DisconnectOutcome::Skipped;
        }
        let guard = StatusGuard::arm(self, ConnectionStatus::Disconnected);

        let attempt = async {
            let mut driver = self.driver.lock().await;
            if let Err(e) = driver.disconnect().await {
                warn!(device = %self.name(), error = %e, "disconnect failed; releasing locally");
                driver.reset();
            }
        };

        let outcome = if timeout(grace, attempt).await.is_ok() {
            self.status.send_replace(ConnectionStatus::Disconnected);
            debug!(device = %self.name(), "disconnected");
            DisconnectOutcome::Graceful
        } else {
            warn!(
                device = %self.name(),
                grace_ms = millis(grace),
                "disconnect exceeded grace period; forcing"
            );
            self.release(ConnectionStatus::Disconnected);
            DisconnectOutcome::Forced
        };
        guard.disarm();
        outcome
    }

    /// Mark the handle `Disconnected` without talking to the device.
    pub fn force_disconnected(&self) {
        self.release(ConnectionStatus::Disconnected);
    }

    // ── Requests ─────────────────────────────────────────────────

    /// Switch an outlet and return the state the device reports afterwards.
    pub async fn set_outlet(
        &self,
        index: u32,
        desired: DesiredState,
        limit: Duration,
    ) -> Result<OutletState, CoreError> {
        self.ensure_connected()?;
        self.ensure_outlet(index)?;
        let deadline = Instant::now() + limit;
        let mut driver = self.lock_driver(deadline, limit).await?;

        match timeout_at(deadline, driver.write_outlet(index, desired.is_on())).await {
            Ok(Ok(state)) => {
                info!(device = %self.name(), outlet = index, %desired, observed = %state, "outlet switched");
                Ok(OutletState { index, state })
            }
            Ok(Err(source)) => Err(self.device_error(source)),
            Err(_) => Err(self.timeout_error(limit)),
        }
    }

    /// Power-cycle an outlet.
    pub async fn cycle_outlet(&self, index: u32, limit: Duration) -> Result<(), CoreError> {
        self.ensure_connected()?;
        self.ensure_outlet(index)?;
        let deadline = Instant::now() + limit;
        let mut driver = self.lock_driver(deadline, limit).await?;

        match timeout_at(deadline, driver.cycle_outlet(index)).await {
            Ok(Ok(())) => {
                info!(device = %self.name(), outlet = index, "outlet cycled");
                Ok(())
            }
            Ok(Err(source)) => Err(self.device_error(source)),
            Err(_) => Err(self.timeout_error(limit)),
        }
    }

    /// Read the connection status and every outlet.
    ///
    /// A handle that is not connected yields all-`Unknown` outlets without
    /// touching the network. A transport error or timeout during the read
    /// downgrades the handle to `Failed` before the error is returned.
    pub async fn get_status(&self, limit: Duration) -> Result<DeviceSnapshot, CoreError> {
        if !self.status().is_connected() {
            return Ok(self.unknown_snapshot());
        }
        let deadline = Instant::now() + limit;
        let mut driver = match self.lock_driver(deadline, limit).await {
            Ok(driver) => driver,
            Err(CoreError::NotConnected { .. }) => return Ok(self.unknown_snapshot()),
            Err(e) => return Err(e),
        };

        match timeout_at(deadline, driver.read_outlets()).await {
            Ok(Ok(states)) => Ok(DeviceSnapshot {
                name: self.name().to_owned(),
                status: self.status(),
                outlets: self.outlet_states(&states),
                error: None,
            }),
            Ok(Err(source)) => {
                if source.is_transport() {
                    self.downgrade(&mut **driver, &source);
                }
                Err(self.device_error(source))
            }
            Err(_) => {
                let err = self.timeout_error(limit);
                self.downgrade(&mut **driver, &err);
                Err(err)
            }
        }
    }

    /// Snapshot with every outlet `Unknown` at the current status.
    pub fn unknown_snapshot(&self) -> DeviceSnapshot {
        DeviceSnapshot::unknown(self.name(), self.status(), self.outlet_count())
    }

    // ── Private helpers ──────────────────────────────────────────

    /// Take the per-device lock by `deadline`, then re-check the status,
    /// which may have changed while waiting.
    async fn lock_driver(
        &self,
        deadline: Instant,
        limit: Duration,
    ) -> Result<MutexGuard<'_, Box<dyn PowerDriver>>, CoreError> {
        let driver = timeout_at(deadline, self.driver.lock())
            .await
            .map_err(|_| self.timeout_error(limit))?;
        self.ensure_connected()?;
        Ok(driver)
    }

    fn ensure_connected(&self) -> Result<(), CoreError> {
        let status = self.status();
        if status.is_connected() {
            Ok(())
        } else {
            Err(CoreError::NotConnected {
                name: self.name().to_owned(),
                status,
            })
        }
    }

    fn ensure_outlet(&self, index: u32) -> Result<(), CoreError> {
        if (1..=self.outlet_count()).contains(&index) {
            Ok(())
        } else {
            Err(CoreError::InvalidOutlet {
                name: self.name().to_owned(),
                index,
                count: self.outlet_count(),
            })
        }
    }

    /// Pair configured outlet indices with what the device returned.
    fn outlet_states(&self, states: &[PowerState]) -> Vec<OutletState> {
        (1..=self.outlet_count())
            .zip(
                states
                    .iter()
                    .copied()
                    .chain(std::iter::repeat(PowerState::Unknown)),
            )
            .map(|(index, state)| OutletState { index, state })
            .collect()
    }

    fn downgrade(&self, driver: &mut dyn PowerDriver, cause: &dyn std::fmt::Display) {
        driver.reset();
        self.status.send_replace(ConnectionStatus::Failed);
        warn!(device = %self.name(), error = %cause, "status read failed; marking device failed");
    }

    /// Set `status` and drop driver session state if the driver is free.
    fn release(&self, status: ConnectionStatus) {
        if let Ok(mut driver) = self.driver.try_lock() {
            driver.reset();
        }
        self.status.send_replace(status);
    }

    fn device_error(&self, source: DriverError) -> CoreError {
        CoreError::Device {
            name: self.name().to_owned(),
            source,
        }
    }

    fn timeout_error(&self, limit: Duration) -> CoreError {
        CoreError::Timeout {
            name: self.name().to_owned(),
            timeout_ms: millis(limit),
        }
    }
}

pub(crate) fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

/// Puts the handle into `fallback` if a connect or disconnect future is
/// dropped before it settles, so no handle is left `Connecting`.
struct StatusGuard<'a> {
    handle: &'a DeviceHandle,
    fallback: ConnectionStatus,
    armed: bool,
}

impl<'a> StatusGuard<'a> {
    fn arm(handle: &'a DeviceHandle, fallback: ConnectionStatus) -> Self {
        Self {
            handle,
            fallback,
            armed: true,
        }
    }

    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for StatusGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            warn!(
                device = %self.handle.name(),
                status = %self.fallback,
                "operation abandoned; releasing handle"
            );
            self.handle.release(self.fallback);
        }
    }
}
