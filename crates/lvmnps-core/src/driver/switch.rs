// Driver for Digital Loggers style web power switches over their REST API.

use async_trait::async_trait;
use secrecy::SecretString;
use tracing::debug;
use url::Url;

use lvmnps_api::{SwitchClient, TlsMode, TransportConfig};

use super::{DriverError, DriverFactory, PowerDriver};
use crate::config::{DeviceConfig, FleetSettings};
use crate::error::CoreError;
use crate::model::PowerState;

pub struct SwitchDriver {
    base_url: Url,
    username: String,
    password: SecretString,
    transport: TransportConfig,
    client: Option<SwitchClient>,
}

impl SwitchDriver {
    pub fn new(config: &DeviceConfig, settings: &FleetSettings) -> Result<Self, CoreError> {
        Ok(Self {
            base_url: config.base_url()?,
            username: config.credentials.username.clone(),
            password: config.credentials.password.clone(),
            transport: TransportConfig {
                // Switches ship self-signed certificates unless told otherwise.
                tls: if config.verify_tls {
                    TlsMode::System
                } else {
                    TlsMode::DangerAcceptInvalid
                },
                timeout: settings.request_timeout,
            },
            client: None,
        })
    }

    fn client(&self) -> Result<&SwitchClient, DriverError> {
        self.client
            .as_ref()
            .ok_or_else(|| DriverError::Protocol("no open session".into()))
    }
}

/// The relay API counts from zero; the fleet counts from one.
fn wire_index(index: u32) -> Result<u32, DriverError> {
    index
        .checked_sub(1)
        .ok_or_else(|| DriverError::Rejected("outlet 0 does not exist".into()))
}

#[async_trait]
impl PowerDriver for SwitchDriver {
    async fn connect(&mut self) -> Result<usize, DriverError> {
        let client = SwitchClient::new(
            self.base_url.clone(),
            self.username.clone(),
            self.password.clone(),
            &self.transport,
        )?;
        let outlets = client.login().await?;
        self.client = Some(client);
        Ok(outlets)
    }

    async fn disconnect(&mut self) -> Result<(), DriverError> {
        // Stateless HTTP: nothing to tell the switch.
        if self.client.take().is_some() {
            debug!(url = %self.base_url, "released switch session");
        }
        Ok(())
    }

    async fn read_outlets(&mut self) -> Result<Vec<PowerState>, DriverError> {
        let outlets = self.client()?.outlets().await?;
        Ok(outlets.iter().map(|o| PowerState::from(o.state)).collect())
    }

    async fn write_outlet(&mut self, index: u32, on: bool) -> Result<PowerState, DriverError> {
        let wire = wire_index(index)?;
        let client = self.client()?;
        client.set_outlet_state(wire, on).await?;
        // Locked relays accept the write and ignore it, so read back.
        let observed = client.outlet_state(wire).await?;
        Ok(PowerState::from(observed))
    }

    async fn cycle_outlet(&mut self, index: u32) -> Result<(), DriverError> {
        let wire = wire_index(index)?;
        self.client()?.cycle_outlet(wire).await?;
        Ok(())
    }

    fn reset(&mut self) {
        self.client = None;
    }
}

/// Default factory: one [`SwitchDriver`] per configured device.
#[derive(Debug, Clone, Copy, Default)]
pub struct SwitchDriverFactory;

impl DriverFactory for SwitchDriverFactory {
    fn build(
        &self,
        config: &DeviceConfig,
        settings: &FleetSettings,
    ) -> Result<Box<dyn PowerDriver>, CoreError> {
        Ok(Box::new(SwitchDriver::new(config, settings)?))
    }
}
