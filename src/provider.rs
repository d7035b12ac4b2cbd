use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::ProviderConfig;
use crate::credentials::{PropsSource, WskPropsSource};
use crate::error::Result;
use crate::http_client::{Client, ClientFactory};
use crate::resolver::{self, CredentialRecord};

/// Identifies the control-plane protocol this provider speaks
pub const PROVIDER_NAME: &str = "openwhisk";

/// Entry point: resolves credentials once and hands out one shared client.
///
/// Both caches are plain memoization guarded by a mutex each. A failed
/// resolution leaves the cache empty so the next call retries.
pub struct Provider {
    config: ProviderConfig,
    source: Box<dyn PropsSource>,
    factory: ClientFactory,

    props: Mutex<Option<Arc<CredentialRecord>>>,
    client: Mutex<Option<Arc<Client>>>,
}

impl Provider {
    /// Provider reading the process environment and `.wskprops`
    pub fn new(config: ProviderConfig) -> Self {
        let source = WskPropsSource::from_env().with_config_file(config.wskprops.clone());
        Self::with_source(config, source)
    }

    pub fn with_source(config: ProviderConfig, source: impl PropsSource + 'static) -> Self {
        Self {
            config,
            source: Box::new(source),
            factory: ClientFactory::default(),
            props: Mutex::new(None),
            client: Mutex::new(None),
        }
    }

    pub fn with_factory(mut self, factory: ClientFactory) -> Self {
        self.factory = factory;
        self
    }

    pub fn provider_name(&self) -> &'static str {
        PROVIDER_NAME
    }

    pub fn config(&self) -> &ProviderConfig {
        &self.config
    }

    /// Resolved credentials, computed on first call
    pub async fn props(&self) -> Result<Arc<CredentialRecord>> {
        let mut cached = self.props.lock().await;
        if let Some(ref props) = *cached {
            tracing::debug!("Using cached credentials");
            return Ok(props.clone());
        }

        let layers = self.source.load().await?;
        let props = Arc::new(resolver::resolve(&self.config, &layers));
        *cached = Some(props.clone());
        Ok(props)
    }

    /// Validate a record without touching any I/O
    pub fn has_valid_creds(&self, record: &CredentialRecord) -> Result<()> {
        resolver::has_valid_creds(record)
    }

    /// Configured client, built on first call
    pub async fn client(&self) -> Result<Arc<Client>> {
        let mut cached = self.client.lock().await;
        if let Some(ref client) = *cached {
            return Ok(client.clone());
        }

        let props = self.props().await?;
        self.has_valid_creds(&props)?;

        let client = Arc::new(self.factory.build(&props, &self.config.flags())?);
        tracing::info!(
            api = %client.options().api,
            namespace = client.options().namespace_or_default(),
            auth = client.options().auth_handler.as_ref().map_or("key", |h| h.kind()),
            "OpenWhisk client ready"
        );

        *cached = Some(client.clone());
        Ok(client)
    }

    /// Pre-populate the client cache
    pub async fn set_client(&self, client: Arc<Client>) {
        *self.client.lock().await = Some(client);
    }

    /// Drop both caches; the next call resolves again
    pub async fn invalidate(&self) {
        *self.props.lock().await = None;
        *self.client.lock().await = None;
    }
}
