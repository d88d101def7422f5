//! Provider data handed to every resource after configuration

use crate::api::Client;
use std::sync::Arc;

#[derive(Clone)]
pub struct AkamaiProviderData {
    /// Client for Property Manager calls
    pub papi: Arc<Client>,
    /// Client for Application Security calls
    pub appsec: Arc<Client>,
}

impl AkamaiProviderData {
    /// Both products share one set of credentials
    pub fn new(client: Client) -> Self {
        let client = Arc::new(client);
        Self {
            papi: client.clone(),
            appsec: client,
        }
    }

    pub fn with_clients(papi: Client, appsec: Client) -> Self {
        Self {
            papi: Arc::new(papi),
            appsec: Arc::new(appsec),
        }
    }
}
