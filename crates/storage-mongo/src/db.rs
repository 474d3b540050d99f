//! Client construction.

use std::time::Duration;

use log::info;
use mongodb::options::ClientOptions;
use mongodb::Client;

use crate::errors::MongoStorageError;

pub const DEFAULT_DATABASE: &str = "detrade-applefarm-usdc";
pub const DEFAULT_COLLECTION: &str = "oracle";
const APP_NAME: &str = "aum-oracle";

#[derive(Clone, Debug, PartialEq)]
pub struct MongoSettings {
    pub uri: String,
    pub database: String,
    pub collection: String,
    pub server_selection_timeout: Duration,
    /// Limit for opening a socket to a cluster member.
    pub connect_timeout: Duration,
}

impl MongoSettings {
    pub fn new(uri: &str) -> Self {
        Self {
            uri: uri.to_string(),
            database: DEFAULT_DATABASE.to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
            server_selection_timeout: Duration::from_secs(10),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

/// Build a client. Parsing the URI may resolve SRV records but does not
/// contact the cluster; the first operation does.
pub async fn connect(settings: &MongoSettings) -> Result<Client, MongoStorageError> {
    let mut options = ClientOptions::parse(&settings.uri)
        .await
        .map_err(|e| MongoStorageError::InvalidUri(e.to_string()))?;
    options.app_name = Some(APP_NAME.to_string());
    options.server_selection_timeout = Some(settings.server_selection_timeout);
    options.connect_timeout = Some(settings.connect_timeout);

    let client = Client::with_options(options)
        .map_err(|e| MongoStorageError::InvalidUri(e.to_string()))?;
    info!(
        "MongoDB client ready for {}.{}",
        settings.database, settings.collection
    );
    Ok(client)
}
