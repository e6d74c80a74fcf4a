//! Administrative access to the database server.

use async_trait::async_trait;

use crate::error::Result;

/// What the server reported for one rotate request.
#[derive(Debug, Clone, PartialEq)]
pub struct AdminResponse {
    pub server_version: String,
    pub command_result: serde_json::Value,
}

/// Issues the rotate command against a server.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AdminGateway: Send + Sync {
    /// Connect to `uri`, tell the server to start a new log file and
    /// disconnect again.
    async fn rotate(&self, uri: &str) -> Result<AdminResponse>;
}

#[cfg(feature = "mongodb")]
pub use mongo::MongoGateway;

#[cfg(feature = "mongodb")]
mod mongo {
    use std::time::Duration;

    use async_trait::async_trait;
    use mongodb::bson::{Bson, Document, doc};
    use mongodb::error::{Error as MongoError, ErrorKind as MongoErrorKind};
    use mongodb::options::ClientOptions;
    use mongodb::{Client, Database};

    use super::{AdminGateway, AdminResponse};
    use crate::error::{Result, RotateError};

    /// Gateway talking to MongoDB through the official driver.
    ///
    /// A fresh client is created for every call and shut down afterwards.
    #[derive(Debug, Clone)]
    pub struct MongoGateway {
        connect_timeout: Duration,
        app_name: String,
    }

    impl MongoGateway {
        pub fn new(connect_timeout: Duration, app_name: impl Into<String>) -> Self {
            Self {
                connect_timeout,
                app_name: app_name.into(),
            }
        }

        pub fn from_config(config: &common::GatewayConfig) -> Self {
            Self::new(config.connect_timeout, config.app_name.clone())
        }

        async fn connect(&self, uri: &str) -> Result<Client> {
            let mut options = ClientOptions::parse(uri)
                .await
                .map_err(|e| connection_error(uri, &e))?;
            options.server_selection_timeout = Some(self.connect_timeout);
            options.connect_timeout = Some(self.connect_timeout);
            options.app_name = Some(self.app_name.clone());

            Client::with_options(options).map_err(|e| connection_error(uri, &e))
        }

        async fn run_admin(&self, admin: &Database, uri: &str) -> Result<AdminResponse> {
            let build_info = admin
                .run_command(doc! { "buildInfo": 1 })
                .await
                .map_err(|e| classify(uri, e))?;

            let server_version = build_info
                .get_str("version")
                .unwrap_or("unknown")
                .to_string();

            tracing::debug!(server_version = %server_version, "Issuing logRotate");

            let result = admin
                .run_command(doc! { "logRotate": 1 })
                .await
                .map_err(|e| classify(uri, e))?;

            Ok(AdminResponse {
                server_version,
                command_result: to_json(result),
            })
        }
    }

    impl Default for MongoGateway {
        fn default() -> Self {
            Self::from_config(&common::GatewayConfig::default())
        }
    }

    #[async_trait]
    impl AdminGateway for MongoGateway {
        async fn rotate(&self, uri: &str) -> Result<AdminResponse> {
            let client = self.connect(uri).await?;
            let response = self.run_admin(&client.database("admin"), uri).await;
            client.shutdown().await;
            response
        }
    }

    fn to_json(document: Document) -> serde_json::Value {
        Bson::Document(document).into_relaxed_extjson()
    }

    /// Server-side command failures are rejections; everything else means the
    /// server could not be reached.
    fn classify(uri: &str, error: MongoError) -> RotateError {
        match error.kind.as_ref() {
            MongoErrorKind::Command(command) => RotateError::Command(format!(
                "{} ({}): {}",
                command.code_name, command.code, command.message
            )),
            _ => connection_error(uri, &error),
        }
    }

    fn connection_error(uri: &str, error: &MongoError) -> RotateError {
        RotateError::Connection {
            target: redact(uri),
            message: error.to_string(),
        }
    }

    /// Strips credentials from a connection string before it is logged.
    fn redact(uri: &str) -> String {
        match (uri.find("://"), uri.rfind('@')) {
            (Some(scheme_end), Some(at)) if at > scheme_end => {
                format!("{}://***@{}", &uri[..scheme_end], &uri[at + 1..])
            }
            _ => uri.to_string(),
        }
    }

}
