//! Client for the hosted backend the site is built on
//!
//! The backend exposes three services behind a single base URL:
//!
//! - a REST gateway over the Postgres tables (`/rest/v1`)
//! - an object storage (`/storage/v1`)
//! - an auth service handing out session tokens (`/auth/v1`)
//!
//! [BackendClient::Http] talks to a real deployment. With the `mocking_client` feature,
//! [BackendClient::Mocked] runs the same operations against in-memory state.

pub mod error;
mod http;
#[cfg(feature = "mocking_client")]
pub mod mocking;
pub mod query;

use serde::Deserialize;
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

pub use error::Error;
pub use http::HttpBackend;
pub use query::Direction;
pub use query::Query;

/// The key a request is signed with
///
/// Public pages and the auth service only ever get the anonymous key. The service key
/// bypasses row level security and is reserved to operations done on behalf of a
/// signed-in administrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Privilege {
    Anonymous,
    Service,
}

#[derive(Clone)]
pub struct ConnectionSettings {
    url: Url,
    anon_key: String,
    service_key: String,
}

impl std::fmt::Debug for ConnectionSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionSettings")
            .field("url", &self.url.as_str())
            .field("anon_key", &"<redacted>")
            .field("service_key", &"<redacted>")
            .finish()
    }
}

impl ConnectionSettings {
    pub fn new(url: Url, anon_key: String, service_key: String) -> Result<Self, Error> {
        if url.cannot_be_a_base() {
            return Err(Error::InvalidBaseUrl(url.to_string()));
        }
        Ok(Self {
            url,
            anon_key,
            service_key,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub(crate) fn key(&self, privilege: Privilege) -> &str {
        match privilege {
            Privilege::Anonymous => &self.anon_key,
            Privilege::Service => &self.service_key,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Lifetime of the access token, in seconds
    #[serde(default)]
    pub expires_in: Option<i64>,
    pub user: User,
}

#[derive(Debug, Clone)]
pub enum BackendClient {
    Http(HttpBackend),
    #[cfg(feature = "mocking_client")]
    Mocked(mocking::MockingBackend),
}

#[cfg(feature = "mocking_client")]
fn from_rows<T: DeserializeOwned>(rows: Vec<serde_json::Value>) -> Result<Vec<T>, Error> {
    rows.into_iter()
        .map(|row| {
            serde_json::from_value(row).map_err(|err| Error::ResponseFormat(err.to_string()))
        })
        .collect()
}

impl BackendClient {
    pub fn new(settings: ConnectionSettings) -> Self {
        Self::Http(HttpBackend::new(settings))
    }

    /// Selects the rows of `table` matching `query`
    #[tracing::instrument(skip(self), err)]
    pub async fn select<T: DeserializeOwned>(
        &self,
        privilege: Privilege,
        table: &str,
        query: &Query,
    ) -> Result<Vec<T>, Error> {
        match self {
            BackendClient::Http(client) => client.select(privilege, table, query).await,
            #[cfg(feature = "mocking_client")]
            BackendClient::Mocked(client) => {
                from_rows(client.select(privilege, table, query).await?)
            }
        }
    }

    /// Inserts a row and returns it as stored, with its generated columns
    #[tracing::instrument(skip(self, row), err)]
    pub async fn insert<B: Serialize, T: DeserializeOwned>(
        &self,
        privilege: Privilege,
        table: &str,
        row: &B,
    ) -> Result<T, Error> {
        let mut rows: Vec<T> = match self {
            BackendClient::Http(client) => client.insert(privilege, table, row).await?,
            #[cfg(feature = "mocking_client")]
            BackendClient::Mocked(client) => {
                let row = serde_json::to_value(row)
                    .map_err(|err| Error::ResponseFormat(err.to_string()))?;
                from_rows(client.insert(privilege, table, row).await?)?
            }
        };
        if rows.is_empty() {
            return Err(Error::ResponseFormat(
                "the inserted row was not returned".to_owned(),
            ));
        }
        Ok(rows.swap_remove(0))
    }

    /// Applies `changes` to the rows matching `query` and returns the updated rows
    #[tracing::instrument(skip(self, changes), err)]
    pub async fn update<B: Serialize, T: DeserializeOwned>(
        &self,
        privilege: Privilege,
        table: &str,
        query: &Query,
        changes: &B,
    ) -> Result<Vec<T>, Error> {
        match self {
            BackendClient::Http(client) => client.update(privilege, table, query, changes).await,
            #[cfg(feature = "mocking_client")]
            BackendClient::Mocked(client) => {
                let changes = serde_json::to_value(changes)
                    .map_err(|err| Error::ResponseFormat(err.to_string()))?;
                from_rows(client.update(privilege, table, query, changes).await?)
            }
        }
    }

    #[tracing::instrument(skip(self), err)]
    pub async fn delete(&self, privilege: Privilege, table: &str, query: &Query) -> Result<(), Error> {
        match self {
            BackendClient::Http(client) => client.delete(privilege, table, query).await,
            #[cfg(feature = "mocking_client")]
            BackendClient::Mocked(client) => client.delete(privilege, table, query).await,
        }
    }

    /// Stores an object under `key` in `bucket`. Existing objects are never overwritten.
    #[tracing::instrument(skip(self, content), fields(size = content.len()), err)]
    pub async fn upload(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        content: Vec<u8>,
    ) -> Result<(), Error> {
        match self {
            BackendClient::Http(client) => client.upload(bucket, key, content_type, content).await,
            #[cfg(feature = "mocking_client")]
            BackendClient::Mocked(client) => {
                client.upload(bucket, key, content_type, content).await
            }
        }
    }

    /// The URL an object of a public bucket is served at
    pub fn public_url(&self, bucket: &str, key: &str) -> Result<Url, Error> {
        match self {
            BackendClient::Http(client) => client.public_url(bucket, key),
            #[cfg(feature = "mocking_client")]
            BackendClient::Mocked(client) => client.public_url(bucket, key),
        }
    }

    #[tracing::instrument(skip(self, password), err)]
    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, Error> {
        match self {
            BackendClient::Http(client) => client.sign_in_with_password(email, password).await,
            #[cfg(feature = "mocking_client")]
            BackendClient::Mocked(client) => client.sign_in_with_password(email, password).await,
        }
    }

    /// Returns the user owning `access_token`, or `None` if the token is unknown or expired
    #[tracing::instrument(skip_all, err)]
    pub async fn get_user(&self, access_token: &str) -> Result<Option<User>, Error> {
        match self {
            BackendClient::Http(client) => client.get_user(access_token).await,
            #[cfg(feature = "mocking_client")]
            BackendClient::Mocked(client) => client.get_user(access_token).await,
        }
    }

    #[tracing::instrument(skip_all, err)]
    pub async fn sign_out(&self, access_token: &str) -> Result<(), Error> {
        match self {
            BackendClient::Http(client) => client.sign_out(access_token).await,
            #[cfg(feature = "mocking_client")]
            BackendClient::Mocked(client) => client.sign_out(access_token).await,
        }
    }

    #[tracing::instrument(name = "ping_backend", skip_all, err)]
    pub async fn ping(&self) -> Result<(), Error> {
        match self {
            BackendClient::Http(client) => client.ping().await,
            #[cfg(feature = "mocking_client")]
            BackendClient::Mocked(client) => client.ping().await,
        }
    }
}
