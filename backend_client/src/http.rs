use reqwest::RequestBuilder;
use reqwest::Response;
use reqwest::StatusCode;
use reqwest::header::CONTENT_TYPE;
use serde::Serialize;
use serde::de::DeserializeOwned;
use url::Url;

use crate::ConnectionSettings;
use crate::Error;
use crate::Privilege;
use crate::Query;
use crate::Session;
use crate::User;

const API_KEY_HEADER: &str = "apikey";

#[derive(Debug, Clone)]
pub struct HttpBackend {
    settings: ConnectionSettings,
    inner: reqwest::Client,
}

impl HttpBackend {
    pub fn new(settings: ConnectionSettings) -> Self {
        Self {
            settings,
            inner: reqwest::Client::new(),
        }
    }

    fn endpoint<'a>(&self, segments: impl IntoIterator<Item = &'a str>) -> Result<Url, Error> {
        let mut url = self.settings.url().clone();
        url.path_segments_mut()
            .map_err(|_| Error::InvalidBaseUrl(self.settings.url().to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn table(&self, table: &str) -> Result<Url, Error> {
        self.endpoint(["rest", "v1", table])
    }

    fn object(&self, prefix: &[&str], bucket: &str, key: &str) -> Result<Url, Error> {
        self.endpoint(
            ["storage", "v1", "object"]
                .into_iter()
                .chain(prefix.iter().copied())
                .chain(std::iter::once(bucket))
                .chain(key.split('/')),
        )
    }

    fn sign(&self, request: RequestBuilder, privilege: Privilege) -> RequestBuilder {
        let key = self.settings.key(privilege);
        request.header(API_KEY_HEADER, key).bearer_auth(key)
    }

    /// Turns non-success responses into [Error::Api]
    async fn check(response: Response) -> Result<Response, Error> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.bytes().await?;
        Err(Error::from_response(status, &body))
    }

    pub(crate) async fn select<T: DeserializeOwned>(
        &self,
        privilege: Privilege,
        table: &str,
        query: &Query,
    ) -> Result<Vec<T>, Error> {
        let request = self
            .sign(self.inner.get(self.table(table)?), privilege)
            .query(&query.select_pairs());
        let response = Self::check(request.send().await?).await?;
        Ok(response.json().await?)
    }

    pub(crate) async fn insert<B: Serialize, T: DeserializeOwned>(
        &self,
        privilege: Privilege,
        table: &str,
        row: &B,
    ) -> Result<Vec<T>, Error> {
        let request = self
            .sign(self.inner.post(self.table(table)?), privilege)
            .header("Prefer", "return=representation")
            .json(row);
        let response = Self::check(request.send().await?).await?;
        Ok(response.json().await?)
    }

    pub(crate) async fn update<B: Serialize, T: DeserializeOwned>(
        &self,
        privilege: Privilege,
        table: &str,
        query: &Query,
        changes: &B,
    ) -> Result<Vec<T>, Error> {
        let request = self
            .sign(self.inner.patch(self.table(table)?), privilege)
            .query(&query.filter_pairs())
            .header("Prefer", "return=representation")
            .json(changes);
        let response = Self::check(request.send().await?).await?;
        Ok(response.json().await?)
    }

    pub(crate) async fn delete(
        &self,
        privilege: Privilege,
        table: &str,
        query: &Query,
    ) -> Result<(), Error> {
        let request = self
            .sign(self.inner.delete(self.table(table)?), privilege)
            .query(&query.filter_pairs());
        Self::check(request.send().await?).await?;
        Ok(())
    }

    pub(crate) async fn upload(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        content: Vec<u8>,
    ) -> Result<(), Error> {
        let request = self
            .sign(
                self.inner.post(self.object(&[], bucket, key)?),
                Privilege::Service,
            )
            .header(CONTENT_TYPE, content_type)
            .header("x-upsert", "false")
            .body(content);
        Self::check(request.send().await?).await?;
        Ok(())
    }

    pub(crate) fn public_url(&self, bucket: &str, key: &str) -> Result<Url, Error> {
        self.object(&["public"], bucket, key)
    }

    pub(crate) async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, Error> {
        #[derive(Serialize)]
        struct Credentials<'a> {
            email: &'a str,
            password: &'a str,
        }

        let request = self
            .inner
            .post(self.endpoint(["auth", "v1", "token"])?)
            .query(&[("grant_type", "password")])
            .header(API_KEY_HEADER, self.settings.key(Privilege::Anonymous))
            .json(&Credentials { email, password });
        let response = Self::check(request.send().await?).await?;
        Ok(response.json().await?)
    }

    pub(crate) async fn get_user(&self, access_token: &str) -> Result<Option<User>, Error> {
        let request = self
            .inner
            .get(self.endpoint(["auth", "v1", "user"])?)
            .header(API_KEY_HEADER, self.settings.key(Privilege::Anonymous))
            .bearer_auth(access_token);
        let response = request.send().await?;
        if matches!(
            response.status(),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            return Ok(None);
        }
        let response = Self::check(response).await?;
        Ok(Some(response.json().await?))
    }

    pub(crate) async fn sign_out(&self, access_token: &str) -> Result<(), Error> {
        let request = self
            .inner
            .post(self.endpoint(["auth", "v1", "logout"])?)
            .header(API_KEY_HEADER, self.settings.key(Privilege::Anonymous))
            .bearer_auth(access_token);
        let response = request.send().await?;
        // The session is already gone
        if matches!(
            response.status(),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::NOT_FOUND
        ) {
            return Ok(());
        }
        Self::check(response).await?;
        Ok(())
    }

    pub(crate) async fn ping(&self) -> Result<(), Error> {
        let request = self
            .inner
            .get(self.endpoint(["auth", "v1", "health"])?)
            .header(API_KEY_HEADER, self.settings.key(Privilege::Anonymous));
        Self::check(request.send().await?).await?;
        Ok(())
    }
}
