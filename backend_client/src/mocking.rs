//! In-memory stand-in for the backend
//!
//! [MockingBackend] keeps tables as JSON rows and evaluates [Query]s the way the REST
//! gateway does. It also records every call it receives so tests can assert how many
//! writes actually reached the backend.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::time::Duration;

use chrono::DateTime;
use chrono::SecondsFormat;
use chrono::Utc;
use reqwest::StatusCode;
use serde::Serialize;
use serde_json::Value;
use url::Url;
use uuid::Uuid;

use super::BackendClient;
use super::Error;
use super::Privilege;
use super::Query;
use super::Session;
use super::User;
use super::error::UNIQUE_VIOLATION;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Operation {
    Select,
    Insert,
    Update,
    Delete,
    Upload,
    SignIn,
    GetUser,
    SignOut,
    Ping,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedCall {
    pub operation: Operation,
    /// Table, bucket or auth endpoint the call targeted
    pub target: String,
    pub privilege: Option<Privilege>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub content_type: String,
    pub content: Vec<u8>,
}

#[derive(Debug)]
struct MockUser {
    password: String,
    user: User,
}

#[derive(Debug)]
struct MockSession {
    user: User,
    expired: bool,
}

#[derive(Debug, Default)]
struct State {
    tables: HashMap<String, Vec<Value>>,
    unique_columns: HashMap<String, Vec<String>>,
    objects: HashMap<(String, String), StoredObject>,
    users: HashMap<String, MockUser>,
    sessions: HashMap<String, MockSession>,
    failures: HashMap<Operation, (StatusCode, String)>,
    calls: Vec<RecordedCall>,
    clock: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone)]
pub struct MockingBackend {
    base_url: Url,
    latency: Option<Duration>,
    state: Arc<Mutex<State>>,
}

impl Default for MockingBackend {
    fn default() -> Self {
        Self {
            base_url: Url::parse("http://backend.test/").expect("static URL should be valid"),
            latency: None,
            state: Default::default(),
        }
    }
}

impl From<MockingBackend> for BackendClient {
    fn from(value: MockingBackend) -> Self {
        Self::Mocked(value)
    }
}

impl MockingBackend {
    pub fn new() -> Self {
        Default::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().expect("mocking backend state should not be poisoned")
    }

    /// Seeds `table` with rows. Generated columns missing from the rows are filled in.
    pub fn with_rows<R: Serialize>(self, table: &str, rows: impl IntoIterator<Item = R>) -> Self {
        {
            let mut state = self.state();
            for row in rows {
                let row = serde_json::to_value(row).expect("mocked row should serialize");
                let row = state.fill_generated_columns(row);
                state.tables.entry(table.to_owned()).or_default().push(row);
            }
        }
        self
    }

    /// Enforces a unique constraint on `column` of `table`
    pub fn unique(self, table: &str, column: &str) -> Self {
        self.state()
            .unique_columns
            .entry(table.to_owned())
            .or_default()
            .push(column.to_owned());
        self
    }

    pub fn with_user(self, email: &str, password: &str) -> Self {
        self.state().users.insert(
            email.to_owned(),
            MockUser {
                password: password.to_owned(),
                user: User {
                    id: Uuid::new_v4().to_string(),
                    email: Some(email.to_owned()),
                },
            },
        );
        self
    }

    /// Delays every call, which leaves room for concurrent requests to overlap
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Makes every following call of `operation` fail until [MockingBackend::recover] is called
    pub fn fail(&self, operation: Operation, status: StatusCode, message: &str) {
        self.state()
            .failures
            .insert(operation, (status, message.to_owned()));
    }

    pub fn recover(&self, operation: Operation) {
        self.state().failures.remove(&operation);
    }

    /// Marks every session as expired, as if their tokens timed out
    pub fn expire_sessions(&self) {
        for session in self.state().sessions.values_mut() {
            session.expired = true;
        }
    }

    /// Creates a session for an already registered user, without recording a call
    pub fn session_for(&self, email: &str) -> Option<String> {
        let mut state = self.state();
        let user = state.users.get(email)?.user.clone();
        let token = Uuid::new_v4().to_string();
        state.sessions.insert(
            token.clone(),
            MockSession {
                user,
                expired: false,
            },
        );
        Some(token)
    }

    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.state().tables.get(table).cloned().unwrap_or_default()
    }

    pub fn object(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.state()
            .objects
            .get(&(bucket.to_owned(), key.to_owned()))
            .cloned()
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.state().calls.clone()
    }

    pub fn count(&self, operation: Operation) -> usize {
        self.state()
            .calls
            .iter()
            .filter(|call| call.operation == operation)
            .count()
    }

    /// Waits for the configured latency, records the call and returns the injected failure, if any
    async fn enter(
        &self,
        operation: Operation,
        target: &str,
        privilege: Option<Privilege>,
    ) -> Result<(), Error> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let mut state = self.state();
        state.calls.push(RecordedCall {
            operation,
            target: target.to_owned(),
            privilege,
        });
        match state.failures.get(&operation) {
            Some((status, message)) => Err(Error::Api {
                status: *status,
                code: None,
                message: message.clone(),
            }),
            None => Ok(()),
        }
    }

    pub(crate) async fn select(
        &self,
        privilege: Privilege,
        table: &str,
        query: &Query,
    ) -> Result<Vec<Value>, Error> {
        self.enter(Operation::Select, table, Some(privilege)).await?;
        let rows = self.rows(table);
        Ok(query.apply(rows))
    }

    pub(crate) async fn insert(
        &self,
        privilege: Privilege,
        table: &str,
        row: Value,
    ) -> Result<Vec<Value>, Error> {
        self.enter(Operation::Insert, table, Some(privilege)).await?;
        if !row.is_object() {
            return Err(Error::Api {
                status: StatusCode::BAD_REQUEST,
                code: Some("PGRST102".to_owned()),
                message: "Only JSON objects can be inserted".to_owned(),
            });
        }
        let mut state = self.state();
        let row = state.fill_generated_columns(row);
        state.check_unique(table, &row, None)?;
        state.tables.entry(table.to_owned()).or_default().push(row.clone());
        Ok(vec![row])
    }

    pub(crate) async fn update(
        &self,
        privilege: Privilege,
        table: &str,
        query: &Query,
        changes: Value,
    ) -> Result<Vec<Value>, Error> {
        self.enter(Operation::Update, table, Some(privilege)).await?;
        let Value::Object(changes) = changes else {
            return Err(Error::Api {
                status: StatusCode::BAD_REQUEST,
                code: Some("PGRST102".to_owned()),
                message: "Only JSON objects can be used as changes".to_owned(),
            });
        };
        let mut state = self.state();
        let updated_at = state.next_timestamp();
        let rows = state.tables.get(table).cloned().unwrap_or_default();
        let mut updates = Vec::new();
        for (index, row) in rows.iter().enumerate() {
            if !query.matches(row) {
                continue;
            }
            let mut row = row.clone();
            if let Value::Object(fields) = &mut row {
                fields.extend(changes.clone());
                fields.insert("updated_at".to_owned(), Value::String(updated_at.clone()));
            }
            state.check_unique(table, &row, Some(index))?;
            updates.push((index, row));
        }
        let table_rows = state.tables.entry(table.to_owned()).or_default();
        for (index, row) in &updates {
            table_rows[*index] = row.clone();
        }
        Ok(updates.into_iter().map(|(_, row)| row).collect())
    }

    pub(crate) async fn delete(
        &self,
        privilege: Privilege,
        table: &str,
        query: &Query,
    ) -> Result<(), Error> {
        self.enter(Operation::Delete, table, Some(privilege)).await?;
        if let Some(rows) = self.state().tables.get_mut(table) {
            rows.retain(|row| !query.matches(row));
        }
        Ok(())
    }

    pub(crate) async fn upload(
        &self,
        bucket: &str,
        key: &str,
        content_type: &str,
        content: Vec<u8>,
    ) -> Result<(), Error> {
        self.enter(Operation::Upload, bucket, Some(Privilege::Service))
            .await?;
        let mut state = self.state();
        let id = (bucket.to_owned(), key.to_owned());
        if state.objects.contains_key(&id) {
            return Err(Error::Api {
                status: StatusCode::CONFLICT,
                code: Some("Duplicate".to_owned()),
                message: "The resource already exists".to_owned(),
            });
        }
        state.objects.insert(
            id,
            StoredObject {
                content_type: content_type.to_owned(),
                content,
            },
        );
        Ok(())
    }

    pub(crate) fn public_url(&self, bucket: &str, key: &str) -> Result<Url, Error> {
        self.base_url
            .join(&format!("storage/v1/object/public/{bucket}/{key}"))
            .map_err(|_| Error::InvalidBaseUrl(self.base_url.to_string()))
    }

    pub(crate) async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, Error> {
        self.enter(Operation::SignIn, "token", Some(Privilege::Anonymous))
            .await?;
        let mut state = self.state();
        let user = match state.users.get(email) {
            Some(mock) if mock.password == password => mock.user.clone(),
            _ => {
                return Err(Error::Api {
                    status: StatusCode::BAD_REQUEST,
                    code: Some("invalid_credentials".to_owned()),
                    message: "Invalid login credentials".to_owned(),
                });
            }
        };
        let access_token = Uuid::new_v4().to_string();
        state.sessions.insert(
            access_token.clone(),
            MockSession {
                user: user.clone(),
                expired: false,
            },
        );
        Ok(Session {
            access_token,
            refresh_token: Some(Uuid::new_v4().to_string()),
            expires_in: Some(3600),
            user,
        })
    }

    pub(crate) async fn get_user(&self, access_token: &str) -> Result<Option<User>, Error> {
        self.enter(Operation::GetUser, "user", Some(Privilege::Anonymous))
            .await?;
        Ok(self
            .state()
            .sessions
            .get(access_token)
            .filter(|session| !session.expired)
            .map(|session| session.user.clone()))
    }

    pub(crate) async fn sign_out(&self, access_token: &str) -> Result<(), Error> {
        self.enter(Operation::SignOut, "logout", Some(Privilege::Anonymous))
            .await?;
        self.state().sessions.remove(access_token);
        Ok(())
    }

    pub(crate) async fn ping(&self) -> Result<(), Error> {
        self.enter(Operation::Ping, "health", None).await
    }
}

impl State {
    /// Strictly increasing, so rows ordered by creation time never tie
    fn next_timestamp(&mut self) -> String {
        let now = Utc::now();
        let now = match self.clock {
            Some(last) if now <= last => last + chrono::Duration::microseconds(1),
            _ => now,
        };
        self.clock = Some(now);
        now.to_rfc3339_opts(SecondsFormat::Micros, true)
    }

    fn fill_generated_columns(&mut self, mut row: Value) -> Value {
        let timestamp = self.next_timestamp();
        if let Value::Object(fields) = &mut row {
            for (column, value) in [
                ("id", Value::String(Uuid::new_v4().to_string())),
                ("created_at", Value::String(timestamp.clone())),
                ("updated_at", Value::String(timestamp)),
            ] {
                match fields.get(column) {
                    Some(existing) if !existing.is_null() => (),
                    _ => {
                        fields.insert(column.to_owned(), value);
                    }
                }
            }
        }
        row
    }

    fn check_unique(&self, table: &str, row: &Value, skip: Option<usize>) -> Result<(), Error> {
        let Some(columns) = self.unique_columns.get(table) else {
            return Ok(());
        };
        let existing = self.tables.get(table).map(Vec::as_slice).unwrap_or_default();
        for column in columns {
            let Some(value) = row.get(column).filter(|value| !value.is_null()) else {
                continue;
            };
            let collides = existing
                .iter()
                .enumerate()
                .any(|(index, other)| Some(index) != skip && other.get(column) == Some(value));
            if collides {
                return Err(Error::Api {
                    status: StatusCode::CONFLICT,
                    code: Some(UNIQUE_VIOLATION.to_owned()),
                    message: format!(
                        "duplicate key value violates unique constraint \"{table}_{column}_key\""
                    ),
                });
            }
        }
        Ok(())
    }
}
