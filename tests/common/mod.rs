//! Common test utilities for rotation tests
//!
//! In-memory stand-ins for AWS Secrets Manager and a MySQL server, plus
//! fixtures shared across test files.

#![allow(dead_code, reason = "Each test binary uses a different subset of helpers")]

use async_trait::async_trait;
use base64::Engine;
use db_secret_rotator::provider::{SecretStore, StoreError};
use db_secret_rotator::secret::{SecretValue, StageLabel, VersionSelector, VersionStages};
use db_secret_rotator::target::{
    ChangeForm, ConnectParams, CredentialChange, CredentialTarget, TargetConnection, TargetError,
};
use db_secret_rotator::RotationCoordinator;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const SECRET_ID: &str = "arn:aws:secretsmanager:eu-west-1:123456789012:secret:db/app";
pub const INITIAL_TOKEN: &str = "T0";

/// Current payload for an account that rotates its own password
pub const SELF_ROTATING_PAYLOAD: &str = r#"{
    "engine": "mysql",
    "host": "db.internal",
    "port": 3306,
    "dbname": "orders",
    "username": "app",
    "password": "old"
}"#;

/// Current payload carrying separate superuser credentials
pub const SUPERUSER_PAYLOAD: &str = r#"{
    "host": "db.internal",
    "port": "3306",
    "dbname": "orders",
    "username": "app",
    "password": "old",
    "superuser": "admin",
    "superuser_password": "admin-pw"
}"#;

// ---------------------------------------------------------------------------
// Secret store
// ---------------------------------------------------------------------------

#[derive(Clone)]
enum StoredContent {
    Text(String),
    Binary(Vec<u8>),
}

struct StoredVersion {
    content: StoredContent,
    labels: BTreeSet<StageLabel>,
}

#[derive(Default)]
struct StoreState {
    secrets: HashMap<String, BTreeMap<String, StoredVersion>>,
    calls: usize,
    mutations: usize,
}

/// In-memory secret store with Secrets Manager staging label semantics
///
/// - a label is attached to at most one version
/// - writing an existing token with the same content is a no-op, with
///   different content a conflict
/// - moving `AWSCURRENT` tags the displaced version `AWSPREVIOUS` and drops
///   `AWSPENDING` from the promoted one
#[derive(Default)]
pub struct FakeSecretStore {
    state: Mutex<StoreState>,
}

impl FakeSecretStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store with one `AWSCURRENT` version holding `payload`
    pub fn with_current(secret_id: &str, token: &str, payload: &str) -> Self {
        let store = Self::new();
        store.seed(secret_id, token, payload, &[StageLabel::Current]);
        store
    }

    pub fn seed(&self, secret_id: &str, token: &str, payload: &str, labels: &[StageLabel]) {
        self.seed_content(
            secret_id,
            token,
            StoredContent::Text(payload.to_string()),
            labels,
        );
    }

    /// Seed a `SecretBinary` version holding base64 text of `payload`
    pub fn seed_binary(&self, secret_id: &str, token: &str, payload: &str, labels: &[StageLabel]) {
        let encoded = base64::engine::general_purpose::STANDARD.encode(payload);
        self.seed_content(
            secret_id,
            token,
            StoredContent::Binary(encoded.into_bytes()),
            labels,
        );
    }

    fn seed_content(
        &self,
        secret_id: &str,
        token: &str,
        content: StoredContent,
        labels: &[StageLabel],
    ) {
        let mut state = self.state.lock().unwrap();
        let versions = state.secrets.entry(secret_id.to_string()).or_default();
        for label in labels {
            for version in versions.values_mut() {
                version.labels.remove(label);
            }
        }
        versions.insert(
            token.to_string(),
            StoredVersion {
                content,
                labels: labels.iter().cloned().collect(),
            },
        );
    }

    /// Snapshot of the token → labels map
    pub fn stages(&self, secret_id: &str) -> VersionStages {
        let state = self.state.lock().unwrap();
        let mut stages = VersionStages::new();
        if let Some(versions) = state.secrets.get(secret_id) {
            for (token, version) in versions {
                stages.insert(token.clone(), version.labels.iter().cloned());
            }
        }
        stages
    }

    /// Text content of one version
    pub fn content(&self, secret_id: &str, token: &str) -> Option<String> {
        let state = self.state.lock().unwrap();
        state
            .secrets
            .get(secret_id)
            .and_then(|versions| versions.get(token))
            .and_then(|version| match &version.content {
                StoredContent::Text(text) => Some(text.clone()),
                StoredContent::Binary(_) => None,
            })
    }

    /// Parsed JSON content of one version
    pub fn document(&self, secret_id: &str, token: &str) -> serde_json::Value {
        let text = self
            .content(secret_id, token)
            .unwrap_or_else(|| panic!("no text version {token} for {secret_id}"));
        serde_json::from_str(&text).unwrap()
    }

    pub fn version_count(&self, secret_id: &str) -> usize {
        let state = self.state.lock().unwrap();
        state.secrets.get(secret_id).map_or(0, BTreeMap::len)
    }

    /// Number of trait calls of any kind
    pub fn call_count(&self) -> usize {
        self.state.lock().unwrap().calls
    }

    /// Number of successful writes (new versions and label moves)
    pub fn mutation_count(&self) -> usize {
        self.state.lock().unwrap().mutations
    }
}

#[async_trait]
impl SecretStore for FakeSecretStore {
    async fn describe_secret(&self, secret_id: &str) -> Result<VersionStages, StoreError> {
        let known = {
            let mut state = self.state.lock().unwrap();
            state.calls += 1;
            state.secrets.contains_key(secret_id)
        };
        if known {
            Ok(self.stages(secret_id))
        } else {
            Err(StoreError::not_found(secret_id, "secret"))
        }
    }

    async fn get_secret_value(
        &self,
        secret_id: &str,
        selector: &VersionSelector,
    ) -> Result<SecretValue, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.calls += 1;

        let not_found = || StoreError::not_found(secret_id, selector);
        let versions = state.secrets.get(secret_id).ok_or_else(not_found)?;

        let (token, version) = match (&selector.token, &selector.stage) {
            (Some(token), stage) => {
                let version = versions.get(token).ok_or_else(not_found)?;
                if stage.as_ref().is_some_and(|s| !version.labels.contains(s)) {
                    return Err(not_found());
                }
                (token.clone(), version)
            }
            (None, stage) => {
                let stage = stage.clone().unwrap_or(StageLabel::Current);
                versions
                    .iter()
                    .find(|(_, version)| version.labels.contains(&stage))
                    .map(|(token, version)| (token.clone(), version))
                    .ok_or_else(not_found)?
            }
        };

        Ok(match &version.content {
            StoredContent::Text(text) => SecretValue::text(token, text.clone()),
            StoredContent::Binary(bytes) => SecretValue::binary(token, bytes.clone()),
        })
    }

    async fn put_secret_value(
        &self,
        secret_id: &str,
        token: &str,
        secret_string: &str,
        stages: &[StageLabel],
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        state.calls += 1;

        let versions = state
            .secrets
            .get_mut(secret_id)
            .ok_or_else(|| StoreError::not_found(secret_id, "secret"))?;

        if let Some(existing) = versions.get(token) {
            return match &existing.content {
                StoredContent::Text(text) if text == secret_string => Ok(()),
                _ => Err(StoreError::conflict(format!(
                    "version {token} already exists with different content"
                ))),
            };
        }

        for stage in stages {
            for version in versions.values_mut() {
                version.labels.remove(stage);
            }
        }
        versions.insert(
            token.to_string(),
            StoredVersion {
                content: StoredContent::Text(secret_string.to_string()),
                labels: stages.iter().cloned().collect(),
            },
        );
        state.mutations += 1;
        Ok(())
    }

    async fn update_secret_version_stage(
        &self,
        secret_id: &str,
        stage: &StageLabel,
        move_to_token: &str,
        remove_from_token: Option<&str>,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        state.calls += 1;

        let versions = state
            .secrets
            .get_mut(secret_id)
            .ok_or_else(|| StoreError::not_found(secret_id, "secret"))?;
        if !versions.contains_key(move_to_token) {
            return Err(StoreError::not_found(
                secret_id,
                VersionSelector::token(move_to_token),
            ));
        }

        let holder = versions
            .iter()
            .find(|(_, version)| version.labels.contains(stage))
            .map(|(token, _)| token.clone());
        if holder.as_deref() != remove_from_token && holder.as_deref() != Some(move_to_token) {
            return Err(StoreError::invalid_request(format!(
                "{stage} is attached to {holder:?}, not {remove_from_token:?}"
            )));
        }

        if let Some(holder) = holder.filter(|holder| holder != move_to_token) {
            if *stage == StageLabel::Current {
                for version in versions.values_mut() {
                    version.labels.remove(&StageLabel::Previous);
                }
            }
            if let Some(version) = versions.get_mut(&holder) {
                version.labels.remove(stage);
                if *stage == StageLabel::Current {
                    version.labels.insert(StageLabel::Previous);
                }
            }
        }

        if let Some(version) = versions.get_mut(move_to_token) {
            version.labels.insert(stage.clone());
            if *stage == StageLabel::Current {
                version.labels.remove(&StageLabel::Pending);
            }
        }
        state.mutations += 1;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Database
// ---------------------------------------------------------------------------

/// A login attempt seen by the fake database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectAttempt {
    pub host: String,
    pub port: u16,
    pub dbname: Option<String>,
    pub username: String,
}

/// A credential change seen by the fake database
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeAttempt {
    pub form: ChangeForm,
    pub username: String,
    pub account_host: String,
}

#[derive(Default)]
struct DbState {
    users: HashMap<String, String>,
    legacy_only: bool,
    unavailable: bool,
    deny_changes: bool,
    liveness_rows: Option<Vec<i64>>,
    connects: Vec<ConnectAttempt>,
    changes: Vec<ChangeAttempt>,
    opened: usize,
    closed: usize,
    commits: usize,
}

/// In-memory MySQL server
///
/// Cloning shares state, so a test can keep a handle while the coordinator
/// owns another.
#[derive(Clone, Default)]
pub struct FakeDatabase {
    state: Arc<Mutex<DbState>>,
}

impl FakeDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(self, username: &str, password: &str) -> Self {
        self.state
            .lock()
            .unwrap()
            .users
            .insert(username.to_string(), password.to_string());
        self
    }

    /// Reject `ALTER USER` as a syntax error, like servers before MySQL 5.7.6
    pub fn legacy_only(self) -> Self {
        self.state.lock().unwrap().legacy_only = true;
        self
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.state.lock().unwrap().unavailable = unavailable;
    }

    /// Fail every credential change with a privilege error
    pub fn deny_credential_changes(&self) {
        self.state.lock().unwrap().deny_changes = true;
    }

    /// Rows the liveness query returns instead of `[1]`
    pub fn set_liveness_rows(&self, rows: Vec<i64>) {
        self.state.lock().unwrap().liveness_rows = Some(rows);
    }

    pub fn password_of(&self, username: &str) -> Option<String> {
        self.state.lock().unwrap().users.get(username).cloned()
    }

    pub fn connects(&self) -> Vec<ConnectAttempt> {
        self.state.lock().unwrap().connects.clone()
    }

    pub fn changes(&self) -> Vec<ChangeAttempt> {
        self.state.lock().unwrap().changes.clone()
    }

    pub fn connections_opened(&self) -> usize {
        self.state.lock().unwrap().opened
    }

    pub fn connections_closed(&self) -> usize {
        self.state.lock().unwrap().closed
    }

    pub fn commits(&self) -> usize {
        self.state.lock().unwrap().commits
    }
}

#[async_trait]
impl CredentialTarget for FakeDatabase {
    async fn connect(
        &self,
        params: &ConnectParams,
        _timeout: Duration,
    ) -> Result<Box<dyn TargetConnection>, TargetError> {
        let mut state = self.state.lock().unwrap();
        state.connects.push(ConnectAttempt {
            host: params.host.clone(),
            port: params.port,
            dbname: params.dbname.clone(),
            username: params.username.clone(),
        });

        if state.unavailable {
            return Err(TargetError::unavailable(format!(
                "Can't connect to MySQL server on '{}:{}'",
                params.host, params.port
            )));
        }
        if state.users.get(&params.username).map(String::as_str) != Some(params.password.as_str()) {
            return Err(TargetError::authentication_failed(format!(
                "Access denied for user '{}'",
                params.username
            )));
        }

        state.opened += 1;
        Ok(Box::new(FakeConnection {
            state: Arc::clone(&self.state),
        }))
    }
}

struct FakeConnection {
    state: Arc<Mutex<DbState>>,
}

#[async_trait]
impl TargetConnection for FakeConnection {
    async fn change_credential(&mut self, change: &CredentialChange<'_>) -> Result<(), TargetError> {
        let mut state = self.state.lock().unwrap();
        state.changes.push(ChangeAttempt {
            form: change.form,
            username: change.username.to_string(),
            account_host: change.account_host.to_string(),
        });

        if state.legacy_only && change.form == ChangeForm::AlterUser {
            return Err(TargetError::unsupported_syntax(
                "You have an error in your SQL syntax near 'USER'",
            ));
        }
        if state.deny_changes {
            return Err(TargetError::query(
                "Access denied; you need the CREATE USER privilege",
            ));
        }
        if !state.users.contains_key(change.username) {
            return Err(TargetError::query(format!(
                "Operation ALTER USER failed for '{}'",
                change.username
            )));
        }

        state
            .users
            .insert(change.username.to_string(), change.password.to_string());
        Ok(())
    }

    async fn liveness_probe(&mut self) -> Result<Vec<i64>, TargetError> {
        let state = self.state.lock().unwrap();
        Ok(state.liveness_rows.clone().unwrap_or_else(|| vec![1]))
    }

    async fn commit(&mut self) -> Result<(), TargetError> {
        self.state.lock().unwrap().commits += 1;
        Ok(())
    }

    async fn close(self: Box<Self>) {
        self.state.lock().unwrap().closed += 1;
    }
}

// ---------------------------------------------------------------------------
// Fixtures
// ---------------------------------------------------------------------------

pub fn coordinator(store: &Arc<FakeSecretStore>, db: &FakeDatabase) -> RotationCoordinator {
    let store: Arc<dyn SecretStore> = Arc::clone(store) as Arc<dyn SecretStore>;
    RotationCoordinator::new(store, Arc::new(db.clone()))
}

/// Store and database for an account that rotates itself
pub fn self_rotating_setup() -> (Arc<FakeSecretStore>, FakeDatabase) {
    let store = Arc::new(FakeSecretStore::with_current(
        SECRET_ID,
        INITIAL_TOKEN,
        SELF_ROTATING_PAYLOAD,
    ));
    let db = FakeDatabase::new().with_user("app", "old");
    (store, db)
}

/// Store and database where `admin` changes `app`'s password
pub fn superuser_setup() -> (Arc<FakeSecretStore>, FakeDatabase) {
    let store = Arc::new(FakeSecretStore::with_current(
        SECRET_ID,
        INITIAL_TOKEN,
        SUPERUSER_PAYLOAD,
    ));
    let db = FakeDatabase::new()
        .with_user("app", "old")
        .with_user("admin", "admin-pw");
    (store, db)
}
