//! # MySQL Credential Target
//!
//! Changes and probes MySQL/MariaDB account passwords over a single,
//! unpooled `sqlx` connection.
//!
//! Account names cannot be bound as statement parameters, so password
//! changes are rendered as text statements with every value quoted as a
//! string literal. Quotes are doubled; backslashes and control characters
//! are rejected outright since their meaning depends on `sql_mode`.

use super::{
    ChangeForm, ConnectParams, CredentialChange, CredentialTarget, TargetConnection, TargetError,
};
use crate::constants::LIVENESS_QUERY;
use async_trait::async_trait;
use sqlx::mysql::{MySqlConnectOptions, MySqlConnection, MySqlDatabaseError};
use sqlx::{Connection, Executor};
use std::time::Duration;
use tracing::{debug, warn};
use zeroize::Zeroizing;

/// Server error numbers that mean "this statement form is not understood"
const ER_PARSE_ERROR: u16 = 1064;
const ER_NOT_SUPPORTED_YET: u16 = 1235;
const ER_SP_DOES_NOT_EXIST: u16 = 1305;

/// Server error numbers that mean the login itself was refused
const ER_DBACCESS_DENIED_ERROR: u16 = 1044;
const ER_ACCESS_DENIED_ERROR: u16 = 1045;

/// MySQL/MariaDB `CredentialTarget`
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlTarget;

impl MySqlTarget {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl CredentialTarget for MySqlTarget {
    async fn connect(
        &self,
        params: &ConnectParams,
        timeout: Duration,
    ) -> Result<Box<dyn TargetConnection>, TargetError> {
        let mut options = MySqlConnectOptions::new()
            .host(&params.host)
            .port(params.port)
            .username(&params.username)
            .password(params.password.as_str());
        if let Some(dbname) = &params.dbname {
            options = options.database(dbname);
        }

        debug!(
            host = params.host.as_str(),
            port = params.port,
            username = params.username.as_str(),
            "Connecting to MySQL"
        );

        match tokio::time::timeout(timeout, MySqlConnection::connect_with(&options)).await {
            Ok(Ok(conn)) => Ok(Box::new(MySqlTargetConnection { conn })),
            Ok(Err(e)) => Err(classify_sqlx_error(&e)),
            Err(_elapsed) => Err(TargetError::ConnectTimeout {
                timeout_secs: timeout.as_secs(),
            }),
        }
    }
}

#[derive(Debug)]
struct MySqlTargetConnection {
    conn: MySqlConnection,
}

#[async_trait]
impl TargetConnection for MySqlTargetConnection {
    async fn change_credential(&mut self, change: &CredentialChange<'_>) -> Result<(), TargetError> {
        let statement = render_statement(change)?;
        self.conn
            .execute(statement.as_str())
            .await
            .map_err(|e| classify_sqlx_error(&e))?;
        Ok(())
    }

    async fn liveness_probe(&mut self) -> Result<Vec<i64>, TargetError> {
        sqlx::query_scalar::<_, i64>(LIVENESS_QUERY)
            .fetch_all(&mut self.conn)
            .await
            .map_err(|e| classify_sqlx_error(&e))
    }

    async fn commit(&mut self) -> Result<(), TargetError> {
        self.conn
            .execute("COMMIT")
            .await
            .map_err(|e| classify_sqlx_error(&e))?;
        Ok(())
    }

    async fn close(self: Box<Self>) {
        let Self { conn } = *self;
        if let Err(e) = conn.close().await {
            warn!(error = %e, "Failed to close MySQL connection cleanly");
        }
    }
}

/// Render a password change as a MySQL text statement
///
/// # Errors
///
/// Returns `InvalidInput` when a value contains a backslash or control
/// character.
pub fn render_statement(change: &CredentialChange<'_>) -> Result<Zeroizing<String>, TargetError> {
    let user = quote_literal("username", change.username)?;
    let host = quote_literal("account host", change.account_host)?;
    let password = quote_literal("password", change.password)?;

    let statement = match change.form {
        ChangeForm::AlterUser => format!(
            "ALTER USER {}@{} IDENTIFIED BY {}",
            *user, *host, *password
        ),
        ChangeForm::SetPassword => format!(
            "SET PASSWORD FOR {}@{} = PASSWORD({})",
            *user, *host, *password
        ),
    };
    Ok(Zeroizing::new(statement))
}

fn quote_literal(what: &str, value: &str) -> Result<Zeroizing<String>, TargetError> {
    if value.chars().any(|c| c == '\\' || c.is_control()) {
        return Err(TargetError::invalid_input(format!(
            "{what} contains a backslash or control character"
        )));
    }
    Ok(Zeroizing::new(format!("'{}'", value.replace('\'', "''"))))
}

fn classify_sqlx_error(err: &sqlx::Error) -> TargetError {
    match err {
        sqlx::Error::Database(db) => {
            let message = db.message().to_string();
            match db
                .try_downcast_ref::<MySqlDatabaseError>()
                .map(MySqlDatabaseError::number)
            {
                Some(ER_PARSE_ERROR | ER_NOT_SUPPORTED_YET | ER_SP_DOES_NOT_EXIST) => {
                    TargetError::unsupported_syntax(message)
                }
                Some(ER_ACCESS_DENIED_ERROR | ER_DBACCESS_DENIED_ERROR) => {
                    TargetError::authentication_failed(message)
                }
                _ => TargetError::query(message),
            }
        }
        sqlx::Error::Io(_) | sqlx::Error::Tls(_) | sqlx::Error::Protocol(_) => {
            TargetError::unavailable(err.to_string())
        }
        other => TargetError::query(other.to_string()),
    }
}
