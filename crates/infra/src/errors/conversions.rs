//! Conversions from external infrastructure errors into domain errors.

use reqwest::Error as HttpError;
use rusqlite::Error as SqlError;
use tracelane_common::error::CommonError;
use tracelane_domain::TracelaneError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub TracelaneError);

impl From<InfraError> for TracelaneError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<TracelaneError> for InfraError {
    fn from(value: TracelaneError) -> Self {
        InfraError(value)
    }
}

trait IntoTracelaneError {
    fn into_tracelane(self) -> TracelaneError;
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → TracelaneError */
/* -------------------------------------------------------------------------- */

impl IntoTracelaneError for SqlError {
    fn into_tracelane(self) -> TracelaneError {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        match self {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match (err.code, err.extended_code) {
                    (ErrorCode::DatabaseBusy, _) => {
                        TracelaneError::Database("database is busy".into())
                    }
                    (ErrorCode::DatabaseLocked, _) => {
                        TracelaneError::Database("database is locked".into())
                    }
                    (ErrorCode::ConstraintViolation, 2067) => {
                        TracelaneError::Database("unique constraint violation".into())
                    }
                    (ErrorCode::DiskFull, _) => TracelaneError::Database("disk is full".into()),
                    (ErrorCode::NotADatabase, _) => {
                        TracelaneError::Database(format!("file is not a database: {message}"))
                    }
                    _ => TracelaneError::Database(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => TracelaneError::NotFound("no rows returned by query".into()),
            RE::FromSqlConversionFailure(_, _, cause) => {
                TracelaneError::Database(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, _, ty) => {
                TracelaneError::Database(format!("invalid column type: {ty}"))
            }
            RE::InvalidPath(path) => TracelaneError::Database(format!(
                "invalid database path: {}",
                path.to_string_lossy()
            )),
            other => TracelaneError::Database(other.to_string()),
        }
    }
}

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        InfraError(value.into_tracelane())
    }
}

/* -------------------------------------------------------------------------- */
/* r2d2::Error → TracelaneError */
/* -------------------------------------------------------------------------- */

impl From<r2d2::Error> for InfraError {
    fn from(value: r2d2::Error) -> Self {
        InfraError(TracelaneError::Database(format!("connection pool: {value}")))
    }
}

/* -------------------------------------------------------------------------- */
/* reqwest::Error → TracelaneError */
/* -------------------------------------------------------------------------- */

impl IntoTracelaneError for HttpError {
    fn into_tracelane(self) -> TracelaneError {
        if self.is_timeout() {
            return TracelaneError::Network("HTTP request timed out".into());
        }

        if self.is_connect() {
            return TracelaneError::Network("HTTP connection failure".into());
        }

        if let Some(status) = self.status() {
            let code = status.as_u16();
            let message =
                format!("HTTP {} {}", code, status.canonical_reason().unwrap_or("unknown status"));

            return match code {
                404 => TracelaneError::NotFound(message),
                429 => TracelaneError::Network(message),
                400..=499 => TracelaneError::InvalidInput(message),
                _ => TracelaneError::Network(message),
            };
        }

        TracelaneError::Network(self.to_string())
    }
}

impl From<HttpError> for InfraError {
    fn from(value: HttpError) -> Self {
        InfraError(value.into_tracelane())
    }
}

/* -------------------------------------------------------------------------- */
/* CommonError → TracelaneError */
/* -------------------------------------------------------------------------- */

impl From<CommonError> for InfraError {
    fn from(value: CommonError) -> Self {
        let mapped = match &value {
            CommonError::Crypto { .. } => TracelaneError::Security(value.to_string()),
            CommonError::Serialization { .. } => TracelaneError::InvalidInput(value.to_string()),
        };
        InfraError(mapped)
    }
}

/* -------------------------------------------------------------------------- */
/* Tests */
/* -------------------------------------------------------------------------- */
