//! Mapping from SQLite failures to the canonical repository error taxonomy.
//!
//! Callers of the contract never see `rusqlite` error shapes; every failure
//! from the driver is classified here. Constraint violations become
//! `Validation` (the unique-index rejection path), connectivity and file
//! problems become `Connection`, everything else is `Internal` with the
//! driver error preserved as the source.

use entity_repository::RepositoryError;
use rusqlite::ErrorCode;

pub(crate) fn map_sqlite_error(context: &str, error: rusqlite::Error) -> RepositoryError {
    match &error {
        rusqlite::Error::SqliteFailure(failure, _) => match failure.code {
            ErrorCode::ConstraintViolation => RepositoryError::validation_with_source(
                format!("{context}: constraint violated"),
                error,
            ),
            ErrorCode::CannotOpen
            | ErrorCode::DatabaseBusy
            | ErrorCode::DatabaseLocked
            | ErrorCode::NotADatabase => {
                RepositoryError::connection_with_source(context.to_owned(), error)
            },
            _ => RepositoryError::internal_with_source(context.to_owned(), error),
        },
        _ => RepositoryError::internal_with_source(context.to_owned(), error),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn failure(code: ErrorCode) -> rusqlite::Error {
        rusqlite::Error::SqliteFailure(
            rusqlite::ffi::Error { code, extended_code: 0 },
            Some("boom".into()),
        )
    }

    #[test]
    fn constraint_maps_to_validation() {
        let err = map_sqlite_error("insert", failure(ErrorCode::ConstraintViolation));
        assert!(matches!(err, RepositoryError::Validation { .. }));
    }

    #[test]
    fn busy_maps_to_connection() {
        let err = map_sqlite_error("query", failure(ErrorCode::DatabaseBusy));
        assert!(matches!(err, RepositoryError::Connection { .. }));
    }

    #[test]
    fn unknown_maps_to_internal_with_source() {
        let err = map_sqlite_error("query", failure(ErrorCode::InternalMalfunction));
        assert!(matches!(err, RepositoryError::Internal { .. }));
        assert!(std::error::Error::source(&err).is_some());
    }
}
