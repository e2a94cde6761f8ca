#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Database error: {0}")]
    SqlxError(#[from] sqlx::Error),
}

impl DbError {
    /// True when the failure is infrastructural (connection, pool, transport)
    /// rather than caused by the statement or the data it carried.
    ///
    /// Batch runs abort on these and keep going on everything else.
    pub fn is_unavailable(&self) -> bool {
        let DbError::SqlxError(err) = self;
        matches!(
            err,
            sqlx::Error::Io(_)
                | sqlx::Error::Tls(_)
                | sqlx::Error::Protocol(_)
                | sqlx::Error::PoolTimedOut
                | sqlx::Error::PoolClosed
                | sqlx::Error::WorkerCrashed
                | sqlx::Error::BeginFailed
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pool_failures_are_unavailable() {
        assert!(DbError::from(sqlx::Error::PoolTimedOut).is_unavailable());
        assert!(DbError::from(sqlx::Error::PoolClosed).is_unavailable());
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert!(DbError::from(sqlx::Error::Io(io)).is_unavailable());
    }

    #[test]
    fn test_row_level_failures_are_not_unavailable() {
        assert!(!DbError::from(sqlx::Error::RowNotFound).is_unavailable());
        assert!(!DbError::from(sqlx::Error::ColumnNotFound("value".to_string())).is_unavailable());
    }
}
