//! Errors raised by the query layer

use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A row came back in a shape the entity cannot be decoded from
    #[error("failed to decode {entity} row: {source}")]
    Decode {
        entity: &'static str,
        #[source]
        source: sqlx::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_message() {
        let err = QueryError::NotFound {
            entity: "course",
            id: 7,
        };
        assert_eq!(err.to_string(), "course 7 not found");
    }
}
