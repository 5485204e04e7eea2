use thiserror::Error;

#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("migration error: {0}")]
    Migration(String),
    #[error("query error: {0}")]
    Query(String),
    #[error("ticket {0} not found")]
    UnknownTicket(i64),
    #[error("category {0} not found")]
    UnknownCategory(i64),
    #[error("panel {0} not found")]
    UnknownPanel(i64),
    #[error("ticket number {0} already exists")]
    DuplicateTicketNumber(i64),
}

impl From<diesel::result::Error> for DatabaseError {
    fn from(value: diesel::result::Error) -> Self {
        DatabaseError::Query(value.to_string())
    }
}
