use mongodb::error::{Error as MongoError, ErrorKind, WriteFailure};
use thiserror::Error;

/// Result alias for MongoDB DAO operations.
pub type MongoResult<T> = std::result::Result<T, MongoDaoError>;

const DUPLICATE_KEY_CODE: i32 = 11000;

/// Failures raised by the MongoDB backend.
#[derive(Debug, Error)]
pub enum MongoDaoError {
    /// Connection URI could not be parsed.
    #[error("failed to parse MongoDB connection URI `{uri}`")]
    InvalidUri {
        /// URI as configured.
        uri: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Client could not be built from the options.
    #[error("failed to build MongoDB client from options")]
    ClientConstruction {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Initial ping never succeeded.
    #[error("MongoDB ping failed during initial connection after {attempts} attempt(s)")]
    InitialPing {
        /// Ping attempts made.
        attempts: u32,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Health-check ping failed.
    #[error("MongoDB ping health check failed")]
    HealthPing {
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Index creation failed.
    #[error("failed to ensure index `{index}` on collection `{collection}`")]
    EnsureIndex {
        /// Collection name.
        collection: &'static str,
        /// Index name.
        index: &'static str,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Reading a session failed.
    #[error("failed to load session `{id}`")]
    LoadSession {
        /// Document identifier.
        id: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Writing a session failed.
    #[error("failed to save session `{id}`")]
    SaveSession {
        /// Document identifier.
        id: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Reserving or releasing a join code failed.
    #[error("failed to update join code `{code}`")]
    JoinCode {
        /// Join code.
        code: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Reading or writing ledger entries failed.
    #[error("failed to update ledger of session `{id}`")]
    Ledger {
        /// Document identifier.
        id: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
    /// Reading a quiz failed.
    #[error("failed to load quiz `{id}`")]
    LoadQuiz {
        /// Document identifier.
        id: String,
        /// Driver error.
        #[source]
        source: MongoError,
    },
}

/// Whether the failure is a unique-index violation.
pub fn is_duplicate_key(err: &MongoError) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error))
            if write_error.code == DUPLICATE_KEY_CODE
    )
}
