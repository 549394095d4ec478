/// Database model definitions.
pub mod models;
/// Read access to quiz definitions owned by the quiz repository.
pub mod quiz_repository;
/// Live session state and score ledger persistence.
pub mod session_store;
/// Storage abstraction layer for database operations.
pub mod storage;
