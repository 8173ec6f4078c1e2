//! Infrastructure layer: ledger storage, database wiring, external services.

pub mod db;
pub mod external;
pub mod ledger_service;
pub mod ledger_store;


pub use ledger_service::{Dashboard, LedgerService, RECENT_ACTIVITY_LIMIT, RECENT_TRANSACTION_LIMIT};
pub use ledger_store::{InMemoryLedgerStore, LedgerStore, LedgerStoreError, PostgresLedgerStore};
