pub mod document;
pub mod ledger;
pub mod lock;
pub mod paths;

pub use document::{read_report_document, write_atomic, write_report_document};
pub use ledger::{init_workspace, Ledger, StoreError};
pub use lock::LedgerLock;
pub use paths::VigilPaths;
