pub mod batch;
pub mod csv;
pub mod quota;
pub mod row;

pub use batch::{ImportResult, Importer, RowError, DEFAULT_BATCH_SIZE, MAX_IMPORT_ROWS};
pub use quota::{PlanTier, QuotaCheck};
pub use row::{ImportRow, ValidatedRow};
