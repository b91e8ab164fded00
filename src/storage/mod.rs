pub mod db;
pub mod models;
pub mod store;

pub use db::SqliteStore;
pub use models::{
    AccountStats, ExpiringCertification, NewCertification, NewStaffMember, NewTemplate, Upserted,
};
pub use store::RecordStore;
