use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::HashSet;

use crate::{
    error::Result,
    storage::models::{
        AccountStats, ExpiringCertification, NewCertification, NewStaffMember, NewTemplate,
        Upserted,
    },
};

/// Account-scoped record store used by the importer and the HTTP layer.
///
/// Every write reports whether it inserted a new record; implementations must
/// decide that in the same atomic unit as the write itself.
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn subscription_tier(&self, account_id: &str) -> Result<Option<String>>;

    async fn set_subscription_tier(&self, account_id: &str, tier: &str) -> Result<()>;

    async fn staff_count(&self, account_id: &str) -> Result<u64>;

    /// The subset of `emails` that already belong to staff of this account.
    async fn existing_staff_emails(
        &self,
        account_id: &str,
        emails: &[String],
    ) -> Result<HashSet<String>>;

    async fn upsert_staff(&self, account_id: &str, staff: &NewStaffMember) -> Result<Upserted>;

    async fn upsert_template(&self, account_id: &str, template: &NewTemplate) -> Result<Upserted>;

    /// Insert unless a record with the same staff, template and issue date exists.
    async fn insert_certification_if_absent(
        &self,
        account_id: &str,
        certification: &NewCertification,
    ) -> Result<Upserted>;

    /// Certifications expiring in the inclusive range `[from, until]`, soonest first.
    async fn expiring_certifications(
        &self,
        account_id: &str,
        from: NaiveDate,
        until: NaiveDate,
    ) -> Result<Vec<ExpiringCertification>>;

    async fn account_stats(&self, account_id: &str, today: NaiveDate) -> Result<AccountStats>;
}
