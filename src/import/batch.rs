use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::{
    error::{ImportError, Result},
    import::{quota, row::ImportRow},
    storage::{NewCertification, RecordStore},
};

/// Hard cap on rows accepted by a single import call.
pub const MAX_IMPORT_ROWS: usize = 1000;

pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Aggregate outcome of one import call.
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    pub success: usize,
    pub errors: Vec<RowError>,
    pub staff_created: usize,
    pub templates_created: usize,
    pub certifications_created: usize,
}

/// A row that could not be imported, with its 1-based input position.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RowError {
    pub row: usize,
    pub data: Value,
    pub error: String,
}

impl ImportResult {
    pub fn rows_processed(&self) -> usize {
        self.success + self.errors.len()
    }
}

/// Reconciles bulk staff/certification rows into the record store.
pub struct Importer {
    store: Arc<dyn RecordStore>,
    batch_size: usize,
}

impl Importer {
    pub fn new(store: Arc<dyn RecordStore>, batch_size: usize) -> Self {
        Self {
            store,
            batch_size: batch_size.max(1),
        }
    }

    /// Import `rows` for `account_id`.
    ///
    /// Fails without writing anything when the payload is empty, too large, or
    /// would push the account past its staff limit. Once rows are being
    /// processed, each failure is recorded against its row and the import
    /// carries on.
    pub async fn import(&self, account_id: &str, rows: Vec<Value>) -> Result<ImportResult> {
        if rows.is_empty() {
            return Err(ImportError::Validation("No data provided".to_string()));
        }
        if rows.len() > MAX_IMPORT_ROWS {
            return Err(ImportError::Validation(format!(
                "Too many rows. Maximum {} rows per import",
                MAX_IMPORT_ROWS
            )));
        }

        let parsed: Vec<Result<ImportRow>> = rows.iter().map(ImportRow::from_value).collect();
        let emails = quota::distinct_emails(parsed.iter().filter_map(|r| r.as_ref().ok()));
        quota::enforce(self.store.as_ref(), account_id, &emails).await?;

        let entries: Vec<(Value, Result<ImportRow>)> = rows.into_iter().zip(parsed).collect();
        let total_batches = entries.len().div_ceil(self.batch_size);

        info!(
            account_id,
            rows = entries.len(),
            batches = total_batches,
            "Starting import"
        );

        let mut result = ImportResult::default();

        for (batch_num, chunk) in entries.chunks(self.batch_size).enumerate() {
            debug!("Processing batch {}/{}", batch_num + 1, total_batches);

            for (offset, (payload, parsed)) in chunk.iter().enumerate() {
                let row_number = batch_num * self.batch_size + offset + 1;

                let outcome = match parsed {
                    Ok(row) => self.process_row(account_id, row, &mut result).await,
                    Err(e) => Err(ImportError::Validation(e.to_string())),
                };

                match outcome {
                    Ok(()) => result.success += 1,
                    Err(e) => {
                        warn!(account_id, row = row_number, error = %e, "Row import failed");
                        result.errors.push(RowError {
                            row: row_number,
                            data: payload.clone(),
                            error: e.to_string(),
                        });
                    }
                }
            }
        }

        info!(
            account_id,
            success = result.success,
            failed = result.errors.len(),
            staff_created = result.staff_created,
            templates_created = result.templates_created,
            certifications_created = result.certifications_created,
            "Import complete"
        );

        Ok(result)
    }

    /// Validate one row and run its staff, template and certification writes.
    ///
    /// Counters are bumped as each write lands, so a failure in a later step
    /// still reports the records an earlier step created.
    async fn process_row(
        &self,
        account_id: &str,
        row: &ImportRow,
        result: &mut ImportResult,
    ) -> Result<()> {
        let validated = row.validate()?;

        let staff = self
            .store
            .upsert_staff(account_id, &validated.staff)
            .await
            .map_err(ImportError::in_step("Failed to upsert staff member"))?;
        if staff.created {
            result.staff_created += 1;
        }

        let template = self
            .store
            .upsert_template(account_id, &validated.template)
            .await
            .map_err(ImportError::in_step("Failed to upsert certification template"))?;
        if template.created {
            result.templates_created += 1;
        }

        let certification = NewCertification {
            staff_id: staff.id,
            template_id: template.id,
            issue_date: validated.issue_date,
            expiry_date: validated.expiry_date,
            notes: validated.notes,
            document_url: validated.document_url,
        };

        let inserted = self
            .store
            .insert_certification_if_absent(account_id, &certification)
            .await
            .map_err(ImportError::in_step("Failed to create certification"))?;
        if inserted.created {
            result.certifications_created += 1;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{
        AccountStats, ExpiringCertification, NewStaffMember, NewTemplate, SqliteStore, Upserted,
    };
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use serde_json::json;
    use std::collections::HashSet;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 1).unwrap()
    }

    fn jane() -> Value {
        json!({
            "staff_full_name": "Jane Doe",
            "staff_email": "Jane@Co.com",
            "certification_name": "CPR",
            "certification_expiry_date": "2025-01-01",
        })
    }

    fn staff_row(i: usize) -> Value {
        json!({
            "staff_full_name": format!("Staff {}", i),
            "staff_email": format!("staff{}@co.com", i),
            "certification_name": "CPR",
            "certification_expiry_date": "2025-01-01",
        })
    }

    fn setup() -> (Arc<SqliteStore>, Importer) {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let importer = Importer::new(store.clone(), DEFAULT_BATCH_SIZE);
        (store, importer)
    }

    async fn stats(store: &SqliteStore) -> AccountStats {
        store.account_stats("acct", today()).await.unwrap()
    }

    #[tokio::test]
    async fn imports_single_row_on_empty_starter_account() {
        let (_store, importer) = setup();
        let result = importer.import("acct", vec![jane()]).await.unwrap();

        assert_eq!(result.success, 1);
        assert_eq!(result.staff_created, 1);
        assert_eq!(result.templates_created, 1);
        assert_eq!(result.certifications_created, 1);
        assert!(result.errors.is_empty());
    }

    #[tokio::test]
    async fn reimport_is_idempotent() {
        let (store, importer) = setup();
        let rows: Vec<Value> = (0..5).map(staff_row).chain([jane()]).collect();

        importer.import("acct", rows.clone()).await.unwrap();
        let second = importer.import("acct", rows).await.unwrap();

        assert_eq!(second.success, 6);
        assert_eq!(second.staff_created, 0);
        assert_eq!(second.templates_created, 0);
        assert_eq!(second.certifications_created, 0);
        assert!(second.errors.is_empty());

        let stats = stats(&store).await;
        assert_eq!(stats.staff_members, 6);
        assert_eq!(stats.templates, 1);
        assert_eq!(stats.certifications, 6);
    }

    #[tokio::test]
    async fn existing_certification_is_never_overwritten() {
        let (store, importer) = setup();
        let mut original = jane();
        original["certification_issue_date"] = json!("2024-01-01");
        original["certification_notes"] = json!("first card");
        importer.import("acct", vec![original.clone()]).await.unwrap();

        let mut changed = original;
        changed["certification_expiry_date"] = json!("2030-01-01");
        changed["certification_notes"] = json!("replacement card");
        let result = importer.import("acct", vec![changed]).await.unwrap();

        assert_eq!(result.success, 1);
        assert_eq!(result.certifications_created, 0);
        assert!(result.errors.is_empty());

        let window_start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let window_end = NaiveDate::from_ymd_opt(2031, 1, 1).unwrap();
        let stored = store
            .expiring_certifications("acct", window_start, window_end)
            .await
            .unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(
            stored[0].expiry_date,
            NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
        );
    }

    #[tokio::test]
    async fn rejects_empty_and_oversized_payloads_without_writes() {
        let (store, importer) = setup();

        let err = importer.import("acct", vec![]).await.unwrap_err();
        assert_eq!(err.to_string(), "No data provided");

        store.set_subscription_tier("acct", "professional").await.unwrap();
        let rows: Vec<Value> = (0..MAX_IMPORT_ROWS + 1).map(|_| jane()).collect();
        let err = importer.import("acct", rows).await.unwrap_err();
        assert!(matches!(err, ImportError::Validation(ref m) if m.contains("Too many rows")));
        assert_eq!(stats(&store).await.staff_members, 0);
    }

    #[tokio::test]
    async fn accepts_exactly_max_rows() {
        let (store, importer) = setup();
        let rows: Vec<Value> = (0..MAX_IMPORT_ROWS).map(|_| jane()).collect();
        let result = importer.import("acct", rows).await.unwrap();

        assert_eq!(result.success, MAX_IMPORT_ROWS);
        assert_eq!(result.certifications_created, 1);
        assert_eq!(stats(&store).await.staff_members, 1);
    }

    #[tokio::test]
    async fn quota_boundary_is_exclusive() {
        let (store, importer) = setup();

        let at_limit: Vec<Value> = (0..10).map(staff_row).collect();
        let result = importer.import("acct", at_limit).await.unwrap();
        assert_eq!(result.staff_created, 10);

        let over: Vec<Value> = (10..11).map(staff_row).collect();
        let err = importer.import("acct", over).await.unwrap_err();
        assert!(matches!(
            err,
            ImportError::QuotaExceeded { limit: 10, current: 10, attempted: 1, .. }
        ));
        assert_eq!(stats(&store).await.staff_members, 10);
    }

    #[tokio::test]
    async fn quota_failure_makes_no_writes() {
        let (store, importer) = setup();
        store.set_subscription_tier("acct", "starter").await.unwrap();

        let rows: Vec<Value> = (0..11).map(staff_row).collect();
        let err = importer.import("acct", rows).await.unwrap_err();
        assert!(err.is_client_error());

        let stats = stats(&store).await;
        assert_eq!(stats.staff_members, 0);
        assert_eq!(stats.templates, 0);
        assert_eq!(stats.certifications, 0);
    }

    #[tokio::test]
    async fn higher_tier_raises_limit() {
        let (store, importer) = setup();
        store.set_subscription_tier("acct", "growth").await.unwrap();

        let rows: Vec<Value> = (0..50).map(staff_row).collect();
        let result = importer.import("acct", rows).await.unwrap();
        assert_eq!(result.staff_created, 50);
    }

    #[tokio::test]
    async fn invalid_rows_are_reported_with_input_position() {
        let (store, importer) = setup();
        let mut missing = jane();
        missing["certification_name"] = json!("");
        let mut bad_date = staff_row(1);
        bad_date["certification_expiry_date"] = json!("not-a-date");

        let rows = vec![staff_row(0), missing.clone(), bad_date];
        let result = importer.import("acct", rows).await.unwrap();

        assert_eq!(result.success, 1);
        assert_eq!(result.errors.len(), 2);
        assert_eq!(result.errors[0].row, 2);
        assert_eq!(result.errors[0].error, "Missing required fields");
        assert_eq!(result.errors[0].data, missing);
        assert_eq!(result.errors[1].row, 3);
        assert_eq!(result.errors[1].error, "Invalid expiry date format");

        // Neither failing row wrote anything.
        assert_eq!(stats(&store).await.staff_members, 1);
    }

    #[tokio::test]
    async fn invalid_expiry_on_single_row() {
        let (_store, importer) = setup();
        let mut row = jane();
        row["certification_expiry_date"] = json!("not-a-date");

        let result = importer.import("acct", vec![row]).await.unwrap();
        assert_eq!(result.success, 0);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].row, 1);
        assert_eq!(result.errors[0].error, "Invalid expiry date format");
    }

    #[tokio::test]
    async fn row_numbers_continue_across_batches() {
        let store = Arc::new(SqliteStore::in_memory().unwrap());
        let importer = Importer::new(store, 2);

        let mut rows: Vec<Value> = (0..5).map(staff_row).collect();
        rows[4]["staff_email"] = json!("broken");

        let result = importer.import("acct", rows).await.unwrap();
        assert_eq!(result.success, 4);
        assert_eq!(result.errors[0].row, 5);
        assert_eq!(result.rows_processed(), 5);
    }

    #[tokio::test]
    async fn email_case_and_whitespace_resolve_to_one_staff_member() {
        let (store, importer) = setup();
        let mut other = jane();
        other["staff_email"] = json!("  jane@co.COM ");
        other["certification_name"] = json!("First Aid");

        let result = importer.import("acct", vec![jane(), other]).await.unwrap();
        assert_eq!(result.success, 2);
        assert_eq!(result.staff_created, 1);
        assert_eq!(result.templates_created, 2);
        assert_eq!(stats(&store).await.staff_members, 1);
    }

    #[tokio::test]
    async fn distinct_issue_dates_create_separate_certifications() {
        let (_store, importer) = setup();
        let mut first = jane();
        first["certification_issue_date"] = json!("2023-01-01");
        let mut renewal = jane();
        renewal["certification_issue_date"] = json!("2024-01-01");
        renewal["certification_expiry_date"] = json!("2026-01-01");

        let result = importer.import("acct", vec![first, renewal]).await.unwrap();
        assert_eq!(result.certifications_created, 2);
        assert_eq!(result.staff_created, 1);
    }

    /// Delegates to SQLite but fails template writes for one certification name.
    struct FlakyTemplates {
        inner: SqliteStore,
        failing_name: &'static str,
    }

    #[async_trait]
    impl RecordStore for FlakyTemplates {
        async fn subscription_tier(&self, account_id: &str) -> Result<Option<String>> {
            self.inner.subscription_tier(account_id).await
        }

        async fn set_subscription_tier(&self, account_id: &str, tier: &str) -> Result<()> {
            self.inner.set_subscription_tier(account_id, tier).await
        }

        async fn staff_count(&self, account_id: &str) -> Result<u64> {
            self.inner.staff_count(account_id).await
        }

        async fn existing_staff_emails(
            &self,
            account_id: &str,
            emails: &[String],
        ) -> Result<HashSet<String>> {
            self.inner.existing_staff_emails(account_id, emails).await
        }

        async fn upsert_staff(&self, account_id: &str, staff: &NewStaffMember) -> Result<Upserted> {
            self.inner.upsert_staff(account_id, staff).await
        }

        async fn upsert_template(
            &self,
            account_id: &str,
            template: &NewTemplate,
        ) -> Result<Upserted> {
            if template.name == self.failing_name {
                return Err(ImportError::Store("connection reset".to_string()));
            }
            self.inner.upsert_template(account_id, template).await
        }

        async fn insert_certification_if_absent(
            &self,
            account_id: &str,
            certification: &NewCertification,
        ) -> Result<Upserted> {
            self.inner
                .insert_certification_if_absent(account_id, certification)
                .await
        }

        async fn expiring_certifications(
            &self,
            account_id: &str,
            from: NaiveDate,
            until: NaiveDate,
        ) -> Result<Vec<ExpiringCertification>> {
            self.inner.expiring_certifications(account_id, from, until).await
        }

        async fn account_stats(&self, account_id: &str, today: NaiveDate) -> Result<AccountStats> {
            self.inner.account_stats(account_id, today).await
        }
    }

    #[tokio::test]
    async fn store_failure_is_isolated_to_its_row() {
        let store = Arc::new(FlakyTemplates {
            inner: SqliteStore::in_memory().unwrap(),
            failing_name: "Broken",
        });
        let importer = Importer::new(store.clone(), DEFAULT_BATCH_SIZE);

        let mut broken = staff_row(1);
        broken["certification_name"] = json!("Broken");
        let rows = vec![staff_row(0), broken, staff_row(2)];

        let result = importer.import("acct", rows).await.unwrap();
        assert_eq!(result.success, 2);
        assert_eq!(result.errors.len(), 1);
        assert_eq!(result.errors[0].row, 2);
        assert_eq!(
            result.errors[0].error,
            "Failed to upsert certification template: Store error: connection reset"
        );
        // The staff write that preceded the failure stands.
        assert_eq!(result.staff_created, 3);
        assert_eq!(result.certifications_created, 2);
    }
}
