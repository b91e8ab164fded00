use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, TransactionBehavior};
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard};
use tracing::debug;
use uuid::Uuid;

use crate::{
    error::{ImportError, Result},
    storage::{
        models::{
            AccountStats, ExpiringCertification, NewCertification, NewStaffMember, NewTemplate,
            Upserted, DEFAULT_VALIDITY_MONTHS,
        },
        store::RecordStore,
    },
};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS accounts (
        id TEXT PRIMARY KEY,
        subscription_tier TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS staff_members (
        id TEXT PRIMARY KEY,
        account_id TEXT NOT NULL,
        email TEXT NOT NULL,
        full_name TEXT NOT NULL,
        job_title TEXT,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        UNIQUE (account_id, email)
    );

    CREATE TABLE IF NOT EXISTS certification_templates (
        id TEXT PRIMARY KEY,
        account_id TEXT NOT NULL,
        name TEXT NOT NULL,
        validity_period_months INTEGER NOT NULL DEFAULT 12,
        created_at TEXT NOT NULL,
        updated_at TEXT NOT NULL,
        UNIQUE (account_id, name)
    );

    CREATE TABLE IF NOT EXISTS certifications (
        id TEXT PRIMARY KEY,
        account_id TEXT NOT NULL,
        staff_id TEXT NOT NULL REFERENCES staff_members(id),
        template_id TEXT NOT NULL REFERENCES certification_templates(id),
        issue_date TEXT,
        expiry_date TEXT NOT NULL,
        notes TEXT,
        document_url TEXT,
        created_at TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_certifications_holder
        ON certifications(account_id, staff_id, template_id);

    CREATE INDEX IF NOT EXISTS idx_certifications_expiry
        ON certifications(account_id, expiry_date);
";

/// SQLite-backed [`RecordStore`].
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new(path: &str) -> Result<Self> {
        Self::from_connection(Connection::open(path)?)
    }

    pub fn in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| ImportError::Store("connection lock poisoned".to_string()))
    }
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn subscription_tier(&self, account_id: &str) -> Result<Option<String>> {
        let conn = self.conn()?;
        let tier: Option<Option<String>> = conn
            .query_row(
                "SELECT subscription_tier FROM accounts WHERE id = ?1",
                [account_id],
                |row| row.get(0),
            )
            .optional()?;

        Ok(tier.flatten())
    }

    async fn set_subscription_tier(&self, account_id: &str, tier: &str) -> Result<()> {
        let conn = self.conn()?;
        let now = Utc::now();
        conn.execute(
            "INSERT INTO accounts (id, subscription_tier, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?3)
             ON CONFLICT (id) DO UPDATE SET
                subscription_tier = excluded.subscription_tier,
                updated_at = excluded.updated_at",
            params![account_id, tier, now],
        )?;
        Ok(())
    }

    async fn staff_count(&self, account_id: &str) -> Result<u64> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM staff_members WHERE account_id = ?1",
            [account_id],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    async fn existing_staff_emails(
        &self,
        account_id: &str,
        emails: &[String],
    ) -> Result<HashSet<String>> {
        if emails.is_empty() {
            return Ok(HashSet::new());
        }

        let placeholders = (0..emails.len())
            .map(|i| format!("?{}", i + 2))
            .collect::<Vec<_>>()
            .join(", ");
        let query = format!(
            "SELECT email FROM staff_members WHERE account_id = ?1 AND email IN ({})",
            placeholders
        );

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&query)?;
        let values = std::iter::once(account_id).chain(emails.iter().map(String::as_str));
        let existing = stmt
            .query_map(params_from_iter(values), |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<HashSet<_>, _>>()?;

        Ok(existing)
    }

    async fn upsert_staff(&self, account_id: &str, staff: &NewStaffMember) -> Result<Upserted> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let now = Utc::now();

        let existing: Option<String> = tx
            .query_row(
                "SELECT id FROM staff_members WHERE account_id = ?1 AND email = ?2",
                params![account_id, staff.email],
                |row| row.get(0),
            )
            .optional()?;

        let outcome = match existing {
            Some(id) => {
                tx.execute(
                    "UPDATE staff_members
                     SET full_name = ?1, job_title = COALESCE(?2, job_title), updated_at = ?3
                     WHERE id = ?4",
                    params![staff.full_name, staff.job_title, now, id],
                )?;
                Upserted::existing(id)
            }
            None => {
                let id = Uuid::new_v4().to_string();
                tx.execute(
                    "INSERT INTO staff_members
                     (id, account_id, email, full_name, job_title, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                    params![id, account_id, staff.email, staff.full_name, staff.job_title, now],
                )?;
                Upserted::inserted(id)
            }
        };

        tx.commit()?;
        debug!(account_id, email = %staff.email, created = outcome.created, "Upserted staff member");
        Ok(outcome)
    }

    async fn upsert_template(&self, account_id: &str, template: &NewTemplate) -> Result<Upserted> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let now = Utc::now();

        let existing: Option<String> = tx
            .query_row(
                "SELECT id FROM certification_templates WHERE account_id = ?1 AND name = ?2",
                params![account_id, template.name],
                |row| row.get(0),
            )
            .optional()?;

        let outcome = match existing {
            Some(id) => {
                tx.execute(
                    "UPDATE certification_templates
                     SET validity_period_months = COALESCE(?1, validity_period_months),
                         updated_at = ?2
                     WHERE id = ?3",
                    params![template.validity_period_months, now, id],
                )?;
                Upserted::existing(id)
            }
            None => {
                let id = Uuid::new_v4().to_string();
                tx.execute(
                    "INSERT INTO certification_templates
                     (id, account_id, name, validity_period_months, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?5)",
                    params![
                        id,
                        account_id,
                        template.name,
                        template
                            .validity_period_months
                            .unwrap_or(DEFAULT_VALIDITY_MONTHS),
                        now
                    ],
                )?;
                Upserted::inserted(id)
            }
        };

        tx.commit()?;
        debug!(account_id, name = %template.name, created = outcome.created, "Upserted template");
        Ok(outcome)
    }

    async fn insert_certification_if_absent(
        &self,
        account_id: &str,
        certification: &NewCertification,
    ) -> Result<Upserted> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        // `IS` so that two missing issue dates match each other.
        let existing: Option<String> = tx
            .query_row(
                "SELECT id FROM certifications
                 WHERE account_id = ?1 AND staff_id = ?2 AND template_id = ?3
                   AND issue_date IS ?4",
                params![
                    account_id,
                    certification.staff_id,
                    certification.template_id,
                    certification.issue_date
                ],
                |row| row.get(0),
            )
            .optional()?;

        let outcome = match existing {
            Some(id) => Upserted::existing(id),
            None => {
                let id = Uuid::new_v4().to_string();
                tx.execute(
                    "INSERT INTO certifications
                     (id, account_id, staff_id, template_id, issue_date, expiry_date,
                      notes, document_url, created_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                    params![
                        id,
                        account_id,
                        certification.staff_id,
                        certification.template_id,
                        certification.issue_date,
                        certification.expiry_date,
                        certification.notes,
                        certification.document_url,
                        Utc::now(),
                    ],
                )?;
                Upserted::inserted(id)
            }
        };

        tx.commit()?;
        Ok(outcome)
    }

    async fn expiring_certifications(
        &self,
        account_id: &str,
        from: NaiveDate,
        until: NaiveDate,
    ) -> Result<Vec<ExpiringCertification>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT c.id, s.full_name, s.email, t.name, c.issue_date, c.expiry_date
             FROM certifications c
             JOIN staff_members s ON s.id = c.staff_id
             JOIN certification_templates t ON t.id = c.template_id
             WHERE c.account_id = ?1 AND c.expiry_date BETWEEN ?2 AND ?3
             ORDER BY c.expiry_date ASC, s.full_name ASC",
        )?;

        let certifications = stmt
            .query_map(params![account_id, from, until], |row| {
                Ok(ExpiringCertification {
                    certification_id: row.get(0)?,
                    staff_name: row.get(1)?,
                    staff_email: row.get(2)?,
                    certification_name: row.get(3)?,
                    issue_date: row.get(4)?,
                    expiry_date: row.get(5)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(certifications)
    }

    async fn account_stats(&self, account_id: &str, today: NaiveDate) -> Result<AccountStats> {
        let subscription_tier = self.subscription_tier(account_id).await?;
        let conn = self.conn()?;

        let count = |query: &str| -> rusqlite::Result<u64> {
            conn.query_row(query, [account_id], |row| row.get::<_, i64>(0))
                .map(|n| n as u64)
        };

        let staff_members = count("SELECT COUNT(*) FROM staff_members WHERE account_id = ?1")?;
        let templates =
            count("SELECT COUNT(*) FROM certification_templates WHERE account_id = ?1")?;
        let certifications = count("SELECT COUNT(*) FROM certifications WHERE account_id = ?1")?;

        let expired_certifications: i64 = conn.query_row(
            "SELECT COUNT(*) FROM certifications WHERE account_id = ?1 AND expiry_date < ?2",
            params![account_id, today],
            |row| row.get(0),
        )?;

        Ok(AccountStats {
            subscription_tier,
            staff_members,
            templates,
            certifications,
            expired_certifications: expired_certifications as u64,
        })
    }
}
