use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Validity assigned to a new template when the import leaves it out.
pub const DEFAULT_VALIDITY_MONTHS: u32 = 12;

/// Staff member attributes written by an import, keyed by (account, email).
#[derive(Debug, Clone, PartialEq)]
pub struct NewStaffMember {
    /// Already normalized: trimmed and lower-cased.
    pub email: String,
    pub full_name: String,
    pub job_title: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewTemplate {
    pub name: String,
    /// `None` keeps the stored value on update and falls back to
    /// [`DEFAULT_VALIDITY_MONTHS`] on insert.
    pub validity_period_months: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewCertification {
    pub staff_id: String,
    pub template_id: String,
    pub issue_date: Option<NaiveDate>,
    pub expiry_date: NaiveDate,
    pub notes: Option<String>,
    pub document_url: Option<String>,
}

/// Outcome of a create-or-update write, decided atomically by the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Upserted {
    pub id: String,
    pub created: bool,
}

impl Upserted {
    pub fn inserted(id: String) -> Self {
        Self { id, created: true }
    }

    pub fn existing(id: String) -> Self {
        Self { id, created: false }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExpiringCertification {
    pub certification_id: String,
    pub staff_name: String,
    pub staff_email: String,
    pub certification_name: String,
    pub issue_date: Option<NaiveDate>,
    pub expiry_date: NaiveDate,
}

impl ExpiringCertification {
    pub fn days_until_expiry(&self, today: NaiveDate) -> i64 {
        (self.expiry_date - today).num_days()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AccountStats {
    pub subscription_tier: Option<String>,
    pub staff_members: u64,
    pub templates: u64,
    pub certifications: u64,
    pub expired_certifications: u64,
}
