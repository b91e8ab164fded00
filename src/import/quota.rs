use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

use crate::{
    error::{ImportError, Result},
    import::row::ImportRow,
    storage::RecordStore,
};

/// Subscription tier, which bounds the number of staff an account may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlanTier {
    #[default]
    Starter,
    Growth,
    Professional,
}

impl PlanTier {
    /// Resolve a stored tier; unset or unrecognized tiers fall back to the lowest plan.
    pub fn from_stored(tier: Option<&str>) -> Self {
        tier.and_then(|t| t.parse().ok()).unwrap_or_default()
    }

    pub fn staff_limit(self) -> u64 {
        match self {
            PlanTier::Starter => 10,
            PlanTier::Growth => 50,
            PlanTier::Professional => 200,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            PlanTier::Starter => "starter",
            PlanTier::Growth => "growth",
            PlanTier::Professional => "professional",
        }
    }
}

impl fmt::Display for PlanTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PlanTier {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "starter" => Ok(PlanTier::Starter),
            "growth" => Ok(PlanTier::Growth),
            "professional" => Ok(PlanTier::Professional),
            other => Err(format!(
                "unknown plan tier '{}' (expected starter, growth or professional)",
                other
            )),
        }
    }
}

/// Snapshot of an account's quota position for one import.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuotaCheck {
    pub plan: PlanTier,
    pub limit: u64,
    pub current: u64,
    pub attempted: u64,
}

impl QuotaCheck {
    pub fn exceeds_limit(&self) -> bool {
        self.current + self.attempted > self.limit
    }

    pub fn into_error(self) -> ImportError {
        ImportError::QuotaExceeded {
            plan: self.plan.to_string(),
            limit: self.limit,
            current: self.current,
            attempted: self.attempted,
        }
    }
}

/// Distinct normalized emails referenced by the rows, in sorted order.
pub fn distinct_emails<'a>(rows: impl IntoIterator<Item = &'a ImportRow>) -> Vec<String> {
    rows.into_iter()
        .filter_map(ImportRow::normalized_email)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Check that adding the not-yet-known `emails` keeps the account within its plan.
///
/// Runs before any write; a violation aborts the whole import.
pub async fn enforce(store: &dyn RecordStore, account_id: &str, emails: &[String]) -> Result<QuotaCheck> {
    let plan = PlanTier::from_stored(store.subscription_tier(account_id).await?.as_deref());
    let current = store.staff_count(account_id).await?;
    let existing = store.existing_staff_emails(account_id, emails).await?;
    let attempted = emails.iter().filter(|e| !existing.contains(*e)).count() as u64;

    let check = QuotaCheck {
        plan,
        limit: plan.staff_limit(),
        current,
        attempted,
    };

    if check.exceeds_limit() {
        warn!(
            account_id,
            plan = %check.plan,
            limit = check.limit,
            current = check.current,
            attempted = check.attempted,
            "Import rejected: staff limit exceeded"
        );
        return Err(check.into_error());
    }

    debug!(
        account_id,
        plan = %check.plan,
        limit = check.limit,
        current = check.current,
        attempted = check.attempted,
        "Staff quota check passed"
    );
    Ok(check)
}
