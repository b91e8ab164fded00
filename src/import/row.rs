use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::{de, Deserialize, Deserializer};
use serde_json::Value;
use std::sync::LazyLock;

use crate::{
    error::{ImportError, Result},
    storage::models::{NewStaffMember, NewTemplate},
};

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid email regex"));

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"];

/// One record of a bulk import payload.
///
/// Every field is optional at this stage; scalar JSON values are accepted and
/// rendered as trimmed strings, blank strings become `None`.
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
pub struct ImportRow {
    #[serde(default, deserialize_with = "lenient_string")]
    pub staff_full_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub staff_email: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub staff_job_title: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub certification_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub certification_expiry_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub certification_issue_date: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub validity_period_months: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub certification_notes: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub certification_document_url: Option<String>,
}

/// A row that passed field validation, ready for the three writes.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidatedRow {
    pub staff: NewStaffMember,
    pub template: NewTemplate,
    pub issue_date: Option<NaiveDate>,
    pub expiry_date: NaiveDate,
    pub notes: Option<String>,
    pub document_url: Option<String>,
}

impl ImportRow {
    pub fn from_value(value: &Value) -> Result<Self> {
        if !value.is_object() {
            return Err(ImportError::Validation("Invalid row format".to_string()));
        }
        serde_json::from_value(value.clone())
            .map_err(|e| ImportError::Validation(format!("Invalid row format: {}", e)))
    }

    /// Normalized email, if the row carries one.
    pub fn normalized_email(&self) -> Option<String> {
        self.staff_email
            .as_deref()
            .map(normalize_email)
            .filter(|e| !e.is_empty())
    }

    pub fn validate(&self) -> Result<ValidatedRow> {
        let (Some(full_name), Some(email), Some(certification_name), Some(expiry)) = (
            &self.staff_full_name,
            &self.staff_email,
            &self.certification_name,
            &self.certification_expiry_date,
        ) else {
            return Err(ImportError::Validation("Missing required fields".to_string()));
        };

        let email = normalize_email(email);
        if !is_valid_email(&email) {
            return Err(ImportError::Validation("Invalid email format".to_string()));
        }

        let expiry_date = parse_date(expiry)
            .ok_or_else(|| ImportError::Validation("Invalid expiry date format".to_string()))?;

        let issue_date = match &self.certification_issue_date {
            Some(raw) => Some(
                parse_date(raw)
                    .ok_or_else(|| ImportError::Validation("Invalid issue date format".to_string()))?,
            ),
            None => None,
        };

        let validity_period_months = match &self.validity_period_months {
            Some(raw) => Some(
                parse_validity_months(raw)
                    .ok_or_else(|| ImportError::Validation("Invalid validity period".to_string()))?,
            ),
            None => None,
        };

        Ok(ValidatedRow {
            staff: NewStaffMember {
                email,
                full_name: full_name.clone(),
                job_title: self.staff_job_title.clone(),
            },
            template: NewTemplate {
                name: certification_name.clone(),
                validity_period_months,
            },
            issue_date,
            expiry_date,
            notes: self.certification_notes.clone(),
            document_url: self.certification_document_url.clone(),
        })
    }
}

pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Parse a calendar date, dropping any time-of-day component.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();

    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
                .map(|dt| dt.date())
        })
}

fn parse_validity_months(raw: &str) -> Option<u32> {
    let raw = raw.trim();
    let months = raw.parse::<u32>().ok().or_else(|| {
        // Spreadsheet exports often write whole numbers as `12.0`.
        raw.parse::<f64>()
            .ok()
            .filter(|n| n.fract() == 0.0 && *n >= 0.0 && *n <= u32::MAX as f64)
            .map(|n| n as u32)
    })?;
    (months > 0).then_some(months)
}

fn lenient_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    let text = match value {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(s)) => s,
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        Some(other) => {
            return Err(de::Error::custom(format!(
                "expected a text or number value, found {}",
                other
            )))
        }
    };

    let text = text.trim();
    Ok((!text.is_empty()).then(|| text.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(value: Value) -> ImportRow {
        ImportRow::from_value(&value).unwrap()
    }

    fn complete() -> Value {
        json!({
            "staff_full_name": "Jane Doe",
            "staff_email": "  Jane@Co.com ",
            "certification_name": " CPR ",
            "certification_expiry_date": "2025-01-01",
        })
    }

    #[test]
    fn validates_complete_row_with_defaults() {
        let validated = row(complete()).validate().unwrap();
        assert_eq!(validated.staff.email, "jane@co.com");
        assert_eq!(validated.staff.full_name, "Jane Doe");
        assert_eq!(validated.template.name, "CPR");
        assert_eq!(validated.template.validity_period_months, None);
        assert_eq!(validated.expiry_date, NaiveDate::from_ymd_opt(2025, 1, 1).unwrap());
        assert_eq!(validated.issue_date, None);
    }

    #[test]
    fn blank_required_field_is_missing() {
        let mut value = complete();
        value["staff_full_name"] = json!("   ");
        let err = row(value).validate().unwrap_err();
        assert_eq!(err.to_string(), "Missing required fields");
    }

    #[test]
    fn rejects_malformed_email() {
        for bad in ["jane", "jane@co", "jane doe@co.com", "@co.com"] {
            let mut value = complete();
            value["staff_email"] = json!(bad);
            let err = row(value).validate().unwrap_err();
            assert_eq!(err.to_string(), "Invalid email format", "email {:?}", bad);
        }
    }

    #[test]
    fn rejects_unparsable_dates() {
        let mut value = complete();
        value["certification_expiry_date"] = json!("not-a-date");
        assert_eq!(
            row(value).validate().unwrap_err().to_string(),
            "Invalid expiry date format"
        );

        let mut value = complete();
        value["certification_issue_date"] = json!("31/31/2020");
        assert_eq!(
            row(value).validate().unwrap_err().to_string(),
            "Invalid issue date format"
        );
    }

    #[test]
    fn parses_supported_date_shapes() {
        let expected = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        for raw in [
            "2024-03-09",
            "2024/03/09",
            "03/09/2024",
            "2024-03-09T23:15:00Z",
            "2024-03-09 08:00:00",
        ] {
            assert_eq!(parse_date(raw), Some(expected), "input {:?}", raw);
        }
        assert_eq!(parse_date("2024-02-30"), None);
    }

    #[test]
    fn validity_period_accepts_numbers_and_rejects_garbage() {
        let mut value = complete();
        value["validity_period_months"] = json!(24);
        assert_eq!(row(value).validate().unwrap().template.validity_period_months, Some(24));

        let mut value = complete();
        value["validity_period_months"] = json!("36.0");
        assert_eq!(row(value).validate().unwrap().template.validity_period_months, Some(36));

        for bad in [json!("twelve"), json!(0), json!(-3), json!("1.5")] {
            let mut value = complete();
            value["validity_period_months"] = bad;
            assert_eq!(
                row(value).validate().unwrap_err().to_string(),
                "Invalid validity period"
            );
        }
    }

    #[test]
    fn non_object_rows_are_rejected() {
        assert!(ImportRow::from_value(&json!("jane@co.com")).is_err());
        assert!(ImportRow::from_value(&json!({"staff_email": {"nested": true}})).is_err());
    }
}
