use thiserror::Error;

#[derive(Error, Debug)]
pub enum ImportError {
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Validation(String),

    #[error(
        "Staff limit exceeded. Your {plan} plan allows {limit} staff members. \
         You currently have {current} and are trying to add {attempted} more."
    )]
    QuotaExceeded {
        plan: String,
        limit: u64,
        current: u64,
        attempted: u64,
    },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Store error: {0}")]
    Store(String),

    /// A failure inside one step of a row's write sequence.
    #[error("{step}: {source}")]
    Step {
        step: &'static str,
        #[source]
        source: Box<ImportError>,
    },

    #[error("Identity provider error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl ImportError {
    /// Wrap an error with the name of the row step that produced it.
    pub fn in_step(step: &'static str) -> impl FnOnce(ImportError) -> ImportError {
        move |source| ImportError::Step {
            step,
            source: Box::new(source),
        }
    }

    /// Errors that abort a whole import call rather than a single row.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ImportError::Validation(_) | ImportError::QuotaExceeded { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, ImportError>;
