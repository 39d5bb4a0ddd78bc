use crate::types::{JobPhase, Role, RoleFilter};
use thiserror::Error;

/// Central error type for the ensemble-separator-core crate.
#[derive(Debug, Error)]
pub enum EnsembleError {
    // Generic fallback (wraps anyhow)
    #[error("{0}")]
    Anyhow(#[from] anyhow::Error),

    // Domain-specific variants
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Model `{model}` not found in registry")]
    UnknownModel { model: String },

    #[error("Backend failure in {phase} phase for model `{model}`: {source:#}")]
    Backend {
        model: String,
        phase: JobPhase,
        #[source]
        source: anyhow::Error,
    },

    #[error("No stems available for the {filter} ensemble")]
    InsufficientStems { filter: RoleFilter },

    #[error("Combination failed{}: {reason}", role_suffix(.role))]
    Combination { role: Option<Role>, reason: String },

    #[error("Registry error: {0}")]
    Registry(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

fn role_suffix(role: &Option<Role>) -> String {
    role.map(|r| format!(" for {r} stems")).unwrap_or_default()
}

impl EnsembleError {
    pub(crate) fn combination(reason: impl Into<String>) -> Self {
        EnsembleError::Combination {
            role: None,
            reason: reason.into(),
        }
    }

    /// Attaches the role being combined to a `Combination` error.
    pub fn with_role(self, role: Role) -> Self {
        match self {
            EnsembleError::Combination { reason, .. } => EnsembleError::Combination {
                role: Some(role),
                reason,
            },
            other => other,
        }
    }

    /// The job phase the failure belongs to, when it carries one.
    pub fn phase(&self) -> Option<JobPhase> {
        match self {
            EnsembleError::InvalidInput(_) => Some(JobPhase::Setup),
            EnsembleError::Backend { phase, .. } => Some(*phase),
            EnsembleError::InsufficientStems { .. } | EnsembleError::Combination { .. } => {
                Some(JobPhase::Combining)
            }
            _ => None,
        }
    }
}

impl From<serde_json::Error> for EnsembleError {
    fn from(e: serde_json::Error) -> Self {
        EnsembleError::Anyhow(e.into())
    }
}

pub type Result<T> = std::result::Result<T, EnsembleError>;
