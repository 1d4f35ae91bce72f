//! Error types for the command-line companion.

use draft_companion::{CompanionError, DraftError};

/// All errors surfaced by CLI commands.
#[derive(thiserror::Error, Debug)]
pub enum CliError {
    #[error("Invalid arguments: {0}")]
    InvalidArgs(String),

    #[error("Unknown map: {0}")]
    UnknownMap(String),

    #[error("Unknown brawler: {0}")]
    UnknownBrawler(String),

    #[error("Draft error: {0}")]
    Draft(#[from] DraftError),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("Companion error: {0}")]
    Companion(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl CliError {
    /// Process exit code for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::InvalidArgs(_)
            | CliError::UnknownMap(_)
            | CliError::UnknownBrawler(_)
            | CliError::Draft(_) => 2,
            CliError::Upstream(_) => 3,
            CliError::Snapshot(_) => 4,
            CliError::Companion(_) | CliError::Io(_) | CliError::Json(_) => 1,
        }
    }
}

impl From<CompanionError> for CliError {
    fn from(e: CompanionError) -> Self {
        match e {
            CompanionError::Upstream { .. } | CompanionError::Http(_) => {
                CliError::Upstream(e.to_string())
            }
            CompanionError::Snapshot(msg) => CliError::Snapshot(msg),
            CompanionError::InvalidInput(msg) => CliError::InvalidArgs(msg),
            other => CliError::Companion(other.to_string()),
        }
    }
}

pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_companion_errors_map_to_exit_codes() {
        let upstream: CliError = CompanionError::Upstream {
            endpoint: "/tier_list".to_string(),
            status: 500,
        }
        .into();
        assert_eq!(upstream.exit_code(), 3);
        assert!(upstream.to_string().contains("/tier_list"));

        let snapshot: CliError = CompanionError::Snapshot("bad magic".to_string()).into();
        assert_eq!(snapshot.exit_code(), 4);

        let input: CliError = CompanionError::InvalidInput("empty".to_string()).into();
        assert_eq!(input.exit_code(), 2);

        let draft: CliError = DraftError::BanLimit.into();
        assert_eq!(draft.exit_code(), 2);
    }
}
