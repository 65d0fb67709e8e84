use std::io;
use std::path::PathBuf;

use resumebot_core::ErrorStatus;
use resumebot_core::RagError;
use resumebot_persistence::PersistenceError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("cannot read document {path}: {source}")]
    DocumentUnreadable {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("document {0} contains no text")]
    EmptyDocument(PathBuf),

    #[error("no question given")]
    EmptyQuestion,

    #[error(transparent)]
    Core(#[from] RagError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Io(#[from] io::Error),
}

// sysexits(3) codes, so scripts can tell failure classes apart.
const EX_USAGE: u8 = 64;
const EX_DATAERR: u8 = 65;
const EX_NOINPUT: u8 = 66;
const EX_UNAVAILABLE: u8 = 69;
const EX_IOERR: u8 = 74;
const EX_TEMPFAIL: u8 = 75;
const EX_PROTOCOL: u8 = 76;
const EX_CONFIG: u8 = 78;

impl CliError {
    pub const fn exit_code(&self) -> u8 {
        match self {
            CliError::DocumentUnreadable { .. } => EX_NOINPUT,
            CliError::EmptyDocument(_) => EX_DATAERR,
            CliError::EmptyQuestion => EX_USAGE,
            CliError::Core(err) => status_exit_code(err.status()),
            CliError::Persistence(_) | CliError::Io(_) => EX_IOERR,
        }
    }
}

pub const fn status_exit_code(status: ErrorStatus) -> u8 {
    match status {
        ErrorStatus::TryLater => EX_TEMPFAIL,
        ErrorStatus::NotReady => EX_UNAVAILABLE,
        ErrorStatus::Upstream => EX_PROTOCOL,
        ErrorStatus::Rejected => EX_DATAERR,
        ErrorStatus::Misconfigured => EX_CONFIG,
    }
}

/// Exit code for an error chain; 1 when nothing in it is recognized.
pub fn exit_code(err: &anyhow::Error) -> u8 {
    for cause in err.chain() {
        if let Some(cli) = cause.downcast_ref::<CliError>() {
            return cli.exit_code();
        }
        if let Some(rag) = cause.downcast_ref::<RagError>() {
            return status_exit_code(rag.status());
        }
        if cause.downcast_ref::<PersistenceError>().is_some() {
            return EX_IOERR;
        }
    }
    1
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;
    use std::time::Duration;

    #[test]
    fn test_error_classes_get_distinct_codes() {
        let rate_limited = CliError::from(RagError::RateLimitExceeded {
            retry_after: Duration::from_secs(1),
        });
        let not_ready = CliError::from(RagError::EmptyIndex);
        let misconfigured = CliError::from(RagError::configuration("CHUNK_SIZE", "bad"));
        assert_eq!(rate_limited.exit_code(), EX_TEMPFAIL);
        assert_eq!(not_ready.exit_code(), EX_UNAVAILABLE);
        assert_eq!(misconfigured.exit_code(), EX_CONFIG);
    }

    #[test]
    fn test_exit_code_looks_through_context() {
        let err = Err::<(), _>(RagError::EmptyIndex)
            .context("answering question")
            .unwrap_err();
        assert_eq!(exit_code(&err), EX_UNAVAILABLE);

        let err = anyhow::Error::new(CliError::EmptyQuestion).context("parsing input");
        assert_eq!(exit_code(&err), EX_USAGE);

        assert_eq!(exit_code(&anyhow::anyhow!("something else")), 1);
    }
}
