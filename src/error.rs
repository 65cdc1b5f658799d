// Error taxonomy for the command layer. Each variant is one way a command
// can end badly, and each maps to its own process exit code so scripts can
// tell a malformed input file from a service rejection.

use crate::api::AuthError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// A user-supplied JSON file (session state, ACLs, bag kwargs) did not
    /// parse. Deliberately fatal: guessing at a half-readable file risks
    /// submitting with the wrong identity or permissions.
    #[error("{path} is not valid JSON: {detail}")]
    InvalidJson { path: String, detail: String },

    /// The submission never reached a structured answer (transport failure,
    /// bad gateway, unreadable response).
    #[error("Flow submission failed: {0}")]
    Submission(String),

    /// The service answered, and the answer was no.
    #[error("The flow service rejected the submission: {0}")]
    FlowRejected(String),

    /// `status` was asked about a flow nobody can name.
    #[error("no flow to query: pass --flow-id and --flow-instance-id, or submit a dataset first")]
    NoFlowToQuery,

    /// The status lookup itself went wrong.
    #[error("Error checking status for flow '{flow_id}': {detail}")]
    Status { flow_id: String, detail: String },
}

impl Error {
    /// Process exit code for this failure class. Code 1 is reserved for
    /// errors outside the taxonomy, 5 for auth failures.
    pub fn exit_code(&self) -> u8 {
        match self {
            Error::InvalidJson { .. } => 2,
            Error::Submission(_) | Error::FlowRejected(_) | Error::Status { .. } => 3,
            Error::NoFlowToQuery => 4,
        }
    }
}

/// Walk an anyhow chain and map the first recognized error to its exit
/// code. Context layers added with `.context(...)` sit above the typed
/// error, so every link is checked, not just the outermost.
pub fn exit_code_for(err: &anyhow::Error) -> u8 {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<Error>() {
            return e.exit_code();
        }
        if cause.downcast_ref::<AuthError>().is_some() {
            return 5;
        }
    }
    1
}
