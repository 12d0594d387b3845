use thiserror::Error;

use crate::{ledger::LedgerError, store::StoreError};

/// Failure of a single chaincode invocation.
///
/// Every variant is terminal for the invocation; the host decides whether to
/// resubmit.
#[derive(Debug, Error)]
pub enum ChaincodeError {
    /// Wrong argument count, type or shape. Raised before any state change.
    #[error("{0}")]
    Argument(String),

    /// The state store failed, or returned a record that cannot be decoded.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Query for a key that holds no record.
    #[error("no account record for {0}")]
    NotFound(String),
}

/// Overflow is a property of the requested amount, so it is reported as an
/// argument error.
impl From<LedgerError> for ChaincodeError {
    fn from(err: LedgerError) -> Self {
        ChaincodeError::Argument(err.to_string())
    }
}

impl ChaincodeError {
    pub(crate) fn argument(msg: impl Into<String>) -> Self {
        ChaincodeError::Argument(msg.into())
    }

    /// Structured failure payload handed back to the host runtime.
    pub fn payload(&self) -> Vec<u8> {
        serde_json::json!({ "Error": self.to_string() })
            .to_string()
            .into_bytes()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payload_wraps_message_in_error_field() {
        let err = ChaincodeError::NotFound("emp-1".into());
        let payload: serde_json::Value = serde_json::from_slice(&err.payload()).unwrap();
        assert_eq!(payload["Error"], "no account record for emp-1");
    }

    #[test]
    fn store_errors_keep_their_message() {
        let err: ChaincodeError = StoreError::Read {
            key: "cpo-1".into(),
            reason: "disk gone".into(),
        }
        .into();
        assert!(matches!(err, ChaincodeError::Store(_)));
        assert_eq!(err.to_string(), "failed to get state for cpo-1: disk gone");
    }
}
