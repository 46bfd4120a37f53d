/// Result of handing one request to the uploader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UploadOutcome {
    Success,
    /// Worth retrying later: timeouts, connection failures, 5xx responses.
    RecoverableFailure(String),
    /// Retrying cannot help: 4xx responses, malformed requests.
    UnrecoverableFailure(String),
}

impl UploadOutcome {
    /// Classifies an HTTP status returned by the collector.
    pub fn from_status(status: u16) -> Self {
        match status {
            200..=299 => UploadOutcome::Success,
            400..=499 => UploadOutcome::UnrecoverableFailure(format!("HTTP {status}")),
            _ => UploadOutcome::RecoverableFailure(format!("HTTP {status}")),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, UploadOutcome::Success)
    }
}

impl std::fmt::Display for UploadOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UploadOutcome::Success => f.write_str("success"),
            UploadOutcome::RecoverableFailure(reason) => write!(f, "recoverable failure: {reason}"),
            UploadOutcome::UnrecoverableFailure(reason) => {
                write!(f, "unrecoverable failure: {reason}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_status() {
        assert_eq!(UploadOutcome::from_status(200), UploadOutcome::Success);
        assert_eq!(UploadOutcome::from_status(204), UploadOutcome::Success);
        assert!(matches!(
            UploadOutcome::from_status(400),
            UploadOutcome::UnrecoverableFailure(_)
        ));
        assert!(matches!(
            UploadOutcome::from_status(413),
            UploadOutcome::UnrecoverableFailure(_)
        ));
        assert!(matches!(
            UploadOutcome::from_status(500),
            UploadOutcome::RecoverableFailure(_)
        ));
        assert!(matches!(
            UploadOutcome::from_status(302),
            UploadOutcome::RecoverableFailure(_)
        ));
    }
}
