use thiserror::Error;

/// Batch-level outcomes: the only failures that surface to the caller when
/// not a single intent produced a result. Per-intent failures are contained
/// by the runtime and never reach this level on their own.
#[derive(Clone, Copy, Debug, Error, PartialEq, Eq)]
pub enum BatchError {
    #[error("no supported intent was recognized in the prompt")]
    IntentNotRecognized,
    #[error("no conversation produced a usable action payload")]
    NoActionsProduced,
}

impl BatchError {
    /// Stable wire-facing message for the HTTP layer.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::IntentNotRecognized => "Intent not recognized",
            Self::NoActionsProduced => "No actions found",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::BatchError;

    #[test]
    fn user_messages_match_the_wire_contract() {
        assert_eq!(BatchError::IntentNotRecognized.user_message(), "Intent not recognized");
        assert_eq!(BatchError::NoActionsProduced.user_message(), "No actions found");
    }
}
