use serde::{Deserialize, Serialize};
use std::fmt;

/// Gateway state machine for one in-flight request.
///
/// `Denied`, `Completed`, and `Failed` are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RequestState {
    Received,
    Resolving,
    AwaitingUser,
    Granted,
    Denied,
    Executing,
    Completed,
    Failed,
}

impl RequestState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            RequestState::Denied | RequestState::Completed | RequestState::Failed
        )
    }
}

impl fmt::Display for RequestState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RequestState::Received => "received",
            RequestState::Resolving => "resolving",
            RequestState::AwaitingUser => "awaiting_user",
            RequestState::Granted => "granted",
            RequestState::Denied => "denied",
            RequestState::Executing => "executing",
            RequestState::Completed => "completed",
            RequestState::Failed => "failed",
        };
        f.write_str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(RequestState::Denied.is_terminal());
        assert!(RequestState::Completed.is_terminal());
        assert!(RequestState::Failed.is_terminal());
        assert!(!RequestState::AwaitingUser.is_terminal());
        assert!(!RequestState::Executing.is_terminal());
    }

    #[test]
    fn serializes_snake_case() {
        let json = serde_json::to_string(&RequestState::AwaitingUser).unwrap();
        assert_eq!(json, r#""awaiting_user""#);
    }
}
