use ww_state::StateError;

/// A bug tripped an invariant the state model enforces. The caller aborts
/// only the affected game; the process keeps running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineError {
    InvariantViolation(StateError),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match self {
            EngineError::InvariantViolation(err) => write!(f, "invariant violation: {err}"),
        }
    }
}

impl std::error::Error for EngineError {}

impl From<StateError> for EngineError {
    fn from(err: StateError) -> Self {
        EngineError::InvariantViolation(err)
    }
}
