use crate::error::AppError;
use parking_lot::RwLock;

/// Recorder lifecycle. `Idle` means no capture session is open and no
/// tick is scheduled; `Recording` means exactly one session is open and
/// the polling loop is live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecorderState {
    Idle,
    Recording,
}

pub struct StateManager {
    state: RwLock<RecorderState>,
}

impl Default for StateManager {
    fn default() -> Self {
        Self::new()
    }
}

impl StateManager {
    pub fn new() -> Self {
        Self {
            state: RwLock::new(RecorderState::Idle),
        }
    }

    pub fn transition(&self, new_state: RecorderState) -> Result<(), AppError> {
        let mut current = self.state.write();

        let valid = matches!(
            (*current, new_state),
            (RecorderState::Idle, RecorderState::Recording)
                | (RecorderState::Recording, RecorderState::Idle)
        );

        if !valid {
            return Err(AppError::Fatal(format!(
                "Invalid state transition: {:?} -> {:?}",
                *current, new_state
            )));
        }

        tracing::info!("State transition: {:?} -> {:?}", *current, new_state);
        *current = new_state;
        Ok(())
    }

    pub fn current(&self) -> RecorderState {
        *self.state.read()
    }
}
