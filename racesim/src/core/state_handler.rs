use crate::error::SimError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum State {
    Racing,
    PitRequested,
    InPit,
}

/// StateHandler is the pit stop state machine of a car.
///
/// Racing -> PitRequested happens either by an external request or autonomously once the tire
/// wear exceeds the threshold. PitRequested -> InPit happens at the start of the next lap
/// evaluation and InPit -> Racing at the end of that same lap.
#[derive(Debug, Clone)]
pub struct StateHandler {
    state: State,
}

impl StateHandler {
    /// request_pit stores a one-shot pit request. Returns false if the car is already in the pit
    /// lane, the request is then dropped.
    pub fn request_pit(&mut self) -> bool {
        match self.state {
            State::Racing | State::PitRequested => {
                self.state = State::PitRequested;
                true
            }
            State::InPit => false,
        }
    }

    /// check_state_transition is called at the start of a lap evaluation and returns true if the
    /// car enters the pit lane in this lap. The autonomous request and its consumption happen in
    /// the same evaluation.
    pub fn check_state_transition(&mut self, tire_wear: f64, pit_wear_threshold: f64) -> bool {
        if matches!(self.state, State::Racing) && tire_wear > pit_wear_threshold {
            self.state = State::PitRequested;
        }

        if matches!(self.state, State::PitRequested) {
            self.state = State::InPit;
            return true;
        }

        false
    }

    /// deact_pit returns the car to the track at the end of the pit lap.
    pub fn deact_pit(&mut self) -> Result<(), SimError> {
        if !matches!(self.state, State::InPit) {
            return Err(SimError::InvalidStateTransition(
                "tried to leave the pit lane without being in it",
            ));
        }
        self.state = State::Racing;
        Ok(())
    }

    pub fn get_state(&self) -> State {
        self.state
    }

    pub fn pit_requested(&self) -> bool {
        matches!(self.state, State::PitRequested)
    }

    pub fn in_pit_lane(&self) -> bool {
        matches!(self.state, State::InPit)
    }
}

impl Default for StateHandler {
    fn default() -> Self {
        StateHandler {
            state: State::Racing,
        }
    }
}
