//! Error types of the simulator.
//!
//! In-race incidents (driver errors, mechanical failures, safety cars) are not errors. They are
//! race events and end up in the event log.

use thiserror::Error;

/// Errors that prevent a race from being set up at all.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConstructionError {
    /// The requested circuit does not exist in the entity lookup.
    #[error("circuit with id {0} not found")]
    CircuitNotFound(u32),

    /// An entity attribute or simulation constant is outside of its valid range.
    #[error("invalid value for {field}: {value} ({reason})")]
    InvalidParameter {
        field: String,
        value: f64,
        reason: &'static str,
    },

    /// No driver could be paired with a car.
    #[error("no competitor could be entered into the race")]
    NoCompetitors,
}

impl ConstructionError {
    pub(crate) fn invalid(field: impl Into<String>, value: f64, reason: &'static str) -> Self {
        ConstructionError::InvalidParameter {
            field: field.into(),
            value,
            reason,
        }
    }
}

/// Rejected strategy commands. A rejected command never mutates the race.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("driver {0} is not part of this race")]
    CompetitorNotFound(u32),

    #[error("action '{0}' is not recognized")]
    ActionNotRecognized(String),

    #[error("the race has already finished")]
    RaceFinished,

    #[error("driver {0} has retired from the race")]
    CompetitorRetired(u32),
}

/// Internal failures of the lap loop. Any of these aborts the simulation instance.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SimError {
    #[error("non-finite {quantity} for driver {driver_id} in lap {lap}")]
    NonFiniteState {
        quantity: &'static str,
        driver_id: u32,
        lap: u32,
    },

    #[error("invalid event probability {0}")]
    InvalidProbability(f64),

    #[error("invalid pit state transition: {0}")]
    InvalidStateTransition(&'static str),

    #[error("the race is already in a terminal phase")]
    AlreadyTerminal,
}

/// Errors reported by the race supervisor.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SupervisorError {
    #[error("simulation {0} not found or expired")]
    SimulationNotFound(String),

    #[error("simulation {0} is not active")]
    SimulationNotActive(String),

    #[error(transparent)]
    Command(#[from] CommandError),
}
