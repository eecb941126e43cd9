use crate::core::car::PaceMode;
use crate::core::race::RacePhase;
use crate::core::tireset::Compound;
use crate::error::CommandError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrackState {
    Dry,
    Rain,
    SafetyCar,
}

impl Default for TrackState {
    fn default() -> Self {
        TrackState::Dry
    }
}

/// CompetitorStatus is one row of the live timing screen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitorStatus {
    pub position: u32,
    pub driver_id: u32,
    pub driver_name: String,
    pub team_id: Option<u32>,
    pub team_name: Option<String>,
    pub racetime: f64,
    pub tire_wear: f64,
    pub tire_compound: Compound,
    pub fuel: f64,
    pub battery: f64,
    pub pace_mode: PaceMode,
    pub on_track: bool,
    pub in_pit: bool,
}

/// RaceStatus is a snapshot of a race after a lap (or a command). `version` increases with every
/// change of the race, so consumers can detect whether a snapshot is newer than the one they
/// already have.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceStatus {
    pub version: u64,
    pub phase: RacePhase,
    pub cur_lap: u32,
    pub tot_no_laps: u32,
    pub track_state: TrackState,
    pub finished: bool,
    pub competitors: Vec<CompetitorStatus>,
    pub event_log: Vec<String>,
}

impl RaceStatus {
    pub fn get_competitor(&self, driver_id: u32) -> Option<&CompetitorStatus> {
        self.competitors.iter().find(|c| c.driver_id == driver_id)
    }
}

/// SimStatus is what a supervisor reports for a simulation id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", content = "data")]
pub enum SimStatus {
    /// The simulation was accepted but has not published its first snapshot yet.
    Pending,
    /// Last published snapshot; also used once the race is finished or cancelled.
    Running(RaceStatus),
    /// The simulation was aborted by an internal failure.
    Failed(String),
}

/// StrategyAction is a command from the pit wall to one of the drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StrategyAction {
    RequestPit,
    SetPace(PaceMode),
}

impl FromStr for StrategyAction {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "RequestPit" => Ok(StrategyAction::RequestPit),
            "Normal" => Ok(StrategyAction::SetPace(PaceMode::Normal)),
            "Attack" => Ok(StrategyAction::SetPace(PaceMode::Attack)),
            "Conservative" => Ok(StrategyAction::SetPace(PaceMode::Conservative)),
            _ => Err(CommandError::ActionNotRecognized(s.to_owned())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StrategyCommand {
    pub driver_id: u32,
    pub action: StrategyAction,
}
