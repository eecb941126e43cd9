use crate::core::car::CarPars;
use crate::core::driver::DriverPars;
use crate::core::race::RacePars;
use crate::core::sim_constants::SimConstants;
use crate::core::track::TrackPars;
use anyhow::Context;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::path::Path;

/// EntityLookup provides the master data a race is built from. The race fetches everything once
/// at construction and works on its own snapshots afterwards.
pub trait EntityLookup {
    fn get_circuit(&self, circuit_id: u32) -> Option<TrackPars>;

    /// get_drivers returns all known drivers in entry order.
    fn get_drivers(&self) -> Vec<DriverPars>;

    fn get_car(&self, team_id: u32) -> Option<CarPars>;

    fn get_team_name(&self, _team_id: u32) -> Option<String> {
        None
    }
}

/// * `id` - Unique team id
/// * `name` - Team name, e.g. Ferrari
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct TeamPars {
    pub id: u32,
    pub name: String,
}

/// SimPars is used to store all other parameter structs, i.e. it is the content of a scenario
/// file.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct SimPars {
    pub race_pars: RacePars,
    pub circuits: Vec<TrackPars>,
    #[serde(default)]
    pub teams: Vec<TeamPars>,
    pub drivers: Vec<DriverPars>,
    pub cars: Vec<CarPars>,
}

impl EntityLookup for SimPars {
    fn get_circuit(&self, circuit_id: u32) -> Option<TrackPars> {
        self.circuits.iter().find(|c| c.id == circuit_id).cloned()
    }

    fn get_drivers(&self) -> Vec<DriverPars> {
        self.drivers.to_owned()
    }

    fn get_car(&self, team_id: u32) -> Option<CarPars> {
        self.cars.iter().find(|c| c.team_id == team_id).cloned()
    }

    fn get_team_name(&self, team_id: u32) -> Option<String> {
        self.teams
            .iter()
            .find(|t| t.id == team_id)
            .map(|t| t.name.to_owned())
    }
}

fn read_json<T: DeserializeOwned>(filepath: &Path, what: &str) -> anyhow::Result<T> {
    let fh = OpenOptions::new()
        .read(true)
        .open(filepath)
        .context(format!("Failed to open {} {}!", what, filepath.display()))?;
    let pars = serde_json::from_reader(&fh)
        .context(format!("Failed to parse {} {}!", what, filepath.display()))?;
    Ok(pars)
}

/// read_sim_pars reads the JSON file and decodes the JSON string into the simulation parameters
/// struct.
pub fn read_sim_pars(filepath: &Path) -> anyhow::Result<SimPars> {
    read_json(filepath, "parameter file")
}

/// read_sim_constants reads the tuning constants. Missing keys keep their default values.
pub fn read_sim_constants(filepath: &Path) -> anyhow::Result<SimConstants> {
    let sim_consts: SimConstants = read_json(filepath, "simulation constants file")?;
    sim_consts
        .validate()
        .context(format!("Invalid simulation constants in {}!", filepath.display()))?;
    Ok(sim_consts)
}
