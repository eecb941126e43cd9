use crate::core::driver::Driver;
use crate::core::sim_constants::SimConstants;
use crate::core::state_handler::StateHandler;
use crate::core::tireset::{Compound, Tireset};
use crate::error::{ConstructionError, SimError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Car parameters as developed by the team.
/// * `team_id` - Team that owns the car (one car design per team)
/// * `engine` - (0-100) Engine power
/// * `aero` - (0-100) Aerodynamic efficiency
/// * `chassis` - (0-100) Chassis / handling quality
/// * `reliability` - (0-100) Reliability, lower values lead to more mechanical failures
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct CarPars {
    pub team_id: u32,
    #[serde(default = "default_rating")]
    pub engine: f64,
    #[serde(default = "default_rating")]
    pub aero: f64,
    #[serde(default = "default_rating")]
    pub chassis: f64,
    #[serde(default = "default_rating")]
    pub reliability: f64,
}

fn default_rating() -> f64 {
    50.0
}

impl CarPars {
    pub fn validate(&self) -> Result<(), ConstructionError> {
        let attrs = [
            ("engine", self.engine),
            ("aero", self.aero),
            ("chassis", self.chassis),
            ("reliability", self.reliability),
        ];
        for (attr, value) in attrs.iter() {
            if !(0.0..=100.0).contains(value) {
                return Err(ConstructionError::invalid(
                    format!("car of team {} {}", self.team_id, attr),
                    *value,
                    "must be in [0, 100]",
                ));
            }
        }
        Ok(())
    }

    /// calc_failure_probability returns the per-lap probability of a mechanical failure.
    pub fn calc_failure_probability(&self, sim_consts: &SimConstants) -> f64 {
        (sim_consts.p_mech_failure_base + (1.0 - self.reliability / 100.0))
            / sim_consts.mech_failure_div
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CarStatus {
    Running,
    DNF,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaceMode {
    Normal,
    Attack,
    Conservative,
}

impl Default for PaceMode {
    fn default() -> Self {
        PaceMode::Normal
    }
}

impl fmt::Display for PaceMode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            PaceMode::Normal => "Normal",
            PaceMode::Attack => "Attack",
            PaceMode::Conservative => "Conservative",
        };
        write!(f, "{}", name)
    }
}

/// Car holds the live state of one competitor (a driver and the car of their team) for the
/// duration of a race.
#[derive(Debug, Clone)]
pub struct Car {
    pub driver: Driver,
    pub car_pars: CarPars,
    pub team_name: Option<String>,
    pub status: CarStatus,
    pub position: u32,
    pub sh: StateHandler,
    base_score: f64,
    racetime: f64,
    m_fuel: f64,
    battery: f64,
    pace_mode: PaceMode,
    tireset: Tireset,
    laptimes: Vec<f64>,
    racetimes: Vec<f64>,
    pit_laps: Vec<u32>,
    retired_lap: Option<u32>,
}

impl Car {
    pub fn new(
        driver: Driver,
        car_pars: CarPars,
        team_name: Option<String>,
        position: u32,
        sim_consts: &SimConstants,
    ) -> Car {
        Car {
            driver,
            car_pars,
            team_name,
            status: CarStatus::Running,
            position,
            sh: StateHandler::default(),
            base_score: 0.0,
            racetime: 0.0,
            m_fuel: sim_consts.m_fuel_start,
            battery: sim_consts.battery_start,
            pace_mode: PaceMode::Normal,
            tireset: Tireset::new(Compound::Medium),
            laptimes: Vec::new(),
            racetimes: Vec::new(),
            pit_laps: Vec::new(),
            retired_lap: None,
        }
    }

    // ---------------------------------------------------------------------------------------------
    // SCORE MODIFIERS -----------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    pub fn calc_tire_modifier(&self, sim_consts: &SimConstants) -> f64 {
        -self.tireset.calc_score_penalty(sim_consts.k_tire_penalty)
    }

    pub fn calc_fuel_modifier(&self, sim_consts: &SimConstants) -> f64 {
        -(self.m_fuel * sim_consts.k_fuel_penalty)
    }

    /// calc_pace_modifier returns the score modifier of the current pace mode. Attack mode needs
    /// battery charge; without it the car falls back to normal mode for good.
    pub fn calc_pace_modifier(&mut self, sim_consts: &SimConstants) -> f64 {
        match self.pace_mode {
            PaceMode::Attack => {
                if self.battery > sim_consts.attack_min_battery {
                    sim_consts.mod_attack
                } else {
                    self.pace_mode = PaceMode::Normal;
                    0.0
                }
            }
            PaceMode::Conservative => sim_consts.mod_conservative,
            PaceMode::Normal => 0.0,
        }
    }

    // ---------------------------------------------------------------------------------------------
    // STATE UPDATES -------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    pub(crate) fn set_base_score(&mut self, base_score: f64) {
        self.base_score = base_score;
    }

    /// add_laptime books a lap time (driven lap or pit stop lap).
    pub(crate) fn add_laptime(&mut self, t_lap: f64) {
        self.racetime += t_lap;
        self.laptimes.push(t_lap);
        self.racetimes.push(self.racetime);
    }

    /// drive_lap updates tires, fuel and battery after a driven lap. Returns true if the fuel tank
    /// ran dry in this lap.
    pub(crate) fn drive_lap(&mut self, tire_wear_factor: f64, sim_consts: &SimConstants) -> bool {
        self.tireset
            .drive_lap(sim_consts.tire_wear_per_lap * tire_wear_factor);

        let had_fuel = self.m_fuel > 0.0;
        self.m_fuel = (self.m_fuel - sim_consts.b_fuel_per_lap).max(0.0);

        let battery_delta = match self.pace_mode {
            PaceMode::Attack => sim_consts.battery_attack,
            PaceMode::Conservative => sim_consts.battery_conservative,
            PaceMode::Normal => sim_consts.battery_normal,
        };
        self.battery = (self.battery + battery_delta).clamp(0.0, 100.0);

        had_fuel && self.m_fuel <= 0.0
    }

    /// perform_pitstop books the pit stop time, mounts a fresh set of hard tires and returns the
    /// car to the track for the next lap.
    pub(crate) fn perform_pitstop(&mut self, lap: u32, t_pit: f64) -> Result<(), SimError> {
        self.add_laptime(t_pit);
        self.tireset = Tireset::new(Compound::Hard);
        self.pit_laps.push(lap);
        self.sh.deact_pit()
    }

    pub(crate) fn retire(&mut self, lap: u32) {
        self.status = CarStatus::DNF;
        self.retired_lap = Some(lap);
    }

    pub(crate) fn set_pace_mode(&mut self, pace_mode: PaceMode) {
        self.pace_mode = pace_mode;
    }

    // ---------------------------------------------------------------------------------------------
    // GETTERS -------------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    pub fn on_track(&self) -> bool {
        self.status == CarStatus::Running
    }

    pub fn in_pit_lane(&self) -> bool {
        self.sh.in_pit_lane()
    }

    pub fn pit_requested(&self) -> bool {
        self.sh.pit_requested()
    }

    pub fn get_base_score(&self) -> f64 {
        self.base_score
    }

    pub fn get_racetime(&self) -> f64 {
        self.racetime
    }

    pub fn get_fuel(&self) -> f64 {
        self.m_fuel
    }

    pub fn get_battery(&self) -> f64 {
        self.battery
    }

    pub fn get_pace_mode(&self) -> PaceMode {
        self.pace_mode
    }

    pub fn get_tireset(&self) -> &Tireset {
        &self.tireset
    }

    pub fn get_laptimes(&self) -> &[f64] {
        &self.laptimes
    }

    pub fn get_racetimes(&self) -> &[f64] {
        &self.racetimes
    }

    pub fn get_pit_laps(&self) -> &[u32] {
        &self.pit_laps
    }

    pub fn get_retired_lap(&self) -> Option<u32> {
        self.retired_lap
    }
}
