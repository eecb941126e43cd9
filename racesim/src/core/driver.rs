use crate::core::sim_constants::SimConstants;
use crate::error::ConstructionError;
use serde::{Deserialize, Serialize};

/// * `id` - Unique driver id
/// * `name` - Driver name, e.g. Max Verstappen
/// * `team_id` - Team of the driver, None for free agents (they are not entered into races)
/// * `speed` - (0-100) Raw one-lap speed
/// * `consistency` - (0-100) Ability to repeat lap times without mistakes
/// * `risk` - (0-100) Willingness to take risks
/// * `experience` - (0-100) Racing experience
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct DriverPars {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub team_id: Option<u32>,
    #[serde(default = "default_speed")]
    pub speed: f64,
    #[serde(default = "default_consistency")]
    pub consistency: f64,
    #[serde(default = "default_risk")]
    pub risk: f64,
    #[serde(default = "default_experience")]
    pub experience: f64,
}

fn default_speed() -> f64 {
    70.0
}

fn default_consistency() -> f64 {
    70.0
}

fn default_risk() -> f64 {
    30.0
}

fn default_experience() -> f64 {
    50.0
}

/// Driver is the immutable per-race snapshot of a driver.
#[derive(Debug, Clone, PartialEq)]
pub struct Driver {
    pub id: u32,
    pub name: String,
    pub team_id: Option<u32>,
    pub speed: f64,
    pub consistency: f64,
    pub risk: f64,
    pub experience: f64,
}

impl Driver {
    pub fn new(driver_pars: &DriverPars) -> Result<Driver, ConstructionError> {
        let attrs = [
            ("speed", driver_pars.speed),
            ("consistency", driver_pars.consistency),
            ("risk", driver_pars.risk),
            ("experience", driver_pars.experience),
        ];
        for (attr, value) in attrs.iter() {
            if !(0.0..=100.0).contains(value) {
                return Err(ConstructionError::invalid(
                    format!("driver {} {}", driver_pars.id, attr),
                    *value,
                    "must be in [0, 100]",
                ));
            }
        }

        Ok(Driver {
            id: driver_pars.id,
            name: driver_pars.name.to_owned(),
            team_id: driver_pars.team_id,
            speed: driver_pars.speed,
            consistency: driver_pars.consistency,
            risk: driver_pars.risk,
            experience: driver_pars.experience,
        })
    }

    /// calc_rendering returns the pure driver skill part of the qualifying score.
    pub fn calc_rendering(&self, sim_consts: &SimConstants) -> f64 {
        self.speed * sim_consts.w_driver_speed
            + self.consistency * sim_consts.w_driver_consistency
            + self.experience * sim_consts.w_driver_experience
    }

    /// calc_variability returns the half width of the random qualifying factor. Inconsistent and
    /// risky drivers vary a lot more.
    pub fn calc_variability(&self) -> f64 {
        (1.0 - self.consistency / 100.0) + self.risk / 100.0
    }

    /// calc_error_probability returns the per-lap probability of a driver error.
    pub fn calc_error_probability(&self, sim_consts: &SimConstants) -> f64 {
        (sim_consts.p_driver_error_base + self.calc_variability()) / sim_consts.driver_error_div
    }
}
