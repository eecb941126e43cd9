use crate::error::ConstructionError;
use serde::{Deserialize, Serialize};

/// SimConstants contains all balancing constants of the simulation. Every field has a default, a
/// constants file therefore only has to contain the values that should be overridden.
///
/// Performance scores (PS) are abstract, unit-less points; higher is better.
///
/// * `w_quali_car` / `w_quali_driver` - Weights of car adaptation and driver rendering in the
/// qualifying score
/// * `w_driver_speed` / `w_driver_consistency` / `w_driver_experience` - Weights of the driver
/// attributes in the driver rendering
/// * `quali_variability_div` - Divisor applied to the random qualifying factor
/// * `mod_attack` / `mod_conservative` - (PS) Pace mode modifiers
/// * `attack_min_battery` - (%) Battery level required for attack mode
/// * `mod_drs` / `mod_dirty_air` - (PS) Traffic modifiers
/// * `drs_gap` / `dirty_air_gap` - (s) Gap thresholds to the car ahead
/// * `drs_allowed_lap` - First lap in which the DRS bonus is granted
/// * `k_fuel_penalty` - (PS/kg) Score loss per kg of fuel
/// * `k_tire_penalty` - (PS/%^2) Quadratic score loss due to tire wear
/// * `p_driver_error_base` / `driver_error_div` - Driver error probability parameters
/// * `driver_error_factor` - Score factor applied after a driver error
/// * `p_mech_failure_base` / `mech_failure_div` - Mechanical failure probability parameters
/// * `sc_div` / `rain_div` - Divisors applied to the circuit's safety car and rain probabilities
/// * `sc_laps` - Number of laps the safety car stays out
/// * `m_fuel_start` / `b_fuel_per_lap` - (kg) Fuel mass at the start and consumption per lap
/// * `dnf_on_empty_tank` - Retire cars that run out of fuel
/// * `tire_wear_per_lap` - (%) Tire wear per lap before scaling with the circuit wear factor
/// * `pit_wear_threshold` - (%) Tire wear above which a car pits on its own
/// * `battery_start` / `battery_attack` / `battery_conservative` / `battery_normal` - (%) Battery
/// level at the start and change per lap in the pace modes
/// * `t_pit_base` - (s) Pit stop time loss without the tire change
/// * `t_pit_tirechange_min` / `t_pit_tirechange_max` - (s) Range of the tire change duration
/// * `t_lap_base` - (s) Lap time for a score of zero
/// * `s_score` - (s/PS) Lap time sensitivity to the score
/// * `t_lap_noise` - (s) Half width of the uniform lap time noise
/// * `t_lap_min` - (s) Lower bound of any lap time
/// * `event_log_window` - Number of event lines included in a status report
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct SimConstants {
    pub w_quali_car: f64,
    pub w_quali_driver: f64,
    pub w_driver_speed: f64,
    pub w_driver_consistency: f64,
    pub w_driver_experience: f64,
    pub quali_variability_div: f64,
    pub mod_attack: f64,
    pub mod_conservative: f64,
    pub attack_min_battery: f64,
    pub mod_drs: f64,
    pub mod_dirty_air: f64,
    pub drs_gap: f64,
    pub dirty_air_gap: f64,
    pub drs_allowed_lap: u32,
    pub k_fuel_penalty: f64,
    pub k_tire_penalty: f64,
    pub p_driver_error_base: f64,
    pub driver_error_div: f64,
    pub driver_error_factor: f64,
    pub p_mech_failure_base: f64,
    pub mech_failure_div: f64,
    pub sc_div: f64,
    pub rain_div: f64,
    pub sc_laps: u32,
    pub m_fuel_start: f64,
    pub b_fuel_per_lap: f64,
    pub dnf_on_empty_tank: bool,
    pub tire_wear_per_lap: f64,
    pub pit_wear_threshold: f64,
    pub battery_start: f64,
    pub battery_attack: f64,
    pub battery_conservative: f64,
    pub battery_normal: f64,
    pub t_pit_base: f64,
    pub t_pit_tirechange_min: f64,
    pub t_pit_tirechange_max: f64,
    pub t_lap_base: f64,
    pub s_score: f64,
    pub t_lap_noise: f64,
    pub t_lap_min: f64,
    pub event_log_window: usize,
}

impl Default for SimConstants {
    fn default() -> Self {
        SimConstants {
            w_quali_car: 0.70,
            w_quali_driver: 0.30,
            w_driver_speed: 0.6,
            w_driver_consistency: 0.2,
            w_driver_experience: 0.2,
            quali_variability_div: 10.0,
            mod_attack: 7.0,
            mod_conservative: -5.0,
            attack_min_battery: 10.0,
            mod_drs: 8.0,
            mod_dirty_air: -3.0,
            drs_gap: 1.0,
            dirty_air_gap: 1.5,
            drs_allowed_lap: 1,
            k_fuel_penalty: 0.02,
            k_tire_penalty: 0.05,
            p_driver_error_base: 0.01,
            driver_error_div: 20.0,
            driver_error_factor: 0.8,
            p_mech_failure_base: 0.005,
            mech_failure_div: 50.0,
            sc_div: 10.0,
            rain_div: 10.0,
            sc_laps: 3,
            m_fuel_start: 110.0,
            b_fuel_per_lap: 1.8,
            dnf_on_empty_tank: false,
            tire_wear_per_lap: 1.5,
            pit_wear_threshold: 70.0,
            battery_start: 100.0,
            battery_attack: -10.0,
            battery_conservative: 5.0,
            battery_normal: 2.0,
            t_pit_base: 22.0,
            t_pit_tirechange_min: 2.5,
            t_pit_tirechange_max: 4.5,
            t_lap_base: 100.0,
            s_score: 0.1,
            t_lap_noise: 0.05,
            t_lap_min: 60.0,
            event_log_window: 10,
        }
    }
}

impl SimConstants {
    /// validate checks the constants that would otherwise make random draws or time conversions
    /// fail during the race.
    pub fn validate(&self) -> Result<(), ConstructionError> {
        let positive = [
            ("quali_variability_div", self.quali_variability_div),
            ("driver_error_div", self.driver_error_div),
            ("mech_failure_div", self.mech_failure_div),
            ("sc_div", self.sc_div),
            ("rain_div", self.rain_div),
        ];
        for (field, value) in positive.iter() {
            if !(value.is_finite() && *value > 0.0) {
                return Err(ConstructionError::invalid(*field, *value, "must be positive"));
            }
        }

        let non_negative = [
            ("m_fuel_start", self.m_fuel_start),
            ("b_fuel_per_lap", self.b_fuel_per_lap),
            ("tire_wear_per_lap", self.tire_wear_per_lap),
            ("t_pit_base", self.t_pit_base),
            ("t_pit_tirechange_min", self.t_pit_tirechange_min),
            ("t_lap_noise", self.t_lap_noise),
            ("t_lap_min", self.t_lap_min),
        ];
        for (field, value) in non_negative.iter() {
            if !(value.is_finite() && *value >= 0.0) {
                return Err(ConstructionError::invalid(*field, *value, "must be non-negative"));
            }
        }

        if !(self.t_pit_tirechange_max >= self.t_pit_tirechange_min) {
            return Err(ConstructionError::invalid(
                "t_pit_tirechange_max",
                self.t_pit_tirechange_max,
                "must not be smaller than t_pit_tirechange_min",
            ));
        }

        if !(0.0..=100.0).contains(&self.battery_start) {
            return Err(ConstructionError::invalid(
                "battery_start",
                self.battery_start,
                "must be in [0, 100]",
            ));
        }

        Ok(())
    }
}
