use crate::core::car::CarPars;
use crate::error::ConstructionError;
use serde::{Deserialize, Serialize};

/// * `id` - Unique circuit id
/// * `name` - Circuit name, e.g. Monza
/// * `country` - Country of the circuit
/// * `lap_count` - Number of race laps
/// * `power_weight` - Influence of the engine on the car performance
/// * `aero_weight` - Influence of the aerodynamics on the car performance
/// * `handling_weight` - Influence of the chassis on the car performance (the three weights
/// nominally sum up to ~1.0)
/// * `tire_wear_factor` - (0-1) Scales the tire wear per lap
/// * `sc_probability` - (0-1) Safety car probability (divided by `sc_div` per lap)
/// * `rain_probability` - (0-1) Rain probability (divided by `rain_div` per lap)
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct TrackPars {
    pub id: u32,
    pub name: String,
    #[serde(default)]
    pub country: String,
    #[serde(default = "default_lap_count")]
    pub lap_count: u32,
    #[serde(default = "default_weight")]
    pub power_weight: f64,
    #[serde(default = "default_weight")]
    pub aero_weight: f64,
    #[serde(default = "default_weight")]
    pub handling_weight: f64,
    #[serde(default = "default_tire_wear_factor")]
    pub tire_wear_factor: f64,
    #[serde(default = "default_sc_probability")]
    pub sc_probability: f64,
    #[serde(default = "default_rain_probability")]
    pub rain_probability: f64,
}

fn default_lap_count() -> u32 {
    50
}

fn default_weight() -> f64 {
    0.33
}

fn default_tire_wear_factor() -> f64 {
    0.5
}

fn default_sc_probability() -> f64 {
    0.1
}

fn default_rain_probability() -> f64 {
    0.05
}

/// Track is the validated, immutable per-race snapshot of a circuit.
#[derive(Debug, Clone, PartialEq)]
pub struct Track {
    pub id: u32,
    pub name: String,
    pub lap_count: u32,
    pub power_weight: f64,
    pub aero_weight: f64,
    pub handling_weight: f64,
    pub tire_wear_factor: f64,
    pub sc_probability: f64,
    pub rain_probability: f64,
}

impl Track {
    pub fn new(track_pars: &TrackPars) -> Result<Track, ConstructionError> {
        if track_pars.lap_count == 0 {
            return Err(ConstructionError::invalid(
                format!("circuit {} lap_count", track_pars.id),
                0.0,
                "must be positive",
            ));
        }

        let weights = [
            ("power_weight", track_pars.power_weight),
            ("aero_weight", track_pars.aero_weight),
            ("handling_weight", track_pars.handling_weight),
        ];
        for (field, value) in weights.iter() {
            if !(value.is_finite() && *value >= 0.0) {
                return Err(ConstructionError::invalid(
                    format!("circuit {} {}", track_pars.id, field),
                    *value,
                    "must be non-negative",
                ));
            }
        }

        let fractions = [
            ("tire_wear_factor", track_pars.tire_wear_factor),
            ("sc_probability", track_pars.sc_probability),
            ("rain_probability", track_pars.rain_probability),
        ];
        for (field, value) in fractions.iter() {
            if !(0.0..=1.0).contains(value) {
                return Err(ConstructionError::invalid(
                    format!("circuit {} {}", track_pars.id, field),
                    *value,
                    "must be in [0, 1]",
                ));
            }
        }

        Ok(Track {
            id: track_pars.id,
            name: track_pars.name.to_owned(),
            lap_count: track_pars.lap_count,
            power_weight: track_pars.power_weight,
            aero_weight: track_pars.aero_weight,
            handling_weight: track_pars.handling_weight,
            tire_wear_factor: track_pars.tire_wear_factor,
            sc_probability: track_pars.sc_probability,
            rain_probability: track_pars.rain_probability,
        })
    }

    /// calc_car_adaptation returns how well the car suits this circuit.
    pub fn calc_car_adaptation(&self, car_pars: &CarPars) -> f64 {
        car_pars.engine * self.power_weight
            + car_pars.aero * self.aero_weight
            + car_pars.chassis * self.handling_weight
    }
}
