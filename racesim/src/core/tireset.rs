use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Compound {
    Soft,
    Medium,
    Hard,
}

impl Default for Compound {
    fn default() -> Self {
        Compound::Medium
    }
}

impl fmt::Display for Compound {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Compound::Soft => "Soft",
            Compound::Medium => "Medium",
            Compound::Hard => "Hard",
        };
        write!(f, "{}", name)
    }
}

/// Tireset tracks the compound and the wear of the mounted set of tires.
///
/// * `compound` - Mounted compound
/// * `wear` - (%) Tire wear, always in [0, 100]
/// * `age_cur_stint` - (laps) Laps driven on this set
#[derive(Debug, Clone)]
pub struct Tireset {
    pub compound: Compound,
    wear: f64,
    age_cur_stint: u32,
}

impl Tireset {
    pub fn new(compound: Compound) -> Tireset {
        Tireset {
            compound,
            wear: 0.0,
            age_cur_stint: 0,
        }
    }

    /// drive_lap increases the tire age by one lap and adds the wear of that lap.
    pub fn drive_lap(&mut self, wear_per_lap: f64) {
        self.wear = (self.wear + wear_per_lap).clamp(0.0, 100.0);
        self.age_cur_stint += 1;
    }

    /// calc_score_penalty returns the (positive) score loss due to tire wear. The loss is
    /// quadratic, i.e. it compounds sharply when the wear approaches 100%.
    pub fn calc_score_penalty(&self, k_tire_penalty: f64) -> f64 {
        self.wear.powi(2) * k_tire_penalty
    }

    pub fn get_wear(&self) -> f64 {
        self.wear
    }

    pub fn get_age_cur_stint(&self) -> u32 {
        self.age_cur_stint
    }
}
