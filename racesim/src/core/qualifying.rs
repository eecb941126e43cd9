use crate::core::car::Car;
use crate::core::sim_constants::SimConstants;
use crate::core::track::Track;
use helpers::general::{argsort, SortOrder};
use rand::Rng;

/// calc_raw_quali_score returns the qualifying performance score of a car without the random
/// variability: 70% car adapted to the circuit, 30% driver.
pub fn calc_raw_quali_score(car: &Car, track: &Track, sim_consts: &SimConstants) -> f64 {
    let car_adaptation = track.calc_car_adaptation(&car.car_pars);
    let driver_rendering = car.driver.calc_rendering(sim_consts);

    car_adaptation * sim_consts.w_quali_car + driver_rendering * sim_consts.w_quali_driver
}

/// calc_quali_score adds the driver dependent random variability to the raw qualifying score.
pub fn calc_quali_score<R: Rng + ?Sized>(
    car: &Car,
    track: &Track,
    sim_consts: &SimConstants,
    rng: &mut R,
) -> f64 {
    let raw_score = calc_raw_quali_score(car, track, sim_consts);

    let variability = car.driver.calc_variability();
    let rng_factor = if variability > 0.0 {
        rng.gen_range(-variability..=variability)
    } else {
        0.0
    };

    raw_score + raw_score * (rng_factor / sim_consts.quali_variability_div)
}

/// simulate_qualifying sets the base performance score of every car and returns the starting
/// order as indices into cars. Equal scores keep the order of the cars list. The position of
/// every car is set according to its grid slot.
pub fn simulate_qualifying<R: Rng + ?Sized>(
    cars: &mut [Car],
    track: &Track,
    sim_consts: &SimConstants,
    rng: &mut R,
) -> Vec<usize> {
    let scores: Vec<f64> = cars
        .iter()
        .map(|car| calc_quali_score(car, track, sim_consts, rng))
        .collect();

    for (car, &score) in cars.iter_mut().zip(scores.iter()) {
        car.set_base_score(score);
    }

    let grid = argsort(&scores, SortOrder::Descending);
    for (i, &idx) in grid.iter().enumerate() {
        cars[idx].position = i as u32 + 1;
    }

    grid
}
