use crate::core::car::Car;
use crate::core::driver::Driver;
use crate::core::qualifying::simulate_qualifying;
use crate::core::sim_constants::SimConstants;
use crate::core::track::Track;
use crate::error::{CommandError, ConstructionError, SimError};
use crate::interfaces::race_status::{
    CompetitorStatus, RaceStatus, StrategyAction, StrategyCommand, TrackState,
};
use crate::post::race_result::{
    CarDriverPair, ClassificationEntry, EventKind, RaceEvent, RaceResult,
};
use crate::pre::read_sim_pars::EntityLookup;
use helpers::general::{argsort, SortOrder};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Bernoulli, Distribution};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// * `circuit_id` - Circuit the race takes place on
/// * `seed` - Seed of the race's random number generator
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RacePars {
    pub circuit_id: u32,
    #[serde(default)]
    pub seed: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RacePhase {
    NotStarted,
    Qualifying,
    Racing,
    Finished,
    Cancelled,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WeatherState {
    Dry,
    Rain,
}

/// The safety car only sets the track state. It does not bunch up the field.
#[derive(Debug, Clone, Default)]
pub struct SafetyCar {
    pub active: bool,
    pub laps_remaining: u32,
    pub deployments: u32,
}

#[derive(Debug)]
pub struct Race {
    pub track: Track,
    pub tot_no_laps: u32,
    pub weather_state: WeatherState,
    pub safety_car: SafetyCar,
    phase: RacePhase,
    cur_lap: u32,
    sim_consts: SimConstants,
    seed: u64,
    rng: StdRng,
    cars_list: Vec<Car>,
    order: Vec<usize>, // indices into cars_list, race leader first
    events: Vec<RaceEvent>,
    version: u64,
}

impl Race {
    /// new creates a race from already validated snapshots. The order of cars_list is the entry
    /// order, which breaks ties in qualifying.
    pub fn new(
        track: Track,
        mut cars_list: Vec<Car>,
        sim_consts: SimConstants,
        seed: u64,
    ) -> Result<Race, ConstructionError> {
        sim_consts.validate()?;

        if cars_list.is_empty() {
            return Err(ConstructionError::NoCompetitors);
        }

        let mut driver_ids = HashSet::with_capacity(cars_list.len());
        for car in cars_list.iter() {
            if !driver_ids.insert(car.driver.id) {
                return Err(ConstructionError::invalid(
                    "driver id",
                    car.driver.id as f64,
                    "must be unique within a race",
                ));
            }
        }

        for (i, car) in cars_list.iter_mut().enumerate() {
            car.position = i as u32 + 1;
        }
        let order = (0..cars_list.len()).collect();

        Ok(Race {
            tot_no_laps: track.lap_count,
            track,
            phase: RacePhase::NotStarted,
            cur_lap: 0,
            weather_state: WeatherState::Dry,
            safety_car: SafetyCar::default(),
            sim_consts,
            seed,
            rng: StdRng::seed_from_u64(seed),
            cars_list,
            order,
            events: Vec::new(),
            version: 0,
        })
    }

    /// from_lookup fetches the circuit, drivers and cars once from the entity lookup and pairs
    /// every driver with the car of their team. Drivers without a team are not entered, drivers
    /// whose team has no car are skipped with a warning.
    pub fn from_lookup<L: EntityLookup + ?Sized>(
        lookup: &L,
        circuit_id: u32,
        sim_consts: SimConstants,
        seed: u64,
    ) -> Result<Race, ConstructionError> {
        let track_pars = lookup
            .get_circuit(circuit_id)
            .ok_or(ConstructionError::CircuitNotFound(circuit_id))?;
        let track = Track::new(&track_pars)?;

        let mut cars_list = Vec::new();
        for driver_pars in lookup.get_drivers().iter() {
            let team_id = match driver_pars.team_id {
                Some(team_id) => team_id,
                None => continue,
            };

            let car_pars = match lookup.get_car(team_id) {
                Some(car_pars) => car_pars,
                None => {
                    warn!(
                        "Driver {} ({}) has no car assigned, skipping",
                        driver_pars.name, driver_pars.id
                    );
                    continue;
                }
            };
            car_pars.validate()?;

            let driver = Driver::new(driver_pars)?;
            let position = cars_list.len() as u32 + 1;
            cars_list.push(Car::new(
                driver,
                car_pars,
                lookup.get_team_name(team_id),
                position,
                &sim_consts,
            ));
        }

        info!(
            "Race on {} with {} competitors over {} laps (seed {})",
            track.name,
            cars_list.len(),
            track.lap_count,
            seed
        );

        Race::new(track, cars_list, sim_consts, seed)
    }

    // ---------------------------------------------------------------------------------------------
    // MAIN METHODS --------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// start runs the qualifying if it has not been done yet and puts the race into the racing
    /// phase.
    pub fn start(&mut self) -> Result<(), SimError> {
        match self.phase {
            RacePhase::NotStarted => {
                self.phase = RacePhase::Qualifying;
                debug!("Starting qualifying simulation...");

                self.order = simulate_qualifying(
                    &mut self.cars_list,
                    &self.track,
                    &self.sim_consts,
                    &mut self.rng,
                );
                self.log_event(
                    0,
                    EventKind::QualifyingFinished,
                    None,
                    "Qualifying finished. Grid set.".to_owned(),
                );

                self.phase = RacePhase::Racing;
                self.version += 1;
                Ok(())
            }
            RacePhase::Qualifying | RacePhase::Racing => Ok(()),
            RacePhase::Finished | RacePhase::Cancelled => Err(SimError::AlreadyTerminal),
        }
    }

    /// simulate_lap simulates one lap for all cars: global events first, then every car in the
    /// current race order, then the standings are updated.
    pub fn simulate_lap(&mut self) -> Result<(), SimError> {
        self.start()?;

        self.cur_lap += 1;
        let lap = self.cur_lap;
        self.log_event(lap, EventKind::LapStart, None, format!("--- LAP {} ---", lap));

        self.handle_global_events()?;

        // traffic is evaluated on the standings at the end of the previous lap
        let racetimes_prev: Vec<f64> = self
            .order
            .iter()
            .map(|&idx| self.cars_list[idx].get_racetime())
            .collect();

        for pos_idx in 0..self.order.len() {
            let idx = self.order[pos_idx];

            if !self.cars_list[idx].on_track() {
                continue;
            }

            self.handle_strategy(idx);

            if self.cars_list[idx].in_pit_lane() {
                self.simulate_pitstop(idx)?;
            } else {
                let t_gap_front = if pos_idx > 0 {
                    Some(racetimes_prev[pos_idx] - racetimes_prev[pos_idx - 1])
                } else {
                    None
                };
                self.simulate_lap_for_car(idx, t_gap_front)?;
            }
        }

        self.update_positions();
        self.version += 1;

        if lap >= self.tot_no_laps {
            self.phase = RacePhase::Finished;
            self.log_event(lap, EventKind::RaceFinished, None, "RACE FINISHED!".to_owned());
            info!("Race on {} finished after {} laps", self.track.name, lap);
        }

        Ok(())
    }

    /// run_to_completion simulates all remaining laps.
    pub fn run_to_completion(&mut self) -> Result<(), SimError> {
        while !self.is_terminal() {
            self.simulate_lap()?;
        }
        Ok(())
    }

    /// cancel stops the race after the last completed lap. All totals are left intact.
    pub fn cancel(&mut self) {
        if self.is_terminal() {
            return;
        }
        self.phase = RacePhase::Cancelled;
        self.log_event(
            self.cur_lap,
            EventKind::RaceCancelled,
            None,
            format!("L{}: Race cancelled.", self.cur_lap),
        );
        self.version += 1;
        warn!("Race on {} cancelled after lap {}", self.track.name, self.cur_lap);
    }

    // ---------------------------------------------------------------------------------------------
    // RACE SIMULATOR PARTS ------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// handle_global_events handles the safety car and the weather.
    fn handle_global_events(&mut self) -> Result<(), SimError> {
        let lap = self.cur_lap;

        if self.safety_car.active {
            self.safety_car.laps_remaining = self.safety_car.laps_remaining.saturating_sub(1);
            if self.safety_car.laps_remaining == 0 {
                self.safety_car.active = false;
                self.log_event(
                    lap,
                    EventKind::SafetyCarIn,
                    None,
                    format!("L{}: Safety car in this lap, racing resumes.", lap),
                );
            }
        }

        let p_sc = self.track.sc_probability / self.sim_consts.sc_div;
        if self.draw_event(p_sc)? {
            if !self.safety_car.active {
                self.safety_car.deployments += 1;
                self.log_event(
                    lap,
                    EventKind::SafetyCarDeployed,
                    None,
                    format!("L{}: SAFETY CAR! SAFETY CAR!", lap),
                );
            }
            self.safety_car.active = true;
            self.safety_car.laps_remaining = self.sim_consts.sc_laps.max(1);
        }

        if self.weather_state == WeatherState::Dry {
            let p_rain = self.track.rain_probability / self.sim_consts.rain_div;
            if self.draw_event(p_rain)? {
                self.weather_state = WeatherState::Rain;
                self.log_event(
                    lap,
                    EventKind::RainStart,
                    None,
                    format!("L{}: Rain starts to fall.", lap),
                );
            }
        }

        Ok(())
    }

    /// handle_strategy checks if the car enters the pit lane in this lap.
    fn handle_strategy(&mut self, idx: usize) {
        let lap = self.cur_lap;
        let threshold = self.sim_consts.pit_wear_threshold;
        let car = &mut self.cars_list[idx];

        let requested = car.pit_requested();
        let tire_wear = car.get_tireset().get_wear();

        if car.sh.check_state_transition(tire_wear, threshold) {
            let driver_id = car.driver.id;
            let message = format!("L{}: {} enters the pits.", lap, car.driver.name);
            if requested {
                debug!("{} pits on team request", car.driver.name);
            } else {
                debug!("{} pits due to tire wear ({:.1}%)", car.driver.name, tire_wear);
            }
            self.log_event(lap, EventKind::PitEntry, Some(driver_id), message);
        }
    }

    /// simulate_pitstop replaces the lap of a car in the pit lane by the pit stop time loss.
    fn simulate_pitstop(&mut self, idx: usize) -> Result<(), SimError> {
        let t_tirechange = self.rng.gen_range(
            self.sim_consts.t_pit_tirechange_min..=self.sim_consts.t_pit_tirechange_max,
        );
        let t_pit = self.sim_consts.t_pit_base + t_tirechange;

        let car = &mut self.cars_list[idx];
        car.perform_pitstop(self.cur_lap, t_pit)?;
        debug!("{} left the pits after {:.3}s", car.driver.name, t_pit);
        Ok(())
    }

    /// simulate_lap_for_car is the core of the simulation: it sums up the performance score of
    /// the lap, applies random events, converts the score into a lap time and updates the car.
    fn simulate_lap_for_car(&mut self, idx: usize, t_gap_front: Option<f64>) -> Result<(), SimError> {
        let lap = self.cur_lap;
        let mod_traffic = self.calc_traffic_modifier(t_gap_front);

        let car = &mut self.cars_list[idx];
        let mod_tires = car.calc_tire_modifier(&self.sim_consts);
        let mod_fuel = car.calc_fuel_modifier(&self.sim_consts);
        let mod_pace = car.calc_pace_modifier(&self.sim_consts);
        let ps_lap = car.get_base_score() + mod_tires + mod_fuel + mod_pace + mod_traffic;

        let ps_final = self.check_driver_events(idx, ps_lap)?;
        let driver_id = self.cars_list[idx].driver.id;
        if !ps_final.is_finite() {
            return Err(SimError::NonFiniteState {
                quantity: "performance score",
                driver_id,
                lap,
            });
        }

        let t_noise = self
            .rng
            .gen_range(-self.sim_consts.t_lap_noise..=self.sim_consts.t_lap_noise);
        let t_lap = calc_laptime(ps_final, t_noise, &self.sim_consts);
        if !t_lap.is_finite() {
            return Err(SimError::NonFiniteState {
                quantity: "lap time",
                driver_id,
                lap,
            });
        }

        let car = &mut self.cars_list[idx];
        car.add_laptime(t_lap);

        if !car.on_track() {
            return Ok(());
        }

        if car.drive_lap(self.track.tire_wear_factor, &self.sim_consts) {
            let name = car.driver.name.to_owned();
            let retire = self.sim_consts.dnf_on_empty_tank;
            let message = if retire {
                self.cars_list[idx].retire(lap);
                format!("L{}: {} has run out of fuel and retires!", lap, name)
            } else {
                format!("L{}: {} has run out of fuel!", lap, name)
            };
            warn!("Remaining fuel mass of {} is zero", name);
            self.log_event(lap, EventKind::OutOfFuel, Some(driver_id), message);
        }

        Ok(())
    }

    /// calc_traffic_modifier returns the DRS bonus or the dirty air penalty depending on the gap
    /// to the car ahead. The leader has no car ahead.
    fn calc_traffic_modifier(&self, t_gap_front: Option<f64>) -> f64 {
        let t_gap = match t_gap_front {
            Some(t_gap) => t_gap,
            None => return 0.0,
        };

        if t_gap < self.sim_consts.drs_gap && self.cur_lap >= self.sim_consts.drs_allowed_lap {
            self.sim_consts.mod_drs
        } else if t_gap < self.sim_consts.dirty_air_gap {
            self.sim_consts.mod_dirty_air
        } else {
            0.0
        }
    }

    /// check_driver_events checks for driver errors and mechanical failures. A driver error ends
    /// the check, i.e. a car cannot suffer both in the same lap.
    fn check_driver_events(&mut self, idx: usize, ps_lap: f64) -> Result<f64, SimError> {
        let lap = self.cur_lap;

        let p_error = self.cars_list[idx]
            .driver
            .calc_error_probability(&self.sim_consts);
        if self.draw_event(p_error)? {
            let driver = &self.cars_list[idx].driver;
            let (driver_id, message) = (
                driver.id,
                format!("L{}: {} makes a mistake and loses time!", lap, driver.name),
            );
            self.log_event(lap, EventKind::DriverError, Some(driver_id), message);
            return Ok(ps_lap * self.sim_consts.driver_error_factor);
        }

        let p_failure = self.cars_list[idx]
            .car_pars
            .calc_failure_probability(&self.sim_consts);
        if self.draw_event(p_failure)? {
            let car = &mut self.cars_list[idx];
            car.retire(lap);
            let (driver_id, message) = (
                car.driver.id,
                format!(
                    "L{}: MECHANICAL FAILURE for {}! Out of the race!",
                    lap, car.driver.name
                ),
            );
            info!("{} retired in lap {} (mechanical failure)", car.driver.name, lap);
            self.log_event(lap, EventKind::MechanicalFailure, Some(driver_id), message);
            return Ok(0.0);
        }

        Ok(ps_lap)
    }

    /// update_positions sorts the cars on track by race time. Retired cars keep their relative
    /// order behind them.
    fn update_positions(&mut self) {
        let cars_list = &self.cars_list;
        let (on_track, retired): (Vec<usize>, Vec<usize>) = self
            .order
            .iter()
            .copied()
            .partition(|&idx| cars_list[idx].on_track());

        let racetimes: Vec<f64> = on_track
            .iter()
            .map(|&idx| cars_list[idx].get_racetime())
            .collect();

        self.order = argsort(&racetimes, SortOrder::Ascending)
            .into_iter()
            .map(|i| on_track[i])
            .chain(retired.into_iter())
            .collect();

        for (i, &idx) in self.order.iter().enumerate() {
            self.cars_list[idx].position = i as u32 + 1;
        }
    }

    // ---------------------------------------------------------------------------------------------
    // COMMANDS ------------------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    /// update_strategy applies a pit wall command given as text ("RequestPit", "Normal",
    /// "Attack", "Conservative") to a driver. Returns a confirmation message.
    pub fn update_strategy(&mut self, driver_id: u32, action: &str) -> Result<String, CommandError> {
        self.check_accepts_commands()?;
        let idx = self.find_car_idx(driver_id)?;
        let action: StrategyAction = action.parse()?;
        self.apply_strategy(idx, action)
    }

    /// apply_command applies an already parsed pit wall command.
    pub fn apply_command(&mut self, cmd: &StrategyCommand) -> Result<String, CommandError> {
        self.check_accepts_commands()?;
        let idx = self.find_car_idx(cmd.driver_id)?;
        self.apply_strategy(idx, cmd.action)
    }

    fn apply_strategy(&mut self, idx: usize, action: StrategyAction) -> Result<String, CommandError> {
        let lap = self.cur_lap;
        let car = &mut self.cars_list[idx];

        if !car.on_track() {
            return Err(CommandError::CompetitorRetired(car.driver.id));
        }

        let message = match action {
            StrategyAction::RequestPit => {
                if car.sh.request_pit() {
                    format!("Pit stop requested for {}", car.driver.name)
                } else {
                    format!("{} is already in the pit lane", car.driver.name)
                }
            }
            StrategyAction::SetPace(pace_mode) => {
                car.set_pace_mode(pace_mode);
                format!("Pace of {} set to {}", car.driver.name, pace_mode)
            }
        };

        let driver_id = car.driver.id;
        self.log_event(
            lap,
            EventKind::StrategyChange,
            Some(driver_id),
            format!("L{}: {}.", lap, message),
        );
        self.version += 1;
        Ok(message)
    }

    fn check_accepts_commands(&self) -> Result<(), CommandError> {
        if self.is_terminal() {
            return Err(CommandError::RaceFinished);
        }
        Ok(())
    }

    fn find_car_idx(&self, driver_id: u32) -> Result<usize, CommandError> {
        self.cars_list
            .iter()
            .position(|car| car.driver.id == driver_id)
            .ok_or(CommandError::CompetitorNotFound(driver_id))
    }

    // ---------------------------------------------------------------------------------------------
    // METHODS (HELPERS) ---------------------------------------------------------------------------
    // ---------------------------------------------------------------------------------------------

    fn draw_event(&mut self, p: f64) -> Result<bool, SimError> {
        if !p.is_finite() {
            return Err(SimError::InvalidProbability(p));
        }
        let bernoulli =
            Bernoulli::new(p.clamp(0.0, 1.0)).map_err(|_| SimError::InvalidProbability(p))?;
        Ok(bernoulli.sample(&mut self.rng))
    }

    fn log_event(&mut self, lap: u32, kind: EventKind, driver_id: Option<u32>, message: String) {
        debug!("{}", message);
        self.events.push(RaceEvent {
            lap,
            kind,
            driver_id,
            message,
        });
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.phase, RacePhase::Finished | RacePhase::Cancelled)
    }

    pub fn get_track_state(&self) -> TrackState {
        if self.safety_car.active {
            TrackState::SafetyCar
        } else {
            match self.weather_state {
                WeatherState::Dry => TrackState::Dry,
                WeatherState::Rain => TrackState::Rain,
            }
        }
    }

    pub fn get_cars(&self) -> &[Car] {
        &self.cars_list
    }

    pub fn get_car(&self, driver_id: u32) -> Option<&Car> {
        self.cars_list.iter().find(|car| car.driver.id == driver_id)
    }

    /// get_order returns the cars in race order.
    pub fn get_order(&self) -> Vec<&Car> {
        self.order.iter().map(|&idx| &self.cars_list[idx]).collect()
    }

    pub fn get_events(&self) -> &[RaceEvent] {
        &self.events
    }

    pub fn get_phase(&self) -> RacePhase {
        self.phase
    }

    /// get_cur_lap returns the number of completed laps.
    pub fn get_cur_lap(&self) -> u32 {
        self.cur_lap
    }

    pub fn get_status(&self) -> RaceStatus {
        let competitors = self
            .order
            .iter()
            .map(|&idx| {
                let car = &self.cars_list[idx];
                CompetitorStatus {
                    position: car.position,
                    driver_id: car.driver.id,
                    driver_name: car.driver.name.to_owned(),
                    team_id: car.driver.team_id,
                    team_name: car.team_name.to_owned(),
                    racetime: car.get_racetime(),
                    tire_wear: car.get_tireset().get_wear(),
                    tire_compound: car.get_tireset().compound,
                    fuel: car.get_fuel(),
                    battery: car.get_battery(),
                    pace_mode: car.get_pace_mode(),
                    on_track: car.on_track(),
                    in_pit: car.in_pit_lane(),
                }
            })
            .collect();

        let window = self.sim_consts.event_log_window;
        let skip = self.events.len().saturating_sub(window);
        let event_log = self.events[skip..]
            .iter()
            .map(|event| event.message.to_owned())
            .collect();

        RaceStatus {
            version: self.version,
            phase: self.phase,
            cur_lap: self.cur_lap,
            tot_no_laps: self.tot_no_laps,
            track_state: self.get_track_state(),
            finished: self.phase == RacePhase::Finished,
            competitors,
            event_log,
        }
    }

    pub fn get_race_result(&self) -> RaceResult {
        RaceResult {
            track_name: self.track.name.to_owned(),
            seed: self.seed,
            tot_no_laps: self.tot_no_laps,
            laps_completed: self.cur_lap,
            car_driver_pairs: self
                .cars_list
                .iter()
                .map(|car| CarDriverPair {
                    driver_id: car.driver.id,
                    driver_name: car.driver.name.to_owned(),
                    team_id: car.driver.team_id,
                })
                .collect(),
            laptimes: self
                .cars_list
                .iter()
                .map(|car| car.get_laptimes().to_vec())
                .collect(),
            racetimes: self
                .cars_list
                .iter()
                .map(|car| car.get_racetimes().to_vec())
                .collect(),
            pit_laps: self
                .cars_list
                .iter()
                .map(|car| car.get_pit_laps().to_vec())
                .collect(),
            classification: self
                .order
                .iter()
                .map(|&idx| {
                    let car = &self.cars_list[idx];
                    ClassificationEntry {
                        position: car.position,
                        driver_id: car.driver.id,
                        driver_name: car.driver.name.to_owned(),
                        status: car.status,
                        laps: car.get_laptimes().len() as u32,
                        racetime: car.get_racetime(),
                    }
                })
                .collect(),
            events: self.events.to_owned(),
        }
    }
}

/// calc_laptime converts a performance score into a lap time. A higher score gives a lower lap
/// time; the result never drops below the minimum lap time.
pub fn calc_laptime(ps: f64, t_noise: f64, sim_consts: &SimConstants) -> f64 {
    (sim_consts.t_lap_base - ps * sim_consts.s_score + t_noise).max(sim_consts.t_lap_min)
}
