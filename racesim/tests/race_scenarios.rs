use racesim::core::car::{CarPars, CarStatus, PaceMode};
use racesim::core::driver::DriverPars;
use racesim::core::race::{calc_laptime, Race, RacePars, RacePhase};
use racesim::core::sim_constants::SimConstants;
use racesim::core::tireset::Compound;
use racesim::core::track::TrackPars;
use racesim::error::{CommandError, ConstructionError};
use racesim::interfaces::race_status::TrackState;
use racesim::post::race_result::EventKind;
use racesim::pre::read_sim_pars::{SimPars, TeamPars};

fn scenario(no_drivers: u32, lap_count: u32) -> SimPars {
    SimPars {
        race_pars: RacePars {
            circuit_id: 1,
            seed: 42,
        },
        circuits: vec![TrackPars {
            id: 1,
            name: "Autodromo Test".to_owned(),
            country: "Italy".to_owned(),
            lap_count,
            power_weight: 0.4,
            aero_weight: 0.3,
            handling_weight: 0.3,
            tire_wear_factor: 1.0,
            sc_probability: 0.0,
            rain_probability: 0.0,
        }],
        teams: (1..=no_drivers)
            .map(|id| TeamPars {
                id,
                name: format!("Team {}", id),
            })
            .collect(),
        drivers: (1..=no_drivers)
            .map(|id| DriverPars {
                id,
                name: format!("Driver {}", id),
                team_id: Some(id),
                speed: 60.0 + 4.0 * id as f64,
                consistency: 70.0,
                risk: 30.0,
                experience: 50.0 + 3.0 * id as f64,
            })
            .collect(),
        cars: (1..=no_drivers)
            .map(|team_id| CarPars {
                team_id,
                engine: 70.0 + 2.0 * team_id as f64,
                aero: 75.0,
                chassis: 80.0 - team_id as f64,
                reliability: 95.0,
            })
            .collect(),
    }
}

/// Constants without random retirements and driver errors.
fn calm_consts() -> SimConstants {
    SimConstants {
        p_driver_error_base: 0.0,
        p_mech_failure_base: 0.0,
        ..SimConstants::default()
    }
}

fn calm_scenario(no_drivers: u32, lap_count: u32) -> SimPars {
    let mut sim_pars = scenario(no_drivers, lap_count);
    for driver in sim_pars.drivers.iter_mut() {
        driver.consistency = 100.0;
        driver.risk = 0.0;
    }
    for car in sim_pars.cars.iter_mut() {
        car.reliability = 100.0;
    }
    sim_pars
}

#[test]
fn same_seed_reproduces_the_race() {
    let sim_pars = scenario(3, 5);

    let run = || {
        let mut race = Race::from_lookup(&sim_pars, 1, SimConstants::default(), 42).unwrap();
        race.run_to_completion().unwrap();
        (
            serde_json::to_string(&race.get_race_result()).unwrap(),
            serde_json::to_string(&race.get_status()).unwrap(),
        )
    };

    let (result_a, status_a) = run();
    let (result_b, status_b) = run();
    assert_eq!(result_a, result_b);
    assert_eq!(status_a, status_b);
}

#[test]
fn different_seeds_give_different_races() {
    let sim_pars = scenario(3, 5);
    let mut race_a = Race::from_lookup(&sim_pars, 1, SimConstants::default(), 1).unwrap();
    let mut race_b = Race::from_lookup(&sim_pars, 1, SimConstants::default(), 2).unwrap();
    race_a.run_to_completion().unwrap();
    race_b.run_to_completion().unwrap();
    assert_ne!(
        race_a.get_race_result().laptimes,
        race_b.get_race_result().laptimes
    );
}

#[test]
fn qualifying_sets_a_complete_grid() {
    let sim_pars = scenario(8, 5);
    let mut race = Race::from_lookup(&sim_pars, 1, SimConstants::default(), 3).unwrap();
    race.start().unwrap();
    assert_eq!(race.get_phase(), RacePhase::Racing);

    let order = race.get_order();
    let positions: Vec<u32> = order.iter().map(|car| car.position).collect();
    assert_eq!(positions, (1..=8).collect::<Vec<u32>>());
    for pair in order.windows(2) {
        assert!(pair[0].get_base_score() >= pair[1].get_base_score());
    }
    assert_eq!(race.get_events()[0].kind, EventKind::QualifyingFinished);
}

#[test]
fn state_stays_in_bounds_over_a_long_race() {
    let sim_pars = scenario(6, 80);
    let mut race = Race::from_lookup(&sim_pars, 1, SimConstants::default(), 7).unwrap();
    race.start().unwrap();
    race.update_strategy(2, "Attack").unwrap();
    race.update_strategy(4, "Conservative").unwrap();

    let mut racetimes_prev = vec![0.0; 6];
    let mut on_track_prev = vec![true; 6];

    while !race.is_terminal() {
        race.simulate_lap().unwrap();

        let mut positions: Vec<u32> = race.get_cars().iter().map(|car| car.position).collect();
        positions.sort_unstable();
        assert_eq!(positions, (1..=6).collect::<Vec<u32>>());

        for (i, car) in race.get_cars().iter().enumerate() {
            assert!(car.get_racetime() >= racetimes_prev[i]);
            assert!(on_track_prev[i] || !car.on_track());
            assert!((0.0..=100.0).contains(&car.get_battery()));
            assert!((0.0..=100.0).contains(&car.get_tireset().get_wear()));
            assert!(car.get_fuel() >= 0.0);
            // a pit lap only books the pit stop time loss
            for (lap, &t_lap) in car.get_laptimes().iter().enumerate() {
                if car.get_pit_laps().contains(&(lap as u32 + 1)) {
                    assert!((24.5..=26.5).contains(&t_lap));
                } else {
                    assert!(t_lap >= 60.0);
                }
            }

            racetimes_prev[i] = car.get_racetime();
            on_track_prev[i] = car.on_track();
        }

        // retired cars are always classified behind the cars on track
        let order = race.get_order();
        if let Some(first_dnf) = order.iter().position(|car| !car.on_track()) {
            assert!(order[first_dnf..].iter().all(|car| !car.on_track()));
        }
    }

    assert_eq!(race.get_phase(), RacePhase::Finished);
    assert_eq!(race.get_cur_lap(), 80);
}

#[test]
fn worn_tires_trigger_a_pit_stop() {
    // 1.5% wear per lap on this circuit, the threshold of 70% is exceeded after 47 laps
    let sim_pars = calm_scenario(2, 60);
    let mut race = Race::from_lookup(&sim_pars, 1, calm_consts(), 5).unwrap();
    race.run_to_completion().unwrap();

    for car in race.get_cars() {
        assert_eq!(car.get_pit_laps(), &[48]);
        assert_eq!(car.get_tireset().compound, Compound::Hard);
    }
}

#[test]
fn requested_pit_stop_happens_in_the_next_lap() {
    let sim_pars = calm_scenario(3, 10);
    let mut race = Race::from_lookup(&sim_pars, 1, calm_consts(), 9).unwrap();
    for _ in 0..3 {
        race.simulate_lap().unwrap();
    }
    assert!(race.get_car(1).unwrap().get_tireset().get_wear() > 0.0);

    race.update_strategy(1, "RequestPit").unwrap();
    assert!(race.get_car(1).unwrap().pit_requested());

    race.simulate_lap().unwrap();
    let car = race.get_car(1).unwrap();
    assert_eq!(car.get_pit_laps(), &[4]);
    assert_eq!(car.get_tireset().get_wear(), 0.0);
    assert_eq!(car.get_tireset().get_age_cur_stint(), 0);
    assert_eq!(car.get_tireset().compound, Compound::Hard);
    assert!(!car.in_pit_lane());
    assert!(!car.pit_requested());

    let t_pit = car.get_laptimes()[3];
    assert!((24.5..=26.5).contains(&t_pit));

    let status = race.get_status();
    let competitor = status.get_competitor(1).unwrap();
    assert_eq!(competitor.tire_wear, 0.0);
    assert!(!competitor.in_pit);
}

#[test]
fn unreliable_car_retires_and_is_ranked_last() {
    let mut sim_pars = calm_scenario(4, 10);
    // the fastest car has no reliability at all
    sim_pars.cars[3] = CarPars {
        team_id: 4,
        engine: 100.0,
        aero: 100.0,
        chassis: 100.0,
        reliability: 0.0,
    };
    let consts = SimConstants {
        mech_failure_div: 1.0,
        ..calm_consts()
    };
    let mut race = Race::from_lookup(&sim_pars, 1, consts, 11).unwrap();
    race.start().unwrap();
    assert_eq!(race.get_car(4).unwrap().position, 1);

    while !race.is_terminal() {
        race.simulate_lap().unwrap();
        assert_eq!(race.get_car(4).unwrap().position, 4);
    }

    let car = race.get_car(4).unwrap();
    assert_eq!(car.status, CarStatus::DNF);
    assert_eq!(car.get_retired_lap(), Some(1));
    assert_eq!(car.get_laptimes().len(), 1);
    assert!(race
        .get_events()
        .iter()
        .any(|e| e.kind == EventKind::MechanicalFailure && e.driver_id == Some(4)));

    let result = race.get_race_result();
    let last = result.classification.last().unwrap();
    assert_eq!(last.driver_id, 4);
    assert_eq!(last.status, CarStatus::DNF);
    assert_eq!(last.laps, 1);
}

#[test]
fn retired_car_rejects_commands() {
    let mut sim_pars = calm_scenario(2, 10);
    sim_pars.cars[1].reliability = 0.0;
    let consts = SimConstants {
        mech_failure_div: 1.0,
        ..calm_consts()
    };
    let mut race = Race::from_lookup(&sim_pars, 1, consts, 1).unwrap();
    race.simulate_lap().unwrap();

    assert_eq!(
        race.update_strategy(2, "RequestPit"),
        Err(CommandError::CompetitorRetired(2))
    );
}

#[test]
fn lap_time_never_drops_below_the_floor() {
    let consts = SimConstants::default();
    assert_eq!(calc_laptime(0.0, 0.0, &consts), 100.0);
    assert_eq!(calc_laptime(500.0, 0.05, &consts), 60.0);
    assert_eq!(calc_laptime(1.0e12, 0.0, &consts), 60.0);
    assert!(calc_laptime(-100.0, 0.0, &consts) > 100.0);
}

#[test]
fn rejected_commands_leave_the_race_untouched() {
    let sim_pars = calm_scenario(3, 3);
    let mut race = Race::from_lookup(&sim_pars, 1, calm_consts(), 4).unwrap();
    race.simulate_lap().unwrap();
    let status_before = race.get_status();

    assert_eq!(
        race.update_strategy(42, "Attack"),
        Err(CommandError::CompetitorNotFound(42))
    );
    assert_eq!(
        race.update_strategy(1, "Push"),
        Err(CommandError::ActionNotRecognized("Push".to_owned()))
    );
    assert_eq!(race.get_status(), status_before);

    let msg = race.update_strategy(1, "Attack").unwrap();
    assert!(msg.contains("Attack"));
    assert_eq!(race.get_car(1).unwrap().get_pace_mode(), PaceMode::Attack);
    assert!(race.get_status().version > status_before.version);

    race.run_to_completion().unwrap();
    let status_finished = race.get_status();
    assert_eq!(
        race.update_strategy(1, "Normal"),
        Err(CommandError::RaceFinished)
    );
    assert_eq!(race.get_status(), status_finished);
}

#[test]
fn construction_errors() {
    let sim_pars = scenario(3, 5);
    assert_eq!(
        Race::from_lookup(&sim_pars, 99, SimConstants::default(), 1).unwrap_err(),
        ConstructionError::CircuitNotFound(99)
    );

    let mut no_cars = scenario(3, 5);
    no_cars.cars.clear();
    assert_eq!(
        Race::from_lookup(&no_cars, 1, SimConstants::default(), 1).unwrap_err(),
        ConstructionError::NoCompetitors
    );

    let mut bad_driver = scenario(3, 5);
    bad_driver.drivers[0].speed = 120.0;
    assert!(matches!(
        Race::from_lookup(&bad_driver, 1, SimConstants::default(), 1),
        Err(ConstructionError::InvalidParameter { .. })
    ));

    let mut zero_laps = scenario(3, 5);
    zero_laps.circuits[0].lap_count = 0;
    assert!(matches!(
        Race::from_lookup(&zero_laps, 1, SimConstants::default(), 1),
        Err(ConstructionError::InvalidParameter { .. })
    ));
}

#[test]
fn drivers_without_team_or_car_are_not_entered() {
    let mut sim_pars = scenario(4, 5);
    sim_pars.drivers[0].team_id = None;
    sim_pars.cars.retain(|car| car.team_id != 2);

    let race = Race::from_lookup(&sim_pars, 1, SimConstants::default(), 1).unwrap();
    let ids: Vec<u32> = race.get_cars().iter().map(|car| car.driver.id).collect();
    assert_eq!(ids, vec![3, 4]);
    assert_eq!(
        race.get_car(3).unwrap().team_name,
        Some("Team 3".to_owned())
    );
}

#[test]
fn status_reports_the_last_ten_events() {
    let sim_pars = scenario(3, 20);
    let mut race = Race::from_lookup(&sim_pars, 1, SimConstants::default(), 8).unwrap();
    race.run_to_completion().unwrap();

    let status = race.get_status();
    assert!(status.finished);
    assert_eq!(status.cur_lap, 20);
    assert_eq!(status.tot_no_laps, 20);
    assert_eq!(status.event_log.len(), 10);
    assert_eq!(status.event_log.last().unwrap(), "RACE FINISHED!");
    assert_eq!(status.competitors.len(), 3);
    assert_eq!(status.competitors[0].position, 1);
}

#[test]
fn safety_car_and_rain_set_the_track_state() {
    let mut sim_pars = scenario(3, 6);
    sim_pars.circuits[0].sc_probability = 1.0;
    let consts = SimConstants {
        sc_div: 1.0,
        ..SimConstants::default()
    };
    let mut race = Race::from_lookup(&sim_pars, 1, consts, 2).unwrap();
    race.simulate_lap().unwrap();
    assert_eq!(race.get_track_state(), TrackState::SafetyCar);
    race.run_to_completion().unwrap();
    assert_eq!(race.safety_car.deployments, 1);

    let mut sim_pars = scenario(3, 6);
    sim_pars.circuits[0].rain_probability = 1.0;
    let consts = SimConstants {
        rain_div: 1.0,
        ..SimConstants::default()
    };
    let mut race = Race::from_lookup(&sim_pars, 1, consts, 2).unwrap();
    race.simulate_lap().unwrap();
    assert_eq!(race.get_status().track_state, TrackState::Rain);
    assert_eq!(
        race.get_events()
            .iter()
            .filter(|e| e.kind == EventKind::RainStart)
            .count(),
        1
    );
}

#[test]
fn cancelled_race_keeps_its_totals() {
    let sim_pars = scenario(3, 10);
    let mut race = Race::from_lookup(&sim_pars, 1, SimConstants::default(), 6).unwrap();
    for _ in 0..4 {
        race.simulate_lap().unwrap();
    }
    let racetimes: Vec<f64> = race.get_cars().iter().map(|c| c.get_racetime()).collect();

    race.cancel();
    assert_eq!(race.get_phase(), RacePhase::Cancelled);
    assert!(race.simulate_lap().is_err());

    let racetimes_after: Vec<f64> = race.get_cars().iter().map(|c| c.get_racetime()).collect();
    assert_eq!(racetimes, racetimes_after);
    assert_eq!(race.get_race_result().laps_completed, 4);
}

#[test]
fn timing_sheet_has_one_row_per_booked_lap() {
    let sim_pars = scenario(3, 4);
    let mut race = Race::from_lookup(&sim_pars, 1, SimConstants::default(), 12).unwrap();
    race.run_to_completion().unwrap();
    let result = race.get_race_result();

    let mut buf = Vec::new();
    result.write_timing_sheet(&mut buf).unwrap();
    let content = String::from_utf8(buf).unwrap();
    let lines: Vec<&str> = content.lines().collect();

    let no_booked_laps: usize = result.laptimes.iter().map(|l| l.len()).sum();
    assert_eq!(lines.len(), 1 + no_booked_laps);
    assert_eq!(lines[0], "driver_id,driver_name,lap,laptime,racetime,pit");
    assert!(lines[1].starts_with("1,Driver 1,1,"));

    let table = result.fmt_lap_and_race_times().unwrap();
    assert!(table.contains("RESULT: Classification"));
}

#[test]
fn driver_error_costs_score_and_skips_the_failure_check() {
    let mut sim_pars = calm_scenario(2, 5);
    for car in sim_pars.cars.iter_mut() {
        car.reliability = 0.0;
    }
    // both a driver error and a mechanical failure are certain in every lap
    let consts = SimConstants {
        p_driver_error_base: 1.0,
        driver_error_div: 1.0,
        mech_failure_div: 1.0,
        ..calm_consts()
    };
    let mut race = Race::from_lookup(&sim_pars, 1, consts.clone(), 21).unwrap();
    race.start().unwrap();
    let leader_id = race.get_order()[0].driver.id;
    let base_score = race.get_car(leader_id).unwrap().get_base_score();

    race.run_to_completion().unwrap();

    // the leader has no car ahead in lap 1, fresh tires and a full tank
    let ps_lap = base_score - consts.m_fuel_start * consts.k_fuel_penalty;
    let t_expected = consts.t_lap_base - consts.driver_error_factor * ps_lap * consts.s_score;
    let t_lap = race.get_car(leader_id).unwrap().get_laptimes()[0];
    assert!((t_lap - t_expected).abs() <= consts.t_lap_noise + 1e-9);

    let events = race.get_events();
    assert_eq!(
        events.iter().filter(|e| e.kind == EventKind::DriverError).count(),
        10
    );
    assert!(!events.iter().any(|e| e.kind == EventKind::MechanicalFailure));
    assert!(race.get_cars().iter().all(|car| car.on_track()));
}

#[test]
fn safety_car_comes_in_after_its_laps() {
    let mut sim_pars = calm_scenario(3, 8);
    sim_pars.circuits[0].sc_probability = 1.0;
    let consts = SimConstants {
        sc_div: 1.0,
        sc_laps: 3,
        ..calm_consts()
    };
    let mut race = Race::from_lookup(&sim_pars, 1, consts, 13).unwrap();
    race.simulate_lap().unwrap();
    assert_eq!(race.get_track_state(), TrackState::SafetyCar);

    // no further deployments after the first lap
    race.track.sc_probability = 0.0;
    for lap in 2..=3 {
        race.simulate_lap().unwrap();
        assert_eq!(race.get_cur_lap(), lap);
        assert_eq!(race.get_track_state(), TrackState::SafetyCar);
    }

    race.simulate_lap().unwrap();
    assert_eq!(race.get_track_state(), TrackState::Dry);
    assert!(!race.safety_car.active);
    assert_eq!(race.safety_car.deployments, 1);

    let sc_in: Vec<u32> = race
        .get_events()
        .iter()
        .filter(|e| e.kind == EventKind::SafetyCarIn)
        .map(|e| e.lap)
        .collect();
    assert_eq!(sc_in, vec![4]);
    assert!(race
        .get_status()
        .event_log
        .iter()
        .any(|msg| msg.contains("Safety car in")));
}

#[test]
fn running_out_of_fuel_is_logged_once() {
    let sim_pars = calm_scenario(2, 6);
    // 5 kg at 2 kg per lap, the tank runs dry in lap 3
    let consts = SimConstants {
        m_fuel_start: 5.0,
        b_fuel_per_lap: 2.0,
        ..calm_consts()
    };
    let mut race = Race::from_lookup(&sim_pars, 1, consts, 17).unwrap();
    race.run_to_completion().unwrap();

    for car in race.get_cars() {
        assert_eq!(car.get_fuel(), 0.0);
        assert!(car.on_track());
        assert_eq!(car.get_laptimes().len(), 6);
    }

    let out_of_fuel: Vec<(u32, Option<u32>)> = race
        .get_events()
        .iter()
        .filter(|e| e.kind == EventKind::OutOfFuel)
        .map(|e| (e.lap, e.driver_id))
        .collect();
    assert_eq!(out_of_fuel.len(), 2);
    assert!(out_of_fuel.iter().all(|&(lap, _)| lap == 3));
}

#[test]
fn empty_tank_retires_the_car_when_configured() {
    let sim_pars = calm_scenario(2, 6);
    let consts = SimConstants {
        m_fuel_start: 5.0,
        b_fuel_per_lap: 2.0,
        dnf_on_empty_tank: true,
        ..calm_consts()
    };
    let mut race = Race::from_lookup(&sim_pars, 1, consts, 17).unwrap();
    race.run_to_completion().unwrap();
    assert_eq!(race.get_phase(), RacePhase::Finished);

    for car in race.get_cars() {
        assert_eq!(car.status, CarStatus::DNF);
        assert_eq!(car.get_retired_lap(), Some(3));
        assert_eq!(car.get_laptimes().len(), 3);
    }
    assert_eq!(
        race.get_events()
            .iter()
            .filter(|e| e.kind == EventKind::OutOfFuel)
            .count(),
        2
    );
    assert_eq!(
        race.update_strategy(1, "Attack"),
        Err(CommandError::CompetitorRetired(1))
    );
}

#[test]
fn traffic_modifier_uses_the_gap_at_the_start_of_the_lap() {
    let sim_pars = calm_scenario(2, 3);

    // both cars start with a race time of zero, so the second car is always within both gaps
    let first_lap = |consts: SimConstants| {
        let mut race = Race::from_lookup(&sim_pars, 1, consts, 31).unwrap();
        race.start().unwrap();
        let order: Vec<u32> = race.get_order().iter().map(|car| car.driver.id).collect();
        race.simulate_lap().unwrap();
        let t_leader = race.get_car(order[0]).unwrap().get_laptimes()[0];
        let t_follower = race.get_car(order[1]).unwrap().get_laptimes()[0];
        (t_leader, t_follower)
    };

    let (t_leader_drs, t_drs) = first_lap(calm_consts());
    let (t_leader_dirty, t_dirty) = first_lap(SimConstants {
        drs_allowed_lap: 2,
        ..calm_consts()
    });
    let (t_leader_free, t_free) = first_lap(SimConstants {
        drs_gap: 0.0,
        dirty_air_gap: 0.0,
        ..calm_consts()
    });

    // same seed and same draws, only the traffic modifier differs
    assert_eq!(t_leader_drs, t_leader_dirty);
    assert_eq!(t_leader_drs, t_leader_free);

    let consts = calm_consts();
    assert!((t_free - t_drs - consts.mod_drs * consts.s_score).abs() < 1e-9);
    assert!((t_dirty - t_free + consts.mod_dirty_air * consts.s_score).abs() < 1e-9);
}
