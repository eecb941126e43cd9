use anyhow::Context;
use clap::Parser;
use helpers::general::mean;
use plotters::prelude::*;
use racesim::core::car::CarStatus;
use racesim::core::handle_race::{handle_race, RaceControl, StatusSink};
use racesim::core::race::Race;
use racesim::core::sim_constants::SimConstants;
use racesim::interfaces::race_status::RaceStatus;
use racesim::post::race_result::{EventKind, RaceResult};
use racesim::pre::read_sim_pars::{read_sim_constants, read_sim_pars, SimPars};
use racesim::pre::sim_opts::SimOpts;
use rayon::prelude::*;
use std::path::Path;
use std::time::{Duration, Instant};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// LiveTiming prints the top of the field after every lap of a real-time race.
struct LiveTiming;

impl StatusSink for LiveTiming {
    fn publish(&self, status: RaceStatus) -> anyhow::Result<()> {
        let top: Vec<String> = status
            .competitors
            .iter()
            .take(3)
            .map(|c| format!("P{} {} ({:.3}s)", c.position, c.driver_name, c.racetime))
            .collect();
        info!(
            "Lap {}/{} [{:?}] {}",
            status.cur_lap,
            status.tot_no_laps,
            status.track_state,
            top.join(" | ")
        );
        Ok(())
    }
}

fn export_laptime_plot(result: &RaceResult, filepath: &Path) -> anyhow::Result<()> {
    let mut y_min = f64::INFINITY;
    let mut y_max = f64::NEG_INFINITY;
    for &t_lap in result.laptimes.iter().flatten() {
        y_min = y_min.min(t_lap);
        y_max = y_max.max(t_lap);
    }
    if !y_min.is_finite() || !y_max.is_finite() {
        y_min = 0.0;
        y_max = 1.0;
    }
    let margin = ((y_max - y_min) * 0.05).max(0.5);
    let (y_lo, y_hi) = (y_min - margin, y_max + margin);

    let root = SVGBackend::new(filepath, (1280, 720)).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption(
            format!("Lap times - {} (seed {})", result.track_name, result.seed),
            ("sans-serif", 24).into_font(),
        )
        .margin(20)
        .x_label_area_size(40)
        .y_label_area_size(60)
        .build_cartesian_2d(1u32..result.laps_completed.max(1) + 1, y_lo..y_hi)?;

    chart
        .configure_mesh()
        .x_desc("Lap")
        .y_desc("s")
        .label_style(("sans-serif", 16))
        .axis_desc_style(("sans-serif", 16))
        .draw()?;

    for event in result
        .events
        .iter()
        .filter(|e| e.kind == EventKind::SafetyCarDeployed)
    {
        chart.draw_series(std::iter::once(PathElement::new(
            vec![(event.lap, y_lo), (event.lap, y_hi)],
            RGBColor(255, 165, 0).stroke_width(1),
        )))?;
    }

    for (i, pair) in result.car_driver_pairs.iter().enumerate() {
        let series: Vec<(u32, f64)> = result.laptimes[i]
            .iter()
            .enumerate()
            .map(|(lap, &t_lap)| (lap as u32 + 1, t_lap))
            .collect();
        chart
            .draw_series(LineSeries::new(series, Palette99::pick(i).stroke_width(2)))?
            .label(pair.driver_name.to_owned())
            .legend(move |(x, y)| {
                PathElement::new(vec![(x, y), (x + 20, y)], Palette99::pick(i).stroke_width(2))
            });
    }

    chart
        .configure_series_labels()
        .border_style(&BLACK)
        .background_style(&WHITE.mix(0.8))
        .label_font(("sans-serif", 16))
        .position(SeriesLabelPosition::UpperRight)
        .draw()?;

    root.present()?;
    Ok(())
}

fn write_outputs(
    sim_opts: &SimOpts,
    result: &RaceResult,
    status: Option<&RaceStatus>,
) -> anyhow::Result<()> {
    if let Some(csv_path) = &sim_opts.csv_path {
        result.write_timing_sheet_csv(csv_path)?;
        info!("Timing sheet written to {}", csv_path.display());
    }

    if let Some(plot_path) = &sim_opts.plot_path {
        match export_laptime_plot(result, plot_path) {
            Ok(()) => info!("Lap time plot written to {}", plot_path.display()),
            Err(e) => warn!("Could not write lap time plot: {:#}", e),
        }
    }

    if let Some(status_path) = &sim_opts.status_json {
        match status {
            Some(status) => {
                let content = serde_json::to_string_pretty(status)?;
                std::fs::write(status_path, content).context(format!(
                    "Failed to write race status to {}!",
                    status_path.display()
                ))?;
                info!("Race status written to {}", status_path.display());
            }
            None => warn!("The race status is only written for single runs"),
        }
    }

    Ok(())
}

fn run_single(
    sim_opts: &SimOpts,
    sim_pars: &SimPars,
    sim_consts: SimConstants,
    circuit_id: u32,
    seed: u64,
) -> anyhow::Result<()> {
    let mut race = Race::from_lookup(sim_pars, circuit_id, sim_consts, seed)
        .context("Failed to set up the race!")?;
    info!(
        "Simulating {} over {} laps with {} competitors (seed {})",
        race.track.name,
        race.tot_no_laps,
        race.get_cars().len(),
        seed
    );

    let live_timing: &dyn StatusSink = &LiveTiming;
    let lap_interval = Duration::from_millis(sim_opts.lap_interval);
    let ctrl = RaceControl {
        status_sink: if lap_interval.is_zero() {
            None
        } else {
            Some(live_timing)
        },
        lap_interval,
        ..RaceControl::default()
    };

    let t_start = Instant::now();
    let race_result = handle_race(&mut race, &ctrl, sim_opts.debug)?;
    info!("Execution time: {}ms", t_start.elapsed().as_millis());

    race_result.print_lap_and_race_times()?;
    write_outputs(sim_opts, &race_result, Some(&race.get_status()))
}

fn run_multiple(
    sim_opts: &SimOpts,
    sim_pars: &SimPars,
    sim_consts: SimConstants,
    circuit_id: u32,
    seed: u64,
) -> anyhow::Result<()> {
    info!(
        "Running {} simulations on circuit {} (seeds {} to {})",
        sim_opts.no_sim_runs,
        circuit_id,
        seed,
        seed.wrapping_add(sim_opts.no_sim_runs as u64 - 1)
    );
    let t_start = Instant::now();

    let race_results = (0..sim_opts.no_sim_runs)
        .into_par_iter()
        .map(|i| -> anyhow::Result<RaceResult> {
            let mut race = Race::from_lookup(
                sim_pars,
                circuit_id,
                sim_consts.clone(),
                seed.wrapping_add(i as u64),
            )?;
            race.run_to_completion()?;
            Ok(race.get_race_result())
        })
        .collect::<anyhow::Result<Vec<RaceResult>>>()?;

    info!(
        "Execution time: {}ms ({} runs)",
        t_start.elapsed().as_millis(),
        race_results.len()
    );

    // average finishing position and number of retirements per driver
    let mut summary: Vec<(String, f64, usize)> = race_results[0]
        .car_driver_pairs
        .iter()
        .map(|pair| {
            let entries: Vec<_> = race_results
                .iter()
                .filter_map(|result| {
                    result
                        .classification
                        .iter()
                        .find(|entry| entry.driver_id == pair.driver_id)
                })
                .collect();
            let positions: Vec<f64> = entries.iter().map(|entry| entry.position as f64).collect();
            let no_dnfs = entries
                .iter()
                .filter(|entry| entry.status == CarStatus::DNF)
                .count();
            (
                pair.driver_name.to_owned(),
                mean(&positions).unwrap_or(f64::NAN),
                no_dnfs,
            )
        })
        .collect();
    summary.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal));

    println!("RESULT: Average finishing positions over {} runs", race_results.len());
    for (driver_name, avg_position, no_dnfs) in summary.iter() {
        println!("{:<24} {:6.2} ({} DNF)", driver_name, avg_position, no_dnfs);
    }

    write_outputs(sim_opts, &race_results[0], None)
}

fn main() -> anyhow::Result<()> {
    // PRE-PROCESSING ------------------------------------------------------------------------------
    // get simulation options from the command line arguments
    let sim_opts: SimOpts = SimOpts::parse();

    let default_filter = if sim_opts.debug {
        "info,racesim=debug"
    } else {
        "warn,racesim=info,racesim_cli=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    info!("Reading simulation parameters from {}", sim_opts.parfile_path.display());
    let sim_pars = read_sim_pars(&sim_opts.parfile_path)?;

    let sim_consts = match &sim_opts.constants_path {
        Some(constants_path) => read_sim_constants(constants_path)?,
        None => SimConstants::default(),
    };

    let circuit_id = sim_opts.circuit_id.unwrap_or(sim_pars.race_pars.circuit_id);
    let seed = sim_opts.seed.unwrap_or(sim_pars.race_pars.seed);

    // EXECUTION -----------------------------------------------------------------------------------
    if sim_opts.no_sim_runs <= 1 {
        run_single(&sim_opts, &sim_pars, sim_consts, circuit_id, seed)
    } else {
        if sim_opts.lap_interval > 0 {
            warn!("The lap interval is ignored for multiple simulation runs");
        }
        run_multiple(&sim_opts, &sim_pars, sim_consts, circuit_id, seed)
    }
}
