use crate::core::race::Race;
use crate::interfaces::race_status::{RaceStatus, StrategyCommand};
use crate::post::race_result::RaceResult;
use anyhow::Context;
use flume::{Receiver, Sender, TryRecvError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::sleep;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// StatusSink receives a status snapshot after qualifying, after every lap and after every
/// applied command.
pub trait StatusSink {
    fn publish(&self, status: RaceStatus) -> anyhow::Result<()>;
}

impl StatusSink for Sender<RaceStatus> {
    fn publish(&self, status: RaceStatus) -> anyhow::Result<()> {
        self.send(status)
            .context("Failed to send race status, receiver disconnected!")
    }
}

/// RaceControl connects a running race to the outside world.
/// * `status_sink` - Optional receiver of status snapshots
/// * `commands` - Optional channel of pit wall commands, drained at every lap boundary
/// * `cancel` - Optional flag, the race is cancelled at the next lap boundary once it is set
/// * `lap_interval` - Wall clock duration of a lap, zero runs the race as fast as possible
#[derive(Default)]
pub struct RaceControl<'a> {
    pub status_sink: Option<&'a dyn StatusSink>,
    pub commands: Option<&'a Receiver<StrategyCommand>>,
    pub cancel: Option<&'a AtomicBool>,
    pub lap_interval: Duration,
}

impl<'a> RaceControl<'a> {
    fn publish(&self, race: &Race) -> anyhow::Result<()> {
        match self.status_sink {
            Some(sink) => sink.publish(race.get_status()),
            None => Ok(()),
        }
    }

    fn cancel_requested(&self) -> bool {
        self.cancel
            .map(|flag| flag.load(Ordering::Acquire))
            .unwrap_or(false)
    }

    /// apply_commands applies all commands that arrived since the last lap. A command is checked
    /// again against the live race here, since the race may have finished or the competitor may
    /// have retired after it was queued. Such late rejections are logged and dropped.
    fn apply_commands(&self, race: &mut Race) -> anyhow::Result<()> {
        let rx = match self.commands {
            Some(rx) => rx,
            None => return Ok(()),
        };

        loop {
            match rx.try_recv() {
                Ok(cmd) => match race.apply_command(&cmd) {
                    Ok(msg) => {
                        debug!("{}", msg);
                        self.publish(race)?;
                    }
                    Err(e) => warn!("Rejected command for driver {}: {}", cmd.driver_id, e),
                },
                Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => return Ok(()),
            }
        }
    }
}

/// handle_race runs the qualifying and all laps of the inserted race and returns the results for
/// post-processing. Between two laps it checks the cancel flag, applies queued commands,
/// publishes the race status and sleeps for the remainder of the lap interval.
pub fn handle_race(
    race: &mut Race,
    ctrl: &RaceControl,
    print_debug: bool,
) -> anyhow::Result<RaceResult> {
    race.start().context("Failed to start the race!")?;
    ctrl.publish(race)?;

    while !race.is_terminal() {
        let t_start = Instant::now();

        if ctrl.cancel_requested() {
            race.cancel();
            ctrl.publish(race)?;
            break;
        }

        ctrl.apply_commands(race)?;

        race.simulate_lap()
            .context(format!("Simulation failed in lap {}!", race.get_cur_lap() + 1))?;
        ctrl.publish(race)?;

        if print_debug {
            let leader = race
                .get_order()
                .first()
                .map(|car| car.driver.name.to_owned())
                .unwrap_or_default();
            info!(
                "Simulating... Lap {}/{} done, leader is {}",
                race.get_cur_lap(), race.tot_no_laps, leader
            );
        }

        // sleep until the lap is finished in real-time as well
        if !ctrl.lap_interval.is_zero() && !race.is_terminal() {
            let t_elapsed = t_start.elapsed();
            if t_elapsed < ctrl.lap_interval {
                sleep(ctrl.lap_interval - t_elapsed);
            } else {
                warn!("Could not keep up with real-time!");
            }
        }
    }

    Ok(race.get_race_result())
}
