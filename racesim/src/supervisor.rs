//! In-memory registry of concurrently running races.
//!
//! Every race runs on its own thread and publishes a status snapshot after every lap. Readers
//! never block the simulation: snapshots are swapped atomically and commands are queued on a
//! channel that the race drains at the next lap boundary.

use crate::core::handle_race::{handle_race, RaceControl, StatusSink};
use crate::core::race::{Race, RacePhase};
use crate::core::sim_constants::SimConstants;
use crate::error::{CommandError, ConstructionError, SupervisorError};
use crate::interfaces::race_status::{RaceStatus, SimStatus, StrategyAction, StrategyCommand};
use crate::pre::read_sim_pars::EntityLookup;
use arc_swap::ArcSwap;
use flume::Sender;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{error, info, info_span, warn};
use uuid::Uuid;

/// Opaque id of a simulation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SimId(Uuid);

impl SimId {
    fn new() -> Self {
        SimId(Uuid::new_v4())
    }
}

impl fmt::Display for SimId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// * `sim_consts` - Constants used by every race started by the supervisor
/// * `lap_interval` - Wall clock duration of a lap
#[derive(Debug, Clone, Default)]
pub struct SupervisorConfig {
    pub sim_consts: SimConstants,
    pub lap_interval: Duration,
}

impl StatusSink for ArcSwap<SimStatus> {
    fn publish(&self, status: RaceStatus) -> anyhow::Result<()> {
        self.store(Arc::new(SimStatus::Running(status)));
        Ok(())
    }
}

struct SimHandle {
    status: Arc<ArcSwap<SimStatus>>,
    commands: Sender<StrategyCommand>,
    cancel: Arc<AtomicBool>,
    roster: Vec<u32>,
    finished_at: Arc<Mutex<Option<Instant>>>,
    thread: Option<JoinHandle<()>>,
}

#[derive(Default)]
pub struct RaceSupervisor {
    sims: RwLock<HashMap<SimId, SimHandle>>,
    config: SupervisorConfig,
}

impl RaceSupervisor {
    pub fn new(config: SupervisorConfig) -> RaceSupervisor {
        RaceSupervisor {
            sims: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// start builds the race right away, so construction errors are returned to the caller, and
    /// runs it on a new thread.
    pub fn start<L: EntityLookup + ?Sized>(
        &self,
        lookup: &L,
        circuit_id: u32,
        seed: u64,
    ) -> Result<SimId, ConstructionError> {
        let mut race = Race::from_lookup(lookup, circuit_id, self.config.sim_consts.clone(), seed)?;

        let id = SimId::new();
        let roster = race.get_cars().iter().map(|car| car.driver.id).collect();
        let status = Arc::new(ArcSwap::from_pointee(SimStatus::Pending));
        let cancel = Arc::new(AtomicBool::new(false));
        let finished_at = Arc::new(Mutex::new(None));
        let (tx, rx) = flume::unbounded();
        let lap_interval = self.config.lap_interval;

        let thread = {
            let status = Arc::clone(&status);
            let cancel = Arc::clone(&cancel);
            let finished_at = Arc::clone(&finished_at);

            thread::spawn(move || {
                let _span = info_span!("race", sim_id = %id).entered();

                let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                    let sink: &dyn StatusSink = &*status;
                    let ctrl = RaceControl {
                        status_sink: Some(sink),
                        commands: Some(&rx),
                        cancel: Some(&*cancel),
                        lap_interval,
                    };
                    handle_race(&mut race, &ctrl, false)
                }));

                match outcome {
                    Ok(Ok(_)) => info!("Simulation ended in lap {}", race.get_cur_lap()),
                    Ok(Err(e)) => {
                        error!("Simulation failed: {:#}", e);
                        status.store(Arc::new(SimStatus::Failed(format!("{:#}", e))));
                    }
                    Err(payload) => {
                        let reason = panic_reason(&*payload);
                        error!("Simulation panicked: {}", reason);
                        status.store(Arc::new(SimStatus::Failed(reason)));
                    }
                }

                *finished_at.lock() = Some(Instant::now());
            })
        };

        info!("Started simulation {}", id);
        self.sims.write().insert(
            id,
            SimHandle {
                status,
                commands: tx,
                cancel,
                roster,
                finished_at,
                thread: Some(thread),
            },
        );

        Ok(id)
    }

    /// status returns the last published snapshot of a simulation.
    pub fn status(&self, id: SimId) -> Result<Arc<SimStatus>, SupervisorError> {
        let sims = self.sims.read();
        let handle = sims.get(&id).ok_or_else(|| not_found(id))?;
        Ok(handle.status.load_full())
    }

    /// update_strategy validates a pit wall command against the roster and the last published
    /// snapshot and queues it for the next lap. `Ok` means the command was queued, not applied:
    /// if the race finishes or the competitor retires before the next lap boundary, the race
    /// drops the command with a warning.
    pub fn update_strategy(
        &self,
        id: SimId,
        driver_id: u32,
        action: &str,
    ) -> Result<(), SupervisorError> {
        let sims = self.sims.read();
        let handle = sims.get(&id).ok_or_else(|| not_found(id))?;
        let status = handle.status.load();

        match &**status {
            SimStatus::Failed(_) => return Err(SupervisorError::SimulationNotActive(id.to_string())),
            SimStatus::Running(race_status) if is_terminal(race_status.phase) => {
                return Err(CommandError::RaceFinished.into())
            }
            _ => {}
        }

        if !handle.roster.contains(&driver_id) {
            return Err(CommandError::CompetitorNotFound(driver_id).into());
        }

        let action: StrategyAction = action.parse()?;

        if let SimStatus::Running(race_status) = &**status {
            if let Some(competitor) = race_status.get_competitor(driver_id) {
                if !competitor.on_track {
                    return Err(CommandError::CompetitorRetired(driver_id).into());
                }
            }
        }

        handle
            .commands
            .send(StrategyCommand { driver_id, action })
            .map_err(|_| SupervisorError::SimulationNotActive(id.to_string()))
    }

    /// cancel asks the race to stop at the next lap boundary.
    pub fn cancel(&self, id: SimId) -> Result<(), SupervisorError> {
        let sims = self.sims.read();
        let handle = sims.get(&id).ok_or_else(|| not_found(id))?;
        handle.cancel.store(true, Ordering::Release);
        Ok(())
    }

    /// remove drops a simulation from the registry (cancelling it if it is still running) and
    /// returns its last snapshot.
    pub fn remove(&self, id: SimId) -> Result<Arc<SimStatus>, SupervisorError> {
        let handle = self.sims.write().remove(&id).ok_or_else(|| not_found(id))?;
        handle.cancel.store(true, Ordering::Release);
        Ok(handle.status.load_full())
    }

    /// evict_expired removes all simulations that ended more than ttl ago. Returns the number of
    /// removed simulations.
    pub fn evict_expired(&self, ttl: Duration) -> usize {
        let mut sims = self.sims.write();
        let no_sims_before = sims.len();
        sims.retain(|_, handle| match *handle.finished_at.lock() {
            Some(t_finished) => t_finished.elapsed() < ttl,
            None => true,
        });
        let no_evicted = no_sims_before - sims.len();
        if no_evicted > 0 {
            info!("Evicted {} expired simulations", no_evicted);
        }
        no_evicted
    }

    pub fn ids(&self) -> Vec<SimId> {
        self.sims.read().keys().copied().collect()
    }

    /// join blocks until the simulation thread has ended and returns the final snapshot.
    pub fn join(&self, id: SimId) -> Result<Arc<SimStatus>, SupervisorError> {
        let (thread, status) = {
            let mut sims = self.sims.write();
            let handle = sims.get_mut(&id).ok_or_else(|| not_found(id))?;
            (handle.thread.take(), Arc::clone(&handle.status))
        };

        if let Some(thread) = thread {
            if thread.join().is_err() {
                warn!("Thread of simulation {} could not be joined", id);
            }
        }

        Ok(status.load_full())
    }
}

impl Drop for RaceSupervisor {
    fn drop(&mut self) {
        for handle in self.sims.get_mut().values() {
            handle.cancel.store(true, Ordering::Release);
        }
    }
}

fn not_found(id: SimId) -> SupervisorError {
    SupervisorError::SimulationNotFound(id.to_string())
}

fn is_terminal(phase: RacePhase) -> bool {
    matches!(phase, RacePhase::Finished | RacePhase::Cancelled)
}

fn panic_reason(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&str>() {
        (*msg).to_owned()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.to_owned()
    } else {
        "simulation thread panicked".to_owned()
    }
}
