use std::fmt::Write;
use std::fs::OpenOptions;
use std::path::Path;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::core::car::CarStatus;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    QualifyingFinished,
    LapStart,
    PitEntry,
    DriverError,
    MechanicalFailure,
    OutOfFuel,
    SafetyCarDeployed,
    SafetyCarIn,
    RainStart,
    StrategyChange,
    RaceCancelled,
    RaceFinished,
}

/// RaceEvent is one line of the race's event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RaceEvent {
    pub lap: u32,
    pub kind: EventKind,
    pub driver_id: Option<u32>,
    pub message: String,
}

/// CarDriverPair is used to store driver and team identity for post-processing the results.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CarDriverPair {
    pub driver_id: u32,
    pub driver_name: String,
    pub team_id: Option<u32>,
}

/// ClassificationEntry is one row of the final (or current) classification.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ClassificationEntry {
    pub position: u32,
    pub driver_id: u32,
    pub driver_name: String,
    pub status: CarStatus,
    pub laps: u32,
    pub racetime: f64,
}

/// RaceResult contains all race information that is required for post-processing the results.
/// `laptimes[i][l]` and `racetimes[i][l]` belong to car_driver_pairs[i] and lap l + 1; a retired
/// car has fewer entries than the number of completed laps.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct RaceResult {
    pub track_name: String,
    pub seed: u64,
    pub tot_no_laps: u32,
    pub laps_completed: u32,
    pub car_driver_pairs: Vec<CarDriverPair>,
    pub laptimes: Vec<Vec<f64>>,
    pub racetimes: Vec<Vec<f64>>,
    pub pit_laps: Vec<Vec<u32>>,
    pub classification: Vec<ClassificationEntry>,
    pub events: Vec<RaceEvent>,
}

impl RaceResult {
    /// fmt_lap_and_race_times returns the lap and race times as a text table.
    pub fn fmt_lap_and_race_times(&self) -> Result<String, std::fmt::Error> {
        let mut tmp_string_laptime = String::new();
        let mut tmp_string_racetime = String::new();

        for lap in 0..self.laps_completed as usize {
            write!(&mut tmp_string_laptime, "{:3}, ", lap + 1)?;
            write!(&mut tmp_string_racetime, "{:3}, ", lap + 1)?;

            for i in 0..self.car_driver_pairs.len() {
                let sep = if i + 1 < self.car_driver_pairs.len() {
                    ", "
                } else {
                    "\n"
                };
                match self.laptimes[i].get(lap) {
                    Some(t) => write!(&mut tmp_string_laptime, "{:8.3}s{}", t, sep)?,
                    None => write!(&mut tmp_string_laptime, "{:>9}{}", "DNF", sep)?,
                }
                match self.racetimes[i].get(lap) {
                    Some(t) => write!(&mut tmp_string_racetime, "{:8.3}s{}", t, sep)?,
                    None => write!(&mut tmp_string_racetime, "{:>9}{}", "DNF", sep)?,
                }
            }
        }

        let mut tmp_string_car_driver_info = String::from("lap, ");
        for (i, pair) in self.car_driver_pairs.iter().enumerate() {
            write!(&mut tmp_string_car_driver_info, "{:>9}", pair.driver_name)?;
            if i + 1 < self.car_driver_pairs.len() {
                write!(&mut tmp_string_car_driver_info, ", ")?;
            }
        }

        let mut content = String::new();
        writeln!(&mut content, "RESULT: Lap times")?;
        writeln!(&mut content, "{}", tmp_string_car_driver_info)?;
        writeln!(&mut content, "{}", tmp_string_laptime)?;
        writeln!(&mut content, "RESULT: Race times")?;
        writeln!(&mut content, "{}", tmp_string_car_driver_info)?;
        writeln!(&mut content, "{}", tmp_string_racetime)?;
        writeln!(&mut content, "RESULT: Classification")?;
        for entry in self.classification.iter() {
            let status = match entry.status {
                CarStatus::Running => format!("{:10.3}s", entry.racetime),
                CarStatus::DNF => format!("{:>11}", "DNF"),
            };
            writeln!(
                &mut content,
                "{:3}. {:<24} {:3} laps {}",
                entry.position, entry.driver_name, entry.laps, status
            )?;
        }

        Ok(content)
    }

    /// print_lap_and_race_times prints the resulting lap and race times to the console output.
    pub fn print_lap_and_race_times(&self) -> anyhow::Result<()> {
        let content = self
            .fmt_lap_and_race_times()
            .context("Failed to format lap and race times!")?;
        print!("{}", content);
        Ok(())
    }

    /// write_timing_sheet_csv writes one row per car and lap (driver, lap, lap time, race time,
    /// pit flag) to a CSV file.
    pub fn write_timing_sheet_csv(&self, filepath: &Path) -> anyhow::Result<()> {
        let fh = OpenOptions::new()
            .create(true)
            .truncate(true)
            .write(true)
            .open(filepath)
            .context(format!(
                "Failed to open timing sheet file {}!",
                filepath.display()
            ))?;
        self.write_timing_sheet(fh)
    }

    /// write_timing_sheet writes the CSV timing sheet into any writer.
    pub fn write_timing_sheet<W: std::io::Write>(&self, writer: W) -> anyhow::Result<()> {
        let mut wtr = csv::Writer::from_writer(writer);
        wtr.write_record(&[
            "driver_id",
            "driver_name",
            "lap",
            "laptime",
            "racetime",
            "pit",
        ])?;

        for (i, pair) in self.car_driver_pairs.iter().enumerate() {
            for (lap, (t_lap, t_race)) in self.laptimes[i]
                .iter()
                .zip(self.racetimes[i].iter())
                .enumerate()
            {
                let lap_no = lap as u32 + 1;
                wtr.write_record(&[
                    pair.driver_id.to_string(),
                    pair.driver_name.to_owned(),
                    lap_no.to_string(),
                    format!("{:.3}", t_lap),
                    format!("{:.3}", t_race),
                    self.pit_laps[i].contains(&lap_no).to_string(),
                ])?;
            }
        }

        wtr.flush().context("Failed to flush timing sheet!")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_result_can_be_formatted() {
        let result: RaceResult = serde_json::from_str(
            r#"{
                "track_name": "Test Ring",
                "seed": 3,
                "tot_no_laps": 5,
                "laps_completed": 2,
                "car_driver_pairs": [],
                "laptimes": [],
                "racetimes": [],
                "pit_laps": [],
                "classification": [],
                "events": []
            }"#,
        )
        .unwrap();

        let table = result.fmt_lap_and_race_times().unwrap();
        assert!(table.contains("RESULT: Lap times\nlap, \n"));
        assert!(table.contains("RESULT: Classification"));

        let mut buf = Vec::new();
        result.write_timing_sheet(&mut buf).unwrap();
        assert_eq!(
            String::from_utf8(buf).unwrap(),
            "driver_id,driver_name,lap,laptime,racetime,pit\n"
        );
    }

    #[test]
    fn last_column_ends_the_line() {
        let result = RaceResult {
            track_name: "Test Ring".to_owned(),
            seed: 1,
            tot_no_laps: 1,
            laps_completed: 1,
            car_driver_pairs: vec![CarDriverPair {
                driver_id: 1,
                driver_name: "Driver 1".to_owned(),
                team_id: None,
            }],
            laptimes: vec![vec![90.5]],
            racetimes: vec![vec![90.5]],
            pit_laps: vec![Vec::new()],
            classification: Vec::new(),
            events: Vec::new(),
        };

        let table = result.fmt_lap_and_race_times().unwrap();
        assert!(table.contains("lap,  Driver 1\n"));
        assert!(table.contains("  1,   90.500s\n"));
    }
}
