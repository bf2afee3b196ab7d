/////////////////////////////////////////////////////////////////////////////////////
//
// Epinet model
//
// stats module
//
// per-tick and per-trial CSV logs consumed by downstream analysis
//
////////////////////////////////////////////////////////////////////////////////////

use csv::WriterBuilder;
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::prelude::Write;
use std::path::{Path, PathBuf};

use crate::error::ModelError;

/// One row of the infected-count time series.
#[derive(Debug, Copy, Clone, Serialize)]
pub struct TickRecord {
    pub scenario: usize,
    pub trial: usize,
    pub tick: usize,
    pub infected: usize,
    pub vaccinated: usize,
    pub mean_opinion: f64,
    pub new_infections: usize,
}

/// End-of-run summary for a single trial.
#[derive(Debug, Copy, Clone, Serialize)]
pub struct TrialRecord {
    pub scenario: usize,
    pub trial: usize,
    pub seed: u64,
    pub peak_infected: usize,
    pub final_infected: usize,
    pub final_vaccinated: usize,
    pub final_mean_opinion: f64,
}

pub struct TickLog {
    file_path: PathBuf,
}

impl TickLog {
    pub fn new(dir: &Path) -> Result<TickLog, ModelError> {
        let file_path = dir.join("tick_log.csv");
        let mut file = File::create(&file_path)?;
        file.write_all(b"scenario,trial,tick,infected,vaccinated,mean_opinion,new_infections\n")?;
        Ok(TickLog { file_path })
    }

    pub fn append(&self, records: &[TickRecord]) -> Result<(), ModelError> {
        let file = OpenOptions::new().append(true).open(&self.file_path)?;
        let mut wtr = WriterBuilder::new().has_headers(false).from_writer(file);
        for record in records {
            wtr.serialize(record)?;
        }
        wtr.flush()?;
        Ok(())
    }
}

pub struct TrialLog {
    file_path: PathBuf,
}

impl TrialLog {
    pub fn new(dir: &Path) -> Result<TrialLog, ModelError> {
        let file_path = dir.join("trial_log.csv");
        let mut file = File::create(&file_path)?;
        file.write_all(
            b"scenario,trial,seed,peak_infected,final_infected,final_vaccinated,final_mean_opinion\n",
        )?;
        Ok(TrialLog { file_path })
    }

    pub fn append(&self, records: &[TrialRecord]) -> Result<(), ModelError> {
        let file = OpenOptions::new().append(true).open(&self.file_path)?;
        let mut wtr = WriterBuilder::new().has_headers(false).from_writer(file);
        for record in records {
            wtr.serialize(record)?;
        }
        wtr.flush()?;
        Ok(())
    }
}
