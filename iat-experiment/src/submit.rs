use std::fs::{self, File, OpenOptions};
use std::io::{BufWriter, ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::SubmissionError;
use crate::log::CompletedRun;

/// Acknowledgement from the submission collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub message: String,
}

/// External collaborator that takes a finished response log.
pub trait ResponseSink {
    fn submit(&mut self, run: &CompletedRun) -> Result<Receipt, SubmissionError>;
}

/// Writes each finished run as a pretty-printed JSON file.
#[derive(Debug, Clone)]
pub struct JsonFileSink {
    dir: PathBuf,
}

impl JsonFileSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name for `run`: experiment, participant and start time.
    pub fn file_name(run: &CompletedRun) -> String {
        let participant: String = run
            .participant
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .collect();
        format!(
            "experiment-{}-{}-{}.json",
            run.experiment, participant, run.begin_time_ms
        )
    }

    /// Creates a file that did not exist before. Runs that share a name get
    /// `-2`, `-3`, ... appended to the stem.
    fn create_unique(&self, run: &CompletedRun) -> Result<(PathBuf, File), SubmissionError> {
        let name = Self::file_name(run);
        let stem = name.trim_end_matches(".json");
        let mut attempt = 1u32;
        loop {
            let path = if attempt == 1 {
                self.dir.join(&name)
            } else {
                self.dir.join(format!("{stem}-{attempt}.json"))
            };
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl ResponseSink for JsonFileSink {
    fn submit(&mut self, run: &CompletedRun) -> Result<Receipt, SubmissionError> {
        fs::create_dir_all(&self.dir)?;
        let (path, file) = self.create_unique(run)?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, run)?;
        writer.flush()?;
        Ok(Receipt {
            message: format!(
                "{} responses saved to {}",
                run.responses.len(),
                path.display()
            ),
        })
    }
}

/// Keeps submitted runs in memory. Can be told to refuse submissions.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    runs: Vec<CompletedRun>,
    refusal: Option<String>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn refusing(reason: impl Into<String>) -> Self {
        Self {
            runs: Vec::new(),
            refusal: Some(reason.into()),
        }
    }

    pub fn runs(&self) -> &[CompletedRun] {
        &self.runs
    }
}

impl ResponseSink for MemorySink {
    fn submit(&mut self, run: &CompletedRun) -> Result<Receipt, SubmissionError> {
        if let Some(reason) = &self.refusal {
            return Err(SubmissionError::Rejected(reason.clone()));
        }
        self.runs.push(run.clone());
        Ok(Receipt {
            message: format!("{} responses recorded", run.responses.len()),
        })
    }
}
