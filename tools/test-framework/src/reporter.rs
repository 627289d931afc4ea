/*!
   A file backed log of the tests run and of every relayer command they
   executed, written as one JSON object per line.
*/

use alloc::sync::Arc;
use eyre::eyre;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::warn;

use crate::chain::exec::ExecOutput;
use crate::error::{Error, ErrorDetail};
use crate::util::mutex::MutexUtil;

const MAX_LOG_FILE_SUFFIX: usize = 1000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "Type")]
pub enum ReportMessage {
    BeginTest {
        name: String,
        start_time_ms: u64,
    },
    RelayerExec {
        test_name: String,
        container_name: String,
        command: Vec<String>,
        stdout: String,
        stderr: String,
        exit_code: Option<i32>,
        error: Option<String>,
        start_time_ms: u64,
        finish_time_ms: u64,
    },
    FinishTest {
        name: String,
        finish_time_ms: u64,
        failed: bool,
        error: Option<String>,
    },
}

pub struct Reporter {
    out: Mutex<Box<dyn Write + Send>>,
}

/**
   Records the relayer commands of one test. A reporter without a
   backing [`Reporter`] discards everything.
*/
#[derive(Clone)]
pub struct RelayerExecReporter {
    reporter: Option<Arc<Reporter>>,
    test_name: String,
}

/**
   Create a new log file named `name` in `dir`, creating `dir` if needed.

   An existing file is never truncated. If `name` is taken, a numeric
   suffix is added before the extension, e.g. `1700000000-1.json`.
*/
pub fn create_log_file(dir: &Path, name: &str) -> Result<(File, PathBuf), Error> {
    fs::create_dir_all(dir)?;

    let (stem, extension) = match name.rsplit_once('.') {
        Some((stem, extension)) if !stem.is_empty() => (stem, Some(extension)),
        _ => (name, None),
    };

    for attempt in 0..MAX_LOG_FILE_SUFFIX {
        let candidate = match (attempt, extension) {
            (0, _) => name.to_string(),
            (n, Some(extension)) => format!("{stem}-{n}.{extension}"),
            (n, None) => format!("{stem}-{n}"),
        };

        let path = dir.join(&candidate);

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => return Ok((file, path)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(e.into()),
        }
    }

    Err(Error::generic(eyre!(
        "no free log file name for `{}` in {}",
        name,
        dir.display()
    )))
}

/// A log file name made of the current unix time, e.g. `1700000000.json`.
pub fn timestamped_log_name() -> String {
    let seconds = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_secs())
        .unwrap_or_default();

    format!("{seconds}.json")
}

pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|duration| duration.as_millis() as u64)
        .unwrap_or_default()
}

impl Reporter {
    pub fn new(file: File) -> Self {
        Self::from_writer(file)
    }

    pub fn from_writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            out: Mutex::new(Box::new(writer)),
        }
    }

    pub fn write_message(&self, message: &ReportMessage) -> Result<(), Error> {
        let line = serde_json::to_string(message)?;

        let mut out = self.out.acquire_mutex();
        writeln!(out, "{line}")?;
        out.flush()?;

        Ok(())
    }

    pub fn begin_test(&self, name: &str) -> Result<(), Error> {
        self.write_message(&ReportMessage::BeginTest {
            name: name.to_string(),
            start_time_ms: now_millis(),
        })
    }

    pub fn finish_test<R>(&self, name: &str, result: &Result<R, Error>) -> Result<(), Error> {
        self.write_message(&ReportMessage::FinishTest {
            name: name.to_string(),
            finish_time_ms: now_millis(),
            failed: result.is_err(),
            error: result.as_ref().err().map(|e| e.to_string()),
        })
    }

    pub fn relayer_exec_reporter(self: &Arc<Self>, test_name: &str) -> RelayerExecReporter {
        RelayerExecReporter {
            reporter: Some(self.clone()),
            test_name: test_name.to_string(),
        }
    }
}

impl RelayerExecReporter {
    pub fn nop(test_name: &str) -> Self {
        Self {
            reporter: None,
            test_name: test_name.to_string(),
        }
    }

    pub fn test_name(&self) -> &str {
        &self.test_name
    }

    /**
       Record one relayer command and its outcome. Failing to write the
       report does not fail the command.
    */
    pub fn track_relayer_exec(
        &self,
        container_name: &str,
        command: &[String],
        result: &Result<ExecOutput, Error>,
        start_time_ms: u64,
    ) {
        let Some(reporter) = &self.reporter else {
            return;
        };

        let (stdout, stderr, exit_code, error) = match result {
            Ok(output) => (output.stdout.clone(), output.stderr.clone(), Some(0), None),
            Err(e) => match e.detail() {
                ErrorDetail::Exec(detail) => (
                    String::new(),
                    detail.stderr.clone(),
                    detail.status,
                    Some(e.to_string()),
                ),
                _ => (String::new(), String::new(), None, Some(e.to_string())),
            },
        };

        let message = ReportMessage::RelayerExec {
            test_name: self.test_name.clone(),
            container_name: container_name.to_string(),
            command: command.to_vec(),
            stdout,
            stderr,
            exit_code,
            error,
            start_time_ms,
            finish_time_ms: now_millis(),
        };

        if let Err(e) = reporter.write_message(&message) {
            warn!("failed to write relayer exec report: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json as json;

    #[test_log::test]
    fn writes_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let (file, path) = create_log_file(&dir.path().join("logs"), "1700000000.json").unwrap();

        let reporter = Arc::new(Reporter::new(file));
        reporter.begin_test("transfer").unwrap();

        let exec_reporter = reporter.relayer_exec_reporter("transfer");
        exec_reporter.track_relayer_exec(
            "rly-transfer",
            &["rly".to_string(), "q".to_string(), "channels".to_string()],
            &Ok(ExecOutput {
                stdout: "{}".to_string(),
                stderr: String::new(),
            }),
            now_millis(),
        );
        exec_reporter.track_relayer_exec(
            "rly-transfer",
            &["rly".to_string(), "tx".to_string(), "flush".to_string()],
            &Err(Error::exec("rly tx flush".to_string(), Some(1), "no path".to_string())),
            now_millis(),
        );

        reporter.finish_test::<()>("transfer", &Ok(())).unwrap();

        let content = fs::read_to_string(path).unwrap();
        let lines: Vec<json::Value> = content
            .lines()
            .map(|line| json::from_str(line).unwrap())
            .collect();

        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0]["Type"], "BeginTest");
        assert_eq!(lines[1]["Type"], "RelayerExec");
        assert_eq!(lines[1]["exit_code"], 0);
        assert_eq!(lines[2]["exit_code"], 1);
        assert_eq!(lines[2]["stderr"], "no path");
        assert_eq!(lines[3]["failed"], false);
    }

    #[test_log::test]
    fn taken_log_names_get_a_suffix() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("logs");

        let (mut first, first_path) = create_log_file(&logs, "1700000000.json").unwrap();
        writeln!(first, "first").unwrap();

        let (_, second_path) = create_log_file(&logs, "1700000000.json").unwrap();
        let (_, third_path) = create_log_file(&logs, "1700000000.json").unwrap();

        assert_eq!(first_path, logs.join("1700000000.json"));
        assert_eq!(second_path, logs.join("1700000000-1.json"));
        assert_eq!(third_path, logs.join("1700000000-2.json"));

        // The first file is left untouched.
        assert_eq!(fs::read_to_string(first_path).unwrap(), "first\n");

        let (_, plain_path) = create_log_file(&logs, "transfer").unwrap();
        let (_, plain_second) = create_log_file(&logs, "transfer").unwrap();
        assert_eq!(plain_path, logs.join("transfer"));
        assert_eq!(plain_second, logs.join("transfer-1"));
    }

    #[test_log::test]
    fn log_names_are_unix_timestamps() {
        let name = timestamped_log_name();
        let seconds = name.strip_suffix(".json").unwrap();

        assert!(seconds.parse::<u64>().unwrap() > 1_600_000_000);
    }
}
