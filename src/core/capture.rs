//! Capture adapter: runs the radio capture tool for one cycle.
//!
//! The tool's standard output and standard error are joined into a single
//! text report. Failures never lose that text: a non-zero exit carries the
//! captured report inside the error, and [`CaptureError::into_report`] hands
//! back whatever partial output exists so the cycle can go on.

use std::{process::ExitStatus, process::Stdio, time::Duration};

use thiserror::Error;
use tokio::{process::Command, time::timeout};
use tracing::{debug, info};

use crate::config::capture::CaptureConfig;

/// Errors from one capture run.
#[derive(Error, Debug)]
pub enum CaptureError {
    /// The tool could not be started (missing binary, permissions).
    #[error("Failed to start '{command}': {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The tool ran but reported failure.
    #[error("'{command}' exited with {status}")]
    NonZeroExit {
        command: String,
        status: ExitStatus,
        report: String,
    },

    /// The tool outlived the configured bound and was killed.
    #[error("'{command}' did not finish within {after:?}")]
    Timeout { command: String, after: Duration },
}

impl CaptureError {
    /// Output captured before the failure; empty if none.
    pub fn into_report(self) -> String {
        match self {
            CaptureError::NonZeroExit { report, .. } => report,
            CaptureError::Spawn { .. } | CaptureError::Timeout { .. } => String::new(),
        }
    }
}

/// A source of capture reports.
#[async_trait::async_trait]
pub trait CaptureSource: Send + Sync {
    /// Produces the report for the current cycle.
    async fn run(&self) -> Result<String, CaptureError>;
}

/// Runs an external command such as `rtl_433 -G -F json -T 60`.
#[derive(Debug, Clone)]
pub struct Rtl433Capture {
    command: String,
    args: Vec<String>,
    timeout: Duration,
}

impl Rtl433Capture {
    pub fn new(config: &CaptureConfig) -> Self {
        Self {
            command: config.command.clone(),
            args: config.args.clone(),
            timeout: config.timeout(),
        }
    }

    /// Overrides the run time bound.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn command_line(&self) -> String {
        std::iter::once(self.command.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

#[async_trait::async_trait]
impl CaptureSource for Rtl433Capture {
    async fn run(&self) -> Result<String, CaptureError> {
        debug!("Running '{}'", self.command_line());

        let mut command = Command::new(&self.command);
        command
            .args(&self.args)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let output = match timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => {
                return Err(CaptureError::Spawn {
                    command: self.command.clone(),
                    source,
                })
            }
            Err(_) => {
                return Err(CaptureError::Timeout {
                    command: self.command.clone(),
                    after: self.timeout,
                })
            }
        };

        let report = join_streams(&output.stdout, &output.stderr);

        info!(
            "Capture finished with {} ({} lines)",
            output.status,
            report.lines().count()
        );
        debug!("Capture report:\n{}", report);

        if output.status.success() {
            Ok(report)
        } else {
            Err(CaptureError::NonZeroExit {
                command: self.command.clone(),
                status: output.status,
                report,
            })
        }
    }
}

/// Concatenates both streams, keeping the last stdout line separate from
/// the first stderr line.
fn join_streams(stdout: &[u8], stderr: &[u8]) -> String {
    let mut report = String::from_utf8_lossy(stdout).into_owned();
    if !report.is_empty() && !report.ends_with('\n') && !stderr.is_empty() {
        report.push('\n');
    }
    report.push_str(&String::from_utf8_lossy(stderr));
    report
}
