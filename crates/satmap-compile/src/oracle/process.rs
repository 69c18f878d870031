//! External MaxSAT solver driven through WCNF files.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, warn};

use super::{Oracle, OracleOutcome};
use crate::config::OracleConfig;
use crate::encoder::Instance;
use crate::error::{MapError, MapResult};
use crate::wcnf;

/// Runs `<program> -iterations=<n> <instance.wcnf>` and parses its stdout.
///
/// The exit status is ignored: MaxSAT solvers commonly signal their result
/// through non-zero codes. A solver still running at the time limit is
/// killed and its partial output discarded.
#[derive(Debug, Clone)]
pub struct ProcessOracle {
    config: OracleConfig,
    name: String,
}

impl ProcessOracle {
    pub fn new(config: OracleConfig) -> Self {
        let name = match config.program.file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => config.program.display().to_string(),
        };
        Self { config, name }
    }

    fn scratch_dir(&self) -> MapResult<tempfile::TempDir> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("satmap-");
        match &self.config.work_dir {
            Some(dir) => builder.tempdir_in(dir).map_err(|e| MapError::io(dir, e)),
            None => builder
                .tempdir()
                .map_err(|e| MapError::io(std::env::temp_dir(), e)),
        }
    }
}

#[async_trait]
impl Oracle for ProcessOracle {
    fn name(&self) -> &str {
        &self.name
    }

    async fn solve(&self, instance: &Instance, time_limit: Duration) -> MapResult<OracleOutcome> {
        let dir = self.scratch_dir()?;
        let input = dir.path().join("instance.wcnf");
        let output = dir.path().join("result.txt");

        tokio::fs::write(&input, wcnf::render(instance))
            .await
            .map_err(|e| MapError::io(&input, e))?;
        let sink = std::fs::File::create(&output).map_err(|e| MapError::io(&output, e))?;

        let program = self.config.program.display().to_string();
        let mut child = Command::new(&self.config.program)
            .arg(format!("-iterations={}", self.config.iterations))
            .arg(&input)
            .stdin(Stdio::null())
            .stdout(Stdio::from(sink))
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| MapError::OracleUnavailable {
                program: program.clone(),
                source,
            })?;

        match tokio::time::timeout(time_limit, child.wait()).await {
            Ok(Ok(status)) => {
                debug!(oracle = %self.name, %status, "oracle finished");
            }
            Ok(Err(source)) => return Err(MapError::OracleUnavailable { program, source }),
            Err(_) => {
                if let Err(e) = child.kill().await {
                    warn!(oracle = %self.name, error = %e, "failed to kill timed-out oracle");
                }
                return Ok(OracleOutcome::Timeout);
            }
        }

        let text = tokio::fs::read_to_string(&output)
            .await
            .map_err(|e| MapError::io(&output, e))?;
        wcnf::parse_result_stream(&text, instance.num_vars())
    }
}
