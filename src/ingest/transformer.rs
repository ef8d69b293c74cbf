//! The external transform step behind a capability, so the orchestrator can
//! run the real executable or an in-process stand-in.

use crate::config::{DataLayout, IngestionConfig};
use crate::process::{run_pipeline, PipelineOptions};
use async_trait::async_trait;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;

/// How one transform invocation ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransformOutcome {
    Success { output: String },
    Failure { status: Option<i32>, output: String },
    TimedOut { after: Duration },
}

impl TransformOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, TransformOutcome::Success { .. })
    }
}

/// Runs the transform step once: succeed, fail or time out.
#[async_trait]
pub trait Transformer: Send + Sync {
    async fn run(&self) -> TransformOutcome;
}

/// Spawns the transform executable with no arguments from the current
/// working directory and collects its output: stdout first, then stderr.
#[derive(Debug, Clone)]
pub struct CommandTransformer {
    executable: PathBuf,
    timeout: Duration,
    envs: Vec<(String, String)>,
}

impl CommandTransformer {
    pub fn new(executable: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            executable: executable.into(),
            timeout,
            envs: Vec::new(),
        }
    }

    /// Transformer for a node's config. The child is told the node's data
    /// root so both sides agree on the layout.
    pub fn for_config(config: &IngestionConfig) -> Self {
        config.transform_env().into_iter().fold(
            Self::new(&config.transform_executable, config.transform_timeout()),
            |transformer, (key, value)| transformer.with_env(key, value),
        )
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.envs.push((key.into(), value.into()));
        self
    }

    pub fn executable(&self) -> &PathBuf {
        &self.executable
    }
}

#[async_trait]
impl Transformer for CommandTransformer {
    async fn run(&self) -> TransformOutcome {
        let mut child = match Command::new(&self.executable)
            .envs(self.envs.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
        {
            Ok(child) => child,
            Err(e) => {
                return TransformOutcome::Failure {
                    status: None,
                    output: format!("failed to start {}: {}", self.executable.display(), e),
                }
            }
        };

        let mut stdout = child.stdout.take();
        let mut stderr = child.stderr.take();
        let finished = tokio::time::timeout(self.timeout, async {
            // Both pipes drain concurrently; output keeps them apart.
            let (out, err) = tokio::join!(drain(stdout.as_mut()), drain(stderr.as_mut()));
            let status = child.wait().await;
            let mut combined = out;
            combined.extend_from_slice(&err);
            (status, combined)
        })
        .await;

        match finished {
            Err(_) => TransformOutcome::TimedOut {
                after: self.timeout,
            },
            Ok((Err(e), _)) => TransformOutcome::Failure {
                status: None,
                output: e.to_string(),
            },
            Ok((Ok(status), combined)) => {
                let output = String::from_utf8_lossy(&combined).into_owned();
                if status.success() {
                    TransformOutcome::Success { output }
                } else {
                    TransformOutcome::Failure {
                        status: status.code(),
                        output,
                    }
                }
            }
        }
    }
}

async fn drain<R: AsyncRead + Unpin>(pipe: Option<&mut R>) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Some(pipe) = pipe {
        if let Err(e) = pipe.read_to_end(&mut buf).await {
            log_ingest_warn!("failed to read transform output: {}", e);
        }
    }
    buf
}

/// Runs the pipeline on a blocking thread instead of spawning a process.
#[derive(Debug, Clone)]
pub struct InProcessTransformer {
    layout: DataLayout,
    options: PipelineOptions,
}

impl InProcessTransformer {
    pub fn new(layout: DataLayout, options: PipelineOptions) -> Self {
        Self { layout, options }
    }
}

#[async_trait]
impl Transformer for InProcessTransformer {
    async fn run(&self) -> TransformOutcome {
        let layout = self.layout.clone();
        let options = self.options;
        match tokio::task::spawn_blocking(move || run_pipeline(&layout, options)).await {
            Ok(Ok(report)) => TransformOutcome::Success {
                output: format!(
                    "{} entities, {} collections, {} quarantined",
                    report.entities.repaired,
                    report.collections.repaired,
                    report.quarantined_count()
                ),
            },
            Ok(Err(e)) => TransformOutcome::Failure {
                status: None,
                output: e.to_string(),
            },
            Err(e) => TransformOutcome::Failure {
                status: None,
                output: format!("transform task panicked: {}", e),
            },
        }
    }
}
