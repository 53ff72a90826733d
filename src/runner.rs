//! Script execution: the process-wide execution lock and the shell runner.

use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::process::Command;
use tokio::sync::Mutex;
use tracing::info;

use crate::error::HookError;

pub const DEFAULT_SHELL: &str = "/bin/bash";

/// Proof that the execution lock is held. Dropping it releases the lock.
pub struct ExecutionGuard(Box<dyn Send>);

impl ExecutionGuard {
    pub fn new<G: Send + 'static>(guard: G) -> Self {
        Self(Box::new(guard))
    }
}

/// Mutual exclusion around script runs.
#[async_trait]
pub trait ExecutionLock: Send + Sync {
    async fn acquire(&self) -> ExecutionGuard;
}

/// The single lock shared by every dispatch in the process.
#[derive(Clone, Default)]
pub struct GlobalLock {
    inner: Arc<Mutex<()>>,
}

impl GlobalLock {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExecutionLock for GlobalLock {
    async fn acquire(&self) -> ExecutionGuard {
        ExecutionGuard::new(Arc::clone(&self.inner).lock_owned().await)
    }
}

/// How a finished script exited
#[derive(Debug, Clone, Copy)]
pub struct ScriptExit {
    pub pid: u32,
    pub status: ExitStatus,
}

/// Launches a script and waits for it to exit.
#[async_trait]
pub trait ScriptRunner: Send + Sync {
    async fn run(&self, script_path: &str) -> Result<ScriptExit, HookError>;
}

/// Runs `<shell> <script_path>` with stdio discarded.
#[derive(Debug, Clone)]
pub struct ShellRunner {
    shell: PathBuf,
}

impl ShellRunner {
    pub fn new(shell: impl Into<PathBuf>) -> Self {
        Self {
            shell: shell.into(),
        }
    }
}

impl Default for ShellRunner {
    fn default() -> Self {
        Self::new(DEFAULT_SHELL)
    }
}

#[async_trait]
impl ScriptRunner for ShellRunner {
    async fn run(&self, script_path: &str) -> Result<ScriptExit, HookError> {
        let mut child = Command::new(&self.shell)
            .arg(script_path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|source| HookError::ScriptLaunch {
                script: script_path.to_string(),
                source,
            })?;

        // only None once the child has been polled to completion
        let pid = child.id().unwrap_or_default();
        info!("Started script {:?}, process pid: {}", script_path, pid);

        let status = child
            .wait()
            .await
            .map_err(|source| HookError::ScriptWait { pid, source })?;

        if status.success() {
            Ok(ScriptExit { pid, status })
        } else {
            Err(HookError::ScriptFailed { pid, status })
        }
    }
}
