//! Request-to-script dispatch.
//!
//! A merged pull-request hook whose URL contains `/hooks` runs the script
//! registered under the URL's last segment. Runs are detached from the
//! request and serialized behind the execution lock.

use std::sync::Arc;

use chrono::Utc;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::registry::ScriptRegistry;
use crate::runner::{ExecutionLock, ScriptRunner};
use crate::webhook::HookEvent;

/// Substring a URL must contain before its last segment is used as a key
pub const HOOKS_MARKER: &str = "/hooks";

pub const MSG_SUCCESS: &str = "请求成功";
pub const MSG_NO_SCRIPT: &str = "hook运行失败, 未配置脚本";
pub const MSG_NOT_MERGED: &str = "hook运行失败, pr未合并";
pub const MSG_UNSUPPORTED_HOOK: &str = "hook运行失败, 不支持的hook类型";

/// Outcome of evaluating one decoded hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// `hook_name` is not a merge-request hook
    UnsupportedHook(String),
    NotMerged,
    /// The URL does not contain `/hooks`
    NoScriptRoute,
    /// The key is absent from the registry or maps to a blank path
    Unconfigured { key: String },
    Run { key: String, script: String },
}

impl Decision {
    /// Message reported back to the webhook sender.
    pub fn message(&self) -> &'static str {
        match self {
            Decision::UnsupportedHook(_) => MSG_UNSUPPORTED_HOOK,
            Decision::NotMerged => MSG_NOT_MERGED,
            Decision::NoScriptRoute => MSG_NO_SCRIPT,
            Decision::Unconfigured { .. } | Decision::Run { .. } => MSG_SUCCESS,
        }
    }
}

/// Everything after the last `/` of the URL, query string included.
pub fn registry_key(url: &str) -> &str {
    url.rsplit_once('/').map_or(url, |(_, key)| key)
}

pub struct Dispatcher {
    registry: Arc<ScriptRegistry>,
    lock: Arc<dyn ExecutionLock>,
    runner: Arc<dyn ScriptRunner>,
    tasks: TaskTracker,
}

impl Dispatcher {
    pub fn new(
        registry: ScriptRegistry,
        lock: Arc<dyn ExecutionLock>,
        runner: Arc<dyn ScriptRunner>,
    ) -> Self {
        Self {
            registry: Arc::new(registry),
            lock,
            runner,
            tasks: TaskTracker::new(),
        }
    }

    /// Evaluate `event` received at `url` without running anything.
    pub fn decide(&self, url: &str, event: &HookEvent) -> Decision {
        if !event.is_pull_request_hook() {
            return Decision::UnsupportedHook(event.hook_name.clone());
        }
        if !event.pull_request.merged {
            return Decision::NotMerged;
        }
        if !url.contains(HOOKS_MARKER) {
            return Decision::NoScriptRoute;
        }

        let key = registry_key(url).to_string();
        match self.registry.lookup(&key) {
            Some(script) => Decision::Run {
                script: script.to_string(),
                key,
            },
            None => Decision::Unconfigured { key },
        }
    }

    /// Evaluate `event` and, when a script is configured, start it in the
    /// background. Returns without waiting for the script.
    pub fn dispatch(&self, url: &str, event: &HookEvent) -> Decision {
        let decision = self.decide(url, event);

        match &decision {
            Decision::UnsupportedHook(hook_name) => {
                error!("Hook not running, unsupported hook type: {}", hook_name);
            }
            Decision::NotMerged => {
                error!("Hook not running, pull request not merged");
            }
            Decision::NoScriptRoute => {
                error!("Hook not running, no script to run for url {}", url);
            }
            Decision::Unconfigured { key } => {
                info!("Received hook request, project name is {}", event.project_name());
                warn!("No script configured for key '{}', skipping", key);
            }
            Decision::Run { key, script } => {
                info!("Received hook request, project name is {}", event.project_name());
                self.spawn_run(key.clone(), script.clone());
            }
        }

        decision
    }

    fn spawn_run(&self, key: String, script: String) {
        let lock = Arc::clone(&self.lock);
        let runner = Arc::clone(&self.runner);
        let run_id = Uuid::now_v7();

        self.tasks.spawn(async move {
            // Only one script runs at a time, whichever key triggered it
            let _guard = lock.acquire().await;

            let started_at = Utc::now();
            info!("Run {} - executing {:?} for key '{}'", run_id, script, key);

            let result = runner.run(&script).await;
            let cost_ms = (Utc::now() - started_at).num_milliseconds();

            match result {
                Ok(exit) => info!(
                    "Run {} - process executed successfully, pid: {}, cost: {}ms",
                    run_id, exit.pid, cost_ms
                ),
                Err(e) => error!("Run {} - execute script error: {} (cost: {}ms)", run_id, e, cost_ms),
            }
        });
    }

    /// Number of detached runs that have not finished yet, including those
    /// still waiting for the lock.
    pub fn in_flight(&self) -> usize {
        self.tasks.len()
    }

    /// Wait until every detached run spawned so far has finished.
    pub async fn wait_idle(&self) {
        self.tasks.close();
        self.tasks.wait().await;
        self.tasks.reopen();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HookError;
    use crate::runner::{ExecutionGuard, GlobalLock, ScriptExit};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::os::unix::process::ExitStatusExt;
    use std::process::ExitStatus;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Records every script it is asked to run and tracks overlap.
    #[derive(Default)]
    struct RecordingRunner {
        started: Mutex<Vec<String>>,
        running: AtomicUsize,
        max_running: AtomicUsize,
    }

    #[async_trait]
    impl ScriptRunner for RecordingRunner {
        async fn run(&self, script_path: &str) -> Result<ScriptExit, HookError> {
            self.started.lock().unwrap().push(script_path.to_string());
            let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_running.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(30)).await;
            self.running.fetch_sub(1, Ordering::SeqCst);
            Ok(ScriptExit {
                pid: 1,
                status: ExitStatus::from_raw(0),
            })
        }
    }

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum LockEvent {
        Acquired,
        Released,
    }

    struct TracedGuard {
        _inner: ExecutionGuard,
        events: Arc<Mutex<Vec<LockEvent>>>,
    }

    impl Drop for TracedGuard {
        fn drop(&mut self) {
            self.events.lock().unwrap().push(LockEvent::Released);
        }
    }

    /// Wraps the real lock and records acquire/release order.
    #[derive(Default)]
    struct TracingLock {
        inner: GlobalLock,
        events: Arc<Mutex<Vec<LockEvent>>>,
    }

    #[async_trait]
    impl ExecutionLock for TracingLock {
        async fn acquire(&self) -> ExecutionGuard {
            let inner = self.inner.acquire().await;
            self.events.lock().unwrap().push(LockEvent::Acquired);
            ExecutionGuard::new(TracedGuard {
                _inner: inner,
                events: Arc::clone(&self.events),
            })
        }
    }

    fn registry() -> ScriptRegistry {
        ScriptRegistry::new(HashMap::from([
            ("widgets".to_string(), "/opt/widgets.sh".to_string()),
            ("gadgets".to_string(), "/opt/gadgets.sh".to_string()),
            ("blank".to_string(), "  \t".to_string()),
        ]))
    }

    fn merged_event() -> HookEvent {
        let mut event = HookEvent {
            hook_name: "merge_request_hooks".to_string(),
            ..Default::default()
        };
        event.pull_request.merged = true;
        event.pull_request.base.repo.full_name = "acme/widgets".to_string();
        event
    }

    fn dispatcher(runner: Arc<RecordingRunner>) -> Dispatcher {
        Dispatcher::new(registry(), Arc::new(GlobalLock::new()), runner)
    }

    #[test]
    fn registry_key_is_last_segment() {
        assert_eq!(registry_key("/hooks/widgets"), "widgets");
        assert_eq!(registry_key("/a/b/hooks/widgets?x=1"), "widgets?x=1");
        assert_eq!(registry_key("/hooks/"), "");
        assert_eq!(registry_key("no-slash"), "no-slash");
    }

    #[tokio::test]
    async fn unsupported_hook_type_runs_nothing() {
        let runner = Arc::new(RecordingRunner::default());
        let dispatcher = dispatcher(Arc::clone(&runner));
        let mut event = merged_event();
        event.hook_name = "push_hooks".to_string();

        let decision = dispatcher.dispatch("/hooks/widgets", &event);
        dispatcher.wait_idle().await;

        assert_eq!(decision, Decision::UnsupportedHook("push_hooks".to_string()));
        assert_eq!(decision.message(), MSG_UNSUPPORTED_HOOK);
        assert!(runner.started.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn unmerged_pull_request_runs_nothing() {
        let runner = Arc::new(RecordingRunner::default());
        let dispatcher = dispatcher(Arc::clone(&runner));
        let mut event = merged_event();
        event.pull_request.merged = false;

        let decision = dispatcher.dispatch("/hooks/widgets", &event);
        dispatcher.wait_idle().await;

        assert_eq!(decision.message(), MSG_NOT_MERGED);
        assert!(runner.started.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn url_without_hooks_marker_runs_nothing() {
        let runner = Arc::new(RecordingRunner::default());
        let dispatcher = dispatcher(Arc::clone(&runner));

        let decision = dispatcher.dispatch("/deploy/widgets", &merged_event());
        dispatcher.wait_idle().await;

        assert_eq!(decision, Decision::NoScriptRoute);
        assert_eq!(decision.message(), MSG_NO_SCRIPT);
        assert!(runner.started.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn hooks_marker_matches_anywhere_in_url() {
        let runner = Arc::new(RecordingRunner::default());
        let dispatcher = dispatcher(Arc::clone(&runner));

        let decision = dispatcher.decide("/deploy?from=/hooks/widgets", &merged_event());
        assert_eq!(
            decision,
            Decision::Run {
                key: "widgets".to_string(),
                script: "/opt/widgets.sh".to_string()
            }
        );
    }

    #[tokio::test]
    async fn missing_or_blank_key_is_a_silent_success() {
        let runner = Arc::new(RecordingRunner::default());
        let dispatcher = dispatcher(Arc::clone(&runner));

        let missing = dispatcher.dispatch("/hooks/unknown", &merged_event());
        let blank = dispatcher.dispatch("/hooks/blank", &merged_event());
        dispatcher.wait_idle().await;

        assert_eq!(missing.message(), MSG_SUCCESS);
        assert_eq!(blank, Decision::Unconfigured { key: "blank".to_string() });
        assert!(runner.started.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn configured_key_runs_exactly_one_script() {
        let runner = Arc::new(RecordingRunner::default());
        let dispatcher = dispatcher(Arc::clone(&runner));

        let decision = dispatcher.dispatch("/hooks/widgets", &merged_event());
        assert_eq!(decision.message(), MSG_SUCCESS);
        dispatcher.wait_idle().await;

        assert_eq!(*runner.started.lock().unwrap(), vec!["/opt/widgets.sh"]);
        assert_eq!(dispatcher.in_flight(), 0);
    }

    #[tokio::test]
    async fn concurrent_runs_never_overlap() {
        let runner = Arc::new(RecordingRunner::default());
        let lock = Arc::new(TracingLock::default());
        let events = Arc::clone(&lock.events);
        let dispatcher = Dispatcher::new(registry(), lock, Arc::clone(&runner) as Arc<dyn ScriptRunner>);

        dispatcher.dispatch("/hooks/widgets", &merged_event());
        dispatcher.dispatch("/hooks/gadgets", &merged_event());
        dispatcher.dispatch("/hooks/widgets", &merged_event());
        dispatcher.wait_idle().await;

        assert_eq!(runner.started.lock().unwrap().len(), 3);
        assert_eq!(runner.max_running.load(Ordering::SeqCst), 1);

        let events = events.lock().unwrap();
        assert_eq!(events.len(), 6);
        for pair in events.chunks(2) {
            assert_eq!(pair, [LockEvent::Acquired, LockEvent::Released]);
        }
    }
}
