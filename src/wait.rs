//! Convergence Poller
//!
//! Blocks a command until a server-side operation settles, calling a progress
//! callback once per cycle while it waits.
//!
//! Two entry points share the same loop shape:
//! - [`wait_for_status`] polls a status function until the resource reports a
//!   success or error status. Unbounded unless [`StatusWait::timeout`] is set.
//! - [`wait_for_delete`] polls a manager until the resource disappears, goes to
//!   an error status, or the timeout elapses.
//!
//! Elapsed time is the sum of the sleep intervals, not wall-clock time.

use crate::error::{BackendError, CommandError, NOT_FOUND, NO_UNIQUE_MATCH};
use crate::resource::{get_field_or, FieldSource, Identifier, ResolutionOutcome, ResourceManager};
use serde_json::Value;
use std::future::Future;
use std::time::Duration;

/// Default sleep between two polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Default bound for deletion waits
pub const DEFAULT_DELETE_TIMEOUT: Duration = Duration::from_secs(300);

/// Field read for progress reports
const PROGRESS_FIELD: &str = "progress";

/// Terminal state of a wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// Status reached the success set
    Success,
    /// Status reached the error set
    Error,
    /// Gave up waiting
    TimedOut,
    /// The resource no longer exists
    Deleted,
}

impl WaitOutcome {
    /// Boolean form: `true` for Success and Deleted
    pub fn is_success(self) -> bool {
        matches!(self, Self::Success | Self::Deleted)
    }
}

/// Options for [`wait_for_status`]
#[derive(Debug, Clone)]
pub struct StatusWait {
    pub status_field: String,
    pub success_status: Vec<String>,
    pub error_status: Vec<String>,
    pub interval: Duration,
    /// `None` polls until a terminal status is seen
    pub timeout: Option<Duration>,
}

impl Default for StatusWait {
    fn default() -> Self {
        Self {
            status_field: "status".to_string(),
            success_status: vec!["active".to_string()],
            error_status: vec!["error".to_string()],
            interval: DEFAULT_POLL_INTERVAL,
            timeout: None,
        }
    }
}

/// Options for [`wait_for_delete`]
#[derive(Debug, Clone)]
pub struct DeleteWait {
    pub status_field: String,
    pub error_status: Vec<String>,
    /// Failure kinds meaning "the resource is gone"
    pub not_found_markers: Vec<String>,
    pub interval: Duration,
    pub timeout: Duration,
}

impl Default for DeleteWait {
    fn default() -> Self {
        Self {
            status_field: "status".to_string(),
            error_status: vec!["error".to_string()],
            not_found_markers: vec![NOT_FOUND.to_string()],
            interval: DEFAULT_POLL_INTERVAL,
            timeout: DEFAULT_DELETE_TIMEOUT,
        }
    }
}

/// Progress callback, receives the resource's progress value (0 when absent)
pub type ProgressFn<'a> = &'a mut (dyn FnMut(f64) + Send);

/// Lower-cased status, empty when the field is absent or not a string
fn read_status<R: FieldSource + ?Sized>(resource: &R, field: &str) -> String {
    match get_field_or(resource, field, Value::Null) {
        Value::String(s) => s.to_lowercase(),
        _ => String::new(),
    }
}

fn read_progress<R: FieldSource + ?Sized>(resource: &R) -> f64 {
    match get_field_or(resource, PROGRESS_FIELD, Value::Null) {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}

/// `status` is already lower-cased; configured sets are compared as given
fn in_set(set: &[String], status: &str) -> bool {
    set.iter().any(|s| s == status)
}

/// Poll `status_fetch` until the resource reaches a terminal status
///
/// Returns `true` on a success status, `false` on an error status (or on
/// timeout when [`StatusWait::timeout`] is set). Fetch failures propagate.
pub async fn wait_for_status<R, F, Fut>(
    status_fetch: F,
    res_id: &Identifier,
    opts: &StatusWait,
    on_progress: Option<ProgressFn<'_>>,
) -> Result<bool, CommandError>
where
    R: FieldSource,
    F: FnMut(Identifier) -> Fut,
    Fut: Future<Output = Result<R, BackendError>>,
{
    wait_for_status_outcome(status_fetch, res_id, opts, on_progress)
        .await
        .map(WaitOutcome::is_success)
}

/// Like [`wait_for_status`], reporting which terminal state was reached
pub async fn wait_for_status_outcome<R, F, Fut>(
    mut status_fetch: F,
    res_id: &Identifier,
    opts: &StatusWait,
    mut on_progress: Option<ProgressFn<'_>>,
) -> Result<WaitOutcome, CommandError>
where
    R: FieldSource,
    F: FnMut(Identifier) -> Fut,
    Fut: Future<Output = Result<R, BackendError>>,
{
    let mut elapsed = Duration::ZERO;

    loop {
        if let Some(timeout) = opts.timeout {
            if elapsed >= timeout {
                tracing::info!("gave up waiting for {} after {:?}", res_id, elapsed);
                return Ok(WaitOutcome::TimedOut);
            }
        }

        let resource = status_fetch(res_id.clone()).await?;
        let status = read_status(&resource, &opts.status_field);

        if in_set(&opts.success_status, &status) {
            tracing::info!("{} reached status '{}'", res_id, status);
            return Ok(WaitOutcome::Success);
        }
        if in_set(&opts.error_status, &status) {
            tracing::warn!("{} went to error status '{}'", res_id, status);
            return Ok(WaitOutcome::Error);
        }

        tracing::debug!("{} is '{}', polling again in {:?}", res_id, status, opts.interval);
        if let Some(callback) = on_progress.as_deref_mut() {
            callback(read_progress(&resource));
        }
        tokio::time::sleep(opts.interval).await;
        elapsed += opts.interval;
    }
}

/// Poll `manager` until the resource is gone
///
/// Returns `true` once a lookup reports the resource missing: a failure whose
/// kind is in [`DeleteWait::not_found_markers`], or an explicit not-found
/// outcome while the markers include `"NotFound"`. Returns `false` on an error status or
/// when the timeout elapses. Any other lookup failure propagates.
pub async fn wait_for_delete<M>(
    manager: &M,
    res_id: &Identifier,
    opts: &DeleteWait,
    on_progress: Option<ProgressFn<'_>>,
) -> Result<bool, CommandError>
where
    M: ResourceManager + ?Sized,
{
    wait_for_delete_outcome(manager, res_id, opts, on_progress)
        .await
        .map(WaitOutcome::is_success)
}

/// Like [`wait_for_delete`], reporting which terminal state was reached
pub async fn wait_for_delete_outcome<M>(
    manager: &M,
    res_id: &Identifier,
    opts: &DeleteWait,
    mut on_progress: Option<ProgressFn<'_>>,
) -> Result<WaitOutcome, CommandError>
where
    M: ResourceManager + ?Sized,
{
    let mut elapsed = Duration::ZERO;

    while elapsed < opts.timeout {
        let failure = match manager.get(res_id).await {
            ResolutionOutcome::Found(resource) => {
                let status = read_status(&resource, &opts.status_field);
                if in_set(&opts.error_status, &status) {
                    tracing::warn!("{} {} went to error status '{}'", manager.resource_kind(), res_id, status);
                    return Ok(WaitOutcome::Error);
                }

                tracing::debug!(
                    "{} {} still present ('{}'), {:?} of {:?} elapsed",
                    manager.resource_kind(),
                    res_id,
                    status,
                    elapsed,
                    opts.timeout
                );
                if let Some(callback) = on_progress.as_deref_mut() {
                    callback(read_progress(&resource));
                }
                tokio::time::sleep(opts.interval).await;
                elapsed += opts.interval;
                continue;
            }
            ResolutionOutcome::NotFound(source) => {
                // An explicit not-found answers to the generic marker and to its own kind
                if opts.not_found_markers.iter().any(|m| m == NOT_FOUND) {
                    tracing::info!("{} {} deleted", manager.resource_kind(), res_id);
                    return Ok(WaitOutcome::Deleted);
                }
                source.unwrap_or_else(|| BackendError::not_found(res_id.to_string()))
            }
            ResolutionOutcome::Ambiguous => BackendError::new(NO_UNIQUE_MATCH, res_id.to_string()),
            ResolutionOutcome::Fault(e) => e,
        };

        if failure.is_kind_in(&opts.not_found_markers) {
            tracing::info!("{} {} deleted", manager.resource_kind(), res_id);
            return Ok(WaitOutcome::Deleted);
        }
        tracing::error!("waiting for deletion of {} failed: {}", res_id, failure);
        return Err(failure.into());
    }

    tracing::info!(
        "timed out after {:?} waiting for {} {} to be deleted",
        opts.timeout,
        manager.resource_kind(),
        res_id
    );
    Ok(WaitOutcome::TimedOut)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    fn status_opts() -> StatusWait {
        StatusWait::default()
    }

    /// Status function replaying `snapshots`, repeating the last one forever
    fn replay(
        snapshots: Vec<Value>,
    ) -> (
        Mutex<VecDeque<Value>>,
        Mutex<usize>,
    ) {
        (Mutex::new(snapshots.into()), Mutex::new(0))
    }

    fn next_snapshot(queue: &Mutex<VecDeque<Value>>, count: &Mutex<usize>) -> Value {
        *count.lock().unwrap() += 1;
        let mut queue = queue.lock().unwrap();
        if queue.len() > 1 {
            queue.pop_front().unwrap()
        } else {
            queue.front().cloned().unwrap()
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_success_first_cycle() {
        let (queue, count) = replay(vec![json!({"status": "ACTIVE"})]);
        let mut progress = Vec::new();
        let mut record = |p: f64| progress.push(p);

        let done = wait_for_status(
            |_| {
                let snapshot = next_snapshot(&queue, &count);
                async move { Ok::<_, BackendError>(snapshot) }
            },
            &"srv-1".into(),
            &status_opts(),
            Some(&mut record),
        )
        .await
        .unwrap();

        assert!(done);
        assert_eq!(*count.lock().unwrap(), 1);
        assert!(progress.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_polls_until_success() {
        let (queue, count) = replay(vec![
            json!({"status": "BUILD", "progress": 10}),
            json!({"status": "BUILD"}),
            json!({"status": "Active", "progress": 100}),
        ]);
        let mut progress = Vec::new();
        let mut record = |p: f64| progress.push(p);
        let start = tokio::time::Instant::now();

        let outcome = wait_for_status_outcome(
            |_| {
                let snapshot = next_snapshot(&queue, &count);
                async move { Ok::<_, BackendError>(snapshot) }
            },
            &"srv-1".into(),
            &status_opts(),
            Some(&mut record),
        )
        .await
        .unwrap();

        assert_eq!(outcome, WaitOutcome::Success);
        assert_eq!(*count.lock().unwrap(), 3);
        assert_eq!(progress, vec![10.0, 0.0]);
        assert_eq!(start.elapsed(), Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_error() {
        let (queue, count) = replay(vec![json!({"status": "building"}), json!({"status": "ERROR"})]);

        let done = wait_for_status(
            |_| {
                let snapshot = next_snapshot(&queue, &count);
                async move { Ok::<_, BackendError>(snapshot) }
            },
            &"srv-1".into(),
            &status_opts(),
            None,
        )
        .await
        .unwrap();

        assert!(!done);
        assert_eq!(*count.lock().unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_custom_sets_and_field() {
        let (queue, count) = replay(vec![
            json!({"state": null, "progress": "35"}),
            json!({"state": "Available"}),
        ]);
        let opts = StatusWait {
            status_field: "state".to_string(),
            success_status: vec!["available".to_string(), "in-use".to_string()],
            error_status: vec!["error_restoring".to_string()],
            interval: Duration::from_secs(2),
            timeout: None,
        };
        let mut progress = Vec::new();
        let mut record = |p: f64| progress.push(p);

        let done = wait_for_status(
            |_| {
                let snapshot = next_snapshot(&queue, &count);
                async move { Ok::<_, BackendError>(snapshot) }
            },
            &"vol-9".into(),
            &opts,
            Some(&mut record),
        )
        .await
        .unwrap();

        assert!(done);
        assert_eq!(progress, vec![35.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_bounded_by_timeout() {
        let (queue, count) = replay(vec![json!({"status": "build"})]);
        let opts = StatusWait {
            timeout: Some(Duration::from_secs(10)),
            ..StatusWait::default()
        };

        let outcome = wait_for_status_outcome(
            |_| {
                let snapshot = next_snapshot(&queue, &count);
                async move { Ok::<_, BackendError>(snapshot) }
            },
            &"srv-1".into(),
            &opts,
            None,
        )
        .await
        .unwrap();

        assert_eq!(outcome, WaitOutcome::TimedOut);
        assert_eq!(*count.lock().unwrap(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_sets_are_not_lower_cased() {
        let (queue, count) = replay(vec![json!({"status": "ACTIVE"})]);
        let opts = StatusWait {
            success_status: vec!["ACTIVE".to_string()],
            timeout: Some(Duration::from_secs(10)),
            ..StatusWait::default()
        };

        let outcome = wait_for_status_outcome(
            |_| {
                let snapshot = next_snapshot(&queue, &count);
                async move { Ok::<_, BackendError>(snapshot) }
            },
            &"srv-1".into(),
            &opts,
            None,
        )
        .await
        .unwrap();

        // The status reads as "active", which the upper-case set never contains
        assert_eq!(outcome, WaitOutcome::TimedOut);
    }

    #[tokio::test(start_paused = true)]
    async fn test_status_fetch_failure_propagates() {
        let err = wait_for_status(
            |id: Identifier| async move {
                Err::<Value, _>(BackendError::from_status(500, format!("boom on {}", id)))
            },
            &"srv-1".into(),
            &status_opts(),
            None,
        )
        .await
        .unwrap_err();

        assert!(matches!(err, CommandError::Backend(ref e) if e.message() == "boom on srv-1"));
    }

    /// Manager replaying scripted `get` outcomes, then reporting "deleting"
    struct ScriptedManager {
        script: Mutex<VecDeque<ResolutionOutcome<Value>>>,
        gets: Mutex<usize>,
    }

    impl ScriptedManager {
        fn new(script: Vec<ResolutionOutcome<Value>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                gets: Mutex::new(0),
            }
        }

        fn gets(&self) -> usize {
            *self.gets.lock().unwrap()
        }
    }

    #[async_trait]
    impl ResourceManager for ScriptedManager {
        type Resource = Value;

        fn resource_kind(&self) -> &str {
            "server"
        }

        async fn get(&self, _id: &Identifier) -> ResolutionOutcome<Value> {
            *self.gets.lock().unwrap() += 1;
            self.script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| ResolutionOutcome::Found(json!({"status": "deleting"})))
        }
    }

    fn deleting(progress: i64) -> ResolutionOutcome<Value> {
        ResolutionOutcome::Found(json!({"status": "DELETING", "progress": progress}))
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_not_found_outcome() {
        let manager = ScriptedManager::new(vec![deleting(20), deleting(60), ResolutionOutcome::NotFound(None)]);
        let mut progress = Vec::new();
        let mut record = |p: f64| progress.push(p);

        let done = wait_for_delete(&manager, &"srv-1".into(), &DeleteWait::default(), Some(&mut record))
            .await
            .unwrap();

        assert!(done);
        assert_eq!(manager.gets(), 3);
        assert_eq!(progress, vec![20.0, 60.0]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_marker_fault_counts_as_deleted() {
        let manager = ScriptedManager::new(vec![ResolutionOutcome::Fault(BackendError::from_status(
            404, "gone",
        ))]);
        let opts = DeleteWait {
            not_found_markers: vec!["NotFound".to_string(), "HTTPNotFound".to_string()],
            ..DeleteWait::default()
        };

        let outcome = wait_for_delete_outcome(&manager, &"srv-1".into(), &opts, None)
            .await
            .unwrap();
        assert_eq!(outcome, WaitOutcome::Deleted);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_not_found_matches_reported_kind() {
        let manager = ScriptedManager::new(vec![ResolutionOutcome::NotFound(Some(
            BackendError::from_status(404, "Instance could not be found"),
        ))]);
        let opts = DeleteWait {
            not_found_markers: vec!["HTTPNotFound".to_string()],
            ..DeleteWait::default()
        };

        let done = wait_for_delete(&manager, &"srv-1".into(), &opts, None).await.unwrap();
        assert!(done);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_unmatched_not_found_keeps_backend_error() {
        let manager = ScriptedManager::new(vec![ResolutionOutcome::NotFound(Some(
            BackendError::from_status(404, "Instance could not be found"),
        ))]);
        let opts = DeleteWait {
            not_found_markers: vec!["ResourceGone".to_string()],
            ..DeleteWait::default()
        };

        let err = wait_for_delete(&manager, &"srv-1".into(), &opts, None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CommandError::Backend(ref e)
                if e.kind() == "HTTPNotFound" && e.message() == "Instance could not be found"
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_unexpected_fault_propagates() {
        let manager = ScriptedManager::new(vec![
            deleting(0),
            ResolutionOutcome::Fault(BackendError::from_status(404, "gone")),
        ]);

        // Default markers only know "NotFound"
        let err = wait_for_delete(&manager, &"srv-1".into(), &DeleteWait::default(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, CommandError::Backend(ref e) if e.kind() == "HTTPNotFound"));
        assert_eq!(manager.gets(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_error_status() {
        let manager = ScriptedManager::new(vec![
            deleting(10),
            ResolutionOutcome::Found(json!({"status": "Error"})),
        ]);

        let outcome = wait_for_delete_outcome(&manager, &"srv-1".into(), &DeleteWait::default(), None)
            .await
            .unwrap();
        assert_eq!(outcome, WaitOutcome::Error);
    }

    #[tokio::test(start_paused = true)]
    async fn test_delete_times_out() {
        let manager = ScriptedManager::new(Vec::new());
        let opts = DeleteWait {
            interval: Duration::from_secs(5),
            timeout: Duration::from_secs(15),
            ..DeleteWait::default()
        };
        let mut calls = 0;
        let mut record = |p: f64| {
            assert_eq!(p, 0.0);
            calls += 1;
        };
        let start = tokio::time::Instant::now();

        let outcome = wait_for_delete_outcome(&manager, &"srv-1".into(), &opts, Some(&mut record))
            .await
            .unwrap();

        assert_eq!(outcome, WaitOutcome::TimedOut);
        assert!(!outcome.is_success());
        assert_eq!(manager.gets(), 3);
        assert_eq!(calls, 3);
        assert_eq!(start.elapsed(), Duration::from_secs(15));
    }

    #[test]
    fn test_read_helpers() {
        assert_eq!(read_status(&json!({"status": "BUILD"}), "status"), "build");
        assert_eq!(read_status(&json!({}), "status"), "");
        assert_eq!(read_status(&json!({"status": 3}), "status"), "");
        assert_eq!(read_progress(&json!({"progress": 0})), 0.0);
        assert_eq!(read_progress(&json!({"progress": null})), 0.0);
        assert_eq!(read_progress(&json!({"progress": 42.5})), 42.5);
        assert_eq!(read_progress(&json!({})), 0.0);
    }
}
