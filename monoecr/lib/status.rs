//! Progress bookkeeping for the transfers of a push.
//!
//! A [`StatusTracker`] is shared between the tasks that move bytes (which update it as parts are
//! acknowledged) and whoever renders progress (which polls it). All access goes through a lock,
//! so a reader never observes a half-updated record.

use std::{
    collections::{HashMap, HashSet},
    fmt,
    sync::{Arc, Mutex, PoisonError, RwLock},
};

use chrono::{DateTime, Utc};
use getset::{CopyGetters, Getters};
use serde::{Deserialize, Serialize};

use crate::{EcrError, EcrResult};

//--------------------------------------------------------------------------------------------------
// Types
//--------------------------------------------------------------------------------------------------

/// The phase a transfer is in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferState {
    /// Not started yet.
    #[default]
    Waiting,

    /// Resolving the reference.
    Resolving,

    /// Downloading content.
    Downloading,

    /// Uploading content.
    Uploading,

    /// All bytes are sent and the upload is being finalized.
    Committing,

    /// Finished.
    Done,

    /// The content was already present on the remote.
    Exists,
}

/// The progress of one transfer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Getters, CopyGetters)]
pub struct Status {
    /// The key the transfer is tracked under.
    #[getset(get = "pub")]
    ref_key: String,

    /// The current phase.
    #[getset(get_copy = "pub")]
    state: TransferState,

    /// The number of bytes acknowledged so far.
    #[getset(get_copy = "pub")]
    offset: u64,

    /// The expected total number of bytes.
    #[getset(get_copy = "pub")]
    total: u64,

    /// The remote upload id while an upload is open.
    #[getset(get = "pub")]
    upload_id: Option<String>,

    /// When the transfer started.
    #[getset(get_copy = "pub")]
    started_at: DateTime<Utc>,

    /// When the record last changed.
    #[getset(get_copy = "pub")]
    updated_at: DateTime<Utc>,
}

/// A concurrently accessible map from reference key to [`Status`].
#[derive(Debug, Default)]
pub struct StatusTracker {
    statuses: RwLock<HashMap<String, Status>>,
}

/// The references a push touches, in the order they were first seen.
#[derive(Debug)]
pub struct PushJobs {
    tracker: Arc<StatusTracker>,
    jobs: Mutex<Jobs>,
}

#[derive(Debug, Default)]
struct Jobs {
    seen: HashSet<String>,
    ordered: Vec<String>,
}

/// A display-ready view of one job.
#[derive(Debug, Clone, PartialEq, Eq, Getters, CopyGetters)]
pub struct StatusInfo {
    /// The key the transfer is tracked under.
    #[getset(get = "pub")]
    ref_key: String,

    /// The phase derived for display.
    #[getset(get_copy = "pub")]
    state: TransferState,

    /// The number of bytes acknowledged so far.
    #[getset(get_copy = "pub")]
    offset: u64,

    /// The expected total number of bytes.
    #[getset(get_copy = "pub")]
    total: u64,

    /// When the transfer started, if it has.
    #[getset(get_copy = "pub")]
    started_at: Option<DateTime<Utc>>,

    /// When the record last changed, if it has.
    #[getset(get_copy = "pub")]
    updated_at: Option<DateTime<Utc>>,
}

//--------------------------------------------------------------------------------------------------
// Methods
//--------------------------------------------------------------------------------------------------

impl Status {
    /// Creates a status that starts now.
    pub fn new(ref_key: impl Into<String>, state: TransferState, total: u64) -> Self {
        let now = Utc::now();
        Self {
            ref_key: ref_key.into(),
            state,
            offset: 0,
            total,
            upload_id: None,
            started_at: now,
            updated_at: now,
        }
    }

    /// Sets the remote upload id.
    pub fn with_upload_id(mut self, upload_id: impl Into<String>) -> Self {
        self.upload_id = Some(upload_id.into());
        self
    }

    /// Moves the transfer into `state`.
    pub fn set_state(&mut self, state: TransferState) {
        self.state = state;
    }

    /// Sets or clears the remote upload id.
    pub fn set_upload_id(&mut self, upload_id: Option<String>) {
        self.upload_id = upload_id;
    }

    /// Raises the acknowledged offset to `offset`. Lower values are ignored.
    pub fn advance(&mut self, offset: u64) {
        self.offset = self.offset.max(offset);
    }
}

impl StatusTracker {
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the status stored under its reference key.
    pub fn set_status(&self, status: Status) {
        self.write().insert(status.ref_key.clone(), status);
    }

    /// Returns a snapshot of the status stored under `ref_key`.
    pub fn get_status(&self, ref_key: &str) -> EcrResult<Status> {
        self.read()
            .get(ref_key)
            .cloned()
            .ok_or_else(|| EcrError::NotFound(ref_key.to_string()))
    }

    /// Applies `f` to the status stored under `ref_key` and stamps the update time.
    pub fn update<F>(&self, ref_key: &str, f: F) -> EcrResult<()>
    where
        F: FnOnce(&mut Status),
    {
        let mut statuses = self.write();
        let status = statuses
            .get_mut(ref_key)
            .ok_or_else(|| EcrError::NotFound(ref_key.to_string()))?;

        f(status);
        status.updated_at = Utc::now();
        Ok(())
    }

    /// Applies `f` to the status stored under `ref_key`, inserting `seed()` first if nothing is
    /// stored there.
    ///
    /// Used by transfers that must keep reporting progress even after a reader removed their
    /// record.
    pub fn upsert<S, F>(&self, ref_key: &str, seed: S, f: F)
    where
        S: FnOnce() -> Status,
        F: FnOnce(&mut Status),
    {
        let mut statuses = self.write();
        let status = statuses.entry(ref_key.to_string()).or_insert_with(seed);
        f(status);
        status.updated_at = Utc::now();
    }

    /// Raises the acknowledged offset of `ref_key` to `offset`.
    ///
    /// The offset never moves backwards, so callbacks finishing out of order cannot make progress
    /// appear to regress.
    pub fn advance(&self, ref_key: &str, offset: u64) -> EcrResult<()> {
        self.update(ref_key, |status| status.advance(offset))
    }

    /// Removes the status stored under `ref_key`.
    pub fn remove(&self, ref_key: &str) -> Option<Status> {
        self.write().remove(ref_key)
    }

    /// Returns snapshots of every tracked status.
    pub fn statuses(&self) -> Vec<Status> {
        self.read().values().cloned().collect()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, HashMap<String, Status>> {
        // Statuses are plain data, so a map behind a poisoned lock is still usable.
        self.statuses.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Status>> {
        self.statuses.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl PushJobs {
    /// Creates an empty job list reading progress from `tracker`.
    pub fn new(tracker: Arc<StatusTracker>) -> Self {
        Self {
            tracker,
            jobs: Mutex::new(Jobs::default()),
        }
    }

    /// Records `ref_key` as part of the push. Adding a key twice keeps its first position.
    pub fn add(&self, ref_key: impl Into<String>) {
        let ref_key = ref_key.into();
        let mut jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        if jobs.seen.insert(ref_key.clone()) {
            jobs.ordered.push(ref_key);
        }
    }

    /// Returns the display state of every job, in the order the jobs were added.
    ///
    /// Jobs without a status are waiting. A job whose offset reached its total is committing
    /// while its upload is still open and done afterwards. Content found on the remote is
    /// reported as existing.
    pub fn statuses(&self) -> Vec<StatusInfo> {
        let jobs = self.jobs.lock().unwrap_or_else(PoisonError::into_inner);
        jobs.ordered
            .iter()
            .map(|ref_key| match self.tracker.get_status(ref_key) {
                Ok(status) => StatusInfo::from(status),
                Err(_) => StatusInfo {
                    ref_key: ref_key.clone(),
                    state: TransferState::Waiting,
                    offset: 0,
                    total: 0,
                    started_at: None,
                    updated_at: None,
                },
            })
            .collect()
    }
}

//--------------------------------------------------------------------------------------------------
// Trait Implementations
//--------------------------------------------------------------------------------------------------

impl From<Status> for StatusInfo {
    fn from(status: Status) -> Self {
        let state = match status.state {
            TransferState::Exists => TransferState::Exists,
            _ if status.offset >= status.total => match status.upload_id {
                Some(_) => TransferState::Committing,
                None => TransferState::Done,
            },
            _ => TransferState::Uploading,
        };

        Self {
            ref_key: status.ref_key,
            state,
            offset: status.offset,
            total: status.total,
            started_at: Some(status.started_at),
            updated_at: Some(status.updated_at),
        }
    }
}

impl fmt::Display for TransferState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = match self {
            TransferState::Waiting => "waiting",
            TransferState::Resolving => "resolving",
            TransferState::Downloading => "downloading",
            TransferState::Uploading => "uploading",
            TransferState::Committing => "committing",
            TransferState::Done => "done",
            TransferState::Exists => "exists",
        };

        write!(f, "{state}")
    }
}

//--------------------------------------------------------------------------------------------------
// Tests
//--------------------------------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_tracker_set_get_remove() {
        let tracker = StatusTracker::new();
        assert!(matches!(
            tracker.get_status("layer-a"),
            Err(EcrError::NotFound(key)) if key == "layer-a"
        ));

        tracker.set_status(Status::new("layer-a", TransferState::Uploading, 10).with_upload_id("u1"));

        let status = tracker.get_status("layer-a").unwrap();
        assert_eq!(status.state(), TransferState::Uploading);
        assert_eq!(status.total(), 10);
        assert_eq!(status.upload_id().as_deref(), Some("u1"));
        assert_eq!(tracker.statuses(), [status.clone()]);

        assert!(tracker.remove("layer-a").is_some());
        assert!(tracker.get_status("layer-a").is_err());
        assert!(tracker.remove("layer-a").is_none());
    }

    #[test]
    fn test_status_tracker_offset_never_decreases() {
        let tracker = StatusTracker::new();
        tracker.set_status(Status::new("layer-a", TransferState::Uploading, 10));

        tracker.advance("layer-a", 6).unwrap();
        tracker.advance("layer-a", 3).unwrap();
        assert_eq!(tracker.get_status("layer-a").unwrap().offset(), 6);

        tracker.advance("layer-a", 10).unwrap();
        let status = tracker.get_status("layer-a").unwrap();
        assert_eq!(status.offset(), 10);
        assert!(status.updated_at() >= status.started_at());

        assert!(tracker.advance("missing", 1).is_err());
    }

    #[test]
    fn test_status_tracker_upsert_reseeds_removed_status() {
        let tracker = StatusTracker::new();
        let seed = || Status::new("layer-a", TransferState::Uploading, 10).with_upload_id("u1");

        tracker.upsert("layer-a", seed, |status| status.advance(4));
        let status = tracker.get_status("layer-a").unwrap();
        assert_eq!(status.offset(), 4);
        assert_eq!(status.upload_id().as_deref(), Some("u1"));

        // An existing record is updated in place; the seed is not used.
        tracker.upsert("layer-a", || unreachable!(), |status| status.advance(8));
        assert_eq!(tracker.get_status("layer-a").unwrap().offset(), 8);

        tracker.remove("layer-a");
        tracker.upsert("layer-a", seed, |status| status.set_state(TransferState::Committing));
        let status = tracker.get_status("layer-a").unwrap();
        assert_eq!(status.state(), TransferState::Committing);
        assert_eq!(status.offset(), 0);
        assert_eq!(status.total(), 10);
    }

    #[test]
    fn test_status_tracker_concurrent_updates() {
        let tracker = Arc::new(StatusTracker::new());
        tracker.set_status(Status::new("layer-a", TransferState::Uploading, 4000));

        let writers: Vec<_> = (0..4u64)
            .map(|t| {
                let tracker = Arc::clone(&tracker);
                std::thread::spawn(move || {
                    for i in 1..=1000u64 {
                        tracker.advance("layer-a", t * 1000 + i).unwrap();
                    }
                })
            })
            .collect();

        let reader = {
            let tracker = Arc::clone(&tracker);
            std::thread::spawn(move || {
                let mut last = 0;
                for _ in 0..1000 {
                    let offset = tracker.get_status("layer-a").unwrap().offset();
                    assert!(offset >= last, "offset went from {last} to {offset}");
                    last = offset;
                }
            })
        };

        for writer in writers {
            writer.join().unwrap();
        }
        reader.join().unwrap();

        assert_eq!(tracker.get_status("layer-a").unwrap().offset(), 4000);
    }

    #[test]
    fn test_push_jobs_derives_display_states() {
        let tracker = Arc::new(StatusTracker::new());
        let jobs = PushJobs::new(Arc::clone(&tracker));

        jobs.add("layer-waiting");
        jobs.add("layer-uploading");
        jobs.add("layer-committing");
        jobs.add("layer-done");
        jobs.add("layer-exists");
        jobs.add("layer-uploading");

        let mut uploading = Status::new("layer-uploading", TransferState::Uploading, 10);
        uploading.advance(4);
        tracker.set_status(uploading);

        let mut committing =
            Status::new("layer-committing", TransferState::Uploading, 10).with_upload_id("u1");
        committing.advance(10);
        tracker.set_status(committing);

        let mut done = Status::new("layer-done", TransferState::Uploading, 10);
        done.advance(10);
        tracker.set_status(done);

        tracker.set_status(Status::new("layer-exists", TransferState::Exists, 10));

        let states: Vec<_> = jobs
            .statuses()
            .into_iter()
            .map(|info| (info.ref_key().clone(), info.state()))
            .collect();

        assert_eq!(
            states,
            [
                ("layer-waiting".to_string(), TransferState::Waiting),
                ("layer-uploading".to_string(), TransferState::Uploading),
                ("layer-committing".to_string(), TransferState::Committing),
                ("layer-done".to_string(), TransferState::Done),
                ("layer-exists".to_string(), TransferState::Exists),
            ]
        );
    }
}
