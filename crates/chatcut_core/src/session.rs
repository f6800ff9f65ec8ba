use parking_lot::{Mutex, RwLock};
use std::collections::HashSet;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{CoreError, Result};
use crate::ops::{EditOp, EditOutcome};
use crate::types::{Media, Project};

type LockSet = Arc<Mutex<HashSet<Uuid>>>;

/// Shared editing state for one open project.
///
/// Readers take an immutable [`snapshot`](Self::snapshot); writers build the
/// next project from a clone and swap it in, so a snapshot never changes
/// under its holder. Clips with a transform in flight are leased and
/// refuse every other edit until the lease drops.
pub struct EditorSession {
    project: RwLock<Arc<Project>>,
    locks: LockSet,
}

impl EditorSession {
    pub fn new(project: Project) -> Self {
        Self {
            project: RwLock::new(Arc::new(project)),
            locks: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn snapshot(&self) -> Arc<Project> {
        self.project.read().clone()
    }

    /// Swap in a whole new project, e.g. after loading from disk.
    pub fn replace(&self, project: Project) {
        *self.project.write() = Arc::new(project);
        self.locks.lock().clear();
    }

    /// Run an edit that does not target an existing clip (adding clips,
    /// registering media, changing the project length).
    pub fn update<T>(&self, f: impl FnOnce(&mut Project) -> Result<T>) -> Result<T> {
        self.commit(None, f)
    }

    /// Run an edit on `clip_id`, refused while the clip is leased.
    pub fn edit_clip<T>(
        &self,
        clip_id: Uuid,
        f: impl FnOnce(&mut Project) -> Result<T>,
    ) -> Result<T> {
        self.commit(Some(clip_id), f)
    }

    /// Apply a structural op under the clip lock check.
    pub fn apply(&self, op: &EditOp) -> Result<EditOutcome> {
        self.edit_clip(op.clip_id(), |p| p.apply_structural(op))
    }

    /// Reserve `clip_id` for a long-running transform.
    pub fn lock_clip(&self, clip_id: Uuid) -> Result<ClipLease> {
        self.snapshot().timeline.clip(clip_id)?;
        if !self.locks.lock().insert(clip_id) {
            tracing::warn!(clip_id = %clip_id, "Clip already locked");
            return Err(CoreError::ClipLocked(clip_id));
        }
        tracing::debug!(clip_id = %clip_id, "Clip locked");
        Ok(ClipLease {
            clip_id,
            locks: Arc::clone(&self.locks),
        })
    }

    pub fn is_locked(&self, clip_id: Uuid) -> bool {
        self.locks.lock().contains(&clip_id)
    }

    fn commit<T>(
        &self,
        guarded: Option<Uuid>,
        f: impl FnOnce(&mut Project) -> Result<T>,
    ) -> Result<T> {
        let mut current = self.project.write();
        if let Some(clip_id) = guarded {
            if self.locks.lock().contains(&clip_id) {
                tracing::warn!(clip_id = %clip_id, "Edit rejected: clip is locked");
                return Err(CoreError::ClipLocked(clip_id));
            }
        }
        let mut next = (**current).clone();
        match f(&mut next) {
            Ok(out) => {
                *current = Arc::new(next);
                Ok(out)
            }
            Err(e) => {
                tracing::warn!(clip_id = ?guarded, error = %e, "Edit rejected");
                Err(e)
            }
        }
    }
}

/// Exclusive hold on one clip. Dropping it releases the clip.
pub struct ClipLease {
    clip_id: Uuid,
    locks: LockSet,
}

impl ClipLease {
    pub fn clip_id(&self) -> Uuid {
        self.clip_id
    }

    /// Point the leased clip at freshly derived media, then release it.
    pub fn commit_transform(self, session: &EditorSession, derived: Media) -> Result<EditOutcome> {
        session.commit(None, |p| p.commit_transform(self.clip_id, derived))
    }
}

impl Drop for ClipLease {
    fn drop(&mut self) {
        self.locks.lock().remove(&self.clip_id);
        tracing::debug!(clip_id = %self.clip_id, "Clip unlocked");
    }
}
