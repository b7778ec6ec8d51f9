use tracing::warn;

use super::store::{KvStore, read_json, write_json};
use crate::model::{Checklist, EntityId};

pub fn snapshot_key(project_id: &EntityId) -> String {
    format!("checklists_{project_id}")
}

/// Persist the canonical tree after an optimistic update. Best effort.
pub fn write_snapshot(store: &dyn KvStore, project_id: &EntityId, checklists: &[Checklist]) {
    if let Err(e) = write_json(store, &snapshot_key(project_id), checklists) {
        warn!(project = %project_id, error = %e, "could not write checklist snapshot");
    }
}

pub fn read_snapshot(store: &dyn KvStore, project_id: &EntityId) -> Option<Vec<Checklist>> {
    match read_json(store, &snapshot_key(project_id)) {
        Ok(snapshot) => snapshot,
        Err(e) => {
            warn!(project = %project_id, error = %e, "could not read checklist snapshot");
            None
        }
    }
}
