//! Draft-to-live identifier maps for a single publish call
//!
//! An `IdRemap` is created fresh by each publish, threaded by reference
//! through the clone routines, and dropped when the call returns.

use std::collections::HashMap;
use uuid::Uuid;

/// How an optional draft reference resolved against the remap
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolved {
    /// The draft row had no reference
    Absent,
    /// Mapped onto a row created in this publish
    Live(Uuid),
    /// Pointed at a draft row that was not cloned
    Dangling(Uuid),
}

impl Resolved {
    pub fn live_id(self) -> Option<Uuid> {
        match self {
            Resolved::Live(id) => Some(id),
            Resolved::Absent | Resolved::Dangling(_) => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct IdRemap {
    modules: HashMap<Uuid, Uuid>,
    lessons: HashMap<Uuid, Uuid>,
}

impl IdRemap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_module(&mut self, draft_id: Uuid, live_id: Uuid) {
        self.modules.insert(draft_id, live_id);
    }

    pub fn record_lesson(&mut self, draft_id: Uuid, live_id: Uuid) {
        self.lessons.insert(draft_id, live_id);
    }

    pub fn module(&self, draft_id: Uuid) -> Option<Uuid> {
        self.modules.get(&draft_id).copied()
    }

    pub fn resolve_module(&self, draft_id: Option<Uuid>) -> Resolved {
        resolve(&self.modules, draft_id)
    }

    pub fn resolve_lesson(&self, draft_id: Option<Uuid>) -> Resolved {
        resolve(&self.lessons, draft_id)
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    pub fn lesson_count(&self) -> usize {
        self.lessons.len()
    }
}

fn resolve(map: &HashMap<Uuid, Uuid>, draft_id: Option<Uuid>) -> Resolved {
    match draft_id {
        None => Resolved::Absent,
        Some(id) => map
            .get(&id)
            .map_or(Resolved::Dangling(id), |live| Resolved::Live(*live)),
    }
}
