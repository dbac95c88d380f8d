use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

pub const MAX_COMPARED: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompareOutcome {
    Added,
    Removed,
    AlreadyPresent,
    Full,
}

/// Products picked for side-by-side comparison, at most [`MAX_COMPARED`]
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Comparator {
    product_ids: Vec<Uuid>,
}

impl Comparator {
    pub fn product_ids(&self) -> &[Uuid] {
        &self.product_ids
    }

    pub fn contains(&self, product_id: Uuid) -> bool {
        self.product_ids.contains(&product_id)
    }

    pub fn is_full(&self) -> bool {
        self.product_ids.len() >= MAX_COMPARED
    }

    pub fn add(&mut self, product_id: Uuid) -> CompareOutcome {
        if self.contains(product_id) {
            CompareOutcome::AlreadyPresent
        } else if self.is_full() {
            CompareOutcome::Full
        } else {
            self.product_ids.push(product_id);
            CompareOutcome::Added
        }
    }

    pub fn toggle(&mut self, product_id: Uuid) -> CompareOutcome {
        if self.remove(product_id) {
            CompareOutcome::Removed
        } else {
            self.add(product_id)
        }
    }

    pub fn remove(&mut self, product_id: Uuid) -> bool {
        let before = self.product_ids.len();
        self.product_ids.retain(|id| *id != product_id);
        self.product_ids.len() != before
    }

    pub fn clear(&mut self) {
        self.product_ids.clear();
    }
}
