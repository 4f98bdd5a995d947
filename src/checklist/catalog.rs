use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::dossier::Checkpoint;
use crate::store::WorkflowStore;
use crate::workflows::errors::WorkflowError;

pub type CategoryId = i64;
pub type ItemId = i64;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistCategory {
    pub id: CategoryId,
    pub checkpoint: Checkpoint,
    pub name: String,
    pub display_order: i32,
    pub active: bool,
}

/// A yes/no control question belonging to a category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub id: ItemId,
    pub category_id: CategoryId,
    pub name: String,
    pub mandatory: bool,
    pub display_order: i32,
    pub active: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogCategory {
    #[serde(flatten)]
    pub category: ChecklistCategory,
    pub items: Vec<ChecklistItem>,
}

/// The active, ordered checklist of one checkpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveCatalog {
    pub checkpoint: Checkpoint,
    pub categories: Vec<CatalogCategory>,
}

impl ActiveCatalog {
    /// Builds the active view from raw reference rows. Inactive categories hide
    /// their items even when the items themselves are active.
    pub fn assemble(
        checkpoint: Checkpoint,
        categories: Vec<ChecklistCategory>,
        items: Vec<ChecklistItem>,
    ) -> Self {
        let mut active_categories: Vec<ChecklistCategory> = categories
            .into_iter()
            .filter(|c| c.active && c.checkpoint == checkpoint)
            .collect();
        active_categories.sort_by(|a, b| {
            a.display_order
                .cmp(&b.display_order)
                .then_with(|| a.name.cmp(&b.name))
                .then_with(|| a.id.cmp(&b.id))
        });

        let mut by_category: HashMap<CategoryId, Vec<ChecklistItem>> = HashMap::new();
        for item in items.into_iter().filter(|i| i.active) {
            by_category.entry(item.category_id).or_default().push(item);
        }

        let categories = active_categories
            .into_iter()
            .map(|category| {
                let mut items = by_category.remove(&category.id).unwrap_or_default();
                items.sort_by(|a, b| {
                    a.display_order
                        .cmp(&b.display_order)
                        .then_with(|| a.name.cmp(&b.name))
                        .then_with(|| a.id.cmp(&b.id))
                });
                CatalogCategory { category, items }
            })
            .collect();

        Self {
            checkpoint,
            categories,
        }
    }

    pub fn items(&self) -> impl Iterator<Item = &ChecklistItem> {
        self.categories.iter().flat_map(|c| c.items.iter())
    }

    pub fn mandatory_items(&self) -> impl Iterator<Item = &ChecklistItem> {
        self.items().filter(|i| i.mandatory)
    }

    pub fn find_item(&self, item_id: ItemId) -> Option<&ChecklistItem> {
        self.items().find(|i| i.id == item_id)
    }

    pub fn item_count(&self) -> usize {
        self.items().count()
    }

    /// True when the checkpoint has no active item at all.
    pub fn is_empty(&self) -> bool {
        self.item_count() == 0
    }
}

/// Read-only access to the checklist reference data.
#[derive(Clone)]
pub struct ChecklistCatalog {
    store: Arc<dyn WorkflowStore>,
}

impl std::fmt::Debug for ChecklistCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChecklistCatalog").finish_non_exhaustive()
    }
}

impl ChecklistCatalog {
    pub fn new(store: Arc<dyn WorkflowStore>) -> Self {
        Self { store }
    }

    pub async fn active_catalog(&self, checkpoint: Checkpoint) -> Result<ActiveCatalog, WorkflowError> {
        let (categories, items) = self.store.catalog_rows(checkpoint).await?;
        let catalog = ActiveCatalog::assemble(checkpoint, categories, items);
        debug!(
            checkpoint = %checkpoint,
            categories = catalog.categories.len(),
            items = catalog.item_count(),
            "Loaded active checklist catalog"
        );
        Ok(catalog)
    }

    /// Ordered active categories with their ordered active items.
    pub async fn list_active_categories(
        &self,
        checkpoint: Checkpoint,
    ) -> Result<Vec<CatalogCategory>, WorkflowError> {
        Ok(self.active_catalog(checkpoint).await?.categories)
    }

    /// Catalog used to validate a submission; an empty catalog cannot validate anything.
    pub async fn load_for_submission(&self, checkpoint: Checkpoint) -> Result<ActiveCatalog, WorkflowError> {
        let catalog = self.active_catalog(checkpoint).await?;
        if catalog.is_empty() {
            return Err(WorkflowError::EmptyCatalog { checkpoint });
        }
        Ok(catalog)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn category(id: CategoryId, order: i32, active: bool) -> ChecklistCategory {
        ChecklistCategory {
            id,
            checkpoint: Checkpoint::BudgetControl,
            name: format!("Category {id}"),
            display_order: order,
            active,
        }
    }

    fn item(id: ItemId, category_id: CategoryId, order: i32, active: bool) -> ChecklistItem {
        ChecklistItem {
            id,
            category_id,
            name: format!("Item {id}"),
            mandatory: id % 2 == 0,
            display_order: order,
            active,
        }
    }

    #[test]
    fn test_assemble_orders_and_filters() {
        let catalog = ActiveCatalog::assemble(
            Checkpoint::BudgetControl,
            vec![category(1, 2, true), category(2, 1, true), category(3, 0, false)],
            vec![
                item(10, 1, 2, true),
                item(11, 1, 1, true),
                item(12, 1, 0, false),
                item(20, 2, 1, true),
                item(30, 3, 1, true),
            ],
        );

        let ids: Vec<CategoryId> = catalog.categories.iter().map(|c| c.category.id).collect();
        assert_eq!(ids, vec![2, 1]);
        let items: Vec<ItemId> = catalog.items().map(|i| i.id).collect();
        assert_eq!(items, vec![20, 11, 10]);
        assert!(catalog.find_item(30).is_none(), "items of inactive categories are hidden");
    }

    #[test]
    fn test_other_checkpoint_rows_are_ignored() {
        let mut foreign = category(4, 0, true);
        foreign.checkpoint = Checkpoint::OrderingOfficer;
        let catalog = ActiveCatalog::assemble(
            Checkpoint::BudgetControl,
            vec![foreign],
            vec![item(40, 4, 0, true)],
        );
        assert!(catalog.is_empty());
    }
}
