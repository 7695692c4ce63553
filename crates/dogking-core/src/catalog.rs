//! ============================================================================
//! Item Catalog - Cache and Selection Filter
//! ============================================================================
//! The catalog is fetched once per run and held in memory. Filtering is a
//! pure function of (catalog, facet selection, mode): AND across the three
//! facet categories, OR within one, with an empty category passing
//! everything. Custom-item mode bypasses facets entirely.
//! ============================================================================

use std::collections::{BTreeSet, HashMap};

use crate::types::Item;

/// One checkbox toggle per facet value: selecting an already-selected
/// value deselects it. Empty set = no filter for that category.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FacetSelection {
    pub element: BTreeSet<u32>,
    pub weapon: BTreeSet<u32>,
    pub acquisition: BTreeSet<u32>,
}

impl FacetSelection {
    pub fn is_empty(&self) -> bool {
        self.element.is_empty() && self.weapon.is_empty() && self.acquisition.is_empty()
    }

    pub fn toggle_element(&mut self, code: u32) {
        toggle(&mut self.element, code);
    }

    pub fn toggle_weapon(&mut self, code: u32) {
        toggle(&mut self.weapon, code);
    }

    pub fn toggle_acquisition(&mut self, code: u32) {
        toggle(&mut self.acquisition, code);
    }

    /// An item matches when every non-empty category contains the item's
    /// own tag. An untagged item can only pass an unfiltered category.
    fn matches(&self, item: &Item) -> bool {
        facet_passes(&self.element, item.details.zo)
            && facet_passes(&self.weapon, item.details.bu)
            && facet_passes(&self.acquisition, item.details.get)
    }
}

fn toggle(set: &mut BTreeSet<u32>, code: u32) {
    if !set.insert(code) {
        set.remove(&code);
    }
}

fn facet_passes(selected: &BTreeSet<u32>, tag: Option<u32>) -> bool {
    selected.is_empty() || tag.is_some_and(|t| selected.contains(&t))
}

/// Which view of the catalog is active. The two are mutually exclusive:
/// custom mode ignores the facet selection entirely.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterMode {
    #[default]
    Facets,
    CustomOnly,
}

/// In-memory catalog with an id index for basket resolution.
#[derive(Debug, Default)]
pub struct Catalog {
    items: Vec<Item>,
    by_id: HashMap<String, usize>,
}

impl Catalog {
    pub fn new(items: Vec<Item>) -> Self {
        let by_id = items
            .iter()
            .enumerate()
            .map(|(idx, item)| (item.id.clone(), idx))
            .collect();
        Self { items, by_id }
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Item> {
        self.by_id.get(id).map(|&idx| &self.items[idx])
    }

    /// Derive the filtered view. An empty result is valid.
    pub fn filter(&self, selection: &FacetSelection, mode: FilterMode) -> Vec<&Item> {
        match mode {
            FilterMode::CustomOnly => self.items.iter().filter(|i| i.is_custom()).collect(),
            FilterMode::Facets => self.items.iter().filter(|i| selection.matches(i)).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ItemDetails;

    fn item(id: &str, dtype: i64, zo: Option<u32>, bu: Option<u32>, get: Option<u32>) -> Item {
        Item {
            id: id.to_string(),
            name: format!("item {}", id),
            img: format!("https://cdn/{}.jpg", id),
            dtype,
            details: ItemDetails { zo, bu, get },
        }
    }

    fn catalog() -> Catalog {
        Catalog::new(vec![
            item("fire-sword", 0, Some(1), Some(1), Some(1)),
            item("water-dagger", 0, Some(2), Some(2), Some(1)),
            item("fire-dagger", 0, Some(1), Some(2), Some(2)),
            item("untagged", 1, None, None, None),
            item("custom-badge", 2, None, None, None),
        ])
    }

    fn ids(items: Vec<&Item>) -> Vec<&str> {
        items.into_iter().map(|i| i.id.as_str()).collect()
    }

    #[test]
    fn test_empty_selection_passes_everything() {
        let cat = catalog();
        let sel = FacetSelection::default();
        assert_eq!(cat.filter(&sel, FilterMode::Facets).len(), cat.len());
    }

    #[test]
    fn test_or_within_category() {
        let cat = catalog();
        let mut sel = FacetSelection::default();
        sel.toggle_element(1);
        sel.toggle_element(2);
        assert_eq!(
            ids(cat.filter(&sel, FilterMode::Facets)),
            vec!["fire-sword", "water-dagger", "fire-dagger"]
        );
    }

    #[test]
    fn test_and_across_categories() {
        let cat = catalog();
        let mut sel = FacetSelection::default();
        sel.toggle_element(1);
        sel.toggle_weapon(2);
        assert_eq!(ids(cat.filter(&sel, FilterMode::Facets)), vec!["fire-dagger"]);
    }

    #[test]
    fn test_untagged_item_fails_filtered_category() {
        let cat = catalog();
        let mut sel = FacetSelection::default();
        sel.toggle_acquisition(1);
        let result = ids(cat.filter(&sel, FilterMode::Facets));
        assert!(!result.contains(&"untagged"));
        assert_eq!(result, vec!["fire-sword", "water-dagger"]);
    }

    #[test]
    fn test_toggle_roundtrip() {
        let mut sel = FacetSelection::default();
        sel.toggle_weapon(3);
        assert!(sel.weapon.contains(&3));
        sel.toggle_weapon(3);
        assert!(sel.is_empty());
    }

    #[test]
    fn test_custom_mode_ignores_facets() {
        let cat = catalog();
        let mut sel = FacetSelection::default();
        sel.toggle_element(1);
        sel.toggle_weapon(1);
        assert_eq!(
            ids(cat.filter(&sel, FilterMode::CustomOnly)),
            vec!["custom-badge"]
        );
    }

    #[test]
    fn test_id_index() {
        let cat = catalog();
        assert_eq!(cat.get("water-dagger").map(|i| i.details.zo), Some(Some(2)));
        assert!(cat.get("missing").is_none());
    }
}
