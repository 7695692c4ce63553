//! ============================================================================
//! Score Basket - One Day's Selected Item Ids
//! ============================================================================
//! Ordered list of chosen ids, duplicates allowed (the scoring rules credit
//! repeated pulls of the same item). The wire form is the comma-joined list.
//! ============================================================================

use crate::catalog::Catalog;
use crate::types::Item;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Basket {
    ids: Vec<String>,
}

impl Basket {
    /// Parse the wire form. Empty segments are dropped and ids trimmed,
    /// so "" and "," both parse to an empty basket.
    pub fn from_joined(joined: &str) -> Self {
        let ids = joined
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        Self { ids }
    }

    /// Comma-joined wire form.
    pub fn joined(&self) -> String {
        self.ids.join(",")
    }

    pub fn ids(&self) -> &[String] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Append unconditionally; repeated selection is intentional.
    pub fn add(&mut self, id: impl Into<String>) {
        self.ids.push(id.into());
    }

    /// Remove the first occurrence only. No-op (false) if absent.
    pub fn remove_first(&mut self, id: &str) -> bool {
        match self.ids.iter().position(|x| x == id) {
            Some(pos) => {
                self.ids.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Map ids to catalog items for display. Dangling ids (catalog not
    /// loaded yet, or removed upstream) are skipped, not errors.
    pub fn resolve<'a>(&self, catalog: &'a Catalog) -> Vec<&'a Item> {
        self.ids.iter().filter_map(|id| catalog.get(id)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Item, ItemDetails};

    fn catalog() -> Catalog {
        Catalog::new(vec![
            Item {
                id: "a".into(),
                name: "A".into(),
                img: "https://cdn/a.jpg".into(),
                dtype: 0,
                details: ItemDetails::default(),
            },
            Item {
                id: "b".into(),
                name: "B".into(),
                img: "https://cdn/b.jpg".into(),
                dtype: 0,
                details: ItemDetails::default(),
            },
        ])
    }

    #[test]
    fn test_add_then_remove_restores_prior_state() {
        let mut basket = Basket::from_joined("a,b,a");
        let before = basket.clone();
        basket.add("b");
        assert!(basket.remove_first("b"));
        assert_eq!(basket, before);
    }

    #[test]
    fn test_remove_first_occurrence_only() {
        let mut basket = Basket::from_joined("a,b,a");
        assert!(basket.remove_first("a"));
        assert_eq!(basket.ids(), ["b", "a"]);
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut basket = Basket::from_joined("a,b");
        assert!(!basket.remove_first("c"));
        assert_eq!(basket.ids(), ["a", "b"]);
    }

    #[test]
    fn test_duplicates_allowed_and_order_kept() {
        let mut basket = Basket::default();
        basket.add("a");
        basket.add("a");
        basket.add("b");
        assert_eq!(basket.joined(), "a,a,b");
    }

    #[test]
    fn test_from_joined_skips_empty_segments() {
        assert!(Basket::from_joined("").is_empty());
        assert_eq!(Basket::from_joined("a, b,,c ").ids(), ["a", "b", "c"]);
    }

    #[test]
    fn test_resolve_skips_dangling_ids() {
        let basket = Basket::from_joined("a,gone,b,a");
        let cat = catalog();
        let names: Vec<&str> = basket
            .resolve(&cat)
            .into_iter()
            .map(|i| i.name.as_str())
            .collect();
        assert_eq!(names, ["A", "B", "A"]);
    }
}
