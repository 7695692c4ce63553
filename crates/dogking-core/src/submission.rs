//! ============================================================================
//! Date-Gated Submission Control
//! ============================================================================
//! One parameterized controller covers both submission surfaces the event
//! ran on: the legacy shared score pool (key -> ids) and per-user daily
//! reporting (date -> ids, gated to the single admin-allowed date).
//!
//! The server is the source of truth post-write: every successful submit
//! replaces the local map and basket with the server's response. A failed
//! submit leaves local state untouched.
//! ============================================================================

use anyhow::Result;
use tracing::{debug, info};

use crate::api::ScoreApi;
use crate::basket::Basket;
use crate::catalog::{Catalog, FacetSelection, FilterMode};
use crate::types::{admin_date, Item, ScoreError, ScoreMap, SCORE_DATE_ID};

/// Pool key the admin sheet opens on.
pub const DEFAULT_POOL_KEY: &str = "15";

/// Submission surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionMode {
    /// Shared key -> ids map edited by the admin.
    Pool,
    /// Per-user date -> ids map, one entry per reported day.
    PerUserDate,
}

/// Behavior switches for a [`ScoreSheet`]. The browser UI shipped these as
/// separate page revisions; here they are one component with a config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmissionConfig {
    pub mode: SubmissionMode,
    /// Compare the selected date against the admin scoring date.
    pub date_gating: bool,
    /// Offer the custom-item catalog view instead of facet filtering.
    pub custom_item_filter: bool,
}

impl SubmissionConfig {
    /// Legacy pool sheet: no gating, facet filtering.
    pub fn pool() -> Self {
        Self {
            mode: SubmissionMode::Pool,
            date_gating: false,
            custom_item_filter: false,
        }
    }

    /// Daily reporting sheet: gated to the admin scoring date.
    pub fn per_user_date() -> Self {
        Self {
            mode: SubmissionMode::PerUserDate,
            date_gating: true,
            custom_item_filter: false,
        }
    }
}

/// Whether the submit action is exposed for the current selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateState {
    Editable,
    ReadOnly,
}

/// Compares a selected date against the admin-allowed date. Exact string
/// equality, not calendar equality.
#[derive(Debug, Clone, Default)]
pub struct DateGate {
    allowed: Option<String>,
}

impl DateGate {
    pub fn new(allowed: Option<String>) -> Self {
        Self { allowed }
    }

    pub fn allowed_date(&self) -> Option<&str> {
        self.allowed.as_deref()
    }

    pub fn state(&self, selected: &str) -> GateState {
        match &self.allowed {
            Some(allowed) if allowed == selected => GateState::Editable,
            _ => GateState::ReadOnly,
        }
    }
}

/// A user's working copy of one score map plus the basket being edited.
pub struct ScoreSheet {
    config: SubmissionConfig,
    uid: Option<String>,
    entries: ScoreMap,
    gate: DateGate,
    active_key: Option<String>,
    basket: Basket,
}

impl ScoreSheet {
    /// Fetch the sheet's backing map (and the admin scoring date when
    /// gating is on) and open it on its default key, if any.
    pub async fn load(api: &ScoreApi, config: SubmissionConfig, uid: Option<String>) -> Result<Self> {
        let entries = match config.mode {
            SubmissionMode::Pool => api.scorelist().await?,
            SubmissionMode::PerUserDate => {
                let uid = uid.as_deref().ok_or(ScoreError::NotLoggedIn)?;
                api.user_scores_by_date(uid).await?
            }
        };

        let gate = if config.date_gating {
            let dates = api.ad_times().await?;
            DateGate::new(admin_date(&dates, SCORE_DATE_ID).map(str::to_string))
        } else {
            DateGate::default()
        };

        let mut sheet = Self::from_state(config, uid, entries, gate);
        if config.mode == SubmissionMode::Pool {
            sheet.select_key(DEFAULT_POOL_KEY);
        }
        Ok(sheet)
    }

    /// Assemble a sheet from already-fetched state.
    pub fn from_state(
        config: SubmissionConfig,
        uid: Option<String>,
        entries: ScoreMap,
        gate: DateGate,
    ) -> Self {
        Self {
            config,
            uid,
            entries,
            gate,
            active_key: None,
            basket: Basket::default(),
        }
    }

    pub fn config(&self) -> SubmissionConfig {
        self.config
    }

    pub fn entries(&self) -> &ScoreMap {
        &self.entries
    }

    pub fn active_key(&self) -> Option<&str> {
        self.active_key.as_deref()
    }

    pub fn basket(&self) -> &Basket {
        &self.basket
    }

    pub fn gate(&self) -> &DateGate {
        &self.gate
    }

    /// Switch the active date (or pool key). The basket is replaced
    /// wholesale from the mirrored map: unsaved edits to the previous
    /// selection are discarded without warning.
    pub fn select_key(&mut self, key: &str) {
        self.active_key = Some(key.to_string());
        self.basket = Basket::from_joined(self.entries.get(key).map(String::as_str).unwrap_or(""));
        debug!("Selected key {} ({} ids)", key, self.basket.len());
    }

    /// Re-evaluated on every selection change; no intermediate states.
    pub fn gate_state(&self) -> GateState {
        if !self.config.date_gating {
            return GateState::Editable;
        }
        match &self.active_key {
            Some(key) => self.gate.state(key),
            None => GateState::ReadOnly,
        }
    }

    /// The pick list this sheet offers: the custom-item pool when the
    /// sheet is configured for it, the facet-filtered view otherwise.
    pub fn catalog_view<'a>(
        &self,
        catalog: &'a Catalog,
        selection: &FacetSelection,
    ) -> Vec<&'a Item> {
        let mode = if self.config.custom_item_filter {
            FilterMode::CustomOnly
        } else {
            FilterMode::Facets
        };
        catalog.filter(selection, mode)
    }

    pub fn add_item(&mut self, id: impl Into<String>) {
        self.basket.add(id);
    }

    pub fn remove_item(&mut self, id: &str) -> bool {
        self.basket.remove_first(id)
    }

    /// Post the basket for the active key and adopt the server's response
    /// as the new local truth. Refused outside the `Editable` state.
    pub async fn submit(&mut self, api: &ScoreApi) -> Result<()> {
        let key = self
            .active_key
            .clone()
            .ok_or(ScoreError::NoActiveKey)?;

        if self.gate_state() == GateState::ReadOnly {
            return Err(ScoreError::SubmissionClosed {
                selected: key,
                allowed: self.gate.allowed_date().unwrap_or("(unset)").to_string(),
            }
            .into());
        }

        let value = self.basket.joined();
        let updated = match self.config.mode {
            SubmissionMode::Pool => api.score_update(&key, &value).await?,
            SubmissionMode::PerUserDate => {
                let uid = self.uid.as_deref().ok_or(ScoreError::NotLoggedIn)?;
                api.update_user_score(uid, &key, &value).await?
            }
        };

        info!("Submission accepted for {}", key);
        self.adopt(updated);
        Ok(())
    }

    fn adopt(&mut self, entries: ScoreMap) {
        self.entries = entries;
        if let Some(key) = self.active_key.clone() {
            self.select_key(&key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(pairs: &[(&str, &str)]) -> ScoreMap {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_gate_string_equality() {
        let gate = DateGate::new(Some("2024-05-01".into()));
        assert_eq!(gate.state("2024-05-01"), GateState::Editable);
        assert_eq!(gate.state("2024-05-02"), GateState::ReadOnly);
    }

    #[test]
    fn test_gate_without_allowed_date_is_read_only() {
        let gate = DateGate::default();
        assert_eq!(gate.state("2024-05-01"), GateState::ReadOnly);
    }

    #[test]
    fn test_select_key_replaces_basket_wholesale() {
        let mut sheet = ScoreSheet::from_state(
            SubmissionConfig::per_user_date(),
            Some("u1".into()),
            entries(&[("2024-05-01", "a,b"), ("2024-05-02", "c")]),
            DateGate::new(Some("2024-05-02".into())),
        );

        sheet.select_key("2024-05-01");
        sheet.add_item("x");
        assert_eq!(sheet.basket().joined(), "a,b,x");

        // Switching days discards the unsaved edit.
        sheet.select_key("2024-05-02");
        assert_eq!(sheet.basket().joined(), "c");
        sheet.select_key("2024-05-01");
        assert_eq!(sheet.basket().joined(), "a,b");
    }

    #[test]
    fn test_select_unknown_key_gives_empty_basket() {
        let mut sheet = ScoreSheet::from_state(
            SubmissionConfig::per_user_date(),
            Some("u1".into()),
            entries(&[]),
            DateGate::new(Some("2024-05-01".into())),
        );
        sheet.select_key("2024-05-03");
        assert!(sheet.basket().is_empty());
    }

    #[test]
    fn test_gate_state_tracks_selection() {
        let mut sheet = ScoreSheet::from_state(
            SubmissionConfig::per_user_date(),
            Some("u1".into()),
            entries(&[]),
            DateGate::new(Some("2024-05-01".into())),
        );
        assert_eq!(sheet.gate_state(), GateState::ReadOnly);
        sheet.select_key("2024-05-01");
        assert_eq!(sheet.gate_state(), GateState::Editable);
        sheet.select_key("2024-05-02");
        assert_eq!(sheet.gate_state(), GateState::ReadOnly);
    }

    #[test]
    fn test_pool_sheet_is_never_gated() {
        let mut sheet = ScoreSheet::from_state(
            SubmissionConfig::pool(),
            None,
            entries(&[("15", "a")]),
            DateGate::default(),
        );
        sheet.select_key("15");
        assert_eq!(sheet.gate_state(), GateState::Editable);
    }

    #[tokio::test]
    async fn test_submit_refused_when_read_only() {
        let api = ScoreApi::new("http://127.0.0.1:9").unwrap();
        let mut sheet = ScoreSheet::from_state(
            SubmissionConfig::per_user_date(),
            Some("u1".into()),
            entries(&[("2024-05-02", "a")]),
            DateGate::new(Some("2024-05-01".into())),
        );
        sheet.select_key("2024-05-02");

        // Gate refusal happens before any network traffic.
        let err = sheet.submit(&api).await.unwrap_err();
        let gate_err = err.downcast_ref::<ScoreError>().unwrap();
        assert!(matches!(gate_err, ScoreError::SubmissionClosed { .. }));
        // Local state untouched.
        assert_eq!(sheet.basket().joined(), "a");
    }

    #[tokio::test]
    async fn test_submit_without_selection_refused() {
        let api = ScoreApi::new("http://127.0.0.1:9").unwrap();
        let mut sheet = ScoreSheet::from_state(
            SubmissionConfig::per_user_date(),
            Some("u1".into()),
            entries(&[]),
            DateGate::new(Some("2024-05-01".into())),
        );
        let err = sheet.submit(&api).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<ScoreError>().unwrap(),
            ScoreError::NoActiveKey
        ));
    }

    #[test]
    fn test_custom_filter_config_overrides_facets() {
        use crate::types::ItemDetails;

        let catalog = Catalog::new(vec![
            Item {
                id: "plain".into(),
                name: "Plain".into(),
                img: "https://cdn/p.jpg".into(),
                dtype: 0,
                details: ItemDetails { zo: Some(1), bu: Some(1), get: Some(1) },
            },
            Item {
                id: "badge".into(),
                name: "Badge".into(),
                img: "https://cdn/b.jpg".into(),
                dtype: 2,
                details: ItemDetails::default(),
            },
        ]);
        let mut selection = FacetSelection::default();
        selection.toggle_element(1);

        let config = SubmissionConfig {
            custom_item_filter: true,
            ..SubmissionConfig::per_user_date()
        };
        let sheet = ScoreSheet::from_state(config, Some("u1".into()), entries(&[]), DateGate::default());
        let view: Vec<&str> = sheet
            .catalog_view(&catalog, &selection)
            .iter()
            .map(|i| i.id.as_str())
            .collect();
        assert_eq!(view, ["badge"]);
    }

    #[test]
    fn test_adopt_resyncs_basket_from_response() {
        let mut sheet = ScoreSheet::from_state(
            SubmissionConfig::pool(),
            None,
            entries(&[("15", "a,b")]),
            DateGate::default(),
        );
        sheet.select_key("15");
        sheet.add_item("c");
        sheet.adopt(entries(&[("15", "a,b,c")]));
        assert_eq!(sheet.basket().joined(), "a,b,c");
        assert_eq!(sheet.entries()["15"], "a,b,c");
    }
}
