//! ============================================================================
//! Score API Client - Typed Wrapper over the Remote Scoring Service
//! ============================================================================
//! All business state (score ledgers, date windows, identity) lives behind
//! this HTTP API; the client mirrors it and never assumes a write stuck
//! until the server echoes it back:
//! - Login/register (uid handshake)
//! - Item catalog
//! - Pool and per-user-date score maps
//! - Admin dates and leaderboard feeds
//! ============================================================================

use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, info};

use crate::types::{AdminDate, DailyScore, Item, ScoreMap, User};

/// Default base URL of the scoring service.
pub const DEFAULT_API_URL: &str = "https://api.kero.zone/dogking";

/// Per-request timeout. Every failure is terminal for that one operation;
/// there is no retry policy.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Client for the remote scoring API.
pub struct ScoreApi {
    client: reqwest::Client,
    base_url: String,
}

impl ScoreApi {
    /// Create a client against the given base URL (no trailing slash needed).
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| anyhow!("Failed to build HTTP client: {}", e))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Base URL this client talks to.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // ========================================================================
    // Identity
    // ========================================================================

    /// Check credentials. `Ok(Some(uid))` on success, `Ok(None)` when the
    /// server rejects the pair (it answers uid "0" or nothing at all).
    pub async fn login(&self, name: &str, psw: &str) -> Result<Option<String>> {
        let url = format!(
            "{}/login?name={}&psw={}",
            self.base_url,
            urlencoding::encode(name),
            urlencoding::encode(psw)
        );
        debug!("Login request for {}", name);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| anyhow!("Login request failed: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Login error {}: {}", status, body));
        }

        let data: UidResponse = response
            .json()
            .await
            .map_err(|e| anyhow!("Failed to parse login response: {}", e))?;

        Ok(normalize_uid(&data.uid))
    }

    /// Register a new user. Same uid handshake as login.
    pub async fn register(&self, name: &str, psw: &str) -> Result<Option<String>> {
        let url = format!(
            "{}/register?name={}&psw={}",
            self.base_url,
            urlencoding::encode(name),
            urlencoding::encode(psw)
        );
        info!("Registering user {}", name);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| anyhow!("Register request failed: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Register error {}: {}", status, body));
        }

        let data: UidResponse = response
            .json()
            .await
            .map_err(|e| anyhow!("Failed to parse register response: {}", e))?;

        Ok(normalize_uid(&data.uid))
    }

    /// All registered usernames. The server answers one row per name.
    pub async fn all_usernames(&self) -> Result<Vec<String>> {
        let url = format!("{}/allusername", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| anyhow!("Username list request failed: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Username list error {}: {}", status, body));
        }

        let rows: Vec<Vec<String>> = response
            .json()
            .await
            .map_err(|e| anyhow!("Failed to parse username list: {}", e))?;

        Ok(rows.into_iter().flatten().collect())
    }

    // ========================================================================
    // Catalog
    // ========================================================================

    /// Fetch the full item catalog. Fetched once per run and cached by the
    /// caller; items are immutable after that.
    pub async fn get_all_items(&self) -> Result<Vec<Item>> {
        let url = format!("{}/getAllItems", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| anyhow!("Catalog request failed: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Catalog error {}: {}", status, body));
        }

        let items: Vec<Item> = response
            .json()
            .await
            .map_err(|e| anyhow!("Failed to parse catalog: {}", e))?;

        info!("Fetched {} catalog items", items.len());
        Ok(items)
    }

    // ========================================================================
    // Score maps
    // ========================================================================

    /// Legacy pool-mode score map: key -> comma-joined item ids.
    pub async fn scorelist(&self) -> Result<ScoreMap> {
        let url = format!("{}/scorelist", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| anyhow!("Scorelist request failed: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Scorelist error {}: {}", status, body));
        }

        let raw: BTreeMap<String, Option<String>> = response
            .json()
            .await
            .map_err(|e| anyhow!("Failed to parse scorelist: {}", e))?;

        Ok(normalize_map(raw))
    }

    /// Replace one pool entry. The response is the full updated map and is
    /// the authoritative state.
    pub async fn score_update(&self, key: &str, value: &str) -> Result<ScoreMap> {
        let url = format!("{}/scoreUpdate/", self.base_url);
        info!("Submitting pool entry {}", key);

        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "key": key, "value": value }))
            .send()
            .await
            .map_err(|e| anyhow!("Pool update request failed: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Pool update error {}: {}", status, body));
        }

        let raw: BTreeMap<String, Option<String>> = response
            .json()
            .await
            .map_err(|e| anyhow!("Failed to parse pool update response: {}", e))?;

        Ok(normalize_map(raw))
    }

    /// One user's submissions grouped by date: date -> comma-joined ids.
    pub async fn user_scores_by_date(&self, uid: &str) -> Result<ScoreMap> {
        let url = format!(
            "{}/getuUserScoreGroupByDate?uid={}",
            self.base_url,
            urlencoding::encode(uid)
        );

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| anyhow!("User score request failed: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("User score error {}: {}", status, body));
        }

        let raw: BTreeMap<String, Option<String>> = response
            .json()
            .await
            .map_err(|e| anyhow!("Failed to parse user scores: {}", e))?;

        Ok(normalize_map(raw))
    }

    /// Replace one user's submission for one date. The response is the
    /// user's full updated date map.
    pub async fn update_user_score(&self, uid: &str, date: &str, value: &str) -> Result<ScoreMap> {
        let url = format!("{}/updateUserScore/", self.base_url);
        info!("Submitting scores for {} on {}", uid, date);

        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "uid": uid, "date": date, "value": value }))
            .send()
            .await
            .map_err(|e| anyhow!("Score submission failed: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Score submission error {}: {}", status, body));
        }

        let raw: BTreeMap<String, Option<String>> = response
            .json()
            .await
            .map_err(|e| anyhow!("Failed to parse submission response: {}", e))?;

        Ok(normalize_map(raw))
    }

    // ========================================================================
    // Admin dates
    // ========================================================================

    /// Both admin date rows (scoring date and cutoff date).
    pub async fn ad_times(&self) -> Result<Vec<AdminDate>> {
        let url = format!("{}/getadtimes", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| anyhow!("Admin dates request failed: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Admin dates error {}: {}", status, body));
        }

        response
            .json()
            .await
            .map_err(|e| anyhow!("Failed to parse admin dates: {}", e))
    }

    /// Update one admin date row; returns the date the server accepted.
    pub async fn update_ad_time(&self, id: u32, date: &str) -> Result<String> {
        let url = format!(
            "{}/updateAdTime/?id={}&date={}",
            self.base_url,
            id,
            urlencoding::encode(date)
        );
        info!("Updating admin date {} to {}", id, date);

        let response = self
            .client
            .post(&url)
            .send()
            .await
            .map_err(|e| anyhow!("Admin date update failed: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Admin date update error {}: {}", status, body));
        }

        let data: NewDateResponse = response
            .json()
            .await
            .map_err(|e| anyhow!("Failed to parse admin date response: {}", e))?;

        Ok(data.new_date)
    }

    // ========================================================================
    // Leaderboard feeds
    // ========================================================================

    /// Total scores for every participant.
    pub async fn all_user_scores(&self) -> Result<Vec<User>> {
        let url = format!("{}/alluserscores", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| anyhow!("Total scores request failed: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Total scores error {}: {}", status, body));
        }

        response
            .json()
            .await
            .map_err(|e| anyhow!("Failed to parse total scores: {}", e))
    }

    /// Daily score events for every participant. The endpoint is a POST
    /// with an empty body; the path spelling is the server's, typo included.
    pub async fn all_daily_scores(&self) -> Result<Vec<DailyScore>> {
        let url = format!("{}/allDaliyScores/", self.base_url);

        let response = self
            .client
            .post(&url)
            .header("Content-Type", "application/json")
            .header("Accept", "application/json")
            .body("")
            .send()
            .await
            .map_err(|e| anyhow!("Daily scores request failed: {}", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow!("Daily scores error {}: {}", status, body));
        }

        response
            .json()
            .await
            .map_err(|e| anyhow!("Failed to parse daily scores: {}", e))
    }
}

/// The server signals identity failure loosely: uid may come back as the
/// string "0", the number 0, an empty string, null, or be missing.
fn normalize_uid(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) if !s.is_empty() && s != "0" => Some(s.clone()),
        serde_json::Value::Number(n) if n.as_i64().unwrap_or(0) != 0 => Some(n.to_string()),
        _ => None,
    }
}

/// Null map values mean "no submission"; treat them as empty lists.
fn normalize_map(raw: BTreeMap<String, Option<String>>) -> ScoreMap {
    raw.into_iter()
        .map(|(k, v)| (k, v.unwrap_or_default()))
        .collect()
}

// ============================================================================
// Wire Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct UidResponse {
    #[serde(default)]
    uid: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct NewDateResponse {
    new_date: String,
}
