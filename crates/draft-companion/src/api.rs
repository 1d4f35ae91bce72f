//! Client for the upstream companion backend.
//!
//! The backend owns every score; this client fetches rosters, maps, balance
//! patches and per-map tier data, and forwards draft boards and player tags
//! to the prediction endpoints.

use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::account::{PlayerTag, UpgradeCandidate};
use crate::catalog::Catalog;
use crate::draft::{DraftRequest, Suggestion, WinRateRequest};
use crate::types::{
    Brawler, CompanionError, CompanionResult, GameMap, GameVersion, ScoredEntity,
};

/// Base URL used when none is configured.
pub const DEFAULT_API_URL: &str = "https://metapick-ai.onrender.com";

#[derive(Serialize)]
struct MapRequest<'a> {
    map: &'a str,
}

#[derive(Serialize)]
struct AccountRequest<'a> {
    player_tag: &'a str,
}

/// HTTP client for the companion backend.
#[derive(Debug, Clone)]
pub struct CompanionApi {
    base_url: String,
    client: reqwest::Client,
}

impl CompanionApi {
    pub fn new(base_url: &str, timeout: Duration) -> CompanionResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(format!("draft-companion/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn brawlers(&self) -> CompanionResult<Vec<Brawler>> {
        self.get("/get_brawlers").await
    }

    pub async fn maps(&self) -> CompanionResult<Vec<GameMap>> {
        self.get("/get_maps").await
    }

    pub async fn game_versions(&self) -> CompanionResult<Vec<GameVersion>> {
        self.get("/get_game_versions").await
    }

    /// Most recent balance patch, if the backend reports any.
    pub async fn latest_version(&self) -> CompanionResult<Option<GameVersion>> {
        Ok(self.game_versions().await?.into_iter().next())
    }

    /// Fetch brawlers and maps together and normalise them.
    pub async fn catalog(&self) -> CompanionResult<Catalog> {
        let (brawlers, maps) = tokio::try_join!(self.brawlers(), self.maps())?;
        tracing::debug!(
            "Fetched {} brawlers and {} maps",
            brawlers.len(),
            maps.len()
        );
        Ok(Catalog::normalise(brawlers, maps))
    }

    /// Scored brawlers for one map, as `[name, score]` pairs upstream.
    pub async fn tier_list(&self, map: &str) -> CompanionResult<Vec<ScoredEntity>> {
        if map.trim().is_empty() {
            return Err(CompanionError::InvalidInput("map name is empty".to_string()));
        }
        self.post("/tier_list", &MapRequest { map }).await
    }

    /// Raw per-map statistics rows.
    pub async fn stats(&self, map: &str) -> CompanionResult<serde_json::Value> {
        if map.trim().is_empty() {
            return Err(CompanionError::InvalidInput("map name is empty".to_string()));
        }
        self.post("/stats", &MapRequest { map }).await
    }

    /// Ranked pick suggestions for a draft board.
    pub async fn simulate_draft(&self, request: &DraftRequest) -> CompanionResult<Vec<Suggestion>> {
        self.post("/simulate_draft", request).await
    }

    /// Predicted win rate of team A, in percent. `None` when the backend has
    /// no prediction.
    pub async fn predict_win_rate(&self, request: &WinRateRequest) -> CompanionResult<Option<f64>> {
        self.post("/predict_winrate", request).await
    }

    /// Names of the brawlers unlocked on an account.
    pub async fn account_brawlers(&self, tag: &PlayerTag) -> CompanionResult<Vec<String>> {
        self.post(
            "/account",
            &AccountRequest {
                player_tag: tag.as_str(),
            },
        )
        .await
    }

    /// Per-brawler upgrade recommendations for an account.
    pub async fn upgrade_helper(&self, tag: &PlayerTag) -> CompanionResult<Vec<UpgradeCandidate>> {
        self.post(
            "/account-upgrade-helper",
            &AccountRequest {
                player_tag: tag.as_str(),
            },
        )
        .await
    }

    async fn get<T: DeserializeOwned>(&self, endpoint: &str) -> CompanionResult<T> {
        let url = format!("{}{endpoint}", self.base_url);
        tracing::trace!("GET {url}");
        let resp = self.client.get(&url).send().await?;
        Self::decode(endpoint, resp).await
    }

    async fn post<B: Serialize, T: DeserializeOwned>(
        &self,
        endpoint: &str,
        body: &B,
    ) -> CompanionResult<T> {
        let url = format!("{}{endpoint}", self.base_url);
        tracing::trace!("POST {url}");
        let resp = self.client.post(&url).json(body).send().await?;
        Self::decode(endpoint, resp).await
    }

    async fn decode<T: DeserializeOwned>(
        endpoint: &str,
        resp: reqwest::Response,
    ) -> CompanionResult<T> {
        let status = resp.status();
        if !status.is_success() {
            return Err(CompanionError::Upstream {
                endpoint: endpoint.to_string(),
                status: status.as_u16(),
            });
        }
        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
