//! Kodi JSON-RPC client
//!
//! JSON-RPC 2.0 over HTTP POST with basic auth. Every call is bounded by the
//! configured request timeout; a timeout counts as a failed command.

use super::{DirectoryEntry, PlayerError, PlayerGateway};
use async_trait::async_trait;
use kjb_common::config::KodiConfig;
use kjb_common::model::label_from_path;
use kjb_common::LibraryItem;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info};

const USER_AGENT: &str = concat!("kodi-jukebox/", env!("CARGO_PKG_VERSION"));

#[derive(Debug, Serialize)]
struct RpcRequest<'a> {
    jsonrpc: &'static str,
    method: &'a str,
    params: Value,
    id: String,
}

#[derive(Debug, Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

#[derive(Debug, Deserialize)]
struct RpcResponse<T> {
    result: Option<T>,
    error: Option<RpcErrorBody>,
}

impl<T> RpcResponse<T> {
    fn into_result(self) -> Result<T, PlayerError> {
        if let Some(error) = self.error {
            return Err(PlayerError::Rpc {
                code: error.code,
                message: error.message,
            });
        }
        self.result
            .ok_or_else(|| PlayerError::Parse("reply has neither result nor error".to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct DirectoryListing {
    #[serde(default)]
    files: Option<Vec<DirectoryEntry>>,
}

#[derive(Debug, Deserialize)]
struct ActivePlayer {
    playerid: i64,
    #[serde(rename = "type", default)]
    kind: String,
}

#[derive(Debug, Deserialize)]
struct ItemReply {
    item: PlayerItem,
}

/// Item as reported by `Player.GetItem`
#[derive(Debug, Default, Deserialize)]
struct PlayerItem {
    #[serde(default)]
    file: Option<String>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    label: Option<String>,
}

/// Prefer the audio player when several are active
fn pick_player(players: &[ActivePlayer]) -> Option<i64> {
    players
        .iter()
        .find(|p| p.kind == "audio")
        .or_else(|| players.first())
        .map(|p| p.playerid)
}

/// Now-playing item from a `Player.GetItem` reply; an empty file means idle
fn now_playing_from_item(item: PlayerItem) -> Option<LibraryItem> {
    let file = item.file.filter(|f| !f.is_empty())?;
    let label = [item.title, item.label]
        .into_iter()
        .flatten()
        .find(|l| !l.trim().is_empty())
        .unwrap_or_else(|| label_from_path(&file));
    Some(LibraryItem::new(label, file))
}

/// Kodi JSON-RPC client
pub struct KodiClient {
    http_client: reqwest::Client,
    url: String,
    username: String,
    password: String,
    timeout: Duration,
    next_id: AtomicU64,
}

impl KodiClient {
    pub fn new(config: &KodiConfig) -> Result<Self, PlayerError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| PlayerError::Network(e.to_string()))?;

        info!("Kodi JSON-RPC endpoint: {}", config.rpc_url());

        Ok(Self {
            http_client,
            url: config.rpc_url(),
            username: config.username.clone(),
            password: config.password.clone(),
            timeout: config.request_timeout(),
            next_id: AtomicU64::new(1),
        })
    }

    fn transport_error(&self, e: reqwest::Error) -> PlayerError {
        if e.is_timeout() {
            PlayerError::Timeout(self.timeout)
        } else {
            PlayerError::Network(e.to_string())
        }
    }

    async fn call<T: DeserializeOwned>(&self, method: &str, params: Value) -> Result<T, PlayerError> {
        let id = format!("{}_{}", method, self.next_id.fetch_add(1, Ordering::Relaxed));
        let request = RpcRequest {
            jsonrpc: "2.0",
            method,
            params,
            id,
        };

        debug!(method = %method, id = %request.id, "Kodi RPC call");

        let response = self
            .http_client
            .post(&self.url)
            .basic_auth(&self.username, Some(&self.password))
            .json(&request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(PlayerError::Http(status.as_u16()));
        }

        let reply: RpcResponse<T> = response.json().await.map_err(|e| {
            if e.is_timeout() {
                PlayerError::Timeout(self.timeout)
            } else {
                PlayerError::Parse(e.to_string())
            }
        })?;
        reply.into_result()
    }
}

#[async_trait]
impl PlayerGateway for KodiClient {
    async fn play(&self, file: &str) -> Result<(), PlayerError> {
        let _: Value = self
            .call("Player.Open", json!({ "item": { "file": file } }))
            .await?;
        Ok(())
    }

    async fn now_playing(&self) -> Result<Option<LibraryItem>, PlayerError> {
        let players: Vec<ActivePlayer> = self.call("Player.GetActivePlayers", json!({})).await?;
        let Some(playerid) = pick_player(&players) else {
            return Ok(None);
        };

        let reply: ItemReply = self
            .call(
                "Player.GetItem",
                json!({ "playerid": playerid, "properties": ["title", "file"] }),
            )
            .await?;
        Ok(now_playing_from_item(reply.item))
    }

    async fn list_directory(&self, directory: &str) -> Result<Vec<DirectoryEntry>, PlayerError> {
        let listing: DirectoryListing = self
            .call(
                "Files.GetDirectory",
                json!({ "directory": directory, "media": "files" }),
            )
            .await?;
        listing
            .files
            .ok_or_else(|| PlayerError::Parse("directory listing has no files array".to_string()))
    }
}
