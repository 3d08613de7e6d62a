//! Philips Hue bridge client (REST API v1)
//!
//! Speaks plain JSON over HTTP to the bridge's `/api` endpoint. The v1 API
//! reports most failures with a `200 OK` and an `[{"error": {..}}]` body, so
//! every response goes through [`into_results`] before it is trusted.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{debug, trace};

use super::{BridgeError, Light, LightBridge, LightId, LightState, StateUpdate};

/// N-UPnP endpoint listing bridges on the caller's network
pub const DISCOVERY_URL: &str = "https://discovery.meethue.com/";

/// Hue API client bound to one bridge
#[derive(Debug, Clone)]
pub struct HueBridge {
    client: reqwest::Client,
    host: String,
    base_url: String,
    user: String,
}

/// Entry returned by the discovery endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct DiscoveredBridge {
    #[serde(default)]
    pub id: String,
    #[serde(rename = "internalipaddress")]
    pub internal_ip_address: String,
}

#[derive(Debug, Deserialize)]
struct HueLightEntry {
    #[serde(default)]
    name: String,
    #[serde(rename = "type", default)]
    kind: String,
    #[serde(rename = "modelid", default)]
    model_id: String,
    #[serde(default)]
    state: HueLightStateEntry,
}

#[derive(Debug, Default, Deserialize)]
struct HueLightStateEntry {
    #[serde(default)]
    reachable: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct HueApiError {
    #[serde(rename = "type")]
    kind: u16,
    #[serde(default)]
    address: String,
    #[serde(default)]
    description: String,
}

impl HueBridge {
    /// Client for the bridge at `host` (IP or hostname) using `user`
    pub fn new(host: impl Into<String>, user: impl Into<String>) -> Self {
        let host = host.into();
        let base_url = format!("http://{}", host);
        Self {
            client: reqwest::Client::new(),
            host,
            base_url,
            user: user.into(),
        }
    }

    /// Client talking to an explicit base URL, e.g. `http://127.0.0.1:8080`
    pub fn with_base_url(base_url: impl Into<String>, user: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            client: reqwest::Client::new(),
            host: base_url.clone(),
            base_url,
            user: user.into(),
        }
    }

    /// User token this client authenticates with
    pub fn user(&self) -> &str {
        &self.user
    }

    /// Find bridges through the discovery endpoint at `discovery_url`
    pub async fn discover_all(discovery_url: &str) -> Result<Vec<DiscoveredBridge>, BridgeError> {
        debug!("Querying bridge discovery endpoint: {}", discovery_url);
        let bridges = reqwest::get(discovery_url)
            .await?
            .error_for_status()?
            .json::<Vec<DiscoveredBridge>>()
            .await?;
        Ok(bridges)
    }

    /// Discover the first bridge on the network and return an unpaired client for it
    pub async fn discover(discovery_url: &str) -> Result<Self, BridgeError> {
        let bridge = Self::discover_all(discovery_url)
            .await?
            .into_iter()
            .next()
            .ok_or(BridgeError::NotFound)?;
        debug!("Discovered bridge {:?}", bridge);
        Ok(Self::new(bridge.internal_ip_address, ""))
    }

    /// Register a new user on the bridge
    ///
    /// The bridge only accepts this within 30 seconds of its link button
    /// being pressed. On success the client switches to the new user.
    pub async fn create_user(&mut self, device_type: &str) -> Result<String, BridgeError> {
        let url = format!("{}/api", self.base_url);
        let body = self
            .client
            .post(&url)
            .json(&json!({ "devicetype": device_type }))
            .send()
            .await?
            .error_for_status()?
            .json::<Value>()
            .await?;

        let username = into_results(body)?
            .into_iter()
            .find_map(|success| success.get("username").and_then(Value::as_str).map(String::from))
            .ok_or_else(|| BridgeError::InvalidResponse("no username in pairing reply".into()))?;

        self.user = username.clone();
        Ok(username)
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/api/{}/{}", self.base_url, self.user, path)
    }
}

#[async_trait]
impl LightBridge for HueBridge {
    fn host(&self) -> &str {
        &self.host
    }

    async fn get_lights(&self) -> Result<Vec<Light>, BridgeError> {
        let body = self
            .client
            .get(self.api_url("lights"))
            .send()
            .await?
            .error_for_status()?
            .json::<Value>()
            .await?;
        trace!("GET lights <- {}", body);

        parse_lights(body)
    }

    async fn set_light_state(
        &self,
        id: LightId,
        state: &LightState,
    ) -> Result<Vec<StateUpdate>, BridgeError> {
        let body = self
            .client
            .put(self.api_url(&format!("lights/{}/state", id)))
            .json(state)
            .send()
            .await?
            .error_for_status()?
            .json::<Value>()
            .await?;

        let updates = into_results(body)?
            .into_iter()
            .filter_map(|success| match success {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .flat_map(|map| {
                map.into_iter()
                    .map(|(address, value)| StateUpdate { address, value })
            })
            .collect();
        Ok(updates)
    }
}

/// Convert a `GET /lights` body into lights sorted by id
fn parse_lights(body: Value) -> Result<Vec<Light>, BridgeError> {
    if body.is_array() {
        // Error replies come back as arrays; a successful reply is an object
        into_results(body)?;
        return Err(BridgeError::InvalidResponse(
            "expected an object of lights".into(),
        ));
    }

    let entries: HashMap<String, HueLightEntry> = serde_json::from_value(body)
        .map_err(|e| BridgeError::InvalidResponse(format!("malformed lights listing: {}", e)))?;

    let mut lights = entries
        .into_iter()
        .map(|(key, entry)| {
            let id = key.parse::<LightId>().map_err(|_| {
                BridgeError::InvalidResponse(format!("non-numeric light id '{}'", key))
            })?;
            Ok(Light {
                id,
                name: entry.name,
                kind: entry.kind,
                model_id: entry.model_id,
                reachable: entry.state.reachable.unwrap_or(true),
            })
        })
        .collect::<Result<Vec<_>, BridgeError>>()?;

    lights.sort_by_key(|light| light.id);
    Ok(lights)
}

/// Unpack a v1 result array, failing on the first `error` entry
fn into_results(body: Value) -> Result<Vec<Value>, BridgeError> {
    let items = match body {
        Value::Array(items) => items,
        other => {
            return Err(BridgeError::InvalidResponse(format!(
                "expected a result array, got {}",
                other
            )))
        }
    };

    let mut successes = Vec::with_capacity(items.len());
    for mut item in items {
        if let Some(error) = item.get_mut("error").map(Value::take) {
            let error: HueApiError = serde_json::from_value(error)
                .map_err(|e| BridgeError::InvalidResponse(format!("malformed error: {}", e)))?;
            return Err(BridgeError::Api {
                kind: error.kind,
                address: error.address,
                description: error.description,
            });
        }
        if let Some(success) = item.get_mut("success").map(Value::take) {
            successes.push(success);
        }
    }
    Ok(successes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    #[tokio::test]
    async fn test_get_lights_sorted() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/api/user-1/lights")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{
                    "12": {"name": "Desk", "type": "Extended color light", "modelid": "LCT015", "state": {"on": false, "reachable": true}},
                    "5": {"name": "Hall", "type": "Color light", "modelid": "LST002", "state": {"on": true, "reachable": false}}
                }"#,
            )
            .create_async()
            .await;

        let bridge = HueBridge::with_base_url(server.url(), "user-1");
        let lights = bridge.get_lights().await.unwrap();

        mock.assert_async().await;
        assert_eq!(lights.len(), 2);
        assert_eq!(lights[0].id, 5);
        assert_eq!(lights[0].name, "Hall");
        assert!(!lights[0].reachable);
        assert_eq!(lights[1].id, 12);
        assert_eq!(lights[1].model_id, "LCT015");
    }

    #[tokio::test]
    async fn test_get_lights_unauthorized() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/api/bad-user/lights")
            .with_status(200)
            .with_body(
                r#"[{"error": {"type": 1, "address": "/lights", "description": "unauthorized user"}}]"#,
            )
            .create_async()
            .await;

        let bridge = HueBridge::with_base_url(server.url(), "bad-user");
        let err = bridge.get_lights().await.unwrap_err();

        match err {
            BridgeError::Api { kind, description, .. } => {
                assert_eq!(kind, 1);
                assert_eq!(description, "unauthorized user");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_set_light_state_body() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PUT", "/api/user-1/lights/5/state")
            .match_body(Matcher::Json(serde_json::json!({ "on": true, "xy": [1.0, 0.0] })))
            .with_status(200)
            .with_body(
                r#"[{"success": {"/lights/5/state/on": true}}, {"success": {"/lights/5/state/xy": [1.0, 0.0]}}]"#,
            )
            .create_async()
            .await;

        let bridge = HueBridge::with_base_url(server.url(), "user-1");
        let updates = bridge
            .set_light_state(5, &LightState::xy(1.0, 0.0))
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(updates.len(), 2);
        assert_eq!(updates[0].address, "/lights/5/state/on");
        assert_eq!(updates[0].value, Value::Bool(true));
    }

    #[tokio::test]
    async fn test_set_light_state_api_error() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("PUT", "/api/user-1/lights/99/state")
            .with_status(200)
            .with_body(
                r#"[{"error": {"type": 3, "address": "/lights/99/state", "description": "resource, /lights/99/state, not available"}}]"#,
            )
            .create_async()
            .await;

        let bridge = HueBridge::with_base_url(server.url(), "user-1");
        let err = bridge
            .set_light_state(99, &LightState::xy(0.5, 0.5))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::Api { kind: 3, .. }));
    }

    #[tokio::test]
    async fn test_turn_on_sends_on_only() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("PUT", "/api/user-1/lights/3/state")
            .match_body(Matcher::Json(serde_json::json!({ "on": true })))
            .with_status(200)
            .with_body(r#"[{"success": {"/lights/3/state/on": true}}]"#)
            .create_async()
            .await;

        let bridge = HueBridge::with_base_url(server.url(), "user-1");
        bridge.turn_on(3).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_create_user() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api")
            .match_body(Matcher::Json(serde_json::json!({ "devicetype": "glovelight#test" })))
            .with_status(200)
            .with_body(r#"[{"success": {"username": "new-token"}}]"#)
            .create_async()
            .await;

        let mut bridge = HueBridge::with_base_url(server.url(), "");
        let user = bridge.create_user("glovelight#test").await.unwrap();

        assert_eq!(user, "new-token");
        assert_eq!(bridge.user(), "new-token");
    }

    #[tokio::test]
    async fn test_create_user_link_button_not_pressed() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/api")
            .with_status(200)
            .with_body(
                r#"[{"error": {"type": 101, "address": "", "description": "link button not pressed"}}]"#,
            )
            .create_async()
            .await;

        let mut bridge = HueBridge::with_base_url(server.url(), "");
        let err = bridge.create_user("glovelight#test").await.unwrap_err();

        assert!(matches!(err, BridgeError::Api { kind: 101, .. }));
        assert_eq!(bridge.user(), "");
    }

    #[tokio::test]
    async fn test_discover_first_bridge() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/")
            .with_status(200)
            .with_body(
                r#"[{"id": "001788fffe000001", "internalipaddress": "192.168.1.42", "port": 443}]"#,
            )
            .create_async()
            .await;

        let bridge = HueBridge::discover(&format!("{}/", server.url())).await.unwrap();
        assert_eq!(bridge.host(), "192.168.1.42");
        assert_eq!(bridge.user(), "");
    }

    #[tokio::test]
    async fn test_discover_nothing_found() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/")
            .with_status(200)
            .with_body("[]")
            .create_async()
            .await;

        let err = HueBridge::discover(&format!("{}/", server.url()))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::NotFound));
    }

    #[test]
    fn test_parse_lights_rejects_bad_id() {
        let body = serde_json::json!({ "abc": { "name": "x" } });
        assert!(matches!(
            parse_lights(body),
            Err(BridgeError::InvalidResponse(_))
        ));
    }
}
