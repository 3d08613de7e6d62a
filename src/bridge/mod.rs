//! Lighting bridge abstraction
//!
//! The pipeline only needs three things from a bridge: list its lights,
//! push a state to one light, and switch a light on. [`LightBridge`] captures
//! that surface so the core runs against the Hue client in production and
//! against fakes in tests.

pub mod hue;
pub mod pairing;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use hue::HueBridge;

/// Bridge-assigned light identifier
pub type LightId = u32;

/// A light reported by the bridge
#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    pub id: LightId,
    pub name: String,
    pub kind: String,
    pub model_id: String,
    pub reachable: bool,
}

impl Light {
    /// Light with only an id and a name
    pub fn new(id: LightId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            kind: String::new(),
            model_id: String::new(),
            reachable: true,
        }
    }
}

/// Desired light state sent to the bridge
///
/// Unset fields are left untouched by the bridge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct LightState {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on: Option<bool>,

    /// CIE chromaticity coordinates, each in 0.0-1.0
    #[serde(skip_serializing_if = "Option::is_none")]
    pub xy: Option<[f32; 2]>,
}

impl LightState {
    /// Power on with no color change
    pub fn on() -> Self {
        Self {
            on: Some(true),
            xy: None,
        }
    }

    /// Power on at the given chromaticity
    pub fn xy(x: f32, y: f32) -> Self {
        Self {
            on: Some(true),
            xy: Some([x, y]),
        }
    }
}

/// One acknowledged attribute change, e.g. `/lights/5/state/on = true`
#[derive(Debug, Clone, PartialEq)]
pub struct StateUpdate {
    pub address: String,
    pub value: serde_json::Value,
}

/// Errors returned by bridge operations
#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("Bridge request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Bridge error {kind} at {address}: {description}")]
    Api {
        kind: u16,
        address: String,
        description: String,
    },

    #[error("Unexpected bridge response: {0}")]
    InvalidResponse(String),

    #[error("No Hue bridge found on the network")]
    NotFound,

    #[error("Pairing aborted: {0}")]
    Pairing(#[source] std::io::Error),
}

/// Capability interface to a lighting bridge
#[async_trait]
pub trait LightBridge: Send + Sync {
    /// Bridge address, for logging
    fn host(&self) -> &str;

    /// Enumerate every light the bridge knows about
    async fn get_lights(&self) -> Result<Vec<Light>, BridgeError>;

    /// Apply `state` to one light
    async fn set_light_state(
        &self,
        id: LightId,
        state: &LightState,
    ) -> Result<Vec<StateUpdate>, BridgeError>;

    /// Switch one light on
    async fn turn_on(&self, id: LightId) -> Result<(), BridgeError> {
        self.set_light_state(id, &LightState::on()).await?;
        Ok(())
    }
}
