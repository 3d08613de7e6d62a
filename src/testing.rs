//! In-memory stand-ins for the bridge and the MIDI driver

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use crate::bridge::{BridgeError, Light, LightBridge, LightId, LightState, StateUpdate};
use crate::dispatcher::LightStateChange;
use crate::midi::source::{CcSink, MidiConnection, MidiError, MidiSource};
use crate::midi::ControlChange;

/// Bridge recording every call instead of talking to the network
#[derive(Default)]
pub struct FakeBridge {
    lights: Vec<Light>,
    state_calls: Mutex<Vec<LightStateChange>>,
    turned_on: Mutex<Vec<LightId>>,
    failing: Mutex<HashSet<LightId>>,
    get_lights_calls: AtomicUsize,
}

impl FakeBridge {
    pub fn with_lights(ids: &[LightId]) -> Self {
        Self {
            lights: ids
                .iter()
                .map(|&id| Light::new(id, format!("Light {}", id)))
                .collect(),
            ..Default::default()
        }
    }

    /// Make every call touching `id` fail
    pub fn fail_light(&self, id: LightId) {
        self.failing.lock().unwrap().insert(id);
    }

    pub fn state_calls(&self) -> Vec<LightStateChange> {
        self.state_calls.lock().unwrap().clone()
    }

    pub fn turned_on(&self) -> Vec<LightId> {
        self.turned_on.lock().unwrap().clone()
    }

    pub fn get_lights_calls(&self) -> usize {
        self.get_lights_calls.load(Ordering::SeqCst)
    }

    fn check(&self, id: LightId) -> Result<(), BridgeError> {
        if self.failing.lock().unwrap().contains(&id) {
            return Err(BridgeError::Api {
                kind: 201,
                address: format!("/lights/{}/state", id),
                description: "device is set to off".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl LightBridge for FakeBridge {
    fn host(&self) -> &str {
        "fake-bridge"
    }

    async fn get_lights(&self) -> Result<Vec<Light>, BridgeError> {
        self.get_lights_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.lights.clone())
    }

    async fn set_light_state(
        &self,
        id: LightId,
        state: &LightState,
    ) -> Result<Vec<StateUpdate>, BridgeError> {
        self.state_calls.lock().unwrap().push(LightStateChange {
            light_id: id,
            state: *state,
        });
        self.check(id)?;
        Ok(vec![StateUpdate {
            address: format!("/lights/{}/state/on", id),
            value: serde_json::Value::Bool(true),
        }])
    }

    async fn turn_on(&self, id: LightId) -> Result<(), BridgeError> {
        self.check(id)?;
        self.turned_on.lock().unwrap().push(id);
        Ok(())
    }
}

/// MIDI driver whose inputs are fed by the test
#[derive(Default)]
pub struct FakeMidiSource {
    inputs: Vec<String>,
    sinks: Mutex<HashMap<String, Vec<CcSink>>>,
    broken: Mutex<HashSet<String>>,
}

pub struct FakeConnection {
    input_name: String,
}

impl MidiConnection for FakeConnection {
    fn input_name(&self) -> &str {
        &self.input_name
    }
}

impl FakeMidiSource {
    pub fn with_inputs(names: &[&str]) -> Self {
        Self {
            inputs: names.iter().map(|name| name.to_string()).collect(),
            ..Default::default()
        }
    }

    /// Make opening `name` fail even though it is listed
    pub fn break_input(&self, name: &str) {
        self.broken.lock().unwrap().insert(name.to_string());
    }

    /// Number of open listeners on `name`
    pub fn listeners(&self, name: &str) -> usize {
        self.sinks
            .lock()
            .unwrap()
            .get(name)
            .map(Vec::len)
            .unwrap_or(0)
    }

    /// Deliver a CC event to every listener of `name`, waiting while a sink is full
    pub async fn send_cc(&self, name: &str, channel: u8, controller: u8, value: u8) {
        let cc = ControlChange {
            channel,
            controller,
            value,
        };
        let sinks = self
            .sinks
            .lock()
            .unwrap()
            .get(name)
            .cloned()
            .unwrap_or_default();
        for sink in sinks {
            let _ = sink.send(cc).await;
        }
    }
}

impl MidiSource for FakeMidiSource {
    fn input_names(&self) -> Result<Vec<String>, MidiError> {
        Ok(self.inputs.clone())
    }

    fn listen(
        &self,
        input_name: &str,
        sink: CcSink,
    ) -> Result<Box<dyn MidiConnection>, MidiError> {
        if !self.inputs.iter().any(|name| name == input_name) {
            return Err(MidiError::PortNotFound(input_name.to_string()));
        }
        if self.broken.lock().unwrap().contains(input_name) {
            return Err(MidiError::Connect {
                port: input_name.to_string(),
                reason: "device busy".to_string(),
            });
        }

        self.sinks
            .lock()
            .unwrap()
            .entry(input_name.to_string())
            .or_default()
            .push(sink);
        Ok(Box::new(FakeConnection {
            input_name: input_name.to_string(),
        }))
    }
}
