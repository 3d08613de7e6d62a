//! Glovelight runtime
//!
//! Owns the controllers built from a [`GlovelightConfig`] and the dispatch
//! queue they share. Startup is staged the same way the binary runs it:
//!
//! 1. [`Glovelight::connect_to_midi`] checks every controller's MIDI input exists
//! 2. [`Glovelight::connect_to_bridge`] resolves every bulb id against the bridge
//! 3. [`Glovelight::start`] spawns the dispatcher, opens the inputs and powers the lights on
//!
//! Unknown inputs or bulbs abort startup before anything is started.

use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::bridge::{BridgeError, LightBridge, LightId};
use crate::config::GlovelightConfig;
use crate::controller::Controller;
use crate::dispatcher::{DispatchStats, Dispatcher};
use crate::midi::source::{MidiConnection, MidiError, MidiSource, INPUT_BUFFER};
use crate::rate_limit::RateLimiter;

/// Errors that stop Glovelight from starting
#[derive(Debug, Error)]
pub enum GlovelightError {
    #[error("Unknown MIDI inputs: {}", .0.join(", "))]
    UnknownMidiInputs(Vec<String>),

    #[error("Unknown bulb IDs: {0:?}")]
    UnknownLights(Vec<LightId>),

    #[error(transparent)]
    Midi(#[from] MidiError),

    #[error(transparent)]
    Bridge(#[from] BridgeError),

    #[error("Failed to power on light {id}: {source}")]
    PowerOn {
        id: LightId,
        #[source]
        source: BridgeError,
    },

    #[error("Not connected to {0} yet")]
    NotConnected(&'static str),
}

/// Configured but not yet running pipeline
pub struct Glovelight {
    config: GlovelightConfig,
    controllers: Vec<Controller>,
    dispatcher: Dispatcher,
    bridge: Option<Arc<dyn LightBridge>>,
    midi_verified: bool,
}

impl Glovelight {
    /// Build controllers and the shared dispatch queue from `config`
    pub fn new(config: GlovelightConfig) -> Self {
        let limits = config.limits;
        let (handle, dispatcher) = Dispatcher::new(
            limits.queue_capacity,
            RateLimiter::new(limits.output_rate_hz, limits.output_burst),
        );

        let controllers = config
            .controllers
            .iter()
            .enumerate()
            .map(|(index, controller)| {
                Controller::new(
                    index,
                    controller.clone(),
                    RateLimiter::new(limits.input_rate_hz, limits.input_burst),
                    handle.clone(),
                )
            })
            .collect();

        Self {
            config,
            controllers,
            dispatcher,
            bridge: None,
            midi_verified: false,
        }
    }

    pub fn config(&self) -> &GlovelightConfig {
        &self.config
    }

    /// Mutable access for filling in bridge credentials after pairing
    ///
    /// Controllers are built at construction; later edits to `controllers`
    /// have no effect.
    pub fn config_mut(&mut self) -> &mut GlovelightConfig {
        &mut self.config
    }

    pub fn controllers(&self) -> &[Controller] {
        &self.controllers
    }

    /// Check that every controller's MIDI input is available
    pub fn connect_to_midi(&mut self, source: &dyn MidiSource) -> Result<(), GlovelightError> {
        let available = source.input_names()?;
        debug!("Available MIDI inputs: {:?}", available);

        let mut unknown: Vec<String> = Vec::new();
        for controller in &self.controllers {
            let name = &controller.config().midi_input;
            if !available.contains(name) && !unknown.contains(name) {
                unknown.push(name.clone());
            }
        }
        if !unknown.is_empty() {
            return Err(GlovelightError::UnknownMidiInputs(unknown));
        }

        self.midi_verified = true;
        Ok(())
    }

    /// Resolve every controller's bulb ids against the bridge's lights
    pub async fn connect_to_bridge(
        &mut self,
        bridge: Arc<dyn LightBridge>,
    ) -> Result<(), GlovelightError> {
        if !self.midi_verified {
            return Err(GlovelightError::NotConnected("MIDI"));
        }

        let lights = bridge.get_lights().await?;
        debug!("Discovered lights:");
        for light in &lights {
            debug!("  {:?}", light);
        }

        let mut unknown: Vec<LightId> = Vec::new();
        let mut resolved = Vec::with_capacity(self.controllers.len());
        for controller in &self.controllers {
            let mut assigned = Vec::new();
            for id in &controller.config().bulb_ids {
                match lights.iter().find(|light| light.id == *id) {
                    Some(light) => assigned.push(light.clone()),
                    None if !unknown.contains(id) => unknown.push(*id),
                    None => {}
                }
            }
            resolved.push(assigned);
        }
        if !unknown.is_empty() {
            return Err(GlovelightError::UnknownLights(unknown));
        }

        for (controller, lights) in self.controllers.iter_mut().zip(resolved) {
            controller.assign_lights(lights);
        }
        info!("Successfully connected to bridge at: {}", bridge.host());
        self.bridge = Some(bridge);
        Ok(())
    }

    /// Start the dispatcher and every controller
    ///
    /// Fails if an input cannot be opened or a light cannot be switched on;
    /// anything already started is stopped again.
    pub async fn start(
        self,
        source: &dyn MidiSource,
    ) -> Result<RunningGlovelight, GlovelightError> {
        let bridge = self.bridge.ok_or(GlovelightError::NotConnected("bridge"))?;

        let mut running = RunningGlovelight {
            connections: Vec::new(),
            controller_tasks: Vec::new(),
            dispatcher_task: tokio::spawn(self.dispatcher.run(bridge.clone())),
        };

        for controller in self.controllers {
            let started =
                start_controller(controller, source, bridge.as_ref(), &mut running).await;
            if let Err(e) = started {
                running.shutdown();
                return Err(e);
            }
        }

        info!(
            "✅ Glovelight running {} controller(s)",
            running.controller_tasks.len()
        );
        Ok(running)
    }
}

async fn start_controller(
    controller: Controller,
    source: &dyn MidiSource,
    bridge: &dyn LightBridge,
    running: &mut RunningGlovelight,
) -> Result<(), GlovelightError> {
    debug!("Controller starting: {:?}", controller.config());

    let (tx, rx) = mpsc::channel(INPUT_BUFFER);
    let connection = source.listen(&controller.config().midi_input, tx)?;
    running.connections.push(connection);

    for id in controller.light_ids() {
        bridge
            .turn_on(id)
            .await
            .map_err(|source| GlovelightError::PowerOn { id, source })?;
    }

    running.controller_tasks.push(tokio::spawn(controller.run(rx)));
    Ok(())
}

/// Handle to a started pipeline; dropping the MIDI connections stops input
pub struct RunningGlovelight {
    connections: Vec<Box<dyn MidiConnection>>,
    controller_tasks: Vec<JoinHandle<()>>,
    dispatcher_task: JoinHandle<DispatchStats>,
}

impl RunningGlovelight {
    /// Names of the open MIDI inputs, one per controller
    pub fn inputs(&self) -> Vec<&str> {
        self.connections
            .iter()
            .map(|connection| connection.input_name())
            .collect()
    }

    /// Close every input and stop all tasks; queued requests are discarded
    pub fn shutdown(self) {
        debug!("Closing {} MIDI input(s)", self.connections.len());
        drop(self.connections);
        for task in &self.controller_tasks {
            task.abort();
        }
        self.dispatcher_task.abort();
    }
}
