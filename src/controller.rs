//! CC → XY controller
//!
//! A controller watches two CC numbers on one MIDI channel, keeps the latest
//! value of each as a normalized X/Y sample, and once both axes are known
//! fans the sample out to its lights through the dispatcher. Its own rate
//! limiter bounds how often it tries, independent of the dispatcher's.

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::bridge::{Light, LightId};
use crate::config::ControllerConfig;
use crate::dispatcher::{DispatchClosed, DispatcherHandle, LightStateChange};
use crate::midi::convert::normalize_7bit;
use crate::midi::ControlChange;
use crate::rate_limit::RateLimiter;

/// Axis updated by a CC event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    X,
    Y,
}

/// Latest normalized X/Y values
///
/// Once an axis has been seen it stays set: later emissions reuse the last
/// value of an axis that did not move.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ControllerState {
    x: Option<f32>,
    y: Option<f32>,
}

impl ControllerState {
    /// Record `value` if (`channel`, `controller`) is one of this mapping's axes
    pub fn apply(
        &mut self,
        config: &ControllerConfig,
        channel: u8,
        controller: u8,
        value: u8,
    ) -> Option<Axis> {
        if channel != config.wire_channel() {
            return None;
        }

        if controller == config.x_cc {
            self.x = Some(normalize_7bit(value));
            Some(Axis::X)
        } else if controller == config.y_cc {
            self.y = Some(normalize_7bit(value));
            Some(Axis::Y)
        } else {
            None
        }
    }

    pub fn x(&self) -> Option<f32> {
        self.x
    }

    pub fn y(&self) -> Option<f32> {
        self.y
    }

    /// The (x, y) pair, once both axes have been seen
    pub fn sample(&self) -> Option<(f32, f32)> {
        Some((self.x?, self.y?))
    }
}

/// One configured MIDI → lights mapping
#[derive(Debug)]
pub struct Controller {
    index: usize,
    config: ControllerConfig,
    state: ControllerState,
    limiter: RateLimiter,
    lights: Vec<Light>,
    dispatcher: DispatcherHandle,
}

impl Controller {
    /// Create a controller with no lights assigned yet
    pub fn new(
        index: usize,
        config: ControllerConfig,
        limiter: RateLimiter,
        dispatcher: DispatcherHandle,
    ) -> Self {
        Self {
            index,
            config,
            state: ControllerState::default(),
            limiter,
            lights: Vec::new(),
            dispatcher,
        }
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn state(&self) -> &ControllerState {
        &self.state
    }

    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    /// Ids of the lights this controller drives, in configured order
    pub fn light_ids(&self) -> Vec<LightId> {
        self.lights.iter().map(|light| light.id).collect()
    }

    /// Attach the bridge lights resolved from `bulb_ids`
    pub fn assign_lights(&mut self, lights: Vec<Light>) {
        self.lights = lights;
    }

    /// Handle one CC event, returning how many light updates were queued
    ///
    /// Waits while the dispatcher queue is full.
    pub async fn handle_control_change(
        &mut self,
        channel: u8,
        controller: u8,
        value: u8,
    ) -> Result<usize, DispatchClosed> {
        debug!(
            "Received CC channel={} controller={} value={}",
            channel, controller, value
        );

        match self.state.apply(&self.config, channel, controller, value) {
            Some(Axis::X) => {
                debug!("Controller {}: X={:.3}", self.index, self.state.x.unwrap_or_default())
            }
            Some(Axis::Y) => {
                debug!("Controller {}: Y={:.3}", self.index, self.state.y.unwrap_or_default())
            }
            None => {}
        }

        // A token is spent on every event, even one that cannot emit yet
        if !self.limiter.allow() {
            return Ok(0);
        }
        let Some((x, y)) = self.state.sample() else {
            return Ok(0);
        };

        debug!(
            "Sending X={:.3}, Y={:.3} to bulbs: {:?}",
            x,
            y,
            self.light_ids()
        );
        for light in &self.lights {
            self.dispatcher
                .submit(LightStateChange::xy(light.id, x, y))
                .await?;
        }
        Ok(self.lights.len())
    }

    /// Consume CC events until the stream ends or the dispatcher goes away
    pub async fn run(mut self, mut events: mpsc::Receiver<ControlChange>) {
        info!(
            "Controller {} listening on '{}' ch {} (X=CC{}, Y=CC{}) for bulbs {:?}",
            self.index,
            self.config.midi_input,
            self.config.midi_channel,
            self.config.x_cc,
            self.config.y_cc,
            self.config.bulb_ids
        );

        while let Some(cc) = events.recv().await {
            if let Err(e) = self
                .handle_control_change(cc.channel, cc.controller, cc.value)
                .await
            {
                warn!("Controller {} stopping: {}", self.index, e);
                return;
            }
        }

        debug!("Controller {} input closed", self.index);
    }
}
