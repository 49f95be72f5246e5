use std::fmt;
use std::sync::{Arc, Weak};

use ampwire_frame::{CommandCode, Direction, FeedbackCode, Payload};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;

use crate::error::{ConfigError, ControlError, SessionError};
use crate::pool::{ConnectionPool, PoolConfig};
use crate::settings::{DeviceContext, InputSource, Settings};

/// Status byte sent with every command. Observed for the USB input on the
/// red zone.
pub const DEFAULT_STATUS: u8 = 0x51;

/// Mapping between control-surface volume and device units.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum VolumeScale {
    /// 0–31, one unit per step.
    #[default]
    Native,
    /// 0–155, five control units per device unit.
    Legacy,
}

impl VolumeScale {
    pub fn min(self) -> i32 {
        0
    }

    pub fn max(self) -> i32 {
        match self {
            VolumeScale::Native => 31,
            VolumeScale::Legacy => 155,
        }
    }

    /// Control units per device unit.
    pub fn units_per_step(self) -> i32 {
        match self {
            VolumeScale::Native => 1,
            VolumeScale::Legacy => 5,
        }
    }

    /// Device units for a (clamped) control volume, rounding up.
    pub fn device_units(self, volume: i32) -> u8 {
        let volume = volume.clamp(self.min(), self.max());
        let per = self.units_per_step();
        ((volume + per - 1) / per) as u8
    }

    /// Control volume for device-reported units.
    pub fn volume_for_units(self, units: u8) -> i32 {
        (i32::from(units) * self.units_per_step()).clamp(self.min(), self.max())
    }

    pub fn clamp(self, volume: i64) -> i32 {
        volume.clamp(i64::from(self.min()), i64::from(self.max())) as i32
    }

    /// Convert a stored `initial_volume`, which is always in 0–155 control
    /// units, to this scale.
    pub fn from_stored(self, stored: i32) -> i32 {
        match self {
            VolumeScale::Legacy => self.clamp(i64::from(stored)),
            VolumeScale::Native => self.volume_for_units(VolumeScale::Legacy.device_units(stored)),
        }
    }
}

/// Controller behavior.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    pub scale: VolumeScale,
    /// Status byte placed in outgoing commands.
    pub status: u8,
    /// Skip volume requests that leave the device step unchanged. One-shot
    /// callers that have never heard from the device should turn this off.
    pub coalesce: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            scale: VolumeScale::default(),
            status: DEFAULT_STATUS,
            coalesce: true,
        }
    }
}

/// How `set_volume` interprets its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VolumeMode {
    Absolute,
    Relative,
}

/// Outcome of a volume request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// A frame carrying `units` was written.
    Sent { units: u8 },
    /// The device step did not change; nothing was written.
    Coalesced,
}

/// Acknowledgement reported back to the control surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "PascalCase")]
pub enum Ack {
    Success,
    NotValid,
    Error,
}

impl Ack {
    pub fn from_result<T>(result: &Result<T, ControlError>) -> Self {
        match result {
            Ok(_) => Ack::Success,
            Err(ControlError::Config(_))
            | Err(ControlError::Session(SessionError::Config(_))) => Ack::NotValid,
            Err(_) => Ack::Error,
        }
    }
}

impl fmt::Display for Ack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Ack::Success => "Success",
            Ack::NotValid => "NotValid",
            Ack::Error => "Error",
        })
    }
}

/// Locally tracked device state, published to subscribers on every change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeviceState {
    pub volume_value: i32,
    pub volume_min: i32,
    pub volume_max: i32,
    pub volume_step: i32,
    pub is_muted: bool,
    pub selected_source: InputSource,
}

impl DeviceState {
    fn initial(scale: VolumeScale, settings: &Settings) -> Self {
        Self {
            volume_value: scale.from_stored(settings.initial_volume),
            volume_min: scale.min(),
            volume_max: scale.max(),
            volume_step: 1,
            is_muted: false,
            selected_source: settings.source,
        }
    }
}

/// Turns volume and source intents into device commands and mirrors the
/// device state.
///
/// Local updates are optimistic: they are applied before the frame is
/// written and are not rolled back if the write fails. Volume feedback from
/// the device always overwrites the tracked value.
pub struct VolumeController {
    context: DeviceContext,
    pool: Arc<ConnectionPool>,
    config: ControllerConfig,
    state: watch::Sender<DeviceState>,
}

impl VolumeController {
    pub fn new(
        context: DeviceContext,
        pool: Arc<ConnectionPool>,
        config: ControllerConfig,
    ) -> Self {
        let initial = DeviceState::initial(config.scale, &context.settings());
        let (state, _) = watch::channel(initial);
        Self {
            context,
            pool,
            config,
            state,
        }
    }

    /// Build a controller over a fresh pool and start consuming feedback.
    ///
    /// The feedback task only holds a weak reference, so dropping the last
    /// `Arc` frees the controller and ends the task. Must be called within a
    /// Tokio runtime.
    pub fn start(
        context: DeviceContext,
        pool_config: PoolConfig,
        config: ControllerConfig,
    ) -> (Arc<Self>, JoinHandle<()>) {
        let (pool, feedback) = ConnectionPool::new(context.clone(), pool_config);
        let controller = Arc::new(Self::new(context, pool, config));
        let task = tokio::spawn(Self::run_feedback(Arc::downgrade(&controller), feedback));
        (controller, task)
    }

    pub fn pool(&self) -> &Arc<ConnectionPool> {
        &self.pool
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    /// Current state snapshot.
    pub fn snapshot(&self) -> DeviceState {
        self.state.borrow().clone()
    }

    /// Observe state changes.
    pub fn subscribe(&self) -> watch::Receiver<DeviceState> {
        self.state.subscribe()
    }

    /// Open the device connection ahead of the first command so feedback
    /// starts flowing.
    pub async fn connect(&self) -> Result<(), ControlError> {
        let lease = self.pool.acquire().await?;
        self.pool.release(lease);
        Ok(())
    }

    /// Set the volume absolutely or relative to the tracked value.
    ///
    /// The result is clamped to the scale. A frame is written only when the
    /// device step changes.
    pub async fn set_volume(
        &self,
        mode: VolumeMode,
        value: i32,
    ) -> Result<Dispatch, ControlError> {
        let scale = self.config.scale;
        let coalesce = self.config.coalesce;
        let mut step = None;
        self.state.send_if_modified(|state| {
            let target = match mode {
                VolumeMode::Absolute => i64::from(value),
                VolumeMode::Relative => i64::from(state.volume_value) + i64::from(value),
            };
            let target = scale.clamp(target);
            let before = scale.device_units(state.volume_value);
            let after = scale.device_units(target);
            if before != after || !coalesce {
                step = Some((before, after));
            }
            let changed = target != state.volume_value;
            state.volume_value = target;
            changed
        });

        let Some((before, after)) = step else {
            tracing::debug!(?mode, value, "volume step unchanged, not sending");
            return Ok(Dispatch::Coalesced);
        };

        let code = if after < before {
            CommandCode::VolumeDown
        } else {
            CommandCode::VolumeUp
        };
        self.dispatch(Payload::command(code, after, self.config.status))
            .await?;
        Ok(Dispatch::Sent { units: after })
    }

    /// Select an amplifier input.
    pub async fn set_source(&self, input: InputSource) -> Result<(), ControlError> {
        self.state.send_if_modified(|state| {
            let changed = state.selected_source != input;
            state.selected_source = input;
            changed
        });
        self.dispatch(Payload::command(
            CommandCode::SourceSelect,
            input.code(),
            self.config.status,
        ))
        .await
    }

    /// The device protocol has no mute command.
    pub async fn set_mute(&self, muted: bool) -> Result<(), ControlError> {
        tracing::debug!(muted, "mute requested");
        Err(ControlError::NotSupported("mute"))
    }

    /// Apply a feedback payload from the device.
    ///
    /// Volume notifications are authoritative over any optimistic value.
    /// Returns true if the tracked state changed.
    pub fn on_feedback(&self, payload: &Payload) -> bool {
        if payload.direction != Direction::Feedback {
            return false;
        }
        let Some(code) = FeedbackCode::from_u8(payload.code) else {
            tracing::debug!(code = payload.code, "ignoring unknown feedback code");
            return false;
        };

        let volume = self.config.scale.volume_for_units(payload.value);
        tracing::debug!(
            code = code.name(),
            units = payload.value,
            volume,
            "device reported volume"
        );
        self.state.send_if_modified(|state| {
            let changed = state.volume_value != volume;
            state.volume_value = volume;
            changed
        })
    }

    /// Consume feedback until every sender is gone or the controller is
    /// dropped.
    pub async fn run_feedback(
        controller: Weak<Self>,
        mut feedback: mpsc::UnboundedReceiver<Payload>,
    ) {
        while let Some(payload) = feedback.recv().await {
            let Some(controller) = controller.upgrade() else {
                break;
            };
            controller.on_feedback(&payload);
        }
        tracing::debug!("feedback task finished");
    }

    /// Validate and store new settings, then drop the current connection so
    /// the next command reconnects with them.
    pub async fn apply_settings(&self, settings: Settings) -> Result<(), ConfigError> {
        let source = settings.source;
        self.context.update(settings)?;
        self.state.send_if_modified(|state| {
            let changed = state.selected_source != source;
            state.selected_source = source;
            changed
        });
        self.pool.invalidate_current().await;
        Ok(())
    }

    async fn dispatch(&self, payload: Payload) -> Result<(), ControlError> {
        let lease = self.pool.acquire().await?;
        let code = payload.code_name();
        if let Err(err) = lease.send(payload).await {
            tracing::warn!(session = lease.id(), code, error = %err, "command dispatch failed");
            self.pool.invalidate(lease.session()).await;
            return Err(err.into());
        }
        self.pool.release(lease);
        Ok(())
    }
}

impl fmt::Debug for VolumeController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VolumeController")
            .field("config", &self.config)
            .field("state", &*self.state.borrow())
            .finish()
    }
}
