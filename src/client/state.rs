//! Mirrored appliance state.
//!
//! Baseline subscriptions keep a local copy of the appliance state up to date.
//! Each tracked field has one [`MirrorField`] consumer; after mutating the
//! mirror, the consumer runs the observer fan-out if notifications are enabled.
//!
//! All fields start unknown and are reset together when the connection ends.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use futures_util::future::{BoxFuture, join_all};
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, trace};

use crate::error::Result;
use crate::identifiers::ObserverId;
use crate::protocol::endpoints as ep;

use super::core::Client;
use super::request::Consumer;

// ============================================================================
// Types
// ============================================================================

/// Callback notified with a fresh snapshot after every mirrored change.
pub type Observer = Arc<dyn Fn(MirrorSnapshot) -> BoxFuture<'static, ()> + Send + Sync>;

// ============================================================================
// PowerState
// ============================================================================

/// Reported power state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PowerState {
    /// State name, e.g. `Active`, `Screen Off`, `Suspend`.
    pub state: String,
    /// Transition in progress, if any.
    #[serde(default)]
    pub processing: Option<String>,
    /// Why the appliance last powered on.
    #[serde(default)]
    pub power_on_reason: Option<String>,
}

impl PowerState {
    /// Placeholder used when the appliance never reports its power state.
    pub const UNKNOWN: &str = "Unknown";

    /// Creates a power state with only a state name.
    #[must_use]
    pub fn new(state: impl Into<String>) -> Self {
        Self {
            state: state.into(),
            processing: None,
            power_on_reason: None,
        }
    }

    /// Reads a power state from a reply payload.
    #[must_use]
    pub fn from_payload(payload: &Value) -> Option<Self> {
        serde_json::from_value(payload.clone()).ok()
    }
}

// ============================================================================
// MirrorSnapshot
// ============================================================================

/// Copy of the mirrored appliance state.
///
/// `None` or empty means "not delivered yet".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MirrorSnapshot {
    /// Power state.
    pub power_state: Option<PowerState>,
    /// Foreground application id.
    pub current_app_id: Option<String>,
    /// Mute flag.
    pub muted: Option<bool>,
    /// Volume level.
    pub volume: Option<i64>,
    /// Current TV channel.
    pub current_channel: Option<Value>,
    /// Program info of the current channel.
    pub channel_info: Option<Value>,
    /// Channel list.
    pub channels: Option<Value>,
    /// Launch points keyed by app id.
    pub apps: FxHashMap<String, Value>,
    /// External inputs keyed by app id.
    pub inputs: FxHashMap<String, Value>,
    /// System information.
    pub system_info: Option<Value>,
    /// Software information.
    pub software_info: Option<Value>,
    /// Active sound output route.
    pub sound_output: Option<String>,
    /// Mirrored picture settings.
    pub picture_settings: Option<Value>,
}

impl MirrorSnapshot {
    /// Returns `true` if the appliance is on.
    ///
    /// Older firmware reports `Unknown`; then a non-empty foreground app
    /// counts as on.
    #[must_use]
    pub fn is_on(&self) -> bool {
        match self.power_state.as_ref().map(|p| p.state.as_str()) {
            None | Some("Power Off" | "Suspend" | "Active Standby") => false,
            Some(PowerState::UNKNOWN) => self
                .current_app_id
                .as_deref()
                .is_some_and(|app| !app.is_empty()),
            Some(_) => true,
        }
    }

    /// Returns `true` if the appliance is on with the screen lit.
    #[must_use]
    pub fn is_screen_on(&self) -> bool {
        self.is_on()
            && self
                .power_state
                .as_ref()
                .is_some_and(|p| p.state != "Screen Off")
    }
}

// ============================================================================
// MirrorField
// ============================================================================

/// A mirrored field together with the subscription that feeds it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MirrorField {
    /// Power state.
    Power,
    /// Foreground app; also drives the channel subscriptions.
    CurrentApp,
    /// Mute flag.
    Muted,
    /// Volume level.
    Volume,
    /// App catalogue.
    Apps,
    /// External inputs.
    Inputs,
    /// Sound output route.
    SoundOutput,
    /// Picture settings.
    PictureSettings,
    /// Channel list.
    ChannelList,
    /// Current channel; also drives the channel info subscription.
    CurrentChannel,
    /// Current channel program info.
    ChannelInfo,
}

impl MirrorField {
    /// Subscriptions issued on every connect.
    pub const BASELINE: [Self; 8] = [
        Self::Power,
        Self::CurrentApp,
        Self::Muted,
        Self::Volume,
        Self::Apps,
        Self::Inputs,
        Self::SoundOutput,
        Self::PictureSettings,
    ];

    /// Service path of the feeding subscription.
    #[must_use]
    pub fn service(self) -> &'static str {
        match self {
            Self::Power => ep::GET_POWER_STATE,
            Self::CurrentApp => ep::GET_CURRENT_APP_INFO,
            Self::Muted => ep::GET_AUDIO_STATUS,
            Self::Volume => ep::GET_VOLUME,
            Self::Apps => ep::GET_APPS,
            Self::Inputs => ep::GET_INPUTS,
            Self::SoundOutput => ep::GET_SOUND_OUTPUT,
            Self::PictureSettings => ep::GET_SYSTEM_SETTINGS,
            Self::ChannelList => ep::GET_TV_CHANNELS,
            Self::CurrentChannel => ep::GET_CURRENT_CHANNEL,
            Self::ChannelInfo => ep::GET_CHANNEL_INFO,
        }
    }

    /// Payload of the feeding subscription.
    #[must_use]
    pub fn payload(self) -> Option<Value> {
        match self {
            Self::PictureSettings => Some(json!({
                "category": "picture",
                "keys": ep::DEFAULT_PICTURE_KEYS,
            })),
            _ => None,
        }
    }

    /// Writes one delivered payload into the snapshot.
    pub fn apply(self, snapshot: &mut MirrorSnapshot, payload: &Value) {
        match self {
            Self::Power => snapshot.power_state = PowerState::from_payload(payload),
            Self::CurrentApp => snapshot.current_app_id = string_field(payload, "appId"),
            Self::Muted => snapshot.muted = payload.get("mute").and_then(Value::as_bool),
            Self::Volume => snapshot.volume = volume_level(payload),
            Self::Apps => apply_apps(&mut snapshot.apps, payload),
            Self::Inputs => {
                snapshot.inputs = list_field(payload, "devices")
                    .map(|devices| keyed_by(devices, "appId"))
                    .unwrap_or_default();
            }
            Self::SoundOutput => snapshot.sound_output = string_field(payload, "soundOutput"),
            Self::PictureSettings => snapshot.picture_settings = payload.get("settings").cloned(),
            Self::ChannelList => snapshot.channels = payload.get("channelList").cloned(),
            Self::CurrentChannel => snapshot.current_channel = Some(payload.clone()),
            Self::ChannelInfo => snapshot.channel_info = Some(payload.clone()),
        }
    }
}

// ============================================================================
// Payload Helpers
// ============================================================================

fn string_field(payload: &Value, key: &str) -> Option<String> {
    payload.get(key).and_then(Value::as_str).map(str::to_string)
}

/// Reads `volumeStatus.volume`, falling back to a top-level `volume`.
fn volume_level(payload: &Value) -> Option<i64> {
    payload
        .get("volumeStatus")
        .unwrap_or(payload)
        .get("volume")
        .and_then(Value::as_i64)
}

/// Reads a list stored under `key`, or the payload itself if it is a list.
fn list_field<'a>(payload: &'a Value, key: &str) -> Option<&'a Vec<Value>> {
    payload
        .get(key)
        .and_then(Value::as_array)
        .or_else(|| payload.as_array())
}

fn keyed_by(items: &[Value], key: &str) -> FxHashMap<String, Value> {
    items
        .iter()
        .filter_map(|item| {
            let id = item.get(key).and_then(Value::as_str)?;
            Some((id.to_string(), item.clone()))
        })
        .collect()
}

/// Full catalogue replaces the map; an incremental change touches one app.
fn apply_apps(apps: &mut FxHashMap<String, Value>, payload: &Value) {
    if let Some(launch_points) = list_field(payload, "launchPoints") {
        *apps = keyed_by(launch_points, "id");
        return;
    }

    let Some(id) = payload.get("id").and_then(Value::as_str) else {
        trace!("App update without id ignored");
        return;
    };

    if payload.get("change").and_then(Value::as_str) == Some("removed") {
        apps.remove(id);
    } else {
        apps.insert(id.to_string(), payload.clone());
    }
}

// ============================================================================
// StateMirror
// ============================================================================

/// Shared mirror storage.
#[derive(Debug, Default)]
pub(crate) struct StateMirror {
    snapshot: RwLock<MirrorSnapshot>,
    /// Set once the baseline subscriptions are in place.
    notify: AtomicBool,
}

impl StateMirror {
    #[inline]
    pub(crate) fn read<R>(&self, f: impl FnOnce(&MirrorSnapshot) -> R) -> R {
        f(&self.snapshot.read())
    }

    #[inline]
    pub(crate) fn update(&self, f: impl FnOnce(&mut MirrorSnapshot)) {
        f(&mut self.snapshot.write());
    }

    pub(crate) fn snapshot(&self) -> MirrorSnapshot {
        self.snapshot.read().clone()
    }

    /// Forgets every field and disables notifications.
    pub(crate) fn reset(&self) {
        self.notify.store(false, Ordering::SeqCst);
        *self.snapshot.write() = MirrorSnapshot::default();
    }

    #[inline]
    pub(crate) fn set_notify(&self, enabled: bool) {
        self.notify.store(enabled, Ordering::SeqCst);
    }

    #[inline]
    pub(crate) fn notify_enabled(&self) -> bool {
        self.notify.load(Ordering::SeqCst)
    }
}

// ============================================================================
// Observers
// ============================================================================

/// Registered observers.
#[derive(Default)]
pub(crate) struct Observers {
    next_id: AtomicU64,
    list: Mutex<Vec<(ObserverId, Observer)>>,
}

impl Observers {
    pub(crate) fn add(&self, observer: Observer) -> ObserverId {
        let id = ObserverId::new(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.list.lock().push((id, observer));
        id
    }

    pub(crate) fn remove(&self, id: ObserverId) -> bool {
        let mut list = self.list.lock();
        let before = list.len();
        list.retain(|(existing, _)| *existing != id);
        list.len() != before
    }

    pub(crate) fn clear(&self) {
        self.list.lock().clear();
    }

    /// Copies the current observers so none are called under the lock.
    pub(crate) fn snapshot(&self) -> Vec<Observer> {
        self.list
            .lock()
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect()
    }
}

// ============================================================================
// Client - Mirror Updates
// ============================================================================

impl Client {
    /// Applies one delivery to the mirror, issues follow-up subscriptions,
    /// then notifies observers.
    pub(crate) async fn apply_mirror(&self, field: MirrorField, payload: Value) -> Result<()> {
        trace!(?field, "Mirror update");
        let state = &self.inner.state;
        state.update(|snapshot| field.apply(snapshot, &payload));

        match field {
            MirrorField::CurrentApp => {
                let (need_channels, need_channel) = state.read(|s| {
                    (
                        s.channels.is_none(),
                        s.current_app_id.as_deref() == Some(ep::LIVE_TV_APP)
                            && s.current_channel.is_none(),
                    )
                });

                if need_channels {
                    self.subscribe_optional(MirrorField::ChannelList).await?;
                }
                if need_channel {
                    self.subscribe_optional(MirrorField::CurrentChannel).await?;
                }
            }

            MirrorField::CurrentChannel => {
                if state.read(|s| s.channel_info.is_none()) {
                    self.subscribe_optional(MirrorField::ChannelInfo).await?;
                }
            }

            _ => {}
        }

        self.notify_observers().await;
        Ok(())
    }

    /// Subscribes a mirror field the appliance may not provide.
    ///
    /// # Errors
    ///
    /// Every subscribe error except [`Error::ServiceNotFound`](crate::Error::ServiceNotFound).
    pub(crate) async fn subscribe_optional(&self, field: MirrorField) -> Result<()> {
        match self
            .subscribe_consumer(Consumer::Mirror(field), field.service(), field.payload())
            .await
        {
            Ok(_) => Ok(()),
            Err(e) if e.is_service_not_found() => {
                debug!(?field, "Optional subscription not supported");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Runs every observer if notifications are enabled.
    pub(crate) async fn notify_observers(&self) {
        if self.inner.state.notify_enabled() {
            self.run_observers().await;
        }
    }

    /// Runs every observer concurrently with the current snapshot.
    pub(crate) async fn run_observers(&self) {
        let observers = self.inner.observers.snapshot();
        if observers.is_empty() {
            return;
        }

        let snapshot = self.inner.state.snapshot();
        join_all(observers.iter().map(|observer| observer(snapshot.clone()))).await;
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn applied(field: MirrorField, payload: Value) -> MirrorSnapshot {
        let mut snapshot = MirrorSnapshot::default();
        field.apply(&mut snapshot, &payload);
        snapshot
    }

    fn with_power(state: Option<&str>, app: Option<&str>) -> MirrorSnapshot {
        MirrorSnapshot {
            power_state: state.map(PowerState::new),
            current_app_id: app.map(str::to_string),
            ..MirrorSnapshot::default()
        }
    }

    #[test]
    fn test_is_on_truth_table() {
        assert!(!with_power(None, Some("netflix")).is_on());
        assert!(!with_power(Some("Power Off"), Some("netflix")).is_on());
        assert!(!with_power(Some("Suspend"), None).is_on());
        assert!(!with_power(Some("Active Standby"), None).is_on());
        assert!(!with_power(Some("Unknown"), None).is_on());
        assert!(!with_power(Some("Unknown"), Some("")).is_on());
        assert!(with_power(Some("Unknown"), Some("netflix")).is_on());
        assert!(with_power(Some("Active"), None).is_on());
        assert!(with_power(Some("Screen Off"), None).is_on());
    }

    #[test]
    fn test_is_screen_on() {
        assert!(with_power(Some("Active"), None).is_screen_on());
        assert!(!with_power(Some("Screen Off"), None).is_screen_on());
        assert!(!with_power(Some("Suspend"), None).is_screen_on());
        assert!(!with_power(None, None).is_screen_on());
    }

    #[test]
    fn test_power_state_payload() {
        let snapshot = applied(
            MirrorField::Power,
            json!({"state": "Active", "processing": "Screen On", "returnValue": true}),
        );
        let power = snapshot.power_state.expect("power");
        assert_eq!(power.state, "Active");
        assert_eq!(power.processing.as_deref(), Some("Screen On"));
        assert_eq!(power.power_on_reason, None);
    }

    #[test]
    fn test_volume_reads_nested_status() {
        let nested = applied(
            MirrorField::Volume,
            json!({"volumeStatus": {"volume": 12}, "returnValue": true}),
        );
        assert_eq!(nested.volume, Some(12));

        let flat = applied(MirrorField::Volume, json!({"volume": 7}));
        assert_eq!(flat.volume, Some(7));
    }

    #[test]
    fn test_apps_full_then_removal() {
        let mut snapshot = MirrorSnapshot::default();
        MirrorField::Apps.apply(
            &mut snapshot,
            &json!({"launchPoints": [{"id": "a", "title": "A"}, {"id": "b", "title": "B"}]}),
        );
        assert_eq!(snapshot.apps.len(), 2);

        MirrorField::Apps.apply(&mut snapshot, &json!({"id": "a", "change": "removed"}));
        assert_eq!(snapshot.apps.len(), 1);
        assert!(snapshot.apps.contains_key("b"));
    }

    #[test]
    fn test_apps_incremental_upsert() {
        let mut snapshot = MirrorSnapshot::default();
        MirrorField::Apps.apply(&mut snapshot, &json!([{"id": "a"}]));
        MirrorField::Apps.apply(
            &mut snapshot,
            &json!({"id": "c", "change": "added", "title": "C"}),
        );

        assert_eq!(snapshot.apps.len(), 2);
        assert_eq!(snapshot.apps["c"]["title"], "C");
    }

    #[test]
    fn test_inputs_replaced_on_every_delivery() {
        let mut snapshot = MirrorSnapshot::default();
        MirrorField::Inputs.apply(
            &mut snapshot,
            &json!({"devices": [{"appId": "hdmi1"}, {"appId": "hdmi2"}]}),
        );
        assert_eq!(snapshot.inputs.len(), 2);

        MirrorField::Inputs.apply(&mut snapshot, &json!({"devices": [{"appId": "hdmi3"}]}));
        assert_eq!(snapshot.inputs.len(), 1);
        assert!(snapshot.inputs.contains_key("hdmi3"));
    }

    #[test]
    fn test_scalar_fields() {
        assert_eq!(applied(MirrorField::Muted, json!({"mute": true})).muted, Some(true));
        assert_eq!(
            applied(MirrorField::SoundOutput, json!({"soundOutput": "external_arc"}))
                .sound_output
                .as_deref(),
            Some("external_arc")
        );
        assert_eq!(
            applied(MirrorField::PictureSettings, json!({"settings": {"contrast": "85"}}))
                .picture_settings,
            Some(json!({"contrast": "85"}))
        );
        assert_eq!(
            applied(MirrorField::ChannelList, json!({"channelList": [1, 2]})).channels,
            Some(json!([1, 2]))
        );
    }

    #[test]
    fn test_picture_settings_subscription_payload() {
        let payload = MirrorField::PictureSettings.payload().expect("payload");
        assert_eq!(payload["category"], "picture");
        assert_eq!(payload["keys"][0], "contrast");
        assert!(MirrorField::Power.payload().is_none());
    }

    #[test]
    fn test_reset_clears_everything() {
        let mirror = StateMirror::default();
        mirror.update(|s| {
            s.muted = Some(true);
            s.apps.insert("a".into(), json!({}));
        });
        mirror.set_notify(true);

        mirror.reset();

        assert_eq!(mirror.snapshot(), MirrorSnapshot::default());
        assert!(!mirror.notify_enabled());
    }

    #[test]
    fn test_observer_registry() {
        let observers = Observers::default();
        let observer: Observer =
            Arc::new(|_: MirrorSnapshot| -> BoxFuture<'static, ()> { Box::pin(async {}) });

        let first = observers.add(Arc::clone(&observer));
        let second = observers.add(observer);
        assert_ne!(first, second);
        assert_eq!(observers.snapshot().len(), 2);

        assert!(observers.remove(first));
        assert!(!observers.remove(first));
        assert_eq!(observers.snapshot().len(), 1);

        observers.clear();
        assert!(observers.snapshot().is_empty());
    }
}
