//! Command catalogue.
//!
//! Typed wrappers over [`Client::request`] and [`Client::command`], one per
//! appliance service. Getters pick the interesting field out of the reply
//! payload; everything else returns the payload untouched.
//!
//! # Example
//!
//! ```no_run
//! # use webos_remote::Client;
//! # async fn example(client: &Client) -> webos_remote::Result<()> {
//! client.launch_app("netflix").await?;
//! client.set_volume(12).await?;
//! client.send_message("Dinner is ready", None).await?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::{Value, json};
use tokio::time::sleep;
use tracing::debug;

use crate::error::{Error, Result};
use crate::protocol::RequestType;
use crate::protocol::endpoints as ep;

use super::core::Client;
use super::state::PowerState;

// ============================================================================
// Client - Power
// ============================================================================

impl Client {
    /// Fetches the power state.
    ///
    /// # Errors
    ///
    /// Request errors, or [`Error::Protocol`] if the payload has no state.
    pub async fn get_power_state(&self) -> Result<PowerState> {
        let payload = self.request(ep::GET_POWER_STATE, None).await?;
        PowerState::from_payload(&payload)
            .ok_or_else(|| Error::protocol("Power state reply without state"))
    }

    /// Wakes the appliance.
    ///
    /// # Errors
    ///
    /// Request errors.
    pub async fn power_on(&self) -> Result<Value> {
        self.request(ep::POWER_ON, None).await
    }

    /// Powers the appliance off.
    ///
    /// Refreshes the power state first and does nothing if the appliance is
    /// already off, so an off appliance is never toggled back on. The command
    /// is not awaited: a shutting-down appliance may never answer.
    ///
    /// # Errors
    ///
    /// Request errors from the power state refresh, or send errors.
    pub async fn power_off(&self) -> Result<()> {
        let mut current = self.snapshot();
        current.power_state = Some(self.get_power_state().await?);

        if !current.is_on() {
            debug!("Appliance already off");
            return Ok(());
        }

        self.command(RequestType::Request, ep::POWER_OFF, None, None)
            .await
    }

    /// Turns the screen off, leaving the appliance on.
    ///
    /// # Errors
    ///
    /// Send errors.
    pub async fn turn_screen_off(&self) -> Result<()> {
        self.command(RequestType::Request, ep::TURN_OFF_SCREEN, None, None)
            .await
    }

    /// Turns the screen back on.
    ///
    /// # Errors
    ///
    /// Send errors.
    pub async fn turn_screen_on(&self) -> Result<()> {
        self.command(RequestType::Request, ep::TURN_ON_SCREEN, None, None)
            .await
    }
}

// ============================================================================
// Client - Apps
// ============================================================================

impl Client {
    /// Lists launch points.
    ///
    /// # Errors
    ///
    /// Request errors.
    pub async fn get_apps(&self) -> Result<Vec<Value>> {
        let payload = self.request(ep::GET_APPS, None).await?;
        Ok(list(&payload, "launchPoints"))
    }

    /// Returns the foreground app id.
    ///
    /// # Errors
    ///
    /// Request errors.
    pub async fn get_current_app(&self) -> Result<Option<String>> {
        let payload = self.request(ep::GET_CURRENT_APP_INFO, None).await?;
        Ok(string(&payload, "appId"))
    }

    /// Launches an app.
    ///
    /// # Errors
    ///
    /// Request errors.
    pub async fn launch_app(&self, app: &str) -> Result<Value> {
        self.request(ep::LAUNCH, Some(json!({ "id": app }))).await
    }

    /// Launches an app with launch parameters.
    ///
    /// # Errors
    ///
    /// Request errors.
    pub async fn launch_app_with_params(&self, app: &str, params: Value) -> Result<Value> {
        self.request(ep::LAUNCH, Some(json!({ "id": app, "params": params })))
            .await
    }

    /// Launches an app on a content id.
    ///
    /// # Errors
    ///
    /// Request errors.
    pub async fn launch_app_with_content_id(&self, app: &str, content_id: &str) -> Result<Value> {
        self.request(ep::LAUNCH, Some(json!({ "id": app, "contentId": content_id })))
            .await
    }

    /// Closes an app.
    ///
    /// # Errors
    ///
    /// Request errors.
    pub async fn close_app(&self, app: &str) -> Result<Value> {
        self.request(ep::LAUNCHER_CLOSE, Some(json!({ "id": app })))
            .await
    }
}

// ============================================================================
// Client - System
// ============================================================================

impl Client {
    /// Lists the services the appliance exposes.
    ///
    /// # Errors
    ///
    /// Request errors.
    pub async fn get_services(&self) -> Result<Vec<Value>> {
        let payload = self.request(ep::GET_SERVICES, None).await?;
        Ok(list(&payload, "services"))
    }

    /// Fetches software information.
    ///
    /// # Errors
    ///
    /// Request errors.
    pub async fn get_software_info(&self) -> Result<Value> {
        self.request(ep::GET_SOFTWARE_INFO, None).await
    }

    /// Fetches system information.
    ///
    /// # Errors
    ///
    /// Request errors.
    pub async fn get_system_info(&self) -> Result<Value> {
        self.request(ep::GET_SYSTEM_INFO, None).await
    }

    /// Reads system settings of one category.
    ///
    /// # Errors
    ///
    /// Request errors.
    pub async fn get_system_settings(&self, category: &str, keys: &[&str]) -> Result<Value> {
        self.request(
            ep::GET_SYSTEM_SETTINGS,
            Some(json!({ "category": category, "keys": keys })),
        )
        .await
    }

    /// Reads picture settings; `None` reads the default keys.
    ///
    /// # Errors
    ///
    /// Request errors, or [`Error::Protocol`] if the payload has no settings.
    pub async fn get_picture_settings(&self, keys: Option<&[&str]>) -> Result<Value> {
        let keys = keys.unwrap_or(ep::DEFAULT_PICTURE_KEYS);
        let mut payload = self.get_system_settings("picture", keys).await?;
        payload
            .get_mut("settings")
            .map(Value::take)
            .ok_or_else(|| Error::protocol("Picture settings reply without settings"))
    }

    /// Turns 3D on.
    ///
    /// # Errors
    ///
    /// Request errors.
    pub async fn turn_3d_on(&self) -> Result<Value> {
        self.request(ep::SET_3D_ON, None).await
    }

    /// Turns 3D off.
    ///
    /// # Errors
    ///
    /// Request errors.
    pub async fn turn_3d_off(&self) -> Result<Value> {
        self.request(ep::SET_3D_OFF, None).await
    }
}

// ============================================================================
// Client - Inputs
// ============================================================================

impl Client {
    /// Lists external inputs.
    ///
    /// # Errors
    ///
    /// Request errors.
    pub async fn get_inputs(&self) -> Result<Vec<Value>> {
        let payload = self.request(ep::GET_INPUTS, None).await?;
        Ok(list(&payload, "devices"))
    }

    /// Switches to an external input.
    ///
    /// # Errors
    ///
    /// Request errors.
    pub async fn set_input(&self, input: &str) -> Result<Value> {
        self.request(ep::SET_INPUT, Some(json!({ "inputId": input })))
            .await
    }
}

// ============================================================================
// Client - Audio
// ============================================================================

impl Client {
    /// Fetches the audio status.
    ///
    /// # Errors
    ///
    /// Request errors.
    pub async fn get_audio_status(&self) -> Result<Value> {
        self.request(ep::GET_AUDIO_STATUS, None).await
    }

    /// Returns the mute flag.
    ///
    /// # Errors
    ///
    /// Request errors.
    pub async fn get_muted(&self) -> Result<Option<bool>> {
        let payload = self.get_audio_status().await?;
        Ok(payload.get("mute").and_then(Value::as_bool))
    }

    /// Mutes or unmutes.
    ///
    /// # Errors
    ///
    /// Request errors.
    pub async fn set_mute(&self, mute: bool) -> Result<Value> {
        self.request(ep::SET_MUTE, Some(json!({ "mute": mute }))).await
    }

    /// Returns the volume level.
    ///
    /// # Errors
    ///
    /// Request errors.
    pub async fn get_volume(&self) -> Result<Option<i64>> {
        let payload = self.request(ep::GET_VOLUME, None).await?;
        Ok(payload
            .get("volumeStatus")
            .unwrap_or(&payload)
            .get("volume")
            .and_then(Value::as_i64))
    }

    /// Sets the volume level. Negative levels are clamped to 0.
    ///
    /// # Errors
    ///
    /// Request errors.
    pub async fn set_volume(&self, volume: i64) -> Result<Value> {
        self.request(ep::SET_VOLUME, Some(json!({ "volume": volume.max(0) })))
            .await
    }

    /// Steps the volume up.
    ///
    /// # Errors
    ///
    /// Request errors.
    pub async fn volume_up(&self) -> Result<Value> {
        self.volume_step(ep::VOLUME_UP).await
    }

    /// Steps the volume down.
    ///
    /// # Errors
    ///
    /// Request errors.
    pub async fn volume_down(&self) -> Result<Value> {
        self.volume_step(ep::VOLUME_DOWN).await
    }

    /// Returns the active sound output route.
    ///
    /// # Errors
    ///
    /// Request errors.
    pub async fn get_sound_output(&self) -> Result<Option<String>> {
        let payload = self.request(ep::GET_SOUND_OUTPUT, None).await?;
        Ok(string(&payload, "soundOutput"))
    }

    /// Switches the sound output route.
    ///
    /// # Errors
    ///
    /// Request errors.
    pub async fn change_sound_output(&self, output: &str) -> Result<Value> {
        self.request(ep::CHANGE_SOUND_OUTPUT, Some(json!({ "output": output })))
            .await
    }

    /// Some outputs drop a step that follows the previous one too closely.
    /// On those, steps are serialized and each holds the lock for
    /// `volume_step_delay` after its reply.
    async fn volume_step(&self, service: &str) -> Result<Value> {
        let delayed = self
            .sound_output()
            .is_some_and(|output| ep::DELAYED_VOLUME_STEP_OUTPUTS.contains(&output.as_str()));

        match self.inner.config.volume_step_delay {
            Some(delay) if delayed => {
                let _step = self.inner.volume_step.lock().await;
                let reply = self.request(service, None).await?;
                sleep(delay).await;
                Ok(reply)
            }
            _ => self.request(service, None).await,
        }
    }
}

// ============================================================================
// Client - Channels
// ============================================================================

impl Client {
    /// Tunes to the next channel.
    ///
    /// # Errors
    ///
    /// Request errors.
    pub async fn channel_up(&self) -> Result<Value> {
        self.request(ep::TV_CHANNEL_UP, None).await
    }

    /// Tunes to the previous channel.
    ///
    /// # Errors
    ///
    /// Request errors.
    pub async fn channel_down(&self) -> Result<Value> {
        self.request(ep::TV_CHANNEL_DOWN, None).await
    }

    /// Lists channels.
    ///
    /// # Errors
    ///
    /// Request errors.
    pub async fn get_channels(&self) -> Result<Vec<Value>> {
        let payload = self.request(ep::GET_TV_CHANNELS, None).await?;
        Ok(list(&payload, "channelList"))
    }

    /// Fetches the current channel.
    ///
    /// # Errors
    ///
    /// Request errors.
    pub async fn get_current_channel(&self) -> Result<Value> {
        self.request(ep::GET_CURRENT_CHANNEL, None).await
    }

    /// Fetches program info of the current channel.
    ///
    /// # Errors
    ///
    /// Request errors.
    pub async fn get_channel_info(&self) -> Result<Value> {
        self.request(ep::GET_CHANNEL_INFO, None).await
    }

    /// Tunes to a channel id.
    ///
    /// # Errors
    ///
    /// Request errors.
    pub async fn set_channel(&self, channel: &str) -> Result<Value> {
        self.request(ep::SET_CHANNEL, Some(json!({ "channelId": channel })))
            .await
    }
}

// ============================================================================
// Client - Media
// ============================================================================

impl Client {
    /// Resumes playback.
    ///
    /// # Errors
    ///
    /// Request errors.
    pub async fn play(&self) -> Result<Value> {
        self.request(ep::MEDIA_PLAY, None).await
    }

    /// Pauses playback.
    ///
    /// # Errors
    ///
    /// Request errors.
    pub async fn pause(&self) -> Result<Value> {
        self.request(ep::MEDIA_PAUSE, None).await
    }

    /// Stops playback.
    ///
    /// # Errors
    ///
    /// Request errors.
    pub async fn stop(&self) -> Result<Value> {
        self.request(ep::MEDIA_STOP, None).await
    }

    /// Closes the media viewer.
    ///
    /// # Errors
    ///
    /// Request errors.
    pub async fn close(&self) -> Result<Value> {
        self.request(ep::MEDIA_CLOSE, None).await
    }

    /// Rewinds.
    ///
    /// # Errors
    ///
    /// Request errors.
    pub async fn rewind(&self) -> Result<Value> {
        self.request(ep::MEDIA_REWIND, None).await
    }

    /// Fast-forwards.
    ///
    /// # Errors
    ///
    /// Request errors.
    pub async fn fast_forward(&self) -> Result<Value> {
        self.request(ep::MEDIA_FAST_FORWARD, None).await
    }
}

// ============================================================================
// Client - Text & Web
// ============================================================================

impl Client {
    /// Types into the focused text field, optionally replacing its content.
    ///
    /// # Errors
    ///
    /// Request errors.
    pub async fn insert_text(&self, text: &str, replace: bool) -> Result<Value> {
        self.request(ep::INSERT_TEXT, Some(json!({ "text": text, "replace": replace })))
            .await
    }

    /// Presses enter in the focused text field.
    ///
    /// # Errors
    ///
    /// Request errors.
    pub async fn send_enter_key(&self) -> Result<Value> {
        self.request(ep::SEND_ENTER, None).await
    }

    /// Deletes a character in the focused text field.
    ///
    /// # Errors
    ///
    /// Request errors.
    pub async fn send_delete_key(&self) -> Result<Value> {
        self.request(ep::SEND_DELETE, None).await
    }

    /// Opens a URL in the browser.
    ///
    /// # Errors
    ///
    /// Request errors.
    pub async fn open_url(&self, url: &str) -> Result<Value> {
        self.request(ep::OPEN, Some(json!({ "target": url }))).await
    }

    /// Closes the web browser.
    ///
    /// # Errors
    ///
    /// Request errors.
    pub async fn close_web(&self) -> Result<Value> {
        self.request(ep::CLOSE_WEB_APP, None).await
    }
}

// ============================================================================
// Client - Notifications
// ============================================================================

impl Client {
    /// Shows a toast, optionally with an icon read from `icon`.
    ///
    /// # Errors
    ///
    /// - [`Error::Io`] if the icon cannot be read
    /// - request errors
    pub async fn send_message(&self, message: &str, icon: Option<&Path>) -> Result<Value> {
        let (icon_data, icon_extension) = match icon {
            Some(path) => {
                let bytes = tokio::fs::read(path).await?;
                let extension = path
                    .extension()
                    .map(|ext| ext.to_string_lossy().into_owned())
                    .unwrap_or_default();
                (STANDARD.encode(bytes), extension)
            }
            None => (String::new(), String::new()),
        };

        self.request(
            ep::SHOW_MESSAGE,
            Some(json!({
                "message": message,
                "iconData": icon_data,
                "iconExtension": icon_extension,
            })),
        )
        .await
    }

    /// Calls an internal `luna://` service the control socket does not expose.
    ///
    /// Creates an alert whose button and close/fail actions all invoke `uri`
    /// with `params`, then closes it, which fires the call. Nothing the luna
    /// service returns is visible.
    ///
    /// # Errors
    ///
    /// - [`Error::Protocol`] if the alert reply has no alert id
    /// - request errors
    pub async fn luna_request(&self, uri: &str, params: Value) -> Result<Value> {
        let luna_uri = format!("luna://{uri}");
        let action = json!({ "uri": luna_uri, "params": params });

        let alert = self
            .request(
                ep::CREATE_ALERT,
                Some(json!({
                    "message": " ",
                    "buttons": [{ "label": "", "onClick": luna_uri, "params": params }],
                    "onclose": action,
                    "onfail": action,
                })),
            )
            .await?;

        let alert_id = alert
            .get("alertId")
            .cloned()
            .filter(|id| !id.is_null())
            .ok_or_else(|| Error::protocol("Alert reply without alertId"))?;

        self.request(ep::CLOSE_ALERT, Some(json!({ "alertId": alert_id })))
            .await
    }
}

// ============================================================================
// Client - Luna Settings
// ============================================================================

impl Client {
    /// Sets the picture mode of the current input.
    ///
    /// # Errors
    ///
    /// See [`luna_request`](Self::luna_request).
    pub async fn set_current_picture_mode(&self, mode: &str) -> Result<Value> {
        self.set_system_settings("picture", json!({ "pictureMode": mode }))
            .await
    }

    /// Sets the picture mode of one input, dynamic range and 3D mode.
    ///
    /// Typical values: `dynamic_range` one of `sdr`, `hdr`, `technicolorHdr`,
    /// `dolbyHdr`; `stereoscopic` one of `2d`, `3d`.
    ///
    /// # Errors
    ///
    /// See [`luna_request`](Self::luna_request).
    pub async fn set_picture_mode(
        &self,
        mode: &str,
        input: &str,
        dynamic_range: &str,
        stereoscopic: &str,
    ) -> Result<Value> {
        let category = format!("picture${input}.x.{stereoscopic}.{dynamic_range}");
        self.set_system_settings(&category, json!({ "pictureMode": mode }))
            .await
    }

    /// Sets picture settings of the current picture mode.
    ///
    /// # Errors
    ///
    /// See [`luna_request`](Self::luna_request).
    pub async fn set_current_picture_settings(&self, settings: Value) -> Result<Value> {
        self.set_system_settings("picture", settings).await
    }

    /// Sets picture settings of one picture mode, input and 3D mode.
    ///
    /// # Errors
    ///
    /// See [`luna_request`](Self::luna_request).
    pub async fn set_picture_settings(
        &self,
        settings: Value,
        mode: &str,
        input: &str,
        stereoscopic: &str,
    ) -> Result<Value> {
        let category = format!("picture${input}.{mode}.{stereoscopic}.x");
        self.set_system_settings(&category, settings).await
    }

    /// Sets settings of the `other` category.
    ///
    /// # Errors
    ///
    /// See [`luna_request`](Self::luna_request).
    pub async fn set_other_settings(&self, settings: Value) -> Result<Value> {
        self.set_system_settings("other", settings).await
    }

    /// Sets configuration keys such as `tv.model.motionProMode`.
    ///
    /// # Errors
    ///
    /// See [`luna_request`](Self::luna_request).
    pub async fn set_configs(&self, configs: Value) -> Result<Value> {
        self.luna_request(ep::LUNA_SET_CONFIGS, json!({ "configs": configs }))
            .await
    }

    /// Starts the screen saver.
    ///
    /// # Errors
    ///
    /// See [`luna_request`](Self::luna_request).
    pub async fn show_screen_saver(&self) -> Result<Value> {
        self.luna_request(ep::LUNA_TURN_ON_SCREEN_SAVER, json!({}))
            .await
    }

    async fn set_system_settings(&self, category: &str, settings: Value) -> Result<Value> {
        self.luna_request(
            ep::LUNA_SET_SYSTEM_SETTINGS,
            json!({ "category": category, "settings": settings }),
        )
        .await
    }
}

// ============================================================================
// Payload Helpers
// ============================================================================

fn list(payload: &Value, key: &str) -> Vec<Value> {
    payload
        .get(key)
        .and_then(Value::as_array)
        .cloned()
        .unwrap_or_default()
}

fn string(payload: &Value, key: &str) -> Option<String> {
    payload.get(key).and_then(Value::as_str).map(str::to_string)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::sync::Arc;
    use std::time::Duration;

    use tokio_util::sync::CancellationToken;

    use crate::client::dispatcher;
    use crate::client::session::Session;
    use crate::storage::MemoryKeyStore;
    use crate::transport::mock::{self, Appliance};

    /// Client with an installed session answered by `responder`.
    fn attached<F>(builder: crate::ClientBuilder, responder: F) -> (Client, Appliance)
    where
        F: FnMut(&Value) -> Vec<Value> + Send + 'static,
    {
        let client = builder
            .address("10.0.0.9")
            .key_store(Arc::new(MemoryKeyStore::new()))
            .build()
            .expect("client");

        let (transport, end) = mock::pair();
        let session = Arc::new(Session::new(transport));
        client.install_session(Arc::clone(&session));
        tokio::spawn(dispatcher::run(
            client.clone(),
            session,
            CancellationToken::new(),
        ));

        (client, mock::spawn_appliance(end, responder))
    }

    fn ok(payload: Value) -> Vec<Value> {
        vec![json!({"type": "response", "payload": payload})]
    }

    #[tokio::test]
    async fn test_set_volume_clamps_at_zero() {
        let (client, appliance) = attached(Client::builder(), |_| ok(json!({"returnValue": true})));

        client.set_volume(-5).await.expect("set volume");

        let frames = appliance.frames_for(ep::SET_VOLUME);
        assert_eq!(frames[0].1["payload"]["volume"], 0);
    }

    #[tokio::test]
    async fn test_getters_pick_fields() {
        let (client, _appliance) = attached(Client::builder(), |frame| {
            match frame["uri"].as_str().unwrap_or_default() {
                "ssap://audio/getVolume" => {
                    ok(json!({"volumeStatus": {"volume": 14}, "returnValue": true}))
                }
                "ssap://com.webos.applicationManager/listLaunchPoints" => {
                    ok(json!({"launchPoints": [{"id": "a"}, {"id": "b"}], "returnValue": true}))
                }
                "ssap://com.webos.applicationManager/getForegroundAppInfo" => {
                    ok(json!({"appId": "netflix", "returnValue": true}))
                }
                _ => ok(json!({"returnValue": true})),
            }
        });

        assert_eq!(client.get_volume().await.expect("volume"), Some(14));
        assert_eq!(client.get_apps().await.expect("apps").len(), 2);
        assert_eq!(
            client.get_current_app().await.expect("app").as_deref(),
            Some("netflix")
        );
        assert!(client.get_inputs().await.expect("inputs").is_empty());
    }

    #[tokio::test]
    async fn test_power_off_skips_when_off() {
        let (client, appliance) = attached(Client::builder(), |frame| {
            if frame["uri"] == "ssap://com.webos.service.tvpower/power/getPowerState" {
                ok(json!({"state": "Suspend", "returnValue": true}))
            } else {
                ok(json!({"returnValue": true}))
            }
        });

        client.power_off().await.expect("power off");

        assert!(appliance.frames_for(ep::POWER_OFF).is_empty());
        // the mirror is only written by its subscription
        assert!(client.power_state().is_none());
    }

    #[tokio::test]
    async fn test_power_off_sends_when_on() {
        let (client, appliance) = attached(Client::builder(), |frame| {
            if frame["uri"] == "ssap://com.webos.service.tvpower/power/getPowerState" {
                ok(json!({"state": "Active", "returnValue": true}))
            } else {
                // a shutting-down appliance stays silent
                Vec::new()
            }
        });

        client.power_off().await.expect("power off");

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(appliance.frames_for(ep::POWER_OFF).len(), 1);
    }

    #[tokio::test]
    async fn test_luna_request_relays_through_alert() {
        let (client, appliance) = attached(Client::builder(), |frame| {
            if frame["uri"] == "ssap://system.notifications/createAlert" {
                ok(json!({"alertId": "alert-1", "returnValue": true}))
            } else {
                ok(json!({"returnValue": true}))
            }
        });

        client
            .set_picture_mode("expert1", "hdmi2", "sdr", "2d")
            .await
            .expect("picture mode");

        let create = &appliance.frames_for(ep::CREATE_ALERT)[0].1["payload"];
        assert_eq!(
            create["buttons"][0]["onClick"],
            "luna://com.webos.settingsservice/setSystemSettings"
        );
        assert_eq!(create["onclose"]["params"]["category"], "picture$hdmi2.x.2d.sdr");
        assert_eq!(create["onfail"]["params"]["settings"]["pictureMode"], "expert1");

        let close = &appliance.frames_for(ep::CLOSE_ALERT)[0].1["payload"];
        assert_eq!(close["alertId"], "alert-1");
    }

    #[tokio::test]
    async fn test_luna_request_without_alert_id() {
        let (client, appliance) = attached(Client::builder(), |_| ok(json!({"returnValue": true})));

        let result = client.show_screen_saver().await;

        assert!(matches!(result, Err(Error::Protocol { .. })));
        assert!(appliance.frames_for(ep::CLOSE_ALERT).is_empty());
    }

    #[tokio::test]
    async fn test_send_message_encodes_icon() {
        let dir = tempfile::tempdir().expect("tempdir");
        let icon = dir.path().join("icon.png");
        std::fs::write(&icon, b"png").expect("write icon");

        let (client, appliance) = attached(Client::builder(), |_| ok(json!({"returnValue": true})));

        client
            .send_message("hello", Some(&icon))
            .await
            .expect("message");
        client.send_message("plain", None).await.expect("message");

        let frames = appliance.frames_for(ep::SHOW_MESSAGE);
        assert_eq!(frames[0].1["payload"]["iconData"], "cG5n");
        assert_eq!(frames[0].1["payload"]["iconExtension"], "png");
        assert_eq!(frames[1].1["payload"]["iconData"], "");
    }

    #[tokio::test]
    async fn test_delayed_volume_steps_are_spaced() {
        let delay = Duration::from_millis(80);
        let (client, appliance) = attached(Client::builder().volume_step_delay(delay), |_| {
            ok(json!({"returnValue": true}))
        });
        client
            .inner
            .state
            .update(|s| s.sound_output = Some("external_arc".into()));

        let (first, second) = tokio::join!(client.volume_up(), client.volume_up());
        first.expect("first step");
        second.expect("second step");

        let frames = appliance.frames_for(ep::VOLUME_UP);
        assert_eq!(frames.len(), 2);
        assert!(frames[1].0.duration_since(frames[0].0) >= delay);
    }

    #[tokio::test]
    async fn test_volume_steps_undelayed_on_other_outputs() {
        let delay = Duration::from_millis(200);
        let (client, appliance) = attached(Client::builder().volume_step_delay(delay), |_| {
            ok(json!({"returnValue": true}))
        });
        client
            .inner
            .state
            .update(|s| s.sound_output = Some("tv_speaker".into()));

        let started = tokio::time::Instant::now();
        client.volume_down().await.expect("step");
        client.volume_down().await.expect("step");

        assert!(started.elapsed() < delay);
        assert_eq!(appliance.frames_for(ep::VOLUME_DOWN).len(), 2);
    }

    #[tokio::test]
    async fn test_not_connected() {
        let client = Client::builder()
            .address("10.0.0.9")
            .key_store(Arc::new(MemoryKeyStore::new()))
            .build()
            .expect("client");

        assert!(matches!(client.play().await, Err(Error::NotConnected)));
        assert!(matches!(
            client.turn_screen_off().await,
            Err(Error::NotConnected)
        ));
    }
}
