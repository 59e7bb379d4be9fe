//! Misty connection manager: REST dispatch and the subscription registry

use std::collections::HashMap;
use std::time::Duration;

use reqwest::{Client, Method};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, instrument, warn};
use url::Url;

use crate::config::ClientConfig;
use crate::error::{MistyClientError, Result};
use crate::events::{
    selection_conditions, EventMessage, EventSubscription, EventType, HazardType, SensorPosition,
    SubscriptionOptions,
};

/// Misty REST and WebSocket client
///
/// Owns the robot's address, an HTTP connection pool, and the registry of
/// named event subscriptions. REST methods take `&self`; anything touching
/// the registry takes `&mut self`.
#[derive(Debug)]
pub struct MistyClient {
    client: Client,
    config: ClientConfig,
    base_url: Url,
    ws_url: Url,
    subscriptions: HashMap<String, EventSubscription>,
}

impl MistyClient {
    /// Create a client for the robot at `address` (e.g. "192.168.1.96")
    pub fn new(address: &str) -> Result<Self> {
        Self::with_config(ClientConfig::new(address))
    }

    /// Create a client with custom timeouts and debounce
    pub fn with_config(config: ClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .connect_timeout(config.connect_timeout())
            .build()?;

        let host = config
            .address
            .trim_start_matches("http://")
            .trim_end_matches('/');
        if host.is_empty() {
            return Err(MistyClientError::InvalidArgument(
                "Robot address is empty".to_string(),
            ));
        }
        let base_url = Url::parse(&format!("http://{}/api/", host))?;
        let ws_url = Url::parse(&format!("ws://{}/pubsub", host))?;

        Ok(Self {
            client,
            config,
            base_url,
            ws_url,
            subscriptions: HashMap::new(),
        })
    }

    /// Robot address as configured
    pub fn address(&self) -> &str {
        &self.config.address
    }

    /// REST base URL (`http://<address>/api/`)
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Event endpoint (`ws://<address>/pubsub`)
    pub fn ws_url(&self) -> &Url {
        &self.ws_url
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    // =========================================================================
    // REST dispatch
    // =========================================================================

    /// Issue one request against `http://<address>/api/<path>`
    ///
    /// Returns the `result` of Misty's `{"status", "result"}` envelope, the
    /// body itself when there is no envelope, or `Null` for an empty body.
    /// Non-2xx answers fail with `Http`; a `"Failed"` envelope fails with
    /// `Api`. No retries.
    #[instrument(skip(self, body))]
    pub async fn request(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
        let url = self.base_url.join(path)?;
        debug!("{} {}", method, url);

        let mut builder = self.client.request(method, url);
        if let Some(body) = body {
            builder = builder.json(body);
        }
        let response = builder.send().await?;
        self.handle_response(response).await
    }

    pub(crate) async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let value = self.request(Method::GET, path, None).await?;
        serde_json::from_value(value).map_err(|e| MistyClientError::Parse(e.to_string()))
    }

    pub(crate) async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> Result<Value> {
        let body = to_body(body)?;
        self.request(Method::POST, path, Some(&body)).await
    }

    pub(crate) async fn post_empty(&self, path: &str) -> Result<Value> {
        self.request(Method::POST, path, None).await
    }

    pub(crate) async fn delete<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<Value> {
        let body = to_body(body)?;
        self.request(Method::DELETE, path, Some(&body)).await
    }

    pub(crate) fn http_client(&self) -> &Client {
        &self.client
    }

    /// Check status and unwrap Misty's response envelope
    pub(crate) async fn handle_response(&self, response: reqwest::Response) -> Result<Value> {
        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            return Err(MistyClientError::http(status.as_u16(), text));
        }
        unwrap_envelope(&text)
    }

    // =========================================================================
    // Subscription registry
    // =========================================================================

    /// Register a named subscription; it starts unsubscribed
    pub fn register_subscription(
        &mut self,
        name: &str,
        event_type: EventType,
        debounce_ms: u32,
    ) -> Result<&mut EventSubscription> {
        self.register_subscription_with(name, SubscriptionOptions::new(event_type, debounce_ms))
    }

    /// Register a named subscription with a return property or conditions
    pub fn register_subscription_with(
        &mut self,
        name: &str,
        options: SubscriptionOptions,
    ) -> Result<&mut EventSubscription> {
        use std::collections::hash_map::Entry;

        match self.subscriptions.entry(name.to_string()) {
            Entry::Occupied(_) => Err(MistyClientError::DuplicateName(name.to_string())),
            Entry::Vacant(slot) => {
                debug!("Registering subscription {} ({})", name, options.event_type);
                let subscription = EventSubscription::new(
                    name.to_string(),
                    options,
                    self.ws_url.clone(),
                    self.config.connect_timeout(),
                );
                Ok(slot.insert(subscription))
            }
        }
    }

    /// Register a `SlamStatus` subscription
    pub fn add_slam_status(
        &mut self,
        name: &str,
        debounce_ms: Option<u32>,
    ) -> Result<&mut EventSubscription> {
        let debounce_ms = debounce_ms.unwrap_or(self.config.debounce_ms);
        self.register_subscription(name, EventType::SlamStatus, debounce_ms)
    }

    /// Register an `IMU` subscription (orientation, angular velocity, acceleration)
    pub fn add_imu(
        &mut self,
        name: &str,
        debounce_ms: Option<u32>,
    ) -> Result<&mut EventSubscription> {
        let debounce_ms = debounce_ms.unwrap_or(self.config.debounce_ms);
        self.register_subscription(name, EventType::Imu, debounce_ms)
    }

    /// Register a `TouchSensor` subscription limited to `positions`
    ///
    /// An empty slice subscribes to every sensor.
    pub fn add_touch_sensor(
        &mut self,
        name: &str,
        positions: &[SensorPosition],
        debounce_ms: Option<u32>,
    ) -> Result<&mut EventSubscription> {
        let conditions = selection_conditions(
            "sensorPosition",
            positions,
            &SensorPosition::ALL,
            SensorPosition::as_str,
        );
        let options = SubscriptionOptions::new(
            EventType::TouchSensor,
            debounce_ms.unwrap_or(self.config.debounce_ms),
        )
        .with_conditions(conditions);
        self.register_subscription_with(name, options)
    }

    /// Register a `HazardNotification` subscription limited to `hazards`
    ///
    /// An empty slice subscribes to every hazard type.
    pub fn add_hazard_notification(
        &mut self,
        name: &str,
        hazards: &[HazardType],
        debounce_ms: Option<u32>,
    ) -> Result<&mut EventSubscription> {
        let conditions =
            selection_conditions("Hazard", hazards, &HazardType::ALL, HazardType::as_str);
        let options = SubscriptionOptions::new(
            EventType::HazardNotification,
            debounce_ms.unwrap_or(self.config.debounce_ms),
        )
        .with_conditions(conditions);
        self.register_subscription_with(name, options)
    }

    pub fn subscription(&self, name: &str) -> Option<&EventSubscription> {
        self.subscriptions.get(name)
    }

    pub fn subscription_mut(&mut self, name: &str) -> Option<&mut EventSubscription> {
        self.subscriptions.get_mut(name)
    }

    /// Names of all registered subscriptions, in no particular order
    pub fn subscription_names(&self) -> impl Iterator<Item = &str> {
        self.subscriptions.keys().map(String::as_str)
    }

    fn registered(&mut self, name: &str) -> Result<&mut EventSubscription> {
        self.subscriptions
            .get_mut(name)
            .ok_or_else(|| MistyClientError::UnknownSubscription(name.to_string()))
    }

    /// Open the socket of a registered subscription
    #[instrument(skip(self))]
    pub async fn subscribe(&mut self, name: &str) -> Result<()> {
        self.registered(name)?.subscribe().await
    }

    /// Latest event of a registered subscription
    pub fn get_message(&mut self, name: &str) -> Result<Option<EventMessage>> {
        Ok(self.registered(name)?.get_message())
    }

    /// Unsubscribe and drop the subscription from the registry
    ///
    /// The returned subscription is unsubscribed; its `get_message()`
    /// yields `None`. The name may be registered again afterwards.
    #[instrument(skip(self))]
    pub async fn unsubscribe(&mut self, name: &str) -> Result<EventSubscription> {
        self.registered(name)?.unsubscribe().await?;
        self.subscriptions
            .remove(name)
            .ok_or_else(|| MistyClientError::UnknownSubscription(name.to_string()))
    }

    /// Wait until a `SlamStatus` subscription reports `flag` (e.g. "HasPose")
    #[instrument(skip(self))]
    pub async fn wait_for_slam_status(
        &mut self,
        name: &str,
        flag: &str,
        timeout: Duration,
    ) -> Result<EventMessage> {
        self.registered(name)?
            .wait_for(
                |msg| msg.as_slam_status().is_some_and(|s| s.has(flag)),
                timeout,
            )
            .await
    }

    /// Unsubscribe every open channel and empty the registry
    ///
    /// Failures are logged; teardown always completes.
    pub async fn close_all(&mut self) {
        for (name, mut subscription) in self.subscriptions.drain() {
            if subscription.is_subscribed() {
                if let Err(e) = subscription.unsubscribe().await {
                    warn!("Failed to unsubscribe {}: {}", name, e);
                }
            }
        }
    }
}

fn to_body<B: Serialize + ?Sized>(body: &B) -> Result<Value> {
    serde_json::to_value(body).map_err(|e| MistyClientError::Parse(e.to_string()))
}

/// Interpret a 2xx body
pub(crate) fn unwrap_envelope(text: &str) -> Result<Value> {
    if text.trim().is_empty() {
        return Ok(Value::Null);
    }

    let value: Value = serde_json::from_str(text).map_err(|e| {
        let preview: String = text.chars().take(100).collect();
        MistyClientError::Parse(format!("{} (body: {})", e, preview))
    })?;

    let status = value.get("status").and_then(Value::as_str);
    match status {
        Some("Success") => Ok(value.get("result").cloned().unwrap_or(Value::Null)),
        Some("Failed") => {
            let message = match value.get("error") {
                Some(Value::String(s)) => s.clone(),
                Some(other) => other.to_string(),
                None => value.to_string(),
            };
            Err(MistyClientError::Api(message))
        }
        _ => Ok(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_client_creation() {
        let client = MistyClient::new("192.168.1.96").unwrap();
        assert_eq!(client.base_url().as_str(), "http://192.168.1.96/api/");
        assert_eq!(client.ws_url().as_str(), "ws://192.168.1.96/pubsub");
    }

    #[test]
    fn test_address_with_port_and_scheme() {
        let client = MistyClient::new("http://127.0.0.1:8080/").unwrap();
        assert_eq!(client.base_url().as_str(), "http://127.0.0.1:8080/api/");
        assert_eq!(
            client.base_url().join("drive/time").unwrap().as_str(),
            "http://127.0.0.1:8080/api/drive/time"
        );
    }

    #[test]
    fn test_invalid_address() {
        assert!(MistyClient::new("not a host").is_err());
        assert!(MistyClient::new("").is_err());
    }

    #[test]
    fn test_duplicate_registration() {
        let mut client = MistyClient::new("192.168.1.96").unwrap();
        client
            .register_subscription("slam", EventType::SlamStatus, 100)
            .unwrap();
        let err = client
            .register_subscription("slam", EventType::Imu, 250)
            .unwrap_err();
        assert!(matches!(err, MistyClientError::DuplicateName(name) if name == "slam"));
        // The original registration is untouched
        assert_eq!(
            client.subscription("slam").unwrap().event_type(),
            &EventType::SlamStatus
        );
    }

    #[test]
    fn test_get_message_before_subscribe_is_empty() {
        let mut client = MistyClient::new("192.168.1.96").unwrap();
        client.add_imu("imu", None).unwrap();
        assert_eq!(client.subscription("imu").unwrap().debounce_ms(), 250);
        assert!(client.get_message("imu").unwrap().is_none());
        assert!(matches!(
            client.get_message("nope"),
            Err(MistyClientError::UnknownSubscription(_))
        ));
    }

    #[test]
    fn test_touch_sensor_conditions() {
        let mut client = MistyClient::new("192.168.1.96").unwrap();
        let sub = client
            .add_touch_sensor("chin", &[SensorPosition::Chin], Some(50))
            .unwrap();
        assert_eq!(sub.options().conditions.len(), 1);
        assert_eq!(sub.options().conditions[0].value, "Chin");
    }

    #[test]
    fn test_envelope_success() {
        let value = unwrap_envelope(r#"{"status":"Success","result":[1,2]}"#).unwrap();
        assert_eq!(value, json!([1, 2]));
        assert_eq!(unwrap_envelope("").unwrap(), Value::Null);
        assert_eq!(unwrap_envelope(r#"{"grid":[]}"#).unwrap(), json!({"grid": []}));
    }

    #[test]
    fn test_envelope_failure() {
        let err = unwrap_envelope(r#"{"status":"Failed","error":"Skill not found"}"#).unwrap_err();
        assert!(matches!(err, MistyClientError::Api(msg) if msg == "Skill not found"));
    }
}
