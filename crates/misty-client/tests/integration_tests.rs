//! Integration tests for misty-client
//!
//! These tests run the client against the in-process mock robot, covering
//! REST request shapes, error mapping and the WebSocket subscription
//! lifecycle end to end.

use std::io::Write;
use std::time::Duration;

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

use misty_client::events::{HazardType, SensorPosition, SubscriptionOptions};
use misty_client::testing::{wait_for, MockRobot};
use misty_client::{
    AudioSource, ClientConfig, EventType, HeadMotion, Method, MistyClient, MistyClientError,
    SpeechSynthesizer, SubscriptionState, TtsOptions, Units,
};

const WAIT: Duration = Duration::from_secs(2);

// =============================================================================
// REST
// =============================================================================

#[tokio::test]
async fn test_drive_time_forwards_values_verbatim() {
    let robot = MockRobot::start().await.unwrap();
    let client = robot.client().unwrap();

    client.drive_time(10.0, -20.5, 3000).await.unwrap();

    let request = robot.last_request("drive/time").unwrap();
    assert_eq!(request.method, Method::POST);
    assert_eq!(
        request.json,
        json!({"LinearVelocity": 10.0, "AngularVelocity": -20.5, "TimeMs": 3000})
    );
}

#[tokio::test]
async fn test_out_of_range_values_are_not_clamped() {
    let robot = MockRobot::start().await.unwrap();
    let client = robot.client().unwrap();

    client.drive(150.0, -250.0).await.unwrap();

    let request = robot.last_request("drive").unwrap();
    assert_eq!(request.json["LinearVelocity"], json!(150.0));
    assert_eq!(request.json["AngularVelocity"], json!(-250.0));
}

#[tokio::test]
async fn test_fixed_endpoints() {
    let robot = MockRobot::start().await.unwrap();
    let client = robot.client().unwrap();

    client.stop_mapping().await.unwrap();
    client.reset_slam().await.unwrap();
    client.start_mapping().await.unwrap();
    client.stop().await.unwrap();

    let calls: Vec<(Method, String)> = robot
        .requests()
        .into_iter()
        .map(|r| (r.method, r.path))
        .collect();
    assert_eq!(
        calls,
        vec![
            (Method::POST, "slam/map/stop".to_string()),
            (Method::POST, "slam/reset".to_string()),
            (Method::POST, "slam/map/start".to_string()),
            (Method::POST, "drive/stop".to_string()),
        ]
    );
}

#[tokio::test]
async fn test_move_head_with_duration() {
    let robot = MockRobot::start().await.unwrap();
    let client = robot.client().unwrap();

    client
        .move_head(-10.0, 0.0, 30.0, HeadMotion::Duration(2.0), Units::Degrees)
        .await
        .unwrap();

    let request = robot.last_request("head").unwrap();
    assert_eq!(
        request.json,
        json!({
            "Pitch": -10.0,
            "Roll": 0.0,
            "Yaw": 30.0,
            "Velocity": null,
            "Duration": 2.0,
            "Units": "degrees"
        })
    );
}

#[tokio::test]
async fn test_get_map_grid_matches_dimensions() {
    let robot = MockRobot::start().await.unwrap();
    robot.respond(
        Method::GET,
        "slam/map",
        json!({"grid": [0, 0, 1, 1], "height": 2, "width": 2}),
    );
    let client = robot.client().unwrap();

    let map = client.get_map().await.unwrap();
    assert_eq!(map.grid, vec![0, 0, 1, 1]);
    assert_eq!(map.grid.len(), map.height * map.width);
    assert_eq!(map.rows().count(), 2);
}

#[tokio::test]
async fn test_get_map_rejects_mismatched_grid() {
    let robot = MockRobot::start().await.unwrap();
    robot.respond(
        Method::GET,
        "slam/map",
        json!({"grid": [0, 0, 1], "height": 2, "width": 2}),
    );
    let client = robot.client().unwrap();

    assert!(matches!(
        client.get_map().await,
        Err(MistyClientError::Parse(_))
    ));
}

#[tokio::test]
async fn test_http_error_carries_status_and_body() {
    let robot = MockRobot::start().await.unwrap();
    robot.respond_raw(
        Method::POST,
        "drive/time",
        axum::http::StatusCode::SERVICE_UNAVAILABLE,
        "busy",
    );
    let client = robot.client().unwrap();

    let err = client.drive_time(0.0, 0.0, 10).await.unwrap_err();
    assert_eq!(err.status(), Some(503));
    assert!(matches!(err, MistyClientError::Http { body, .. } if body == "busy"));
}

#[tokio::test]
async fn test_failed_envelope_is_api_error() {
    let robot = MockRobot::start().await.unwrap();
    robot.respond_raw(
        Method::POST,
        "skills/start",
        axum::http::StatusCode::OK,
        r#"{"status":"Failed","error":"Skill not found"}"#,
    );
    let client = robot.client().unwrap();

    let err = client.run_skill("missing", None).await.unwrap_err();
    assert!(matches!(err, MistyClientError::Api(msg) if msg == "Skill not found"));
}

#[tokio::test]
async fn test_unreachable_robot_is_network_error() {
    let robot = MockRobot::start().await.unwrap();
    let client = robot.client().unwrap();
    robot.shutdown().await;

    let err = client.stop().await.unwrap_err();
    assert!(matches!(err, MistyClientError::Network(_)));
}

#[tokio::test]
async fn test_raw_request() {
    let robot = MockRobot::start().await.unwrap();
    robot.respond(Method::GET, "battery", json!({"chargePercent": 0.93}));
    let client = robot.client().unwrap();

    let value = client.request(Method::GET, "battery", None).await.unwrap();
    assert_eq!(value, json!({"chargePercent": 0.93}));
}

// =============================================================================
// Assets and skills
// =============================================================================

#[tokio::test]
async fn test_save_and_delete_audio() {
    let robot = MockRobot::start().await.unwrap();
    let client = robot.client().unwrap();

    client
        .save_audio("beep.wav", AudioSource::Bytes(b"RIFF".to_vec()), false, true)
        .await
        .unwrap();
    client.delete_audio("beep.wav").await.unwrap();

    let requests = robot.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].method, Method::POST);
    assert_eq!(
        requests[0].json,
        json!({
            "FileName": "beep.wav",
            "Data": "UklGRg==",
            "ImmediatelyApply": false,
            "OverwriteExisting": true
        })
    );
    assert_eq!(requests[1].method, Method::DELETE);
    assert_eq!(requests[1].json, json!({"FileName": "beep.wav"}));
}

#[tokio::test]
async fn test_get_audio_list() {
    let robot = MockRobot::start().await.unwrap();
    robot.respond(
        Method::GET,
        "audio/list",
        json!([{"name": "a.wav", "systemAsset": true}, {"name": "b.mp3", "systemAsset": false}]),
    );
    let client = robot.client().unwrap();

    assert_eq!(client.get_audio_list().await.unwrap(), vec!["a.wav", "b.mp3"]);
}

struct FixedVoice;

#[async_trait]
impl SpeechSynthesizer for FixedVoice {
    async fn synthesize(&self, text: &str, language: &str) -> misty_client::Result<Vec<u8>> {
        Ok(format!("{}:{}", language, text).into_bytes())
    }
}

#[tokio::test]
async fn test_text_to_speech_uploads_plays_and_deletes() {
    let robot = MockRobot::start().await.unwrap();
    let client = robot.client().unwrap();

    client
        .text_to_speech(&FixedVoice, "hola", &TtsOptions::default())
        .await
        .unwrap();

    let requests = robot.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].path, "audio");
    assert_eq!(requests[0].json["FileName"], json!("temp.mp3"));
    assert_eq!(requests[0].json["ImmediatelyApply"], json!(true));
    assert_eq!(requests[0].json["OverwriteExisting"], json!(true));
    // base64("es:hola")
    assert_eq!(requests[0].json["Data"], json!("ZXM6aG9sYQ=="));
    assert_eq!(requests[1].method, Method::DELETE);
}

#[tokio::test]
async fn test_save_skill_uploads_zip_verbatim() {
    let robot = MockRobot::start().await.unwrap();
    let client = robot.client().unwrap();

    let mut file = tempfile::Builder::new().suffix(".zip").tempfile().unwrap();
    file.write_all(b"PK\x03\x04skill-bytes").unwrap();

    client.save_skill(file.path(), true, false).await.unwrap();

    let request = robot.last_request("skills").unwrap();
    assert_eq!(request.method, Method::POST);
    assert!(request
        .content_type
        .as_deref()
        .unwrap()
        .starts_with("multipart/form-data"));
    let body = String::from_utf8_lossy(&request.body);
    assert!(body.contains("PK\u{3}\u{4}skill-bytes"));
    assert!(body.contains("name=\"ImmediatelyApply\""));
    assert!(body.contains("application/zip"));
}

#[tokio::test]
async fn test_save_skill_missing_file() {
    let robot = MockRobot::start().await.unwrap();
    let client = robot.client().unwrap();

    let err = client
        .save_skill("/nonexistent/skill.zip", false, false)
        .await
        .unwrap_err();
    assert!(matches!(err, MistyClientError::Io(_)));
    assert!(robot.requests().is_empty());
}

#[tokio::test]
async fn test_skill_listing_and_deletion() {
    let robot = MockRobot::start().await.unwrap();
    robot.respond(
        Method::GET,
        "skills",
        json!([{"uniqueId": "1a2b", "name": "Wander", "description": "", "startupArguments": {}}]),
    );
    let client = robot.client().unwrap();

    let skills = client.get_skills().await.unwrap();
    assert_eq!(skills.len(), 1);
    assert_eq!(skills[0].unique_id, "1a2b");

    client.delete_skill("1a2b").await.unwrap();
    let request = robot.requests().pop().unwrap();
    assert_eq!(request.method, Method::DELETE);
    assert_eq!(request.query.as_deref(), Some("Skill=1a2b"));
}

#[tokio::test]
async fn test_fisheye_picture_is_decoded() {
    let robot = MockRobot::start().await.unwrap();
    robot.respond(
        Method::GET,
        "cameras/fisheye",
        json!({"base64": "iVBORw==", "width": 640, "height": 480}),
    );
    let client = robot.client().unwrap();

    let png = client.take_fisheye_picture().await.unwrap();
    assert_eq!(png, vec![0x89, b'P', b'N', b'G']);
    assert_eq!(
        robot.last_request("cameras/fisheye").unwrap().query.as_deref(),
        Some("Base64=true")
    );
}

// =============================================================================
// Event subscriptions
// =============================================================================

#[tokio::test]
async fn test_subscription_lifecycle() {
    let robot = MockRobot::start().await.unwrap();
    let mut client = robot.client().unwrap();

    client
        .register_subscription("slam", EventType::SlamStatus, 100)
        .unwrap();
    assert!(client.get_message("slam").unwrap().is_none());

    client.subscribe("slam").await.unwrap();
    assert_eq!(
        client.subscription("slam").unwrap().state(),
        SubscriptionState::Subscribed
    );
    assert_eq!(
        robot.control_frames()[0],
        json!({
            "Operation": "subscribe",
            "Type": "SlamStatus",
            "DebounceMs": 100,
            "EventName": "slam",
            "ReturnProperty": null,
            "EventConditions": null
        })
    );

    robot.push_raw(r#"{"slamStatus":{"statusList":["HasPose"]}}"#);
    client
        .wait_for_slam_status("slam", "HasPose", WAIT)
        .await
        .unwrap();

    let msg = client.get_message("slam").unwrap().unwrap();
    assert_eq!(
        Value::Object(msg.raw().clone()),
        json!({"slamStatus": {"statusList": ["HasPose"]}})
    );

    let mut closed = client.unsubscribe("slam").await.unwrap();
    assert_eq!(closed.state(), SubscriptionState::Unsubscribed);
    assert!(closed.get_message().is_none());
    assert!(client.subscription("slam").is_none());

    let robot_ref = &robot;
    assert!(
        wait_for(
            || async move { robot_ref.control_frames().len() == 2 },
            WAIT
        )
        .await
    );
    assert_eq!(
        robot.control_frames()[1],
        json!({"Operation": "unsubscribe", "EventName": "slam"})
    );

    // The name is free again
    client.add_slam_status("slam", None).unwrap();
}

#[tokio::test]
async fn test_latest_message_wins() {
    let robot = MockRobot::start().await.unwrap();
    let mut client = robot.client().unwrap();

    client.add_imu("imu", Some(50)).unwrap();
    client.subscribe("imu").await.unwrap();

    robot.push_event("imu", json!({"yaw": 10.0}));
    robot.push_event("imu", json!({"yaw": 20.0}));

    let sub = client.subscription_mut("imu").unwrap();
    let msg = sub
        .wait_for(|m| m.get_f64("yaw") == Some(20.0), WAIT)
        .await
        .unwrap();
    assert_eq!(msg.event_name(), Some("imu"));
    assert_eq!(msg.as_imu().unwrap().yaw, Some(20.0));

    // No new frame: polling again returns the same message
    assert!(!sub.has_new_message());
    let first = sub.get_message().unwrap();
    let second = sub.get_message().unwrap();
    assert_eq!(first, second);
    assert_eq!(second.get_f64("yaw"), Some(20.0));

    client.close_all().await;
}

#[tokio::test]
async fn test_events_are_routed_by_name() {
    let robot = MockRobot::start().await.unwrap();
    let mut client = robot.client().unwrap();

    client.add_imu("imu", None).unwrap();
    client
        .add_touch_sensor("touch", &[SensorPosition::Chin], None)
        .unwrap();
    client.subscribe("imu").await.unwrap();
    client.subscribe("touch").await.unwrap();

    robot.push_event("touch", json!({"sensorPosition": "Chin", "isContacted": true}));

    let touch = client
        .subscription_mut("touch")
        .unwrap()
        .wait_for(|_| true, WAIT)
        .await
        .unwrap();
    assert_eq!(touch.as_touch().unwrap().is_contacted, Some(true));
    assert!(client.get_message("imu").unwrap().is_none());

    let touch_frame = robot
        .control_frames()
        .into_iter()
        .find(|f| f["EventName"] == "touch")
        .unwrap();
    assert_eq!(
        touch_frame["EventConditions"],
        json!([{"Property": "sensorPosition", "Inequality": "==", "Value": "Chin"}])
    );

    client.close_all().await;
    assert_eq!(client.subscription_names().count(), 0);
}

#[tokio::test]
async fn test_hazard_subscription_conditions() {
    let robot = MockRobot::start().await.unwrap();
    let mut client = robot.client().unwrap();

    client
        .add_hazard_notification(
            "hazards",
            &[HazardType::DriveStopped, HazardType::BumpSensorsHazardState],
            Some(500),
        )
        .unwrap();
    client.subscribe("hazards").await.unwrap();

    let frame = &robot.control_frames()[0];
    assert_eq!(frame["Type"], json!("HazardNotification"));
    assert_eq!(frame["DebounceMs"], json!(500));
    assert_eq!(frame["EventConditions"].as_array().unwrap().len(), 3);

    client.close_all().await;
}

#[tokio::test]
async fn test_return_property_reaches_subscribe_frame() {
    let robot = MockRobot::start().await.unwrap();
    let mut client = robot.client().unwrap();

    let options =
        SubscriptionOptions::new(EventType::TouchSensor, 100).with_return_property("isContacted");
    client.register_subscription_with("touch", options).unwrap();
    client.subscribe("touch").await.unwrap();

    let frame = &robot.control_frames()[0];
    assert_eq!(frame["Type"], json!("TouchSensor"));
    assert_eq!(frame["ReturnProperty"], json!("isContacted"));
    assert_eq!(frame["EventConditions"], Value::Null);

    client.close_all().await;
}

#[tokio::test]
async fn test_double_subscribe_and_stray_unsubscribe() {
    let robot = MockRobot::start().await.unwrap();
    let mut client = robot.client().unwrap();

    client.add_imu("imu", None).unwrap();
    assert!(matches!(
        client.unsubscribe("imu").await,
        Err(MistyClientError::NotSubscribed(_))
    ));
    // A failed unsubscribe keeps the registration
    assert!(client.subscription("imu").is_some());

    client.subscribe("imu").await.unwrap();
    assert!(matches!(
        client.subscribe("imu").await,
        Err(MistyClientError::AlreadySubscribed(_))
    ));
    assert!(matches!(
        client.subscribe("other").await,
        Err(MistyClientError::UnknownSubscription(_))
    ));

    client.close_all().await;
}

#[tokio::test]
async fn test_rejected_subscription_is_connection_error() {
    let robot = MockRobot::start().await.unwrap();
    robot.reject_subscriptions();
    let mut client = robot.client().unwrap();

    client.add_slam_status("slam", None).unwrap();
    let err = client.subscribe("slam").await.unwrap_err();
    assert!(matches!(err, MistyClientError::Connection(_)));
    assert_eq!(
        client.subscription("slam").unwrap().state(),
        SubscriptionState::Unsubscribed
    );
}

#[tokio::test]
async fn test_subscribe_without_robot_is_connection_error() {
    let robot = MockRobot::start().await.unwrap();
    let mut client = robot.client().unwrap();
    robot.shutdown().await;

    client.add_imu("imu", None).unwrap();
    assert!(matches!(
        client.subscribe("imu").await,
        Err(MistyClientError::Connection(_))
    ));
}

#[tokio::test]
async fn test_subscribe_gives_up_when_upgrade_is_never_answered() {
    // Accepts TCP connections and holds them without ever replying
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Ok((socket, _)) = listener.accept().await {
            held.push(socket);
        }
    });

    let mut config = ClientConfig::new(addr.to_string());
    config.connect_timeout_ms = 300;
    let mut client = MistyClient::with_config(config).unwrap();
    client.add_slam_status("slam", None).unwrap();

    let started = std::time::Instant::now();
    let result = tokio::time::timeout(Duration::from_secs(5), client.subscribe("slam"))
        .await
        .expect("subscribe did not honour the connect timeout");
    assert!(matches!(result, Err(MistyClientError::Connection(_))));
    assert!(started.elapsed() < Duration::from_secs(3));
    assert_eq!(
        client.subscription("slam").unwrap().state(),
        SubscriptionState::Unsubscribed
    );

    server.abort();
}

#[tokio::test]
async fn test_robot_closing_socket_ends_waits() {
    let robot = MockRobot::start().await.unwrap();
    let mut client = robot.client().unwrap();

    client.add_slam_status("slam", None).unwrap();
    client.subscribe("slam").await.unwrap();
    robot.close_sockets();

    let err = client
        .wait_for_slam_status("slam", "HasPose", WAIT)
        .await
        .unwrap_err();
    assert!(matches!(err, MistyClientError::Connection(_)));
    // No reconnect and no implicit state change
    assert_eq!(
        client.subscription("slam").unwrap().state(),
        SubscriptionState::Subscribed
    );

    // Teardown still completes on the dead socket
    let slam = client.unsubscribe("slam").await.unwrap();
    assert_eq!(slam.state(), SubscriptionState::Unsubscribed);
}

#[tokio::test]
async fn test_wait_for_pose_times_out() {
    let robot = MockRobot::start().await.unwrap();
    let mut client = robot.client().unwrap();

    client.add_slam_status("slam", None).unwrap();
    client.subscribe("slam").await.unwrap();
    robot.push_event(
        "slam",
        json!({"slamStatus": {"runMode": "Exploring", "statusList": ["Exploring"]}}),
    );

    let err = client
        .wait_for_slam_status("slam", "HasPose", Duration::from_millis(200))
        .await
        .unwrap_err();
    assert!(matches!(err, MistyClientError::Timeout));

    // The non-matching frame is still buffered
    let msg = client.get_message("slam").unwrap().unwrap();
    assert_eq!(
        msg.as_slam_status().unwrap().run_mode.as_deref(),
        Some("Exploring")
    );

    client.close_all().await;
}

#[tokio::test]
async fn test_wait_for_requires_subscription() {
    let robot = MockRobot::start().await.unwrap();
    let mut client = robot.client().unwrap();

    client.add_slam_status("slam", None).unwrap();
    assert!(matches!(
        client
            .wait_for_slam_status("slam", "HasPose", Duration::from_millis(10))
            .await,
        Err(MistyClientError::NotSubscribed(_))
    ));
}
