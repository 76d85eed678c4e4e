use std::time::Duration;

use flipper_protocol::Payload;
use serde_json::json;

use super::*;
use crate::config::{DeviceInfo, ReconnectPolicy};
use crate::testing::TestPlugin;
use crate::transport::{MemoryConnector, MemoryFrame, MemoryHost, MemoryPeer, TransportErrorKind};

fn config(max_attempts: u32) -> SessionConfig {
	SessionConfig::default()
		.with_device(DeviceInfo::new("Linux", "demo", "Host", "1.0Host"))
		.with_reconnect(
			ReconnectPolicy::default()
				.with_interval(Duration::from_secs(1))
				.with_max_attempts(max_attempts),
		)
}

fn session_with(plugins: Vec<Arc<dyn Plugin>>, max_attempts: u32) -> (Session, MemoryHost) {
	let (connector, host) = MemoryConnector::new();
	let session = Session::with_connector(config(max_attempts), plugins, Arc::new(connector));
	(session, host)
}

async fn connect(session: &Session, host: &mut MemoryHost) -> MemoryPeer {
	session.connect().unwrap();
	let peer = host.accept().await.unwrap();
	session.wait_for_state(ConnectionState::Connected).await.unwrap();
	peer
}

fn refused() -> TransportError {
	TransportError::new(TransportErrorKind::Refused, "connection refused")
}

async fn wait_for(session: &Session, state: ConnectionState, retry_attempts: u32) {
	session
		.subscribe()
		.wait_for(|status| status.state == state && status.retry_attempts == retry_attempts)
		.await
		.unwrap();
}

#[tokio::test]
async fn test_connects_with_device_query_and_origin() {
	let (session, mut host) = session_with(Vec::new(), 5);
	assert_eq!(session.state(), ConnectionState::Disconnected);

	let peer = connect(&session, &mut host).await;

	assert_eq!(
		peer.endpoint().url.query(),
		Some("os=Linux&app=demo&device=Host&device_id=1.0Host")
	);
	assert_eq!(peer.endpoint().origin, "localhost:");
	assert!(session.is_connected());
	assert_eq!(session.status().retry_attempts, 0);
}

#[tokio::test]
async fn test_connect_ignored_while_connected() {
	let (session, mut host) = session_with(Vec::new(), 5);
	let _peer = connect(&session, &mut host).await;

	session.connect().unwrap();
	session.plugin_ids().await.unwrap();

	assert_eq!(host.attempts(), 1);
	assert!(session.is_connected());
}

#[tokio::test]
async fn test_background_plugins_scenario() {
	let (session, mut host) = session_with(
		vec![
			TestPlugin::new("Logger").into_arc(),
			TestPlugin::new("Network").background().into_arc(),
		],
		5,
	);
	let mut peer = connect(&session, &mut host).await;

	peer.send_json(&json!({"id": 1, "method": "getBackgroundPlugins"}));
	assert_eq!(peer.recv_json().await, Some(json!({"id": 1, "success": ["Network"]})));

	peer.send_json(&json!({"id": 2, "method": "getPlugins"}));
	assert_eq!(peer.recv_json().await, Some(json!({"id": 2, "success": ["Logger", "Network"]})));
}

#[tokio::test]
async fn test_init_unknown_plugin_scenario() {
	let (session, mut host) = session_with(vec![TestPlugin::new("Network").into_arc()], 5);
	let mut peer = connect(&session, &mut host).await;

	peer.send_json(&json!({"id": 2, "method": "init", "params": {"plugin": "Logger"}}));
	let reply = peer.recv_json().await.unwrap();

	assert_eq!(
		reply,
		json!({"id": 2, "error": {"name": "PluginNotFound", "message": "Logger not found for method init"}})
	);
}

#[tokio::test]
async fn test_method_supported_after_init() {
	let plugin = Arc::new(TestPlugin::new("Logger").with_handler("log"));
	let (session, mut host) = session_with(vec![plugin.clone() as Arc<dyn Plugin>], 5);
	let mut peer = connect(&session, &mut host).await;

	peer.send_json(&json!({"id": 1, "method": "init", "params": {"plugin": "Logger"}}));
	assert_eq!(peer.recv_json().await, Some(json!({"id": 1, "success": {}})));
	assert_eq!(plugin.connects(), 1);

	peer.send_json(&json!({"id": 3, "method": "isMethodSupported", "params": {"api": "Logger", "method": "log"}}));
	assert_eq!(peer.recv_json().await, Some(json!({"id": 3, "success": true})));

	peer.send_json(&json!({
		"id": 4,
		"method": "execute",
		"params": {"api": "Logger", "method": "log", "params": {"line": "hello"}}
	}));
	assert_eq!(peer.recv_json().await, Some(json!({"id": 4, "success": {"line": "hello"}})));
}

#[tokio::test]
async fn test_channel_send_reaches_host() {
	let plugin = Arc::new(TestPlugin::new("Logger"));
	let (session, mut host) = session_with(vec![plugin.clone() as Arc<dyn Plugin>], 5);
	let mut peer = connect(&session, &mut host).await;

	peer.send_json(&json!({"id": 1, "method": "init", "params": {"plugin": "Logger"}}));
	peer.recv_json().await.unwrap();

	let channel = plugin.channel().unwrap();
	channel.send(json!({"line": "hi"}));
	assert_eq!(
		peer.recv_json().await,
		Some(json!({"method": "Logger", "params": {"line": "hi"}}))
	);

	channel.send_event("newRow", Payload::Bytes(b"row".to_vec()));
	assert_eq!(
		peer.recv_json().await,
		Some(json!({"method": "execute", "params": {"api": "Logger", "method": "newRow", "params": "row"}}))
	);
}

#[tokio::test]
async fn test_unencodable_payload_is_dropped() {
	let plugin = Arc::new(TestPlugin::new("Logger"));
	let (session, mut host) = session_with(vec![plugin.clone() as Arc<dyn Plugin>], 5);
	let mut peer = connect(&session, &mut host).await;

	peer.send_json(&json!({"id": 1, "method": "init", "params": {"plugin": "Logger"}}));
	peer.recv_json().await.unwrap();

	plugin.channel().unwrap().send(Payload::Float(f64::NAN));
	peer.send_json(&json!({"id": 2, "method": "getPlugins"}));

	assert_eq!(peer.recv_json().await, Some(json!({"id": 2, "success": ["Logger"]})));
	assert!(session.is_connected());
}

#[tokio::test]
async fn test_add_plugin_while_connected_refreshes_host() {
	let (session, mut host) = session_with(Vec::new(), 5);
	let mut peer = connect(&session, &mut host).await;

	session.add_plugin(TestPlugin::new("Network").into_arc()).unwrap();

	assert_eq!(peer.recv_json().await, Some(json!({"method": "refreshPlugins"})));
	assert_eq!(session.plugin_ids().await.unwrap(), vec!["Network"]);
}

#[tokio::test]
async fn test_add_plugin_while_disconnected_is_silent() {
	let (session, mut host) = session_with(Vec::new(), 5);
	session.add_plugin(TestPlugin::new("Network").into_arc()).unwrap();
	session.send(Outbound::RefreshPlugins).unwrap();

	let mut peer = connect(&session, &mut host).await;
	peer.send_json(&json!({"id": 7, "method": "getPlugins"}));

	assert_eq!(peer.recv_json().await, Some(json!({"id": 7, "success": ["Network"]})));
}

#[tokio::test]
async fn test_bad_frames_keep_connection_open() {
	let (session, mut host) = session_with(vec![TestPlugin::new("Logger").into_arc()], 5);
	let mut peer = connect(&session, &mut host).await;

	peer.send_binary(vec![0xde, 0xad]);
	peer.send_text("not json");
	peer.send_json(&json!({"id": 8, "method": "bogus"}));
	peer.fail(TransportError::new(TransportErrorKind::Frame, "bad utf-8"));
	peer.send_json(&json!({"id": 9, "method": "getPlugins"}));

	assert_eq!(peer.recv_json().await, Some(json!({"id": 9, "success": ["Logger"]})));
	assert!(session.is_connected());
	assert_eq!(host.attempts(), 1);
}

#[tokio::test]
async fn test_disconnect_notifies_every_plugin() {
	let active = Arc::new(TestPlugin::new("Logger"));
	let idle = Arc::new(TestPlugin::new("Network"));
	let (session, mut host) = session_with(vec![active.clone() as Arc<dyn Plugin>, idle.clone()], 5);
	let mut peer = connect(&session, &mut host).await;

	peer.send_json(&json!({"id": 1, "method": "init", "params": {"plugin": "Logger"}}));
	peer.recv_json().await.unwrap();
	let channel = active.channel().unwrap();

	session.disconnect().await.unwrap();

	assert_eq!(peer.recv().await, Some(MemoryFrame::Close(CloseCode::Normal)));
	assert_eq!(active.disconnects(), 1);
	assert_eq!(idle.disconnects(), 1);
	assert!(!channel.is_active());
	assert_eq!(session.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_connect_after_disconnect_restarts() {
	let (session, mut host) = session_with(Vec::new(), 5);
	let _first = connect(&session, &mut host).await;
	session.disconnect().await.unwrap();

	let _second = connect(&session, &mut host).await;

	assert_eq!(host.attempts(), 2);
	assert!(session.is_connected());
}

#[tokio::test]
async fn test_stale_channel_send_is_dropped_after_reconnect() {
	let plugin = Arc::new(TestPlugin::new("Logger"));
	let (session, mut host) = session_with(vec![plugin.clone() as Arc<dyn Plugin>], 5);
	let mut first = connect(&session, &mut host).await;

	first.send_json(&json!({"id": 1, "method": "init", "params": {"plugin": "Logger"}}));
	first.recv_json().await.unwrap();
	let stale = plugin.channel().unwrap();
	session.disconnect().await.unwrap();

	let mut second = connect(&session, &mut host).await;
	stale.send(json!({"line": "late"}));
	stale.send_event("newRow", Payload::Null);
	second.send_json(&json!({"id": 2, "method": "getPlugins"}));

	assert_eq!(second.recv_json().await, Some(json!({"id": 2, "success": ["Logger"]})));
	assert_eq!(second.try_recv(), None);
	assert!(!stale.is_active());
}

#[tokio::test]
async fn test_drop_closes_with_going_away() {
	let plugin = Arc::new(TestPlugin::new("Logger"));
	let (session, mut host) = session_with(vec![plugin.clone() as Arc<dyn Plugin>], 5);
	let mut peer = connect(&session, &mut host).await;

	drop(session);

	assert_eq!(peer.recv().await, Some(MemoryFrame::Close(CloseCode::GoingAway)));
	assert_eq!(plugin.disconnects(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_reconnect_attempts_are_capped() {
	let (session, host) = session_with(Vec::new(), 3);
	for _ in 0..10 {
		host.fail_next(refused());
	}

	session.connect().unwrap();
	wait_for(&session, ConnectionState::Disconnected, 3).await;
	assert_eq!(host.attempts(), 4);

	tokio::time::sleep(Duration::from_secs(60)).await;
	assert_eq!(host.attempts(), 4);
	assert_eq!(session.state(), ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_success_resets_attempts() {
	let (session, mut host) = session_with(Vec::new(), 5);
	host.fail_next(refused());
	host.fail_next(refused());

	let _peer = connect(&session, &mut host).await;

	assert_eq!(host.attempts(), 3);
	assert_eq!(session.status().retry_attempts, 0);
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_errors_do_not_consume_attempts() {
	let (session, mut host) = session_with(Vec::new(), 1);
	for _ in 0..3 {
		host.fail_next(TransportError::new(TransportErrorKind::Unreachable, "offline"));
	}

	let _peer = connect(&session, &mut host).await;

	assert_eq!(host.attempts(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_explicit_connect_resets_budget() {
	let (session, mut host) = session_with(Vec::new(), 1);
	for _ in 0..3 {
		host.fail_next(refused());
	}

	session.connect().unwrap();
	wait_for(&session, ConnectionState::Disconnected, 1).await;
	assert_eq!(host.attempts(), 2);

	let _peer = connect(&session, &mut host).await;
	assert_eq!(host.attempts(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_connection_loss_deactivates_and_reconnects() {
	let plugin = Arc::new(TestPlugin::new("Logger"));
	let (session, mut host) = session_with(vec![plugin.clone() as Arc<dyn Plugin>], 5);
	let mut peer = connect(&session, &mut host).await;

	peer.send_json(&json!({"id": 1, "method": "init", "params": {"plugin": "Logger"}}));
	peer.recv_json().await.unwrap();
	let channel = plugin.channel().unwrap();

	peer.close();
	wait_for(&session, ConnectionState::ReconnectPending, 1).await;
	assert_eq!(plugin.disconnects(), 1);
	assert!(!channel.is_active());

	let _again = host.accept().await.unwrap();
	session.wait_for_state(ConnectionState::Connected).await.unwrap();
	assert_eq!(session.status().retry_attempts, 0);
	assert_eq!(host.attempts(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_disconnect_cancels_pending_reconnect() {
	let (session, host) = session_with(Vec::new(), 5);
	host.fail_next(refused());

	session.connect().unwrap();
	wait_for(&session, ConnectionState::ReconnectPending, 1).await;
	session.disconnect().await.unwrap();

	tokio::time::sleep(Duration::from_secs(60)).await;
	assert_eq!(host.attempts(), 1);
	assert_eq!(session.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn test_invalid_url_stays_disconnected() {
	let (connector, host) = MemoryConnector::new();
	let session = Session::with_connector(
		config(5).with_url_base("bad host:x"),
		Vec::new(),
		Arc::new(connector),
	);

	session.connect().unwrap();
	session.plugin_ids().await.unwrap();

	assert_eq!(session.state(), ConnectionState::Disconnected);
	assert_eq!(host.attempts(), 0);
}
