//! Background refresh of the collector snapshot caches.

// std
use std::time::Duration;
// crates.io
use serde_json::json;
use smartpvms_exporter::{PlantsCollector, ResidentialInvertersCollector, model::PlantStatus};
use wiremock::{
	Mock, MockServer, ResponseTemplate,
	matchers::{body_json, method, path},
};
// self
use crate::*;

#[tokio::test]
async fn plant_snapshot_fills_after_background_refresh() {
	let server = MockServer::start().await;

	mount_login(&server, "tok-1", 1).await;
	Mock::given(method("POST"))
		.and(path(PLANT_LIST_PATH))
		.respond_with(ok(json!([plant("NE=1"), plant("NE=2")])))
		.expect(1)
		.mount(&server)
		.await;
	Mock::given(method("POST"))
		.and(path(PLANT_KPI_PATH))
		.and(body_json(json!({ "stationCodes": "NE=1,NE=2" })))
		.respond_with(ok(json!([{
			"stationCode": "NE=2",
			"dataItemMap": { "day_power": 4.5, "total_power": 1200.0, "real_health_state": 3 }
		}])))
		.expect(1)
		.mount(&server)
		.await;

	let collector = PlantsCollector::new(client(&server), Duration::from_secs(60));
	let cache = collector.cache();

	// The first read has nothing to serve and launches the refresh.
	assert!(cache.data().await.is_empty());
	assert!(cache.timestamp().await.is_none());
	assert!(eventually(|| cache.is_valid()).await, "refresh never committed");

	let data = cache.data().await;

	assert_eq!(data.len(), 2);
	assert_eq!(data[0].plant.station_code, "NE=1");
	assert!(data[0].data.is_none());
	assert_eq!(data[1].data.as_ref().and_then(|d| d.day_power), Some(4.5));
	assert_eq!(data[1].data.as_ref().and_then(|d| d.real_health_state), Some(PlantStatus::Healthy));
	assert!(cache.timestamp().await.is_some());

	// Fresh snapshot: further reads do not touch the upstream.
	cache.data().await;
	tokio::time::sleep(Duration::from_millis(50)).await;

	server.verify().await;
}

#[tokio::test]
async fn failing_upstream_leaves_cache_empty() {
	let server = MockServer::start().await;

	mount_login(&server, "tok-1", 1).await;
	Mock::given(method("POST"))
		.and(path(PLANT_LIST_PATH))
		.respond_with(ResponseTemplate::new(500))
		.mount(&server)
		.await;

	let collector = PlantsCollector::new(client(&server), Duration::from_millis(100));
	let cache = collector.cache();

	assert!(cache.data().await.is_empty());

	let mock = &server;

	assert!(
		eventually(|| async move {
			mock.received_requests().await.is_some_and(|requests| requests.len() >= 2)
		})
		.await,
		"refresh never reached the upstream"
	);
	tokio::time::sleep(Duration::from_millis(50)).await;

	assert!(!cache.is_valid().await);
	assert!(cache.data().await.is_empty());
	assert!(cache.timestamp().await.is_none());
}

#[tokio::test]
async fn stale_snapshot_survives_later_failures() {
	let server = MockServer::start().await;

	mount_login(&server, "tok-1", 1).await;
	Mock::given(method("POST"))
		.and(path(PLANT_LIST_PATH))
		.respond_with(ok(json!([plant("NE=1")])))
		.up_to_n_times(1)
		.with_priority(1)
		.mount(&server)
		.await;
	Mock::given(method("POST"))
		.and(path(PLANT_LIST_PATH))
		.respond_with(ResponseTemplate::new(502))
		.mount(&server)
		.await;
	Mock::given(method("POST"))
		.and(path(PLANT_KPI_PATH))
		.respond_with(ok(json!([])))
		.mount(&server)
		.await;

	let interval = Duration::from_millis(200);
	let collector = PlantsCollector::new(client(&server), interval);
	let cache = collector.cache();

	cache.data().await;
	assert!(eventually(|| cache.is_valid()).await);

	let committed = cache.timestamp().await;

	tokio::time::sleep(interval + Duration::from_millis(50)).await;

	// Stale: served as-is while the failing refresh runs in the background.
	assert!(!cache.is_valid().await);
	assert_eq!(cache.data().await.len(), 1);
	tokio::time::sleep(Duration::from_millis(100)).await;
	assert_eq!(cache.data().await.len(), 1);
	assert_eq!(cache.timestamp().await, committed);
}

#[tokio::test]
async fn inverter_refresh_keeps_residential_inverters_only() {
	let server = MockServer::start().await;

	mount_login(&server, "tok-1", 1).await;
	Mock::given(method("POST"))
		.and(path(PLANT_LIST_PATH))
		.respond_with(ok(json!([plant("NE=1")])))
		.mount(&server)
		.await;
	Mock::given(method("POST"))
		.and(path(DEVICE_LIST_PATH))
		.and(body_json(json!({ "stationCodes": "NE=1" })))
		.respond_with(ok(json!([
			{ "id": 11, "devTypeId": 38, "esnCode": "SN11", "stationCode": "NE=1" },
			{ "id": 12, "devTypeId": 62, "esnCode": "SN12", "stationCode": "NE=1" },
			{ "id": 13, "devTypeId": 38, "esnCode": "SN13", "stationCode": "NE=1" }
		])))
		.mount(&server)
		.await;
	Mock::given(method("POST"))
		.and(path(DEVICE_KPI_PATH))
		.and(body_json(json!({ "devTypeId": 38, "devIds": "11,13" })))
		.respond_with(ok(json!([
			{ "devId": 13, "dataItemMap": { "active_power": 2.5, "inverter_state": 512.0 } }
		])))
		.expect(1)
		.mount(&server)
		.await;

	let collector = ResidentialInvertersCollector::new(client(&server), Duration::from_secs(60));
	let cache = collector.cache();

	cache.data().await;
	assert!(eventually(|| cache.is_valid()).await, "refresh never committed");

	let data = cache.data().await;
	let serials = data.iter().map(|r| r.device.serial.as_deref()).collect::<Vec<_>>();

	assert_eq!(serials, [Some("SN11"), Some("SN13")]);
	assert!(data[0].data.is_none());
	assert_eq!(data[1].data.as_ref().and_then(|d| d.active_power), Some(2.5));

	server.verify().await;
}
