//! End-to-end scrape through the HTTP surface.

// std
use std::{sync::Mutex, time::Duration};
// crates.io
use serde_json::{Value, json};
use smartpvms_exporter::{Exporter, Result, install_default_exporter, server};
use tokio::net::TcpListener;
use wiremock::{
	Mock, MockServer,
	matchers::{method, path},
};
// self
use crate::*;

/// Serve an exporter over `upstream` on an ephemeral port and return its address.
async fn spawn_exporter(upstream: &MockServer, refresh_interval: Duration) -> Result<String> {
	let handle = install_default_exporter()?;
	let exporter = Exporter::new(client(upstream), refresh_interval, handle);
	let app = server::router(exporter, "/metrics");
	let listener = TcpListener::bind("127.0.0.1:0").await?;
	let address = listener.local_addr()?;

	tokio::spawn(async move { axum::serve(listener, app).await });

	Ok(address.to_string())
}

async fn mount_plants(upstream: &MockServer, plants: Value, kpis: Value) {
	Mock::given(method("POST"))
		.and(path(PLANT_LIST_PATH))
		.respond_with(ok(plants))
		.mount(upstream)
		.await;
	Mock::given(method("POST"))
		.and(path(PLANT_KPI_PATH))
		.respond_with(ok(kpis))
		.mount(upstream)
		.await;
	Mock::given(method("POST"))
		.and(path(DEVICE_LIST_PATH))
		.respond_with(ok(json!([])))
		.mount(upstream)
		.await;
}

/// Scrape until `check` accepts the body; returns the last body seen.
async fn scrape_until(url: &str, check: impl Fn(&str) -> bool) -> (bool, String) {
	let http = reqwest::Client::new();
	let last_body = Mutex::new(String::new());
	let (last, check) = (&last_body, &check);
	let matched = eventually(|| {
		let http = http.clone();

		async move {
			let Ok(response) = http.get(url).send().await else {
				return false;
			};
			let Ok(body) = response.text().await else {
				return false;
			};
			let matched = check(&body);

			if let Ok(mut last) = last.lock() {
				*last = body;
			}

			matched
		}
	})
	.await;
	let body = last_body.into_inner().unwrap_or_default();

	(matched, body)
}

#[tokio::test]
async fn scrape_serves_cached_plant_metrics() -> Result<()> {
	let upstream = MockServer::start().await;

	mount_login(&upstream, "tok-1", 1).await;
	mount_plants(
		&upstream,
		json!([plant("NE=1")]),
		json!([{
			"stationCode": "NE=1",
			"dataItemMap": { "day_power": 4.5, "real_health_state": 3 }
		}]),
	)
	.await;

	let address = spawn_exporter(&upstream, Duration::from_secs(60)).await?;
	let http = reqwest::Client::new();
	let landing = http.get(format!("http://{address}/")).send().await?.text().await?;

	assert!(landing.contains("href=\"/metrics\""));

	let first = http.get(format!("http://{address}/metrics")).send().await?;

	assert_eq!(
		first.headers().get("content-type").and_then(|v| v.to_str().ok()),
		Some(server::EXPOSITION_CONTENT_TYPE)
	);
	assert!(first.text().await?.contains("smartpvms_plant_up 0"));

	let url = format!("http://{address}/metrics");
	let scraped = eventually(|| {
		let (http, url) = (http.clone(), url.clone());

		async move {
			let Ok(response) = http.get(url).send().await else {
				return false;
			};

			response.text().await.is_ok_and(|body| {
				body.contains("smartpvms_plant_up 1")
					&& body.contains("smartpvms_plant_day_yield{station_code=\"NE=1\"} 4500")
					&& body.contains("smartpvms_residential_inverter_up 1")
			})
		}
	})
	.await;

	assert!(scraped, "scrape never reflected the refreshed snapshot");

	Ok(())
}

#[tokio::test]
async fn scrape_drops_series_that_left_the_snapshot() -> Result<()> {
	let upstream = MockServer::start().await;

	mount_login(&upstream, "tok-1", 1).await;
	mount_plants(
		&upstream,
		json!([plant("NE=1"), plant("NE=2")]),
		json!([
			{ "stationCode": "NE=1", "dataItemMap": { "day_power": 1.0, "real_health_state": 3 } },
			{ "stationCode": "NE=2", "dataItemMap": { "day_power": 2.0, "real_health_state": 3 } }
		]),
	)
	.await;

	let address = spawn_exporter(&upstream, Duration::from_millis(200)).await?;
	let url = format!("http://{address}/metrics");
	let (both, body) = scrape_until(&url, |body| {
		body.contains("smartpvms_plant_day_yield{station_code=\"NE=2\"} 2000")
	})
	.await;

	assert!(both, "scrape never reflected the first snapshot:\n{body}");

	// The held session stays valid, so only the data endpoints are needed from here on.
	upstream.reset().await;
	mount_plants(
		&upstream,
		json!([plant("NE=1")]),
		json!([{ "stationCode": "NE=1", "dataItemMap": { "day_power": 1.0, "real_health_state": 2 } }]),
	)
	.await;

	let (replaced, body) = scrape_until(&url, |body| body.contains("status=\"faulty\"")).await;

	assert!(replaced, "scrape never reflected the second snapshot:\n{body}");

	let info = body.lines().filter(|line| line.starts_with("smartpvms_plant_info{")).count();

	assert_eq!(info, 1);
	assert!(!body.contains("status=\"healthy\""));
	assert!(!body.contains("NE=2"));

	Ok(())
}
