//! Session handling and request shaping of the management API client.

// crates.io
use serde_json::json;
use smartpvms_exporter::{Error, Result, model::DeviceType};
use wiremock::{
	Mock, MockServer, ResponseTemplate,
	matchers::{body_json, header, method, path},
};
// self
use crate::*;

#[tokio::test]
async fn logs_in_once_and_presents_the_token() -> Result<()> {
	let _ = tracing_subscriber::fmt::try_init();

	let server = MockServer::start().await;

	Mock::given(method("POST"))
		.and(path(LOGIN_PATH))
		.and(body_json(json!({ "userName": "api-user", "systemCode": "system-code" })))
		.respond_with(login_response("tok-1"))
		.expect(1)
		.mount(&server)
		.await;
	Mock::given(method("POST"))
		.and(path(PLANT_LIST_PATH))
		.and(header("xsrf-token", "tok-1"))
		.respond_with(ok(json!([plant("NE=1"), plant("NE=2")])))
		.expect(2)
		.mount(&server)
		.await;

	let client = client(&server);
	let first = client.plant_list().await?;
	let second = client.clone().plant_list().await?;

	assert_eq!(first.len(), 2);
	assert_eq!(first[0].station_code, "NE=1");
	assert_eq!(first[0].name.as_deref(), Some("Plant NE=1"));
	assert_eq!(first, second);

	server.verify().await;

	Ok(())
}

#[tokio::test]
async fn expired_session_is_dropped_and_renewed() -> Result<()> {
	let server = MockServer::start().await;

	Mock::given(method("POST"))
		.and(path(LOGIN_PATH))
		.respond_with(login_response("tok-1"))
		.up_to_n_times(1)
		.with_priority(1)
		.mount(&server)
		.await;
	Mock::given(method("POST"))
		.and(path(LOGIN_PATH))
		.respond_with(login_response("tok-2"))
		.mount(&server)
		.await;
	Mock::given(method("POST"))
		.and(path(PLANT_LIST_PATH))
		.and(header("xsrf-token", "tok-1"))
		.respond_with(failed(305))
		.expect(1)
		.mount(&server)
		.await;
	Mock::given(method("POST"))
		.and(path(PLANT_LIST_PATH))
		.and(header("xsrf-token", "tok-2"))
		.respond_with(ok(json!([plant("NE=1")])))
		.expect(1)
		.mount(&server)
		.await;

	let client = client(&server);

	match client.plant_list().await {
		Err(Error::Upstream { fail_code: 305, .. }) => {},
		other => panic!("expected session expiry, got {other:?}"),
	}

	assert!(client.tokens().current().await.is_none());
	assert_eq!(client.plant_list().await?.len(), 1);
	assert_eq!(client.tokens().current().await.map(|t| t.secret().to_owned()), Some("tok-2".into()));

	server.verify().await;

	Ok(())
}

#[tokio::test]
async fn other_fail_codes_keep_the_session() -> Result<()> {
	let server = MockServer::start().await;

	mount_login(&server, "tok-1", 1).await;
	Mock::given(method("POST"))
		.and(path(PLANT_LIST_PATH))
		.respond_with(failed(407))
		.mount(&server)
		.await;

	let client = client(&server);

	assert!(matches!(client.plant_list().await, Err(Error::Upstream { fail_code: 407, .. })));
	assert!(client.tokens().current().await.is_some());
	assert!(client.plant_list().await.is_err());

	server.verify().await;

	Ok(())
}

#[tokio::test]
async fn login_without_token_header_fails() {
	let server = MockServer::start().await;

	Mock::given(method("POST"))
		.and(path(LOGIN_PATH))
		.respond_with(ok(json!(null)))
		.mount(&server)
		.await;
	Mock::given(method("POST"))
		.and(path(PLANT_LIST_PATH))
		.respond_with(ok(json!([])))
		.expect(0)
		.mount(&server)
		.await;

	let client = client(&server);

	assert!(matches!(client.plant_list().await, Err(Error::Login(_))));
	assert!(client.tokens().current().await.is_none());

	server.verify().await;
}

#[tokio::test]
async fn http_errors_surface_status() {
	let server = MockServer::start().await;

	mount_login(&server, "tok-1", 1).await;
	Mock::given(method("POST"))
		.and(path(PLANT_LIST_PATH))
		.respond_with(ResponseTemplate::new(503).set_body_string("maintenance"))
		.mount(&server)
		.await;

	match client(&server).plant_list().await {
		Err(Error::HttpStatus { status, body, .. }) => {
			assert_eq!(status.as_u16(), 503);
			assert_eq!(body.as_deref(), Some("maintenance"));
		},
		other => panic!("expected HTTP status error, got {other:?}"),
	}
}

#[tokio::test]
async fn device_ids_are_sent_in_batches() -> Result<()> {
	let server = MockServer::start().await;
	let ids = (0..150).collect::<Vec<i64>>();
	let joined = |ids: &[i64]| ids.iter().map(i64::to_string).collect::<Vec<_>>().join(",");

	mount_login(&server, "tok-1", 1).await;
	Mock::given(method("POST"))
		.and(path(DEVICE_KPI_PATH))
		.and(body_json(json!({ "devTypeId": 38, "devIds": joined(&ids[..100]) })))
		.respond_with(ok(json!([{ "devId": 0, "dataItemMap": { "temperature": 40.0 } }])))
		.expect(1)
		.mount(&server)
		.await;
	Mock::given(method("POST"))
		.and(path(DEVICE_KPI_PATH))
		.and(body_json(json!({ "devTypeId": 38, "devIds": joined(&ids[100..]) })))
		.respond_with(ok(json!([{ "devId": 149, "dataItemMap": { "temperature": 41.0 } }])))
		.expect(1)
		.mount(&server)
		.await;

	let kpis = client(&server)
		.realtime_device_data::<serde_json::Value>(DeviceType::ResidentialInverter, &ids)
		.await?;
	let returned = kpis.iter().map(|kpi| kpi.device_id).collect::<Vec<_>>();

	assert_eq!(returned, [0, 149]);

	server.verify().await;

	Ok(())
}

#[tokio::test]
async fn empty_lists_issue_no_requests() -> Result<()> {
	let server = MockServer::start().await;

	Mock::given(method("POST")).respond_with(ok(json!([]))).expect(0).mount(&server).await;

	let client = client(&server);

	assert!(client.realtime_plant_data(&[]).await?.is_empty());
	assert!(client.device_list(&[]).await?.is_empty());

	server.verify().await;

	Ok(())
}

#[tokio::test]
async fn logout_ends_held_session_only() -> Result<()> {
	let server = MockServer::start().await;

	mount_login(&server, "tok-1", 1).await;
	Mock::given(method("POST"))
		.and(path(PLANT_LIST_PATH))
		.respond_with(ok(json!([])))
		.mount(&server)
		.await;
	Mock::given(method("POST"))
		.and(path(LOGOUT_PATH))
		.and(header("xsrf-token", "tok-1"))
		.and(body_json(json!({ "xsrfToken": "tok-1" })))
		.respond_with(ok(json!(null)))
		.expect(1)
		.mount(&server)
		.await;

	let client = client(&server);

	// Nothing to end before the first login.
	client.logout().await?;
	client.plant_list().await?;
	client.logout().await?;

	assert!(client.tokens().current().await.is_none());

	// The session is gone, so a second logout stays local.
	client.logout().await?;

	server.verify().await;

	Ok(())
}
