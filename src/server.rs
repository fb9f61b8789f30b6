//! HTTP surface: landing page and the Prometheus scrape endpoint.

// std
use std::fmt::{Debug, Formatter, Result as FmtResult};
// crates.io
use axum::{
	Router,
	extract::State,
	http::header,
	response::{Html, IntoResponse},
	routing::get,
};
use metrics_exporter_prometheus::PrometheusHandle;
use tokio::{net::TcpListener, task::JoinHandle};
// self
use crate::{
	_prelude::*,
	collector::{inverters::ResidentialInvertersCollector, plants::PlantsCollector},
	config::Config,
	http::client::Client,
	metrics,
};

/// Content type of the Prometheus text exposition format.
pub const EXPOSITION_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";

const UPKEEP_INTERVAL: Duration = Duration::from_secs(5);

/// Every collector plus the handle of the installed telemetry recorder.
#[derive(Clone)]
pub struct Exporter {
	client: Client,
	plants: PlantsCollector,
	inverters: ResidentialInvertersCollector,
	handle: PrometheusHandle,
}
impl Exporter {
	/// Build the collectors over one shared client.
	pub fn new(client: Client, refresh_interval: Duration, handle: PrometheusHandle) -> Self {
		Self {
			plants: PlantsCollector::new(client.clone(), refresh_interval),
			inverters: ResidentialInvertersCollector::new(client.clone(), refresh_interval),
			client,
			handle,
		}
	}

	/// Client shared by the collectors.
	pub fn client(&self) -> &Client {
		&self.client
	}

	/// Plant collector.
	pub fn plants(&self) -> &PlantsCollector {
		&self.plants
	}

	/// Residential inverter collector.
	pub fn inverters(&self) -> &ResidentialInvertersCollector {
		&self.inverters
	}

	/// Render one scrape in the Prometheus text format.
	///
	/// Collector series come from the snapshots read now; the installed recorder adds the
	/// exporter's own cache and login telemetry.
	pub async fn scrape(&self) -> String {
		let (plants, inverters) = tokio::join!(self.plants.collect(), self.inverters.collect());
		let mut body = metrics::render_local(|| {
			plants.record();
			inverters.record();
		});

		body.push_str(&self.handle.render());

		body
	}
}
impl Debug for Exporter {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		f.debug_struct("Exporter")
			.field("client", &self.client)
			.field("plants", &self.plants)
			.field("inverters", &self.inverters)
			.finish_non_exhaustive()
	}
}

/// Routes for the landing page and `telemetry_path`.
pub fn router(exporter: Exporter, telemetry_path: &str) -> Router {
	let page: Arc<str> = landing_page(telemetry_path).into();

	Router::new()
		.route(
			"/",
			get(move || {
				let page = page.clone();

				async move { Html(page.to_string()) }
			}),
		)
		.route(telemetry_path, get(scrape))
		.with_state(exporter)
}

/// Serve until Ctrl-C, then end the upstream session.
pub async fn serve(config: Config, handle: PrometheusHandle) -> Result<()> {
	let client = Client::new(&config.upstream)?;
	let exporter = Exporter::new(client.clone(), config.refresh_interval, handle.clone());
	let app = router(exporter, &config.telemetry_path);
	let listener = TcpListener::bind(config.listen_address).await?;

	tracing::info!(
		address = %config.listen_address,
		telemetry_path = %config.telemetry_path,
		"listening"
	);

	let upkeep = spawn_upkeep(handle);
	let served = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await;

	upkeep.abort();

	if let Err(err) = client.logout().await {
		tracing::warn!(error = %err, "failed to end upstream session");
	}

	Ok(served?)
}

async fn scrape(State(exporter): State<Exporter>) -> impl IntoResponse {
	([(header::CONTENT_TYPE, EXPOSITION_CONTENT_TYPE)], exporter.scrape().await)
}

fn landing_page(telemetry_path: &str) -> String {
	format!(
		"<html>\n\
		 <head><title>SmartPVMS Exporter</title></head>\n\
		 <body>\n\
		 <h1>SmartPVMS Exporter</h1>\n\
		 <p><a href=\"{telemetry_path}\">Metrics</a></p>\n\
		 </body>\n\
		 </html>\n"
	)
}

fn spawn_upkeep(handle: PrometheusHandle) -> JoinHandle<()> {
	tokio::spawn(async move {
		let mut ticker = tokio::time::interval(UPKEEP_INTERVAL);

		loop {
			ticker.tick().await;
			handle.run_upkeep();
		}
	})
}

async fn shutdown_signal() {
	if let Err(err) = tokio::signal::ctrl_c().await {
		tracing::error!(error = %err, "failed to listen for shutdown signal");

		// Without a signal handler the server runs until killed.
		std::future::pending::<()>().await;
	}

	tracing::info!("shutdown signal received");
}
