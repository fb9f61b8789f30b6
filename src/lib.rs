//! Prometheus exporter for SmartPVMS solar plants.
//!
//! Scrapes are served from stale-tolerant snapshot caches in front of the management API, and
//! authenticated requests share one session token renewed by a single login at a time.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod cache;
pub mod collector;
pub mod config;
pub mod http;
pub mod metrics;
pub mod model;
pub mod server;

mod error;
mod _prelude {
	pub use std::{sync::Arc, time::Duration};

	pub use chrono::{DateTime, Utc};
	pub use tokio::time::Instant;

	pub use crate::{Error, Result};
}

pub use crate::{
	cache::{
		refresher::{Credential, Refresher, TokenSource},
		snapshot::{Snapshot, SnapshotCache},
		token::{SessionToken, TokenCache},
	},
	collector::{inverters::ResidentialInvertersCollector, plants::PlantsCollector},
	config::{Cli, Config, UpstreamConfig},
	error::{Error, Result},
	http::client::Client,
	metrics::install_default_exporter,
	server::Exporter,
};
