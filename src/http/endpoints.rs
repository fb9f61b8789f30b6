//! Typed calls for the plant and device endpoints.

// crates.io
use serde::{Serialize, de::DeserializeOwned};
// self
use crate::{
	_prelude::*,
	http::client::Client,
	model::{Device, DeviceKpi, DeviceType, Plant, PlantKpi},
};

/// Largest number of station codes or device ids accepted by one call.
pub const MAX_BATCH: usize = 100;

const PLANT_LIST_PATH: &str = "/thirdData/getStationList";
const PLANT_KPI_PATH: &str = "/thirdData/getStationRealKpi";
const DEVICE_LIST_PATH: &str = "/thirdData/getDevList";
const DEVICE_KPI_PATH: &str = "/thirdData/getDevRealKpi";

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StationCodesBody {
	station_codes: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeviceKpiBody {
	dev_type_id: i64,
	dev_ids: String,
}

#[derive(Debug, Serialize)]
struct EmptyBody {}

impl Client {
	/// All plants visible to the account.
	pub async fn plant_list(&self) -> Result<Vec<Plant>> {
		self.call(PLANT_LIST_PATH, &EmptyBody {}).await
	}

	/// Realtime KPIs for the given plants.
	pub async fn realtime_plant_data(&self, station_codes: &[String]) -> Result<Vec<PlantKpi>> {
		self.batched(station_codes, |chunk| async move {
			self.call(PLANT_KPI_PATH, &StationCodesBody { station_codes: chunk.join(",") }).await
		})
		.await
	}

	/// Devices installed in the given plants.
	pub async fn device_list(&self, station_codes: &[String]) -> Result<Vec<Device>> {
		self.batched(station_codes, |chunk| async move {
			self.call(DEVICE_LIST_PATH, &StationCodesBody { station_codes: chunk.join(",") }).await
		})
		.await
	}

	/// Realtime KPIs for devices of one type; `T` is the KPI map of that type.
	pub async fn realtime_device_data<T>(
		&self,
		device_type: DeviceType,
		device_ids: &[i64],
	) -> Result<Vec<DeviceKpi<T>>>
	where
		T: DeserializeOwned + Send,
	{
		self.batched(device_ids, |chunk| async move {
			let body = DeviceKpiBody { dev_type_id: device_type.code(), dev_ids: join_ids(chunk) };

			self.call(DEVICE_KPI_PATH, &body).await
		})
		.await
	}

	async fn batched<'a, K, V, F, Fut>(&self, keys: &'a [K], mut call: F) -> Result<Vec<V>>
	where
		F: FnMut(&'a [K]) -> Fut,
		Fut: Future<Output = Result<Vec<V>>>,
	{
		let mut out = Vec::with_capacity(keys.len());

		// One batch in flight at a time per account.
		for chunk in keys.chunks(MAX_BATCH) {
			out.extend(call(chunk).await?);
		}

		Ok(out)
	}
}

fn join_ids(ids: &[i64]) -> String {
	ids.iter().map(i64::to_string).collect::<Vec<_>>().join(",")
}
