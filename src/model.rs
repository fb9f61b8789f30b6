//! Records returned by the SmartPVMS management API.

// crates.io
use serde::{Deserialize, Serialize};
// self
use crate::_prelude::*;

macro_rules! coded_enum {
	(
		$(#[$meta:meta])*
		$name:ident {
			$($(#[$vmeta:meta])* $variant:ident = $code:literal => $label:literal,)+
		}
	) => {
		$(#[$meta])*
		#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
		#[serde(from = "i64", into = "i64")]
		pub enum $name {
			$($(#[$vmeta])* $variant,)+
			/// Code not known to this exporter.
			Unknown(i64),
		}
		impl $name {
			/// Upstream code of the variant.
			pub fn code(self) -> i64 {
				match self {
					$(Self::$variant => $code,)+
					Self::Unknown(code) => code,
				}
			}

			/// Snake-case label used in exported series.
			pub fn as_str(self) -> &'static str {
				match self {
					$(Self::$variant => $label,)+
					Self::Unknown(_) => "unknown",
				}
			}
		}
		impl From<i64> for $name {
			fn from(code: i64) -> Self {
				match code {
					$($code => Self::$variant,)+
					other => Self::Unknown(other),
				}
			}
		}
		impl From<$name> for i64 {
			fn from(value: $name) -> Self {
				value.code()
			}
		}
	};
}

coded_enum! {
	/// Device category reported by the device list.
	DeviceType {
		/// String inverter.
		StringInverter = 1 => "string_inverter",
		/// SmartLogger.
		SmartLogger = 2 => "smart_logger",
		/// Transformer.
		Transformer = 8 => "transformer",
		/// Environmental monitoring instrument.
		Emi = 10 => "emi",
		/// Protocol converter.
		ProtocolConverter = 13 => "protocol_converter",
		/// General device.
		GeneralDevice = 16 => "general_device",
		/// Grid meter.
		GridMeter = 17 => "grid_meter",
		/// PID module.
		Pid = 22 => "pid",
		/// Pinnet data logger.
		PinnetDataLogger = 37 => "pinnet_data_logger",
		/// Residential inverter.
		ResidentialInverter = 38 => "residential_inverter",
		/// Battery.
		Battery = 39 => "battery",
		/// Backup box.
		BackupBox = 40 => "backup_box",
		/// PLC.
		Plc = 45 => "plc",
		/// Optimizer.
		Optimizer = 46 => "optimizer",
		/// Power sensor.
		PowerSensor = 47 => "power_sensor",
		/// Dongle.
		Dongle = 62 => "dongle",
		/// Distributed SmartLogger.
		DistributedSmartLogger = 63 => "distributed_smart_logger",
		/// Safety box.
		SafetyBox = 70 => "safety_box",
	}
}

coded_enum! {
	/// Plant health as reported by the realtime plant KPIs.
	PlantStatus {
		/// Plant is disconnected.
		Disconnected = 1 => "disconnected",
		/// Plant is faulty.
		Faulty = 2 => "faulty",
		/// Plant is healthy.
		Healthy = 3 => "healthy",
	}
}

coded_enum! {
	/// Whether an inverter is connected to the management system.
	InverterRunStatus {
		/// Inverter is disconnected.
		Disconnected = 0 => "disconnected",
		/// Inverter is connected.
		Connected = 1 => "connected",
	}
}

/// Operating state of an inverter.
///
/// The upstream encodes the state as a float, so decoding goes through `f64`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(from = "f64", into = "f64")]
pub struct InverterStatus(InverterState);
impl InverterStatus {
	/// Decoded state.
	pub fn state(self) -> InverterState {
		self.0
	}

	/// Snake-case label used in exported series.
	pub fn as_str(self) -> &'static str {
		self.0.as_str()
	}
}
impl From<f64> for InverterStatus {
	fn from(code: f64) -> Self {
		if code.fract() == 0.0 && (0.0..=i64::MAX as f64).contains(&code) {
			Self(InverterState::from(code as i64))
		} else {
			Self(InverterState::Unknown(-1))
		}
	}
}
impl From<InverterStatus> for f64 {
	fn from(value: InverterStatus) -> Self {
		value.0.code() as f64
	}
}
impl From<InverterState> for InverterStatus {
	fn from(state: InverterState) -> Self {
		Self(state)
	}
}

coded_enum! {
	/// Inverter state codes.
	InverterState {
		/// Standby: initializing.
		StandbyInitializing = 0 => "standby_initializing",
		/// Standby: insulation resistance detection.
		StandbyInsulationResistanceDetection = 1 => "standby_insulation_resistance_detection",
		/// Standby: sunlight detection.
		StandbySunlightDetection = 2 => "standby_sunlight_detection",
		/// Standby: power grid detection.
		StandbyPowerGridDetection = 3 => "standby_power_grid_detection",
		/// Starting.
		Start = 256 => "start",
		/// Grid connection.
		GridConnection = 512 => "grid_connection",
		/// Grid connection with limited power.
		GridConnectionLimitedPower = 513 => "grid_connection_limited_power",
		/// Grid connection with self derating.
		GridConnectionSelfDerating = 514 => "grid_connection_self_derating",
		/// Unexpected shutdown.
		ShutdownUnexpected = 768 => "shutdown_unexpected",
		/// Commanded shutdown.
		ShutdownCommandedShutdown = 769 => "shutdown_commanded_shutdown",
		/// Shutdown: OVGR.
		ShutdownOvgr = 770 => "shutdown_ovgr",
		/// Shutdown: communication disconnected.
		ShutdownCommunicationDisconnection = 771 => "shutdown_communication_disconnection",
		/// Shutdown: limited power.
		ShutdownLimitedPower = 772 => "shutdown_limited_power",
		/// Shutdown: manual startup required.
		ShutdownManualStartupRequired = 773 => "shutdown_manual_startup_required",
		/// Shutdown: DC switch disconnected.
		ShutdownDcSwitchDisconnected = 774 => "shutdown_dc_switch_disconnected",
		/// Grid scheduling: cos phi-P curve.
		GridSchedulingCosPhiPCurve = 1025 => "grid_scheduling_cos_phi_p_curve",
		/// Grid scheduling: Q-U curve.
		GridSchedulingQuCurve = 1026 => "grid_scheduling_q_u_curve",
		/// Spot check ready.
		SpotCheckReady = 1280 => "spot_check_ready",
		/// Spot checking.
		SpotChecking = 1281 => "spot_checking",
		/// Inspecting.
		Inspecting = 1536 => "inspecting",
		/// AFCI self check.
		AfciSelfCheck = 1792 => "afci_self_check",
		/// IV scanning.
		IvScanning = 2048 => "iv_scanning",
		/// DC input detection.
		DcInputDetection = 2304 => "dc_input_detection",
		/// Standby: no sunlight.
		StandbyNoSunlight = 40960 => "standby_no_sunlight",
		/// Communication disconnected.
		CommunicationDisconnection = 45056 => "communication_disconnection",
		/// Loading.
		Loading = 49152 => "loading",
	}
}

/// Plant entry from the plant list.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Plant {
	/// Station code identifying the plant.
	#[serde(rename = "stationCode")]
	pub station_code: String,
	/// Display name.
	#[serde(rename = "stationName", default)]
	pub name: Option<String>,
	/// Postal address.
	#[serde(rename = "stationAddr", default)]
	pub address: Option<String>,
	/// Installed capacity in MWp.
	#[serde(default)]
	pub capacity: Option<f64>,
	/// Contact person.
	#[serde(rename = "stationLinkman", default)]
	pub contact_person: Option<String>,
	/// Contact phone number.
	#[serde(rename = "linkmanPho", default)]
	pub contact_phone: Option<String>,
}

/// Realtime KPIs of a plant.
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct PlantData {
	/// Yield today in kWh.
	pub day_power: Option<f64>,
	/// Yield this month in kWh.
	pub month_power: Option<f64>,
	/// Lifetime yield in kWh.
	pub total_power: Option<f64>,
	/// Income today.
	pub day_income: Option<f64>,
	/// Lifetime income.
	pub total_income: Option<f64>,
	/// Health state.
	pub real_health_state: Option<PlantStatus>,
}

/// Realtime KPI entry for one plant.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct PlantKpi {
	/// Station code the KPIs belong to.
	#[serde(rename = "stationCode")]
	pub station_code: String,
	/// KPI values.
	#[serde(rename = "dataItemMap", default)]
	pub data: PlantData,
}

/// Device entry from the device list.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct Device {
	/// Device identifier.
	pub id: i64,
	/// Device category.
	#[serde(rename = "devTypeId")]
	pub device_type: DeviceType,
	/// Display name.
	#[serde(rename = "devName", default)]
	pub name: Option<String>,
	/// Serial number.
	#[serde(rename = "esnCode", default)]
	pub serial: Option<String>,
	/// Model designation.
	#[serde(rename = "invType", default)]
	pub model: Option<String>,
	/// Firmware version.
	#[serde(rename = "softwareVersion", default)]
	pub software_version: Option<String>,
	/// Latitude of the installation.
	#[serde(default)]
	pub latitude: Option<f64>,
	/// Longitude of the installation.
	#[serde(default)]
	pub longitude: Option<f64>,
	/// Station code of the owning plant.
	#[serde(rename = "stationCode")]
	pub station_code: String,
}

/// Realtime KPI entry for one device.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct DeviceKpi<T> {
	/// Device identifier the KPIs belong to.
	#[serde(rename = "devId")]
	pub device_id: i64,
	/// KPI values.
	#[serde(rename = "dataItemMap")]
	pub data: T,
}

/// Realtime KPIs of a residential inverter.
///
/// Powers are in kW, yields in kWh, voltages in V, currents in A, efficiency in percent.
#[allow(missing_docs)]
#[derive(Clone, Debug, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct ResidentialInverterData {
	pub run_state: Option<InverterRunStatus>,
	pub inverter_state: Option<InverterStatus>,
	#[serde(with = "chrono::serde::ts_milliseconds_option")]
	pub open_time: Option<DateTime<Utc>>,
	#[serde(with = "chrono::serde::ts_milliseconds_option")]
	pub close_time: Option<DateTime<Utc>>,
	pub temperature: Option<f64>,
	pub efficiency: Option<f64>,
	pub power_factor: Option<f64>,
	pub active_power: Option<f64>,
	pub reactive_power: Option<f64>,
	pub mppt_power: Option<f64>,
	pub a_u: Option<f64>,
	pub b_u: Option<f64>,
	pub c_u: Option<f64>,
	pub a_i: Option<f64>,
	pub b_i: Option<f64>,
	pub c_i: Option<f64>,
	pub pv1_u: Option<f64>,
	pub pv2_u: Option<f64>,
	pub pv3_u: Option<f64>,
	pub pv4_u: Option<f64>,
	pub pv5_u: Option<f64>,
	pub pv6_u: Option<f64>,
	pub pv7_u: Option<f64>,
	pub pv8_u: Option<f64>,
	pub pv1_i: Option<f64>,
	pub pv2_i: Option<f64>,
	pub pv3_i: Option<f64>,
	pub pv4_i: Option<f64>,
	pub pv5_i: Option<f64>,
	pub pv6_i: Option<f64>,
	pub pv7_i: Option<f64>,
	pub pv8_i: Option<f64>,
	pub day_cap: Option<f64>,
	pub total_cap: Option<f64>,
	pub mppt_1_cap: Option<f64>,
	pub mppt_2_cap: Option<f64>,
	pub mppt_3_cap: Option<f64>,
	pub mppt_4_cap: Option<f64>,
	pub ab_u: Option<f64>,
	pub bc_u: Option<f64>,
	pub ca_u: Option<f64>,
	pub elec_freq: Option<f64>,
}
impl ResidentialInverterData {
	/// Output phase voltages paired with their phase label.
	pub fn phase_voltages(&self) -> [(&'static str, Option<f64>); 3] {
		[("l1", self.a_u), ("l2", self.b_u), ("l3", self.c_u)]
	}

	/// Output phase currents paired with their phase label.
	pub fn phase_currents(&self) -> [(&'static str, Option<f64>); 3] {
		[("l1", self.a_i), ("l2", self.b_i), ("l3", self.c_i)]
	}

	/// PV string voltages paired with their string label.
	pub fn string_voltages(&self) -> [(&'static str, Option<f64>); 8] {
		[
			("pv1", self.pv1_u),
			("pv2", self.pv2_u),
			("pv3", self.pv3_u),
			("pv4", self.pv4_u),
			("pv5", self.pv5_u),
			("pv6", self.pv6_u),
			("pv7", self.pv7_u),
			("pv8", self.pv8_u),
		]
	}

	/// PV string currents paired with their string label.
	pub fn string_currents(&self) -> [(&'static str, Option<f64>); 8] {
		[
			("pv1", self.pv1_i),
			("pv2", self.pv2_i),
			("pv3", self.pv3_i),
			("pv4", self.pv4_i),
			("pv5", self.pv5_i),
			("pv6", self.pv6_i),
			("pv7", self.pv7_i),
			("pv8", self.pv8_i),
		]
	}

	/// MPP tracker lifetime yields paired with their tracker label.
	pub fn tracker_yields(&self) -> [(&'static str, Option<f64>); 4] {
		[
			("mppt1", self.mppt_1_cap),
			("mppt2", self.mppt_2_cap),
			("mppt3", self.mppt_3_cap),
			("mppt4", self.mppt_4_cap),
		]
	}

	/// Line-to-line grid voltages paired with their phase label.
	pub fn grid_voltages(&self) -> [(&'static str, Option<f64>); 3] {
		[("l1l2", self.ab_u), ("l2l3", self.bc_u), ("l3l1", self.ca_u)]
	}
}
