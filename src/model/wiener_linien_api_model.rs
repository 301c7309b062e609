//! Shape of the `ogd_realtime/monitor` response. Only the fields the board needs are modelled.
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize)]
pub struct MonitorResponse {
    pub message: Message,
    pub data: MonitorData,
}

#[derive(Debug, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    /// "OK" on success
    pub value: String,
    /// Local time without a reliable offset
    pub server_time: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct MonitorData {
    pub monitors: Vec<Monitor>,
}

/// One monitor per requested RBL number
#[derive(Debug, Deserialize, Serialize)]
pub struct Monitor {
    pub lines: Vec<Line>,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Line {
    /// e.g. "U1"
    pub name: String,
    /// Final stop, e.g. "LEOPOLDAU"
    pub towards: String,
    pub departures: Departures,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Departures {
    /// Soonest first
    pub departure: Vec<ApiDeparture>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct ApiDeparture {
    pub departure_time: DepartureTime,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct DepartureTime {
    /// Minutes until departure, rounded by the server
    pub countdown: i64,
    pub time_planned: Option<String>,
    /// Only present when the vehicle is tracked live
    pub time_real: Option<String>,
}
