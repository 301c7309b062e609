//! Responsible for fetching departures from the Wiener Linien realtime API
use std::time::Duration;

use chrono::{DateTime, TimeDelta};
use chrono_tz::Tz;
use reqwest::{Client, Url};
use tokio::sync::{mpsc::Sender, watch};
use tokio::{select, time::sleep};
use tracing::{Instrument, debug, error, info, info_span};

use crate::{
    background_services::display_controller::{BoardEvent, RefreshPeriods, UpdateSpeed},
    model::{
        departure::{Departure, DepartureInfos},
        wiener_linien_api_model::MonitorResponse,
    },
    utils::{ParseError, local_now, parse_local},
};

pub const DEFAULT_ENDPOINT: &str = "https://www.wienerlinien.at/ogd_realtime/monitor";

/// Maximum difference between the server's clock and ours
const MAX_CLOCK_SKEW_SECS: i64 = 5;

#[derive(Debug, Clone)]
pub struct WienerLinien {
    client: Client,
    endpoint: Url,
    /// Older API versions wanted it as `sender`, the current one needs none
    api_key: Option<String>,
    clock: fn() -> DateTime<Tz>,
}

impl WienerLinien {
    pub fn new(
        endpoint: &str,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self, anyhow::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        let endpoint = Url::parse(endpoint)?;

        Ok(Self {
            client,
            endpoint,
            api_key,
            clock: local_now,
        })
    }

    /// Replaces the Vienna wall clock used for the skew check and the countdowns
    pub fn with_clock(mut self, clock: fn() -> DateTime<Tz>) -> Self {
        self.clock = clock;
        self
    }

    /// Gets the departures of all the given stops.
    ///
    /// Never fails. Any error is logged and an empty map is returned, so a broken API only ever
    /// leaves the board empty until the next poll.
    pub async fn get_departures(&self, rbl_numbers: &[u32]) -> DepartureInfos {
        match self.try_get_departures(rbl_numbers).await {
            Ok(departures) => departures,
            Err(e) => {
                error!("{e}");
                DepartureInfos::new()
            }
        }
    }

    #[tracing::instrument(err, skip(self))]
    pub async fn try_get_departures(
        &self,
        rbl_numbers: &[u32],
    ) -> Result<DepartureInfos, WienerLinienError> {
        let response = self
            .client
            .get(self.request_url(rbl_numbers))
            .send()
            .instrument(info_span!("Fetching departures"))
            .await?
            .error_for_status()?;

        let body = response
            .text()
            .instrument(info_span!("Reading body of response"))
            .await?;

        let departures = parse_departures(&body, (self.clock)())?;

        info!("got departures for {} lines", departures.len());

        Ok(departures)
    }

    /// `rbl` is repeated once per stop
    pub fn request_url(&self, rbl_numbers: &[u32]) -> Url {
        let mut url = self.endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            for rbl in rbl_numbers {
                query.append_pair("rbl", &rbl.to_string());
            }
            if let Some(api_key) = &self.api_key {
                query.append_pair("sender", api_key);
            }
        }
        url
    }
}

/// Validates the envelope of a monitor response and turns it into departures.
///
/// A single bad timestamp fails the whole response.
pub fn parse_departures(
    body: &str,
    now: DateTime<Tz>,
) -> Result<DepartureInfos, WienerLinienError> {
    let response: MonitorResponse = serde_json::from_str(body).map_err(ProtocolError::from)?;

    if response.message.value != "OK" {
        return Err(ProtocolError::NotOk(response.message.value).into());
    }

    let server_time = parse_local(&response.message.server_time)?;
    let skew = (now - server_time).abs();
    if skew >= TimeDelta::seconds(MAX_CLOCK_SKEW_SECS) {
        return Err(ProtocolError::ClockSkew {
            server_time,
            local_time: now,
        }
        .into());
    }

    let mut departures = DepartureInfos::new();

    for monitor in response.data.monitors {
        for line in monitor.lines {
            let name = format!("{} {}", line.name, line.towards);
            let line_departures = line
                .departures
                .departure
                .iter()
                .map(|d| Departure::from_api(d, now))
                .collect::<Result<Vec<_>, _>>()?;

            debug!("{name}: {} departures", line_departures.len());

            departures.insert(name, line_departures);
        }
    }

    Ok(departures)
}

#[derive(thiserror::Error, Debug)]
pub enum WienerLinienError {
    #[error("error fetching departures: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("unexpected response: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("error parsing departures: {0}")]
    Parse(#[from] ParseError),
}

#[derive(thiserror::Error, Debug)]
pub enum ProtocolError {
    #[error("message value is {0:?} instead of \"OK\"")]
    NotOk(String),

    #[error("server time {server_time} is too far from local time {local_time}")]
    ClockSkew {
        server_time: DateTime<Tz>,
        local_time: DateTime<Tz>,
    },

    #[error("malformed response: {0}")]
    Malformed(#[from] serde_json::Error),
}

/// Polls the given stops forever and sends every result to the display controller.
///
/// Sleeps for the period of the current [`UpdateSpeed`]. A speed change cuts the sleep short.
pub async fn poll_departures(
    wiener_linien: WienerLinien,
    rbl_numbers: Vec<u32>,
    mut speed_receiver: watch::Receiver<UpdateSpeed>,
    board_sender: Sender<BoardEvent>,
    periods: RefreshPeriods,
) -> Result<(), anyhow::Error> {
    loop {
        let departures = wiener_linien.get_departures(&rbl_numbers).await;

        board_sender
            .send(BoardEvent::Departures(departures))
            .await?;

        let period = speed_receiver.borrow_and_update().period(periods);

        select! {
            _ = sleep(period) => {},
            changed = speed_receiver.changed() => {
                changed?;
                info!("update speed changed, refreshing now");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::{Router, extract::RawQuery, http::StatusCode, routing::get};
    use chrono::{DateTime, TimeDelta, TimeZone, Utc};
    use chrono_tz::{Europe::Vienna, Tz};
    use tokio::net::TcpListener;

    use super::*;

    const STEPHANSPLATZ: &str =
        include_str!("../../documentation/example_responses/monitor_stephansplatz.json");

    fn frozen_now() -> DateTime<Tz> {
        Vienna.with_ymd_and_hms(2020, 1, 1, 12, 0, 0).unwrap()
    }

    fn response(value: &str, server_time: &str) -> String {
        format!(
            r#"{{"message":{{"value":"{value}","serverTime":"{server_time}"}},"data":{{"monitors":[]}}}}"#
        )
    }

    /// Serves `router` on a random local port and returns the monitor endpoint
    async fn serve(router: Router) -> Result<String, anyhow::Error> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let address = listener.local_addr()?;
        tokio::spawn(async move { axum::serve(listener, router).await });

        Ok(format!("http://{address}/ogd_realtime/monitor"))
    }

    fn client(endpoint: &str, api_key: Option<&str>) -> Result<WienerLinien, anyhow::Error> {
        let api_key = api_key.map(str::to_string);

        let wiener_linien = WienerLinien::new(endpoint, api_key, Duration::from_secs(5))?;

        Ok(wiener_linien.with_clock(frozen_now))
    }

    #[test]
    fn test_parse_stephansplatz() -> Result<(), anyhow::Error> {
        let departures = parse_departures(STEPHANSPLATZ, frozen_now())?;

        let departure3 = Departure::new(Some(TimeDelta::seconds(3 * 60 + 3)), 3);
        let departure6 = Departure::new(Some(TimeDelta::seconds(6 * 60 + 6)), 6);
        let expected = DepartureInfos::from([
            ("U1 LEOPOLDAU".to_string(), vec![departure3]),
            ("U1 ALAUDAGASSE".to_string(), vec![departure3, departure6]),
        ]);

        assert_eq!(departures, expected);

        Ok(())
    }

    #[test]
    fn test_parse_not_ok() {
        let body = response("ERROR", "2020-01-01T12:00:00.000+0100");

        assert!(matches!(
            parse_departures(&body, frozen_now()),
            Err(WienerLinienError::Protocol(ProtocolError::NotOk(value))) if value == "ERROR"
        ));
    }

    #[test]
    fn test_parse_clock_skew() -> Result<(), anyhow::Error> {
        let skewed = response("OK", "2020-01-01T12:00:30.000+0100");
        assert!(matches!(
            parse_departures(&skewed, frozen_now()),
            Err(WienerLinienError::Protocol(ProtocolError::ClockSkew { .. }))
        ));

        let behind = response("OK", "2020-01-01T11:59:55.000+0100");
        assert!(parse_departures(&behind, frozen_now()).is_err());

        let close = response("OK", "2020-01-01T11:59:56.000+0100");
        assert!(parse_departures(&close, frozen_now())?.is_empty());

        Ok(())
    }

    #[test]
    fn test_parse_during_repeated_hour() -> Result<(), anyhow::Error> {
        // 02:10 CET, the second time the clocks show 02:10 on that night
        let now = Utc
            .with_ymd_and_hms(2020, 10, 25, 1, 10, 0)
            .unwrap()
            .with_timezone(&Vienna);
        let body = r#"{"message":{"value":"OK","serverTime":"2020-10-25T02:10:00.000+0100"},
            "data":{"monitors":[{"lines":[{"name":"N25","towards":"Kagran","departures":{"departure":[
                {"departureTime":{"timeReal":"2020-10-25T02:15:00.000+0100","countdown":5}}
            ]}}]}]}}"#;

        let departures = parse_departures(body, now)?;

        assert_eq!(
            departures["N25 Kagran"],
            [Departure::new(Some(TimeDelta::minutes(5)), 5)]
        );

        Ok(())
    }

    #[test]
    fn test_parse_missing_field() {
        let body = r#"{"message":{"value":"OK","serverTime":"2020-01-01T12:00:00.000+0100"}}"#;

        assert!(matches!(
            parse_departures(body, frozen_now()),
            Err(WienerLinienError::Protocol(ProtocolError::Malformed(_)))
        ));
    }

    #[test]
    fn test_parse_bad_timestamp_fails_whole_response() {
        let body = STEPHANSPLATZ.replace("2020-01-01T12:06:06.000+0100", "yesterday");

        assert!(matches!(
            parse_departures(&body, frozen_now()),
            Err(WienerLinienError::Parse(_))
        ));
    }

    #[test]
    fn test_request_url() -> Result<(), anyhow::Error> {
        let without_key = client(DEFAULT_ENDPOINT, None)?;
        assert_eq!(
            without_key.request_url(&[4111, 4118]).as_str(),
            "https://www.wienerlinien.at/ogd_realtime/monitor?rbl=4111&rbl=4118"
        );

        let with_key = client(DEFAULT_ENDPOINT, Some("secret"))?;
        assert_eq!(
            with_key.request_url(&[4111]).as_str(),
            "https://www.wienerlinien.at/ogd_realtime/monitor?rbl=4111&sender=secret"
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_get_departures() -> Result<(), anyhow::Error> {
        let router = Router::new().route(
            "/ogd_realtime/monitor",
            get(|RawQuery(query): RawQuery| async move {
                assert_eq!(query.as_deref(), Some("rbl=4111&rbl=4118"));
                STEPHANSPLATZ
            }),
        );
        let endpoint = serve(router).await?;

        let departures = client(&endpoint, None)?.get_departures(&[4111, 4118]).await;

        assert_eq!(
            departures.keys().collect::<Vec<_>>(),
            ["U1 ALAUDAGASSE", "U1 LEOPOLDAU"]
        );

        Ok(())
    }

    #[tokio::test]
    async fn test_get_departures_fails_soft() -> Result<(), anyhow::Error> {
        let router = Router::new()
            .route(
                "/error/ogd_realtime/monitor",
                get(|| async { response("ERROR", "2020-01-01T12:00:00.000+0100") }),
            )
            .route(
                "/skew/ogd_realtime/monitor",
                get(|| async { response("OK", "2020-01-01T12:00:30.000+0100") }),
            )
            .route(
                "/status/ogd_realtime/monitor",
                get(|| async { (StatusCode::INTERNAL_SERVER_ERROR, STEPHANSPLATZ) }),
            )
            .route(
                "/garbage/ogd_realtime/monitor",
                get(|| async { "<html>maintenance</html>" }),
            );
        let endpoint = serve(router).await?;

        for prefix in ["error", "skew", "status", "garbage"] {
            let endpoint = endpoint.replace("/ogd_realtime", &format!("/{prefix}/ogd_realtime"));
            let wiener_linien = client(&endpoint, Some("secret"))?;

            assert!(wiener_linien.try_get_departures(&[4111]).await.is_err());
            assert!(wiener_linien.get_departures(&[4111]).await.is_empty());
        }

        Ok(())
    }

    #[tokio::test]
    async fn test_get_departures_unreachable() -> Result<(), anyhow::Error> {
        // bind and drop to get a port nobody listens on
        let address = TcpListener::bind("127.0.0.1:0").await?.local_addr()?;
        let wiener_linien = client(&format!("http://{address}/ogd_realtime/monitor"), None)?;

        assert!(matches!(
            wiener_linien.try_get_departures(&[4111]).await,
            Err(WienerLinienError::Transport(_))
        ));
        assert!(wiener_linien.get_departures(&[4111]).await.is_empty());

        Ok(())
    }
}
