//! Path-capacity metrics query and response parsing.
//!
//! The monitoring endpoint takes a JSON query describing the window, the
//! site/path filter and the metric, and answers with one series per
//! direction:
//!
//! ```json
//! {"metrics": [{"series": [
//!     {"data": [{"datapoints": [{"time": "...", "value": 41.2}, ...]}]},
//!     {"data": [{"datapoints": [...]}]}
//! ]}]}
//! ```
//!
//! Series 0 is download, series 1 is upload.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::models::{DirectionSeries, Sample, SeriesPair};

/// Aggregation interval requested from the monitoring endpoint.
pub const SAMPLE_INTERVAL: &str = "5min";

/// Metric name for path capacity.
pub const PATH_CAPACITY_METRIC: &str = "PathCapacity";

const DOWNLOAD_SERIES: usize = 0;
const UPLOAD_SERIES: usize = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricsQuery {
    pub start_time: String,
    pub end_time: String,
    pub interval: String,
    pub view: QueryView,
    pub filter: QueryFilter,
    pub metrics: Vec<MetricSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryView {
    pub summary: bool,
    pub individual: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryFilter {
    pub site: Vec<String>,
    pub path: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSpec {
    pub name: String,
    pub statistics: Vec<String>,
    pub unit: String,
}

impl MetricsQuery {
    /// Average path capacity per direction for one circuit over
    /// `[end - lookback, end]`.
    pub fn path_capacity(
        site_id: &str,
        circuit_id: &str,
        end: DateTime<Utc>,
        lookback: Duration,
    ) -> Self {
        Self {
            start_time: format_timestamp(end - lookback),
            end_time: format_timestamp(end),
            interval: SAMPLE_INTERVAL.into(),
            view: QueryView {
                summary: false,
                individual: "direction".into(),
            },
            filter: QueryFilter {
                site: vec![site_id.to_string()],
                path: vec![circuit_id.to_string()],
            },
            metrics: vec![MetricSpec {
                name: PATH_CAPACITY_METRIC.into(),
                statistics: vec!["average".into()],
                unit: "Mbps".into(),
            }],
        }
    }
}

/// ISO 8601 at second precision with a literal `.000Z` suffix.
pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.format("%Y-%m-%dT%H:%M:%S.000Z").to_string()
}

/// Extract the download/upload series from a metrics response body.
///
/// Missing levels in the response yield empty series. Datapoints whose value
/// is `null` are dropped; a datapoint with no `value` key makes its whole
/// direction empty. Times in an unexpected format never drop a value.
pub fn parse_series_pair(body: &serde_json::Value) -> SeriesPair {
    let series = body
        .get("metrics")
        .and_then(|m| m.get(0))
        .and_then(|m| m.get("series"));

    SeriesPair {
        download: parse_direction(series.and_then(|s| s.get(DOWNLOAD_SERIES))),
        upload: parse_direction(series.and_then(|s| s.get(UPLOAD_SERIES))),
    }
}

fn parse_direction(series: Option<&serde_json::Value>) -> DirectionSeries {
    let datapoints = series
        .and_then(|s| s.get("data"))
        .and_then(|d| d.get(0))
        .and_then(|d| d.get("datapoints"))
        .and_then(|d| d.as_array());

    let Some(datapoints) = datapoints else {
        return DirectionSeries::empty();
    };

    let mut samples = Vec::with_capacity(datapoints.len());
    for point in datapoints {
        let Some(value) = point.get("value") else {
            return DirectionSeries::empty();
        };
        if let Some(value) = value.as_f64() {
            samples.push(Sample {
                timestamp: parse_time(point.get("time")),
                value,
            });
        }
    }
    DirectionSeries::new(samples)
}

/// Datapoint time as RFC 3339, ISO 8601 with a `+hhmm` offset, or epoch
/// milliseconds. Anything else maps to the Unix epoch; the estimate only
/// uses values.
fn parse_time(time: Option<&serde_json::Value>) -> DateTime<Utc> {
    let parsed = match time {
        Some(serde_json::Value::String(t)) => DateTime::parse_from_rfc3339(t)
            .or_else(|_| DateTime::parse_from_str(t, "%Y-%m-%dT%H:%M:%S%.f%z"))
            .ok()
            .map(|ts| ts.with_timezone(&Utc)),
        Some(serde_json::Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|ms| ms as i64))
            .and_then(DateTime::from_timestamp_millis),
        _ => None,
    };
    parsed.unwrap_or(DateTime::UNIX_EPOCH)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn query_covers_lookback_window() {
        let end = Utc.with_ymd_and_hms(2024, 5, 2, 14, 30, 59).unwrap()
            + Duration::milliseconds(812);
        let q = MetricsQuery::path_capacity("site-1", "wan-9", end, Duration::hours(4));

        assert_eq!(q.start_time, "2024-05-02T10:30:59.000Z");
        assert_eq!(q.end_time, "2024-05-02T14:30:59.000Z");

        let body = serde_json::to_value(&q).unwrap();
        assert_eq!(
            body,
            json!({
                "start_time": "2024-05-02T10:30:59.000Z",
                "end_time": "2024-05-02T14:30:59.000Z",
                "interval": "5min",
                "view": {"summary": false, "individual": "direction"},
                "filter": {"site": ["site-1"], "path": ["wan-9"]},
                "metrics": [
                    {"name": "PathCapacity", "statistics": ["average"], "unit": "Mbps"}
                ]
            })
        );
    }

    fn response(download: serde_json::Value, upload: serde_json::Value) -> serde_json::Value {
        json!({"metrics": [{"series": [
            {"data": [{"datapoints": download}]},
            {"data": [{"datapoints": upload}]}
        ]}]})
    }

    #[test]
    fn parses_both_directions() {
        let body = response(
            json!([
                {"time": "2024-05-02T10:30:00.000Z", "value": 48.5},
                {"time": "2024-05-02T10:35:00.000Z", "value": 51.0}
            ]),
            json!([{"time": "2024-05-02T10:30:00Z", "value": 9.75}]),
        );
        let pair = parse_series_pair(&body);
        assert_eq!(pair.download.values().collect::<Vec<_>>(), vec![48.5, 51.0]);
        assert_eq!(pair.upload.values().collect::<Vec<_>>(), vec![9.75]);
    }

    #[test]
    fn null_values_are_dropped() {
        let body = response(
            json!([
                {"time": "2024-05-02T10:30:00Z", "value": null},
                {"time": "2024-05-02T10:35:00Z", "value": 12.0}
            ]),
            json!([]),
        );
        let pair = parse_series_pair(&body);
        assert_eq!(pair.download.len(), 1);
        assert!(pair.upload.is_empty());
    }

    #[test]
    fn missing_value_field_empties_direction() {
        let body = response(
            json!([
                {"time": "2024-05-02T10:30:00Z", "value": 30.0},
                {"time": "2024-05-02T10:35:00Z"}
            ]),
            json!([{"time": "2024-05-02T10:30:00Z", "value": 4.0}]),
        );
        let pair = parse_series_pair(&body);
        assert!(pair.download.is_empty());
        assert_eq!(pair.upload.len(), 1);
    }

    #[test]
    fn mixed_time_formats_keep_values() {
        let body = response(
            json!([
                {"time": "2024-05-02T10:30:00.000Z", "value": 40.0},
                {"time": "2024-05-02T10:35:00.000+0000", "value": 42.0},
                {"time": 1714645800000_i64, "value": 44.0},
                {"time": "yesterday", "value": 46.0},
                {"value": 48.0}
            ]),
            json!([{"time": 1714645800000.0, "value": 8.0}]),
        );
        let pair = parse_series_pair(&body);
        assert_eq!(
            pair.download.values().collect::<Vec<_>>(),
            vec![40.0, 42.0, 44.0, 46.0, 48.0]
        );
        assert_eq!(pair.upload.len(), 1);

        let times: Vec<_> = pair.download.samples().iter().map(|s| s.timestamp).collect();
        let expected = Utc.with_ymd_and_hms(2024, 5, 2, 10, 30, 0).unwrap();
        assert_eq!(times[0], expected);
        assert_eq!(times[1], expected + Duration::minutes(5));
        assert_eq!(times[2], expected);
        assert_eq!(times[3], DateTime::UNIX_EPOCH);
        assert_eq!(times[4], DateTime::UNIX_EPOCH);
        assert_eq!(pair.upload.samples()[0].timestamp, expected);
    }

    #[test]
    fn truncated_responses_yield_empty_series() {
        for body in [
            json!({}),
            json!({"metrics": []}),
            json!({"metrics": [{"series": []}]}),
            json!({"metrics": [{"series": [{"data": []}]}]}),
        ] {
            let pair = parse_series_pair(&body);
            assert!(pair.download.is_empty(), "{body}");
            assert!(pair.upload.is_empty(), "{body}");
        }
    }
}
