//! Yandex Geocoder HTTP client.
//!
//! Issues one `GET` per address:
//!
//! ```text
//! GET <endpoint>?apikey=<key>&geocode=<address>, <city>, <country>&format=json&lang=<lang>&results=1
//! ```
//!
//! and reads the first candidate's `Point.pos`, which the service serializes
//! as `"<lon> <lat>"`.

use crate::common::{Address, ApiKey, Coordinates, GeocodeError, Result};
use crate::config::GeocoderConfig;
use crate::geocoder::Geocoder;
use serde::Deserialize;

// Wire types mirror only the path we read; everything else is ignored.

#[derive(Debug, Deserialize)]
struct WireEnvelope {
    response: WireResponse,
}

#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(rename = "GeoObjectCollection")]
    collection: WireCollection,
}

#[derive(Debug, Deserialize)]
struct WireCollection {
    #[serde(rename = "featureMember", default)]
    feature_members: Vec<WireFeatureMember>,
}

#[derive(Debug, Deserialize)]
struct WireFeatureMember {
    #[serde(rename = "GeoObject")]
    geo_object: WireGeoObject,
}

#[derive(Debug, Deserialize)]
struct WireGeoObject {
    #[serde(rename = "Point")]
    point: WirePoint,
}

#[derive(Debug, Deserialize)]
struct WirePoint {
    pos: String,
}

/// Geocoder backed by the Yandex HTTP API.
///
/// Cloning is cheap: the underlying [`reqwest::Client`] shares its connection
/// pool, so every worker reuses keep-alive connections.
#[derive(Debug, Clone)]
pub struct YandexGeocoder {
    client: reqwest::Client,
    config: GeocoderConfig,
}

impl YandexGeocoder {
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid or the HTTP client
    /// cannot be built.
    pub fn new(config: GeocoderConfig) -> Result<Self> {
        config.validate()?;
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { client, config })
    }

    pub fn config(&self) -> &GeocoderConfig {
        &self.config
    }
}

impl Geocoder for YandexGeocoder {
    async fn geocode(
        &self,
        key: &ApiKey,
        address: &Address,
    ) -> core::result::Result<Coordinates, GeocodeError> {
        let query = self.config.query_for(address.as_str());

        let response = self
            .client
            .get(&self.config.endpoint)
            .query(&[
                ("apikey", key.expose()),
                ("geocode", query.as_str()),
                ("format", "json"),
                ("lang", self.config.lang.as_str()),
                ("results", "1"),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(GeocodeError::Status(status));
        }

        let body = response.bytes().await?;
        parse_response(&body)
    }
}

/// Extracts the first candidate's coordinates from a response body.
///
/// # Errors
///
/// [`GeocodeError::Malformed`] if the body does not have the expected shape,
/// [`GeocodeError::NoCandidates`] if the candidate list is empty.
pub fn parse_response(body: &[u8]) -> core::result::Result<Coordinates, GeocodeError> {
    let envelope: WireEnvelope =
        serde_json::from_slice(body).map_err(|e| GeocodeError::Malformed {
            reason: e.to_string(),
        })?;

    let member = envelope
        .response
        .collection
        .feature_members
        .into_iter()
        .next()
        .ok_or(GeocodeError::NoCandidates)?;

    parse_pos(&member.geo_object.point.pos)
}

/// Parses a `"<lon> <lat>"` position and reorders it to latitude first.
///
/// # Errors
///
/// Returns [`GeocodeError::Malformed`] unless the input is exactly two finite
/// numbers.
pub fn parse_pos(pos: &str) -> core::result::Result<Coordinates, GeocodeError> {
    let malformed = || GeocodeError::Malformed {
        reason: format!("unexpected position {pos:?}"),
    };

    let mut parts = pos.split_whitespace();
    let (Some(lon), Some(lat), None) = (parts.next(), parts.next(), parts.next()) else {
        return Err(malformed());
    };

    let longitude: f64 = lon.parse().map_err(|_| malformed())?;
    let latitude: f64 = lat.parse().map_err(|_| malformed())?;
    if !longitude.is_finite() || !latitude.is_finite() {
        return Err(malformed());
    }

    Ok(Coordinates::new(latitude, longitude))
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn candidate(pos: &str) -> serde_json::Value {
        json!({
            "response": {
                "GeoObjectCollection": {
                    "metaDataProperty": {},
                    "featureMember": [
                        { "GeoObject": { "name": "Тверская улица, 7", "Point": { "pos": pos } } }
                    ]
                }
            }
        })
    }

    fn geocoder_for(server: &MockServer, timeout: Duration) -> YandexGeocoder {
        YandexGeocoder::new(GeocoderConfig {
            endpoint: format!("{}/1.x/", server.uri()),
            timeout,
            ..GeocoderConfig::default()
        })
        .expect("client")
    }

    #[test]
    fn pos_is_reordered_to_lat_lon() {
        let coords = parse_pos("37.611347 55.760241").unwrap();
        assert_eq!(coords, Coordinates::new(55.760241, 37.611347));
    }

    #[test]
    fn malformed_pos_is_rejected() {
        for pos in ["", "37.6", "37.6 55.7 1.0", "east north", "NaN 55.7"] {
            assert!(
                matches!(parse_pos(pos), Err(GeocodeError::Malformed { .. })),
                "{pos:?} should be rejected"
            );
        }
    }

    #[test]
    fn empty_candidate_list() {
        let body = json!({ "response": { "GeoObjectCollection": { "featureMember": [] } } });
        let err = parse_response(body.to_string().as_bytes()).unwrap_err();
        assert!(matches!(err, GeocodeError::NoCandidates));

        let body = json!({ "response": { "GeoObjectCollection": {} } });
        let err = parse_response(body.to_string().as_bytes()).unwrap_err();
        assert!(matches!(err, GeocodeError::NoCandidates));
    }

    #[test]
    fn unexpected_shape_is_malformed() {
        let err = parse_response(b"{\"statusCode\":403,\"error\":\"Forbidden\"}").unwrap_err();
        assert!(matches!(err, GeocodeError::Malformed { .. }));

        let err = parse_response(b"<html>").unwrap_err();
        assert!(matches!(err, GeocodeError::Malformed { .. }));
    }

    #[tokio::test]
    async fn sends_expected_query() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/1.x/"))
            .and(query_param("apikey", "k1"))
            .and(query_param("geocode", "Тверская ул., 7, Москва, Россия"))
            .and(query_param("format", "json"))
            .and(query_param("lang", "ru_RU"))
            .and(query_param("results", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(candidate("37.61 55.76")))
            .expect(1)
            .mount(&server)
            .await;

        let geocoder = geocoder_for(&server, Duration::from_secs(5));
        let coords = geocoder
            .geocode(&ApiKey::new("k1"), &Address::new("Тверская ул., 7"))
            .await
            .unwrap();

        assert_eq!(coords, Coordinates::new(55.76, 37.61));
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403).set_body_json(candidate("37.61 55.76")))
            .mount(&server)
            .await;

        let geocoder = geocoder_for(&server, Duration::from_secs(5));
        let err = geocoder
            .geocode(&ApiKey::new("k1"), &Address::new("A"))
            .await
            .unwrap_err();

        assert!(matches!(err, GeocodeError::Status(s) if s.as_u16() == 403));
    }

    #[tokio::test]
    async fn slow_response_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(candidate("37.61 55.76"))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let geocoder = geocoder_for(&server, Duration::from_millis(50));
        let err = geocoder
            .geocode(&ApiKey::new("k1"), &Address::new("A"))
            .await
            .unwrap_err();

        assert!(matches!(err, GeocodeError::Transport(e) if e.is_timeout()));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = YandexGeocoder::new(GeocoderConfig {
            timeout: Duration::ZERO,
            ..GeocoderConfig::default()
        })
        .unwrap_err();
        assert!(matches!(err, crate::Error::InvalidConfig { .. }));
    }
}
