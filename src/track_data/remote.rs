use std::collections::HashMap;

use serde::Deserialize;
use url::Url;

use crate::http_client;

use super::{ServiceError, StalenessCheck, TrackData, TrackDataService};

/// Largest track-data response body accepted from the network.
const MAX_BODY_BYTES: usize = 64 * 1024 * 1024;

/// Track-data service backed by the HTTP endpoints.
///
/// `base` is the API root (for example `https://review.example/api/`); the
/// trailing slash matters for endpoint resolution.
pub struct HttpTrackDataService {
    base: Url,
}

#[derive(Debug, Deserialize)]
struct BatchBody {
    #[serde(default)]
    data: HashMap<String, Option<TrackData>>,
}

impl HttpTrackDataService {
    /// Create a service targeting the given API root.
    pub fn new(base: Url) -> Self {
        Self { base }
    }

    fn track_data_url(
        &self,
        artifact_key: &str,
        audio_key: Option<&str>,
        check: bool,
    ) -> Result<Url, ServiceError> {
        let mut url = self.base.join("track-data")?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("path", artifact_key);
            if let Some(audio_key) = audio_key {
                pairs.append_pair("audioPath", audio_key);
            }
            if check {
                pairs.append_pair("check", "1");
            }
        }
        Ok(url)
    }

    fn read_json<T: serde::de::DeserializeOwned>(
        response: ureq::Response,
    ) -> Result<T, ServiceError> {
        let bytes = http_client::read_response_bytes(response, MAX_BODY_BYTES)
            .map_err(|err| ServiceError::Body(err.to_string()))?;
        serde_json::from_slice(&bytes).map_err(|err| ServiceError::Body(err.to_string()))
    }
}

fn map_call_error(error: ureq::Error) -> ServiceError {
    match error {
        ureq::Error::Status(status, _) => ServiceError::Http { status },
        ureq::Error::Transport(transport) => ServiceError::Transport(transport.to_string()),
    }
}

impl TrackDataService for HttpTrackDataService {
    fn check(
        &self,
        artifact_key: &str,
        audio_key: Option<&str>,
    ) -> Result<StalenessCheck, ServiceError> {
        let url = self.track_data_url(artifact_key, audio_key, true)?;
        let response = http_client::agent()
            .request_url("GET", &url)
            .call()
            .map_err(map_call_error)?;
        Self::read_json(response)
    }

    fn fetch(&self, artifact_key: &str) -> Result<Option<TrackData>, ServiceError> {
        let url = self.track_data_url(artifact_key, None, false)?;
        match http_client::agent().request_url("GET", &url).call() {
            Ok(response) => Ok(Some(Self::read_json(response)?)),
            Err(ureq::Error::Status(404, _)) => Ok(None),
            Err(err) => Err(map_call_error(err)),
        }
    }

    fn fetch_batch(
        &self,
        artifact_keys: &[String],
    ) -> Result<HashMap<String, Option<TrackData>>, ServiceError> {
        let url = self.base.join("track-data/batch")?;
        let response = http_client::agent()
            .request_url("POST", &url)
            .send_json(serde_json::json!({ "paths": artifact_keys }))
            .map_err(map_call_error)?;
        let body: BatchBody = Self::read_json(response)?;
        Ok(body.data)
    }

    fn save(&self, artifact_key: &str, data: &TrackData) -> Result<(), ServiceError> {
        let url = self.track_data_url(artifact_key, None, false)?;
        http_client::agent()
            .request_url("POST", &url)
            .send_json(data)
            .map_err(map_call_error)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoint_urls_encode_query_parameters() {
        let service =
            HttpTrackDataService::new(Url::parse("https://review.example/api/").unwrap());
        let url = service
            .track_data_url("album one/a.wav.track-data.v2.json", Some("album one/a.wav"), true)
            .unwrap();
        assert_eq!(url.path(), "/api/track-data");
        let query = url.query().unwrap();
        assert!(query.contains("path=album+one%2Fa.wav.track-data.v2.json"));
        assert!(query.contains("audioPath=album+one%2Fa.wav"));
        assert!(query.contains("check=1"));
    }

    #[test]
    fn batch_endpoint_resolves_under_the_api_root() {
        let service =
            HttpTrackDataService::new(Url::parse("https://review.example/api/").unwrap());
        let url = service.base.join("track-data/batch").unwrap();
        assert_eq!(url.as_str(), "https://review.example/api/track-data/batch");
    }
}
