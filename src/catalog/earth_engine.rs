// https://developers.google.com/earth-engine/reference/rest/v1/projects.assets/listImages

use super::{AssetCatalog, AssetId, CatalogError, YearRange};
use crate::geo::GeoPoint;
use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tracing::{debug, trace};

pub const ANNUAL_EMBEDDING_COLLECTION: &str = "GOOGLE/SATELLITE_EMBEDDING/V1/ANNUAL";
pub const DEFAULT_API_ROOT: &str = "https://earthengine.googleapis.com/v1";
const PUBLIC_PROJECT: &str = "earthengine-public";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListImagesResponse {
    #[serde(default)]
    images: Vec<ImageAsset>,
}

#[derive(Debug, Deserialize)]
struct ImageAsset {
    id: Option<String>,
    name: String,
}

/// Earth Engine REST catalog of the annual satellite embedding collection.
#[derive(Debug, Clone)]
pub struct EarthEngineCatalog {
    client: Client,
    api_root: String,
    collection: String,
    access_token: String,
    quota_project: Option<String>,
    timeout: Duration,
}

impl EarthEngineCatalog {
    pub fn new<S: Into<String>>(access_token: S) -> Self {
        Self {
            client: Client::new(),
            api_root: DEFAULT_API_ROOT.to_string(),
            collection: ANNUAL_EMBEDDING_COLLECTION.to_string(),
            access_token: access_token.into(),
            quota_project: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_quota_project<S: Into<String>>(mut self, project: S) -> Self {
        self.quota_project = Some(project.into());
        self
    }

    pub fn with_api_root<S: Into<String>>(mut self, api_root: S) -> Self {
        self.api_root = api_root.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_collection<S: Into<String>>(mut self, collection: S) -> Self {
        self.collection = collection.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn list_images_url(&self) -> String {
        format!(
            "{}/projects/{PUBLIC_PROJECT}/assets/{}:listImages",
            self.api_root, self.collection
        )
    }
}

fn region(point: &GeoPoint) -> String {
    json!({"type": "Point", "coordinates": [point.lon(), point.lat()]}).to_string()
}

fn parse_list_images(body: &str) -> Result<Vec<AssetId>, CatalogError> {
    let response: ListImagesResponse =
        serde_json::from_str(body).map_err(|e| CatalogError::Decode(e.to_string()))?;
    Ok(response
        .images
        .iter()
        .filter_map(|image| AssetId::from_catalog_id(image.id.as_deref().unwrap_or(&image.name)))
        .collect())
}

impl AssetCatalog for EarthEngineCatalog {
    fn query(&self, point: &GeoPoint, range: &YearRange) -> Result<Vec<AssetId>, CatalogError> {
        let url = self.list_images_url();
        debug!(%url, %point, %range, "listing images");

        let mut request = self
            .client
            .get(&url)
            .bearer_auth(&self.access_token)
            .timeout(self.timeout)
            .query(&[
                ("startTime", range.start()),
                ("endTime", range.end()),
                ("region", region(point)),
            ]);
        if let Some(project) = &self.quota_project {
            request = request.header("x-goog-user-project", project);
        }

        let response = request
            .send()
            .map_err(|e| CatalogError::Transport(e.to_string()))?;
        let status = response.status();
        let body = response
            .text()
            .map_err(|e| CatalogError::Transport(e.to_string()))?;
        trace!(%status, body, "listImages response");

        match status {
            s if s.is_success() => parse_list_images(&body),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
                Err(CatalogError::Unauthorized(format!("{status}: {body}")))
            }
            _ => Err(CatalogError::Transport(format!("{status}: {body}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_images_in_order() {
        let body = r#"{
            "images": [
                {
                    "name": "projects/earthengine-public/assets/GOOGLE/SATELLITE_EMBEDDING/V1/ANNUAL/x02qcrn30k70b9ql6",
                    "id": "GOOGLE/SATELLITE_EMBEDDING/V1/ANNUAL/x02qcrn30k70b9ql6",
                    "startTime": "2018-01-01T00:00:00Z"
                },
                {
                    "name": "projects/earthengine-public/assets/GOOGLE/SATELLITE_EMBEDDING/V1/ANNUAL/y1"
                }
            ]
        }"#;
        let assets = parse_list_images(body).unwrap();
        assert_eq!(
            assets,
            vec![
                AssetId::new("x02qcrn30k70b9ql6").unwrap(),
                AssetId::new("y1").unwrap()
            ]
        );
    }

    #[test]
    fn empty_response_has_no_images() {
        assert!(parse_list_images("{}").unwrap().is_empty());
        assert!(matches!(
            parse_list_images("not json"),
            Err(CatalogError::Decode(_))
        ));
    }

    #[test]
    fn builds_request_parts() {
        let catalog = EarthEngineCatalog::new("token").with_api_root("http://localhost:9/v1/");
        assert_eq!(
            catalog.list_images_url(),
            "http://localhost:9/v1/projects/earthengine-public/assets/GOOGLE/SATELLITE_EMBEDDING/V1/ANNUAL:listImages"
        );
        let point = GeoPoint::new(37.5, -122.25).unwrap();
        let geometry: serde_json::Value = serde_json::from_str(&region(&point)).unwrap();
        assert_eq!(geometry, json!({"type": "Point", "coordinates": [-122.25, 37.5]}));
    }
}
