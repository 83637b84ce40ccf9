use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use framescope_types::{FEATURE_DIMENSIONS, FeatureVector, Frame, SimilarityResult};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backend::VectorBackend;
use crate::config::RemoteConfig;
use crate::error::{StoreError, StoreResult};

const BACKEND_NAME: &str = "remote";
const API_KEY_HEADER: &str = "api-key";
const DISTANCE: &str = "Cosine";

/// Client of a Qdrant-compatible similarity index speaking its REST API.
#[derive(Debug, Clone)]
pub struct RemoteBackend {
    client: Client,
    base_url: String,
    collection: String,
    api_key: Option<String>,
    timeout: Duration,
    score_threshold: f32,
}

/// Point id of a frame. The index only accepts integers and UUIDs, so frame
/// ids are mapped through a name-based UUID.
pub fn point_id(frame_id: &str) -> Uuid {
    Uuid::new_v5(
        &Uuid::NAMESPACE_URL,
        format!("framescope:frame:{frame_id}").as_bytes(),
    )
}

#[derive(Debug, Serialize)]
struct CreateCollection {
    vectors: VectorParams,
}

#[derive(Debug, Serialize)]
struct VectorParams {
    size: usize,
    distance: &'static str,
}

#[derive(Debug, Serialize)]
struct UpsertPoints<'a> {
    points: [PointStruct<'a>; 1],
}

#[derive(Debug, Serialize)]
struct PointStruct<'a> {
    id: Uuid,
    vector: &'a [f32],
    payload: FramePayload,
}

/// Frame metadata stored next to each vector.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FramePayload {
    pub frame_id: String,
    pub video_id: String,
    pub timestamp: f64,
    pub filename: String,
    pub path: String,
}

impl FramePayload {
    pub fn from_frame(frame: &Frame) -> Self {
        Self {
            frame_id: frame.id.clone(),
            video_id: frame.video_id.clone(),
            timestamp: frame.timestamp,
            filename: frame.filename.clone(),
            path: frame.storage_path.to_string_lossy().into_owned(),
        }
    }

    pub fn into_frame(self) -> Frame {
        Frame {
            id: self.frame_id,
            video_id: self.video_id,
            timestamp: self.timestamp,
            filename: self.filename,
            storage_path: PathBuf::from(self.path),
            feature_vector: None,
        }
    }
}

#[derive(Debug, Serialize)]
struct RetrievePoints {
    ids: [Uuid; 1],
    with_payload: bool,
    with_vector: bool,
}

#[derive(Debug, Serialize)]
struct SearchPoints<'a> {
    vector: &'a [f32],
    limit: usize,
    score_threshold: f32,
    with_payload: bool,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    result: T,
}

#[derive(Debug, Deserialize)]
struct RetrievedPoint {
    #[serde(default)]
    vector: Option<Vec<f32>>,
}

#[derive(Debug, Deserialize)]
struct ScoredPoint {
    score: f32,
    #[serde(default)]
    payload: Option<FramePayload>,
}

impl RemoteBackend {
    pub fn new(config: &RemoteConfig) -> StoreResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|err| {
                StoreError::configuration(format!("failed to build http client: {err}"))
            })?;
        Ok(Self {
            client,
            base_url: config.url.as_str().trim_end_matches('/').to_string(),
            collection: config.collection.clone(),
            api_key: config.api_key.clone(),
            timeout: config.timeout,
            score_threshold: config.score_threshold,
        })
    }

    fn endpoint(&self, suffix: &str) -> String {
        format!("{}/collections/{}{suffix}", self.base_url, self.collection)
    }

    fn request(&self, method: Method, url: String) -> RequestBuilder {
        let builder = self.client.request(method, url);
        match &self.api_key {
            Some(key) => builder.header(API_KEY_HEADER, key),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> StoreResult<Response> {
        builder.send().await.map_err(|err| self.transport_error(err))
    }

    fn transport_error(&self, err: reqwest::Error) -> StoreError {
        if err.is_timeout() {
            StoreError::Timeout {
                backend: BACKEND_NAME,
                timeout: self.timeout,
            }
        } else {
            StoreError::backend(BACKEND_NAME, err.to_string())
        }
    }

    async fn status_error(&self, response: Response, action: &str) -> StoreError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        StoreError::backend(
            BACKEND_NAME,
            format!("{action} returned {status}: {}", body.trim()),
        )
    }

    async fn decode<T: DeserializeOwned>(&self, response: Response, action: &str) -> StoreResult<T> {
        if !response.status().is_success() {
            return Err(self.status_error(response, action).await);
        }
        response
            .json::<ApiResponse<T>>()
            .await
            .map(|body| body.result)
            .map_err(|err| match self.transport_error(err) {
                StoreError::Backend { message, .. } => StoreError::backend(
                    BACKEND_NAME,
                    format!("{action} returned an unexpected body: {message}"),
                ),
                other => other,
            })
    }
}

#[async_trait]
impl VectorBackend for RemoteBackend {
    fn name(&self) -> &'static str {
        BACKEND_NAME
    }

    async fn ensure_collection(&self) -> StoreResult<()> {
        let response = self
            .send(self.request(Method::GET, self.endpoint("")))
            .await?;
        match response.status() {
            status if status.is_success() => {
                debug!(collection = %self.collection, "remote collection exists");
                return Ok(());
            }
            StatusCode::NOT_FOUND => {}
            _ => return Err(self.status_error(response, "collection lookup").await),
        }

        let body = CreateCollection {
            vectors: VectorParams {
                size: FEATURE_DIMENSIONS,
                distance: DISTANCE,
            },
        };
        let response = self
            .send(self.request(Method::PUT, self.endpoint("")).json(&body))
            .await?;
        let status = response.status();
        if status.is_success() {
            info!(collection = %self.collection, "created remote collection");
            return Ok(());
        }
        let text = response.text().await.unwrap_or_default();
        if status == StatusCode::CONFLICT || text.contains("already exists") {
            debug!(collection = %self.collection, "remote collection created concurrently");
            return Ok(());
        }
        Err(StoreError::backend(
            BACKEND_NAME,
            format!("collection create returned {status}: {}", text.trim()),
        ))
    }

    async fn upsert(&self, frame: &Frame, vector: &FeatureVector) -> StoreResult<()> {
        let body = UpsertPoints {
            points: [PointStruct {
                id: point_id(&frame.id),
                vector: vector.as_slice(),
                payload: FramePayload::from_frame(frame),
            }],
        };
        let response = self
            .send(
                self.request(Method::PUT, self.endpoint("/points?wait=true"))
                    .json(&body),
            )
            .await?;
        let _: serde_json::Value = self.decode(response, "upsert").await?;
        Ok(())
    }

    async fn fetch_vector(&self, frame_id: &str) -> StoreResult<Option<FeatureVector>> {
        let body = RetrievePoints {
            ids: [point_id(frame_id)],
            with_payload: false,
            with_vector: true,
        };
        let response = self
            .send(self.request(Method::POST, self.endpoint("/points")).json(&body))
            .await?;
        let points: Vec<RetrievedPoint> = self.decode(response, "retrieve").await?;
        match points.into_iter().next().and_then(|point| point.vector) {
            Some(values) => Ok(Some(FeatureVector::new(values)?)),
            None => Ok(None),
        }
    }

    async fn query(
        &self,
        reference_id: &str,
        vector: &FeatureVector,
        k: usize,
    ) -> StoreResult<Vec<SimilarityResult>> {
        if k == 0 {
            return Ok(Vec::new());
        }
        let body = SearchPoints {
            vector: vector.as_slice(),
            limit: k + 1,
            score_threshold: self.score_threshold,
            with_payload: true,
        };
        let response = self
            .send(
                self.request(Method::POST, self.endpoint("/points/search"))
                    .json(&body),
            )
            .await?;
        let hits: Vec<ScoredPoint> = self.decode(response, "search").await?;
        let mut results = Vec::with_capacity(k);
        for hit in hits {
            let Some(payload) = hit.payload else {
                warn!(reference_id, "remote hit without payload ignored");
                continue;
            };
            if payload.frame_id == reference_id {
                continue;
            }
            results.push(SimilarityResult {
                frame: payload.into_frame(),
                score: hit.score,
            });
            if results.len() == k {
                break;
            }
        }
        Ok(results)
    }
}
