//! Container-field transfer.
//!
//! Container fields come back from the server as streaming URLs inside
//! field data. Hydration downloads those URLs and hands the bytes to the
//! model via [`Model::set_container_data`]. URLs that are empty or not
//! absolute http(s) URLs are skipped silently.
//!
//! [`hydrate_all`] fetches every instance concurrently with no cap. Callers
//! control the load on the server by bounding the slice they pass in.

use bytes::Bytes;
use futures_util::future::try_join_all;
use reqwest::{Method, Url};
use serde_json::Value;
use tracing::debug;

use crate::client::FmClient;
use crate::error::Result;
use crate::mapper::Record;
use crate::model::Model;
use crate::operation::{Body, Operation, require_layout, require_record_id};
use crate::request::EditResponse;
use crate::routes::Routes;

/// Returns the URL if it is worth fetching.
pub fn fetchable_url(raw: Option<&str>) -> Option<Url> {
    let raw = raw?.trim();
    if raw.is_empty() {
        return None;
    }
    let url = Url::parse(raw).ok()?;
    matches!(url.scheme(), "http" | "https").then_some(url)
}

/// Downloads every eligible container of one instance, one GET each.
pub async fn hydrate<T: Model>(client: &FmClient, model: &mut T) -> Result<()> {
    for field in T::CONTAINERS {
        let Some(url) = fetchable_url(model.container_url(field)) else {
            debug!(field, "skipping container without a usable URL");
            continue;
        };
        let data = client.fetch_container(url.as_str()).await?;
        model.set_container_data(field, data);
    }
    Ok(())
}

/// Hydrates many instances concurrently.
pub async fn hydrate_all<T: Model>(client: &FmClient, models: &mut [T]) -> Result<()> {
    try_join_all(models.iter_mut().map(|m| hydrate(client, m))).await?;
    Ok(())
}

pub(crate) async fn hydrate_records<T: Model>(
    client: &FmClient,
    records: &mut [Record<T>],
) -> Result<()> {
    try_join_all(records.iter_mut().map(|r| hydrate(client, &mut r.value))).await?;
    Ok(())
}

/// Uploads a file into a container field.
#[derive(Debug, Clone)]
pub struct UploadContainerRequest {
    pub layout: String,
    pub record_id: i64,
    pub field: String,
    pub repetition: u32,
    pub file_name: String,
    pub data: Bytes,
}

impl UploadContainerRequest {
    pub fn new(layout: &str, record_id: i64, field: &str, file_name: &str, data: Bytes) -> Self {
        UploadContainerRequest {
            layout: layout.to_string(),
            record_id,
            field: field.to_string(),
            repetition: 1,
            file_name: file_name.to_string(),
            data,
        }
    }

    pub fn repetition(mut self, repetition: u32) -> Self {
        self.repetition = repetition;
        self
    }
}

impl Operation for UploadContainerRequest {
    type Output = EditResponse;

    fn validate(&self) -> Result<()> {
        require_layout(&self.layout)?;
        require_record_id(self.record_id)?;
        if self.field.is_empty() {
            return Err(crate::error::FmError::Validation(
                "container field name is required".to_string(),
            ));
        }
        Ok(())
    }

    fn method(&self) -> Method {
        Method::POST
    }

    fn url(&self, routes: &Routes) -> String {
        routes.container(&self.layout, self.record_id, &self.field, self.repetition)
    }

    fn body(&self) -> Result<Body> {
        Ok(Body::Container {
            file_name: self.file_name.clone(),
            data: self.data.clone(),
        })
    }

    fn parse(&self, response: Value) -> Result<EditResponse> {
        Ok(serde_json::from_value(response)?)
    }
}

impl FmClient {
    pub async fn upload_container(&self, request: &UploadContainerRequest) -> Result<EditResponse> {
        self.execute(request).await
    }
}
