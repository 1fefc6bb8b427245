use std::marker::PhantomData;

use async_trait::async_trait;
use reqwest::{
    multipart::{Form, Part},
    Client, RequestBuilder, Response,
};
use serde::de::DeserializeOwned;
use shared::{
    domain::{RecordId, Resource},
    error::ApiErrorBody,
    protocol::{ListParams, PageEnvelope, SearchParams},
};
use tracing::debug;
use url::Url;

use crate::error::{FetchError, MutationError};

/// Backend surface of one resource controller.
#[async_trait]
pub trait ResourceApi<T>: Send + Sync {
    fn resource(&self) -> Resource;
    async fn list(&self, params: &ListParams) -> Result<PageEnvelope<T>, FetchError>;
    async fn search(&self, params: &SearchParams) -> Result<PageEnvelope<T>, FetchError>;
    async fn get(&self, id: &RecordId) -> Result<T, FetchError>;
    async fn create(&self, body: MutationBody) -> Result<T, MutationError>;
    async fn update(&self, id: &RecordId, body: MutationBody) -> Result<T, MutationError>;
    async fn delete(&self, id: &RecordId) -> Result<(), MutationError>;
}

/// Payload of a create or update.
#[derive(Debug, Clone)]
pub enum MutationBody {
    Json(serde_json::Value),
    Multipart(Vec<FormPart>),
}

#[derive(Debug, Clone)]
pub struct FormPart {
    pub name: String,
    pub value: FormValue,
}

#[derive(Debug, Clone)]
pub enum FormValue {
    Text(String),
    File {
        filename: String,
        mime_type: Option<String>,
        bytes: Vec<u8>,
    },
}

impl FormPart {
    pub fn text(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: FormValue::Text(value.into()),
        }
    }

    pub fn file(
        name: impl Into<String>,
        filename: impl Into<String>,
        mime_type: Option<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            name: name.into(),
            value: FormValue::File {
                filename: filename.into(),
                mime_type,
                bytes,
            },
        }
    }
}

fn multipart_form(parts: Vec<FormPart>) -> Result<Form, MutationError> {
    let mut form = Form::new();
    for part in parts {
        form = match part.value {
            FormValue::Text(text) => form.text(part.name, text),
            FormValue::File {
                filename,
                mime_type,
                bytes,
            } => {
                let mut file = Part::bytes(bytes).file_name(filename);
                if let Some(mime_type) = mime_type {
                    file = file.mime_str(&mime_type)?;
                }
                form.part(part.name, file)
            }
        };
    }
    Ok(form)
}

#[derive(Debug, thiserror::Error)]
pub enum ApiUrlError {
    #[error("invalid API url: {0}")]
    Parse(#[from] url::ParseError),
    #[error("API url '{0}' cannot carry path segments")]
    NotABase(String),
}

/// `ResourceApi` over HTTP: `{api_url}/{Controller}`.
pub struct RestResourceApi<T> {
    http: Client,
    api_url: Url,
    resource: Resource,
    bearer_token: Option<String>,
    _record: PhantomData<fn() -> T>,
}

impl<T> RestResourceApi<T> {
    pub fn new(api_url: &str, resource: Resource) -> Result<Self, ApiUrlError> {
        Self::with_client(Client::new(), api_url, resource)
    }

    pub fn with_client(http: Client, api_url: &str, resource: Resource) -> Result<Self, ApiUrlError> {
        let api_url = Url::parse(api_url.trim())?;
        if api_url.cannot_be_a_base() {
            return Err(ApiUrlError::NotABase(api_url.to_string()));
        }
        Ok(Self {
            http,
            api_url,
            resource,
            bearer_token: None,
            _record: PhantomData,
        })
    }

    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }

    pub fn endpoint(&self, tail: &[&str]) -> Url {
        let mut url = self.api_url.clone();
        if let Ok(mut segments) = url.path_segments_mut() {
            segments
                .pop_if_empty()
                .push(self.resource.controller_name())
                .extend(tail);
        }
        url
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.bearer_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

async fn ensure_success(response: Response) -> Result<Response, FetchError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    Err(FetchError::Status {
        status,
        body: ApiErrorBody::from_response_text(&text),
    })
}

impl<T: DeserializeOwned + Send> RestResourceApi<T> {
    async fn fetch<R: DeserializeOwned>(&self, request: RequestBuilder) -> Result<R, FetchError> {
        let response = self.authorize(request).send().await?;
        let response = ensure_success(response).await?;
        response
            .json::<R>()
            .await
            .map_err(|err| FetchError::Decode(err.to_string()))
    }

    async fn mutate(&self, request: RequestBuilder, body: MutationBody) -> Result<T, MutationError> {
        let request = match body {
            MutationBody::Json(value) => request.json(&value),
            MutationBody::Multipart(parts) => request.multipart(multipart_form(parts)?),
        };
        Ok(self.fetch(request).await?)
    }
}

#[async_trait]
impl<T: DeserializeOwned + Send + 'static> ResourceApi<T> for RestResourceApi<T> {
    fn resource(&self) -> Resource {
        self.resource
    }

    async fn list(&self, params: &ListParams) -> Result<PageEnvelope<T>, FetchError> {
        debug!(resource = %self.resource, page = params.page, "api: list");
        self.fetch(self.http.get(self.endpoint(&[])).query(params))
            .await
    }

    async fn search(&self, params: &SearchParams) -> Result<PageEnvelope<T>, FetchError> {
        debug!(resource = %self.resource, page = params.page, "api: search");
        self.fetch(self.http.get(self.endpoint(&["search"])).query(params))
            .await
    }

    async fn get(&self, id: &RecordId) -> Result<T, FetchError> {
        self.fetch(self.http.get(self.endpoint(&[id.as_str()])))
            .await
    }

    async fn create(&self, body: MutationBody) -> Result<T, MutationError> {
        self.mutate(self.http.post(self.endpoint(&[])), body).await
    }

    async fn update(&self, id: &RecordId, body: MutationBody) -> Result<T, MutationError> {
        self.mutate(self.http.put(self.endpoint(&[id.as_str()])), body)
            .await
    }

    async fn delete(&self, id: &RecordId) -> Result<(), MutationError> {
        let request = self.authorize(self.http.delete(self.endpoint(&[id.as_str()])));
        ensure_success(request.send().await?).await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "tests/api_tests.rs"]
mod tests;
