use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use snafu::{OptionExt, ResultExt};
use tracing::instrument;
use url::Url;

use super::*;

const NOT_READY_MESSAGE: &str = "the file is not ready yet, try again in a moment";

/// Every successful answer of the backend is wrapped in this envelope.
#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    result: T,
    #[serde(default)]
    #[allow(dead_code)]
    message: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RegenerateRequest<'a> {
    page_number: SlideNumber,
    #[serde(skip_serializing_if = "Option::is_none")]
    existing_script: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CurrentPageRequest {
    current_page: SlideNumber,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

/// [ScriptBackend] talking to the REST server.
#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: Client,
    base: String,
    credentials: Arc<Credentials>,
}

impl HttpBackend {
    pub fn new(base: &Url, credentials: Arc<Credentials>) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("speakon/", env!("CARGO_PKG_VERSION")))
            .build()
            .context(ClientSnafu)?;

        Ok(Self {
            client,
            base: base.as_str().trim_end_matches('/').to_string(),
            credentials,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base, path.trim_start_matches('/'))
    }

    /// Sends the request built by `build`, refreshing the access token and retrying once on `401`.
    async fn execute<B>(&self, url: &str, build: B) -> Result<Response>
    where
        B: Fn(&Client) -> RequestBuilder + Send + Sync,
    {
        let response = self.send_once(url, &build).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return check(url, response).await;
        }

        match self.refresh().await {
            Ok(()) => {
                let retried = self.send_once(url, &build).await?;
                check(url, retried).await
            }
            Err(error) => {
                tracing::warn!(%error, "could not refresh the access token");
                check(url, response).await
            }
        }
    }

    async fn send_once<B>(&self, url: &str, build: &B) -> Result<Response>
    where
        B: Fn(&Client) -> RequestBuilder + Send + Sync,
    {
        let mut request = build(&self.client);
        if let Some(token) = self.credentials.access_token().await {
            request = request.bearer_auth(token);
        }

        request.send().await.context(RequestSnafu { url })
    }

    /// Trades the refresh token for a new pair, registering a fresh session when the server rejects it.
    #[instrument(skip(self))]
    async fn refresh(&self) -> Result<()> {
        let refresh_token = self
            .credentials
            .refresh_token()
            .await
            .context(MissingRefreshTokenSnafu)?;

        let refresh_url = self.url("auth/refresh");
        let request = self.client.post(&refresh_url).json(&RefreshRequest {
            refresh_token: &refresh_token,
        });

        let tokens = match exchange(&refresh_url, request).await {
            Ok(tokens) => tokens,
            Err(error) => {
                tracing::warn!(%error, "refresh token rejected, registering a new session");
                let register_url = self.url("auth/register");
                exchange(&register_url, self.client.post(&register_url)).await?
            }
        };

        self.credentials.store(tokens).await;
        tracing::debug!("access token refreshed");

        Ok(())
    }
}

async fn exchange(url: &str, request: RequestBuilder) -> Result<Tokens> {
    let response = request.send().await.context(RequestSnafu { url })?;
    let response = check(url, response).await?;
    read(url, response).await
}

/// Maps non-2xx answers onto [BackendError], preferring the message the server sent.
async fn check(url: &str, response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response
        .json::<ErrorBody>()
        .await
        .unwrap_or_default()
        .message;

    if status == StatusCode::CONFLICT {
        return NotReadySnafu {
            message: message.unwrap_or_else(|| NOT_READY_MESSAGE.to_string()),
        }
        .fail();
    }

    StatusSnafu {
        url,
        status: status.as_u16(),
        message: message.unwrap_or_else(|| format!("HTTP error! status: {}", status.as_u16())),
    }
    .fail()
}

async fn read<T: DeserializeOwned>(url: &str, response: Response) -> Result<T> {
    let body: ApiResponse<T> = response.json().await.context(DecodeSnafu { url })?;
    Ok(body.result)
}

#[async_trait]
impl ScriptBackend for HttpBackend {
    #[instrument(skip(self))]
    async fn fetch_script(&self, file_id: FileId, revision: Option<&str>) -> Result<ScriptData> {
        let url = self.url(&format!("files/{file_id}/script"));
        let response = self
            .execute(&url, |client| {
                let request = client.get(&url);
                match revision {
                    Some(name) => request.query(&[("scriptName", name)]),
                    None => request,
                }
            })
            .await?;

        read(&url, response).await
    }

    #[instrument(skip(self, data), fields(slides = data.slides.len()))]
    async fn save_script(&self, file_id: FileId, data: &ScriptData) -> Result<()> {
        let url = self.url(&format!("files/{file_id}/script"));
        self.execute(&url, |client| client.post(&url).json(data))
            .await?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_revisions(&self, file_id: FileId) -> Result<Vec<String>> {
        let url = self.url(&format!("files/{file_id}/scripts"));
        let response = self.execute(&url, |client| client.get(&url)).await?;

        read(&url, response).await
    }

    #[instrument(skip(self))]
    async fn generate_script(&self, file_id: FileId) -> Result<Vec<TranscriptPage>> {
        let url = self.url(&format!("files/{file_id}/script/generate"));
        let response = self.execute(&url, |client| client.post(&url)).await?;

        read(&url, response).await
    }

    #[instrument(skip(self, existing_script))]
    async fn regenerate_page(
        &self, file_id: FileId, page_number: SlideNumber, existing_script: Option<&str>,
    ) -> Result<TranscriptPage> {
        let url = self.url(&format!("files/{file_id}/script/regenerate"));
        let body = RegenerateRequest {
            page_number,
            existing_script: existing_script.filter(|script| !script.trim().is_empty()),
        };
        let response = self
            .execute(&url, |client| client.post(&url).json(&body))
            .await?;

        read(&url, response).await
    }

    #[instrument(skip(self))]
    async fn update_current_page(&self, file_id: FileId, page_number: SlideNumber) -> Result<()> {
        let url = self.url(&format!("files/{file_id}/current-page"));
        let body = CurrentPageRequest {
            current_page: page_number,
        };
        self.execute(&url, |client| client.patch(&url).json(&body))
            .await?;

        Ok(())
    }

    #[instrument(skip(self))]
    async fn file_status(&self, file_id: FileId) -> Result<FileInfo> {
        let url = self.url(&format!("files/{file_id}/status"));
        let response = self.execute(&url, |client| client.get(&url)).await?;

        read(&url, response).await
    }
}
