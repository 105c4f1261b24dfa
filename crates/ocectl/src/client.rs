//! HTTP client for the oced daemon.

use anyhow::{anyhow, Context, Result};
use oce_common::{
    ErrorBody, Hints, NoteWrite, NotesResponse, PurgeResponse, RunRequest, RunResponse,
    SessionNote,
};
use reqwest::{RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;

/// Client for communicating with oced
pub struct OcedClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl OcedClient {
    pub fn new(base_url: &str, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `/v1/notes/{project}` with the project id encoded as one path segment
    fn notes_url(&self, project: &str) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .with_context(|| format!("Invalid daemon URL: {}", self.base_url))?;
        url.path_segments_mut()
            .map_err(|_| anyhow!("Daemon URL cannot carry a path: {}", self.base_url))?
            .pop_if_empty()
            .extend(["v1", "notes", project.trim()]);
        Ok(url)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        self.authorized(builder).send().await.map_err(|e| {
            anyhow!(
                "Cannot reach oced at {}: {}\n\n\
                 Start the daemon with `oced` or point --url / OCE_URL at it.",
                self.base_url,
                e
            )
        })
    }

    /// Decode a success body, or turn an error body into a readable message
    async fn decode<T: DeserializeOwned>(resp: Response) -> Result<T> {
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&text)
                .map(|body| format!("{} (code {})", body.error.message, body.error.code))
                .unwrap_or(text);
            anyhow::bail!("oced request failed ({}): {}", status, message);
        }
        resp.json().await.context("Failed to parse oced response")
    }

    /// True when `GET /health` answers 200
    pub async fn health(&self) -> Result<bool> {
        let resp = self.send(self.client.get(self.url("/health"))).await?;
        Ok(resp.status().is_success())
    }

    pub async fn run(
        &self,
        text: &str,
        project: Option<&str>,
        hints: Hints,
    ) -> Result<RunResponse> {
        let mut request = RunRequest::new(text).with_hints(hints);
        if let Some(project) = project {
            request = request.with_project(project);
        }
        let resp = self
            .send(self.client.post(self.url("/run_oce")).json(&request))
            .await?;
        Self::decode(resp).await
    }

    pub async fn notes(&self, project: &str) -> Result<NotesResponse> {
        let resp = self
            .send(self.client.get(self.notes_url(project)?))
            .await?;
        Self::decode(resp).await
    }

    pub async fn put_note(&self, project: &str, key: &str, value: &str) -> Result<SessionNote> {
        let body = NoteWrite {
            key: key.to_string(),
            value: value.to_string(),
        };
        let resp = self
            .send(self.client.put(self.notes_url(project)?).json(&body))
            .await?;
        Self::decode(resp).await
    }

    pub async fn purge_notes(&self, project: &str) -> Result<PurgeResponse> {
        let resp = self
            .send(self.client.delete(self.notes_url(project)?))
            .await?;
        Self::decode(resp).await
    }

    pub async fn purge_all_notes(&self) -> Result<()> {
        let resp = self.send(self.client.delete(self.url("/v1/notes"))).await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            anyhow::bail!("oced request failed ({}): {}", status, text);
        }
        Ok(())
    }
}

/// Parse the `--hints` argument; it must be a JSON object
pub fn parse_hints(raw: Option<&str>) -> Result<Hints> {
    let Some(raw) = raw else {
        return Ok(Hints::new());
    };
    let value: serde_json::Value =
        serde_json::from_str(raw).context("--hints is not valid JSON")?;
    if !value.is_object() {
        anyhow::bail!("--hints must be a JSON object");
    }
    Ok(Hints::from_value(value))
}
