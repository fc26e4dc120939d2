use anyhow::{bail, Context, Result};
use serde_json::Value;

/// How the caller wants the response body decoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decode {
    Json,
    Html,
}

/// A decoded response body, tagged by shape.
#[derive(Debug)]
pub enum Payload {
    Json(Value),
    Html(String),
}

impl Payload {
    pub fn into_json(self) -> Result<Value> {
        match self {
            Payload::Json(v) => Ok(v),
            Payload::Html(_) => bail!("expected a JSON response, got HTML"),
        }
    }

    pub fn into_html(self) -> Result<String> {
        match self {
            Payload::Html(s) => Ok(s),
            Payload::Json(_) => bail!("expected an HTML response, got JSON"),
        }
    }
}

pub struct Client {
    http: reqwest::Client,
}

impl Client {
    pub fn new() -> Self {
        Self {
            http: reqwest::Client::new(),
        }
    }

    /// Issue a GET and decode the body per `decode`. Non-2xx statuses and
    /// malformed JSON are errors; no retries.
    pub async fn request(
        &self,
        url: &str,
        params: &[(&str, &str)],
        decode: Decode,
    ) -> Result<Payload> {
        let body = self
            .http
            .get(url)
            .query(params)
            .send()
            .await
            .with_context(|| format!("GET {} failed", url))?
            .error_for_status()?
            .text()
            .await
            .with_context(|| format!("failed to read response body from {}", url))?;

        match decode {
            Decode::Json => {
                let value = serde_json::from_str(&body)
                    .with_context(|| format!("invalid JSON from {}", url))?;
                Ok(Payload::Json(value))
            }
            Decode::Html => Ok(Payload::Html(body)),
        }
    }
}
