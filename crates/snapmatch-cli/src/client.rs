//! Thin HTTP client for the snapmatchd API.

use anyhow::{bail, Context, Result};
use reqwest::multipart::{Form, Part};
use reqwest::{Method, RequestBuilder, Response};
use serde::Serialize;
use serde_json::Value;
use std::path::Path;

const EMAIL_HEADER: &str = "x-user-email";
const NAME_HEADER: &str = "x-user-name";
const ROLE_HEADER: &str = "x-user-role";

/// Identity forwarded to the daemon on every request.
#[derive(Debug, Clone, Default)]
pub struct Caller {
    pub email: Option<String>,
    pub name: Option<String>,
    pub role: Option<String>,
}

pub struct Client {
    http: reqwest::Client,
    base: String,
    caller: Caller,
}

impl Client {
    pub fn new(server: &str, caller: Caller) -> Self {
        Self {
            http: reqwest::Client::new(),
            base: server.trim_end_matches('/').to_string(),
            caller,
        }
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let mut req = self.http.request(method, format!("{}{path}", self.base));
        for (header, value) in [
            (EMAIL_HEADER, &self.caller.email),
            (NAME_HEADER, &self.caller.name),
            (ROLE_HEADER, &self.caller.role),
        ] {
            if let Some(value) = value {
                req = req.header(header, value);
            }
        }
        req
    }

    pub async fn get_json(&self, path: &str) -> Result<Value> {
        json(self.request(Method::GET, path)).await
    }

    pub async fn post_json<T: Serialize>(&self, path: &str, body: &T) -> Result<Value> {
        json(self.request(Method::POST, path).json(body)).await
    }

    pub async fn post_empty(&self, path: &str) -> Result<Value> {
        json(self.request(Method::POST, path)).await
    }

    pub async fn get_bytes(&self, path: &str) -> Result<Vec<u8>> {
        let resp = checked(self.request(Method::GET, path)).await?;
        Ok(resp.bytes().await?.to_vec())
    }

    /// Upload `files` as one multipart request, each under `field`.
    pub async fn upload(&self, path: &str, field: &str, files: &[impl AsRef<Path>]) -> Result<Value> {
        let mut form = Form::new();
        for file in files {
            form = form.part(field.to_string(), file_part(file.as_ref()).await?);
        }
        json(self.request(Method::POST, path).multipart(form)).await
    }
}

async fn file_part(path: &Path) -> Result<Part> {
    let data = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());
    Ok(Part::bytes(data)
        .file_name(name)
        .mime_str(&content_type_for(path))?)
}

/// Content type guessed from the file extension.
pub fn content_type_for(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

async fn checked(req: RequestBuilder) -> Result<Response> {
    let resp = req.send().await.context("failed to reach snapmatchd")?;
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body: Value = resp.json().await.unwrap_or(Value::Null);
    match body.get("error").and_then(Value::as_str) {
        Some(message) => bail!("{message} ({status})"),
        None => bail!("request failed ({status})"),
    }
}

async fn json(req: RequestBuilder) -> Result<Value> {
    let resp = checked(req).await?;
    Ok(resp.json().await?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_content_type_from_extension() {
        assert_eq!(content_type_for(Path::new("party/a.JPG")), "image/jpeg");
        assert_eq!(content_type_for(Path::new("me.png")), "image/png");
        assert_eq!(
            content_type_for(Path::new("notes")),
            "application/octet-stream"
        );
    }

    #[test]
    fn test_base_trailing_slash_trimmed() {
        let client = Client::new("http://localhost:8080/", Caller::default());
        assert_eq!(client.base, "http://localhost:8080");
    }
}
