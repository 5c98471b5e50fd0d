//! Drive API client with request/response handling.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, CONTENT_DISPOSITION, CONTENT_TYPE, COOKIE};
use reqwest::multipart::{Form, Part};
use reqwest::{RequestBuilder, Response, Url};
use tracing::debug;

use super::error::{status_error, StatusKind};
use super::types::{Credentials, ListFilesResponse, ListedFile};
use crate::config::ClientConfig;
use crate::error::{DriveError, Result};
use crate::fs::path::{drive_segments, join_path};
use crate::http::HttpClient;
use crate::session::token::{SessionToken, SESSION_COOKIE};

/// Message the backend returns with a 404 for an empty directory.
const EMPTY_DIRECTORY: &str = "Directory is empty";

/// Drive API client.
///
/// Holds the backend URL and the current session token, and turns each
/// backend endpoint into a typed call.
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: HttpClient,
    base_url: Url,
    token: Option<SessionToken>,
    session_ttl: Duration,
}

impl ApiClient {
    /// Create a new API client for the backend described by `config`.
    pub fn new(config: &ClientConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| DriveError::Custom(format!("Invalid base URL {}: {}", config.base_url, e)))?;
        if base_url.cannot_be_a_base() {
            return Err(DriveError::Custom(format!(
                "Invalid base URL: {}",
                config.base_url
            )));
        }
        Ok(Self {
            http: HttpClient::from_config(config)?,
            base_url,
            token: None,
            session_ttl: config.session_ttl,
        })
    }

    /// Set the session token for authenticated requests.
    pub fn set_token(&mut self, token: SessionToken) {
        self.token = Some(token);
    }

    /// Clear the session token.
    pub fn clear_token(&mut self) {
        self.token = None;
    }

    /// Get the current session token, if any.
    pub fn token(&self) -> Option<&SessionToken> {
        self.token.as_ref()
    }

    pub fn has_token(&self) -> bool {
        self.token.is_some()
    }

    /// `POST /signin`. Stores and returns the issued token.
    pub async fn signin(&mut self, creds: &Credentials) -> Result<SessionToken> {
        let url = self.endpoint(&["signin"])?;
        debug!("POST {}", url);
        let response = self.http.send(self.http.post(url.as_str()).json(creds)).await?;
        let status = response.status().as_u16();

        if StatusKind::from(status) == StatusKind::Unauthorized {
            return Err(DriveError::InvalidCredentials);
        }
        if !StatusKind::from(status).is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, &body, &creds.username));
        }

        let token = self
            .token_from_response(&response)
            .ok_or(DriveError::InvalidResponse)?;
        self.token = Some(token.clone());
        Ok(token)
    }

    /// `POST /signup`.
    pub async fn signup(&mut self, creds: &Credentials) -> Result<()> {
        let url = self.endpoint(&["signup"])?;
        debug!("POST {}", url);
        let response = self.http.send(self.http.post(url.as_str()).json(creds)).await?;
        let status = response.status().as_u16();

        match StatusKind::from(status) {
            StatusKind::Success => Ok(()),
            StatusKind::Conflict => Err(DriveError::UsernameTaken),
            _ => {
                let body = response.text().await.unwrap_or_default();
                Err(status_error(status, &body, &creds.username))
            }
        }
    }

    /// `POST /refresh`. Swaps the held token for a fresh one.
    ///
    /// A 401 drops the held token.
    pub async fn refresh(&mut self) -> Result<SessionToken> {
        let url = self.endpoint(&["refresh"])?;
        debug!("POST {}", url);
        let request = self.authed(self.http.post(url.as_str()))?;
        let response = self.checked(request, "refresh").await?;

        let token = self
            .token_from_response(&response)
            .ok_or(DriveError::InvalidResponse)?;
        self.token = Some(token.clone());
        Ok(token)
    }

    /// `POST /logout`. The token is dropped locally even if the call fails.
    pub async fn logout(&mut self) -> Result<()> {
        let Some(token) = self.token.take() else {
            return Ok(());
        };
        let url = self.endpoint(&["logout"])?;
        debug!("POST {}", url);
        let request = self
            .http
            .post(url.as_str())
            .header(COOKIE, token.cookie_header());
        let response = self.http.send(request).await?;
        let status = response.status().as_u16();

        match StatusKind::from(status) {
            StatusKind::Success | StatusKind::Unauthorized => Ok(()),
            _ => {
                let body = response.text().await.unwrap_or_default();
                Err(status_error(status, &body, "logout"))
            }
        }
    }

    /// `GET /drive/{dir}`: one level of directory listing.
    pub async fn list_dir(&mut self, dir: &str) -> Result<Vec<ListedFile>> {
        let url = self.drive_url(dir)?;
        debug!("GET {}", url);
        let request = self.authed(self.http.get(url.as_str()))?;
        let response = self.http.send(request).await?;
        let status = response.status().as_u16();

        if StatusKind::from(status) == StatusKind::NotFound {
            let body = response.text().await.unwrap_or_default();
            if super::error::error_message(status, &body) == EMPTY_DIRECTORY {
                return Ok(Vec::new());
            }
            return Err(DriveError::NotFound(dir.to_string()));
        }
        let response = self.check_status(response, dir).await?;

        if !is_listing(&response) {
            return Err(DriveError::InvalidPath(format!("{} is not a directory", dir)));
        }
        let body = response.text().await?;
        let listing: ListFilesResponse = serde_json::from_str(&body)?;
        debug!("listed {} entries in /{}", listing.files.len(), dir);
        Ok(listing.files)
    }

    /// `POST /drive/{dir}/{name}` without a body: create a directory.
    pub async fn create_dir(&mut self, dir: &str, name: &str) -> Result<()> {
        let path = join_path(dir, name);
        let url = self.drive_url(&path)?;
        debug!("POST {} (mkdir)", url);
        let request = self.authed(self.http.post(url.as_str()))?;
        self.checked(request, &path).await?;
        Ok(())
    }

    /// `POST /drive/{dir}` with a multipart `file` part.
    pub async fn upload(&mut self, dir: &str, filename: &str, data: Vec<u8>) -> Result<()> {
        let request = self.upload_request(dir, filename, data)?;
        let response = self.http.send(request).await;
        self.finish_upload(response, dir, filename).await
    }

    /// Build the authenticated upload request without sending it, so the
    /// caller can drive the transfer itself.
    pub(crate) fn upload_request(
        &self,
        dir: &str,
        filename: &str,
        data: Vec<u8>,
    ) -> Result<RequestBuilder> {
        let url = self.drive_url(dir)?;
        debug!("POST {} (upload {} bytes as {})", url, data.len(), filename);
        let part = Part::bytes(data)
            .file_name(filename.to_string())
            .mime_str("application/octet-stream")?;
        let form = Form::new().part("file", part);
        self.authed(self.http.post(url.as_str()).multipart(form))
    }

    /// Check the response to a request from [`ApiClient::upload_request`].
    pub(crate) async fn finish_upload(
        &mut self,
        response: Result<Response>,
        dir: &str,
        filename: &str,
    ) -> Result<()> {
        self.check_status(response?, &join_path(dir, filename)).await?;
        Ok(())
    }

    pub(crate) fn http(&self) -> &HttpClient {
        &self.http
    }

    /// `GET /drive/{path}` for a file. The body is left unread for streaming.
    pub async fn download(&mut self, path: &str) -> Result<Response> {
        let url = self.drive_url(path)?;
        debug!("GET {} (download)", url);
        let request = self.authed(self.http.get(url.as_str()))?;
        let response = self.checked(request, path).await?;
        if is_listing(&response) {
            return Err(DriveError::InvalidPath(format!("{} is a directory", path)));
        }
        Ok(response)
    }

    /// `DELETE /drive/{path}`.
    pub async fn delete(&mut self, path: &str) -> Result<()> {
        if path.is_empty() {
            return Err(DriveError::InvalidPath("cannot delete the root".to_string()));
        }
        let url = self.drive_url(path)?;
        debug!("DELETE {}", url);
        let request = self.authed(self.http.delete(url.as_str()))?;
        self.checked(request, path).await?;
        Ok(())
    }

    /// Absolute URL of a drive path, for opening a file outside the client.
    pub fn download_url(&self, path: &str) -> Result<String> {
        Ok(self.drive_url(path)?.to_string())
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| DriveError::Custom(format!("Invalid base URL: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn drive_url(&self, path: &str) -> Result<Url> {
        self.endpoint(&drive_segments(path))
    }

    fn authed(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        let token = self.token.as_ref().ok_or(DriveError::Unauthorized)?;
        Ok(request.header(COOKIE, token.cookie_header()))
    }

    /// Send an authenticated request and map any non-success status.
    async fn checked(&mut self, request: RequestBuilder, subject: &str) -> Result<Response> {
        let response = self.http.send(request).await?;
        self.check_status(response, subject).await
    }

    async fn check_status(&mut self, response: Response, subject: &str) -> Result<Response> {
        let status = response.status().as_u16();
        if StatusKind::from(status).is_success() {
            return Ok(response);
        }
        if StatusKind::from(status) == StatusKind::Unauthorized {
            self.token = None;
        }
        let body = response.text().await.unwrap_or_default();
        Err(status_error(status, &body, subject))
    }

    fn token_from_response(&self, response: &Response) -> Option<SessionToken> {
        response
            .cookies()
            .find(|c| c.name() == SESSION_COOKIE && !c.value().is_empty())
            .map(|c| SessionToken::new(c.value(), c.expires(), self.session_ttl))
    }
}

/// Whether a `/drive` response is a directory listing rather than file
/// content. Files always carry `Content-Disposition`, whatever their type.
fn is_listing(response: &Response) -> bool {
    listing_headers(response.headers())
}

fn listing_headers(headers: &HeaderMap) -> bool {
    if headers.contains_key(CONTENT_DISPOSITION) {
        return false;
    }
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| v.contains("application/json"))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ApiClient {
        ApiClient::new(&ClientConfig::new("http://127.0.0.1:8000")).unwrap()
    }

    #[test]
    fn test_client_creation() {
        let client = client();
        assert!(client.token().is_none());
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(ApiClient::new(&ClientConfig::new("not a url")).is_err());
        assert!(ApiClient::new(&ClientConfig::new("mailto:someone@example.com")).is_err());
    }

    #[test]
    fn test_token_management() {
        let mut client = client();
        assert!(!client.has_token());

        client.set_token(SessionToken::new("t1", None, Duration::from_secs(60)));
        assert_eq!(client.token().map(|t| t.value.as_str()), Some("t1"));

        client.clear_token();
        assert!(!client.has_token());
    }

    #[test]
    fn test_drive_urls_are_encoded() {
        let client = client();
        assert_eq!(
            client.download_url("").unwrap(),
            "http://127.0.0.1:8000/drive"
        );
        assert_eq!(
            client.download_url("docs/my file.txt").unwrap(),
            "http://127.0.0.1:8000/drive/docs/my%20file.txt"
        );
    }

    #[test]
    fn test_endpoint_with_base_path() {
        let client = ApiClient::new(&ClientConfig::new("http://host/api/")).unwrap();
        assert_eq!(
            client.endpoint(&["signin"]).unwrap().as_str(),
            "http://host/api/signin"
        );
    }

    #[test]
    fn test_listing_detection() {
        let mut listing = HeaderMap::new();
        listing.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        assert!(listing_headers(&listing));

        // A .json file is served as application/json but with a disposition.
        let mut json_file = listing.clone();
        json_file.insert(
            CONTENT_DISPOSITION,
            HeaderValue::from_static("inline; filename=data.json"),
        );
        assert!(!listing_headers(&json_file));

        let mut binary = HeaderMap::new();
        binary.insert(CONTENT_TYPE, HeaderValue::from_static("application/octet-stream"));
        assert!(!listing_headers(&binary));
    }

    #[tokio::test]
    async fn test_authed_calls_require_token() {
        let mut client = client();
        assert!(matches!(
            client.list_dir("").await,
            Err(DriveError::Unauthorized)
        ));
        assert!(matches!(
            client.refresh().await,
            Err(DriveError::Unauthorized)
        ));
        // Logging out without a token is a no-op.
        assert!(client.logout().await.is_ok());
    }
}
