//! Blocking HTTP client for the conversion service

use super::poller::StatusSource;
use super::wire::{ConvertRequest, ConvertResponse, JobResult, JobStatus};
use crate::error::NetworkError;
use reqwest::blocking::{multipart, Client, Response};
use std::path::Path;

pub struct ConversionClient {
    base_url: String,
    http: Client,
}

impl ConversionClient {
    pub fn new(base_url: &str) -> Result<Self, NetworkError> {
        let http = Client::builder().build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Resolve a service-relative download path against the base URL
    pub fn absolute_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            self.url(path)
        }
    }

    /// Non-2xx responses become [`NetworkError::Status`] carrying the body
    fn check(response: Response) -> Result<Response, NetworkError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().unwrap_or_default();
        Err(NetworkError::Status {
            status: status.as_u16(),
            body,
        })
    }

    /// `POST /api/convert` with the video as multipart field `file`
    pub fn submit(&self, video: &Path, request: &ConvertRequest) -> Result<ConvertResponse, NetworkError> {
        let form = multipart::Form::new()
            .text("style", request.style.as_str())
            .text("resolution", request.resolution.as_str())
            .file("file", video)
            .map_err(|e| NetworkError::Transport(format!("{}: {}", video.display(), e)))?;

        let response = self.http.post(self.url("/api/convert")).multipart(form).send()?;
        let accepted: ConvertResponse = Self::check(response)?.json()?;
        tracing::info!(
            job = %accepted.job_id,
            style = %request.style,
            resolution = %request.resolution,
            "submitted conversion job"
        );
        Ok(accepted)
    }

    /// `GET /api/status/{jobId}`
    pub fn status(&self, job_id: &str) -> Result<JobStatus, NetworkError> {
        let response = self.http.get(self.url(&format!("/api/status/{}", job_id))).send()?;
        Ok(Self::check(response)?.json()?)
    }

    /// `GET /api/result/{jobId}`; the service answers 409 until the job is done
    pub fn result(&self, job_id: &str) -> Result<JobResult, NetworkError> {
        let response = self.http.get(self.url(&format!("/api/result/{}", job_id))).send()?;
        Ok(Self::check(response)?.json()?)
    }
}

impl StatusSource for ConversionClient {
    fn fetch_status(&self, job_id: &str) -> Result<JobStatus, NetworkError> {
        self.status(job_id)
    }

    fn fetch_result(&self, job_id: &str) -> Result<JobResult, NetworkError> {
        self.result(job_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urls_join_without_double_slash() {
        let client = ConversionClient::new("http://localhost:7860/").unwrap();
        assert_eq!(client.base_url(), "http://localhost:7860");
        assert_eq!(client.url("/api/status/x"), "http://localhost:7860/api/status/x");
        assert_eq!(
            client.absolute_url("/download/x_out.mp4"),
            "http://localhost:7860/download/x_out.mp4"
        );
        assert_eq!(
            client.absolute_url("https://cdn.example.com/x.mp4"),
            "https://cdn.example.com/x.mp4"
        );
    }

    #[test]
    fn test_submit_missing_file_is_transport_error() {
        let client = ConversionClient::new("http://127.0.0.1:9").unwrap();
        let err = client
            .submit(Path::new("/definitely/missing/video.mp4"), &ConvertRequest::default())
            .unwrap_err();
        assert!(matches!(err, NetworkError::Transport(_)));
    }
}
