//! Request/response façade over the orchestration service's JSON API.
//!
//! Stateless: every call validates its inputs, issues exactly one HTTP
//! request and maps the response envelope to a value or a
//! [`ClientError`]. No retries here; retry policy belongs to the caller.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::ClientError;
use crate::models::{
    AuthMethod, DirectoryEntry, DirectoryStats, Job, JobSpec, ServerProfile, SystemMetrics,
};

/// The calls the core needs from the service. Implemented by
/// [`HttpGateway`] in production and by mocks in tests.
#[allow(async_fn_in_trait)]
pub trait Gateway {
    async fn get_system_metrics(&self) -> Result<SystemMetrics, ClientError>;
    async fn list_servers(&self) -> Result<HashMap<String, ServerProfile>, ClientError>;
    async fn save_server(&self, id: &str, profile: &ServerProfile) -> Result<(), ClientError>;
    async fn remove_server(&self, id: &str) -> Result<(), ClientError>;
    async fn test_connection(&self, profile: &ServerProfile) -> Result<(), ClientError>;
    async fn create_job(&self, spec: &JobSpec) -> Result<String, ClientError>;
    async fn get_job(&self, task_id: &str) -> Result<Job, ClientError>;
    async fn list_directory(
        &self,
        server_id: &str,
        path: &str,
    ) -> Result<Vec<DirectoryEntry>, ClientError>;
    async fn get_directory_stats(
        &self,
        server_id: &str,
        path: &str,
    ) -> Result<DirectoryStats, ClientError>;
}

/// Reject a profile before any network traffic happens.
pub fn validate_profile(profile: &ServerProfile) -> Result<(), ClientError> {
    if profile.name.trim().is_empty() {
        return Err(ClientError::Validation("server name is required".into()));
    }
    if profile.host.trim().is_empty() {
        return Err(ClientError::Validation("host is required".into()));
    }
    if profile.username.trim().is_empty() {
        return Err(ClientError::Validation("username is required".into()));
    }
    if profile.port == 0 {
        return Err(ClientError::Validation(
            "port must be a positive integer".into(),
        ));
    }
    match &profile.auth {
        AuthMethod::Password { password } if password.is_empty() => {
            Err(ClientError::Validation("password is required".into()))
        }
        AuthMethod::KeyFile { key_file } if key_file.trim().is_empty() => {
            Err(ClientError::Validation("key file path is required".into()))
        }
        _ => Ok(()),
    }
}

pub fn validate_job_spec(spec: &JobSpec) -> Result<(), ClientError> {
    if spec.source_path.trim().is_empty() {
        return Err(ClientError::Validation("source path is required".into()));
    }
    Ok(())
}

#[derive(Debug, Serialize)]
struct SaveServerRequest<'a> {
    id: &'a str,
    config: &'a ServerProfile,
}

#[derive(Debug, Serialize)]
struct TestConnectionRequest<'a> {
    host: &'a str,
    port: u16,
    username: &'a str,
    #[serde(flatten)]
    auth: &'a AuthMethod,
}

#[derive(Debug, Serialize)]
struct BrowseRequest<'a> {
    server_id: &'a str,
    path: &'a str,
}

#[derive(Debug, Deserialize)]
struct AckResponse {
    success: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SystemResponse {
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    system: Option<SystemMetrics>,
}

#[derive(Debug, Deserialize)]
struct ServersResponse {
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    servers: Option<HashMap<String, ServerProfile>>,
}

#[derive(Debug, Deserialize)]
struct CreateJobResponse {
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    task_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JobResponse {
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    task: Option<Job>,
}

#[derive(Debug, Deserialize)]
struct BrowseResponse {
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    files: Option<Vec<DirectoryEntry>>,
}

#[derive(Debug, Deserialize)]
struct StatsResponse {
    success: bool,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    file_count: Option<u64>,
    #[serde(default)]
    dir_count: Option<u64>,
    #[serde(default)]
    video_count: Option<u64>,
    #[serde(default)]
    total_size: Option<String>,
}

fn check(what: &str, success: bool, error: Option<String>) -> Result<(), ClientError> {
    if success {
        return Ok(());
    }
    Err(ClientError::Backend(
        error.unwrap_or_else(|| format!("{what} failed")),
    ))
}

fn malformed(what: &str) -> ClientError {
    ClientError::Backend(format!("{what}: malformed response"))
}

/// Production gateway speaking to the service over HTTP.
#[derive(Debug, Clone)]
pub struct HttpGateway {
    base_url: String,
    http: reqwest::Client,
}

impl HttpGateway {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            http: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // Parses the body even on error statuses: the service reports
    // failures as `{success: false, error}` with a 4xx/5xx code.
    async fn fetch<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        what: &str,
    ) -> Result<T, ClientError> {
        let response = request.send().await?;
        let status = response.status();
        match response.json::<T>().await {
            Ok(body) => Ok(body),
            Err(_) if !status.is_success() => Err(ClientError::Backend(format!(
                "{what}: service returned {status}"
            ))),
            Err(err) => Err(ClientError::Transport(err)),
        }
    }
}

impl Gateway for HttpGateway {
    async fn get_system_metrics(&self) -> Result<SystemMetrics, ClientError> {
        let what = "system metrics";
        let body: SystemResponse = self
            .fetch(self.http.get(self.url("/api/system")), what)
            .await?;
        check(what, body.success, body.error)?;
        body.system.ok_or_else(|| malformed(what))
    }

    async fn list_servers(&self) -> Result<HashMap<String, ServerProfile>, ClientError> {
        let what = "list servers";
        let body: ServersResponse = self
            .fetch(self.http.get(self.url("/api/servers")), what)
            .await?;
        check(what, body.success, body.error)?;
        body.servers.ok_or_else(|| malformed(what))
    }

    async fn save_server(&self, id: &str, profile: &ServerProfile) -> Result<(), ClientError> {
        validate_profile(profile)?;
        let what = "save server";
        let request = self
            .http
            .post(self.url("/api/servers"))
            .json(&SaveServerRequest {
                id,
                config: profile,
            });
        let body: AckResponse = self.fetch(request, what).await?;
        check(what, body.success, body.error)
    }

    async fn remove_server(&self, id: &str) -> Result<(), ClientError> {
        if id.trim().is_empty() {
            return Err(ClientError::Validation("server id is required".into()));
        }
        let what = "remove server";
        let request = self.http.delete(self.url(&format!("/api/servers/{id}")));
        let body: AckResponse = self.fetch(request, what).await?;
        check(what, body.success, body.error)
    }

    async fn test_connection(&self, profile: &ServerProfile) -> Result<(), ClientError> {
        validate_profile(profile)?;
        let what = "connection test";
        let request = self
            .http
            .post(self.url("/api/servers/test"))
            .json(&TestConnectionRequest {
                host: &profile.host,
                port: profile.port,
                username: &profile.username,
                auth: &profile.auth,
            });
        let body: AckResponse = self.fetch(request, what).await?;
        check(what, body.success, body.error)
    }

    async fn create_job(&self, spec: &JobSpec) -> Result<String, ClientError> {
        validate_job_spec(spec)?;
        let what = "create job";
        let request = self.http.post(self.url("/api/tasks")).json(spec);
        let body: CreateJobResponse = self.fetch(request, what).await?;
        check(what, body.success, body.error)?;
        body.task_id.ok_or_else(|| malformed(what))
    }

    async fn get_job(&self, task_id: &str) -> Result<Job, ClientError> {
        let what = "get job";
        let request = self.http.get(self.url(&format!("/api/tasks/{task_id}")));
        let body: JobResponse = self.fetch(request, what).await?;
        check(what, body.success, body.error)?;
        body.task.ok_or_else(|| malformed(what))
    }

    async fn list_directory(
        &self,
        server_id: &str,
        path: &str,
    ) -> Result<Vec<DirectoryEntry>, ClientError> {
        if server_id.trim().is_empty() {
            return Err(ClientError::Validation("server id is required".into()));
        }
        let what = "list directory";
        let request = self
            .http
            .post(self.url("/api/browse"))
            .json(&BrowseRequest { server_id, path });
        let body: BrowseResponse = self.fetch(request, what).await?;
        check(what, body.success, body.error)?;
        body.files.ok_or_else(|| malformed(what))
    }

    async fn get_directory_stats(
        &self,
        server_id: &str,
        path: &str,
    ) -> Result<DirectoryStats, ClientError> {
        if server_id.trim().is_empty() {
            return Err(ClientError::Validation("server id is required".into()));
        }
        let what = "directory stats";
        let request = self
            .http
            .post(self.url("/api/directory-stats"))
            .json(&BrowseRequest { server_id, path });
        let body: StatsResponse = self.fetch(request, what).await?;
        check(what, body.success, body.error)?;
        match (
            body.file_count,
            body.dir_count,
            body.video_count,
            body.total_size,
        ) {
            (Some(file_count), Some(dir_count), Some(video_count), Some(total_size)) => {
                Ok(DirectoryStats {
                    file_count,
                    dir_count,
                    video_count,
                    total_size,
                })
            }
            _ => Err(malformed(what)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::JobStatus;
    use serde_json::json;

    fn profile() -> ServerProfile {
        ServerProfile {
            name: "My Seedbox".into(),
            host: "10.0.0.2".into(),
            port: 22,
            username: "seed".into(),
            auth: AuthMethod::Password {
                password: "hunter2".into(),
            },
        }
    }

    #[test]
    fn profile_validation_requires_core_fields() {
        let mut p = profile();
        p.name = " ".into();
        assert!(matches!(
            validate_profile(&p),
            Err(ClientError::Validation(_))
        ));

        let mut p = profile();
        p.host.clear();
        assert!(validate_profile(&p).is_err());

        let mut p = profile();
        p.username.clear();
        assert!(validate_profile(&p).is_err());

        assert!(validate_profile(&profile()).is_ok());
    }

    #[test]
    fn profile_validation_checks_the_declared_auth_variant() {
        let mut p = profile();
        p.auth = AuthMethod::Password {
            password: String::new(),
        };
        assert!(validate_profile(&p).is_err());

        p.auth = AuthMethod::KeyFile {
            key_file: String::new(),
        };
        assert!(validate_profile(&p).is_err());

        p.auth = AuthMethod::KeyFile {
            key_file: "/home/seed/.ssh/id_ed25519".into(),
        };
        assert!(validate_profile(&p).is_ok());
    }

    #[test]
    fn profile_validation_rejects_port_zero() {
        let mut p = profile();
        p.port = 0;
        assert!(validate_profile(&p).is_err());
    }

    #[test]
    fn job_spec_validation_requires_a_source_path() {
        let spec = JobSpec::default();
        assert!(matches!(
            validate_job_spec(&spec),
            Err(ClientError::Validation(_))
        ));
        let spec = JobSpec {
            source_path: "/data/show".into(),
            ..JobSpec::default()
        };
        assert!(validate_job_spec(&spec).is_ok());
    }

    #[test]
    fn save_request_nests_the_profile_under_config() {
        let p = profile();
        let value = serde_json::to_value(SaveServerRequest {
            id: "my_seedbox",
            config: &p,
        })
        .unwrap();
        assert_eq!(value["id"], "my_seedbox");
        assert_eq!(value["config"]["host"], "10.0.0.2");
        assert_eq!(value["config"]["password"], "hunter2");
    }

    #[test]
    fn test_connection_request_carries_no_name() {
        let p = profile();
        let value = serde_json::to_value(TestConnectionRequest {
            host: &p.host,
            port: p.port,
            username: &p.username,
            auth: &p.auth,
        })
        .unwrap();
        assert!(value.get("name").is_none());
        assert_eq!(value["port"], 22);
        assert_eq!(value["password"], "hunter2");
    }

    #[test]
    fn servers_response_parses_the_id_keyed_map() {
        let body: ServersResponse = serde_json::from_value(json!({
            "success": true,
            "servers": {
                "box": {"name": "Box", "host": "10.0.0.2", "username": "seed", "key_file": "/k"}
            }
        }))
        .unwrap();
        let servers = body.servers.unwrap();
        assert_eq!(servers["box"].port, 22);
        assert_eq!(
            servers["box"].auth,
            AuthMethod::KeyFile { key_file: "/k".into() }
        );
    }

    #[test]
    fn job_response_parses_the_task_record() {
        let body: JobResponse = serde_json::from_value(json!({
            "success": true,
            "task": {
                "id": "task_1",
                "status": "running",
                "progress": 30,
                "created_at": "2025-06-01T10:20:30.123456",
                "server_id": "box",
                "output": []
            }
        }))
        .unwrap();
        let job = body.task.unwrap();
        assert_eq!(job.status, Some(JobStatus::Running));
        assert_eq!(job.progress, Some(30));
        assert!(job.created_at.is_some());
    }

    #[test]
    fn failure_envelope_maps_to_backend_error() {
        let err = check("list directory", false, Some("目录不存在或无权限访问".into()))
            .unwrap_err();
        assert!(matches!(err, ClientError::Backend(ref m) if m.contains("目录")));

        let err = check("list directory", false, None).unwrap_err();
        assert!(matches!(err, ClientError::Backend(ref m) if m.contains("list directory")));
    }
}
