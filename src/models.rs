use chrono::{DateTime, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};

fn default_port() -> u16 {
    22
}

/// Credential variant for a server profile. Exactly one of password or
/// key file is carried; the wire shape flattens to a `password` or
/// `key_file` field next to the other connection fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AuthMethod {
    Password { password: String },
    KeyFile { key_file: String },
}

/// A named remote-access definition. The profile id is not stored here:
/// it is the key the service files the profile under, derived from the
/// name via [`server_id_from_name`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServerProfile {
    pub name: String,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    #[serde(flatten)]
    pub auth: AuthMethod,
}

/// Derive the unique profile id the service uses: lowercased name with
/// whitespace runs collapsed to underscores.
pub fn server_id_from_name(name: &str) -> String {
    name.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("_")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }

    pub fn is_active(self) -> bool {
        matches!(self, JobStatus::Pending | JobStatus::Running)
    }
}

/// A torrent-creation job as the client knows it. Every field except the
/// id may be unset: a job first seen through a partial push delta carries
/// only what that delta contained.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    #[serde(default)]
    pub status: Option<JobStatus>,
    /// Percent complete, 0-100.
    #[serde(default)]
    pub progress: Option<u8>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    /// Weak reference to a server profile; may dangle after a removal.
    #[serde(default)]
    pub server_id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Partial job update pushed over the event channel. Absent fields mean
/// "unchanged", never "cleared".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JobDelta {
    pub task_id: String,
    #[serde(default)]
    pub status: Option<JobStatus>,
    #[serde(default)]
    pub progress: Option<u8>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub server_id: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Resource usage reported by the service. Doubles as the push-delta
/// shape: absent fields are merged over, not cleared. The active job
/// count the dashboard shows next to these is derived from the job set
/// and never transmitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemMetrics {
    #[serde(default)]
    pub cpu_percent: Option<f32>,
    #[serde(default)]
    pub memory_percent: Option<f32>,
    #[serde(default)]
    pub disk_percent: Option<f32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Video,
    Subtitle,
    #[default]
    Other,
}

/// Season/episode metadata the service parses out of media file names.
/// Display-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeInfo {
    pub season: u32,
    pub episode: u32,
    /// Normalized label, e.g. `S01E05`.
    pub format: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    pub name: String,
    /// Absolute, '/'-rooted path on the remote server.
    pub full_path: String,
    pub is_directory: bool,
    /// Meaningful only for files; directories come back as `other`.
    #[serde(default)]
    pub file_type: FileType,
    /// Size in bytes; 0 for directories.
    #[serde(default)]
    pub size: u64,
    #[serde(default)]
    pub episode_info: Option<EpisodeInfo>,
}

/// Aggregate statistics for one directory. `total_size` is the
/// human-readable string the service produces (it shells out to `du -sh`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryStats {
    pub file_count: u64,
    pub dir_count: u64,
    pub video_count: u64,
    pub total_size: String,
}

/// Parameters for a new torrent-creation job. The service expects this
/// body in camelCase, unlike every other call.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSpec {
    pub source_path: String,
    pub output_path: String,
    pub tracker_urls: Vec<String>,
    pub piece_size: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server_id: Option<String>,
    pub is_private: bool,
    pub comment: String,
}

/// Format a byte count the way the dashboard does: binary units, up to
/// two decimals, trailing zeros trimmed.
pub fn format_size(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    if bytes == 0 {
        return "0 B".to_string();
    }
    let exp = ((bytes as f64).ln() / 1024f64.ln()).floor() as usize;
    let exp = exp.min(UNITS.len() - 1);
    let value = bytes as f64 / 1024f64.powi(exp as i32);
    let mut s = format!("{value:.2}");
    while s.ends_with('0') {
        s.pop();
    }
    if s.ends_with('.') {
        s.pop();
    }
    format!("{} {}", s, UNITS[exp])
}

// The service emits both RFC 3339 and zone-less isoformat timestamps;
// zone-less values are taken as UTC.
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(s) => parse_timestamp(&s)
            .map(Some)
            .map_err(serde::de::Error::custom),
    }
}

fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
                .map(|naive| Utc.from_utc_datetime(&naive))
        })
}
