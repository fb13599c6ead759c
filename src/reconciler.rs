//! One authoritative in-memory snapshot of the service's state.
//!
//! Two producers feed it: gateway pulls (full replacements) and event
//! channel pushes (partial deltas). Completion order between the two is
//! not guaranteed; whichever lands last wins. A failed pull must never
//! reach this module: callers keep the previous snapshot by simply not
//! applying anything.

use std::collections::HashMap;

use crate::models::{Job, JobDelta, ServerProfile, SystemMetrics};

#[derive(Debug, Default)]
pub struct Reconciler {
    servers: HashMap<String, ServerProfile>,
    jobs: HashMap<String, Job>,
    metrics: SystemMetrics,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomic full replacement of the profile set. Used after every CRUD
    /// call resolves, so the view always reflects the service's list
    /// rather than a locally predicted one.
    pub fn replace_servers(&mut self, servers: HashMap<String, ServerProfile>) {
        self.servers = servers;
    }

    /// Upsert from a push delta: unknown jobs are created from whatever
    /// fields the delta carried, known jobs get a field-wise shallow
    /// merge. A field absent from the delta is left as it was.
    pub fn apply_job_delta(&mut self, delta: JobDelta) {
        let job = self
            .jobs
            .entry(delta.task_id.clone())
            .or_insert_with(|| Job {
                id: delta.task_id.clone(),
                ..Job::default()
            });
        if let Some(status) = delta.status {
            job.status = Some(status);
        }
        if let Some(progress) = delta.progress {
            job.progress = Some(progress);
        }
        if let Some(created_at) = delta.created_at {
            job.created_at = Some(created_at);
        }
        if let Some(server_id) = delta.server_id {
            job.server_id = Some(server_id);
        }
        if let Some(error) = delta.error {
            job.error = Some(error);
        }
    }

    /// Full job record from a pull; supersedes whatever deltas built up.
    pub fn insert_job(&mut self, job: Job) {
        self.jobs.insert(job.id.clone(), job);
    }

    pub fn apply_metrics_delta(&mut self, delta: SystemMetrics) {
        if delta.cpu_percent.is_some() {
            self.metrics.cpu_percent = delta.cpu_percent;
        }
        if delta.memory_percent.is_some() {
            self.metrics.memory_percent = delta.memory_percent;
        }
        if delta.disk_percent.is_some() {
            self.metrics.disk_percent = delta.disk_percent;
        }
    }

    pub fn replace_metrics(&mut self, metrics: SystemMetrics) {
        self.metrics = metrics;
    }

    /// Derived on demand from the job set, never stored, so it cannot
    /// drift from the jobs it summarizes.
    pub fn active_job_count(&self) -> usize {
        self.jobs
            .values()
            .filter(|job| job.status.is_some_and(|s| s.is_active()))
            .count()
    }

    pub fn servers(&self) -> &HashMap<String, ServerProfile> {
        &self.servers
    }

    pub fn jobs(&self) -> &HashMap<String, Job> {
        &self.jobs
    }

    pub fn metrics(&self) -> &SystemMetrics {
        &self.metrics
    }
}
