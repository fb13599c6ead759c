//! The owned application context: one gateway, one reconciler, one
//! navigator, no globals. The presentation layer holds a `Client`,
//! dispatches user intents through its methods and re-reads the views
//! after every call; state is never cached on the presentation side.
//!
//! Everything runs on one logical thread; completions interleave only
//! at await points, and late responses are ignored via the navigator's
//! ticket checks rather than cancelled.

use std::collections::HashMap;

use crate::error::ClientError;
use crate::events::{ChannelEvent, ChannelStatus};
use crate::gateway::Gateway;
use crate::models::{
    server_id_from_name, DirectoryEntry, Job, JobSpec, ServerProfile, SystemMetrics,
};
use crate::navigator::{ListingRequest, Navigator};
use crate::reconciler::Reconciler;

/// Proof that the collaborator ran its confirmation step. Destructive
/// calls demand one so a stray intent cannot remove a profile.
#[derive(Debug, Clone, Copy)]
pub struct Confirmed;

#[derive(Debug)]
pub struct Client<G> {
    gateway: G,
    reconciler: Reconciler,
    navigator: Navigator,
}

impl<G: Gateway> Client<G> {
    pub fn new(gateway: G) -> Self {
        Self {
            gateway,
            reconciler: Reconciler::new(),
            navigator: Navigator::new(),
        }
    }

    // --- snapshot pulls ---------------------------------------------------

    /// Pull the authoritative profile list. On failure the previous
    /// snapshot stays untouched.
    pub async fn refresh_servers(&mut self) -> Result<(), ClientError> {
        let servers = self.gateway.list_servers().await?;
        self.reconciler.replace_servers(servers);
        Ok(())
    }

    pub async fn refresh_metrics(&mut self) -> Result<(), ClientError> {
        let metrics = self.gateway.get_system_metrics().await?;
        self.reconciler.replace_metrics(metrics);
        Ok(())
    }

    // --- server profile CRUD ----------------------------------------------

    /// Save a profile under the id derived from its name, then reload
    /// the list so the view reflects what the service actually stored.
    /// Returns the id.
    pub async fn save_server(&mut self, profile: &ServerProfile) -> Result<String, ClientError> {
        let id = server_id_from_name(&profile.name);
        self.gateway.save_server(&id, profile).await?;
        self.refresh_servers().await?;
        Ok(id)
    }

    pub async fn remove_server(
        &mut self,
        id: &str,
        _confirmed: Confirmed,
    ) -> Result<(), ClientError> {
        self.gateway.remove_server(id).await?;
        self.refresh_servers().await
    }

    pub async fn test_connection(&self, profile: &ServerProfile) -> Result<(), ClientError> {
        self.gateway.test_connection(profile).await
    }

    // --- jobs --------------------------------------------------------------

    /// Create a job and return its id. The record itself is seeded from
    /// a follow-up pull when the service answers it; otherwise the first
    /// pushed delta creates it.
    pub async fn create_job(&mut self, spec: &JobSpec) -> Result<String, ClientError> {
        let task_id = self.gateway.create_job(spec).await?;
        match self.gateway.get_job(&task_id).await {
            Ok(job) => self.reconciler.insert_job(job),
            Err(err) => tracing::debug!("Job {task_id} not yet readable: {err}"),
        }
        Ok(task_id)
    }

    // --- remote navigation --------------------------------------------------

    pub async fn select_server(&mut self, server_id: &str) -> Result<(), ClientError> {
        let request = self.navigator.select_server(server_id);
        self.complete_navigation(request).await
    }

    pub async fn navigate(&mut self, path: &str) -> Result<(), ClientError> {
        let request = self.navigator.begin_navigate(path)?;
        self.complete_navigation(request).await
    }

    pub async fn enter_directory(&mut self, entry: &DirectoryEntry) -> Result<(), ClientError> {
        let request = self.navigator.enter_directory(entry)?;
        self.complete_navigation(request).await
    }

    pub async fn go_parent(&mut self) -> Result<(), ClientError> {
        match self.navigator.go_parent() {
            Some(request) => self.complete_navigation(request).await,
            None => Ok(()),
        }
    }

    async fn complete_navigation(&mut self, request: ListingRequest) -> Result<(), ClientError> {
        let outcome = self
            .gateway
            .list_directory(&request.server_id, &request.path)
            .await;
        if let Some(stats_request) = self.navigator.apply_listing(&request, outcome)? {
            // Stats are best-effort decoration; a failure here does not
            // degrade the listing that already applied.
            match self
                .gateway
                .get_directory_stats(&stats_request.server_id, &stats_request.path)
                .await
            {
                Ok(stats) => self.navigator.apply_stats(&stats_request, stats),
                Err(err) => {
                    tracing::debug!("Directory stats unavailable for {}: {err}", stats_request.path)
                }
            }
        }
        Ok(())
    }

    pub fn select_file(&mut self, entry: &DirectoryEntry) -> Result<(), ClientError> {
        self.navigator.select_file(entry)
    }

    /// The chosen source path for job creation.
    pub fn confirm_selection(&self) -> Result<String, ClientError> {
        self.navigator.confirm_selection()
    }

    // --- event channel -----------------------------------------------------

    /// Merge one event channel delivery into the model. A fresh
    /// connection means an unknown gap, so full snapshots are re-pulled
    /// rather than assuming continuity.
    pub async fn handle_event(&mut self, event: ChannelEvent) -> Result<(), ClientError> {
        match event {
            ChannelEvent::Job(delta) => {
                self.reconciler.apply_job_delta(delta);
                Ok(())
            }
            ChannelEvent::Metrics(delta) => {
                self.reconciler.apply_metrics_delta(delta);
                Ok(())
            }
            ChannelEvent::Status(ChannelStatus::Connected) => {
                self.refresh_servers().await?;
                self.refresh_metrics().await
            }
            ChannelEvent::Status(_) => Ok(()),
        }
    }

    // --- read-only views ----------------------------------------------------

    pub fn servers(&self) -> &HashMap<String, ServerProfile> {
        self.reconciler.servers()
    }

    pub fn jobs(&self) -> &HashMap<String, Job> {
        self.reconciler.jobs()
    }

    pub fn metrics(&self) -> &SystemMetrics {
        self.reconciler.metrics()
    }

    pub fn active_job_count(&self) -> usize {
        self.reconciler.active_job_count()
    }

    pub fn navigator(&self) -> &Navigator {
        &self.navigator
    }
}
