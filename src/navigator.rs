//! Stateful remote directory browsing, one tree at a time.
//!
//! The navigator is a plain state machine: it never performs I/O itself.
//! Starting a navigation hands back a [`ListingRequest`] ticket for the
//! caller to resolve against the gateway; the matching `apply_*` call
//! feeds the outcome back in. Tickets are how interleaved completions
//! stay safe: a response whose ticket no longer matches current state
//! is discarded, not applied (there is no cancellation, only ignoring
//! late arrivals).

use crate::error::ClientError;
use crate::models::{DirectoryEntry, DirectoryStats};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavPhase {
    /// No server selected yet.
    Idle,
    /// A directory listing is in flight.
    Listing,
    /// Entries populated.
    Ready,
    /// A file is chosen within the current listing.
    Selecting,
    /// The last listing failed; previous path kept, entries empty.
    Error,
}

/// Ticket for an in-flight directory listing. The generation counter
/// pins it to the navigation that issued it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingRequest {
    pub server_id: String,
    pub path: String,
    generation: u64,
}

/// Ticket for an in-flight directory-stats call, checked against the
/// path that is current when the response arrives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatsRequest {
    pub server_id: String,
    pub path: String,
}

/// One breadcrumb segment. The final crumb of a trail represents
/// "here" and is not navigable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Crumb {
    pub label: String,
    pub path: String,
    pub navigable: bool,
}

#[derive(Debug)]
pub struct Navigator {
    phase: NavPhase,
    server_id: Option<String>,
    current_path: String,
    entries: Vec<DirectoryEntry>,
    selected_path: Option<String>,
    stats: Option<DirectoryStats>,
    generation: u64,
}

impl Default for Navigator {
    fn default() -> Self {
        Self {
            phase: NavPhase::Idle,
            server_id: None,
            current_path: "/".to_string(),
            entries: Vec::new(),
            selected_path: None,
            stats: None,
            generation: 0,
        }
    }
}

impl Navigator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset to the root of a (possibly different) server. Always
    /// starts a listing of `/`.
    pub fn select_server(&mut self, server_id: impl Into<String>) -> ListingRequest {
        let server_id = server_id.into();
        self.server_id = Some(server_id.clone());
        self.current_path = "/".to_string();
        self.entries.clear();
        self.selected_path = None;
        self.stats = None;
        self.generation += 1;
        self.phase = NavPhase::Listing;
        ListingRequest {
            server_id,
            path: "/".to_string(),
            generation: self.generation,
        }
    }

    /// Start navigating to `path`. Supersedes any listing still in
    /// flight: its response will no longer match the current generation.
    pub fn begin_navigate(&mut self, path: &str) -> Result<ListingRequest, ClientError> {
        let server_id = self
            .server_id
            .clone()
            .ok_or(ClientError::NoServerSelected)?;
        self.generation += 1;
        self.phase = NavPhase::Listing;
        Ok(ListingRequest {
            server_id,
            path: normalize_path(path),
            generation: self.generation,
        })
    }

    pub fn enter_directory(&mut self, entry: &DirectoryEntry) -> Result<ListingRequest, ClientError> {
        if !entry.is_directory {
            return Err(ClientError::NotADirectory(entry.full_path.clone()));
        }
        self.begin_navigate(&entry.full_path)
    }

    /// Move one level up. At the root this is a defined no-op, not an
    /// error, so `None` is returned and no listing starts.
    pub fn go_parent(&mut self) -> Option<ListingRequest> {
        self.server_id.as_ref()?;
        let parent = parent_path(&self.current_path);
        if parent == self.current_path {
            return None;
        }
        self.begin_navigate(&parent).ok()
    }

    /// Feed a listing outcome back in. Superseded responses are
    /// discarded and report neither success nor failure. On success the
    /// selection and stats are cleared until freshly resolved, and the
    /// returned [`StatsRequest`] should be resolved next. On failure the
    /// previous path is kept but the entries are cleared.
    pub fn apply_listing(
        &mut self,
        request: &ListingRequest,
        outcome: Result<Vec<DirectoryEntry>, ClientError>,
    ) -> Result<Option<StatsRequest>, ClientError> {
        if request.generation != self.generation {
            tracing::debug!(
                "Discarding superseded listing for {}:{}",
                request.server_id,
                request.path
            );
            return Ok(None);
        }
        match outcome {
            Ok(entries) => {
                self.entries = entries;
                self.current_path = request.path.clone();
                self.selected_path = None;
                self.stats = None;
                self.phase = NavPhase::Ready;
                Ok(Some(StatsRequest {
                    server_id: request.server_id.clone(),
                    path: request.path.clone(),
                }))
            }
            Err(err) => {
                self.entries.clear();
                self.selected_path = None;
                self.stats = None;
                self.phase = NavPhase::Error;
                Err(err)
            }
        }
    }

    /// Feed a stats response back in. Discarded when the user has
    /// already navigated away from the path the request was issued for.
    pub fn apply_stats(&mut self, request: &StatsRequest, stats: DirectoryStats) {
        if self.server_id.as_deref() != Some(request.server_id.as_str())
            || self.current_path != request.path
        {
            tracing::debug!("Discarding stale stats for {}", request.path);
            return;
        }
        self.stats = Some(stats);
    }

    /// Choose a file out of the current listing.
    pub fn select_file(&mut self, entry: &DirectoryEntry) -> Result<(), ClientError> {
        if entry.is_directory {
            return Err(ClientError::NotAFile(entry.full_path.clone()));
        }
        if !self.entries.iter().any(|e| e.full_path == entry.full_path) {
            return Err(ClientError::UnknownEntry(entry.full_path.clone()));
        }
        self.selected_path = Some(entry.full_path.clone());
        self.phase = NavPhase::Selecting;
        Ok(())
    }

    /// Hand the chosen path to the caller, the one operation that
    /// yields a result out of the navigator. Explicitly errors when
    /// nothing is selected rather than silently doing nothing.
    pub fn confirm_selection(&self) -> Result<String, ClientError> {
        self.selected_path
            .clone()
            .ok_or(ClientError::NothingSelected)
    }

    /// Ordered trail from root to the current path; the final crumb is
    /// "here" and not navigable.
    pub fn breadcrumb(&self) -> Vec<Crumb> {
        let mut crumbs = vec![Crumb {
            label: "/".to_string(),
            path: "/".to_string(),
            navigable: true,
        }];
        let mut acc = String::new();
        for segment in self.current_path.split('/').filter(|s| !s.is_empty()) {
            acc.push('/');
            acc.push_str(segment);
            crumbs.push(Crumb {
                label: segment.to_string(),
                path: acc.clone(),
                navigable: true,
            });
        }
        if let Some(last) = crumbs.last_mut() {
            last.navigable = false;
        }
        crumbs
    }

    pub fn phase(&self) -> NavPhase {
        self.phase
    }

    pub fn server_id(&self) -> Option<&str> {
        self.server_id.as_deref()
    }

    pub fn current_path(&self) -> &str {
        &self.current_path
    }

    pub fn entries(&self) -> &[DirectoryEntry] {
        &self.entries
    }

    pub fn selected_path(&self) -> Option<&str> {
        self.selected_path.as_deref()
    }

    pub fn stats(&self) -> Option<&DirectoryStats> {
        self.stats.as_ref()
    }
}

/// Canonical form: '/'-rooted, no empty segments, no trailing slash
/// except the root itself.
pub fn normalize_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

/// Parent of a canonical path; the parent of `/` is `/`.
pub fn parent_path(path: &str) -> String {
    let mut segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    segments.pop();
    if segments.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", segments.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::FileType;

    fn file(full_path: &str) -> DirectoryEntry {
        let name = full_path.rsplit('/').next().unwrap().to_string();
        DirectoryEntry {
            name,
            full_path: full_path.to_string(),
            is_directory: false,
            file_type: FileType::Video,
            size: 1_048_576,
            episode_info: None,
        }
    }

    fn dir(full_path: &str) -> DirectoryEntry {
        let name = full_path.rsplit('/').next().unwrap().to_string();
        DirectoryEntry {
            name,
            full_path: full_path.to_string(),
            is_directory: true,
            file_type: FileType::Other,
            size: 0,
            episode_info: None,
        }
    }

    fn stats() -> DirectoryStats {
        DirectoryStats {
            file_count: 3,
            dir_count: 1,
            video_count: 2,
            total_size: "1.2G".to_string(),
        }
    }

    /// Drive a navigator to Ready at `path`.
    fn ready_at(nav: &mut Navigator, path: &str, entries: Vec<DirectoryEntry>) {
        let request = nav.begin_navigate(path).unwrap();
        nav.apply_listing(&request, Ok(entries)).unwrap();
    }

    #[test]
    fn path_normalization() {
        assert_eq!(normalize_path("/"), "/");
        assert_eq!(normalize_path(""), "/");
        assert_eq!(normalize_path("//movies///2024/"), "/movies/2024");
        assert_eq!(normalize_path("/data/show"), "/data/show");
    }

    #[test]
    fn parent_of_root_is_root() {
        assert_eq!(parent_path("/"), "/");
        assert_eq!(parent_path("/movies"), "/");
        assert_eq!(parent_path("/movies/2024"), "/movies");
    }

    #[test]
    fn select_server_starts_a_root_listing() {
        let mut nav = Navigator::new();
        let request = nav.select_server("box");
        assert_eq!(request.path, "/");
        assert_eq!(request.server_id, "box");
        assert_eq!(nav.phase(), NavPhase::Listing);
    }

    #[test]
    fn navigate_without_a_server_is_rejected() {
        let mut nav = Navigator::new();
        assert!(matches!(
            nav.begin_navigate("/data"),
            Err(ClientError::NoServerSelected)
        ));
    }

    #[test]
    fn successful_listing_enters_ready_and_requests_stats() {
        let mut nav = Navigator::new();
        nav.select_server("box");
        let request = nav.begin_navigate("/data").unwrap();
        let stats_request = nav
            .apply_listing(&request, Ok(vec![file("/data/a.mkv")]))
            .unwrap()
            .unwrap();

        assert_eq!(nav.phase(), NavPhase::Ready);
        assert_eq!(nav.current_path(), "/data");
        assert_eq!(nav.entries().len(), 1);
        assert_eq!(stats_request.path, "/data");

        nav.apply_stats(&stats_request, stats());
        assert_eq!(nav.stats().unwrap().file_count, 3);
    }

    #[test]
    fn failed_listing_keeps_the_previous_path_but_clears_entries() {
        let mut nav = Navigator::new();
        nav.select_server("box");
        ready_at(&mut nav, "/data", vec![file("/data/a.mkv")]);

        let request = nav.begin_navigate("/data/locked").unwrap();
        let err = nav
            .apply_listing(&request, Err(ClientError::Backend("permission denied".into())))
            .unwrap_err();

        assert!(matches!(err, ClientError::Backend(_)));
        assert_eq!(nav.phase(), NavPhase::Error);
        assert_eq!(nav.current_path(), "/data");
        assert!(nav.entries().is_empty());
    }

    #[test]
    fn superseded_listing_is_discarded() {
        let mut nav = Navigator::new();
        nav.select_server("box");
        let slow = nav.begin_navigate("/slow").unwrap();
        ready_at(&mut nav, "/fast", vec![file("/fast/a.mkv")]);

        // The older listing resolves after the newer one already applied
        let outcome = nav
            .apply_listing(&slow, Ok(vec![file("/slow/old.mkv")]))
            .unwrap();
        assert!(outcome.is_none());
        assert_eq!(nav.current_path(), "/fast");
        assert_eq!(nav.entries()[0].full_path, "/fast/a.mkv");
    }

    #[test]
    fn stale_stats_response_is_discarded() {
        let mut nav = Navigator::new();
        nav.select_server("box");

        let first = nav.begin_navigate("/first").unwrap();
        let first_stats = nav.apply_listing(&first, Ok(vec![])).unwrap().unwrap();

        // User navigates away before the stats response arrives
        ready_at(&mut nav, "/second", vec![]);

        nav.apply_stats(&first_stats, stats());
        assert!(nav.stats().is_none());
    }

    #[test]
    fn navigation_clears_the_selection() {
        let mut nav = Navigator::new();
        nav.select_server("box");
        ready_at(&mut nav, "/data", vec![file("/data/a.mkv")]);

        nav.select_file(&file("/data/a.mkv")).unwrap();
        assert_eq!(nav.phase(), NavPhase::Selecting);
        assert_eq!(nav.selected_path(), Some("/data/a.mkv"));

        ready_at(&mut nav, "/other", vec![]);
        assert_eq!(nav.selected_path(), None);
        assert!(matches!(
            nav.confirm_selection(),
            Err(ClientError::NothingSelected)
        ));
    }

    #[test]
    fn select_and_confirm_round_trip() {
        let mut nav = Navigator::new();
        nav.select_server("box");
        ready_at(&mut nav, "/data", vec![file("/data/a.mkv")]);

        nav.select_file(&file("/data/a.mkv")).unwrap();
        assert_eq!(nav.confirm_selection().unwrap(), "/data/a.mkv");
    }

    #[test]
    fn selecting_a_directory_or_foreign_entry_is_rejected() {
        let mut nav = Navigator::new();
        nav.select_server("box");
        ready_at(
            &mut nav,
            "/data",
            vec![dir("/data/season1"), file("/data/a.mkv")],
        );

        assert!(matches!(
            nav.select_file(&dir("/data/season1")),
            Err(ClientError::NotAFile(_))
        ));
        assert!(matches!(
            nav.select_file(&file("/elsewhere/b.mkv")),
            Err(ClientError::UnknownEntry(_))
        ));
    }

    #[test]
    fn go_parent_at_root_is_a_no_op() {
        let mut nav = Navigator::new();
        nav.select_server("box");
        ready_at(&mut nav, "/", vec![]);

        assert!(nav.go_parent().is_none());
        assert_eq!(nav.current_path(), "/");
        assert_eq!(nav.phase(), NavPhase::Ready);
    }

    #[test]
    fn go_parent_strips_one_segment() {
        let mut nav = Navigator::new();
        nav.select_server("box");
        ready_at(&mut nav, "/movies/2024", vec![]);

        let request = nav.go_parent().unwrap();
        assert_eq!(request.path, "/movies");
    }

    #[test]
    fn enter_directory_requires_a_directory() {
        let mut nav = Navigator::new();
        nav.select_server("box");
        ready_at(&mut nav, "/data", vec![dir("/data/season1")]);

        let request = nav.enter_directory(&dir("/data/season1")).unwrap();
        assert_eq!(request.path, "/data/season1");

        assert!(matches!(
            nav.enter_directory(&file("/data/a.mkv")),
            Err(ClientError::NotADirectory(_))
        ));
    }

    #[test]
    fn breadcrumb_trail_from_root_to_here() {
        let mut nav = Navigator::new();
        nav.select_server("box");
        ready_at(&mut nav, "/movies/2024/show", vec![]);

        let crumbs = nav.breadcrumb();
        assert_eq!(crumbs.len(), 4);
        assert_eq!(crumbs[0].path, "/");
        assert!(crumbs[0].navigable);
        assert_eq!(crumbs[1].path, "/movies");
        assert!(crumbs[1].navigable);
        assert_eq!(crumbs[2].path, "/movies/2024");
        assert!(crumbs[2].navigable);
        assert_eq!(crumbs[3].label, "show");
        assert_eq!(crumbs[3].path, "/movies/2024/show");
        assert!(!crumbs[3].navigable);
    }

    #[test]
    fn breadcrumb_at_root_is_a_single_non_navigable_crumb() {
        let nav = Navigator::new();
        let crumbs = nav.breadcrumb();
        assert_eq!(crumbs.len(), 1);
        assert_eq!(crumbs[0].path, "/");
        assert!(!crumbs[0].navigable);
    }
}
