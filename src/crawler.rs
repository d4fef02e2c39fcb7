//! Recursive traversal of the repository's directory-listing hierarchy.
//!
//! The crawler enumerates the whole reachable tree, resolves dated entries
//! that fall within the target month into artifact classifications, and
//! reports — at one configured depth — which subtrees contained at least one
//! qualifying artifact.

use crate::Result;
use crate::cache::ResponseCache;
use crate::fetcher::ArtifactFetcher;
use crate::inspector::{self, Classification};
use crate::listing::{RepoPath, TargetMonth, parse_listing};
use core::sync::atomic::{AtomicUsize, Ordering};
use futures::FutureExt;
use futures::future::BoxFuture;
use std::path::PathBuf;

const LOG_TARGET: &str = "   crawler";

/// Primary-binary filename extensions tried during artifact resolution, in order.
const PRIMARY_EXTENSIONS: [&str; 2] = ["jar", "aar"];

/// Tunables for one crawl run.
#[derive(Debug, Clone)]
pub struct CrawlSettings {
    /// Repository root URL, ending in `/`.
    pub root_url: String,

    /// Calendar month a version's last-modified date must fall in to qualify.
    pub month: TargetMonth,

    /// Cap on qualifying artifacts resolved under a single parent directory.
    pub max_per_group: usize,

    /// Depth at which qualifying subtrees are reported (root is depth 0).
    pub report_depth: usize,

    /// Local directory tree mirroring remote paths for downloaded artifacts.
    pub artifact_dir: PathBuf,
}

/// Outcome of fetching one listing page.
///
/// Unreachable pages are common (deleted packages, redirects) and prune their
/// subtree instead of aborting the run; the type makes that policy explicit.
#[derive(Debug)]
enum Listing {
    Reachable(String),
    Unreachable,
}

/// What one subtree contributed to the walk.
#[derive(Debug, Default)]
struct Subtree {
    /// True when any descendant yielded a classified artifact.
    qualifying: bool,

    /// Paths at the reporting depth whose subtree qualified.
    reported: Vec<RepoPath>,
}

/// Walks the hierarchy, driving the cache, fetcher, and inspector.
#[derive(Debug)]
pub struct HierarchyCrawler {
    cache: ResponseCache,
    fetcher: ArtifactFetcher,
    settings: CrawlSettings,
}

impl HierarchyCrawler {
    /// Create a crawler over an explicit cache store handle.
    #[must_use]
    pub fn new(cache: ResponseCache, fetcher: ArtifactFetcher, settings: CrawlSettings) -> Self {
        Self { cache, fetcher, settings }
    }

    /// Crawl the whole tree under the repository root.
    ///
    /// Returns the paths at the reporting depth that contained at least one
    /// qualifying artifact.
    pub async fn run(&self) -> Result<Vec<RepoPath>> {
        let root_tally = AtomicUsize::new(0);
        let outcome = self.walk(RepoPath::root(), 0, &root_tally).await;

        log::info!(target: LOG_TARGET, "crawl finished, {} path(s) reported", outcome.reported.len());
        Ok(outcome.reported)
    }

    /// Process one listing page and recurse into its subdirectories.
    ///
    /// `parent_tally` is shared by everything under one parent and caps how
    /// many artifacts are resolved there; sibling parents never share it.
    fn walk<'a>(&'a self, path: RepoPath, depth: usize, parent_tally: &'a AtomicUsize) -> BoxFuture<'a, Subtree> {
        async move {
            let page = match self.fetch_listing(&path).await {
                Listing::Reachable(page) => page,
                Listing::Unreachable => return Subtree::default(),
            };

            let own_tally = AtomicUsize::new(0);
            let mut outcome = Subtree::default();

            for entry in parse_listing(&page) {
                match entry.last_modified {
                    // Subdirectory: always recurse, the whole tree gets enumerated.
                    None => {
                        let child = self.walk(path.child(&entry.name), depth + 1, &own_tally).await;
                        outcome.qualifying |= child.qualifying;
                        outcome.reported.extend(child.reported);
                    }

                    // The root and its immediate children are group-identifier
                    // levels; dated entries there are never artifact versions.
                    Some(date) => {
                        if depth > 0
                            && self.settings.month.contains(date)
                            && parent_tally.load(Ordering::Relaxed) < self.settings.max_per_group
                            && self.resolve_artifact(&path.child(&entry.name)).await.is_some()
                        {
                            let _ = parent_tally.fetch_add(1, Ordering::Relaxed);
                            outcome.qualifying = true;
                        }
                    }
                }
            }

            if depth == self.settings.report_depth && outcome.qualifying {
                outcome.reported.push(path);
            }

            outcome
        }
        .boxed()
    }

    /// Fetch a listing page through the response cache.
    async fn fetch_listing(&self, path: &RepoPath) -> Listing {
        let uri = format!("{}{path}", self.settings.root_url);
        match self.cache.get(&uri).await {
            Ok(page) => Listing::Reachable(page),
            Err(e) => {
                log::debug!(target: LOG_TARGET, "subtree '{path}' unreachable, pruning: {e:#}");
                Listing::Unreachable
            }
        }
    }

    /// Resolve a version directory into an artifact classification.
    ///
    /// `None` means no analysis happened: the page layout was unrecognized
    /// (neither conventional primary filename offered) or the download
    /// failed. That's never negative evidence.
    async fn resolve_artifact(&self, version_path: &RepoPath) -> Option<Classification> {
        let (artifact_name, version) = version_path.artifact_coords()?;
        let candidates = PRIMARY_EXTENSIONS.map(|ext| format!("{artifact_name}-{version}.{ext}"));

        let uri = format!("{}{version_path}", self.settings.root_url);
        let page = match self.cache.get(&uri).await {
            Ok(page) => page,
            Err(e) => {
                log::debug!(target: LOG_TARGET, "version directory '{version_path}' unreachable: {e:#}");
                return None;
            }
        };

        let filename = candidates.iter().find(|f| page.contains(&format!("href=\"{f}\"")))?;

        let url = format!("{}{version_path}{filename}", self.settings.root_url);
        let local_path = self.settings.artifact_dir.join(version_path.as_str()).join(filename);

        if let Err(e) = self.fetcher.fetch(&url, &local_path).await {
            log::debug!(target: LOG_TARGET, "could not download '{url}': {e:#}");
            return None;
        }

        let classification = inspector::classify(&local_path);
        if classification == Classification::Signed {
            log::info!(target: LOG_TARGET, "found signed artifact: {version_path}{filename}");
        }

        Some(classification)
    }
}
