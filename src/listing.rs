//! Data model for repository directory-listing pages.
//!
//! A listing page exposes one row per child entry: an anchor with the entry
//! name and a trailing date token. A date token of `-` marks the entry as a
//! subdirectory; anything else is the entry's last-modified date.

use chrono::{Datelike, NaiveDate};
use core::fmt;
use core::str::FromStr;
use ohno::app_err;
use regex::Regex;
use std::sync::LazyLock;

/// Entries whose name starts with this prefix are repository metadata, not real children.
const METADATA_PREFIX: &str = "maven-metadata.xml";

/// Matches one listing row: the href'd entry name and the trailing date token.
static LISTING_ROW: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"href="([^"]*)".*</a>\s+([-0-9]+) "#).expect("listing row regex must compile"));

/// One child entry parsed from a directory-listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryEntry {
    /// Entry name as it appears in the href, including any trailing `/`.
    pub name: String,

    /// Last-modified date, or `None` when the entry is itself a subdirectory.
    pub last_modified: Option<NaiveDate>,
}

impl DirectoryEntry {
    /// Whether this entry is a subdirectory (the listing showed `-` instead of a date).
    #[must_use]
    pub const fn is_directory(&self) -> bool {
        self.last_modified.is_none()
    }
}

/// Parse all usable entries from a listing page body.
///
/// Rows with empty names, metadata-file names, or unrecognizable date tokens
/// are discarded.
#[must_use]
pub fn parse_listing(page: &str) -> Vec<DirectoryEntry> {
    LISTING_ROW
        .captures_iter(page)
        .filter_map(|caps| {
            let name = &caps[1];
            if name.is_empty() || name.starts_with(METADATA_PREFIX) {
                return None;
            }

            let last_modified = match &caps[2] {
                "-" => None,
                token => Some(NaiveDate::parse_from_str(token, "%Y-%m-%d").ok()?),
            };

            Some(DirectoryEntry {
                name: name.to_string(),
                last_modified,
            })
        })
        .collect()
}

/// A position in the repository hierarchy, as an ordered sequence of
/// `/`-terminated segments relative to the repository root.
///
/// Immutable once constructed; [`RepoPath::child`] produces the extended path.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct RepoPath(String);

impl RepoPath {
    /// The repository root (empty path, depth 0).
    #[must_use]
    pub const fn root() -> Self {
        Self(String::new())
    }

    /// Extend this path with a child entry name (which carries its own trailing `/`).
    #[must_use]
    pub fn child(&self, name: &str) -> Self {
        let mut s = String::with_capacity(self.0.len() + name.len());
        s.push_str(&self.0);
        s.push_str(name);
        Self(s)
    }

    /// The path as a string, suitable for appending to the repository root URL.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Derive `(artifact_name, version)` from the last two path segments.
    ///
    /// Returns `None` when the path has fewer than two segments.
    #[must_use]
    pub fn artifact_coords(&self) -> Option<(&str, &str)> {
        let trimmed = self.0.strip_suffix('/').unwrap_or(&self.0);
        let mut segments = trimmed.rsplit('/');
        let version = segments.next().filter(|s| !s.is_empty())?;
        let name = segments.next().filter(|s| !s.is_empty())?;
        Some((name, version))
    }
}

impl fmt::Display for RepoPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A calendar month used to qualify artifact publication dates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TargetMonth {
    year: i32,
    month: u32,
}

impl TargetMonth {
    /// Create a target month. `month` is 1-based.
    pub fn new(year: i32, month: u32) -> crate::Result<Self> {
        if !(1..=12).contains(&month) {
            return Err(app_err!("month must be between 1 and 12, got {month}"));
        }
        Ok(Self { year, month })
    }

    /// Whether the given date falls within this month.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        date.year() == self.year && date.month() == self.month
    }
}

impl FromStr for TargetMonth {
    type Err = ohno::AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (year, month) = s
            .split_once('-')
            .ok_or_else(|| app_err!("expected YYYY-MM, got '{s}'"))?;
        let year = year.parse::<i32>().map_err(|_| app_err!("invalid year in '{s}'"))?;
        let month = month.parse::<u32>().map_err(|_| app_err!("invalid month in '{s}'"))?;
        Self::new(year, month)
    }
}

impl fmt::Display for TargetMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}
