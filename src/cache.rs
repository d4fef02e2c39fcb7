//! Persistent HTTP response cache for directory-listing pages.
//!
//! Maps a request URI to its last-known response body and ETag validator in a
//! SQLite table, so that repeated crawl runs don't re-fetch unchanged pages.
//! The operating mode decides whether cached records are trusted outright
//! ([`FetchMode::Bypass`], the default) or revalidated with a conditional GET
//! ([`FetchMode::Verify`]).

use crate::Result;
use clap::ValueEnum;
use ohno::{IntoAppError, app_err};
use rusqlite::{Connection, OpenFlags, params};
use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

const LOG_TARGET: &str = "     cache";

/// How cached records are reconciled against the remote source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum FetchMode {
    /// Trust every cached record with a validator, issuing no network call for it.
    ///
    /// Listing pages are effectively immutable for the duration of a crawl, so
    /// this trades correctness for throughput.
    Bypass,

    /// Revalidate cached records with a conditional GET (`If-None-Match`).
    Verify,
}

/// A durable, freshness-aware cache of GET response bodies keyed by URI.
///
/// All read-then-write sequences against the store are serialized; network
/// calls are not.
#[derive(Debug)]
pub struct ResponseCache {
    conn: Mutex<Connection>,
    client: reqwest::Client,
    mode: FetchMode,
}

impl ResponseCache {
    /// Open (or create) the cache store at `path`.
    ///
    /// Failure here is the only condition fatal to a whole run.
    pub fn open(path: &Path, mode: FetchMode) -> Result<Self> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).into_app_err_with(|| format!("creating cache directory '{}'", parent.display()))?;
        }

        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_CREATE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .into_app_err_with(|| format!("opening cache store '{}'", path.display()))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;

             CREATE TABLE IF NOT EXISTS pages (
                 uri TEXT PRIMARY KEY,
                 body TEXT NOT NULL,
                 etag TEXT
             );",
        )
        .into_app_err_with(|| format!("initializing cache schema in '{}'", path.display()))?;

        let client = reqwest::Client::builder()
            .user_agent("sigsurvey")
            .build()
            .into_app_err("creating HTTP client")?;

        Ok(Self {
            conn: Mutex::new(conn),
            client,
            mode,
        })
    }

    /// Returns the operating mode.
    #[must_use]
    pub const fn mode(&self) -> FetchMode {
        self.mode
    }

    /// Return the authoritative body for a GET against `uri`.
    ///
    /// Cached records with a validator are returned without a network call in
    /// bypass mode, and revalidated in verify mode. Records are only written
    /// when the origin supplied an ETag; a non-success status fails the fetch
    /// with the status, headers, and body in the error.
    pub async fn get(&self, uri: &str) -> Result<String> {
        match self.lookup(uri)? {
            Some((body, Some(etag))) => match self.mode {
                FetchMode::Bypass => {
                    log::trace!(target: LOG_TARGET, "bypassing validator check for '{uri}'");
                    Ok(body)
                }
                FetchMode::Verify => self.revalidate(uri, body, &etag).await,
            },

            // A record without a validator can't be revalidated; refetch
            // unconditionally but keep the row updated.
            Some((_, None)) | None => self.fetch_and_store(uri).await,
        }
    }

    /// Conditional GET carrying the stored validator.
    async fn revalidate(&self, uri: &str, cached_body: String, etag: &str) -> Result<String> {
        let response = self
            .client
            .get(uri)
            .header(reqwest::header::IF_NONE_MATCH, etag)
            .send()
            .await
            .into_app_err_with(|| format!("revalidating '{uri}'"))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_MODIFIED {
            log::debug!(target: LOG_TARGET, "'{uri}' not modified");
            return Ok(cached_body);
        }

        if !status.is_success() {
            return Err(unexpected_response(uri, response).await);
        }

        let new_etag = extract_etag(response.headers());
        let body = response.text().await.into_app_err_with(|| format!("reading body of '{uri}'"))?;

        if let Some(etag) = &new_etag {
            self.store(uri, &body, etag)?;
            log::debug!(target: LOG_TARGET, "'{uri}' changed since cached, record updated");
        }

        Ok(body)
    }

    /// Plain GET, storing the record when a validator is available.
    async fn fetch_and_store(&self, uri: &str) -> Result<String> {
        let response = self
            .client
            .get(uri)
            .send()
            .await
            .into_app_err_with(|| format!("fetching '{uri}'"))?;

        if !response.status().is_success() {
            return Err(unexpected_response(uri, response).await);
        }

        let etag = extract_etag(response.headers());
        let body = response.text().await.into_app_err_with(|| format!("reading body of '{uri}'"))?;

        if let Some(etag) = &etag {
            self.store(uri, &body, etag)?;
            log::debug!(target: LOG_TARGET, "stored '{uri}' in cache");
        } else {
            log::debug!(target: LOG_TARGET, "no validator for '{uri}', not cached");
        }

        Ok(body)
    }

    /// Point lookup by URI.
    fn lookup(&self, uri: &str) -> Result<Option<(String, Option<String>)>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare_cached("SELECT body, etag FROM pages WHERE uri = ?1")
            .into_app_err("preparing cache lookup")?;

        let mut rows = stmt.query(params![uri]).into_app_err("querying cache")?;
        match rows.next().into_app_err("reading cache row")? {
            Some(row) => {
                let body: String = row.get(0).into_app_err("reading cached body")?;
                let etag: Option<String> = row.get(1).into_app_err("reading cached validator")?;
                Ok(Some((body, etag)))
            }
            None => Ok(None),
        }
    }

    /// Insert or update the record for `uri`.
    ///
    /// Keyed upsert, so concurrent fetches for the same URI can never leave a
    /// duplicate or torn record.
    fn store(&self, uri: &str, body: &str, etag: &str) -> Result<()> {
        let conn = self.lock()?;
        let _ = conn
            .prepare_cached(
                "INSERT INTO pages (uri, body, etag) VALUES (?1, ?2, ?3)
                 ON CONFLICT(uri) DO UPDATE SET body = excluded.body, etag = excluded.etag",
            )
            .into_app_err("preparing cache upsert")?
            .execute(params![uri, body, etag])
            .into_app_err_with(|| format!("storing cache record for '{uri}'"))?;
        Ok(())
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| app_err!("cache store mutex poisoned"))
    }
}

/// Pull the entity-tag validator out of a response's headers.
fn extract_etag(headers: &reqwest::header::HeaderMap) -> Option<String> {
    headers
        .get(reqwest::header::ETAG)
        .and_then(|v| v.to_str().ok())
        .map(ToString::to_string)
}

/// Build the error for a non-success status, carrying status, headers, and body.
async fn unexpected_response(uri: &str, response: reqwest::Response) -> ohno::AppError {
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.text().await.unwrap_or_else(|_| String::from("<unable to read body>"));
    app_err!("unexpected response {status} for '{uri}'\n{headers:?}\n{body}")
}
