use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{ETAG, IF_MODIFIED_SINCE, IF_NONE_MATCH, LAST_MODIFIED, USER_AGENT};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};

const CACHE_VERSION: u32 = 1;
const CACHE_DIR: &str = "nrl_terminal";
const CACHE_FILE: &str = "http_cache.json";
// Round files accumulate over a season; keep the cache file bounded.
const MAX_ENTRIES: usize = 512;

static CACHE: Mutex<Option<BodyCache>> = Mutex::new(None);

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
struct BodyCache {
    version: u32,
    entries: HashMap<String, CachedBody>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct CachedBody {
    body: String,
    etag: Option<String>,
    last_modified: Option<String>,
    fetched_at: u64,
}

impl BodyCache {
    fn load() -> Self {
        let Some(path) = cache_path() else {
            return Self::default();
        };
        let Ok(raw) = fs::read_to_string(path) else {
            return Self::default();
        };
        match serde_json::from_str::<Self>(&raw) {
            Ok(cache) if cache.version == CACHE_VERSION => cache,
            _ => Self::default(),
        }
    }

    fn store(&mut self, url: &str, entry: CachedBody) {
        self.version = CACHE_VERSION;
        self.entries.insert(url.to_string(), entry);
        while self.entries.len() > MAX_ENTRIES {
            let Some(oldest) = self
                .entries
                .iter()
                .min_by_key(|(_, e)| e.fetched_at)
                .map(|(url, _)| url.clone())
            else {
                break;
            };
            self.entries.remove(&oldest);
        }
        let _ = self.persist();
    }

    // Written atomically so a crash mid-save never corrupts the cache.
    fn persist(&self) -> Result<()> {
        let Some(path) = cache_path() else {
            return Ok(());
        };
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).ok();
        }
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_string(self).context("serialize http cache")?;
        fs::write(&tmp, json).context("write http cache")?;
        fs::rename(&tmp, &path).context("swap http cache")?;
        Ok(())
    }
}

/// Conditional GET with an on-disk body cache. Round snapshot files are
/// static once published, so a 304 is the common case after the first
/// fetch of a round.
pub fn fetch_text_cached(client: &Client, url: &str) -> Result<String> {
    let known = {
        let mut guard = CACHE.lock().expect("http cache lock poisoned");
        let cache = guard.get_or_insert_with(BodyCache::load);
        cache.entries.get(url).cloned()
    };

    let mut req = client.get(url).header(USER_AGENT, "nrl_terminal/0.1");
    if let Some(entry) = known.as_ref() {
        if let Some(etag) = entry.etag.as_ref() {
            req = req.header(IF_NONE_MATCH, etag);
        }
        if let Some(last_modified) = entry.last_modified.as_ref() {
            req = req.header(IF_MODIFIED_SINCE, last_modified);
        }
    }

    let resp = req.send().context("request failed")?;
    let status = resp.status();
    if status == StatusCode::NOT_MODIFIED {
        return known
            .map(|entry| entry.body)
            .ok_or_else(|| anyhow::anyhow!("received 304 without cache body"));
    }

    let header_str = |name| {
        resp.headers()
            .get(name)
            .and_then(|v: &reqwest::header::HeaderValue| v.to_str().ok())
            .map(|v| v.to_string())
    };
    let etag = header_str(ETAG);
    let last_modified = header_str(LAST_MODIFIED);

    let body = resp.text().context("failed reading body")?;
    if !status.is_success() {
        return Err(anyhow::anyhow!("http {}: {}", status, body));
    }

    let mut guard = CACHE.lock().expect("http cache lock poisoned");
    let cache = guard.get_or_insert_with(BodyCache::load);
    cache.store(
        url,
        CachedBody {
            body: body.clone(),
            etag,
            last_modified,
            fetched_at: unix_now(),
        },
    );
    Ok(body)
}

pub fn app_cache_dir() -> Option<PathBuf> {
    if let Ok(base) = std::env::var("XDG_CACHE_HOME") {
        if !base.trim().is_empty() {
            return Some(PathBuf::from(base).join(CACHE_DIR));
        }
    }
    let home = std::env::var("HOME").ok()?;
    if home.trim().is_empty() {
        return None;
    }
    Some(PathBuf::from(home).join(".cache").join(CACHE_DIR))
}

fn cache_path() -> Option<PathBuf> {
    app_cache_dir().map(|dir| dir.join(CACHE_FILE))
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}
