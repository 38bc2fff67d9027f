use std::fs;
use std::hash::Hasher;
use std::path::{Path, PathBuf};
use std::process::Command;

use cb_compiler::{ConvertOptions, EMPTY_RESULT_JSON};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use twox_hash::XxHash64;

pub const CACHE_FILE: &str = "cached_rules.json";
pub const EXTENDED_FILE: &str = "advanced_rules.txt";

const WRITE_ATTEMPTS: usize = 3;

#[derive(Debug, Serialize, Deserialize)]
struct CacheFile {
    fingerprint: String,
    chunks: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    extended: Option<String>,
}

/// Cached conversion output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachedRules {
    pub chunks: Vec<String>,
    pub extended: Option<String>,
}

/// Fingerprint of everything that affects the converted output.
pub fn fingerprint(lines: &[String], options: &ConvertOptions, chunk_size: usize) -> u64 {
    let mut hasher = XxHash64::with_seed(0);
    hasher.write(options.host_version.as_str().as_bytes());
    hasher.write_u8(u8::from(options.advanced_blocking));
    hasher.write_u64(options.max_json_size.map_or(u64::MAX, |size| size as u64));
    hasher.write_u64(chunk_size as u64);
    for line in lines {
        hasher.write(line.as_bytes());
        hasher.write_u8(b'\n');
    }
    hasher.finish()
}

/// Directory of `<id>.json` rulesets plus the conversion cache.
pub struct RulesetStore {
    dir: PathBuf,
}

impl RulesetStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn ruleset_path(&self, id: &str) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    pub fn write_ruleset(&self, id: &str, json: &str) -> Result<(), String> {
        write_file(&self.ruleset_path(id), json.as_bytes())
    }

    /// Write chunk `i` under `ids[i]`; identifiers without a chunk get the
    /// neutral ruleset. Write failures are retried, logged and counted.
    pub fn write_rulesets(&self, ids: &[String], chunks: &[String]) -> usize {
        if chunks.len() > ids.len() {
            warn!(
                "{} chunks but only {} ruleset identifiers; extra chunks are dropped",
                chunks.len(),
                ids.len()
            );
        }

        let mut failures = 0usize;
        for (index, id) in ids.iter().enumerate() {
            let json = chunks.get(index).map_or(EMPTY_RESULT_JSON, String::as_str);
            if !self.write_with_retry(id, json) {
                failures += 1;
            }
        }
        failures
    }

    fn write_with_retry(&self, id: &str, json: &str) -> bool {
        for attempt in 1..=WRITE_ATTEMPTS {
            match self.write_ruleset(id, json) {
                Ok(()) => {
                    debug!("Saved ruleset {id} ({} bytes)", json.len());
                    return true;
                }
                Err(err) => warn!("Attempt {attempt}/{WRITE_ATTEMPTS}: {err}"),
            }
        }
        false
    }

    pub fn write_extended(&self, text: &str) -> Result<(), String> {
        write_file(&self.dir.join(EXTENDED_FILE), text.as_bytes())
    }

    pub fn load_cache(&self, fingerprint: u64) -> Option<CachedRules> {
        let path = self.dir.join(CACHE_FILE);
        let bytes = fs::read(&path).ok()?;
        let cache: CacheFile = match serde_json::from_slice(&bytes) {
            Ok(cache) => cache,
            Err(err) => {
                warn!("Ignoring unreadable cache '{}': {}", path.display(), err);
                return None;
            }
        };

        if cache.fingerprint != format!("{fingerprint:016x}") {
            debug!("Cache fingerprint mismatch, converting again");
            return None;
        }
        info!("Using cached rules from '{}'", path.display());
        Some(CachedRules {
            chunks: cache.chunks,
            extended: cache.extended,
        })
    }

    pub fn save_cache(&self, fingerprint: u64, rules: &CachedRules) -> Result<(), String> {
        let cache = CacheFile {
            fingerprint: format!("{fingerprint:016x}"),
            chunks: rules.chunks.clone(),
            extended: rules.extended.clone(),
        };
        let bytes = serde_json::to_vec(&cache)
            .map_err(|e| format!("Failed to serialize cache: {}", e))?;
        write_file(&self.dir.join(CACHE_FILE), &bytes)
    }

    pub fn clear_cache(&self) -> Result<(), String> {
        let path = self.dir.join(CACHE_FILE);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(format!("Failed to remove '{}': {}", path.display(), e)),
        }
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<(), String> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| format!("Failed to create '{}': {}", parent.display(), e))?;
    }
    fs::write(path, bytes)
        .map_err(|e| format!("Failed to write '{}': {}", path.display(), e))
}

/// Asks the host to pick up a rewritten ruleset.
pub trait HostReloader {
    fn reload(&self, id: &str) -> Result<(), String>;
}

/// Runs `<program> [args...] <id>`.
pub struct CommandReloader {
    program: String,
    args: Vec<String>,
}

impl CommandReloader {
    pub fn parse(command: &str) -> Option<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
        })
    }
}

impl HostReloader for CommandReloader {
    fn reload(&self, id: &str) -> Result<(), String> {
        let status = Command::new(&self.program)
            .args(&self.args)
            .arg(id)
            .status()
            .map_err(|e| format!("Failed to run '{}': {}", self.program, e))?;
        if status.success() {
            Ok(())
        } else {
            Err(format!("'{}' exited with {}", self.program, status))
        }
    }
}

/// Reload every ruleset, retrying each up to `max_attempts` times.
/// Returns the identifiers that never reloaded.
pub fn reload_all(reloader: &dyn HostReloader, ids: &[String], max_attempts: usize) -> Vec<String> {
    let mut failed = Vec::new();
    for id in ids {
        let mut reloaded = false;
        for attempt in 1..=max_attempts.max(1) {
            match reloader.reload(id) {
                Ok(()) => {
                    debug!("Reloaded {id} (attempt {attempt})");
                    reloaded = true;
                    break;
                }
                Err(err) => warn!("Reload of {id} failed (attempt {attempt}/{max_attempts}): {err}"),
            }
        }
        if !reloaded {
            warn!("Giving up on reloading {id}");
            failed.push(id.clone());
        }
    }
    failed
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    use cb_core::HostVersion;

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("cb-cli-{}-{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn fingerprint_tracks_inputs_and_options() {
        let lines = vec!["||ads.example^".to_string()];
        let options = ConvertOptions::new(HostVersion::V16_4);
        let base = fingerprint(&lines, &options, 100);

        assert_eq!(base, fingerprint(&lines, &options, 100));
        assert_ne!(base, fingerprint(&lines, &options, 200));
        assert_ne!(base, fingerprint(&lines, &options.with_advanced_blocking(true), 100));
        assert_ne!(
            base,
            fingerprint(&lines, &ConvertOptions::new(HostVersion::V15), 100)
        );
        assert_ne!(base, fingerprint(&["||ads.example".to_string()], &options, 100));
    }

    #[test]
    fn missing_rulesets_get_neutral_json() {
        let dir = temp_dir("rulesets");
        let store = RulesetStore::new(&dir);
        let ids = vec!["adBlock".to_string(), "privacy".to_string()];

        let failures = store.write_rulesets(&ids, &["[1]".to_string()]);
        assert_eq!(failures, 0);
        assert_eq!(fs::read_to_string(store.ruleset_path("adBlock")).unwrap(), "[1]");
        assert_eq!(
            fs::read_to_string(store.ruleset_path("privacy")).unwrap(),
            EMPTY_RESULT_JSON
        );
        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn cache_round_trip_checks_fingerprint() {
        let dir = temp_dir("cache");
        let store = RulesetStore::new(&dir);
        let rules = CachedRules {
            chunks: vec!["[a]".to_string(), "[b]".to_string()],
            extended: Some("example.com#%#x".to_string()),
        };

        assert_eq!(store.load_cache(7), None);
        store.save_cache(7, &rules).unwrap();
        assert_eq!(store.load_cache(7), Some(rules));
        assert_eq!(store.load_cache(8), None);

        store.clear_cache().unwrap();
        assert_eq!(store.load_cache(7), None);
        store.clear_cache().unwrap();
        let _ = fs::remove_dir_all(&dir);
    }

    struct FlakyReloader {
        failures_left: RefCell<usize>,
        calls: RefCell<Vec<String>>,
    }

    impl HostReloader for FlakyReloader {
        fn reload(&self, id: &str) -> Result<(), String> {
            self.calls.borrow_mut().push(id.to_string());
            let mut left = self.failures_left.borrow_mut();
            if *left > 0 {
                *left -= 1;
                return Err("busy".to_string());
            }
            Ok(())
        }
    }

    #[test]
    fn reload_retries_are_bounded() {
        let reloader = FlakyReloader {
            failures_left: RefCell::new(4),
            calls: RefCell::new(Vec::new()),
        };
        let ids = vec!["a".to_string(), "b".to_string()];

        let failed = reload_all(&reloader, &ids, 3);
        assert_eq!(failed, vec!["a".to_string()]);
        assert_eq!(reloader.calls.borrow().as_slice(), ["a", "a", "a", "b", "b"]);
    }

    #[test]
    fn parses_reload_command() {
        let reloader = CommandReloader::parse("notify-host --reload").unwrap();
        assert_eq!(reloader.program, "notify-host");
        assert_eq!(reloader.args, vec!["--reload"]);
        assert!(CommandReloader::parse("   ").is_none());
    }
}
