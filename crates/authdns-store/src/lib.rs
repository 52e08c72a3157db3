//! On-disk zone storage
//!
//! Zones are JSON documents stored under a two-level shard layout derived
//! from the md5 of the domain: `<root>/<md5[0..2]>/<md5[2..4]>/<domain>.json`.
//! Writes are atomic (temp file + rename) and validated against the zone
//! schema before any byte reaches disk.

mod validate;

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use authdns_core::{normalize_domain, DnsError, DnsResult, Zone};

pub use validate::validate_zone;

/// Handle to the zones directory
#[derive(Debug, Clone)]
pub struct ZoneStore {
    root: PathBuf,
}

impl ZoneStore {
    /// Open a store rooted at `root`, resolved against the working directory
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Sharded path for `domain`
    pub fn path_for(&self, domain: &str) -> PathBuf {
        let domain = normalize_domain(domain);
        let digest = format!("{:x}", md5::compute(domain.as_bytes()));
        self.root
            .join(&digest[0..2])
            .join(&digest[2..4])
            .join(format!("{domain}.json"))
    }

    pub fn exists(&self, domain: &str) -> bool {
        self.path_for(domain).exists()
    }

    /// Read and validate the zone for `domain`
    ///
    /// An absent file is the distinguished `NotFound` signal.
    pub fn read(&self, domain: &str) -> DnsResult<Zone> {
        let path = self.path_for(domain);
        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Err(DnsError::NotFound),
            Err(err) => {
                return Err(DnsError::storage(format!("read {}: {err}", path.display())));
            }
        };
        let zone: Zone = serde_json::from_slice(&raw)?;
        validate_zone(&zone)?;
        Ok(zone)
    }

    /// Validate and atomically persist the zone for `domain`
    ///
    /// The document is written to `<path>.tmp` and renamed over the target,
    /// so readers observe either the previous content or the new one. A
    /// stale `.tmp` from an earlier crash is simply overwritten.
    pub fn write(&self, domain: &str, zone: &Zone) -> DnsResult<()> {
        validate_zone(zone)?;

        let path = self.path_for(domain);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .map_err(|err| DnsError::storage(format!("mkdir {}: {err}", parent.display())))?;
        }

        let payload = serde_json::to_vec(zone)
            .map_err(|err| DnsError::storage(format!("serialize zone: {err}")))?;

        let tmp = tmp_path(&path);
        fs::write(&tmp, &payload)
            .map_err(|err| DnsError::storage(format!("write {}: {err}", tmp.display())))?;

        match fs::rename(&tmp, &path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => {
                fs::remove_file(&path)
                    .map_err(|err| DnsError::storage(format!("unlink {}: {err}", path.display())))?;
                fs::rename(&tmp, &path)
                    .map_err(|err| DnsError::storage(format!("rename {}: {err}", path.display())))
            }
            Err(err) => Err(DnsError::storage(format!("rename {}: {err}", path.display()))),
        }
    }

    /// Remove the zone file for `domain`
    ///
    /// An absent file yields `NotFound` rather than a storage error.
    pub fn delete(&self, domain: &str) -> DnsResult<()> {
        let path = self.path_for(domain);
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Err(DnsError::NotFound),
            Err(err) => Err(DnsError::storage(format!("unlink {}: {err}", path.display()))),
        }
    }

    /// Scan every `*.json` under the root, validating each document
    ///
    /// Invalid files are logged and reported but never removed; lazy
    /// activation simply skips them later. Used at boot.
    pub fn scan(&self) -> ScanReport {
        let mut report = ScanReport::default();
        if self.root.exists() {
            scan_dir(&self.root, &mut report);
        }
        for (path, reason) in &report.invalid {
            tracing::warn!(path = %path.display(), %reason, "skipping invalid zone file");
        }
        report
    }
}

/// Outcome of a startup scan
#[derive(Debug, Default)]
pub struct ScanReport {
    pub valid: usize,
    pub invalid: Vec<(PathBuf, DnsError)>,
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut tmp = path.as_os_str().to_os_string();
    tmp.push(".tmp");
    PathBuf::from(tmp)
}

fn scan_dir(dir: &Path, report: &mut ScanReport) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) => {
            tracing::warn!(path = %dir.display(), %err, "cannot scan zones directory");
            return;
        }
    };

    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            scan_dir(&path, report);
        } else if path.extension().is_some_and(|ext| ext == "json") {
            match fs::read(&path)
                .map_err(DnsError::from)
                .and_then(|raw| Ok(serde_json::from_slice::<Zone>(&raw)?))
                .and_then(|zone| validate_zone(&zone))
            {
                Ok(()) => report.valid += 1,
                Err(err) => report.invalid.push((path, err)),
            }
        }
    }
}
