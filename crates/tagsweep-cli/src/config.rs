//! Loading of the YAML configuration directory.
//!
//! The directory holds `config.yaml` (the registry target) plus one job file
//! per mode: `jobs.yaml` for watch mode and `manual.yaml` for manual runs.
//! Both `.yaml` and `.yml` are accepted.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::{info, warn};

use tagsweep_core::{validate_jobs, Job};
use tagsweep_registry::{
    RegistryAuth, RegistryConfig, DEFAULT_MAX_CONCURRENT_REQUESTS, DEFAULT_TIMEOUT,
};

const ENV_PREFIX: &str = "__ENV:";
const FALLBACK_MAX_CONCURRENT_REQUESTS: usize = 10;
const MAX_TIMEOUT_SECS: i64 = 120;

/// Which job file to load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobFile {
    /// `jobs.yaml`, used by watch mode.
    Watch,
    /// `manual.yaml`, used by one-shot runs.
    Manual,
}

impl JobFile {
    /// File stem inside the configuration directory.
    pub const fn stem(self) -> &'static str {
        match self {
            Self::Watch => "jobs",
            Self::Manual => "manual",
        }
    }
}

/// Registry section as written in `config.yaml`.
#[derive(Debug, Deserialize)]
pub struct RawRegistryConfig {
    registry_url: String,
    #[serde(default)]
    username: Option<String>,
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    proxy: Option<String>,
    #[serde(default)]
    timeout: Option<i64>,
    #[serde(default)]
    max_concurrent_requests: Option<i64>,
    #[serde(default)]
    page_size: Option<u32>,
}

impl RawRegistryConfig {
    /// Resolves `__ENV:` indirections and normalises limits.
    ///
    /// `lookup` reads environment variables.
    pub fn resolve<F>(self, lookup: F) -> Result<RegistryConfig>
    where
        F: Fn(&str) -> Option<String>,
    {
        let username = self
            .username
            .map(|v| resolve_credential("username", &v, &lookup))
            .transpose()?;
        let password = self
            .password
            .map(|v| resolve_credential("password", &v, &lookup))
            .transpose()?;

        let auth = match (username, password) {
            (Some(username), Some(password)) => RegistryAuth::basic(username, password),
            (None, None) => RegistryAuth::None,
            _ => bail!("both username and password are required for basic authentication"),
        };

        let mut config = RegistryConfig::new(self.registry_url.trim())
            .with_auth(auth)
            .with_timeout(normalize_timeout(self.timeout))
            .with_max_concurrent_requests(normalize_max_requests(self.max_concurrent_requests));

        if let Some(proxy) = self.proxy.and_then(|v| resolve_proxy(&v, &lookup)) {
            validate_proxy(&proxy)?;
            config = config.with_proxy(proxy);
        }

        if let Some(page_size) = self.page_size.filter(|n| *n > 0) {
            config = config.with_page_size(page_size);
        }

        Ok(config)
    }
}

/// Everything a run needs from the configuration directory.
#[derive(Debug)]
pub struct Settings {
    /// Registry client configuration.
    pub registry: RegistryConfig,
    /// Validated jobs from the selected job file.
    pub jobs: Vec<Job>,
}

/// Loads the registry configuration and the requested job file.
pub fn load(dir: &Path, kind: JobFile) -> Result<Settings> {
    let registry = load_registry(dir, |name| std::env::var(name).ok())?;
    let jobs = load_jobs(&find_file(dir, kind.stem())?, kind)?;
    Ok(Settings { registry, jobs })
}

/// Loads `config.yaml` from `dir`.
pub fn load_registry<F>(dir: &Path, lookup: F) -> Result<RegistryConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let path = find_file(dir, "config")?;
    let raw: RawRegistryConfig = read_yaml(&path)?;
    raw.resolve(lookup)
        .with_context(|| format!("invalid registry configuration in {}", path.display()))
}

/// Loads and validates a job file.
///
/// Manual jobs never run periodically, so their interval is forced to zero.
pub fn load_jobs(path: &Path, kind: JobFile) -> Result<Vec<Job>> {
    let mut jobs: Vec<Job> = read_yaml(path)?;

    validate_jobs(&jobs).with_context(|| format!("invalid jobs in {}", path.display()))?;

    if kind == JobFile::Manual {
        for job in jobs.iter_mut().filter(|job| job.clean_every_n_hours != 0) {
            info!(job = %job.name, "periodic cleanup disabled for manual job");
            job.clean_every_n_hours = 0;
        }
    }

    Ok(jobs)
}

/// Finds `<stem>.yaml` or `<stem>.yml` in `dir`.
pub fn find_file(dir: &Path, stem: &str) -> Result<PathBuf> {
    ["yaml", "yml"]
        .iter()
        .map(|ext| dir.join(format!("{stem}.{ext}")))
        .find(|path| path.is_file())
        .with_context(|| format!("missing {stem}.yaml in {}", dir.display()))
}

fn read_yaml<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    serde_yaml::from_str(&contents).with_context(|| format!("failed to parse {}", path.display()))
}

fn env_name(value: &str) -> Option<&str> {
    value.trim().strip_prefix(ENV_PREFIX).map(str::trim)
}

fn resolve_credential<F>(field: &str, value: &str, lookup: &F) -> Result<String>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(var) = env_name(value) else {
        return Ok(value.to_string());
    };
    match lookup(var).filter(|v| !v.is_empty()) {
        Some(resolved) => Ok(resolved),
        None => bail!("{field} refers to environment variable {var}, which is not set"),
    }
}

fn resolve_proxy<F>(value: &str, lookup: &F) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    let resolved = match env_name(value) {
        Some(var) => lookup(var)?,
        None => value.to_string(),
    };
    let resolved = resolved.trim();
    (!resolved.is_empty()).then(|| resolved.to_string())
}

fn validate_proxy(proxy: &str) -> Result<()> {
    let url = url::Url::parse(proxy)
        .with_context(|| format!("proxy must be a valid url <scheme>://<address>[:port], got {proxy}"))?;
    if url.host_str().is_none() {
        bail!("proxy must be a valid url <scheme>://<address>[:port], got {proxy}");
    }
    Ok(())
}

fn normalize_timeout(timeout: Option<i64>) -> Duration {
    match timeout {
        None => DEFAULT_TIMEOUT,
        Some(secs @ 1..=MAX_TIMEOUT_SECS) => Duration::from_secs(secs.unsigned_abs()),
        Some(secs) => {
            warn!(
                timeout = secs,
                "timeout must be in range 1-{MAX_TIMEOUT_SECS}, using {}s",
                DEFAULT_TIMEOUT.as_secs()
            );
            DEFAULT_TIMEOUT
        }
    }
}

fn normalize_max_requests(max: Option<i64>) -> usize {
    match max {
        None => DEFAULT_MAX_CONCURRENT_REQUESTS,
        Some(n) if n > 0 => usize::try_from(n).unwrap_or(DEFAULT_MAX_CONCURRENT_REQUESTS),
        Some(n) => {
            warn!(
                max_concurrent_requests = n,
                "max_concurrent_requests must be greater than 0, using {FALLBACK_MAX_CONCURRENT_REQUESTS}"
            );
            FALLBACK_MAX_CONCURRENT_REQUESTS
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::fs;

    const CONFIG: &str = r#"
registry_url: https://registry.example.com/v2/
username: "__ENV: REG_USER"
password: secret
"#;

    const JOBS: &str = r#"
- name: clean-dev
  description: dev builds
  repositories:
    - backend
    - r/team-\w+/
  tag_regexps:
    - dev-
  save_last: 5
  older_than_days: 7
  clean_every_n_hours: 24
- name: clean-rc
  repositories: [frontend]
  tag_regexps: ['v\d+\.\d+\.\d+-rc']
  save_last: 1
  older_than_days: 14
  clean_every_n_hours: 6
"#;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    fn raw(yaml: &str) -> RawRegistryConfig {
        serde_yaml::from_str(yaml).unwrap()
    }

    #[test]
    fn test_resolve_env_credentials() {
        let config = raw(CONFIG).resolve(env(&[("REG_USER", "robot")])).unwrap();

        assert_eq!(config.url, "https://registry.example.com");
        assert_eq!(config.auth, RegistryAuth::basic("robot", "secret"));
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert_eq!(config.max_concurrent_requests, DEFAULT_MAX_CONCURRENT_REQUESTS);
        assert!(config.proxy.is_none());
    }

    #[test]
    fn test_missing_credential_variable_is_fatal() {
        let err = raw(CONFIG).resolve(env(&[])).unwrap_err();
        assert!(err.to_string().contains("REG_USER"));
    }

    #[test]
    fn test_half_configured_auth_is_rejected() {
        let result = raw("registry_url: http://r\nusername: robot\n").resolve(env(&[]));
        assert!(result.is_err());
    }

    #[test]
    fn test_no_credentials_means_anonymous() {
        let config = raw("registry_url: http://r\n").resolve(env(&[])).unwrap();
        assert_eq!(config.auth, RegistryAuth::None);
    }

    #[test]
    fn test_out_of_range_limits_are_normalized() {
        let config = raw("registry_url: http://r\ntimeout: 500\nmax_concurrent_requests: 0\n")
            .resolve(env(&[]))
            .unwrap();
        assert_eq!(config.timeout, Duration::from_secs(20));
        assert_eq!(config.max_concurrent_requests, 10);

        let config = raw("registry_url: http://r\ntimeout: 0\nmax_concurrent_requests: 3\n")
            .resolve(env(&[]))
            .unwrap();
        assert_eq!(config.timeout, Duration::from_secs(20));
        assert_eq!(config.max_concurrent_requests, 3);

        let config = raw("registry_url: http://r\ntimeout: 120\n")
            .resolve(env(&[]))
            .unwrap();
        assert_eq!(config.timeout, Duration::from_secs(120));
    }

    #[test]
    fn test_proxy_handling() {
        let config = raw("registry_url: http://r\nproxy: \"__ENV: HTTP_PROXY_URL\"\n")
            .resolve(env(&[]))
            .unwrap();
        assert!(config.proxy.is_none());

        let config = raw("registry_url: http://r\nproxy: \"__ENV: HTTP_PROXY_URL\"\n")
            .resolve(env(&[("HTTP_PROXY_URL", "http://proxy.local:3128")]))
            .unwrap();
        assert_eq!(config.proxy.as_deref(), Some("http://proxy.local:3128"));

        assert!(raw("registry_url: http://r\nproxy: proxy.local\n")
            .resolve(env(&[]))
            .is_err());
    }

    #[test]
    fn test_page_size_zero_is_ignored() {
        let config = raw("registry_url: http://r\npage_size: 0\n")
            .resolve(env(&[]))
            .unwrap();
        assert!(config.page_size.is_none());

        let config = raw("registry_url: http://r\npage_size: 50\n")
            .resolve(env(&[]))
            .unwrap();
        assert_eq!(config.page_size, Some(50));
    }

    #[test]
    fn test_find_file_accepts_yml() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("manual.yml"), "[]").unwrap();

        assert_eq!(
            find_file(dir.path(), "manual").unwrap(),
            dir.path().join("manual.yml")
        );
        assert!(find_file(dir.path(), "jobs").is_err());
    }

    #[test]
    fn test_load_watch_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.yaml");
        fs::write(&path, JOBS).unwrap();

        let jobs = load_jobs(&path, JobFile::Watch).unwrap();

        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs[0].name, "clean-dev");
        assert!(jobs[0].needs_catalog());
        assert_eq!(jobs[0].clean_every_n_hours, 24);
        assert_eq!(jobs[1].tag_regexps.len(), 1);
    }

    #[test]
    fn test_manual_jobs_lose_their_interval() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("manual.yaml");
        fs::write(&path, JOBS).unwrap();

        let jobs = load_jobs(&path, JobFile::Manual).unwrap();

        assert!(jobs.iter().all(Job::is_manual_only));
    }

    #[test]
    fn test_invalid_jobs_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.yaml");

        fs::write(
            &path,
            "- name: a\n  repositories: [r]\n  tag_regexps: []\n  save_last: 1\n  older_than_days: 1\n",
        )
        .unwrap();
        assert!(load_jobs(&path, JobFile::Watch).is_err());

        fs::write(
            &path,
            "- name: a\n  repositories: [r]\n  tag_regexps: ['(']\n  save_last: 1\n  older_than_days: 1\n",
        )
        .unwrap();
        assert!(load_jobs(&path, JobFile::Watch).is_err());
    }

    #[test]
    fn test_duplicate_job_names_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("jobs.yaml");
        let job = "- name: a\n  repositories: [r]\n  tag_regexps: [x]\n  save_last: 1\n  older_than_days: 1\n";
        fs::write(&path, format!("{job}{job}")).unwrap();

        let err = load_jobs(&path, JobFile::Watch).unwrap_err();
        assert!(format!("{err:#}").contains("defined more than once"));
    }

    #[test]
    fn test_load_registry_from_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("config.yml"), CONFIG).unwrap();

        let config = load_registry(dir.path(), env(&[("REG_USER", "robot")])).unwrap();
        assert_eq!(config.api_base(), "https://registry.example.com/v2");
    }
}
