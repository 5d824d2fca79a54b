//! Check command implementation.
//!
//! Loads the registry configuration and every job file present without
//! contacting the registry.

use std::path::Path;

use anyhow::{bail, Result};
use tracing::info;

use tagsweep_core::Job;

use super::GlobalArgs;
use crate::config::{self, JobFile};

/// Runs the check command.
///
/// # Errors
///
/// Returns an error if the registry configuration or any present job file is
/// invalid, or if neither job file exists.
pub fn run(global: &GlobalArgs) -> Result<()> {
    let dir = &global.config_dir;
    info!(dir = %dir.display(), "checking configuration");

    let registry = config::load_registry(dir, |name| std::env::var(name).ok())?;

    println!("tagsweep configuration check");
    println!("============================");
    println!("Config dir: {}", dir.display());
    println!();
    println!("Registry:");
    println!("  URL:         {}", registry.api_base());
    println!("  Auth:        {}", if registry.auth.is_configured() { "basic" } else { "none" });
    println!("  Proxy:       {}", registry.proxy.as_deref().unwrap_or("none"));
    println!("  Timeout:     {}s", registry.timeout.as_secs());
    println!("  Concurrency: {}", registry.max_concurrent_requests);

    let mut found = 0;
    for kind in [JobFile::Watch, JobFile::Manual] {
        if let Some(jobs) = load_if_present(dir, kind)? {
            found += 1;
            print_jobs(kind, &jobs);
        }
    }

    if found == 0 {
        bail!("no job file found in {}", dir.display());
    }

    println!();
    println!("✓ Configuration is valid");
    Ok(())
}

fn load_if_present(dir: &Path, kind: JobFile) -> Result<Option<Vec<Job>>> {
    let Ok(path) = config::find_file(dir, kind.stem()) else {
        return Ok(None);
    };
    config::load_jobs(&path, kind).map(Some)
}

fn print_jobs(kind: JobFile, jobs: &[Job]) {
    println!();
    println!("{} jobs ({}):", kind.stem(), jobs.len());
    for job in jobs {
        let repositories: Vec<_> = job.repositories.iter().map(ToString::to_string).collect();
        let patterns: Vec<_> = job.tag_regexps.iter().map(|p| p.as_str()).collect();
        println!("  {}", job.name);
        println!("    repositories:  {}", repositories.join(", "));
        println!("    tag patterns:  {}", patterns.join(", "));
        println!(
            "    keep:          newest {}, younger than {} days",
            job.save_last, job.older_than_days
        );
        if job.is_manual_only() {
            println!("    schedule:      manual");
        } else {
            println!("    schedule:      every {} h", job.clean_every_n_hours);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    fn global(dir: PathBuf) -> GlobalArgs {
        GlobalArgs {
            config_dir: dir,
            state_dir: PathBuf::from("cache"),
            debug: false,
            http_logs: false,
        }
    }

    const JOB: &str = "- name: a\n  repositories: [r]\n  tag_regexps: [x]\n  save_last: 1\n  older_than_days: 1\n";

    #[test]
    fn test_check_valid_directory() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("config.yaml"), "registry_url: http://localhost:5000\n").unwrap();
        fs::write(dir.path().join("manual.yaml"), JOB).unwrap();

        run(&global(dir.path().to_path_buf())).unwrap();
    }

    #[test]
    fn test_check_requires_a_job_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("config.yaml"), "registry_url: http://localhost:5000\n").unwrap();

        assert!(run(&global(dir.path().to_path_buf())).is_err());
    }

    #[test]
    fn test_check_reports_invalid_job_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("config.yaml"), "registry_url: http://localhost:5000\n").unwrap();
        fs::write(dir.path().join("manual.yaml"), JOB).unwrap();
        fs::write(dir.path().join("jobs.yml"), "- name: broken\n").unwrap();

        assert!(run(&global(dir.path().to_path_buf())).is_err());
    }
}
