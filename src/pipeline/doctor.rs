// src/pipeline/doctor.rs

//! Readiness checks behind `farewatch doctor`.
//!
//! Each check reports `ok`, `warn` or `fail`. Unconfigured optional
//! channels are warnings; half-configured ones and unusable providers or
//! directories are failures.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::Result;
use crate::models::Config;
use crate::provider::ProviderKind;

const WRITE_TEST_FILE: &str = ".farewatch-write-test";

/// Number of SMTP fields `missing_fields` can report.
const SMTP_REQUIRED_FIELDS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Ok,
    Warn,
    Fail,
}

impl fmt::Display for CheckStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Ok => "ok",
            Self::Warn => "warn",
            Self::Fail => "fail",
        })
    }
}

/// Outcome of one named check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DoctorCheck {
    pub name: &'static str,
    pub status: CheckStatus,
    pub message: String,
}

impl DoctorCheck {
    fn new(name: &'static str, status: CheckStatus, message: impl Into<String>) -> Self {
        Self {
            name,
            status,
            message: message.into(),
        }
    }
}

/// All checks with failure and warning totals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DoctorReport {
    pub ok: bool,
    pub failures: usize,
    pub warnings: usize,
    pub checks: Vec<DoctorCheck>,
}

impl DoctorReport {
    pub fn from_checks(checks: Vec<DoctorCheck>) -> Self {
        let count = |status: CheckStatus| checks.iter().filter(|c| c.status == status).count();
        let failures = count(CheckStatus::Fail);
        let warnings = count(CheckStatus::Warn);
        Self {
            ok: failures == 0,
            failures,
            warnings,
            checks,
        }
    }

    /// Checks that fail the command. Strict mode counts warnings too.
    pub fn effective_failures(&self, strict: bool) -> usize {
        if strict {
            self.failures + self.warnings
        } else {
            self.failures
        }
    }
}

/// Checks derived from configuration alone.
pub fn config_checks(config: &Config) -> Vec<DoctorCheck> {
    let mut checks = Vec::with_capacity(4);

    checks.push(match config.validate() {
        Ok(()) => DoctorCheck::new("config.values", CheckStatus::Ok, "configuration values valid"),
        Err(e) => DoctorCheck::new("config.values", CheckStatus::Fail, e.to_string()),
    });

    checks.push(match config.validate_provider() {
        Ok(ProviderKind::GoogleUrl) => DoctorCheck::new(
            "provider.auth",
            CheckStatus::Ok,
            "provider=google-url does not require API key",
        ),
        Ok(ProviderKind::SerpApi) => {
            DoctorCheck::new("provider.auth", CheckStatus::Ok, "serpapi key present")
        }
        Err(e) => DoctorCheck::new("provider.auth", CheckStatus::Fail, e.to_string()),
    });

    let missing = config.notify.smtp.missing_fields();
    checks.push(if missing.is_empty() {
        DoctorCheck::new("notify.email", CheckStatus::Ok, "smtp configuration complete")
    } else if missing.len() == SMTP_REQUIRED_FIELDS {
        DoctorCheck::new("notify.email", CheckStatus::Warn, "smtp is not configured")
    } else {
        DoctorCheck::new(
            "notify.email",
            CheckStatus::Fail,
            format!("missing required smtp fields: {}", missing.join(", ")),
        )
    });

    checks.push(if config.notify.webhook_url.trim().is_empty() {
        DoctorCheck::new("notify.webhook", CheckStatus::Warn, "webhook_url is not configured")
    } else {
        DoctorCheck::new("notify.webhook", CheckStatus::Ok, "webhook_url configured")
    });

    checks
}

/// Create `dir` if needed and prove a file can be written there.
pub fn ensure_writable_dir(dir: &Path) -> std::io::Result<()> {
    fs::create_dir_all(dir)?;
    let probe = dir.join(WRITE_TEST_FILE);
    fs::write(&probe, b"ok\n")?;
    fs::remove_file(&probe)
}

fn dir_check(name: &'static str, dir: Result<PathBuf>) -> DoctorCheck {
    let dir = match dir {
        Ok(dir) => dir,
        Err(e) => return DoctorCheck::new(name, CheckStatus::Fail, e.to_string()),
    };
    match ensure_writable_dir(&dir) {
        Ok(()) => DoctorCheck::new(name, CheckStatus::Ok, dir.display().to_string()),
        Err(e) => DoctorCheck::new(
            name,
            CheckStatus::Fail,
            format!("{}: {e}", dir.display()),
        ),
    }
}

/// Run every check: configuration, then the config and state directories.
pub fn run_doctor(config: &Config, config_dir: &Path, state_dir: Result<PathBuf>) -> DoctorReport {
    let mut checks = config_checks(config);
    checks.push(dir_check("paths.config", Ok(config_dir.to_path_buf())));
    checks.push(dir_check("paths.state", state_dir));

    let report = DoctorReport::from_checks(checks);
    log::debug!(
        "doctor: {} checks, {} failures, {} warnings",
        report.checks.len(),
        report.failures,
        report.warnings
    );
    report
}
