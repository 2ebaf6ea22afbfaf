//! Turning a failed engine run into a typed error.
//!
//! Patterns are tried in order; the first match wins.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::core::error::{EngineError, EngineErrorKind, Error, ExitError, LockInfo};

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("valid regex")
}

static UNSUPPORTED_VERSION: Lazy<Regex> = Lazy::new(|| {
    re(r"Error: The currently running version of Terraform doesn't meet the|Error: Unsupported Terraform Core version")
});
static VERSION_CONSTRAINT: Lazy<Regex> =
    Lazy::new(|| re(r#"required_version = "(.+)"|Required version: (.+)\b"#));
static MISSING_VAR: Lazy<Regex> = Lazy::new(|| {
    re(r#"Error: No value for required variable[\s\S]*?variable "([^"]+)""#)
});
static CLI_USAGE: Lazy<Regex> = Lazy::new(|| {
    re(r"Too many command line arguments|(?m)^Usage: terraform|Error: Invalid -\d+ option")
});
static NO_INIT: Lazy<Regex> = Lazy::new(|| {
    re(r#"Could not satisfy plugin requirements|Error: Could not load plugin|Please run "terraform init"|provider registry\.terraform\.io/.+: required by this configuration but no version is selected|Error: Inconsistent dependency lock file|Error: Backend initialization required|Error: Module not installed"#)
});
static NO_CONFIG: Lazy<Regex> = Lazy::new(|| re(r"Error: No configuration files"));
static NO_WORKSPACE: Lazy<Regex> =
    Lazy::new(|| re(r#"Workspace "(.+)" (?:doesn't|does not) exist"#));
static WORKSPACE_EXISTS: Lazy<Regex> = Lazy::new(|| re(r#"Workspace "(.+)" already exists"#));
static CONFIG_INVALID: Lazy<Regex> = Lazy::new(|| {
    re(r"There are some problems with the configuration, described below|configuration is not valid")
});
static STATE_LOCKED: Lazy<Regex> = Lazy::new(|| re(r"Error acquiring the state lock"));
static LOCK_INFO: Lazy<Regex> = Lazy::new(|| {
    re(r"Lock Info:\s*\n\s*ID:\s*([^\n]+)\n\s*Path:\s*([^\n]*)\n\s*Operation:\s*([^\n]+)\n\s*Who:\s*([^\n]+)\n\s*Version:\s*([^\n]+)\n\s*Created:\s*([^\n]+)")
});
static STATE_PLAN_READ: Lazy<Regex> = Lazy::new(|| {
    re(r"Terraform couldn't read the given file as a state or plan file\.|Error: Failed to read the given file as a state or plan file")
});
static LOCK_ID_INVALID: Lazy<Regex> = Lazy::new(|| re(r"Failed to unlock state: "));

/// Recognise the engine failure behind a non-zero exit.
pub fn classify_exit(exit: ExitError) -> Error {
    let kind = recognise(&exit.stderr);
    Error::Engine(EngineError { kind, exit })
}

fn recognise(stderr: &str) -> EngineErrorKind {
    if UNSUPPORTED_VERSION.is_match(stderr) {
        let constraint = VERSION_CONSTRAINT.captures(stderr).and_then(|c| {
            c.get(1)
                .or_else(|| c.get(2))
                .map(|m| m.as_str().trim().to_string())
        });
        return EngineErrorKind::UnsupportedEngineVersion { constraint };
    }
    if let Some(c) = MISSING_VAR.captures(stderr) {
        return EngineErrorKind::MissingVar {
            name: c[1].to_string(),
        };
    }
    if CLI_USAGE.is_match(stderr) {
        return EngineErrorKind::CliUsage;
    }
    if NO_INIT.is_match(stderr) {
        return EngineErrorKind::NoInit;
    }
    if NO_CONFIG.is_match(stderr) {
        return EngineErrorKind::NoConfig;
    }
    if let Some(c) = NO_WORKSPACE.captures(stderr) {
        return EngineErrorKind::NoWorkspace {
            name: c[1].to_string(),
        };
    }
    if let Some(c) = WORKSPACE_EXISTS.captures(stderr) {
        return EngineErrorKind::WorkspaceExists {
            name: c[1].to_string(),
        };
    }
    if CONFIG_INVALID.is_match(stderr) {
        return EngineErrorKind::ConfigInvalid;
    }
    if STATE_LOCKED.is_match(stderr) {
        let info = LOCK_INFO
            .captures(stderr)
            .map(|c| LockInfo {
                id: c[1].trim().to_string(),
                path: c[2].trim().to_string(),
                operation: c[3].trim().to_string(),
                who: c[4].trim().to_string(),
                version: c[5].trim().to_string(),
                created: c[6].trim().to_string(),
            })
            .unwrap_or_default();
        return EngineErrorKind::StateLocked(info);
    }
    if STATE_PLAN_READ.is_match(stderr) {
        return EngineErrorKind::StatePlanRead;
    }
    if LOCK_ID_INVALID.is_match(stderr) {
        return EngineErrorKind::LockIdInvalid;
    }
    EngineErrorKind::Unparsed
}
