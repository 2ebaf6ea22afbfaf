//! Engine version parsing and range gating.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use semver::Version;

use crate::core::error::{Error, Result};

pub(crate) const V0_7_7: Version = Version::new(0, 7, 7);
pub(crate) const V0_10_0: Version = Version::new(0, 10, 0);
pub(crate) const V0_12_0: Version = Version::new(0, 12, 0);
pub(crate) const V0_13_0: Version = Version::new(0, 13, 0);
pub(crate) const V0_14_0: Version = Version::new(0, 14, 0);
pub(crate) const V0_15_2: Version = Version::new(0, 15, 2);
pub(crate) const V0_15_4: Version = Version::new(0, 15, 4);
pub(crate) const V1_4_0: Version = Version::new(1, 4, 0);
pub(crate) const V1_6_0: Version = Version::new(1, 6, 0);

static CORE_VERSION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^Terraform v(\d+\.\d+\.\d+(?:-[0-9A-Za-z.\-]+)?)\s*$").expect("valid regex")
});

static PROVIDER_VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\+ provider[ .](\S+) v(\S+)$").expect("valid regex"));

/// Versions reported by `terraform version`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionInfo {
    pub core: Version,
    pub providers: BTreeMap<String, Version>,
}

/// Parse the text output of `terraform version`.
///
/// The first line must carry the core version. Lines starting with
/// `+ provider` must each parse; anything else (upgrade notices, platform
/// lines) is ignored.
pub fn parse_version_output(stdout: &str) -> Result<VersionInfo> {
    let parse_err = |reason: String| Error::VersionParse {
        output: stdout.to_string(),
        reason,
    };

    let mut lines = stdout.lines().map(str::trim_end);
    let first = lines.next().unwrap_or_default();
    let captures = CORE_VERSION
        .captures(first)
        .ok_or_else(|| parse_err(format!("unrecognised first line {first:?}")))?;
    let core = Version::parse(&captures[1])
        .map_err(|e| parse_err(format!("invalid core version {:?}: {e}", &captures[1])))?;

    let mut providers = BTreeMap::new();
    for line in lines {
        if !line.starts_with("+ provider") {
            continue;
        }
        let captures = PROVIDER_VERSION
            .captures(line)
            .ok_or_else(|| parse_err(format!("unrecognised provider line {line:?}")))?;
        let version = Version::parse(&captures[2]).map_err(|e| {
            parse_err(format!(
                "invalid version {:?} for provider {}: {e}",
                &captures[2], &captures[1]
            ))
        })?;
        providers.insert(captures[1].to_string(), version);
    }

    Ok(VersionInfo { core, providers })
}

/// Check `actual` against `[min, max)`, ignoring pre-release tags.
pub(crate) fn check_range(
    feature: &str,
    actual: &Version,
    min: Option<&Version>,
    max: Option<&Version>,
) -> Result<()> {
    let core = Version::new(actual.major, actual.minor, actual.patch);
    let above_min = min.map_or(true, |min| core >= *min);
    let below_max = max.map_or(true, |max| core < *max);
    if above_min && below_max {
        return Ok(());
    }
    Err(Error::VersionMismatch {
        feature: feature.to_string(),
        actual: actual.to_string(),
        min_inclusive: min.map_or_else(|| "-".to_string(), Version::to_string),
        max_exclusive: max.map_or_else(|| "-".to_string(), Version::to_string),
    })
}

/// Cached result of the last version query.
#[derive(Debug, Default)]
pub(crate) struct VersionCache {
    pub(crate) info: Option<VersionInfo>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_core_and_providers() {
        let info = parse_version_output(
            "Terraform v1.2.3-beta\n+ provider registry.terraform.io/foo/bar v0.1.0\n",
        )
        .unwrap();
        assert_eq!(info.core, Version::parse("1.2.3-beta").unwrap());
        assert_eq!(
            info.providers.get("registry.terraform.io/foo/bar"),
            Some(&Version::new(0, 1, 0))
        );
    }

    #[test]
    fn test_parse_single_line() {
        let info = parse_version_output("Terraform v0.12.26").unwrap();
        assert_eq!(info.core, Version::new(0, 12, 26));
        assert!(info.providers.is_empty());
    }

    #[test]
    fn test_parse_legacy_provider_and_noise() {
        let out = "Terraform v0.11.14\n+ provider.null v2.1.2\n\nYour version of Terraform is out of date! The latest version\nis 1.5.0.\n";
        let info = parse_version_output(out).unwrap();
        assert_eq!(info.core, Version::new(0, 11, 14));
        assert_eq!(info.providers.get("null"), Some(&Version::new(2, 1, 2)));
    }

    #[test]
    fn test_parse_crlf() {
        let info = parse_version_output("Terraform v1.5.7\r\non linux_amd64\r\n").unwrap();
        assert_eq!(info.core, Version::new(1, 5, 7));
    }

    #[test]
    fn test_parse_rejects_foreign_output() {
        let err = parse_version_output("OpenTofu v1.6.0\n").unwrap_err();
        assert!(matches!(err, Error::VersionParse { .. }));
    }

    #[test]
    fn test_parse_bad_provider_line_is_fatal() {
        let err = parse_version_output("Terraform v1.0.0\n+ provider foo/bar vnot-a-version\n")
            .unwrap_err();
        assert!(matches!(err, Error::VersionParse { .. }));
    }

    #[test]
    fn test_range_bounds() {
        let v = Version::new(0, 12, 0);
        assert!(check_range("x", &v, Some(&V0_12_0), None).is_ok());
        assert!(check_range("x", &v, Some(&V0_12_0), Some(&V0_13_0)).is_ok());
        assert!(check_range("x", &v, None, Some(&V0_12_0)).is_err());
        assert!(check_range("x", &Version::new(0, 13, 0), Some(&V0_12_0), Some(&V0_13_0)).is_err());
    }

    #[test]
    fn test_range_ignores_prerelease() {
        let v = Version::parse("0.12.0-beta1").unwrap();
        assert!(check_range("x", &v, Some(&V0_12_0), None).is_ok());
    }

    #[test]
    fn test_mismatch_reports_open_bound_as_dash() {
        let err = check_range("show", &Version::new(0, 11, 14), Some(&V0_12_0), None).unwrap_err();
        match err {
            Error::VersionMismatch {
                actual,
                min_inclusive,
                max_exclusive,
                ..
            } => {
                assert_eq!(actual, "0.11.14");
                assert_eq!(min_inclusive, "0.12.0");
                assert_eq!(max_exclusive, "-");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
