//! Build-time metadata embedded by the build script.
//!
//! `evloop version` prints [`BuildInfo::current`] in full; the CLI also
//! attaches the commit and build time to its "Starting run" log line.

use std::fmt;

/// Where and how this binary was built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildInfo {
    pub version: &'static str,
    /// Short git commit hash, or `unknown` outside a checkout.
    pub commit: &'static str,
    /// Cargo profile (`debug` or `release`).
    pub profile: &'static str,
    /// Seconds since the Unix epoch.
    pub built_at: &'static str,
}

impl BuildInfo {
    pub const fn current() -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION"),
            commit: env!("EVLOOP_GIT_HASH"),
            profile: env!("EVLOOP_BUILD_PROFILE"),
            built_at: env!("EVLOOP_BUILD_TIMESTAMP"),
        }
    }

    /// One-line form for logs, e.g. `0.1.0 (abc1234, debug)`.
    pub fn short(&self) -> String {
        format!("{} ({}, {})", self.version, self.commit, self.profile)
    }
}

impl fmt::Display for BuildInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "evloop {}", self.version)?;
        writeln!(f, "commit:  {}", self.commit)?;
        writeln!(f, "profile: {}", self.profile)?;
        write!(f, "built:   {} (unix time)", self.built_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const FIXED: BuildInfo = BuildInfo {
        version: "0.1.0",
        commit: "abc1234",
        profile: "release",
        built_at: "1760000000",
    };

    #[test]
    fn test_version_output_lists_every_field() {
        assert_eq!(
            FIXED.to_string(),
            "evloop 0.1.0\ncommit:  abc1234\nprofile: release\nbuilt:   1760000000 (unix time)"
        );
        assert_eq!(FIXED.short(), "0.1.0 (abc1234, release)");
    }

    #[test]
    fn test_current_is_populated() {
        let info = BuildInfo::current();
        assert!(!info.commit.is_empty());
        assert!(info.built_at.parse::<u64>().is_ok());
        assert!(info.to_string().contains(info.built_at));
    }
}
