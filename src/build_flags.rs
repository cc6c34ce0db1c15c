//! Flag set for the external build orchestration script.
//!
//! `bt build` only parses and normalizes the flags; the script reads the
//! resulting name to bool map from stdout.

use std::collections::BTreeMap;

use clap::Args;
use serde::Serialize;

use bugtrack_core::error::{BugError, Result};

/// Build flags as accepted on the command line.
///
/// `--quiet` is the global flag and is passed in separately.
#[derive(Args, Debug, Clone, Default)]
#[allow(clippy::struct_excessive_bools)]
pub struct BuildArgs {
    /// Remove build outputs first
    #[arg(long)]
    pub clean: bool,

    /// Install dependencies before building
    #[arg(long)]
    pub deps: bool,

    /// Remove outputs and caches (implies --clean)
    #[arg(long)]
    pub expunge: bool,

    /// Build only the browser extension
    #[arg(long = "extension_only", alias = "extension-only", conflicts_with = "server_only")]
    pub extension_only: bool,

    /// Build the release package
    #[arg(long)]
    pub rpf: bool,

    /// Build only the server
    #[arg(long = "server_only", alias = "server-only")]
    pub server_only: bool,
}

/// Normalized build options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct BuildOptions {
    pub clean: bool,
    pub deps: bool,
    pub expunge: bool,
    pub extension_only: bool,
    pub quiet: bool,
    pub rpf: bool,
    pub server_only: bool,
}

impl BuildOptions {
    /// Normalize parsed flags.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if `extension_only` and `server_only` are both
    /// set.
    pub fn from_args(args: &BuildArgs, quiet: bool) -> Result<Self> {
        if args.extension_only && args.server_only {
            return Err(BugError::validation(
                "extension_only",
                "cannot be combined with server_only",
            ));
        }
        Ok(Self {
            clean: args.clean || args.expunge,
            deps: args.deps,
            expunge: args.expunge,
            extension_only: args.extension_only,
            quiet,
            rpf: args.rpf,
            server_only: args.server_only,
        })
    }

    /// Flag name to value, in name order.
    #[must_use]
    pub fn to_map(&self) -> BTreeMap<&'static str, bool> {
        BTreeMap::from([
            ("clean", self.clean),
            ("deps", self.deps),
            ("expunge", self.expunge),
            ("extension_only", self.extension_only),
            ("quiet", self.quiet),
            ("rpf", self.rpf),
            ("server_only", self.server_only),
        ])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        build: BuildArgs,
    }

    fn parse(args: &[&str]) -> std::result::Result<BuildArgs, clap::Error> {
        let argv = std::iter::once("build").chain(args.iter().copied());
        Harness::try_parse_from(argv).map(|h| h.build)
    }

    #[test]
    fn test_defaults_all_false() {
        let options = BuildOptions::from_args(&parse(&[]).unwrap(), false).unwrap();
        assert!(options.to_map().values().all(|v| !v));
        assert_eq!(options.to_map().len(), 7);
    }

    #[test]
    fn test_expunge_implies_clean() {
        let options = BuildOptions::from_args(&parse(&["--expunge"]).unwrap(), false).unwrap();
        assert!(options.clean);
        assert!(options.expunge);
    }

    #[test]
    fn test_underscore_and_dash_spellings() {
        let args = parse(&["--server_only", "--rpf", "--deps"]).unwrap();
        assert!(args.server_only && args.rpf && args.deps);
        let args = parse(&["--extension-only"]).unwrap();
        assert!(args.extension_only);
    }

    #[test]
    fn test_conflicting_flags() {
        assert!(parse(&["--extension_only", "--server_only"]).is_err());

        let args = BuildArgs {
            extension_only: true,
            server_only: true,
            ..Default::default()
        };
        let err = BuildOptions::from_args(&args, false).unwrap_err();
        assert!(matches!(err, BugError::Validation { .. }));
    }

    #[test]
    fn test_quiet_passes_through() {
        let options = BuildOptions::from_args(&BuildArgs::default(), true).unwrap();
        assert!(options.to_map()["quiet"]);
    }
}
