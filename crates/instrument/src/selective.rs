//! Selective instrumentation filter.
//!
//! Process-wide options decide which packages emit events. Loaded from the
//! environment on first use, mutable at runtime with [`set_options`]:
//!
//! - `CHRONOGO_ENABLED` — `1|true|yes` enables, anything else disables
//! - `CHRONOGO_INSTRUMENT` — comma list of include patterns
//! - `CHRONOGO_EXCLUDE` — comma list of exclude patterns
//! - `CHRONOGO_INSTRUMENT_STDLIB` — instrument packages without a dot
//!
//! Patterns match package paths exactly; `pkg/...` matches by prefix.

use std::sync::{OnceLock, PoisonError, RwLock};

/// Name of the events-file override honored by a target's embedded recorder.
pub const EVENTS_FILE_ENV: &str = "CHRONOGO_EVENTS_FILE";

/// Configuration for selective instrumentation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentOptions {
    /// Master switch; nothing emits when false.
    pub enabled: bool,
    /// Package patterns to instrument. Empty means all packages.
    pub include: Vec<String>,
    /// Package patterns to exclude. Takes precedence over `include`.
    pub exclude: Vec<String>,
    /// Whether standard-library packages (no dot in the path) emit.
    pub instrument_stdlib: bool,
}

impl Default for InstrumentOptions {
    fn default() -> Self {
        Self {
            enabled: true,
            include: Vec::new(),
            exclude: Vec::new(),
            instrument_stdlib: false,
        }
    }
}

impl InstrumentOptions {
    /// Build options from the `CHRONOGO_*` environment variables, falling
    /// back to defaults for anything unset.
    pub fn from_env() -> Self {
        let mut options = Self::default();

        if let Ok(enabled) = std::env::var("CHRONOGO_ENABLED") {
            options.enabled = parse_bool(&enabled);
        }
        if let Ok(includes) = std::env::var("CHRONOGO_INSTRUMENT") {
            options.include = split_patterns(&includes);
        }
        if let Ok(excludes) = std::env::var("CHRONOGO_EXCLUDE") {
            options.exclude = split_patterns(&excludes);
        }
        if let Ok(stdlib) = std::env::var("CHRONOGO_INSTRUMENT_STDLIB") {
            options.instrument_stdlib = parse_bool(&stdlib);
        }

        options
    }

    /// Whether a package at `package_path` should emit events.
    pub fn should_instrument(&self, package_path: &str) -> bool {
        if !self.enabled {
            return false;
        }

        // Standard-library packages have no dot in their import path.
        let is_stdlib = !package_path.contains('.');
        if is_stdlib && !self.instrument_stdlib {
            return false;
        }

        if self.exclude.iter().any(|p| matches_package(package_path, p)) {
            return false;
        }

        if self.include.is_empty() {
            return true;
        }
        self.include.iter().any(|p| matches_package(package_path, p))
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(value, "1" | "true" | "yes")
}

fn split_patterns(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Match a package path against a pattern; `pkg/...` is a prefix wildcard.
fn matches_package(package_path: &str, pattern: &str) -> bool {
    if let Some(prefix) = pattern.strip_suffix("...") {
        return package_path.starts_with(prefix);
    }
    package_path == pattern
}

fn options_cell() -> &'static RwLock<InstrumentOptions> {
    static CELL: OnceLock<RwLock<InstrumentOptions>> = OnceLock::new();
    CELL.get_or_init(|| RwLock::new(InstrumentOptions::from_env()))
}

/// Snapshot of the current options.
pub fn options() -> InstrumentOptions {
    options_cell()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

/// Replace the process-wide options.
pub fn set_options(new_options: InstrumentOptions) {
    *options_cell()
        .write()
        .unwrap_or_else(PoisonError::into_inner) = new_options;
}

/// Whether a package at `package_path` should emit, per current options.
pub fn should_instrument(package_path: &str) -> bool {
    options_cell()
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .should_instrument(package_path)
}

/// Events-file path a target's embedded recorder should use, when the
/// `CHRONOGO_EVENTS_FILE` override is set.
pub fn events_file_from_env() -> Option<std::path::PathBuf> {
    std::env::var_os(EVENTS_FILE_ENV).map(std::path::PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options_with(
        enabled: bool,
        include: &[&str],
        exclude: &[&str],
        stdlib: bool,
    ) -> InstrumentOptions {
        InstrumentOptions {
            enabled,
            include: include.iter().map(|s| s.to_string()).collect(),
            exclude: exclude.iter().map(|s| s.to_string()).collect(),
            instrument_stdlib: stdlib,
        }
    }

    #[test]
    fn test_disabled_blocks_everything() {
        let options = options_with(false, &[], &[], true);
        assert!(!options.should_instrument("github.com/user/app"));
        assert!(!options.should_instrument("fmt"));
    }

    #[test]
    fn test_stdlib_excluded_by_default() {
        let options = InstrumentOptions::default();
        assert!(!options.should_instrument("fmt"));
        assert!(!options.should_instrument("runtime"));
        assert!(options.should_instrument("github.com/user/app"));
    }

    #[test]
    fn test_stdlib_opt_in() {
        let options = options_with(true, &[], &[], true);
        assert!(options.should_instrument("fmt"));
    }

    #[test]
    fn test_exclude_takes_precedence() {
        let options = options_with(
            true,
            &["github.com/user/..."],
            &["github.com/user/app/internal/..."],
            false,
        );
        assert!(options.should_instrument("github.com/user/app"));
        assert!(!options.should_instrument("github.com/user/app/internal/db"));
    }

    #[test]
    fn test_include_list_restricts() {
        let options = options_with(true, &["github.com/user/app"], &[], false);
        assert!(options.should_instrument("github.com/user/app"));
        assert!(!options.should_instrument("github.com/other/lib"));
    }

    #[test]
    fn test_prefix_wildcard() {
        assert!(matches_package("github.com/user/app/pkg", "github.com/user/..."));
        assert!(!matches_package("github.com/other/app", "github.com/user/..."));
        assert!(matches_package("exact/path", "exact/path"));
        assert!(!matches_package("exact/path/sub", "exact/path"));
    }

    #[test]
    fn test_parse_bool_values() {
        for value in ["1", "true", "yes"] {
            assert!(parse_bool(value));
        }
        for value in ["0", "false", "no", "TRUE", ""] {
            assert!(!parse_bool(value));
        }
    }

    #[test]
    fn test_split_patterns_trims_and_drops_empty() {
        assert_eq!(
            split_patterns(" a , b/... ,, c "),
            vec!["a".to_string(), "b/...".to_string(), "c".to_string()]
        );
    }

    #[test]
    fn test_from_env_reads_variables() {
        let _serial = crate::test_support::GLOBAL_STATE
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        std::env::set_var("CHRONOGO_ENABLED", "yes");
        std::env::set_var("CHRONOGO_INSTRUMENT", "github.com/user/...");
        std::env::set_var("CHRONOGO_EXCLUDE", "github.com/user/vendor/...");
        std::env::set_var("CHRONOGO_INSTRUMENT_STDLIB", "1");

        let options = InstrumentOptions::from_env();
        assert!(options.enabled);
        assert_eq!(options.include, vec!["github.com/user/...".to_string()]);
        assert_eq!(options.exclude, vec!["github.com/user/vendor/...".to_string()]);
        assert!(options.instrument_stdlib);

        std::env::remove_var("CHRONOGO_ENABLED");
        std::env::remove_var("CHRONOGO_INSTRUMENT");
        std::env::remove_var("CHRONOGO_EXCLUDE");
        std::env::remove_var("CHRONOGO_INSTRUMENT_STDLIB");
    }

    #[test]
    fn test_events_file_override() {
        let _serial = crate::test_support::GLOBAL_STATE
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        std::env::remove_var(EVENTS_FILE_ENV);
        assert_eq!(events_file_from_env(), None);
        std::env::set_var(EVENTS_FILE_ENV, "/tmp/custom.events");
        assert_eq!(
            events_file_from_env(),
            Some(std::path::PathBuf::from("/tmp/custom.events"))
        );
        std::env::remove_var(EVENTS_FILE_ENV);
    }

    #[test]
    fn test_set_options_roundtrip() {
        let _serial = crate::test_support::GLOBAL_STATE
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let original = options();
        let custom = options_with(true, &["x/..."], &[], false);
        set_options(custom.clone());
        assert_eq!(options(), custom);
        assert!(should_instrument("x/y.z"));
        set_options(original);
    }
}
