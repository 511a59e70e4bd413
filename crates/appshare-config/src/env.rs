//! Environment variable overrides applied on top of the TOML file.

use crate::schema::AppShareConfig;
use tracing::{debug, warn};

pub const ENV_ALLOWED_APPLICATIONS: &str = "APPSHARE_ALLOWED_APPLICATIONS";
pub const ENV_MAX_CONCURRENT_APPS: &str = "APPSHARE_MAX_CONCURRENT_APPS";
pub const ENV_DISPLAY: &str = "DISPLAY";

/// Unprefixed names, read when the prefixed variable is unset.
pub const ENV_ALLOWED_APPLICATIONS_BARE: &str = "ALLOWED_APPLICATIONS";
pub const ENV_MAX_CONCURRENT_APPS_BARE: &str = "MAX_CONCURRENT_APPS";

fn first_set<F>(lookup: &F, names: [&'static str; 2]) -> Option<(&'static str, String)>
where
    F: Fn(&str) -> Option<String>,
{
    names
        .into_iter()
        .find_map(|name| lookup(name).map(|value| (name, value)))
}

/// Apply overrides read through `lookup` (normally `std::env::var`).
///
/// Malformed values are logged and ignored.
pub fn apply_env_overrides<F>(config: &mut AppShareConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    if let Some((name, raw)) = first_set(
        &lookup,
        [ENV_ALLOWED_APPLICATIONS, ENV_ALLOWED_APPLICATIONS_BARE],
    ) {
        let allowed: Vec<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(String::from)
            .collect();
        debug!(count = allowed.len(), variable = name, "whitelist overridden from environment");
        config.apps.allowed = allowed;
    }

    if let Some((name, raw)) = first_set(
        &lookup,
        [ENV_MAX_CONCURRENT_APPS, ENV_MAX_CONCURRENT_APPS_BARE],
    ) {
        match raw.trim().parse::<u32>() {
            Ok(n) => config.apps.max_concurrent = n,
            Err(e) => warn!(value = %raw, "ignoring {name}: {e}"),
        }
    }

    if let Some(display) = lookup(ENV_DISPLAY) {
        if !display.trim().is_empty() {
            config.apps.display = display.trim().to_string();
        }
    }
}
