//! Bridge from `lifeline_config::Config` to runtime types.
//!
//! The config crate has no dependencies on other internal crates, so the
//! string-typed settings it validates are turned into domain types here.

use lifeline_capsule::StopPolicy;
use lifeline_config::Config;

use crate::RuntimeConfig;

/// Convert config to [`RuntimeConfig`].
#[must_use]
pub fn to_runtime_config(cfg: &Config) -> RuntimeConfig {
    RuntimeConfig {
        name: cfg.runtime.name.clone(),
        stop_policy: to_stop_policy(&cfg.runtime.stop_policy),
        warn_without_handlers: cfg.runtime.warn_without_handlers,
    }
}

/// Map a `runtime.stop_policy` value. Unknown values drain.
#[must_use]
pub fn to_stop_policy(value: &str) -> StopPolicy {
    match value {
        "fail_fast" => StopPolicy::FailFast,
        _ => StopPolicy::DrainAll,
    }
}
