mod channels;
mod flows;
mod llm;
mod server;
mod sessions;
mod tenant;

pub use channels::*;
pub use flows::*;
pub use llm::*;
pub use server::*;
pub use sessions::*;
pub use tenant::*;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

// ─────────────────────────────────────────────────────────────────
// Top-level config
// ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub sessions: SessionStoreConfig,
    #[serde(default)]
    pub flows: FlowsConfig,
    /// Per-tenant behavior, keyed by agent/tenant id. An id absent from
    /// this map falls back to `TenantConfig::default()`.
    #[serde(default)]
    pub tenants: HashMap<String, TenantConfig>,
    /// Maps an inbound `channel` id to the flow/tenant it should run
    /// against. A channel absent from this map falls back to using its
    /// own name as both the flow id and the tenant id.
    #[serde(default)]
    pub channels: HashMap<String, ChannelConfig>,
}

impl Config {
    pub fn tenant(&self, tenant_id: &str) -> TenantConfig {
        self.tenants.get(tenant_id).cloned().unwrap_or_default()
    }

    /// Resolve a channel id to `(flow_id, tenant_id)`, defaulting an
    /// unmapped channel to itself on both counts.
    pub fn resolve_channel(&self, channel: &str) -> (String, String) {
        match self.channels.get(channel) {
            Some(mapping) => (mapping.flow_id.clone(), mapping.tenant_id().to_string()),
            None => (channel.to_string(), channel.to_string()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Config validation
// ─────────────────────────────────────────────────────────────────

/// Severity level for a configuration issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigSeverity {
    Error,
    Warning,
}

/// A single configuration validation issue.
#[derive(Debug, Clone)]
pub struct ConfigIssue {
    pub severity: ConfigSeverity,
    pub field: String,
    pub message: String,
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self.severity {
            ConfigSeverity::Error => "ERROR",
            ConfigSeverity::Warning => "WARN",
        };
        write!(f, "[{tag}] {}: {}", self.field, self.message)
    }
}

impl Config {
    /// Validate the configuration and return a list of issues. An empty
    /// vec means everything looks good; any `Error`-severity issue aborts
    /// startup in the gateway binary.
    pub fn validate(&self) -> Vec<ConfigIssue> {
        let mut issues = Vec::new();

        if self.server.port == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Error,
                field: "server.port".into(),
                message: "port must be greater than 0".into(),
            });
        }

        if self.llm.provider != "stub" && std::env::var(&self.llm.api_key_env).is_err() {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: "llm.api_key_env".into(),
                message: format!(
                    "environment variable {} is unset; LLM calls will fail until it is configured",
                    self.llm.api_key_env
                ),
            });
        }

        if self.llm.max_schema_retries == 0 {
            issues.push(ConfigIssue {
                severity: ConfigSeverity::Warning,
                field: "llm.max_schema_retries".into(),
                message: "0 retries means any schema-invalid response falls back immediately"
                    .into(),
            });
        }

        for (tenant_id, tenant) in &self.tenants {
            if tenant.delay_variance_percent > 100 {
                issues.push(ConfigIssue {
                    severity: ConfigSeverity::Error,
                    field: format!("tenants.{tenant_id}.delay_variance_percent"),
                    message: "must be between 0 and 100".into(),
                });
            }
            if tenant.min_typing_duration_ms > tenant.max_typing_duration_ms {
                issues.push(ConfigIssue {
                    severity: ConfigSeverity::Error,
                    field: format!("tenants.{tenant_id}.min_typing_duration_ms"),
                    message: "must not exceed max_typing_duration_ms".into(),
                });
            }
        }

        if let Some(hour) = self.sessions.lifecycle.daily_reset_hour {
            if hour > 23 {
                issues.push(ConfigIssue {
                    severity: ConfigSeverity::Error,
                    field: "sessions.lifecycle.daily_reset_hour".into(),
                    message: "must be between 0 and 23".into(),
                });
            }
        }

        issues
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_no_errors() {
        let config = Config::default();
        let issues: Vec<_> = config
            .validate()
            .into_iter()
            .filter(|i| i.severity == ConfigSeverity::Error)
            .collect();
        assert!(issues.is_empty(), "{issues:?}");
    }

    #[test]
    fn zero_port_is_an_error() {
        let mut config = Config::default();
        config.server.port = 0;
        let issues = config.validate();
        assert!(issues
            .iter()
            .any(|i| i.field == "server.port" && i.severity == ConfigSeverity::Error));
    }

    #[test]
    fn tenant_lookup_falls_back_to_default() {
        let config = Config::default();
        let tenant = config.tenant("unknown");
        assert_eq!(tenant.delay_variance_percent, 20);
    }

    #[test]
    fn invalid_typing_duration_range_is_an_error() {
        let mut config = Config::default();
        let mut tenant = TenantConfig::default();
        tenant.min_typing_duration_ms = 5000;
        tenant.max_typing_duration_ms = 1000;
        config.tenants.insert("acme".into(), tenant);
        let issues = config.validate();
        assert!(issues.iter().any(|i| i.field == "tenants.acme.min_typing_duration_ms"));
    }
}
