use std::env;

#[derive(Clone)]
pub(crate) struct ServiceContext {
    pub(crate) service_name: String,
    pub(crate) environment: String,
    pub(crate) component: String,
}

#[derive(Clone)]
pub(crate) struct ObservabilityConfig {
    pub(crate) service_context: ServiceContext,
    /// Filter used when RUST_LOG is unset.
    pub(crate) default_directive: String,
    pub(crate) ansi: bool,
    pub(crate) with_target: bool,
    /// Captured while parsing so they can be logged once tracing is up.
    pub(crate) warnings: Vec<String>,
}

impl ObservabilityConfig {
    pub(crate) fn from_env(component: &str) -> Self {
        Self::from_lookup(component, |key| env::var(key).ok())
    }

    fn from_lookup(component: &str, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let component = component.trim().to_string();
        let mut warnings = Vec::new();

        let service_name = lookup("SERVICE_NAME")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| component.clone());

        let environment = lookup("STAGE")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| "unknown".to_string());

        // Verbose by default everywhere except production.
        let default_directive = if environment == "production" {
            "info".to_string()
        } else {
            format!("info,{}=debug", component.replace('-', "_"))
        };

        let ansi = match lookup("LOG_ANSI") {
            Some(raw) => parse_bool(&raw).unwrap_or_else(|| {
                warnings.push(format!("LOG_ANSI is invalid (value: {raw}); defaulting to true"));
                true
            }),
            None => true,
        };

        let with_target = lookup("LOG_TARGET")
            .and_then(|raw| parse_bool(&raw))
            .unwrap_or(false);

        Self {
            service_context: ServiceContext {
                service_name,
                environment,
                component,
            },
            default_directive,
            ansi,
            with_target,
            warnings,
        }
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "t" | "yes" | "y" | "on" => Some(true),
        "0" | "false" | "f" | "no" | "n" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_with(vars: &[(&str, &str)]) -> ObservabilityConfig {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ObservabilityConfig::from_lookup("backend", |key| vars.get(key).cloned())
    }

    #[test]
    fn service_name_falls_back_to_component() {
        let config = config_with(&[]);
        assert_eq!(config.service_context.service_name, "backend");
        assert_eq!(config.service_context.environment, "unknown");
        assert_eq!(config.default_directive, "info,backend=debug");
    }

    #[test]
    fn production_keeps_info_level() {
        let config = config_with(&[("SERVICE_NAME", "music-studio"), ("STAGE", "production")]);
        assert_eq!(config.service_context.service_name, "music-studio");
        assert_eq!(config.default_directive, "info");
    }

    #[test]
    fn invalid_ansi_flag_is_reported() {
        let config = config_with(&[("LOG_ANSI", "sometimes")]);
        assert!(config.ansi);
        assert_eq!(config.warnings.len(), 1);

        let config = config_with(&[("LOG_ANSI", "off")]);
        assert!(!config.ansi);
        assert!(config.warnings.is_empty());
    }
}
