//! Default value providers for attributes
//!
//! Defaults are evaluated during planning for optional attributes whose
//! configuration value is null. An attribute with a default must also be
//! computed, otherwise Terraform rejects the planned value.

use crate::schema::{Default, DefaultRequest, DefaultResponse};
use crate::types::{Dynamic, DynamicValue};
use std::sync::Arc;

/// StaticDefault provides a static default value
pub struct StaticDefault {
    value: Dynamic,
}

impl StaticDefault {
    /// Create a new static default provider with the given value
    pub fn create(value: Dynamic) -> Arc<dyn Default> {
        Arc::new(Self { value })
    }

    /// Create a static string default
    pub fn string(value: &str) -> Arc<dyn Default> {
        Self::create(Dynamic::String(value.to_string()))
    }

    /// Create a static number default
    pub fn number(value: f64) -> Arc<dyn Default> {
        Self::create(Dynamic::Number(value))
    }

    /// Create a static boolean default
    pub fn bool(value: bool) -> Arc<dyn Default> {
        Self::create(Dynamic::Bool(value))
    }
}

impl Default for StaticDefault {
    fn description(&self) -> String {
        format!("static default value: {:?}", self.value)
    }

    fn default_value(&self, _request: DefaultRequest) -> DefaultResponse {
        DefaultResponse {
            value: DynamicValue::new(self.value.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AttributePath;

    #[test]
    fn static_defaults_return_their_value() {
        let request = || DefaultRequest {
            path: AttributePath::new("network"),
        };

        assert_eq!(
            StaticDefault::string("STAGING").default_value(request()).value.value,
            Dynamic::String("STAGING".to_string())
        );
        assert_eq!(
            StaticDefault::bool(true).default_value(request()).value.value,
            Dynamic::Bool(true)
        );
        assert_eq!(
            StaticDefault::number(0.0).default_value(request()).value.value,
            Dynamic::Number(0.0)
        );
    }
}
