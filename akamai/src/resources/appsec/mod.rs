//! Application Security resources
//!
//! Each resource edits one piece of a security configuration version. When
//! `version` is not configured the configuration's latest version is used.

pub mod resource_api_constraints_protection;
pub mod resource_attack_group_condition_exception;
pub mod resource_rate_policy_action;

pub use resource_api_constraints_protection::ApiConstraintsProtectionResource;
pub use resource_attack_group_condition_exception::AttackGroupConditionExceptionResource;
pub use resource_rate_policy_action::RatePolicyActionResource;

use tfplug::plan_modifier::RequiresReplace;
use tfplug::schema::{Attribute, AttributeBuilder, AttributeType};
use tfplug::types::{Diagnostic, Dynamic, DynamicValue};
use tfplug::validator::{NumberRangeValidator, StringLengthValidator};

use crate::api::appsec::AppsecApi;
use crate::resources::api_error;
use crate::tools::{self, OptionalValue};

pub(crate) fn config_id_attribute() -> Attribute {
    AttributeBuilder::new("config_id", AttributeType::Number)
        .description("Security configuration ID")
        .required()
        .validator(NumberRangeValidator::at_least(1.0))
        .plan_modifier(RequiresReplace::create())
        .build()
}

pub(crate) fn version_attribute() -> Attribute {
    AttributeBuilder::new("version", AttributeType::Number)
        .description("Configuration version; the latest version when not set")
        .optional()
        .computed()
        .build()
}

pub(crate) fn policy_attribute(name: &str) -> Attribute {
    AttributeBuilder::new(name, AttributeType::String)
        .description("Security policy ID")
        .required()
        .validator(StringLengthValidator::not_empty())
        .plan_modifier(RequiresReplace::create())
        .build()
}

/// Configured version, else the configuration's latest version; the
/// resolved version is written back when state has none
pub(crate) async fn resolve_version(
    appsec: &AppsecApi<'_>,
    config_id: i64,
    state: &mut DynamicValue,
) -> Result<i64, Diagnostic> {
    if let Some(version) = tools::get_int_value("version", state).optional()? {
        return Ok(version);
    }

    let configuration = appsec
        .get_configuration(config_id)
        .await
        .map_err(|e| api_error("Failed to get security configuration", &e))?;
    tracing::debug!(
        "using latest version {} of configuration {}",
        configuration.latest_version,
        config_id
    );

    tools::set_value(
        state,
        "version",
        Dynamic::Number(configuration.latest_version as f64),
    )?;
    Ok(configuration.latest_version)
}

/// Parses a numeric import ID part
pub(crate) fn parse_id_part(value: &str, name: &str) -> Result<i64, Diagnostic> {
    value.parse::<i64>().map_err(|_| {
        Diagnostic::error(
            "Invalid import ID",
            format!("{} must be a number, got {:?}", name, value),
        )
    })
}
