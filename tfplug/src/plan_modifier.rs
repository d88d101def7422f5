//! Built-in plan modifiers
//!
//! Plan modifiers run during PlanResourceChange after defaults are applied
//! and computed attributes are marked unknown. They can:
//! - Modify the planned value
//! - Mark an attribute as requiring replacement
//! - Add warnings or errors to the plan

use crate::schema::{PlanModifier, PlanModifierRequest, PlanModifierResponse};
use crate::types::Dynamic;
use std::sync::Arc;

/// Marks an attribute as requiring replacement when it changes
pub struct RequiresReplace;

impl RequiresReplace {
    pub fn create() -> Arc<dyn PlanModifier> {
        Arc::new(Self)
    }
}

impl PlanModifier for RequiresReplace {
    fn description(&self) -> String {
        "changing this attribute forces a new resource".to_string()
    }

    fn modify(&self, request: PlanModifierRequest) -> PlanModifierResponse {
        // creation and destruction never replace
        let requires_replace = !request.state_value.is_null()
            && !request.plan_value.is_null()
            && (request.plan_value.is_unknown()
                || !values_equal(&request.state_value.value, &request.plan_value.value));

        PlanModifierResponse {
            plan_value: request.plan_value,
            requires_replace,
            diagnostics: vec![],
        }
    }
}

/// Keeps the prior state value when the planned value is unknown
///
/// Useful for computed attributes that do not change once set, so that
/// unrelated updates do not show them as "known after apply".
pub struct UseStateForUnknown;

impl UseStateForUnknown {
    pub fn create() -> Arc<dyn PlanModifier> {
        Arc::new(Self)
    }
}

impl PlanModifier for UseStateForUnknown {
    fn description(&self) -> String {
        "once set, the value of this attribute in state will not change".to_string()
    }

    fn modify(&self, request: PlanModifierRequest) -> PlanModifierResponse {
        let plan_value = if request.plan_value.is_unknown() && !request.state_value.is_null() {
            request.state_value
        } else {
            request.plan_value
        };

        PlanModifierResponse {
            plan_value,
            requires_replace: false,
            diagnostics: vec![],
        }
    }
}

/// Compare two values, treating numbers within epsilon as equal
pub fn values_equal(a: &Dynamic, b: &Dynamic) -> bool {
    match (a, b) {
        (Dynamic::Null, Dynamic::Null) => true,
        (Dynamic::Unknown, Dynamic::Unknown) => true,
        (Dynamic::Bool(a), Dynamic::Bool(b)) => a == b,
        (Dynamic::Number(a), Dynamic::Number(b)) => (a - b).abs() < f64::EPSILON,
        (Dynamic::String(a), Dynamic::String(b)) => a == b,
        (Dynamic::List(a), Dynamic::List(b)) => {
            a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| values_equal(x, y))
        }
        (Dynamic::Map(a), Dynamic::Map(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(k, v)| b.get(k).is_some_and(|v2| values_equal(v, v2)))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AttributePath, DynamicValue};

    fn request(state: Dynamic, plan: Dynamic) -> PlanModifierRequest {
        PlanModifierRequest {
            config_value: DynamicValue::new(plan.clone()),
            state_value: DynamicValue::new(state),
            plan_value: DynamicValue::new(plan),
            path: AttributePath::new("network"),
        }
    }

    #[test]
    fn requires_replace_on_change() {
        let response = RequiresReplace.modify(request(
            Dynamic::String("STAGING".into()),
            Dynamic::String("PRODUCTION".into()),
        ));
        assert!(response.requires_replace);
    }

    #[test]
    fn requires_replace_ignores_equal_values() {
        let response = RequiresReplace.modify(request(
            Dynamic::String("STAGING".into()),
            Dynamic::String("STAGING".into()),
        ));
        assert!(!response.requires_replace);
    }

    #[test]
    fn requires_replace_ignores_creation() {
        let response =
            RequiresReplace.modify(request(Dynamic::Null, Dynamic::String("STAGING".into())));
        assert!(!response.requires_replace);
    }

    #[test]
    fn use_state_for_unknown_keeps_prior_value() {
        let response = UseStateForUnknown.modify(request(
            Dynamic::String("atv_1".into()),
            Dynamic::Unknown,
        ));
        assert_eq!(response.plan_value.value, Dynamic::String("atv_1".into()));
    }

    #[test]
    fn use_state_for_unknown_leaves_creation_unknown() {
        let response = UseStateForUnknown.modify(request(Dynamic::Null, Dynamic::Unknown));
        assert!(response.plan_value.is_unknown());
    }
}
