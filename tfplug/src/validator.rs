//! Built-in attribute validators

use crate::schema::{Validator, ValidatorRequest, ValidatorResponse};
use crate::types::{Diagnostic, Dynamic};
use std::sync::Arc;

fn response(diagnostics: Vec<Diagnostic>) -> ValidatorResponse {
    ValidatorResponse { diagnostics }
}

pub struct StringLengthValidator {
    pub min: Option<usize>,
    pub max: Option<usize>,
}

impl StringLengthValidator {
    pub fn not_empty() -> Arc<dyn Validator> {
        Arc::new(Self {
            min: Some(1),
            max: None,
        })
    }
}

impl Validator for StringLengthValidator {
    fn description(&self) -> String {
        format!("string length between {:?} and {:?}", self.min, self.max)
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let mut diagnostics = vec![];
        if let Some(s) = request.config_value.value.as_str() {
            if let Some(min) = self.min {
                if s.len() < min {
                    diagnostics.push(
                        Diagnostic::error(
                            format!("{} must have minimum length of {}", request.path, min),
                            format!("Got length {}", s.len()),
                        )
                        .with_attribute(request.path.clone()),
                    );
                }
            }
            if let Some(max) = self.max {
                if s.len() > max {
                    diagnostics.push(
                        Diagnostic::error(
                            format!("{} must have maximum length of {}", request.path, max),
                            format!("Got length {}", s.len()),
                        )
                        .with_attribute(request.path.clone()),
                    );
                }
            }
        }
        response(diagnostics)
    }
}

/// Accepts only the listed strings
pub struct StringOneOf {
    pub values: Vec<String>,
    pub ignore_case: bool,
}

impl StringOneOf {
    pub fn create(values: &[&str]) -> Arc<dyn Validator> {
        Arc::new(Self {
            values: values.iter().map(|v| v.to_string()).collect(),
            ignore_case: false,
        })
    }

    pub fn ignore_case(values: &[&str]) -> Arc<dyn Validator> {
        Arc::new(Self {
            values: values.iter().map(|v| v.to_string()).collect(),
            ignore_case: true,
        })
    }
}

impl Validator for StringOneOf {
    fn description(&self) -> String {
        format!("value must be one of: {}", self.values.join(", "))
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let mut diagnostics = vec![];
        if let Some(s) = request.config_value.value.as_str() {
            let matched = self.values.iter().any(|v| {
                if self.ignore_case {
                    v.eq_ignore_ascii_case(s)
                } else {
                    v == s
                }
            });
            if !matched {
                diagnostics.push(
                    Diagnostic::error(
                        format!("Invalid value for {}", request.path),
                        format!("expected one of [{}], got {:?}", self.values.join(", "), s),
                    )
                    .with_attribute(request.path.clone()),
                );
            }
        }
        response(diagnostics)
    }
}

/// Accepts strings that parse as JSON
pub struct JsonString;

impl JsonString {
    pub fn create() -> Arc<dyn Validator> {
        Arc::new(Self)
    }
}

impl Validator for JsonString {
    fn description(&self) -> String {
        "value must be valid JSON".to_string()
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let mut diagnostics = vec![];
        if let Some(s) = request.config_value.value.as_str() {
            if let Err(e) = serde_json::from_str::<serde_json::Value>(s) {
                diagnostics.push(
                    Diagnostic::error(
                        format!("{} must be valid JSON", request.path),
                        e.to_string(),
                    )
                    .with_attribute(request.path.clone()),
                );
            }
        }
        response(diagnostics)
    }
}

pub struct NumberRangeValidator {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl NumberRangeValidator {
    pub fn at_least(min: f64) -> Arc<dyn Validator> {
        Arc::new(Self {
            min: Some(min),
            max: None,
        })
    }
}

impl Validator for NumberRangeValidator {
    fn description(&self) -> String {
        format!("number between {:?} and {:?}", self.min, self.max)
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let mut diagnostics = vec![];
        if let Some(n) = request.config_value.value.as_number() {
            if let Some(min) = self.min {
                if n < min {
                    diagnostics.push(
                        Diagnostic::error(
                            format!("{} must be at least {}", request.path, min),
                            format!("Got {}", n),
                        )
                        .with_attribute(request.path.clone()),
                    );
                }
            }
            if let Some(max) = self.max {
                if n > max {
                    diagnostics.push(
                        Diagnostic::error(
                            format!("{} must be at most {}", request.path, max),
                            format!("Got {}", n),
                        )
                        .with_attribute(request.path.clone()),
                    );
                }
            }
        }
        response(diagnostics)
    }
}

/// Bounds the number of elements of a list or set
pub struct ListLengthValidator {
    pub min: Option<usize>,
    pub max: Option<usize>,
}

impl ListLengthValidator {
    pub fn not_empty() -> Arc<dyn Validator> {
        Arc::new(Self {
            min: Some(1),
            max: None,
        })
    }
}

impl Validator for ListLengthValidator {
    fn description(&self) -> String {
        format!("between {:?} and {:?} elements", self.min, self.max)
    }

    fn validate(&self, request: ValidatorRequest) -> ValidatorResponse {
        let mut diagnostics = vec![];
        if let Dynamic::List(items) = &request.config_value.value {
            if let Some(min) = self.min {
                if items.len() < min {
                    diagnostics.push(
                        Diagnostic::error(
                            format!("{} must have at least {} items", request.path, min),
                            format!("Got {} items", items.len()),
                        )
                        .with_attribute(request.path.clone()),
                    );
                }
            }
            if let Some(max) = self.max {
                if items.len() > max {
                    diagnostics.push(
                        Diagnostic::error(
                            format!("{} must have at most {} items", request.path, max),
                            format!("Got {} items", items.len()),
                        )
                        .with_attribute(request.path.clone()),
                    );
                }
            }
        }
        response(diagnostics)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{AttributePath, DynamicValue};

    fn request(value: Dynamic) -> ValidatorRequest {
        ValidatorRequest {
            config_value: DynamicValue::new(value),
            path: AttributePath::new("test_field"),
        }
    }

    #[test]
    fn string_length_validator_rejects_too_short() {
        let validator = StringLengthValidator {
            min: Some(5),
            max: None,
        };

        let response = validator.validate(request(Dynamic::String("hi".to_string())));

        assert_eq!(response.diagnostics.len(), 1);
        assert!(response.diagnostics[0].summary.contains("minimum length"));
    }

    #[test]
    fn string_one_of_accepts_listed_value() {
        let validator = StringOneOf::create(&["alert", "deny", "none"]);
        let response = validator.validate(request(Dynamic::String("deny".to_string())));
        assert!(response.diagnostics.is_empty());
    }

    #[test]
    fn string_one_of_rejects_other_value() {
        let validator = StringOneOf::create(&["alert", "deny", "none"]);
        let response = validator.validate(request(Dynamic::String("block".to_string())));
        assert_eq!(response.diagnostics.len(), 1);
        assert!(response.diagnostics[0].detail.contains("alert, deny, none"));
    }

    #[test]
    fn string_one_of_ignore_case() {
        let validator = StringOneOf::ignore_case(&["STAGING", "PRODUCTION"]);
        let response = validator.validate(request(Dynamic::String("staging".to_string())));
        assert!(response.diagnostics.is_empty());
    }

    #[test]
    fn json_string_rejects_invalid_json() {
        let response = JsonString.validate(request(Dynamic::String("{not json".to_string())));
        assert_eq!(response.diagnostics.len(), 1);

        let response = JsonString.validate(request(Dynamic::String(r#"{"a":1}"#.to_string())));
        assert!(response.diagnostics.is_empty());
    }

    #[test]
    fn number_range_validator_rejects_too_small() {
        let validator = NumberRangeValidator {
            min: Some(10.0),
            max: None,
        };

        let response = validator.validate(request(Dynamic::Number(5.0)));

        assert_eq!(response.diagnostics.len(), 1);
        assert!(response.diagnostics[0].summary.contains("at least"));
    }

    #[test]
    fn list_length_validator_rejects_empty_set() {
        let response = ListLengthValidator::not_empty().validate(request(Dynamic::List(vec![])));
        assert_eq!(response.diagnostics.len(), 1);
    }
}
