//! Import helpers for simplifying resource import implementations

use crate::resource::{ImportResourceStateRequest, ImportResourceStateResponse, ImportedResource};
use crate::types::{AttributePath, Diagnostic, DynamicValue};

/// Sets the import ID to a specific attribute in state
///
/// Example: ID "prp_1:STAGING" -> state.id = "prp_1:STAGING"
pub fn import_state_passthrough_id(
    attr_path: AttributePath,
    request: &ImportResourceStateRequest,
) -> ImportResourceStateResponse {
    let mut response = ImportResourceStateResponse {
        imported_resources: vec![],
        diagnostics: vec![],
    };
    let mut state = DynamicValue::object();

    if let Err(e) = state.set_string(&attr_path, request.id.clone()) {
        response.diagnostics.push(
            Diagnostic::error(
                format!("Failed to set import ID: {}", e),
                format!(
                    "Could not set attribute '{}' to value '{}'",
                    attr_path, request.id
                ),
            )
            .with_attribute(attr_path),
        );
        return response;
    }

    response.imported_resources.push(ImportedResource {
        type_name: request.type_name.clone(),
        state,
        private: Vec::new(),
    });
    response
}

/// Splits a composite import ID such as "43253:AAAA_81230:134644"
///
/// The number of parts must match `fields`, which only names the parts in
/// the error message.
pub fn split_import_id(id: &str, fields: &[&str]) -> Result<Vec<String>, Diagnostic> {
    let parts: Vec<String> = id.split(':').map(str::to_string).collect();
    if parts.len() != fields.len() || parts.iter().any(String::is_empty) {
        return Err(Diagnostic::error(
            "Invalid import ID",
            format!(
                "import ID {:?} must have the form {}",
                id,
                fields.join(":")
            ),
        ));
    }
    Ok(parts)
}
