//! Resource implementations

pub mod appsec;
pub mod property;

pub use appsec::{
    ApiConstraintsProtectionResource, AttackGroupConditionExceptionResource,
    RatePolicyActionResource,
};
pub use property::{PollConfig, PropertyActivationResource};

use crate::api::ApiError;
use crate::AkamaiProviderData;
use tfplug::resource::ConfigureResourceRequest;
use tfplug::types::Diagnostic;

/// Extracts the provider data every resource needs from configure
pub(crate) fn provider_data_from(
    request: ConfigureResourceRequest,
) -> Result<AkamaiProviderData, Diagnostic> {
    match request.provider_data {
        Some(data) => data
            .downcast_ref::<AkamaiProviderData>()
            .cloned()
            .ok_or_else(|| {
                Diagnostic::error(
                    "Invalid provider data",
                    "Failed to extract AkamaiProviderData from provider data",
                )
            }),
        None => Err(Diagnostic::error(
            "No provider data",
            "No provider data was provided to the resource",
        )),
    }
}

pub(crate) fn not_configured() -> Diagnostic {
    Diagnostic::error(
        "Provider not configured",
        "Provider data was not properly configured",
    )
}

pub(crate) fn api_error(summary: &str, err: &ApiError) -> Diagnostic {
    Diagnostic::error(summary, format!("API error: {}", err))
}
