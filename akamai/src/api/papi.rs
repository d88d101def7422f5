//! Property Manager API (PAPI) v1 operations

use serde::{Deserialize, Serialize};

use crate::api::{ApiError, Client};

/// Activation network
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Network {
    Staging,
    Production,
}

impl Network {
    pub fn as_str(&self) -> &'static str {
        match self {
            Network::Staging => "STAGING",
            Network::Production => "PRODUCTION",
        }
    }

    /// Accepts the network names and their short aliases, ignoring case
    pub fn from_alias(alias: &str) -> Option<Self> {
        match alias.to_uppercase().as_str() {
            "STAGING" | "STAG" | "S" => Some(Network::Staging),
            "PRODUCTION" | "PROD" | "P" => Some(Network::Production),
            _ => None,
        }
    }
}

impl std::fmt::Display for Network {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ActivationType {
    Activate,
    Deactivate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivationStatus {
    Active,
    Inactive,
    New,
    Pending,
    PendingDeactivation,
    Deactivated,
    Failed,
    Aborted,
    #[serde(rename = "ZONE_1")]
    Zone1,
    #[serde(rename = "ZONE_2")]
    Zone2,
    #[serde(rename = "ZONE_3")]
    Zone3,
    PendingCancellation,
    #[serde(other)]
    Unknown,
}

impl ActivationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivationStatus::Active => "ACTIVE",
            ActivationStatus::Inactive => "INACTIVE",
            ActivationStatus::New => "NEW",
            ActivationStatus::Pending => "PENDING",
            ActivationStatus::PendingDeactivation => "PENDING_DEACTIVATION",
            ActivationStatus::Deactivated => "DEACTIVATED",
            ActivationStatus::Failed => "FAILED",
            ActivationStatus::Aborted => "ABORTED",
            ActivationStatus::Zone1 => "ZONE_1",
            ActivationStatus::Zone2 => "ZONE_2",
            ActivationStatus::Zone3 => "ZONE_3",
            ActivationStatus::PendingCancellation => "PENDING_CANCELLATION",
            ActivationStatus::Unknown => "UNKNOWN",
        }
    }

    /// Statuses of an activation that is live or still being processed
    pub fn is_in_progress(&self) -> bool {
        matches!(
            self,
            ActivationStatus::Active
                | ActivationStatus::New
                | ActivationStatus::Pending
                | ActivationStatus::PendingDeactivation
                | ActivationStatus::Zone1
                | ActivationStatus::Zone2
                | ActivationStatus::Zone3
        )
    }
}

/// Property version status on one network
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum VersionStatus {
    Active,
    Inactive,
    Pending,
    Deactivated,
    Failed,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Activation {
    #[serde(default)]
    pub activation_id: String,
    #[serde(default)]
    pub property_id: String,
    #[serde(default)]
    pub property_name: String,
    pub property_version: i64,
    pub network: Network,
    pub activation_type: ActivationType,
    pub status: ActivationStatus,
    #[serde(default)]
    pub submit_date: String,
    #[serde(default)]
    pub update_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    #[serde(default)]
    pub notify_emails: Vec<String>,
}

/// Error or warning object reported by PAPI
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PapiError {
    #[serde(rename = "type", default)]
    pub error_type: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub detail: String,
    #[serde(default)]
    pub instance: String,
    #[serde(default)]
    pub behavior_name: String,
    #[serde(default)]
    pub error_location: String,
    #[serde(default)]
    pub status_code: i64,
}

impl std::fmt::Display for PapiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "type: {}, title: {}, detail: {}",
            self.error_type, self.title, self.detail
        )
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActivationItems {
    #[serde(default)]
    pub items: Vec<Activation>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetActivationsResponse {
    #[serde(default)]
    pub activations: ActivationItems,
    #[serde(default)]
    pub errors: Vec<PapiError>,
    #[serde(default)]
    pub warnings: Vec<PapiError>,
}

#[derive(Debug, Clone)]
pub struct GetActivationResponse {
    pub activation: Activation,
    pub errors: Vec<PapiError>,
    pub warnings: Vec<PapiError>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateActivationRequest {
    pub property_version: i64,
    pub network: Network,
    pub activation_type: ActivationType,
    pub notify_emails: Vec<String>,
    pub acknowledge_all_warnings: bool,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub note: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ActivationLink {
    activation_link: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CreateActivationResponse {
    pub activation_id: String,
    pub activation_link: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetRuleTreeResponse {
    #[serde(default)]
    pub property_version: i64,
    #[serde(default)]
    pub rules: serde_json::Value,
    #[serde(default)]
    pub errors: Vec<PapiError>,
    #[serde(default)]
    pub warnings: Vec<PapiError>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyVersion {
    pub property_version: i64,
    #[serde(default)]
    pub staging_status: Option<VersionStatus>,
    #[serde(default)]
    pub production_status: Option<VersionStatus>,
    #[serde(default)]
    pub note: Option<String>,
}

impl PropertyVersion {
    pub fn status_on(&self, network: Network) -> Option<&VersionStatus> {
        match network {
            Network::Staging => self.staging_status.as_ref(),
            Network::Production => self.production_status.as_ref(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
struct VersionItems {
    #[serde(default)]
    items: Vec<PropertyVersion>,
}

#[derive(Debug, Clone, Deserialize)]
struct GetVersionsResponse {
    #[serde(default)]
    versions: VersionItems,
}

/// PAPI operations on one property
pub struct PapiApi<'a> {
    client: &'a Client,
}

impl<'a> PapiApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn get_activations(&self, property_id: &str) -> Result<GetActivationsResponse, ApiError> {
        self.client
            .get(&format!("/papi/v1/properties/{}/activations", property_id), &[])
            .await
    }

    pub async fn get_activation(
        &self,
        property_id: &str,
        activation_id: &str,
    ) -> Result<GetActivationResponse, ApiError> {
        let path = format!(
            "/papi/v1/properties/{}/activations/{}",
            property_id, activation_id
        );
        let response: GetActivationsResponse = self.client.get(&path, &[]).await?;

        let activation = response
            .activations
            .items
            .into_iter()
            .next()
            .ok_or_else(|| ApiError::NotFound(path.clone()))?;

        Ok(GetActivationResponse {
            activation,
            errors: response.errors,
            warnings: response.warnings,
        })
    }

    pub async fn create_activation(
        &self,
        property_id: &str,
        request: &CreateActivationRequest,
    ) -> Result<CreateActivationResponse, ApiError> {
        let link: ActivationLink = self
            .client
            .post(
                &format!("/papi/v1/properties/{}/activations", property_id),
                &[],
                request,
            )
            .await?;

        let activation_id = activation_id_from_link(&link.activation_link).ok_or_else(|| {
            ApiError::ParseError(format!(
                "unexpected activation link {:?}",
                link.activation_link
            ))
        })?;

        Ok(CreateActivationResponse {
            activation_id,
            activation_link: link.activation_link,
        })
    }

    pub async fn get_rule_tree(
        &self,
        property_id: &str,
        version: i64,
        validate_rules: bool,
    ) -> Result<GetRuleTreeResponse, ApiError> {
        self.client
            .get(
                &format!("/papi/v1/properties/{}/versions/{}/rules", property_id, version),
                &[("validateRules", validate_rules.to_string())],
            )
            .await
    }

    /// Latest version, optionally the latest one activated on a network
    pub async fn get_latest_version(
        &self,
        property_id: &str,
        activated_on: Option<Network>,
    ) -> Result<PropertyVersion, ApiError> {
        let path = format!("/papi/v1/properties/{}/versions/latest", property_id);
        let query: Vec<(&str, String)> = activated_on
            .map(|network| vec![("activatedOn", network.to_string())])
            .unwrap_or_default();

        let response: GetVersionsResponse = self.client.get(&path, &query).await?;
        first_version(response, path)
    }

    pub async fn get_property_version(
        &self,
        property_id: &str,
        version: i64,
    ) -> Result<PropertyVersion, ApiError> {
        let path = format!("/papi/v1/properties/{}/versions/{}", property_id, version);
        let response: GetVersionsResponse = self.client.get(&path, &[]).await?;
        first_version(response, path)
    }
}

fn first_version(response: GetVersionsResponse, path: String) -> Result<PropertyVersion, ApiError> {
    response
        .versions
        .items
        .into_iter()
        .next()
        .ok_or(ApiError::NotFound(path))
}

/// `/papi/v1/properties/prp_1/activations/atv_2?contractId=...` -> `atv_2`
fn activation_id_from_link(link: &str) -> Option<String> {
    let path = link.split('?').next()?;
    let id = path.trim_end_matches('/').rsplit('/').next()?;
    if id.is_empty() || id == "activations" {
        return None;
    }
    Some(id.to_string())
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;

    #[test]
    fn network_aliases() {
        assert_eq!(Network::from_alias("staging"), Some(Network::Staging));
        assert_eq!(Network::from_alias("S"), Some(Network::Staging));
        assert_eq!(Network::from_alias("Prod"), Some(Network::Production));
        assert_eq!(Network::from_alias("p"), Some(Network::Production));
        assert_eq!(Network::from_alias("qa"), None);
    }

    #[test]
    fn activation_link_parsing() {
        assert_eq!(
            activation_id_from_link(
                "/papi/v1/properties/prp_173136/activations/atv_67037?contractId=ctr_1&groupId=grp_2"
            ),
            Some("atv_67037".to_string())
        );
        assert_eq!(activation_id_from_link("/papi/v1/properties/prp_1/activations/"), None);
    }

    #[test]
    fn activation_status_decoding() {
        let status: ActivationStatus = serde_json::from_str(r#""ZONE_2""#).unwrap();
        assert_eq!(status, ActivationStatus::Zone2);
        assert!(status.is_in_progress());

        let status: ActivationStatus = serde_json::from_str(r#""PENDING_DEACTIVATION""#).unwrap();
        assert!(status.is_in_progress());

        let status: ActivationStatus = serde_json::from_str(r#""SOMETHING_NEW""#).unwrap();
        assert_eq!(status, ActivationStatus::Unknown);
        assert!(!ActivationStatus::Aborted.is_in_progress());
    }

    #[test]
    fn create_request_serialization_omits_empty_note() {
        let request = CreateActivationRequest {
            property_version: 3,
            network: Network::Production,
            activation_type: ActivationType::Activate,
            notify_emails: vec!["ops@example.com".to_string()],
            acknowledge_all_warnings: true,
            note: String::new(),
        };

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({
                "propertyVersion": 3,
                "network": "PRODUCTION",
                "activationType": "ACTIVATE",
                "notifyEmails": ["ops@example.com"],
                "acknowledgeAllWarnings": true
            })
        );
    }
}
