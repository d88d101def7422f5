//! Application Security API v1 operations

use serde::{Deserialize, Serialize};

use crate::api::client::api_path;
use crate::api::{ApiError, Client};

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Configuration {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    pub latest_version: i64,
    #[serde(default)]
    pub staging_version: Option<i64>,
    #[serde(default)]
    pub production_version: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatePolicyAction {
    pub id: i64,
    pub ipv4_action: String,
    pub ipv6_action: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatePolicyActions {
    #[serde(default)]
    pub rate_policy_actions: Vec<RatePolicyAction>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRatePolicyActionRequest {
    pub ipv4_action: String,
    pub ipv6_action: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PolicyProtections {
    #[serde(default)]
    pub apply_api_constraints: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apply_application_layer_controls: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apply_network_layer_controls: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apply_rate_controls: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apply_reputation_controls: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub apply_slow_post_controls: Option<bool>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateApiConstraintsRequest {
    apply_api_constraints: bool,
}

/// Condition and exception rules attached to one attack group
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConditionException {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conditions: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exception: Option<serde_json::Value>,
}

impl ConditionException {
    pub fn is_empty(&self) -> bool {
        self.conditions.is_none() && self.exception.is_none()
    }
}

pub struct AppsecApi<'a> {
    client: &'a Client,
}

impl<'a> AppsecApi<'a> {
    pub fn new(client: &'a Client) -> Self {
        Self { client }
    }

    pub async fn get_configuration(&self, config_id: i64) -> Result<Configuration, ApiError> {
        self.client
            .get(&format!("/appsec/v1/configs/{}", config_id), &[])
            .await
    }

    pub async fn get_rate_policy_actions(
        &self,
        config_id: i64,
        version: i64,
        policy_id: &str,
    ) -> Result<Vec<RatePolicyAction>, ApiError> {
        let response: RatePolicyActions = self
            .client
            .get(
                &policy_path(config_id, version, policy_id, &["rate-policies"])?,
                &[],
            )
            .await?;
        Ok(response.rate_policy_actions)
    }

    pub async fn update_rate_policy_action(
        &self,
        config_id: i64,
        version: i64,
        policy_id: &str,
        rate_policy_id: i64,
        request: &UpdateRatePolicyActionRequest,
    ) -> Result<RatePolicyAction, ApiError> {
        self.client
            .put(
                &policy_path(
                    config_id,
                    version,
                    policy_id,
                    &["rate-policies", &rate_policy_id.to_string()],
                )?,
                &[],
                request,
            )
            .await
    }

    pub async fn get_api_constraints_protection(
        &self,
        config_id: i64,
        version: i64,
        policy_id: &str,
    ) -> Result<PolicyProtections, ApiError> {
        self.client
            .get(
                &policy_path(config_id, version, policy_id, &["protections"])?,
                &[],
            )
            .await
    }

    pub async fn update_api_constraints_protection(
        &self,
        config_id: i64,
        version: i64,
        policy_id: &str,
        apply_api_constraints: bool,
    ) -> Result<PolicyProtections, ApiError> {
        self.client
            .put(
                &policy_path(config_id, version, policy_id, &["protections"])?,
                &[],
                &UpdateApiConstraintsRequest {
                    apply_api_constraints,
                },
            )
            .await
    }

    pub async fn get_attack_group_condition_exception(
        &self,
        config_id: i64,
        version: i64,
        policy_id: &str,
        attack_group: &str,
    ) -> Result<ConditionException, ApiError> {
        self.client
            .get(
                &condition_exception_path(config_id, version, policy_id, attack_group)?,
                &[],
            )
            .await
    }

    pub async fn update_attack_group_condition_exception(
        &self,
        config_id: i64,
        version: i64,
        policy_id: &str,
        attack_group: &str,
        body: &serde_json::Value,
    ) -> Result<ConditionException, ApiError> {
        self.client
            .put(
                &condition_exception_path(config_id, version, policy_id, attack_group)?,
                &[],
                body,
            )
            .await
    }

    /// Clears the attack group's conditions and exceptions
    pub async fn remove_attack_group_condition_exception(
        &self,
        config_id: i64,
        version: i64,
        policy_id: &str,
        attack_group: &str,
    ) -> Result<ConditionException, ApiError> {
        self.update_attack_group_condition_exception(
            config_id,
            version,
            policy_id,
            attack_group,
            &serde_json::json!({}),
        )
        .await
    }
}

/// Path under a security policy; IDs are percent-encoded as single segments
fn policy_path(
    config_id: i64,
    version: i64,
    policy_id: &str,
    rest: &[&str],
) -> Result<String, ApiError> {
    let config_id = config_id.to_string();
    let version = version.to_string();
    let mut segments = vec![
        "appsec",
        "v1",
        "configs",
        config_id.as_str(),
        "versions",
        version.as_str(),
        "security-policies",
        policy_id,
    ];
    segments.extend_from_slice(rest);
    api_path(&segments)
}

fn condition_exception_path(
    config_id: i64,
    version: i64,
    policy_id: &str,
    attack_group: &str,
) -> Result<String, ApiError> {
    policy_path(
        config_id,
        version,
        policy_id,
        &["attack-groups", attack_group, "condition-exception"],
    )
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use crate::edgegrid::EdgegridConfig;
    use mockito::{Matcher, Server};

    fn client(host: String) -> Client {
        Client::new(EdgegridConfig {
            host,
            client_token: "akab-ct".to_string(),
            client_secret: "secret".to_string(),
            access_token: "akab-at".to_string(),
            max_body: 131072,
            account_key: None,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn get_configuration_reads_latest_version() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("GET", "/appsec/v1/configs/43253")
            .with_body(r#"{"id":43253,"name":"Example","latestVersion":7,"stagingVersion":6}"#)
            .create_async()
            .await;

        let config = client(server.url())
            .appsec()
            .get_configuration(43253)
            .await
            .unwrap();

        assert_eq!(config.latest_version, 7);
        assert_eq!(config.staging_version, Some(6));
        assert_eq!(config.production_version, None);
    }

    #[tokio::test]
    async fn update_rate_policy_action_puts_actions() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock(
                "PUT",
                "/appsec/v1/configs/43253/versions/7/security-policies/AAAA_81230/rate-policies/134644",
            )
            .match_body(Matcher::Json(
                serde_json::json!({"ipv4Action": "deny", "ipv6Action": "none"}),
            ))
            .with_body(r#"{"id":134644,"ipv4Action":"deny","ipv6Action":"none"}"#)
            .create_async()
            .await;

        let action = client(server.url())
            .appsec()
            .update_rate_policy_action(
                43253,
                7,
                "AAAA_81230",
                134644,
                &UpdateRatePolicyActionRequest {
                    ipv4_action: "deny".to_string(),
                    ipv6_action: "none".to_string(),
                },
            )
            .await
            .unwrap();

        assert_eq!(action.ipv4_action, "deny");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn remove_condition_exception_sends_empty_object() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock(
                "PUT",
                "/appsec/v1/configs/43253/versions/7/security-policies/AAAA_81230/attack-groups/SQL/condition-exception",
            )
            .match_body(Matcher::Json(serde_json::json!({})))
            .with_body("{}")
            .create_async()
            .await;

        let removed = client(server.url())
            .appsec()
            .remove_attack_group_condition_exception(43253, 7, "AAAA_81230", "SQL")
            .await
            .unwrap();

        assert!(removed.is_empty());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn path_ids_are_escaped_as_single_segments() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock(
                "GET",
                "/appsec/v1/configs/43253/versions/7/security-policies/AAAA%2F81230/attack-groups/SQL%3Fx%23y/condition-exception",
            )
            .with_body("{}")
            .create_async()
            .await;

        let fetched = client(server.url())
            .appsec()
            .get_attack_group_condition_exception(43253, 7, "AAAA/81230", "SQL?x#y")
            .await
            .unwrap();

        assert!(fetched.is_empty());
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn protections_ignore_unrelated_flags() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock(
                "GET",
                "/appsec/v1/configs/43253/versions/7/security-policies/AAAA_81230/protections",
            )
            .with_body(r#"{"applyApiConstraints":true,"applyRateControls":false,"applyBotmanControls":true}"#)
            .create_async()
            .await;

        let protections = client(server.url())
            .appsec()
            .get_api_constraints_protection(43253, 7, "AAAA_81230")
            .await
            .unwrap();

        assert!(protections.apply_api_constraints);
        assert_eq!(protections.apply_rate_controls, Some(false));
    }
}
