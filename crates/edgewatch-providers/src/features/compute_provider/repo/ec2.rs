//! EC2 Query API adapter.

use crate::features::compute_provider::repo::sigv4::{self, AwsCredentials, SigningRequest};
use crate::features::compute_provider::repo::ComputeRepository;
use crate::features::compute_provider::{ComputeError, LaunchParams, TagFilter};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use edgewatch_core::{InstanceState, OwnedInstance, Region, ResourceTag};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

pub const API_VERSION: &str = "2016-11-15";
const SERVICE: &str = "ec2";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=utf-8";

pub struct Ec2ComputeRepository {
    client: Client,
    credentials: AwsCredentials,
    endpoint_override: Option<String>,
}

impl Ec2ComputeRepository {
    pub fn new(
        credentials: AwsCredentials,
        request_timeout: Duration,
    ) -> Result<Self, ComputeError> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| ComputeError::Client(e.to_string()))?;
        Ok(Self {
            client,
            credentials,
            endpoint_override: None,
        })
    }

    /// Send every region's requests to a fixed endpoint (e.g. a local EC2 emulator).
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint_override = Some(endpoint.into());
        self
    }

    pub fn endpoint(&self, region: Region) -> String {
        self.endpoint_override
            .clone()
            .unwrap_or_else(|| format!("https://ec2.{region}.amazonaws.com/"))
    }

    async fn call<T: DeserializeOwned>(
        &self,
        region: Region,
        action: &str,
        params: Vec<(String, String)>,
    ) -> Result<T, ComputeError> {
        let mut form = Vec::with_capacity(params.len() + 2);
        form.push(("Action".to_string(), action.to_string()));
        form.push(("Version".to_string(), API_VERSION.to_string()));
        form.extend(params);
        let body = sigv4::encode_form(&form);

        let endpoint = self.endpoint(region);
        let url = reqwest::Url::parse(&endpoint)
            .map_err(|e| ComputeError::Client(format!("invalid endpoint '{endpoint}': {e}")))?;
        let host = match (url.host_str(), url.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_string(),
            (None, _) => {
                return Err(ComputeError::Client(format!(
                    "endpoint '{endpoint}' has no host"
                )))
            }
        };

        let signed = sigv4::sign(
            &SigningRequest {
                method: "POST",
                host: &host,
                path: url.path(),
                query: "",
                content_type: Some(FORM_CONTENT_TYPE),
                body: body.as_bytes(),
                region: region.as_str(),
                service: SERVICE,
                timestamp: Utc::now(),
            },
            &self.credentials,
        );

        let mut builder = self
            .client
            .post(url.clone())
            .header(CONTENT_TYPE, FORM_CONTENT_TYPE)
            .header("x-amz-date", &signed.amz_date)
            .header(AUTHORIZATION, &signed.authorization);
        if let Some(token) = &signed.security_token {
            builder = builder.header("x-amz-security-token", token);
        }

        debug!(%region, action, "Sending EC2 request");

        let response = builder
            .body(body)
            .send()
            .await
            .map_err(|e| ComputeError::Transport(format!("{action} in {region}: {e}")))?;
        let status = response.status();
        let text = response.text().await.map_err(|e| {
            ComputeError::Transport(format!("failed to read {action} response: {e}"))
        })?;

        if !status.is_success() {
            return Err(decode_error(&text).unwrap_or_else(|| {
                ComputeError::Transport(format!("{action} returned HTTP {}", status.as_u16()))
            }));
        }

        quick_xml::de::from_str(&text).map_err(|e| ComputeError::Decode(format!("{action}: {e}")))
    }
}

#[async_trait]
impl ComputeRepository for Ec2ComputeRepository {
    async fn run_instances(
        &self,
        region: Region,
        params: &LaunchParams,
    ) -> Result<Vec<String>, ComputeError> {
        let response: RunInstancesResponse = self
            .call(region, "RunInstances", run_instances_query(params))
            .await?;
        Ok(response
            .instances_set
            .items
            .into_iter()
            .map(|item| item.instance_id)
            .collect())
    }

    async fn create_tags(
        &self,
        region: Region,
        resource_ids: &[String],
        tags: &[ResourceTag],
    ) -> Result<(), ComputeError> {
        let _: AckResponse = self
            .call(region, "CreateTags", create_tags_query(resource_ids, tags))
            .await?;
        Ok(())
    }

    async fn describe_instances(
        &self,
        region: Region,
        filter: &TagFilter,
    ) -> Result<Vec<OwnedInstance>, ComputeError> {
        let mut instances = Vec::new();
        let mut next_token: Option<String> = None;

        loop {
            let query = describe_instances_query(filter, next_token.as_deref());
            let page: DescribeInstancesResponse =
                self.call(region, "DescribeInstances", query).await?;
            let (batch, token) = flatten_describe(page, region)?;
            instances.extend(batch);

            match token {
                Some(token) if !token.is_empty() => next_token = Some(token),
                _ => break,
            }
        }

        Ok(instances)
    }

    async fn terminate_instances(
        &self,
        region: Region,
        instance_ids: &[String],
    ) -> Result<(), ComputeError> {
        let _: AckResponse = self
            .call(region, "TerminateInstances", indexed("InstanceId", instance_ids))
            .await?;
        Ok(())
    }
}

fn indexed(prefix: &str, values: &[String]) -> Vec<(String, String)> {
    values
        .iter()
        .enumerate()
        .map(|(i, value)| (format!("{prefix}.{}", i + 1), value.clone()))
        .collect()
}

pub fn run_instances_query(params: &LaunchParams) -> Vec<(String, String)> {
    let mut query = vec![
        ("ImageId".to_string(), params.image_id.clone()),
        ("InstanceType".to_string(), params.instance_type.clone()),
        ("MinCount".to_string(), params.min_count.to_string()),
        ("MaxCount".to_string(), params.max_count.to_string()),
        ("KeyName".to_string(), params.key_name.clone()),
    ];
    if !params.user_data.is_empty() {
        query.push(("UserData".to_string(), params.user_data.clone()));
    }
    for (key, value) in &params.extra {
        query.retain(|(existing, _)| existing != key);
        query.push((key.clone(), value.clone()));
    }
    query
}

pub fn create_tags_query(resource_ids: &[String], tags: &[ResourceTag]) -> Vec<(String, String)> {
    let mut query = indexed("ResourceId", resource_ids);
    for (i, tag) in tags.iter().enumerate() {
        query.push((format!("Tag.{}.Key", i + 1), tag.key.clone()));
        query.push((format!("Tag.{}.Value", i + 1), tag.value.clone()));
    }
    query
}

pub fn describe_instances_query(
    filter: &TagFilter,
    next_token: Option<&str>,
) -> Vec<(String, String)> {
    let mut query = vec![
        ("Filter.1.Name".to_string(), format!("tag:{}", filter.key)),
        ("Filter.1.Value.1".to_string(), filter.value.clone()),
    ];
    if let Some(token) = next_token {
        query.push(("NextToken".to_string(), token.to_string()));
    }
    query
}

#[derive(Debug, Deserialize)]
struct AckResponse {}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RunInstancesResponse {
    #[serde(default)]
    instances_set: LaunchedSet,
}

#[derive(Debug, Default, Deserialize)]
struct LaunchedSet {
    #[serde(rename = "item", default)]
    items: Vec<LaunchedItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LaunchedItem {
    instance_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DescribeInstancesResponse {
    #[serde(default)]
    reservation_set: ReservationSet,
    #[serde(default)]
    next_token: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ReservationSet {
    #[serde(rename = "item", default)]
    items: Vec<Reservation>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Reservation {
    #[serde(default)]
    instances_set: InstanceSet,
}

#[derive(Debug, Default, Deserialize)]
struct InstanceSet {
    #[serde(rename = "item", default)]
    items: Vec<InstanceItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InstanceItem {
    instance_id: String,
    instance_state: InstanceStateItem,
    launch_time: String,
}

#[derive(Debug, Deserialize)]
struct InstanceStateItem {
    name: String,
}

fn flatten_describe(
    page: DescribeInstancesResponse,
    region: Region,
) -> Result<(Vec<OwnedInstance>, Option<String>), ComputeError> {
    let mut instances = Vec::new();
    for reservation in page.reservation_set.items {
        for item in reservation.instances_set.items {
            let launch_time = DateTime::parse_from_rfc3339(&item.launch_time)
                .map_err(|e| {
                    ComputeError::Decode(format!(
                        "launchTime '{}' of {}: {e}",
                        item.launch_time, item.instance_id
                    ))
                })?
                .with_timezone(&Utc);
            instances.push(OwnedInstance::new(
                item.instance_id,
                launch_time,
                InstanceState::from_provider_name(&item.instance_state.name),
                region,
            ));
        }
    }
    Ok((instances, page.next_token))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ErrorResponse {
    errors: ErrorList,
}

#[derive(Debug, Deserialize)]
struct ErrorList {
    #[serde(rename = "Error", default)]
    items: Vec<ErrorItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ErrorItem {
    code: String,
    #[serde(default)]
    message: String,
}

fn decode_error(body: &str) -> Option<ComputeError> {
    let response: ErrorResponse = quick_xml::de::from_str(body).ok()?;
    let first = response.errors.items.into_iter().next()?;
    Some(ComputeError::Api {
        code: first.code,
        message: first.message,
    })
}
