use std::env;
use std::fmt;
use std::future::Future;

use rusoto_core::{HttpClient, Region, RusotoError};
use rusoto_credential::{ChainProvider, ProfileProvider};
use rusoto_ssm::{
    AddTagsToResourceRequest, DescribeParametersRequest, GetParameterRequest, ListTagsForResourceError,
    ListTagsForResourceRequest, ParameterMetadata, ParameterStringFilter, PutParameterError, PutParameterRequest,
    RemoveTagsFromResourceRequest, Ssm, SsmClient, Tag,
};
use rusoto_sts::{GetCallerIdentityRequest, Sts, StsClient};
use tokio::runtime::{Builder, Runtime};

use crate::parameter_store::ParameterStore;
use crate::ssm_parameters::{SSMParameter, SSMParametersRequest, SSMPutParameter, SSMRequestError, SSMTags};

const RESOURCE_TYPE: &str = "Parameter";

/// Where to connect: both fall back to the usual AWS environment and
/// configuration files when absent.
#[derive(Debug, Clone, Default)]
pub struct ConnectionOptions {
    pub profile: Option<String>,
    pub region: Option<String>,
}

pub struct SSMOps {
    region: Region,
    profile: Option<String>,
    ssm_client: SsmClient,
    sts_client: StsClient,
    runtime: Runtime,
}

impl fmt::Debug for SSMOps {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{{ region: {}, profile: {:?} }}", self.region.name(), self.profile)
    }
}

fn connect_error<E: fmt::Display>(err: E) -> SSMRequestError {
    SSMRequestError::Connect { reason: err.to_string() }
}

fn remote_error<E: std::error::Error + 'static>(err: RusotoError<E>) -> SSMRequestError {
    SSMRequestError::Remote { reason: err.to_string() }
}

fn credentials(profile: Option<&str>) -> Result<ChainProvider, SSMRequestError> {
    match profile {
        Some(name) => {
            let mut provider = ProfileProvider::new().map_err(connect_error)?;
            provider.set_profile(name);
            Ok(ChainProvider::with_profile_provider(provider))
        }
        None => Ok(ChainProvider::new()),
    }
}

/// The region named by the profile, if any. Without an explicit profile the
/// default one (or `AWS_PROFILE`) is consulted, and a missing configuration
/// is not an error.
fn profile_region(profile: Option<&str>) -> Result<Option<String>, SSMRequestError> {
    match profile {
        Some(name) => {
            let mut provider = ProfileProvider::new().map_err(connect_error)?;
            provider.set_profile(name);
            provider.region_from_profile().map_err(connect_error)
        }
        None => Ok(ProfileProvider::new()
            .ok()
            .and_then(|provider| provider.region_from_profile().ok())
            .flatten()),
    }
}

/// Region precedence: the command line, then the environment, then the profile.
fn pick_region(
    explicit: Option<&str>,
    environment: Option<String>,
    profile: Option<String>,
) -> Result<Region, SSMRequestError> {
    match explicit.map(str::to_string).or(environment).or(profile) {
        Some(region) => region.parse::<Region>().map_err(connect_error),
        None => Ok(Region::UsEast1),
    }
}

fn resolve_region(options: &ConnectionOptions) -> Result<Region, SSMRequestError> {
    if options.region.is_some() {
        return pick_region(options.region.as_deref(), None, None);
    }
    let environment = env::var("AWS_DEFAULT_REGION").or_else(|_| env::var("AWS_REGION")).ok();
    let profile = match environment {
        Some(_) => None,
        None => profile_region(options.profile.as_deref())?,
    };
    pick_region(None, environment, profile)
}

impl SSMOps {
    pub fn new(options: &ConnectionOptions) -> Result<Self, SSMRequestError> {
        let region = resolve_region(options)?;
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(connect_error)?;

        let (ssm_client, sts_client) = {
            let _guard = runtime.enter();
            let profile = options.profile.as_deref();
            (
                SsmClient::new_with(
                    HttpClient::new().map_err(connect_error)?,
                    credentials(profile)?,
                    region.clone(),
                ),
                StsClient::new_with(
                    HttpClient::new().map_err(connect_error)?,
                    credentials(profile)?,
                    region.clone(),
                ),
            )
        };

        debug!("connecting to SSM in {} with profile {:?}", region.name(), options.profile);
        Ok(SSMOps {
            region,
            profile: options.profile.clone(),
            ssm_client,
            sts_client,
            runtime,
        })
    }

    /// Connects and checks the credentials work before anything is copied.
    pub fn connect(options: &ConnectionOptions) -> Result<Self, SSMRequestError> {
        let ops = SSMOps::new(options)?;
        let identity = ops.caller_identity().map_err(connect_error)?;
        info!("connected to {} as {}", ops.region.name(), identity);
        Ok(ops)
    }

    fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }
}

fn to_parameter(meta: ParameterMetadata) -> Result<SSMParameter, SSMRequestError> {
    let name = meta.name.ok_or_else(|| SSMRequestError::Remote {
        reason: "parameter without a name in DescribeParameters response".to_string(),
    })?;
    let p_type = meta.type_.as_deref().unwrap_or("String").parse()?;
    let policies = meta
        .policies
        .map(|list| list.into_iter().filter_map(|p| p.policy_text).collect());

    Ok(SSMParameter {
        key_id: meta.key_id,
        description: meta.description,
        allowed_pattern: meta.allowed_pattern,
        tier: meta.tier,
        data_type: meta.data_type,
        policies,
        last_modified_date: meta.last_modified_date,
        last_modified_user: meta.last_modified_user,
        version: meta.version,
        ..SSMParameter::new(&name, p_type)
    })
}

/// PutParameter takes the policies as a single JSON array.
fn encode_policies(policies: &[String]) -> Result<String, SSMRequestError> {
    let documents = policies
        .iter()
        .map(|p| serde_json::from_str::<serde_json::Value>(p))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|e| SSMRequestError::Remote {
            reason: format!("invalid parameter policy: {}", e),
        })?;
    serde_json::to_string(&documents).map_err(|e| SSMRequestError::Remote { reason: e.to_string() })
}

fn to_put_request(param: &SSMPutParameter) -> Result<PutParameterRequest, SSMRequestError> {
    let policies = match &param.policies {
        Some(list) => Some(encode_policies(list)?),
        None => None,
    };
    Ok(PutParameterRequest {
        name: param.name.clone(),
        value: param.value.clone(),
        type_: Some(param.p_type.as_str().to_string()),
        key_id: param.key_id.clone(),
        description: param.description.clone(),
        allowed_pattern: param.allowed_pattern.clone(),
        tier: param.tier.clone(),
        data_type: param.data_type.clone(),
        policies,
        overwrite: Some(param.overwrite),
        ..Default::default()
    })
}

impl ParameterStore for SSMOps {
    fn describe_parameters(&self, req: &SSMParametersRequest) -> Result<Vec<SSMParameter>, SSMRequestError> {
        let mut input = DescribeParametersRequest {
            parameter_filters: Some(vec![ParameterStringFilter {
                key: req.mode.filter_key().to_string(),
                option: Some(req.mode.filter_option().to_string()),
                values: Some(vec![req.selector.clone()]),
            }]),
            ..Default::default()
        };
        let mut out_parms: Vec<SSMParameter> = Vec::new();
        loop {
            let output = self
                .block_on(self.ssm_client.describe_parameters(input.clone()))
                .map_err(remote_error)?;
            for meta in output.parameters.unwrap_or_default() {
                out_parms.push(to_parameter(meta)?);
            }
            match output.next_token {
                Some(token) => {
                    input = DescribeParametersRequest {
                        next_token: Some(token),
                        ..input
                    };
                }
                None => break,
            }
        }
        Ok(out_parms)
    }

    fn get_parameter_value(&self, name: &str) -> Result<String, SSMRequestError> {
        let input = GetParameterRequest {
            name: name.to_string(),
            with_decryption: Some(true),
        };
        let output = self
            .block_on(self.ssm_client.get_parameter(input))
            .map_err(remote_error)?;
        output
            .parameter
            .and_then(|p| p.value)
            .ok_or_else(|| SSMRequestError::Remote {
                reason: format!("no value returned for {}", name),
            })
    }

    fn put_parameter(&self, param: &SSMPutParameter) -> Result<(), SSMRequestError> {
        let input = to_put_request(param)?;
        match self.block_on(self.ssm_client.put_parameter(input)) {
            Ok(output) => {
                debug!("{} is now at version {:?}", param.name, output.version);
                Ok(())
            }
            Err(RusotoError::Service(PutParameterError::ParameterAlreadyExists(_))) => {
                Err(SSMRequestError::AlreadyExists {
                    name: param.name.clone(),
                })
            }
            Err(err) => Err(remote_error(err)),
        }
    }

    fn list_tags(&self, name: &str) -> Result<SSMTags, SSMRequestError> {
        let input = ListTagsForResourceRequest {
            resource_id: name.to_string(),
            resource_type: RESOURCE_TYPE.to_string(),
        };
        match self.block_on(self.ssm_client.list_tags_for_resource(input)) {
            Ok(output) => Ok(output
                .tag_list
                .unwrap_or_default()
                .into_iter()
                .map(|t| (t.key, t.value))
                .collect()),
            Err(RusotoError::Service(ListTagsForResourceError::InvalidResourceId(_))) => {
                Err(SSMRequestError::ResourceNotFound { name: name.to_string() })
            }
            Err(err) => Err(remote_error(err)),
        }
    }

    fn add_tags(&self, name: &str, tags: &SSMTags) -> Result<(), SSMRequestError> {
        let input = AddTagsToResourceRequest {
            resource_id: name.to_string(),
            resource_type: RESOURCE_TYPE.to_string(),
            tags: tags
                .iter()
                .map(|(key, value)| Tag {
                    key: key.clone(),
                    value: value.clone(),
                })
                .collect(),
        };
        self.block_on(self.ssm_client.add_tags_to_resource(input))
            .map(|_| ())
            .map_err(remote_error)
    }

    fn remove_tags(&self, name: &str, keys: &[String]) -> Result<(), SSMRequestError> {
        let input = RemoveTagsFromResourceRequest {
            resource_id: name.to_string(),
            resource_type: RESOURCE_TYPE.to_string(),
            tag_keys: keys.to_vec(),
        };
        self.block_on(self.ssm_client.remove_tags_from_resource(input))
            .map(|_| ())
            .map_err(remote_error)
    }

    fn caller_identity(&self) -> Result<String, SSMRequestError> {
        let output = self
            .block_on(self.sts_client.get_caller_identity(GetCallerIdentityRequest {}))
            .map_err(remote_error)?;
        Ok(output.arn.unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ssm_parameters::SSMParameterType;
    use rusoto_ssm::ParameterInlinePolicy;

    #[test]
    fn metadata_becomes_parameter() {
        let meta = ParameterMetadata {
            name: Some("/app/secret".to_string()),
            type_: Some("SecureString".to_string()),
            key_id: Some("alias/aws/ssm".to_string()),
            version: Some(4),
            policies: Some(vec![ParameterInlinePolicy {
                policy_text: Some(r#"{"Type":"Expiration"}"#.to_string()),
                ..Default::default()
            }]),
            ..Default::default()
        };
        let p = to_parameter(meta).unwrap();
        assert_eq!(p.name, "/app/secret");
        assert_eq!(p.p_type, SSMParameterType::SecureString);
        assert_eq!(p.key_id.as_deref(), Some("alias/aws/ssm"));
        assert_eq!(p.version, Some(4));
        assert_eq!(p.policies, Some(vec![r#"{"Type":"Expiration"}"#.to_string()]));
    }

    #[test]
    fn region_from_profile_is_used_without_flag_or_environment() {
        assert_eq!(pick_region(None, None, Some("eu-west-1".to_string())).unwrap(), Region::EuWest1);
    }

    #[test]
    fn region_precedence() {
        let env = Some("eu-central-1".to_string());
        let profile = Some("eu-west-1".to_string());
        assert_eq!(pick_region(Some("ap-southeast-2"), env.clone(), profile.clone()).unwrap(), Region::ApSoutheast2);
        assert_eq!(pick_region(None, env, profile).unwrap(), Region::EuCentral1);
        assert_eq!(pick_region(None, None, None).unwrap(), Region::UsEast1);
        assert!(pick_region(Some("mars-north-1"), None, None).is_err());
    }

    #[test]
    fn metadata_without_name_is_rejected() {
        assert!(to_parameter(ParameterMetadata::default()).is_err());
    }

    #[test]
    fn put_request_carries_overwrite_and_policies() {
        let put = SSMPutParameter {
            name: "/prod/secret".to_string(),
            value: "v".to_string(),
            p_type: SSMParameterType::SecureString,
            key_id: None,
            description: Some("db password".to_string()),
            allowed_pattern: None,
            tier: Some("Advanced".to_string()),
            data_type: None,
            policies: Some(vec![
                r#"{"Type":"Expiration","Version":"1.0"}"#.to_string(),
                r#"{"Type":"NoChangeNotification"}"#.to_string(),
            ]),
            overwrite: true,
        };
        let req = to_put_request(&put).unwrap();
        assert_eq!(req.name, "/prod/secret");
        assert_eq!(req.type_.as_deref(), Some("SecureString"));
        assert_eq!(req.overwrite, Some(true));
        assert_eq!(req.tier.as_deref(), Some("Advanced"));
        assert_eq!(
            req.policies.as_deref(),
            Some(r#"[{"Type":"Expiration","Version":"1.0"},{"Type":"NoChangeNotification"}]"#)
        );
    }

    #[test]
    fn invalid_policy_is_an_error() {
        assert!(encode_policies(&["not json".to_string()]).is_err());
    }
}
