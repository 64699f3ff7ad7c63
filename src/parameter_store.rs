use crate::ssm_parameters::{SSMParameter, SSMParametersRequest, SSMPutParameter, SSMRequestError, SSMTags};

/// The calls the copier makes against a parameter store.
///
/// Every call blocks until the store answers.
pub trait ParameterStore {
    /// All parameters matching the request, following pagination to the end.
    fn describe_parameters(&self, req: &SSMParametersRequest) -> Result<Vec<SSMParameter>, SSMRequestError>;

    /// The decrypted value of `name`.
    fn get_parameter_value(&self, name: &str) -> Result<String, SSMRequestError>;

    /// Fails with `SSMRequestError::AlreadyExists` when the name is taken and
    /// `overwrite` is not set.
    fn put_parameter(&self, param: &SSMPutParameter) -> Result<(), SSMRequestError>;

    /// Fails with `SSMRequestError::ResourceNotFound` for an unknown name.
    fn list_tags(&self, name: &str) -> Result<SSMTags, SSMRequestError>;

    fn add_tags(&self, name: &str, tags: &SSMTags) -> Result<(), SSMRequestError>;

    fn remove_tags(&self, name: &str, keys: &[String]) -> Result<(), SSMRequestError>;

    /// Identity of the caller, used to check the connection works.
    fn caller_identity(&self) -> Result<String, SSMRequestError>;
}
