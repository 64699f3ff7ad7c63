use std::io::{self, Write};

use crate::parameter_store::ParameterStore;
use crate::rename::rename_parameter;
use crate::ssm_parameters::{SSMParameter, SSMParametersRequest, SSMPutParameter, SSMRequestError, SelectionMode};
use crate::tags::sync_tags;

/// What happens to the key id of encrypted parameters.
#[derive(Debug, Clone, PartialEq)]
pub enum KeyIdPolicy {
    Keep,
    Replace(String),
    Clear,
}

#[derive(Debug, Clone)]
pub struct CopyOptions {
    pub mode: SelectionMode,
    pub overwrite: bool,
    pub keep_going: bool,
    pub dry_run: bool,
    pub target_path: Option<String>,
    pub key_id: KeyIdPolicy,
    pub with_tags: bool,
}

impl Default for CopyOptions {
    fn default() -> Self {
        CopyOptions {
            mode: SelectionMode::Name,
            overwrite: false,
            keep_going: false,
            dry_run: false,
            target_path: None,
            key_id: KeyIdPolicy::Keep,
            with_tags: false,
        }
    }
}

#[derive(Debug, Default, PartialEq)]
pub struct CopyReport {
    pub copied: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Parameters that were written but whose tags could not be synchronized.
    pub tags_failed: usize,
}

enum Recovered {
    Skipped,
    Failed,
}

#[derive(Debug, Fail)]
pub enum CopyError {
    #[fail(display = "{} not found.", selector)]
    NotFound { selector: String },
    #[fail(
        display = "failed to copy {} to {} as it already exists: specify --overwrite or --keep-going",
        name, new_name
    )]
    AlreadyExists { name: String, new_name: String },
    #[fail(display = "failed to copy {} to {}, {}", name, new_name, reason)]
    Request {
        name: String,
        new_name: String,
        reason: String,
    },
    #[fail(display = "{}", _0)]
    Remote(#[cause] SSMRequestError),
    #[fail(display = "{}", _0)]
    Io(#[cause] io::Error),
}

impl CopyError {
    pub fn request(name: &str, new_name: &str, error: SSMRequestError) -> Self {
        CopyError::Request {
            name: name.to_string(),
            new_name: new_name.to_string(),
            reason: error.to_string(),
        }
    }
}

impl From<SSMRequestError> for CopyError {
    fn from(error: SSMRequestError) -> Self {
        CopyError::Remote(error)
    }
}

impl From<io::Error> for CopyError {
    fn from(error: io::Error) -> Self {
        CopyError::Io(error)
    }
}

/// Builds the put request for a parameter: server assigned fields are
/// dropped, the key id policy applied and the parameter renamed.
pub fn transform_parameter(parameter: SSMParameter, new_name: &str, options: &CopyOptions) -> SSMPutParameter {
    let key_id = match (&options.key_id, parameter.key_id) {
        (_, None) => None,
        (KeyIdPolicy::Keep, Some(key_id)) => Some(key_id),
        (KeyIdPolicy::Replace(key_id), Some(_)) => Some(key_id.clone()),
        (KeyIdPolicy::Clear, Some(_)) => None,
    };

    SSMPutParameter {
        name: new_name.to_string(),
        value: parameter.value.unwrap_or_default(),
        p_type: parameter.p_type,
        key_id,
        description: parameter.description,
        allowed_pattern: parameter.allowed_pattern,
        tier: parameter.tier,
        data_type: parameter.data_type,
        // the store rejects an explicit empty policy list
        policies: parameter.policies.filter(|p| !p.is_empty()),
        overwrite: options.overwrite,
    }
}

pub struct ParameterCopier<'a> {
    source: &'a dyn ParameterStore,
    target: &'a dyn ParameterStore,
    options: CopyOptions,
}

impl<'a> ParameterCopier<'a> {
    pub fn new(source: &'a dyn ParameterStore, target: &'a dyn ParameterStore, options: CopyOptions) -> Self {
        ParameterCopier { source, target, options }
    }

    pub fn load_source_parameters(&self, selector: &str) -> Result<Vec<SSMParameter>, CopyError> {
        let req = SSMParametersRequest {
            selector: selector.to_string(),
            mode: self.options.mode,
        };
        let parameters = self.source.describe_parameters(&req)?;
        if parameters.is_empty() {
            return Err(CopyError::NotFound {
                selector: selector.to_string(),
            });
        }
        debug!("{} matched {} parameter(s)", selector, parameters.len());
        Ok(parameters)
    }

    /// Copies everything the selectors match, one parameter at a time.
    ///
    /// Progress goes to `out`; with keep-going, skipped and failed
    /// parameters are reported on `err` and the run continues. Any other
    /// failure stops the run and is returned.
    pub fn copy(&self, selectors: &[String], out: &mut dyn Write, err: &mut dyn Write) -> Result<CopyReport, CopyError> {
        let mut report = CopyReport::default();
        for selector in selectors {
            for parameter in self.load_source_parameters(selector)? {
                let (name, new_name) = match self.copy_parameter(parameter, selector, out) {
                    Ok(names) => names,
                    Err(error) => {
                        match self.recover(error, err)? {
                            Recovered::Skipped => report.skipped += 1,
                            Recovered::Failed => report.failed += 1,
                        }
                        continue;
                    }
                };
                report.copied += 1;

                if self.options.dry_run || self.options.with_tags {
                    if let Err(error) = sync_tags(self.source, self.target, &name, &new_name, self.options.dry_run, out) {
                        self.recover(error, err)?;
                        report.tags_failed += 1;
                    }
                }
            }
        }
        Ok(report)
    }

    /// Reports a per-parameter failure when keep-going is set, otherwise
    /// hands it back to stop the run.
    fn recover(&self, error: CopyError, err: &mut dyn Write) -> Result<Recovered, CopyError> {
        if !self.options.keep_going {
            return Err(error);
        }
        match error {
            CopyError::AlreadyExists { name, new_name } => {
                writeln!(err, "WARN: skipping copy {} as {} already exists", name, new_name)?;
                Ok(Recovered::Skipped)
            }
            error @ CopyError::Request { .. } => {
                writeln!(err, "ERROR: {}", error)?;
                Ok(Recovered::Failed)
            }
            error => Err(error),
        }
    }

    /// Fetches, transforms and writes one parameter, returning the source and
    /// target names.
    fn copy_parameter(
        &self,
        mut parameter: SSMParameter,
        selector: &str,
        out: &mut dyn Write,
    ) -> Result<(String, String), CopyError> {
        let name = parameter.name.clone();
        let new_name = rename_parameter(&name, selector, self.options.target_path.as_deref());

        parameter.value = Some(
            self.source
                .get_parameter_value(&name)
                .map_err(|e| CopyError::request(&name, &new_name, e))?,
        );
        debug!("source record: {}", serde_json::to_string(&parameter).unwrap_or_default());
        let put = transform_parameter(parameter, &new_name, &self.options);
        debug!("put request: {}", serde_json::to_string(&put).unwrap_or_default());

        if self.options.dry_run {
            writeln!(out, "DRY-RUN: copying {} to {}", name, new_name)?;
            return Ok((name, new_name));
        }

        match self.target.put_parameter(&put) {
            Ok(()) => writeln!(out, "INFO: copied {} to {}", name, new_name)?,
            Err(SSMRequestError::AlreadyExists { .. }) => return Err(CopyError::AlreadyExists { name, new_name }),
            Err(e) => return Err(CopyError::request(&name, &new_name, e)),
        }
        Ok((name, new_name))
    }
}
