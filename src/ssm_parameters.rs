use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Parameter tags keyed by tag key, ordered so output is stable.
pub type SSMTags = BTreeMap<String, String>;

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SSMParameterType {
    String,
    StringList,
    SecureString,
}

impl SSMParameterType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SSMParameterType::String => "String",
            SSMParameterType::StringList => "StringList",
            SSMParameterType::SecureString => "SecureString",
        }
    }
}

impl FromStr for SSMParameterType {
    type Err = SSMRequestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "String" => Ok(SSMParameterType::String),
            "StringList" => Ok(SSMParameterType::StringList),
            "SecureString" => Ok(SSMParameterType::SecureString),
            other => Err(SSMRequestError::Remote {
                reason: format!("unsupported parameter type {}", other),
            }),
        }
    }
}

impl fmt::Display for SSMParameterType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A parameter as described by the source store, value filled in after fetch.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SSMParameter {
    pub name: String,
    #[serde(skip_serializing)]
    pub value: Option<String>,
    pub p_type: SSMParameterType,
    pub key_id: Option<String>,
    pub description: Option<String>,
    pub allowed_pattern: Option<String>,
    pub tier: Option<String>,
    pub data_type: Option<String>,
    /// Policy documents, one JSON text per policy.
    pub policies: Option<Vec<String>>,
    // server assigned, never written back
    pub last_modified_date: Option<f64>,
    pub last_modified_user: Option<String>,
    pub version: Option<i64>,
    pub arn: Option<String>,
}

impl SSMParameter {
    pub fn new(name: &str, p_type: SSMParameterType) -> Self {
        SSMParameter {
            name: name.to_string(),
            value: None,
            p_type,
            key_id: None,
            description: None,
            allowed_pattern: None,
            tier: None,
            data_type: None,
            policies: None,
            last_modified_date: None,
            last_modified_user: None,
            version: None,
            arn: None,
        }
    }
}

/// What is submitted to the target store.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct SSMPutParameter {
    pub name: String,
    #[serde(skip_serializing)]
    pub value: String,
    pub p_type: SSMParameterType,
    pub key_id: Option<String>,
    pub description: Option<String>,
    pub allowed_pattern: Option<String>,
    pub tier: Option<String>,
    pub data_type: Option<String>,
    pub policies: Option<Vec<String>>,
    pub overwrite: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionMode {
    /// Exact name match
    Name,
    /// Every parameter below the path
    Recursive,
    /// Immediate children of the path
    OneLevel,
}

impl SelectionMode {
    pub fn from_flags(recursive: bool, one_level: bool) -> Self {
        if recursive {
            SelectionMode::Recursive
        } else if one_level {
            SelectionMode::OneLevel
        } else {
            SelectionMode::Name
        }
    }

    pub fn filter_key(&self) -> &'static str {
        match self {
            SelectionMode::Name => "Name",
            SelectionMode::Recursive | SelectionMode::OneLevel => "Path",
        }
    }

    pub fn filter_option(&self) -> &'static str {
        match self {
            SelectionMode::Name => "Equals",
            SelectionMode::Recursive => "Recursive",
            SelectionMode::OneLevel => "OneLevel",
        }
    }
}

#[derive(Debug, Clone)]
pub struct SSMParametersRequest {
    pub selector: String,
    pub mode: SelectionMode,
}

#[derive(Debug, Fail)]
pub enum SSMRequestError {
    #[fail(display = "parameter {} already exists", name)]
    AlreadyExists { name: String },
    #[fail(display = "resource {} not found", name)]
    ResourceNotFound { name: String },
    #[fail(display = "{}", reason)]
    Remote { reason: String },
    #[fail(display = "unable to connect: {}", reason)]
    Connect { reason: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameter_type_names() {
        for t in &[
            SSMParameterType::String,
            SSMParameterType::StringList,
            SSMParameterType::SecureString,
        ] {
            assert_eq!(t.as_str().parse::<SSMParameterType>().unwrap(), *t);
        }
        assert!("Binary".parse::<SSMParameterType>().is_err());
    }

    #[test]
    fn selection_mode_filters() {
        let mode = SelectionMode::from_flags(false, false);
        assert_eq!((mode.filter_key(), mode.filter_option()), ("Name", "Equals"));
        let mode = SelectionMode::from_flags(true, false);
        assert_eq!((mode.filter_key(), mode.filter_option()), ("Path", "Recursive"));
        let mode = SelectionMode::from_flags(false, true);
        assert_eq!((mode.filter_key(), mode.filter_option()), ("Path", "OneLevel"));
    }

    #[test]
    fn value_is_not_serialized() {
        let mut p = SSMParameter::new("/app/secret", SSMParameterType::SecureString);
        p.value = Some("hunter2".to_string());
        let json = serde_json::to_string(&p).unwrap();
        assert!(json.contains("/app/secret"));
        assert!(!json.contains("hunter2"));
    }
}
