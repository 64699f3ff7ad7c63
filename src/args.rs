use structopt::StructOpt;

use crate::copier::{CopyOptions, KeyIdPolicy};
use crate::ssm_ops::ConnectionOptions;
use crate::ssm_parameters::SelectionMode;

#[derive(StructOpt, Debug)]
#[structopt(name = "ssm_copy",
    about = "AWS Parameter Store Copy - Copy AWS SSM Parameters between paths, regions and accounts."
)]
pub struct Opt {
    /// One-level copy
    #[structopt(short = "1", long = "one-level", conflicts_with = "recursive")]
    pub one_level: bool,
    /// Recursive copy
    #[structopt(short = "r", long = "recursive")]
    pub recursive: bool,
    /// Overwrite existing values
    #[structopt(short = "f", long = "overwrite", conflicts_with = "keep-going")]
    pub overwrite: bool,
    /// Keep going as much as possible after an error
    #[structopt(short = "k", long = "keep-going")]
    pub keep_going: bool,
    /// Only show what is to be copied
    #[structopt(short = "N", long = "dry-run")]
    pub dry_run: bool,
    /// AWS Region to get the parameters from
    #[structopt(long = "source-region", value_name = "AWS::Region")]
    pub source_region: Option<String>,
    /// AWS Profile to obtain the parameters from
    #[structopt(long = "source-profile", value_name = "NAME")]
    pub source_profile: Option<String>,
    /// AWS Region to copy the parameters to
    #[structopt(long = "region", value_name = "AWS::Region")]
    pub target_region: Option<String>,
    /// AWS Profile to copy the parameters to
    #[structopt(long = "profile", value_name = "NAME")]
    pub target_profile: Option<String>,
    /// Path to copy the parameters to
    #[structopt(long = "target-path", value_name = "NAME")]
    pub target_path: Option<String>,
    /// KMS Key to use for parameter values in the destination
    #[structopt(long = "key-id", value_name = "ID", conflicts_with = "clear-key-id")]
    pub key_id: Option<String>,
    /// Clear the KMS key id associated with the parameter
    #[structopt(short = "C", long = "clear-key-id")]
    pub clear_key_id: bool,
    /// Copy the tags of the parameters too
    #[structopt(short = "W", long = "with-tags")]
    pub with_tags: bool,
    /// Source parameter names or paths
    #[structopt(name = "PARAMETER", required = true, min_values = 1)]
    pub parameters: Vec<String>,
}

impl Opt {
    pub fn copy_options(&self) -> CopyOptions {
        let key_id = match (&self.key_id, self.clear_key_id) {
            (Some(id), _) => KeyIdPolicy::Replace(id.clone()),
            (None, true) => KeyIdPolicy::Clear,
            (None, false) => KeyIdPolicy::Keep,
        };
        CopyOptions {
            mode: SelectionMode::from_flags(self.recursive, self.one_level),
            overwrite: self.overwrite,
            keep_going: self.keep_going,
            dry_run: self.dry_run,
            target_path: self.target_path.clone(),
            key_id,
            with_tags: self.with_tags,
        }
    }

    pub fn source_connection(&self) -> ConnectionOptions {
        ConnectionOptions {
            profile: self.source_profile.clone(),
            region: self.source_region.clone(),
        }
    }

    pub fn target_connection(&self) -> ConnectionOptions {
        ConnectionOptions {
            profile: self.target_profile.clone(),
            region: self.target_region.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<Opt, structopt::clap::Error> {
        Opt::from_iter_safe(std::iter::once("ssm_copy").chain(args.iter().cloned()))
    }

    #[test]
    fn defaults() {
        let opt = parse(&["/app/db"]).unwrap();
        let options = opt.copy_options();
        assert_eq!(opt.parameters, vec!["/app/db".to_string()]);
        assert_eq!(options.mode, SelectionMode::Name);
        assert_eq!(options.key_id, KeyIdPolicy::Keep);
        assert!(!options.overwrite && !options.keep_going && !options.dry_run && !options.with_tags);
        assert_eq!(options.target_path, None);
    }

    #[test]
    fn short_flags() {
        let opt = parse(&["-r", "-f", "-N", "-C", "-W", "/a", "/b"]).unwrap();
        let options = opt.copy_options();
        assert_eq!(options.mode, SelectionMode::Recursive);
        assert!(options.overwrite && options.dry_run && options.with_tags);
        assert_eq!(options.key_id, KeyIdPolicy::Clear);
        assert_eq!(opt.parameters.len(), 2);

        let opt = parse(&["-1", "-k", "/a"]).unwrap();
        assert_eq!(opt.copy_options().mode, SelectionMode::OneLevel);
        assert!(opt.copy_options().keep_going);
    }

    #[test]
    fn connections() {
        let opt = parse(&[
            "--source-region", "eu-west-1", "--source-profile", "dev",
            "--region", "eu-central-1", "--profile", "prod",
            "--target-path", "/prod", "--key-id", "alias/prod", "/dev",
        ])
        .unwrap();
        assert_eq!(opt.source_connection().region.as_deref(), Some("eu-west-1"));
        assert_eq!(opt.source_connection().profile.as_deref(), Some("dev"));
        assert_eq!(opt.target_connection().region.as_deref(), Some("eu-central-1"));
        assert_eq!(opt.target_connection().profile.as_deref(), Some("prod"));
        let options = opt.copy_options();
        assert_eq!(options.target_path.as_deref(), Some("/prod"));
        assert_eq!(options.key_id, KeyIdPolicy::Replace("alias/prod".to_string()));
    }

    #[test]
    fn exclusive_flags_are_rejected() {
        assert!(parse(&["--overwrite", "--keep-going", "/a"]).is_err());
        assert!(parse(&["--key-id", "k", "--clear-key-id", "/a"]).is_err());
        assert!(parse(&["--recursive", "--one-level", "/a"]).is_err());
    }

    #[test]
    fn a_parameter_is_required() {
        assert!(parse(&["--recursive"]).is_err());
    }
}
