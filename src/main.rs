#[macro_use]
extern crate serde_derive;

#[macro_use]
extern crate failure_derive;

#[macro_use]
extern crate log;

extern crate serde;
extern crate structopt;
extern crate serde_json;
extern crate rusoto_core;
extern crate rusoto_ssm;
extern crate rusoto_sts;

use std::io::{self, Write};
use std::process;

use structopt::clap::ErrorKind;
use structopt::StructOpt;

use args::*;
use copier::*;
use ssm_ops::*;

mod args;
mod copier;
mod parameter_store;
mod rename;
mod ssm_ops;
mod ssm_parameters;
mod tags;

/// AWS SSM Copy
/// Command Line
/// --recursive, -r => Copy every parameter below the given paths
/// --one-level, -1 => Copy the immediate children of the given paths
/// --overwrite, -f => Overwrite existing parameters in the destination
/// --keep-going, -k => Skip parameters that fail and continue
/// --dry-run, -N => Only show what would be copied
/// --source-region, --source-profile => Where to read from
/// --region, --profile => Where to write to
/// --target-path => Destination path prefix
/// --key-id ID, --clear-key-id/-C => KMS key for encrypted values
/// --with-tags, -W => Copy tags as well
fn main() {
    env_logger::init();

    let options = match Opt::from_args_safe() {
        Ok(options) => options,
        Err(err) => match err.kind {
            ErrorKind::HelpDisplayed | ErrorKind::VersionDisplayed => {
                println!("{}", err.message);
                process::exit(0)
            }
            _ => {
                eprintln!("{}", err.message);
                process::exit(1)
            }
        },
    };

    if let Err(err) = run(&options) {
        let _ = writeln!(io::stderr(), "ERROR: {}", err);
        let _ = io::stderr().flush();
        process::exit(1)
    }
}

fn run(options: &Opt) -> Result<CopyReport, CopyError> {
    let source = SSMOps::connect(&options.source_connection())?;
    let target = SSMOps::connect(&options.target_connection())?;

    let stdout = io::stdout();
    let stderr = io::stderr();
    let copier = ParameterCopier::new(&source, &target, options.copy_options());
    let report = copier.copy(&options.parameters, &mut stdout.lock(), &mut stderr.lock())?;
    info!(
        "{} copied, {} skipped, {} failed, {} with tag errors",
        report.copied, report.skipped, report.failed, report.tags_failed
    );
    Ok(report)
}
