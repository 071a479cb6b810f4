// Minimal shell around the map pipeline: load the datasets from a base
// directory, run one selection through the filter chain and print the
// resulting map specification as JSON. An empty selection is reported as a
// warning, not a failure.
use anyhow::{Context, Result};
use std::collections::BTreeSet;
use std::path::Path;
use std::process::ExitCode;

use carreau_map::dataset::store::Datasets;
use carreau_map::error::PipelineError;
use carreau_map::pipeline::{self, ComposeOptions, PointScope, Selection};

const USAGE: &str = "\
Usage: carreau-map BASE_DIR COMMUNE IDCAR_200M [OPTIONS]

Options:
  --profiles p1,p2     Transport profiles to show (default: all)
  --ranges r1,r2       Time ranges in seconds to show (default: all)
  --global-points      Show every loaded point, not only the commune's
";

fn main() -> ExitCode {
    env_logger::init();

    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<ExitCode> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 3 {
        eprint!("{}", USAGE);
        return Ok(ExitCode::FAILURE);
    }

    let base_dir = &args[0];
    let mut selection = Selection::new(args[1].clone(), args[2].clone());
    let mut options = ComposeOptions::default();

    let mut rest = args[3..].iter();
    while let Some(arg) = rest.next() {
        match arg.as_str() {
            "--profiles" => {
                let value = rest.next().context("--profiles needs a value")?;
                selection.profiles = Some(
                    value
                        .split(',')
                        .map(carreau_map::dataset::isochrone::Profile::parse)
                        .collect(),
                );
            }
            "--ranges" => {
                let value = rest.next().context("--ranges needs a value")?;
                let ranges: BTreeSet<u32> = value
                    .split(',')
                    .map(|r| r.parse().with_context(|| format!("invalid range `{}`", r)))
                    .collect::<Result<_>>()?;
                selection.ranges = Some(ranges);
            }
            "--global-points" => options.scope = PointScope::Global,
            other => anyhow::bail!("unknown option `{}`\n{}", other, USAGE),
        }
    }

    let datasets = Datasets::load_cached(Path::new(base_dir))?;

    match pipeline::render_map(&datasets, &selection, &options) {
        Ok(spec) => {
            let json =
                serde_json::to_string_pretty(&spec).context("Failed to serialize map spec")?;
            println!("{}", json);
            Ok(ExitCode::SUCCESS)
        }
        Err(PipelineError::EmptySelection { commune }) => {
            log::warn!("empty selection for commune `{}`", commune);
            eprintln!(
                "No available Idcar_200m for {}. Please select another commune.",
                commune
            );
            Ok(ExitCode::SUCCESS)
        }
        Err(err) => Err(err.into()),
    }
}
