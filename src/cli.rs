//! Minimal CLI: detect | normalize over one or more documents.

use std::path::PathBuf;

use anyhow::{anyhow, bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use rayon::prelude::*;
use serde_json::Value;

use crate::load;
use crate::options::{self, ParseOptions};
use crate::transform::{normalize_document, Pipeline, PipelineOutcome};
use crate::version;

// --------------------------------- Types ---------------------------------- //

/// normalize OpenAPI 3.1 documents into the 3.0-compatible internal form
#[derive(Parser, Debug)]
pub struct CommandLineInterface {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// report the detected OpenAPI version of each input
    Detect(DetectCmd),
    /// run the normalization passes and emit the rewritten documents
    Normalize(NormalizeCmd),
}

#[derive(Args, Debug, Clone)]
struct InputSettings {
    /// One or more inputs. May be literal paths or quoted glob patterns
    #[arg(long, short, num_args = 1.., required = true)]
    input: Vec<String>,
}

#[derive(clap::Parser, Debug)]
struct DetectCmd {
    #[command(flatten)]
    input_settings: InputSettings,
}

#[derive(clap::Parser, Debug)]
struct NormalizeCmd {
    #[command(flatten)]
    input_settings: InputSettings,

    /// JSON file with camelCase feature flags (defaults apply per flag)
    #[arg(long)]
    options: Option<PathBuf>,

    /// also normalize schemas under `webhooks`
    #[arg(long)]
    webhooks: bool,

    /// on any pass error, emit the input document untouched instead of failing
    #[arg(long = "fallback-30")]
    fallback_to_openapi30: bool,

    /// skip constructs that fail instead of aborting, reporting them at the end
    #[arg(long)]
    skip_errors: bool,

    /// memoize repeated sub-schemas within each document
    #[arg(long)]
    cache: bool,

    /// print per-pass timing to stderr
    #[arg(long)]
    profile: bool,

    /// output .json file, or a directory for multiple inputs (stdout if omitted)
    #[arg(short, long)]
    out: Option<PathBuf>,
}

// ------------------------------ Implementation ---------------------------- //

impl InputSettings {
    fn resolve(&self) -> Result<Vec<PathBuf>> {
        resolve_file_path_patterns(&self.input)
    }
}

impl CommandLineInterface {
    pub fn load() -> Self {
        Self::parse()
    }

    pub fn run(&self) -> Result<()> {
        match &self.cmd {
            Command::Detect(cmd) => cmd.run(),
            Command::Normalize(cmd) => cmd.run(),
        }
    }
}

impl DetectCmd {
    fn run(&self) -> Result<()> {
        for path in self.input_settings.resolve()? {
            let document = load::load_document(&path)?;
            let info = version::detect(&document)
                .with_context(|| format!("in {}", path.display()))?;
            let supported = version::validate_support(&info).is_ok();
            let tag = if supported { "supported".green() } else { "unsupported".red() };
            println!("{}: openapi {} ({tag})", path.display(), info.version);
        }
        Ok(())
    }
}

impl NormalizeCmd {
    fn run(&self) -> Result<()> {
        let options = self.resolve_options()?;
        let paths = self.input_settings.resolve()?;

        let outcomes: Vec<(PathBuf, PipelineOutcome)> = paths
            .par_iter()
            .map(|path| -> Result<(PathBuf, PipelineOutcome)> {
                let document = load::load_document(path)?;
                let outcome = self
                    .run_pipeline(document, &options)
                    .with_context(|| format!("while normalizing {}", path.display()))?;
                Ok((path.clone(), outcome))
            })
            .collect::<Result<_>>()?;

        for (path, outcome) in &outcomes {
            self.report(path, outcome);
            let rendered = serde_json::to_string_pretty(&outcome.document)?;
            self.write_output(path, &rendered, outcomes.len() > 1)?;
        }
        Ok(())
    }

    fn resolve_options(&self) -> Result<ParseOptions> {
        let user = match &self.options {
            None => None,
            Some(path) => Some(load::load_document(path)?),
        };
        let mut resolved = options::resolve(user)?;
        if self.webhooks {
            resolved.webhooks = true;
        }
        if self.fallback_to_openapi30 {
            resolved.fallback_to_openapi30 = true;
        }
        Ok(resolved)
    }

    fn run_pipeline(&self, document: Value, options: &ParseOptions) -> Result<PipelineOutcome> {
        if !self.skip_errors && !self.cache && !self.profile {
            return Ok(normalize_document(document, options)?);
        }
        let mut pipeline = Pipeline::new(*options);
        if self.skip_errors {
            pipeline = pipeline
                .with_recovery(crate::error::RecoveryPlan::with_default(
                    crate::error::RecoveryStrategy::Skip,
                ))
                .collect_all_errors(crate::error::ErrorCollector::DEFAULT_MAX);
        }
        if self.cache {
            pipeline = pipeline.with_cache();
        }
        if self.profile {
            pipeline = pipeline.with_profiling();
        }
        Ok(pipeline.run(document)?)
    }

    fn report(&self, path: &PathBuf, outcome: &PipelineOutcome) {
        if outcome.fell_back_to_30 {
            eprintln!(
                "{} {}: emitted unchanged (3.0 fallback)",
                "warning".yellow().bold(),
                path.display()
            );
        }
        for error in &outcome.recovered_errors {
            eprintln!("{} {}: {error}", "recovered".yellow(), path.display());
        }
        if let Some(profile) = &outcome.profile {
            eprint!("{}", profile);
        }
    }

    fn write_output(&self, input: &PathBuf, rendered: &str, multiple: bool) -> Result<()> {
        match &self.out {
            None => {
                println!("{rendered}");
                Ok(())
            }
            Some(out) if multiple => {
                // directory mode, one .json per input
                std::fs::create_dir_all(out)?;
                let stem = input
                    .file_stem()
                    .ok_or_else(|| anyhow!("input {} has no file name", input.display()))?;
                let target = out.join(stem).with_extension("json");
                std::fs::write(&target, rendered)
                    .with_context(|| format!("failed to write {}", target.display()))
            }
            Some(out) => {
                if let Some(parent) = out.parent() {
                    if !parent.as_os_str().is_empty() {
                        std::fs::create_dir_all(parent)?;
                    }
                }
                std::fs::write(out, rendered)
                    .with_context(|| format!("failed to write {}", out.display()))
            }
        }
    }
}

// ----------------------------- Internal helpers ---------------------------- //

fn resolve_file_path_patterns<I>(patterns: I) -> Result<Vec<PathBuf>>
where
    I: IntoIterator,
    I::Item: AsRef<str>,
{
    fn has_glob_chars(s: &str) -> bool {
        // Minimal glob detection for the `glob` crate syntax.
        s.bytes().any(|b| matches!(b, b'*' | b'?' | b'[' | b'{'))
    }

    let mut out = Vec::<PathBuf>::new();

    for raw in patterns {
        let pattern = raw.as_ref();

        if has_glob_chars(pattern) {
            let mut matched_any = false;
            for entry in glob::glob(pattern)? {
                out.push(entry?);
                matched_any = true;
            }
            if !matched_any {
                // explicitly a glob yet matched nothing, surface as an error
                bail!("glob pattern matched no files: {pattern}");
            }
        } else {
            out.push(PathBuf::from(pattern));
        }
    }

    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literal_paths_pass_through_unresolved() {
        let paths = resolve_file_path_patterns(["api.yaml", "specs/openapi.json"]).unwrap();
        assert_eq!(paths, vec![PathBuf::from("api.yaml"), PathBuf::from("specs/openapi.json")]);
    }

    #[test]
    fn empty_glob_is_an_error() {
        assert!(resolve_file_path_patterns(["no/such/dir/*.json"]).is_err());
    }
}
