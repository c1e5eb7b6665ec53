use std::{path::PathBuf, sync::Arc, time::Duration};

use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use spec_enrich::{
    Config, Directory, KireSource, Materializer, Mode, Options, Phase, Pipeline, Report,
    enrich::{
        CancelFlag, GeminiBackend, Service, ServiceBatchEnricher, ServiceClassifier, SplitPolicy,
    },
    storage::{Action, MaterializeError, Policy, Summary},
};
use tracing::instrument;

use super::terminal::Tone;

#[derive(Debug, clap::Parser)]
#[allow(clippy::struct_excessive_bools)]
pub struct Command {
    /// Directory containing the segment files
    #[arg(long)]
    dir: Option<PathBuf>,

    /// Path to the JSONL segment metadata file
    #[arg(long)]
    jsonl: Option<PathBuf>,

    /// Directory to write spec files to
    #[arg(long)]
    spec_dir: Option<PathBuf>,

    /// Overwrite existing spec files
    #[arg(long)]
    force: bool,

    /// Preview without writing files
    #[arg(long)]
    dry_run: bool,

    /// Classify each segment through the service (requires `GEMINI_API_KEY`)
    #[arg(long, conflicts_with = "batch")]
    enrich: bool,

    /// Classify and generate examples in batches (requires `GEMINI_API_KEY`)
    #[arg(long)]
    batch: bool,

    /// Model used for classification
    #[arg(long, value_name = "MODEL")]
    classify_model: Option<String>,

    /// Model used for example generation in batch mode
    #[arg(long, value_name = "MODEL")]
    example_model: Option<String>,

    /// Per-attempt timeout for classification calls
    #[arg(long, value_name = "SECS")]
    classify_timeout: Option<u64>,

    /// Per-attempt timeout for example generation calls
    #[arg(long, value_name = "SECS")]
    example_timeout: Option<u64>,

    /// Largest number of segments per batch call
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    max_batch_size: Option<u64>,

    /// Merge segments that resolve to the same requirement ID
    #[arg(long)]
    merge_duplicates: bool,

    /// Remove duplicate examples from each spec
    #[arg(long)]
    dedup_examples: bool,

    /// Process the halves of a split batch concurrently
    #[arg(long)]
    parallel_splits: bool,
}

impl Command {
    /// Apply command-line overrides on top of the loaded configuration.
    fn settings(&self, mut config: Config) -> Config {
        if let Some(dir) = &self.dir {
            config.segment_dir.clone_from(dir);
        }
        if let Some(jsonl) = &self.jsonl {
            config.metadata_path.clone_from(jsonl);
        }
        if let Some(spec_dir) = &self.spec_dir {
            config.spec_dir.clone_from(spec_dir);
        }
        if let Some(model) = &self.classify_model {
            config.classify_model.clone_from(model);
        }
        if let Some(model) = &self.example_model {
            config.example_model.clone_from(model);
        }
        if let Some(secs) = self.classify_timeout {
            config.classify_timeout_secs = secs;
        }
        if let Some(secs) = self.example_timeout {
            config.example_timeout_secs = secs;
        }
        if let Some(size) = self.max_batch_size {
            config.max_batch_size = usize::try_from(size).unwrap_or(usize::MAX);
        }
        config.merge_duplicates |= self.merge_duplicates;
        config.dedup_examples |= self.dedup_examples;
        config.parallel_splits |= self.parallel_splits;
        config
    }

    fn mode(&self, settings: &Config, cancel: &CancelFlag) -> anyhow::Result<Mode> {
        if !self.enrich && !self.batch {
            return Ok(Mode::Pattern);
        }

        let backend = GeminiBackend::from_env()
            .context("--enrich and --batch call the Gemini API")?;
        let service = Service::new(Arc::new(backend))
            .with_max_retries(settings.max_retries)
            .with_cancel(cancel.clone());
        let classify_timeout = Duration::from_secs(settings.classify_timeout_secs);

        if self.enrich {
            let classifier = ServiceClassifier::new(service, settings.classify_model.clone())
                .with_timeout(self.classify_timeout.map_or(
                    ServiceClassifier::DEFAULT_TIMEOUT,
                    Duration::from_secs,
                ));
            return Ok(Mode::SinglePass(Box::new(classifier)));
        }

        let enricher = ServiceBatchEnricher::new(
            service,
            settings.classify_model.clone(),
            settings.example_model.clone(),
        )
        .with_timeouts(
            classify_timeout,
            Duration::from_secs(settings.example_timeout_secs),
        );

        Ok(Mode::Batch {
            enricher: Box::new(enricher),
            policy: SplitPolicy {
                max_batch: settings.max_batch_size,
                parallel: settings.parallel_splits,
            },
        })
    }

    #[instrument(level = "debug", skip(config))]
    pub fn run(self, config: Config) -> anyhow::Result<()> {
        let settings = self.settings(config);
        let cancel = CancelFlag::default();
        let mode = self.mode(&settings, &cancel)?;
        let uses_service = !matches!(mode, Mode::Pattern);
        if uses_service {
            if let Err(e) = ctrlc::set_handler(on_interrupt(cancel.clone())) {
                tracing::debug!(error = %e, "interrupt handler not installed");
            }
        }

        let options = Options {
            merge_duplicates: settings.merge_duplicates,
            dedup_examples: settings.dedup_examples,
        };
        let pipeline = Pipeline::new(mode, options).with_cancel(cancel.clone());
        let source = KireSource::new(&settings.metadata_path, &settings.segment_dir);

        let spinner = spinner(uses_service)?;
        let output = pipeline.run_observed(&source, |phase| spinner.set_message(phase.to_string()));
        spinner.set_message(Phase::Materializing.to_string());

        let output = match output {
            Ok(output) => output,
            Err(e) => {
                spinner.finish_and_clear();
                return Err(e.into());
            }
        };
        if cancel.is_cancelled() {
            spinner.println(Tone::Warning.paint(
                "Interrupted: remaining segments were classified from their text only.",
            ));
        }

        let mut store = Directory::new(settings.spec_dir.clone());
        let policy = Policy::from_flags(self.dry_run, self.force);
        let result = Materializer::new(policy).materialize(output.specs, &mut store);
        spinner.finish_and_clear();

        let summary = match result {
            Ok(summary) => summary,
            Err(e) => {
                print_actions(e.summary(), &store);
                if let MaterializeError::Store { .. } = e {
                    eprintln!("{}", Tone::Warning.paint("Stopped: later specs were not written."));
                }
                return Err(e.into());
            }
        };

        print_actions(&summary, &store);
        print_report(&output.report, uses_service);
        println!("\n{}", Tone::Success.paint(&summary));
        Ok(())
    }
}

/// Stop further service calls; a call already in flight runs to its timeout.
fn on_interrupt(cancel: CancelFlag) -> impl Fn() + Send + 'static {
    move || {
        tracing::warn!("interrupted, finishing without further service calls");
        cancel.cancel();
    }
}

fn spinner(visible: bool) -> anyhow::Result<ProgressBar> {
    if !visible {
        return Ok(ProgressBar::hidden());
    }
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("{spinner:.green} {msg}")?);
    spinner.enable_steady_tick(Duration::from_millis(100));
    Ok(spinner)
}

fn print_actions(summary: &Summary, store: &Directory) {
    for &(id, action) in &summary.actions {
        let line = format!("{action}: {}", store.path(id).display());
        match action {
            Action::Created | Action::Overwritten => println!("{line}"),
            Action::Skipped | Action::Previewed => println!("{}", Tone::Muted.paint(&line)),
        }
    }
}

fn print_report(report: &Report, uses_service: bool) {
    let gaps = if report.gaps > 0 {
        format!(" ({} missing)", report.gaps)
    } else {
        String::new()
    };
    println!("\n{} segments read{gaps}", report.segments);

    if uses_service {
        println!(
            "{} enriched, {} skipped, {} fallback",
            report.enriched, report.skipped, report.fallback
        );
    }
    if !report.partial.is_empty() {
        println!(
            "{}",
            Tone::Warning.paint(format!("partial results for: {}", report.partial.join(", ")))
        );
    }
    if !report.example_failures.is_empty() {
        println!(
            "{}",
            Tone::Warning.paint(format!(
                "example generation failed for: {}",
                report.example_failures.join(", ")
            ))
        );
    }
    if !report.merged.is_empty() {
        let merged: Vec<String> = report.merged.iter().map(ToString::to_string).collect();
        println!("merged duplicates: {}", merged.join(", "));
    }
}
