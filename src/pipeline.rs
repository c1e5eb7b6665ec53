//! The segment-to-spec pipeline.
//!
//! A run moves through fixed phases: segments are read, classified,
//! given identifiers, turned into records with their examples, and finally
//! consolidated by identifier. Storing the records is left to the caller
//! (see [`crate::storage::Materializer`]).
//!
//! Only reading the segment list, an empty title, and (in strict mode) a
//! duplicate identifier abort a run. Service failures degrade to
//! pattern-based classification and are counted in the [`Report`].

use std::{collections::HashMap, fmt};

use non_empty_string::NonEmptyString;

use crate::{
    domain::{ReqId, Segment, SegmentCategory, SourceInfo, Spec},
    enrich::{
        BatchEnricher, CancelFlag, ClassificationResult, Classifier, Failure, Outcome,
        PatternClassifier, SplitPolicy, batch,
    },
    extract,
    source::{SegmentSource, Segments, SourceError},
};

pub mod allocator;
use allocator::Claim;

pub mod examples;

pub mod merge;
pub use merge::DuplicateReqId;

/// How segments are classified.
pub enum Mode {
    /// Text patterns only. No service is called.
    Pattern,

    /// One service call per segment.
    SinglePass(Box<dyn Classifier>),

    /// Two batch calls for the whole run: classify, then generate examples.
    Batch {
        /// The batch service.
        enricher: Box<dyn BatchEnricher>,
        /// Batch sizing and splitting.
        policy: SplitPolicy,
    },
}

impl fmt::Debug for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pattern => f.write_str("Pattern"),
            Self::SinglePass(_) => f.write_str("SinglePass"),
            Self::Batch { policy, .. } => f.debug_struct("Batch").field("policy", policy).finish(),
        }
    }
}

/// Post-processing switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Options {
    /// Consolidate records sharing an identifier instead of failing.
    pub merge_duplicates: bool,
    /// Remove duplicate examples from every record.
    pub dedup_examples: bool,
}

/// The phases of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Reading the segment list.
    Reading,
    /// Classifying segments.
    Classifying,
    /// Assigning requirement identifiers.
    AllocatingIds,
    /// Selecting and numbering examples.
    MergingExamples,
    /// Consolidating records by identifier.
    MergingDuplicates,
    /// Writing records to storage.
    Materializing,
    /// Finished.
    Done,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Reading => "reading segments",
            Self::Classifying => "classifying",
            Self::AllocatingIds => "allocating IDs",
            Self::MergingExamples => "merging examples",
            Self::MergingDuplicates => "merging duplicates",
            Self::Materializing => "writing specs",
            Self::Done => "done",
        })
    }
}

/// What happened during a run, apart from the records themselves.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Report {
    /// Segments read.
    pub segments: usize,
    /// Segments listed but missing.
    pub gaps: usize,
    /// Requirement segments classified by the service.
    pub enriched: usize,
    /// Segments not turned into records because of their category.
    pub skipped: usize,
    /// Segments classified by patterns after a service failure.
    pub fallback: usize,
    /// Segments whose service response was still truncated on its own.
    pub partial: Vec<String>,
    /// Segments whose example generation failed.
    pub example_failures: Vec<String>,
    /// Identifiers that were consolidated from several segments.
    pub merged: Vec<ReqId>,
}

impl Report {
    fn note_partial(&mut self, ids: impl IntoIterator<Item = String>) {
        for id in ids {
            if !self.partial.contains(&id) {
                self.partial.push(id);
            }
        }
    }
}

/// The result of a run.
#[derive(Debug, Clone)]
pub struct Output {
    /// The finished records, ready to store.
    pub specs: Vec<Spec>,
    /// Counts and notable events.
    pub report: Report,
}

/// Errors that abort a run.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// The segment list could not be read.
    #[error(transparent)]
    Source(#[from] SourceError),

    /// No title could be found for a requirement segment.
    #[error("empty title for segment {segment_id}")]
    EmptyTitle {
        /// The offending segment.
        segment_id: String,
    },

    /// Two segments resolved to the same identifier and merging is off.
    #[error(transparent)]
    Duplicate(#[from] DuplicateReqId),
}

struct Classification<'a> {
    segment: &'a Segment,
    result: ClassificationResult,
    by_service: bool,
}

/// Turns segments into requirement records.
#[derive(Debug)]
pub struct Pipeline {
    mode: Mode,
    options: Options,
    cancel: CancelFlag,
}

impl Pipeline {
    /// A pipeline classifying with `mode`.
    #[must_use]
    pub fn new(mode: Mode, options: Options) -> Self {
        Self {
            mode,
            options,
            cancel: CancelFlag::default(),
        }
    }

    /// Observe the given cancellation flag between batch calls.
    #[must_use]
    pub fn with_cancel(mut self, cancel: CancelFlag) -> Self {
        self.cancel = cancel;
        self
    }

    /// Run the pipeline over `source`.
    ///
    /// # Errors
    ///
    /// See [`PipelineError`].
    pub fn run(&self, source: &dyn SegmentSource) -> Result<Output, PipelineError> {
        self.run_observed(source, |_| {})
    }

    /// Run the pipeline, calling `observe` as each phase starts.
    ///
    /// # Errors
    ///
    /// See [`PipelineError`].
    #[tracing::instrument(level = "debug", skip_all, fields(mode = ?self.mode))]
    pub fn run_observed(
        &self,
        source: &dyn SegmentSource,
        mut observe: impl FnMut(Phase),
    ) -> Result<Output, PipelineError> {
        let mut report = Report::default();

        observe(Phase::Reading);
        let Segments { segments, gaps } = source.read()?;
        report.segments = segments.len();
        report.gaps = gaps.len();

        observe(Phase::Classifying);
        let classified = self.classify(&segments, &mut report);

        let targets: Vec<Classification<'_>> = classified
            .into_iter()
            .filter(|c| {
                let keep = c.result.category.is_example_target();
                if !keep {
                    tracing::debug!(segment_id = c.segment.id(), category = %c.result.category, "skipped");
                }
                keep
            })
            .collect();
        report.skipped = report.segments - targets.len();
        report.enriched = targets.iter().filter(|c| c.by_service).count();

        observe(Phase::AllocatingIds);
        let claims: Vec<Claim<'_>> = targets
            .iter()
            .map(|c| Claim {
                content: c.segment.content(),
                candidate: c.result.candidate_id.as_deref(),
            })
            .collect();
        let reserved = segments
            .iter()
            .filter_map(|segment| extract::explicit_id(segment.content()));
        let ids = allocator::allocate(&claims, reserved);

        observe(Phase::MergingExamples);
        let specs = targets
            .into_iter()
            .zip(ids)
            .map(|(classification, (id, _))| build(classification, id))
            .collect::<Result<Vec<_>, _>>()?;

        observe(Phase::MergingDuplicates);
        let specs = self.finish(specs, &mut report)?;

        tracing::info!(
            records = specs.len(),
            enriched = report.enriched,
            skipped = report.skipped,
            fallback = report.fallback,
            "pipeline complete"
        );
        Ok(Output { specs, report })
    }

    fn classify<'a>(&self, segments: &'a [Segment], report: &mut Report) -> Vec<Classification<'a>> {
        match &self.mode {
            Mode::Pattern => segments
                .iter()
                .map(|segment| Classification {
                    segment,
                    result: PatternClassifier::classify_segment(segment),
                    by_service: false,
                })
                .collect(),
            Mode::SinglePass(classifier) => classify_each(classifier.as_ref(), segments, report),
            Mode::Batch { enricher, policy } => {
                let mut classified =
                    classify_batch(enricher.as_ref(), *policy, &self.cancel, segments, report);
                self.generate_examples(enricher.as_ref(), *policy, &mut classified, report);
                classified
            }
        }
    }

    fn generate_examples(
        &self,
        enricher: &dyn BatchEnricher,
        policy: SplitPolicy,
        classified: &mut [Classification<'_>],
        report: &mut Report,
    ) {
        let targets: Vec<&Segment> = classified
            .iter()
            .filter(|c| c.result.category.is_example_target())
            .map(|c| c.segment)
            .collect();
        if targets.is_empty() {
            return;
        }
        let context: Vec<&Segment> = classified
            .iter()
            .filter(|c| c.result.category == SegmentCategory::Overview)
            .map(|c| c.segment)
            .collect();

        tracing::debug!(targets = targets.len(), context = context.len(), "generating examples");
        let outcome = batch::split(&targets, policy, &self.cancel, &|batch: &[&Segment]| {
            enricher.generate_examples_batch(batch, &context)
        });

        let mut generated = HashMap::new();
        match outcome {
            Ok(Outcome {
                items,
                partial,
                failures,
            }) => {
                report.note_partial(partial);
                report.example_failures.extend(failed_ids(failures));
                for item in items {
                    generated.entry(item.segment_id).or_insert(item.examples);
                }
            }
            Err(error) => {
                tracing::warn!(%error, "example generation failed, using examples from the text only");
                report
                    .example_failures
                    .extend(failed_ids(error.into_failures()));
            }
        }

        for classification in classified
            .iter_mut()
            .filter(|c| c.result.category.is_example_target())
        {
            let segment_id = classification.segment.id();
            match generated.remove(segment_id) {
                Some(examples) => classification.result.examples = examples,
                None if !report.example_failures.iter().any(|id| id == segment_id) => {
                    tracing::warn!(segment_id, "no examples returned for segment");
                    report.example_failures.push(segment_id.to_string());
                }
                None => {}
            }
        }
    }

    fn finish(&self, specs: Vec<Spec>, report: &mut Report) -> Result<Vec<Spec>, PipelineError> {
        let specs = if self.options.merge_duplicates {
            let (specs, merged) = merge::consolidate(specs);
            if !merged.is_empty() {
                tracing::info!(count = merged.len(), "merged duplicate IDs");
            }
            report.merged = merged;
            specs
        } else {
            merge::check_unique(&specs)?;
            specs
        };

        Ok(if self.options.dedup_examples {
            merge::dedup_examples(specs)
        } else {
            specs
        })
    }
}

fn fallback<'a>(segment: &'a Segment, report: &mut Report) -> Classification<'a> {
    report.fallback += 1;
    Classification {
        segment,
        result: PatternClassifier::classify_segment(segment),
        by_service: false,
    }
}

fn classify_each<'a>(
    classifier: &dyn Classifier,
    segments: &'a [Segment],
    report: &mut Report,
) -> Vec<Classification<'a>> {
    let mut overviews: Vec<&Segment> = Vec::new();
    let mut classified = Vec::with_capacity(segments.len());

    for segment in segments {
        match classifier.classify(segment, &overviews) {
            Ok(result) => {
                tracing::debug!(segment_id = segment.id(), category = %result.category, "classified");
                if result.category == SegmentCategory::Overview {
                    overviews.push(segment);
                }
                classified.push(Classification {
                    segment,
                    result,
                    by_service: true,
                });
            }
            Err(error) => {
                tracing::warn!(segment_id = segment.id(), %error, "classification failed, falling back to pattern extraction");
                classified.push(fallback(segment, report));
            }
        }
    }

    classified
}

fn classify_batch<'a>(
    enricher: &dyn BatchEnricher,
    policy: SplitPolicy,
    cancel: &CancelFlag,
    segments: &'a [Segment],
    report: &mut Report,
) -> Vec<Classification<'a>> {
    let refs: Vec<&Segment> = segments.iter().collect();
    let outcome = batch::split(&refs, policy, cancel, &|batch: &[&Segment]| {
        enricher.classify_batch(batch)
    });

    let mut results = HashMap::new();
    match outcome {
        Ok(outcome) => {
            report.note_partial(outcome.partial);
            for failure in &outcome.failures {
                tracing::warn!(segments = failure.segment_ids.len(), error = %failure.error, "batch classification failed for a sub-batch");
            }
            for item in outcome.items {
                results.entry(item.segment_id).or_insert(item.result);
            }
        }
        Err(error) => {
            tracing::warn!(%error, "batch classification failed, falling back to pattern extraction");
        }
    }

    segments
        .iter()
        .map(|segment| match results.remove(segment.id()) {
            Some(result) => Classification {
                segment,
                result,
                by_service: true,
            },
            None => {
                tracing::debug!(segment_id = segment.id(), "no classification returned, falling back");
                fallback(segment, report)
            }
        })
        .collect()
}

fn failed_ids(failures: impl IntoIterator<Item = Failure>) -> Vec<String> {
    failures
        .into_iter()
        .flat_map(|failure| failure.segment_ids)
        .collect()
}

fn non_blank(title: &str) -> Option<NonEmptyString> {
    NonEmptyString::new(title.trim().to_string()).ok()
}

/// The title of a requirement record, from the first source with a
/// non-blank one.
fn title(segment: &Segment, result: &ClassificationResult) -> Option<NonEmptyString> {
    let content = segment.content();
    result
        .title
        .as_deref()
        .and_then(non_blank)
        .or_else(|| extract::id_with_title(content).and_then(|(_, title)| non_blank(&title)))
        .or_else(|| segment.heading().and_then(non_blank))
        .or_else(|| extract::first_heading(content).and_then(non_blank))
}

fn build(classification: Classification<'_>, id: ReqId) -> Result<Spec, PipelineError> {
    let Classification {
        segment, result, ..
    } = classification;

    let title = title(segment, &result).ok_or_else(|| PipelineError::EmptyTitle {
        segment_id: segment.id().to_string(),
    })?;

    let source = SourceInfo {
        segment_id: segment.id().to_string(),
        heading_path: segment.heading_path().to_vec(),
        file_path: segment.file_path().map(str::to_string),
    };

    let mut spec = Spec::new(id, title, source);
    spec.examples = examples::merge(extract::examples(segment.content()), result.examples);
    spec.questions = extract::questions(segment.content());
    Ok(spec)
}
