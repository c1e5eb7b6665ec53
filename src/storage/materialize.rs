use std::fmt;

use crate::{
    domain::{InvalidSpec, ReqId, Spec},
    storage::{SpecStore, StoreError},
};

/// How existing records are treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Policy {
    /// Keep existing records; write only new ones.
    #[default]
    SkipExisting,
    /// Replace existing records.
    Overwrite,
    /// Write nothing; report every record as previewed.
    DryRun,
}

impl Policy {
    /// The policy selected by the `--dry-run` and `--force` flags.
    ///
    /// A dry run takes precedence.
    #[must_use]
    pub const fn from_flags(dry_run: bool, force: bool) -> Self {
        match (dry_run, force) {
            (true, _) => Self::DryRun,
            (false, true) => Self::Overwrite,
            (false, false) => Self::SkipExisting,
        }
    }
}

/// What happened to one record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Written; no record existed before.
    Created,
    /// Not written because a record already existed.
    Skipped,
    /// Written over an existing record.
    Overwritten,
    /// Not written because of a dry run.
    Previewed,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Created => "created",
            Self::Skipped => "skipped",
            Self::Overwritten => "overwritten",
            Self::Previewed => "dry-run",
        })
    }
}

/// The per-record actions of a materialization, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Summary {
    /// One entry per record handled so far.
    pub actions: Vec<(ReqId, Action)>,
}

impl Summary {
    fn count(&self, action: Action) -> usize {
        self.actions.iter().filter(|(_, a)| *a == action).count()
    }

    /// Records created.
    #[must_use]
    pub fn created(&self) -> usize {
        self.count(Action::Created)
    }

    /// Records skipped because they already existed.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.count(Action::Skipped)
    }

    /// Records overwritten.
    #[must_use]
    pub fn overwritten(&self) -> usize {
        self.count(Action::Overwritten)
    }

    /// Records previewed in a dry run.
    #[must_use]
    pub fn previewed(&self) -> usize {
        self.count(Action::Previewed)
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} created, {} skipped, {} overwritten, {} previewed",
            self.created(),
            self.skipped(),
            self.overwritten(),
            self.previewed()
        )
    }
}

/// Materialization stopped at a record.
///
/// Records handled before the failing one stay as they are; `summary`
/// lists them.
#[derive(Debug, thiserror::Error)]
pub enum MaterializeError {
    /// The record is invalid and was not written.
    #[error("refusing to write {id}: {source}")]
    Invalid {
        /// The record.
        id: ReqId,
        /// The violation.
        source: InvalidSpec,
        /// Actions taken before the failure.
        summary: Summary,
    },

    /// The store rejected the write.
    #[error("failed to write {id}: {source}")]
    Store {
        /// The record.
        id: ReqId,
        /// The store error.
        source: StoreError,
        /// Actions taken before the failure.
        summary: Summary,
    },
}

impl MaterializeError {
    /// Actions taken before the failure.
    #[must_use]
    pub const fn summary(&self) -> &Summary {
        match self {
            Self::Invalid { summary, .. } | Self::Store { summary, .. } => summary,
        }
    }
}

/// Persists finished records according to a [`Policy`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Materializer {
    policy: Policy,
}

impl Materializer {
    /// A materializer applying `policy`.
    #[must_use]
    pub const fn new(policy: Policy) -> Self {
        Self { policy }
    }

    /// Store every record, reporting one [`Action`] per record.
    ///
    /// Unnumbered examples are numbered and each record is validated before
    /// it is written.
    ///
    /// # Errors
    ///
    /// Stops at the first invalid record or failed write. Records already
    /// written remain written.
    #[tracing::instrument(level = "debug", skip_all, fields(policy = ?self.policy, records = specs.len()))]
    pub fn materialize(
        &self,
        specs: Vec<Spec>,
        store: &mut dyn SpecStore,
    ) -> Result<Summary, MaterializeError> {
        let mut summary = Summary::default();

        for mut spec in specs {
            let id = spec.id;
            spec.normalize();
            if let Err(source) = spec.validate() {
                return Err(MaterializeError::Invalid {
                    id,
                    source,
                    summary,
                });
            }

            let action = match self.policy {
                Policy::DryRun => Action::Previewed,
                Policy::SkipExisting if store.exists(id) => Action::Skipped,
                policy => {
                    let existed = policy == Policy::Overwrite && store.exists(id);
                    if let Err(source) = store.write(&spec) {
                        return Err(MaterializeError::Store {
                            id,
                            source,
                            summary,
                        });
                    }
                    if existed {
                        Action::Overwritten
                    } else {
                        Action::Created
                    }
                }
            };

            tracing::debug!(%id, %action, "materialized");
            summary.actions.push((id, action));
        }

        Ok(summary)
    }
}
