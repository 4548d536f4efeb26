//! Per-request pipeline states and failure reporting.

use std::fmt;

use crate::error::Error;

/// States a request moves through, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Received,
    Decoded,
    Preprocessed,
    Inferred,
    Resampled,
    Colorized,
    Persisted,
    Done,
}

impl Stage {
    /// The state reached by the next successful step, `None` once done.
    #[must_use]
    pub const fn next(self) -> Option<Self> {
        match self {
            Self::Received => Some(Self::Decoded),
            Self::Decoded => Some(Self::Preprocessed),
            Self::Preprocessed => Some(Self::Inferred),
            Self::Inferred => Some(Self::Resampled),
            Self::Resampled => Some(Self::Colorized),
            Self::Colorized => Some(Self::Persisted),
            Self::Persisted => Some(Self::Done),
            Self::Done => None,
        }
    }

    /// Name of the step that leaves this state.
    #[must_use]
    pub const fn step(self) -> &'static str {
        match self {
            Self::Received => "decode",
            Self::Decoded => "preprocess",
            Self::Preprocessed => "inference",
            Self::Inferred => "resample",
            Self::Resampled => "colorize",
            Self::Colorized => "persist",
            Self::Persisted => "finish",
            Self::Done => "none",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Terminal failure of one request.
#[derive(Debug, thiserror::Error)]
#[error("{} step failed: {error}", .stage.step())]
pub struct PipelineFailure {
    /// Last state reached before the failing step.
    pub stage: Stage,
    #[source]
    pub error: Error,
}

/// Tracks one request's progress through [`Stage`]s.
#[derive(Debug)]
pub(crate) struct Run {
    stage: Stage,
}

impl Run {
    pub(crate) const fn start() -> Self {
        Self {
            stage: Stage::Received,
        }
    }

    /// Advance to the next state on success, or fail in the current one.
    pub(crate) fn step<T>(&mut self, result: Result<T, Error>) -> Result<T, PipelineFailure> {
        match result {
            Ok(value) => {
                let next = self.stage.next().unwrap_or(Stage::Done);
                tracing::debug!(from = %self.stage, to = %next, "Pipeline transition");
                self.stage = next;
                Ok(value)
            }
            Err(error) => {
                tracing::error!(stage = %self.stage, step = self.stage.step(), "{error}");
                Err(PipelineFailure {
                    stage: self.stage,
                    error,
                })
            }
        }
    }

    pub(crate) const fn stage(&self) -> Stage {
        self.stage
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stages_are_linear() {
        let mut stage = Stage::Received;
        let mut seen = vec![stage];
        while let Some(next) = stage.next() {
            assert!(next > stage);
            seen.push(next);
            stage = next;
        }
        assert_eq!(seen.len(), 8);
        assert_eq!(stage, Stage::Done);
    }

    #[test]
    fn test_run_records_failing_stage() {
        let mut run = Run::start();
        run.step(Ok::<_, Error>(())).unwrap();
        assert_eq!(run.stage(), Stage::Decoded);

        let failure = run
            .step::<()>(Err(Error::InferenceFailed {
                reason: "device lost".to_string(),
            }))
            .unwrap_err();
        assert_eq!(failure.stage, Stage::Decoded);
        assert_eq!(run.stage(), Stage::Decoded);
        assert!(failure.to_string().starts_with("preprocess step failed"));
    }
}
