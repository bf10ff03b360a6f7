use std::fmt;

use crate::ir::GraphError;

/// Pipeline stage that raised an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Embedding,
    Planarization,
    Orthogonalization,
    Compaction,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Embedding => "embedding",
            Stage::Planarization => "planarization",
            Stage::Orthogonalization => "orthogonalization",
            Stage::Compaction => "compaction",
        };
        f.write_str(name)
    }
}

/// Every variant is fatal for the current invocation; nothing is retried.
#[derive(Debug, thiserror::Error)]
pub enum LayoutError {
    #[error("degenerate geometry at vertex `{vertex}`: {reason}")]
    DegenerateGeometry { vertex: String, reason: String },
    #[error("invalid planar embedding: {reason}")]
    InvalidEmbedding { reason: String },
    #[error("planarization failed: {reason}")]
    Planarization { reason: String },
    #[error("orthogonalization failed: {reason}")]
    Orthogonalization { reason: String },
    #[error("compaction failed: {reason}")]
    Compaction { reason: String },
    #[error("{stage} exceeded its time budget of {budget_ms} ms")]
    Timeout { stage: Stage, budget_ms: u64 },
    #[error("no position given for vertex `{vertex}`")]
    MissingPosition { vertex: String },
    #[error(transparent)]
    Graph(#[from] GraphError),
}

impl LayoutError {
    pub fn stage(&self) -> Stage {
        match self {
            LayoutError::DegenerateGeometry { .. }
            | LayoutError::InvalidEmbedding { .. }
            | LayoutError::MissingPosition { .. } => Stage::Embedding,
            LayoutError::Planarization { .. } | LayoutError::Graph(_) => Stage::Planarization,
            LayoutError::Orthogonalization { .. } => Stage::Orthogonalization,
            LayoutError::Compaction { .. } => Stage::Compaction,
            LayoutError::Timeout { stage, .. } => *stage,
        }
    }

    pub(crate) fn planarization(reason: impl Into<String>) -> Self {
        LayoutError::Planarization {
            reason: reason.into(),
        }
    }

    pub(crate) fn orthogonalization(reason: impl Into<String>) -> Self {
        LayoutError::Orthogonalization {
            reason: reason.into(),
        }
    }

    pub(crate) fn compaction(reason: impl Into<String>) -> Self {
        LayoutError::Compaction {
            reason: reason.into(),
        }
    }

    pub(crate) fn invalid_embedding(reason: impl Into<String>) -> Self {
        LayoutError::InvalidEmbedding {
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, LayoutError>;
