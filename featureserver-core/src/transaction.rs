//! Per-operation outcomes and the transaction summary derived from them.

use std::fmt;

use crate::value::FeatureId;

/// Kind of write an [`OperationResult`] reports on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// Insert.
    Insert,
    /// Update.
    Update,
    /// Delete.
    Delete,
    /// Replace.
    Replace,
}

impl OperationKind {
    /// Lower-case name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
            Self::Replace => "replace",
        }
    }
}

/// Outcome of a single write.
///
/// An empty handle means the operation succeeded; a non-empty handle is the
/// correlation token of a failed operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationResult {
    /// Kind of write.
    pub kind: OperationKind,
    /// Identifier of the affected feature, when known.
    pub resource_id: Option<FeatureId>,
    /// Empty on success.
    pub handle: String,
}

impl OperationResult {
    /// A successful operation.
    #[must_use]
    pub const fn succeeded(kind: OperationKind, resource_id: Option<FeatureId>) -> Self {
        Self {
            kind,
            resource_id,
            handle: String::new(),
        }
    }

    /// A failed operation identified by `handle`.
    pub fn failed(
        kind: OperationKind,
        resource_id: Option<FeatureId>,
        handle: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            resource_id,
            handle: handle.into(),
        }
    }

    /// Whether the result reports a failure.
    #[must_use]
    pub const fn is_failure(&self) -> bool {
        !self.handle.is_empty()
    }
}

/// Overall outcome of a transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
    /// No operation failed.
    Success,
    /// Some, but not all, operations failed.
    Partial,
    /// Every operation failed.
    Failed,
}

impl TransactionStatus {
    /// Upper-case wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "SUCCESS",
            Self::Partial => "PARTIAL",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for TransactionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Counts of successful writes per kind plus the overall status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionSummary {
    /// Successful inserts.
    pub total_inserted: usize,
    /// Successful updates.
    pub total_updated: usize,
    /// Successful deletes.
    pub total_deleted: usize,
    /// Successful replaces.
    pub total_replaced: usize,
    /// Overall status.
    pub status: TransactionStatus,
}

/// Ordered results of the operations of one transaction.
///
/// # Examples
/// ```
/// use featureserver_core::{OperationKind, OperationResult, TransactionResponse, TransactionStatus};
///
/// let mut response = TransactionResponse::default();
/// response.push(OperationResult::succeeded(OperationKind::Insert, Some(1.into())));
/// response.push(OperationResult::failed(OperationKind::Update, None, "u1"));
/// assert_eq!(response.summary().status, TransactionStatus::Partial);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransactionResponse {
    results: Vec<OperationResult>,
}

impl TransactionResponse {
    /// Record an operation outcome.
    pub fn push(&mut self, result: OperationResult) {
        self.results.push(result);
    }

    /// All results in execution order.
    #[must_use]
    pub fn results(&self) -> &[OperationResult] {
        &self.results
    }

    /// Results of one kind in execution order.
    pub fn results_of(&self, kind: OperationKind) -> impl Iterator<Item = &OperationResult> {
        self.results.iter().filter(move |result| result.kind == kind)
    }

    /// Summarise the transaction.
    ///
    /// `Failed` when every result carries a handle, `Partial` when some do and
    /// `Success` otherwise, including for an empty transaction.
    #[must_use]
    pub fn summary(&self) -> TransactionSummary {
        let successes = |kind| {
            self.results_of(kind)
                .filter(|result| !result.is_failure())
                .count()
        };
        let failed = self.results.iter().filter(|r| r.is_failure()).count();
        let status = if failed == 0 {
            TransactionStatus::Success
        } else if failed == self.results.len() {
            TransactionStatus::Failed
        } else {
            TransactionStatus::Partial
        };
        TransactionSummary {
            total_inserted: successes(OperationKind::Insert),
            total_updated: successes(OperationKind::Update),
            total_deleted: successes(OperationKind::Delete),
            total_replaced: successes(OperationKind::Replace),
            status,
        }
    }
}

impl FromIterator<OperationResult> for TransactionResponse {
    fn from_iter<I: IntoIterator<Item = OperationResult>>(iter: I) -> Self {
        Self {
            results: iter.into_iter().collect(),
        }
    }
}
