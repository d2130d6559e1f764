//! Pluggable per-item transform
//!
//! A transform turns one work item into zero or more records. It is the
//! only domain-specific piece a worker runs; everything else in the pool is
//! generic over the item and record types.

use crate::error::TransformResult;
use std::path::PathBuf;

/// Work unit that can be placed on the task queue
pub trait WorkItem: Send + 'static {
    /// Short label used in logs and item outcomes
    fn label(&self) -> String;
}

impl WorkItem for PathBuf {
    fn label(&self) -> String {
        self.display().to_string()
    }
}

impl WorkItem for String {
    fn label(&self) -> String {
        self.clone()
    }
}

impl WorkItem for u32 {
    fn label(&self) -> String {
        self.to_string()
    }
}

/// Per-item transform shared by every worker
pub trait Transform<I>: Send + Sync + 'static {
    /// Record type produced for each item
    type Record: Send + 'static;

    /// Transform a single item into its records
    fn apply(&self, item: &I) -> TransformResult<Vec<Self::Record>>;
}

/// Adapter that lets a plain closure act as a transform
pub struct FnTransform<F>(pub F);

impl<F> FnTransform<F> {
    pub fn new<I, R>(f: F) -> Self
    where
        F: Fn(&I) -> TransformResult<Vec<R>>,
    {
        Self(f)
    }
}

impl<I, R, F> Transform<I> for FnTransform<F>
where
    F: Fn(&I) -> TransformResult<Vec<R>> + Send + Sync + 'static,
    R: Send + 'static,
{
    type Record = R;

    fn apply(&self, item: &I) -> TransformResult<Vec<R>> {
        (self.0)(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransformError;

    #[test]
    fn test_fn_transform() {
        let double = FnTransform::new(|n: &u32| Ok(vec![*n, *n]));
        assert_eq!(double.apply(&3u32).unwrap(), vec![3, 3]);

        let failing = FnTransform::new(|n: &u32| -> TransformResult<Vec<u32>> {
            Err(TransformError::Malformed {
                path: n.to_string().into(),
                reason: "odd".into(),
            })
        });
        assert!(failing.apply(&1u32).is_err());
    }

    #[test]
    fn test_work_item_labels() {
        assert_eq!(PathBuf::from("/data/a.json").label(), "/data/a.json");
        assert_eq!(7u32.label(), "7");
    }
}
