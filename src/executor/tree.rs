//! Reduction tree
//!
//! A node runs its children one after another and folds their summaries with
//! a pluggable reducer. Suites and runs are both built on it.

use futures::future::LocalBoxFuture;
use tracing::{debug, info};

use crate::error::EngineError;
use crate::models::{SetResult, Verdict};

/// Options passed down the tree on every run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Skip remaining siblings once one has failed
    pub stop_on_failure: bool,
}

impl RunOptions {
    pub fn stop_on_failure(mut self, stop: bool) -> Self {
        self.stop_on_failure = stop;
        self
    }
}

/// Anything a node can hold as a child
pub trait Runnable {
    type Summary: Verdict + Clone;

    fn execute<'a>(
        &'a mut self,
        options: &'a RunOptions,
    ) -> LocalBoxFuture<'a, Result<Self::Summary, EngineError>>;
}

/// Folding strategy for one kind of node
pub trait Reducer<S> {
    type Summary: Verdict + Clone;

    /// Accumulator before any child has run
    fn initial(&self) -> Self::Summary;

    /// Merge one child's summary. Must carry `aborted` forward.
    fn reduce(&self, accumulator: Self::Summary, child: &S) -> Self::Summary;
}

/// Ordered children plus the reducer that summarizes them
pub struct ReductionNode<C, R>
where
    C: Runnable,
    R: Reducer<C::Summary>,
{
    name: String,
    children: Vec<C>,
    reducer: R,
    result: SetResult,
    summary: Option<R::Summary>,
    executed: usize,
}

impl<C, R> ReductionNode<C, R>
where
    C: Runnable,
    R: Reducer<C::Summary>,
{
    pub fn new(name: impl Into<String>, reducer: R) -> Self {
        Self {
            name: name.into(),
            children: Vec::new(),
            reducer,
            result: SetResult::Untested,
            summary: None,
            executed: 0,
        }
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = C>) -> Self {
        self.children.extend(children);
        self
    }

    /// Add a child. Fails once the node has run.
    pub fn add_child(&mut self, child: C) -> Result<(), EngineError> {
        if self.summary.is_some() {
            return Err(EngineError::Sealed(self.name.clone()));
        }
        self.children.push(child);
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn children(&self) -> &[C] {
        &self.children
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    /// Children that actually ran in the last run, in order
    pub fn executed(&self) -> &[C] {
        &self.children[..self.executed]
    }

    pub fn result(&self) -> SetResult {
        self.result
    }

    pub fn summary(&self) -> Option<&R::Summary> {
        self.summary.as_ref()
    }

    /// Run children in order and fold their summaries.
    ///
    /// A second call returns the cached summary without running anything.
    pub async fn run(&mut self, options: &RunOptions) -> Result<R::Summary, EngineError> {
        if let Some(summary) = &self.summary {
            return Ok(summary.clone());
        }

        let mut accumulator = self.reducer.initial();
        let mut result = SetResult::Passed;
        let mut executed = 0;

        for child in self.children.iter_mut() {
            if accumulator.aborted() {
                info!("Aborting '{}' after fatal setup failure", self.name);
                break;
            }
            if options.stop_on_failure && !accumulator.passed() {
                debug!("Stopping '{}' on first failure", self.name);
                break;
            }

            let summary = child.execute(options).await?;
            if !summary.passed() {
                result = SetResult::Failed;
            }
            accumulator = self.reducer.reduce(accumulator, &summary);
            executed += 1;
        }

        self.executed = executed;
        self.result = result;
        self.summary = Some(accumulator.clone());
        Ok(accumulator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CaseSummary;
    use futures::FutureExt;
    use std::cell::Cell;
    use std::rc::Rc;

    struct Canned {
        summary: CaseSummary,
        runs: Rc<Cell<usize>>,
    }

    impl Runnable for Canned {
        type Summary = CaseSummary;

        fn execute<'a>(
            &'a mut self,
            _options: &'a RunOptions,
        ) -> LocalBoxFuture<'a, Result<CaseSummary, EngineError>> {
            self.runs.set(self.runs.get() + 1);
            let summary = self.summary.clone();
            async move { Ok(summary) }.boxed_local()
        }
    }

    /// Counts children, ORs abort
    struct Tally;

    #[derive(Clone, Debug, PartialEq)]
    struct Count {
        passed: bool,
        aborted: bool,
        children: usize,
    }

    impl Verdict for Count {
        fn passed(&self) -> bool {
            self.passed
        }
        fn aborted(&self) -> bool {
            self.aborted
        }
    }

    impl Reducer<CaseSummary> for Tally {
        type Summary = Count;

        fn initial(&self) -> Count {
            Count {
                passed: true,
                aborted: false,
                children: 0,
            }
        }

        fn reduce(&self, acc: Count, child: &CaseSummary) -> Count {
            Count {
                passed: acc.passed && child.passed,
                aborted: acc.aborted || child.aborted,
                children: acc.children + 1,
            }
        }
    }

    fn node(summaries: Vec<CaseSummary>) -> (ReductionNode<Canned, Tally>, Rc<Cell<usize>>) {
        let runs = Rc::new(Cell::new(0));
        let mut node = ReductionNode::new("node", Tally);
        for summary in summaries {
            node.add_child(Canned {
                summary,
                runs: runs.clone(),
            })
            .unwrap();
        }
        (node, runs)
    }

    fn failing() -> CaseSummary {
        CaseSummary {
            passed: false,
            ..CaseSummary::default()
        }
    }

    fn aborting() -> CaseSummary {
        CaseSummary {
            aborted: true,
            ..failing()
        }
    }

    #[tokio::test]
    async fn test_runs_all_children_in_order() {
        let (mut node, runs) = node(vec![CaseSummary::passing(), failing(), CaseSummary::passing()]);
        assert_eq!(node.result(), SetResult::Untested);

        let summary = node.run(&RunOptions::default()).await.unwrap();
        assert_eq!(summary.children, 3);
        assert!(!summary.passed);
        assert_eq!(runs.get(), 3);
        assert_eq!(node.result(), SetResult::Failed);
        assert_eq!(node.executed().len(), 3);
    }

    #[tokio::test]
    async fn test_stop_on_failure() {
        let (mut node, runs) = node(vec![CaseSummary::passing(), failing(), CaseSummary::passing()]);
        let options = RunOptions::default().stop_on_failure(true);

        let summary = node.run(&options).await.unwrap();
        assert_eq!(summary.children, 2);
        assert_eq!(runs.get(), 2);
    }

    #[tokio::test]
    async fn test_abort_stops_siblings_without_stop_on_failure() {
        let (mut node, runs) = node(vec![aborting(), CaseSummary::passing()]);

        let summary = node.run(&RunOptions::default()).await.unwrap();
        assert!(summary.aborted);
        assert_eq!(summary.children, 1);
        assert_eq!(runs.get(), 1);
    }

    #[tokio::test]
    async fn test_run_is_idempotent() {
        let (mut node, runs) = node(vec![CaseSummary::passing()]);

        let first = node.run(&RunOptions::default()).await.unwrap();
        let second = node.run(&RunOptions::default()).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(runs.get(), 1);
        assert_eq!(node.result(), SetResult::Passed);
    }

    #[tokio::test]
    async fn test_sealed_after_run() {
        let (mut node, runs) = node(vec![]);
        node.run(&RunOptions::default()).await.unwrap();

        let late = Canned {
            summary: CaseSummary::passing(),
            runs,
        };
        assert!(matches!(node.add_child(late), Err(EngineError::Sealed(_))));
    }
}
