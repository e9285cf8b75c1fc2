use std::fmt::Debug;
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use dashmap::DashMap;
use futures::future::{BoxFuture, Shared};
use proxy_message::types::WorkflowExecution;

use crate::error::EngineError;

/// Resolves with the workflow result once the execution closes. Any number of
/// parties may await a clone.
pub type CompletionHandle = Shared<BoxFuture<'static, Result<Option<Vec<u8>>, EngineError>>>;

/// Live state of one in-flight workflow execution.
#[derive(Clone)]
pub struct WorkflowExecutionContext {
    pub execution: WorkflowExecution,
    pub domain: String,
    pub completion: CompletionHandle,
}

impl WorkflowExecutionContext {
    pub fn new(
        execution: WorkflowExecution,
        domain: impl Into<String>,
        completion: CompletionHandle,
    ) -> Self {
        Self {
            execution,
            domain: domain.into(),
            completion,
        }
    }
}

impl Debug for WorkflowExecutionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowExecutionContext")
            .field("execution", &self.execution)
            .field("domain", &self.domain)
            .field("completed", &self.completion.peek().is_some())
            .finish()
    }
}

/// Proxy side handle of one activity invocation running on the library.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActivityContext {
    pub task_token: Vec<u8>,
    /// Details recorded by a previous attempt, if any.
    pub heartbeat_details: Option<Vec<u8>>,
}

/// Concurrent id → context store.
///
/// Ids are handed out by [`allocate`](Self::allocate), start at 1, only ever
/// grow and are never reused. Contexts are shared as `Arc`s so a `get` never
/// sees a partially built value.
#[derive(Debug)]
pub struct ContextRegistry<T> {
    last_id: AtomicI64,
    contexts: DashMap<i64, Arc<T>>,
}

impl<T> Default for ContextRegistry<T> {
    fn default() -> Self {
        Self {
            last_id: AtomicI64::new(0),
            contexts: DashMap::new(),
        }
    }
}

impl<T> ContextRegistry<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&self) -> i64 {
        self.last_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Stores a context, replacing any previous one under the same id.
    pub fn put(&self, id: i64, context: impl Into<Arc<T>>) {
        self.contexts.insert(id, context.into());
    }

    pub fn get(&self, id: i64) -> Option<Arc<T>> {
        self.contexts.get(&id).map(|entry| entry.value().clone())
    }

    /// Removes and returns the context; removing an unknown id is a no-op.
    pub fn remove(&self, id: i64) -> Option<Arc<T>> {
        self.contexts.remove(&id).map(|(_, context)| context)
    }

    pub fn len(&self) -> usize {
        self.contexts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contexts.is_empty()
    }

    pub fn ids(&self) -> Vec<i64> {
        self.contexts.iter().map(|entry| *entry.key()).collect()
    }

    /// First context matching `predicate`, in no particular order.
    pub fn find(&self, predicate: impl Fn(&T) -> bool) -> Option<(i64, Arc<T>)> {
        self.contexts
            .iter()
            .find(|entry| predicate(entry.value()))
            .map(|entry| (*entry.key(), entry.value().clone()))
    }
}

pub type WorkflowContexts = ContextRegistry<WorkflowExecutionContext>;
pub type ActivityContexts = ContextRegistry<ActivityContext>;

#[cfg(test)]
mod tests {
    use super::*;
    use futures::FutureExt;
    use std::collections::HashSet;
    use std::thread;

    fn completed(result: &[u8]) -> CompletionHandle {
        let result = result.to_vec();
        async move { Ok(Some(result)) }.boxed().shared()
    }

    #[test]
    fn ids_start_at_one_and_grow() {
        let registry = WorkflowContexts::new();
        assert_eq!(registry.allocate(), 1);
        assert_eq!(registry.allocate(), 2);
        registry.remove(1);
        assert_eq!(registry.allocate(), 3);
    }

    #[test]
    fn concurrent_allocation_is_distinct() {
        let registry = Arc::new(ActivityContexts::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = registry.clone();
                thread::spawn(move || (0..500).map(|_| registry.allocate()).collect::<Vec<_>>())
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(seen.insert(id), "id {id} handed out twice");
            }
        }
        assert_eq!(seen.len(), 4000);
        assert_eq!(seen.iter().min(), Some(&1));
        assert_eq!(seen.iter().max(), Some(&4000));
    }

    #[test]
    fn put_get_remove() {
        let registry = WorkflowContexts::new();
        let id = registry.allocate();
        assert!(registry.get(id).is_none());

        let ctx = Arc::new(WorkflowExecutionContext::new(
            WorkflowExecution::new("wf", "run-1"),
            "samples",
            completed(b"ok"),
        ));
        registry.put(id, ctx.clone());
        let first = registry.get(id).unwrap();
        let second = registry.get(id).unwrap();
        assert!(Arc::ptr_eq(&first, &ctx));
        assert!(Arc::ptr_eq(&first, &second));

        assert!(registry.remove(id).is_some());
        assert!(registry.get(id).is_none());
        assert!(registry.remove(id).is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn last_put_wins() {
        let registry = ActivityContexts::new();
        registry.put(5, ActivityContext { task_token: vec![1], heartbeat_details: None });
        registry.put(5, ActivityContext { task_token: vec![2], heartbeat_details: None });
        assert_eq!(registry.get(5).unwrap().task_token, vec![2]);
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn find_by_execution() {
        let registry = WorkflowContexts::new();
        for (id, wf) in [(1, "a"), (2, "b")] {
            let execution = WorkflowExecution::new(wf, "r");
            registry.put(id, WorkflowExecutionContext::new(execution, "d", completed(b"")));
        }
        let (id, ctx) = registry.find(|c| c.execution.workflow_id == "b").unwrap();
        assert_eq!(id, 2);
        assert_eq!(ctx.execution.workflow_id, "b");
        assert!(registry.find(|c| c.execution.workflow_id == "z").is_none());
        let mut ids = registry.ids();
        ids.sort();
        assert_eq!(ids, vec![1, 2]);
    }
}
