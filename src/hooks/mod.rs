//! Lifecycle hooks.
//!
//! Hooks attach to a schema per operation name (`init`, `validate`,
//! `save`, `remove`, or anything user-defined) and run sequentially:
//! each hook completes before the next starts, and the first failure
//! aborts the chain.
//!
//! Every registration is stamped with a [`HookId`]. The id survives
//! schema cloning and composition, so a chain inherited from a base
//! schema and re-applied through a child never fires twice.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;
use thiserror::Error;
use tracing::debug;

use crate::document::Document;

/// Error produced by a failing hook. The surrounding operation wraps
/// it with phase and operation context.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct HookError {
    message: String,
}

impl HookError {
    pub fn new(message: impl Into<String>) -> Self {
        HookError {
            message: message.into(),
        }
    }
}

/// Future returned by a hook invocation.
pub type HookFuture<'a> = Pin<Box<dyn Future<Output = Result<(), HookError>> + Send + 'a>>;

/// A hook body. Borrows the document for the duration of its future.
pub trait HookFn: Send + Sync {
    fn call<'a>(&'a self, doc: &'a mut Document) -> HookFuture<'a>;
}

impl<F> HookFn for F
where
    F: for<'a> Fn(&'a mut Document) -> HookFuture<'a> + Send + Sync,
{
    fn call<'a>(&'a self, doc: &'a mut Document) -> HookFuture<'a> {
        (self)(doc)
    }
}

/// Wraps an async hook body as a shareable hook function.
///
/// Plain `fn` items with the signature
/// `fn(&mut Document) -> HookFuture<'_>` coerce here directly.
pub fn hook<F>(f: F) -> Arc<dyn HookFn>
where
    F: for<'a> Fn(&'a mut Document) -> HookFuture<'a> + Send + Sync + 'static,
{
    Arc::new(f)
}

struct SyncHook<F>(F);

impl<F> HookFn for SyncHook<F>
where
    F: Fn(&mut Document) -> Result<(), HookError> + Send + Sync,
{
    fn call<'a>(&'a self, doc: &'a mut Document) -> HookFuture<'a> {
        let result = (self.0)(doc);
        Box::pin(async move { result })
    }
}

/// Wraps a synchronous closure as a hook function.
pub fn sync_hook<F>(f: F) -> Arc<dyn HookFn>
where
    F: Fn(&mut Document) -> Result<(), HookError> + Send + Sync + 'static,
{
    Arc::new(SyncHook(f))
}

static NEXT_HOOK_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of a single hook registration, used to deduplicate chains
/// when schemas are composed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HookId(u64);

impl HookId {
    fn next() -> Self {
        HookId(NEXT_HOOK_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// A registered hook: the body plus its registration identity.
#[derive(Clone)]
pub struct Hook {
    id: HookId,
    body: Arc<dyn HookFn>,
}

impl Hook {
    pub fn id(&self) -> HookId {
        self.id
    }

    pub async fn run(&self, doc: &mut Document) -> Result<(), HookError> {
        self.body.call(doc).await
    }
}

impl fmt::Debug for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Hook").field(&self.id).finish()
    }
}

/// Pre and post hook chains, keyed by operation name in registration
/// order.
#[derive(Debug, Clone, Default)]
pub struct HookSet {
    pre: IndexMap<String, Vec<Hook>>,
    post: IndexMap<String, Vec<Hook>>,
}

impl HookSet {
    pub fn new() -> Self {
        HookSet::default()
    }

    pub fn add_pre(&mut self, operation: impl Into<String>, body: Arc<dyn HookFn>) -> HookId {
        let hook = Hook {
            id: HookId::next(),
            body,
        };
        let id = hook.id;
        self.pre
            .entry(operation.into())
            .or_insert_with(Vec::new)
            .push(hook);
        id
    }

    pub fn add_post(&mut self, operation: impl Into<String>, body: Arc<dyn HookFn>) -> HookId {
        let hook = Hook {
            id: HookId::next(),
            body,
        };
        let id = hook.id;
        self.post
            .entry(operation.into())
            .or_insert_with(Vec::new)
            .push(hook);
        id
    }

    pub fn pre(&self, operation: &str) -> &[Hook] {
        self.pre.get(operation).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn post(&self, operation: &str) -> &[Hook] {
        self.post.get(operation).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Appends every chain from `other` after this set's own chains,
    /// skipping hooks whose id is already present. Base-before-addition
    /// ordering is what schema composition requires.
    pub(crate) fn append_dedup(&mut self, other: &HookSet) {
        for (operation, hooks) in &other.pre {
            let chain = self
                .pre
                .entry(operation.clone())
                .or_insert_with(Vec::new);
            for hook in hooks {
                if !chain.iter().any(|h| h.id == hook.id) {
                    chain.push(hook.clone());
                }
            }
        }
        for (operation, hooks) in &other.post {
            let chain = self
                .post
                .entry(operation.clone())
                .or_insert_with(Vec::new);
            for hook in hooks {
                if !chain.iter().any(|h| h.id == hook.id) {
                    chain.push(hook.clone());
                }
            }
        }
    }
}

/// Runs a chain to completion, stopping at the first failure.
pub async fn run_chain(hooks: &[Hook], doc: &mut Document) -> Result<(), HookError> {
    for hook in hooks {
        if let Err(err) = hook.run(doc).await {
            debug!(hook = ?hook.id(), error = %err, "hook chain aborted");
            return Err(err);
        }
    }
    Ok(())
}
