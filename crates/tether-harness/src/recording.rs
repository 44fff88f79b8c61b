//! Sub-clients that record their lifecycle.

#![allow(clippy::disallowed_types, reason = "Synchronous locking operations only")]

use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use async_trait::async_trait;
use tether_client::{SubClient, SubClientError, SubClientFactory, SubClientRequest};
use tether_core::ServiceKind;

#[derive(Default)]
struct Ledger {
    created: Vec<(ServiceKind, String)>,
    disposals: BTreeMap<ServiceKind, usize>,
}

/// Factory whose sub-clients count their disposals.
#[derive(Default)]
pub struct RecordingSubClientFactory {
    ledger: Arc<Mutex<Ledger>>,
    failing_dispose: Mutex<Option<ServiceKind>>,
    failing_create: Mutex<Option<SubClientError>>,
}

impl RecordingSubClientFactory {
    /// Factory whose clients dispose cleanly.
    pub fn new() -> Self {
        Self::default()
    }

    /// Clients of `kind` fail to dispose (after counting the call).
    pub fn fail_dispose(&self, kind: ServiceKind) {
        *lock(&self.failing_dispose) = Some(kind);
    }

    /// Every later `create` fails with `error`.
    pub fn fail_create(&self, error: SubClientError) {
        *lock(&self.failing_create) = Some(error);
    }

    /// Kinds and addresses created, in order.
    pub fn created(&self) -> Vec<(ServiceKind, String)> {
        lock(&self.ledger).created.clone()
    }

    /// Times clients of `kind` were disposed.
    pub fn disposals(&self, kind: ServiceKind) -> usize {
        lock(&self.ledger).disposals.get(&kind).copied().unwrap_or(0)
    }

    /// Disposals across all kinds.
    pub fn total_disposals(&self) -> usize {
        lock(&self.ledger).disposals.values().sum()
    }
}

impl SubClientFactory for RecordingSubClientFactory {
    fn create(&self, request: SubClientRequest<'_>) -> Result<Arc<dyn SubClient>, SubClientError> {
        if let Some(error) = lock(&self.failing_create).clone() {
            return Err(error);
        }

        lock(&self.ledger).created.push((request.kind, request.address.to_string()));
        let fails = *lock(&self.failing_dispose) == Some(request.kind);

        Ok(Arc::new(RecordingSubClient {
            kind: request.kind,
            address: request.address.to_string(),
            ledger: Arc::clone(&self.ledger),
            fails,
        }))
    }
}

struct RecordingSubClient {
    kind: ServiceKind,
    address: String,
    ledger: Arc<Mutex<Ledger>>,
    fails: bool,
}

#[async_trait]
impl SubClient for RecordingSubClient {
    fn kind(&self) -> ServiceKind {
        self.kind
    }

    fn component_address(&self) -> &str {
        &self.address
    }

    async fn dispose(&self) -> Result<(), SubClientError> {
        *lock(&self.ledger).disposals.entry(self.kind).or_insert(0) += 1;
        if self.fails {
            return Err(SubClientError::Dispose {
                kind: self.kind,
                reason: "component refused to close".into(),
            });
        }
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
