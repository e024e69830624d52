//! Two-phase event bus.
//!
//! Index maintenance and external notification have different durability
//! needs, so the two phases are separate registration surfaces rather than a
//! naming convention:
//!
//! * [`IndexHook`]s run before commit. They turn a domain event into derived
//!   [`WriteOp`]s that join the same atomic apply as the entity that fired
//!   the event, plus optional follow-up events.
//! * Subscribers run after commit, synchronously (closures) or
//!   asynchronously (tokio channels). They never observe uncommitted data.
//!
//! A bus is constructed explicitly and injected into each backend; there is
//! no process-wide observer.

use crate::errors::StoreError;
use crate::model::{Account, Block, Operation, Transaction};
use crate::store::{Store, WriteOp};
use std::collections::HashMap;
use std::sync::RwLock;
use tokio::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    BlockSaved,
    TransactionSaved,
    OperationSaved,
    AccountSaved,
    NewOperation,
}

#[derive(Debug, Clone)]
pub enum Event {
    BlockSaved(Block),
    TransactionSaved(Transaction),
    OperationSaved(Operation),
    AccountSaved(Account),
    NewOperation { address: String, operation: Operation },
}

impl Event {
    pub fn kind(&self) -> EventKind {
        match self {
            Event::BlockSaved(_) => EventKind::BlockSaved,
            Event::TransactionSaved(_) => EventKind::TransactionSaved,
            Event::OperationSaved(_) => EventKind::OperationSaved,
            Event::AccountSaved(_) => EventKind::AccountSaved,
            Event::NewOperation { .. } => EventKind::NewOperation,
        }
    }
}

/// Derived writes and follow-up events produced by a hook for one event.
#[derive(Debug, Default)]
pub struct HookOutput {
    pub ops: Vec<WriteOp>,
    pub follow_ups: Vec<Event>,
}

impl HookOutput {
    pub fn none() -> Self {
        HookOutput::default()
    }

    pub fn with_ops(ops: Vec<WriteOp>) -> Self {
        HookOutput { ops, follow_ups: Vec::new() }
    }
}

/// Before-commit secondary-index maintenance. The store handed in reflects
/// committed state only; derived ops land in the same apply as the event's
/// source entity.
pub trait IndexHook: Send + Sync {
    fn name(&self) -> &'static str;
    fn derive(&self, store: &dyn Store, event: &Event) -> Result<HookOutput, StoreError>;
}

type SyncSubscriber = (Option<EventKind>, Box<dyn Fn(&Event) + Send + Sync>);

pub struct EventBus {
    hooks: RwLock<Vec<Box<dyn IndexHook>>>,
    sync_subscribers: RwLock<Vec<SyncSubscriber>>,
    async_subscribers: RwLock<Vec<(Option<EventKind>, mpsc::UnboundedSender<Event>)>>,
    operation_watchers: RwLock<HashMap<String, Vec<mpsc::UnboundedSender<Event>>>>,
}

impl Default for EventBus {
    fn default() -> Self {
        EventBus::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        EventBus {
            hooks: RwLock::new(Vec::new()),
            sync_subscribers: RwLock::new(Vec::new()),
            async_subscribers: RwLock::new(Vec::new()),
            operation_watchers: RwLock::new(HashMap::new()),
        }
    }

    pub fn register_hook(&self, hook: Box<dyn IndexHook>) {
        self.hooks.write().unwrap().push(hook);
    }

    /// Synchronous after-commit subscription; `kind = None` receives all events.
    pub fn subscribe<F>(&self, kind: Option<EventKind>, f: F)
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        self.sync_subscribers.write().unwrap().push((kind, Box::new(f)));
    }

    /// Asynchronous after-commit subscription delivered over an unbounded channel.
    pub fn subscribe_channel(&self, kind: Option<EventKind>) -> mpsc::UnboundedReceiver<Event> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.async_subscribers.write().unwrap().push((kind, tx));
        rx
    }

    /// Live stream of `NewOperation` events for one address.
    pub fn watch_operations(&self, address: &str) -> mpsc::UnboundedReceiver<Event> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.operation_watchers
            .write()
            .unwrap()
            .entry(address.to_string())
            .or_default()
            .push(tx);
        rx
    }

    /// Run every registered hook for one event, merging their outputs.
    pub(crate) fn run_hooks(&self, store: &dyn Store, event: &Event) -> Result<HookOutput, StoreError> {
        let hooks = self.hooks.read().unwrap();
        let mut merged = HookOutput::none();
        for hook in hooks.iter() {
            let out = hook.derive(store, event).map_err(|e| StoreError::Hook {
                hook: hook.name(),
                source: Box::new(e),
            })?;
            merged.ops.extend(out.ops);
            merged.follow_ups.extend(out.follow_ups);
        }
        Ok(merged)
    }

    /// After-commit delivery. Closed async channels are pruned on the way.
    pub(crate) fn deliver(&self, event: &Event) {
        for (kind, f) in self.sync_subscribers.read().unwrap().iter() {
            if kind.is_none() || *kind == Some(event.kind()) {
                f(event);
            }
        }
        self.async_subscribers
            .write()
            .unwrap()
            .retain(|(kind, tx)| {
                if kind.is_none() || *kind == Some(event.kind()) {
                    tx.send(event.clone()).is_ok()
                } else {
                    !tx.is_closed()
                }
            });
        if let Event::NewOperation { address, .. } = event {
            let mut watchers = self.operation_watchers.write().unwrap();
            if let Some(senders) = watchers.get_mut(address) {
                senders.retain(|tx| tx.send(event.clone()).is_ok());
                if senders.is_empty() {
                    watchers.remove(address);
                }
            }
        }
    }
}
