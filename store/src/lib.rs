//! Read-optimized ledger store.
//!
//! The crate separates the storage contract ([`Store`]) from its backends so
//! the same entities, batches, indexes and readers run unchanged over an
//! embedded key-value database or an in-memory document store. Writes flow
//! through [`Batch`]es; secondary indexes are maintained by hooks on the
//! [`EventBus`] inside the same atomic apply as the entity that triggered
//! them.

pub mod backend;
pub mod batch;
pub mod errors;
pub mod events;
pub mod index;
pub mod iter;
pub mod keys;
pub mod logger;
pub mod model;
pub mod query;
pub mod reader;
pub mod store;

pub use backend::{DocStore, KvStore};
pub use batch::Batch;
pub use errors::StoreError;
pub use events::{Event, EventBus, EventKind, HookOutput, IndexHook};
pub use index::register_default_hooks;
pub use iter::{Entry, EntryIter, ListOptions};
pub use keys::{KeySchema, Namespace};
pub use model::{Account, Block, Operation, OperationKind, Transaction};
pub use reader::{Page, Reader};
pub use store::{publish, Store, WriteOp};
