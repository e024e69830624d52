pub mod doc;
pub mod kv;

pub use doc::DocStore;
pub use kv::KvStore;
