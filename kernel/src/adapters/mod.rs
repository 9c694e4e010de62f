// Storage Adapters
//
// Backends implementing the log's KvStore contract.

pub mod memory;
pub mod redb;
