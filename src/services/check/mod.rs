//! The check engine: everything between the driver tick and the registry.
//!
//! One cycle sweeps overdue tests into timeout, then per account: the
//! dispatch guard takes the lock, the scheduler filters that account's
//! pending associations down to due ones, a single mailbox search covers
//! the whole due token set, and the processor writes the outcome back.

pub mod guard;
pub mod processor;
pub mod scheduler;
pub mod sweeper;
pub mod worker;
