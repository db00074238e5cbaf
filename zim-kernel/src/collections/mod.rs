//! Intrusive containers used by every kernel subsystem.
//!
//! [`List`](list::List) is a builder-backed singly-linked list with a tail
//! pointer; [`ObjectPool`](pool::ObjectPool) and
//! [`PooledList`](pool::PooledList) recycle node chunks so that
//! publish/dispatch churn on messages does not thrash the heap.

pub mod list;
pub mod pool;

pub use list::{List, ListNode};
pub use pool::{ObjectPool, PooledList};
