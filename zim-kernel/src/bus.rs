//! Type-keyed publish/subscribe bus with deferred dispatch.
//!
//! Publication is strictly asynchronous: `publish` only appends to the
//! pending queue, and `dispatch_messages` drains the queue that existed
//! when it was called. A callback may publish; its messages land in the
//! (already detached-from) live queue and are delivered by the next drain.
//!
//! The bus is drained only from the kernel's trap path, inside the
//! dispatcher's deactivate/activate bracket, so a drain never observes a
//! concurrent drain. Callbacks must not subscribe or unsubscribe while a
//! drain is in flight.

use core::ptr::NonNull;

use zim_common::message::{Message, MessageType};

use crate::collections::list::ListNode;
use crate::collections::{List, ObjectPool, PooledList};
use crate::error::{BusError, KernelError};
use crate::KernelBuilder;

/// A bound callback: function pointer plus opaque context.
///
/// Identity is the `(fn, context)` pair; `unsubscribe` removes every
/// callback comparing equal under it.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct MessageCallback {
    func: fn(&Message, *mut ()),
    context: *mut (),
}

impl MessageCallback {
    /// Bind `func` to `context`.
    #[must_use]
    pub fn new(func: fn(&Message, *mut ()), context: *mut ()) -> Self {
        Self { func, context }
    }

    /// Invoke the callback.
    #[inline]
    pub fn invoke(&self, msg: &Message) {
        (self.func)(msg, self.context);
    }
}

struct SubscriberEntry {
    ty: MessageType,
    callbacks: List<MessageCallback>,
}

/// The in-kernel message bus.
pub struct MessageBus {
    builder: &'static KernelBuilder,
    registry: List<SubscriberEntry>,
    /// Pending queue over a pool of message-node chunks, so publish and
    /// dispatch churn stays off the heap.
    pending: PooledList<Message>,
}

impl MessageBus {
    /// An empty bus drawing all memory from `builder`.
    pub fn new(builder: &'static KernelBuilder) -> Result<Self, KernelError> {
        let node_pool: NonNull<ObjectPool<ListNode<Message>>> = builder
            .construct(ObjectPool::new(builder))
            .ok_or(KernelError::OutOfMemory)?;
        Ok(Self {
            builder,
            registry: List::new(builder),
            pending: PooledList::new(node_pool),
        })
    }

    /// Register `callback` for messages of type `ty`.
    pub fn subscribe(&mut self, ty: MessageType, callback: MessageCallback) -> Result<(), BusError> {
        if self.registry.find_match(|e| e.ty == ty).is_none() {
            self.registry
                .push_back(SubscriberEntry {
                    ty,
                    callbacks: List::new(self.builder),
                })
                .map_err(|_| BusError::RegistryExhausted)?;
        }
        // The entry exists now; the second lookup cannot miss.
        let Some(entry) = self.registry.find_match_mut(|e| e.ty == ty) else {
            return Err(BusError::RegistryExhausted);
        };
        entry
            .callbacks
            .push_back(callback)
            .map_err(|_| BusError::RegistryExhausted)
    }

    /// Drop every callback equal to `callback` from the `ty` entry.
    pub fn unsubscribe(&mut self, ty: MessageType, callback: MessageCallback) {
        if let Some(entry) = self.registry.find_match_mut(|e| e.ty == ty) {
            entry.callbacks.remove_match(|cb| *cb == callback);
        }
    }

    /// Append `msg` to the pending queue. Callbacks never run here.
    pub fn publish(&mut self, msg: Message) -> Result<(), BusError> {
        if self.pending.push_back(msg) {
            Ok(())
        } else {
            Err(BusError::QueueExhausted)
        }
    }

    /// Drain the pending queue exactly once: every message that was queued
    /// before this call is delivered to its type's callbacks in
    /// publication order; for a single message, callbacks fire in
    /// subscription order.
    pub fn dispatch_messages(&mut self) {
        let mut batch = self.pending.take_all();
        while let Some(msg) = batch.pop_front() {
            if let Some(entry) = self.registry.find_match(|e| e.ty == msg.ty) {
                entry.callbacks.for_each(|cb| cb.invoke(&msg));
            }
            // Messages without a subscriber entry are dropped; shape
            // checks live with the subscribers.
        }
    }

    /// Number of undelivered messages.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.len()
    }

    /// Number of callbacks registered for `ty`.
    #[must_use]
    pub fn subscriber_count(&self, ty: MessageType) -> usize {
        self.registry
            .find_match(|e| e.ty == ty)
            .map_or(0, |e| e.callbacks.len())
    }
}
