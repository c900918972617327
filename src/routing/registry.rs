//! Subscriber registry
//!
//! An ordered list of subscriptions plus the cursors of any dispatch loops
//! currently walking it. Delivery order is subscribe order, duplicates are
//! allowed and each gets its own delivery.
//!
//! Concurrency note: the registry itself is not synchronized. It lives in a
//! [`SharedRegistry`], a re-entrant lock around a `RefCell`, so a subscriber
//! callback running under the dispatch lock can still subscribe or
//! unsubscribe on the same thread. No `RefCell` borrow is held while a
//! callback runs.

use std::any::Any;
use std::cell::RefCell;
use std::fmt;
use std::sync::Arc;

use parking_lot::ReentrantMutex;

use crate::routing::Message;
use crate::transport::QoS;

/// Opaque value handed back to the subscriber on every delivery and returned
/// by unsubscribe.
pub type UserData = Arc<dyn Any + Send + Sync>;

/// Subscriber handler: message, raw topic, raw payload, user data.
pub type Callback = Arc<dyn Fn(&Message, &str, &[u8], Option<&UserData>) + Send + Sync>;

pub type SharedRegistry = Arc<ReentrantMutex<RefCell<Registry>>>;

/// Handle returned by subscribe. Only good for unsubscribing; it does not keep
/// the subscription alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

pub struct Subscription {
    pub id: SubscriptionId,
    pub topic: String,
    pub qos: QoS,
    callback: Callback,
    userdata: Option<UserData>,
}

impl Subscription {
    /// Runs the callback with this subscription's user data.
    pub fn invoke(&self, msg: &Message, topic: &str, payload: &[u8]) {
        (self.callback)(msg, topic, payload, self.userdata.as_ref());
    }

    pub fn userdata(&self) -> Option<&UserData> {
        self.userdata.as_ref()
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("topic", &self.topic)
            .field("qos", &self.qos)
            .field("userdata", &self.userdata.is_some())
            .finish()
    }
}

/// Position of one active dispatch loop.
///
/// `advanced` is set when the entry under `position` was removed: the next
/// entry has slid into `position` and the loop must not step past it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct Cursor {
    position: usize,
    advanced: bool,
}

#[derive(Debug, Default)]
pub struct Registry {
    entries: Vec<Arc<Subscription>>,
    // one per nested dispatch, innermost last
    cursors: Vec<Cursor>,
    next_id: u64,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty registry behind the re-entrant lock the client and
    /// its dispatcher share.
    pub fn shared() -> SharedRegistry {
        Arc::new(ReentrantMutex::new(RefCell::new(Self::new())))
    }

    /// Appends a subscription and returns its handle. An append during
    /// dispatch is visited by that same dispatch once the cursor reaches it.
    pub fn insert(
        &mut self,
        topic: &str,
        qos: QoS,
        callback: Callback,
        userdata: Option<UserData>,
    ) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.entries.push(Arc::new(Subscription {
            id,
            topic: topic.to_string(),
            qos,
            callback,
            userdata,
        }));
        id
    }

    /// Removes the subscription with `id`, keeping every active cursor on the
    /// entry it would have visited next.
    pub fn remove(&mut self, id: SubscriptionId) -> Option<Arc<Subscription>> {
        let index = self.entries.iter().position(|s| s.id == id)?;
        let removed = self.entries.remove(index);

        for cursor in &mut self.cursors {
            if index < cursor.position {
                cursor.position -= 1;
            } else if index == cursor.position {
                cursor.advanced = true;
            }
        }
        Some(removed)
    }

    /// Looks up a live subscription by handle.
    pub fn get(&self, id: SubscriptionId) -> Option<&Arc<Subscription>> {
        self.entries.iter().find(|s| s.id == id)
    }

    /// Whether `id` still names a live subscription.
    pub fn contains(&self, id: SubscriptionId) -> bool {
        self.get(id).is_some()
    }

    /// Number of live subscriptions, duplicates included.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates subscriptions in delivery order.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<Subscription>> {
        self.entries.iter()
    }

    /// Subscribed filters in subscribe order, duplicates included.
    pub fn topics(&self) -> Vec<String> {
        self.entries.iter().map(|s| s.topic.clone()).collect()
    }

    pub(crate) fn begin_iteration(&mut self) -> usize {
        self.cursors.push(Cursor::default());
        self.cursors.len() - 1
    }

    pub(crate) fn current(&self, frame: usize) -> Option<Arc<Subscription>> {
        let cursor = self.cursors.get(frame)?;
        self.entries.get(cursor.position).cloned()
    }

    pub(crate) fn advance(&mut self, frame: usize) {
        if let Some(cursor) = self.cursors.get_mut(frame) {
            if cursor.advanced {
                cursor.advanced = false;
            } else {
                cursor.position += 1;
            }
        }
    }

    pub(crate) fn end_iteration(&mut self, frame: usize) {
        self.cursors.truncate(frame);
    }

    #[cfg(test)]
    pub(crate) fn active_iterations(&self) -> usize {
        self.cursors.len()
    }
}

/// One dispatch loop's walk over the registry. Dropping it retires the
/// cursor, including on early return.
pub(crate) struct Iteration<'a> {
    registry: &'a RefCell<Registry>,
    frame: usize,
}

impl<'a> Iteration<'a> {
    pub(crate) fn begin(registry: &'a RefCell<Registry>) -> Self {
        let frame = registry.borrow_mut().begin_iteration();
        Self { registry, frame }
    }

    pub(crate) fn current(&self) -> Option<Arc<Subscription>> {
        self.registry.borrow().current(self.frame)
    }

    pub(crate) fn advance(&self) {
        self.registry.borrow_mut().advance(self.frame);
    }
}

impl Drop for Iteration<'_> {
    fn drop(&mut self) {
        if let Ok(mut registry) = self.registry.try_borrow_mut() {
            registry.end_iteration(self.frame);
        }
    }
}
