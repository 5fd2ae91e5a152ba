//! Double-buffered, type-keyed publish/subscribe queue.
//!
//! [`EventBus::publish`] appends to the write queue. [`EventBus::dispatch`]
//! swaps the queues and delivers the read side, so anything published while
//! subscribers run lands in the now-empty write queue and waits for the next
//! dispatch. A dispatch pass therefore always terminates, whatever the
//! subscribers publish.
//!
//! Subscribers are either script callbacks (with an optional context value
//! passed as the first argument) or native closures. Script values are
//! pinned on subscribe and unpinned on unsubscribe.

use std::cell::{Cell, RefCell};
use std::rc::Rc;

use log::{debug, warn};
use smallvec::SmallVec;

use crate::events::bus::Event;
use crate::resources::handletable::{Handle, HandleTable};
use crate::resources::scripthost::{PassGuard, ScriptHost, invoke_logged, pin_opt, unpin_opt};

/// Native subscriber callback.
pub type NativeListener = Rc<dyn Fn(&Event)>;

#[derive(Clone)]
pub enum Listener<V> {
    Script { callback: V, context: Option<V> },
    Native(NativeListener),
}

struct Subscription<V> {
    event_type: String,
    listener: Listener<V>,
}

pub struct EventBus<H: ScriptHost> {
    host: Rc<H>,
    subscriptions: RefCell<HandleTable<Subscription<H::Value>>>,
    write_queue: RefCell<Vec<Event>>,
    read_queue: RefCell<Vec<Event>>,
    dispatching: Cell<bool>,
}

impl<H: ScriptHost> EventBus<H> {
    pub fn new(host: Rc<H>) -> Self {
        EventBus {
            host,
            subscriptions: RefCell::new(HandleTable::new()),
            write_queue: RefCell::new(Vec::new()),
            read_queue: RefCell::new(Vec::new()),
            dispatching: Cell::new(false),
        }
    }

    /// Queue an event for the next [`dispatch`](Self::dispatch).
    pub fn publish(&self, event: Event) {
        self.write_queue.borrow_mut().push(event);
    }

    /// Subscribe a script callback to `event_type`.
    pub fn subscribe(
        &self,
        event_type: impl Into<String>,
        callback: H::Value,
        context: Option<H::Value>,
    ) -> Handle {
        self.host.pin(&callback);
        pin_opt(&*self.host, context.as_ref());
        self.insert(event_type.into(), Listener::Script { callback, context })
    }

    pub fn subscribe_native(
        &self,
        event_type: impl Into<String>,
        listener: impl Fn(&Event) + 'static,
    ) -> Handle {
        self.insert(event_type.into(), Listener::Native(Rc::new(listener)))
    }

    fn insert(&self, event_type: String, listener: Listener<H::Value>) -> Handle {
        let handle = self.subscriptions.borrow_mut().insert(Subscription {
            event_type,
            listener,
        });
        debug!("Subscribed {}", handle);
        handle
    }

    pub fn unsubscribe(&self, handle: Handle) -> bool {
        let removed = self.subscriptions.borrow_mut().remove(handle);
        match removed {
            Some(sub) => {
                self.release(&sub.listener);
                true
            }
            None => false,
        }
    }

    fn release(&self, listener: &Listener<H::Value>) {
        if let Listener::Script { callback, context } = listener {
            self.host.unpin(callback);
            unpin_opt(&*self.host, context.as_ref());
        }
    }

    /// Deliver every event published before this call.
    ///
    /// Returns the number of deliveries made. A dispatch requested from
    /// inside a subscriber is ignored.
    pub fn dispatch(&self) -> usize {
        let Some(_guard) = PassGuard::enter(&self.dispatching) else {
            warn!("EventBus::dispatch called from inside a dispatch; ignored");
            return 0;
        };

        let mut read = self.read_queue.take();
        std::mem::swap(&mut *self.write_queue.borrow_mut(), &mut read);

        let mut delivered = 0;
        for event in read.drain(..) {
            delivered += self.deliver(&event);
        }
        // Hand the emptied buffer back so its capacity is reused.
        *self.read_queue.borrow_mut() = read;
        delivered
    }

    fn deliver(&self, event: &Event) -> usize {
        let event_type = event.event_type();
        let targets: SmallVec<[Handle; 8]> = self
            .subscriptions
            .borrow()
            .iter()
            .filter(|(_, s)| s.event_type == event_type)
            .map(|(h, _)| h)
            .collect();

        let mut delivered = 0;
        for handle in targets {
            let listener = match self.subscriptions.borrow().get(handle) {
                Some(sub) => sub.listener.clone(),
                None => continue,
            };
            match listener {
                Listener::Script { callback, context } => {
                    invoke_logged(
                        &*self.host,
                        "event subscriber",
                        &callback,
                        context.as_ref(),
                        &event.args(),
                    );
                }
                Listener::Native(f) => (*f)(event),
            }
            delivered += 1;
        }
        delivered
    }

    /// Events waiting for the next dispatch.
    pub fn pending(&self) -> usize {
        self.write_queue.borrow().len()
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.borrow().len()
    }

    /// Drop all subscriptions and queued events. Handle counters keep running.
    pub fn clear(&self) {
        let subs = self.subscriptions.borrow_mut().drain();
        self.write_queue.borrow_mut().clear();
        for (_, sub) in &subs {
            self.release(&sub.listener);
        }
    }
}
