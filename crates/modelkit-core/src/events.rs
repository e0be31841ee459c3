//! # Event Primitive
//!
//! Named-callback registration and dispatch shared by models and fields.
//!
//! ## Dispatch Semantics
//!
//! - Listeners fire in registration order.
//! - Dispatch works on a snapshot: a listener added or removed while an
//!   event is being dispatched takes effect from the next dispatch on.
//! - No borrow is held while a listener runs, so listeners may freely
//!   re-enter the emitter (register, remove, emit).
//! - A panicking listener unwinds through `emit`; listeners after it in
//!   the snapshot do not run.

use crate::model::Model;
use crate::types::ContextId;
use indexmap::IndexMap;
use serde_json::Value;
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

// =============================================================================
// EVENT
// =============================================================================

/// A dispatched event as seen by a listener.
#[derive(Debug, Clone, Copy)]
pub struct Event<'a> {
    /// Event name, e.g. `change`.
    pub name: &'a str,
    /// The model the event fired on (or the model owning the field).
    pub model: &'a Model,
    /// Field name for field-level events.
    pub field: Option<&'a str>,
    /// Event payload.
    pub data: &'a Value,
}

// =============================================================================
// HANDLER
// =============================================================================

/// Listener callback signature.
pub type Callback = dyn Fn(&Event<'_>);

/// A shareable listener callback with pointer identity.
///
/// Two handlers are the same listener only if they were cloned from the same
/// `Handler::new` call.
#[derive(Clone)]
pub struct Handler(Rc<Callback>);

impl Handler {
    /// Wrap a closure as a listener.
    pub fn new(f: impl Fn(&Event<'_>) + 'static) -> Self {
        Self(Rc::new(f))
    }

    /// Check listener identity.
    #[must_use]
    pub fn same_as(&self, other: &Handler) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }

    /// Invoke the listener.
    pub fn call(&self, event: &Event<'_>) {
        (self.0)(event);
    }
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handler({:p})", Rc::as_ptr(&self.0).cast::<()>())
    }
}

#[derive(Debug, Clone)]
struct Listener {
    handler: Handler,
    ctx: Option<ContextId>,
}

impl Listener {
    fn matches(&self, handler: &Handler, ctx: Option<ContextId>) -> bool {
        self.handler.same_as(handler) && self.ctx == ctx
    }
}

/// Split a whitespace-separated list of event or field names.
pub fn split_names(names: &str) -> impl Iterator<Item = &str> {
    names.split_whitespace()
}

// =============================================================================
// EMITTER
// =============================================================================

/// Per-object listener table.
#[derive(Debug, Default)]
pub struct Emitter {
    listeners: RefCell<IndexMap<String, Vec<Listener>>>,
}

impl Emitter {
    /// Create an emitter with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for every whitespace-separated name in `events`.
    pub fn on(&self, events: &str, handler: &Handler, ctx: Option<ContextId>) {
        let mut listeners = self.listeners.borrow_mut();
        for event in split_names(events) {
            listeners.entry(event.to_string()).or_default().push(Listener {
                handler: handler.clone(),
                ctx,
            });
        }
    }

    /// Remove listeners for every name in `events`.
    ///
    /// With a handler, removes the first listener registered with that
    /// handler and context. Without one, removes every listener of the event.
    pub fn off(&self, events: &str, handler: Option<&Handler>, ctx: Option<ContextId>) {
        let mut listeners = self.listeners.borrow_mut();
        for event in split_names(events) {
            match handler {
                None => {
                    listeners.shift_remove(event);
                }
                Some(handler) => {
                    let Some(list) = listeners.get_mut(event) else {
                        continue;
                    };
                    if let Some(pos) = list.iter().position(|l| l.matches(handler, ctx)) {
                        list.remove(pos);
                    }
                    if list.is_empty() {
                        listeners.shift_remove(event);
                    }
                }
            }
        }
    }

    /// Remove every listener of every event.
    pub fn off_all(&self) {
        self.listeners.borrow_mut().clear();
    }

    /// Number of listeners registered for `event`.
    #[must_use]
    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.borrow().get(event).map_or(0, Vec::len)
    }

    /// Check whether anything listens at all.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.listeners.borrow().is_empty()
    }

    /// Dispatch `event` to its listeners.
    pub fn emit(&self, event: &Event<'_>) {
        let snapshot: Vec<Handler> = match self.listeners.borrow().get(event.name) {
            Some(list) => list.iter().map(|l| l.handler.clone()).collect(),
            None => return,
        };
        for handler in snapshot {
            handler.call(event);
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================
