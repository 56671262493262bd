//! Event and listener types shared between the host and plugins.
//!
//! Events are plain Rust types implementing [`Event`]. Listeners describe
//! their handlers explicitly through [`Listener::handlers`]; the host turns
//! each [`HandlerSpec`] into a [`RegisteredListener`] bound to the owning
//! plugin.

use serde::{Deserialize, Serialize};
use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crate::error::EventError;
use crate::plugin::Plugin;

/// Upcast helper so `dyn Event` can be downcast to its concrete type
pub trait AsAny: Any {
    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// An event that can be dispatched through the host's event bus
pub trait Event: AsAny {
    /// Name used in diagnostics
    fn event_name(&self) -> &'static str {
        short_type_name::<Self>()
    }

    /// Whether an earlier handler cancelled this event.
    ///
    /// Listeners registered with `ignore_cancelled` are skipped once this
    /// returns true. Events that cannot be cancelled keep the default.
    fn is_cancelled(&self) -> bool {
        false
    }
}

fn short_type_name<T: ?Sized>() -> &'static str {
    let full = std::any::type_name::<T>();
    let base = full.split('<').next().unwrap_or(full);
    match base.rfind("::") {
        Some(idx) => &full[idx + 2..],
        None => full,
    }
}

/// Dispatch priority. Lower tiers run first; `Monitor` runs last and should
/// only observe the outcome.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum EventPriority {
    Lowest,
    Low,
    #[default]
    Normal,
    High,
    Highest,
    Monitor,
}

impl EventPriority {
    /// All tiers in dispatch order
    pub const ALL: [EventPriority; 6] = [
        Self::Lowest,
        Self::Low,
        Self::Normal,
        Self::High,
        Self::Highest,
        Self::Monitor,
    ];
}

/// Identity of an event type
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventKey {
    type_id: TypeId,
    name: &'static str,
}

impl EventKey {
    pub fn of<E: Event>() -> Self {
        Self {
            type_id: TypeId::of::<E>(),
            name: short_type_name::<E>(),
        }
    }

    /// Key of the concrete type behind `event`
    pub fn of_val(event: &dyn Event) -> Self {
        Self {
            type_id: event.as_any().type_id(),
            name: event.event_name(),
        }
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Debug for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EventKey({})", self.name)
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Type-erased handler invoked by the event bus
#[derive(Clone)]
pub struct EventExecutor {
    event: EventKey,
    call: Arc<dyn Fn(&mut dyn Event) -> Result<(), EventError> + Send + Sync>,
}

impl EventExecutor {
    /// Event type the handler was written for
    pub fn event(&self) -> EventKey {
        self.event
    }

    /// Run the handler. Events of any other concrete type are ignored.
    pub fn execute(&self, event: &mut dyn Event) -> Result<(), EventError> {
        (self.call)(event)
    }
}

/// Wrap a typed handler into an [`EventExecutor`].
///
/// The bus hands a child event to a parent-type handler as the parent, so
/// the handler always sees `E`.
pub fn executor<E, F>(handler: F) -> EventExecutor
where
    E: Event,
    F: Fn(&mut E) -> Result<(), EventError> + Send + Sync + 'static,
{
    EventExecutor {
        event: EventKey::of::<E>(),
        call: Arc::new(move |event: &mut dyn Event| {
            match event.as_any_mut().downcast_mut::<E>() {
                Some(event) => handler(event),
                None => Ok(()),
            }
        }),
    }
}

/// One handler declared by a [`Listener`]
#[derive(Clone)]
pub struct HandlerSpec {
    pub event: EventKey,
    pub priority: EventPriority,
    pub ignore_cancelled: bool,
    pub executor: EventExecutor,
}

impl HandlerSpec {
    /// Handle events of type `E` at `priority`
    pub fn on<E, F>(priority: EventPriority, handler: F) -> Self
    where
        E: Event,
        F: Fn(&mut E) -> Result<(), EventError> + Send + Sync + 'static,
    {
        Self {
            event: EventKey::of::<E>(),
            priority,
            ignore_cancelled: false,
            executor: executor(handler),
        }
    }

    /// Builder: skip events already cancelled by an earlier handler
    #[must_use]
    pub fn ignoring_cancelled(mut self) -> Self {
        self.ignore_cancelled = true;
        self
    }
}

impl fmt::Debug for HandlerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerSpec")
            .field("event", &self.event)
            .field("priority", &self.priority)
            .field("ignore_cancelled", &self.ignore_cancelled)
            .finish_non_exhaustive()
    }
}

/// An object owning event handlers.
///
/// ```ignore
/// impl Listener for JoinGreeter {
///     fn handlers(self: Arc<Self>) -> Vec<HandlerSpec> {
///         vec![HandlerSpec::on(EventPriority::Normal, move |e: &mut PlayerJoin| {
///             self.greet(e)
///         })]
///     }
/// }
/// ```
pub trait Listener: Send + Sync {
    fn handlers(self: Arc<Self>) -> Vec<HandlerSpec>;
}

/// Whether two listener handles point at the same listener
pub fn same_listener(a: &Arc<dyn Listener>, b: &Arc<dyn Listener>) -> bool {
    std::ptr::addr_eq(Arc::as_ptr(a), Arc::as_ptr(b))
}

/// Invocation statistics of a timed listener
#[derive(Debug, Default)]
pub struct ListenerTimings {
    calls: AtomicU64,
    total_nanos: AtomicU64,
}

impl ListenerTimings {
    fn record(&self, elapsed: Duration) {
        let nanos = u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX);
        self.calls.fetch_add(1, Ordering::Relaxed);
        self.total_nanos.fetch_add(nanos, Ordering::Relaxed);
    }

    pub fn calls(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }

    pub fn total(&self) -> Duration {
        Duration::from_nanos(self.total_nanos.load(Ordering::Relaxed))
    }
}

/// A handler bound to the listener that declared it and the plugin owning it
pub struct RegisteredListener {
    listener: Arc<dyn Listener>,
    executor: EventExecutor,
    priority: EventPriority,
    plugin: Arc<Plugin>,
    ignore_cancelled: bool,
    timings: Option<ListenerTimings>,
}

impl RegisteredListener {
    pub fn new(
        listener: Arc<dyn Listener>,
        executor: EventExecutor,
        priority: EventPriority,
        plugin: Arc<Plugin>,
        ignore_cancelled: bool,
    ) -> Self {
        Self {
            listener,
            executor,
            priority,
            plugin,
            ignore_cancelled,
            timings: None,
        }
    }

    /// Builder: record call counts and durations
    #[must_use]
    pub fn timed(mut self) -> Self {
        self.timings = Some(ListenerTimings::default());
        self
    }

    pub fn listener(&self) -> &Arc<dyn Listener> {
        &self.listener
    }

    pub fn plugin(&self) -> &Arc<Plugin> {
        &self.plugin
    }

    pub fn priority(&self) -> EventPriority {
        self.priority
    }

    /// Event type the handler expects
    pub fn event(&self) -> EventKey {
        self.executor.event()
    }

    pub fn is_ignoring_cancelled(&self) -> bool {
        self.ignore_cancelled
    }

    /// Timings, when this listener was registered with timings enabled
    pub fn timings(&self) -> Option<&ListenerTimings> {
        self.timings.as_ref()
    }

    /// Invoke the handler, honouring `ignore_cancelled`
    pub fn call_event(&self, event: &mut dyn Event) -> Result<(), EventError> {
        if self.ignore_cancelled && event.is_cancelled() {
            return Ok(());
        }

        match &self.timings {
            Some(timings) => {
                let start = Instant::now();
                let result = self.executor.execute(event);
                timings.record(start.elapsed());
                result
            }
            None => self.executor.execute(event),
        }
    }
}

impl fmt::Debug for RegisteredListener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegisteredListener")
            .field("plugin", &self.plugin.name())
            .field("priority", &self.priority)
            .field("ignore_cancelled", &self.ignore_cancelled)
            .field("timed", &self.timings.is_some())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Ping {
        hits: u32,
        cancelled: bool,
    }

    impl Event for Ping {
        fn is_cancelled(&self) -> bool {
            self.cancelled
        }
    }

    struct Pong;

    impl Event for Pong {}

    #[test]
    fn test_priority_order() {
        let mut tiers = EventPriority::ALL.to_vec();
        tiers.reverse();
        tiers.sort();
        assert_eq!(tiers, EventPriority::ALL.to_vec());
        assert!(EventPriority::Lowest < EventPriority::Monitor);
        assert_eq!(EventPriority::default(), EventPriority::Normal);
    }

    #[test]
    fn test_event_name_is_short_type_name() {
        let ping = Ping {
            hits: 0,
            cancelled: false,
        };
        assert_eq!(ping.event_name(), "Ping");
        assert_eq!(EventKey::of::<Ping>().name(), "Ping");
    }

    #[test]
    fn test_key_of_val_matches_static_key() {
        let mut pong = Pong;
        let event: &mut dyn Event = &mut pong;
        assert_eq!(EventKey::of_val(event), EventKey::of::<Pong>());
        assert_ne!(EventKey::of_val(event), EventKey::of::<Ping>());
    }

    #[test]
    fn test_executor_downcasts_and_skips_other_types() {
        let exec = executor(|ping: &mut Ping| {
            ping.hits += 1;
            Ok(())
        });

        let mut ping = Ping {
            hits: 0,
            cancelled: false,
        };
        assert_eq!(exec.event(), EventKey::of::<Ping>());
        exec.execute(&mut ping).unwrap();
        assert_eq!(ping.hits, 1);

        let mut pong = Pong;
        assert!(exec.execute(&mut pong).is_ok());
    }

    #[test]
    fn test_handler_spec_builder() {
        let spec = HandlerSpec::on(EventPriority::High, |_: &mut Ping| Ok(())).ignoring_cancelled();
        assert_eq!(spec.event, EventKey::of::<Ping>());
        assert_eq!(spec.priority, EventPriority::High);
        assert!(spec.ignore_cancelled);
    }

    #[test]
    fn test_priority_serde_snake_case() {
        let json = serde_json::to_string(&EventPriority::Monitor).unwrap();
        assert_eq!(json, "\"monitor\"");
    }
}
