//! EventBus - priority-ordered dispatch with per-listener isolation

use std::any::TypeId;
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;

use plinth_plugin_api::{Event, EventError, EventKey, Listener, Plugin, RegisteredListener};

use super::handler_list::HandlerList;
use crate::error::EventBusError;
use crate::isolation::{Failure, isolate};

/// Author named in legacy-usage warnings when a plugin lists none
const NO_AUTHOR: &str = "<NoAuthorGiven>";

/// Borrows a child event as its parent type
trait Upcast: Send + Sync {
    fn apply<'a>(&self, event: &'a mut dyn Event) -> Option<&'a mut dyn Event>;
}

struct Lift<C, P>(PhantomData<fn(&mut C) -> &mut P>);

impl<C, P> Upcast for Lift<C, P>
where
    C: Event + AsMut<P>,
    P: Event,
{
    fn apply<'a>(&self, event: &'a mut dyn Event) -> Option<&'a mut dyn Event> {
        let child = event.as_any_mut().downcast_mut::<C>()?;
        let parent: &'a mut dyn Event = AsMut::<P>::as_mut(child);
        Some(parent)
    }
}

struct ParentLink {
    parent: TypeId,
    lift: Arc<dyn Upcast>,
}

#[derive(Default)]
struct Tables {
    /// Event type -> index of the handler list it dispatches through
    routes: HashMap<TypeId, usize>,
    /// Child event type -> its declared parent
    parents: HashMap<TypeId, ParentLink>,
    lists: Vec<HandlerList>,
}

impl Tables {
    fn route(&self, key: EventKey) -> Result<usize, EventBusError> {
        self.routes
            .get(&key.type_id())
            .copied()
            .ok_or(EventBusError::UnknownEventType { name: key.name() })
    }

    /// Upcasts from `of` to its parent, grandparent and so on
    fn ancestry(&self, of: TypeId) -> Vec<Arc<dyn Upcast>> {
        let mut chain = Vec::new();
        let mut current = of;
        while let Some(link) = self.parents.get(&current) {
            chain.push(Arc::clone(&link.lift));
            current = link.parent;
        }
        chain
    }
}

/// `event` borrowed as the event type `target`, walking up its ancestry
fn view_as<'a>(
    event: &'a mut dyn Event,
    target: TypeId,
    ancestry: &[Arc<dyn Upcast>],
) -> Option<&'a mut dyn Event> {
    let mut current = event;
    let mut lifts = ancestry.iter();
    loop {
        if (*current).as_any().type_id() == target {
            return Some(current);
        }
        current = lifts.next()?.apply(current)?;
    }
}

/// Aggregated timings of one plugin's listeners for one event type
#[derive(Debug, Clone, PartialEq)]
pub struct ListenerTiming {
    pub plugin: String,
    pub event: &'static str,
    pub calls: u64,
    pub total: Duration,
}

/// Routes events to the listeners registered for their type.
///
/// Event types must be declared before use. A declared type owns a
/// [`HandlerList`]; a child type declared with [`EventBus::declare_child`]
/// shares its parent's list. Listeners of the parent receive child events
/// borrowed as the parent; listeners of the child never see parent events.
#[derive(Default)]
pub struct EventBus {
    tables: RwLock<Tables>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Give `E` its own handler list. Declaring twice is a no-op.
    pub fn declare<E: Event>(&self) {
        let key = EventKey::of::<E>();
        let mut tables = self.tables.write();
        if tables.routes.contains_key(&key.type_id()) {
            return;
        }
        let index = tables.lists.len();
        tables.lists.push(HandlerList::new(key));
        tables.routes.insert(key.type_id(), index);
    }

    /// Route `C` through the handler list `P` dispatches through.
    ///
    /// `P` must already be declared. A `C` that is already declared keeps its
    /// existing route.
    pub fn declare_child<C, P>(&self) -> Result<(), EventBusError>
    where
        C: Event + AsMut<P>,
        P: Event,
    {
        let child = EventKey::of::<C>();
        let parent = EventKey::of::<P>();
        let mut tables = self.tables.write();

        let index = tables
            .route(parent)
            .map_err(|_| EventBusError::UnknownParent {
                child: child.name(),
                parent: parent.name(),
            })?;
        if tables.routes.contains_key(&child.type_id()) {
            return Ok(());
        }
        tables.routes.insert(child.type_id(), index);
        tables.parents.insert(
            child.type_id(),
            ParentLink {
                parent: parent.type_id(),
                lift: Arc::new(Lift::<C, P>(PhantomData)),
            },
        );
        Ok(())
    }

    pub fn is_declared(&self, key: EventKey) -> bool {
        self.tables.read().routes.contains_key(&key.type_id())
    }

    /// Event type owning the handler list `key` dispatches through
    pub fn list_owner(&self, key: EventKey) -> Result<EventKey, EventBusError> {
        let tables = self.tables.read();
        let index = tables.route(key)?;
        Ok(tables.lists[index].owner())
    }

    /// Append one listener to the list of `key`
    pub fn register(&self, key: EventKey, listener: RegisteredListener) -> Result<(), EventBusError> {
        let mut tables = self.tables.write();
        let index = tables.route(key)?;
        let list = &mut tables.lists[index];
        list.register(listener);
        list.bake();
        Ok(())
    }

    /// Register listeners grouped by event type.
    ///
    /// Every event type is checked first; if one is undeclared nothing is
    /// registered.
    pub fn register_all(
        &self,
        grouped: Vec<(EventKey, Vec<RegisteredListener>)>,
    ) -> Result<(), EventBusError> {
        let mut tables = self.tables.write();
        let indices = grouped
            .iter()
            .map(|(key, _)| tables.route(*key))
            .collect::<Result<Vec<_>, _>>()?;

        for (index, (_, listeners)) in indices.into_iter().zip(grouped) {
            let list = &mut tables.lists[index];
            list.register_all(listeners);
            list.bake();
        }
        Ok(())
    }

    /// Baked dispatch order for `key`
    pub fn handlers(&self, key: EventKey) -> Result<Arc<[Arc<RegisteredListener>]>, EventBusError> {
        {
            let tables = self.tables.read();
            let index = tables.route(key)?;
            if let Some(baked) = tables.lists[index].baked() {
                return Ok(baked);
            }
        }

        let mut tables = self.tables.write();
        let index = tables.route(key)?;
        Ok(tables.lists[index].bake())
    }

    /// Deliver `event` to every listener of its type whose plugin is enabled.
    ///
    /// Listener failures are logged and never stop the dispatch. The list is
    /// snapshotted first, so listeners may register, unregister or dispatch
    /// while being called.
    pub fn dispatch(&self, event: &mut dyn Event) -> Result<(), EventBusError> {
        let key = EventKey::of_val(event);
        let handlers = self.handlers(key)?;
        let ancestry = self.tables.read().ancestry(key.type_id());

        for registration in handlers.iter() {
            let plugin = registration.plugin();
            if !plugin.is_enabled() {
                continue;
            }
            // Child-type listeners share the list but skip parent events
            let Some(view) = view_as(&mut *event, registration.event().type_id(), &ancestry)
            else {
                continue;
            };

            match isolate(|| registration.call_event(view)) {
                Ok(()) => {}
                Err(Failure::Error(EventError::AuthorNag(message))) => {
                    nag_author(plugin, &message);
                }
                Err(failure) => {
                    tracing::error!(
                        event = event.event_name(),
                        plugin = %plugin,
                        error = %failure,
                        "Could not pass event to plugin"
                    );
                }
            }
        }
        Ok(())
    }

    /// Remove every listener owned by `plugin`
    pub fn unregister_plugin(&self, plugin: &Arc<Plugin>) {
        let mut tables = self.tables.write();
        for list in tables.lists.iter_mut() {
            if list.unregister_plugin(plugin) {
                list.bake();
            }
        }
    }

    /// Remove every registration made by `listener`
    pub fn unregister_listener(&self, listener: &Arc<dyn Listener>) {
        let mut tables = self.tables.write();
        for list in tables.lists.iter_mut() {
            if list.unregister_listener(listener) {
                list.bake();
            }
        }
    }

    /// Remove one registration from the list of `key`
    pub fn unregister(
        &self,
        key: EventKey,
        listener: &Arc<RegisteredListener>,
    ) -> Result<bool, EventBusError> {
        let mut tables = self.tables.write();
        let index = tables.route(key)?;
        let list = &mut tables.lists[index];
        let removed = list.unregister(listener);
        list.bake();
        Ok(removed)
    }

    /// Empty every handler list. Declared event types stay declared.
    pub fn unregister_all(&self) {
        let mut tables = self.tables.write();
        for list in tables.lists.iter_mut() {
            list.clear();
            list.bake();
        }
    }

    /// Rebuild the dispatch order of every list
    pub fn bake_all(&self) {
        let mut tables = self.tables.write();
        for list in tables.lists.iter_mut() {
            list.bake();
        }
    }

    /// Total number of registrations across all lists
    pub fn listener_count(&self) -> usize {
        self.tables.read().lists.iter().map(HandlerList::len).sum()
    }

    /// Listeners of `plugin`, with the event type of the list holding them
    pub fn listeners_of(&self, plugin: &Arc<Plugin>) -> Vec<(EventKey, Arc<RegisteredListener>)> {
        let mut tables = self.tables.write();
        let mut found = Vec::new();
        for list in tables.lists.iter_mut() {
            let owner = list.owner();
            found.extend(
                list.bake()
                    .iter()
                    .filter(|l| Arc::ptr_eq(l.plugin(), plugin))
                    .map(|l| (owner, Arc::clone(l))),
            );
        }
        found
    }

    /// Per-plugin, per-event totals of every timed listener
    pub fn timings(&self) -> Vec<ListenerTiming> {
        let mut tables = self.tables.write();
        let mut totals: Vec<ListenerTiming> = Vec::new();

        for list in tables.lists.iter_mut() {
            let event = list.owner().name();
            for registration in list.bake().iter() {
                let Some(timings) = registration.timings() else {
                    continue;
                };
                let plugin = registration.plugin().name();
                match totals
                    .iter_mut()
                    .find(|t| t.plugin == plugin && t.event == event)
                {
                    Some(entry) => {
                        entry.calls += timings.calls();
                        entry.total += timings.total();
                    }
                    None => totals.push(ListenerTiming {
                        plugin: plugin.to_string(),
                        event,
                        calls: timings.calls(),
                        total: timings.total(),
                    }),
                }
            }
        }
        totals
    }
}

fn nag_author(plugin: &Plugin, message: &str) {
    if !plugin.take_naggable() {
        return;
    }
    let author = plugin.descriptor().primary_author().unwrap_or(NO_AUTHOR);
    tracing::warn!(
        plugin = %plugin.name(),
        author = %author,
        "Nag author: '{author}' of '{}' about the following: {message}",
        plugin.name()
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugins::ManifestLoader;
    use parking_lot::Mutex;
    use plinth_plugin_api::{EventPriority, HandlerSpec, PluginDescriptor, executor};

    #[derive(Default)]
    struct Chat {
        log: Vec<String>,
        cancelled: bool,
    }
    impl Event for Chat {
        fn is_cancelled(&self) -> bool {
            self.cancelled
        }
    }

    #[derive(Default)]
    struct Whisper {
        chat: Chat,
        log: Vec<String>,
    }
    impl Event for Whisper {
        fn is_cancelled(&self) -> bool {
            self.chat.is_cancelled()
        }
    }
    impl AsMut<Chat> for Whisper {
        fn as_mut(&mut self) -> &mut Chat {
            &mut self.chat
        }
    }

    #[derive(Default)]
    struct Murmur {
        whisper: Whisper,
    }
    impl Event for Murmur {}
    impl AsMut<Whisper> for Murmur {
        fn as_mut(&mut self) -> &mut Whisper {
            &mut self.whisper
        }
    }

    struct Undeclared;
    impl Event for Undeclared {}

    struct Quiet;
    impl Listener for Quiet {
        fn handlers(self: Arc<Self>) -> Vec<HandlerSpec> {
            Vec::new()
        }
    }

    fn enabled_plugin(name: &str) -> Arc<Plugin> {
        let plugin = Arc::new(Plugin::new(
            PluginDescriptor::new(name).with_author("ada"),
            format!("{name}.plugin.toml"),
            Arc::new(ManifestLoader::new()),
            Box::new(()),
        ));
        plugin.set_enabled(true);
        plugin
    }

    fn on_chat<F>(plugin: &Arc<Plugin>, priority: EventPriority, f: F) -> RegisteredListener
    where
        F: Fn(&mut Chat) -> Result<(), EventError> + Send + Sync + 'static,
    {
        RegisteredListener::new(
            Arc::new(Quiet),
            executor(f),
            priority,
            Arc::clone(plugin),
            false,
        )
    }

    fn chat_bus() -> EventBus {
        let bus = EventBus::new();
        bus.declare::<Chat>();
        bus
    }

    #[test]
    fn test_dispatch_follows_priority_order() {
        let bus = chat_bus();
        let plugin = enabled_plugin("p");

        for (priority, tag) in [
            (EventPriority::Monitor, "monitor"),
            (EventPriority::Lowest, "lowest"),
            (EventPriority::High, "high"),
            (EventPriority::Normal, "normal-1"),
            (EventPriority::Normal, "normal-2"),
        ] {
            bus.register(
                EventKey::of::<Chat>(),
                on_chat(&plugin, priority, move |e| {
                    e.log.push(tag.to_string());
                    Ok(())
                }),
            )
            .unwrap();
        }

        let mut event = Chat::default();
        bus.dispatch(&mut event).unwrap();
        assert_eq!(event.log, vec!["lowest", "normal-1", "normal-2", "high", "monitor"]);
    }

    #[test]
    fn test_disabled_plugin_is_skipped() {
        let bus = chat_bus();
        let on = enabled_plugin("on");
        let off = enabled_plugin("off");
        off.set_enabled(false);

        for plugin in [&on, &off] {
            let name = plugin.name().to_string();
            bus.register(
                EventKey::of::<Chat>(),
                on_chat(plugin, EventPriority::Normal, move |e| {
                    e.log.push(name.clone());
                    Ok(())
                }),
            )
            .unwrap();
        }

        let mut event = Chat::default();
        bus.dispatch(&mut event).unwrap();
        assert_eq!(event.log, vec!["on"]);
    }

    #[test]
    fn test_failing_listener_does_not_stop_dispatch() {
        let bus = chat_bus();
        let plugin = enabled_plugin("p");

        bus.register(
            EventKey::of::<Chat>(),
            on_chat(&plugin, EventPriority::Low, |_| Err(EventError::failed("broken"))),
        )
        .unwrap();
        bus.register(
            EventKey::of::<Chat>(),
            on_chat(&plugin, EventPriority::Normal, |_| panic!("listener exploded")),
        )
        .unwrap();
        bus.register(
            EventKey::of::<Chat>(),
            on_chat(&plugin, EventPriority::High, |e| {
                e.log.push("reached".into());
                Ok(())
            }),
        )
        .unwrap();

        let mut event = Chat::default();
        bus.dispatch(&mut event).unwrap();
        assert_eq!(event.log, vec!["reached"]);
    }

    #[test]
    fn test_ignore_cancelled() {
        let bus = chat_bus();
        let plugin = enabled_plugin("p");

        bus.register(
            EventKey::of::<Chat>(),
            on_chat(&plugin, EventPriority::Low, |e| {
                e.cancelled = true;
                Ok(())
            }),
        )
        .unwrap();
        bus.register(
            EventKey::of::<Chat>(),
            RegisteredListener::new(
                Arc::new(Quiet),
                executor(|e: &mut Chat| {
                    e.log.push("ignoring".into());
                    Ok(())
                }),
                EventPriority::Normal,
                Arc::clone(&plugin),
                true,
            ),
        )
        .unwrap();
        bus.register(
            EventKey::of::<Chat>(),
            on_chat(&plugin, EventPriority::High, |e| {
                e.log.push("observing".into());
                Ok(())
            }),
        )
        .unwrap();

        let mut event = Chat::default();
        bus.dispatch(&mut event).unwrap();
        assert_eq!(event.log, vec!["observing"]);
    }

    #[test]
    fn test_undeclared_event_is_an_error() {
        let bus = chat_bus();
        let plugin = enabled_plugin("p");

        let err = bus.dispatch(&mut Undeclared).unwrap_err();
        assert_eq!(err, EventBusError::UnknownEventType { name: "Undeclared" });

        let listener = RegisteredListener::new(
            Arc::new(Quiet),
            executor(|_: &mut Undeclared| Ok(())),
            EventPriority::Normal,
            plugin,
            false,
        );
        assert!(bus.register(EventKey::of::<Undeclared>(), listener).is_err());
    }

    fn on_whisper(plugin: &Arc<Plugin>, priority: EventPriority, tag: &'static str) -> RegisteredListener {
        RegisteredListener::new(
            Arc::new(Quiet),
            executor(move |e: &mut Whisper| {
                e.log.push(tag.to_string());
                Ok(())
            }),
            priority,
            Arc::clone(plugin),
            false,
        )
    }

    #[test]
    fn test_child_event_reaches_parent_listeners() {
        let bus = chat_bus();
        bus.declare_child::<Whisper, Chat>().unwrap();
        let plugin = enabled_plugin("p");

        bus.register(
            EventKey::of::<Chat>(),
            on_chat(&plugin, EventPriority::Normal, |e| {
                e.log.push("chat".into());
                Ok(())
            }),
        )
        .unwrap();
        bus.register(
            EventKey::of::<Whisper>(),
            on_whisper(&plugin, EventPriority::Normal, "whisper"),
        )
        .unwrap();

        assert_eq!(bus.list_owner(EventKey::of::<Whisper>()).unwrap(), EventKey::of::<Chat>());

        let mut whisper = Whisper::default();
        bus.dispatch(&mut whisper).unwrap();
        assert_eq!(whisper.chat.log, vec!["chat"]);
        assert_eq!(whisper.log, vec!["whisper"]);

        let mut chat = Chat::default();
        bus.dispatch(&mut chat).unwrap();
        assert_eq!(chat.log, vec!["chat"]);
    }

    #[test]
    fn test_parent_cancel_is_seen_by_child_listener() {
        let bus = chat_bus();
        bus.declare_child::<Whisper, Chat>().unwrap();
        let plugin = enabled_plugin("p");

        bus.register(
            EventKey::of::<Chat>(),
            on_chat(&plugin, EventPriority::Low, |e| {
                e.cancelled = true;
                Ok(())
            }),
        )
        .unwrap();
        bus.register(
            EventKey::of::<Whisper>(),
            RegisteredListener::new(
                Arc::new(Quiet),
                executor(|e: &mut Whisper| {
                    e.log.push("late".into());
                    Ok(())
                }),
                EventPriority::High,
                Arc::clone(&plugin),
                true,
            ),
        )
        .unwrap();

        let mut whisper = Whisper::default();
        bus.dispatch(&mut whisper).unwrap();
        assert!(whisper.chat.cancelled);
        assert!(whisper.log.is_empty());
    }

    #[test]
    fn test_grandchild_reaches_every_ancestor() {
        let bus = chat_bus();
        bus.declare_child::<Whisper, Chat>().unwrap();
        bus.declare_child::<Murmur, Whisper>().unwrap();
        let plugin = enabled_plugin("p");

        bus.register(
            EventKey::of::<Chat>(),
            on_chat(&plugin, EventPriority::Lowest, |e| {
                e.log.push("chat".into());
                Ok(())
            }),
        )
        .unwrap();
        bus.register(
            EventKey::of::<Whisper>(),
            on_whisper(&plugin, EventPriority::Normal, "whisper"),
        )
        .unwrap();

        assert_eq!(bus.list_owner(EventKey::of::<Murmur>()).unwrap(), EventKey::of::<Chat>());

        let mut murmur = Murmur::default();
        bus.dispatch(&mut murmur).unwrap();
        assert_eq!(murmur.whisper.chat.log, vec!["chat"]);
        assert_eq!(murmur.whisper.log, vec!["whisper"]);
    }

    #[test]
    fn test_declare_child_requires_parent() {
        let bus = EventBus::new();
        let err = bus.declare_child::<Whisper, Chat>().unwrap_err();
        assert!(matches!(err, EventBusError::UnknownParent { .. }));
        assert!(!bus.is_declared(EventKey::of::<Whisper>()));
    }

    #[test]
    fn test_author_nag_is_reported_once() {
        let bus = chat_bus();
        let plugin = enabled_plugin("legacy");
        let calls = Arc::new(Mutex::new(0));

        let counter = Arc::clone(&calls);
        bus.register(
            EventKey::of::<Chat>(),
            on_chat(&plugin, EventPriority::Normal, move |_| {
                *counter.lock() += 1;
                Err(EventError::nag("uses the old scheduler"))
            }),
        )
        .unwrap();

        assert!(plugin.is_naggable());
        bus.dispatch(&mut Chat::default()).unwrap();
        assert!(!plugin.is_naggable());
        bus.dispatch(&mut Chat::default()).unwrap();
        assert_eq!(*calls.lock(), 2);
        assert!(!plugin.is_naggable());
    }

    #[test]
    fn test_register_all_is_all_or_nothing() {
        let bus = chat_bus();
        let plugin = enabled_plugin("p");

        let grouped = vec![
            (
                EventKey::of::<Chat>(),
                vec![on_chat(&plugin, EventPriority::Normal, |_| Ok(()))],
            ),
            (
                EventKey::of::<Undeclared>(),
                vec![RegisteredListener::new(
                    Arc::new(Quiet),
                    executor(|_: &mut Undeclared| Ok(())),
                    EventPriority::Normal,
                    Arc::clone(&plugin),
                    false,
                )],
            ),
        ];

        assert!(bus.register_all(grouped).is_err());
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn test_unregister_plugin_and_all() {
        let bus = chat_bus();
        let a = enabled_plugin("a");
        let b = enabled_plugin("b");
        bus.register(EventKey::of::<Chat>(), on_chat(&a, EventPriority::Normal, |_| Ok(())))
            .unwrap();
        bus.register(EventKey::of::<Chat>(), on_chat(&b, EventPriority::Normal, |_| Ok(())))
            .unwrap();

        bus.unregister_plugin(&a);
        assert_eq!(bus.listener_count(), 1);
        assert!(bus.listeners_of(&a).is_empty());
        assert_eq!(bus.listeners_of(&b).len(), 1);

        bus.unregister_all();
        assert_eq!(bus.listener_count(), 0);
        assert!(bus.is_declared(EventKey::of::<Chat>()));
    }

    #[test]
    fn test_listener_registering_during_dispatch() {
        let bus = Arc::new(chat_bus());
        let plugin = enabled_plugin("p");

        let inner_bus = Arc::clone(&bus);
        let inner_plugin = Arc::clone(&plugin);
        bus.register(
            EventKey::of::<Chat>(),
            on_chat(&plugin, EventPriority::Normal, move |e| {
                e.log.push("outer".into());
                inner_bus
                    .register(
                        EventKey::of::<Chat>(),
                        on_chat(&inner_plugin, EventPriority::Lowest, |e| {
                            e.log.push("late".into());
                            Ok(())
                        }),
                    )
                    .map_err(|e| EventError::failed(e.to_string()))
            }),
        )
        .unwrap();

        let mut first = Chat::default();
        bus.dispatch(&mut first).unwrap();
        assert_eq!(first.log, vec!["outer"]);

        let mut second = Chat::default();
        bus.dispatch(&mut second).unwrap();
        assert_eq!(second.log, vec!["late", "outer"]);
    }

    #[test]
    fn test_timings_aggregate_per_plugin_and_event() {
        let bus = chat_bus();
        let plugin = enabled_plugin("timed");
        bus.register(
            EventKey::of::<Chat>(),
            on_chat(&plugin, EventPriority::Normal, |_| Ok(())).timed(),
        )
        .unwrap();
        bus.register(
            EventKey::of::<Chat>(),
            on_chat(&plugin, EventPriority::High, |_| Ok(())).timed(),
        )
        .unwrap();
        bus.register(
            EventKey::of::<Chat>(),
            on_chat(&plugin, EventPriority::High, |_| Ok(())),
        )
        .unwrap();

        bus.dispatch(&mut Chat::default()).unwrap();
        bus.dispatch(&mut Chat::default()).unwrap();

        let timings = bus.timings();
        assert_eq!(timings.len(), 1);
        assert_eq!(timings[0].plugin, "timed");
        assert_eq!(timings[0].event, "Chat");
        assert_eq!(timings[0].calls, 4);
    }
}
