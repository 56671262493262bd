//! Event dispatch through PluginManager

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use plinth_core::{ManifestLoader, PluginHostConfig, PluginManager, PluginManagerError};
use plinth_plugin_api::{
    Event, EventError, EventPriority, HandlerSpec, Listener, Permission, Plugin,
    PluginDescriptor, PluginLoader, executor,
};

struct Chat {
    message: String,
    cancelled: bool,
}

impl Event for Chat {
    fn is_cancelled(&self) -> bool {
        self.cancelled
    }
}

fn chat(message: &str) -> Chat {
    Chat {
        message: message.to_string(),
        cancelled: false,
    }
}

/// A chat event sent privately; routed through the `Chat` handler list
struct Whisper {
    chat: Chat,
}

impl Event for Whisper {
    fn is_cancelled(&self) -> bool {
        self.chat.cancelled
    }
}

impl AsMut<Chat> for Whisper {
    fn as_mut(&mut self) -> &mut Chat {
        &mut self.chat
    }
}

struct Undeclared;

impl Event for Undeclared {}

fn manager() -> PluginManager {
    let manager = PluginManager::new(PluginHostConfig::default());
    manager.declare_event::<Chat>();
    manager
}

fn enabled_plugin(name: &str) -> Arc<Plugin> {
    let loader: Arc<dyn PluginLoader> = Arc::new(ManifestLoader::new());
    let plugin = Arc::new(Plugin::new(
        PluginDescriptor::new(name).with_author("ada"),
        format!("{name}.plugin.toml"),
        loader,
        Box::new(()),
    ));
    plugin.set_enabled(true);
    plugin
}

type Log = Arc<Mutex<Vec<String>>>;

struct Recorder {
    tag: &'static str,
    priority: EventPriority,
    log: Log,
}

impl Listener for Recorder {
    fn handlers(self: Arc<Self>) -> Vec<HandlerSpec> {
        vec![HandlerSpec::on(self.priority, move |e: &mut Chat| {
            self.log.lock().push(format!("{}:{}", self.tag, e.message));
            Ok(())
        })]
    }
}

fn recorder(tag: &'static str, priority: EventPriority, log: &Log) -> Arc<Recorder> {
    Arc::new(Recorder {
        tag,
        priority,
        log: log.clone(),
    })
}

#[test]
fn listeners_run_in_priority_order_across_plugins() {
    let manager = manager();
    let a = enabled_plugin("A");
    let b = enabled_plugin("B");
    let log: Log = Arc::default();

    manager
        .register_events(recorder("a-monitor", EventPriority::Monitor, &log), &a)
        .unwrap();
    manager
        .register_events(recorder("b-low", EventPriority::Low, &log), &b)
        .unwrap();
    manager
        .register_events(recorder("a-lowest", EventPriority::Lowest, &log), &a)
        .unwrap();
    manager
        .register_events(recorder("b-high", EventPriority::High, &log), &b)
        .unwrap();

    manager.call_event(&mut chat("hi")).unwrap();

    assert_eq!(
        *log.lock(),
        vec!["a-lowest:hi", "b-low:hi", "b-high:hi", "a-monitor:hi"]
    );
}

#[test]
fn cancelled_events_skip_listeners_that_ignore_them() {
    let manager = manager();
    let plugin = enabled_plugin("Mod");
    let seen: Log = Arc::default();

    struct Moderator {
        seen: Log,
    }

    impl Listener for Moderator {
        fn handlers(self: Arc<Self>) -> Vec<HandlerSpec> {
            let late = Arc::clone(&self);
            let monitor = Arc::clone(&self);
            vec![
                HandlerSpec::on(EventPriority::Lowest, |e: &mut Chat| {
                    e.cancelled = e.message.contains("spam");
                    Ok(())
                }),
                HandlerSpec::on(EventPriority::Normal, move |e: &mut Chat| {
                    late.seen.lock().push(format!("normal:{}", e.message));
                    Ok(())
                })
                .ignoring_cancelled(),
                HandlerSpec::on(EventPriority::Monitor, move |e: &mut Chat| {
                    monitor.seen.lock().push(format!("monitor:{}", e.message));
                    Ok(())
                }),
            ]
        }
    }

    manager
        .register_events(Arc::new(Moderator { seen: seen.clone() }), &plugin)
        .unwrap();

    let mut spam = chat("buy spam");
    manager.call_event(&mut spam).unwrap();
    assert!(spam.cancelled);
    manager.call_event(&mut chat("hello")).unwrap();

    assert_eq!(
        *seen.lock(),
        vec!["monitor:buy spam", "normal:hello", "monitor:hello"]
    );
}

#[test]
fn failing_listener_does_not_stop_others() {
    let manager = manager();
    let plugin = enabled_plugin("A");
    let log: Log = Arc::default();

    manager
        .register_event::<Chat>(
            Arc::new(Loud),
            EventPriority::Lowest,
            executor(|_: &mut Chat| Err(EventError::failed("boom"))),
            &plugin,
            false,
        )
        .unwrap();
    manager
        .register_event::<Chat>(
            Arc::new(Loud),
            EventPriority::Low,
            executor(|_: &mut Chat| -> Result<(), EventError> { panic!("listener panicked") }),
            &plugin,
            false,
        )
        .unwrap();
    manager
        .register_event::<Chat>(
            Arc::new(Loud),
            EventPriority::Low,
            executor(|_: &mut Chat| Err(EventError::nag("use the new chat API"))),
            &plugin,
            false,
        )
        .unwrap();
    manager
        .register_events(recorder("after", EventPriority::High, &log), &plugin)
        .unwrap();

    manager.call_event(&mut chat("x")).unwrap();
    manager.call_event(&mut chat("y")).unwrap();

    assert_eq!(*log.lock(), vec!["after:x", "after:y"]);
    // The author is nagged only once
    assert!(!plugin.is_naggable());
}

struct Loud;

impl Listener for Loud {
    fn handlers(self: Arc<Self>) -> Vec<HandlerSpec> {
        Vec::new()
    }
}

#[test]
fn undeclared_event_types_are_rejected() {
    let manager = manager();
    let plugin = enabled_plugin("A");

    let err = manager.call_event(&mut Undeclared).unwrap_err();
    assert!(matches!(err, PluginManagerError::EventBus(_)));

    let err = manager
        .register_event::<Undeclared>(
            Arc::new(Loud),
            EventPriority::Normal,
            executor(|_: &mut Undeclared| Ok(())),
            &plugin,
            false,
        )
        .unwrap_err();
    assert!(matches!(err, PluginManagerError::EventBus(_)));
}

#[test]
fn chat_listeners_hear_whispers() {
    let manager = manager();
    manager.declare_child_event::<Whisper, Chat>().unwrap();
    let plugin = enabled_plugin("A");
    let log: Log = Arc::default();

    manager
        .register_events(recorder("chat", EventPriority::Normal, &log), &plugin)
        .unwrap();
    {
        let log = log.clone();
        manager
            .register_event::<Whisper>(
                Arc::new(Loud),
                EventPriority::High,
                executor(move |_: &mut Whisper| {
                    log.lock().push("whisper".to_string());
                    Ok(())
                }),
                &plugin,
                false,
            )
            .unwrap();
    }

    manager
        .call_event(&mut Whisper {
            chat: chat("psst"),
        })
        .unwrap();
    manager.call_event(&mut chat("open")).unwrap();

    // Whisper handlers never see a plain chat
    assert_eq!(*log.lock(), vec!["chat:psst", "whisper", "chat:open"]);
}

/// Registers a permission from inside a handler
struct Registrar {
    manager: Weak<PluginManager>,
    plugin: Arc<Plugin>,
    log: Log,
}

impl Listener for Registrar {
    fn handlers(self: Arc<Self>) -> Vec<HandlerSpec> {
        vec![HandlerSpec::on(EventPriority::Normal, move |e: &mut Chat| {
            let Some(manager) = self.manager.upgrade() else {
                return Ok(());
            };
            manager
                .add_permission(Permission::new(format!("chat.{}", e.message)))
                .map_err(|err| EventError::failed(err.to_string()))?;
            manager
                .register_events(recorder("late", EventPriority::Monitor, &self.log), &self.plugin)
                .map_err(|err| EventError::failed(err.to_string()))
        })]
    }
}

#[test]
fn listeners_may_call_back_into_the_manager() {
    let manager = Arc::new(manager());
    let plugin = enabled_plugin("A");
    let log: Log = Arc::default();

    manager
        .register_events(
            Arc::new(Registrar {
                manager: Arc::downgrade(&manager),
                plugin: plugin.clone(),
                log: log.clone(),
            }),
            &plugin,
        )
        .unwrap();

    manager.call_event(&mut chat("first")).unwrap();
    assert!(manager.get_permission("chat.first").is_some());
    // Registered during the dispatch, so not part of it
    assert!(log.lock().is_empty());

    manager.call_event(&mut chat("second")).unwrap();
    assert_eq!(*log.lock(), vec!["late:second"]);
}

#[test]
fn timings_are_recorded_when_enabled() {
    let manager = manager();
    manager.set_use_timings(true);
    let plugin = enabled_plugin("A");
    let log: Log = Arc::default();

    manager
        .register_events(recorder("t", EventPriority::Normal, &log), &plugin)
        .unwrap();
    manager.call_event(&mut chat("1")).unwrap();
    manager.call_event(&mut chat("2")).unwrap();

    let timings = manager.timings();
    assert_eq!(timings.len(), 1);
    assert_eq!(timings[0].plugin, "A");
    assert_eq!(timings[0].event, "Chat");
    assert_eq!(timings[0].calls, 2);
}
