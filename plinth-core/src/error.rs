//! Error types for plinth-core

use thiserror::Error;

/// Errors from the event bus
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventBusError {
    /// The event type (or one of its ancestors) was never declared
    #[error("Event type {name} has no declared handler list")]
    UnknownEventType { name: &'static str },

    /// `declare_child` named a parent that was never declared
    #[error("Cannot declare {child} under undeclared event type {parent}")]
    UnknownParent {
        child: &'static str,
        parent: &'static str,
    },
}

/// Errors from the permission registry
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PermissionError {
    #[error("The permission {0} is already defined")]
    AlreadyDefined(String),

    #[error("Permission not found: {0}")]
    NotFound(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_event_type_display() {
        let err = EventBusError::UnknownEventType { name: "ChatEvent" };
        assert!(err.to_string().contains("ChatEvent"));
    }

    #[test]
    fn test_unknown_parent_display() {
        let err = EventBusError::UnknownParent {
            child: "Child",
            parent: "Parent",
        };
        let msg = err.to_string();
        assert!(msg.contains("Child"));
        assert!(msg.contains("Parent"));
    }

    #[test]
    fn test_already_defined_display() {
        let err = PermissionError::AlreadyDefined("cmd.fly".into());
        assert_eq!(err.to_string(), "The permission cmd.fly is already defined");
    }
}
