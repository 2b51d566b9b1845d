use std::sync::Arc;

use crate::errors::SessionError;

/// Lifecycle of one engine's channel membership.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Joining,
    Joined,
    Leaving,
    Failed,
}

/// Events produced by an engine instance, consumed exactly once by the
/// session manager's decision loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallEvent {
    JoinSucceeded {
        session_id: String,
        uid: u32,
        channel: String,
    },
    JoinFailed {
        session_id: String,
        code: i32,
    },
    UserJoined {
        session_id: String,
        uid: u32,
    },
    UserLeft {
        session_id: String,
        uid: u32,
        reason: UserLeftReason,
    },
    EngineError {
        session_id: String,
        code: i32,
    },
}

impl CallEvent {
    /// The session this event belongs to.
    pub fn session_id(&self) -> &str {
        match self {
            CallEvent::JoinSucceeded { session_id, .. }
            | CallEvent::JoinFailed { session_id, .. }
            | CallEvent::UserJoined { session_id, .. }
            | CallEvent::UserLeft { session_id, .. }
            | CallEvent::EngineError { session_id, .. } => session_id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserLeftReason {
    Quit,
    Dropped,
    RoleChanged,
}

/// Notifications delivered to the UI boundary.
#[derive(Debug, Clone)]
pub enum SessionNotification {
    StateChanged {
        session_id: String,
        state: SessionState,
        error: Option<SessionError>,
    },
    RemoteUserChanged {
        session_id: String,
        uid: u32,
        present: bool,
    },
}

/// Trait for receiving notifications from the core.
/// Implementations must be Send + Sync (called from tokio tasks).
pub trait SessionObserver: Send + Sync {
    fn on_notification(&self, notification: SessionNotification);
}

/// Internal hub that dispatches notifications to registered observers.
#[derive(Clone)]
pub struct ObserverHub {
    observers: Arc<std::sync::RwLock<Vec<Arc<dyn SessionObserver>>>>,
}

impl ObserverHub {
    pub fn new() -> Self {
        Self {
            observers: Arc::new(std::sync::RwLock::new(Vec::new())),
        }
    }

    pub fn add_observer(&self, observer: Arc<dyn SessionObserver>) {
        self.observers.write().unwrap().push(observer);
    }

    pub fn notify(&self, notification: SessionNotification) {
        let observers = self.observers.read().unwrap();
        for observer in observers.iter() {
            observer.on_notification(notification.clone());
        }
    }
}

impl Default for ObserverHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingObserver {
        count: Arc<AtomicUsize>,
    }

    impl SessionObserver for CountingObserver {
        fn on_notification(&self, _notification: SessionNotification) {
            self.count.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn hub_dispatches_to_observer() {
        let hub = ObserverHub::new();
        let count = Arc::new(AtomicUsize::new(0));
        let observer = Arc::new(CountingObserver { count: count.clone() });

        hub.add_observer(observer);
        hub.notify(SessionNotification::StateChanged {
            session_id: "front".to_string(),
            state: SessionState::Joining,
            error: None,
        });

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn hub_dispatches_to_multiple_observers() {
        let hub = ObserverHub::new();
        let count1 = Arc::new(AtomicUsize::new(0));
        let count2 = Arc::new(AtomicUsize::new(0));

        hub.add_observer(Arc::new(CountingObserver { count: count1.clone() }));
        hub.add_observer(Arc::new(CountingObserver { count: count2.clone() }));

        hub.notify(SessionNotification::RemoteUserChanged {
            session_id: "front".to_string(),
            uid: 7,
            present: true,
        });

        assert_eq!(count1.load(Ordering::SeqCst), 1);
        assert_eq!(count2.load(Ordering::SeqCst), 1);
    }

    struct NotificationCapture {
        notifications: Arc<std::sync::Mutex<Vec<SessionNotification>>>,
    }

    impl SessionObserver for NotificationCapture {
        fn on_notification(&self, notification: SessionNotification) {
            self.notifications.lock().unwrap().push(notification);
        }
    }

    #[test]
    fn hub_delivers_correct_notifications() {
        let hub = ObserverHub::new();
        let notifications = Arc::new(std::sync::Mutex::new(Vec::new()));
        let observer = Arc::new(NotificationCapture {
            notifications: notifications.clone(),
        });

        hub.add_observer(observer);
        hub.notify(SessionNotification::RemoteUserChanged {
            session_id: "back".to_string(),
            uid: 42,
            present: false,
        });

        let captured = notifications.lock().unwrap();
        assert_eq!(captured.len(), 1);
        match &captured[0] {
            SessionNotification::RemoteUserChanged { session_id, uid, present } => {
                assert_eq!(session_id, "back");
                assert_eq!(*uid, 42);
                assert!(!present);
            }
            _ => panic!("expected RemoteUserChanged"),
        }
    }

    #[test]
    fn event_session_id_accessor() {
        let event = CallEvent::UserLeft {
            session_id: "front".to_string(),
            uid: 3,
            reason: UserLeftReason::Dropped,
        };
        assert_eq!(event.session_id(), "front");
    }
}
