use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use uuid::Uuid;

use crate::session::{ClientSession, ServerSession, Session};

/// Opaque key of a registered session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SessionId(Uuid);

impl SessionId {
    fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Live sessions of one side of the system.
pub struct Registry<S: Session + ?Sized> {
    sessions: RwLock<HashMap<SessionId, Arc<S>>>,
}

/// Sessions opened by this process towards servers.
pub type Client = Registry<dyn ClientSession>;

/// Sessions accepted by this process.
pub type Server = Registry<dyn ServerSession>;

impl<S: Session + ?Sized> Default for Registry<S> {
    fn default() -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
        }
    }
}

impl<S: Session + ?Sized> Registry<S> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn create_session(&self, session: Arc<S>) -> SessionId {
        let id = SessionId::new();
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id, session);
        tracing::debug!(session = %id, "session registered");
        id
    }

    /// Forget a session without terminating it.
    pub fn remove_session(&self, id: SessionId) -> Option<Arc<S>> {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&id)
    }

    pub fn session(&self, id: SessionId) -> Option<Arc<S>> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&id)
            .cloned()
    }

    /// Terminate a session and unregister it. Returns `false` for an
    /// unknown id.
    pub fn terminate(&self, id: SessionId) -> bool {
        match self.remove_session(id) {
            Some(session) => {
                session.terminate();
                tracing::debug!(session = %id, "session terminated");
                true
            }
            None => false,
        }
    }

    /// Terminate every registered session.
    pub fn terminate_all(&self) {
        let drained: Vec<Arc<S>> = self
            .sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(_, session)| session)
            .collect();
        for session in drained {
            session.terminate();
        }
    }

    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use inv_jsonrpc::Response;

    #[derive(Default)]
    struct Counted {
        terminated: AtomicUsize,
    }

    impl Session for Counted {
        fn terminate(&self) {
            self.terminated.fetch_add(1, Ordering::SeqCst);
        }
    }

    impl ServerSession for Counted {
        fn handle(&self) -> Option<&str> {
            None
        }

        fn reply_async(&self, _response: Option<Response>) {}
    }

    #[test]
    fn create_lookup_remove() {
        let server = Server::new();
        let session = Arc::new(Counted::default());
        let id = server.create_session(session.clone());
        assert_eq!(server.len(), 1);
        assert!(server.session(id).is_some());

        assert!(server.remove_session(id).is_some());
        assert!(server.is_empty());
        assert_eq!(session.terminated.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn terminate_unregisters() {
        let server = Server::new();
        let session = Arc::new(Counted::default());
        let id = server.create_session(session.clone());
        assert!(server.terminate(id));
        assert!(!server.terminate(id));
        assert_eq!(session.terminated.load(Ordering::SeqCst), 1);

        server.create_session(session.clone());
        server.create_session(session.clone());
        server.terminate_all();
        assert!(server.is_empty());
        assert_eq!(session.terminated.load(Ordering::SeqCst), 3);
    }
}
