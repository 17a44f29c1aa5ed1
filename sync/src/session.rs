//! Session membership: which project channel this client belongs to.
//!
//! A client is in zero or one channel. There is no leave message on the
//! wire; switching projects is a new join, and the relay parts the old
//! channel implicitly. Each join mints a fresh generation so async work
//! issued under an earlier session can be recognized and discarded.

#[cfg(test)]
#[path = "session_test.rs"]
mod session_test;

/// One membership in a project channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    project_id: String,
    generation: u64,
}

impl Session {
    #[must_use]
    pub fn project_id(&self) -> &str {
        &self.project_id
    }

    /// Tag for async work issued while this session was current.
    #[must_use]
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Returns `true` if an inbound event for `project_id` belongs here.
    #[must_use]
    pub fn accepts(&self, project_id: &str) -> bool {
        self.project_id == project_id
    }
}

/// Holder of the current session, if any.
#[derive(Debug, Default)]
pub struct Membership {
    current: Option<Session>,
    last_generation: u64,
}

impl Membership {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Join `project_id`, replacing any current session. Rejoining the same
    /// project still mints a new generation.
    pub fn join(&mut self, project_id: &str) -> &Session {
        self.last_generation += 1;
        self.current.insert(Session { project_id: project_id.to_owned(), generation: self.last_generation })
    }

    /// Drop the current session, returning it.
    pub fn leave(&mut self) -> Option<Session> {
        self.current.take()
    }

    #[must_use]
    pub fn current(&self) -> Option<&Session> {
        self.current.as_ref()
    }

    /// Returns `true` if `generation` belongs to the current session.
    #[must_use]
    pub fn is_current(&self, generation: u64) -> bool {
        self.current.as_ref().is_some_and(|s| s.generation == generation)
    }
}
