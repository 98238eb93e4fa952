//! The presence registry: who is online, and on which connection.
//!
//! Two indexes are kept in sync:
//!
//! ```text
//! entries:     UserId       → PresenceEntry   (at most one per user)
//! connections: ConnectionId → UserId          (at most one per connection)
//! ```
//!
//! A third index, `latest`, remembers each user's most recent login until
//! that connection closes. It outlives logout and user switches, so a
//! closing connection can still be traced to every user it last spoke
//! for.
//!
//! Every lookup is O(1). Absence is never an error: callers routinely
//! look up users who already went offline.

use std::collections::HashMap;

use gambit_protocol::{ConnectionId, PresenceEntry, UserId};

/// Tracks currently connected, identified users.
#[derive(Debug, Default)]
pub struct PresenceRegistry {
    entries: HashMap<UserId, PresenceEntry>,
    connections: HashMap<ConnectionId, UserId>,
    latest: HashMap<UserId, PresenceEntry>,
}

impl PresenceRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces the entry for `user_id`.
    ///
    /// A re-login from another connection replaces the old entry (last
    /// writer wins) and unlinks the old connection. If `connection_id`
    /// was logged in as a different user, that user is signed out first:
    /// one connection speaks for one user.
    ///
    /// Returns the entry that was replaced, if any.
    pub fn register(
        &mut self,
        user_id: UserId,
        display_name: String,
        connection_id: ConnectionId,
    ) -> Option<PresenceEntry> {
        if let Some(other) = self.connections.get(&connection_id) {
            if *other != user_id {
                let other = other.clone();
                self.entries.remove(&other);
                tracing::debug!(
                    %connection_id,
                    previous_user = %other,
                    "connection switched users"
                );
            }
        }

        let entry = PresenceEntry {
            user_id: user_id.clone(),
            display_name,
            connection_id,
        };
        self.latest.insert(user_id.clone(), entry.clone());
        let previous = self.entries.insert(user_id.clone(), entry);
        if let Some(previous) = &previous {
            if previous.connection_id != connection_id {
                self.connections.remove(&previous.connection_id);
            }
        }
        self.connections.insert(connection_id, user_id.clone());

        tracing::info!(%user_id, %connection_id, "user present");
        previous
    }

    /// Removes whichever entry is bound to `connection_id`.
    ///
    /// Returns the removed entry, or `None` if the connection never logged
    /// in or was superseded by a newer login.
    pub fn unregister(
        &mut self,
        connection_id: ConnectionId,
    ) -> Option<PresenceEntry> {
        let user_id = self.connections.remove(&connection_id)?;
        let entry = self.entries.remove(&user_id);
        if entry.is_some() {
            tracing::info!(%user_id, %connection_id, "user gone");
        }
        entry
    }

    /// Forgets every user whose most recent login came from
    /// `connection_id`, returning them ordered by user id.
    ///
    /// Call once the connection has closed. Users who logged out on it,
    /// or whom it switched away from, are included; users who logged in
    /// again elsewhere are not.
    pub fn release(
        &mut self,
        connection_id: ConnectionId,
    ) -> Vec<PresenceEntry> {
        let mut released = Vec::new();
        self.latest.retain(|_, entry| {
            if entry.connection_id == connection_id {
                released.push(entry.clone());
                false
            } else {
                true
            }
        });
        released.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        released
    }

    pub fn find_by_user_id(&self, user_id: &UserId) -> Option<&PresenceEntry> {
        self.entries.get(user_id)
    }

    pub fn find_by_connection_id(
        &self,
        connection_id: ConnectionId,
    ) -> Option<&PresenceEntry> {
        self.connections
            .get(&connection_id)
            .and_then(|user_id| self.entries.get(user_id))
    }

    /// Shorthand for the connection a user can currently be reached on.
    pub fn connection_of(&self, user_id: &UserId) -> Option<ConnectionId> {
        self.entries.get(user_id).map(|entry| entry.connection_id)
    }

    /// Snapshot of the presence set, ordered by display name then user id
    /// so every broadcast lists users the same way.
    pub fn list_active(&self) -> Vec<PresenceEntry> {
        let mut active: Vec<PresenceEntry> =
            self.entries.values().cloned().collect();
        active.sort_by(|a, b| {
            a.display_name
                .cmp(&b.display_name)
                .then_with(|| a.user_id.cmp(&b.user_id))
        });
        active
    }

    /// Number of users present.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    //! Naming follows `test_{function}_{scenario}_{expected}`.

    use super::*;

    fn uid(id: &str) -> UserId {
        UserId::new(id)
    }

    fn cid(id: u64) -> ConnectionId {
        ConnectionId::new(id)
    }

    fn user_on(reg: &PresenceRegistry, conn: u64) -> Option<UserId> {
        reg.find_by_connection_id(cid(conn)).map(|e| e.user_id.clone())
    }

    /// Checks both indexes agree and hold at most one entry per user.
    fn assert_consistent(reg: &PresenceRegistry) {
        assert_eq!(reg.entries.len(), reg.connections.len());
        for (conn, user) in &reg.connections {
            let entry = reg.entries.get(user).expect("indexed user present");
            assert_eq!(entry.connection_id, *conn);
        }
    }

    // =====================================================================
    // register()
    // =====================================================================

    #[test]
    fn test_register_new_user_is_findable_both_ways() {
        let mut reg = PresenceRegistry::new();

        let previous = reg.register(uid("1"), "Alice".into(), cid(10));

        assert!(previous.is_none());
        assert_eq!(reg.connection_of(&uid("1")), Some(cid(10)));
        assert_eq!(user_on(&reg, 10), Some(uid("1")));
        assert_consistent(&reg);
    }

    #[test]
    fn test_register_relogin_replaces_not_duplicates() {
        let mut reg = PresenceRegistry::new();
        reg.register(uid("1"), "Alice".into(), cid(10));

        let previous = reg.register(uid("1"), "Alice".into(), cid(11));

        assert_eq!(previous.unwrap().connection_id, cid(10));
        assert_eq!(reg.len(), 1);
        assert_eq!(reg.connection_of(&uid("1")), Some(cid(11)));
        assert!(
            reg.find_by_connection_id(cid(10)).is_none(),
            "stale connection should no longer resolve"
        );
        assert_consistent(&reg);
    }

    #[test]
    fn test_register_same_connection_twice_is_idempotent() {
        let mut reg = PresenceRegistry::new();
        reg.register(uid("1"), "Alice".into(), cid(10));
        reg.register(uid("1"), "Alice".into(), cid(10));

        assert_eq!(reg.len(), 1);
        assert_eq!(user_on(&reg, 10), Some(uid("1")));
        assert_consistent(&reg);
    }

    #[test]
    fn test_register_connection_switching_users_drops_old_user() {
        let mut reg = PresenceRegistry::new();
        reg.register(uid("1"), "Alice".into(), cid(10));

        reg.register(uid("2"), "Bob".into(), cid(10));

        assert!(reg.find_by_user_id(&uid("1")).is_none());
        assert_eq!(user_on(&reg, 10), Some(uid("2")));
        assert_eq!(reg.len(), 1);
        assert_consistent(&reg);
    }

    // =====================================================================
    // unregister()
    // =====================================================================

    #[test]
    fn test_unregister_removes_entry() {
        let mut reg = PresenceRegistry::new();
        reg.register(uid("1"), "Alice".into(), cid(10));

        let removed = reg.unregister(cid(10));

        assert_eq!(removed.unwrap().user_id, uid("1"));
        assert!(reg.is_empty());
        assert_consistent(&reg);
    }

    #[test]
    fn test_unregister_unknown_connection_is_noop() {
        let mut reg = PresenceRegistry::new();
        reg.register(uid("1"), "Alice".into(), cid(10));

        assert!(reg.unregister(cid(99)).is_none());
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_unregister_superseded_connection_keeps_new_login() {
        // Alice re-logged on conn 11; the old socket then drops.
        let mut reg = PresenceRegistry::new();
        reg.register(uid("1"), "Alice".into(), cid(10));
        reg.register(uid("1"), "Alice".into(), cid(11));

        assert!(reg.unregister(cid(10)).is_none());
        assert_eq!(reg.connection_of(&uid("1")), Some(cid(11)));
        assert_consistent(&reg);
    }

    #[test]
    fn test_login_logout_sequences_keep_one_entry_per_user() {
        let mut reg = PresenceRegistry::new();
        let steps: &[(&str, u64, bool)] = &[
            ("1", 1, true),
            ("1", 2, true),
            ("1", 1, false),
            ("1", 3, true),
            ("1", 2, false),
            ("1", 3, false),
            ("1", 4, true),
        ];
        for &(user, conn, login) in steps {
            if login {
                reg.register(uid(user), "Alice".into(), cid(conn));
            } else {
                reg.unregister(cid(conn));
            }
            assert!(reg.len() <= 1, "more than one entry for the same user");
            assert_consistent(&reg);
        }
        assert_eq!(reg.connection_of(&uid("1")), Some(cid(4)));
    }

    // =====================================================================
    // release()
    // =====================================================================

    #[test]
    fn test_release_after_logout_returns_user() {
        let mut reg = PresenceRegistry::new();
        reg.register(uid("1"), "Alice".into(), cid(10));
        reg.unregister(cid(10));

        let released = reg.release(cid(10));

        assert_eq!(released.len(), 1);
        assert_eq!(released[0].user_id, uid("1"));
        assert_eq!(released[0].display_name, "Alice");
        assert!(reg.release(cid(10)).is_empty());
    }

    #[test]
    fn test_release_connection_switching_users_returns_both() {
        let mut reg = PresenceRegistry::new();
        reg.register(uid("1"), "Alice".into(), cid(10));
        reg.register(uid("2"), "Bob".into(), cid(10));

        let users: Vec<UserId> = reg
            .release(cid(10))
            .into_iter()
            .map(|e| e.user_id)
            .collect();

        assert_eq!(users, vec![uid("1"), uid("2")]);
    }

    #[test]
    fn test_release_superseded_connection_returns_nothing() {
        let mut reg = PresenceRegistry::new();
        reg.register(uid("1"), "Alice".into(), cid(10));
        reg.register(uid("1"), "Alice".into(), cid(11));

        assert!(reg.release(cid(10)).is_empty());
        assert_eq!(reg.release(cid(11)).len(), 1);
    }

    // =====================================================================
    // list_active()
    // =====================================================================

    #[test]
    fn test_list_active_is_sorted_by_name() {
        let mut reg = PresenceRegistry::new();
        reg.register(uid("2"), "Bob".into(), cid(2));
        reg.register(uid("1"), "Alice".into(), cid(1));
        reg.register(uid("3"), "Alice".into(), cid(3));

        let names: Vec<(String, String)> = reg
            .list_active()
            .into_iter()
            .map(|e| (e.display_name, e.user_id.0))
            .collect();

        assert_eq!(
            names,
            vec![
                ("Alice".to_string(), "1".to_string()),
                ("Alice".to_string(), "3".to_string()),
                ("Bob".to_string(), "2".to_string()),
            ]
        );
    }

    #[test]
    fn test_find_by_user_id_absent_returns_none() {
        let reg = PresenceRegistry::new();
        assert!(reg.find_by_user_id(&uid("nobody")).is_none());
        assert!(reg.connection_of(&uid("nobody")).is_none());
    }
}
