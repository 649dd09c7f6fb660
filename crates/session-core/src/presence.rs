/// Nicknames of remote participants currently typing.
///
/// Rebuilt wholesale from every presence broadcast; never patched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TypingSet {
    users: Vec<String>,
}

impl TypingSet {
    /// Typing nicknames in provider order.
    pub fn users(&self) -> &[String] {
        &self.users
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }

    pub fn contains(&self, nickname: &str) -> bool {
        self.users.iter().any(|user| user == nickname)
    }

    /// Replace the set from a full broadcast, dropping `local_nickname` and
    /// repeated entries.
    pub fn replace(&mut self, users_typing: &[String], local_nickname: &str) {
        let mut next: Vec<String> = Vec::with_capacity(users_typing.len());
        for user in users_typing {
            if user == local_nickname || next.contains(user) {
                continue;
            }
            next.push(user.clone());
        }
        self.users = next;
    }

    pub fn clear(&mut self) {
        self.users.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| (*v).to_owned()).collect()
    }

    #[test]
    fn excludes_local_nickname() {
        let mut set = TypingSet::default();
        set.replace(&names(&["Alice", "Bob"]), "Alice");
        assert_eq!(set.users(), names(&["Bob"]).as_slice());
        assert!(!set.contains("Alice"));
    }

    #[test]
    fn same_broadcast_twice_is_idempotent() {
        let mut set = TypingSet::default();
        let broadcast = names(&["Bob", "Alice", "Carol"]);

        set.replace(&broadcast, "Alice");
        let first = set.clone();
        set.replace(&broadcast, "Alice");

        assert_eq!(set, first);
        assert_eq!(set.users(), names(&["Bob", "Carol"]).as_slice());
    }

    #[test]
    fn replaces_instead_of_merging() {
        let mut set = TypingSet::default();
        set.replace(&names(&["Bob"]), "Alice");
        set.replace(&names(&["Carol"]), "Alice");
        assert_eq!(set.users(), names(&["Carol"]).as_slice());

        set.replace(&[], "Alice");
        assert!(set.is_empty());
    }

    #[test]
    fn collapses_repeated_nicknames() {
        let mut set = TypingSet::default();
        set.replace(&names(&["Bob", "Bob"]), "Alice");
        assert_eq!(set.users(), names(&["Bob"]).as_slice());
    }
}
