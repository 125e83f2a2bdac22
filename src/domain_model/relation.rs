use crate::domain_model::UserId;
use serde::{Deserialize, Serialize};

/// The two record kinds kept per user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordKind {
    PendingRequests,
    Friendship,
}

/// Insertion-ordered set of user ids. Order carries no meaning; uniqueness does.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<UserId>", into = "Vec<UserId>")]
pub struct IdSet(Vec<UserId>);

impl IdSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, id: &UserId) -> bool {
        self.0.contains(id)
    }

    /// Returns `false` if the id was already present.
    pub fn insert(&mut self, id: UserId) -> bool {
        if self.contains(&id) {
            return false;
        }
        self.0.push(id);
        true
    }

    /// Returns `false` if the id was not present.
    pub fn remove(&mut self, id: &UserId) -> bool {
        match self.0.iter().position(|x| x == id) {
            Some(i) => {
                self.0.remove(i);
                true
            }
            None => false,
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &UserId> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[UserId] {
        &self.0
    }
}

impl From<Vec<UserId>> for IdSet {
    fn from(ids: Vec<UserId>) -> Self {
        let mut set = IdSet::new();
        for id in ids {
            set.insert(id);
        }
        set
    }
}

impl From<IdSet> for Vec<UserId> {
    fn from(set: IdSet) -> Self {
        set.0
    }
}

impl FromIterator<UserId> for IdSet {
    fn from_iter<I: IntoIterator<Item = UserId>>(iter: I) -> Self {
        iter.into_iter().collect::<Vec<_>>().into()
    }
}

/// Requests received by `owner`, waiting to be accepted or declined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRequests {
    pub owner: UserId,
    pub requesters: IdSet,
}

impl PendingRequests {
    pub fn empty(owner: UserId) -> Self {
        Self {
            owner,
            requesters: IdSet::new(),
        }
    }
}

/// Accepted friends of `owner`. Mirrored by every friend's own record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Friendship {
    pub owner: UserId,
    pub friends: IdSet,
}

impl Friendship {
    pub fn empty(owner: UserId) -> Self {
        Self {
            owner,
            friends: IdSet::new(),
        }
    }
}
