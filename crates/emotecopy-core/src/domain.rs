use std::fmt;

/// 7tv emote set id (ObjectID, ULID or `global`).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EmoteSetId(pub String);

impl EmoteSetId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EmoteSetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 7tv emote id.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EmoteId(pub String);

impl EmoteId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EmoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// 7tv user id (the `sub` claim of a session token).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct UserId(pub String);

/// One emote entry of an emote set: the emote id plus its alias in that set.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct EmoteRef {
    pub id: EmoteId,
    pub name: String,
}

impl EmoteRef {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: EmoteId(id.into()),
            name: name.into(),
        }
    }
}

impl fmt::Display for EmoteRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "'{}' ({})", self.name, self.id)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmoteSetEntry {
    pub emote: EmoteRef,
    pub private: bool,
}

/// An emote set as listed by the remote API.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EmoteSet {
    pub id: EmoteSetId,
    pub name: String,
    pub capacity: usize,
    pub owner_id: UserId,
    pub editor_ids: Vec<UserId>,
    pub emotes: Vec<EmoteSetEntry>,
}

impl EmoteSet {
    /// Ordered emote references, in listing order.
    pub fn emote_refs(&self) -> Vec<EmoteRef> {
        self.emotes.iter().map(|e| e.emote.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.emotes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emotes.is_empty()
    }

    pub fn free_slots(&self) -> usize {
        self.capacity.saturating_sub(self.emotes.len())
    }

    pub fn find_by_alias(&self, alias: &str) -> Option<&EmoteRef> {
        self.emotes
            .iter()
            .map(|e| &e.emote)
            .find(|e| e.name == alias)
    }

    pub fn contains_exact(&self, emote: &EmoteRef) -> bool {
        self.emotes.iter().any(|e| &e.emote == emote)
    }

    /// Whether `user` may modify this set (owner or editor).
    pub fn is_editable_by(&self, user: &UserId) -> bool {
        &self.owner_id == user || self.editor_ids.iter().any(|e| e == user)
    }
}
