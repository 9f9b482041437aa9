use crate::auth::Actor;
use crate::model::{Block, Board};

/// Wall clock in milliseconds since the Unix epoch.
pub trait Clock: Send + Sync {
    fn now_millis(&self) -> i64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Clock frozen at one instant.
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub i64);

impl Clock for FixedClock {
    fn now_millis(&self) -> i64 {
        self.0
    }
}

/// Who changed something and when. One stamp is taken per request so every
/// entity touched by it carries the same values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationStamp {
    pub modified_by: String,
    pub at: i64,
}

impl MutationStamp {
    pub fn new(actor: &Actor, clock: &dyn Clock) -> Self {
        Self {
            modified_by: actor.stored_id().to_string(),
            at: clock.now_millis(),
        }
    }
}

/// Stamping never leaves `create_at` after `update_at`.
pub trait Stampable {
    fn stamp(&mut self, stamp: &MutationStamp);

    /// Stamps an entity that is about to be created.
    fn stamp_new(&mut self, stamp: &MutationStamp);
}

impl Stampable for Block {
    fn stamp(&mut self, stamp: &MutationStamp) {
        self.modified_by = stamp.modified_by.clone();
        self.update_at = stamp.at;
        self.create_at = self.create_at.min(stamp.at);
    }

    fn stamp_new(&mut self, stamp: &MutationStamp) {
        self.stamp(stamp);
        self.created_by = stamp.modified_by.clone();
        if self.create_at < 1 {
            self.create_at = stamp.at;
        }
    }
}

impl Stampable for Board {
    fn stamp(&mut self, stamp: &MutationStamp) {
        self.modified_by = stamp.modified_by.clone();
        self.update_at = stamp.at;
        self.create_at = self.create_at.min(stamp.at);
    }

    fn stamp_new(&mut self, stamp: &MutationStamp) {
        self.stamp(stamp);
        self.created_by = stamp.modified_by.clone();
        if self.create_at < 1 {
            self.create_at = stamp.at;
        }
    }
}

pub fn stamp_all<'a, T: Stampable + 'a>(entities: impl IntoIterator<Item = &'a mut T>, stamp: &MutationStamp) {
    for entity in entities {
        entity.stamp(stamp);
    }
}

pub fn stamp_all_new<'a, T: Stampable + 'a>(entities: impl IntoIterator<Item = &'a mut T>, stamp: &MutationStamp) {
    for entity in entities {
        entity.stamp_new(stamp);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn block(create_at: i64) -> Block {
        serde_json::from_value(json!({
            "id": "a1", "boardId": "b1", "type": "text",
            "createdBy": "someone", "createAt": create_at, "updateAt": create_at
        }))
        .unwrap()
    }

    #[test]
    fn test_single_user_is_stored_empty() {
        let stamp = MutationStamp::new(&Actor::single_user(), &FixedClock(500));
        assert_eq!(stamp.modified_by, "");
        assert_eq!(stamp.at, 500);

        let stamp = MutationStamp::new(&Actor::new("u7"), &FixedClock(500));
        assert_eq!(stamp.modified_by, "u7");
    }

    #[test]
    fn test_stamp_keeps_creation_fields() {
        let stamp = MutationStamp::new(&Actor::new("u7"), &FixedClock(500));
        let mut b = block(100);
        b.stamp(&stamp);
        assert_eq!((b.created_by.as_str(), b.create_at), ("someone", 100));
        assert_eq!((b.modified_by.as_str(), b.update_at), ("u7", 500));
    }

    #[test]
    fn test_stamp_new_clamps_create_at() {
        let stamp = MutationStamp::new(&Actor::new("u7"), &FixedClock(500));
        let mut blocks = vec![block(100), block(900)];
        stamp_all_new(blocks.iter_mut(), &stamp);

        assert_eq!(blocks[0].create_at, 100);
        assert_eq!(blocks[1].create_at, 500);
        for b in &blocks {
            assert_eq!(b.created_by, "u7");
            assert_eq!(b.update_at, 500);
            assert!(b.update_at >= b.create_at);
        }
    }
}
