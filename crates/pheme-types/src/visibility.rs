use serde::{Deserialize, Serialize};

use crate::UserId;
use crate::api::Pheme;

/// Current version of the pheme schema, stamped into every row on write.
pub const PHEME_VERSION: u32 = 1;

/// Ordered visibility tiers. A pheme is visible to a viewer class when its
/// tier is at or above the floor for that class — `Private` is the lowest
/// value and means "visible to the fewest".
///
/// Serialized as the raw tier number (0/1/2), matching the wire format and
/// the INTEGER column in the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Visibility {
    Private,
    Protected,
    Public,
}

impl From<Visibility> for u8 {
    fn from(tier: Visibility) -> u8 {
        match tier {
            Visibility::Private => 0,
            Visibility::Protected => 1,
            Visibility::Public => 2,
        }
    }
}

impl TryFrom<u8> for Visibility {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Visibility::Private),
            1 => Ok(Visibility::Protected),
            2 => Ok(Visibility::Public),
            other => Err(format!("unknown visibility tier {other}")),
        }
    }
}

/// How the viewer relates to a pheme's owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewerRelation {
    Owner,
    Friend,
    Follower,
    Stranger,
}

impl ViewerRelation {
    /// Minimum tier a pheme must carry to be visible to this viewer class.
    pub fn floor(self) -> Visibility {
        match self {
            ViewerRelation::Owner => Visibility::Private,
            ViewerRelation::Friend => Visibility::Protected,
            ViewerRelation::Follower | ViewerRelation::Stranger => Visibility::Public,
        }
    }
}

/// Decides whether `viewer` may see `pheme`, evaluated in order:
///
/// 1. the viewer is the pheme's author or its target profile — visible at any
///    tier;
/// 2. otherwise the pheme's tier must be at or above the floor for the
///    viewer's relation to the owner. `Public` is the universal floor: even a
///    stranger sees public phemes.
pub fn is_visible(viewer: UserId, pheme: &Pheme, relation: ViewerRelation) -> bool {
    if viewer == pheme.user_id || viewer == pheme.created_by {
        return true;
    }

    pheme.visibility >= relation.floor()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn pheme(created_by: UserId, user_id: UserId, visibility: Visibility) -> Pheme {
        Pheme {
            id: 1,
            version: PHEME_VERSION,
            created_at: Utc::now(),
            updated_at: None,
            visibility,
            category: "main".into(),
            text: "Hello world!".into(),
            created_by,
            user_id,
        }
    }

    #[test]
    fn author_and_target_see_every_tier() {
        for tier in [Visibility::Private, Visibility::Protected, Visibility::Public] {
            // Author on their own profile.
            assert!(is_visible(1, &pheme(1, 1, tier), ViewerRelation::Owner));
            // Author of a cross-post, viewed as a stranger to the target.
            assert!(is_visible(1, &pheme(1, 2, tier), ViewerRelation::Stranger));
            // Target of a cross-post.
            assert!(is_visible(2, &pheme(1, 2, tier), ViewerRelation::Stranger));
        }
    }

    #[test]
    fn friend_needs_protected_or_higher() {
        assert!(!is_visible(3, &pheme(1, 1, Visibility::Private), ViewerRelation::Friend));
        assert!(is_visible(3, &pheme(1, 1, Visibility::Protected), ViewerRelation::Friend));
        assert!(is_visible(3, &pheme(1, 1, Visibility::Public), ViewerRelation::Friend));
    }

    #[test]
    fn follower_is_not_a_friend() {
        // A follower who is not a friend never sees protected phemes.
        assert!(!is_visible(3, &pheme(1, 1, Visibility::Protected), ViewerRelation::Follower));
        assert!(is_visible(3, &pheme(1, 1, Visibility::Public), ViewerRelation::Follower));
    }

    #[test]
    fn stranger_sees_only_public() {
        assert!(!is_visible(3, &pheme(1, 1, Visibility::Private), ViewerRelation::Stranger));
        assert!(!is_visible(3, &pheme(1, 1, Visibility::Protected), ViewerRelation::Stranger));
        assert!(is_visible(3, &pheme(1, 1, Visibility::Public), ViewerRelation::Stranger));
    }

    #[test]
    fn tiers_are_totally_ordered() {
        assert!(Visibility::Private < Visibility::Protected);
        assert!(Visibility::Protected < Visibility::Public);
    }

    #[test]
    fn tier_round_trips_through_u8() {
        for tier in [Visibility::Private, Visibility::Protected, Visibility::Public] {
            assert_eq!(Visibility::try_from(u8::from(tier)), Ok(tier));
        }
        assert!(Visibility::try_from(3).is_err());
    }

    #[test]
    fn tier_deserializes_from_number() {
        let tier: Visibility = serde_json::from_str("2").unwrap();
        assert_eq!(tier, Visibility::Public);
        assert!(serde_json::from_str::<Visibility>("9").is_err());
    }
}
