//! Process-unique, monotonically increasing identifiers

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};

macro_rules! sequential_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u64);

        impl $name {
            /// Allocate the next identifier of this kind
            pub fn next() -> Self {
                static COUNTER: AtomicU64 = AtomicU64::new(1);
                Self(COUNTER.fetch_add(1, Ordering::Relaxed))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "_{}"), self.0)
            }
        }
    };
}

sequential_id!(
    /// Identifier of a duel session
    SessionId,
    "duel"
);

sequential_id!(
    /// Identifier of a pending challenge request
    ChallengeId,
    "req"
);

sequential_id!(
    /// Identifier of a projectile within a session
    ProjectileId,
    "shot"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_increase_monotonically() {
        let a = SessionId::next();
        let b = SessionId::next();
        assert!(b > a);
        assert_eq!(format!("{}", ChallengeId(7)), "req_7");
    }

    #[test]
    fn ids_serialize_as_plain_numbers() {
        let json = serde_json::to_string(&SessionId(42)).unwrap();
        assert_eq!(json, "42");
        let back: SessionId = serde_json::from_str("42").unwrap();
        assert_eq!(back, SessionId(42));
    }
}
