use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use ts_rs::TS;
use uuid::Uuid;

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, TS,
        )]
        #[ts(export)]
        pub struct $name(pub Uuid);

        impl $name {
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        /// Accepts every textual form `uuid` understands (hyphenated, simple,
        /// braced, urn) in any letter case, so identities coming from different
        /// clients compare equal once parsed.
        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim()).map(Self)
            }
        }
    };
}

define_id!(
    /// Identity of a player, as handed over by the identity collaborator.
    PlayerId
);
define_id!(RoomId);
define_id!(RoundId);
define_id!(WordId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_player_id_tolerates_representations() {
        let hyphenated: PlayerId = "550e8400-e29b-41d4-a716-446655440001".parse().unwrap();
        let simple: PlayerId = "550E8400E29B41D4A716446655440001".parse().unwrap();
        let braced: PlayerId = " {550e8400-e29b-41d4-a716-446655440001} ".parse().unwrap();

        assert_eq!(hyphenated, simple);
        assert_eq!(hyphenated, braced);
    }

    #[test]
    fn test_invalid_id_is_rejected() {
        assert!("not-an-id".parse::<RoomId>().is_err());
    }

    #[test]
    fn test_id_serializes_as_plain_string() {
        let id: RoundId = "550e8400-e29b-41d4-a716-446655440001".parse().unwrap();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"550e8400-e29b-41d4-a716-446655440001\"");
    }
}
