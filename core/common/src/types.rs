//! Identifiers and small value types used throughout passcore.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Page size shared by every paginated remote endpoint.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// Generation number of a vault key. Monotonically increasing per share.
pub type KeyRotation = u64;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(String);

        impl $name {
            /// Create a new identifier from a string.
            ///
            /// # Errors
            /// - Returns error if id is empty
            pub fn new(id: impl Into<String>) -> crate::Result<Self> {
                let id = id.into();
                if id.is_empty() {
                    return Err(crate::Error::InvalidInput(format!(
                        "{} cannot be empty",
                        stringify!($name)
                    )));
                }
                Ok(Self(id))
            }

            /// Get the inner string value.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

string_id!(
    /// Identifier of a vault (share).
    ShareId
);
string_id!(
    /// Identifier of an item, unique within its share.
    ItemId
);
string_id!(
    /// Identifier of the signed-in user owning a local cache.
    UserId
);

/// Locates one item: item ids are only unique within a share.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ItemIdentifier {
    pub share_id: ShareId,
    pub item_id: ItemId,
}

impl ItemIdentifier {
    pub fn new(share_id: ShareId, item_id: ItemId) -> Self {
        Self { share_id, item_id }
    }
}

impl fmt::Display for ItemIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.share_id, self.item_id)
    }
}

/// Item flag bitmask as stored locally and reported by the server.
///
/// Bit 0: breach monitoring disabled. Bit 1: item credentials breached.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemFlags(u32);

impl ItemFlags {
    pub const MONITORING_DISABLED: u32 = 1 << 0;
    pub const BREACHED: u32 = 1 << 1;

    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub fn bits(&self) -> u32 {
        self.0
    }

    pub fn is_monitoring_disabled(&self) -> bool {
        self.0 & Self::MONITORING_DISABLED != 0
    }

    pub fn is_breached(&self) -> bool {
        self.0 & Self::BREACHED != 0
    }

    /// Return a copy with the given bit set or cleared.
    pub fn with(self, bit: u32, enabled: bool) -> Self {
        if enabled {
            Self(self.0 | bit)
        } else {
            Self(self.0 & !bit)
        }
    }
}
