//! Typed UUID identifiers for account-scoped rows.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! uuid_identifier {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        pub struct $name(Uuid);

        impl $name {
            /// Creates a new random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Creates an identifier from an existing UUID value.
            #[must_use]
            pub fn from_uuid(value: Uuid) -> Self {
                Self(value)
            }

            /// Returns the underlying UUID value.
            #[must_use]
            pub fn as_uuid(&self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(formatter, "{}", self.0)
            }
        }
    };
}

uuid_identifier!(
    /// Unique identifier for an actor.
    ActorId
);
uuid_identifier!(
    /// Unique identifier for a group.
    GroupId
);
uuid_identifier!(
    /// Unique identifier for an external identity provider.
    ProviderId
);
uuid_identifier!(
    /// Unique identifier for an access policy.
    PolicyId
);
uuid_identifier!(
    /// Unique identifier for a protected resource.
    ResourceId
);
uuid_identifier!(
    /// Unique identifier for a registered client device.
    ClientId
);
uuid_identifier!(
    /// Unique identifier for a directory identity.
    IdentityId
);
uuid_identifier!(
    /// Unique identifier for an authenticated session.
    SessionId
);
uuid_identifier!(
    /// Unique identifier for an access grant.
    GrantId
);
