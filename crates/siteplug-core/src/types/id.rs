//! Opaque handles returned by the event bus and the hook registry.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

macro_rules! handle {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Fresh random handle.
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        // Simple form (no hyphens) keeps log lines short.
        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt::Display::fmt(&self.0.simple(), f)
            }
        }
    };
}

handle!(
    /// Returned by `subscribe*`; pass it to `unsubscribe`.
    SubscriptionId
);

handle!(
    /// Returned by `add_filter`/`add_action`; pass it to `remove_hook`.
    HookId
);
