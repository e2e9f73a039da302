use core::{borrow::Borrow, fmt};
use serde::{Deserialize, Serialize};

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            #[inline]
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            #[inline]
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            #[inline]
            #[must_use]
            pub fn is_empty(&self) -> bool {
                self.0.is_empty()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{:?}", self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.into())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id! {
    /// Identifies a component type. Unique across the metadata registry.
    TypeId
}

string_id! {
    /// Identifies one instance of a component type. Unique across the instance registry.
    ///
    /// A type with a single instance conventionally uses its [`TypeId`] as the instance id.
    InstanceId
}

impl From<&TypeId> for InstanceId {
    fn from(type_id: &TypeId) -> Self {
        Self(type_id.0.clone())
    }
}

impl InstanceId {
    /// `true` for the default instance of a type, the one registered under the type's own id.
    #[inline]
    #[must_use]
    pub fn is_default_of(&self, type_id: &TypeId) -> bool {
        self.0 == type_id.0
    }
}
