//! Concrete record kinds.
//!
//! Each kind embeds a [`RecordHeader`] and adds a fixed set of string fields
//! that default to the empty string. Attributes outside the declared schema
//! are kept in `extra` so persisted mappings survive a reload unchanged.

use super::record::{
    check_assignable, expect_string, fields_of, rehydrate, Record, RecordHeader, RecordKind,
    RecordResult,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::any::Any;

macro_rules! record_kind {
    (
        $(#[$meta:meta])*
        $name:ident { $($(#[$field_meta:meta])* $field:ident),* $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
        pub struct $name {
            #[serde(flatten)]
            pub header: RecordHeader,
            $(
                $(#[$field_meta])*
                #[serde(default)]
                pub $field: String,
            )*
            /// Attributes assigned outside the declared schema.
            #[serde(flatten)]
            pub extra: Map<String, Value>,
        }

        impl $name {
            pub fn new() -> Self {
                Self {
                    header: RecordHeader::new(),
                    $($field: String::new(),)*
                    extra: Map::new(),
                }
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl Record for $name {
            fn kind(&self) -> &'static str {
                <Self as RecordKind>::KIND
            }

            fn header(&self) -> &RecordHeader {
                &self.header
            }

            fn header_mut(&mut self) -> &mut RecordHeader {
                &mut self.header
            }

            fn to_fields(&self) -> RecordResult<Map<String, Value>> {
                fields_of(<Self as RecordKind>::KIND, self)
            }

            fn set_attribute(&mut self, name: &str, value: Value) -> RecordResult<()> {
                check_assignable(name)?;
                $(
                    if name == stringify!($field) {
                        self.$field = expect_string(name, value)?;
                        return Ok(());
                    }
                )*
                self.extra.insert(name.to_string(), value);
                Ok(())
            }

            fn as_any(&self) -> &dyn Any {
                self
            }

            fn as_any_mut(&mut self) -> &mut dyn Any {
                self
            }
        }

        impl RecordKind for $name {
            const KIND: &'static str = stringify!($name);
            const FIELDS: &'static [&'static str] = &[$(stringify!($field)),*];

            fn fresh() -> Self {
                Self::new()
            }

            fn from_fields(fields: Map<String, Value>) -> RecordResult<Self> {
                rehydrate(fields)
            }
        }
    };
}

record_kind! {
    /// Account holder.
    User {
        email,
        password,
    }
}

record_kind! {
    /// Rentable place.
    Place {
        name,
    }
}

record_kind! {
    City {
        name,
    }
}

record_kind! {
    State {
        name,
    }
}
