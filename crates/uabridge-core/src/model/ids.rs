// ── Identity types ──
//
// The backend identifies servers and data points by integer primary keys.
// Separate newtypes keep the two key spaces from being mixed up in the
// session and subscription maps.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Backend identity of a remote endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ServerId(i64);

/// Backend identity of a data point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DataPointId(i64);

macro_rules! impl_id {
    ($name:ident) => {
        impl $name {
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            pub const fn get(self) -> i64 {
                self.0
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

impl_id!(ServerId);
impl_id!(DataPointId);
