/*!
 * Resource Model
 *
 * Schedulable physical entities: rooms and devices share the same table
 * and the same conflict rules. Only active resources may be newly booked;
 * past bookings of deactivated resources stay visible.
 */

use serde::{Deserialize, Serialize};

use super::Id;

/// Resource kind.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Room,
    Device,
}

impl ResourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Room => "room",
            Self::Device => "device",
        }
    }
}

impl std::fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A schedulable room or device.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    pub id: Id,
    pub name: String,
    pub kind: ResourceKind,
    pub color: String,
    pub active: bool,
}

impl Resource {
    pub fn is_room(&self) -> bool {
        self.kind == ResourceKind::Room
    }

    pub fn is_device(&self) -> bool {
        self.kind == ResourceKind::Device
    }
}

/// Data for registering a resource.
#[derive(Debug, Clone)]
pub struct NewResource {
    pub name: String,
    pub kind: ResourceKind,
    pub color: String,
    pub active: bool,
}
