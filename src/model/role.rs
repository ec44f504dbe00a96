use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};
use thiserror::Error;
use utoipa::ToSchema;

#[derive(
    Debug, Copy, Clone, Eq, PartialEq, Serialize, Deserialize, Display, EnumString, AsRefStr, ToSchema,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Role {
    Admin,
    Employee,
}

#[derive(Debug, Error)]
#[error("unknown role id {0}")]
pub struct UnknownRole(pub u8);

impl Role {
    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Role::Admin),
            2 => Some(Role::Employee),
            _ => None,
        }
    }

    pub fn id(self) -> u8 {
        match self {
            Role::Admin => 1,
            Role::Employee => 2,
        }
    }
}

impl TryFrom<u8> for Role {
    type Error = UnknownRole;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        Role::from_id(id).ok_or(UnknownRole(id))
    }
}
