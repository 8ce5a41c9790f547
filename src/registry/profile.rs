//! Profile matching
//!
//! Decides whether a `<require>`/`<remove>` fragment applies to the
//! requested (api, profile) pair.
//!
//! | requested | attribute | result                              |
//! |-----------|-----------|-------------------------------------|
//! | any       | absent    | match                               |
//! | absent    | present   | error: constraint nobody asked for  |
//! | present   | present   | match iff equal                     |

use crate::error::{RegistryError, Result};
use crate::schema::Fragment;

/// Does `fragment` apply to the requested api and profile?
pub fn matches(api: Option<&str>, profile: Option<&str>, fragment: &Fragment) -> Result<bool> {
    if !attribute_matches("api", api, fragment.api.as_deref())? {
        return Ok(false);
    }
    attribute_matches("profile", profile, fragment.profile.as_deref())
}

fn attribute_matches(attribute: &'static str, requested: Option<&str>, present: Option<&str>) -> Result<bool> {
    match (present, requested) {
        (None, _) => Ok(true),
        (Some(value), None) => Err(RegistryError::UnrequestedAttribute {
            attribute,
            value: value.to_string(),
        }),
        (Some(value), Some(requested)) => Ok(value == requested),
    }
}
