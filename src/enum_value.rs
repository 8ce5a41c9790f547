//! Enumerant value computation
//!
//! Values are given directly, by bit position, or for extension-contributed
//! enumerants by an offset inside the extension's reserved block:
//!
//! ```text
//! value = EXT_BASE + (extension_number - 1) * EXT_BLOCK_SIZE + offset
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{RegistryError, Result};
use crate::schema::EnumerantDef;

/// First value reserved for extension enumerants
pub const EXT_BASE: i64 = 1_000_000_000;

/// Number of values reserved per extension
pub const EXT_BLOCK_SIZE: i64 = 1000;

/// Resolved value of an enumerant
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnumValue {
    /// Integer value
    Int(i64),
    /// Single-bit flag value
    Bits(u64),
    /// Non-integer value text, e.g. `(~0U)` or `1000.0F`
    Literal(String),
    /// Same value as another enumerant
    Alias(String),
}

impl fmt::Display for EnumValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{}", v),
            Self::Bits(v) => write!(f, "0x{:08X}", v),
            Self::Literal(text) => write!(f, "{}", text),
            Self::Alias(name) => write!(f, "{}", name),
        }
    }
}

/// Compute the value of an enumerant.
///
/// `ext_number` is the number of the extension that contributed the
/// enumerant; an explicit `extnumber` on the element wins over it.
/// Returns `Ok(None)` for reference-only elements.
pub fn enumerant_value(def: &EnumerantDef, ext_number: Option<u32>) -> Result<Option<EnumValue>> {
    if let Some(value) = &def.value {
        return Ok(Some(parse_int(value).map_or_else(|| EnumValue::Literal(value.clone()), EnumValue::Int)));
    }

    if let Some(bitpos) = def.bitpos {
        let value = 1u64.checked_shl(bitpos).ok_or_else(|| RegistryError::InvalidEnumerant {
            name: def.name.clone(),
            reason: format!("bitpos {} does not fit in 64 bits", bitpos),
        })?;
        return Ok(Some(EnumValue::Bits(value)));
    }

    if let Some(offset) = def.offset {
        let number = def.extnumber.or(ext_number).ok_or_else(|| RegistryError::InvalidEnumerant {
            name: def.name.clone(),
            reason: "offset given without an extension number".to_string(),
        })?;
        let value = (i64::from(number) - 1)
            .checked_mul(EXT_BLOCK_SIZE)
            .and_then(|block| block.checked_add(EXT_BASE))
            .and_then(|base| base.checked_add(offset))
            .ok_or_else(|| RegistryError::InvalidEnumerant {
                name: def.name.clone(),
                reason: format!("offset {} in extension {} overflows", offset, number),
            })?;
        return Ok(Some(EnumValue::Int(if def.is_negative() { -value } else { value })));
    }

    Ok(def.alias.clone().map(EnumValue::Alias))
}

/// Parse a C-style integer literal (decimal or 0x-hex, optional sign)
fn parse_int(text: &str) -> Option<i64> {
    let text = text.trim();
    let (negative, digits) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let magnitude = match digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
        Some(hex) => i64::from_str_radix(hex, 16).ok()?,
        None => digits.parse::<i64>().ok()?,
    };
    Some(if negative { -magnitude } else { magnitude })
}
