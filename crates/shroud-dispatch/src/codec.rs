//! Wire codec for protected strings
//!
//! A protected string is shield-framed and optionally carries an attribute
//! block: `{[key=value,key=value]body}`. The codec only classifies and
//! (de)frames values; it never judges whether a body is decryptable.
//!
//! Classification rules:
//! - Current: framed, no nested shield characters, attribute block parses
//!   to a non-empty map holding both `name` and `version`.
//! - Legacy: framed, no nested shield characters, attribute block absent,
//!   empty, or lacking `name`.
//! - An attribute block that is present but malformed is a hard error,
//!   never silently plaintext.

use std::collections::BTreeMap;

use shroud_core::{Error, Result};

/// Opening shield delimiter
pub const SHIELD_BEGIN: char = '{';
/// Closing shield delimiter
pub const SHIELD_END: char = '}';

const ATTR_BEGIN: char = '[';
const ATTR_END: char = ']';

/// Attribute naming the dispatcher that produced a protected string
pub const DISPATCHER_NAME_ATTR: &str = "name";
/// Attribute carrying the wire format version
pub const DISPATCHER_VERSION_ATTR: &str = "version";
/// Version stamped into newly encoded protected strings
pub const WIRE_VERSION: &str = "1.0";

/// How a candidate string classifies against the protected-string grammar
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Not a protected string; passes through untouched
    Plaintext,
    /// Current form with a parsed attribute map (includes `name` and `version`)
    Current { attributes: BTreeMap<String, String> },
    /// Legacy form: framed body without routing attributes
    Legacy { attributes: BTreeMap<String, String> },
}

/// Classify `value` as plaintext, current or legacy protected string.
///
/// Nested shield characters inside the frame make the value plaintext at
/// every call site. A present-but-malformed attribute block is an error.
pub fn classify(value: &str) -> Result<Classification> {
    if !shield_framed(value) {
        return Ok(Classification::Plaintext);
    }
    let bare = unshield(value);
    if bare.contains(SHIELD_BEGIN) || bare.contains(SHIELD_END) {
        return Ok(Classification::Plaintext);
    }
    match parse_attributes(bare)? {
        None => Ok(Classification::Legacy {
            attributes: BTreeMap::new(),
        }),
        Some(attributes) => {
            if attributes.contains_key(DISPATCHER_NAME_ATTR)
                && attributes.contains_key(DISPATCHER_VERSION_ATTR)
            {
                Ok(Classification::Current { attributes })
            } else if attributes.contains_key(DISPATCHER_NAME_ATTR) {
                // name without version: neither current nor legacy
                Ok(Classification::Plaintext)
            } else {
                Ok(Classification::Legacy { attributes })
            }
        }
    }
}

/// Whether `value` classifies as any form of protected string
pub fn is_protected(value: &str) -> Result<bool> {
    Ok(!matches!(classify(value)?, Classification::Plaintext))
}

/// Frame `body` with shields, prefixing the attribute block.
///
/// Attribute output is deterministic: keys are emitted in sorted order.
pub fn encode(attributes: &BTreeMap<String, String>, body: &str) -> String {
    let attrs = attributes
        .iter()
        .map(|(k, v)| format!("{k}={v}"))
        .collect::<Vec<_>>()
        .join(",");
    format!("{SHIELD_BEGIN}{ATTR_BEGIN}{attrs}{ATTR_END}{body}{SHIELD_END}")
}

/// The payload between an attribute block (if any) and the closing shield
pub fn body(bare: &str) -> &str {
    match (bare.find(ATTR_BEGIN), bare.find(ATTR_END)) {
        (Some(start), Some(stop)) if stop > start => &bare[stop + ATTR_END.len_utf8()..],
        _ => bare,
    }
}

/// Strip the shield delimiters; callers must have checked the framing
pub fn unshield(value: &str) -> &str {
    &value[SHIELD_BEGIN.len_utf8()..value.len() - SHIELD_END.len_utf8()]
}

fn shield_framed(value: &str) -> bool {
    value.len() >= SHIELD_BEGIN.len_utf8() + SHIELD_END.len_utf8()
        && !value.trim().is_empty()
        && value.starts_with(SHIELD_BEGIN)
        && value.ends_with(SHIELD_END)
}

/// Parse the attribute block at the start of a bare (unshielded) value.
///
/// Returns `None` when the block is absent or empty. A block that does not
/// sit at the start of the value, or contains a token without `=`, is a
/// hard error.
pub fn parse_attributes(bare: &str) -> Result<Option<BTreeMap<String, String>>> {
    let (Some(start), Some(stop)) = (bare.find(ATTR_BEGIN), bare.find(ATTR_END)) else {
        return Ok(None);
    };
    if stop < start {
        return Ok(None);
    }
    if start != 0 {
        return Err(Error::format("attributes allowed as prefix only"));
    }
    let block = bare[start + ATTR_BEGIN.len_utf8()..stop].trim();
    if block.is_empty() {
        return Ok(None);
    }
    let mut attributes = BTreeMap::new();
    for pair in block.split(',') {
        let Some(pos) = pair.find('=') else {
            return Err(Error::format(format!("attribute malformed: {pair}")));
        };
        let key = pair[..pos].trim().to_string();
        let value = pair[pos + 1..].trim().to_string();
        attributes.insert(key, value);
    }
    Ok(Some(attributes))
}
