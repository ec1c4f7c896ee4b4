//! Parsing of flat preprocessor define lists.

use std::fmt;

/// Value assigned to a define that is listed without `=VALUE`.
pub const IMPLICIT_DEFINE_VALUE: &str = "1";

/// A single `NAME=VALUE` macro definition handed to the preprocessor engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroDefine {
    pub name: String,
    pub value: String,
}

impl MacroDefine {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

impl fmt::Display for MacroDefine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.name, self.value)
    }
}

/// Parse a define list such as `"USE_FOG,LIGHTS=4;GAMMA=2.2"`.
///
/// Pairs are separated by `,` or `;`. A name without `=` gets the value `1`.
/// Whitespace around names and values is trimmed and entries with an empty
/// name are skipped. Order is preserved and duplicate names are not merged,
/// the engine applies its own shadowing when it receives them.
pub fn parse_defines(defines: &str) -> Vec<MacroDefine> {
    defines
        .split([',', ';'])
        .filter_map(|entry| {
            let (name, value) = match entry.split_once('=') {
                Some((name, value)) => (name.trim(), value.trim()),
                None => (entry.trim(), IMPLICIT_DEFINE_VALUE),
            };
            if name.is_empty() {
                return None;
            }
            Some(MacroDefine::new(name, value))
        })
        .collect()
}
