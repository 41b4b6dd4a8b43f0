//! Identifier sanitization shared by schema synthesis and request building.
//!
//! Both sides must agree byte-for-byte: an action synthesized from a tool
//! name has to be found again when a tool call arrives under that name.

/// Replace spaces and dashes with underscores.
///
/// `"my-special tool"` becomes `"my_special_tool"`. All other characters
/// pass through untouched.
pub fn sanitize_identifier(name: &str) -> String {
    name.chars()
        .map(|c| if c == ' ' || c == '-' { '_' } else { c })
        .collect()
}
