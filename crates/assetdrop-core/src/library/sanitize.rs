//! Filesystem-safe path components.

/// Characters illegal on at least one common filesystem.
const ILLEGAL: &[char] = &['/', '\\', '?', '%', '*', ':', '|', '"', '<', '>'];

/// Longest component we produce, in bytes (NAME_MAX on Linux, leaves room for an extension).
const COMPONENT_MAX: usize = 240;

/// Strips illegal and control characters, collapses whitespace runs (tabs and
/// newlines included) to one space, trims surrounding spaces and dots, and caps
/// the length. May return an empty string.
pub fn sanitize_component(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut prev_space = false;

    for c in name.chars() {
        if c.is_whitespace() {
            if !prev_space {
                out.push(' ');
            }
            prev_space = true;
        } else if ILLEGAL.contains(&c) || c.is_control() {
            continue;
        } else {
            out.push(c);
            prev_space = false;
        }
    }

    let trimmed = out.trim_matches(|c| c == ' ' || c == '.');

    if trimmed.len() > COMPONENT_MAX {
        let mut take = COMPONENT_MAX;
        while take > 0 && !trimmed.is_char_boundary(take) {
            take -= 1;
        }
        trimmed[..take].trim_end_matches([' ', '.']).to_string()
    } else {
        trimmed.to_string()
    }
}
