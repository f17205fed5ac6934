//! Key names accepted by macros and their HID codes.
//!
//! Codes follow the Arduino `Keyboard` library: modifiers at `0x80..=0x87`,
//! navigation and function keys above `0xB0`, printable characters as ASCII.

pub const LEFT_CTRL: u8 = 0x80;
pub const LEFT_SHIFT: u8 = 0x81;
pub const LEFT_ALT: u8 = 0x82;
pub const LEFT_GUI: u8 = 0x83;
pub const RIGHT_CTRL: u8 = 0x84;
pub const RIGHT_SHIFT: u8 = 0x85;
pub const RIGHT_ALT: u8 = 0x86;
pub const RIGHT_GUI: u8 = 0x87;

pub const UP_ARROW: u8 = 0xDA;
pub const DOWN_ARROW: u8 = 0xD9;
pub const LEFT_ARROW: u8 = 0xD8;
pub const RIGHT_ARROW: u8 = 0xD7;
pub const BACKSPACE: u8 = 0xB2;
pub const TAB: u8 = 0xB3;
pub const RETURN: u8 = 0xB0;
pub const ESC: u8 = 0xB1;
pub const INSERT: u8 = 0xD1;
pub const DELETE: u8 = 0xD4;
pub const PAGE_UP: u8 = 0xD3;
pub const PAGE_DOWN: u8 = 0xD6;
pub const HOME: u8 = 0xD2;
pub const END: u8 = 0xD5;
pub const CAPS_LOCK: u8 = 0xC1;
pub const PRINT_SCREEN: u8 = 0xCE;
pub const SCROLL_LOCK: u8 = 0xCF;
pub const PAUSE: u8 = 0xD0;
pub const NUM_LOCK: u8 = 0xDB;
pub const SPACE: u8 = b' ';

/// `F1`; `F2`..`F12` follow consecutively.
pub const F1: u8 = 0xC2;

/// Upper-case names and aliases. The first entry for a code is its display name.
const NAMED_KEYS: &[(&str, u8)] = &[
    ("LEFT_CTRL", LEFT_CTRL),
    ("CTRL", LEFT_CTRL),
    ("CONTROL", LEFT_CTRL),
    ("LCTRL", LEFT_CTRL),
    ("RIGHT_CTRL", RIGHT_CTRL),
    ("RCTRL", RIGHT_CTRL),
    ("LEFT_SHIFT", LEFT_SHIFT),
    ("SHIFT", LEFT_SHIFT),
    ("LSHIFT", LEFT_SHIFT),
    ("RIGHT_SHIFT", RIGHT_SHIFT),
    ("RSHIFT", RIGHT_SHIFT),
    ("LEFT_ALT", LEFT_ALT),
    ("ALT", LEFT_ALT),
    ("LALT", LEFT_ALT),
    ("RIGHT_ALT", RIGHT_ALT),
    ("RALT", RIGHT_ALT),
    ("LEFT_GUI", LEFT_GUI),
    ("GUI", LEFT_GUI),
    ("WIN", LEFT_GUI),
    ("WINDOWS", LEFT_GUI),
    ("CMD", LEFT_GUI),
    ("COMMAND", LEFT_GUI),
    ("META", LEFT_GUI),
    ("RIGHT_GUI", RIGHT_GUI),
    ("ENTER", RETURN),
    ("RETURN", RETURN),
    ("ESC", ESC),
    ("ESCAPE", ESC),
    ("TAB", TAB),
    ("BACKSPACE", BACKSPACE),
    ("SPACE", SPACE),
    ("SPACEBAR", SPACE),
    ("UP", UP_ARROW),
    ("DOWN", DOWN_ARROW),
    ("LEFT", LEFT_ARROW),
    ("RIGHT", RIGHT_ARROW),
    ("INSERT", INSERT),
    ("INS", INSERT),
    ("DELETE", DELETE),
    ("DEL", DELETE),
    ("HOME", HOME),
    ("END", END),
    ("PAGEUP", PAGE_UP),
    ("PGUP", PAGE_UP),
    ("PAGEDOWN", PAGE_DOWN),
    ("PGDN", PAGE_DOWN),
    ("CAPSLOCK", CAPS_LOCK),
    ("PRINTSCREEN", PRINT_SCREEN),
    ("PRTSC", PRINT_SCREEN),
    ("SCROLLLOCK", SCROLL_LOCK),
    ("PAUSE", PAUSE),
    ("NUMLOCK", NUM_LOCK),
];

/// Resolve a key name to its code.
///
/// A single ASCII character maps to itself (case preserved). Longer names are
/// matched case-insensitively against the symbolic table, then as `F1`-`F12`.
#[must_use]
pub fn resolve_key(name: &str) -> Option<u8> {
    let name = name.trim();
    match name.as_bytes() {
        [] => None,
        [byte] => Some(*byte),
        _ => {
            let upper = name.to_ascii_uppercase();
            NAMED_KEYS
                .iter()
                .find(|(alias, _)| *alias == upper)
                .map(|(_, code)| *code)
                .or_else(|| function_key(&upper))
        }
    }
}

fn function_key(upper: &str) -> Option<u8> {
    let digits = upper.strip_prefix('F')?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    match digits.parse::<u8>().ok()? {
        n @ 1..=12 => Some(F1 + (n - 1)),
        _ => None,
    }
}

/// Display name for a non-character code, if it has one.
#[must_use]
pub fn key_name(code: u8) -> Option<&'static str> {
    const FUNCTION_NAMES: [&str; 12] = [
        "F1", "F2", "F3", "F4", "F5", "F6", "F7", "F8", "F9", "F10", "F11", "F12",
    ];
    if (F1..F1 + 12).contains(&code) {
        return Some(FUNCTION_NAMES[usize::from(code - F1)]);
    }
    NAMED_KEYS
        .iter()
        .find(|(_, named)| *named == code)
        .map(|(alias, _)| *alias)
}

/// Split a `+`/`,` separated key list, dropping empty parts.
pub fn split_keys(value: &str) -> impl Iterator<Item = &str> {
    value
        .split(['+', ','])
        .map(str::trim)
        .filter(|part| !part.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_characters() {
        assert_eq!(resolve_key("c"), Some(b'c'));
        assert_eq!(resolve_key("C"), Some(b'C'));
        assert_eq!(resolve_key(" 7 "), Some(b'7'));
        assert_eq!(resolve_key(""), None);
    }

    #[test]
    fn test_symbolic_names_case_insensitive() {
        assert_eq!(resolve_key("ctrl"), Some(LEFT_CTRL));
        assert_eq!(resolve_key("Cmd"), Some(LEFT_GUI));
        assert_eq!(resolve_key("PgDn"), Some(PAGE_DOWN));
        assert_eq!(resolve_key("enter"), Some(RETURN));
        assert_eq!(resolve_key("spacebar"), Some(b' '));
        assert_eq!(resolve_key("hyper"), None);
    }

    #[test]
    fn test_function_keys() {
        assert_eq!(resolve_key("F1"), Some(0xC2));
        assert_eq!(resolve_key("f12"), Some(0xCD));
        assert_eq!(resolve_key("F13"), None);
        assert_eq!(resolve_key("F0"), None);
        assert_eq!(resolve_key("Fx"), None);
    }

    #[test]
    fn test_key_names() {
        assert_eq!(key_name(LEFT_CTRL), Some("LEFT_CTRL"));
        assert_eq!(key_name(0xC6), Some("F5"));
        assert_eq!(key_name(RETURN), Some("ENTER"));
        assert_eq!(key_name(b'a'), None);
    }

    #[test]
    fn test_split_keys() {
        let keys: Vec<_> = split_keys("CTRL + SHIFT,,T+").collect();
        assert_eq!(keys, vec!["CTRL", "SHIFT", "T"]);
    }
}
