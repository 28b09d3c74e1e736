//! ToUnicode CMap parsing (`bfchar` / `bfrange` sections only).

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

pub type ToUnicode = HashMap<u32, String>;

static BFCHAR_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
static BFRANGE_REGEX: OnceLock<Option<Regex>> = OnceLock::new();
static HEX_REGEX: OnceLock<Option<Regex>> = OnceLock::new();

fn bfchar_regex() -> Option<&'static Regex> {
    BFCHAR_REGEX
        .get_or_init(|| Regex::new(r"<([0-9A-Fa-f]+)>\s*<([0-9A-Fa-f]+)>").ok())
        .as_ref()
}

fn bfrange_regex() -> Option<&'static Regex> {
    BFRANGE_REGEX
        .get_or_init(|| {
            Regex::new(r"<([0-9A-Fa-f]+)>\s*<([0-9A-Fa-f]+)>\s*(?:<([0-9A-Fa-f]+)>|\[([^\]]*)\])")
                .ok()
        })
        .as_ref()
}

fn hex_regex() -> Option<&'static Regex> {
    HEX_REGEX
        .get_or_init(|| Regex::new(r"<([0-9A-Fa-f]+)>").ok())
        .as_ref()
}

pub fn parse_to_unicode(data: &[u8]) -> ToUnicode {
    let content = String::from_utf8_lossy(data);
    let mut map = ToUnicode::new();

    if let Some(re) = bfchar_regex() {
        for section in sections(&content, "beginbfchar", "endbfchar") {
            for caps in re.captures_iter(section) {
                let Ok(src) = u32::from_str_radix(&caps[1], 16) else {
                    continue;
                };
                if let Some(dst) = decode_utf16_hex(&caps[2]) {
                    map.insert(src, dst);
                }
            }
        }
    }

    if let (Some(re), Some(hex_re)) = (bfrange_regex(), hex_regex()) {
        for section in sections(&content, "beginbfrange", "endbfrange") {
            for caps in re.captures_iter(section) {
                let (Ok(start), Ok(end)) = (
                    u32::from_str_radix(&caps[1], 16),
                    u32::from_str_radix(&caps[2], 16),
                ) else {
                    continue;
                };
                if end < start || end - start > 0xFFFF {
                    continue;
                }

                if let Some(dst) = caps.get(3) {
                    let Ok(base) = u32::from_str_radix(dst.as_str(), 16) else {
                        continue;
                    };
                    for (offset, code) in (start..=end).enumerate() {
                        if let Some(ch) = char::from_u32(base + offset as u32) {
                            map.insert(code, ch.to_string());
                        }
                    }
                } else if let Some(array) = caps.get(4) {
                    let targets = hex_re
                        .captures_iter(array.as_str())
                        .filter_map(|c| decode_utf16_hex(&c[1]));
                    for (code, dst) in (start..=end).zip(targets) {
                        map.insert(code, dst);
                    }
                }
            }
        }
    }

    map
}

fn sections<'a>(content: &'a str, begin: &str, end: &str) -> Vec<&'a str> {
    let mut out = Vec::new();
    let mut remaining = content;
    while let Some(begin_pos) = remaining.find(begin) {
        let after = &remaining[begin_pos + begin.len()..];
        let Some(end_pos) = after.find(end) else {
            break;
        };
        out.push(&after[..end_pos]);
        remaining = &after[end_pos + end.len()..];
    }
    out
}

/// Destination strings are UTF-16BE, so surrogate pairs and ligatures both work here.
fn decode_utf16_hex(hex: &str) -> Option<String> {
    if hex.len() % 4 != 0 {
        let code = u32::from_str_radix(hex, 16).ok()?;
        return char::from_u32(code).map(String::from);
    }
    let units: Vec<u16> = (0..hex.len())
        .step_by(4)
        .filter_map(|i| u16::from_str_radix(&hex[i..i + 4], 16).ok())
        .collect();
    let decoded = String::from_utf16(&units).ok()?;
    (!decoded.is_empty()).then_some(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_bfchar_and_bfrange_sections() {
        let data = b"begincmap\n2 beginbfchar\n<0003> <0020>\n<0011> <00660069>\nendbfchar\n\
                     1 beginbfrange\n<0024> <0026> <0041>\nendbfrange\n\
                     1 beginbfrange\n<0030> <0031> [<00E9> <00E8>]\nendbfrange\nendcmap";
        let map = parse_to_unicode(data);
        assert_eq!(map.get(&0x03).map(String::as_str), Some(" "));
        assert_eq!(map.get(&0x11).map(String::as_str), Some("fi"));
        assert_eq!(map.get(&0x25).map(String::as_str), Some("B"));
        assert_eq!(map.get(&0x31).map(String::as_str), Some("è"));
    }

    #[test]
    fn ignores_input_without_sections() {
        assert!(parse_to_unicode(b"/CIDInit /ProcSet findresource").is_empty());
    }
}
