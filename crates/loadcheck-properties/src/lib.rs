//! A small parser and writer for the `key=value` line format used by dictionary index files.
//!
//! The format follows the Java `.properties` conventions closely enough that index files can
//! be edited by hand or produced by other tools: `#`/`!` comments, `=`, `:` or whitespace
//! separators, backslash escapes and line continuations.

use std::collections::HashMap;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PropertyEntry {
    pub key: String,
    pub value: String,
    /// 1-based line on which the entry starts.
    pub line: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PropertiesFile {
    pub entries: Vec<PropertyEntry>,
}

impl PropertiesFile {
    #[must_use]
    pub fn by_key<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a PropertyEntry> + 'a {
        self.entries.iter().filter(move |e| e.key == key)
    }

    /// Value of the last entry for `key`; later entries override earlier ones.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries
            .iter()
            .rev()
            .find(|e| e.key == key)
            .map(|e| e.value.as_str())
    }

    /// Entries that are overridden by a later entry with the same key.
    #[must_use]
    pub fn shadowed(&self) -> Vec<&PropertyEntry> {
        let mut last_line: HashMap<&str, usize> = HashMap::new();
        for entry in &self.entries {
            last_line.insert(entry.key.as_str(), entry.line);
        }
        self.entries
            .iter()
            .filter(|e| last_line.get(e.key.as_str()).is_some_and(|&line| line != e.line))
            .collect()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Collapse into a lookup map with last-wins semantics.
    #[must_use]
    pub fn into_map(self) -> HashMap<String, String> {
        self.entries.into_iter().map(|e| (e.key, e.value)).collect()
    }
}

#[derive(Clone, Debug)]
struct LogicalLine {
    chars: Vec<char>,
    line: usize,
}

/// Parse index file text into key/value entries.
#[must_use]
pub fn parse(text: &str) -> PropertiesFile {
    let chars: Vec<char> = text.chars().collect();
    let mut offset = 0usize;
    let mut line = 1usize;
    let mut entries = Vec::new();

    while offset < chars.len() {
        let start = offset;
        let logical = read_logical_line(&chars, &mut offset, &mut line);
        if let Some((key, value)) = parse_logical_line(&logical.chars) {
            entries.push(PropertyEntry {
                key,
                value,
                line: logical.line,
            });
        }

        // Ensure we always make progress even on pathological inputs.
        if offset == start {
            offset += 1;
        }
    }

    PropertiesFile { entries }
}

fn read_logical_line(chars: &[char], offset: &mut usize, line: &mut usize) -> LogicalLine {
    let mut out = Vec::new();
    let start_line = *line;
    let mut first_segment = true;

    loop {
        let segment_start = *offset;
        let mut line_end = segment_start;
        while line_end < chars.len() && chars[line_end] != '\n' {
            line_end += 1;
        }

        let mut content_end = line_end;
        if content_end > segment_start && chars[content_end - 1] == '\r' {
            content_end -= 1;
        }
        let segment = &chars[segment_start..content_end];

        // Comments never continue onto the next line.
        let is_comment = first_segment
            && segment
                .iter()
                .find(|c| !is_whitespace(**c))
                .is_some_and(|c| *c == '#' || *c == '!');
        let continues = !is_comment && ends_with_unescaped_backslash(segment);
        let copy_end = if continues {
            segment.len() - 1
        } else {
            segment.len()
        };
        out.extend_from_slice(&segment[..copy_end]);

        if line_end < chars.len() {
            *offset = line_end + 1;
            *line += 1;
        } else {
            *offset = line_end;
        }
        first_segment = false;

        if !continues || *offset >= chars.len() {
            break;
        }

        // Continuation: skip leading whitespace on the next physical line.
        while *offset < chars.len() && is_whitespace(chars[*offset]) {
            *offset += 1;
        }
    }

    LogicalLine {
        chars: out,
        line: start_line,
    }
}

fn ends_with_unescaped_backslash(segment: &[char]) -> bool {
    let backslashes = segment.iter().rev().take_while(|c| **c == '\\').count();
    backslashes % 2 == 1
}

fn parse_logical_line(line: &[char]) -> Option<(String, String)> {
    let mut i = 0usize;
    while i < line.len() && is_whitespace(line[i]) {
        i += 1;
    }

    if i >= line.len() || line[i] == '#' || line[i] == '!' {
        return None;
    }

    let key_start = i;
    while i < line.len() {
        match line[i] {
            '\\' => i += 2,
            '=' | ':' => break,
            c if is_whitespace(c) => break,
            _ => i += 1,
        }
    }
    let key_end = i.min(line.len());
    i = key_end;

    while i < line.len() && is_whitespace(line[i]) {
        i += 1;
    }

    // Optional `:` / `=`.
    if i < line.len() && (line[i] == '=' || line[i] == ':') {
        i += 1;
    }

    while i < line.len() && is_whitespace(line[i]) {
        i += 1;
    }

    let key = unescape(&line[key_start..key_end]);
    let value = unescape(&line[i..]);
    Some((key, value))
}

fn is_whitespace(c: char) -> bool {
    matches!(c, ' ' | '\t' | '\x0C')
}

fn unescape(chars: &[char]) -> String {
    let mut out = String::with_capacity(chars.len());
    let mut i = 0usize;

    while i < chars.len() {
        let c = chars[i];
        if c != '\\' {
            out.push(c);
            i += 1;
            continue;
        }

        i += 1;
        let Some(&escaped) = chars.get(i) else {
            // A lone trailing backslash is dropped.
            break;
        };

        match escaped {
            't' => out.push('\t'),
            'n' => out.push('\n'),
            'r' => out.push('\r'),
            'f' => out.push('\x0C'),
            'u' => match read_unicode_escape(chars, i) {
                Some((ch, consumed)) => {
                    out.push(ch);
                    i += consumed;
                }
                None => out.push('u'),
            },
            other => out.push(other),
        }
        i += 1;
    }

    out
}

/// Decode `\uXXXX` (and a following low surrogate escape, if any) starting at the `u` in
/// `chars[at]`. Returns the decoded char and how many chars after the `u` were consumed.
fn read_unicode_escape(chars: &[char], at: usize) -> Option<(char, usize)> {
    let high = hex4(chars.get(at + 1..at + 5)?)?;
    if !(0xD800..0xDC00).contains(&high) {
        return char::from_u32(high).map(|ch| (ch, 4));
    }

    let next = chars.get(at + 5..at + 11)?;
    if next[0] != '\\' || next[1] != 'u' {
        return None;
    }
    let low = hex4(&next[2..])?;
    if !(0xDC00..0xE000).contains(&low) {
        return None;
    }
    let combined = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
    char::from_u32(combined).map(|ch| (ch, 10))
}

fn hex4(chars: &[char]) -> Option<u32> {
    chars
        .iter()
        .try_fold(0u32, |acc, c| Some((acc << 4) | c.to_digit(16)?))
}

/// Escape arbitrary text so that it parses back as exactly one key.
///
/// `=` and `:` always need escaping since they separate key from value. Whitespace, line
/// breaks, backslashes and the comment markers `#`/`!` are escaped as well so that any payload
/// text survives a round trip.
#[must_use]
pub fn escape_key(key: &str) -> String {
    escape(key, true)
}

/// Escape a value for writing. Only a leading space needs protecting since the parser trims
/// whitespace after the separator.
#[must_use]
pub fn escape_value(value: &str) -> String {
    escape(value, false)
}

fn escape(text: &str, is_key: bool) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 8);
    for (idx, c) in text.chars().enumerate() {
        match c {
            ' ' if is_key || idx == 0 => out.push_str("\\ "),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\x0C' => out.push_str("\\f"),
            '\\' => out.push_str("\\\\"),
            '=' | ':' | '#' | '!' => {
                out.push('\\');
                out.push(c);
            }
            _ => out.push(c),
        }
    }
    out
}

/// Render one `key=value` line, including the trailing newline.
#[must_use]
pub fn format_entry(key: &str, value: &str) -> String {
    format!("{}={}\n", escape_key(key), escape_value(value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_basic_entries_with_line_numbers() {
        let text = "# comment\nping=3446776\n\nhello world = 12:34\n";
        let parsed = parse(text);
        assert_eq!(
            parsed.entries,
            vec![
                PropertyEntry {
                    key: "ping".into(),
                    value: "3446776".into(),
                    line: 2,
                },
                PropertyEntry {
                    key: "hello".into(),
                    value: "world = 12:34".into(),
                    line: 4,
                },
            ]
        );
    }

    #[test]
    fn supports_line_continuations_and_unicode_escapes() {
        let text = "greeting=hello\\\n  world\nunicode=\\u0041\\uD83D\\uDE00\nlast=1";
        let parsed = parse(text);
        assert_eq!(parsed.len(), 3);
        assert_eq!(parsed.get("greeting"), Some("helloworld"));
        assert_eq!(parsed.get("unicode"), Some("A\u{1F600}"));
        assert_eq!(parsed.entries[2].line, 4);
    }

    #[test]
    fn comment_lines_do_not_continue() {
        let parsed = parse("# trailing \\\nkey=value\n");
        assert_eq!(parsed.get("key"), Some("value"));
    }

    #[test]
    fn handles_crlf_and_non_ascii() {
        let parsed = parse("grüße=1\r\nключ=2\r\n");
        assert_eq!(parsed.get("grüße"), Some("1"));
        assert_eq!(parsed.get("ключ"), Some("2"));
    }

    #[test]
    fn escaped_separators_stay_in_the_key() {
        let parsed = parse("a\\=b\\:c=42\n");
        assert_eq!(parsed.get("a=b:c"), Some("42"));
    }

    #[test]
    fn escape_key_round_trips_awkward_text() {
        let keys = [
            "",
            "plain",
            "a=b:c",
            " leading and trailing ",
            "#not a comment",
            "!bang",
            "multi\nline\r\ntext\twith\x0Cfeeds",
            "back\\slash\\",
            "{\"json\": [1, 2, 3]}",
            "ünïcødé ✓",
        ];
        for key in keys {
            let text = format_entry(key, "-1220935264");
            let parsed = parse(&text);
            assert_eq!(parsed.len(), 1, "{text:?}");
            assert_eq!(parsed.entries[0].key, key, "{text:?}");
            assert_eq!(parsed.entries[0].value, "-1220935264");
        }
    }

    #[test]
    fn escape_key_only_touches_reserved_characters() {
        assert_eq!(escape_key("ping"), "ping");
        assert_eq!(escape_key("a=b:c"), "a\\=b\\:c");
        assert_eq!(escape_value(" x y"), "\\ x y");
    }

    #[test]
    fn later_entries_shadow_earlier_ones() {
        let parsed = parse("k=1\nother=2\nk=3\n");
        assert_eq!(parsed.get("k"), Some("3"));
        let shadowed: Vec<usize> = parsed.shadowed().iter().map(|e| e.line).collect();
        assert_eq!(shadowed, vec![1]);
        assert_eq!(parsed.by_key("k").count(), 2);
        assert_eq!(parsed.into_map().get("k").map(String::as_str), Some("3"));
    }
}
