//! Approximate text measurement and greedy line wrapping
//!
//! There is no font shaping here. Widths come from a fixed per-token model:
//! a CJK character is one em wide, Latin letters and digits 0.6 em each,
//! whitespace 0.3 em per character, and any other symbol 0.6 em.

/// Line height as a multiple of the font size
pub const LINE_HEIGHT_RATIO: f64 = 1.25;

const LATIN_RATIO: f64 = 0.6;
const SPACE_RATIO: f64 = 0.3;

/// Characters that must not start a wrapped line
const PUNCTUATION: &str = "，。、“”‘’：《》＜＞<>（）()；;:,.!?！？";
const OPERATORS: &str = "+-*/=^%";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TokenKind {
    Cjk,
    Word,
    Space,
    Symbol,
}

#[derive(Clone, Copy, Debug)]
struct Token<'a> {
    text: &'a str,
    kind: TokenKind,
}

impl Token<'_> {
    fn width(&self, font_size: f64) -> f64 {
        let chars = self.text.chars().count() as f64;
        match self.kind {
            TokenKind::Space => font_size * SPACE_RATIO * chars,
            TokenKind::Word => font_size * LATIN_RATIO * chars,
            TokenKind::Cjk => font_size,
            TokenKind::Symbol => font_size * LATIN_RATIO,
        }
    }

    fn is_punctuation(&self) -> bool {
        self.text
            .chars()
            .any(|c| PUNCTUATION.contains(c) || OPERATORS.contains(c))
    }
}

pub(crate) fn is_cjk(c: char) -> bool {
    matches!(c, '\u{4e00}'..='\u{9fa5}' | '\u{3000}'..='\u{303f}' | '\u{ff00}'..='\u{ffef}')
}

/// Split into CJK characters, ASCII alphanumeric runs, whitespace runs and
/// single symbols. Concatenating the tokens gives back the input.
fn tokenize(text: &str) -> Vec<Token<'_>> {
    let mut tokens = Vec::new();
    let mut iter = text.char_indices().peekable();

    while let Some((start, c)) = iter.next() {
        let kind = if is_cjk(c) {
            TokenKind::Cjk
        } else if c.is_ascii_alphanumeric() {
            TokenKind::Word
        } else if c.is_whitespace() {
            TokenKind::Space
        } else {
            TokenKind::Symbol
        };

        let mut end = start + c.len_utf8();
        let continues: fn(char) -> bool = match kind {
            TokenKind::Word => |n| n.is_ascii_alphanumeric(),
            TokenKind::Space => char::is_whitespace,
            _ => |_| false,
        };
        while let Some(&(idx, next)) = iter.peek() {
            if !continues(next) {
                break;
            }
            end = idx + next.len_utf8();
            iter.next();
        }

        // U+3000 is matched as CJK above but measured like any other space
        let kind = if kind == TokenKind::Cjk && c.is_whitespace() {
            TokenKind::Space
        } else {
            kind
        };
        tokens.push(Token { text: &text[start..end], kind });
    }

    tokens
}

/// Wrap `text` into lines no wider than `max_width` under the width model
///
/// A line never starts with whitespace. Punctuation that would start a
/// wrapped line hangs off the end of the previous one instead, so such a line
/// may run past `max_width` by that one symbol. A token wider than
/// `max_width` gets a line to itself. Explicit newlines stay inside the
/// whitespace they belong to and do not break lines.
pub fn wrap(text: &str, max_width: f64, font_size: f64) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    let mut current = String::new();
    let mut current_width = 0.0;

    for token in tokenize(text) {
        let width = token.width(font_size);
        if current_width + width > max_width && current_width > 0.0 {
            lines.push(std::mem::take(&mut current));
            current_width = 0.0;
        }

        if current_width == 0.0 {
            if token.kind == TokenKind::Space {
                continue;
            }
            if token.is_punctuation()
                && let Some(previous) = lines.last_mut()
            {
                previous.push_str(token.text);
                continue;
            }
        }

        current.push_str(token.text);
        current_width += width;
    }

    if !current.is_empty() {
        lines.push(current);
    }
    lines
}

/// Height of the block holding `text`
///
/// Each explicit `\n` adds one line on top of the wrapped line count, even
/// though newlines never split wrapped lines. Existing boxes were sized this
/// way, so the extra height is kept.
pub fn measure_height(text: &str, max_width: f64, font_size: f64) -> f64 {
    TextFlow::new(max_width, font_size).measure_height(text)
}

/// Wrapping parameters for one block of text
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TextFlow {
    pub max_width: f64,
    pub font_size: f64,
    pub line_height_ratio: f64,
}

impl TextFlow {
    pub fn new(max_width: f64, font_size: f64) -> Self {
        Self {
            max_width,
            font_size,
            line_height_ratio: LINE_HEIGHT_RATIO,
        }
    }

    pub fn with_line_height(mut self, ratio: f64) -> Self {
        self.line_height_ratio = ratio;
        self
    }

    pub fn wrap(&self, text: &str) -> Vec<String> {
        wrap(text, self.max_width, self.font_size)
    }

    pub fn line_height(&self) -> f64 {
        self.font_size * self.line_height_ratio
    }

    /// Height for already wrapped `lines` of `text`
    pub fn height_of(&self, text: &str, lines: &[String]) -> f64 {
        let newlines = text.matches('\n').count();
        (lines.len() + newlines) as f64 * self.line_height()
    }

    pub fn measure_height(&self, text: &str) -> f64 {
        self.height_of(text, &self.wrap(text))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line_width(line: &str, font_size: f64) -> f64 {
        tokenize(line).iter().map(|t| t.width(font_size)).sum()
    }

    #[test]
    fn test_tokenize_keeps_every_character() {
        let text = "重点 abc12,  x\n中";
        let tokens = tokenize(text);
        let joined: String = tokens.iter().map(|t| t.text).collect();
        assert_eq!(joined, text);
        let texts: Vec<&str> = tokens.iter().map(|t| t.text).collect();
        assert_eq!(texts, ["重", "点", " ", "abc12", ",", "  ", "x", "\n", "中"]);
    }

    #[test]
    fn test_token_widths() {
        let tokens = tokenize("中ab  +");
        let widths: Vec<f64> = tokens.iter().map(|t| t.width(20.0)).collect();
        assert_eq!(widths, [20.0, 24.0, 12.0, 12.0]);
    }

    #[test]
    fn test_ideographic_space_measured_as_space() {
        let tokens = tokenize("\u{3000}");
        assert_eq!(tokens[0].kind, TokenKind::Space);
        assert_eq!(tokens[0].width(20.0), 6.0);
    }

    #[test]
    fn test_empty_and_blank_text_wrap_to_nothing() {
        assert!(wrap("", 100.0, 20.0).is_empty());
        assert!(wrap("   \t ", 100.0, 20.0).is_empty());
        assert!(wrap("\n\n", 100.0, 20.0).is_empty());
    }

    #[test]
    fn test_lines_fit_width_budget() {
        let lines = wrap("重点问题A B C", 100.0, 20.0);
        assert_eq!(lines, ["重点问题A ", "B C"]);
        for line in &lines {
            assert!(line_width(line, 20.0) <= 100.0, "{line:?} too wide");
        }
    }

    #[test]
    fn test_no_leading_whitespace() {
        assert_eq!(wrap("   ab", 100.0, 20.0), ["ab"]);
        // The space overflows the first line and is dropped from the second
        assert_eq!(wrap("aaaa bbbb", 50.0, 20.0), ["aaaa", "bbbb"]);
    }

    #[test]
    fn test_punctuation_joins_previous_line() {
        // Five CJK characters fill the line exactly, the comma would start the next one
        let lines = wrap("一二三四五，六", 100.0, 20.0);
        assert_eq!(lines, ["一二三四五，", "六"]);
    }

    #[test]
    fn test_operator_joins_previous_line() {
        let lines = wrap("12345678+1", 96.0, 20.0);
        assert_eq!(lines, ["12345678+", "1"]);
    }

    #[test]
    fn test_leading_punctuation_without_previous_line_stays() {
        assert_eq!(wrap("，好", 100.0, 20.0), ["，好"]);
    }

    #[test]
    fn test_oversized_token_gets_own_line() {
        let lines = wrap("ab abcdefghijklmnop cd", 60.0, 20.0);
        assert_eq!(lines, ["ab ", "abcdefghijklmnop", "cd"]);
    }

    #[test]
    fn test_height_without_newlines_is_line_count() {
        let text = "这是一段比较长的批改分析文字，需要换行显示";
        let lines = wrap(text, 100.0, 20.0);
        assert_eq!(measure_height(text, 100.0, 20.0), lines.len() as f64 * 20.0 * 1.25);
    }

    #[test]
    fn test_explicit_newlines_add_extra_height() {
        // Newlines do not split wrapped lines but still count towards the height
        let text = "ab\ncd";
        assert_eq!(wrap(text, 400.0, 20.0), ["ab\ncd"]);
        assert_eq!(measure_height(text, 400.0, 20.0), 2.0 * 25.0);
    }

    #[test]
    fn test_custom_line_height() {
        let flow = TextFlow::new(400.0, 10.0).with_line_height(2.0);
        assert_eq!(flow.measure_height("x"), 20.0);
    }
}
