//! Line wrapping by measured glyph width.
//!
//! Text is split into units before wrapping: every CJK ideograph, kana or
//! full-width symbol is its own unit, while runs of other non-space
//! characters (Latin words, Hangul words, numbers) stay together. Lines
//! only break between units, except when a single unit is wider than the
//! whole line, in which case it is broken by character.

/// Measures rendered text width in pixels.
pub trait TextMeasure {
    fn text_width(&self, text: &str, size: f32) -> f32;
}

/// Whether `ch` may be broken before and after (CJK-style).
fn is_break_anywhere(ch: char) -> bool {
    matches!(ch as u32,
        0x3000..=0x303F   // CJK punctuation
        | 0x3040..=0x30FF // hiragana, katakana
        | 0x31F0..=0x31FF
        | 0x3400..=0x4DBF
        | 0x4E00..=0x9FFF
        | 0xF900..=0xFAFF
        | 0xFF00..=0xFFEF // full-width forms
    )
}

#[derive(Debug, PartialEq)]
enum Unit<'a> {
    Space,
    Text(&'a str),
}

fn units(text: &str) -> Vec<Unit<'_>> {
    let mut out = Vec::new();
    let mut word_start: Option<usize> = None;

    for (i, ch) in text.char_indices() {
        if ch.is_whitespace() || is_break_anywhere(ch) {
            if let Some(start) = word_start.take() {
                out.push(Unit::Text(&text[start..i]));
            }
            if ch.is_whitespace() {
                if out.last() != Some(&Unit::Space) {
                    out.push(Unit::Space);
                }
            } else {
                out.push(Unit::Text(&text[i..i + ch.len_utf8()]));
            }
        } else if word_start.is_none() {
            word_start = Some(i);
        }
    }
    if let Some(start) = word_start {
        out.push(Unit::Text(&text[start..]));
    }
    out
}

/// Wrap `text` to lines no wider than `max_width` at `size`.
///
/// Explicit newlines start a new paragraph. Leading and trailing spaces
/// are dropped from every line. Empty input yields no lines.
pub fn wrap_text(measure: &dyn TextMeasure, text: &str, size: f32, max_width: f32) -> Vec<String> {
    let mut lines = Vec::new();
    for paragraph in text.split('\n') {
        wrap_paragraph(measure, paragraph, size, max_width, &mut lines);
    }
    lines
}

fn wrap_paragraph(
    measure: &dyn TextMeasure,
    paragraph: &str,
    size: f32,
    max_width: f32,
    lines: &mut Vec<String>,
) {
    let fits = |s: &str| measure.text_width(s, size) <= max_width;
    let mut current = String::new();
    let mut pending_space = false;

    for unit in units(paragraph) {
        let word = match unit {
            Unit::Space => {
                pending_space = !current.is_empty();
                continue;
            }
            Unit::Text(word) => word,
        };

        let candidate = if pending_space {
            format!("{} {}", current, word)
        } else {
            format!("{}{}", current, word)
        };
        pending_space = false;

        if fits(&candidate) {
            current = candidate;
            continue;
        }

        if !current.is_empty() {
            lines.push(std::mem::take(&mut current));
        }

        if fits(word) {
            current.push_str(word);
        } else {
            // Wider than a whole line: break by character
            for ch in word.chars() {
                let mut next = current.clone();
                next.push(ch);
                if !current.is_empty() && !fits(&next) {
                    lines.push(std::mem::take(&mut current));
                    current.push(ch);
                } else {
                    current = next;
                }
            }
        }
    }

    if !current.is_empty() {
        lines.push(current);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Every character is `size` pixels wide.
    struct Monospace;

    impl TextMeasure for Monospace {
        fn text_width(&self, text: &str, size: f32) -> f32 {
            text.chars().count() as f32 * size
        }
    }

    fn wrap(text: &str, chars_per_line: usize) -> Vec<String> {
        wrap_text(&Monospace, text, 10.0, chars_per_line as f32 * 10.0)
    }

    #[test]
    fn japanese_breaks_between_characters() {
        assert_eq!(
            wrap("お世話になっております", 4),
            vec!["お世話に", "なってお", "ります"]
        );
    }

    #[test]
    fn words_are_never_split_when_they_fit() {
        let lines = wrap("check in tomorrow please", 10);
        assert_eq!(lines, vec!["check in", "tomorrow", "please"]);
    }

    #[test]
    fn korean_words_stay_whole() {
        let lines = wrap("예약 변경을 부탁드립니다", 7);
        assert_eq!(lines, vec!["예약 변경을", "부탁드립니다"]);
    }

    #[test]
    fn mixed_script_keeps_latin_word_together() {
        let lines = wrap("予約番号はABC123です", 6);
        assert_eq!(lines, vec!["予約番号は", "ABC123", "です"]);
    }

    #[test]
    fn overlong_unit_breaks_by_character() {
        let lines = wrap("supercalifragilistic", 8);
        assert_eq!(lines, vec!["supercal", "ifragili", "stic"]);
    }

    #[test]
    fn no_line_exceeds_width() {
        let text = "ご予約の変更につきまして、ABC ホテル様に確認いたします。Thank you very much";
        for width in 3..20 {
            for line in wrap(text, width) {
                assert!(line.chars().count() <= width, "{line:?} exceeds {width}");
            }
        }
    }

    #[test]
    fn newlines_start_paragraphs() {
        assert_eq!(wrap("はい\nいいえ", 10), vec!["はい", "いいえ"]);
        assert!(wrap("", 10).is_empty());
    }
}
