//! Soundex phonetic comparator (spec §4.1): codes compared for equality,
//! `1.0` on match, `0.0` otherwise.

use er_core::Value;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SoundexOptions {
    /// Two nulls/empty strings match iff true.
    pub null_matches_null: bool,
    /// Soundex code length, classically 4 (leading letter + 3 digits).
    pub code_length: usize,
}

impl Default for SoundexOptions {
    fn default() -> Self {
        Self {
            null_matches_null: true,
            code_length: 4,
        }
    }
}

fn soundex_digit(c: char) -> Option<char> {
    match c.to_ascii_uppercase() {
        'B' | 'F' | 'P' | 'V' => Some('1'),
        'C' | 'G' | 'J' | 'K' | 'Q' | 'S' | 'X' | 'Z' => Some('2'),
        'D' | 'T' => Some('3'),
        'L' => Some('4'),
        'M' | 'N' => Some('5'),
        'R' => Some('6'),
        _ => None,
    }
}

/// Compute the classic Soundex code for a word, padded/truncated to
/// `code_length` characters.
pub fn soundex_code(word: &str, code_length: usize) -> String {
    let chars: Vec<char> = word.chars().filter(|c| c.is_alphabetic()).collect();
    if chars.is_empty() {
        return String::new();
    }

    let mut code = String::new();
    code.push(chars[0].to_ascii_uppercase());

    let mut last_digit = soundex_digit(chars[0]);
    for &c in &chars[1..] {
        if code.len() >= code_length {
            break;
        }
        let digit = soundex_digit(c);
        if digit.is_some() && digit != last_digit {
            code.push(digit.unwrap());
        }
        // H and W do not break a run of identical digits either side of them;
        // every other non-digit letter (vowels + Y) resets the "last digit".
        if !matches!(c.to_ascii_uppercase(), 'H' | 'W') {
            last_digit = digit;
        }
    }

    while code.len() < code_length {
        code.push('0');
    }
    code.truncate(code_length);
    code
}

pub fn soundex(left: &Value, right: &Value, options: &SoundexOptions) -> f64 {
    match (left, right) {
        (Value::Null, Value::Null) => {
            if options.null_matches_null {
                1.0
            } else {
                0.0
            }
        }
        (Value::Null, _) | (_, Value::Null) => 0.0,
        _ => {
            let (Some(a), Some(b)) = (left.as_str(), right.as_str()) else {
                return 0.0;
            };
            if soundex_code(a, options.code_length) == soundex_code(b, options.code_length) {
                1.0
            } else {
                0.0
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classic_robert_rupert() {
        assert_eq!(soundex_code("Robert", 4), "R163");
        assert_eq!(soundex_code("Rupert", 4), "R163");
    }

    #[test]
    fn homophone_names_match() {
        let opts = SoundexOptions::default();
        assert_eq!(
            soundex(&Value::String("Smith".into()), &Value::String("Smyth".into()), &opts),
            1.0
        );
    }

    #[test]
    fn distinct_codes_do_not_match() {
        let opts = SoundexOptions::default();
        assert_eq!(
            soundex(&Value::String("Smith".into()), &Value::String("Johnson".into()), &opts),
            0.0
        );
    }
}
