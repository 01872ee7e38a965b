//! Metaphone phonetic comparator (spec §4.1): codes compared for equality.
//!
//! This implements the common simplified Metaphone rule set (initial-letter
//! special cases, silent-letter elision, digraph collapsing) rather than the
//! full original Lawrence Philips algorithm; it is deterministic and
//! sufficient for the equality-only comparison this comparator performs.

use er_core::Value;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetaphoneOptions {
    pub null_matches_null: bool,
    pub max_code_length: usize,
}

impl Default for MetaphoneOptions {
    fn default() -> Self {
        Self {
            null_matches_null: true,
            max_code_length: 8,
        }
    }
}

fn is_vowel(c: char) -> bool {
    matches!(c.to_ascii_uppercase(), 'A' | 'E' | 'I' | 'O' | 'U')
}

/// Compute a simplified Metaphone code for a word.
pub fn metaphone_code(word: &str, max_len: usize) -> String {
    let chars: Vec<char> = word
        .chars()
        .filter(|c| c.is_alphabetic())
        .map(|c| c.to_ascii_uppercase())
        .collect();
    if chars.is_empty() {
        return String::new();
    }

    let mut code = String::new();
    let mut i = 0usize;
    let n = chars.len();

    // Initial-letter special cases.
    match (chars[0], chars.get(1).copied()) {
        ('A', Some('E')) | ('G', Some('N')) | ('K', Some('N')) | ('P', Some('N'))
        | ('W', Some('R')) => i = 1,
        ('X', _) => {
            code.push('S');
            i = 1;
        }
        ('W', Some('H')) => {
            code.push('W');
            i = 2;
        }
        _ => {}
    }

    while i < n && code.len() < max_len {
        let c = chars[i];
        let next = chars.get(i + 1).copied();
        let prev = if i > 0 { Some(chars[i - 1]) } else { None };

        if i > 0 && c == prev.unwrap() && c != 'C' {
            i += 1;
            continue;
        }

        match c {
            'A' | 'E' | 'I' | 'O' | 'U' => {
                if i == 0 {
                    code.push(c);
                }
            }
            'B' => {
                if !(i == n - 1 && prev == Some('M')) {
                    code.push('B');
                }
            }
            'C' => {
                if next == Some('I') && chars.get(i + 2) == Some(&'A') {
                    code.push('X');
                } else if next == Some('H') {
                    code.push('X');
                    i += 1;
                } else if matches!(next, Some('I') | Some('E') | Some('Y')) {
                    code.push('S');
                } else {
                    code.push('K');
                }
            }
            'D' => {
                if next == Some('G')
                    && matches!(chars.get(i + 2), Some('E') | Some('Y') | Some('I'))
                {
                    code.push('J');
                    i += 1;
                } else {
                    code.push('T');
                }
            }
            'G' => {
                if next == Some('H') {
                    code.push('K');
                    i += 1;
                } else if matches!(next, Some('I') | Some('E') | Some('Y')) {
                    code.push('J');
                } else {
                    code.push('K');
                }
            }
            'H' => {
                if prev.is_some_and(is_vowel) && !next.is_some_and(is_vowel) {
                    // silent
                } else {
                    code.push('H');
                }
            }
            'K' => {
                if prev != Some('C') {
                    code.push('K');
                }
            }
            'P' => {
                if next == Some('H') {
                    code.push('F');
                    i += 1;
                } else {
                    code.push('P');
                }
            }
            'Q' => code.push('K'),
            'S' => {
                if next == Some('H') {
                    code.push('X');
                    i += 1;
                } else {
                    code.push('S');
                }
            }
            'T' => {
                if next == Some('H') {
                    code.push('0');
                    i += 1;
                } else {
                    code.push('T');
                }
            }
            'V' => code.push('F'),
            'W' | 'Y' => {
                if next.is_some_and(is_vowel) {
                    code.push(c);
                }
            }
            'X' => {
                code.push('K');
                code.push('S');
            }
            'Z' => code.push('S'),
            other => code.push(other),
        }
        i += 1;
    }

    code.truncate(max_len);
    code
}

pub fn metaphone(left: &Value, right: &Value, options: &MetaphoneOptions) -> f64 {
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
            if metaphone_code(a, options.max_code_length) == metaphone_code(b, options.max_code_length)
            {
                1.0
            } else {
                0.0
            }
        }
    }
}
