//! Splitting an input line into words.
//!
//! Words are separated by runs of spaces, tabs and line terminators. There is no
//! quoting or escaping: every other character is literal.

/// Ordered words of one input line. Index 0 is the command name.
pub type Tokens = Vec<String>;

/// Split `line` into words. A blank line yields an empty sequence.
pub fn tokenize(line: &str) -> Tokens {
    line.split([' ', '\t', '\n', '\r'])
        .filter(|word| !word.is_empty())
        .map(str::to_owned)
        .collect()
}
