//! Chilean RUT (Rol Único Tributario) handling.
//!
//! A RUT is a numeric body followed by a single check character (`0`-`9` or
//! `K`). Users type it in many shapes (`12.345.678-5`, `12345678-5`,
//! `123456785`), so everything here first reduces the input to its clean form:
//! no separators, uppercase.

use std::fmt;

/// Weights applied to the body digits, right to left, repeating.
const WEIGHTS: [u32; 6] = [2, 3, 4, 5, 6, 7];

const SEPARATORS: [char; 2] = ['.', '-'];

/// Removes every `.` and `-` and uppercases the remainder.
pub fn clean(input: &str) -> String {
    input
        .chars()
        .filter(|c| !SEPARATORS.contains(c))
        .collect::<String>()
        .to_uppercase()
}

/// Computes the expected check character for a numeric body.
///
/// Returns `None` when the body is empty or contains anything other than
/// ASCII digits.
pub fn check_digit(body: &str) -> Option<char> {
    if body.is_empty() || !body.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    // Reducing mod 11 on every step keeps arbitrarily long bodies from overflowing.
    let sum = body
        .bytes()
        .rev()
        .zip(WEIGHTS.iter().cycle())
        .fold(0u32, |acc, (digit, weight)| {
            (acc + u32::from(digit - b'0') * weight) % 11
        });

    match 11 - sum {
        11 => Some('0'),
        10 => Some('K'),
        n => char::from_digit(n, 10),
    }
}

/// Returns true when the input, once cleaned, carries a correct check character.
pub fn validate(input: &str) -> bool {
    let cleaned = clean(input);
    match split(&cleaned) {
        Some((body, check)) => check_digit(body) == Some(check),
        None => false,
    }
}

/// Renders the input as `NN.NNN.NNN-C`.
///
/// Input that cleans to fewer than two characters is returned untouched.
pub fn format(input: &str) -> String {
    let cleaned = clean(input);
    match split(&cleaned) {
        Some((body, check)) => format!("{}-{}", group_thousands(body), check),
        None => input.to_string(),
    }
}

/// Splits a cleaned RUT into its body and check character.
fn split(cleaned: &str) -> Option<(&str, char)> {
    let mut chars = cleaned.chars();
    let check = chars.next_back()?;
    let body = chars.as_str();
    if body.is_empty() {
        return None;
    }
    Some((body, check))
}

fn group_thousands(body: &str) -> String {
    if !body.bytes().all(|b| b.is_ascii_digit()) {
        return body.to_string();
    }

    let len = body.len();
    let mut grouped = String::with_capacity(len + len / 3);
    for (i, digit) in body.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            grouped.push('.');
        }
        grouped.push(digit);
    }
    grouped
}

/// Longest clean RUT an account may hold.
pub const MAX_CLEAN_LEN: usize = 12;

/// A RUT that passed checksum validation, held in its clean form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Rut(String);

impl Rut {
    /// Cleans and validates the input, returning `None` when the checksum
    /// fails or the clean form is longer than [`MAX_CLEAN_LEN`].
    pub fn parse(input: &str) -> Option<Self> {
        let cleaned = clean(input);
        if cleaned.len() <= MAX_CLEAN_LEN && validate(&cleaned) {
            Some(Self(cleaned))
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn formatted(&self) -> String {
        format(&self.0)
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Rut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.formatted())
    }
}
