//! Pure checks and normalizers for user-entered fields. Nothing in here touches
//! the registry or the database, so the GUI can call these directly to flag a
//! bad field before submitting a form.

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref EMAIL_RE: Regex =
        Regex::new(r"^[A-Za-z0-9._%+-]+@[A-Za-z0-9.-]+\.[A-Za-z]{2,}$").expect("email regex");
    static ref PERSON_NAME_RE: Regex =
        Regex::new(r"^[A-Za-z][A-Za-z .'-]{1,58}[A-Za-z]$").expect("person name regex");
    static ref COURSE_NAME_RE: Regex =
        Regex::new(r"^[A-Za-z0-9 .,&()/_-]{3,60}$").expect("course name regex");
    static ref ID_RE: Regex = Regex::new(r"^[A-Za-z0-9_-]{1,20}$").expect("id regex");
}

/// `local@domain.tld` with a TLD of two or more letters. Surrounding
/// whitespace is ignored.
pub fn validate_email(s: &str) -> bool {
    EMAIL_RE.is_match(s.trim())
}

/// Person names: letters plus `.`, `'`, `-` and spaces, starting and ending
/// with a letter.
pub fn validate_name(s: &str) -> bool {
    PERSON_NAME_RE.is_match(&squash_whitespace(s))
}

/// Ages arrive as signed integers from SQLite and JSON, so the check also
/// guards the narrowing to `u32`.
pub fn validate_age(n: i64) -> bool {
    n > 0 && n <= i64::from(u32::MAX)
}

/// 1 to 20 letters, digits, `-` or `_`, after trimming.
pub fn validate_id(s: &str) -> bool {
    ID_RE.is_match(s.trim())
}

/// 3 to 60 characters from a conservative set that still allows
/// "Intro to CS (Part 1)".
pub fn validate_course_name(s: &str) -> bool {
    COURSE_NAME_RE.is_match(&squash_whitespace(s))
}

/// Trim and lowercase.
pub fn normalize_email(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Trim and uppercase. Every lookup goes through this, so `s1` and `S1`
/// name the same record.
pub fn normalize_id(s: &str) -> String {
    s.trim().to_uppercase()
}

/// Collapse whitespace and title-case every word. A letter is capitalised
/// whenever the previous character is not a letter, so `o'neil-smith`
/// becomes `O'Neil-Smith`.
pub fn normalize_name(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_alpha = false;
    for ch in squash_whitespace(s).chars() {
        if ch.is_alphabetic() {
            if prev_alpha {
                out.extend(ch.to_lowercase());
            } else {
                out.extend(ch.to_uppercase());
            }
            prev_alpha = true;
        } else {
            out.push(ch);
            prev_alpha = false;
        }
    }
    out
}

/// Course names keep their casing ("Intro to CS") and only lose stray spaces.
pub fn normalize_course_name(s: &str) -> String {
    squash_whitespace(s)
}

fn squash_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
