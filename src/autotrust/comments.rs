//! Reader for the state comment trailing each key line of an anchor file:
//!
//! ```text
//! example. 3600 IN DNSKEY 257 3 8 AwEAAb... ;{id = 1234 (ksk), size = 2048b} ;;state=2 [  VALID  ] ;;count=0 ;;lastchange=1000000000
//! ```
//!
//! Fields are located by substring search over the text after the first `;`.
//! The last occurrence of each field wins, and `lastchange=` is only looked for
//! after the `count=` field when that one is present. Files written by older
//! resolvers depend on these rules, including the odd ones.

use crate::autotrust::state::KeyState;
use crate::error::{AutotrustError, Result};

const STATE_TOKEN: &str = "state=";
const COUNT_TOKEN: &str = "count=";
const LASTCHANGE_TOKEN: &str = "lastchange=";

/// Value of the `state=` field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateField {
    /// No `state=` in the comment
    Absent,
    Known(KeyState),
    /// A code outside 0..=5; the raw character is kept for diagnostics
    Unknown(char),
}

impl StateField {
    /// Absent means Valid, unknown codes fall back to Start
    pub fn resolve(self) -> KeyState {
        match self {
            StateField::Absent => KeyState::Valid,
            StateField::Known(state) => state,
            StateField::Unknown(_) => KeyState::Start,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateComment {
    pub state: StateField,
    pub pending_count: u8,
    /// `None` when absent or zero
    pub last_change: Option<u64>,
}

/// Text after the first `;` of a line, empty when there is none
pub fn comment_of(line: &str) -> &str {
    line.split_once(';').map(|(_, rest)| rest).unwrap_or("")
}

/// Offset just past the last occurrence of `token`.
/// A token with nothing after it is a parse error.
fn value_offset(text: &str, token: &str) -> Result<Option<usize>> {
    match text.rfind(token) {
        None => Ok(None),
        Some(idx) => {
            let pos = idx + token.len();
            if pos >= text.len() {
                Err(AutotrustError::CommentParse(format!(
                    "'{}' without a value",
                    token
                )))
            } else {
                Ok(Some(pos))
            }
        }
    }
}

/// Leading decimal digits, skipping initial whitespace; no digits reads as zero
fn leading_number(text: &str) -> u64 {
    text.trim_start()
        .bytes()
        .take_while(u8::is_ascii_digit)
        .fold(0u64, |acc, digit| {
            acc.saturating_mul(10).saturating_add(u64::from(digit - b'0'))
        })
}

/// Parse the state comment of a full anchor file line
pub fn parse_state_comment(line: &str) -> Result<StateComment> {
    let comment = comment_of(line);

    let state = match value_offset(comment, STATE_TOKEN)? {
        None => StateField::Absent,
        Some(pos) => {
            let ch = comment[pos..].chars().next().unwrap_or('\0');
            match ch
                .to_digit(10)
                .and_then(|d| u8::try_from(d).ok())
                .and_then(KeyState::from_code)
            {
                Some(state) => StateField::Known(state),
                None => StateField::Unknown(ch),
            }
        }
    };

    let (pending_count, rest) = match value_offset(comment, COUNT_TOKEN)? {
        None => (0, comment),
        Some(pos) => {
            let rest = &comment[pos..];
            (leading_number(rest).min(u64::from(u8::MAX)) as u8, rest)
        }
    };

    let last_change = match value_offset(rest, LASTCHANGE_TOKEN)? {
        None => None,
        Some(pos) => Some(leading_number(&rest[pos..])).filter(|&t| t != 0),
    };

    Ok(StateComment {
        state,
        pending_count,
        last_change,
    })
}

/// Comment written after a key line's record text
pub fn format_state_comment(state: KeyState, pending_count: u8, last_change: u64) -> String {
    format!(
        ";;state={} [ {:^7} ] ;;count={} ;;lastchange={} ;;{}",
        state.code(),
        state.label(),
        pending_count,
        last_change,
        human_time(last_change)
    )
}

/// Human readable UTC time for file annotations
pub fn human_time(secs: u64) -> String {
    i64::try_from(secs)
        .ok()
        .and_then(|secs| chrono::DateTime::from_timestamp(secs, 0))
        .map(|t| t.format("%a %b %e %H:%M:%S %Y").to_string())
        .unwrap_or_default()
}
