//! Compare an intended script with what the switch reports back.

use crate::listing::RemoteScript;
use crate::script::FixedScript;

/// Opcode whose rendered form carries device-appended units (`SLEEP 5` shows as `SLEEP 5 sec`).
const SLEEP_OPCODE: &str = "SLEEP";

/// Semantic line equality. For `SLEEP` only the opcode and its argument must match;
/// anything else must be identical.
pub fn line_equal(expected: &str, actual: &str) -> bool {
    if expected.split(' ').next() != Some(SLEEP_OPCODE) {
        return expected == actual;
    }
    let e_head: Vec<&str> = expected.split(' ').take(2).collect();
    let a_head: Vec<&str> = actual.split(' ').take(2).collect();
    e_head == a_head
}

/// First divergence between the intended and reported script. `index` is zero-based.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mismatch {
    pub index: usize,
    pub expected: String,
    pub actual: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verification {
    Match,
    Mismatch(Mismatch),
}

impl Verification {
    pub fn is_match(&self) -> bool {
        matches!(self, Verification::Match)
    }
}

/// Compare line by line, stopping at the first mismatch.
pub fn compare(expected: &FixedScript, actual: &RemoteScript) -> Verification {
    for (index, (e, a)) in expected.lines().iter().zip(actual.lines()).enumerate() {
        if !line_equal(e, a) {
            return Verification::Mismatch(Mismatch {
                index,
                expected: e.clone(),
                actual: a.clone(),
            });
        }
    }
    let (e_len, a_len) = (expected.len(), actual.lines().len());
    if e_len != a_len {
        // Only reachable with a custom parser; report the first missing position.
        let index = e_len.min(a_len);
        return Verification::Mismatch(Mismatch {
            index,
            expected: expected.lines().get(index).cloned().unwrap_or_default(),
            actual: actual.lines().get(index).cloned().unwrap_or_default(),
        });
    }
    Verification::Match
}
