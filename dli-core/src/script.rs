//! Script encoder: local lines into the switch's fixed 127-line table.

use crate::error::Error;

/// Number of lines the switch stores. Every line slot always holds something.
pub const SCRIPT_CAPACITY: usize = 127;

/// Value of an unused line slot.
pub const TERMINATOR: &str = "END";

/// A script shaped exactly like the switch's store: `SCRIPT_CAPACITY` lines, unused tail set to `END`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedScript {
    lines: Vec<String>,
}

impl FixedScript {
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Lines paired with their 1-based line numbers, as the switch numbers them.
    pub fn numbered(&self) -> impl Iterator<Item = (usize, &str)> {
        self.lines
            .iter()
            .enumerate()
            .map(|(i, line)| (i + 1, line.as_str()))
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}

/// Encode cleaned lines into a full script table. Fails if there are more lines than the switch holds.
pub fn encode<I, S>(lines: I) -> Result<FixedScript, Error>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    let mut out: Vec<String> = lines.into_iter().map(Into::into).collect();
    if out.len() > SCRIPT_CAPACITY {
        return Err(Error::CapacityExceeded {
            lines: out.len(),
            max: SCRIPT_CAPACITY,
        });
    }
    out.resize(SCRIPT_CAPACITY, TERMINATOR.to_string());
    Ok(FixedScript { lines: out })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pads_with_terminator() {
        let script = encode(["ON 1", "SLEEP 5"]).unwrap();
        assert_eq!(script.len(), SCRIPT_CAPACITY);
        assert_eq!(script.lines()[0], "ON 1");
        assert_eq!(script.lines()[1], "SLEEP 5");
        assert!(script.lines()[2..].iter().all(|l| l == TERMINATOR));
    }

    #[test]
    fn empty_script_is_all_terminators() {
        let script = encode(Vec::<String>::new()).unwrap();
        assert_eq!(script.len(), SCRIPT_CAPACITY);
        assert!(script.lines().iter().all(|l| l == TERMINATOR));
    }

    #[test]
    fn full_script_is_unchanged() {
        let input: Vec<String> = (1..=SCRIPT_CAPACITY).map(|i| format!("ON {}", i % 8 + 1)).collect();
        let script = encode(input.clone()).unwrap();
        assert_eq!(script.lines(), input.as_slice());
    }

    #[test]
    fn over_capacity_rejected() {
        let input = vec!["OFF 1"; SCRIPT_CAPACITY + 1];
        match encode(input) {
            Err(Error::CapacityExceeded { lines, max }) => {
                assert_eq!(lines, SCRIPT_CAPACITY + 1);
                assert_eq!(max, SCRIPT_CAPACITY);
            }
            other => panic!("expected CapacityExceeded, got {:?}", other),
        }
    }

    #[test]
    fn numbered_is_one_based() {
        let script = encode(["ON 1"]).unwrap();
        let mut numbered = script.numbered();
        assert_eq!(numbered.next(), Some((1, "ON 1")));
        assert_eq!(numbered.next(), Some((2, TERMINATOR)));
        assert_eq!(script.numbered().last(), Some((SCRIPT_CAPACITY, TERMINATOR)));
    }
}
