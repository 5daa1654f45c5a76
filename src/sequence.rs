/// Shutdown sequence grammar: `signal[:seconds:signal]*`.
///
/// A sequence always starts and ends with a signal and alternates strictly
/// between signals and waits. That shape is carried by the type itself
/// (an initial signal followed by wait/signal stages), so the executor never
/// has to re-derive it from token positions.
use crate::signal::SignalKind;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

/// Token delimiter in the textual form.
pub const DELIMITER: char = ':';

/// Errors produced while parsing a sequence string.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("shutdown sequence must have an odd number of elements, got {count}")]
    EvenElementCount { count: usize },

    #[error("invalid signal {0:?} in shutdown sequence")]
    UnknownSignal(String),

    #[error("invalid number of seconds {0:?} in shutdown sequence")]
    NotANumber(String),

    #[error("number of seconds in shutdown sequence ({0}) must be non-negative")]
    NegativeSeconds(String),
}

/// Maximum time to wait for the process to exit before moving on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WaitStep {
    pub seconds: u32,
}

impl WaitStep {
    pub fn duration(self) -> Duration {
        Duration::from_secs(u64::from(self.seconds))
    }
}

/// One instruction of a sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Step {
    Signal { signal: SignalKind },
    Wait(WaitStep),
}

/// A wait followed by the signal to send if the wait expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Stage {
    wait: WaitStep,
    signal: SignalKind,
}

/// A parsed, immutable shutdown sequence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShutdownSequence {
    initial: SignalKind,
    stages: Vec<Stage>,
}

impl ShutdownSequence {
    /// A sequence consisting of a single signal.
    pub fn new(initial: SignalKind) -> Self {
        Self {
            initial,
            stages: Vec::new(),
        }
    }

    /// Append a wait and the signal that follows it.
    pub fn then(mut self, seconds: u32, signal: SignalKind) -> Self {
        self.stages.push(Stage {
            wait: WaitStep { seconds },
            signal,
        });
        self
    }

    /// Number of steps, always odd.
    pub fn step_count(&self) -> usize {
        1 + 2 * self.stages.len()
    }

    /// Iterate the steps in execution order.
    pub fn steps(&self) -> Steps<'_> {
        Steps {
            sequence: self,
            phase: Phase::Signal,
            stage: None,
        }
    }

    /// Sum of all wait durations; the longest a run can take ignoring polling slack.
    pub fn total_wait(&self) -> Duration {
        self.stages.iter().map(|s| s.wait.duration()).sum()
    }
}

/// Which kind of step the iterator yields next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Signal,
    Wait,
}

/// Iterator over the steps of a [`ShutdownSequence`].
pub struct Steps<'a> {
    sequence: &'a ShutdownSequence,
    phase: Phase,
    /// `None` until the initial signal has been yielded.
    stage: Option<usize>,
}

impl Iterator for Steps<'_> {
    type Item = Step;

    fn next(&mut self) -> Option<Step> {
        match (self.phase, self.stage) {
            (Phase::Signal, None) => {
                self.phase = Phase::Wait;
                self.stage = Some(0);
                Some(Step::Signal {
                    signal: self.sequence.initial,
                })
            }
            (Phase::Wait, Some(i)) => {
                let stage = self.sequence.stages.get(i)?;
                self.phase = Phase::Signal;
                Some(Step::Wait(stage.wait))
            }
            (Phase::Signal, Some(i)) => {
                let stage = self.sequence.stages.get(i)?;
                self.phase = Phase::Wait;
                self.stage = Some(i + 1);
                Some(Step::Signal {
                    signal: stage.signal,
                })
            }
            (Phase::Wait, None) => None,
        }
    }
}

/// Parse a sequence such as `term:10:int:5:kill`.
///
/// Tokens are taken literally (no trimming). Seconds must fit a signed
/// 32-bit integer and be non-negative; zero means "poll once, don't sleep".
pub fn parse(text: &str) -> Result<ShutdownSequence, ParseError> {
    let tokens: Vec<&str> = text.split(DELIMITER).collect();
    if tokens.len() % 2 == 0 {
        return Err(ParseError::EvenElementCount {
            count: tokens.len(),
        });
    }

    let mut sequence = ShutdownSequence::new(parse_signal(tokens[0])?);
    for pair in tokens[1..].chunks_exact(2) {
        let seconds = parse_seconds(pair[0])?;
        let signal = parse_signal(pair[1])?;
        sequence = sequence.then(seconds, signal);
    }
    Ok(sequence)
}

fn parse_signal(token: &str) -> Result<SignalKind, ParseError> {
    token
        .parse::<SignalKind>()
        .map_err(|e| ParseError::UnknownSignal(e.0))
}

fn parse_seconds(token: &str) -> Result<u32, ParseError> {
    let value: i32 = token
        .parse()
        .map_err(|_| ParseError::NotANumber(token.to_string()))?;
    u32::try_from(value).map_err(|_| ParseError::NegativeSeconds(token.to_string()))
}

impl FromStr for ShutdownSequence {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s)
    }
}

impl fmt::Display for ShutdownSequence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.initial)?;
        for stage in &self.stages {
            write!(
                f,
                "{DELIMITER}{}{DELIMITER}{}",
                stage.wait.seconds, stage.signal
            )?;
        }
        Ok(())
    }
}

impl Serialize for ShutdownSequence {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.steps())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SignalKind::*;

    fn sig(signal: SignalKind) -> Step {
        Step::Signal { signal }
    }

    fn wait(seconds: u32) -> Step {
        Step::Wait(WaitStep { seconds })
    }

    #[test]
    fn test_single_signal() {
        let seq = parse("kill").unwrap();
        assert_eq!(seq.step_count(), 1);
        assert_eq!(seq.steps().collect::<Vec<_>>(), vec![sig(Kill)]);
    }

    #[test]
    fn test_term_wait_kill() {
        let seq = parse("term:5:kill").unwrap();
        assert_eq!(seq.step_count(), 3);
        assert_eq!(
            seq.steps().collect::<Vec<_>>(),
            vec![sig(Term), wait(5), sig(Kill)]
        );
    }

    #[test]
    fn test_long_sequence_preserves_order() {
        let seq = parse("int:2:term:10:quit:0:kill").unwrap();
        assert_eq!(
            seq.steps().collect::<Vec<_>>(),
            vec![
                sig(Int),
                wait(2),
                sig(Term),
                wait(10),
                sig(Quit),
                wait(0),
                sig(Kill)
            ]
        );
        assert_eq!(seq.step_count(), 7);
        assert_eq!(seq.steps().count(), seq.step_count());
    }

    #[test]
    fn test_even_element_count() {
        assert_eq!(
            parse("term:5").unwrap_err(),
            ParseError::EvenElementCount { count: 2 }
        );
        // Content is irrelevant when the count is even.
        assert_eq!(
            parse("bogus:x:y:z").unwrap_err(),
            ParseError::EvenElementCount { count: 4 }
        );
        assert_eq!(
            parse("term:").unwrap_err(),
            ParseError::EvenElementCount { count: 2 }
        );
    }

    #[test]
    fn test_unknown_signal() {
        assert_eq!(
            parse("bogus:5:kill").unwrap_err(),
            ParseError::UnknownSignal("bogus".to_string())
        );
        assert_eq!(
            parse("term:5:KILL").unwrap_err(),
            ParseError::UnknownSignal("KILL".to_string())
        );
    }

    #[test]
    fn test_empty_input_is_unknown_signal() {
        assert_eq!(
            parse("").unwrap_err(),
            ParseError::UnknownSignal(String::new())
        );
    }

    #[test]
    fn test_tokens_are_not_trimmed() {
        assert_eq!(
            parse(" term:5:kill").unwrap_err(),
            ParseError::UnknownSignal(" term".to_string())
        );
        assert_eq!(
            parse("term: 5:kill").unwrap_err(),
            ParseError::NotANumber(" 5".to_string())
        );
    }

    #[test]
    fn test_not_a_number() {
        assert_eq!(
            parse("term:five:kill").unwrap_err(),
            ParseError::NotANumber("five".to_string())
        );
        assert_eq!(
            parse("term:1.5:kill").unwrap_err(),
            ParseError::NotANumber("1.5".to_string())
        );
        assert_eq!(
            parse("term::kill").unwrap_err(),
            ParseError::NotANumber(String::new())
        );
    }

    #[test]
    fn test_seconds_out_of_i32_range() {
        assert_eq!(
            parse("term:2147483648:kill").unwrap_err(),
            ParseError::NotANumber("2147483648".to_string())
        );
        let seq = parse("term:2147483647:kill").unwrap();
        assert_eq!(seq.steps().nth(1), Some(wait(i32::MAX as u32)));
    }

    #[test]
    fn test_negative_seconds() {
        assert_eq!(
            parse("term:-1:kill").unwrap_err(),
            ParseError::NegativeSeconds("-1".to_string())
        );
    }

    #[test]
    fn test_zero_seconds_is_valid() {
        let seq = parse("term:0:kill").unwrap();
        assert_eq!(seq.steps().nth(1), Some(wait(0)));
    }

    #[test]
    fn test_leading_plus_accepted() {
        let seq = parse("term:+3:kill").unwrap();
        assert_eq!(seq.steps().nth(1), Some(wait(3)));
    }

    #[test]
    fn test_first_error_wins() {
        // Left-to-right: the bad number is seen before the bad signal.
        assert_eq!(
            parse("term:x:bogus").unwrap_err(),
            ParseError::NotANumber("x".to_string())
        );
    }

    #[test]
    fn test_parse_is_deterministic() {
        let text = "hup:1:term:30:kill";
        assert_eq!(parse(text).unwrap(), parse(text).unwrap());
    }

    #[test]
    fn test_display_renders_canonical_text() {
        let seq = parse("term:+05:kill").unwrap();
        assert_eq!(seq.to_string(), "term:5:kill");
        let seq: ShutdownSequence = "usr1:0:usr2".parse().unwrap();
        assert_eq!(seq.to_string(), "usr1:0:usr2");
    }

    #[test]
    fn test_builder_matches_parser() {
        let built = ShutdownSequence::new(Term).then(10, Int).then(5, Kill);
        assert_eq!(built, parse("term:10:int:5:kill").unwrap());
    }

    #[test]
    fn test_total_wait() {
        let seq = parse("term:10:int:5:kill").unwrap();
        assert_eq!(seq.total_wait(), Duration::from_secs(15));
        assert_eq!(parse("kill").unwrap().total_wait(), Duration::ZERO);
    }

    #[test]
    fn test_serializes_as_step_list() {
        let seq = parse("term:5:kill").unwrap();
        let json = serde_json::to_value(&seq).unwrap();
        assert_eq!(
            json,
            serde_json::json!([
                {"kind": "signal", "signal": "term"},
                {"kind": "wait", "seconds": 5},
                {"kind": "signal", "signal": "kill"},
            ])
        );
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            ParseError::EvenElementCount { count: 2 }.to_string(),
            "shutdown sequence must have an odd number of elements, got 2"
        );
        assert_eq!(
            ParseError::NegativeSeconds("-4".to_string()).to_string(),
            "number of seconds in shutdown sequence (-4) must be non-negative"
        );
    }
}
