//! Edge-triggered threshold evaluation

use serde::{Deserialize, Serialize};

/// Alarm state of a device, derived exclusively from its most recent
/// accepted reading compared against the effective threshold.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AlarmState {
    #[default]
    Normal,
    Active,
}

/// State change produced by a single accepted reading.
///
/// Only `Triggered` and `Resolved` are notification-worthy; steady-state
/// readings yield `None` no matter how far past the threshold they are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Transition {
    None,
    Triggered,
    Resolved,
}

impl Transition {
    /// True for the two notification-worthy transitions.
    pub fn is_edge(self) -> bool {
        !matches!(self, Transition::None)
    }
}

/// Evaluate one reading against the effective threshold.
///
/// The boundary is inclusive: a value exactly equal to the threshold counts
/// as alarming. Pure and total; non-finite values are rejected upstream and
/// never reach this function.
pub fn evaluate(previous: AlarmState, value: f64, threshold: f64) -> (AlarmState, Transition) {
    let now = if value >= threshold {
        AlarmState::Active
    } else {
        AlarmState::Normal
    };

    let transition = match (previous, now) {
        (AlarmState::Normal, AlarmState::Active) => Transition::Triggered,
        (AlarmState::Active, AlarmState::Normal) => Transition::Resolved,
        _ => Transition::None,
    };

    (now, transition)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_sequence(threshold: f64, values: &[f64]) -> Vec<Transition> {
        let mut state = AlarmState::Normal;
        values
            .iter()
            .map(|&v| {
                let (next, transition) = evaluate(state, v, threshold);
                state = next;
                transition
            })
            .collect()
    }

    #[test]
    fn test_inclusive_boundary() {
        let (state, transition) = evaluate(AlarmState::Normal, 400.0, 400.0);
        assert_eq!(state, AlarmState::Active);
        assert_eq!(transition, Transition::Triggered);

        let (state, transition) = evaluate(AlarmState::Normal, 399.999, 400.0);
        assert_eq!(state, AlarmState::Normal);
        assert_eq!(transition, Transition::None);
    }

    #[test]
    fn test_below_then_at_threshold() {
        assert_eq!(
            run_sequence(400.0, &[399.0, 400.0]),
            vec![Transition::None, Transition::Triggered]
        );
    }

    #[test]
    fn test_at_then_below_threshold() {
        assert_eq!(
            run_sequence(400.0, &[400.0, 399.0]),
            vec![Transition::Triggered, Transition::Resolved]
        );
    }

    #[test]
    fn test_steady_state_is_silent() {
        // Repeated qualifying readings must not re-trigger.
        assert_eq!(
            run_sequence(400.0, &[450.0, 460.0, 470.0]),
            vec![Transition::Triggered, Transition::None, Transition::None]
        );
        assert_eq!(
            run_sequence(400.0, &[10.0, 20.0]),
            vec![Transition::None, Transition::None]
        );
    }

    #[test]
    fn test_worked_example() {
        assert_eq!(
            run_sequence(400.0, &[500.0, 100.0, 450.0, 460.0]),
            vec![
                Transition::Triggered,
                Transition::Resolved,
                Transition::Triggered,
                Transition::None,
            ]
        );
    }

    #[test]
    fn test_prefix_balance_invariant() {
        // Over any prefix, triggered minus resolved is 0 or 1, and is 1 iff
        // the latest value is at or above the threshold.
        let threshold = 100.0;
        let values = [50.0, 150.0, 150.0, 99.0, 100.0, 101.0, 0.0, 100.0];
        let transitions = run_sequence(threshold, &values);

        let mut balance: i64 = 0;
        for (i, transition) in transitions.iter().enumerate() {
            match transition {
                Transition::Triggered => balance += 1,
                Transition::Resolved => balance -= 1,
                Transition::None => {}
            }
            assert!(balance == 0 || balance == 1);
            assert_eq!(balance == 1, values[i] >= threshold);
        }
    }
}
