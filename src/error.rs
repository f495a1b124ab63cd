use thiserror::Error;

/// Rejected transitions of the active-program state machine.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ProgramStateError {
    #[error("program `{active}` is already active; finish or cancel your current program first")]
    AlreadyActive { active: String },

    #[error("no active program; activate one with `program activate`")]
    NotActive,

    #[error("program `{0}` has no weeks")]
    EmptyProgram(String),
}

/// Entity validation failures, raised when building or mutating model values.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("rep range {min}-{max} is invalid: need 0 < min <= max")]
    RepRange { min: u32, max: u32 },

    #[error("set count {0} is outside 1..=10")]
    SetCount(u32),

    #[error("week {week}: {field} modifier {value} must be >= 0")]
    NegativeModifier {
        week: u32,
        field: &'static str,
        value: f64,
    },

    #[error("week {0} is marked as deload but its modifiers are not both below 1.0")]
    DeloadNotReduced(u32),

    #[error("week numbers must be contiguous from 1: expected {expected}, found {found}")]
    WeekSequence { expected: u32, found: u32 },

    #[error("week {week} schedules {day} more than once")]
    DuplicateDay { week: u32, day: String },

    #[error("`{0}` is a preset and cannot be deleted")]
    PresetImmutable(String),

    #[error("{0} must not be empty")]
    Empty(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_error_display_is_actionable() {
        let err = ProgramStateError::AlreadyActive {
            active: "Linear 5x5".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "program `Linear 5x5` is already active; finish or cancel your current program first"
        );
    }

    #[test]
    fn test_validation_error_display() {
        assert_eq!(
            ValidationError::RepRange { min: 8, max: 5 }.to_string(),
            "rep range 8-5 is invalid: need 0 < min <= max"
        );
        assert_eq!(
            ValidationError::SetCount(11).to_string(),
            "set count 11 is outside 1..=10"
        );
        assert_eq!(
            ValidationError::WeekSequence {
                expected: 2,
                found: 3
            }
            .to_string(),
            "week numbers must be contiguous from 1: expected 2, found 3"
        );
    }
}
