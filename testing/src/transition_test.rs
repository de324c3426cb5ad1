//! Given-When-Then harness for pure transition functions.
//!
//! A transition takes the current state and an input and either produces an
//! output or rejects the input, e.g. a shipment patch planner.

#![allow(clippy::module_name_repetitions)]

use bloodbank_core::BloodBankError;

type Transition<S, I, O> = Box<dyn FnOnce(&S, I) -> Result<O, BloodBankError>>;

type OutputAssertion<S, O> = Box<dyn FnOnce(&S, &O)>;

type ErrorAssertion = Box<dyn FnOnce(&BloodBankError)>;

/// Fluent API for testing transitions.
///
/// # Example
///
/// ```ignore
/// use bloodbank_testing::TransitionTest;
///
/// TransitionTest::new(move |current, patch| plan_update(current, patch, now))
///     .given_state(pending_distribution)
///     .when(DistributionPatch::status(ShipmentPhase::Delivered))
///     .then_rejected(assertions::assert_validation)
///     .run();
/// ```
pub struct TransitionTest<S, I, O> {
    transition: Transition<S, I, O>,
    initial_state: Option<S>,
    input: Option<I>,
    output_assertions: Vec<OutputAssertion<S, O>>,
    error_assertions: Vec<ErrorAssertion>,
}

impl<S, I, O> TransitionTest<S, I, O>
where
    O: std::fmt::Debug,
{
    /// Create a test for `transition`.
    #[must_use]
    pub fn new<F>(transition: F) -> Self
    where
        F: FnOnce(&S, I) -> Result<O, BloodBankError> + 'static,
    {
        Self {
            transition: Box::new(transition),
            initial_state: None,
            input: None,
            output_assertions: Vec::new(),
            error_assertions: Vec::new(),
        }
    }

    /// Set the initial state (Given).
    #[must_use]
    pub fn given_state(mut self, state: S) -> Self {
        self.initial_state = Some(state);
        self
    }

    /// Set the input (When).
    #[must_use]
    pub fn when(mut self, input: I) -> Self {
        self.input = Some(input);
        self
    }

    /// Expect the input to be accepted and check the output (Then).
    #[must_use]
    pub fn then_output<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&S, &O) + 'static,
    {
        self.output_assertions.push(Box::new(assertion));
        self
    }

    /// Expect the input to be rejected and check the error (Then).
    #[must_use]
    pub fn then_rejected<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&BloodBankError) + 'static,
    {
        self.error_assertions.push(Box::new(assertion));
        self
    }

    /// Run the transition and every assertion.
    ///
    /// # Panics
    ///
    /// Panics if the state or input is missing, if the outcome has the wrong
    /// shape, or if any assertion fails.
    #[allow(clippy::panic)]
    #[allow(clippy::expect_used)]
    pub fn run(self) {
        let state = self
            .initial_state
            .expect("Initial state must be set with given_state()");
        let input = self.input.expect("Input must be set with when()");

        match (self.transition)(&state, input) {
            Ok(output) => {
                assert!(
                    self.error_assertions.is_empty(),
                    "Expected a rejection, but the transition produced {output:?}"
                );
                for assertion in self.output_assertions {
                    assertion(&state, &output);
                }
            }
            Err(err) => {
                assert!(
                    self.output_assertions.is_empty(),
                    "Expected an output, but the transition failed: {err}"
                );
                for assertion in self.error_assertions {
                    assertion(&err);
                }
            }
        }
    }
}

/// Helper assertions on [`BloodBankError`] kinds.
pub mod assertions {
    use bloodbank_core::BloodBankError;

    /// Assert the error is a validation failure.
    ///
    /// # Panics
    ///
    /// Panics for any other kind.
    #[allow(clippy::panic)]
    pub fn assert_validation(err: &BloodBankError) {
        assert!(
            matches!(err, BloodBankError::Validation(_)),
            "Expected Validation, got {err:?}"
        );
    }

    /// Assert the error is a state conflict.
    ///
    /// # Panics
    ///
    /// Panics for any other kind.
    #[allow(clippy::panic)]
    pub fn assert_conflict(err: &BloodBankError) {
        assert!(
            matches!(err, BloodBankError::Conflict(_)),
            "Expected Conflict, got {err:?}"
        );
    }

    /// Assert the error reports a missing `entity`.
    ///
    /// # Panics
    ///
    /// Panics for any other kind or entity.
    #[allow(clippy::panic)]
    pub fn assert_not_found(err: &BloodBankError, entity: &str) {
        match err {
            BloodBankError::NotFound { entity: found, .. } => assert_eq!(
                *found, entity,
                "Expected NotFound for {entity}, got NotFound for {found}"
            ),
            other => panic!("Expected NotFound for {entity}, got {other:?}"),
        }
    }

    /// Assert the error is a stock shortage, whether a named unit ran short
    /// or no unit matched at all.
    ///
    /// # Panics
    ///
    /// Panics for any other kind.
    #[allow(clippy::panic)]
    pub fn assert_insufficient_stock(err: &BloodBankError) {
        assert!(
            matches!(
                err,
                BloodBankError::InsufficientStock { .. } | BloodBankError::NoMatchingStock { .. }
            ),
            "Expected InsufficientStock or NoMatchingStock, got {err:?}"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn withdraw(balance: &u32, amount: u32) -> Result<u32, BloodBankError> {
        balance
            .checked_sub(amount)
            .ok_or_else(|| BloodBankError::Validation("overdrawn".to_string()))
    }

    #[test]
    fn accepted_input_runs_output_assertions() {
        TransitionTest::new(withdraw)
            .given_state(10)
            .when(4)
            .then_output(|before, after| {
                assert_eq!(*before, 10);
                assert_eq!(*after, 6);
            })
            .run();
    }

    #[test]
    fn rejected_input_runs_error_assertions() {
        TransitionTest::new(withdraw)
            .given_state(3)
            .when(4)
            .then_rejected(assertions::assert_validation)
            .run();
    }

    #[test]
    #[should_panic(expected = "Expected a rejection")]
    fn unexpected_success_fails_the_test() {
        TransitionTest::new(withdraw)
            .given_state(3)
            .when(1)
            .then_rejected(assertions::assert_validation)
            .run();
    }

    #[test]
    fn not_found_assertion_checks_entity() {
        assertions::assert_not_found(
            &BloodBankError::not_found("Facility", "x"),
            "Facility",
        );
    }
}
