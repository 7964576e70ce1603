//! Turn history of one attempt.

use std::collections::HashSet;

use crate::error::ToolstreamError;
use crate::types::{requests_of, ContentSegment, OperationResult, Turn};

/// Ordered turn history owned by the round controller.
///
/// A model turn that requests operations must be answered by exactly one
/// result per request id before anything else is appended.
#[derive(Debug, Clone, Default)]
pub struct RoundState {
    turns: Vec<Turn>,
    outstanding: Vec<String>,
}

impl RoundState {
    pub fn new(history: Vec<Turn>) -> Self {
        Self {
            turns: history,
            outstanding: Vec::new(),
        }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn into_turns(self) -> Vec<Turn> {
        self.turns
    }

    /// Request ids still waiting for a result.
    pub fn outstanding(&self) -> &[String] {
        &self.outstanding
    }

    /// Append the closed segments of a round.
    pub fn push_model(&mut self, segments: Vec<ContentSegment>) -> Result<(), ToolstreamError> {
        if !self.outstanding.is_empty() {
            return Err(ToolstreamError::InvalidState(format!(
                "model turn appended while {} operation results are outstanding",
                self.outstanding.len()
            )));
        }
        self.outstanding = requests_of(&segments)
            .into_iter()
            .map(|request| request.id)
            .collect();
        self.turns.push(Turn::Model { segments });
        Ok(())
    }

    /// Append the results answering the preceding model turn.
    pub fn push_operation_results(
        &mut self,
        results: Vec<OperationResult>,
    ) -> Result<(), ToolstreamError> {
        if self.outstanding.is_empty() {
            return Err(ToolstreamError::InvalidState(
                "operation results appended with no requests outstanding".to_string(),
            ));
        }
        let expected: HashSet<&str> = self.outstanding.iter().map(String::as_str).collect();
        let mut seen = HashSet::with_capacity(results.len());

        for result in &results {
            if !expected.contains(result.id.as_str()) {
                return Err(ToolstreamError::InvalidState(format!(
                    "result for unknown operation id {:?}",
                    result.id
                )));
            }
            if !seen.insert(result.id.as_str()) {
                return Err(ToolstreamError::InvalidState(format!(
                    "duplicate result for operation id {:?}",
                    result.id
                )));
            }
        }
        if seen.len() != expected.len() {
            let missing: Vec<&str> = expected.difference(&seen).copied().collect();
            return Err(ToolstreamError::InvalidState(format!(
                "missing results for operation ids {missing:?}"
            )));
        }

        self.outstanding.clear();
        self.turns.push(Turn::OperationResults { results });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OperationRequest;
    use serde_json::json;

    fn request(id: &str) -> OperationRequest {
        OperationRequest::new(id, "lookup", json!({}))
    }

    fn model_turn(ids: &[&str]) -> Vec<ContentSegment> {
        ids.iter()
            .map(|id| ContentSegment::ToolInvocation(request(id)))
            .collect()
    }

    #[test]
    fn accepts_one_result_per_request_in_any_order() {
        let mut state = RoundState::new(vec![Turn::user("hi")]);
        state.push_model(model_turn(&["a", "b"])).unwrap();
        assert_eq!(state.outstanding(), ["a", "b"]);

        state
            .push_operation_results(vec![
                OperationResult::payload(&request("b"), json!(2)),
                OperationResult::payload(&request("a"), json!(1)),
            ])
            .unwrap();
        assert!(state.outstanding().is_empty());
        assert_eq!(state.turns().len(), 3);
    }

    #[test]
    fn rejects_missing_duplicate_and_unknown_ids() {
        let cases = [
            vec![OperationResult::payload(&request("a"), json!(1))],
            vec![
                OperationResult::payload(&request("a"), json!(1)),
                OperationResult::payload(&request("a"), json!(1)),
            ],
            vec![
                OperationResult::payload(&request("a"), json!(1)),
                OperationResult::payload(&request("z"), json!(1)),
            ],
        ];
        for results in cases {
            let mut state = RoundState::default();
            state.push_model(model_turn(&["a", "b"])).unwrap();
            let err = state.push_operation_results(results).unwrap_err();
            assert!(matches!(err, ToolstreamError::InvalidState(_)));
            assert_eq!(state.turns().len(), 1);
        }
    }

    #[test]
    fn model_turn_blocked_while_results_outstanding() {
        let mut state = RoundState::default();
        state.push_model(model_turn(&["a"])).unwrap();
        assert!(state.push_model(Vec::new()).is_err());
    }

    #[test]
    fn results_without_a_requesting_turn_are_rejected() {
        let mut state = RoundState::default();
        assert!(state
            .push_operation_results(vec![OperationResult::payload(&request("a"), json!(1))])
            .is_err());
        assert!(state.push_operation_results(Vec::new()).is_err());
    }
}
