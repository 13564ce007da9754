use std::collections::HashMap;

use crate::models::question::QuestionDetails;
use crate::models::test_status::TestStatus;

pub struct ScoringService;

impl ScoringService {
    /// Correctness of `answer_id` for `question`, or `None` when the answer
    /// does not belong to it.
    pub fn grade_answer(question: &QuestionDetails, answer_id: i64) -> Option<bool> {
        question
            .answers
            .iter()
            .find(|a| a.id == answer_id)
            .map(|a| a.is_correct)
    }

    /// Share of result-bearing sessions that passed, in percent.
    pub fn pass_rate(by_status: &HashMap<String, i64>) -> f64 {
        let count = |status: TestStatus| by_status.get(status.as_str()).copied().unwrap_or(0);
        let with_result: i64 = TestStatus::ALL
            .into_iter()
            .filter(|s| s.has_result())
            .map(count)
            .sum();
        if with_result == 0 {
            return 0.0;
        }
        count(TestStatus::Passed) as f64 / with_result as f64 * 100.0
    }
}
