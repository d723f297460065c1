//! Answer evaluation agent

use super::{AgentError, EvaluationResult, TutorAgent};

const CORRECT_SCORE: f64 = 85.0;
const INCORRECT_SCORE: f64 = 40.0;
const GRADE_SCAN_CHARS: usize = 100;

/// Judges a submitted answer by asking the tutor for a verdict and grading
/// the free-text reply with a keyword heuristic.
#[derive(Clone)]
pub struct AnswerEvaluator {
    tutor: TutorAgent,
}

impl AnswerEvaluator {
    pub fn new(tutor: TutorAgent) -> Self {
        Self { tutor }
    }

    pub async fn evaluate(&self, answer: &str) -> Result<EvaluationResult, AgentError> {
        let prompt = format!(
            "Evaluate this student answer and provide feedback.\n\n\
             Problem context available in session.\n\
             Student answer: {answer}\n\n\
             Provide:\n\
             1. Is it correct? (yes/no)\n\
             2. Score out of 100\n\
             3. Constructive feedback"
        );

        let feedback = self.tutor.respond(&prompt, &[]).await?;
        Ok(grade_reply(feedback))
    }
}

/// Correctness heuristic kept intact for parity with existing callers:
/// "yes" anywhere in the first 100 characters means correct, and the score
/// is a fixed two-point scale rather than a continuous grade.
fn grade_reply(feedback: String) -> EvaluationResult {
    let head: String = feedback
        .chars()
        .take(GRADE_SCAN_CHARS)
        .collect::<String>()
        .to_lowercase();
    let is_correct = head.contains("yes");

    EvaluationResult {
        is_correct,
        score: if is_correct {
            CORRECT_SCORE
        } else {
            INCORRECT_SCORE
        },
        feedback,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::retry::RetryPolicy;
    use crate::llm::testing::ScriptedService;
    use std::sync::Arc;

    fn evaluator_with(reply: &str) -> AnswerEvaluator {
        let tutor = TutorAgent::new(Arc::new(ScriptedService::always(reply)), 1000, 0.7)
            .with_retry(RetryPolicy {
                jitter: false,
                ..RetryPolicy::default()
            });
        AnswerEvaluator::new(tutor)
    }

    #[tokio::test]
    async fn affirmative_reply_grades_correct() {
        let evaluator = evaluator_with("Yes, correct! Great use of the divide step.");
        let result = evaluator.evaluate("O(log n)").await.unwrap();
        assert!(result.is_correct);
        assert_eq!(result.score, 85.0);
        assert_eq!(result.feedback, "Yes, correct! Great use of the divide step.");
    }

    #[tokio::test]
    async fn negative_reply_grades_incorrect() {
        let evaluator = evaluator_with("No, that's wrong because the base case is missing.");
        let result = evaluator.evaluate("just loop").await.unwrap();
        assert!(!result.is_correct);
        assert_eq!(result.score, 40.0);
    }

    #[test]
    fn yes_beyond_first_100_chars_does_not_count() {
        let padding = "x".repeat(100);
        let result = grade_reply(format!("{padding} yes, actually fine"));
        assert!(!result.is_correct);
        assert_eq!(result.score, 40.0);
    }

    #[test]
    fn yes_is_case_insensitive() {
        let result = grade_reply("YES - this nails it.".to_string());
        assert!(result.is_correct);
    }

    #[test]
    fn feedback_is_passed_through_verbatim() {
        let reply = "No. Here is why...\nLine two.";
        let result = grade_reply(reply.to_string());
        assert_eq!(result.feedback, reply);
    }
}
