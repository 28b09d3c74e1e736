//! Terminology quiz: question generation, answering, matching and scoring.

pub mod generator;
pub mod play;
pub mod store;

use std::collections::{BTreeMap, BTreeSet};

use rand::Rng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::error::{PortalError, PortalResult};
use crate::locale::Locale;
use crate::terminology::Term;

pub use generator::{FunctionsQuizGenerator, GatewayQuizGenerator, LocalQuizGenerator, QuizGenerator};
pub use store::{AttemptStore, HistoryStats, LocalFsAttemptStore, QuizAttempt};

pub const MIN_TERMS: usize = 4;
pub const MAX_SAMPLED_TERMS: usize = 15;
pub const QUESTIONS_PER_QUIZ: usize = 10;
const SUGGESTION_DISTRACTORS: usize = 3;
const MAX_MATCH_PAIRS: usize = 4;
/// Answer recorded when a matching question was paired incorrectly.
pub const WRONG_MATCH: &str = "wrong_match";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionKind {
    MultipleChoice,
    FillBlank,
    MatchDefinition,
}

impl QuestionKind {
    pub fn label_key(self) -> &'static str {
        match self {
            Self::MultipleChoice => "quiz.type.multiple_choice",
            Self::FillBlank => "quiz.type.fill_blank",
            Self::MatchDefinition => "quiz.type.match_definition",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchPair {
    pub left: String,
    pub right: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizQuestion {
    #[serde(rename = "type")]
    pub kind: QuestionKind,
    pub question: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub options: Option<Vec<String>>,
    pub correct_answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggestions: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub match_pairs: Option<Vec<MatchPair>>,
}

impl QuizQuestion {
    pub fn is_correct(&self, answer: &str) -> bool {
        answers_match(answer, &self.correct_answer)
    }

    /// Pairs to match, when this is an interactive matching question.
    pub fn pairs(&self) -> Option<&[MatchPair]> {
        match (&self.kind, &self.match_pairs) {
            (QuestionKind::MatchDefinition, Some(pairs)) if !pairs.is_empty() => Some(pairs),
            _ => None,
        }
    }
}

/// Trimmed, case-insensitive exact comparison.
pub fn answers_match(answer: &str, correct: &str) -> bool {
    answer.trim().to_lowercase() == correct.trim().to_lowercase()
}

/// Picks up to fifteen distinct terms, refusing pools with fewer than four.
pub fn sample_terms<R: Rng + ?Sized>(pool: &[Term], rng: &mut R) -> PortalResult<Vec<Term>> {
    if pool.len() < MIN_TERMS {
        return Err(PortalError::InsufficientTerms {
            available: pool.len(),
            required: MIN_TERMS,
        });
    }
    Ok(pool
        .choose_multiple(rng, MAX_SAMPLED_TERMS.min(pool.len()))
        .cloned()
        .collect())
}

/// Fills in what the generator leaves to the client: suggestion chips for fill-in-the-blank
/// questions and term pairs for matching questions.
pub fn prepare_questions<R: Rng + ?Sized>(
    mut questions: Vec<QuizQuestion>,
    sampled: &[Term],
    lang: Locale,
    rng: &mut R,
) -> Vec<QuizQuestion> {
    for question in &mut questions {
        match question.kind {
            QuestionKind::FillBlank if question.suggestions.is_none() => {
                let correct = question.correct_answer.clone();
                let mut candidates: Vec<String> = sampled
                    .iter()
                    .map(|t| t.in_lang(lang.code()).to_owned())
                    .filter(|t| t.to_lowercase() != correct.to_lowercase())
                    .collect();
                candidates.shuffle(rng);
                candidates.truncate(SUGGESTION_DISTRACTORS);
                let mut suggestions = vec![correct];
                suggestions.extend(candidates);
                suggestions.shuffle(rng);
                question.suggestions = Some(suggestions);
            }
            QuestionKind::MatchDefinition if question.match_pairs.is_none() => {
                let count = MAX_MATCH_PAIRS.min(sampled.len());
                let pairs = sampled
                    .choose_multiple(rng, count)
                    .map(|t| MatchPair {
                        left: t.fr.clone(),
                        right: t.en.clone(),
                    })
                    .collect();
                question.match_pairs = Some(pairs);
            }
            _ => {}
        }
    }
    questions
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    NotStarted,
    InProgress,
    Finished { stopped_early: bool },
}

/// Pairing progress on the current matching question.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct MatchState {
    selected_left: Option<usize>,
    /// left index -> right index, in generation order.
    paired: BTreeMap<usize, usize>,
    /// Display order of the right column (indices into the pairs).
    right_order: Vec<usize>,
}

/// What happened after a pick in the right column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MatchOutcome {
    Ignored,
    Paired { matched: usize, of: usize },
    Submitted { correct: bool },
}

#[derive(Debug, Clone)]
pub struct QuizSession {
    questions: Vec<QuizQuestion>,
    current: usize,
    answers: BTreeMap<usize, String>,
    shown: BTreeSet<usize>,
    phase: Phase,
    total: usize,
    matching: MatchState,
}

impl Default for QuizSession {
    fn default() -> Self {
        Self::new()
    }
}

impl QuizSession {
    pub fn new() -> Self {
        Self {
            questions: Vec::new(),
            current: 0,
            answers: BTreeMap::new(),
            shown: BTreeSet::new(),
            phase: Phase::NotStarted,
            total: 0,
            matching: MatchState::default(),
        }
    }

    /// Replaces any previous quiz with `questions`. An empty list leaves the session not started.
    pub fn start<R: Rng + ?Sized>(&mut self, questions: Vec<QuizQuestion>, rng: &mut R) {
        *self = Self::new();
        if questions.is_empty() {
            return;
        }
        self.total = questions.len();
        self.questions = questions;
        self.phase = Phase::InProgress;
        self.enter_question(rng);
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn questions(&self) -> &[QuizQuestion] {
        &self.questions
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current(&self) -> Option<&QuizQuestion> {
        match self.phase {
            Phase::InProgress => self.questions.get(self.current),
            _ => None,
        }
    }

    pub fn answer_for(&self, index: usize) -> Option<&str> {
        self.answers.get(&index).map(String::as_str)
    }

    pub fn is_shown(&self, index: usize) -> bool {
        self.shown.contains(&index)
    }

    /// Records the answer to the current question and reveals the result.
    pub fn answer(&mut self, answer: &str) -> PortalResult<bool> {
        let question = self.require_open_question()?;
        let correct = question.is_correct(answer);
        self.answers.insert(self.current, answer.to_owned());
        self.shown.insert(self.current);
        tracing::debug!(question = self.current, correct, "quiz answer");
        Ok(correct)
    }

    /// Right column in display order.
    pub fn right_column(&self) -> Vec<&str> {
        let Some(pairs) = self.current().and_then(QuizQuestion::pairs) else {
            return Vec::new();
        };
        self.matching
            .right_order
            .iter()
            .filter_map(|&i| pairs.get(i).map(|p| p.right.as_str()))
            .collect()
    }

    pub fn is_left_paired(&self, left: usize) -> bool {
        self.matching.paired.contains_key(&left)
    }

    /// Whether the right item at `display` position is already used.
    pub fn is_right_paired(&self, display: usize) -> bool {
        self.resolve_right(display)
            .is_some_and(|right| self.matching.paired.values().any(|&r| r == right))
    }

    pub fn select_left(&mut self, left: usize) -> PortalResult<()> {
        let pairs_len = self.current_pairs()?.len();
        if left >= pairs_len {
            return Err(PortalError::Validation(format!("no left item {}", left + 1)));
        }
        if self.is_left_paired(left) {
            return Err(PortalError::Validation(format!("left item {} is already matched", left + 1)));
        }
        self.matching.selected_left = Some(left);
        Ok(())
    }

    /// Pairs the selected left item with the right item shown at `display`. Once every left
    /// item is paired the question is submitted: all pairs index-identical counts as correct.
    pub fn select_right(&mut self, display: usize) -> PortalResult<MatchOutcome> {
        let pairs_len = self.current_pairs()?.len();
        let Some(left) = self.matching.selected_left else {
            return Ok(MatchOutcome::Ignored);
        };
        let Some(right) = self.resolve_right(display) else {
            return Err(PortalError::Validation(format!("no right item {}", display + 1)));
        };
        if self.matching.paired.values().any(|&r| r == right) {
            return Ok(MatchOutcome::Ignored);
        }

        self.matching.paired.insert(left, right);
        self.matching.selected_left = None;
        if self.matching.paired.len() < pairs_len {
            return Ok(MatchOutcome::Paired {
                matched: self.matching.paired.len(),
                of: pairs_len,
            });
        }

        let all_correct = self.matching.paired.iter().all(|(l, r)| l == r);
        let answer = if all_correct {
            self.questions[self.current].correct_answer.clone()
        } else {
            WRONG_MATCH.to_owned()
        };
        let correct = self.answer(&answer)?;
        Ok(MatchOutcome::Submitted { correct })
    }

    /// Moves on after the current question was answered; past the last one the quiz finishes.
    pub fn next<R: Rng + ?Sized>(&mut self, rng: &mut R) -> PortalResult<Phase> {
        if self.phase != Phase::InProgress {
            return Err(PortalError::Validation("no quiz in progress".to_owned()));
        }
        if !self.is_shown(self.current) {
            return Err(PortalError::Validation("answer the question first".to_owned()));
        }
        if self.current + 1 < self.questions.len() {
            self.current += 1;
            self.enter_question(rng);
        } else {
            self.finish(self.questions.len());
        }
        Ok(self.phase)
    }

    /// Ends the quiz early; the current question counts only if it was answered.
    pub fn stop(&mut self) -> PortalResult<Phase> {
        if self.phase != Phase::InProgress {
            return Err(PortalError::Validation("no quiz in progress".to_owned()));
        }
        let total = self.current + usize::from(self.is_shown(self.current));
        self.finish(total);
        Ok(self.phase)
    }

    /// Questions counted in the score.
    pub fn total(&self) -> usize {
        self.total
    }

    pub fn correct_count(&self) -> usize {
        self.correct_up_to(self.total)
    }

    pub fn percentage(&self) -> u32 {
        percentage(self.correct_count(), self.total)
    }

    fn correct_up_to(&self, limit: usize) -> usize {
        self.answers
            .iter()
            .filter(|(i, answer)| {
                **i < limit && self.questions.get(**i).is_some_and(|q| q.is_correct(answer))
            })
            .count()
    }

    fn finish(&mut self, total: usize) {
        self.total = total;
        self.phase = Phase::Finished {
            stopped_early: total < self.questions.len(),
        };
        tracing::info!(
            total,
            correct = self.correct_count(),
            questions = self.questions.len(),
            "quiz finished"
        );
    }

    fn enter_question<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.matching = MatchState::default();
        if let Some(pairs) = self.questions.get(self.current).and_then(QuizQuestion::pairs) {
            let mut order: Vec<usize> = (0..pairs.len()).collect();
            order.shuffle(rng);
            self.matching.right_order = order;
        }
    }

    fn require_open_question(&self) -> PortalResult<&QuizQuestion> {
        let question = self
            .current()
            .ok_or_else(|| PortalError::Validation("no quiz in progress".to_owned()))?;
        if self.is_shown(self.current) {
            return Err(PortalError::Validation("question already answered".to_owned()));
        }
        Ok(question)
    }

    fn current_pairs(&self) -> PortalResult<&[MatchPair]> {
        let question = self.require_open_question()?;
        question
            .pairs()
            .ok_or_else(|| PortalError::Validation("not a matching question".to_owned()))
    }

    /// The displayed right item, looked up by content among the pairs.
    fn resolve_right(&self, display: usize) -> Option<usize> {
        let pairs = self.current().and_then(QuizQuestion::pairs)?;
        let shown = pairs.get(*self.matching.right_order.get(display)?)?;
        pairs.iter().position(|p| p.right == shown.right)
    }
}

pub fn percentage(correct: usize, total: usize) -> u32 {
    if total == 0 {
        return 0;
    }
    ((correct as f64 / total as f64) * 100.0).round() as u32
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    use super::*;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    fn terms(n: usize) -> Vec<Term> {
        (0..n)
            .map(|i| Term::new(format!("terme {i}"), format!("term {i}")))
            .collect()
    }

    fn question(kind: QuestionKind, correct: &str) -> QuizQuestion {
        QuizQuestion {
            kind,
            question: format!("q for {correct}"),
            options: None,
            correct_answer: correct.to_owned(),
            suggestions: None,
            match_pairs: None,
        }
    }

    fn matching(pairs: &[(&str, &str)]) -> QuizQuestion {
        QuizQuestion {
            match_pairs: Some(
                pairs
                    .iter()
                    .map(|(l, r)| MatchPair {
                        left: (*l).to_owned(),
                        right: (*r).to_owned(),
                    })
                    .collect(),
            ),
            ..question(QuestionKind::MatchDefinition, "all")
        }
    }

    #[test]
    fn equality_is_trimmed_and_case_insensitive() {
        assert!(answers_match(" budget ", "Budget"));
        assert!(!answers_match("Budget ", "Budgets"));
    }

    #[test]
    fn sampling_needs_four_terms() {
        let err = sample_terms(&terms(3), &mut rng()).unwrap_err();
        assert!(matches!(
            err,
            PortalError::InsufficientTerms {
                available: 3,
                required: 4
            }
        ));
        assert_eq!(sample_terms(&terms(4), &mut rng()).unwrap().len(), 4);
        let sampled = sample_terms(&terms(40), &mut rng()).unwrap();
        assert_eq!(sampled.len(), MAX_SAMPLED_TERMS);
        let distinct: BTreeSet<&str> = sampled.iter().map(|t| t.fr.as_str()).collect();
        assert_eq!(distinct.len(), MAX_SAMPLED_TERMS);
    }

    #[test]
    fn fill_blank_gets_correct_answer_and_three_distractors() {
        let sampled = terms(6);
        let questions = vec![question(QuestionKind::FillBlank, "TERM 2")];
        let prepared = prepare_questions(questions, &sampled, Locale::En, &mut rng());
        let suggestions = prepared[0].suggestions.clone().unwrap();
        assert_eq!(suggestions.len(), 4);
        assert_eq!(suggestions.iter().filter(|s| s.as_str() == "TERM 2").count(), 1);
        assert!(!suggestions.iter().any(|s| s == "term 2"));
    }

    #[test]
    fn existing_suggestions_and_pairs_are_kept() {
        let mut fill = question(QuestionKind::FillBlank, "x");
        fill.suggestions = Some(vec!["x".to_owned()]);
        let matched = matching(&[("a", "b")]);
        let prepared = prepare_questions(vec![fill.clone(), matched.clone()], &terms(5), Locale::Fr, &mut rng());
        assert_eq!(prepared, vec![fill, matched]);
    }

    #[test]
    fn matching_questions_get_up_to_four_pairs() {
        let prepared = prepare_questions(
            vec![question(QuestionKind::MatchDefinition, "m")],
            &terms(9),
            Locale::Fr,
            &mut rng(),
        );
        let pairs = prepared[0].match_pairs.as_ref().unwrap();
        assert_eq!(pairs.len(), 4);
        for pair in pairs {
            assert_eq!(pair.left.replace("terme", "term"), pair.right);
        }
    }

    #[test]
    fn answering_then_next_walks_to_the_end() {
        let mut session = QuizSession::new();
        session.start(
            vec![
                question(QuestionKind::MultipleChoice, "a"),
                question(QuestionKind::FillBlank, "b"),
            ],
            &mut rng(),
        );
        assert_eq!(session.phase(), Phase::InProgress);
        assert!(session.next(&mut rng()).is_err());
        assert!(session.answer("A ").unwrap());
        assert!(session.answer("again").is_err());
        assert_eq!(session.next(&mut rng()).unwrap(), Phase::InProgress);
        assert!(!session.answer("c").unwrap());
        assert_eq!(
            session.next(&mut rng()).unwrap(),
            Phase::Finished {
                stopped_early: false
            }
        );
        assert_eq!((session.correct_count(), session.total()), (1, 2));
        assert_eq!(session.percentage(), 50);
    }

    #[test]
    fn stop_counts_the_current_question_only_when_answered() {
        let questions: Vec<_> = ["a", "b", "c"]
            .iter()
            .map(|c| question(QuestionKind::MultipleChoice, c))
            .collect();

        let mut session = QuizSession::new();
        session.start(questions.clone(), &mut rng());
        session.answer("a").unwrap();
        session.next(&mut rng()).unwrap();
        assert_eq!(
            session.stop().unwrap(),
            Phase::Finished {
                stopped_early: true
            }
        );
        assert_eq!((session.correct_count(), session.total()), (1, 1));

        let mut session = QuizSession::new();
        session.start(questions, &mut rng());
        session.answer("a").unwrap();
        session.next(&mut rng()).unwrap();
        session.answer("b").unwrap();
        session.stop().unwrap();
        assert_eq!((session.correct_count(), session.total()), (2, 2));
    }

    #[test]
    fn matching_submits_once_every_left_item_is_paired() {
        let mut session = QuizSession::new();
        session.start(
            vec![matching(&[("Décret", "Decree"), ("Budget", "Budget"), ("Loi", "Law")])],
            &mut rng(),
        );
        let column: Vec<String> = session.right_column().iter().map(|s| s.to_string()).collect();
        let position = |right: &str| column.iter().position(|c| c == right).unwrap();

        assert_eq!(session.select_right(0).unwrap(), MatchOutcome::Ignored);
        session.select_left(0).unwrap();
        assert_eq!(
            session.select_right(position("Decree")).unwrap(),
            MatchOutcome::Paired { matched: 1, of: 3 }
        );
        assert!(session.is_right_paired(position("Decree")));
        assert!(session.select_left(0).is_err());
        session.select_left(1).unwrap();
        session.select_right(position("Budget")).unwrap();
        session.select_left(2).unwrap();
        assert_eq!(
            session.select_right(position("Law")).unwrap(),
            MatchOutcome::Submitted { correct: true }
        );
        assert_eq!(session.answer_for(0), Some("all"));
    }

    #[test]
    fn crossed_pairs_record_wrong_match() {
        let mut session = QuizSession::new();
        session.start(vec![matching(&[("Décret", "Decree"), ("Loi", "Law")])], &mut rng());
        let column: Vec<String> = session.right_column().iter().map(|s| s.to_string()).collect();
        let position = |right: &str| column.iter().position(|c| c == right).unwrap();

        session.select_left(0).unwrap();
        session.select_right(position("Law")).unwrap();
        session.select_left(1).unwrap();
        assert_eq!(
            session.select_right(position("Decree")).unwrap(),
            MatchOutcome::Submitted { correct: false }
        );
        assert_eq!(session.answer_for(0), Some(WRONG_MATCH));
    }

    #[test]
    fn restarting_replaces_a_finished_quiz() {
        let mut session = QuizSession::new();
        session.start(vec![question(QuestionKind::FillBlank, "a")], &mut rng());
        session.stop().unwrap();
        assert!(matches!(session.phase(), Phase::Finished { .. }));
        session.start(vec![question(QuestionKind::FillBlank, "b")], &mut rng());
        assert_eq!(session.phase(), Phase::InProgress);
        assert_eq!(session.answer_for(0), None);
    }

    #[test]
    fn question_wire_shape_uses_type_tag() {
        let raw = r#"{"type":"match_definition","question":"q","options":["a","b"],"correct_answer":"a"}"#;
        let parsed: QuizQuestion = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.kind, QuestionKind::MatchDefinition);
        assert!(parsed.pairs().is_none());
        let value = serde_json::to_value(&parsed).unwrap();
        assert!(value.get("suggestions").is_none());
    }
}
