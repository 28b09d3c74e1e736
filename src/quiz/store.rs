use std::path::{Path, PathBuf};

use anyhow::Context as _;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::fs;
use tokio::io::AsyncWriteExt as _;
use tokio::sync::Mutex;

use crate::quiz::{QuizQuestion, QuizSession, percentage};

pub const HISTORY_LIMIT: usize = 20;
/// Attempts at or above this share of correct answers are shown as passed.
pub const PASS_RATIO: f64 = 0.7;
const RESULTS_FILE: &str = "quiz_results.jsonl";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnsweredQuestion {
    #[serde(flatten)]
    pub question: QuizQuestion,
    pub user_answer: String,
    pub is_correct: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizAttempt {
    pub id: String,
    pub user_id: String,
    pub quiz_type: String,
    pub total_questions: usize,
    pub correct_answers: usize,
    pub created_at: DateTime<Utc>,
    pub questions: Vec<AnsweredQuestion>,
}

impl QuizAttempt {
    /// Snapshot of a finished session: only the counted questions, with the user's answers.
    pub fn from_session(session: &QuizSession, user_id: &str) -> Self {
        let total = session.total();
        let questions = session
            .questions()
            .iter()
            .take(total)
            .enumerate()
            .map(|(i, question)| {
                let user_answer = session.answer_for(i).unwrap_or_default().to_owned();
                AnsweredQuestion {
                    is_correct: question.is_correct(&user_answer),
                    question: question.clone(),
                    user_answer,
                }
            })
            .collect();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_owned(),
            quiz_type: "mixed".to_owned(),
            total_questions: total,
            correct_answers: session.correct_count(),
            created_at: Utc::now(),
            questions,
        }
    }

    pub fn percentage(&self) -> u32 {
        percentage(self.correct_answers, self.total_questions)
    }

    pub fn passed(&self) -> bool {
        self.total_questions > 0
            && self.correct_answers as f64 / self.total_questions as f64 >= PASS_RATIO
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HistoryStats {
    pub count: usize,
    pub best_percentage: Option<u32>,
}

impl HistoryStats {
    pub fn from_attempts(attempts: &[QuizAttempt]) -> Self {
        Self {
            count: attempts.len(),
            best_percentage: attempts.iter().map(QuizAttempt::percentage).max(),
        }
    }
}

#[async_trait]
pub trait AttemptStore: Send + Sync {
    async fn record(&self, attempt: &QuizAttempt) -> anyhow::Result<()>;
    /// Newest first, at most `limit`.
    async fn recent(&self, user_id: &str, limit: usize) -> anyhow::Result<Vec<QuizAttempt>>;
    /// Returns how many attempts were removed.
    async fn delete_for_user(&self, user_id: &str) -> anyhow::Result<usize>;
}

/// Attempts as JSON lines in `<base_dir>/quiz_results.jsonl`.
#[derive(Debug)]
pub struct LocalFsAttemptStore {
    base_dir: PathBuf,
    write_lock: Mutex<()>,
}

impl LocalFsAttemptStore {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    fn results_path(&self) -> PathBuf {
        self.base_dir.join(RESULTS_FILE)
    }

    async fn read_all(&self) -> anyhow::Result<Vec<QuizAttempt>> {
        let path = self.results_path();
        let raw = match fs::read_to_string(&path).await {
            Ok(raw) => raw,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err).with_context(|| format!("read: {}", path.display())),
        };
        raw.lines()
            .filter(|line| !line.trim().is_empty())
            .enumerate()
            .map(|(i, line)| {
                serde_json::from_str(line)
                    .with_context(|| format!("parse {} line {}", path.display(), i + 1))
            })
            .collect()
    }
}

#[async_trait]
impl AttemptStore for LocalFsAttemptStore {
    async fn record(&self, attempt: &QuizAttempt) -> anyhow::Result<()> {
        let _guard = self.write_lock.lock().await;
        fs::create_dir_all(&self.base_dir)
            .await
            .with_context(|| format!("create store dir: {}", self.base_dir.display()))?;

        let mut line = serde_json::to_string(attempt).context("serialize attempt")?;
        line.push('\n');
        let path = self.results_path();
        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .await
            .with_context(|| format!("open: {}", path.display()))?;
        file.write_all(line.as_bytes())
            .await
            .with_context(|| format!("append: {}", path.display()))?;
        file.flush().await.context("flush attempt")?;
        tracing::info!(
            user_id = %attempt.user_id,
            total = attempt.total_questions,
            correct = attempt.correct_answers,
            "quiz attempt recorded"
        );
        Ok(())
    }

    async fn recent(&self, user_id: &str, limit: usize) -> anyhow::Result<Vec<QuizAttempt>> {
        let mut attempts: Vec<QuizAttempt> = self
            .read_all()
            .await?
            .into_iter()
            .filter(|a| a.user_id == user_id)
            .collect();
        attempts.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        attempts.truncate(limit);
        Ok(attempts)
    }

    async fn delete_for_user(&self, user_id: &str) -> anyhow::Result<usize> {
        let _guard = self.write_lock.lock().await;
        let attempts = self.read_all().await?;
        let before = attempts.len();
        let kept: Vec<QuizAttempt> = attempts.into_iter().filter(|a| a.user_id != user_id).collect();
        let removed = before - kept.len();
        if removed == 0 {
            return Ok(0);
        }

        let mut contents = String::new();
        for attempt in &kept {
            contents.push_str(&serde_json::to_string(attempt).context("serialize attempt")?);
            contents.push('\n');
        }
        write_atomic(&self.results_path(), contents.as_bytes()).await?;
        Ok(removed)
    }
}

pub(crate) async fn write_atomic(path: &Path, data: &[u8]) -> anyhow::Result<()> {
    let parent = path
        .parent()
        .ok_or_else(|| anyhow::anyhow!("path has no parent: {}", path.display()))?;
    fs::create_dir_all(parent)
        .await
        .with_context(|| format!("create parent dir: {}", parent.display()))?;

    let tmp_path = path.with_extension(format!("tmp.{}", uuid::Uuid::new_v4().simple()));
    fs::write(&tmp_path, data)
        .await
        .with_context(|| format!("write tmp: {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .await
        .with_context(|| format!("rename tmp to final: {}", path.display()))?;
    Ok(())
}
