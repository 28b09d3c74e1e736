//! Terminal front end for the quiz: `govdoc quiz run` and `govdoc quiz history`.

use std::io::Write;

use anyhow::Context as _;
use rand::SeedableRng as _;
use rand::rngs::StdRng;
use tokio::io::{AsyncBufRead, AsyncBufReadExt as _, BufReader};

use crate::cli::{QuizEngine, QuizHistoryArgs, QuizRunArgs};
use crate::config::{FunctionsConfig, GatewayConfig};
use crate::locale::{Locale, tr};
use crate::quiz::store::HISTORY_LIMIT;
use crate::quiz::{
    AttemptStore, FunctionsQuizGenerator, GatewayQuizGenerator, HistoryStats, LocalFsAttemptStore,
    LocalQuizGenerator, MatchOutcome, Phase, QuestionKind, QuizAttempt, QuizGenerator, QuizSession,
};
use crate::terminology;

const STOP: &str = "stop";

pub fn generator_for(
    engine: QuizEngine,
    functions_url: Option<&str>,
) -> anyhow::Result<Box<dyn QuizGenerator>> {
    Ok(match engine {
        QuizEngine::Local => Box::new(LocalQuizGenerator),
        QuizEngine::Gateway => Box::new(GatewayQuizGenerator::new(&GatewayConfig::from_env())?),
        QuizEngine::Functions => Box::new(FunctionsQuizGenerator::new(&FunctionsConfig::resolve(
            functions_url,
        )?)?),
    })
}

pub async fn run(args: QuizRunArgs) -> anyhow::Result<()> {
    let pool = terminology::load_pool(args.terms.as_deref())?;
    let mut rng = match args.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    };

    let sampled = super::sample_terms(&pool, &mut rng)
        .with_context(|| tr(args.lang, "quiz.need_terms").to_owned())?;
    let generator = generator_for(args.engine, args.functions_url.as_deref())?;
    let raw = generator
        .generate(&sampled, args.lang)
        .await
        .context("generate quiz")?;
    let questions = super::prepare_questions(raw, &sampled, args.lang, &mut rng);

    let mut session = QuizSession::new();
    session.start(questions, &mut rng);
    if session.phase() == Phase::NotStarted {
        anyhow::bail!("the quiz generator returned no questions");
    }

    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout().lock();
    play(&mut session, stdin, &mut stdout, args.lang, &mut rng).await?;
    print_summary(&session, &mut stdout, args.lang)?;

    if let Some(user_id) = args.user.as_deref() {
        let store = LocalFsAttemptStore::new(&args.store_dir);
        store
            .record(&QuizAttempt::from_session(&session, user_id))
            .await
            .context("record quiz attempt")?;
    }
    Ok(())
}

/// Drives a started session from line input until it finishes. End of input stops the quiz.
pub async fn play<R, W>(
    session: &mut QuizSession,
    input: R,
    out: &mut W,
    lang: Locale,
    rng: &mut StdRng,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();
    let total = session.questions().len();

    while let Some(question) = session.current().cloned() {
        let index = session.current_index();
        writeln!(out)?;
        writeln!(
            out,
            "[{}/{total}] {}",
            index + 1,
            tr(lang, question.kind.label_key())
        )?;
        writeln!(out, "{}", question.question)?;

        let stopped = if let Some(pairs) = question.pairs() {
            for (i, pair) in pairs.iter().enumerate() {
                writeln!(out, "  {}. {}", i + 1, pair.left)?;
            }
            for (i, right) in session.right_column().iter().enumerate() {
                writeln!(out, "  {}) {right}", letter(i))?;
            }
            writeln!(out, "{}", tr(lang, "quiz.match_prompt"))?;
            match_loop(session, &mut lines, out, lang).await?
        } else {
            let choices = match question.kind {
                QuestionKind::FillBlank => question.suggestions.clone().unwrap_or_default(),
                _ => question.options.clone().unwrap_or_default(),
            };
            if question.kind == QuestionKind::FillBlank {
                if !choices.is_empty() {
                    writeln!(out, "{} {}", tr(lang, "quiz.suggestions"), choices.join(" | "))?;
                }
            } else {
                for (i, choice) in choices.iter().enumerate() {
                    writeln!(out, "  {}. {choice}", i + 1)?;
                }
            }
            writeln!(out, "{}", tr(lang, "quiz.answer_prompt"))?;
            out.flush()?;
            match read_answer(&mut lines).await? {
                None => true,
                Some(line) => {
                    let answer = if question.kind == QuestionKind::FillBlank {
                        line
                    } else {
                        pick_option(&line, &choices)
                    };
                    session.answer(&answer)?;
                    false
                }
            }
        };

        if stopped {
            session.stop()?;
            break;
        }

        let answered = session.answer_for(index).unwrap_or_default();
        if question.is_correct(answered) {
            writeln!(out, "{}", tr(lang, "quiz.correct"))?;
        } else {
            writeln!(
                out,
                "{} {} {}",
                tr(lang, "quiz.incorrect"),
                tr(lang, "quiz.correct_answer"),
                question.correct_answer
            )?;
        }
        writeln!(out, "{} {}", session.correct_count(), tr(lang, "quiz.so_far"))?;
        session.next(rng)?;
    }
    Ok(())
}

/// Reads `N-x` pairings until the question is submitted. Returns whether the user stopped.
async fn match_loop<L, W>(
    session: &mut QuizSession,
    lines: &mut tokio::io::Lines<L>,
    out: &mut W,
    lang: Locale,
) -> anyhow::Result<bool>
where
    L: AsyncBufRead + Unpin,
    W: Write,
{
    loop {
        out.flush()?;
        let Some(line) = read_answer(lines).await? else {
            return Ok(true);
        };
        let Some((left, right)) = parse_pairing(&line) else {
            writeln!(out, "{}", tr(lang, "quiz.match_prompt"))?;
            continue;
        };
        if let Err(err) = session.select_left(left) {
            writeln!(out, "{}", err.public_message())?;
            continue;
        }
        match session.select_right(right) {
            Ok(MatchOutcome::Submitted { .. }) => return Ok(false),
            Ok(MatchOutcome::Paired { matched, of }) => {
                writeln!(out, "{matched}/{of} {}", tr(lang, "quiz.matched"))?;
            }
            Ok(MatchOutcome::Ignored) => {}
            Err(err) => writeln!(out, "{}", err.public_message())?,
        }
    }
}

/// `None` on end of input or `stop`.
async fn read_answer<L: AsyncBufRead + Unpin>(
    lines: &mut tokio::io::Lines<L>,
) -> anyhow::Result<Option<String>> {
    loop {
        let Some(line) = lines.next_line().await.context("read answer")? else {
            return Ok(None);
        };
        let line = line.trim();
        if line.eq_ignore_ascii_case(STOP) {
            return Ok(None);
        }
        if !line.is_empty() {
            return Ok(Some(line.to_owned()));
        }
    }
}

/// A 1-based option number selects that option; anything else is taken as typed.
fn pick_option(line: &str, options: &[String]) -> String {
    line.parse::<usize>()
        .ok()
        .and_then(|n| n.checked_sub(1))
        .and_then(|i| options.get(i))
        .cloned()
        .unwrap_or_else(|| line.to_owned())
}

/// `2-c` → (1, 2).
fn parse_pairing(line: &str) -> Option<(usize, usize)> {
    let (left, right) = line.split_once('-')?;
    let left = left.trim().parse::<usize>().ok()?.checked_sub(1)?;
    let right = right.trim().to_ascii_lowercase();
    let mut chars = right.chars();
    let ch = chars.next()?;
    if chars.next().is_some() || !ch.is_ascii_lowercase() {
        return None;
    }
    Some((left, (ch as u8 - b'a') as usize))
}

fn letter(index: usize) -> char {
    (b'a' + (index % 26) as u8) as char
}

fn print_summary<W: Write>(session: &QuizSession, out: &mut W, lang: Locale) -> anyhow::Result<()> {
    let total = session.total();
    writeln!(out)?;
    writeln!(out, "{}", tr(lang, "quiz.complete"))?;
    writeln!(out, "{}%", session.percentage())?;
    writeln!(
        out,
        "{}/{total} {}",
        session.correct_count(),
        tr(lang, "quiz.correct_answers")
    )?;
    if let Phase::Finished {
        stopped_early: true,
    } = session.phase()
    {
        writeln!(
            out,
            "({} {total}/{})",
            tr(lang, "quiz.stopped_at"),
            session.questions().len()
        )?;
    }
    for (i, question) in session.questions().iter().take(total).enumerate() {
        let answer = session.answer_for(i).unwrap_or_default();
        if question.is_correct(answer) {
            writeln!(out, "  ✓ {}", question.question)?;
        } else {
            writeln!(out, "  ✗ {}", question.question)?;
            writeln!(out, "    {} {}", tr(lang, "quiz.correct_answer"), question.correct_answer)?;
        }
    }
    out.flush()?;
    Ok(())
}

pub async fn history(args: QuizHistoryArgs) -> anyhow::Result<()> {
    let store = LocalFsAttemptStore::new(&args.store_dir);
    let attempts = store
        .recent(&args.user, HISTORY_LIMIT)
        .await
        .context("load quiz history")?;

    println!("{}", tr(args.lang, "quiz.history"));
    if attempts.is_empty() {
        println!("{}", tr(args.lang, "quiz.no_history"));
        return Ok(());
    }
    for attempt in &attempts {
        let when = attempt
            .created_at
            .with_timezone(&chrono::Local)
            .format(args.lang.date_format());
        println!(
            "{:>2}/{:<2} {}  {when}  {}%{}",
            attempt.correct_answers,
            attempt.total_questions,
            tr(args.lang, "quiz.correct_short"),
            attempt.percentage(),
            if attempt.passed() { " ★" } else { "" }
        );
    }
    let stats = HistoryStats::from_attempts(&attempts);
    println!();
    println!(
        "{} {} · {} {}%",
        stats.count,
        tr(args.lang, "quiz.completed"),
        tr(args.lang, "quiz.best"),
        stats.best_percentage.unwrap_or_default()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::quiz::{MatchPair, QuizQuestion};

    fn question(kind: QuestionKind, correct: &str) -> QuizQuestion {
        QuizQuestion {
            kind,
            question: format!("Q {correct}?"),
            options: None,
            correct_answer: correct.to_owned(),
            suggestions: None,
            match_pairs: None,
        }
    }

    #[test]
    fn pairings_parse_number_dash_letter() {
        assert_eq!(parse_pairing("2-c"), Some((1, 2)));
        assert_eq!(parse_pairing(" 1 - A "), Some((0, 0)));
        assert_eq!(parse_pairing("0-a"), None);
        assert_eq!(parse_pairing("1-ab"), None);
    }

    #[test]
    fn option_numbers_select_options() {
        let options = vec!["Loi".to_owned(), "Décret".to_owned()];
        assert_eq!(pick_option("2", &options), "Décret");
        assert_eq!(pick_option("9", &options), "9");
        assert_eq!(pick_option("loi", &options), "loi");
    }

    #[tokio::test]
    async fn scripted_answers_play_through_and_stop() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut mc = question(QuestionKind::MultipleChoice, "Decree");
        mc.options = Some(vec!["Law".to_owned(), "Decree".to_owned()]);
        let questions = vec![
            mc,
            question(QuestionKind::FillBlank, "Budget"),
            question(QuestionKind::FillBlank, "Law"),
        ];
        let mut session = QuizSession::new();
        session.start(questions, &mut rng);

        let input: &[u8] = b"2\n budget \nstop\n";
        let mut out = Vec::new();
        play(&mut session, input, &mut out, Locale::En, &mut rng)
            .await
            .unwrap();

        assert_eq!(
            session.phase(),
            Phase::Finished {
                stopped_early: true
            }
        );
        assert_eq!((session.correct_count(), session.total()), (2, 2));
        let printed = String::from_utf8(out).unwrap();
        assert!(printed.contains("[1/3] Multiple Choice"));
        assert!(printed.contains("2 correct so far"));
    }

    #[tokio::test]
    async fn matching_questions_take_pairings() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut matching = question(QuestionKind::MatchDefinition, "ok");
        matching.match_pairs = Some(vec![
            MatchPair {
                left: "Loi".to_owned(),
                right: "Law".to_owned(),
            },
            MatchPair {
                left: "Décret".to_owned(),
                right: "Decree".to_owned(),
            },
        ]);
        let mut session = QuizSession::new();
        session.start(vec![matching], &mut rng);
        let column: Vec<String> = session.right_column().iter().map(|s| s.to_string()).collect();
        let law = letter(column.iter().position(|c| c == "Law").unwrap());
        let decree = letter(column.iter().position(|c| c == "Decree").unwrap());

        let script = format!("1-{law}\n2-{decree}\n");
        let mut out = Vec::new();
        play(&mut session, script.as_bytes(), &mut out, Locale::Fr, &mut rng)
            .await
            .unwrap();
        assert_eq!(session.correct_count(), 1);
        assert!(String::from_utf8(out).unwrap().contains("1/2 associés"));
    }
}
