use std::process::ExitCode;

use anyhow::Context as _;
use clap::Parser as _;

use govdoc::cli::{Cli, Command, LettersCommand, QuizCommand, TermsCommand};

#[tokio::main]
async fn main() -> ExitCode {
    if let Err(err) = try_main().await {
        eprintln!("{err:#}");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

async fn try_main() -> anyhow::Result<()> {
    govdoc::logging::init().context("init logging")?;

    let cli = Cli::parse();
    tracing::debug!(?cli, "parsed cli");

    match cli.command {
        Command::Import(args) => {
            govdoc::document::run(args).context("import")?;
        }
        Command::Translate(args) => {
            govdoc::translate::run(args).await.context("translate")?;
        }
        Command::Export(args) => {
            tokio::task::block_in_place(|| govdoc::export::run(args)).context("export")?;
        }
        Command::Pipeline(args) => {
            govdoc::session::run_pipeline(args)
                .await
                .context("pipeline")?;
        }
        Command::Edit(args) => {
            govdoc::editor::run(args).context("edit")?;
        }
        Command::Letters {
            command: LettersCommand::List(args),
        } => {
            govdoc::letters::run_list(args).context("letters list")?;
        }
        Command::Letters {
            command: LettersCommand::Render(args),
        } => {
            govdoc::letters::run_render(args).context("letters render")?;
        }
        Command::Terms {
            command: TermsCommand::List(args),
        } => {
            govdoc::terminology::run_list(args).context("terms list")?;
        }
        Command::Terms {
            command: TermsCommand::Export(args),
        } => {
            tokio::task::block_in_place(|| govdoc::terminology::run_export(args))
                .context("terms export")?;
        }
        Command::Quiz {
            command: QuizCommand::Run(args),
        } => {
            govdoc::quiz::play::run(args).await.context("quiz run")?;
        }
        Command::Quiz {
            command: QuizCommand::History(args),
        } => {
            govdoc::quiz::play::history(args)
                .await
                .context("quiz history")?;
        }
    }

    Ok(())
}
