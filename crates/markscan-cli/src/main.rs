// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Markscan — photographed answer sheet grader
//
// Entry point. Initialises logging, loads the grader configuration, opens the
// store, and dispatches a subcommand. Results go to stdout as JSON; logs and
// error explanations go to stderr.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use markscan_core::config::GraderConfig;
use markscan_core::error::{MarkscanError, Result};
use markscan_core::human_errors::explain;
use markscan_core::types::{GradingSession, ImageId, QuizId};
use markscan_core::QuizDocument;
use markscan_grading::{RowMapping, SheetCorrector};
use markscan_scan::{ImageprocVision, TextExtractor, UnavailableTextExtractor};
use markscan_store::{ImageVault, SqliteStore};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "markscan")]
#[command(about = "Grade photographed multiple-choice answer sheets")]
#[command(version)]
struct Cli {
    /// Grader configuration (JSON). Defaults apply when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create the database and image vault.
    Init(StoreArgs),

    /// Import a quiz with its questions and students.
    ImportQuiz {
        #[command(flatten)]
        store: StoreArgs,
        /// Quiz document (JSON).
        #[arg(long)]
        file: PathBuf,
    },

    /// Register a photographed sheet as pending for a quiz.
    Upload {
        #[command(flatten)]
        store: StoreArgs,
        #[arg(long)]
        quiz: QuizId,
        /// Photo of the answer sheet.
        #[arg(long)]
        image: PathBuf,
    },

    /// Grade one pending sheet. Any failure aborts with nothing written.
    Grade {
        #[command(flatten)]
        store: StoreArgs,
        #[arg(long)]
        quiz: QuizId,
        #[arg(long)]
        image_id: ImageId,
    },

    /// Grade every pending sheet of the given quizzes (all quizzes if none).
    Batch {
        #[command(flatten)]
        store: StoreArgs,
        #[arg(long)]
        quiz: Vec<QuizId>,
    },

    /// Print stored results of a quiz.
    Results {
        #[command(flatten)]
        store: StoreArgs,
        #[arg(long)]
        quiz: QuizId,
        /// Only this grading session.
        #[arg(long)]
        session: Option<u32>,
    },
}

#[derive(Debug, Clone, Args)]
struct StoreArgs {
    /// SQLite database file.
    #[arg(long)]
    db: PathBuf,

    /// Image vault directory. Defaults to `images/` next to the database.
    #[arg(long)]
    vault: Option<PathBuf>,
}

impl StoreArgs {
    fn vault_root(&self) -> PathBuf {
        self.vault.clone().unwrap_or_else(|| {
            self.db
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join("images")
        })
    }

    fn open(&self) -> Result<SqliteStore> {
        let vault = ImageVault::open(self.vault_root())?;
        SqliteStore::open(&self.db, vault)
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(err) => {
            let explanation = explain(&err);
            eprintln!("error: {}", explanation.message);
            eprintln!("  {}", explanation.suggestion);
            if explanation.retriable {
                eprintln!("  (retrying may succeed)");
            }
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let config = match &cli.config {
        Some(path) => GraderConfig::load(path)?,
        None => GraderConfig::default(),
    };

    match cli.command {
        Command::Init(args) => {
            let store = args.open()?;
            info!("Markscan initialised");
            print_json(&serde_json::json!({
                "db": args.db,
                "vault": store.vault().root(),
            }))?;
        }

        Command::ImportQuiz { store, file } => {
            let raw = std::fs::read_to_string(&file)?;
            let (quiz, students) = QuizDocument::from_json(&raw)?.into_parts()?;
            RowMapping::build(&quiz)?;
            store.open()?.import_quiz(&quiz, &students)?;
            print_json(&serde_json::json!({
                "quiz_id": quiz.id,
                "name": quiz.name,
                "questions": quiz.questions.len(),
                "students": students.len(),
            }))?;
        }

        Command::Upload { store, quiz, image } => {
            let image = store.open()?.register_image(&quiz, &image)?;
            print_json(&image)?;
        }

        Command::Grade {
            store,
            quiz,
            image_id,
        } => {
            let store = store.open()?;
            let sheet = store.load_quiz(&quiz)?;
            let image = store.get_image(&image_id)?.ok_or_else(|| {
                MarkscanError::MalformedSheetInput(format!("unknown image {image_id}"))
            })?;
            let vision = ImageprocVision::from_config(&config.normalizer);
            let text = text_extractor();
            let outcome = SheetCorrector::new(&vision, text.as_ref(), &store, &config)
                .correct_single(&sheet, &image)?;
            print_json(&outcome)?;
        }

        Command::Batch { store, quiz } => {
            let store = store.open()?;
            let quizzes = if quiz.is_empty() {
                store.list_quizzes()?
            } else {
                quiz.iter()
                    .map(|id| store.load_quiz(id))
                    .collect::<Result<Vec<_>>>()?
            };
            let vision = ImageprocVision::from_config(&config.normalizer);
            let text = text_extractor();
            let report = SheetCorrector::new(&vision, text.as_ref(), &store, &config)
                .correct_batch(&quizzes);
            print_json(&report)?;
            if report.failed() > 0 {
                return Ok(ExitCode::from(2));
            }
        }

        Command::Results {
            store,
            quiz,
            session,
        } => {
            let records = store.open()?.list_results(&quiz, session.map(GradingSession))?;
            print_json(&records)?;
        }
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(feature = "ocr")]
fn text_extractor() -> Box<dyn TextExtractor> {
    match markscan_scan::OcrTextExtractor::with_defaults() {
        Ok(ocr) => Box::new(ocr),
        Err(err) => {
            warn!(error = %err, "OCR models not loaded; student codes cannot be read");
            Box::new(UnavailableTextExtractor)
        }
    }
}

#[cfg(not(feature = "ocr"))]
fn text_extractor() -> Box<dyn TextExtractor> {
    warn!("Built without the `ocr` feature; student codes cannot be read");
    Box::new(UnavailableTextExtractor)
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn vault_defaults_next_to_database() {
        let cli = Cli::try_parse_from(["markscan", "init", "--db", "/data/markscan.db"]).unwrap();
        let Command::Init(args) = cli.command else {
            panic!("expected init");
        };
        assert_eq!(args.vault_root(), PathBuf::from("/data/images"));
    }

    #[test]
    fn batch_accepts_repeated_quizzes() {
        let (a, b) = (QuizId::new(), QuizId::new());
        let (a_arg, b_arg) = (a.to_string(), b.to_string());
        let cli = Cli::try_parse_from([
            "markscan",
            "--config",
            "grader.json",
            "batch",
            "--db",
            "m.db",
            "--quiz",
            a_arg.as_str(),
            "--quiz",
            b_arg.as_str(),
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("grader.json")));
        let Command::Batch { quiz, .. } = cli.command else {
            panic!("expected batch");
        };
        assert_eq!(quiz, vec![a, b]);
    }

    #[test]
    fn malformed_quiz_id_is_rejected() {
        assert!(
            Cli::try_parse_from(["markscan", "results", "--db", "m.db", "--quiz", "nope"]).is_err()
        );
    }
}
