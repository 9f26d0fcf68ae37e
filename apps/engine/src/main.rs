use std::io::Write as _;
use std::path::Path;

use anyhow::Result;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use interview_engine::models::NewCandidate;
use interview_engine::resume::{parse_resume, ParsedResume};
use interview_engine::timer::TimerEvent;
use interview_engine::{
    BusChannel, Config, EngineError, LlmClient, Orchestrator, Phase, ScoringEngine, Store,
    SubmitOutcome, TabBus,
};

use chrono::Utc;

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            let target = env!("CARGO_PKG_NAME").replace('-', "_");
            EnvFilter::new(format!("{target}={}", &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting interview engine v{}", env!("CARGO_PKG_VERSION"));

    let store = Store::open(&config.database_url).await?;

    let llm = config.groq_api_key.clone().map(LlmClient::new);
    if llm.is_some() {
        info!("Scoring backend configured (model: {})", interview_engine::llm_client::MODEL);
    } else {
        info!("No scoring backend credential, running on deterministic fallbacks");
    }
    let engine = ScoringEngine::new(llm);

    let channel = BusChannel::new();
    let bus = TabBus::attach(&channel);
    let mut orchestrator = Orchestrator::new(store.clone(), engine, bus);

    let mut input = BufReader::new(tokio::io::stdin()).lines();

    // Resume prompt: any session still in progress can be picked up or
    // discarded before a new interview starts.
    let unfinished = orchestrator.unfinished_sessions().await?;
    if let Some(session) = unfinished.first() {
        let candidate = store.get_candidate(session.candidate_id).await?;
        println!(
            "Unfinished interview found for {} ({} of {} questions answered).",
            candidate.name, session.current_question, session.total_questions
        );
        if ask(&mut input, "Resume it? [y/n]: ").await? == "y" {
            orchestrator.resume_interview(session.id).await?;
        } else {
            orchestrator.cancel_session(session.id).await?;
            println!("Session discarded.");
        }
    }

    if orchestrator.phase() != Phase::InProgress {
        let candidate = intake(&mut input).await?;
        match orchestrator.start_interview(candidate).await {
            Ok(_) => {}
            Err(e @ EngineError::DuplicateEmail(_)) => {
                eprintln!("{e}");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        }
    }

    run_question_loop(&mut orchestrator, &mut input).await?;

    store.close().await;
    Ok(())
}

async fn ask(input: &mut Lines<BufReader<Stdin>>, prompt: &str) -> Result<String> {
    print!("{prompt}");
    std::io::stdout().flush()?;
    Ok(input.next_line().await?.unwrap_or_default().trim().to_string())
}

/// Collects the candidate profile: resume file first, then whatever contact
/// fields the parser could not find.
async fn intake(input: &mut Lines<BufReader<Stdin>>) -> Result<NewCandidate> {
    let parsed = loop {
        let path = ask(input, "Path to resume PDF: ").await?;
        match parse_resume(Path::new(&path)) {
            Ok(parsed) => break parsed,
            Err(e) => eprintln!("{e}"),
        }
    };

    let ParsedResume {
        name,
        email,
        phone,
        full_text,
    } = parsed;

    let name = match name {
        Some(name) => name,
        None => ask(input, "Name: ").await?,
    };
    let email = match email {
        Some(email) => email,
        None => ask(input, "Email: ").await?,
    };
    let phone = match phone {
        Some(phone) => phone,
        None => ask(input, "Phone: ").await?,
    };

    Ok(NewCandidate {
        name,
        email,
        phone,
        resume_text: full_text,
        uploaded_at: Some(Utc::now()),
    })
}

/// Drives the question loop: each question runs under its countdown, with
/// the candidate's typed line and the timer raced against each other.
async fn run_question_loop(
    orchestrator: &mut Orchestrator,
    input: &mut Lines<BufReader<Stdin>>,
) -> Result<()> {
    while orchestrator.phase() == Phase::InProgress {
        let question = match orchestrator.current_question() {
            Some(q) => q.clone(),
            None => break,
        };
        println!(
            "\n[{} | {} | {}s] {}",
            question.category,
            question.difficulty.as_str(),
            question.time_limit,
            question.question
        );

        let mut events = orchestrator.begin_question().await?;
        let outcome = loop {
            tokio::select! {
                line = input.next_line() => {
                    let Some(answer) = line? else {
                        // stdin closed: treat like expiry for this question.
                        break orchestrator.auto_submit("").await?;
                    };
                    match orchestrator.submit_answer(&answer).await {
                        Ok(outcome) => break outcome,
                        Err(EngineError::Validation(msg)) => {
                            eprintln!("{msg}");
                        }
                        Err(e) => return Err(e.into()),
                    }
                }
                event = events.recv() => {
                    match event {
                        Some(TimerEvent::Tick(remaining)) if remaining % 10 == 0 && remaining > 0 => {
                            println!("  ({remaining}s remaining)");
                        }
                        Some(TimerEvent::Tick(_)) => {}
                        Some(TimerEvent::Expired) => {
                            println!("  Time expired.");
                            break orchestrator.auto_submit("").await?;
                        }
                        None => break orchestrator.auto_submit("").await?,
                    }
                }
            }
        };

        match outcome {
            SubmitOutcome::Advanced { question_number, score } => {
                println!("Question {question_number} scored {score}/100.");
            }
            SubmitOutcome::Completed { score, summary } => {
                println!("Final question scored {score}/100.\n");
                println!(
                    "=== {} - {} ({}/100) ===",
                    summary.candidate_name, summary.overall_rating, summary.overall_score
                );
                println!("{}", summary.summary);
                println!("\nStrengths:");
                for s in &summary.strengths {
                    println!("  - {s}");
                }
                println!("Areas for improvement:");
                for a in &summary.areas_for_improvement {
                    println!("  - {a}");
                }
            }
            SubmitOutcome::AlreadySubmitted => {}
        }
    }
    Ok(())
}
