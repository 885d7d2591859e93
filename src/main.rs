use std::sync::Arc;
use std::time::Instant;

use anyhow::Context;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing_subscriber::EnvFilter;

use elysian_client::{
    auth::LocalAuthProvider,
    config::Config,
    db::{create_redis_client, RedisDocumentStore},
    error::AppError,
    models::{QuestionKind, QuestionnaireFlow, QuestionnaireStep, SwipeDirection, UserId},
    services::{
        providers::HttpRecommendationClient, CommitOutcome, GestureConfig, GestureEvent,
        ProfileService, RecommendationSession, SessionState, SwipeGestureInterpreter,
    },
};

const HELP: &str = "commands: left | right | drag <dx> | tap | favorites | dislikes | unlike <city_id> | retry | quit";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;
    tracing::info!(
        recommendation_api_url = %config.recommendation_api_url,
        timeout_secs = config.request_timeout_secs,
        "Configuration loaded"
    );

    let auth = Arc::new(LocalAuthProvider::restore(
        config.user_id.as_deref().map(UserId::from),
    ));

    let redis_client = create_redis_client(&config.redis_url)?;
    let (store, writer) = RedisDocumentStore::new(redis_client);
    let store = Arc::new(store);

    let client = Arc::new(
        HttpRecommendationClient::new(&config.recommendation_api_url, config.request_timeout())
            .context("Failed to build recommendation client")?,
    );

    let profile = ProfileService::new(
        auth.clone(),
        store.clone(),
        client.clone(),
        config.request_timeout(),
    );
    let session = RecommendationSession::new(auth, store, client, config.request_timeout());
    session.attach_auth_listener();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    match session.start().await {
        Ok(_) => {}
        Err(AppError::ProfileMissing(_)) => {
            println!("No travel profile yet, answer a few questions first.");
            if !run_questionnaire(&mut lines, &profile).await? {
                session.teardown();
                writer.shutdown().await;
                return Ok(());
            }
            if let Err(e) = session.start().await {
                recoverable(e)?;
            }
        }
        Err(e) => recoverable(e)?,
    }

    print_state(&session);
    println!("{}", HELP);

    let mut gestures = SwipeGestureInterpreter::new(GestureConfig {
        screen_width: config.screen_width,
        ..GestureConfig::default()
    });

    while let Some(line) = lines.next_line().await? {
        let mut parts = line.split_whitespace();
        let Some(command) = parts.next() else {
            continue;
        };

        match command {
            "left" => commit(&session, SwipeDirection::Left).await,
            "right" => commit(&session, SwipeDirection::Right).await,
            "drag" => {
                let Some(dx) = parts.next().and_then(|v| v.parse::<f64>().ok()) else {
                    println!("usage: drag <dx>");
                    continue;
                };
                gestures.pointer_down();
                if let Some(transform) = gestures.pointer_move(dx, 0.0) {
                    tracing::debug!(dx = transform.dx, rotation = transform.rotation_degrees, "Card dragged");
                }
                match gestures.pointer_up(dx, 0.0, Instant::now()) {
                    Some(GestureEvent::Commit(direction)) => {
                        let target = gestures.fly_out_target(direction);
                        tracing::debug!(dx = target.dx, "Card flying out");
                        commit(&session, direction).await;
                        gestures.reset();
                    }
                    Some(GestureEvent::Cancel) => println!("Card returned to center"),
                    Some(GestureEvent::OpenDetail) | None => {}
                }
            }
            "tap" => {
                gestures.pointer_down();
                if let Some(GestureEvent::OpenDetail) = gestures.pointer_up(0.0, 0.0, Instant::now())
                {
                    print_detail(&session);
                }
            }
            "favorites" => match profile.favorites().await {
                Ok(records) => {
                    for (city_id, record) in records {
                        println!("{}  {}, {}", city_id, record.city_name, record.country_name);
                    }
                }
                Err(e) => println!("Could not load favorites: {}", e),
            },
            "dislikes" => match profile.dislikes().await {
                Ok(records) => {
                    for (city_id, record) in records {
                        println!("{}  {}, {}", city_id, record.city_name, record.country_name);
                    }
                }
                Err(e) => println!("Could not load dislikes: {}", e),
            },
            "unlike" => match parts.next() {
                Some(city_id) => match profile.remove_favorite(&city_id.into()).await {
                    Ok(true) => println!("Removed {}", city_id),
                    Ok(false) => println!("{} is not a favorite", city_id),
                    Err(e) => println!("Could not remove favorite: {}", e),
                },
                None => println!("usage: unlike <city_id>"),
            },
            "retry" => {
                if let Err(e) = session.retry().await {
                    println!("Retry failed: {}", e);
                }
                print_state(&session);
            }
            "quit" | "exit" => break,
            _ => println!("{}", HELP),
        }
    }

    session.teardown();
    writer.shutdown().await;
    Ok(())
}

async fn commit(session: &RecommendationSession, direction: SwipeDirection) {
    match session.commit(direction).await {
        Ok(CommitOutcome::Ignored) => println!("Nothing to swipe right now"),
        Ok(_) => {}
        Err(e) => println!("Swipe failed: {}", e),
    }
    print_state(session);
}

fn print_state(session: &RecommendationSession) {
    let view = session.view();
    match &view.state {
        SessionState::Showing(city) => {
            println!("{}, {}  (score {:.2})", city.name, city.country, city.score)
        }
        SessionState::Exhausted => println!("No more recommendations"),
        SessionState::Loading(_) | SessionState::Committing { .. } => println!("Loading..."),
        SessionState::Idle | SessionState::TornDown => {}
    }

    if let Some(error) = view.error {
        let hint = match (error.retryable, &view.state) {
            (false, _) => "",
            (true, SessionState::Idle) => " (type 'retry')",
            (true, _) => " (swipe again to retry)",
        };
        println!("Error: {}{}", error.message, hint);
    }
}

/// Lets the driver carry on after a failure the user can retry; any other
/// failure ends it
fn recoverable(e: AppError) -> anyhow::Result<()> {
    if e.is_recoverable() {
        tracing::warn!(error = %e, "Recoverable failure");
        Ok(())
    } else {
        Err(e.into())
    }
}

fn print_detail(session: &RecommendationSession) {
    if let Some(city) = session.current_city() {
        println!("{} ({})", city.name, city.country);
        if let Some(description) = &city.description {
            println!("{}", description);
        }
        if let Some(image_url) = &city.image_url {
            println!("{}", image_url);
        }
    }
}

/// Walks the questionnaire on stdin and submits it. Returns false if input
/// ended before the last answer.
async fn run_questionnaire(
    lines: &mut Lines<BufReader<Stdin>>,
    profile: &ProfileService,
) -> anyhow::Result<bool> {
    let mut flow = QuestionnaireFlow::new();

    loop {
        let question = flow.current();
        println!("{}", question.prompt);
        if question.kind() == QuestionKind::MultiSelect {
            println!("  options (comma separated): {}", question.options.join(", "));
        }

        let Some(line) = lines.next_line().await? else {
            return Ok(false);
        };

        match question.kind() {
            QuestionKind::Open => flow.type_answer(line),
            QuestionKind::MultiSelect => {
                for option in line.split(',').map(str::trim).filter(|o| !o.is_empty()) {
                    if !flow.selected().iter().any(|s| s == option) {
                        if let Err(e) = flow.toggle_option(option) {
                            println!("{}", e);
                        }
                    }
                }
            }
        }

        match flow.advance() {
            Ok(QuestionnaireStep::Next(_)) => {}
            Ok(QuestionnaireStep::Complete(response)) => loop {
                match profile.submit_questionnaire(&response).await {
                    Ok(cities) => {
                        println!("Found {} matching cities", cities.len());
                        return Ok(true);
                    }
                    Err(e) => {
                        println!("Could not submit answers: {}", e);
                        recoverable(e)?;
                        println!("Press enter to submit your answers again.");
                        if lines.next_line().await?.is_none() {
                            return Ok(false);
                        }
                    }
                }
            },
            Err(e) => println!("{}", e),
        }
    }
}
