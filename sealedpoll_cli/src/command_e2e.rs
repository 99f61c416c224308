use sealedpoll::*;
use std::sync::Arc;
use tracing::info;

pub fn command_e2e(matches: &clap::ArgMatches, settings: Settings) {
    let question = crate::expand(matches.value_of("question").unwrap_or_default());
    let options: Vec<String> = matches
        .values_of("option")
        .map(|values| values.map(String::from).collect())
        .unwrap_or_default();

    let duration: u64 = match matches.value_of("duration").unwrap_or("3600").parse() {
        Ok(duration) => duration,
        Err(e) => {
            eprintln!("sealedpoll e2e: invalid duration: {}", e);
            std::process::exit(1);
        }
    };

    let mut votes: Vec<u8> = vec![];
    for value in matches.values_of("VOTES").into_iter().flatten() {
        match value.parse() {
            Ok(vote) => votes.push(vote),
            Err(e) => {
                eprintln!("sealedpoll e2e: invalid vote {}: {}", value, e);
                std::process::exit(1);
            }
        }
    }

    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("sealedpoll e2e: unable to start runtime: {}", e);
            std::process::exit(1);
        }
    };

    let spec = PollSpec::new(question, options, duration);
    match runtime.block_on(run_poll(spec, &votes, settings)) {
        Ok(poll) => print_poll(&poll),
        Err(e) => {
            eprintln!("sealedpoll e2e: {}", e);
            std::process::exit(1);
        }
    }
}

async fn run_poll(spec: PollSpec, votes: &[u8], settings: Settings) -> Result<Poll, Error> {
    let clock = ManualClock::new(SystemClock.now());
    let service = Arc::new(LocalCryptoService::new());
    let engine = PollEngine::in_memory(Arc::new(clock.clone()), service.clone(), settings);

    let (_, creator) = generate_identity();
    let duration = spec.duration;
    let poll_id = engine.create_poll(creator, spec)?;
    let option_count = engine.get_poll(poll_id)?.option_count();

    for vote in votes {
        let (_, voter) = generate_identity();
        let submission = service.seal_vote(poll_id, &voter, *vote, option_count)?;
        engine.submit(poll_id, voter, submission).await?;
    }
    info!(%poll_id, ballots = votes.len(), "all ballots submitted");

    clock.advance(duration);
    engine.close_poll(poll_id, &creator).await?;
    engine.reveal(poll_id, &creator, None).await
}

fn print_poll(poll: &Poll) {
    match serde_json::to_string_pretty(poll) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("sealedpoll e2e: unable to encode poll: {}", e);
            std::process::exit(1);
        }
    }

    if let Some(results) = poll.labeled_results() {
        println!("Tally:");
        for (option, count) in results {
            println!("  {} got {} votes", option, count);
        }
    }
}
