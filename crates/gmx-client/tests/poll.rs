//! Poller against a live agent.

#![cfg(unix)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use gmx_agent::transport::{self, TransportKind};
use gmx_agent::{Agent, Registry, ServeOptions};
use gmx_client::poll::{compile_patterns, PollOptions, Poller, SEPARATOR};
use gmx_core::protocol::PROTOCOL_VERSION;
use gmx_core::EndpointName;

async fn agent(dir: &Path) -> (Agent, Arc<AtomicU64>) {
    let listener = transport::bind(
        TransportKind::Unix,
        dir,
        EndpointName::new(std::process::id(), PROTOCOL_VERSION),
    )
    .await
    .unwrap();
    let agent = Agent::serve(Arc::new(Registry::new()), listener, ServeOptions::default());

    let samples = Arc::new(AtomicU64::new(0));
    let s = Arc::clone(&samples);
    let reg = agent.registry();
    reg.register("app.samples", move || s.fetch_add(1, Ordering::SeqCst) + 1);
    reg.register("app.name", || "demo");
    reg.register("net.rx", || 7);
    (agent, samples)
}

fn patterns(ps: &[&str]) -> Vec<regex::Regex> {
    let ps: Vec<String> = ps.iter().map(|p| p.to_string()).collect();
    compile_patterns(&ps).unwrap()
}

#[tokio::test]
async fn zero_duration_takes_exactly_one_sample() {
    let dir = tempfile::tempdir().unwrap();
    let (agent, samples) = agent(dir.path()).await;

    let opts = PollOptions {
        delay: Duration::ZERO,
        duration: Some(Duration::ZERO),
    };
    let mut poller = Poller::connect(agent.endpoint(), &patterns(&["^app"]), opts)
        .await
        .unwrap();
    assert_eq!(poller.keys(), ["app.name", "app.samples"]);

    let mut out = Vec::new();
    assert_eq!(poller.run(&mut out).await.unwrap(), 1);
    assert_eq!(samples.load(Ordering::SeqCst), 1);

    let text = String::from_utf8(out).unwrap();
    assert_eq!(text, "app.name: \"demo\"\napp.samples: 1\n");
    assert!(!text.contains(SEPARATOR));
    agent.shutdown().await;
}

#[tokio::test]
async fn bounded_polling_separates_samples() {
    let dir = tempfile::tempdir().unwrap();
    let (agent, _samples) = agent(dir.path()).await;

    let opts = PollOptions {
        delay: Duration::from_millis(10),
        duration: Some(Duration::from_millis(60)),
    };
    let mut poller = Poller::connect(agent.endpoint(), &patterns(&["rx"]), opts)
        .await
        .unwrap();

    let mut out = Vec::new();
    let taken = poller.run(&mut out).await.unwrap();
    assert!(taken >= 2, "taken={taken}");

    let text = String::from_utf8(out).unwrap();
    let blocks: Vec<&str> = text.split(&format!("{SEPARATOR}\n")).collect();
    assert_eq!(blocks.len(), taken);
    assert!(blocks.iter().all(|b| *b == "net.rx: 7\n"));
    agent.shutdown().await;
}

#[tokio::test]
async fn no_patterns_polls_every_key() {
    let dir = tempfile::tempdir().unwrap();
    let (agent, _samples) = agent(dir.path()).await;

    let opts = PollOptions {
        delay: Duration::ZERO,
        duration: Some(Duration::ZERO),
    };
    let poller = Poller::connect(agent.endpoint(), &[], opts).await.unwrap();
    assert_eq!(
        poller.keys(),
        ["app.name", "app.samples", "keys", "net.rx", "os.args"]
    );
    agent.shutdown().await;
}

#[tokio::test]
async fn unmatched_patterns_still_sample() {
    let dir = tempfile::tempdir().unwrap();
    let (agent, samples) = agent(dir.path()).await;

    let opts = PollOptions {
        delay: Duration::ZERO,
        duration: Some(Duration::ZERO),
    };
    let mut poller = Poller::connect(agent.endpoint(), &patterns(&["^nothing$"]), opts)
        .await
        .unwrap();
    assert!(poller.keys().is_empty());

    let mut out = Vec::new();
    assert_eq!(poller.run(&mut out).await.unwrap(), 1);
    assert!(out.is_empty());
    assert_eq!(samples.load(Ordering::SeqCst), 0);
    agent.shutdown().await;
}
