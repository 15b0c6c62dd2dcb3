//! End-to-end tests for the group chat run loop.
//!
//! The oracle is scripted and the publishers are in-process, so these runs
//! never touch the network.

use async_trait::async_trait;
use postgate_agents::{
    run_batch, Conversation, Gatekeeper, GatekeeperFault, GatekeeperState, GroupChat, Participant,
    StopReason,
};
use postgate_common::{Message, ParticipantRole, PostgateError, Result};
use postgate_llm::{LlmClient, LlmRequest, LlmResponse};
use postgate_publish::{PublishReceipt, Publisher, SimulatedPublisher};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

const TWEET: &str = "Microservices: because one big mistake wasn't enough. #SystemDesign";
const APPROVED: &str = "VERDICT: APPROVED\nFEEDBACK: none";
const REJECTED: &str = "VERDICT: REJECTED\nFEEDBACK: needs a punchline";

/// Replies in order; an `Err` entry or an exhausted script is an oracle failure.
struct ScriptedOracle {
    replies: Mutex<VecDeque<std::result::Result<String, String>>>,
    requests: Mutex<Vec<LlmRequest>>,
}

impl ScriptedOracle {
    fn new(replies: &[&str]) -> Self {
        Self::from_results(replies.iter().map(|r| Ok(r.to_string())).collect())
    }

    fn from_results(replies: Vec<std::result::Result<String, String>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    fn system_prompts(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap()
            .iter()
            .map(|r| r.system_prompt.clone().unwrap_or_default())
            .collect()
    }
}

#[async_trait]
impl LlmClient for ScriptedOracle {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
        self.requests.lock().unwrap().push(request);
        let next = self.replies.lock().unwrap().pop_front();
        match next {
            Some(Ok(content)) => Ok(LlmResponse {
                content,
                model: "scripted".to_string(),
                usage: None,
                finish_reason: Some("stop".to_string()),
            }),
            Some(Err(e)) => Err(PostgateError::Llm(e)),
            None => Err(PostgateError::Llm("script exhausted".to_string())),
        }
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// Records every publish call; optionally fails or returns a malformed payload.
#[derive(Default)]
struct CountingPublisher {
    calls: AtomicUsize,
    texts: Mutex<Vec<String>>,
    fail: bool,
    empty_id: bool,
}

impl CountingPublisher {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Default::default()
        }
    }

    fn malformed() -> Self {
        Self {
            empty_id: true,
            ..Default::default()
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn texts(&self) -> Vec<String> {
        self.texts.lock().unwrap().clone()
    }
}

#[async_trait]
impl Publisher for CountingPublisher {
    async fn publish(&self, text: &str) -> Result<PublishReceipt> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        self.texts.lock().unwrap().push(text.to_string());
        if self.fail {
            return Err(PostgateError::Publish("HTTP 503 Service Unavailable".to_string()));
        }
        let id = if self.empty_id { String::new() } else { format!("post-{n}") };
        PublishReceipt::new(id, text)
    }

    fn name(&self) -> &str {
        "counting"
    }
}

fn three_party() -> Vec<Participant> {
    vec![
        Participant::human_proxy("user"),
        Participant::drafter("tweet_generator"),
        Participant::critic("tweet_critic"),
    ]
}

fn chat(
    oracle: Arc<ScriptedOracle>,
    publisher: Arc<dyn Publisher>,
    max_rounds: usize,
) -> GroupChat {
    GroupChat::builder(oracle, publisher)
        .participants(Participant::default_roster())
        .max_rounds(max_rounds)
        .build()
        .unwrap()
}

fn contents(transcript: &[Message]) -> Vec<&str> {
    transcript.iter().map(|m| m.content.as_str()).collect()
}

#[tokio::test]
async fn example_scenario_publishes_the_approved_tweet() {
    let oracle = Arc::new(ScriptedOracle::new(&[TWEET, APPROVED]));
    let publisher = Arc::new(SimulatedPublisher::new());
    let chat = GroupChat::builder(oracle.clone(), publisher.clone())
        .participants(three_party())
        .build()
        .unwrap();

    let outcome = chat.run_detailed("microservices architecture").await;

    assert_eq!(outcome.published_text(), Some(TWEET));
    assert_eq!(outcome.published.as_ref().unwrap().id(), "sim-1");
    assert_eq!(outcome.state, GatekeeperState::Published);
    assert_eq!(publisher.publish_count(), 1);
    assert_eq!(
        outcome.stop,
        StopReason::Terminated {
            speaker: "gatekeeper".to_string()
        }
    );
    assert_eq!(outcome.rounds, 3);
    assert_eq!(
        contents(&outcome.transcript),
        vec![
            "Create a humorous yet insightful tweet about microservices architecture",
            TWEET,
            APPROVED,
            "TWEET POSTED: Microservices: because one big mistake wasn't enough. #SystemDesign\nTERMINATE",
        ]
    );
    assert_eq!(oracle.call_count(), 2);
}

#[tokio::test]
async fn run_returns_published_text() {
    let oracle = Arc::new(ScriptedOracle::new(&[TWEET, APPROVED]));
    let chat = chat(oracle, Arc::new(SimulatedPublisher::new()), 4);
    assert_eq!(chat.run("microservices architecture").await.as_deref(), Some(TWEET));
}

#[tokio::test]
async fn no_turns_after_posted_confirmation() {
    // Extra replies stay unused once the gatekeeper confirms the post.
    let oracle = Arc::new(ScriptedOracle::new(&[TWEET, APPROVED, "more", APPROVED]));
    let publisher = Arc::new(CountingPublisher::default());
    let chat = chat(oracle.clone(), publisher.clone(), 10);

    let outcome = chat.run_detailed("caching").await;

    assert!(outcome.is_published());
    assert_eq!(oracle.call_count(), 2);
    assert_eq!(publisher.calls(), 1);
    let last = outcome.transcript.last().unwrap();
    assert_eq!(last.role, ParticipantRole::Gatekeeper);
    assert_eq!(last.speaker, "tweet_poster");
    assert!(last.content.starts_with("TWEET POSTED"));
}

#[tokio::test]
async fn rejection_sends_drafter_back_and_latest_draft_wins() {
    let oracle = Arc::new(ScriptedOracle::new(&["Draft A", REJECTED, "Draft B", APPROVED]));
    let publisher = Arc::new(CountingPublisher::default());
    let chat = chat(oracle.clone(), publisher.clone(), 8);

    let outcome = chat.run_detailed("queues").await;

    assert_eq!(outcome.published_text(), Some("Draft B"));
    assert_eq!(publisher.texts(), vec!["Draft B".to_string()]);
    assert_eq!(outcome.rounds, 5);

    let prompts = oracle.system_prompts();
    assert!(prompts[0].contains("You craft technical tweets"));
    assert!(prompts[1].contains("You evaluate technical tweets"));
    assert!(prompts[2].contains("You craft technical tweets"));
}

#[tokio::test]
async fn decorated_inline_approval_still_publishes() {
    let oracle = Arc::new(ScriptedOracle::new(&[
        TWEET,
        "Sharp and accurate. **VERDICT:** APPROVED",
        "unused",
    ]));
    let publisher = Arc::new(CountingPublisher::default());
    let chat = chat(oracle.clone(), publisher.clone(), 4);

    let outcome = chat.run_detailed("microservices architecture").await;

    assert_eq!(outcome.published_text(), Some(TWEET));
    assert_eq!(outcome.state, GatekeeperState::Published);
    assert_eq!(publisher.calls(), 1);
    assert_eq!(oracle.call_count(), 2);
}

#[tokio::test]
async fn round_cap_without_approval_returns_nothing() {
    let oracle = Arc::new(ScriptedOracle::new(&[
        "Draft A", REJECTED, "Draft B", REJECTED, "Draft C", REJECTED,
    ]));
    let publisher = Arc::new(CountingPublisher::default());
    let chat = chat(oracle.clone(), publisher.clone(), 4);

    let outcome = chat.run_detailed("queues").await;

    assert_eq!(outcome.stop, StopReason::RoundCap);
    assert_eq!(outcome.rounds, 4);
    assert_eq!(outcome.transcript.len(), 4);
    assert_eq!(oracle.call_count(), 3);
    assert_eq!(outcome.state, GatekeeperState::Drafted);
    assert!(outcome.published.is_none());
    assert_eq!(publisher.calls(), 0);
}

#[tokio::test]
async fn oracle_failures_leave_empty_turns_and_recover() {
    let oracle = Arc::new(ScriptedOracle::from_results(vec![
        Err("HTTP 500".to_string()),
        Ok(TWEET.to_string()),
        Ok(APPROVED.to_string()),
    ]));
    let chat = chat(oracle, Arc::new(SimulatedPublisher::new()), 6);

    let outcome = chat.run_detailed("observability").await;

    assert_eq!(outcome.transcript[1].role, ParticipantRole::Drafter);
    assert!(outcome.transcript[1].content.is_empty());
    assert_eq!(outcome.published_text(), Some(TWEET));
}

#[tokio::test]
async fn publish_failure_ends_in_failed_state() {
    let oracle = Arc::new(ScriptedOracle::new(&[TWEET, APPROVED, TWEET, APPROVED]));
    let publisher = Arc::new(CountingPublisher::failing());
    let chat = chat(oracle.clone(), publisher.clone(), 10);

    let outcome = chat.run_detailed("retries").await;

    assert_eq!(outcome.state, GatekeeperState::Failed);
    assert!(matches!(outcome.fault, Some(GatekeeperFault::PublishFailed(_))));
    assert!(outcome.published.is_none());
    assert_eq!(publisher.calls(), 1);
    assert_eq!(oracle.call_count(), 2);
    assert!(outcome.transcript.last().unwrap().content.starts_with("ERROR:"));
}

#[tokio::test]
async fn malformed_success_payload_is_a_failure() {
    let oracle = Arc::new(ScriptedOracle::new(&[TWEET, APPROVED]));
    let publisher = Arc::new(CountingPublisher::malformed());
    let chat = chat(oracle, publisher.clone(), 10);

    let outcome = chat.run_detailed("idempotency").await;

    assert_eq!(outcome.state, GatekeeperState::Failed);
    assert!(outcome.published.is_none());
    assert_eq!(publisher.calls(), 1);
}

#[tokio::test]
async fn misordered_approval_is_a_null_draft_fault() {
    // Fixed order puts the critic straight after the seed.
    let oracle = Arc::new(ScriptedOracle::new(&[APPROVED, TWEET]));
    let publisher = Arc::new(CountingPublisher::default());
    let chat = GroupChat::builder(oracle, publisher.clone())
        .participants(three_party())
        .fixed_order(vec!["user".into(), "tweet_critic".into(), "tweet_generator".into()])
        .build()
        .unwrap();

    let outcome = chat.run_detailed("sharding").await;

    assert_eq!(outcome.state, GatekeeperState::Failed);
    assert_eq!(outcome.fault, Some(GatekeeperFault::NullDraft));
    assert_eq!(publisher.calls(), 0);
    assert!(outcome.published.is_none());
}

#[tokio::test]
async fn fixed_order_round_trip_publishes() {
    let oracle = Arc::new(ScriptedOracle::new(&[TWEET, APPROVED]));
    let chat = GroupChat::builder(oracle, Arc::new(SimulatedPublisher::new()))
        .participants(three_party())
        .fixed_order(Vec::new())
        .max_rounds(3)
        .build()
        .unwrap();

    assert_eq!(chat.run("load balancing").await.as_deref(), Some(TWEET));
}

#[tokio::test]
async fn custom_termination_word_from_a_participant_stops_the_run() {
    let oracle = Arc::new(ScriptedOracle::new(&["Draft A", "Nope. ENOUGH.", "Draft B"]));
    let critic = Participant::critic("tweet_critic")
        .with_termination(postgate_agents::TerminationDetector::new(["enough"]));
    let chat = GroupChat::builder(oracle.clone(), Arc::new(SimulatedPublisher::new()))
        .participants([
            Participant::human_proxy("user"),
            Participant::drafter("tweet_generator"),
            critic,
        ])
        .max_rounds(10)
        .build()
        .unwrap();

    let outcome = chat.run_detailed("backpressure").await;

    assert_eq!(
        outcome.stop,
        StopReason::Terminated {
            speaker: "tweet_critic".to_string()
        }
    );
    assert_eq!(oracle.call_count(), 2);
    assert!(outcome.published.is_none());
}

#[tokio::test]
async fn repeated_approvals_publish_once() {
    let publisher = Arc::new(CountingPublisher::default());
    let mut gatekeeper = Gatekeeper::new(publisher.clone());
    let mut log = Conversation::new();

    log.append("tweet_generator", ParticipantRole::Drafter, TWEET);
    for _ in 0..5 {
        log.append("tweet_critic", ParticipantRole::Critic, APPROVED);
    }
    for message in log.messages() {
        gatekeeper.observe(message).await;
    }

    assert_eq!(publisher.calls(), 1);
    assert!(gatekeeper.has_published());
}

#[tokio::test]
async fn approval_on_empty_conversation_never_publishes() {
    let publisher = Arc::new(CountingPublisher::default());
    let mut gatekeeper = Gatekeeper::new(publisher.clone());
    let approval = Message::new(0, "tweet_critic", ParticipantRole::Critic, APPROVED);

    assert!(gatekeeper.observe(&approval).await.is_some());
    assert_eq!(publisher.calls(), 0);
    assert_eq!(gatekeeper.state(), GatekeeperState::Failed);
}

#[tokio::test]
async fn batch_runs_keep_state_isolated() {
    let publisher = Arc::new(CountingPublisher::default());
    let chat = Arc::new(
        GroupChat::builder(Arc::new(EchoOracle), publisher.clone())
            .participants(Participant::default_roster())
            .build()
            .unwrap(),
    );

    let topics = ["caching", "queues", "sharding"];
    let outcomes = run_batch(chat, topics).await;

    assert_eq!(outcomes.len(), 3);
    for (outcome, topic) in outcomes.iter().zip(topics) {
        assert_eq!(outcome.topic, topic);
        assert_eq!(outcome.state, GatekeeperState::Published);
        assert_eq!(outcome.published_text(), Some(format!("Tweet about {topic}").as_str()));
        assert_eq!(outcome.transcript[0].order, 0);
    }
    assert_eq!(publisher.calls(), 3);
}

/// Stateless oracle: drafts a tweet naming the topic, approves any draft.
struct EchoOracle;

#[async_trait]
impl LlmClient for EchoOracle {
    async fn complete(&self, request: LlmRequest) -> Result<LlmResponse> {
        let prompt = request.system_prompt.unwrap_or_default();
        let content = if prompt.contains("You evaluate") {
            APPROVED.to_string()
        } else {
            let seed = request
                .messages
                .first()
                .map(|m| m.content.clone())
                .unwrap_or_default();
            let topic = seed.rsplit("about ").next().unwrap_or_default().to_string();
            format!("Tweet about {topic}")
        };
        Ok(LlmResponse {
            content,
            model: "echo".to_string(),
            usage: None,
            finish_reason: None,
        })
    }

    fn model_name(&self) -> &str {
        "echo"
    }
}
