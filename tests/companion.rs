//! Companion Integration Tests
//!
//! Mounts the companion on static documents with a scripted model and checks
//! what the overlay ends up showing.

use std::sync::Arc;
use std::time::Duration;

use smartsight::adapters::scripted::{Matcher, ScriptedReply};
use smartsight::adapters::{Availability, ScriptedModel};
use smartsight::analysis::quiz::Tier;
use smartsight::config::Tuning;
use smartsight::core::gate::HomescreenRule;
use smartsight::core::{Activation, Companion, Rejection};
use smartsight::domain::{
    Artifact, CacheSlot, JobEventType, JobKind, Leaning, OptionLetter, Topic, TrustBias,
};
use smartsight::page::{Document, StaticDocument};
use smartsight::render::pulse::PulseCanvas;
use smartsight::render::{donut, markup};
use smartsight::view::Tab;
use tokio::time::Instant;

const URL: &str = "https://news.example.com/article/council-budget-vote";

const BIAS_REPLY: &str =
    "BIAS: [Left]\nEXPLANATION: The piece quotes only union leaders. It omits employer views.";
const DEEP_REPLY: &str = "ANALYSIS: The article [2, 7] argues X. [99] contradicts this.";
const ADVANCED_REPLY: &str = "Politics: 40\nEconomy: 40\nSociety: 40";
const QUIZ_REPLY: &str = "Q1: What did the council approve?
A) A budget
B) A park
C) A tax cut
D) A merger
CORRECT: A

Q2: When was the vote held?
A) Monday
B) Tuesday
C) Friday
D) Sunday
CORRECT: B

Q3: Who voiced concerns?
A) Tourists
B) Investors
C) Residents
D) Students
CORRECT: C

Q4: What rose in the city centre?
A) Crime
B) Traffic
C) Taxes
D) Rents
CORRECT: D

Q5: This block is malformed
A) Only
B) Three
C) Options
CORRECT: B";

fn calm_paragraphs() -> Vec<String> {
    vec![
        "The council approved the annual budget on Tuesday evening.".to_string(),
        "Residents voiced concerns about rising rents in the city centre.".to_string(),
        "The mayor said new housing projects would begin next spring.".to_string(),
        "Several councillors asked for a review of transport spending.".to_string(),
        "The next public meeting is scheduled for the end of the month.".to_string(),
    ]
}

fn scripted() -> ScriptedModel {
    ScriptedModel::new()
        .respond(Matcher::Preamble("media bias".into()), BIAS_REPLY)
        .respond(Matcher::Preamble("emotion analyzer".into()), "0.8")
        .respond(Matcher::Preamble("provide insights".into()), DEEP_REPLY)
        .respond(Matcher::Preamble("quiz generator".into()), QUIZ_REPLY)
        .respond(Matcher::Preamble("article analyzer".into()), ADVANCED_REPLY)
        .respond(
            Matcher::Preamble("helpful analyst".into()),
            "The **main** argument is that\n- rents rise\n- housing lags",
        )
}

fn companion_with(
    model: Arc<ScriptedModel>,
    paragraphs: Vec<String>,
) -> (Companion, Arc<StaticDocument>) {
    let document = Arc::new(StaticDocument::from_paragraphs(paragraphs));
    let companion = Companion::new(document.clone(), URL, model, Tuning::default());
    (companion, document)
}

#[tokio::test(start_paused = true)]
async fn test_mount_renders_bias_deep_and_emotions() {
    let model = Arc::new(scripted());
    let (companion, _doc) = companion_with(model.clone(), calm_paragraphs());

    let started = Instant::now();
    companion.mount().await;
    assert!(started.elapsed() >= Duration::from_millis(1000));

    let view = companion.view();
    assert!(view.overlay_visible);
    assert!(!view.any_loader_visible());

    // Bias: left, blue, one line per sentence
    let bias_html = view.bias.body.html().unwrap();
    assert!(bias_html.contains("Left-Leaning"));
    assert!(bias_html.contains("#3b82f6"));
    assert!(bias_html.contains("union leaders.<br>It omits"));
    match companion.cache().get(CacheSlot::Bias) {
        Some(Artifact::Bias(verdict)) => assert_eq!(verdict.leaning, Leaning::Left),
        other => panic!("unexpected bias cache: {:?}", other),
    }

    // Deep: only [2] exists on a five-paragraph page
    let deep_html = view.deep.body.html().unwrap();
    assert_eq!(markup::clickable_references(deep_html), vec![2]);
    assert!(deep_html.contains("[7]"));
    assert!(deep_html.contains("[99]"));
    assert!(!deep_html.contains("ANALYSIS:"));

    // Emotions: flat 0.8 trace in the upper third
    match companion.cache().get(CacheSlot::Emotions) {
        Some(Artifact::Emotions(trace)) => {
            assert_eq!(trace.scores(), &[0.8; 5]);
            assert_eq!(trace.scored_count(), 5);
        }
        other => panic!("unexpected emotion cache: {:?}", other),
    }
    assert!(!view.pulse.is_loading());

    // Suggestions shown, chat session not opened yet
    assert_eq!(view.suggestions.len(), 3);
    assert_eq!(companion.event_log().count(JobKind::Chat, JobEventType::Started), 0);
}

#[tokio::test(start_paused = true)]
async fn test_cached_activations_make_no_model_calls() {
    let model = Arc::new(scripted());
    let (companion, _doc) = companion_with(model.clone(), calm_paragraphs());

    companion.mount().await;
    companion.open_tab(Tab::Analysis).await;
    let calls = model.stats().model_calls();

    companion.mount().await;
    companion.open_tab(Tab::Analysis).await;
    companion.open_tab(Tab::Insights).await;
    companion.open_tab(Tab::Analysis).await;

    assert_eq!(model.stats().model_calls(), calls);
    let log = companion.event_log();
    assert_eq!(log.count(JobKind::Bias, JobEventType::CacheHit), 1);
    assert_eq!(log.count(JobKind::Deep, JobEventType::CacheHit), 1);
    assert_eq!(log.count(JobKind::Emotions, JobEventType::CacheHit), 1);
    assert_eq!(log.count(JobKind::Advanced, JobEventType::CacheHit), 2);
    assert_eq!(log.count(JobKind::Bias, JobEventType::Completed), 1);

    // Cache hits re-render the same result
    let view = companion.view();
    assert!(view.bias.body.html().unwrap().contains("Left-Leaning"));
    assert!(!view.any_loader_visible());
}

#[tokio::test(start_paused = true)]
async fn test_advanced_normalises_and_animates_chart() {
    let model = Arc::new(scripted());
    let (companion, _doc) = companion_with(model, calm_paragraphs());

    companion.open_tab(Tab::Analysis).await;
    let report = match companion.cache().get(CacheSlot::Advanced) {
        Some(Artifact::Advanced(report)) => report,
        other => panic!("unexpected advanced cache: {:?}", other),
    };
    let percents: Vec<(Topic, u8)> = report
        .topics
        .slices
        .iter()
        .map(|s| (s.topic, s.percent))
        .collect();
    assert_eq!(
        percents,
        vec![(Topic::Politics, 33), (Topic::Economy, 33), (Topic::Society, 34)]
    );
    assert_eq!(report.trust.source, "news.example.com");
    assert_eq!(report.trust.reliability, 50);
    assert_eq!(report.trust.bias, TrustBias::Center);

    let view = companion.view();
    assert!(view.trust_html.unwrap().contains("news.example.com"));
    assert!(view.legend_html.unwrap().contains("Society</strong>: 34%"));

    // Hover is inert until the sweep completes
    let c = donut::center();
    assert_eq!(companion.hover_chart(c.x + 5.0, c.y - 70.0), None);

    tokio::time::advance(Duration::from_millis(1600)).await;
    companion.animation_frame(Instant::now());
    assert!(companion.chart_finished());

    assert_eq!(companion.hover_chart(c.x + 5.0, c.y - 70.0), Some(0));
    let tooltip = companion.view().tooltip.unwrap();
    assert!(tooltip.html.starts_with("<strong>Politics</strong><br>33%"));

    // The hole hides the tooltip again
    assert_eq!(companion.hover_chart(c.x, c.y), None);
    assert!(companion.view().tooltip.is_none());

    // Re-opening restarts the animation with a new generation
    let generation = companion.chart_generation();
    companion.open_tab(Tab::Analysis).await;
    assert_eq!(companion.chart_generation(), generation + 1);
    assert!(!companion.chart_finished());
}

#[tokio::test(start_paused = true)]
async fn test_quiz_flow_and_grading() {
    let model = Arc::new(scripted());
    let (companion, _doc) = companion_with(model.clone(), calm_paragraphs());

    companion.open_tab(Tab::Quiz).await;
    let form = companion.view().quiz_form.expect("quiz rendered");
    assert_eq!(form.items.len(), 4);
    assert!(!form.submit_enabled);

    let answers = [OptionLetter::A, OptionLetter::B, OptionLetter::C, OptionLetter::D];
    for (q, letter) in answers.iter().enumerate().take(3) {
        assert!(companion.select_answer(q, *letter));
    }
    assert!(!companion.view().quiz_form.unwrap().submit_enabled);
    assert!(companion.submit_quiz().is_none());

    companion.select_answer(3, OptionLetter::D);
    assert!(companion.view().quiz_form.unwrap().submit_enabled);

    let grade = companion.submit_quiz().expect("graded");
    assert_eq!((grade.correct, grade.total, grade.percent), (4, 4, 100));
    assert_eq!(grade.tier, Tier::Excellent);

    let form = companion.view().quiz_form.unwrap();
    assert!(form.results_html.unwrap().contains("Excellent work!"));
    assert!(!form.submit_enabled);
    // Inputs are frozen after grading
    assert!(!companion.select_answer(0, OptionLetter::B));

    // Re-opening the tab keeps the quiz; retake regenerates it
    let streams = model.stats().streams;
    companion.open_tab(Tab::Quiz).await;
    assert_eq!(model.stats().streams, streams);
    assert!(companion.retake_quiz().await);
    assert_eq!(model.stats().streams, streams + 1);
    assert!(companion.view().quiz_form.unwrap().grade.is_none());
}

#[tokio::test(start_paused = true)]
async fn test_quiz_without_valid_items_shows_retry_card() {
    let model = Arc::new(
        ScriptedModel::new()
            .respond(Matcher::Preamble("quiz generator".into()), "I cannot do that."),
    );
    let (companion, _doc) = companion_with(model, calm_paragraphs());

    companion.open_tab(Tab::Quiz).await;
    let view = companion.view();
    assert!(view.quiz_form.is_none());
    assert!(view.quiz.body.is_error());
    assert!(view.quiz.body.html().unwrap().contains("Please try again"));
    assert!(!view.quiz.loader_visible);
    assert_eq!(companion.event_log().count(JobKind::Quiz, JobEventType::Failed), 1);
}

#[tokio::test(start_paused = true)]
async fn test_reopening_quiz_tab_retries_failed_generation() {
    let model = Arc::new(ScriptedModel::new().respond_seq(
        Matcher::Preamble("quiz generator".into()),
        vec![
            ScriptedReply::Fail("model busy".into()),
            ScriptedReply::Text(QUIZ_REPLY.into()),
        ],
    ));
    let (companion, _doc) = companion_with(model.clone(), calm_paragraphs());

    companion.open_tab(Tab::Quiz).await;
    assert!(companion.view().quiz.body.is_error());
    assert!(companion.view().quiz_form.is_none());

    companion.open_tab(Tab::Insights).await;
    companion.open_tab(Tab::Quiz).await;
    assert_eq!(model.stats().streams, 2);
    let view = companion.view();
    assert_eq!(view.quiz_form.unwrap().items.len(), 4);
    assert!(!view.quiz.body.is_error());

    // A loaded quiz is kept on later visits, also across a remount
    companion.open_tab(Tab::Quiz).await;
    companion.mount().await;
    companion.open_tab(Tab::Quiz).await;
    let log = companion.event_log();
    assert_eq!(log.count(JobKind::Quiz, JobEventType::Started), 2);
    assert_eq!(log.count(JobKind::Quiz, JobEventType::Failed), 1);
    assert_eq!(companion.view().quiz_form.unwrap().items.len(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_quiz_generation_refused() {
    // A failed first creation keeps the first generation suspended in backoff
    let model = Arc::new(scripted().failing_creates(1));
    let (companion, _doc) = companion_with(model, calm_paragraphs());

    let (first, second) = tokio::join!(companion.generate_quiz(), companion.generate_quiz());
    assert!(first);
    assert!(!second);
    assert_eq!(
        companion.event_log().count(JobKind::Quiz, JobEventType::AlreadyRunning),
        1
    );
    assert_eq!(companion.event_log().count(JobKind::Quiz, JobEventType::Retrying), 1);
    assert_eq!(companion.view().quiz_form.unwrap().items.len(), 4);
}

#[tokio::test(start_paused = true)]
async fn test_scroll_tracks_closest_paragraph() {
    let paragraphs: Vec<String> = (0..10)
        .map(|i| {
            format!("Paragraph {} {}", i, "of steady, unremarkable council prose. ".repeat(10))
        })
        .collect();
    let document =
        Arc::new(StaticDocument::from_paragraphs(paragraphs).with_viewport_height(200.0));
    let model = Arc::new(scripted());
    let companion = Companion::new(document.clone(), URL, model, Tuning::default());

    companion.mount().await;

    let mut seen = Vec::new();
    let mut y = 0.0;
    loop {
        document.scroll_to(y);
        companion.on_scroll();
        companion.animation_frame(Instant::now());
        seen.push(companion.active_paragraph().unwrap());
        if y >= document.max_scroll() {
            break;
        }
        y = (y + 40.0).min(document.max_scroll());
    }

    assert_eq!(seen.first(), Some(&0));
    assert_eq!(seen.last(), Some(&9));
    assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    for i in 0..10 {
        assert!(seen.contains(&i), "paragraph {} never active", i);
    }

    // Only the active paragraph carries the highlight
    assert!(document.inline_style(9).contains("scale(1.02)"));
    assert_eq!(document.inline_style(0), "");

    let view = companion.view();
    assert_eq!(view.active_paragraph, Some(9));
    assert!(view.pulse.dot_center().is_some());

    companion.teardown().await;
    assert_eq!(document.inline_style(9), "");
    assert!(!companion.view().overlay_visible);
}

#[tokio::test(start_paused = true)]
async fn test_scroll_burst_recomputes_once_per_frame() {
    let model = Arc::new(scripted());
    let (companion, _doc) = companion_with(model, calm_paragraphs());

    assert!(companion.on_scroll());
    assert!(!companion.on_scroll());
    assert!(!companion.on_scroll());
    companion.animation_frame(Instant::now());
    // Short paragraphs all fit; the last one sits closest to the centre
    assert_eq!(companion.active_paragraph(), Some(4));
    assert!(companion.on_scroll());
}

#[tokio::test(start_paused = true)]
async fn test_unavailable_model_shows_errors_and_hides_loaders() {
    let model = Arc::new(scripted().with_availability(Availability::Unavailable));
    let (companion, _doc) = companion_with(model.clone(), calm_paragraphs());

    companion.mount().await;
    companion.open_tab(Tab::Quiz).await;
    companion.open_tab(Tab::Analysis).await;

    let view = companion.view();
    assert!(!view.any_loader_visible());
    assert!(view.bias.body.is_error());
    assert!(view.deep.body.is_error());
    assert!(view.emotions.body.is_error());
    assert!(view.quiz.body.is_error());
    assert!(!view.pulse.is_loading());

    // The pulse shows the neutral trace, not a frozen loading frame
    let mut neutral = PulseCanvas::new();
    neutral.draw(&[0.5; 5], None);
    assert_eq!(view.pulse.canvas(), neutral.canvas());

    // Advanced falls back to the default distribution
    assert!(view.legend_html.unwrap().contains("Politics</strong>: 30%"));

    assert_eq!(model.stats().create_attempts, 0);
    assert_eq!(model.stats().model_calls(), 0);
    for kind in [
        JobKind::Bias,
        JobKind::Deep,
        JobKind::Emotions,
        JobKind::Quiz,
        JobKind::Advanced,
    ] {
        assert_eq!(companion.event_log().count(kind, JobEventType::Failed), 1, "{}", kind);
    }

    // Nothing was cached, so a later activation may retry
    assert!(companion.cache().get(CacheSlot::Bias).is_none());
    assert!(companion.cache().get(CacheSlot::Advanced).is_none());
}

#[tokio::test(start_paused = true)]
async fn test_emotion_scores_fall_back_to_neutral() {
    let model = Arc::new(ScriptedModel::new().respond(
        Matcher::Preamble("emotion analyzer".into()),
        ScriptedReply::Fail("model busy".into()),
    ));
    let (companion, _doc) = companion_with(model.clone(), calm_paragraphs());

    let started = Instant::now();
    companion.mount().await;

    match companion.cache().get(CacheSlot::Emotions) {
        Some(Artifact::Emotions(trace)) => {
            assert_eq!(trace.scores(), &[0.5; 5]);
            assert_eq!(trace.scored_count(), 0);
        }
        other => panic!("unexpected emotion cache: {:?}", other),
    }
    // Three attempts per paragraph
    assert_eq!(model.stats().prompts, 15);
    // 5 × (500 + 1000) ms backoff plus one 200 ms pause between two chunks
    assert!(started.elapsed() >= Duration::from_millis(1000 + 5 * 1500 + 200));
}

#[tokio::test(start_paused = true)]
async fn test_chat_streams_formatted_reply_and_rotates_suggestions() {
    let model = Arc::new(scripted());
    let (companion, _doc) = companion_with(model.clone(), calm_paragraphs());
    let companion = companion.with_suggestion_seed(3);

    let reply = companion.send_chat("  What is the main argument?  ").await.unwrap();
    assert!(reply.contains("**main**"));

    let view = companion.view();
    assert_eq!(view.chat.len(), 2);
    assert_eq!(view.chat[0].html, "What is the main argument?");
    assert!(!view.chat[1].pending);
    assert!(view.chat[1].html.contains("<strong>main</strong>"));
    assert!(view.chat[1].html.contains("<li>rents rise</li>"));

    let first = view.suggestions.clone();
    companion.click_suggestion(0).await.unwrap();
    let view = companion.view();
    assert_eq!(view.chat.len(), 4);
    assert_eq!(view.chat[2].html, markup::escape_html(&first[0]));
    assert_eq!(view.suggestions.len(), 3);
    assert!(!view.suggestions.contains(&first[0]));

    // One chat session for both turns, released on teardown
    assert_eq!(model.stats().sessions_created, 1);
    companion.teardown().await;
    assert_eq!(model.stats().sessions_destroyed, 1);
}

#[tokio::test(start_paused = true)]
async fn test_reference_click_scrolls_and_highlights() {
    let paragraphs: Vec<String> = (0..6)
        .map(|i| {
            format!("Paragraph {} {}", i, "with enough words to take several lines. ".repeat(8))
        })
        .collect();
    let document =
        Arc::new(StaticDocument::from_paragraphs(paragraphs).with_viewport_height(200.0));
    let companion = Companion::new(document.clone(), URL, Arc::new(scripted()), Tuning::default());

    assert!(companion.click_reference(4));
    assert!(document.scroll_y() > 0.0);
    assert!(document.inline_style(4).contains("!important"));

    companion.animation_frame(Instant::now());
    assert_eq!(companion.active_paragraph(), Some(4));

    tokio::time::sleep(Duration::from_millis(4900)).await;
    // Reference highlight gone, scroll highlight remains
    assert!(!document.inline_style(4).contains("!important"));
    assert!(document.inline_style(4).contains("scale(1.02)"));

    assert!(!companion.click_reference(99));
}

#[test]
fn test_homescreen_pages_never_start() {
    let whitelist = vec!["example.com".to_string()];
    let doc = Arc::new(StaticDocument::from_paragraphs(calm_paragraphs()));

    let result = Companion::activate(
        doc.clone(),
        "https://news.example.com/",
        &whitelist,
        Activation::Normal,
        Arc::new(ScriptedModel::new()),
        Tuning::default(),
    );
    assert!(matches!(result, Err(Rejection::Homescreen(HomescreenRule::Root))));

    let result = Companion::activate(
        doc.clone(),
        "https://other.org/article/budget",
        &whitelist,
        Activation::Normal,
        Arc::new(ScriptedModel::new()),
        Tuning::default(),
    );
    assert!(matches!(result, Err(Rejection::NotWhitelisted(_))));

    let forced = Companion::activate(
        doc,
        "https://news.example.com/",
        &whitelist,
        Activation::Forced,
        Arc::new(ScriptedModel::new()),
        Tuning::default(),
    );
    assert!(forced.is_ok());
}
