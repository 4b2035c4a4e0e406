//! The companion controller.
//!
//! Owns the view state of one page session and routes every user event:
//! mount runs the background analyses, tabs trigger the lazy ones, frames
//! drive scroll tracking and animations. Failures never escape; each one is
//! logged, recorded in the job event log and rendered as an error card in
//! its section.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, error, info, instrument, warn};

use crate::adapters::{collect_stream, LanguageModel};
use crate::analysis::chat::{ChatEngine, SuggestionPool};
use crate::analysis::emotion::{self, ScoringPlan};
use crate::analysis::quiz::{self, QuizGrade, QuizSession};
use crate::analysis::{advanced, bias, deep, AnalysisError};
use crate::config::Tuning;
use crate::domain::{
    AdvancedReport, Article, Artifact, BiasVerdict, CacheSlot, CitedAnalysis, EmotionTrace,
    EventLog, JobEvent, JobEventType, JobKind, OptionLetter, TopicDistribution,
};
use crate::page::Document;
use crate::render::donut::{self, ChartAnimation};
use crate::render::markup;
use crate::view::styles::ReferencePhase;
use crate::view::{
    ChatBubble, LoaderGuard, ParagraphStyles, QuizForm, ScrollTracker, SectionBody, SectionId,
    Speaker, Tab, Tooltip, ViewState,
};

use super::cache::{CacheEntry, ResponseCache, SlotTicket};
use super::gate::{self, Activation, Decision, Rejection};
use super::gateway::ModelGateway;
use super::retry::RetryPolicy;

const THINKING: &str = "Thinking...";

/// Donut animation and the data it draws
#[derive(Debug, Default)]
struct ChartState {
    animation: Option<ChartAnimation>,
    distribution: Option<TopicDistribution>,
    generation: u64,
    /// Last frame drawn at full extent; hover is live
    finished: bool,
}

/// The timed reference highlight currently scheduled
struct Highlight {
    generation: u64,
    task: JoinHandle<()>,
}

struct Shared {
    document: Arc<dyn Document>,
    article: Article,
    gateway: ModelGateway,
    cache: ResponseCache,
    events: EventLog,
    tuning: Tuning,
    view: Arc<Mutex<ViewState>>,
    chat: ChatEngine,
    suggestions: Mutex<SuggestionPool>,
    quiz: Mutex<Option<QuizSession>>,
    quiz_running: AtomicBool,
    tracker: Mutex<ScrollTracker>,
    styles: Mutex<ParagraphStyles>,
    /// Latest committed emotion trace, once the first chunk landed
    trace: Mutex<Option<EmotionTrace>>,
    highlight: Mutex<Option<Highlight>>,
    highlight_generation: AtomicU64,
    chart: Mutex<ChartState>,
}

/// Clears a running flag when dropped
struct RunningFlag<'a>(&'a AtomicBool);

impl Drop for RunningFlag<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// The companion mounted on one article page
#[derive(Clone)]
pub struct Companion {
    inner: Arc<Shared>,
}

impl Companion {
    /// Create a companion for the document loaded from `url`
    pub fn new(
        document: Arc<dyn Document>,
        url: &str,
        model: Arc<dyn LanguageModel>,
        tuning: Tuning,
    ) -> Self {
        let article = Article::extract(document.as_ref(), url);
        let events = EventLog::new();
        let gateway = ModelGateway::new(
            model,
            RetryPolicy::linear(tuning.session_attempts, tuning.session_backoff_ms),
            events.clone(),
        );
        let chat = ChatEngine::new(gateway.clone(), article.plain_text(tuning.chat_input_chars));

        info!(
            page = %article.page,
            host = %article.host,
            paragraphs = article.len(),
            model = gateway.model_name(),
            "Companion created"
        );

        Self {
            inner: Arc::new(Shared {
                document,
                article,
                gateway,
                cache: ResponseCache::new(),
                events,
                tuning,
                view: Arc::new(Mutex::new(ViewState::default())),
                chat,
                suggestions: Mutex::new(SuggestionPool::new()),
                quiz: Mutex::new(None),
                quiz_running: AtomicBool::new(false),
                tracker: Mutex::new(ScrollTracker::new()),
                styles: Mutex::new(ParagraphStyles::new()),
                trace: Mutex::new(None),
                highlight: Mutex::new(None),
                highlight_generation: AtomicU64::new(0),
                chart: Mutex::new(ChartState::default()),
            }),
        }
    }

    /// Gate the page, then create the companion if it may start
    pub fn activate(
        document: Arc<dyn Document>,
        url: &str,
        whitelist: &[String],
        activation: Activation,
        model: Arc<dyn LanguageModel>,
        tuning: Tuning,
    ) -> Result<Self, Rejection> {
        match gate::decide(url, whitelist, activation) {
            Decision::Start => Ok(Self::new(document, url, model, tuning)),
            Decision::Forced(bypassed) => {
                if let Some(rejection) = bypassed {
                    info!(reason = %rejection, "Eligibility check bypassed by force activation");
                }
                Ok(Self::new(document, url, model, tuning))
            }
            Decision::Reject(rejection) => {
                info!(reason = %rejection, "Page not eligible, companion not started");
                Err(rejection)
            }
        }
    }

    /// Use a seeded suggestion pool for reproducible rotation
    pub fn with_suggestion_seed(self, seed: u64) -> Self {
        let pool = SuggestionPool::seeded(seed);
        let shown = pool.shown().to_vec();
        *self.inner.suggestions.lock() = pool;
        self.inner.view.lock().suggestions = shown;
        self
    }

    pub fn article(&self) -> &Article {
        &self.inner.article
    }

    /// Snapshot of the view
    pub fn view(&self) -> ViewState {
        self.inner.view.lock().clone()
    }

    /// Every job event recorded so far
    pub fn events(&self) -> Vec<JobEvent> {
        self.inner.events.events()
    }

    pub fn event_log(&self) -> &EventLog {
        &self.inner.events
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.inner.cache
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Show the overlay, wait the mount delay, then run the background
    /// analyses together
    #[instrument(skip(self), fields(page = %self.inner.article.page))]
    pub async fn mount(&self) {
        let suggestions = self.inner.suggestions.lock().shown().to_vec();
        {
            let mut view = self.inner.view.lock();
            view.overlay_visible = true;
            view.suggestions = suggestions;
        }
        info!("Overlay shown");

        tokio::time::sleep(self.inner.tuning.mount_delay()).await;

        tokio::join!(
            self.run_bias(),
            self.run_deep(),
            self.run_emotions(),
            self.setup_chat(),
            self.setup_quiz(),
        );
        info!("Background analyses finished");
    }

    /// Release the chat session, restore paragraph styles and stop every
    /// animation
    #[instrument(skip(self))]
    pub async fn teardown(&self) {
        self.inner.chat.close().await;

        if let Some(highlight) = self.inner.highlight.lock().take() {
            highlight.task.abort();
        }
        self.inner
            .styles
            .lock()
            .restore_all(self.inner.document.as_ref());
        {
            let mut chart = self.inner.chart.lock();
            chart.animation = None;
        }

        let mut view = self.inner.view.lock();
        view.pulse.stop_loading();
        view.overlay_visible = false;
        view.active_paragraph = None;
        view.tooltip = None;
        info!("Companion torn down");
    }

    pub fn toggle_overlay(&self) -> bool {
        let mut view = self.inner.view.lock();
        view.overlay_visible = !view.overlay_visible;
        view.overlay_visible
    }

    pub fn close_overlay(&self) {
        self.inner.view.lock().overlay_visible = false;
    }

    /// Collapse or expand the emotion pulse panel
    pub fn toggle_pulse_panel(&self) -> bool {
        let mut view = self.inner.view.lock();
        view.pulse_collapsed = !view.pulse_collapsed;
        view.pulse_collapsed
    }

    /// Switch tabs, running the lazy analyses a tab needs
    #[instrument(skip(self))]
    pub async fn open_tab(&self, tab: Tab) {
        self.inner.view.lock().active_tab = tab;

        match tab {
            // Also retries after a failed generation left no questions
            Tab::Quiz if self.needs_quiz() => {
                self.generate_quiz().await;
            }
            Tab::Analysis => self.run_advanced().await,
            _ => {}
        }
    }

    fn needs_quiz(&self) -> bool {
        self.inner.quiz.lock().is_none() && !self.inner.quiz_running.load(Ordering::SeqCst)
    }

    // -----------------------------------------------------------------------
    // Frames and scrolling
    // -----------------------------------------------------------------------

    /// Record a scroll event; at most one recomputation per frame
    pub fn on_scroll(&self) -> bool {
        self.inner.tracker.lock().on_scroll()
    }

    /// Run one animation frame at `now`
    pub fn animation_frame(&self, now: Instant) {
        self.track_active_paragraph();
        self.inner.view.lock().pulse.tick();
        self.draw_chart_frame(now);
    }

    fn track_active_paragraph(&self) {
        let inner = &self.inner;
        let changed = inner
            .tracker
            .lock()
            .on_frame(inner.document.as_ref(), &inner.article.paragraphs);
        let Some(index) = changed else {
            return;
        };
        let Some(paragraph) = inner.article.paragraph(index) else {
            return;
        };

        inner
            .styles
            .lock()
            .set_active(inner.document.as_ref(), Some(paragraph.node));
        debug!(index, "Active paragraph changed");

        let trace = inner.trace.lock().clone();
        let mut view = inner.view.lock();
        view.active_paragraph = Some(index);
        if let Some(trace) = trace {
            view.pulse.draw(trace.scores(), Some(index));
        }
    }

    /// Paragraph currently highlighted by scroll tracking
    pub fn active_paragraph(&self) -> Option<usize> {
        self.inner.tracker.lock().active()
    }

    /// Scroll to a cited paragraph and highlight it for a while.
    ///
    /// Unknown indices are logged and ignored.
    pub fn click_reference(&self, index: usize) -> bool {
        let inner = &self.inner;
        let Some(paragraph) = inner.article.paragraph(index) else {
            let error = AnalysisError::InvalidReference {
                index,
                paragraphs: inner.article.len(),
            };
            warn!(error = %error, "Ignoring reference click");
            return false;
        };
        let node = paragraph.node;

        inner.document.scroll_into_view(node);
        self.on_scroll();

        let generation = inner.highlight_generation.fetch_add(1, Ordering::SeqCst) + 1;
        inner
            .styles
            .lock()
            .set_reference(inner.document.as_ref(), node, ReferencePhase::Holding);

        let shared = Arc::clone(inner);
        let hold = std::time::Duration::from_millis(inner.tuning.highlight_hold_ms);
        let fade = std::time::Duration::from_millis(inner.tuning.highlight_fade_ms);
        let task = tokio::spawn(async move {
            tokio::time::sleep(hold).await;
            if shared.highlight_generation.load(Ordering::SeqCst) != generation {
                return;
            }
            shared
                .styles
                .lock()
                .set_reference(shared.document.as_ref(), node, ReferencePhase::Fading);

            tokio::time::sleep(fade).await;
            if shared.highlight_generation.load(Ordering::SeqCst) != generation {
                return;
            }
            shared
                .styles
                .lock()
                .clear_reference(shared.document.as_ref(), node);
        });

        if let Some(previous) = inner.highlight.lock().replace(Highlight { generation, task }) {
            debug!(previous = previous.generation, "Superseding reference highlight");
            previous.task.abort();
        }
        true
    }

    // -----------------------------------------------------------------------
    // Cached analyses
    // -----------------------------------------------------------------------

    /// Begin a cached job: re-render on a hit, skip while running
    fn begin(&self, slot: CacheSlot) -> Option<SlotTicket> {
        let kind = slot.kind();
        match self.inner.cache.begin(slot) {
            CacheEntry::Cached(artifact) => {
                debug!(kind = %kind, "Cache hit");
                self.inner.events.append(JobEvent::new(
                    kind,
                    JobEventType::CacheHit,
                    format!("{} re-rendered from cache", kind),
                ));
                self.render_artifact(&artifact);
                None
            }
            CacheEntry::AlreadyRunning => {
                debug!(kind = %kind, "Already running");
                self.inner.events.append(JobEvent::new(
                    kind,
                    JobEventType::AlreadyRunning,
                    format!("{} already in progress", kind),
                ));
                None
            }
            CacheEntry::Started(ticket) => {
                self.inner.events.append(JobEvent::new(
                    kind,
                    JobEventType::Started,
                    format!("{} started", kind),
                ));
                Some(ticket)
            }
        }
    }

    fn render_artifact(&self, artifact: &Artifact) {
        match artifact {
            Artifact::Bias(verdict) => self.render_bias(verdict),
            Artifact::Deep(analysis) => self.render_deep(analysis),
            Artifact::Emotions(trace) => self.render_trace(trace),
            Artifact::Advanced(report) => self.render_advanced(report),
        }
    }

    fn completed(&self, kind: JobKind, started: Instant) {
        let duration_ms = started.elapsed().as_millis() as u64;
        info!(kind = %kind, duration_ms, "Analysis completed");
        self.inner.events.append(
            JobEvent::new(kind, JobEventType::Completed, format!("{} completed", kind))
                .with_duration(duration_ms),
        );
    }

    fn failed(
        &self,
        section: SectionId,
        kind: JobKind,
        title: &str,
        e: &AnalysisError,
        started: Instant,
    ) {
        let duration_ms = started.elapsed().as_millis() as u64;
        error!(kind = %kind, error = %e, duration_ms, "Analysis failed");
        self.inner.events.append(
            JobEvent::new(kind, JobEventType::Failed, format!("{} failed", kind))
                .with_duration(duration_ms)
                .with_error(e.to_string()),
        );
        self.inner.view.lock().section_mut(section).body =
            SectionBody::Error(markup::error_card(title, &e.to_string()));
    }

    fn render_bias(&self, verdict: &BiasVerdict) {
        self.inner.view.lock().bias.body = SectionBody::Html(markup::bias_html(verdict));
    }

    fn render_deep(&self, analysis: &CitedAnalysis) {
        self.inner.view.lock().deep.body = SectionBody::Html(markup::cited_analysis_html(analysis));
    }

    fn render_trace(&self, trace: &EmotionTrace) {
        *self.inner.trace.lock() = Some(trace.clone());
        let active = self.inner.tracker.lock().active();
        self.inner.view.lock().pulse.draw(trace.scores(), active);
    }

    fn render_advanced(&self, report: &AdvancedReport) {
        {
            let mut view = self.inner.view.lock();
            view.advanced.body = SectionBody::Html(markup::legend_html(&report.topics));
            view.legend_html = Some(markup::legend_html(&report.topics));
            view.trust_html = Some(markup::trust_html(&report.trust));
        }
        self.restart_chart(report.topics.clone());
    }

    #[instrument(skip(self))]
    async fn run_bias(&self) {
        let Some(ticket) = self.begin(CacheSlot::Bias) else {
            return;
        };
        let _loader = LoaderGuard::show(&self.inner.view, SectionId::Bias);
        let started = Instant::now();

        let result: Result<BiasVerdict, AnalysisError> = async {
            let session = self.inner.gateway.acquire(JobKind::Bias, bias::PREAMBLE).await?;
            let text = self.inner.article.plain_text(self.inner.tuning.bias_input_chars);
            let stream = session.ask_stream(&bias::prompt(&text)).await?;
            let reply =
                collect_stream(stream, |partial| self.render_bias(&bias::parse(partial))).await?;
            Ok(bias::parse(&reply))
        }
        .await;

        match result {
            Ok(verdict) => {
                if !verdict.parsed {
                    warn!("Bias reply did not follow the format, showing raw text");
                }
                self.render_bias(&verdict);
                ticket.complete(Artifact::Bias(verdict));
                self.completed(JobKind::Bias, started);
            }
            Err(e) => self.failed(
                SectionId::Bias,
                JobKind::Bias,
                "Error analyzing bias:",
                &e,
                started,
            ),
        }
    }

    #[instrument(skip(self))]
    async fn run_deep(&self) {
        let Some(ticket) = self.begin(CacheSlot::Deep) else {
            return;
        };
        let _loader = LoaderGuard::show(&self.inner.view, SectionId::Deep);
        let started = Instant::now();
        let paragraphs = self.inner.article.len();

        let result: Result<CitedAnalysis, AnalysisError> = async {
            let session = self.inner.gateway.acquire(JobKind::Deep, deep::PREAMBLE).await?;
            let text = self.inner.article.labelled_text(self.inner.tuning.deep_input_chars);
            let stream = session.ask_stream(&deep::prompt(&text)).await?;
            let reply = collect_stream(stream, |partial| {
                self.render_deep(&deep::parse(partial, paragraphs))
            })
            .await?;
            Ok(deep::parse(&reply, paragraphs))
        }
        .await;

        match result {
            Ok(analysis) => {
                self.render_deep(&analysis);
                ticket.complete(Artifact::Deep(analysis));
                self.completed(JobKind::Deep, started);
            }
            Err(e) => self.failed(
                SectionId::Deep,
                JobKind::Deep,
                "Error generating analysis:",
                &e,
                started,
            ),
        }
    }

    #[instrument(skip(self))]
    async fn run_emotions(&self) {
        let Some(ticket) = self.begin(CacheSlot::Emotions) else {
            return;
        };
        let _loader = LoaderGuard::show(&self.inner.view, SectionId::Emotions);
        let started = Instant::now();
        self.inner.view.lock().pulse.start_loading();

        let plan = ScoringPlan::from(&self.inner.tuning);
        let result = emotion::score_article(
            &self.inner.gateway,
            &self.inner.article.paragraphs,
            plan,
            |trace| self.render_trace(trace),
        )
        .await;

        match result {
            Ok(trace) => {
                info!(
                    scored = trace.scored_count(),
                    paragraphs = trace.len(),
                    "Emotion trace complete"
                );
                self.render_trace(&trace);
                ticket.complete(Artifact::Emotions(trace));
                self.completed(JobKind::Emotions, started);
                // Pick the initial active paragraph on the next frame
                self.on_scroll();
            }
            Err(e) => {
                // Scores stay at their neutral defaults
                self.render_trace(&EmotionTrace::neutral(self.inner.article.len()));
                self.failed(
                    SectionId::Emotions,
                    JobKind::Emotions,
                    "Error analyzing emotions:",
                    &e,
                    started,
                );
            }
        }
    }

    /// Advanced analysis; model failures fall back to the default report,
    /// which is shown but not cached
    #[instrument(skip(self))]
    async fn run_advanced(&self) {
        let Some(ticket) = self.begin(CacheSlot::Advanced) else {
            return;
        };
        let _loader = LoaderGuard::show(&self.inner.view, SectionId::Advanced);
        let started = Instant::now();
        let host = self.inner.article.host.clone();

        let result: Result<AdvancedReport, AnalysisError> = async {
            let session = self
                .inner
                .gateway
                .acquire(JobKind::Advanced, advanced::PREAMBLE)
                .await?;
            let text = self.inner.article.plain_text(self.inner.tuning.advanced_input_chars);
            let stream = session.ask_stream(&advanced::prompt(&host, &text)).await?;
            let reply = collect_stream(stream, |_| {}).await?;
            Ok(advanced::parse(&reply, &host))
        }
        .await;

        match result {
            Ok(report) => {
                if report.topics.is_default {
                    warn!("No usable topics in reply, showing default distribution");
                }
                self.render_advanced(&report);
                ticket.complete(Artifact::Advanced(report));
                self.completed(JobKind::Advanced, started);
            }
            Err(e) => {
                let duration_ms = started.elapsed().as_millis() as u64;
                error!(error = %e, "Advanced analysis failed, showing defaults");
                self.inner.events.append(
                    JobEvent::new(
                        JobKind::Advanced,
                        JobEventType::Failed,
                        "advanced failed, defaults shown",
                    )
                    .with_duration(duration_ms)
                    .with_error(e.to_string()),
                );
                self.render_advanced(&advanced::default_report(&host));
            }
        }
    }

    // -----------------------------------------------------------------------
    // Donut chart
    // -----------------------------------------------------------------------

    /// Start the sweep from zero, superseding any running animation
    fn restart_chart(&self, distribution: TopicDistribution) {
        let mut chart = self.inner.chart.lock();
        chart.generation += 1;
        chart.animation = Some(ChartAnimation {
            generation: chart.generation,
            started: Instant::now(),
            duration: self.inner.tuning.chart_animation(),
        });
        chart.finished = false;

        let mut view = self.inner.view.lock();
        view.tooltip = None;
        donut::draw_frame(&mut view.chart, &distribution, 0.0);
        chart.distribution = Some(distribution);
        debug!(generation = chart.generation, "Chart animation restarted");
    }

    fn draw_chart_frame(&self, now: Instant) {
        let mut chart = self.inner.chart.lock();
        let Some(animation) = chart.animation else {
            return;
        };
        if chart.finished || animation.generation != chart.generation {
            return;
        }
        let Some(distribution) = chart.distribution.as_ref() else {
            return;
        };

        let progress = animation.progress(now);
        donut::draw_frame(&mut self.inner.view.lock().chart, distribution, progress);
        if animation.is_complete(now) {
            chart.finished = true;
        }
    }

    /// Generation of the current chart animation
    pub fn chart_generation(&self) -> u64 {
        self.inner.chart.lock().generation
    }

    /// Whether the chart has finished its sweep
    pub fn chart_finished(&self) -> bool {
        self.inner.chart.lock().finished
    }

    /// Pointer moved over the chart at canvas position (`x`, `y`)
    pub fn hover_chart(&self, x: f64, y: f64) -> Option<usize> {
        let hit = {
            let chart = self.inner.chart.lock();
            match chart.distribution.as_ref() {
                Some(distribution) if chart.finished => donut::hit_test(distribution, x, y)
                    .and_then(|i| distribution.slices.get(i).map(|slice| (i, slice.clone()))),
                _ => None,
            }
        };

        let mut view = self.inner.view.lock();
        match hit {
            Some((index, slice)) => {
                view.tooltip = Some(Tooltip {
                    html: markup::topic_tooltip(&slice),
                    x,
                    y,
                });
                Some(index)
            }
            None => {
                view.tooltip = None;
                None
            }
        }
    }

    /// Pointer left the chart
    pub fn leave_chart(&self) {
        self.inner.view.lock().tooltip = None;
    }

    // -----------------------------------------------------------------------
    // Quiz
    // -----------------------------------------------------------------------

    /// Show the loaded quiz, if any; questions are generated on tab open
    async fn setup_quiz(&self) {
        let form = self.inner.quiz.lock().as_ref().map(quiz_form);
        let mut view = self.inner.view.lock();
        if form.is_none() {
            view.quiz.body = SectionBody::Empty;
        }
        view.quiz_form = form;
    }

    /// Generate a fresh quiz; refused while another generation runs
    #[instrument(skip(self))]
    pub async fn generate_quiz(&self) -> bool {
        let inner = &self.inner;
        if inner.quiz_running.swap(true, Ordering::SeqCst) {
            debug!("Quiz generation already running");
            inner.events.append(JobEvent::new(
                JobKind::Quiz,
                JobEventType::AlreadyRunning,
                "quiz already in progress",
            ));
            return false;
        }
        let _running = RunningFlag(&inner.quiz_running);
        let _loader = LoaderGuard::show(&inner.view, SectionId::Quiz);
        let started = Instant::now();

        *inner.quiz.lock() = None;
        {
            let mut view = inner.view.lock();
            view.quiz_form = None;
            view.quiz.body = SectionBody::Empty;
        }
        inner
            .events
            .append(JobEvent::new(JobKind::Quiz, JobEventType::Started, "quiz started"));

        let result: Result<QuizSession, AnalysisError> = async {
            let session = inner.gateway.acquire(JobKind::Quiz, quiz::PREAMBLE).await?;
            let text = inner.article.plain_text(inner.tuning.quiz_input_chars);
            let stream = session.ask_stream(&quiz::prompt(&text)).await?;
            let reply = collect_stream(stream, |_| {}).await?;

            let items = quiz::parse(&reply);
            if items.is_empty() {
                return Err(AnalysisError::ParseFailed {
                    kind: JobKind::Quiz,
                    reason: "Failed to generate quiz questions. Please try again.".to_string(),
                });
            }
            Ok(QuizSession::new(items))
        }
        .await;

        match result {
            Ok(session) => {
                info!(questions = session.items().len(), "Quiz ready");
                inner.view.lock().quiz_form = Some(quiz_form(&session));
                *inner.quiz.lock() = Some(session);
                self.completed(JobKind::Quiz, started);
                true
            }
            Err(e) => {
                self.failed(SectionId::Quiz, JobKind::Quiz, "Error generating quiz:", &e, started);
                false
            }
        }
    }

    /// Choose an option; ignored once graded
    pub fn select_answer(&self, question: usize, letter: OptionLetter) -> bool {
        let mut quiz = self.inner.quiz.lock();
        let Some(session) = quiz.as_mut() else {
            return false;
        };
        if !session.select(question, letter) {
            return false;
        }
        self.inner.view.lock().quiz_form = Some(quiz_form(session));
        true
    }

    /// Grade the quiz once every question is answered
    pub fn submit_quiz(&self) -> Option<QuizGrade> {
        let mut quiz = self.inner.quiz.lock();
        let session = quiz.as_mut()?;
        let grade = session.submit()?.clone();
        info!(
            correct = grade.correct,
            total = grade.total,
            percent = grade.percent,
            "Quiz graded"
        );
        self.inner.view.lock().quiz_form = Some(quiz_form(session));
        Some(grade)
    }

    /// Throw the current quiz away and generate a new one
    pub async fn retake_quiz(&self) -> bool {
        self.generate_quiz().await
    }

    // -----------------------------------------------------------------------
    // Chat
    // -----------------------------------------------------------------------

    async fn setup_chat(&self) {
        let shown = self.inner.suggestions.lock().shown().to_vec();
        self.inner.view.lock().suggestions = shown;
    }

    /// Send a chat message; blank messages are ignored.
    ///
    /// Returns the reply, or `None` when nothing was sent or the turn failed.
    #[instrument(skip_all)]
    pub async fn send_chat(&self, message: &str) -> Option<String> {
        let message = message.trim();
        if message.is_empty() {
            return None;
        }

        let bubble = {
            let mut view = self.inner.view.lock();
            view.chat.push(ChatBubble {
                speaker: Speaker::User,
                html: markup::escape_html(message),
                pending: false,
            });
            view.chat.push(ChatBubble {
                speaker: Speaker::Assistant,
                html: THINKING.to_string(),
                pending: true,
            });
            view.chat.len() - 1
        };

        let result = self
            .inner
            .chat
            .send(message, |partial| {
                if let Some(reply) = self.inner.view.lock().chat.get_mut(bubble) {
                    reply.html = markup::format_model_output(partial);
                }
            })
            .await;

        let mut view = self.inner.view.lock();
        let Some(reply) = view.chat.get_mut(bubble) else {
            return None;
        };
        reply.pending = false;
        match result {
            Ok(text) => {
                reply.html = markup::format_model_output(&text);
                Some(text)
            }
            Err(e) => {
                warn!(error = %e, "Chat turn failed");
                reply.html = markup::escape_html(&format!("Error: {}", e));
                None
            }
        }
    }

    /// Send the suggestion shown at `index` and rotate in a replacement
    pub async fn click_suggestion(&self, index: usize) -> Option<String> {
        let question = {
            let mut pool = self.inner.suggestions.lock();
            let question = pool.take(index)?;
            self.inner.view.lock().suggestions = pool.shown().to_vec();
            question
        };
        self.send_chat(&question).await
    }
}

fn quiz_form(session: &QuizSession) -> QuizForm {
    let grade = session.grade().cloned();
    QuizForm {
        items: session.items().to_vec(),
        answers: session.answers().to_vec(),
        submit_enabled: session.all_answered() && grade.is_none(),
        results_html: grade.as_ref().map(markup::quiz_results_html),
        grade,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::scripted::Matcher;
    use crate::adapters::ScriptedModel;
    use crate::page::StaticDocument;

    const URL: &str = "https://news.example.com/2024/05/council-budget";

    fn document() -> Arc<StaticDocument> {
        Arc::new(StaticDocument::from_paragraphs(vec![
            "The council approved the budget after a long debate on Tuesday.",
            "Residents voiced concerns about rising rents in the city centre.",
        ]))
    }

    #[tokio::test(start_paused = true)]
    async fn test_reference_click_unknown_index_ignored() {
        let doc = document();
        let companion =
            Companion::new(doc.clone(), URL, Arc::new(ScriptedModel::new()), Tuning::default());
        assert!(!companion.click_reference(9));
        assert_eq!(doc.inline_style(0), "");
    }

    #[tokio::test(start_paused = true)]
    async fn test_reference_highlight_lifecycle() {
        let doc = document();
        doc.set_inline_style(1, "color: navy");
        let companion =
            Companion::new(doc.clone(), URL, Arc::new(ScriptedModel::new()), Tuning::default());

        assert!(companion.click_reference(1));
        assert!(doc.inline_style(1).contains("!important"));

        tokio::time::sleep(std::time::Duration::from_millis(4100)).await;
        assert!(doc.inline_style(1).contains("ease-out"));

        tokio::time::sleep(std::time::Duration::from_millis(800)).await;
        assert_eq!(doc.inline_style(1), "color: navy");
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_click_clears_first_highlight() {
        let doc = document();
        let companion =
            Companion::new(doc.clone(), URL, Arc::new(ScriptedModel::new()), Tuning::default());

        companion.click_reference(0);
        tokio::time::sleep(std::time::Duration::from_millis(3000)).await;
        companion.click_reference(1);
        assert_eq!(doc.inline_style(0), "");

        // The first timer would have fired here
        tokio::time::sleep(std::time::Duration::from_millis(1500)).await;
        assert!(doc.inline_style(1).contains("!important"));
        assert_eq!(doc.inline_style(0), "");
    }

    #[tokio::test(start_paused = true)]
    async fn test_overlay_and_panel_toggles() {
        let companion =
            Companion::new(document(), URL, Arc::new(ScriptedModel::new()), Tuning::default());
        assert!(companion.toggle_overlay());
        assert!(!companion.toggle_overlay());
        assert!(companion.toggle_pulse_panel());
        assert!(companion.view().pulse_collapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_blank_chat_ignored() {
        let model = Arc::new(ScriptedModel::new().respond(Matcher::Any, "Hello."));
        let companion = Companion::new(document(), URL, model.clone(), Tuning::default());
        assert!(companion.send_chat("   ").await.is_none());
        assert!(companion.view().chat.is_empty());
        assert_eq!(model.stats().model_calls(), 0);
    }
}
