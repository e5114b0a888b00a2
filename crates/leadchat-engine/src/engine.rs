//! The chat engine: one conversation, orchestrated end to end.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

use leadchat_completion::client::{CompletionBackend, StreamEvent};
use leadchat_completion::types::{ApiMessage, ApiRole};
use leadchat_core::{
    Affordance, AvailableSlot, ChatRole, ContactInfo, DialogueState, Message, MessageId, Session,
};

use crate::booking::BookingCoordinator;
use crate::classifier;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::events::ChatEvent;
use crate::prompt;
use crate::script::{self, ScriptedMessage};
use crate::store::SessionStore;
use crate::sync::LeadSyncDispatcher;
use crate::timing::TimingSimulator;

/// Capacity of the render-event channel. Events are best-effort; when the
/// receiver lags, old ones are dropped rather than blocking the turn.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Copy appended after every terminal message.
const SIGNOFF: &str =
    "You made a smart move starting here. Excited to help you find the places that actually fit your wedding.";

/// Generic retryable error shown when a completion fails twice.
const RETRYABLE_ERROR: &str = "Something went wrong. Please try again.";

/// Drives one conversation: session persistence, scripted branches,
/// streamed completions classified into the state machine, booking and
/// lead sync.
///
/// One logical thread of conversation: a submission guard rejects a second
/// `send_message` while a turn is in flight, and a reset during streaming
/// makes the stale result miss its conversation id and get discarded.
pub struct ChatEngine {
    config: EngineConfig,
    store: Arc<dyn SessionStore>,
    completion: Arc<dyn CompletionBackend>,
    booking: BookingCoordinator,
    leads: LeadSyncDispatcher,
    timing: TimingSimulator,
    session: Arc<RwLock<Session>>,
    events: mpsc::Sender<ChatEvent>,
    in_flight: AtomicBool,
}

impl ChatEngine {
    /// Load (or create) the session and stage the greeting if it is new.
    ///
    /// Returns the engine and the receiver for [`ChatEvent`]s.
    pub async fn open(
        config: EngineConfig,
        store: Arc<dyn SessionStore>,
        completion: Arc<dyn CompletionBackend>,
        booking: BookingCoordinator,
        leads: LeadSyncDispatcher,
        timing: TimingSimulator,
    ) -> Result<(Self, mpsc::Receiver<ChatEvent>), EngineError> {
        let session = store.load().await?;
        let (events, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        let engine = Self {
            config,
            store,
            completion,
            booking,
            leads,
            timing,
            session: Arc::new(RwLock::new(session)),
            events,
            in_flight: AtomicBool::new(false),
        };

        if engine.session.read().await.is_empty() {
            engine.stage_intro().await?;
        }

        info!(
            conversation_id = %engine.session.read().await.conversation_id,
            "chat engine opened"
        );
        Ok((engine, rx))
    }

    /// Current conversation id.
    pub async fn conversation_id(&self) -> leadchat_core::ConversationId {
        self.session.read().await.conversation_id.clone()
    }

    /// Snapshot of the transcript.
    pub async fn transcript(&self) -> Vec<Message> {
        self.session.read().await.messages().to_vec()
    }

    /// Current dialogue state.
    pub async fn state(&self) -> DialogueState {
        self.session.read().await.state
    }

    /// Handle one user input.
    ///
    /// Scripted quick-reply labels play their canned sequence without
    /// touching the completion service; everything else goes through a
    /// streamed completion turn. Rejects re-entry while a turn is in
    /// flight.
    pub async fn send_message(&self, input: &str) -> Result<(), EngineError> {
        let _guard = self.acquire_turn()?;

        self.append(Message::user(input)).await?;

        if let Some(flow) = script::lookup(input) {
            debug!(input, "playing scripted branch");
            return self.play_scripted(flow).await;
        }

        self.completion_turn().await
    }

    /// Record the contact form submission.
    ///
    /// Contact info is captured exactly once per session. Submitted before
    /// the budget discussion, the flow continues into the questionnaire;
    /// submitted after recap confirmation, it goes straight to scheduling.
    pub async fn submit_contact(&self, info: ContactInfo) -> Result<(), EngineError> {
        let _guard = self.acquire_turn()?;

        let (past_budget, summary) = {
            let mut session = self.session.write().await;
            session.set_contact_info(info.clone())?;
            (
                session.state.past_budget(),
                format!(
                    "My name is {}, email is {}, and phone is {}",
                    info.name, info.email, info.phone
                ),
            )
        };
        self.append(Message::user(summary)).await?;

        if past_budget {
            // Late capture (after recap): straight to the slot picker.
            self.transition_if_legal(DialogueState::SlotSelection).await;
            self.enter_slot_selection_with_message().await
        } else {
            // Early capture: continue with the budget question.
            self.transition_if_legal(DialogueState::CollectBudget).await;
            self.type_out().await;
            let message = Message::assistant(
                "Great. Now let's get into the details.\n\nWhat's your overall budget for the wedding, not just the venue?",
            )
            .with_affordance(Affordance::quick_replies(
                leadchat_core::options::BUDGET_OPTIONS,
            ));
            self.append(message).await?;
            Ok(())
        }
    }

    /// Book the chosen slot. Requires captured contact info; at most one
    /// booking can succeed per conversation, duplicate selections are
    /// no-ops.
    pub async fn select_slot(&self, slot: &AvailableSlot) -> Result<(), EngineError> {
        let _guard = self.acquire_turn()?;

        let contact = {
            let session = self.session.read().await;
            if session.booked() {
                debug!("ignoring duplicate slot selection");
                return Ok(());
            }
            session.contact_info().cloned().ok_or(EngineError::NoContact)?
        };

        self.append(Message::user(format!("I'll take {}", slot.display)))
            .await?;

        let result = self.booking.book_appointment(&contact, slot).await;

        let content = match &result {
            crate::booking::BookingResult::Confirmed { message } => {
                let mut session = self.session.write().await;
                session.try_mark_booked();
                format!("{}\n\n{}", message, SIGNOFF)
            }
            crate::booking::BookingResult::Fallback { booking_link, .. } => format!(
                "I couldn't complete the booking automatically. No worries, book here: {}\n\n{}",
                booking_link, SIGNOFF
            ),
        };

        self.append(Message::assistant(content)).await?;
        self.transition_if_legal(if result.is_confirmed() {
            DialogueState::Booked
        } else {
            DialogueState::Declined
        })
        .await;
        Ok(())
    }

    /// The user wants the full calendar instead of the curated slots.
    pub async fn see_all_slots(&self) -> Result<(), EngineError> {
        let _guard = self.acquire_turn()?;

        self.append(Message::user("Show me all available times")).await?;
        self.append(Message::assistant(format!(
            "Here's the full calendar with all available times: {}\n\n{}",
            self.booking.booking_link(),
            SIGNOFF
        )))
        .await?;
        self.transition_if_legal(DialogueState::Declined).await;
        Ok(())
    }

    /// The user wants to book later.
    pub async fn book_later(&self) -> Result<(), EngineError> {
        let _guard = self.acquire_turn()?;

        self.append(Message::user("I'll book later")).await?;
        self.append(Message::assistant(format!(
            "No problem! We'll be in touch soon.\n\n{}",
            SIGNOFF
        )))
        .await?;
        self.transition_if_legal(DialogueState::Declined).await;
        Ok(())
    }

    /// Discard the session and start over with a rotated conversation id.
    ///
    /// Deliberately not gated on the submission guard: a reset while a
    /// completion streams is legal, and the in-flight result is discarded
    /// when its conversation id no longer matches.
    pub async fn reset(&self) -> Result<(), EngineError> {
        let fresh = self.store.reset().await?;
        let id = fresh.conversation_id.clone();
        {
            let mut session = self.session.write().await;
            *session = fresh;
        }
        self.emit(ChatEvent::SessionReset(id.clone()));
        info!(conversation_id = %id, "session reset");

        self.stage_intro().await?;
        Ok(())
    }

    // ---- internals ----------------------------------------------------

    /// Claim the single in-flight turn slot.
    fn acquire_turn(&self) -> Result<TurnGuard<'_>, EngineError> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            debug!("ignoring duplicate submission");
            return Err(EngineError::Busy);
        }
        Ok(TurnGuard { flag: &self.in_flight })
    }

    fn emit(&self, event: ChatEvent) {
        let _ = self.events.try_send(event);
    }

    /// Append a message, persist, and notify the render layer.
    async fn append(&self, message: Message) -> Result<MessageId, EngineError> {
        let id = {
            let mut session = self.session.write().await;
            session.push(message.clone())
        };
        self.emit(ChatEvent::MessageAppended(message));
        self.persist().await?;
        Ok(id)
    }

    async fn persist(&self) -> Result<(), EngineError> {
        let snapshot = self.session.read().await.clone();
        self.store.save(&snapshot).await?;
        Ok(())
    }

    /// Stage the two greeting messages into an empty transcript.
    async fn stage_intro(&self) -> Result<(), EngineError> {
        for scripted in script::INTRO_MESSAGES {
            self.type_out().await;
            self.append(scripted_to_message(scripted)).await?;
        }
        Ok(())
    }

    /// Reading phase: delay, then the read receipt on the user's message.
    async fn read_phase(&self) -> Result<(), EngineError> {
        self.emit(ChatEvent::Reading);
        tokio::time::sleep(self.timing.reading_delay()).await;
        tokio::time::sleep(self.timing.read_receipt_delay()).await;
        self.session.write().await.mark_last_user_read();
        self.emit(ChatEvent::ReadReceipt);
        self.persist().await
    }

    /// Typing indicator around a typing-length delay.
    async fn type_out(&self) {
        self.emit(ChatEvent::Typing(true));
        tokio::time::sleep(self.timing.typing_delay(80)).await;
        self.emit(ChatEvent::Typing(false));
    }

    /// Play a scripted sequence with human-like pacing. The completion
    /// service is never invoked on this path.
    async fn play_scripted(&self, flow: &[ScriptedMessage]) -> Result<(), EngineError> {
        self.read_phase().await?;

        for scripted in flow {
            self.emit(ChatEvent::Typing(true));
            tokio::time::sleep(self.timing.typing_delay(scripted.content.len())).await;
            self.emit(ChatEvent::Typing(false));

            self.append(scripted_to_message(scripted)).await?;
            tokio::time::sleep(self.timing.inter_message_pause()).await;
        }
        Ok(())
    }

    /// One streamed completion turn.
    async fn completion_turn(&self) -> Result<(), EngineError> {
        self.read_phase().await?;

        self.emit(ChatEvent::Typing(true));
        tokio::time::sleep(self.timing.pre_response_delay()).await;

        // Snapshot the log and the conversation identity before streaming;
        // a reset while the request is out rotates the id and everything
        // that arrives for the old one is discarded.
        let (conversation_id, api_messages, current_state, contact_captured) = {
            let session = self.session.read().await;
            (
                session.conversation_id.clone(),
                build_api_log(&session),
                session.state,
                session.contact_captured(),
            )
        };

        let assistant_id = self.append(Message::assistant("")).await?;
        self.emit(ChatEvent::Typing(false));

        // Apply streamed deltas to the in-progress message as they arrive.
        let (tx, mut rx) = mpsc::channel::<StreamEvent>(64);
        let session = Arc::clone(&self.session);
        let events = self.events.clone();
        let stream_id = assistant_id.clone();
        let stream_conversation = conversation_id.clone();
        let applier = tokio::spawn(async move {
            let mut accumulated = String::new();
            while let Some(event) = rx.recv().await {
                match event {
                    StreamEvent::Delta(delta) => {
                        accumulated.push_str(&delta);
                        let mut session = session.write().await;
                        if session.conversation_id != stream_conversation {
                            // Reset happened mid-stream; stop applying.
                            break;
                        }
                        let _ = session.set_streaming_content(&stream_id, accumulated.clone());
                        drop(session);
                        let _ = events.try_send(ChatEvent::StreamUpdate {
                            id: stream_id.clone(),
                            content: accumulated.clone(),
                        });
                    }
                    StreamEvent::Reset => {
                        accumulated.clear();
                        let mut session = session.write().await;
                        if session.conversation_id == stream_conversation {
                            let _ = session.set_streaming_content(&stream_id, "");
                        }
                    }
                    StreamEvent::Done => {}
                }
            }
        });

        let outcome = self.completion.complete(&api_messages, tx).await;
        let _ = applier.await;

        let final_text = match outcome {
            Ok(text) => text,
            Err(err) => {
                // Remove the dangling assistant message; configuration
                // errors surface as system errors, everything else as the
                // generic retryable message.
                let mut session = self.session.write().await;
                if session.conversation_id == conversation_id {
                    let _ = session.set_streaming_content(&assistant_id, "");
                    let _ = session.remove_empty_message(&assistant_id);
                }
                drop(session);
                self.persist().await?;
                let engine_err: EngineError = err.into();
                match &engine_err {
                    EngineError::Configuration(msg) => {
                        self.emit(ChatEvent::Error(format!("System error: {}", msg)));
                    }
                    _ => self.emit(ChatEvent::Error(RETRYABLE_ERROR.to_string())),
                }
                return Err(engine_err);
            }
        };

        // Classify the finished reply and advance the state machine.
        let classification = classifier::classify(current_state, contact_captured, &final_text);
        {
            let mut session = self.session.write().await;
            if session.conversation_id != conversation_id {
                debug!("discarding completion for reset conversation");
                return Ok(());
            }
            session.set_streaming_content(&assistant_id, classification.clean_content.clone())?;
            if classification.state != current_state {
                session.transition(classification.state)?;
            }
            if let Some(affordance) = &classification.affordance {
                session.attach_affordance(&assistant_id, affordance.clone())?;
            }
        }
        if let Some(affordance) = classification.affordance.clone() {
            self.emit(ChatEvent::AffordanceAttached {
                id: assistant_id.clone(),
                affordance,
            });
        }
        self.persist().await?;
        let entered_slot_selection = classification.state.needs_live_slots();

        if entered_slot_selection {
            self.enter_slot_selection(&assistant_id).await?;
        }
        Ok(())
    }

    /// Entering slot selection: dispatch lead sync (once per conversation)
    /// and attach live slots to the given message.
    async fn enter_slot_selection(&self, message_id: &MessageId) -> Result<(), EngineError> {
        self.dispatch_lead_sync().await;

        match self
            .booking
            .fetch_available_slots(self.config.slot_window_days)
            .await
        {
            Ok(availability) if !availability.slots.is_empty() => {
                let affordance = Affordance::SlotPicker {
                    slots: availability.slots,
                };
                {
                    let mut session = self.session.write().await;
                    session.attach_affordance(message_id, affordance.clone())?;
                }
                self.emit(ChatEvent::AffordanceAttached {
                    id: message_id.clone(),
                    affordance,
                });
                self.persist().await
            }
            Ok(_) => {
                debug!("no availability to offer, leaving message without picker");
                Ok(())
            }
            Err(err) => {
                // Slot-fetch failures never block the conversation; the
                // user can still defer to the external calendar.
                warn!(error = %err, "slot fetch failed");
                Ok(())
            }
        }
    }

    /// Slot-selection entry via contact submission: appends its own
    /// message before attaching the picker.
    async fn enter_slot_selection_with_message(&self) -> Result<(), EngineError> {
        self.dispatch_lead_sync().await;

        let availability = match self
            .booking
            .fetch_available_slots(self.config.slot_window_days)
            .await
        {
            Ok(availability) => availability.slots,
            Err(err) => {
                warn!(error = %err, "slot fetch failed");
                Vec::new()
            }
        };

        self.type_out().await;
        let mut message = Message::assistant(if availability.is_empty() {
            "Great. Let's get your Venue Match Call on the calendar."
        } else {
            "Great. Let me pull up some available times for your Venue Match Call."
        });
        if !availability.is_empty() {
            message = message.with_affordance(Affordance::SlotPicker {
                slots: availability,
            });
        }
        self.append(message).await?;
        Ok(())
    }

    /// Dispatch lead sync if this conversation has not synced yet.
    async fn dispatch_lead_sync(&self) {
        let (should_sync, log, id) = {
            let mut session = self.session.write().await;
            let should = session.try_mark_synced();
            (should, build_api_log_without_prompt(&session), session.conversation_id.clone())
        };
        if should_sync {
            info!(conversation_id = %id, "dispatching lead sync");
            self.leads.dispatch(log, id);
            if let Err(err) = self.persist().await {
                warn!(error = %err, "failed to persist sync flag");
            }
        }
    }

    /// Transition if the state machine allows it; log and stay otherwise.
    async fn transition_if_legal(&self, next: DialogueState) {
        let mut session = self.session.write().await;
        if let Err(err) = session.transition(next) {
            warn!(error = %err, "skipping illegal transition");
        }
    }
}

/// Clears the in-flight flag when a turn ends, however it ends.
struct TurnGuard<'a> {
    flag: &'a AtomicBool,
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

fn scripted_to_message(scripted: &ScriptedMessage) -> Message {
    let mut message = Message::assistant(scripted.content);
    if !scripted.quick_replies.is_empty() {
        message = message.with_affordance(Affordance::quick_replies(scripted.quick_replies));
    }
    message
}

fn role_to_api(role: ChatRole) -> ApiRole {
    match role {
        ChatRole::User => ApiRole::User,
        ChatRole::Assistant => ApiRole::Assistant,
        ChatRole::System => ApiRole::System,
    }
}

/// Full log for the completion service: system prompt plus transcript.
fn build_api_log(session: &Session) -> Vec<ApiMessage> {
    let mut log = Vec::with_capacity(session.len() + 1);
    log.push(ApiMessage::new(ApiRole::System, prompt::system_prompt()));
    log.extend(build_api_log_without_prompt(session));
    log
}

/// Transcript only, for extraction.
fn build_api_log_without_prompt(session: &Session) -> Vec<ApiMessage> {
    session
        .messages()
        .iter()
        .map(|m| ApiMessage::new(role_to_api(m.role), m.content.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::{DateTime, Duration as ChronoDuration, Utc};
    use tokio::sync::{Mutex, Notify};

    use leadchat_completion::CompletionError;
    use leadchat_core::ConversationId;

    use crate::booking::{BookingError, CrmApi};
    use crate::store::MemoryStore;
    use crate::sync::{LeadProfile, LeadSink, SyncError};

    /// Completion fake replaying scripted chunk sequences.
    struct FakeCompletion {
        replies: Mutex<VecDeque<Result<Vec<String>, String>>>,
        calls: AtomicUsize,
        gate: Option<Arc<Notify>>,
    }

    impl FakeCompletion {
        fn new(replies: Vec<Result<Vec<&str>, &str>>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(
                    replies
                        .into_iter()
                        .map(|r| match r {
                            Ok(chunks) => Ok(chunks.into_iter().map(String::from).collect()),
                            Err(msg) => Err(msg.to_string()),
                        })
                        .collect(),
                ),
                calls: AtomicUsize::new(0),
                gate: None,
            })
        }

        fn gated(reply: &str, gate: Arc<Notify>) -> Arc<Self> {
            Arc::new(Self {
                replies: Mutex::new(VecDeque::from([Ok(vec![reply.to_string()])])),
                calls: AtomicUsize::new(0),
                gate: Some(gate),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CompletionBackend for FakeCompletion {
        async fn complete(
            &self,
            _messages: &[ApiMessage],
            tx: mpsc::Sender<StreamEvent>,
        ) -> Result<String, CompletionError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            match self.replies.lock().await.pop_front() {
                Some(Ok(chunks)) => {
                    let mut full = String::new();
                    for chunk in chunks {
                        full.push_str(&chunk);
                        let _ = tx.send(StreamEvent::Delta(chunk)).await;
                    }
                    let _ = tx.send(StreamEvent::Done).await;
                    Ok(full)
                }
                Some(Err(msg)) => Err(CompletionError::Stream(msg)),
                None => Err(CompletionError::Stream("fake exhausted".to_string())),
            }
        }
    }

    /// CRM fake with a fixed slot list and call counters.
    struct FakeCrm {
        slots: Vec<DateTime<Utc>>,
        slot_fetches: AtomicUsize,
        appointments: AtomicUsize,
    }

    impl FakeCrm {
        fn with_slots() -> Arc<Self> {
            let base = (Utc::now() + ChronoDuration::days(2))
                .date_naive()
                .and_hms_opt(10, 0, 0)
                .unwrap()
                .and_utc();
            Arc::new(Self {
                slots: vec![base, base + ChronoDuration::hours(6)],
                slot_fetches: AtomicUsize::new(0),
                appointments: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl CrmApi for FakeCrm {
        async fn free_slots(
            &self,
            start: DateTime<Utc>,
            end: DateTime<Utc>,
        ) -> Result<Vec<DateTime<Utc>>, BookingError> {
            self.slot_fetches.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .slots
                .iter()
                .copied()
                .filter(|s| *s >= start && *s < end)
                .collect())
        }

        async fn find_contact_by_email(&self, _email: &str) -> Result<Option<String>, BookingError> {
            Ok(None)
        }

        async fn find_contact_by_phone(&self, _phone: &str) -> Result<Option<String>, BookingError> {
            Ok(None)
        }

        async fn create_contact(&self, _contact: &ContactInfo) -> Result<String, BookingError> {
            Ok("contact-1".to_string())
        }

        async fn create_appointment(
            &self,
            _contact_id: &str,
            _start: DateTime<Utc>,
            _title: &str,
        ) -> Result<String, BookingError> {
            self.appointments.fetch_add(1, Ordering::SeqCst);
            Ok("appt-1".to_string())
        }
    }

    /// Lead sink fake counting extractions and forwards.
    struct FakeSink {
        extractions: AtomicUsize,
        forwards: AtomicUsize,
    }

    impl FakeSink {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                extractions: AtomicUsize::new(0),
                forwards: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl LeadSink for FakeSink {
        async fn extract(
            &self,
            _messages: &[ApiMessage],
            _conversation_id: &ConversationId,
        ) -> Result<LeadProfile, SyncError> {
            self.extractions.fetch_add(1, Ordering::SeqCst);
            Ok(LeadProfile::default())
        }

        async fn forward(
            &self,
            _profile: &LeadProfile,
            _conversation_id: &ConversationId,
        ) -> Result<(), SyncError> {
            self.forwards.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn init_tracing() {
        let _ = tracing_subscriber::fmt()
            .with_env_filter("leadchat_engine=debug")
            .with_test_writer()
            .try_init();
    }

    fn contact() -> ContactInfo {
        ContactInfo::new("Jane Doe", "jane@x.com", "5551234567")
    }

    /// A session walked forward to `target`, with a seed exchange so the
    /// engine does not restage the greeting on open.
    fn session_at(target: DialogueState, with_contact: bool) -> Session {
        let mut session = Session::new();
        session.push(Message::user("hi"));
        session.push(Message::assistant("hello"));
        if with_contact {
            session.set_contact_info(contact()).unwrap();
        }
        while session.state != target {
            let next = session.state.successor().unwrap();
            session.transition(next).unwrap();
        }
        session
    }

    async fn engine_with(
        completion: Arc<FakeCompletion>,
        crm: Arc<FakeCrm>,
        sink: Arc<FakeSink>,
        seed: Option<Session>,
    ) -> (ChatEngine, mpsc::Receiver<ChatEvent>) {
        let store = Arc::new(MemoryStore::new());
        if let Some(session) = seed {
            store.save(&session).await.unwrap();
        }
        ChatEngine::open(
            EngineConfig::default(),
            store,
            completion,
            BookingCoordinator::new(crm, "https://example.com/book"),
            LeadSyncDispatcher::new(sink),
            TimingSimulator::instant(),
        )
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_fresh_engine_stages_intro() {
        init_tracing();
        let completion = FakeCompletion::new(vec![]);
        let (engine, _rx) =
            engine_with(completion, FakeCrm::with_slots(), FakeSink::new(), None).await;

        let transcript = engine.transcript().await;
        assert_eq!(transcript.len(), 2);
        assert!(matches!(
            transcript[1].affordance,
            Some(Affordance::QuickReplies { .. })
        ));
        assert_eq!(engine.state().await, DialogueState::Greeting);
    }

    #[tokio::test]
    async fn test_scripted_branch_never_calls_completion() {
        let completion = FakeCompletion::new(vec![]);
        let (engine, _rx) = engine_with(
            completion.clone(),
            FakeCrm::with_slots(),
            FakeSink::new(),
            None,
        )
        .await;

        engine.send_message("I'm ready").await.unwrap();

        assert_eq!(completion.calls(), 0);
        let transcript = engine.transcript().await;
        // intro (2) + user turn + two scripted replies
        assert_eq!(transcript.len(), 5);
        let last = transcript.last().unwrap();
        assert!(last.content.contains("When are you planning the wedding?"));
        match &last.affordance {
            Some(Affordance::QuickReplies { options }) => {
                assert_eq!(options, &vec!["Not sure yet".to_string()]);
            }
            other => panic!("unexpected affordance: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_completion_turn_streams_classifies_and_advances() {
        let completion = FakeCompletion::new(vec![Ok(vec![
            "Wha",
            "t's your ",
            "date? [[STAGE: collect_date]]",
        ])]);
        let (engine, _rx) = engine_with(
            completion.clone(),
            FakeCrm::with_slots(),
            FakeSink::new(),
            None,
        )
        .await;

        engine.send_message("hi there").await.unwrap();

        assert_eq!(completion.calls(), 1);
        let transcript = engine.transcript().await;
        let last = transcript.last().unwrap();
        assert_eq!(last.content, "What's your date?");
        assert!(!last.content.contains("[[STAGE"));
        assert_eq!(engine.state().await, DialogueState::CollectDate);
        match &last.affordance {
            Some(Affordance::QuickReplies { options }) => {
                assert_eq!(options, &vec!["Not sure yet".to_string()]);
            }
            other => panic!("unexpected affordance: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_transcript_append_only_across_turns() {
        let completion = FakeCompletion::new(vec![Ok(vec!["Noted! [[STAGE: collect_date]]"])]);
        let (engine, _rx) = engine_with(
            completion,
            FakeCrm::with_slots(),
            FakeSink::new(),
            None,
        )
        .await;

        let before: Vec<_> = engine
            .transcript()
            .await
            .iter()
            .map(|m| (m.id.clone(), m.content.clone()))
            .collect();

        engine.send_message("june next year").await.unwrap();

        let after = engine.transcript().await;
        for (id, content) in &before {
            let unchanged = after.iter().find(|m| &m.id == id).unwrap();
            assert_eq!(&unchanged.content, content);
        }
    }

    #[tokio::test]
    async fn test_failed_completion_removes_dangling_message() {
        let completion = FakeCompletion::new(vec![Err("connection reset")]);
        let (engine, _rx) = engine_with(
            completion,
            FakeCrm::with_slots(),
            FakeSink::new(),
            None,
        )
        .await;

        let result = engine.send_message("hello?").await;
        assert!(matches!(result, Err(EngineError::Completion(_))));

        let transcript = engine.transcript().await;
        assert!(transcript.iter().all(|m| !m.content.is_empty()));
        // intro (2) + the user message; no assistant stub left behind
        assert_eq!(transcript.len(), 3);
    }

    #[tokio::test]
    async fn test_config_error_surfaces_as_configuration() {
        struct BadAuth;
        #[async_trait]
        impl CompletionBackend for BadAuth {
            async fn complete(
                &self,
                _messages: &[ApiMessage],
                _tx: mpsc::Sender<StreamEvent>,
            ) -> Result<String, CompletionError> {
                Err(CompletionError::Config("bad key".to_string()))
            }
        }

        let store = Arc::new(MemoryStore::new());
        let (engine, _rx) = ChatEngine::open(
            EngineConfig::default(),
            store,
            Arc::new(BadAuth),
            BookingCoordinator::new(FakeCrm::with_slots(), "https://example.com/book"),
            LeadSyncDispatcher::new(FakeSink::new()),
            TimingSimulator::instant(),
        )
        .await
        .unwrap();

        let result = engine.send_message("hello").await;
        assert!(matches!(result, Err(EngineError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_duplicate_submission_rejected_while_in_flight() {
        let gate = Arc::new(Notify::new());
        let completion = FakeCompletion::gated("Hi! [[STAGE: collect_date]]", gate.clone());
        let (engine, _rx) = engine_with(
            completion,
            FakeCrm::with_slots(),
            FakeSink::new(),
            None,
        )
        .await;
        let engine = Arc::new(engine);

        let first = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.send_message("first").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let second = engine.send_message("second").await;
        assert!(matches!(second, Err(EngineError::Busy)));

        gate.notify_one();
        first.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_reset_during_stream_discards_stale_result() {
        let gate = Arc::new(Notify::new());
        let completion = FakeCompletion::gated("Stale reply [[STAGE: collect_date]]", gate.clone());
        let (engine, _rx) = engine_with(
            completion,
            FakeCrm::with_slots(),
            FakeSink::new(),
            None,
        )
        .await;
        let engine = Arc::new(engine);
        let old_id = engine.conversation_id().await;

        let turn = {
            let engine = Arc::clone(&engine);
            tokio::spawn(async move { engine.send_message("hello").await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        engine.reset().await.unwrap();
        let new_id = engine.conversation_id().await;
        assert_ne!(old_id, new_id);

        gate.notify_one();
        turn.await.unwrap().unwrap();

        let transcript = engine.transcript().await;
        assert!(transcript.iter().all(|m| !m.content.contains("Stale reply")));
        assert_eq!(transcript.len(), 2); // fresh intro only
        assert_eq!(engine.state().await, DialogueState::Greeting);
    }

    #[tokio::test]
    async fn test_contact_before_budget_continues_questionnaire() {
        let completion = FakeCompletion::new(vec![]);
        let crm = FakeCrm::with_slots();
        let (engine, _rx) = engine_with(
            completion,
            crm.clone(),
            FakeSink::new(),
            Some(session_at(DialogueState::LeadCapture, false)),
        )
        .await;

        engine.submit_contact(contact()).await.unwrap();

        assert_eq!(engine.state().await, DialogueState::CollectBudget);
        let transcript = engine.transcript().await;
        let last = transcript.last().unwrap();
        assert!(last.content.contains("overall budget"));
        match &last.affordance {
            Some(Affordance::QuickReplies { options }) => assert_eq!(options.len(), 8),
            other => panic!("expected budget quick replies, got {:?}", other),
        }
        // No slot picker and no availability fetch this early.
        assert_eq!(crm.slot_fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_late_contact_goes_straight_to_slot_picker() {
        let completion = FakeCompletion::new(vec![]);
        let crm = FakeCrm::with_slots();
        let sink = FakeSink::new();
        let (engine, _rx) = engine_with(
            completion,
            crm.clone(),
            sink.clone(),
            Some(session_at(DialogueState::Recap, false)),
        )
        .await;

        engine.submit_contact(contact()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(engine.state().await, DialogueState::SlotSelection);
        let transcript = engine.transcript().await;
        let last = transcript.last().unwrap();
        assert!(matches!(last.affordance, Some(Affordance::SlotPicker { .. })));
        assert_eq!(sink.extractions.load(Ordering::SeqCst), 1);
        assert_eq!(sink.forwards.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_contact_captured_exactly_once() {
        let completion = FakeCompletion::new(vec![]);
        let (engine, _rx) = engine_with(
            completion,
            FakeCrm::with_slots(),
            FakeSink::new(),
            Some(session_at(DialogueState::LeadCapture, false)),
        )
        .await;

        engine.submit_contact(contact()).await.unwrap();
        let again = engine.submit_contact(contact()).await;
        assert!(again.is_err());
    }

    #[tokio::test]
    async fn test_lead_sync_fires_once_per_conversation() {
        let completion = FakeCompletion::new(vec![
            Ok(vec!["Pulling up some times now. [[STAGE: slot_selection]]"]),
            Ok(vec!["Still here with your times. [[STAGE: slot_selection]]"]),
        ]);
        let sink = FakeSink::new();
        let (engine, _rx) = engine_with(
            completion,
            FakeCrm::with_slots(),
            sink.clone(),
            Some(session_at(DialogueState::Recap, true)),
        )
        .await;

        engine.send_message("Yes, that sounds right").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(sink.extractions.load(Ordering::SeqCst), 1);

        // A second detection of the same condition must not re-dispatch.
        engine.send_message("Great, thanks!").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(sink.extractions.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_slot_selection_attaches_live_slots() {
        let completion = FakeCompletion::new(vec![Ok(vec![
            "Perfect. Let me pull up some times for your Venue Match Call. [[STAGE: slot_selection]]",
        ])]);
        let crm = FakeCrm::with_slots();
        let (engine, _rx) = engine_with(
            completion,
            crm.clone(),
            FakeSink::new(),
            Some(session_at(DialogueState::Recap, true)),
        )
        .await;

        engine.send_message("Looks right to me").await.unwrap();

        let transcript = engine.transcript().await;
        let last = transcript.last().unwrap();
        match &last.affordance {
            Some(Affordance::SlotPicker { slots }) => {
                // Two slots on one day: earliest and latest.
                assert_eq!(slots.len(), 2);
            }
            other => panic!("expected slot picker, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_booking_succeeds_once_per_conversation() {
        let completion = FakeCompletion::new(vec![]);
        let crm = FakeCrm::with_slots();
        let (engine, _rx) = engine_with(
            completion,
            crm.clone(),
            FakeSink::new(),
            Some(session_at(DialogueState::SlotSelection, true)),
        )
        .await;

        let slot = AvailableSlot::from_instant(crm.slots[0]);
        engine.select_slot(&slot).await.unwrap();
        assert_eq!(engine.state().await, DialogueState::Booked);
        assert_eq!(crm.appointments.load(Ordering::SeqCst), 1);

        // Duplicate selection event: no second booking attempt.
        engine.select_slot(&slot).await.unwrap();
        assert_eq!(crm.appointments.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_select_slot_requires_contact() {
        let completion = FakeCompletion::new(vec![]);
        let crm = FakeCrm::with_slots();
        let (engine, _rx) = engine_with(
            completion,
            crm.clone(),
            FakeSink::new(),
            Some(session_at(DialogueState::SlotSelection, false)),
        )
        .await;

        let slot = AvailableSlot::from_instant(crm.slots[0]);
        let result = engine.select_slot(&slot).await;
        assert!(matches!(result, Err(EngineError::NoContact)));
        assert_eq!(crm.appointments.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_deferral_paths_end_with_link_and_decline() {
        let completion = FakeCompletion::new(vec![]);
        let (engine, _rx) = engine_with(
            completion,
            FakeCrm::with_slots(),
            FakeSink::new(),
            Some(session_at(DialogueState::SlotSelection, true)),
        )
        .await;

        engine.see_all_slots().await.unwrap();
        assert_eq!(engine.state().await, DialogueState::Declined);
        let transcript = engine.transcript().await;
        let last = transcript.last().unwrap();
        assert!(last.content.contains("https://example.com/book"));
    }

    #[tokio::test]
    async fn test_session_survives_reload_through_store() {
        let store = Arc::new(MemoryStore::new());
        let completion = FakeCompletion::new(vec![]);
        let (engine, _rx) = ChatEngine::open(
            EngineConfig::default(),
            store.clone(),
            completion.clone(),
            BookingCoordinator::new(FakeCrm::with_slots(), "https://example.com/book"),
            LeadSyncDispatcher::new(FakeSink::new()),
            TimingSimulator::instant(),
        )
        .await
        .unwrap();

        engine.send_message("I'm ready").await.unwrap();
        let id = engine.conversation_id().await;
        let transcript = engine.transcript().await;
        drop(engine);

        // Reopen from the same store: exact transcript, same conversation.
        let (reopened, _rx) = ChatEngine::open(
            EngineConfig::default(),
            store,
            completion,
            BookingCoordinator::new(FakeCrm::with_slots(), "https://example.com/book"),
            LeadSyncDispatcher::new(FakeSink::new()),
            TimingSimulator::instant(),
        )
        .await
        .unwrap();
        assert_eq!(reopened.conversation_id().await, id);
        assert_eq!(reopened.transcript().await, transcript);
    }
}
