//! The message-handling pipeline.
//!
//! One inbound message flows: profile upsert → sentiment → relationship
//! update → affect classification → history append → decision policy →
//! style resolution → prompt assembly → generation → filtering → history
//! append of the reply. The
//! whole span runs under the conversation's key guard, so messages for
//! one conversation are processed strictly in arrival order even across
//! the LLM suspension points.

use std::sync::Arc;

use chrono::{Duration, Utc};
use tokio_util::sync::CancellationToken;

use samovar_types::decision::Decision;
use samovar_types::error::EngineError;
use samovar_types::event::InboundMessage;
use samovar_types::history::Role;

use crate::decision::{self, Evaluation, ResponseDecisionPolicy};
use crate::llm::{LanguageModel, SentimentAnalyzer};
use crate::prompt::{filter_response, PromptAssembler, PromptInputs};
use crate::relationship;
use crate::state::StateManager;
use crate::style::StyleResolver;

/// What the user sees when generation fails or produces nothing usable.
const APOLOGY: &str = "Sorry, I lost my train of thought for a second. Say that again?";

const MUTE_ACK: &str = "Okay, I'll keep quiet.";
const UNMUTE_ACK: &str = "Okay, I'm back!";

/// The persona bot's core, generic over the generation and sentiment
/// backends.
pub struct ChatEngine<L, S> {
    state: Arc<StateManager>,
    llm: L,
    sentiment: S,
    policy: ResponseDecisionPolicy,
    resolver: StyleResolver,
    assembler: PromptAssembler,
}

impl<L, S> ChatEngine<L, S>
where
    L: LanguageModel,
    S: SentimentAnalyzer,
{
    pub fn new(state: Arc<StateManager>, llm: L, sentiment: S) -> Self {
        Self {
            policy: ResponseDecisionPolicy::new(state.clone()),
            resolver: StyleResolver::new(state.clone()),
            assembler: PromptAssembler::new(),
            state,
            llm,
            sentiment,
        }
    }

    pub fn state(&self) -> &Arc<StateManager> {
        &self.state
    }

    /// Process one inbound message. `Ok(Some(text))` is a reply to send,
    /// `Ok(None)` means the bot stays silent (the message is still kept
    /// as context).
    ///
    /// Generation failures degrade to a generic apology and never
    /// propagate as errors; the failed reply is not added to history.
    pub async fn handle_message(
        &self,
        msg: &InboundMessage,
    ) -> Result<Option<String>, EngineError> {
        if msg.text.trim().is_empty() {
            // Malformed inbound data: silent no-op, nothing mutated.
            return Ok(None);
        }

        let guard = self.state.key_guard(msg.conversation);
        let _held = guard.lock().await;

        let now = Utc::now();
        let settings = self.state.settings();

        self.state.upsert_profile(msg.user_id, &msg.user_name, now);
        let score = self.sentiment.score(&msg.text);
        self.state
            .with_relationship(msg.user_id, |r| relationship::update(r, score));
        self.classify_affect(msg, &settings.persona_name).await;

        let speaker = self.state.address_name(msg.user_id, &msg.user_name);
        self.state.history().append(
            msg.conversation,
            Role::User,
            msg.text.clone(),
            Some(speaker.clone()),
            settings.max_history,
            now,
        );

        if let Some(group) = msg.conversation.as_group() {
            if decision::is_mute_request(&msg.text, &settings.persona_name, &settings.bot_handle) {
                self.state.set_muted(group, msg.user_id, true);
                tracing::info!(%group, user = %msg.user_id, "user muted proactive replies");
                return Ok(Some(self.acknowledge(msg, MUTE_ACK, settings.max_history)));
            }
            if decision::is_unmute_request(&msg.text, &settings.persona_name, &settings.bot_handle)
            {
                self.state.set_muted(group, msg.user_id, false);
                tracing::info!(%group, user = %msg.user_id, "user unmuted proactive replies");
                return Ok(Some(self.acknowledge(msg, UNMUTE_ACK, settings.max_history)));
            }
            if decision::is_correction(&msg.text) {
                self.state.note_correction(group, now);
                tracing::debug!(%group, "correction detected, proactive cooldown started");
            }
        }

        let Evaluation { decision, topic } = self.policy.evaluate(msg, &self.llm).await;
        let Decision::Respond(trigger) = decision else {
            return Ok(None);
        };
        tracing::debug!(conversation = %msg.conversation, %trigger, "responding");

        let style = self.resolver.resolve(
            &msg.conversation,
            msg.user_id,
            &msg.user_name,
            msg.chat_kind(),
        );
        let history = self.state.history().get(&msg.conversation);
        let prompt = self.assembler.render(&PromptInputs {
            history: &history,
            style: &style,
            topic: topic.as_deref(),
            user_name: &speaker,
            kind: msg.chat_kind(),
            persona_name: &settings.persona_name,
        });

        let Some(reply) = self.generate_with_retry(&prompt, &settings.persona_name).await else {
            return Ok(Some(APOLOGY.to_string()));
        };

        self.state.history().append(
            msg.conversation,
            Role::Assistant,
            reply.clone(),
            None,
            settings.max_history,
            Utc::now(),
        );

        let word_count = msg.text.split_whitespace().count();
        if word_count <= settings.learned_response_max_words {
            self.state.learn_response(msg.text.trim(), reply.clone());
        }

        Ok(Some(reply))
    }

    /// Content-classification pass on top of the lexical sentiment: the
    /// classifier names affect labels and the named buckets get bumped.
    /// A failed or unrecognizable verdict leaves the state unchanged.
    async fn classify_affect(&self, msg: &InboundMessage, persona_name: &str) {
        let prompt = relationship::affect_prompt(persona_name, &msg.text);
        match self.llm.classify(&prompt).await {
            Ok(verdict) => {
                let labels = relationship::AffectLabel::parse_all(&verdict);
                if !labels.is_empty() {
                    self.state.with_relationship(msg.user_id, |r| {
                        relationship::apply_affect_labels(r, &labels);
                    });
                }
            }
            Err(err) => {
                tracing::debug!(error = %err, "affect classification failed");
            }
        }
    }

    /// Record a trigger-phrase acknowledgment in history and return it.
    fn acknowledge(&self, msg: &InboundMessage, ack: &str, max_history: usize) -> String {
        self.state.history().append(
            msg.conversation,
            Role::Assistant,
            ack,
            None,
            max_history,
            Utc::now(),
        );
        ack.to_string()
    }

    /// Generate once; on failure or unusable output, retry once with a
    /// shorter-answer amendment. `None` after the retry means the caller
    /// falls back to the apology.
    async fn generate_with_retry(&self, prompt: &str, persona_name: &str) -> Option<String> {
        match self.generate_filtered(prompt, persona_name).await {
            Some(reply) => Some(reply),
            None => {
                let amended = format!(
                    "{prompt}\nSystem: Give a short answer, one or two sentences at most."
                );
                self.generate_filtered(&amended, persona_name).await
            }
        }
    }

    async fn generate_filtered(&self, prompt: &str, persona_name: &str) -> Option<String> {
        match self.llm.generate(prompt).await {
            Ok(raw) => {
                let reply = filter_response(&raw, persona_name);
                if reply.is_empty() {
                    tracing::warn!("generation produced no usable text");
                    None
                } else {
                    Some(reply)
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "generation failed");
                None
            }
        }
    }

    /// Periodic TTL eviction. Runs until the token is cancelled;
    /// relationships of evicted one-to-one peers are reset, not deleted.
    pub async fn run_maintenance(
        &self,
        every: std::time::Duration,
        cancel: CancellationToken,
    ) {
        let mut ticker = tokio::time::interval(every);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::debug!("maintenance loop stopped");
                    return;
                }
                _ = ticker.tick() => {
                    let ttl = Duration::seconds(self.state.settings().history_ttl_secs as i64);
                    let evicted = self.state.evict_expired(Utc::now(), ttl);
                    if evicted > 0 {
                        tracing::info!(evicted, "TTL-evicted idle conversations");
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use samovar_types::config::Settings;
    use samovar_types::conversation::{ConversationKey, GroupId, UserId};
    use samovar_types::error::LlmError;

    use crate::llm::testing::{FixedSentiment, ScriptedModel};

    fn engine(
        responses: Vec<Result<String, LlmError>>,
        sentiment: f32,
    ) -> ChatEngine<ScriptedModel, FixedSentiment> {
        let state = Arc::new(StateManager::new(Settings::default()));
        ChatEngine::new(state, ScriptedModel::new(responses), FixedSentiment(sentiment))
    }

    fn direct_msg(text: &str) -> InboundMessage {
        InboundMessage {
            conversation: ConversationKey::Direct(UserId(1)),
            user_id: UserId(1),
            user_name: "Alice".to_string(),
            text: text.to_string(),
            is_reply_to_bot: false,
            platform_message_id: None,
        }
    }

    fn group_msg(text: &str) -> InboundMessage {
        InboundMessage {
            conversation: ConversationKey::Group(GroupId(-50)),
            user_id: UserId(1),
            user_name: "Alice".to_string(),
            text: text.to_string(),
            is_reply_to_bot: false,
            platform_message_id: None,
        }
    }

    #[tokio::test]
    async fn test_direct_message_produces_reply_and_history() {
        let engine = engine(vec![Ok("Masha: hi Alice!".to_string())], 0.8);
        let msg = direct_msg("hello there");

        let reply = engine.handle_message(&msg).await.unwrap();
        assert_eq!(reply.as_deref(), Some("hi Alice!"));

        let history = engine.state().history().get(&msg.conversation);
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].role, Role::User);
        assert_eq!(history[0].speaker.as_deref(), Some("Alice"));
        assert_eq!(history[1].role, Role::Assistant);
        assert_eq!(history[1].text, "hi Alice!");

        // Sentiment reached the relationship model.
        let rel = engine.state().relationship(UserId(1)).unwrap();
        assert!(rel.liking > 0.0);
    }

    #[tokio::test]
    async fn test_empty_text_is_silent_noop() {
        let engine = engine(vec![Ok("hi".to_string())], 0.0);
        let msg = direct_msg("   ");

        let reply = engine.handle_message(&msg).await.unwrap();
        assert!(reply.is_none());
        assert!(engine.state().history().get(&msg.conversation).is_empty());
        assert!(engine.state().profile(UserId(1)).is_none());
    }

    #[tokio::test]
    async fn test_silent_group_message_still_appends_history() {
        let engine = engine(vec![Err(LlmError::Empty)], 0.0);
        engine.state().update_settings(|s| s.proactive_probability = 0.0);
        let msg = group_msg("nothing to do with the bot");

        let reply = engine.handle_message(&msg).await.unwrap();
        assert!(reply.is_none());
        assert_eq!(engine.state().history().get(&msg.conversation).len(), 1);
    }

    #[tokio::test]
    async fn test_generation_failure_degrades_to_apology() {
        let engine = engine(
            vec![Err(LlmError::RateLimited), Err(LlmError::RateLimited)],
            0.0,
        );
        let msg = direct_msg("hello");

        let reply = engine.handle_message(&msg).await.unwrap();
        assert_eq!(reply.as_deref(), Some(APOLOGY));

        // The apology is not recorded as an assistant turn.
        let history = engine.state().history().get(&msg.conversation);
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].role, Role::User);
    }

    #[tokio::test]
    async fn test_unusable_output_retries_once_with_amended_prompt() {
        let engine = engine(
            vec![
                Ok("neutral".to_string()), // affect verdict
                Ok("```\n```".to_string()),
                Ok("second try".to_string()),
            ],
            0.0,
        );
        let msg = direct_msg("hello");

        let reply = engine.handle_message(&msg).await.unwrap();
        assert_eq!(reply.as_deref(), Some("second try"));

        let prompts = engine.llm.prompts.lock().unwrap().clone();
        assert_eq!(prompts.len(), 3);
        assert!(prompts[2].contains("short answer"));
    }

    #[tokio::test]
    async fn test_affect_verdict_bumps_named_buckets() {
        let engine = engine(
            vec![Ok("infatuation, trolling".to_string()), Ok("hi!".to_string())],
            0.0,
        );

        engine.handle_message(&direct_msg("hello")).await.unwrap();

        let rel = engine.state().relationship(UserId(1)).unwrap();
        assert!(rel.infatuation > 0.0);
        assert!(rel.trolling > 0.0);
        assert_eq!(rel.love, 0.0);

        // The classifier saw the affect prompt with the message text.
        let prompts = engine.llm.prompts.lock().unwrap().clone();
        assert!(prompts[0].contains("emotional state"));
        assert!(prompts[0].contains("hello"));
    }

    #[tokio::test]
    async fn test_repeated_verdicts_cross_style_threshold() {
        // Enough infatuation verdicts push the state past the flirtatious
        // threshold and the directive shows up in the generation prompt.
        let engine = engine(vec![Ok("infatuation".to_string())], 0.0);

        for _ in 0..8 {
            engine.handle_message(&direct_msg("hello")).await.unwrap();
        }

        let rel = engine.state().relationship(UserId(1)).unwrap();
        assert!(rel.infatuation > 0.7);

        let prompts = engine.llm.prompts.lock().unwrap().clone();
        assert!(prompts.last().unwrap().contains("crush"));
    }

    #[tokio::test]
    async fn test_failed_affect_verdict_leaves_state_unchanged() {
        let engine = engine(
            vec![Err(LlmError::RateLimited), Ok("hi!".to_string())],
            0.0,
        );

        let reply = engine.handle_message(&direct_msg("hello")).await.unwrap();
        assert_eq!(reply.as_deref(), Some("hi!"));
        let rel = engine.state().relationship(UserId(1)).unwrap();
        assert_eq!(rel.infatuation, 0.0);
        assert_eq!(rel.trolling, 0.0);
    }

    #[tokio::test]
    async fn test_short_exchanges_are_learned() {
        let engine = engine(vec![Ok("hey!".to_string())], 0.0);

        engine.handle_message(&direct_msg("hi")).await.unwrap();
        assert_eq!(
            engine.state().learned_response("hi").as_deref(),
            Some("hey!")
        );

        let long = "one two three four five six seven eight nine ten eleven";
        engine.handle_message(&direct_msg(long)).await.unwrap();
        assert!(engine.state().learned_response(long).is_none());
    }

    #[tokio::test]
    async fn test_mute_and_unmute_trigger_phrases() {
        let engine = engine(vec![Ok("hi".to_string())], 0.0);
        engine.state().update_settings(|s| {
            s.persona_name = "Маша".to_string();
        });

        let reply = engine
            .handle_message(&group_msg("Маша, замолчи"))
            .await
            .unwrap();
        assert_eq!(reply.as_deref(), Some(MUTE_ACK));
        assert!(engine.state().is_muted(GroupId(-50), UserId(1)));

        let reply = engine
            .handle_message(&group_msg("Маша, начни говорить"))
            .await
            .unwrap();
        assert_eq!(reply.as_deref(), Some(UNMUTE_ACK));
        assert!(!engine.state().is_muted(GroupId(-50), UserId(1)));
    }

    #[tokio::test]
    async fn test_correction_starts_cooldown() {
        let engine = engine(vec![Err(LlmError::Empty)], 0.0);
        engine.state().update_settings(|s| s.proactive_probability = 0.0);

        engine
            .handle_message(&group_msg("нет, всё не так"))
            .await
            .unwrap();
        assert!(engine
            .state()
            .correction_active(GroupId(-50), Utc::now()));
    }

    #[tokio::test]
    async fn test_style_override_reaches_prompt() {
        let engine = engine(vec![Ok("ok".to_string())], 0.0);
        engine
            .state()
            .set_style_override(GroupId(-50), UserId(1), "answer only in rhyme");

        engine
            .handle_message(&group_msg("Masha, sing something"))
            .await
            .unwrap();

        let prompts = engine.llm.prompts.lock().unwrap().clone();
        assert!(prompts
            .iter()
            .any(|p| p.contains("answer only in rhyme")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_maintenance_loop_evicts_and_stops() {
        let engine = Arc::new(engine(vec![Ok("hi".to_string())], 0.0));
        engine.state().update_settings(|s| s.history_ttl_secs = 1);

        let key = ConversationKey::Direct(UserId(9));
        // Already past the 1-second TTL when the loop first ticks.
        engine
            .state()
            .history()
            .append(key, Role::User, "old", None, 30, Utc::now() - Duration::seconds(10));

        let cancel = CancellationToken::new();
        let task = {
            let engine = engine.clone();
            let cancel = cancel.clone();
            tokio::spawn(async move {
                engine
                    .run_maintenance(std::time::Duration::from_secs(5), cancel)
                    .await;
            })
        };

        // Paused time auto-advances; give the loop a few ticks.
        tokio::time::sleep(std::time::Duration::from_secs(20)).await;
        assert!(engine.state().history().get(&key).is_empty());

        cancel.cancel();
        task.await.unwrap();
    }
}
