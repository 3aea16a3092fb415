//! Response-decision policy: should an inbound message provoke a reply?
//!
//! Gates run in a fixed order and are OR-combined. The cheap textual
//! gates (direct chat, mention, reply-to) come first; classification
//! calls against the language model happen only when all of them failed,
//! to bound LLM usage. Classifier verdicts are best-effort: a failed or
//! unparseable answer never blocks the pipeline, it just means "no".

use std::sync::Arc;

use chrono::Utc;

use samovar_types::conversation::ChatKind;
use samovar_types::decision::{Decision, ResponseTrigger};
use samovar_types::event::InboundMessage;

use crate::llm::LanguageModel;
use crate::state::StateManager;

/// Diminutive suffix appended to the persona-name stem for inflected
/// grammatical-case matching ("Маша" → "Машенька").
const DIMINUTIVE_SUFFIX: &str = "енька";

/// Phrases that, together with the bot's name, mute proactive replies
/// for the sender in a group.
const MUTE_PHRASES: &[&str] = &["замолчи", "помолчи", "be quiet", "stop talking"];

/// Phrases that lift a mute again.
const UNMUTE_PHRASES: &[&str] = &["начни говорить", "говори", "speak again", "start talking"];

/// Phrases treated as the user correcting the bot; proactive replies
/// pause for a cooldown after one is seen.
const CORRECTION_PHRASES: &[&str] = &[
    "неправильно",
    "не так",
    "ты ошибаешься",
    "that's wrong",
    "not like that",
    "you're wrong",
];

/// Result of evaluating one inbound message.
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub decision: Decision,
    /// Mood/topic hint from the optional proactive classification pass,
    /// forwarded into the prompt when present.
    pub topic: Option<String>,
}

impl Evaluation {
    fn respond(trigger: ResponseTrigger) -> Self {
        Self {
            decision: Decision::Respond(trigger),
            topic: None,
        }
    }

    fn silent() -> Self {
        Self {
            decision: Decision::Silent,
            topic: None,
        }
    }
}

/// The gate sequence deciding when the bot speaks.
#[derive(Debug, Clone)]
pub struct ResponseDecisionPolicy {
    state: Arc<StateManager>,
}

impl ResponseDecisionPolicy {
    pub fn new(state: Arc<StateManager>) -> Self {
        Self { state }
    }

    /// Evaluate the gates for one message. The caller has already
    /// appended the message to history, so silence still retains context.
    pub async fn evaluate<L: LanguageModel>(
        &self,
        msg: &InboundMessage,
        llm: &L,
    ) -> Evaluation {
        if msg.chat_kind() == ChatKind::Direct {
            return Evaluation::respond(ResponseTrigger::DirectChat);
        }

        let settings = self.state.settings();
        if mentions_bot(&msg.text, &settings.persona_name, &settings.bot_handle) {
            return Evaluation::respond(ResponseTrigger::Mention);
        }

        if msg.is_reply_to_bot {
            return Evaluation::respond(ResponseTrigger::ReplyToBot);
        }

        if let Some(last) = self.state.history().last_assistant_text(&msg.conversation) {
            if self.is_continuation(&last, &msg.text, llm).await {
                return Evaluation::respond(ResponseTrigger::Continuation);
            }
        }

        self.evaluate_proactive(msg, llm, &settings.persona_name, settings.mood_check_factor)
            .await
    }

    /// Yes/no classification against the bot's previous message.
    async fn is_continuation<L: LanguageModel>(&self, last: &str, text: &str, llm: &L) -> bool {
        let prompt = format!(
            "The assistant's last message in a chat was: \"{last}\"\n\
             A user now writes: \"{text}\"\n\
             Is the user's message a continuation of or a reaction to the \
             assistant's message? Answer only \"yes\" or \"no\"."
        );
        match llm.classify(&prompt).await {
            Ok(answer) => is_affirmative(&answer),
            Err(err) => {
                tracing::debug!(error = %err, "continuation check failed, treating as no");
                false
            }
        }
    }

    /// The probabilistic group-participation gate. Skipped entirely when
    /// the message looks addressed to someone else, the sender muted the
    /// bot here, or a correction cooldown is running.
    async fn evaluate_proactive<L: LanguageModel>(
        &self,
        msg: &InboundMessage,
        llm: &L,
        persona_name: &str,
        mood_check_factor: f64,
    ) -> Evaluation {
        let Some(group) = msg.conversation.as_group() else {
            return Evaluation::silent();
        };

        let settings = self.state.settings();
        if addressed_to_other(&msg.text, persona_name, &settings.bot_handle) {
            return Evaluation::silent();
        }
        if self.state.is_muted(group, msg.user_id) {
            return Evaluation::silent();
        }
        if self.state.correction_active(group, Utc::now()) {
            return Evaluation::silent();
        }

        let probability = self.state.proactive_probability(&msg.conversation);
        let draw: f64 = rand::random();
        if draw >= probability {
            return Evaluation::silent();
        }

        // Within the participation window: optionally sample the chat's
        // mood, then ask whether speaking up is warranted at all.
        let mut topic = None;
        let mood_draw: f64 = rand::random();
        if mood_draw < probability * mood_check_factor {
            topic = self.classify_mood(msg, llm).await;
        }

        let verdict_prompt = format!(
            "A user in a group chat writes: \"{}\"\n\
             The message is not addressed to anyone in particular. Would it \
             be natural for another participant to chime in with a reply? \
             Answer only \"respond\" or \"stay silent\".",
            msg.text
        );
        match llm.classify(&verdict_prompt).await {
            Ok(answer) if normalize_verdict(&answer).starts_with("respond") => Evaluation {
                decision: Decision::Respond(ResponseTrigger::Proactive),
                topic,
            },
            Ok(_) => Evaluation::silent(),
            Err(err) => {
                tracing::debug!(error = %err, "proactive check failed, staying silent");
                Evaluation::silent()
            }
        }
    }

    /// Best-effort mood/topic classification over recent history.
    async fn classify_mood<L: LanguageModel>(
        &self,
        msg: &InboundMessage,
        llm: &L,
    ) -> Option<String> {
        let recent: Vec<String> = self
            .state
            .history()
            .get(&msg.conversation)
            .iter()
            .rev()
            .take(5)
            .rev()
            .map(|entry| entry.render_line())
            .collect();
        if recent.is_empty() {
            return None;
        }
        let prompt = format!(
            "Recent messages in a group chat:\n{}\n\
             Describe in a few words the current mood and topic of this chat.",
            recent.join("\n")
        );
        match llm.classify(&prompt).await {
            Ok(answer) => {
                let answer = answer.trim().to_string();
                (!answer.is_empty()).then_some(answer)
            }
            Err(err) => {
                tracing::debug!(error = %err, "mood check failed");
                None
            }
        }
    }
}

/// Case-insensitive substring match against the bot handle, the persona
/// name, its suffix-stripped stem, and a diminutive form. The stem check
/// catches grammatical-case variants in inflected languages ("Машу",
/// "Маше") at the cost of occasional false positives.
pub fn mentions_bot(text: &str, persona_name: &str, bot_handle: &str) -> bool {
    let lower = text.to_lowercase();
    name_variants(persona_name, bot_handle)
        .iter()
        .any(|variant| lower.contains(variant))
}

fn name_variants(persona_name: &str, bot_handle: &str) -> Vec<String> {
    let persona = persona_name.to_lowercase();
    let mut variants = vec![persona.clone()];

    let handle = bot_handle.trim_start_matches('@').to_lowercase();
    if !handle.is_empty() {
        variants.push(handle);
    }

    if let Some(stem) = persona.strip_suffix('а').or_else(|| persona.strip_suffix('a')) {
        // Too-short stems match everywhere; require at least three chars.
        if stem.chars().count() >= 3 {
            variants.push(stem.to_string());
            variants.push(format!("{stem}{DIMINUTIVE_SUFFIX}"));
        }
    }
    variants
}

/// Crude addressed-to-someone-else heuristic: the first word carries a
/// vocative comma (or colon) and is not one of the bot's name variants.
pub fn addressed_to_other(text: &str, persona_name: &str, bot_handle: &str) -> bool {
    let Some(first) = text.split_whitespace().next() else {
        return false;
    };
    if !(first.ends_with(',') || first.ends_with(':')) {
        return false;
    }
    let name = first
        .trim_end_matches([',', ':'])
        .trim_start_matches('@')
        .to_lowercase();
    if name.is_empty() {
        return false;
    }
    !name_variants(persona_name, bot_handle)
        .iter()
        .any(|variant| name.starts_with(variant.as_str()))
}

/// Whether a message asks the bot to stop talking to this user. The
/// bot's name must appear so generic chatter does not trigger a mute.
pub fn is_mute_request(text: &str, persona_name: &str, bot_handle: &str) -> bool {
    let lower = text.to_lowercase();
    mentions_bot(text, persona_name, bot_handle)
        && MUTE_PHRASES.iter().any(|phrase| lower.contains(phrase))
}

/// Whether a message lifts a previous mute.
pub fn is_unmute_request(text: &str, persona_name: &str, bot_handle: &str) -> bool {
    let lower = text.to_lowercase();
    mentions_bot(text, persona_name, bot_handle)
        && UNMUTE_PHRASES.iter().any(|phrase| lower.contains(phrase))
}

/// Whether a message reads as the user correcting the bot.
pub fn is_correction(text: &str) -> bool {
    let lower = text.to_lowercase();
    CORRECTION_PHRASES.iter().any(|phrase| lower.contains(phrase))
}

fn is_affirmative(answer: &str) -> bool {
    let normalized = normalize_verdict(answer);
    normalized.starts_with("yes") || normalized.starts_with("да")
}

/// Lowercase and drop leading quotes/punctuation so `"Yes."` and
/// `'respond'` parse like their bare forms.
fn normalize_verdict(answer: &str) -> String {
    answer
        .trim()
        .trim_start_matches(['"', '\'', '«', '*', '.', ' '])
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use samovar_types::config::Settings;
    use samovar_types::conversation::{ConversationKey, GroupId, UserId};
    use samovar_types::error::LlmError;
    use samovar_types::history::Role;

    use crate::llm::testing::ScriptedModel;

    fn policy() -> (Arc<StateManager>, ResponseDecisionPolicy) {
        let state = Arc::new(StateManager::new(Settings::default()));
        (state.clone(), ResponseDecisionPolicy::new(state))
    }

    fn group_msg(text: &str) -> InboundMessage {
        InboundMessage {
            conversation: ConversationKey::Group(GroupId(-100)),
            user_id: UserId(1),
            user_name: "Alice".to_string(),
            text: text.to_string(),
            is_reply_to_bot: false,
            platform_message_id: None,
        }
    }

    fn failing_model() -> ScriptedModel {
        ScriptedModel::new(vec![Err(LlmError::Empty)])
    }

    #[tokio::test]
    async fn test_direct_chat_always_responds() {
        let (state, policy) = policy();
        state.update_settings(|s| s.proactive_probability = 0.0);

        let msg = InboundMessage {
            conversation: ConversationKey::Direct(UserId(1)),
            user_id: UserId(1),
            user_name: "Alice".to_string(),
            text: "whatever".to_string(),
            is_reply_to_bot: false,
            platform_message_id: None,
        };
        // Classifier unavailable; the gate must not need it.
        let eval = policy.evaluate(&msg, &failing_model()).await;
        assert_eq!(
            eval.decision,
            Decision::Respond(ResponseTrigger::DirectChat)
        );
    }

    #[tokio::test]
    async fn test_mention_by_persona_name_in_group() {
        let (state, policy) = policy();
        state.update_settings(|s| s.proactive_probability = 0.0);

        let eval = policy
            .evaluate(&group_msg("Masha, how are you?"), &failing_model())
            .await;
        assert_eq!(eval.decision, Decision::Respond(ResponseTrigger::Mention));
    }

    #[tokio::test]
    async fn test_mention_by_handle() {
        let (_, policy) = policy();
        let eval = policy
            .evaluate(&group_msg("hey @masha_bot look at this"), &failing_model())
            .await;
        assert_eq!(eval.decision, Decision::Respond(ResponseTrigger::Mention));
    }

    #[tokio::test]
    async fn test_mention_inflected_variants() {
        let (state, policy) = policy();
        state.update_settings(|s| {
            s.persona_name = "Маша".to_string();
            s.proactive_probability = 0.0;
        });

        for text in ["спроси Машу", "скажи Маше привет", "Машенька, ты тут?"] {
            let eval = policy.evaluate(&group_msg(text), &failing_model()).await;
            assert_eq!(
                eval.decision,
                Decision::Respond(ResponseTrigger::Mention),
                "expected mention for {text:?}"
            );
        }
    }

    #[tokio::test]
    async fn test_reply_to_bot() {
        let (state, policy) = policy();
        state.update_settings(|s| s.proactive_probability = 0.0);

        let mut msg = group_msg("I disagree");
        msg.is_reply_to_bot = true;
        let eval = policy.evaluate(&msg, &failing_model()).await;
        assert_eq!(
            eval.decision,
            Decision::Respond(ResponseTrigger::ReplyToBot)
        );
    }

    #[tokio::test]
    async fn test_continuation_yes() {
        let (state, policy) = policy();
        state.update_settings(|s| s.proactive_probability = 0.0);
        let key = ConversationKey::Group(GroupId(-100));
        state
            .history()
            .append(key, Role::Assistant, "what do you all think?", None, 30, chrono::Utc::now());

        let model = ScriptedModel::always("Yes, it clearly is.");
        let eval = policy.evaluate(&group_msg("I think so too"), &model).await;
        assert_eq!(
            eval.decision,
            Decision::Respond(ResponseTrigger::Continuation)
        );
    }

    #[tokio::test]
    async fn test_continuation_classifier_failure_is_no() {
        let (state, policy) = policy();
        state.update_settings(|s| s.proactive_probability = 0.0);
        let key = ConversationKey::Group(GroupId(-100));
        state
            .history()
            .append(key, Role::Assistant, "hello", None, 30, chrono::Utc::now());

        let eval = policy
            .evaluate(&group_msg("unrelated stuff"), &failing_model())
            .await;
        assert_eq!(eval.decision, Decision::Silent);
    }

    #[tokio::test]
    async fn test_proactive_zero_probability_is_silent() {
        let (state, policy) = policy();
        state.update_settings(|s| s.proactive_probability = 0.0);

        // No mention, no reply, no history: only the proactive gate is
        // left, and probability zero can never fire.
        let eval = policy
            .evaluate(&group_msg("nice weather today"), &failing_model())
            .await;
        assert_eq!(eval.decision, Decision::Silent);
    }

    #[tokio::test]
    async fn test_proactive_certain_probability_with_respond_verdict() {
        let (state, policy) = policy();
        state.update_settings(|s| {
            s.proactive_probability = 1.0;
            s.mood_check_factor = 0.0; // keep the call sequence deterministic
        });

        let model = ScriptedModel::always("Respond");
        let eval = policy
            .evaluate(&group_msg("nice weather today"), &model)
            .await;
        assert_eq!(
            eval.decision,
            Decision::Respond(ResponseTrigger::Proactive)
        );
    }

    #[tokio::test]
    async fn test_proactive_stay_silent_verdict() {
        let (state, policy) = policy();
        state.update_settings(|s| {
            s.proactive_probability = 1.0;
            s.mood_check_factor = 0.0;
        });

        let model = ScriptedModel::always("stay silent");
        let eval = policy
            .evaluate(&group_msg("nice weather today"), &model)
            .await;
        assert_eq!(eval.decision, Decision::Silent);
    }

    #[tokio::test]
    async fn test_muted_user_gets_no_proactive_but_still_mention() {
        let (state, policy) = policy();
        state.update_settings(|s| {
            s.proactive_probability = 1.0;
            s.mood_check_factor = 0.0;
        });
        state.set_muted(GroupId(-100), UserId(1), true);

        let model = ScriptedModel::always("Respond");
        let eval = policy
            .evaluate(&group_msg("nice weather today"), &model)
            .await;
        assert_eq!(eval.decision, Decision::Silent);

        // Mentions bypass the mute.
        let eval = policy
            .evaluate(&group_msg("Masha, are you there?"), &model)
            .await;
        assert_eq!(eval.decision, Decision::Respond(ResponseTrigger::Mention));
    }

    #[tokio::test]
    async fn test_addressed_to_other_user_is_silent() {
        let (state, policy) = policy();
        state.update_settings(|s| {
            s.proactive_probability = 1.0;
            s.mood_check_factor = 0.0;
        });

        let model = ScriptedModel::always("Respond");
        let eval = policy
            .evaluate(&group_msg("Pete, what do you think?"), &model)
            .await;
        assert_eq!(eval.decision, Decision::Silent);
    }

    #[tokio::test]
    async fn test_correction_cooldown_suppresses_proactive() {
        let (state, policy) = policy();
        state.update_settings(|s| {
            s.proactive_probability = 1.0;
            s.mood_check_factor = 0.0;
        });
        state.note_correction(GroupId(-100), Utc::now());

        let model = ScriptedModel::always("Respond");
        let eval = policy
            .evaluate(&group_msg("nice weather today"), &model)
            .await;
        assert_eq!(eval.decision, Decision::Silent);
    }

    #[test]
    fn test_addressed_to_other_heuristic() {
        assert!(addressed_to_other("Pete, look at this", "Masha", "masha_bot"));
        assert!(addressed_to_other("@pete: look", "Masha", "masha_bot"));
        // Addressing the bot itself is not "other".
        assert!(!addressed_to_other("Masha, look at this", "Masha", "masha_bot"));
        assert!(!addressed_to_other("Машенька, привет", "Маша", "masha_bot"));
        // No vocative punctuation at all.
        assert!(!addressed_to_other("Pete was right", "Masha", "masha_bot"));
        assert!(!addressed_to_other("", "Masha", "masha_bot"));
    }

    #[test]
    fn test_mute_phrase_needs_bot_name() {
        assert!(is_mute_request("Маша, замолчи", "Маша", "masha_bot"));
        assert!(!is_mute_request("замолчи", "Маша", "masha_bot"));
        assert!(is_unmute_request("Маша, начни говорить", "Маша", "masha_bot"));
        assert!(!is_unmute_request("Маша, привет", "Маша", "masha_bot"));
    }

    #[test]
    fn test_correction_detection() {
        assert!(is_correction("нет, всё не так"));
        assert!(is_correction("That's wrong, actually"));
        assert!(!is_correction("sounds right to me"));
    }

    #[test]
    fn test_verdict_normalization() {
        assert!(is_affirmative("Yes."));
        assert!(is_affirmative("\"yes\", definitely"));
        assert!(is_affirmative("Да, конечно"));
        assert!(!is_affirmative("No way"));
        assert!(normalize_verdict("'Respond'").starts_with("respond"));
    }
}
