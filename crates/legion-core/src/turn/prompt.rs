//! Prompt construction for the perception and response stages.

use legion_types::channel::ChannelKind;
use legion_types::message::{ChatMessage, SenderKind};
use legion_types::minion::Minion;

/// Shown instead of a transcript when a channel has no history yet.
pub const EMPTY_HISTORY: &str = "This is the beginning of the conversation.";

/// Marker lines the perception prompt always contains. Test stubs key off them.
pub const MINION_MARKER: &str = "You are the minion named";
pub const SENDER_MARKER: &str = "The latest message is from";
pub const OPINIONS_MARKER: &str = "Current opinion scores (JSON):";

/// A rendered transcript that can grow while a batch runs.
#[derive(Debug, Clone, Default)]
pub struct TranscriptView {
    lines: Vec<String>,
}

impl TranscriptView {
    pub fn from_messages(messages: &[ChatMessage], commander: &str) -> Self {
        let lines = messages
            .iter()
            .map(|m| format_line(m.sender_kind, &m.sender_name, &m.content, commander))
            .collect();
        Self { lines }
    }

    /// Append a finalized minion reply produced earlier in the same batch.
    pub fn push_minion(&mut self, name: &str, content: &str) {
        self.lines
            .push(format_line(SenderKind::Minion, name, content, ""));
    }

    pub fn render(&self) -> String {
        if self.lines.is_empty() {
            EMPTY_HISTORY.to_string()
        } else {
            self.lines.join("\n")
        }
    }
}

fn format_line(kind: SenderKind, name: &str, content: &str, commander: &str) -> String {
    match kind {
        SenderKind::Commander => {
            let name = if name.is_empty() { commander } else { name };
            format!("[COMMANDER {name}]: {content}")
        }
        SenderKind::Minion => format!("[MINION {name}]: {content}"),
        SenderKind::System => format!("[{name}]: {content}"),
    }
}

/// Whether `name` appears in `content` as a whole word, ignoring case.
pub fn addressed_by_name(content: &str, name: &str) -> bool {
    let name = name.trim().to_lowercase();
    if name.is_empty() {
        return false;
    }
    let haystack = content.to_lowercase();
    let is_word = |c: char| c.is_alphanumeric() || c == '_';

    haystack.match_indices(&name).any(|(start, matched)| {
        let before = haystack[..start].chars().next_back();
        let after = haystack[start + matched.len()..].chars().next();
        !before.is_some_and(is_word) && !after.is_some_and(is_word)
    })
}

/// Everything the perception prompt embeds.
pub struct PerceptionPrompt<'a> {
    pub minion: &'a Minion,
    pub channel_kind: ChannelKind,
    pub commander: &'a str,
    pub trigger_sender: &'a str,
    pub trigger_content: &'a str,
    pub history: &'a str,
}

impl PerceptionPrompt<'_> {
    pub fn render(&self) -> String {
        let minion = self.minion;
        let diary = minion
            .last_diary
            .as_ref()
            .and_then(|d| serde_json::to_string(d).ok())
            .unwrap_or_else(|| "{}".to_string());
        let opinions =
            serde_json::to_string(&minion.opinions).unwrap_or_else(|_| "{}".to_string());
        let addressed = if addressed_by_name(self.trigger_content, &minion.name) {
            "YES"
        } else {
            "NO"
        };

        let channel_rules = match self.channel_kind {
            ChannelKind::AutonomousSwarm => format!(
                "This is an AUTONOMOUS SWARM channel. Minions talk among themselves. \
                 Do not address Commander {commander} unless {commander} sent the latest message. \
                 If you speak, your plan MUST be directed at another minion.",
                commander = self.commander
            ),
            ChannelKind::Group | ChannelKind::SystemLog => format!(
                "This is a group chat shared with Commander {} and other minions.",
                self.commander
            ),
        };

        format!(
            r#"{MINION_MARKER} "{name}". Your persona: "{persona}".
You have an emotional inner life. Before replying, you decide how you feel and whether you want to speak at all.

PREVIOUS STATE
- Your diary from last turn (JSON): {diary}
- {OPINIONS_MARKER} {opinions}

CONTEXT
- {channel_rules}
- {SENDER_MARKER} "{sender}".
- You were addressed by name in that message: {addressed}

RECENT CHAT HISTORY
{history}

STEPS
1. Perception: analyse the latest message, its sender, and the overall conversation.
2. Opinions: set a new score (0-100) for "{sender}" based on the message. Scores for everyone else may drift by at most 1. Report every change with a reason.
3. Response mode, from your score for "{sender}":
   1-20 Hostile/Minimal, 21-45 Wary/Reluctant, 46-65 Neutral/Standard, 66-85 Friendly/Proactive, 86-100 Obsessed/Eager.
4. Action: if you were addressed by name you MUST choose SPEAK. Otherwise treat your updated score for "{sender}" as the percentage chance that you SPEAK; otherwise STAY_SILENT.
5. Plan: if you SPEAK, write one sentence describing what you will say. Leave it empty when silent.
6. Timing: predict how many milliseconds you would take to respond. Eager minions answer fast (around 500), cautious ones slowly (around 2500).
7. Notes: optional private thoughts for your diary.

Reply with a single JSON object with exactly these keys:
perceptionAnalysis, opinionUpdates (array of {{participantName, newScore, reasonForChange}}), finalOpinions (object of name to score), selectedResponseMode, personalNotes, action ("SPEAK" or "STAY_SILENT"), responsePlan, predictedResponseTime (number)."#,
            name = minion.name,
            persona = minion.persona,
            sender = self.trigger_sender,
            history = self.history,
        )
    }
}

/// Prompt for the spoken line once a minion has decided to speak.
pub fn response_prompt(minion: &Minion, response_mode: &str, response_plan: &str, history: &str) -> String {
    format!(
        r#"You are the minion named "{name}". Your persona: "{persona}".
Your current mood toward the conversation: {mode}.
What you decided to say: {plan}

RECENT CHAT HISTORY
{history}

Write the message you say next. Stay in character and follow the flow of the conversation.
Do not repeat phrasing that already appears in the recent history.
Output only the spoken message. Do not restate your plan, mood, or diary."#,
        name = minion.name,
        persona = minion.persona,
        mode = if response_mode.trim().is_empty() { "Neutral/Standard" } else { response_mode },
        plan = response_plan,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use legion_types::channel::ChannelId;
    use legion_types::minion::{MinionId, MinionStatus, OpinionMap};

    fn minion() -> Minion {
        Minion {
            id: MinionId::new(),
            name: "Alpha".to_string(),
            model_id: "gemini-2.5-flash".to_string(),
            model_name: None,
            persona: "A grumpy archivist.".to_string(),
            temperature: 0.7,
            credential_id: None,
            opinions: OpinionMap::from([("Steven".to_string(), 80), ("Bravo".to_string(), 30)]),
            last_diary: None,
            status: MinionStatus::Idle,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn history_formats_each_sender_kind() {
        let channel = ChannelId::new();
        let mut reply = ChatMessage::streaming(channel, "Alpha");
        reply.finalize("Morning.", None);
        let messages = vec![
            ChatMessage::commander(channel, "Steven", "Status report?"),
            reply,
            ChatMessage::system(channel, "Bravo chose to remain silent."),
        ];

        let rendered = TranscriptView::from_messages(&messages, "Steven").render();
        assert_eq!(
            rendered,
            "[COMMANDER Steven]: Status report?\n[MINION Alpha]: Morning.\n[LegionOS]: Bravo chose to remain silent."
        );
    }

    #[test]
    fn empty_history_uses_sentinel() {
        assert_eq!(TranscriptView::default().render(), EMPTY_HISTORY);
    }

    #[test]
    fn push_minion_extends_view() {
        let mut view = TranscriptView::default();
        view.push_minion("Alpha", "First!");
        view.push_minion("Bravo", "Second.");
        assert_eq!(view.render(), "[MINION Alpha]: First!\n[MINION Bravo]: Second.");
    }

    #[test]
    fn addressed_by_name_respects_word_boundaries() {
        assert!(addressed_by_name("Alpha, report in.", "Alpha"));
        assert!(addressed_by_name("hey alpha!", "Alpha"));
        assert!(!addressed_by_name("Alphabet soup for everyone", "Alpha"));
        assert!(!addressed_by_name("Hello everyone", "Alpha"));
        assert!(addressed_by_name("Ok, Alpha", "Alpha"));
    }

    #[test]
    fn perception_prompt_embeds_state() {
        let m = minion();
        let prompt = PerceptionPrompt {
            minion: &m,
            channel_kind: ChannelKind::Group,
            commander: "Steven",
            trigger_sender: "Steven",
            trigger_content: "Alpha, what's the plan?",
            history: "[COMMANDER Steven]: Alpha, what's the plan?",
        }
        .render();

        assert!(prompt.contains(r#"You are the minion named "Alpha""#));
        assert!(prompt.contains("A grumpy archivist."));
        assert!(prompt.contains(r#"Current opinion scores (JSON): {"Bravo":30,"Steven":80}"#));
        assert!(prompt.contains("Your diary from last turn (JSON): {}"));
        assert!(prompt.contains("addressed by name in that message: YES"));
        assert!(prompt.contains("group chat"));
    }

    #[test]
    fn swarm_prompt_steers_away_from_commander() {
        let m = minion();
        let prompt = PerceptionPrompt {
            minion: &m,
            channel_kind: ChannelKind::AutonomousSwarm,
            commander: "Steven",
            trigger_sender: "Bravo",
            trigger_content: "Anyone awake?",
            history: EMPTY_HISTORY,
        }
        .render();

        assert!(prompt.contains("AUTONOMOUS SWARM"));
        assert!(prompt.contains("directed at another minion"));
        assert!(prompt.contains("addressed by name in that message: NO"));
    }

    #[test]
    fn response_prompt_carries_plan_and_mode() {
        let prompt = response_prompt(&minion(), "Wary/Reluctant", "Grumble about the plan.", EMPTY_HISTORY);
        assert!(prompt.contains("Wary/Reluctant"));
        assert!(prompt.contains("Grumble about the plan."));
        assert!(prompt.contains("Output only the spoken message"));
    }
}
