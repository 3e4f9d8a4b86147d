//! The structured decision a minion produces in its perception stage.
//!
//! Two shapes live here:
//! - [`RawPerceptionPlan`] mirrors the loose JSON the model emits (camelCase
//!   keys, stringly actions, numbers that may arrive as strings). Its schema is
//!   sent to the provider as the structured-output contract.
//! - [`PerceptionPlan`] is the validated form the engine works with. The
//!   speak/silence choice is a tagged [`TurnDecision`] so a SPEAK always carries
//!   a plan and a latency and a STAY_SILENT carries neither.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::minion::{MAX_OPINION_SCORE, OpinionMap};

/// One opinion change the minion reports for this turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OpinionUpdate {
    pub participant_name: String,
    pub new_score: u8,
    #[serde(default)]
    pub reason_for_change: String,
}

/// Whether the minion takes the floor this turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action")]
pub enum TurnDecision {
    #[serde(rename = "SPEAK", rename_all = "camelCase")]
    Speak {
        /// One sentence describing what the minion intends to say.
        response_plan: String,
        /// How quickly the minion would react, in milliseconds. Lower speaks first.
        predicted_response_time: u64,
    },
    #[serde(rename = "STAY_SILENT")]
    StaySilent,
}

impl TurnDecision {
    pub fn is_speak(&self) -> bool {
        matches!(self, TurnDecision::Speak { .. })
    }
}

/// Validated diary entry produced by one perception call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerceptionPlan {
    pub perception_analysis: String,
    #[serde(default)]
    pub opinion_updates: Vec<OpinionUpdate>,
    #[serde(default)]
    pub final_opinions: OpinionMap,
    pub selected_response_mode: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub personal_notes: Option<String>,
    #[serde(flatten)]
    pub decision: TurnDecision,
}

/// A latency the model may emit as a number or a numeric string.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(untagged)]
pub enum RawLatency {
    Number(f64),
    Text(String),
}

impl RawLatency {
    fn as_millis(&self) -> Option<u64> {
        let value = match self {
            RawLatency::Number(n) => *n,
            RawLatency::Text(s) => s.trim().trim_end_matches("ms").trim().parse::<f64>().ok()?,
        };
        (value.is_finite() && value >= 0.0).then(|| value.round() as u64)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RawOpinionUpdate {
    pub participant_name: String,
    pub new_score: f64,
    #[serde(default)]
    pub reason_for_change: String,
}

/// Perception output exactly as the model returns it.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RawPerceptionPlan {
    /// Analysis of the latest message, the sender, and the conversation.
    #[serde(default)]
    pub perception_analysis: String,
    #[serde(default)]
    pub opinion_updates: Vec<RawOpinionUpdate>,
    /// Complete opinion map after this turn's updates.
    #[serde(default)]
    pub final_opinions: BTreeMap<String, f64>,
    #[serde(default)]
    pub selected_response_mode: String,
    #[serde(default)]
    pub personal_notes: Option<String>,
    /// Either "SPEAK" or "STAY_SILENT".
    pub action: String,
    /// One-sentence plan. Empty when staying silent.
    #[serde(default)]
    pub response_plan: String,
    /// Milliseconds before this minion would respond.
    #[serde(default)]
    pub predicted_response_time: Option<RawLatency>,
}

fn clamp_score(score: f64) -> u8 {
    if !score.is_finite() {
        return 0;
    }
    score.round().clamp(0.0, f64::from(MAX_OPINION_SCORE)) as u8
}

impl TryFrom<RawPerceptionPlan> for PerceptionPlan {
    type Error = String;

    fn try_from(raw: RawPerceptionPlan) -> Result<Self, Self::Error> {
        let action = raw.action.trim().to_uppercase().replace([' ', '-'], "_");
        let decision = match action.as_str() {
            "SPEAK" => {
                let response_plan = raw.response_plan.trim().to_string();
                if response_plan.is_empty() {
                    return Err("SPEAK decision is missing a response plan".to_string());
                }
                let predicted_response_time = raw
                    .predicted_response_time
                    .as_ref()
                    .and_then(RawLatency::as_millis)
                    .ok_or_else(|| {
                        "SPEAK decision is missing a valid predicted response time".to_string()
                    })?;
                TurnDecision::Speak {
                    response_plan,
                    predicted_response_time,
                }
            }
            "STAY_SILENT" | "SILENT" => TurnDecision::StaySilent,
            other => return Err(format!("unknown action '{other}'")),
        };

        let opinion_updates = raw
            .opinion_updates
            .into_iter()
            .map(|u| OpinionUpdate {
                participant_name: u.participant_name,
                new_score: clamp_score(u.new_score),
                reason_for_change: u.reason_for_change,
            })
            .collect();

        let final_opinions = raw
            .final_opinions
            .into_iter()
            .map(|(name, score)| (name, clamp_score(score)))
            .collect();

        Ok(PerceptionPlan {
            perception_analysis: raw.perception_analysis,
            opinion_updates,
            final_opinions,
            selected_response_mode: raw.selected_response_mode,
            personal_notes: raw.personal_notes.filter(|n| !n.trim().is_empty()),
            decision,
        })
    }
}
