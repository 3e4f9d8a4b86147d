//! Emotional state store.
//!
//! Owns every minion together with its opinion map and last diary. Opinion
//! maps are kept complete: each minion holds a score for the commander and
//! for every other minion, seeded at [`DEFAULT_OPINION_SCORE`].
//!
//! The store is only mutated by management operations and by the turn
//! engine after a perception call settles. Perception calls for different
//! minions touch disjoint entries, so short write-lock sections suffice.

use std::sync::RwLock;

use chrono::Utc;

use legion_types::credential::CredentialId;
use legion_types::diary::PerceptionPlan;
use legion_types::error::LegionError;
use legion_types::minion::{
    CreateMinionRequest, DEFAULT_OPINION_SCORE, Minion, MinionId, MinionStatus, OpinionMap,
    UpdateMinionRequest,
};

/// A rename applied by [`MinionRoster::update`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rename {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Default)]
pub struct MinionRoster {
    minions: RwLock<Vec<Minion>>,
}

impl MinionRoster {
    /// Load a roster, resetting transient status.
    pub fn new(mut minions: Vec<Minion>) -> Self {
        for minion in &mut minions {
            minion.status = MinionStatus::Idle;
        }
        Self {
            minions: RwLock::new(minions),
        }
    }

    pub fn list(&self) -> Vec<Minion> {
        self.minions.read().expect("roster lock poisoned").clone()
    }

    pub fn get(&self, id: &MinionId) -> Option<Minion> {
        self.minions
            .read()
            .expect("roster lock poisoned")
            .iter()
            .find(|m| &m.id == id)
            .cloned()
    }

    pub fn get_by_name(&self, name: &str) -> Option<Minion> {
        self.minions
            .read()
            .expect("roster lock poisoned")
            .iter()
            .find(|m| m.name == name)
            .cloned()
    }

    pub fn contains_name(&self, name: &str) -> bool {
        self.get_by_name(name).is_some()
    }

    /// Minions named in `members`, in member order. Unknown names are skipped.
    pub fn resolve_members(&self, members: &[String]) -> Vec<Minion> {
        let minions = self.minions.read().expect("roster lock poisoned");
        members
            .iter()
            .filter_map(|name| minions.iter().find(|m| &m.name == name).cloned())
            .collect()
    }

    /// Create a minion and seed opinions in both directions.
    pub fn add(
        &self,
        request: CreateMinionRequest,
        commander: &str,
        credential_exists: impl Fn(&CredentialId) -> bool,
    ) -> Result<Minion, LegionError> {
        let name = request.name.trim().to_string();
        validate_temperature(request.temperature)?;
        validate_model(&request.model_id)?;
        if let Some(id) = &request.credential_id
            && !credential_exists(id)
        {
            return Err(LegionError::not_found("credential", id));
        }

        let mut minions = self.minions.write().expect("roster lock poisoned");
        validate_name(&name, commander, minions.iter().map(|m| m.name.as_str()))?;

        let mut opinions = OpinionMap::new();
        opinions.insert(commander.to_string(), DEFAULT_OPINION_SCORE);
        for existing in minions.iter_mut() {
            opinions.insert(existing.name.clone(), DEFAULT_OPINION_SCORE);
            existing.opinions.insert(name.clone(), DEFAULT_OPINION_SCORE);
        }

        let now = Utc::now();
        let minion = Minion {
            id: MinionId::new(),
            name,
            model_id: request.model_id.trim().to_string(),
            model_name: request.model_name.filter(|n| !n.trim().is_empty()),
            persona: request.persona,
            temperature: request.temperature,
            credential_id: request.credential_id,
            opinions,
            last_diary: None,
            status: MinionStatus::Idle,
            created_at: now,
            updated_at: now,
        };
        minions.push(minion.clone());
        Ok(minion)
    }

    /// Apply a partial update. A rename migrates every other minion's opinion key.
    pub fn update(
        &self,
        id: &MinionId,
        request: UpdateMinionRequest,
        commander: &str,
        credential_exists: impl Fn(&CredentialId) -> bool,
    ) -> Result<(Minion, Option<Rename>), LegionError> {
        if let Some(t) = request.temperature {
            validate_temperature(t)?;
        }
        if let Some(model) = &request.model_id {
            validate_model(model)?;
        }
        if let Some(Some(cred)) = &request.credential_id
            && !credential_exists(cred)
        {
            return Err(LegionError::not_found("credential", cred));
        }

        let mut minions = self.minions.write().expect("roster lock poisoned");
        let index = minions
            .iter()
            .position(|m| &m.id == id)
            .ok_or_else(|| LegionError::not_found("minion", id))?;

        let mut rename = None;
        if let Some(new_name) = request.name.map(|n| n.trim().to_string())
            && new_name != minions[index].name
        {
            validate_name(
                &new_name,
                commander,
                minions
                    .iter()
                    .filter(|m| &m.id != id)
                    .map(|m| m.name.as_str()),
            )?;
            rename = Some(Rename {
                from: minions[index].name.clone(),
                to: new_name,
            });
        }

        if let Some(Rename { from, to }) = &rename {
            for other in minions.iter_mut().filter(|m| &m.id != id) {
                let score = other.opinions.remove(from).unwrap_or(DEFAULT_OPINION_SCORE);
                other.opinions.insert(to.clone(), score);
            }
            minions[index].name = to.clone();
        }

        let minion = &mut minions[index];
        if let Some(model_id) = request.model_id {
            minion.model_id = model_id.trim().to_string();
        }
        if let Some(model_name) = request.model_name {
            minion.model_name = Some(model_name).filter(|n| !n.trim().is_empty());
        }
        if let Some(persona) = request.persona {
            minion.persona = persona;
        }
        if let Some(temperature) = request.temperature {
            minion.temperature = temperature;
        }
        if let Some(credential_id) = request.credential_id {
            minion.credential_id = credential_id;
        }
        minion.updated_at = Utc::now();

        Ok((minion.clone(), rename))
    }

    /// Remove a minion and every other minion's opinion of it.
    pub fn remove(&self, id: &MinionId) -> Result<Minion, LegionError> {
        let mut minions = self.minions.write().expect("roster lock poisoned");
        let index = minions
            .iter()
            .position(|m| &m.id == id)
            .ok_or_else(|| LegionError::not_found("minion", id))?;
        let removed = minions.remove(index);
        for other in minions.iter_mut() {
            other.opinions.remove(&removed.name);
        }
        Ok(removed)
    }

    /// Merge a perception plan into the acting minion's state.
    ///
    /// Scores for participants the minion already tracks are replaced; names
    /// the minion does not know are ignored so a hallucinated participant
    /// never enters the map. Returns `false` if the minion no longer exists.
    pub fn apply_plan(&self, name: &str, plan: &PerceptionPlan) -> bool {
        let mut minions = self.minions.write().expect("roster lock poisoned");
        let Some(minion) = minions.iter_mut().find(|m| m.name == name) else {
            return false;
        };
        for (participant, score) in &plan.final_opinions {
            if let Some(slot) = minion.opinions.get_mut(participant) {
                *slot = *score;
            }
        }
        minion.last_diary = Some(plan.clone());
        minion.updated_at = Utc::now();
        true
    }

    pub fn set_status(&self, name: &str, status: MinionStatus) {
        let mut minions = self.minions.write().expect("roster lock poisoned");
        if let Some(minion) = minions.iter_mut().find(|m| m.name == name) {
            minion.status = status;
        }
    }

    /// Drop every pin to `credential`. Returns how many minions were unpinned.
    pub fn clear_pins(&self, credential: &CredentialId) -> usize {
        let mut minions = self.minions.write().expect("roster lock poisoned");
        let mut cleared = 0;
        for minion in minions.iter_mut().filter(|m| m.credential_id.as_ref() == Some(credential)) {
            minion.credential_id = None;
            cleared += 1;
        }
        cleared
    }
}

fn validate_name<'a>(
    name: &str,
    commander: &str,
    existing: impl IntoIterator<Item = &'a str>,
) -> Result<(), LegionError> {
    if name.is_empty() {
        return Err(LegionError::validation("minion name cannot be blank"));
    }
    if name.eq_ignore_ascii_case(commander) {
        return Err(LegionError::validation(format!(
            "'{name}' is the commander's name"
        )));
    }
    if existing.into_iter().any(|n| n.eq_ignore_ascii_case(name)) {
        return Err(LegionError::validation(format!(
            "a minion named '{name}' already exists"
        )));
    }
    Ok(())
}

fn validate_temperature(temperature: f64) -> Result<(), LegionError> {
    if !(0.0..=1.0).contains(&temperature) {
        return Err(LegionError::validation(format!(
            "temperature must be between 0.0 and 1.0, got {temperature}"
        )));
    }
    Ok(())
}

fn validate_model(model_id: &str) -> Result<(), LegionError> {
    if model_id.trim().is_empty() {
        return Err(LegionError::validation("model id cannot be blank"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use legion_types::diary::TurnDecision;
    use proptest::prelude::*;

    const COMMANDER: &str = "Steven";

    fn request(name: &str) -> CreateMinionRequest {
        CreateMinionRequest {
            name: name.to_string(),
            model_id: "gemini-2.5-flash".to_string(),
            model_name: None,
            persona: format!("{name} persona"),
            temperature: 0.7,
            credential_id: None,
        }
    }

    fn add(roster: &MinionRoster, name: &str) -> Minion {
        roster.add(request(name), COMMANDER, |_| true).unwrap()
    }

    fn silent_plan(final_opinions: &[(&str, u8)]) -> PerceptionPlan {
        PerceptionPlan {
            perception_analysis: "quiet".to_string(),
            opinion_updates: vec![],
            final_opinions: final_opinions
                .iter()
                .map(|(n, s)| (n.to_string(), *s))
                .collect(),
            selected_response_mode: "Neutral/Standard".to_string(),
            personal_notes: None,
            decision: TurnDecision::StaySilent,
        }
    }

    #[test]
    fn add_rejects_duplicate_and_commander_names() {
        let roster = MinionRoster::default();
        add(&roster, "Alpha");

        assert!(matches!(
            roster.add(request("alpha"), COMMANDER, |_| true),
            Err(LegionError::Validation(_))
        ));
        assert!(matches!(
            roster.add(request("steven"), COMMANDER, |_| true),
            Err(LegionError::Validation(_))
        ));
        assert!(matches!(
            roster.add(request("   "), COMMANDER, |_| true),
            Err(LegionError::Validation(_))
        ));
    }

    #[test]
    fn add_rejects_out_of_range_temperature() {
        let roster = MinionRoster::default();
        let mut req = request("Alpha");
        req.temperature = 1.5;
        assert!(matches!(
            roster.add(req, COMMANDER, |_| true),
            Err(LegionError::Validation(_))
        ));
    }

    #[test]
    fn add_rejects_unknown_pin() {
        let roster = MinionRoster::default();
        let mut req = request("Alpha");
        req.credential_id = Some(CredentialId::new());
        assert!(matches!(
            roster.add(req, COMMANDER, |_| false),
            Err(LegionError::NotFound { .. })
        ));
    }

    #[test]
    fn remove_purges_opinions() {
        let roster = MinionRoster::default();
        add(&roster, "Alpha");
        let bravo = add(&roster, "Bravo");

        roster.remove(&bravo.id).unwrap();
        let alpha = roster.get_by_name("Alpha").unwrap();
        assert!(!alpha.opinions.contains_key("Bravo"));
        assert!(alpha.opinions.contains_key(COMMANDER));
    }

    #[test]
    fn rename_migrates_opinion_keys() {
        let roster = MinionRoster::default();
        let alpha = add(&roster, "Alpha");
        add(&roster, "Bravo");
        roster.apply_plan("Bravo", &silent_plan(&[("Alpha", 90)]));

        let (updated, rename) = roster
            .update(
                &alpha.id,
                UpdateMinionRequest {
                    name: Some("Apex".to_string()),
                    ..Default::default()
                },
                COMMANDER,
                |_| true,
            )
            .unwrap();

        assert_eq!(updated.name, "Apex");
        assert_eq!(
            rename,
            Some(Rename {
                from: "Alpha".to_string(),
                to: "Apex".to_string()
            })
        );
        let bravo = roster.get_by_name("Bravo").unwrap();
        assert_eq!(bravo.opinions.get("Apex"), Some(&90));
        assert!(!bravo.opinions.contains_key("Alpha"));
    }

    #[test]
    fn apply_plan_ignores_unknown_participants() {
        let roster = MinionRoster::default();
        add(&roster, "Alpha");
        add(&roster, "Bravo");

        assert!(roster.apply_plan("Alpha", &silent_plan(&[("Bravo", 12), ("Ghost", 99)])));

        let alpha = roster.get_by_name("Alpha").unwrap();
        assert_eq!(alpha.opinions.get("Bravo"), Some(&12));
        assert_eq!(alpha.opinions.get(COMMANDER), Some(&DEFAULT_OPINION_SCORE));
        assert!(!alpha.opinions.contains_key("Ghost"));
        assert!(alpha.last_diary.is_some());
    }

    #[test]
    fn clear_pins_unpins_matching_minions() {
        let roster = MinionRoster::default();
        let cred = CredentialId::new();
        let mut req = request("Alpha");
        req.credential_id = Some(cred);
        roster.add(req, COMMANDER, |_| true).unwrap();
        add(&roster, "Bravo");

        assert_eq!(roster.clear_pins(&cred), 1);
        assert!(roster.get_by_name("Alpha").unwrap().credential_id.is_none());
    }

    #[test]
    fn resolve_members_keeps_member_order() {
        let roster = MinionRoster::default();
        add(&roster, "Alpha");
        add(&roster, "Bravo");
        let names: Vec<String> = roster
            .resolve_members(&["Bravo".to_string(), "Ghost".to_string(), "Alpha".to_string()])
            .into_iter()
            .map(|m| m.name)
            .collect();
        assert_eq!(names, vec!["Bravo", "Alpha"]);
    }

    proptest! {
        #[test]
        fn creation_seeds_opinions_both_ways(count in 1usize..8) {
            let roster = MinionRoster::default();
            for i in 0..count {
                let name = format!("Minion{i}");
                let previous: Vec<String> = roster.list().into_iter().map(|m| m.name).collect();
                let created = add(&roster, &name);

                prop_assert_eq!(created.opinions.get(COMMANDER), Some(&DEFAULT_OPINION_SCORE));
                for prior in &previous {
                    prop_assert_eq!(created.opinions.get(prior), Some(&DEFAULT_OPINION_SCORE));
                    let prior_minion = roster.get_by_name(prior).unwrap();
                    prop_assert_eq!(prior_minion.opinions.get(&name), Some(&DEFAULT_OPINION_SCORE));
                }
                prop_assert_eq!(created.opinions.len(), previous.len() + 1);
            }
        }
    }
}
