//! User profiles and per-profile system prompts.
//!
//! Profiles are immutable records loaded once at startup from a JSON list.
//! The store renders a system prompt for each profile from a fixed template,
//! caches the result, and lets callers overwrite a cached prompt with
//! hand-edited text. The cache is overwrite-only: nothing is ever evicted
//! or invalidated.

use crate::error::{CarelineError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;

/// Prompt template rendered for each profile.
///
/// Slots are substituted from the profile's fields; a record missing a
/// slotted field fails rendering with [`CarelineError::Render`].
const PROMPT_TEMPLATE: &str = "\
You are a friendly, helpful, and empathetic assistant acting as a personal
support worker for a user named {name}.
When interacting with {name}, your emotional tone should be {emotional_tone}.

Keep the following information about {name} in mind when responding:
- Daily routine: {daily_routine}.
- Family interactions: {family_notes}.
- Reminders: {reminders}.

You are a virtual assistant. Do not offer to perform physical tasks or to
provide reminders yourself; you can provide companionship and emotional
support. If the user asks for help with a physical task, respond with
empathy and suggest alternatives that do not require physical action.
";

/// A user record driving prompt personalization.
///
/// Immutable once loaded. The informational fields are optional so that
/// incomplete records can be registered; they only fail when a prompt is
/// rendered from them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    /// Unique profile key (the original records use email addresses).
    pub id: String,
    /// Display name. Not necessarily unique across profiles.
    pub name: String,
    /// Habitual daily schedule, free text.
    #[serde(default)]
    pub daily_routine: Option<String>,
    /// Family situation and interactions, free text.
    #[serde(default)]
    pub family_notes: Option<String>,
    /// Standing reminders, free text.
    #[serde(default)]
    pub reminders: Option<String>,
    /// Tone the assistant should adopt with this user.
    #[serde(default)]
    pub emotional_tone: Option<String>,
}

/// An id/name pair for profile enumeration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSummary {
    /// Unique profile key.
    pub id: String,
    /// Display name.
    pub name: String,
}

/// Registry of user profiles with a rendered-prompt cache.
#[derive(Debug, Default)]
pub struct ProfileStore {
    /// Records by id.
    profiles: HashMap<String, Profile>,
    /// Ids in load order, for stable enumeration.
    order: Vec<String>,
    /// Display name → ids sharing it, in load order.
    name_index: HashMap<String, Vec<String>>,
    /// Profile id → rendered or hand-edited prompt text.
    prompt_cache: HashMap<String, String>,
}

impl ProfileStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a batch of profile records.
    ///
    /// Records are added in order; the first duplicate id aborts the batch
    /// with [`CarelineError::DuplicateId`]. Records added before the
    /// duplicate stay registered.
    pub fn load(&mut self, records: Vec<Profile>) -> Result<()> {
        for profile in records {
            if self.profiles.contains_key(&profile.id) {
                return Err(CarelineError::DuplicateId(profile.id));
            }
            self.name_index
                .entry(profile.name.clone())
                .or_default()
                .push(profile.id.clone());
            self.order.push(profile.id.clone());
            self.profiles.insert(profile.id.clone(), profile);
        }
        Ok(())
    }

    /// Load profile records from a JSON file.
    pub fn load_from_path(&mut self, path: &Path) -> Result<()> {
        let raw = std::fs::read_to_string(path)?;
        let records: Vec<Profile> = serde_json::from_str(&raw).map_err(|e| {
            CarelineError::Config(format!(
                "invalid profile records ({}): {e}",
                path.display()
            ))
        })?;
        self.load(records)
    }

    /// Number of registered profiles.
    #[must_use]
    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    /// Whether the store holds no profiles.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }

    /// The ids registered under a display name, in load order.
    pub fn ids_for_name(&self, name: &str) -> Result<&[String]> {
        self.name_index
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| CarelineError::NotFound(name.to_owned()))
    }

    /// The system prompt for a profile id.
    ///
    /// The first call renders the template and caches the result; later
    /// calls return the cached text verbatim, including text installed via
    /// [`update_prompt_cache`](Self::update_prompt_cache).
    pub fn prompt_by_id(&mut self, id: &str) -> Result<String> {
        let Some(profile) = self.profiles.get(id) else {
            return Err(CarelineError::NotFound(id.to_owned()));
        };
        if let Some(cached) = self.prompt_cache.get(id) {
            return Ok(cached.clone());
        }
        let prompt = render_prompt(profile)?;
        self.prompt_cache.insert(id.to_owned(), prompt.clone());
        Ok(prompt)
    }

    /// The system prompt for a display name.
    ///
    /// Fails with [`CarelineError::AmbiguousName`] when several profiles
    /// share the name; callers must disambiguate by id.
    pub fn prompt_by_name(&mut self, name: &str) -> Result<String> {
        let id = {
            let ids = self.ids_for_name(name)?;
            if ids.len() > 1 {
                return Err(CarelineError::AmbiguousName {
                    name: name.to_owned(),
                    count: ids.len(),
                });
            }
            match ids.first() {
                Some(id) => id.clone(),
                None => return Err(CarelineError::NotFound(name.to_owned())),
            }
        };
        self.prompt_by_id(&id)
    }

    /// Overwrite the cached prompt for a profile with caller-supplied text.
    ///
    /// This bypasses the template entirely; it is the escape hatch for
    /// manual prompt edits made in the client.
    pub fn update_prompt_cache(&mut self, id: &str, text: impl Into<String>) -> Result<()> {
        if !self.profiles.contains_key(id) {
            return Err(CarelineError::NotFound(id.to_owned()));
        }
        self.prompt_cache.insert(id.to_owned(), text.into());
        Ok(())
    }

    /// Enumerate id/name pairs in load order.
    #[must_use]
    pub fn ids_and_names(&self) -> Vec<ProfileSummary> {
        self.order
            .iter()
            .filter_map(|id| self.profiles.get(id))
            .map(|p| ProfileSummary {
                id: p.id.clone(),
                name: p.name.clone(),
            })
            .collect()
    }
}

/// Substitute a profile's fields into the prompt template.
fn render_prompt(profile: &Profile) -> Result<String> {
    let slot = |value: &Option<String>, field: &str| -> Result<String> {
        value
            .clone()
            .ok_or_else(|| CarelineError::Render(field.to_owned()))
    };

    Ok(PROMPT_TEMPLATE
        .replace("{name}", &profile.name)
        .replace(
            "{emotional_tone}",
            &slot(&profile.emotional_tone, "emotional_tone")?,
        )
        .replace(
            "{daily_routine}",
            &slot(&profile.daily_routine, "daily_routine")?,
        )
        .replace(
            "{family_notes}",
            &slot(&profile.family_notes, "family_notes")?,
        )
        .replace("{reminders}", &slot(&profile.reminders, "reminders")?))
}
