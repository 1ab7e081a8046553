//! Skills that run in the background and are never shown to the user.

use crate::registry::SkillStep;

/// Skill names hidden by default (compared case-insensitively).
pub const DEFAULT_HIDDEN_SKILLS: &[&str] = &["search_memory", "_date", "build_memory"];

/// `action` argument values that mark a step as internal.
pub const DEFAULT_HIDDEN_ACTIONS: &[&str] = &["show_ds"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkillFilter {
    hidden_skills: Vec<String>,
    hidden_actions: Vec<String>,
}

impl SkillFilter {
    pub fn new<S: AsRef<str>>(hidden_skills: &[S], hidden_actions: &[S]) -> Self {
        Self {
            hidden_skills: hidden_skills
                .iter()
                .map(|s| s.as_ref().to_lowercase())
                .collect(),
            hidden_actions: hidden_actions.iter().map(|s| s.as_ref().to_string()).collect(),
        }
    }

    /// A filter that hides nothing.
    pub fn permissive() -> Self {
        Self {
            hidden_skills: Vec::new(),
            hidden_actions: Vec::new(),
        }
    }

    pub fn is_hidden(&self, step: &SkillStep) -> bool {
        let name = step.name().to_lowercase();
        if self.hidden_skills.iter().any(|h| *h == name) {
            return true;
        }

        step.skill_info.args.iter().any(|arg| {
            arg.name.as_deref() == Some("action")
                && arg
                    .value_str()
                    .is_some_and(|v| self.hidden_actions.iter().any(|h| h == v))
        })
    }
}

impl Default for SkillFilter {
    fn default() -> Self {
        Self::new(DEFAULT_HIDDEN_SKILLS, DEFAULT_HIDDEN_ACTIONS)
    }
}
