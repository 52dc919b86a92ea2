use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::dependency_registry::DependencyRegistry;
use crate::domain::{DependencyName, DependencyStatus};
use crate::storage::{KeyValueStore, LANGUAGE_KEY, ONBOARDING_KEY};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SetupStep {
    Welcome,
    LanguageChoice,
    DependencyInstall,
    Done,
}

impl SetupStep {
    pub const COUNT: usize = 4;

    pub fn index(self) -> usize {
        self as usize
    }

    fn following(self) -> SetupStep {
        match self {
            SetupStep::Welcome => SetupStep::LanguageChoice,
            SetupStep::LanguageChoice => SetupStep::DependencyInstall,
            SetupStep::DependencyInstall | SetupStep::Done => SetupStep::Done,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Language {
    #[default]
    #[serde(rename = "en")]
    English,
    #[serde(rename = "pt-BR")]
    Portuguese,
}

impl Language {
    pub const ALL: [Language; 2] = [Language::English, Language::Portuguese];

    /// Locale hint forwarded to the host.
    pub fn code(self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Portuguese => "pt-BR",
        }
    }

    pub fn load(storage: &dyn KeyValueStore) -> Language {
        match storage.get(LANGUAGE_KEY) {
            Ok(Some(json)) => serde_json::from_str(&json).unwrap_or_default(),
            Ok(None) => Language::default(),
            Err(e) => {
                tracing::warn!(error = %e, "language preference unavailable");
                Language::default()
            }
        }
    }

    pub fn save(self, storage: &dyn KeyValueStore) {
        let saved = serde_json::to_string(&self)
            .map_err(|e| e.to_string())
            .and_then(|json| storage.set(LANGUAGE_KEY, &json).map_err(|e| e.to_string()));
        if let Err(e) = saved {
            tracing::warn!(error = %e, "language preference not saved");
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Language::English => "English",
            Language::Portuguese => "Português",
        })
    }
}

/// First-run walkthrough: Welcome → LanguageChoice → DependencyInstall → Done.
///
/// Only moves forward. Installs themselves go through the install sequencer;
/// this keeps its own view of which tools are present.
#[derive(Debug, Clone)]
pub struct GuidedSetup {
    step: SetupStep,
    language: Language,
    installed: BTreeMap<DependencyName, bool>,
    completed: bool,
}

impl GuidedSetup {
    /// The walkthrough runs only while the completion marker is absent.
    pub fn is_required(storage: &dyn KeyValueStore) -> bool {
        match storage.get(ONBOARDING_KEY) {
            Ok(marker) => marker.is_none(),
            Err(e) => {
                tracing::warn!(error = %e, "onboarding marker unavailable");
                true
            }
        }
    }

    pub fn new(registry: &DependencyRegistry, language: Language) -> Self {
        let mut setup = Self {
            step: SetupStep::Welcome,
            language,
            installed: BTreeMap::new(),
            completed: false,
        };
        setup.sync(registry);
        setup
    }

    pub fn step(&self) -> SetupStep {
        self.step
    }

    pub fn language(&self) -> Language {
        self.language
    }

    pub fn is_installed(&self, name: DependencyName) -> bool {
        self.installed.get(&name).copied().unwrap_or(false)
    }

    pub fn all_installed(&self) -> bool {
        DependencyName::ALL.iter().all(|name| self.is_installed(*name))
    }

    pub fn missing(&self) -> Vec<DependencyName> {
        DependencyName::ALL
            .into_iter()
            .filter(|name| !self.is_installed(*name))
            .collect()
    }

    pub fn sync(&mut self, registry: &DependencyRegistry) {
        for status in registry.statuses() {
            self.record_install(status);
        }
    }

    pub fn record_install(&mut self, status: DependencyStatus) {
        self.installed.insert(status.name, status.installed);
    }

    pub fn choose_language(&mut self, language: Language, storage: &dyn KeyValueStore) {
        if self.step != SetupStep::LanguageChoice {
            return;
        }
        self.language = language;
        language.save(storage);
    }

    /// The "continue" affordance; at DependencyInstall it needs every tool.
    pub fn can_continue(&self) -> bool {
        match self.step {
            SetupStep::DependencyInstall => self.all_installed(),
            SetupStep::Done => false,
            _ => true,
        }
    }

    pub fn next(&mut self) -> bool {
        if !self.can_continue() {
            return false;
        }
        self.step = self.step.following();
        true
    }

    /// Leaves DependencyInstall for Done whether or not tools are present.
    pub fn skip(&mut self) -> bool {
        if self.step != SetupStep::DependencyInstall {
            return false;
        }
        tracing::info!(missing = ?self.missing(), "tool installation skipped");
        self.step = SetupStep::Done;
        true
    }

    /// Persists the completion marker. Returns `false` when not at Done or
    /// already dismissed.
    pub fn dismiss(&mut self, storage: &dyn KeyValueStore) -> bool {
        if self.step != SetupStep::Done || self.completed {
            return false;
        }
        self.completed = true;
        if let Err(e) = storage.set(ONBOARDING_KEY, "1") {
            tracing::warn!(error = %e, "onboarding marker not saved");
        }
        true
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }
}
