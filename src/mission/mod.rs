//! Mission / Definition-of-Done data model.
//!
//! A [`Mission`] pairs a target repository with an ordered, prioritized
//! [`DoDCriterion`] list. Completion semantics live in [`crate::progress`];
//! this module only owns the data and the invariants that must hold no
//! matter who mutates it.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::MissionError;

/// Totally ordered criterion priority. Declared low-to-high so the derived
/// `Ord` gives `Critical > High > Medium > Low`, matching spec notation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

/// Scan order for [`crate::progress::next_priority`]: most urgent first.
pub const PRIORITY_SCAN_ORDER: [Priority; 4] =
    [Priority::Critical, Priority::High, Priority::Medium, Priority::Low];

/// One acceptance criterion in a mission's Definition of Done.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoDCriterion {
    pub id: String,
    pub description: String,
    pub measurable: bool,
    pub priority: Priority,
    completed: bool,
    completed_at: Option<DateTime<Utc>>,
    evidence: Option<String>,
}

impl DoDCriterion {
    pub fn new(id: impl Into<String>, description: impl Into<String>, priority: Priority) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
            measurable: true,
            priority,
            completed: false,
            completed_at: None,
            evidence: None,
        }
    }

    pub fn measurable(mut self, measurable: bool) -> Self {
        self.measurable = measurable;
        self
    }

    pub fn completed(&self) -> bool {
        self.completed
    }

    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    pub fn evidence(&self) -> Option<&str> {
        self.evidence.as_deref()
    }

    /// Mark this criterion complete. Idempotent: completing an
    /// already-completed criterion only refreshes its evidence, and
    /// `completed_at` never moves backwards to "not completed".
    pub(crate) fn mark_complete(&mut self, now: DateTime<Utc>, evidence: Option<String>) {
        if !self.completed {
            self.completed = true;
            self.completed_at = Some(now);
        }
        if evidence.is_some() {
            self.evidence = evidence;
        }
    }
}

/// The declarative unit of work: a target repository plus a Definition of Done.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mission {
    pub id: String,
    pub repository: PathBuf,
    pub title: String,
    pub description: String,
    pub definition_of_done: Vec<DoDCriterion>,
    pub context: Option<String>,
    pub constraints: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Mission {
    /// Construct a mission, enforcing its invariants:
    /// non-empty DoD, unique ids, non-empty descriptions.
    pub fn new(
        id: impl Into<String>,
        repository: PathBuf,
        title: impl Into<String>,
        description: impl Into<String>,
        definition_of_done: Vec<DoDCriterion>,
    ) -> Result<Self, MissionError> {
        if definition_of_done.is_empty() {
            return Err(MissionError::EmptyDefinitionOfDone);
        }

        let mut seen = std::collections::HashSet::new();
        for criterion in &definition_of_done {
            if criterion.description.trim().is_empty() {
                return Err(MissionError::EmptyDescription(criterion.id.clone()));
            }
            if !seen.insert(criterion.id.clone()) {
                return Err(MissionError::DuplicateCriterion(criterion.id.clone()));
            }
        }

        Ok(Self {
            id: id.into(),
            repository,
            title: title.into(),
            description: description.into(),
            definition_of_done,
            context: None,
            constraints: None,
            created_at: Utc::now(),
        })
    }

    /// Whether every `Critical`/`High` criterion is complete. Delegates to
    /// [`crate::progress::is_complete`]; kept as an inherent method since
    /// callers generally think in terms of "is this mission done" rather
    /// than reaching for the `progress` module directly.
    pub fn is_complete(&self) -> bool {
        crate::progress::is_complete(self)
    }
}

/// The fixed set of artifact kinds an [`crate::executor::Executor`] may produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    Code,
    Test,
    Documentation,
    Config,
    Other,
}

/// A recorded `(path, content, kind, version)` tuple produced by an Executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Artifact {
    pub id: String,
    pub kind: ArtifactKind,
    pub path: String,
    pub content: String,
    /// 1-based, incrementing per path.
    pub version: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub checksum: Option<String>,
}

impl Artifact {
    pub fn checksum_of(content: &str) -> String {
        use sha2::{Digest, Sha256};
        let mut hasher = Sha256::new();
        hasher.update(content.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

/// On-disk shape of a mission definition, before the invariants in
/// [`Mission::new`] have been checked. Deserialized from TOML, YAML, or
/// JSON depending on the file's extension — same "one struct, several
/// formats" approach as `ProjectConfig` (TOML only there;
/// missions are authored by hand in whichever format is convenient).
#[derive(Debug, Deserialize)]
pub struct MissionFile {
    pub id: String,
    pub repository: PathBuf,
    pub title: String,
    pub description: String,
    #[serde(default)]
    pub context: Option<String>,
    #[serde(default)]
    pub constraints: Option<String>,
    pub definition_of_done: Vec<CriterionFile>,
}

#[derive(Debug, Deserialize)]
pub struct CriterionFile {
    pub id: String,
    pub description: String,
    #[serde(default = "default_measurable")]
    pub measurable: bool,
    pub priority: Priority,
}

fn default_measurable() -> bool {
    true
}

impl Mission {
    /// Load a mission definition from `path`, dispatching on its extension.
    pub fn load(path: &std::path::Path) -> anyhow::Result<Mission> {
        use anyhow::Context;

        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read mission file: {}", path.display()))?;

        let file: MissionFile = match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(&contents).context("failed to parse mission file as TOML")?,
            Some("yaml") | Some("yml") => {
                serde_yaml::from_str(&contents).context("failed to parse mission file as YAML")?
            }
            Some("json") => serde_json::from_str(&contents).context("failed to parse mission file as JSON")?,
            other => anyhow::bail!("unrecognized mission file extension: {other:?}"),
        };

        let criteria = file
            .definition_of_done
            .into_iter()
            .map(|c| DoDCriterion::new(c.id, c.description, c.priority).measurable(c.measurable))
            .collect();

        let mut mission = Mission::new(file.id, file.repository, file.title, file.description, criteria)?;
        mission.context = file.context;
        mission.constraints = file.constraints;
        Ok(mission)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn criterion(id: &str, priority: Priority) -> DoDCriterion {
        DoDCriterion::new(id, format!("do {id}"), priority)
    }

    #[test]
    fn priority_ordering_matches_spec() {
        assert!(Priority::Critical > Priority::High);
        assert!(Priority::High > Priority::Medium);
        assert!(Priority::Medium > Priority::Low);
    }

    #[test]
    fn new_mission_rejects_empty_dod() {
        let err = Mission::new("m1", PathBuf::from("/repo"), "t", "d", vec![]).unwrap_err();
        assert!(matches!(err, MissionError::EmptyDefinitionOfDone));
    }

    #[test]
    fn new_mission_rejects_duplicate_ids() {
        let dod = vec![
            criterion("a", Priority::High),
            criterion("a", Priority::Low),
        ];
        let err = Mission::new("m1", PathBuf::from("/repo"), "t", "d", dod).unwrap_err();
        assert!(matches!(err, MissionError::DuplicateCriterion(id) if id == "a"));
    }

    #[test]
    fn new_mission_rejects_empty_description() {
        let mut c = criterion("a", Priority::High);
        c.description = "   ".to_string();
        let err = Mission::new("m1", PathBuf::from("/repo"), "t", "d", vec![c]).unwrap_err();
        assert!(matches!(err, MissionError::EmptyDescription(id) if id == "a"));
    }

    #[test]
    fn new_mission_accepts_valid_dod() {
        let dod = vec![criterion("a", Priority::Critical), criterion("b", Priority::Low)];
        let mission = Mission::new("m1", PathBuf::from("/repo"), "t", "d", dod).unwrap();
        assert_eq!(mission.definition_of_done.len(), 2);
    }

    #[test]
    fn mark_complete_sets_completed_at_once() {
        let mut c = criterion("a", Priority::High);
        assert!(!c.completed());
        assert!(c.completed_at().is_none());

        let now = Utc::now();
        c.mark_complete(now, Some("evidence".to_string()));
        assert!(c.completed());
        assert_eq!(c.completed_at(), Some(now));
        assert_eq!(c.evidence(), Some("evidence"));
    }

    #[test]
    fn mark_complete_is_idempotent_and_keeps_first_completed_at() {
        let mut c = criterion("a", Priority::High);
        let first = Utc::now();
        c.mark_complete(first, None);

        let later = first + chrono::Duration::seconds(5);
        c.mark_complete(later, Some("more evidence".to_string()));

        assert_eq!(c.completed_at(), Some(first), "completed_at must not move once set");
        assert_eq!(c.evidence(), Some("more evidence"));
    }

    #[test]
    fn is_complete_delegates_to_the_critical_and_high_rule() {
        let mut mission = Mission::new(
            "m1",
            PathBuf::from("/repo"),
            "t",
            "d",
            vec![criterion("crit", Priority::Critical), criterion("low", Priority::Low)],
        )
        .unwrap();
        assert!(!mission.is_complete());

        mission.definition_of_done[0].mark_complete(Utc::now(), None);
        assert!(mission.is_complete());
    }

    #[test]
    fn artifact_checksum_is_deterministic() {
        let a = Artifact::checksum_of("hello");
        let b = Artifact::checksum_of("hello");
        assert_eq!(a, b);
        assert_ne!(a, Artifact::checksum_of("world"));
    }

    #[test]
    fn mission_serde_round_trip_preserves_fields() {
        let dod = vec![criterion("a", Priority::Critical)];
        let mission = Mission::new("m1", PathBuf::from("/repo"), "t", "d", dod).unwrap();
        let json = serde_json::to_string(&mission).unwrap();
        let back: Mission = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, mission.id);
        assert_eq!(back.created_at, mission.created_at);
        assert_eq!(back.definition_of_done[0].priority, Priority::Critical);
    }

    #[test]
    fn unknown_priority_token_is_rejected_on_deserialize() {
        let json = r#""urgent""#;
        let result: Result<Priority, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn load_parses_toml_mission_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("mission.toml");
        std::fs::write(
            &path,
            r#"
id = "m1"
repository = "/repo"
title = "Ship it"
description = "make the feature work"

[[definition_of_done]]
id = "crit"
description = "core path works"
priority = "critical"
"#,
        )
        .unwrap();

        let mission = Mission::load(&path).unwrap();
        assert_eq!(mission.id, "m1");
        assert_eq!(mission.definition_of_done.len(), 1);
        assert_eq!(mission.definition_of_done[0].priority, Priority::Critical);
    }

    #[test]
    fn load_parses_yaml_mission_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("mission.yaml");
        std::fs::write(
            &path,
            "id: m1\nrepository: /repo\ntitle: Ship it\ndescription: make the feature work\ndefinition_of_done:\n  - id: crit\n    description: core path works\n    priority: critical\n",
        )
        .unwrap();

        let mission = Mission::load(&path).unwrap();
        assert_eq!(mission.id, "m1");
        assert_eq!(mission.definition_of_done[0].priority, Priority::Critical);
    }

    #[test]
    fn load_parses_json_mission_file() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("mission.json");
        std::fs::write(
            &path,
            r#"{"id":"m1","repository":"/repo","title":"Ship it","description":"d","definition_of_done":[{"id":"crit","description":"x","priority":"critical"}]}"#,
        )
        .unwrap();

        let mission = Mission::load(&path).unwrap();
        assert_eq!(mission.id, "m1");
    }

    #[test]
    fn load_rejects_unrecognized_extension() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("mission.txt");
        std::fs::write(&path, "not a mission").unwrap();
        assert!(Mission::load(&path).is_err());
    }

    #[test]
    fn load_propagates_invariant_violations() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("mission.toml");
        std::fs::write(
            &path,
            r#"
id = "m1"
repository = "/repo"
title = "t"
description = "d"
definition_of_done = []
"#,
        )
        .unwrap();
        assert!(Mission::load(&path).is_err());
    }
}
