//! Planner decisions and their lenient parsing.
//!
//! Planners are language models; their output is untrusted. Anything that
//! does not describe exactly one routable unit of work degrades to `Wait`.

use serde::Deserialize;
use serde_json::{Value, json};

use super::{ActionType, Agent};
use crate::util::extract_json_object;

/// One unit of work routed to one collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Assignment {
    /// `Generate` or `Edit`
    pub action: ActionType,
    pub agent: Agent,
    pub target_file: String,
    pub context_notes: String,
}

/// What the planner wants the loop to do this cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Dispatch(Assignment),
    Wait { reason: String },
    Stop { reason: String },
}

/// Wire form of a decision, every field optional so validation can explain
/// what is missing instead of failing deserialization.
#[derive(Debug, Default, Deserialize)]
struct RawDecision {
    #[serde(default)]
    action_type: Option<String>,
    #[serde(default)]
    target_file: Option<String>,
    #[serde(default)]
    assigned_agent: Option<String>,
    #[serde(default)]
    context_notes: Option<String>,
    #[serde(default)]
    reason: Option<String>,
}

impl Decision {
    pub fn wait(reason: impl Into<String>) -> Self {
        Decision::Wait {
            reason: reason.into(),
        }
    }

    pub fn dispatch(action: ActionType, agent: Agent, target_file: &str, notes: &str) -> Self {
        Decision::Dispatch(Assignment {
            action,
            agent,
            target_file: target_file.to_string(),
            context_notes: notes.to_string(),
        })
    }

    pub fn action_type(&self) -> ActionType {
        match self {
            Decision::Dispatch(a) => a.action,
            Decision::Wait { .. } => ActionType::Wait,
            Decision::Stop { .. } => ActionType::Stop,
        }
    }

    /// Parse free-form planner output. Never fails: malformed output is a wait.
    pub fn parse_lenient(text: &str) -> Self {
        let Some(object) = extract_json_object(text) else {
            return Decision::wait("planner output contained no JSON object");
        };
        match serde_json::from_str::<Value>(&object) {
            Ok(value) => Self::from_value(&value),
            Err(e) => Decision::wait(format!("planner produced invalid JSON: {}", e)),
        }
    }

    /// Validate a decoded JSON decision.
    pub fn from_value(value: &Value) -> Self {
        let raw: RawDecision = match serde_json::from_value(value.clone()) {
            Ok(raw) => raw,
            Err(e) => return Decision::wait(format!("malformed decision: {}", e)),
        };

        let Some(action_str) = raw.action_type.as_deref() else {
            return Decision::wait("decision is missing action_type");
        };
        let action = match action_str.parse::<ActionType>() {
            Ok(action) => action,
            Err(e) => return Decision::wait(e.to_string()),
        };
        let notes = raw.context_notes.unwrap_or_default();

        match action {
            ActionType::Wait => Decision::wait(raw.reason.unwrap_or(notes)),
            ActionType::Stop => Decision::Stop {
                reason: raw.reason.unwrap_or(notes),
            },
            ActionType::Generate | ActionType::Edit => {
                let target = raw
                    .target_file
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty());
                let Some(target_file) = target else {
                    return Decision::wait(format!("{} decision has no target_file", action));
                };
                let Some(agent_str) = raw.assigned_agent.as_deref() else {
                    return Decision::wait(format!("{} decision has no assigned_agent", action));
                };
                match agent_str.parse::<Agent>() {
                    Ok(agent) => Decision::Dispatch(Assignment {
                        action,
                        agent,
                        target_file,
                        context_notes: notes,
                    }),
                    Err(e) => Decision::wait(e.to_string()),
                }
            }
        }
    }

    /// Wire form, as written for collaborators and logs.
    pub fn to_value(&self) -> Value {
        match self {
            Decision::Dispatch(a) => json!({
                "action_type": a.action,
                "target_file": a.target_file,
                "assigned_agent": a.agent,
                "context_notes": a.context_notes,
            }),
            Decision::Wait { reason } => json!({
                "action_type": ActionType::Wait,
                "target_file": null,
                "assigned_agent": null,
                "context_notes": reason,
            }),
            Decision::Stop { reason } => json!({
                "action_type": ActionType::Stop,
                "target_file": null,
                "assigned_agent": null,
                "context_notes": reason,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_generate_decision() {
        let text = r#"{"action_type": "generate", "target_file": "ch02_Rising.md", "assigned_agent": "narrator", "context_notes": "Introduce the storm"}"#;
        let decision = Decision::parse_lenient(text);
        assert_eq!(
            decision,
            Decision::dispatch(
                ActionType::Generate,
                Agent::Narrator,
                "ch02_Rising.md",
                "Introduce the storm"
            )
        );
    }

    #[test]
    fn test_parse_decision_inside_fenced_block() {
        let text = "Sure, here is the plan:\n```json\n{\"action_type\": \"edit\", \"target_file\": \"ch01\", \"assigned_agent\": \"editor\"}\n```";
        match Decision::parse_lenient(text) {
            Decision::Dispatch(a) => {
                assert_eq!(a.action, ActionType::Edit);
                assert_eq!(a.agent, Agent::Editor);
                assert_eq!(a.target_file, "ch01");
                assert!(a.context_notes.is_empty());
            }
            other => panic!("Expected dispatch, got {:?}", other),
        }
    }

    #[test]
    fn test_fix_action_maps_to_edit() {
        let value = json!({"action_type": "fix", "target_file": "ch03", "assigned_agent": "narrator"});
        assert_eq!(Decision::from_value(&value).action_type(), ActionType::Edit);
    }

    #[test]
    fn test_wait_and_stop() {
        let wait = Decision::from_value(&json!({"action_type": "wait", "reason": "nothing to do"}));
        assert_eq!(wait, Decision::wait("nothing to do"));
        let stop = Decision::from_value(&json!({"action_type": "STOP", "target_file": null}));
        assert!(matches!(stop, Decision::Stop { .. }));
    }

    #[test]
    fn test_malformed_outputs_degrade_to_wait() {
        let cases = [
            "no json at all",
            "{\"action_type\": ",
            r#"{"target_file": "ch01", "assigned_agent": "narrator"}"#,
            r#"{"action_type": "dance", "target_file": "ch01", "assigned_agent": "narrator"}"#,
            r#"{"action_type": "generate", "assigned_agent": "narrator"}"#,
            r#"{"action_type": "generate", "target_file": "  ", "assigned_agent": "narrator"}"#,
            r#"{"action_type": "generate", "target_file": "ch01"}"#,
            r#"{"action_type": "generate", "target_file": "ch01", "assigned_agent": "architect"}"#,
            r#"{"action_type": 7}"#,
        ];
        for case in cases {
            assert_eq!(
                Decision::parse_lenient(case).action_type(),
                ActionType::Wait,
                "{case} should degrade to wait"
            );
        }
    }

    #[test]
    fn test_to_value_uses_wire_names() {
        let decision = Decision::dispatch(ActionType::Edit, Agent::Editor, "ch04", "check timeline");
        let value = decision.to_value();
        assert_eq!(value["action_type"], "edit");
        assert_eq!(value["assigned_agent"], "editor");
        assert_eq!(value["target_file"], "ch04");
        assert_eq!(Decision::from_value(&value), decision);
    }
}
