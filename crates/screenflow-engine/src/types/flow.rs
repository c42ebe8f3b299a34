//! Flow definition types — the admin-authored side of the contract.

use bitflags::bitflags;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

bitflags! {
    /// Visibility and triggerability bits on a [`ClientFlow`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FlowFlags: u32 {
        /// Listed in the admin area.
        const SHOWS_IN_ADMIN = 1 << 0;
        /// Created by an operator; slug is mutable. System flows keep
        /// this bit unset and their slugs are frozen.
        const CUSTOM = 1 << 1;
        const IOS_TRIGGERABLE = 1 << 2;
        const ANDROID_TRIGGERABLE = 1 << 3;
        const BROWSER_TRIGGERABLE = 1 << 4;
    }
}

// bitflags' serde feature exposes helpers rather than implementing the
// traits on generated types; delegate so the derives on `ClientFlow`
// and the stored rows work.
impl Serialize for FlowFlags {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        bitflags::serde::serialize(self, serializer)
    }
}

impl<'de> Deserialize<'de> for FlowFlags {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        bitflags::serde::deserialize(deserializer)
    }
}

impl FlowFlags {
    /// All three platform-triggerable bits.
    pub fn all_platforms() -> Self {
        Self::IOS_TRIGGERABLE | Self::ANDROID_TRIGGERABLE | Self::BROWSER_TRIGGERABLE
    }

    /// Whether this flow may be triggered from the given platform.
    pub fn triggerable_on(&self, platform: super::Platform) -> bool {
        let bit = match platform {
            super::Platform::Ios => Self::IOS_TRIGGERABLE,
            super::Platform::Android => Self::ANDROID_TRIGGERABLE,
            super::Platform::Browser => Self::BROWSER_TRIGGERABLE,
        };
        self.contains(bit)
    }
}

/// A named, ordered list of screens plus rules, triggered by slug.
///
/// **Invariant**: `slug` is globally unique. Once a trigger has
/// materialized `screens` into a user's queue, later edits to this
/// definition never retroactively alter queued entries — the queue
/// stores a frozen copy of each [`ClientFlowScreen`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ClientFlow {
    pub uid: String,
    /// Stable cross-environment trigger name.
    pub slug: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Contract for client-provided trigger parameters (OpenAPI-style).
    pub client_schema: Value,
    /// Contract for server-provided trigger parameters.
    pub server_schema: Value,
    /// `true`: triggering clears the user's queue first. `false`: the
    /// flow's screens are prepended in front of the existing queue.
    pub replaces: bool,
    pub screens: Vec<ClientFlowScreen>,
    /// Evaluated once at trigger time, in order, first match wins.
    #[serde(default)]
    pub rules: Vec<FlowRule>,
    pub flags: FlowFlags,
    pub created_at: DateTime<Utc>,
}

/// An unrealized screen descriptor inside a flow's `screens` list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ClientFlowScreen {
    /// References a `ClientScreen` by slug.
    pub slug: String,
    /// Admin-facing label for this instance within the flow.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Literal JSON object merged as the base of the realized parameters.
    pub fixed: Value,
    /// Ordered substitution directives applied on top of `fixed`.
    /// Later directives overwrite earlier ones at the same output path.
    #[serde(default)]
    pub variable: Vec<Substitution>,
    /// Flow slugs this screen may trigger on completion. `skip` is
    /// always implicitly allowed.
    #[serde(default)]
    pub allowed_triggers: Vec<String>,
    #[serde(default)]
    pub rules: ScreenRules,
}

/// Trigger-time and peek-time rule lists on a [`ClientFlowScreen`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ScreenRules {
    /// Checked once when the screen would be queued; a match removes it
    /// from the materialized list entirely.
    #[serde(default)]
    pub trigger: Vec<FlowRule>,
    /// Checked every time the screen is about to be shown; a match
    /// causes the `skip` flow to be triggered instead.
    #[serde(default)]
    pub peek: Vec<FlowRule>,
}

/// One substitution directive. Paths are object-key chains addressing
/// the merged client+server parameter namespace (inputs) or the realized
/// parameter accumulator (outputs).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum Substitution {
    /// Parse `{a.b.c}` placeholders out of `format`, resolve and
    /// stringify each, and write the result at `output_path`.
    StringFormat {
        format: String,
        output_path: Vec<String>,
    },
    /// Deep-copy the value at `input_path` to `output_path`.
    Copy {
        input_path: Vec<String>,
        output_path: Vec<String>,
    },
    /// Trigger time only: dereference the custom-format uid at
    /// `input_path`, deep-extract `extracted_path` from the backing
    /// object, and persist the result under `__extracted` for peek-time
    /// reuse.
    Extract {
        input_path: Vec<String>,
        extracted_path: Vec<String>,
        output_path: Vec<String>,
    },
}

impl Substitution {
    /// The path this directive writes in the realized parameters.
    pub fn output_path(&self) -> &[String] {
        match self {
            Self::StringFormat { output_path, .. }
            | Self::Copy { output_path, .. }
            | Self::Extract { output_path, .. } => output_path,
        }
    }
}

/// A `condition → effect` pair. The condition is a constraint set; every
/// constraint must hold for the rule to match.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FlowRule {
    pub condition: Vec<FieldConstraint>,
    pub effect: RuleEffect,
}

/// A single per-field constraint within a rule condition.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FieldConstraint {
    /// Context field name, e.g. `version` or `platform`.
    pub field: String,
    pub op: RuleOperator,
    /// Literal to compare the context field against.
    pub value: Value,
}

/// Comparison operators with SQL-null-like semantics: a null or absent
/// context field compares false under every operator except [`Ltn`],
/// which also matches null.
///
/// [`Ltn`]: RuleOperator::Ltn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleOperator {
    Eq,
    Neq,
    Gt,
    Gte,
    Lt,
    Lte,
    /// Less-than-or-null: matches when the context field is null/absent
    /// OR strictly less than the constraint value.
    Ltn,
    /// Case-insensitive SQL LIKE (`%` and `_` wildcards), text only.
    Like,
}

/// What happens when a rule matches.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum RuleEffect {
    /// Restart the trigger against `slug`, carrying or dropping each
    /// parameter tree per its policy.
    Replace {
        slug: String,
        client_parameters: ParamPolicy,
        server_parameters: ParamPolicy,
    },
    /// Shorthand for `replace("skip", omit, omit)`.
    Skip,
}

/// How a parameter tree crosses a flow replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParamPolicy {
    /// Reset to `{}`.
    Omit,
    /// Carried over unchanged.
    Copy,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Platform;
    use serde_json::json;

    #[test]
    fn flags_platform_gate() {
        let flags = FlowFlags::IOS_TRIGGERABLE | FlowFlags::BROWSER_TRIGGERABLE;
        assert!(flags.triggerable_on(Platform::Ios));
        assert!(!flags.triggerable_on(Platform::Android));
        assert!(flags.triggerable_on(Platform::Browser));
    }

    #[test]
    fn substitution_round_trips() {
        let sub = Substitution::Extract {
            input_path: vec!["journey".into()],
            extracted_path: vec!["video".into(), "url".into()],
            output_path: vec!["video".into()],
        };
        let encoded = serde_json::to_value(&sub).unwrap();
        assert_eq!(encoded["type"], "extract");
        let decoded: Substitution = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded.output_path(), &["video".to_string()]);
    }

    #[test]
    fn rule_effect_tagged_encoding() {
        let effect = RuleEffect::Replace {
            slug: "onboarding_v2".into(),
            client_parameters: ParamPolicy::Copy,
            server_parameters: ParamPolicy::Omit,
        };
        let v = serde_json::to_value(&effect).unwrap();
        assert_eq!(
            v,
            json!({
                "type": "replace",
                "slug": "onboarding_v2",
                "client_parameters": "copy",
                "server_parameters": "omit",
            })
        );
    }

    #[test]
    fn flow_flags_survive_serde_round_trip() {
        let flow = ClientFlow {
            uid: "flw_1".into(),
            slug: "onboarding".into(),
            name: "Onboarding".into(),
            description: None,
            client_schema: json!({"type": "object"}),
            server_schema: json!({"type": "object"}),
            replaces: false,
            screens: vec![],
            rules: vec![],
            flags: FlowFlags::SHOWS_IN_ADMIN | FlowFlags::IOS_TRIGGERABLE,
            created_at: chrono::Utc::now(),
        };
        let encoded = serde_json::to_value(&flow).unwrap();
        let decoded: ClientFlow = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded.flags, flow.flags);
        assert!(decoded.flags.triggerable_on(Platform::Ios));
        assert!(!decoded.flags.triggerable_on(Platform::Android));
    }
}
