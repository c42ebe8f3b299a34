//! Hard-coded system flows and screens.
//!
//! The error-handling strategy of the whole engine is to represent
//! every failure as another flow trigger, so the client always receives
//! a renderable screen. That only works if these slugs exist;
//! [`EngineBuilder::build`](crate::engine::EngineBuilder::build) seeds
//! any that are missing.

use chrono::Utc;
use serde_json::json;

use crate::types::{
    new_uid, ClientFlow, ClientFlowScreen, ClientScreen, FlowFlags, ScreenFlags, ScreenRules,
};

/// Flow slugs with special system meaning.
pub mod slugs {
    /// Triggered when a peek finds the queue empty.
    pub const EMPTY: &str = "empty";
    /// Triggered when the client cannot render the head; queues nothing
    /// so the dropped head is never re-added.
    pub const SKIP: &str = "skip";
    /// A screen attempted a trigger outside its `allowed_triggers`.
    pub const FORBIDDEN: &str = "forbidden";
    /// Referenced flow slug does not exist.
    pub const NOT_FOUND: &str = "not_found";
    /// Flow exists but is not triggerable for the requesting platform.
    pub const WRONG_PLATFORM: &str = "wrong_platform";
    /// Client's assumed queue head no longer matches server state.
    pub const DESYNC: &str = "desync";
    /// Trigger parameters failed the flow's schema contract.
    pub const ERROR_FLOW_SCHEMA: &str = "error_flow_schema";
    /// Realized parameters failed the screen's schema contract.
    pub const ERROR_SCREEN_SCHEMA: &str = "error_screen_schema";
    /// Flow references a screen slug that no longer exists.
    pub const ERROR_SCREEN_MISSING: &str = "error_screen_missing";
    /// Untrusted input attempted to populate a trusted-reference field.
    pub const ERROR_UNSAFE: &str = "error_unsafe";
    /// Trigger-embedded auth parameters invalid.
    pub const ERROR_BAD_AUTH: &str = "error_bad_auth";
    /// Catch-all, including replace-chain recursion overflow.
    pub const ERROR_CONTACT_SUPPORT: &str = "error_contact_support";

    /// Every slug above, in seeding order.
    pub const ALL: &[&str] = &[
        EMPTY,
        SKIP,
        FORBIDDEN,
        NOT_FOUND,
        WRONG_PLATFORM,
        DESYNC,
        ERROR_FLOW_SCHEMA,
        ERROR_SCREEN_SCHEMA,
        ERROR_SCREEN_MISSING,
        ERROR_UNSAFE,
        ERROR_BAD_AUTH,
        ERROR_CONTACT_SUPPORT,
    ];
}

/// Slug of the built-in fallback screen used by the system flows.
pub const FALLBACK_SCREEN_SLUG: &str = "fallback";

/// The built-in fallback screen: a header/body message renderable on
/// every platform, with no trusted-reference fields.
pub fn fallback_screen() -> ClientScreen {
    ClientScreen {
        uid: new_uid("cs"),
        slug: FALLBACK_SCREEN_SLUG.into(),
        name: "Fallback".into(),
        schema: json!({
            "type": "object",
            "required": ["header"],
            "properties": {
                "header": {"type": "string"},
                "body": {"type": "string", "nullable": true},
            }
        }),
        flags: ScreenFlags::all(),
    }
}

/// The system flow for `slug`, or `None` for non-system slugs.
pub fn system_flow(slug: &str) -> Option<ClientFlow> {
    let (replaces, screens) = match slug {
        // Drops the unrenderable head, re-adds nothing.
        slugs::SKIP => (false, vec![]),
        // A no-op signal; the follow-up peek returns the true head.
        slugs::DESYNC => (false, vec![]),
        // A rejected trigger must leave the queue exactly as it was, so
        // the rejection itself queues nothing.
        slugs::ERROR_UNSAFE => (false, vec![]),
        // Replaces the queue so the user is never stuck behind a
        // broken entry.
        slugs::EMPTY => (
            true,
            vec![message_screen("You're all caught up", None)],
        ),
        slugs::ERROR_CONTACT_SUPPORT => (
            true,
            vec![message_screen(
                "Something went wrong",
                Some("Please contact support if this keeps happening."),
            )],
        ),
        // Informational prepends: the rest of the queue survives.
        slugs::FORBIDDEN => (false, vec![message_screen("That action isn't available", None)]),
        slugs::NOT_FOUND => (false, vec![message_screen("That content wasn't found", None)]),
        slugs::WRONG_PLATFORM => (
            false,
            vec![message_screen("Not available on this device", None)],
        ),
        slugs::ERROR_FLOW_SCHEMA
        | slugs::ERROR_SCREEN_SCHEMA
        | slugs::ERROR_SCREEN_MISSING
        | slugs::ERROR_BAD_AUTH => (
            false,
            vec![message_screen("Something went wrong", None)],
        ),
        _ => return None,
    };

    Some(ClientFlow {
        uid: new_uid("cf"),
        slug: slug.to_string(),
        name: slug.to_string(),
        description: Some("System flow".into()),
        client_schema: json!({"type": "object"}),
        server_schema: json!({"type": "object"}),
        replaces,
        screens,
        rules: vec![],
        // Triggerable everywhere; not custom, so the slug is frozen.
        flags: FlowFlags::SHOWS_IN_ADMIN | FlowFlags::all_platforms(),
        created_at: Utc::now(),
    })
}

fn message_screen(header: &str, body: Option<&str>) -> ClientFlowScreen {
    let mut fixed = json!({"header": header});
    if let Some(body) = body {
        fixed["body"] = json!(body);
    }
    ClientFlowScreen {
        slug: FALLBACK_SCREEN_SLUG.into(),
        name: None,
        fixed,
        variable: vec![],
        allowed_triggers: vec![],
        rules: ScreenRules::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema;

    #[test]
    fn every_system_slug_has_a_flow() {
        for slug in slugs::ALL {
            let flow = system_flow(slug).unwrap_or_else(|| panic!("no flow for {slug}"));
            assert_eq!(flow.slug, *slug);
        }
        assert!(system_flow("custom_thing").is_none());
    }

    #[test]
    fn skip_queues_nothing() {
        let flow = system_flow(slugs::SKIP).unwrap();
        assert!(flow.screens.is_empty());
        assert!(!flow.replaces);
    }

    #[test]
    fn unsafe_rejection_queues_nothing() {
        let flow = system_flow(slugs::ERROR_UNSAFE).unwrap();
        assert!(flow.screens.is_empty());
        assert!(!flow.replaces);
    }

    #[test]
    fn empty_replaces_with_nonempty_screens() {
        let flow = system_flow(slugs::EMPTY).unwrap();
        assert!(flow.replaces);
        assert!(!flow.screens.is_empty());
    }

    #[test]
    fn system_screens_pass_the_fallback_schema() {
        let screen = fallback_screen();
        for slug in slugs::ALL {
            for fs in system_flow(slug).unwrap().screens {
                schema::validate(&screen.schema, &fs.fixed)
                    .unwrap_or_else(|e| panic!("{slug}: {e:?}"));
            }
        }
    }
}
