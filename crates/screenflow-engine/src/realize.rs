//! Screen realization: turning a queued entry into a client-renderable
//! screen object.
//!
//! Realization is peek-time work. It never dereferences trusted uids —
//! that happened at trigger time — but it does mint fresh JWTs for
//! every custom-format field on every peek, so delivered tokens are
//! always within their short lifetime.

use std::sync::Arc;

use serde_json::{json, Value};

use crate::errors::{EngineError, ParamError};
use crate::params;
use crate::rules::{self, RuleContext};
use crate::schema;
use crate::traits::{JwtIssuer, ResourceResolver, ScreenStore};
use crate::types::{
    CustomFormat, ImageExport, ImageRef, Platform, RealizedScreen, UserClientScreen,
};

/// Non-fault outcomes of a realization attempt. The engine maps each to
/// a system flow trigger; only [`Fault`](RealizeSignal::Fault)
/// propagates to the caller.
#[derive(Debug)]
pub enum RealizeSignal {
    /// Peek rule matched or the platform excludes this screen — the
    /// caller drops the head and triggers `skip`.
    Skip,
    /// The screen definition or a backing resource no longer exists.
    ScreenMissing,
    /// Realized parameters failed the screen schema.
    SchemaInvalid(Vec<String>),
    /// Parameter resolution failed.
    Param(ParamError),
    /// Transport-level fault.
    Fault(EngineError),
}

impl From<ParamError> for RealizeSignal {
    fn from(e: ParamError) -> Self {
        Self::Param(e)
    }
}

/// Realizes queued entries against the screen store and resolvers.
pub struct ScreenRealizer {
    screens: Arc<dyn ScreenStore>,
    resources: Arc<dyn ResourceResolver>,
    jwt: Arc<dyn JwtIssuer>,
    /// When false, schema validation of realized parameters is skipped
    /// (debug-skippable for performance).
    validate_realized: bool,
    jwt_ttl: chrono::Duration,
}

impl ScreenRealizer {
    pub fn new(
        screens: Arc<dyn ScreenStore>,
        resources: Arc<dyn ResourceResolver>,
        jwt: Arc<dyn JwtIssuer>,
        validate_realized: bool,
        jwt_ttl: chrono::Duration,
    ) -> Self {
        Self {
            screens,
            resources,
            jwt,
            validate_realized,
            jwt_ttl,
        }
    }

    /// Realize a queued entry for the requesting platform.
    pub async fn realize(
        &self,
        entry: &UserClientScreen,
        ctx: &RuleContext,
        platform: Platform,
    ) -> Result<RealizedScreen, RealizeSignal> {
        // Peek rules are re-evaluated on every peek, never memoized.
        if rules::evaluate(&entry.screen.rules.peek, ctx).is_some() {
            return Err(RealizeSignal::Skip);
        }

        let screen = self
            .screens
            .get_screen(&entry.screen.slug)
            .await
            .map_err(|e| RealizeSignal::Fault(e.into()))?
            .ok_or(RealizeSignal::ScreenMissing)?;

        if !screen.flags.shows_on(platform) {
            return Err(RealizeSignal::Skip);
        }

        let mut parameters = params::resolve_for_peek(
            &entry.screen,
            &entry.flow_client_parameters,
            &entry.flow_server_parameters,
        )?;

        if self.validate_realized {
            if let Err(errors) = schema::validate(&screen.schema, &parameters) {
                return Err(RealizeSignal::SchemaInvalid(errors));
            }
        }

        for (path, format) in schema::custom_format_paths(&screen.schema) {
            let Some(value) = params::get_path(&parameters, &path) else {
                continue;
            };
            // Already an object: resolved by extraction, leave as-is.
            let Some(uid) = value.as_str().map(str::to_string) else {
                continue;
            };
            if !format.mints_jwt() {
                continue; // flow_slug stays a plain name
            }
            let node = schema::schema_at(&screen.schema, &path);
            let reference = self.mint_reference(format, &uid, node).await?;
            params::set_path(&mut parameters, &path, reference);
        }

        Ok(RealizedScreen {
            uid: entry.uid.clone(),
            slug: screen.slug,
            parameters,
        })
    }

    /// Exchange a bare uid for a JWT-bearing reference object.
    async fn mint_reference(
        &self,
        format: CustomFormat,
        uid: &str,
        schema_node: Option<&Value>,
    ) -> Result<Value, RealizeSignal> {
        let resolved = self
            .resources
            .resolve(format, uid)
            .await
            .map_err(|e| RealizeSignal::Fault(e.into()))?
            .ok_or(RealizeSignal::ScreenMissing)?;

        let jwt = self
            .jwt
            .issue(format.jwt_audience(), uid, self.jwt_ttl)
            .map_err(|e| RealizeSignal::Fault(e.into()))?;

        let mut reference = json!({"uid": uid, "jwt": jwt});
        if format == CustomFormat::ImageUid {
            if let Ok(image) = serde_json::from_value::<ImageRef>(resolved) {
                let want = wanted_size(schema_node);
                if let Some(export) = choose_export(&image.exports, want) {
                    reference["thumbhash"] = export
                        .thumbhash
                        .clone()
                        .map(Value::String)
                        .unwrap_or(Value::Null);
                }
            }
        }
        Ok(reference)
    }
}

/// Optional `x-size: {width, height}` hint on an image field's schema.
fn wanted_size(schema_node: Option<&Value>) -> Option<(u32, u32)> {
    let size = schema_node?.get("x-size")?;
    let w = size.get("width")?.as_u64()? as u32;
    let h = size.get("height")?.as_u64()? as u32;
    Some((w, h))
}

/// Preference rank for image container formats; lower is better.
fn format_rank(format: &str) -> u8 {
    match format {
        "webp" => 0,
        "png" => 1,
        "jpeg" | "jpg" => 2,
        _ => 3,
    }
}

/// Select the export whose thumbhash accompanies an image reference:
/// minimize aspect-ratio deviation, then area deviation, then prefer
/// better formats, tie-break by uid ascending. Without a size hint the
/// largest export in the best format wins.
pub fn choose_export(exports: &[ImageExport], want: Option<(u32, u32)>) -> Option<&ImageExport> {
    match want {
        Some((w, h)) => {
            let want_aspect = f64::from(w) / f64::from(h.max(1));
            let want_area = f64::from(w) * f64::from(h);
            exports.iter().min_by(|a, b| {
                let aspect = |e: &ImageExport| {
                    (f64::from(e.width) / f64::from(e.height.max(1)) - want_aspect).abs()
                };
                let area =
                    |e: &ImageExport| (f64::from(e.width) * f64::from(e.height) - want_area).abs();
                aspect(a)
                    .total_cmp(&aspect(b))
                    .then_with(|| area(a).total_cmp(&area(b)))
                    .then_with(|| format_rank(&a.format).cmp(&format_rank(&b.format)))
                    .then_with(|| a.uid.cmp(&b.uid))
            })
        }
        None => exports.iter().min_by(|a, b| {
            // u64 area: u32 * u32 can overflow.
            let area = |e: &ImageExport| u64::from(e.width) * u64::from(e.height);
            format_rank(&a.format)
                .cmp(&format_rank(&b.format))
                .then_with(|| area(b).cmp(&area(a)))
                .then_with(|| a.uid.cmp(&b.uid))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn export(uid: &str, width: u32, height: u32, format: &str) -> ImageExport {
        ImageExport {
            uid: uid.into(),
            width,
            height,
            format: format.into(),
            thumbhash: Some(format!("th_{uid}")),
        }
    }

    #[test]
    fn aspect_ratio_dominates_selection() {
        let exports = vec![
            export("ie_wide", 1600, 900, "jpeg"),
            export("ie_square", 1000, 1000, "webp"),
        ];
        // Want 16:9 — the jpeg wins despite the worse format.
        let chosen = choose_export(&exports, Some((1920, 1080))).unwrap();
        assert_eq!(chosen.uid, "ie_wide");
    }

    #[test]
    fn area_breaks_aspect_ties() {
        let exports = vec![
            export("ie_small", 160, 90, "webp"),
            export("ie_big", 1600, 900, "webp"),
        ];
        let chosen = choose_export(&exports, Some((1920, 1080))).unwrap();
        assert_eq!(chosen.uid, "ie_big");
    }

    #[test]
    fn format_then_uid_break_remaining_ties() {
        let exports = vec![
            export("ie_b", 100, 100, "jpeg"),
            export("ie_a", 100, 100, "jpeg"),
            export("ie_c", 100, 100, "webp"),
        ];
        let chosen = choose_export(&exports, Some((100, 100))).unwrap();
        assert_eq!(chosen.uid, "ie_c", "webp preferred");

        let no_webp = &exports[..2];
        let chosen = choose_export(no_webp, Some((100, 100))).unwrap();
        assert_eq!(chosen.uid, "ie_a", "uid ascending");
    }

    #[test]
    fn no_hint_prefers_best_format_then_largest() {
        let exports = vec![
            export("ie_huge_jpeg", 4000, 4000, "jpeg"),
            export("ie_webp", 1000, 1000, "webp"),
        ];
        let chosen = choose_export(&exports, None).unwrap();
        assert_eq!(chosen.uid, "ie_webp");
    }

    #[test]
    fn huge_exports_compare_without_overflow() {
        // width * height exceeds u32::MAX for both candidates.
        let exports = vec![
            export("ie_big", 100_000, 100_000, "webp"),
            export("ie_bigger", 200_000, 200_000, "webp"),
        ];
        let chosen = choose_export(&exports, None).unwrap();
        assert_eq!(chosen.uid, "ie_bigger");
    }

    #[test]
    fn empty_exports_selects_nothing() {
        assert!(choose_export(&[], Some((10, 10))).is_none());
    }
}
