//! Screen definition types — the renderable side of the contract.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The platform a request originates from. Gates flow triggerability
/// and screen visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    Ios,
    Android,
    Browser,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ios => "ios",
            Self::Android => "android",
            Self::Browser => "browser",
        }
    }
}

bitflags! {
    /// Per-platform visibility bits on a [`ClientScreen`]. A screen
    /// excluded for the requesting platform behaves as if a peek rule
    /// matched: the head is skipped.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ScreenFlags: u32 {
        const SHOWS_ON_IOS = 1 << 0;
        const SHOWS_ON_ANDROID = 1 << 1;
        const SHOWS_ON_BROWSER = 1 << 2;
    }
}

impl Serialize for ScreenFlags {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        bitflags::serde::serialize(self, serializer)
    }
}

impl<'de> Deserialize<'de> for ScreenFlags {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        bitflags::serde::deserialize(deserializer)
    }
}

impl ScreenFlags {
    pub fn shows_on(&self, platform: Platform) -> bool {
        let bit = match platform {
            Platform::Ios => Self::SHOWS_ON_IOS,
            Platform::Android => Self::SHOWS_ON_ANDROID,
            Platform::Browser => Self::SHOWS_ON_BROWSER,
        };
        self.contains(bit)
    }
}

/// A single renderable client UI unit with a parameter schema.
///
/// The schema is an OpenAPI-style JSON schema over the realized
/// parameters. String fields may carry a custom `format` extension (see
/// [`CustomFormat`]) marking them as trusted references that are
/// dereferenced and exchanged for JWT-bearing objects at realization.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ClientScreen {
    pub uid: String,
    pub slug: String,
    pub name: String,
    pub schema: Value,
    pub flags: ScreenFlags,
}

/// String-format extensions designating trusted-reference fields.
///
/// A realized parameter whose schema declares one of these formats is
/// never delivered as a bare uid: realization exchanges it for an object
/// carrying a freshly minted JWT scoped to the referenced resource
/// (except [`FlowSlug`], which names a flow and mints nothing).
///
/// [`FlowSlug`]: CustomFormat::FlowSlug
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CustomFormat {
    ImageUid,
    ContentUid,
    JourneyUid,
    CourseUid,
    InteractivePromptUid,
    FlowSlug,
    JournalEntryUid,
}

impl CustomFormat {
    /// Parse a schema `format` value. Returns `None` for standard
    /// formats (`date-time`, `uri`, ...) which need no realization.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "image_uid" => Some(Self::ImageUid),
            "content_uid" => Some(Self::ContentUid),
            "journey_uid" => Some(Self::JourneyUid),
            "course_uid" => Some(Self::CourseUid),
            "interactive_prompt_uid" => Some(Self::InteractivePromptUid),
            "flow_slug" => Some(Self::FlowSlug),
            "journal_entry_uid" => Some(Self::JournalEntryUid),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::ImageUid => "image_uid",
            Self::ContentUid => "content_uid",
            Self::JourneyUid => "journey_uid",
            Self::CourseUid => "course_uid",
            Self::InteractivePromptUid => "interactive_prompt_uid",
            Self::FlowSlug => "flow_slug",
            Self::JournalEntryUid => "journal_entry_uid",
        }
    }

    /// JWT audience for tokens minted against this format.
    pub fn jwt_audience(&self) -> &'static str {
        match self {
            Self::ImageUid => "screenflow-image",
            Self::ContentUid => "screenflow-content",
            Self::JourneyUid => "screenflow-journey",
            Self::CourseUid => "screenflow-course",
            Self::InteractivePromptUid => "screenflow-prompt",
            Self::FlowSlug => "screenflow-flow",
            Self::JournalEntryUid => "screenflow-journal",
        }
    }

    /// Whether realization mints a JWT for this format. Flow slugs are
    /// plain names, not protected resources.
    pub fn mints_jwt(&self) -> bool {
        !matches!(self, Self::FlowSlug)
    }
}

/// An image resource with its available exports, as returned by the
/// image resolver. Realization selects one export for its thumbhash.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ImageRef {
    pub uid: String,
    pub exports: Vec<ImageExport>,
}

/// A single pre-rendered export of an image.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ImageExport {
    pub uid: String,
    pub width: u32,
    pub height: u32,
    /// Container format, e.g. `webp`, `png`, `jpeg`.
    pub format: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbhash: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_format_names_round_trip() {
        for format in [
            CustomFormat::ImageUid,
            CustomFormat::ContentUid,
            CustomFormat::JourneyUid,
            CustomFormat::CourseUid,
            CustomFormat::InteractivePromptUid,
            CustomFormat::FlowSlug,
            CustomFormat::JournalEntryUid,
        ] {
            assert_eq!(CustomFormat::from_name(format.name()), Some(format));
        }
        assert_eq!(CustomFormat::from_name("date-time"), None);
    }

    #[test]
    fn flow_slug_mints_no_jwt() {
        assert!(!CustomFormat::FlowSlug.mints_jwt());
        assert!(CustomFormat::ImageUid.mints_jwt());
    }

    #[test]
    fn screen_flags_gate_platforms() {
        let flags = ScreenFlags::SHOWS_ON_IOS | ScreenFlags::SHOWS_ON_ANDROID;
        assert!(flags.shows_on(Platform::Ios));
        assert!(!flags.shows_on(Platform::Browser));
    }

    #[test]
    fn screen_flags_survive_serde_round_trip() {
        let screen = ClientScreen {
            uid: "scr_1".into(),
            slug: "welcome".into(),
            name: "Welcome".into(),
            schema: serde_json::json!({"type": "object"}),
            flags: ScreenFlags::SHOWS_ON_IOS | ScreenFlags::SHOWS_ON_BROWSER,
        };
        let encoded = serde_json::to_value(&screen).unwrap();
        let decoded: ClientScreen = serde_json::from_value(encoded).unwrap();
        assert_eq!(decoded.flags, screen.flags);
    }
}
