//! Core type definitions for the converter
//!
//! These bit sets describe what a network rule applies to and which
//! document-level switches it carries. They are shared by the rule
//! parsers and by the output assembler.

// =============================================================================
// Content Types (bit mask for $script, $image, ... modifiers)
// =============================================================================

bitflags::bitflags! {
    /// Request content type mask.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ContentType: u16 {
        const IMAGE = 1 << 0;
        const STYLESHEET = 1 << 1;
        const SCRIPT = 1 << 2;
        const MEDIA = 1 << 3;
        const XMLHTTPREQUEST = 1 << 4;
        const OTHER = 1 << 5;
        const WEBSOCKET = 1 << 6;
        const FONT = 1 << 7;
        const DOCUMENT = 1 << 8;
        const SUBDOCUMENT = 1 << 9;  // iframe/frame
        const PING = 1 << 10;

        /// All content types
        const ALL = Self::IMAGE.bits()
            | Self::STYLESHEET.bits()
            | Self::SCRIPT.bits()
            | Self::MEDIA.bits()
            | Self::XMLHTTPREQUEST.bits()
            | Self::OTHER.bits()
            | Self::WEBSOCKET.bits()
            | Self::FONT.bits()
            | Self::DOCUMENT.bits()
            | Self::SUBDOCUMENT.bits()
            | Self::PING.bits();
    }
}

impl ContentType {
    /// Resolve a content-type modifier name (without `~`).
    pub fn from_modifier(name: &str) -> Option<Self> {
        match name {
            "script" => Some(Self::SCRIPT),
            "stylesheet" | "css" => Some(Self::STYLESHEET),
            "subdocument" | "frame" => Some(Self::SUBDOCUMENT),
            "image" => Some(Self::IMAGE),
            "xmlhttprequest" | "xhr" => Some(Self::XMLHTTPREQUEST),
            "media" => Some(Self::MEDIA),
            "font" => Some(Self::FONT),
            "websocket" => Some(Self::WEBSOCKET),
            "other" => Some(Self::OTHER),
            "ping" => Some(Self::PING),
            _ => None,
        }
    }
}

// =============================================================================
// Network Options (document-level switches)
// =============================================================================

bitflags::bitflags! {
    /// Options a network rule can enable or disable.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct NetworkOption: u16 {
        /// $elemhide / $ehide - disables cosmetic rules on the page
        const ELEMHIDE = 1 << 0;
        /// $generichide / $ghide - disables generic cosmetic rules
        const GENERICHIDE = 1 << 1;
        /// $genericblock - disables generic network rules
        const GENERICBLOCK = 1 << 2;
        /// $specifichide / $shide - disables domain-specific cosmetic rules
        const SPECIFICHIDE = 1 << 3;
        /// $jsinject - disables script injection
        const JSINJECT = 1 << 4;
        /// $urlblock - disables network blocking
        const URLBLOCK = 1 << 5;
        /// $content - disables HTML filtering
        const CONTENT = 1 << 6;
        /// $document / $doc
        const DOCUMENT = 1 << 7;
        /// $popup
        const POPUP = 1 << 8;

        /// Options that only make sense on exception (@@) rules
        const EXCEPTION_ONLY = Self::JSINJECT.bits()
            | Self::ELEMHIDE.bits()
            | Self::CONTENT.bits()
            | Self::URLBLOCK.bits()
            | Self::GENERICBLOCK.bits()
            | Self::GENERICHIDE.bits()
            | Self::SPECIFICHIDE.bits();
        /// Options that scope a rule to whole documents
        const DOCUMENT_LEVEL = Self::DOCUMENT.bits()
            | Self::POPUP.bits()
            | Self::EXCEPTION_ONLY.bits();
    }
}

impl NetworkOption {
    /// Resolve an option modifier name, including its short aliases.
    pub fn from_modifier(name: &str) -> Option<Self> {
        match name {
            "elemhide" | "ehide" => Some(Self::ELEMHIDE),
            "generichide" | "ghide" => Some(Self::GENERICHIDE),
            "genericblock" => Some(Self::GENERICBLOCK),
            "specifichide" | "shide" => Some(Self::SPECIFICHIDE),
            "jsinject" => Some(Self::JSINJECT),
            "urlblock" => Some(Self::URLBLOCK),
            "content" => Some(Self::CONTENT),
            "document" | "doc" => Some(Self::DOCUMENT),
            "popup" => Some(Self::POPUP),
            _ => None,
        }
    }
}

// =============================================================================
// Party Masks
// =============================================================================

bitflags::bitflags! {
    /// Party (first-party / third-party) check.
    ///
    /// An empty mask means the rule does not check the party at all.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct PartyMask: u8 {
        /// Matches first-party requests
        const FIRST_PARTY = 1 << 0;
        /// Matches third-party requests
        const THIRD_PARTY = 1 << 1;
    }
}

impl PartyMask {
    /// Resolve a party modifier into the mask it selects.
    pub fn from_modifier(name: &str) -> Option<Self> {
        match name {
            "third-party" | "~first-party" | "3p" | "~1p" => Some(Self::THIRD_PARTY),
            "~third-party" | "first-party" | "1p" | "~3p" => Some(Self::FIRST_PARTY),
            _ => None,
        }
    }
}

// =============================================================================
// Cosmetic Kinds
// =============================================================================

/// What a cosmetic rule does with its content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CosmeticKind {
    /// `##` family - hide elements matching a selector
    ElementHiding,
    /// `#$#` family - inject a style block
    CssInjection,
    /// `#%#` family - inject a script or scriptlet
    ScriptInjection,
}
