//! Cosmetic rule marker scanner
//!
//! Locates the earliest cosmetic marker (`##`, `#@#`, `#$?#`, `$$`, ...) in a
//! line with a single left-to-right byte scan.

/// Cosmetic rule marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CosmeticMarker {
    /// `##`
    ElementHiding,
    /// `#@#`
    ElementHidingException,
    /// `#?#`
    ElementHidingExtended,
    /// `#@?#`
    ElementHidingExtendedException,
    /// `#$#`
    Css,
    /// `#@$#`
    CssException,
    /// `#$?#`
    CssExtended,
    /// `#@$?#`
    CssExtendedException,
    /// `#%#`
    Script,
    /// `#@%#`
    ScriptException,
    /// `$$`
    Html,
    /// `$@$`
    HtmlException,
}

impl CosmeticMarker {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ElementHiding => "##",
            Self::ElementHidingException => "#@#",
            Self::ElementHidingExtended => "#?#",
            Self::ElementHidingExtendedException => "#@?#",
            Self::Css => "#$#",
            Self::CssException => "#@$#",
            Self::CssExtended => "#$?#",
            Self::CssExtendedException => "#@$?#",
            Self::Script => "#%#",
            Self::ScriptException => "#@%#",
            Self::Html => "$$",
            Self::HtmlException => "$@$",
        }
    }

    /// Marker length in bytes.
    pub fn byte_len(self) -> usize {
        self.as_str().len()
    }

    pub fn is_exception(self) -> bool {
        matches!(
            self,
            Self::ElementHidingException
                | Self::ElementHidingExtendedException
                | Self::CssException
                | Self::CssExtendedException
                | Self::ScriptException
                | Self::HtmlException
        )
    }

    /// Marker explicitly requests the extended selector engine.
    pub fn is_extended(self) -> bool {
        matches!(
            self,
            Self::ElementHidingExtended
                | Self::ElementHidingExtendedException
                | Self::CssExtended
                | Self::CssExtendedException
        )
    }
}

/// Find the first cosmetic marker in `line`.
///
/// Returns the byte offset of the marker and its kind, or `None` if the line
/// is not a cosmetic rule. Lines starting with `|` or `@` are network rules
/// and are not scanned.
pub fn find_cosmetic_marker(line: &str) -> Option<(usize, CosmeticMarker)> {
    let bytes = line.as_bytes();
    if bytes.len() <= 2 {
        return None;
    }
    if bytes[0] == b'|' || bytes[0] == b'@' {
        return None;
    }

    let at = |i: usize| bytes.get(i).copied();

    for pos in 0..=bytes.len() - 2 {
        match bytes[pos] {
            b'#' => {
                let marker = match (at(pos + 1), at(pos + 2), at(pos + 3), at(pos + 4)) {
                    (Some(b'@'), Some(b'$'), Some(b'#'), _) => Some(CosmeticMarker::CssException),
                    (Some(b'@'), Some(b'$'), Some(b'?'), Some(b'#')) => {
                        Some(CosmeticMarker::CssExtendedException)
                    }
                    (Some(b'@'), Some(b'?'), Some(b'#'), _) => {
                        Some(CosmeticMarker::ElementHidingExtendedException)
                    }
                    (Some(b'@'), Some(b'%'), Some(b'#'), _) => Some(CosmeticMarker::ScriptException),
                    (Some(b'@'), Some(b'#'), _, _) => Some(CosmeticMarker::ElementHidingException),
                    (Some(b'$'), Some(b'?'), Some(b'#'), _) => Some(CosmeticMarker::CssExtended),
                    (Some(b'$'), Some(b'#'), _, _) => Some(CosmeticMarker::Css),
                    (Some(b'?'), Some(b'#'), _, _) => Some(CosmeticMarker::ElementHidingExtended),
                    (Some(b'%'), Some(b'#'), _, _) => Some(CosmeticMarker::Script),
                    (Some(b'#'), _, _, _) => Some(CosmeticMarker::ElementHiding),
                    _ => None,
                };
                if let Some(marker) = marker {
                    return Some((pos, marker));
                }
            }
            b'$' => match (at(pos + 1), at(pos + 2)) {
                (Some(b'@'), Some(b'$')) => return Some((pos, CosmeticMarker::HtmlException)),
                (Some(b'$'), _) => return Some((pos, CosmeticMarker::Html)),
                _ => {}
            },
            _ => {}
        }
    }

    None
}
