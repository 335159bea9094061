//! Regime-tagged references to storage items.
//!
//! A [`ResourceLocator`] is the resolved form of an engine path. Its string
//! form is a URI that [`ResourceLocator::parse`] reads back unchanged:
//!
//! ```text
//! file:///games/demo/save/1.dat
//! content://<authority>/tree/<tree id>/document/<document id>
//! content://<authority>/<segment>/<segment>
//! ```

use std::fmt;
use std::path::PathBuf;

/// Canonical separator used by every locator.
pub const SEPARATOR: char = '/';

pub const SCHEME_FILE: &str = "file";
pub const SCHEME_CONTENT: &str = "content";

/// Storage regime a locator belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Regime {
    DirectFilesystem,
    PermissionedTree,
    OpaqueContent,
}

/// Root of a persisted document-tree grant.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TreeRoot {
    authority: String,
    tree_id: String,
}

impl TreeRoot {
    pub fn new(authority: impl Into<String>, tree_id: impl Into<String>) -> Self {
        Self {
            authority: authority.into(),
            tree_id: tree_id.into(),
        }
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    pub fn tree_id(&self) -> &str {
        &self.tree_id
    }

    /// Document id of `segments` below this tree.
    pub fn document_id(&self, segments: &[String]) -> String {
        if segments.is_empty() {
            return self.tree_id.clone();
        }
        let joined = segments.join("/");
        if self.tree_id.is_empty() || self.tree_id.ends_with(':') || self.tree_id.ends_with('/') {
            format!("{}{}", self.tree_id, joined)
        } else {
            format!("{}/{}", self.tree_id, joined)
        }
    }

    /// Inverse of [`TreeRoot::document_id`]; `None` when `document_id` lies
    /// outside the tree.
    pub fn segments_of(&self, document_id: &str) -> Option<Vec<String>> {
        let rest = document_id.strip_prefix(self.tree_id.as_str())?;
        let boundary = self.tree_id.is_empty()
            || self.tree_id.ends_with(':')
            || self.tree_id.ends_with('/')
            || rest.is_empty()
            || rest.starts_with('/');
        if !boundary {
            return None;
        }
        Some(split_segments(rest))
    }

    /// `content://<authority>/tree/<tree id>` form of the grant itself.
    pub fn tree_uri(&self) -> String {
        format!(
            "{}://{}/tree/{}",
            SCHEME_CONTENT,
            self.authority,
            encode_component(&self.tree_id)
        )
    }
}

/// Base a locator's segments hang from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LocatorBase {
    /// Host filesystem root; segments are absolute path components.
    Filesystem,
    /// Document tree; segments are relative to the tree id.
    Tree(TreeRoot),
    /// Opaque content provider; segments are the URI path.
    Content { authority: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResourceLocator {
    base: LocatorBase,
    segments: Vec<String>,
}

impl ResourceLocator {
    /// Direct-filesystem locator for an absolute or relative host path.
    pub fn filesystem(path: &str) -> Self {
        Self {
            base: LocatorBase::Filesystem,
            segments: split_segments(path),
        }
    }

    pub fn from_segments(base: LocatorBase, segments: Vec<String>) -> Self {
        debug_assert!(segments.iter().all(|s| !s.contains(SEPARATOR) && !s.is_empty()));
        Self { base, segments }
    }

    pub fn tree(root: TreeRoot, segments: Vec<String>) -> Self {
        Self::from_segments(LocatorBase::Tree(root), segments)
    }

    pub fn regime(&self) -> Regime {
        match self.base {
            LocatorBase::Filesystem => Regime::DirectFilesystem,
            LocatorBase::Tree(_) => Regime::PermissionedTree,
            LocatorBase::Content { .. } => Regime::OpaqueContent,
        }
    }

    pub fn base(&self) -> &LocatorBase {
        &self.base
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    /// Last segment, if any.
    pub fn name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Locator one level up; `None` at the base.
    pub fn parent(&self) -> Option<Self> {
        let (_, rest) = self.segments.split_last()?;
        Some(Self {
            base: self.base.clone(),
            segments: rest.to_vec(),
        })
    }

    pub fn child(&self, name: &str) -> Self {
        let mut segments = self.segments.clone();
        segments.extend(split_segments(name));
        Self {
            base: self.base.clone(),
            segments,
        }
    }

    /// Host path for direct-filesystem locators.
    pub fn file_path(&self) -> Option<PathBuf> {
        match self.base {
            LocatorBase::Filesystem => {
                Some(PathBuf::from(format!("/{}", self.segments.join("/"))))
            }
            _ => None,
        }
    }

    /// Provider document id for tree locators.
    pub fn document_id(&self) -> Option<String> {
        match &self.base {
            LocatorBase::Tree(root) => Some(root.document_id(&self.segments)),
            _ => None,
        }
    }

    /// Parse a `file://` or `content://` URI. Any other scheme, or a
    /// malformed URI, yields `None`.
    pub fn parse(uri: &str) -> Option<Self> {
        let (scheme, rest) = split_scheme(uri)?;
        if scheme.eq_ignore_ascii_case(SCHEME_FILE) {
            // file:///abs/path; an authority other than empty/localhost is not a local file
            let path_start = rest.find(SEPARATOR).unwrap_or(rest.len());
            let (authority, path) = rest.split_at(path_start);
            if !authority.is_empty() && authority != "localhost" {
                return None;
            }
            let decoded = decode_component(path)?;
            return Some(Self::filesystem(&decoded));
        }
        if !scheme.eq_ignore_ascii_case(SCHEME_CONTENT) {
            return None;
        }

        let mut parts = rest.split(SEPARATOR).filter(|p| !p.is_empty());
        let authority = parts.next()?.to_string();
        let raw: Vec<&str> = parts.collect();

        if raw.first() == Some(&"tree") {
            let tree_id = decode_component(raw.get(1)?)?;
            let root = TreeRoot::new(authority, tree_id);
            return match raw.len() {
                2 => Some(Self::tree(root, Vec::new())),
                4 if raw[2] == "document" => {
                    let document_id = decode_component(raw[3])?;
                    let segments = root.segments_of(&document_id)?;
                    Some(Self::tree(root, segments))
                }
                _ => None,
            };
        }

        let mut segments = Vec::with_capacity(raw.len());
        for part in raw {
            let decoded = decode_component(part)?;
            if decoded.is_empty() || decoded.contains(SEPARATOR) {
                return None;
            }
            segments.push(decoded);
        }
        Some(Self::from_segments(
            LocatorBase::Content { authority },
            segments,
        ))
    }
}

impl fmt::Display for ResourceLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.base {
            LocatorBase::Filesystem => {
                write!(f, "{}://", SCHEME_FILE)?;
                if self.segments.is_empty() {
                    return f.write_str("/");
                }
                for segment in &self.segments {
                    write!(f, "/{}", encode_path_component(segment))?;
                }
                Ok(())
            }
            LocatorBase::Tree(root) => {
                write!(f, "{}", root.tree_uri())?;
                write!(
                    f,
                    "/document/{}",
                    encode_component(&root.document_id(&self.segments))
                )
            }
            LocatorBase::Content { authority } => {
                write!(f, "{}://{}", SCHEME_CONTENT, authority)?;
                for segment in &self.segments {
                    write!(f, "/{}", encode_component(segment))?;
                }
                Ok(())
            }
        }
    }
}

/// Non-empty components of `path`, split on the canonical separator.
pub fn split_segments(path: &str) -> Vec<String> {
    path.split(SEPARATOR)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Split `scheme://rest`. Returns `None` when `s` carries no scheme.
pub fn split_scheme(s: &str) -> Option<(&str, &str)> {
    let idx = s.find("://")?;
    let scheme = &s[..idx];
    let mut chars = scheme.chars();
    let first = chars.next()?;
    if !first.is_ascii_alphabetic()
        || !chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
    {
        return None;
    }
    Some((scheme, &s[idx + 3..]))
}

fn is_unreserved(b: u8) -> bool {
    b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_' | b'.' | b'~' | b'!' | b'*' | b'\'' | b'(' | b')')
}

/// Percent-encode every byte outside the unreserved set.
pub fn encode_component(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for &b in s.as_bytes() {
        if is_unreserved(b) {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
    }
    out
}

fn encode_path_component(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for &b in s.as_bytes() {
        if is_unreserved(b) || matches!(b, b':' | b'@' | b'+' | b',' | b';' | b'=' | b'&' | b'$') {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
    }
    out
}

/// Decode `%XX` escapes; `None` on a truncated escape or invalid UTF-8.
pub fn decode_component(s: &str) -> Option<String> {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = s.get(i + 1..i + 3)?;
            out.push(u8::from_str_radix(hex, 16).ok()?);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    String::from_utf8(out).ok()
}
