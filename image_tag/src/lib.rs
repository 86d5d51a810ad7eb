//! Docker tag and image reference types based on the tag grammar of
//! [reference.go](https://github.com/distribution/distribution/blob/v2.7.1/reference/reference.go):
//!
//! ```txt
//! reference := name [ ":" tag ]
//! tag       := /[\w][\w.-]{0,127}/
//! ```
//!
//! The docker CLI documents the same rule as: "A tag name must be valid ASCII and may contain
//! lowercase and uppercase letters, digits, underscores, periods and dashes. A tag name may not
//! start with a period or a dash and may contain a maximum of 128 characters."
//!
//! Values derived from git and CI state rarely satisfy that grammar, so the main entry point is
//! [`sanitize`], which maps any string onto a valid [`Tag`].

use std::{borrow::Cow, str::FromStr, sync::LazyLock};

#[cfg(feature = "serde")]
use ::serde::{Deserialize, Deserializer, Serialize, Serializer};
use regex::Regex;

/// The maximum length of a tag in bytes.
pub const MAX_TAG_LEN: usize = 128;

/// The tag used when sanitization is left with nothing.
pub const LATEST: &str = "latest";

const REGISTRY_SUFFIX: char = '/';
const TAG_PREFIX: char = ':';

#[derive(Debug, PartialEq, Eq)]
pub struct InvalidTag(String);

impl std::error::Error for InvalidTag {}

impl std::fmt::Display for InvalidTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid docker tag: {:?}", self.0)
    }
}

static TAG_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_][A-Za-z0-9_.-]{0,127}$").unwrap());

static DISALLOWED_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9_.\-]").unwrap());

/// Returns true if `value` satisfies the docker tag grammar.
pub fn is_valid_tag(value: &str) -> bool {
    TAG_REGEX.is_match(value)
}

/// Maps an arbitrary string onto a valid docker tag.
///
/// Every character outside `[A-Za-z0-9_.-]` becomes `_`. An empty result becomes [`LATEST`]. A
/// result starting with `.` or `-` gets a `_` prepended. Finally the result is cut to
/// [`MAX_TAG_LEN`] bytes. The replacement leaves only ASCII behind, so the cut never splits a
/// character.
///
/// Sanitizing an already sanitized value returns it unchanged.
pub fn sanitize(value: &str) -> Tag {
    let replaced = DISALLOWED_REGEX.replace_all(value, "_");
    if replaced.is_empty() {
        return Tag(LATEST.to_owned());
    }

    let mut tag = String::with_capacity(replaced.len() + 1);
    if replaced.starts_with(['.', '-']) {
        tag.push('_');
    }
    tag.push_str(&replaced);
    tag.truncate(MAX_TAG_LEN);

    debug_assert!(is_valid_tag(&tag), "sanitize produced invalid tag {tag:?}");
    Tag(tag)
}

/// Truncates `value` to at most `max_len` bytes without splitting a character.
pub fn truncate_str(value: &str, max_len: usize) -> &str {
    if value.len() <= max_len {
        return value;
    }
    let mut end = max_len;
    while !value.is_char_boundary(end) {
        end -= 1;
    }
    &value[..end]
}

/// A string that satisfies the docker tag grammar.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Tag(String);

impl Tag {
    /// Validates `value` without modifying it. Use [`sanitize`] to coerce arbitrary input.
    pub fn new(value: String) -> Result<Self, InvalidTag> {
        if is_valid_tag(&value) {
            Ok(Self(value))
        } else {
            Err(InvalidTag(value))
        }
    }

    pub fn latest() -> Self {
        Self(LATEST.to_owned())
    }

    pub fn is_latest(&self) -> bool {
        self.0 == LATEST
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl ::core::ops::Deref for Tag {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<str> for Tag {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::fmt::Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for Tag {
    type Err = InvalidTag;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_owned())
    }
}

impl TryFrom<String> for Tag {
    type Error = InvalidTag;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Tag> for String {
    fn from(value: Tag) -> Self {
        value.0
    }
}

#[cfg(feature = "serde")]
impl Serialize for Tag {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&self.0)
    }
}

#[cfg(feature = "serde")]
impl<'de> Deserialize<'de> for Tag {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Self::new(Deserialize::deserialize(deserializer)?).map_err(::serde::de::Error::custom)
    }
}

/// An image reference written as `<registry>/<repository>:<tag>`. The `<registry>/` section is
/// left out entirely when the registry is empty, which yields a reference to a local image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference<'a> {
    registry: Cow<'a, str>,
    repository: Cow<'a, str>,
    tag: Tag,
}

impl<'a> ImageReference<'a> {
    pub fn new(
        registry: impl Into<Cow<'a, str>>,
        repository: impl Into<Cow<'a, str>>,
        tag: Tag,
    ) -> Self {
        Self {
            registry: registry.into(),
            repository: repository.into(),
            tag,
        }
    }

    /// Returns the registry host, or `None` if the reference is unqualified.
    pub fn registry(&self) -> Option<&str> {
        (!self.registry.is_empty()).then_some(&*self.registry)
    }

    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn tag(&self) -> &Tag {
        &self.tag
    }

    /// Returns a copy of this reference pointing at a different tag.
    pub fn with_tag(&self, tag: Tag) -> Self {
        Self {
            registry: self.registry.clone(),
            repository: self.repository.clone(),
            tag,
        }
    }
}

impl std::fmt::Display for ImageReference<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        use std::fmt::Write;

        if let Some(registry) = self.registry() {
            f.write_str(registry)?;
            f.write_char(REGISTRY_SUFFIX)?;
        }
        f.write_str(&self.repository)?;
        f.write_char(TAG_PREFIX)?;
        f.write_str(&self.tag)
    }
}

/// Formats `<registry>/<repository>:<tag>`, omitting `<registry>/` when `registry` is empty.
pub fn image_reference(registry: &str, repository: &str, tag: &Tag) -> String {
    ImageReference::new(registry, repository, tag.clone()).to_string()
}
