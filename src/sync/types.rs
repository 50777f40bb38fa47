//! Domain types for availability reconciliation
//!
//! Every media item is tracked twice: once for the standard release and once
//! for the 4K release. Instead of parallel `foo` / `foo_4k` fields the engine
//! works with [PerVariant], indexed by [Variant].

use std::fmt;
use std::ops::{Index, IndexMut};
use std::str::FromStr;

use anyhow::anyhow;
use serde::{Deserialize, Serialize};

/// Fidelity track of a media item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Variant {
    Standard,
    Enhanced,
}

impl Variant {
    pub const ALL: [Variant; 2] = [Variant::Standard, Variant::Enhanced];

    /// Whether this is the 4K track
    pub fn is_enhanced(self) -> bool {
        matches!(self, Variant::Enhanced)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Variant::Standard => "standard",
            Variant::Enhanced => "4k",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pair of values, one per [Variant].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PerVariant<T> {
    standard: T,
    enhanced: T,
}

impl<T> PerVariant<T> {
    pub fn new(standard: T, enhanced: T) -> Self {
        Self { standard, enhanced }
    }

    pub fn iter(&self) -> impl Iterator<Item = (Variant, &T)> {
        [
            (Variant::Standard, &self.standard),
            (Variant::Enhanced, &self.enhanced),
        ]
        .into_iter()
    }
}

impl<T> Index<Variant> for PerVariant<T> {
    type Output = T;

    fn index(&self, variant: Variant) -> &T {
        match variant {
            Variant::Standard => &self.standard,
            Variant::Enhanced => &self.enhanced,
        }
    }
}

impl<T> IndexMut<Variant> for PerVariant<T> {
    fn index_mut(&mut self, variant: Variant) -> &mut T {
        match variant {
            Variant::Standard => &mut self.standard,
            Variant::Enhanced => &mut self.enhanced,
        }
    }
}

/// Availability status of one variant of a media item or season.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaStatus {
    #[default]
    Unknown,
    Pending,
    Processing,
    PartiallyAvailable,
    Available,
    Deleted,
}

impl MediaStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaStatus::Unknown => "unknown",
            MediaStatus::Pending => "pending",
            MediaStatus::Processing => "processing",
            MediaStatus::PartiallyAvailable => "partially_available",
            MediaStatus::Available => "available",
            MediaStatus::Deleted => "deleted",
        }
    }

    /// Available or partially available; the only statuses this engine acts on.
    pub fn is_present(self) -> bool {
        matches!(
            self,
            MediaStatus::Available | MediaStatus::PartiallyAvailable
        )
    }

    /// Sinks for reconciliation. Only the acquisition pipeline revives these.
    pub fn is_terminal(self) -> bool {
        matches!(self, MediaStatus::Deleted | MediaStatus::Unknown)
    }
}

impl fmt::Display for MediaStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unknown" => Ok(MediaStatus::Unknown),
            "pending" => Ok(MediaStatus::Pending),
            "processing" => Ok(MediaStatus::Processing),
            "partially_available" => Ok(MediaStatus::PartiallyAvailable),
            "available" => Ok(MediaStatus::Available),
            "deleted" => Ok(MediaStatus::Deleted),
            other => Err(anyhow!("Unknown media status '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaKind {
    Movie,
    Series,
}

impl MediaKind {
    pub fn as_str(self) -> &'static str {
        match self {
            MediaKind::Movie => "movie",
            MediaKind::Series => "tv",
        }
    }
}

impl fmt::Display for MediaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "movie" => Ok(MediaKind::Movie),
            "tv" => Ok(MediaKind::Series),
            other => Err(anyhow!("Unknown media type '{}'", other)),
        }
    }
}

/// Identifiers tying a variant to its fulfillment service and media server entries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkFields {
    /// Configured fulfillment server the variant was sent to
    pub server_id: Option<i64>,
    /// Id of the movie/series inside that fulfillment server
    pub external_id: Option<i64>,
    pub slug: Option<String>,
    /// Media server rating key
    pub rating_key: Option<String>,
}

/// Linkage of one variant.
///
/// `Cleared` is only ever produced by reconciliation; a variant whose fields
/// were simply never filled in is `Linked` with empty [LinkFields].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Linkage {
    Linked(LinkFields),
    Cleared,
}

impl Default for Linkage {
    fn default() -> Self {
        Linkage::Linked(LinkFields::default())
    }
}

impl Linkage {
    pub fn fields(&self) -> Option<&LinkFields> {
        match self {
            Linkage::Linked(fields) => Some(fields),
            Linkage::Cleared => None,
        }
    }

    pub fn rating_key(&self) -> Option<&str> {
        self.fields().and_then(|f| f.rating_key.as_deref())
    }

    pub fn external_id(&self) -> Option<i64> {
        self.fields().and_then(|f| f.external_id)
    }

    pub fn is_cleared(&self) -> bool {
        matches!(self, Linkage::Cleared)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VariantState {
    pub status: MediaStatus,
    pub linkage: Linkage,
}

impl VariantState {
    pub fn new(status: MediaStatus, linkage: Linkage) -> Self {
        Self { status, linkage }
    }
}

/// A season of a series. Addressed by number within the parent's identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeasonRecord {
    pub id: i64,
    pub season_number: i32,
    pub status: PerVariant<MediaStatus>,
}

/// A persisted media item as seen by the sync engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaRecord {
    pub id: i64,
    pub kind: MediaKind,
    /// Catalog id, used for log context only
    pub tmdb_id: Option<i64>,
    pub variants: PerVariant<VariantState>,
    /// Ordered by season number; empty for movies
    pub seasons: Vec<SeasonRecord>,
}

impl MediaRecord {
    /// Eligibility filter: present in at least one variant.
    pub fn is_eligible(&self) -> bool {
        self.variants.iter().any(|(_, state)| state.status.is_present())
    }

    /// Whether the variant has anything reconciliation could still change,
    /// either on the parent or on one of its seasons.
    pub fn tracks(&self, variant: Variant) -> bool {
        self.variants[variant].status.is_present()
            || self
                .seasons
                .iter()
                .any(|season| season.status[variant].is_present())
    }

    pub fn rating_key(&self, variant: Variant) -> Option<&str> {
        self.variants[variant].linkage.rating_key()
    }

    pub fn external_id(&self, variant: Variant) -> Option<i64> {
        self.variants[variant].linkage.external_id()
    }
}
