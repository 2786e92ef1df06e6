//! Transformation modes.
//!
//! A mode names the kind of edit that produced an artifact. It drives two
//! static tables: which modes export as before/after comparisons, and the
//! rank used to order the exported gallery.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Kind of AI edit applied to produce an artifact.
///
/// Stored as its camelCase name. Names this build does not know deserialize
/// to [`EditMode::Unrecognized`] instead of failing the whole snapshot, and
/// serialize back under the same name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EditMode {
    Freestyle,
    Edit,
    StyleTransfer,
    ActionFigure,
    CharacterSheet,
    Straighten,
    Diorama,
    Grid12x,
    Strip3x,
    Edge,
    Panel4x,
    Photorealistic,
    ComicPage,
    ComicSplash,
    ComicBookCover,
    Puppet,
    VideoGameCover,
    Bw,
    Pinup,
    MagHarpers,
    MagSyrens,
    MagJoxtrap,
    MagFreestyle,
    HorrorMoviePoster,
    FantasyMoviePoster,
    GothicArt,
    Watercolor,
    MtgCard,
    NonSportsCard,
    SportsCard,
    Illustration,
    AnimeManga,
    VintageBurlesquePostcard,
    VintagePostcard,
    SciFiMoviePoster,
    BadgePhoto,
    WantedPoster,
    AsSeenOnTv,
    VeoVideo,
    /// A stored name missing from the table, kept verbatim.
    Unrecognized(String),
}

/// Every known mode with its stored name.
const NAMES: &[(EditMode, &str)] = &[
    (EditMode::Freestyle, "freestyle"),
    (EditMode::Edit, "edit"),
    (EditMode::StyleTransfer, "styleTransfer"),
    (EditMode::ActionFigure, "actionFigure"),
    (EditMode::CharacterSheet, "characterSheet"),
    (EditMode::Straighten, "straighten"),
    (EditMode::Diorama, "diorama"),
    (EditMode::Grid12x, "grid12x"),
    (EditMode::Strip3x, "strip3x"),
    (EditMode::Edge, "edge"),
    (EditMode::Panel4x, "panel4x"),
    (EditMode::Photorealistic, "photorealistic"),
    (EditMode::ComicPage, "comicPage"),
    (EditMode::ComicSplash, "comicSplash"),
    (EditMode::ComicBookCover, "comicBookCover"),
    (EditMode::Puppet, "puppet"),
    (EditMode::VideoGameCover, "videoGameCover"),
    (EditMode::Bw, "bw"),
    (EditMode::Pinup, "pinup"),
    (EditMode::MagHarpers, "magHarpers"),
    (EditMode::MagSyrens, "magSyrens"),
    (EditMode::MagJoxtrap, "magJoxtrap"),
    (EditMode::MagFreestyle, "magFreestyle"),
    (EditMode::HorrorMoviePoster, "horrorMoviePoster"),
    (EditMode::FantasyMoviePoster, "fantasyMoviePoster"),
    (EditMode::GothicArt, "gothicArt"),
    (EditMode::Watercolor, "watercolor"),
    (EditMode::MtgCard, "mtgCard"),
    (EditMode::NonSportsCard, "nonSportsCard"),
    (EditMode::SportsCard, "sportsCard"),
    (EditMode::Illustration, "illustration"),
    (EditMode::AnimeManga, "animeManga"),
    (EditMode::VintageBurlesquePostcard, "vintageBurlesquePostcard"),
    (EditMode::VintagePostcard, "vintagePostcard"),
    (EditMode::SciFiMoviePoster, "sciFiMoviePoster"),
    (EditMode::BadgePhoto, "badgePhoto"),
    (EditMode::WantedPoster, "wantedPoster"),
    (EditMode::AsSeenOnTv, "asSeenOnTV"),
    (EditMode::VeoVideo, "veoVideo"),
];

/// Rank assigned to modes missing from the display-order table.
pub const UNRANKED: u32 = 99;

impl EditMode {
    pub fn as_str(&self) -> &str {
        if let EditMode::Unrecognized(name) = self {
            return name;
        }
        NAMES
            .iter()
            .find(|(mode, _)| mode == self)
            .map(|(_, name)| *name)
            .unwrap_or_default()
    }

    /// All modes a user can request.
    pub fn all() -> impl Iterator<Item = EditMode> {
        NAMES.iter().map(|(mode, _)| mode.clone())
    }

    /// Direct edits that export as a before/after slider.
    pub fn is_comparison(&self) -> bool {
        use EditMode::*;
        matches!(
            self,
            Freestyle
                | Edit
                | StyleTransfer
                | Straighten
                | Edge
                | CharacterSheet
                | ComicPage
                | ComicSplash
                | ComicBookCover
                | Illustration
                | AnimeManga
                | Watercolor
                | GothicArt
                | Pinup
                | Bw
                | Puppet
                | ActionFigure
                | Diorama
                | Photorealistic
        )
    }

    /// Position in the exported gallery; related modes share a decade.
    pub fn display_rank(&self) -> u32 {
        use EditMode::*;
        match self {
            Freestyle => 1,
            Edit => 2,
            StyleTransfer => 3,
            Straighten => 4,
            Edge => 5,
            CharacterSheet => 6,

            Grid12x => 10,
            Panel4x => 11,
            Strip3x => 12,
            Photorealistic => 13,

            ComicPage => 20,
            ComicSplash => 21,
            ComicBookCover => 22,

            HorrorMoviePoster => 30,
            FantasyMoviePoster => 31,
            SciFiMoviePoster => 32,
            WantedPoster => 33,

            MagHarpers => 40,
            MagSyrens => 41,
            MagJoxtrap => 42,
            MagFreestyle => 43,

            Illustration => 50,
            AnimeManga => 51,
            Watercolor => 52,
            GothicArt => 53,
            Pinup => 54,
            Bw => 55,

            MtgCard => 60,
            NonSportsCard => 61,
            SportsCard => 62,
            VideoGameCover => 63,
            VintageBurlesquePostcard => 64,
            VintagePostcard => 65,
            BadgePhoto => 66,
            AsSeenOnTv => 67,
            Puppet => 68,
            Diorama => 69,
            ActionFigure => 70,

            VeoVideo => 71,
            Unrecognized(_) => UNRANKED,
        }
    }

    /// Modes whose prompt needs a description of the source image.
    pub fn requires_description(&self) -> bool {
        matches!(self, EditMode::ActionFigure)
    }

    /// Modes that render video instead of an image for history.
    pub fn is_video(&self) -> bool {
        matches!(self, EditMode::VeoVideo)
    }
}

impl fmt::Display for EditMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for a mode name that is not in the table.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown edit mode: {0}")]
pub struct UnknownModeError(pub String);

impl FromStr for EditMode {
    type Err = UnknownModeError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        NAMES
            .iter()
            .find(|(_, name)| *name == s)
            .map(|(mode, _)| mode.clone())
            .ok_or_else(|| UnknownModeError(s.to_string()))
    }
}

impl From<String> for EditMode {
    fn from(s: String) -> Self {
        match s.parse() {
            Ok(mode) => mode,
            Err(UnknownModeError(name)) => EditMode::Unrecognized(name),
        }
    }
}

impl From<EditMode> for String {
    fn from(mode: EditMode) -> Self {
        match mode {
            EditMode::Unrecognized(name) => name,
            known => known.as_str().to_string(),
        }
    }
}
