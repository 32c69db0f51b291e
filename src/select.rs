use std::{convert::Infallible, fmt, str::FromStr, sync::LazyLock};

use regex::Regex;
use serde::{Serialize, Serializer};

use crate::{
    error::{Error, Result},
    twitch::structs::{AUDIO_ONLY, Variant},
};

static RESOLUTION_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+x\d+$").expect("valid regex"));

/// Which variant a caller wants
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Quality {
    #[default]
    Best,
    /// Lowest video rendition, never the audio only one
    Worst,
    Audio,
    /// Exact `WIDTHxHEIGHT` match, falling back to [`Quality::Best`]
    Resolution(String),
}

impl FromStr for Quality {
    type Err = Infallible;

    /// Unrecognized input selects [`Quality::Best`]
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Ok(match s.to_ascii_lowercase().as_str() {
            "best" | "source" => Self::Best,
            "worst" => Self::Worst,
            "audio" | AUDIO_ONLY => Self::Audio,
            res if RESOLUTION_REGEX.is_match(res) => Self::Resolution(res.to_string()),
            _ => Self::Best,
        })
    }
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Best => f.write_str("best"),
            Self::Worst => f.write_str("worst"),
            Self::Audio => f.write_str("audio"),
            Self::Resolution(res) => f.write_str(res),
        }
    }
}

impl Serialize for Quality {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Picks a variant out of an upstream-ordered (best first) list
///
/// # Errors
/// - [`Error::NoVariants`] for an empty list, whatever the mode
/// - [`Error::InsufficientVariants`] for [`Quality::Worst`] with fewer than two
///   variants or no video rendition at all
/// - [`Error::NoAudioTrack`] for [`Quality::Audio`] without an audio only rendition
pub fn select_variant<'a>(variants: &'a [Variant], quality: &Quality) -> Result<&'a Variant> {
    let Some(best) = variants.first() else {
        return Err(Error::NoVariants);
    };

    match quality {
        Quality::Best => Ok(best),
        Quality::Worst => {
            if variants.len() < 2 {
                return Err(Error::InsufficientVariants {
                    available: variants.len(),
                });
            }
            variants
                .iter()
                .rev()
                .find(|v| !v.is_audio_only())
                .ok_or(Error::InsufficientVariants {
                    available: variants.len(),
                })
        }
        Quality::Audio => variants
            .iter()
            .find(|v| v.is_audio_only())
            .ok_or(Error::NoAudioTrack),
        Quality::Resolution(res) => Ok(variants
            .iter()
            .find(|v| &v.resolution == res)
            .unwrap_or(best)),
    }
}
