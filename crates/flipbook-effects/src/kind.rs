//! Built-in filter kinds.

use serde::{Deserialize, Serialize};

/// Filter selectable by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    #[default]
    Passthrough,
    WavePool,
    Plasma,
    EmInterference,
    Rgb,
    Lego,
    Chroma,
    Rave,
    MirrorTwo,
    MirrorFour,
    LightLeaks,
    Film,
    Grayscale,
    Manga,
    Toon,
    Off,
}

impl FilterKind {
    /// All kinds in menu order.
    pub const ALL: [FilterKind; 16] = [
        Self::Passthrough,
        Self::WavePool,
        Self::Plasma,
        Self::EmInterference,
        Self::Rgb,
        Self::Lego,
        Self::Chroma,
        Self::Rave,
        Self::MirrorTwo,
        Self::MirrorFour,
        Self::LightLeaks,
        Self::Film,
        Self::Grayscale,
        Self::Manga,
        Self::Toon,
        Self::Off,
    ];

    /// Logging key; `None` for [`FilterKind::Off`], which means filtering
    /// is disabled.
    pub fn key(self) -> Option<&'static str> {
        Some(match self {
            Self::Passthrough => "normal",
            Self::WavePool => "wave_pool",
            Self::Plasma => "plasma",
            Self::EmInterference => "em_interference",
            Self::Rgb => "rgb",
            Self::Lego => "lego",
            Self::Chroma => "chroma",
            Self::Rave => "rave",
            Self::MirrorTwo => "mirror_2",
            Self::MirrorFour => "mirror_4",
            Self::LightLeaks => "light_leaks",
            Self::Film => "film",
            Self::Grayscale => "grayscale",
            Self::Manga => "manga",
            Self::Toon => "toon",
            Self::Off => return None,
        })
    }

    /// Reverse of [`key`](Self::key).
    pub fn from_key(key: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.key() == Some(key))
    }

    /// Whether this kind changes the image at all.
    pub fn filter_applied(self) -> bool {
        !matches!(self, Self::Off | Self::Passthrough)
    }
}
