//! Per-batch lookup options
//!
//! A [`TextureOptions`] bundle travels with every `texture` call. Scalar
//! knobs come from a process-wide default template built once; per-sample
//! knobs are [`VaryingRef`]s so a caller can broadcast a scalar or pass a
//! dense array interchangeably.

use once_cell::sync::Lazy;

use crate::formats::WrapMode;
use crate::varying::VaryingRef;

/// Canonical default values, constructed once per process
struct OptionDefaults {
    first_channel: usize,
    n_channels: usize,
    swrap: WrapMode,
    twrap: WrapMode,
    width: f32,
    blur: f32,
    bias: f32,
    fill: f32,
}

static DEFAULT_OPTIONS: Lazy<OptionDefaults> = Lazy::new(|| OptionDefaults {
    first_channel: 0,
    n_channels: 1,
    swrap: WrapMode::Default,
    twrap: WrapMode::Default,
    width: 1.0,
    blur: 0.0,
    bias: 0.0,
    fill: 0.0,
});

/// Options controlling one batch of texture lookups
pub struct TextureOptions<'a> {
    /// First file channel to read
    pub first_channel: usize,
    /// Number of output channels per sample
    pub n_channels: usize,
    /// Wrap mode in s; `Default` defers to the file, then `Black`
    pub swrap: WrapMode,
    /// Wrap mode in t
    pub twrap: WrapMode,
    /// Filter width multipliers on the s/t derivatives
    pub swidth: VaryingRef<'a, f32>,
    pub twidth: VaryingRef<'a, f32>,
    /// Additional blur added to the filter footprint
    pub sblur: VaryingRef<'a, f32>,
    pub tblur: VaryingRef<'a, f32>,
    /// MIP level bias
    pub bias: VaryingRef<'a, f32>,
    /// Value written to channels the file cannot supply
    pub fill: VaryingRef<'a, f32>,
    /// Optional per-sample alpha output
    pub alpha: Option<&'a mut [f32]>,
    /// Channels actually readable from the file; computed during batch
    /// hoisting, callers need not set it
    pub actual_channels: usize,
}

impl Default for TextureOptions<'_> {
    fn default() -> Self {
        let d = &*DEFAULT_OPTIONS;
        Self {
            first_channel: d.first_channel,
            n_channels: d.n_channels,
            swrap: d.swrap,
            twrap: d.twrap,
            swidth: VaryingRef::uniform(d.width),
            twidth: VaryingRef::uniform(d.width),
            sblur: VaryingRef::uniform(d.blur),
            tblur: VaryingRef::uniform(d.blur),
            bias: VaryingRef::uniform(d.bias),
            fill: VaryingRef::uniform(d.fill),
            alpha: None,
            actual_channels: 0,
        }
    }
}

impl std::fmt::Debug for TextureOptions<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TextureOptions")
            .field("first_channel", &self.first_channel)
            .field("n_channels", &self.n_channels)
            .field("swrap", &self.swrap)
            .field("twrap", &self.twrap)
            .field("alpha", &self.alpha.is_some())
            .finish_non_exhaustive()
    }
}
