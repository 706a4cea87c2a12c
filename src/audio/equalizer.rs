//! Ten-band equalizer: band layout, presets, and the biquad math that runs on
//! the render thread.
//!
//! The control side ([`Equalizer`]) and the render side ([`FilterBank`]) share
//! one gain table. Writers replace the whole table under a mutex and bump a
//! version counter; the render side only looks at the table when the version
//! moved, and never blocks on the lock. Filter history is kept across
//! coefficient changes so gain moves do not click.

use std::f64::consts::PI;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::debug;

use crate::error::{EngineError, Result};

pub const BAND_COUNT: usize = 10;

/// Centre (or corner) frequency of each band in Hz.
pub const FREQUENCIES: [f32; BAND_COUNT] = [
    31.0, 62.0, 125.0, 250.0, 500.0, 1000.0, 2000.0, 4000.0, 8000.0, 16000.0,
];

pub const MIN_GAIN_DB: f32 = -12.0;
pub const MAX_GAIN_DB: f32 = 12.0;

pub const PEAKING_Q: f32 = 1.0;
pub const SHELF_Q: f32 = 0.7;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterKind {
    LowShelf,
    Peaking,
    HighShelf,
}

impl FilterKind {
    /// Role is fixed by position in the chain.
    pub fn for_band(index: usize) -> Self {
        match index {
            0 => Self::LowShelf,
            i if i == BAND_COUNT - 1 => Self::HighShelf,
            _ => Self::Peaking,
        }
    }

    pub fn q(self) -> f32 {
        match self {
            Self::Peaking => PEAKING_Q,
            Self::LowShelf | Self::HighShelf => SHELF_Q,
        }
    }
}

/// Snapshot of one band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EqualizerBand {
    pub frequency: f32,
    pub kind: FilterKind,
    pub q: f32,
    pub gain_db: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    Flat,
    Pop,
    Rock,
    Classical,
    Jazz,
    Vocal,
    Bass,
    Treble,
    Electronic,
}

impl Preset {
    pub const ALL: [Preset; 9] = [
        Preset::Flat,
        Preset::Pop,
        Preset::Rock,
        Preset::Classical,
        Preset::Jazz,
        Preset::Vocal,
        Preset::Bass,
        Preset::Treble,
        Preset::Electronic,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Preset::Flat => "flat",
            Preset::Pop => "pop",
            Preset::Rock => "rock",
            Preset::Classical => "classical",
            Preset::Jazz => "jazz",
            Preset::Vocal => "vocal",
            Preset::Bass => "bass",
            Preset::Treble => "treble",
            Preset::Electronic => "electronic",
        }
    }

    pub fn gains(self) -> [f32; BAND_COUNT] {
        match self {
            Preset::Flat => [0.0; BAND_COUNT],
            Preset::Pop => [1.0, 2.0, 3.0, 1.0, -1.0, -1.0, 1.0, 2.0, 3.0, 2.0],
            Preset::Rock => [3.0, 2.0, 1.0, 0.0, -1.0, 0.0, 1.0, 2.0, 3.0, 3.0],
            Preset::Classical => [2.0, 1.0, 0.0, 0.0, 0.0, 0.0, -1.0, -1.0, 0.0, 1.0],
            Preset::Jazz => [2.0, 1.0, 0.0, 1.0, 2.0, 1.0, 0.0, 1.0, 2.0, 2.0],
            Preset::Vocal => [0.0, -1.0, -2.0, -1.0, 1.0, 3.0, 3.0, 2.0, 1.0, 0.0],
            Preset::Bass => [4.0, 3.0, 2.0, 1.0, 0.0, -1.0, -2.0, -2.0, -1.0, 0.0],
            Preset::Treble => [0.0, -1.0, -2.0, -1.0, 0.0, 1.0, 2.0, 3.0, 4.0, 4.0],
            Preset::Electronic => [2.0, 3.0, 1.0, 0.0, -1.0, 1.0, 0.0, 1.0, 2.0, 3.0],
        }
    }
}

impl fmt::Display for Preset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Preset {
    type Err = EngineError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        Preset::ALL
            .into_iter()
            .find(|p| p.name().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| EngineError::UnknownPreset(s.to_string()))
    }
}

fn clamp_gain(db: f32) -> f32 {
    if db.is_nan() {
        0.0
    } else {
        db.clamp(MIN_GAIN_DB, MAX_GAIN_DB)
    }
}

struct Shared {
    gains: Mutex<[f32; BAND_COUNT]>,
    version: AtomicU64,
}

/// Control-side handle to the equalizer. Clones share the same bands.
#[derive(Clone)]
pub struct Equalizer {
    shared: Arc<Shared>,
}

impl Default for Equalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Equalizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Equalizer")
            .field("gains", &self.gains())
            .finish()
    }
}

impl Equalizer {
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                gains: Mutex::new([0.0; BAND_COUNT]),
                version: AtomicU64::new(0),
            }),
        }
    }

    fn table(&self) -> MutexGuard<'_, [f32; BAND_COUNT]> {
        self.shared
            .gains
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn publish(&self) {
        self.shared.version.fetch_add(1, Ordering::Release);
    }

    /// Set one band's gain, clamped to `[-12, 12]` dB.
    pub fn set_band_gain(&self, band: usize, gain_db: f32) -> Result<()> {
        if band >= BAND_COUNT {
            return Err(EngineError::InvalidBand(band));
        }
        self.table()[band] = clamp_gain(gain_db);
        self.publish();
        Ok(())
    }

    /// Gain of one band in dB; 0 for an index outside the chain.
    pub fn band_gain(&self, band: usize) -> f32 {
        self.table().get(band).copied().unwrap_or(0.0)
    }

    /// Replace every gain at once. The render side never sees a mix of old and new values.
    pub fn set_all_gains(&self, gains: &[f32]) -> Result<()> {
        if gains.len() != BAND_COUNT {
            return Err(EngineError::GainCount {
                expected: BAND_COUNT,
                got: gains.len(),
            });
        }
        self.write_table(gains);
        Ok(())
    }

    fn write_table(&self, gains: &[f32]) {
        {
            let mut table = self.table();
            for (slot, &g) in table.iter_mut().zip(gains) {
                *slot = clamp_gain(g);
            }
        }
        self.publish();
    }

    pub fn gains(&self) -> [f32; BAND_COUNT] {
        *self.table()
    }

    pub fn apply_preset(&self, preset: Preset) {
        debug!(preset = preset.name(), "applying equalizer preset");
        self.write_table(&preset.gains());
    }

    pub fn apply_preset_named(&self, name: &str) -> Result<()> {
        self.apply_preset(name.parse()?);
        Ok(())
    }

    pub fn preset_names() -> Vec<&'static str> {
        Preset::ALL.iter().map(|p| p.name()).collect()
    }

    /// Back to a flat response.
    pub fn reset(&self) {
        self.apply_preset(Preset::Flat);
    }

    pub fn bands(&self) -> [EqualizerBand; BAND_COUNT] {
        let gains = self.gains();
        std::array::from_fn(|i| {
            let kind = FilterKind::for_band(i);
            EqualizerBand {
                frequency: FREQUENCIES[i],
                kind,
                q: kind.q(),
                gain_db: gains[i],
            }
        })
    }

    /// Combined response of all ten bands at `freq`, in dB.
    pub fn response_db(&self, freq: f32, sample_rate: u32) -> f64 {
        let gains = self.gains();
        let magnitude: f64 = (0..BAND_COUNT)
            .map(|i| {
                let kind = FilterKind::for_band(i);
                Coefficients::design(kind, FREQUENCIES[i], kind.q(), gains[i], sample_rate)
                    .magnitude_at(freq, sample_rate)
            })
            .product();
        20.0 * magnitude.log10()
    }

    pub(crate) fn version(&self) -> u64 {
        self.shared.version.load(Ordering::Acquire)
    }

    /// Gains for the render thread, or `None` if a writer holds the table right now.
    pub(crate) fn try_snapshot(&self) -> Option<[f32; BAND_COUNT]> {
        match self.shared.gains.try_lock() {
            Ok(table) => Some(*table),
            Err(std::sync::TryLockError::Poisoned(p)) => Some(*p.into_inner()),
            Err(std::sync::TryLockError::WouldBlock) => None,
        }
    }
}

// Implemented following the RBJ Audio EQ Cookbook.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct Coefficients {
    b0: f32,
    b1: f32,
    b2: f32,
    a1: f32,
    a2: f32,
}

impl Coefficients {
    pub(crate) const IDENTITY: Coefficients = Coefficients {
        b0: 1.0,
        b1: 0.0,
        b2: 0.0,
        a1: 0.0,
        a2: 0.0,
    };

    pub(crate) fn design(kind: FilterKind, freq: f32, q: f32, gain_db: f32, sample_rate: u32) -> Self {
        let fs = sample_rate as f64;
        // Keep the corner below Nyquist for low sample rates.
        let f0 = (freq as f64).min(fs * 0.45);
        let a = 10f64.powf(gain_db as f64 / 40.0);
        let w0 = 2.0 * PI * f0 / fs;
        let (sin, cos) = w0.sin_cos();
        let alpha = sin / (2.0 * q as f64);

        let (b0, b1, b2, a0, a1, a2) = match kind {
            FilterKind::Peaking => (
                1.0 + alpha * a,
                -2.0 * cos,
                1.0 - alpha * a,
                1.0 + alpha / a,
                -2.0 * cos,
                1.0 - alpha / a,
            ),
            FilterKind::LowShelf => {
                let k = 2.0 * a.sqrt() * alpha;
                (
                    a * ((a + 1.0) - (a - 1.0) * cos + k),
                    2.0 * a * ((a - 1.0) - (a + 1.0) * cos),
                    a * ((a + 1.0) - (a - 1.0) * cos - k),
                    (a + 1.0) + (a - 1.0) * cos + k,
                    -2.0 * ((a - 1.0) + (a + 1.0) * cos),
                    (a + 1.0) + (a - 1.0) * cos - k,
                )
            }
            FilterKind::HighShelf => {
                let k = 2.0 * a.sqrt() * alpha;
                (
                    a * ((a + 1.0) + (a - 1.0) * cos + k),
                    -2.0 * a * ((a - 1.0) + (a + 1.0) * cos),
                    a * ((a + 1.0) + (a - 1.0) * cos - k),
                    (a + 1.0) - (a - 1.0) * cos + k,
                    2.0 * ((a - 1.0) - (a + 1.0) * cos),
                    (a + 1.0) - (a - 1.0) * cos - k,
                )
            }
        };

        Self {
            b0: (b0 / a0) as f32,
            b1: (b1 / a0) as f32,
            b2: (b2 / a0) as f32,
            a1: (a1 / a0) as f32,
            a2: (a2 / a0) as f32,
        }
    }

    /// Magnitude response at `freq`.
    pub(crate) fn magnitude_at(&self, freq: f32, sample_rate: u32) -> f64 {
        let w = 2.0 * PI * freq as f64 / sample_rate as f64;
        let (b0, b1, b2) = (self.b0 as f64, self.b1 as f64, self.b2 as f64);
        let (a1, a2) = (self.a1 as f64, self.a2 as f64);
        // H(e^jw) = (b0 + b1 e^-jw + b2 e^-2jw) / (1 + a1 e^-jw + a2 e^-2jw)
        let num_re = b0 + b1 * w.cos() + b2 * (2.0 * w).cos();
        let num_im = -(b1 * w.sin() + b2 * (2.0 * w).sin());
        let den_re = 1.0 + a1 * w.cos() + a2 * (2.0 * w).cos();
        let den_im = -(a1 * w.sin() + a2 * (2.0 * w).sin());
        (num_re.hypot(num_im)) / (den_re.hypot(den_im))
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct BiquadState {
    x_n1: f32,
    x_n2: f32,
    y_n1: f32,
    y_n2: f32,
}

impl BiquadState {
    #[inline]
    fn apply(&mut self, c: &Coefficients, x_n: f32) -> f32 {
        let y_n = c.b0 * x_n + c.b1 * self.x_n1 + c.b2 * self.x_n2
            - c.a1 * self.y_n1
            - c.a2 * self.y_n2;
        self.x_n2 = self.x_n1;
        self.x_n1 = x_n;
        self.y_n2 = self.y_n1;
        self.y_n1 = y_n;
        y_n
    }
}

/// Render-side filter chain for one stream: ten biquads in series per channel.
pub(crate) struct FilterBank {
    equalizer: Equalizer,
    sample_rate: u32,
    version: Option<u64>,
    coefficients: [Coefficients; BAND_COUNT],
    states: Vec<[BiquadState; BAND_COUNT]>,
}

impl FilterBank {
    pub(crate) fn new(equalizer: Equalizer, sample_rate: u32, channels: u16) -> Self {
        let mut bank = Self {
            equalizer,
            sample_rate: sample_rate.max(1),
            version: None,
            coefficients: [Coefficients::IDENTITY; BAND_COUNT],
            states: vec![[BiquadState::default(); BAND_COUNT]; channels.max(1) as usize],
        };
        bank.refresh();
        bank
    }

    /// Pick up new gains if the control side published some.
    #[inline]
    pub(crate) fn refresh(&mut self) {
        let version = self.equalizer.version();
        if self.version == Some(version) {
            return;
        }
        let Some(gains) = self.equalizer.try_snapshot() else {
            return;
        };
        for (i, c) in self.coefficients.iter_mut().enumerate() {
            let kind = FilterKind::for_band(i);
            *c = Coefficients::design(kind, FREQUENCIES[i], kind.q(), gains[i], self.sample_rate);
        }
        self.version = Some(version);
    }

    #[inline]
    pub(crate) fn process(&mut self, channel: usize, sample: f32) -> f32 {
        let Some(states) = self.states.get_mut(channel) else {
            return sample;
        };
        states
            .iter_mut()
            .zip(self.coefficients.iter())
            .fold(sample, |x, (state, c)| state.apply(c, x))
    }

    /// Forget filter history, used when audio starts flowing through the bank again.
    pub(crate) fn clear_history(&mut self) {
        for states in &mut self.states {
            *states = [BiquadState::default(); BAND_COUNT];
        }
    }

    #[cfg(test)]
    pub(crate) fn coefficients(&self) -> &[Coefficients; BAND_COUNT] {
        &self.coefficients
    }
}
