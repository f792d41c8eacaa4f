//! Engine tuning parameters.

// --- Simulated day ---

/// Minutes in a simulated day.
pub const MINUTES_PER_DAY: i64 = 24 * 60;

/// New games start at 06:00.
pub const START_OF_DAY_OFFSET_MINUTES: i64 = 6 * 60;

/// Minutes between weather re-evaluations.
pub const WEATHER_EVAL_STRIDE_MINUTES: i64 = 30;

/// Chance that persisting rain shifts the climate toward humid.
pub const RAIN_TO_HUMID_CHANCE: f64 = 0.05;

// --- Stamina / posture ---

/// Stamina regained per combat tick.
pub const STAMINA_REGEN_PER_TICK: i32 = 5;

/// Posture regained per combat tick.
pub const POSTURE_REGEN_PER_TICK: f64 = 10.0;

/// Stamina ratio below which the first accuracy penalty band applies.
pub const STAMINA_PENALTY_BAND_HIGH: f64 = 0.3;

/// Stamina ratio below which the severe accuracy penalty band applies.
pub const STAMINA_PENALTY_BAND_LOW: f64 = 0.1;

/// Ticks an entity stays staggered after a posture break.
pub const STAGGER_DURATION_TICKS: i32 = 2;

// --- Status effects ---

/// Bleed damage per tick per point of intensity.
pub const BLEED_DAMAGE_PER_INTENSITY: f64 = 1.0;

/// Burn damage per tick per point of intensity.
pub const BURN_DAMAGE_PER_INTENSITY: f64 = 1.5;

/// Stacked effect intensity cap.
pub const EFFECT_INTENSITY_CAP: f64 = 3.0;

/// Accuracy loss per point of concussion intensity (caps at 60%).
pub const CONCUSSED_ACCURACY_LOSS_PER_INTENSITY: f64 = 0.2;

/// Accuracy multiplier while staggered.
pub const STAGGERED_ACCURACY_MULT: f64 = 0.8;

// --- Hit resolution ---

/// Hit-quality score at or above which a hit grades critical.
pub const CRITICAL_SCORE_THRESHOLD: f64 = 0.85;

/// Hit-quality score at or below which a hit grades graze.
pub const GRAZE_SCORE_THRESHOLD: f64 = 0.25;

/// Posture damage as a fraction of move damage.
pub const POSTURE_DAMAGE_FACTOR: f64 = 0.8;

// --- Session defaults ---

/// Fallback enemy attack interval in simulated minutes.
pub const DEFAULT_ATTACK_INTERVAL_MINUTES: i64 = 3;

/// Extra stamina charged per additional target of an area attack.
pub const ATTACK_ALL_EXTRA_STAMINA_PER_TARGET: i32 = 5;

// --- Ambient / journal ---

/// Minimum simulated minutes between two ambient snippet emissions.
pub const AMBIENT_MIN_GAP_MINUTES: i64 = 8;

/// Minimum simulated minutes between ambient event polling passes.
pub const AMBIENT_EVENT_POLL_MINUTES: i64 = 5;

/// Journal history cap; oldest entries are evicted past this.
pub const JOURNAL_HISTORY_CAP: usize = 512;

// --- Player baseline ---

pub const PLAYER_MAX_STAMINA: i32 = 100;
pub const PLAYER_MAX_POSTURE: f64 = 100.0;
pub const PLAYER_WEAPON_HANDLING: f64 = 0.6;
pub const PLAYER_STAGGER_THRESHOLD: f64 = 0.3;
