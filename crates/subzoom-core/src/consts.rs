/// Minimum pixel count (w*h) of a downsampled region to use row-level Rayon parallelism.
pub const PARALLEL_PIXEL_THRESHOLD: usize = 65_536;

/// On-screen tile edge (logical pixels) above which the grid is split further.
pub const SLICE_THRESHOLD: u32 = 640;

/// Ratio of transformed content size to preview size under which tiles are skipped
/// and only the preview is painted.
pub const DISPLAY_SOURCE_THRESHOLD: f64 = 1.0;

/// Scale applied to the layout bounds when testing tile visibility.
/// Values above 1.0 prefetch tiles just outside the viewport.
pub const TILE_OVERLAP_SCALE: f64 = 1.0;

/// Pixel budget for a preview derived from the source decoder (1080x1920).
pub const PREVIEW_PIXEL_BUDGET: u64 = 1080 * 1920;

/// Default zoom limits.
pub const MIN_ZOOM_SCALE: f64 = 1.0;
pub const MAX_ZOOM_SCALE: f64 = 4.0;
pub const DOUBLE_TAP_ZOOM_SCALE: f64 = 2.0;

/// A double tap toggles back to default unless the scale is this close to 1.0.
pub const DEFAULT_SCALE_TOLERANCE: f64 = 0.05;

/// Upper bound of the per-batch zoom change reported by the gesture recognizer.
pub const MAX_ZOOM_CHANGE: f64 = 1.08;

/// Lower bound of the per-batch zoom change reported by the gesture recognizer.
pub const MIN_ZOOM_CHANGE: f64 = 1.0 / MAX_ZOOM_CHANGE;

/// Window of pointer history used to estimate release velocity.
pub const VELOCITY_WINDOW_MS: u64 = 100;

/// Spring stiffness for scale animations (medium-low).
pub const ZOOM_SPRING_STIFFNESS: f64 = 400.0;

/// Spring damping ratio for scale animations (no bounce).
pub const ZOOM_SPRING_DAMPING_RATIO: f64 = 1.0;

/// Scale difference under which the zoom spring is considered settled.
pub const ZOOM_SPRING_VISIBILITY_THRESHOLD: f64 = 0.001;

/// Spring stiffness for the recenter animation (low).
pub const CENTER_SPRING_STIFFNESS: f64 = 200.0;

/// Spring damping ratio for the recenter animation (low bouncy).
pub const CENTER_SPRING_DAMPING_RATIO: f64 = 0.75;

/// Translation difference under which the center spring is considered settled.
pub const CENTER_SPRING_VISIBILITY_THRESHOLD: f64 = 0.5;

/// Delay between a zoom gesture ending and the recenter animation starting.
pub const CENTER_ANIMATION_DELAY_MS: u64 = 300;

/// Exponential decay rate of fling velocity, per second.
pub const FLING_FRICTION: f64 = 4.2;

/// Fling velocity (px/s) under which the decay is considered settled.
pub const FLING_STOP_VELOCITY: f64 = 1.0;

/// Pan consumption below which a fling frame counts as blocked.
pub const FLING_MIN_CONSUMED: f64 = 1.0;

/// Per-axis unconsumed pan above which a fling is cancelled.
pub const FLING_UNCONSUMED_TOLERANCE: f64 = 0.5;

/// Pan smaller than this on the dominant axis is treated as refused by the recognizer.
pub const PAN_REFUSED_TOLERANCE: f64 = 0.5;

/// Default touch slop in logical pixels.
pub const DEFAULT_TOUCH_SLOP: f64 = 8.0;

/// Default double-tap timeout.
pub const DOUBLE_TAP_TIMEOUT_MS: u64 = 300;

/// Second taps landing sooner than this after the first up are ignored.
pub const DOUBLE_TAP_MIN_TIME_MS: u64 = 40;

/// Maximum distance between the two taps of a double tap.
pub const DOUBLE_TAP_SLOP: f64 = 100.0;

/// Default upper bound for fling velocity (px/s).
pub const MAX_FLING_VELOCITY: f64 = 8000.0;

/// ITU-R BT.601 luminance coefficient for the red channel.
pub const LUMINANCE_R: f32 = 0.299;

/// ITU-R BT.601 luminance coefficient for the green channel.
pub const LUMINANCE_G: f32 = 0.587;

/// ITU-R BT.601 luminance coefficient for the blue channel.
pub const LUMINANCE_B: f32 = 0.114;
