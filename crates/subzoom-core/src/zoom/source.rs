use std::fmt;

/// Origin of a transform update.
///
/// Lower priority values win: a direct gesture preempts a double-tap animation,
/// which preempts recentering, which preempts fling.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GestureSource {
    Gesture,
    DoubleTap,
    AnimateCenter,
    Fling,
}

impl GestureSource {
    pub fn priority(&self) -> u8 {
        match self {
            Self::Gesture => 1,
            Self::DoubleTap => 2,
            Self::AnimateCenter => 3,
            Self::Fling => 4,
        }
    }

    /// True when `self` is allowed to interrupt an interaction driven by `other`.
    pub fn preempts(&self, other: GestureSource) -> bool {
        self.priority() < other.priority()
    }
}

impl fmt::Display for GestureSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Gesture => write!(f, "Gesture"),
            Self::DoubleTap => write!(f, "Double Tap"),
            Self::AnimateCenter => write!(f, "Animate Center"),
            Self::Fling => write!(f, "Fling"),
        }
    }
}
