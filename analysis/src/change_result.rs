use core::fmt;

/// Whether an update to some analysis state actually modified it.
///
/// The propagation driver uses this to decide when the users of a value must be revisited, and
/// when the fixed point has been reached. Combines like a boolean, with `Changed` as `true`.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ChangeResult {
    Unchanged,
    Changed,
}

impl ChangeResult {
    #[inline]
    pub const fn changed(&self) -> bool {
        matches!(self, Self::Changed)
    }

    /// Compare `old` and `new`, returning `Changed` if they differ
    #[inline]
    pub fn of<T: PartialEq>(old: &T, new: &T) -> Self {
        if old == new {
            Self::Unchanged
        } else {
            Self::Changed
        }
    }
}

impl fmt::Display for ChangeResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Changed => "changed",
            Self::Unchanged => "unchanged",
        })
    }
}

impl core::ops::BitOr for ChangeResult {
    type Output = ChangeResult;

    #[inline]
    fn bitor(self, rhs: Self) -> Self::Output {
        if self.changed() { self } else { rhs }
    }
}

impl core::ops::BitOrAssign for ChangeResult {
    #[inline]
    fn bitor_assign(&mut self, rhs: Self) {
        *self = *self | rhs;
    }
}

impl From<bool> for ChangeResult {
    #[inline]
    fn from(changed: bool) -> Self {
        if changed {
            Self::Changed
        } else {
            Self::Unchanged
        }
    }
}

impl From<ChangeResult> for bool {
    #[inline]
    fn from(value: ChangeResult) -> Self {
        value.changed()
    }
}
