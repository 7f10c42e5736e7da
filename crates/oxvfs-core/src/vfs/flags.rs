use std::fmt;
use std::ops::BitOr;

/// What a [`FileHandle`](super::FileHandle) was opened for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    Read,
    Write,
}

impl fmt::Display for OpenMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OpenMode::Read => "read",
            OpenMode::Write => "write",
        })
    }
}

/// Open flags for [`FileSystem::open_with_flags`](super::FileSystem::open_with_flags).
///
/// `READ_ONLY` and `WRITE_ONLY` are mutually exclusive. `CREATE` creates the
/// file when it does not exist and implies write access.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenFlags(u8);

impl OpenFlags {
    pub const READ_ONLY: Self = Self(0b001);
    pub const WRITE_ONLY: Self = Self(0b010);
    pub const CREATE: Self = Self(0b100);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_write(self) -> bool {
        self.contains(Self::WRITE_ONLY) || self.contains(Self::CREATE)
    }
}

impl BitOr for OpenFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flag_combination() {
        let flags = OpenFlags::WRITE_ONLY | OpenFlags::CREATE;
        assert!(flags.contains(OpenFlags::CREATE));
        assert!(!flags.contains(OpenFlags::READ_ONLY));
        assert!(flags.is_write());
        assert!(!OpenFlags::READ_ONLY.is_write());
        assert!(!OpenFlags::empty().is_write());
    }
}
