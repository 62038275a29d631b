//! Host CPU architecture detection.

use std::fmt;

/// Binary variant matching the host CPU.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Architecture {
    /// 32- and 64-bit ARM hosts.
    Arm,
    /// Everything else, including unknown architectures.
    Amd,
}

impl Architecture {
    /// Detects the architecture this binary was compiled for.
    #[must_use]
    pub fn detect() -> Self {
        Self::from_machine(std::env::consts::ARCH)
    }

    /// Maps a machine name (`uname -m` or [`std::env::consts::ARCH`]) to a
    /// variant. Unknown names map to [`Architecture::Amd`].
    #[must_use]
    pub fn from_machine(machine: &str) -> Self {
        match machine.trim().to_ascii_lowercase().as_str() {
            "arm" | "arm64" | "aarch64" => Self::Arm,
            _ => Self::Amd,
        }
    }

    /// Short variant tag.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Arm => "arm",
            Self::Amd => "amd",
        }
    }

    /// Segment substituted for `{arch}` in download URLs.
    #[must_use]
    pub const fn download_tag(self) -> &'static str {
        match self {
            Self::Arm => "arm64",
            Self::Amd => "amd64",
        }
    }
}

impl fmt::Display for Architecture {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::Architecture;

    #[rstest]
    #[case("arm", Architecture::Arm)]
    #[case("arm64", Architecture::Arm)]
    #[case("aarch64", Architecture::Arm)]
    #[case("AARCH64", Architecture::Arm)]
    #[case("x86_64", Architecture::Amd)]
    #[case("riscv64", Architecture::Amd)]
    #[case("", Architecture::Amd)]
    fn machine_names_map_to_variants(#[case] machine: &str, #[case] expected: Architecture) {
        assert_eq!(Architecture::from_machine(machine), expected);
    }

    #[test]
    fn download_tags_are_64_bit_names() {
        assert_eq!(Architecture::Arm.download_tag(), "arm64");
        assert_eq!(Architecture::Amd.download_tag(), "amd64");
    }
}
