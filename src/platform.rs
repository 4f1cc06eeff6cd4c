use std::fmt;

/// Package manager family a distribution belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistroFamily {
    /// Debian, Ubuntu and derivatives (`apt-get`).
    Debian,
    /// Arch Linux and derivatives (`pacman`).
    Arch,
    /// Fedora (`dnf`).
    Fedora,
    /// Anything else; package installation is skipped.
    Unknown,
}

impl fmt::Display for DistroFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Debian => write!(f, "debian"),
            Self::Arch => write!(f, "arch"),
            Self::Fedora => write!(f, "fedora"),
            Self::Unknown => write!(f, "unknown"),
        }
    }
}

impl DistroFamily {
    fn from_id(id: &str) -> Self {
        match id {
            "debian" | "ubuntu" | "pop" | "linuxmint" => Self::Debian,
            "arch" | "endeavouros" | "manjaro" => Self::Arch,
            "fedora" => Self::Fedora,
            _ => Self::Unknown,
        }
    }
}

/// Platform information for the current system.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Platform {
    /// Distribution identifier used to look up per-distro package lists.
    pub distro: String,
    /// Package manager family of `distro`.
    pub family: DistroFamily,
}

impl Platform {
    /// Detect the current platform from `/etc/os-release`.
    #[must_use]
    pub fn detect() -> Self {
        std::fs::read_to_string("/etc/os-release").map_or_else(
            |_| Self::from_distro("unknown"),
            |content| Self::from_os_release(&content),
        )
    }

    /// Build a platform from an explicit distro identifier.
    #[must_use]
    pub fn from_distro(id: &str) -> Self {
        let distro = id.trim().to_ascii_lowercase();
        Self {
            family: DistroFamily::from_id(&distro),
            distro,
        }
    }

    /// Parse the contents of an `os-release` file.
    ///
    /// `ID` names the distro; when it is not a known family, the first known
    /// entry of `ID_LIKE` decides the family while `distro` keeps the `ID`.
    #[must_use]
    pub fn from_os_release(content: &str) -> Self {
        let mut id = None;
        let mut id_like = None;
        for line in content.lines() {
            if let Some((key, value)) = line.split_once('=') {
                let value = value.trim().trim_matches('"').trim_matches('\'');
                match key.trim() {
                    "ID" => id = Some(value.to_string()),
                    "ID_LIKE" => id_like = Some(value.to_string()),
                    _ => {}
                }
            }
        }

        let mut platform = Self::from_distro(id.as_deref().unwrap_or("unknown"));
        if platform.family == DistroFamily::Unknown
            && let Some(like) = id_like
        {
            platform.family = like
                .split_whitespace()
                .map(DistroFamily::from_id)
                .find(|f| *f != DistroFamily::Unknown)
                .unwrap_or(DistroFamily::Unknown);
        }
        platform
    }
}
