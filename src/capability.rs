//! Driver capability gating for mipmap generation

use std::fmt;

/// Graphics API version reported by the driver (major.minor)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DriverVersion {
    pub major: u32,
    pub minor: u32,
}

impl DriverVersion {
    /// Version reported for backends that have no GL-style version string
    pub const MODERN: DriverVersion = DriverVersion::new(4, 6);

    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// Parse a `major.minor` pair, optionally followed by anything else
    ///
    /// Accepts driver strings such as `"4.6 (Core Profile) Mesa 24.0.1"` or
    /// `"OpenGL ES 3.2 NVIDIA 550.54"`: the first `N.N` token wins.
    pub fn parse(s: &str) -> Option<Self> {
        s.split(|c: char| c.is_whitespace() || c == '(' || c == ')')
            .find_map(|token| {
                let mut parts = token.split('.');
                let major = parts.next()?.parse().ok()?;
                let minor = parts.next()?.parse().ok()?;
                Some(Self::new(major, minor))
            })
    }
}

impl fmt::Display for DriverVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// How (or whether) a driver can produce a mip chain
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MipmapCapability {
    /// Per-texture auto-generate flag, set before upload (GL 1.4 - 2.x)
    LegacyAutoMipmap,
    /// Explicit generate call after upload (GL 3.0+)
    ExplicitGeneration,
    /// Driver too old to generate mipmaps at all
    Unsupported,
}

impl MipmapCapability {
    pub fn classify(version: DriverVersion) -> Self {
        match (version.major, version.minor) {
            (major, _) if major >= 3 => MipmapCapability::ExplicitGeneration,
            (1, minor) if minor >= 4 => MipmapCapability::LegacyAutoMipmap,
            (2, _) => MipmapCapability::LegacyAutoMipmap,
            _ => MipmapCapability::Unsupported,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classify(major: u32, minor: u32) -> MipmapCapability {
        MipmapCapability::classify(DriverVersion::new(major, minor))
    }

    #[test]
    fn test_classify_boundaries() {
        assert_eq!(classify(0, 9), MipmapCapability::Unsupported);
        assert_eq!(classify(1, 0), MipmapCapability::Unsupported);
        assert_eq!(classify(1, 2), MipmapCapability::Unsupported);
        assert_eq!(classify(1, 3), MipmapCapability::Unsupported);
        assert_eq!(classify(1, 4), MipmapCapability::LegacyAutoMipmap);
        assert_eq!(classify(1, 5), MipmapCapability::LegacyAutoMipmap);
        assert_eq!(classify(2, 0), MipmapCapability::LegacyAutoMipmap);
        assert_eq!(classify(2, 5), MipmapCapability::LegacyAutoMipmap);
        assert_eq!(classify(3, 0), MipmapCapability::ExplicitGeneration);
        assert_eq!(classify(4, 6), MipmapCapability::ExplicitGeneration);
    }

    #[test]
    fn test_parse_driver_strings() {
        assert_eq!(DriverVersion::parse("2.1"), Some(DriverVersion::new(2, 1)));
        assert_eq!(
            DriverVersion::parse("4.6 (Core Profile) Mesa 24.0.1"),
            Some(DriverVersion::new(4, 6))
        );
        assert_eq!(
            DriverVersion::parse("OpenGL ES 3.2 NVIDIA 550.54"),
            Some(DriverVersion::new(3, 2))
        );
        assert_eq!(DriverVersion::parse("Vulkan driver"), None);
        assert_eq!(DriverVersion::parse(""), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(DriverVersion::new(1, 4).to_string(), "1.4");
        assert!(DriverVersion::new(2, 9) < DriverVersion::new(3, 0));
    }
}
