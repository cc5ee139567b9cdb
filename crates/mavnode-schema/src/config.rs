/// Controls how specs are checked when they are registered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryConfig {
    /// Recompute CRC_EXTRA from the field layout and reject specs that disagree.
    pub verify_crc_extra: bool,
    /// Let a later spec replace an earlier one with the same id instead of failing.
    pub allow_override: bool,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            verify_crc_extra: true,
            allow_override: false,
        }
    }
}
