//! Lowering configuration.

/// Operating system and architecture, as far as the C ABI of complex
/// numbers is concerned.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Platform {
    Linux,
    MacosIntel,
    MacosArm,
    Windows,
    Other,
}

impl Platform {
    /// The platform this compiler was built for.
    pub fn host() -> Platform {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(all(target_os = "macos", target_arch = "aarch64")) {
            Platform::MacosArm
        } else if cfg!(target_os = "macos") {
            Platform::MacosIntel
        } else if cfg!(target_os = "linux") {
            Platform::Linux
        } else {
            Platform::Other
        }
    }

    /// Platform named by an LLVM target triple.
    pub fn from_triple(triple: &str) -> Platform {
        let arm = triple.starts_with("aarch64") || triple.starts_with("arm64");
        if triple.contains("windows") {
            Platform::Windows
        } else if triple.contains("apple") || triple.contains("darwin") {
            if arm {
                Platform::MacosArm
            } else {
                Platform::MacosIntel
            }
        } else if triple.contains("linux") {
            Platform::Linux
        } else {
            Platform::Other
        }
    }
}

/// Collision strategy of generated dicts and sets.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum HashStrategy {
    /// Open addressing with tombstones; capacity grows `2c + 1`.
    #[default]
    LinearProbing,
    /// Bucket chains with an inline head node; capacity grows `3c + 1`.
    SeparateChaining,
}

impl HashStrategy {
    /// Suffix that keeps helper names of the two strategies apart.
    pub const fn suffix(self) -> &'static str {
        match self {
            HashStrategy::LinearProbing => "lp",
            HashStrategy::SeparateChaining => "sc",
        }
    }
}

/// Options of one `asr_to_llvm` run.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoweringOptions {
    pub module_name: String,
    pub platform: Platform,
    pub dict_strategy: HashStrategy,
    pub set_strategy: HashStrategy,
    pub target_triple: Option<String>,
    /// Capacity of a freshly initialised list.
    pub initial_list_capacity: i32,
    /// Bucket count of a freshly initialised dict or set.
    pub initial_hash_capacity: i32,
}

impl Default for LoweringOptions {
    fn default() -> Self {
        LoweringOptions {
            module_name: "LFortran".to_string(),
            platform: Platform::host(),
            dict_strategy: HashStrategy::LinearProbing,
            set_strategy: HashStrategy::LinearProbing,
            target_triple: None,
            initial_list_capacity: 0,
            initial_hash_capacity: 8,
        }
    }
}

impl LoweringOptions {
    #[must_use]
    pub fn with_module_name(mut self, name: impl Into<String>) -> Self {
        self.module_name = name.into();
        self
    }

    #[must_use]
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    #[must_use]
    pub fn with_dict_strategy(mut self, strategy: HashStrategy) -> Self {
        self.dict_strategy = strategy;
        self
    }

    #[must_use]
    pub fn with_set_strategy(mut self, strategy: HashStrategy) -> Self {
        self.set_strategy = strategy;
        self
    }

    /// Target `triple`; the platform follows it.
    #[must_use]
    pub fn with_target_triple(mut self, triple: impl Into<String>) -> Self {
        let triple = triple.into();
        self.platform = Platform::from_triple(&triple);
        self.target_triple = Some(triple);
        self
    }

    #[must_use]
    pub fn with_initial_list_capacity(mut self, capacity: i32) -> Self {
        self.initial_list_capacity = capacity.max(0);
        self
    }

    #[must_use]
    pub fn with_initial_hash_capacity(mut self, capacity: i32) -> Self {
        self.initial_hash_capacity = capacity.max(1);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triples_select_platforms() {
        assert_eq!(Platform::from_triple("x86_64-pc-windows-msvc"), Platform::Windows);
        assert_eq!(Platform::from_triple("arm64-apple-darwin23"), Platform::MacosArm);
        assert_eq!(Platform::from_triple("x86_64-apple-macosx14"), Platform::MacosIntel);
        assert_eq!(Platform::from_triple("x86_64-unknown-linux-gnu"), Platform::Linux);
        assert_eq!(Platform::from_triple("wasm32-unknown-unknown"), Platform::Other);
    }

    #[test]
    fn hash_capacity_stays_positive() {
        let o = LoweringOptions::default().with_initial_hash_capacity(0);
        assert_eq!(o.initial_hash_capacity, 1);
        let o = o.with_target_triple("aarch64-apple-darwin");
        assert_eq!(o.platform, Platform::MacosArm);
    }
}
