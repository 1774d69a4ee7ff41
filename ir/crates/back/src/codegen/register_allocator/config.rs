#[derive(Debug, Clone, Copy, Eq, PartialEq)]
#[allow(clippy::struct_excessive_bools)]
pub struct RegAllocConfig {
    /// Move frequently used virtual registers into callee-save registers.
    pub promote_regs: bool,
    /// Nop out the defining instructions of cached values that die without being used.
    pub elide_dead_defs: bool,
    /// Minimum reference count for a virtual register to be considered for promotion.
    pub promotion_threshold: u32,
    /// Dump reference counts and the promotion map.
    pub verbose: bool,
}

impl RegAllocConfig {
    pub const fn all_disabled() -> Self {
        Self {
            promote_regs: false,
            elide_dead_defs: false,
            promotion_threshold: 1,
            verbose: false,
        }
    }

    pub const fn o0() -> Self {
        Self::all_disabled()
    }

    pub const fn o1() -> Self {
        Self {
            promote_regs: true,
            elide_dead_defs: true,
            promotion_threshold: 1,
            verbose: false,
        }
    }
}

#[cfg(test)]
impl RegAllocConfig {
    pub const fn promotion_only() -> Self {
        Self {
            promote_regs: true,
            ..Self::all_disabled()
        }
    }
}

impl Default for RegAllocConfig {
    fn default() -> Self {
        Self::o1()
    }
}
