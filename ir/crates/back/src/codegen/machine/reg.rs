use std::fmt::{
    Display,
    Formatter,
};

use smallvec::{
    smallvec,
    SmallVec,
};

use crate::codegen::machine::isa::PhysicalRegister;

index_vec::define_index_type! {
    /// An SSA name produced by the dataflow pass.
    pub struct SReg = u32;

    DISPLAY_FORMAT = "s{}";
}

index_vec::define_index_type! {
    /// A virtual register of the method frame.
    ///
    /// Dalvik registers come first, compiler temporaries follow.
    pub struct VReg = u32;

    DISPLAY_FORMAT = "v{}";
}

/// The physical storage of a value: one register or a pair of them.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum RegStorage<R> {
    Solo32(R),
    /// A single register holding a 64-bit value.
    Solo64(R),
    Pair {
        low: R,
        high: R,
    },
}

impl<R: PhysicalRegister> RegStorage<R> {
    pub fn low(self) -> R {
        match self {
            Self::Solo32(reg) | Self::Solo64(reg) => reg,
            Self::Pair { low, .. } => low,
        }
    }

    pub fn high(self) -> Option<R> {
        match self {
            Self::Solo32(_) | Self::Solo64(_) => None,
            Self::Pair { high, .. } => Some(high),
        }
    }

    pub fn is_pair(self) -> bool {
        matches!(self, Self::Pair { .. })
    }

    pub fn is_wide(self) -> bool {
        !matches!(self, Self::Solo32(_))
    }

    pub fn is_fp(self) -> bool {
        self.low().is_fp()
    }

    pub fn regs(self) -> SmallVec<[R; 2]> {
        match self {
            Self::Solo32(reg) | Self::Solo64(reg) => smallvec![reg],
            Self::Pair { low, high } => smallvec![low, high],
        }
    }
}

impl<R: PhysicalRegister> Display for RegStorage<R> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Solo32(reg) | Self::Solo64(reg) => write!(f, "${}", reg.name()),
            Self::Pair { low, high } => write!(f, "${}:${}", low.name(), high.name()),
        }
    }
}
