use std::fmt::Debug;

pub use abi::{
    BankDescriptor,
    FpSpillLayout,
    ReturnKind,
    WideFpLayout,
};
pub use isa::PhysicalRegister;
pub use lir::{
    Emitter,
    Lir,
    LirBuffer,
    LirId,
    LirOp,
};
pub use method::{
    Home,
    Location,
    Method,
    RegLocation,
    SsaName,
};
pub use reg::{
    RegStorage,
    SReg,
    VReg,
};

pub mod abi;
pub mod isa;
pub mod lir;
pub mod method;
pub mod reg;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Display)]
pub enum Bank {
    Core,
    Fp,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Display)]
pub enum Width {
    Single,
    Double,
}

/// The kind of register code generation asks for.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Display)]
pub enum RegClass {
    Core,
    Fp,
    Any,
}

impl RegClass {
    pub fn accepts<R: PhysicalRegister>(self, reg: RegStorage<R>) -> bool {
        match self {
            Self::Any => true,
            Self::Core => !reg.is_fp(),
            Self::Fp => reg.is_fp(),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Display)]
pub enum Architecture {
    Thumb2,
    Mips,
    X86,
}

pub trait TargetMachine: Debug + Default + Copy + Clone + PartialEq + Eq {
    type Reg: PhysicalRegister;

    fn arch() -> Architecture;

    fn bank_descriptor() -> BankDescriptor<Self::Reg>;

    fn return_location(kind: ReturnKind) -> RegStorage<Self::Reg>;

    /// How a double promoted to `low` and `high` is reported to code generation.
    fn fuse_double(low: Self::Reg, high: Self::Reg) -> RegStorage<Self::Reg> {
        if low == high {
            RegStorage::Solo64(low)
        } else {
            RegStorage::Pair { low, high }
        }
    }

    /// Splits a double-width register that is not tracked by the pool into its halves.
    fn split_double(_reg: Self::Reg) -> Option<(Self::Reg, Self::Reg)> {
        None
    }
}
