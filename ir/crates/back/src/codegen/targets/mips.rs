use strum::VariantArray;

use crate::codegen::machine::{
    abi::{
        BankDescriptor,
        FpSpillLayout,
        ReturnKind,
        WideFpLayout,
    },
    isa::PhysicalRegister,
    reg::RegStorage,
    Architecture,
    Bank,
    TargetMachine,
    Width,
};

/// MIPS32 with a 16 register FPU. Doubles occupy even/odd pairs.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct Mips;

impl TargetMachine for Mips {
    type Reg = MipsReg;

    fn arch() -> Architecture {
        Architecture::Mips
    }

    fn bank_descriptor() -> BankDescriptor<Self::Reg> {
        BankDescriptor {
            core_regs: CORE_REGS,
            fp_regs: FP_REGS,
            reserved: &[
                MipsReg::Zero,
                MipsReg::At,
                MipsReg::S0,
                MipsReg::S1,
                MipsReg::K0,
                MipsReg::K1,
                MipsReg::Gp,
                MipsReg::Sp,
                MipsReg::Ra,
            ],
            core_temps: &[
                MipsReg::V0,
                MipsReg::V1,
                MipsReg::A0,
                MipsReg::A1,
                MipsReg::A2,
                MipsReg::A3,
                MipsReg::T0,
                MipsReg::T1,
                MipsReg::T2,
                MipsReg::T3,
                MipsReg::T4,
                MipsReg::T5,
                MipsReg::T6,
                MipsReg::T7,
                MipsReg::T8,
            ],
            fp_temps: FP_REGS,
            caller_save: &[
                MipsReg::V0,
                MipsReg::V1,
                MipsReg::A0,
                MipsReg::A1,
                MipsReg::A2,
                MipsReg::A3,
                MipsReg::T0,
                MipsReg::T1,
                MipsReg::T2,
                MipsReg::T3,
                MipsReg::T4,
                MipsReg::T5,
                MipsReg::T6,
                MipsReg::T7,
                MipsReg::T8,
                MipsReg::T9,
                MipsReg::F0,
                MipsReg::F1,
                MipsReg::F2,
                MipsReg::F3,
                MipsReg::F4,
                MipsReg::F5,
                MipsReg::F6,
                MipsReg::F7,
                MipsReg::F8,
                MipsReg::F9,
                MipsReg::F10,
                MipsReg::F11,
                MipsReg::F12,
                MipsReg::F13,
                MipsReg::F14,
                MipsReg::F15,
            ],
            arg_regs: &[MipsReg::A0, MipsReg::A1, MipsReg::A2, MipsReg::A3],
            always_spilled: &[MipsReg::Ra],
            wide_fp: WideFpLayout::EvenOddPair,
            fp_spills: FpSpillLayout::Individual,
            next_core_reg: 0,
            next_fp_reg: 0,
        }
    }

    fn return_location(kind: ReturnKind) -> RegStorage<Self::Reg> {
        match kind {
            ReturnKind::Core => RegStorage::Solo32(MipsReg::V0),
            ReturnKind::Wide => RegStorage::Pair {
                low: MipsReg::V0,
                high: MipsReg::V1,
            },
            ReturnKind::Float => RegStorage::Solo32(MipsReg::F0),
            ReturnKind::Double => RegStorage::Pair {
                low: MipsReg::F0,
                high: MipsReg::F1,
            },
        }
    }
}

const FIRST_FP: usize = MipsReg::F0 as usize;

const CORE_REGS: &[MipsReg] = MipsReg::VARIANTS.split_at(FIRST_FP).0;
const FP_REGS: &[MipsReg] = MipsReg::VARIANTS.split_at(FIRST_FP).1;

/// Core registers are declared in hardware encoding order.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, IntoStaticStr, VariantArray,
)]
#[strum(serialize_all = "lowercase")]
#[repr(u8)]
pub enum MipsReg {
    Zero,
    At,
    V0,
    V1,
    A0,
    A1,
    A2,
    A3,
    T0,
    T1,
    T2,
    T3,
    T4,
    T5,
    T6,
    T7,
    S0,
    S1,
    S2,
    S3,
    S4,
    S5,
    S6,
    S7,
    T8,
    T9,
    K0,
    K1,
    Gp,
    Sp,
    Fp,
    Ra,
    F0,
    F1,
    F2,
    F3,
    F4,
    F5,
    F6,
    F7,
    F8,
    F9,
    F10,
    F11,
    F12,
    F13,
    F14,
    F15,
}

impl PhysicalRegister for MipsReg {
    fn name(&self) -> &'static str {
        self.into()
    }

    fn all() -> &'static [Self] {
        Self::VARIANTS
    }

    fn bank(&self) -> Bank {
        if (*self as usize) < FIRST_FP {
            Bank::Core
        } else {
            Bank::Fp
        }
    }

    fn width(&self) -> Width {
        Width::Single
    }

    fn num(&self) -> u8 {
        let raw = *self as u8;
        match self.bank() {
            Bank::Core => raw,
            Bank::Fp => raw - FIRST_FP as u8,
        }
    }
}
