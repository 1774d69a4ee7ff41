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

/// Thumb2 with VFP. Doubles live in even/odd single pairs and are reported as `dN`.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct Thumb2;

impl TargetMachine for Thumb2 {
    type Reg = Thumb2Reg;

    fn arch() -> Architecture {
        Architecture::Thumb2
    }

    fn bank_descriptor() -> BankDescriptor<Self::Reg> {
        BankDescriptor {
            core_regs: &CORE_REGS,
            fp_regs: &FP_REGS,
            reserved: &[
                Thumb2Reg::R4,
                Thumb2Reg::R9,
                Thumb2Reg::Sp,
                Thumb2Reg::Lr,
                Thumb2Reg::Pc,
            ],
            core_temps: &CORE_TEMPS,
            fp_temps: &FP_TEMPS,
            caller_save: &CALLER_SAVE,
            arg_regs: &[
                Thumb2Reg::R0,
                Thumb2Reg::R1,
                Thumb2Reg::R2,
                Thumb2Reg::R3,
            ],
            always_spilled: &[Thumb2Reg::Lr],
            wide_fp: WideFpLayout::EvenOddPair,
            fp_spills: FpSpillLayout::Contiguous { base: 16 },
            next_core_reg: 2,
            next_fp_reg: 0,
        }
    }

    fn return_location(kind: ReturnKind) -> RegStorage<Self::Reg> {
        // Soft-float calling convention.
        match kind {
            ReturnKind::Core | ReturnKind::Float => RegStorage::Solo32(Thumb2Reg::R0),
            ReturnKind::Wide | ReturnKind::Double => RegStorage::Pair {
                low: Thumb2Reg::R0,
                high: Thumb2Reg::R1,
            },
        }
    }

    fn fuse_double(low: Self::Reg, high: Self::Reg) -> RegStorage<Self::Reg> {
        debug_assert_eq!(low.num() + 1, high.num());
        match Thumb2Reg::double(low.num() / 2) {
            Some(double) => RegStorage::Solo64(double),
            None => RegStorage::Pair { low, high },
        }
    }

    fn split_double(reg: Self::Reg) -> Option<(Self::Reg, Self::Reg)> {
        if !reg.is_double() {
            return None;
        }
        let low = Thumb2Reg::single(reg.num() * 2)?;
        let high = Thumb2Reg::single(reg.num() * 2 + 1)?;
        Some((low, high))
    }
}

const CORE_REGS: [Thumb2Reg; 16] = [
    Thumb2Reg::R0,
    Thumb2Reg::R1,
    Thumb2Reg::R2,
    Thumb2Reg::R3,
    Thumb2Reg::R4,
    Thumb2Reg::R5,
    Thumb2Reg::R6,
    Thumb2Reg::R7,
    Thumb2Reg::R8,
    Thumb2Reg::R9,
    Thumb2Reg::R10,
    Thumb2Reg::R11,
    Thumb2Reg::R12,
    Thumb2Reg::Sp,
    Thumb2Reg::Lr,
    Thumb2Reg::Pc,
];

const CORE_TEMPS: [Thumb2Reg; 5] = [
    Thumb2Reg::R0,
    Thumb2Reg::R1,
    Thumb2Reg::R2,
    Thumb2Reg::R3,
    Thumb2Reg::R12,
];

const FP_REGS: [Thumb2Reg; 32] = [
    Thumb2Reg::S0,
    Thumb2Reg::S1,
    Thumb2Reg::S2,
    Thumb2Reg::S3,
    Thumb2Reg::S4,
    Thumb2Reg::S5,
    Thumb2Reg::S6,
    Thumb2Reg::S7,
    Thumb2Reg::S8,
    Thumb2Reg::S9,
    Thumb2Reg::S10,
    Thumb2Reg::S11,
    Thumb2Reg::S12,
    Thumb2Reg::S13,
    Thumb2Reg::S14,
    Thumb2Reg::S15,
    Thumb2Reg::S16,
    Thumb2Reg::S17,
    Thumb2Reg::S18,
    Thumb2Reg::S19,
    Thumb2Reg::S20,
    Thumb2Reg::S21,
    Thumb2Reg::S22,
    Thumb2Reg::S23,
    Thumb2Reg::S24,
    Thumb2Reg::S25,
    Thumb2Reg::S26,
    Thumb2Reg::S27,
    Thumb2Reg::S28,
    Thumb2Reg::S29,
    Thumb2Reg::S30,
    Thumb2Reg::S31,
];

const FP_TEMPS: [Thumb2Reg; 16] = [
    Thumb2Reg::S0,
    Thumb2Reg::S1,
    Thumb2Reg::S2,
    Thumb2Reg::S3,
    Thumb2Reg::S4,
    Thumb2Reg::S5,
    Thumb2Reg::S6,
    Thumb2Reg::S7,
    Thumb2Reg::S8,
    Thumb2Reg::S9,
    Thumb2Reg::S10,
    Thumb2Reg::S11,
    Thumb2Reg::S12,
    Thumb2Reg::S13,
    Thumb2Reg::S14,
    Thumb2Reg::S15,
];

const CALLER_SAVE: [Thumb2Reg; 22] = [
    Thumb2Reg::R0,
    Thumb2Reg::R1,
    Thumb2Reg::R2,
    Thumb2Reg::R3,
    Thumb2Reg::R12,
    Thumb2Reg::Lr,
    Thumb2Reg::S0,
    Thumb2Reg::S1,
    Thumb2Reg::S2,
    Thumb2Reg::S3,
    Thumb2Reg::S4,
    Thumb2Reg::S5,
    Thumb2Reg::S6,
    Thumb2Reg::S7,
    Thumb2Reg::S8,
    Thumb2Reg::S9,
    Thumb2Reg::S10,
    Thumb2Reg::S11,
    Thumb2Reg::S12,
    Thumb2Reg::S13,
    Thumb2Reg::S14,
    Thumb2Reg::S15,
];

/// `r4` holds the suspend counter and `r9` the thread pointer.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, IntoStaticStr, VariantArray,
)]
#[strum(serialize_all = "lowercase")]
#[repr(u8)]
pub enum Thumb2Reg {
    R0,
    R1,
    R2,
    R3,
    R4,
    R5,
    R6,
    R7,
    R8,
    R9,
    R10,
    R11,
    R12,
    Sp,
    Lr,
    Pc,
    S0,
    S1,
    S2,
    S3,
    S4,
    S5,
    S6,
    S7,
    S8,
    S9,
    S10,
    S11,
    S12,
    S13,
    S14,
    S15,
    S16,
    S17,
    S18,
    S19,
    S20,
    S21,
    S22,
    S23,
    S24,
    S25,
    S26,
    S27,
    S28,
    S29,
    S30,
    S31,
    D0,
    D1,
    D2,
    D3,
    D4,
    D5,
    D6,
    D7,
    D8,
    D9,
    D10,
    D11,
    D12,
    D13,
    D14,
    D15,
}

const FIRST_SINGLE: u8 = Thumb2Reg::S0 as u8;
const FIRST_DOUBLE: u8 = Thumb2Reg::D0 as u8;

impl Thumb2Reg {
    fn single(num: u8) -> Option<Self> {
        (num < 32).then(|| Self::VARIANTS[usize::from(FIRST_SINGLE + num)])
    }

    fn double(num: u8) -> Option<Self> {
        (num < 16).then(|| Self::VARIANTS[usize::from(FIRST_DOUBLE + num)])
    }
}

impl PhysicalRegister for Thumb2Reg {
    fn name(&self) -> &'static str {
        self.into()
    }

    fn all() -> &'static [Self] {
        Self::VARIANTS
    }

    fn bank(&self) -> Bank {
        if (*self as u8) < FIRST_SINGLE {
            Bank::Core
        } else {
            Bank::Fp
        }
    }

    fn width(&self) -> Width {
        if (*self as u8) < FIRST_DOUBLE {
            Width::Single
        } else {
            Width::Double
        }
    }

    fn num(&self) -> u8 {
        let raw = *self as u8;
        if raw >= FIRST_DOUBLE {
            raw - FIRST_DOUBLE
        } else if raw >= FIRST_SINGLE {
            raw - FIRST_SINGLE
        } else {
            raw
        }
    }
}
