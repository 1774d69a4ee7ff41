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

/// 32-bit x86 with SSE2. Every xmm register holds a double on its own.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct X86;

impl TargetMachine for X86 {
    type Reg = X86Reg;

    fn arch() -> Architecture {
        Architecture::X86
    }

    fn bank_descriptor() -> BankDescriptor<Self::Reg> {
        BankDescriptor {
            core_regs: CORE_REGS,
            fp_regs: FP_REGS,
            reserved: &[X86Reg::Esp],
            core_temps: &[X86Reg::Eax, X86Reg::Ecx, X86Reg::Edx, X86Reg::Ebx],
            fp_temps: FP_REGS.split_at(6).0,
            caller_save: &[
                X86Reg::Eax,
                X86Reg::Ecx,
                X86Reg::Edx,
                X86Reg::Xmm0,
                X86Reg::Xmm1,
                X86Reg::Xmm2,
                X86Reg::Xmm3,
                X86Reg::Xmm4,
                X86Reg::Xmm5,
            ],
            arg_regs: &[X86Reg::Ecx, X86Reg::Edx, X86Reg::Ebx],
            always_spilled: &[],
            wide_fp: WideFpLayout::Solo,
            fp_spills: FpSpillLayout::Individual,
            next_core_reg: 2,
            next_fp_reg: 0,
        }
    }

    fn return_location(kind: ReturnKind) -> RegStorage<Self::Reg> {
        match kind {
            ReturnKind::Core => RegStorage::Solo32(X86Reg::Eax),
            ReturnKind::Wide => RegStorage::Pair {
                low: X86Reg::Eax,
                high: X86Reg::Edx,
            },
            ReturnKind::Float => RegStorage::Solo32(X86Reg::Xmm0),
            ReturnKind::Double => RegStorage::Solo64(X86Reg::Xmm0),
        }
    }
}

const FIRST_FP: usize = X86Reg::Xmm0 as usize;

const CORE_REGS: &[X86Reg] = X86Reg::VARIANTS.split_at(FIRST_FP).0;
const FP_REGS: &[X86Reg] = X86Reg::VARIANTS.split_at(FIRST_FP).1;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, IntoStaticStr, VariantArray,
)]
#[strum(serialize_all = "lowercase")]
#[repr(u8)]
pub enum X86Reg {
    Eax,
    Ecx,
    Edx,
    Ebx,
    Esp,
    Ebp,
    Esi,
    Edi,
    Xmm0,
    Xmm1,
    Xmm2,
    Xmm3,
    Xmm4,
    Xmm5,
    Xmm6,
    Xmm7,
}

impl PhysicalRegister for X86Reg {
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
        match self.bank() {
            Bank::Core => Width::Single,
            Bank::Fp => Width::Double,
        }
    }

    fn num(&self) -> u8 {
        let raw = *self as u8;
        match self.bank() {
            Bank::Core => raw,
            Bank::Fp => raw - FIRST_FP as u8,
        }
    }
}
