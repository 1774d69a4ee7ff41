use rustc_hash::FxHashMap;
use strum::VariantArray;

use crate::codegen::machine::{
    abi::{
        BankDescriptor,
        FpSpillLayout,
        ReturnKind,
        WideFpLayout,
    },
    isa::PhysicalRegister,
    lir::{
        Emitter,
        LirId,
    },
    reg::{
        RegStorage,
        VReg,
    },
    Architecture,
    Bank,
    TargetMachine,
    Width,
};

/// A small register file: four core temps, three callee-save core registers, four FP temps and
/// two callee-save FP pairs.
#[derive(Debug, Default, Copy, Clone, Eq, PartialEq)]
pub struct TestTarget;

impl TargetMachine for TestTarget {
    type Reg = TestReg;

    fn arch() -> Architecture {
        Architecture::Thumb2
    }

    fn bank_descriptor() -> BankDescriptor<Self::Reg> {
        BankDescriptor {
            core_regs: TestReg::VARIANTS.split_at(8).0,
            fp_regs: TestReg::VARIANTS.split_at(8).1,
            reserved: &[TestReg::Sp],
            core_temps: &[TestReg::R0, TestReg::R1, TestReg::R2, TestReg::R3],
            fp_temps: &[TestReg::F0, TestReg::F1, TestReg::F2, TestReg::F3],
            caller_save: &[
                TestReg::R0,
                TestReg::R1,
                TestReg::R2,
                TestReg::R3,
                TestReg::F0,
                TestReg::F1,
                TestReg::F2,
                TestReg::F3,
            ],
            arg_regs: &[TestReg::R1, TestReg::R2],
            always_spilled: &[],
            wide_fp: WideFpLayout::EvenOddPair,
            fp_spills: FpSpillLayout::Contiguous { base: 4 },
            next_core_reg: 0,
            next_fp_reg: 0,
        }
    }

    fn return_location(kind: ReturnKind) -> RegStorage<Self::Reg> {
        match kind {
            ReturnKind::Core => RegStorage::Solo32(TestReg::R0),
            ReturnKind::Wide => RegStorage::Pair {
                low: TestReg::R0,
                high: TestReg::R1,
            },
            ReturnKind::Float => RegStorage::Solo32(TestReg::F0),
            ReturnKind::Double => RegStorage::Pair {
                low: TestReg::F0,
                high: TestReg::F1,
            },
        }
    }
}

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, IntoStaticStr, VariantArray,
)]
#[strum(serialize_all = "lowercase")]
#[repr(u8)]
pub enum TestReg {
    R0,
    R1,
    R2,
    R3,
    R4,
    R5,
    R6,
    Sp,
    F0,
    F1,
    F2,
    F3,
    F4,
    F5,
    F6,
    F7,
}

impl PhysicalRegister for TestReg {
    fn name(&self) -> &'static str {
        self.into()
    }

    fn all() -> &'static [Self] {
        Self::VARIANTS
    }

    fn bank(&self) -> Bank {
        if (*self as u8) < 8 {
            Bank::Core
        } else {
            Bank::Fp
        }
    }

    fn width(&self) -> Width {
        Width::Single
    }

    fn num(&self) -> u8 {
        (*self as u8) % 8
    }
}

/// An emitter that executes what it is asked to emit against a simulated frame.
///
/// Registers and frame slots hold 32-bit words. A 64-bit solo register keeps both words.
#[derive(Debug)]
pub struct FrameModel<R> {
    regs: FxHashMap<R, u64>,
    frame: FxHashMap<VReg, u32>,
    stored_at: Vec<VReg>,
    nops: Vec<LirId>,
}

impl<R> Default for FrameModel<R> {
    fn default() -> Self {
        Self {
            regs: FxHashMap::default(),
            frame: FxHashMap::default(),
            stored_at: Vec::new(),
            nops: Vec::new(),
        }
    }
}

impl<R: PhysicalRegister> FrameModel<R> {
    pub fn set_reg(&mut self, reg: R, value: u64) {
        self.regs.insert(reg, value);
    }

    pub fn reg(&self, reg: R) -> Option<u64> {
        self.regs.get(&reg).copied()
    }

    pub fn set_slot(&mut self, vreg: VReg, value: u32) {
        self.frame.insert(vreg, value);
    }

    pub fn slot(&self, vreg: VReg) -> Option<u32> {
        self.frame.get(&vreg).copied()
    }

    pub fn stores(&self) -> usize {
        self.stored_at.len()
    }

    pub fn stored_at(&self) -> Vec<VReg> {
        self.stored_at.clone()
    }

    pub fn nops(&self) -> &[LirId] {
        &self.nops
    }

    fn word(&self, reg: R) -> u32 {
        self.reg(reg).unwrap_or_default() as u32
    }
}

impl<R: PhysicalRegister> Emitter<R> for FrameModel<R> {
    fn store_vreg(&mut self, vreg: VReg, src: RegStorage<R>) {
        self.stored_at.push(vreg);
        match src {
            RegStorage::Solo32(reg) => {
                let word = self.word(reg);
                self.frame.insert(vreg, word);
            }
            RegStorage::Solo64(reg) => {
                let value = self.reg(reg).unwrap_or_default();
                self.frame.insert(vreg, value as u32);
                self.frame.insert(vreg + 1, (value >> 32) as u32);
            }
            RegStorage::Pair { low, high } => {
                let (low, high) = (self.word(low), self.word(high));
                self.frame.insert(vreg, low);
                self.frame.insert(vreg + 1, high);
            }
        }
    }

    fn load_vreg(&mut self, vreg: VReg, dest: RegStorage<R>) {
        let low = self.slot(vreg).unwrap_or_default();
        match dest {
            RegStorage::Solo32(reg) => self.set_reg(reg, u64::from(low)),
            RegStorage::Solo64(reg) => {
                let high = self.slot(vreg + 1).unwrap_or_default();
                self.set_reg(reg, u64::from(high) << 32 | u64::from(low));
            }
            RegStorage::Pair { low: low_reg, high } => {
                let high_word = self.slot(vreg + 1).unwrap_or_default();
                self.set_reg(low_reg, u64::from(low));
                self.set_reg(high, u64::from(high_word));
            }
        }
    }

    fn copy(&mut self, dest: RegStorage<R>, src: RegStorage<R>) {
        for (dest, src) in dest.regs().into_iter().zip(src.regs()) {
            let value = self.reg(src).unwrap_or_default();
            self.set_reg(dest, value);
        }
    }

    fn nop(&mut self, lir: LirId) {
        self.nops.push(lir);
    }
}
