use std::ops::Range;

use tracing::debug;

use crate::codegen::{
    machine::{
        isa::PhysicalRegister,
        lir::{
            Emitter,
            LirId,
        },
        method::{
            Location,
            RegLocation,
        },
        reg::{
            RegStorage,
            SReg,
        },
        TargetMachine,
    },
    register_allocator::RegisterPool,
};

impl<TM: TargetMachine> RegisterPool<TM> {
    /// Remembers that `range` computed the value cached in the register of `loc`.
    ///
    /// Only live temps carry a def range.
    pub fn mark_def(&mut self, loc: &RegLocation<TM::Reg>, range: Range<LirId>) {
        debug_assert!(!loc.wide);
        let Some(reg) = loc.reg() else {
            return;
        };
        self.set_def_range(reg.low(), range);
    }

    /// Like [`Self::mark_def`] for a wide value. The range is kept on the low half only.
    pub fn mark_def_wide(&mut self, loc: &RegLocation<TM::Reg>, range: Range<LirId>) {
        debug_assert!(loc.wide);
        let Some(reg) = loc.reg() else {
            return;
        };
        let regs = self.storage_regs(reg);
        self.set_def_range(regs[0], range);
        for high in regs.into_iter().skip(1) {
            self.info_mut(high).def_range = None;
        }
    }

    fn set_def_range(&mut self, reg: TM::Reg, range: Range<LirId>) {
        let info = self.info_mut(reg);
        if info.live && info.is_temp {
            info.def_range = Some(range);
        }
    }

    pub fn reset_def(&mut self, reg: RegStorage<TM::Reg>) {
        for reg in self.storage_regs(reg) {
            self.info_mut(reg).def_range = None;
        }
    }

    /// Nops the instructions that computed the value `s_reg` cached in `reg`.
    pub fn nullify_range(
        &mut self,
        reg: TM::Reg,
        s_reg: SReg,
        emitter: &mut impl Emitter<TM::Reg>,
    ) {
        if !self.config.elide_dead_defs {
            return;
        }
        let info = self.info(reg);
        if !info.is_temp {
            return;
        }
        let Some(range) = info.def_range.clone() else {
            return;
        };
        debug_assert_eq!(info.s_reg, Some(s_reg));
        debug!(
            "Eliding dead definition of {s_reg} in {}: {}..{}",
            reg.name(),
            range.start,
            range.end
        );
        for lir in (range.start.index()..range.end.index()).map(LirId::new) {
            emitter.nop(lir);
        }
    }

    /// The value of `loc` is about to be overwritten without having been used.
    ///
    /// Its defining instructions are nopped and the def range is dropped.
    pub fn reset_def_loc(
        &mut self,
        loc: &RegLocation<TM::Reg>,
        emitter: &mut impl Emitter<TM::Reg>,
    ) {
        debug_assert!(!loc.wide);
        let Some(reg) = loc.reg() else {
            return;
        };
        if let Some(s_reg) = loc.s_reg_low {
            self.nullify_range(reg.low(), s_reg, emitter);
        }
        self.reset_def(reg);
    }

    pub fn reset_def_loc_wide(
        &mut self,
        loc: &RegLocation<TM::Reg>,
        emitter: &mut impl Emitter<TM::Reg>,
    ) {
        debug_assert!(loc.wide);
        let Some(reg) = loc.reg() else {
            return;
        };
        let low = self.storage_regs(reg)[0];
        if let Some(s_reg) = loc.s_reg_low {
            self.nullify_range(low, s_reg, emitter);
        }
        self.reset_def(reg);
    }

    pub fn reset_def_tracking(&mut self) {
        for info in self.infos_mut() {
            info.def_range = None;
        }
    }

    /// Reinterprets a wide location as its low word only. The halves are unpaired.
    pub fn wide_to_narrow(&mut self, mut loc: RegLocation<TM::Reg>) -> RegLocation<TM::Reg> {
        debug_assert!(loc.wide);
        loc.wide = false;
        let Some(reg) = loc.reg() else {
            return loc;
        };
        let regs = self.storage_regs(reg);
        for reg in &regs {
            let info = self.info_mut(*reg);
            if info.is_temp {
                info.unpair();
                info.def_range = None;
            }
        }
        if regs.len() == 2 {
            loc.location = Location::PhysReg(RegStorage::Solo32(regs[0]));
        }
        loc
    }
}
