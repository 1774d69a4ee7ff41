use smallvec::SmallVec;
use tracing::debug;

use crate::codegen::{
    machine::{
        isa::PhysicalRegister,
        lir::Emitter,
        method::Method,
        reg::{
            RegStorage,
            VReg,
        },
        TargetMachine,
    },
    register_allocator::RegisterPool,
};

impl<TM: TargetMachine> RegisterPool<TM> {
    /// Writes a dirty narrow value back to its frame slot.
    pub fn flush_reg(
        &mut self,
        reg: TM::Reg,
        method: &Method<TM>,
        emitter: &mut impl Emitter<TM::Reg>,
    ) {
        let info = self.info(reg);
        if !(info.live && info.dirty) {
            return;
        }
        let vreg = self.frame_slot_of(reg, method);
        self.info_mut(reg).dirty = false;
        debug!("Flushing {} to {vreg}", reg.name());
        emitter.store_vreg(vreg, RegStorage::Solo32(reg));
    }

    /// Writes a dirty wide value back to its frame slots.
    ///
    /// The store goes to the lower of the two virtual registers the halves cache.
    ///
    /// # Panics
    ///
    /// If the halves are not linked to each other, or if one half is a temp and the other one
    /// is promoted.
    pub fn flush_reg_wide(
        &mut self,
        reg: RegStorage<TM::Reg>,
        method: &Method<TM>,
        emitter: &mut impl Emitter<TM::Reg>,
    ) {
        match self.storage_regs(reg).as_slice() {
            &[low, high] => {
                let (low_info, high_info) = (self.info(low), self.info(high));
                if !(low_info.wide
                    && high_info.wide
                    && low_info.partner == high
                    && high_info.partner == low)
                {
                    self.fatal(format_args!(
                        "Flushing {reg} whose halves are not partnered"
                    ));
                }
                let needs_flush =
                    (low_info.live && low_info.dirty) || (high_info.live && high_info.dirty);
                if !needs_flush {
                    return;
                }
                if !(low_info.is_temp && high_info.is_temp) {
                    self.fatal(format_args!("Long half-temp, half-promoted in {reg}"));
                }
                let vreg = [low, high]
                    .into_iter()
                    .filter(|reg| self.info(*reg).live)
                    .map(|reg| self.frame_slot_of(reg, method))
                    .min();
                let Some(vreg) = vreg else {
                    self.fatal(format_args!("Dirty {reg} caches no value"));
                };
                self.info_mut(low).dirty = false;
                self.info_mut(high).dirty = false;
                debug!("Flushing {reg} to {vreg}");
                emitter.store_vreg(vreg, reg);
            }
            &[solo] => {
                let info = self.info(solo);
                if !(info.live && info.dirty) {
                    return;
                }
                let vreg = self.frame_slot_of(solo, method);
                self.info_mut(solo).dirty = false;
                debug!("Flushing {reg} to {vreg}");
                emitter.store_vreg(vreg, RegStorage::Solo64(solo));
            }
            _ => unreachable!("register storage has one or two registers"),
        }
    }

    fn frame_slot_of(&self, reg: TM::Reg, method: &Method<TM>) -> VReg {
        match self.info(reg).s_reg {
            Some(s_reg) => method.vreg_of(s_reg),
            None => self.fatal(format_args!("{} is live without an SSA name", reg.name())),
        }
    }

    /// Flushes whatever value `reg` caches, narrow or wide.
    pub fn flush_specific_reg(
        &mut self,
        reg: TM::Reg,
        method: &Method<TM>,
        emitter: &mut impl Emitter<TM::Reg>,
    ) {
        let info = self.info(reg);
        if !info.wide {
            self.flush_reg(reg, method, emitter);
        } else if !info.is_paired() {
            self.flush_reg_wide(RegStorage::Solo64(reg), method, emitter);
        } else {
            let partner = info.partner;
            let swapped = matches!(
                (self.info(partner).s_reg, info.s_reg),
                (Some(partner_sreg), Some(s_reg)) if partner_sreg < s_reg
            );
            let (low, high) = if swapped {
                (partner, reg)
            } else {
                (reg, partner)
            };
            self.flush_reg_wide(RegStorage::Pair { low, high }, method, emitter);
        }
    }

    /// Flushes every dirty register and forgets all cached values.
    ///
    /// Used at basic block boundaries.
    pub fn flush_all_regs(&mut self, method: &Method<TM>, emitter: &mut impl Emitter<TM::Reg>) {
        let dirty = self
            .infos()
            .filter(|info| info.live && info.dirty)
            .map(|info| info.reg)
            .collect::<SmallVec<[_; 8]>>();
        debug!("Flushing {} dirty registers", dirty.len());
        for reg in dirty {
            self.flush_specific_reg(reg, method, emitter);
        }
        self.clobber_all_regs();
    }
}
