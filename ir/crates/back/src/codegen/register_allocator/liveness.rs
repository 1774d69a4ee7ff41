use itertools::Itertools;
use smallvec::SmallVec;
use tracing::{
    debug,
    trace,
    warn,
};

use crate::codegen::{
    machine::{
        isa::PhysicalRegister,
        lir::Emitter,
        method::{
            Location,
            RegLocation,
        },
        reg::{
            RegStorage,
            SReg,
        },
        Bank,
        RegClass,
        ReturnKind,
        TargetMachine,
    },
    register_allocator::RegisterPool,
};

impl<TM: TargetMachine> RegisterPool<TM> {
    /// Looks for a register caching the value of `s_reg` and claims it.
    ///
    /// [`RegClass::Any`] checks the FP bank first.
    pub fn alloc_live(&mut self, s_reg: SReg, class: RegClass) -> Option<TM::Reg> {
        match class {
            RegClass::Any => self
                .alloc_live_body(Bank::Fp, s_reg)
                .or_else(|| self.alloc_live_body(Bank::Core, s_reg)),
            RegClass::Core => self.alloc_live_body(Bank::Core, s_reg),
            RegClass::Fp => self.alloc_live_body(Bank::Fp, s_reg),
        }
    }

    fn alloc_live_body(&mut self, bank: Bank, s_reg: SReg) -> Option<TM::Reg> {
        let info = self
            .bank_mut(bank)
            .iter_mut()
            .find(|info| info.live && info.s_reg == Some(s_reg))?;
        let reg = info.reg;
        if info.is_temp {
            info.in_use = true;
        }
        if info.is_paired() {
            let partner = info.partner;
            let partner = self.info_mut(partner);
            if partner.is_temp {
                partner.in_use = true;
            }
        }
        trace!("Found {s_reg} live in {}", reg.name());
        Some(reg)
    }

    /// Records that the register of `loc` now holds the value of its SSA name.
    ///
    /// Any other register caching that name is invalidated first. A wide pair caches the low
    /// name in its low half and the high name in its high half.
    pub fn mark_live(&mut self, loc: &RegLocation<TM::Reg>) {
        let Some(reg) = loc.reg() else {
            return;
        };
        let regs = self.storage_regs(reg);
        let names: SmallVec<[Option<SReg>; 2]> = match (loc.s_reg_low, regs.len()) {
            (Some(s_reg), 2) => [Some(s_reg), Some(s_reg + 1)].into_iter().collect(),
            (s_reg, _) => [s_reg, s_reg].into_iter().take(regs.len()).collect(),
        };
        for (reg, s_reg) in regs.into_iter().zip(names) {
            self.mark_live_body(reg, s_reg);
        }
    }

    fn mark_live_body(&mut self, reg: TM::Reg, s_reg: Option<SReg>) {
        let info = self.info(reg);
        match s_reg {
            Some(s_reg) if info.live && info.s_reg == Some(s_reg) => {}
            Some(s_reg) => {
                self.clobber_sreg(s_reg);
                let info = self.info_mut(reg);
                if info.is_temp {
                    info.live = true;
                }
                info.s_reg = Some(s_reg);
            }
            None => {
                debug_assert!(info.is_temp, "{} is not a temp", reg.name());
                let info = self.info_mut(reg);
                info.live = false;
                info.dirty = false;
                info.s_reg = None;
                info.def_range = None;
            }
        }
    }

    /// Forgets any value cached in the registers of `reg`.
    pub fn clobber(&mut self, reg: RegStorage<TM::Reg>) {
        for reg in self.storage_regs(reg) {
            self.clobber_reg(reg);
        }
    }

    /// Forgets the value cached in a temp. A wide partner is clobbered and unpaired with it.
    pub(super) fn clobber_reg(&mut self, reg: TM::Reg) {
        let info = self.info(reg);
        if !info.is_temp {
            return;
        }
        let partner = info.is_paired().then_some(info.partner);
        self.clobber_body(reg);
        if let Some(partner) = partner {
            let info = self.info_mut(partner);
            info.unpair();
            if info.is_temp {
                self.clobber_body(partner);
            }
        }
    }

    fn clobber_body(&mut self, reg: TM::Reg) {
        let info = self.info_mut(reg);
        if info.live && info.dirty {
            if let Some(s_reg) = info.s_reg {
                debug!("Discarding dirty value of {s_reg} in {}", reg.name());
            }
        }
        info.live = false;
        info.dirty = false;
        info.s_reg = None;
        info.def_range = None;
        info.unpair();
    }

    /// Invalidates every register caching `s_reg`.
    pub fn clobber_sreg(&mut self, s_reg: SReg) {
        for info in self
            .infos_mut()
            .filter(|info| info.s_reg == Some(s_reg))
        {
            if info.is_temp {
                info.live = false;
                info.dirty = false;
            }
            info.def_range = None;
        }
    }

    pub fn clobber_all_regs(&mut self) {
        let temps = self
            .infos()
            .filter(|info| info.is_temp)
            .map(|info| info.reg)
            .collect::<SmallVec<[_; 32]>>();
        for reg in temps {
            self.clobber_reg(reg);
        }
    }

    /// Clobbers every register a call may overwrite.
    pub fn clobber_caller_save(&mut self) {
        for reg in self.descriptor.caller_save {
            if self.try_info(*reg).is_some() {
                self.clobber_reg(*reg);
            }
        }
    }

    /// Marks the cached value of `loc` as newer than its frame slot.
    ///
    /// Promoted values have no frame copy to fall behind and are left alone.
    pub fn mark_dirty(&mut self, loc: &RegLocation<TM::Reg>) {
        if loc.home {
            return;
        }
        let Some(reg) = loc.reg() else {
            return;
        };
        for reg in self.storage_regs(reg) {
            let info = self.info_mut(reg);
            if info.live {
                info.dirty = true;
            } else {
                warn!("Refusing to mark {} dirty, it caches no value", reg.name());
            }
        }
    }

    pub fn mark_clean(&mut self, loc: &RegLocation<TM::Reg>) {
        let Some(reg) = loc.reg() else {
            return;
        };
        for reg in self.storage_regs(reg) {
            self.info_mut(reg).dirty = false;
        }
    }

    /// Moves the cached state of `old` over to `new`.
    ///
    /// `new` keeps its own temp, live and dirty flags.
    pub fn copy_reg_info(&mut self, new: TM::Reg, old: TM::Reg) {
        let old = self.info(old);
        let (s_reg, in_use) = (old.s_reg, old.in_use);
        let new = self.info_mut(new);
        new.s_reg = s_reg;
        new.in_use = in_use;
        if !new.live {
            new.def_range = None;
        }
    }

    pub fn copy_reg_info_wide(&mut self, new: RegStorage<TM::Reg>, old: RegStorage<TM::Reg>) {
        for (new, old) in self
            .storage_regs(new)
            .into_iter()
            .zip(self.storage_regs(old))
        {
            self.copy_reg_info(new, old);
        }
        self.mark_wide(new);
    }

    /// Updates a narrow frame location to a register still caching its value.
    pub fn update_loc(&mut self, mut loc: RegLocation<TM::Reg>) -> RegLocation<TM::Reg> {
        debug_assert!(!loc.wide);
        self.debug_verify();
        if loc.location != Location::Frame {
            return loc;
        }
        let Some(s_reg) = loc.s_reg_low else {
            return loc;
        };
        if let Some(reg) = self.alloc_live(s_reg, RegClass::Any) {
            if self.info(reg).wide {
                // Half of a wide value cannot stand in for a narrow one.
                self.drop_overlap(reg, s_reg);
            } else {
                loc.location = Location::PhysReg(RegStorage::Solo32(reg));
            }
        }
        loc
    }

    /// Updates a wide frame location to registers still caching its value.
    pub fn update_loc_wide(&mut self, mut loc: RegLocation<TM::Reg>) -> RegLocation<TM::Reg> {
        debug_assert!(loc.wide);
        self.debug_verify();
        if loc.location != Location::Frame {
            return loc;
        }
        let Some(s_reg) = loc.s_reg_low else {
            return loc;
        };
        let low = self.alloc_live(s_reg, RegClass::Any);
        let is_pair = low.is_some_and(|low| self.info(low).is_paired());
        let high = if is_pair {
            self.alloc_live(s_reg + 1, RegClass::Any)
        } else {
            low
        };
        if let (Some(low), Some(high)) = (low, high) {
            if self.is_cached_wide(low, high, is_pair) {
                let reg = if is_pair {
                    RegStorage::Pair { low, high }
                } else {
                    RegStorage::Solo64(low)
                };
                self.mark_wide(reg);
                loc.location = Location::PhysReg(reg);
                return loc;
            }
        }
        for reg in [low, high].into_iter().flatten().dedup() {
            self.drop_overlap(reg, s_reg);
        }
        loc
    }

    /// Clobbers and frees a register, and its partner, that cannot be reused for `s_reg`.
    ///
    /// # Panics
    ///
    /// If either register holds a value that was never written back to the frame.
    fn drop_overlap(&mut self, reg: TM::Reg, s_reg: SReg) {
        let partner = self.info(reg).partner;
        if let Some(dirty) = [reg, partner].into_iter().find(|reg| {
            let info = self.info(*reg);
            info.live && info.dirty
        }) {
            self.fatal(format_args!(
                "Resolving {s_reg} would discard the dirty value in {}",
                dirty.name()
            ));
        }
        self.clobber_reg(reg);
        self.free_temp(RegStorage::Solo32(reg));
        self.free_temp(RegStorage::Solo32(partner));
    }

    fn is_cached_wide(&self, low: TM::Reg, high: TM::Reg, is_pair: bool) -> bool {
        let (low_info, high_info) = (self.info(low), self.info(high));
        if !is_pair {
            return low_info.wide && low == high;
        }
        let linked = low_info.wide
            && high_info.wide
            && low_info.partner == high
            && high_info.partner == low;
        let aligned = !low.is_fp() || (low.num() % 2 == 0 && high.num() == low.num() + 1);
        linked && aligned && low.bank() == high.bank()
    }

    /// Puts the value of a narrow `loc` into a register of `class`.
    ///
    /// A cached value in the wrong bank is copied over. When nothing caches the value a fresh
    /// temp is allocated. With `update` the fresh temp becomes the cache of the SSA name.
    pub fn eval_loc(
        &mut self,
        loc: RegLocation<TM::Reg>,
        class: RegClass,
        update: bool,
        emitter: &mut impl Emitter<TM::Reg>,
    ) -> RegLocation<TM::Reg> {
        if loc.wide {
            return self.eval_loc_wide(loc, class, update, emitter);
        }
        let mut loc = self.update_loc(loc);
        if let Location::PhysReg(reg) = loc.location {
            if !class.accepts(reg) {
                let new_reg = RegStorage::Solo32(self.alloc_typed_temp(loc.fp, class));
                emitter.copy(new_reg, reg);
                self.copy_reg_info(new_reg.low(), reg.low());
                self.clobber(reg);
                loc.location = Location::PhysReg(new_reg);
            }
            return loc;
        }
        let new_reg = RegStorage::Solo32(self.alloc_typed_temp(loc.fp, class));
        loc.location = Location::PhysReg(new_reg);
        if update {
            self.mark_live(&loc);
        }
        loc
    }

    pub fn eval_loc_wide(
        &mut self,
        loc: RegLocation<TM::Reg>,
        class: RegClass,
        update: bool,
        emitter: &mut impl Emitter<TM::Reg>,
    ) -> RegLocation<TM::Reg> {
        debug_assert!(loc.wide);
        let mut loc = self.update_loc_wide(loc);
        if let Location::PhysReg(reg) = loc.location {
            if !class.accepts(reg) {
                let new_reg = self.alloc_typed_temp_wide(loc.fp, class);
                emitter.copy(new_reg, reg);
                self.copy_reg_info_wide(new_reg, reg);
                self.clobber(reg);
                loc.location = Location::PhysReg(new_reg);
            }
            return loc;
        }
        let new_reg = self.alloc_typed_temp_wide(loc.fp, class);
        loc.location = Location::PhysReg(new_reg);
        if update {
            self.mark_live(&loc);
        }
        loc
    }

    /// The location of a narrow call result. The return register is clobbered and claimed.
    pub fn get_return(&mut self, is_float: bool) -> RegLocation<TM::Reg> {
        let kind = if is_float {
            ReturnKind::Float
        } else {
            ReturnKind::Core
        };
        let reg = TM::return_location(kind);
        self.clobber(reg);
        self.lock_temp(reg);
        RegLocation::in_reg(reg, is_float)
    }

    pub fn get_return_wide(&mut self, is_double: bool) -> RegLocation<TM::Reg> {
        let kind = if is_double {
            ReturnKind::Double
        } else {
            ReturnKind::Wide
        };
        let reg = TM::return_location(kind);
        self.clobber(reg);
        self.lock_temp(reg);
        self.mark_wide(reg);
        let mut loc = RegLocation::in_reg(reg, is_double);
        loc.wide = true;
        loc
    }
}
