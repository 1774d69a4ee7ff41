use tracing::{
    debug,
    trace,
};

use crate::codegen::{
    machine::{
        abi::WideFpLayout,
        isa::PhysicalRegister,
        reg::RegStorage,
        Bank,
        RegClass,
        TargetMachine,
    },
    register_allocator::{
        RegIdx,
        RegisterInfo,
        RegisterPool,
    },
};

impl<TM: TargetMachine> RegisterPool<TM> {
    /// Picks a temp from `bank`, scanning round-robin from the bank's cursor.
    ///
    /// The first pass only accepts temps that do not cache a value, the second takes any free
    /// temp and clobbers whatever it cached.
    pub fn alloc_temp_body(&mut self, bank: Bank, required: bool) -> Option<TM::Reg> {
        let reg = self
            .scan_for_temp(bank, |info| !info.live)
            .or_else(|| self.scan_for_temp(bank, |_| true));
        if reg.is_none() && required {
            self.fatal(format_args!("No free temp registers in {bank} bank"));
        }
        reg
    }

    fn scan_for_temp(
        &mut self,
        bank: Bank,
        accept: impl Fn(&RegisterInfo<TM::Reg>) -> bool,
    ) -> Option<TM::Reg> {
        let num_regs = self.bank(bank).len();
        let mut next = self.cursor(bank);
        for _ in 0..num_regs {
            if next >= num_regs {
                next = 0;
            }
            let info = &self.bank(bank)[RegIdx::new(next)];
            if info.is_available_temp() && accept(info) {
                let reg = info.reg;
                self.clobber_reg(reg);
                self.info_mut(reg).in_use = true;
                self.set_cursor(bank, next + 1);
                trace!("Allocated temp {}", reg.name());
                return Some(reg);
            }
            next += 1;
        }
        None
    }

    const fn cursor(&self, bank: Bank) -> usize {
        match bank {
            Bank::Core => self.next_core_reg,
            Bank::Fp => self.next_fp_reg,
        }
    }

    fn set_cursor(&mut self, bank: Bank, next: usize) {
        match bank {
            Bank::Core => self.next_core_reg = next,
            Bank::Fp => self.next_fp_reg = next,
        }
    }

    /// Allocates a core temp.
    ///
    /// # Panics
    ///
    /// If every core temp is claimed.
    pub fn alloc_temp(&mut self) -> TM::Reg {
        match self.alloc_temp_body(Bank::Core, true) {
            Some(reg) => reg,
            None => unreachable!("required temp allocation returned nothing"),
        }
    }

    pub fn alloc_free_temp(&mut self) -> Option<TM::Reg> {
        self.alloc_temp_body(Bank::Core, false)
    }

    pub fn alloc_temp_float(&mut self) -> TM::Reg {
        match self.alloc_temp_body(Bank::Fp, true) {
            Some(reg) => reg,
            None => unreachable!("required temp allocation returned nothing"),
        }
    }

    /// Allocates two core temps and links them into a pair.
    pub fn alloc_temp_wide(&mut self) -> RegStorage<TM::Reg> {
        let low = self.alloc_temp();
        let high = self.alloc_temp();
        let reg = RegStorage::Pair { low, high };
        self.mark_wide(reg);
        reg
    }

    /// Allocates a temp able to hold a double.
    ///
    /// On targets pairing FP registers the result is an even register and the odd one after it.
    pub fn alloc_temp_double(&mut self) -> RegStorage<TM::Reg> {
        let reg = match self.descriptor.wide_fp {
            WideFpLayout::Solo => RegStorage::Solo64(self.alloc_temp_float()),
            WideFpLayout::EvenOddPair => {
                let pair = self
                    .scan_for_double(|low, high| !low.live && !high.live)
                    .or_else(|| self.scan_for_double(|_, _| true));
                match pair {
                    Some(pair) => pair,
                    None => self.fatal("No free temp registers (pair)"),
                }
            }
        };
        self.mark_wide(reg);
        reg
    }

    fn scan_for_double(
        &mut self,
        accept: impl Fn(&RegisterInfo<TM::Reg>, &RegisterInfo<TM::Reg>) -> bool,
    ) -> Option<RegStorage<TM::Reg>> {
        let num_regs = self.fp_regs.len();
        if num_regs < 2 {
            return None;
        }
        let mut next = self.next_fp_reg & !1;
        for _ in (0..num_regs).step_by(2) {
            if next + 1 >= num_regs {
                next = 0;
            }
            let low = &self.fp_regs[RegIdx::new(next)];
            let high = &self.fp_regs[RegIdx::new(next + 1)];
            let aligned = low.reg.num() % 2 == 0 && high.reg.num() == low.reg.num() + 1;
            if aligned
                && low.is_available_temp()
                && high.is_available_temp()
                && accept(low, high)
            {
                let (low, high) = (low.reg, high.reg);
                self.clobber_reg(low);
                self.clobber_reg(high);
                self.info_mut(low).in_use = true;
                self.info_mut(high).in_use = true;
                self.next_fp_reg = next + 2;
                trace!("Allocated double temp {}:{}", low.name(), high.name());
                return Some(RegStorage::Pair { low, high });
            }
            next += 2;
        }
        None
    }

    /// Allocates a temp of the requested class. `fp_hint` decides for [`RegClass::Any`].
    pub fn alloc_typed_temp(&mut self, fp_hint: bool, class: RegClass) -> TM::Reg {
        if (class == RegClass::Any && fp_hint) || class == RegClass::Fp {
            self.alloc_temp_float()
        } else {
            self.alloc_temp()
        }
    }

    pub fn alloc_typed_temp_wide(&mut self, fp_hint: bool, class: RegClass) -> RegStorage<TM::Reg> {
        if (class == RegClass::Any && fp_hint) || class == RegClass::Fp {
            self.alloc_temp_double()
        } else {
            self.alloc_temp_wide()
        }
    }

    /// Releases a temp. Freeing either half of a wide pair releases both halves.
    ///
    /// Liveness and pairing are kept, a later allocation of the same name may still find the
    /// cached value. The pairing goes away once either half is clobbered or reallocated.
    pub fn free_temp(&mut self, reg: RegStorage<TM::Reg>) {
        for reg in self.storage_regs(reg) {
            let info = self.info(reg);
            let partner = info.is_paired().then_some(info.partner);
            self.release(reg);
            if let Some(partner) = partner {
                self.release(partner);
            }
        }
    }

    fn release(&mut self, reg: TM::Reg) {
        let info = self.info_mut(reg);
        if info.is_temp {
            info.in_use = false;
        }
    }

    /// Links the registers of `reg` into one wide value.
    pub fn mark_wide(&mut self, reg: RegStorage<TM::Reg>) {
        match self.storage_regs(reg).as_slice() {
            &[low, high] => {
                let (low_info, high_info) = (self.info(low), self.info(high));
                let in_use = low_info.in_use || high_info.in_use;
                let both_temps = low_info.is_temp && high_info.is_temp;
                for (reg, partner) in [(low, high), (high, low)] {
                    let info = self.info_mut(reg);
                    info.wide = true;
                    info.partner = partner;
                    if both_temps {
                        info.in_use = in_use;
                    }
                }
                debug!("Paired {} with {}", low.name(), high.name());
            }
            &[reg] => {
                let info = self.info_mut(reg);
                info.wide = true;
                info.partner = reg;
            }
            _ => unreachable!("register storage has one or two registers"),
        }
    }
}

#[cfg(test)]
mod tests {
    use tracing_test::traced_test;

    use crate::{
        codegen::{
            machine::{
                reg::{
                    RegStorage,
                    SReg,
                },
                Bank,
                PhysicalRegister,
                RegClass,
            },
            register_allocator::{
                PoolVerifier,
                RegisterPool,
            },
            targets::x86::X86,
        },
        test_utils::{
            TestReg,
            TestTarget,
        },
    };

    fn cache(pool: &mut RegisterPool<TestTarget>, reg: TestReg, s_reg: usize) {
        let info = pool.info_mut(reg);
        info.live = true;
        info.s_reg = Some(SReg::new(s_reg));
    }

    #[test]
    #[traced_test]
    fn freed_temp_is_handed_out_again() {
        let mut pool = RegisterPool::<TestTarget>::new();
        let regs = [
            pool.alloc_temp(),
            pool.alloc_temp(),
            pool.alloc_temp(),
            pool.alloc_temp(),
        ];
        assert_eq!(regs, [TestReg::R0, TestReg::R1, TestReg::R2, TestReg::R3]);
        pool.free_temp(RegStorage::Solo32(regs[0]));
        assert_eq!(pool.alloc_temp(), TestReg::R0);
    }

    #[test]
    fn allocation_rotates_through_temps() {
        let mut pool = RegisterPool::<TestTarget>::new();
        let first = pool.alloc_temp();
        pool.free_temp(RegStorage::Solo32(first));
        let second = pool.alloc_temp();
        assert_ne!(first, second);
    }

    #[test]
    fn first_pass_skips_temps_caching_values() {
        let mut pool = RegisterPool::<TestTarget>::new();
        cache(&mut pool, TestReg::R0, 0);
        cache(&mut pool, TestReg::R1, 1);
        cache(&mut pool, TestReg::R2, 2);
        assert_eq!(pool.alloc_temp(), TestReg::R3);
        assert!(pool.info(TestReg::R0).live);
    }

    #[test]
    fn second_pass_clobbers_cached_value() {
        let mut pool = RegisterPool::<TestTarget>::new();
        for (s_reg, reg) in [TestReg::R0, TestReg::R1, TestReg::R2, TestReg::R3]
            .into_iter()
            .enumerate()
        {
            cache(&mut pool, reg, s_reg);
        }
        let reg = pool.alloc_temp();
        assert_eq!(reg, TestReg::R0);
        let info = pool.info(reg);
        assert!(info.in_use);
        assert!(!info.live);
        assert_eq!(info.s_reg, None);
        assert!(pool.info(TestReg::R1).live);
    }

    #[test]
    fn free_temp_returns_none_when_exhausted() {
        let mut pool = RegisterPool::<TestTarget>::new();
        for _ in 0..4 {
            assert!(pool.alloc_free_temp().is_some());
        }
        assert_eq!(pool.alloc_free_temp(), None);
    }

    #[test]
    #[traced_test]
    #[should_panic(expected = "No free temp registers")]
    fn exhausting_temps_is_fatal() {
        let mut pool = RegisterPool::<TestTarget>::new();
        for _ in 0..5 {
            pool.alloc_temp();
        }
    }

    #[test]
    fn double_temps_are_aligned_pairs() {
        let mut pool = RegisterPool::<TestTarget>::new();
        let first = pool.alloc_temp_double();
        let second = pool.alloc_temp_double();
        assert_eq!(
            first,
            RegStorage::Pair {
                low: TestReg::F0,
                high: TestReg::F1
            }
        );
        assert_eq!(
            second,
            RegStorage::Pair {
                low: TestReg::F2,
                high: TestReg::F3
            }
        );
        let low = pool.info(TestReg::F0);
        let high = pool.info(TestReg::F1);
        assert!(low.wide && high.wide);
        assert_eq!(low.partner, TestReg::F1);
        assert_eq!(high.partner, TestReg::F0);
        assert!(PoolVerifier::new(&pool).verify().is_empty());
    }

    #[test]
    fn single_float_temp_survives_when_no_pair_is_free() {
        let mut pool = RegisterPool::<TestTarget>::new();
        pool.alloc_temp_double();
        pool.alloc_temp_float();
        assert_eq!(pool.alloc_temp_float(), TestReg::F3);
    }

    #[test]
    #[should_panic(expected = "No free temp registers (pair)")]
    fn double_without_free_pair_is_fatal() {
        let mut pool = RegisterPool::<TestTarget>::new();
        pool.alloc_temp_double();
        // F2 taken, F3 alone cannot hold a double.
        pool.alloc_temp_float();
        pool.alloc_temp_double();
    }

    #[test]
    fn double_temp_on_x86_is_one_register() {
        let mut pool = RegisterPool::<X86>::new();
        let reg = pool.alloc_temp_double();
        let RegStorage::Solo64(xmm) = reg else {
            panic!("expected a solo register, got {reg}");
        };
        let info = pool.info(xmm);
        assert!(info.wide);
        assert_eq!(info.partner, xmm);
        assert!(xmm.is_fp());
    }

    #[test]
    fn wide_core_temps_are_partnered() {
        let mut pool = RegisterPool::<TestTarget>::new();
        let reg = pool.alloc_temp_wide();
        let RegStorage::Pair { low, high } = reg else {
            panic!("expected a pair, got {reg}");
        };
        assert_eq!(pool.info(low).partner, high);
        assert_eq!(pool.info(high).partner, low);
        assert!(pool.info(low).in_use && pool.info(high).in_use);
    }

    #[test]
    fn freeing_one_half_releases_the_pair() {
        let mut pool = RegisterPool::<TestTarget>::new();
        let reg = pool.alloc_temp_wide();
        pool.free_temp(RegStorage::Solo32(reg.low()));
        let RegStorage::Pair { low, high } = reg else {
            panic!("expected a pair, got {reg}");
        };
        for (reg, partner) in [(low, high), (high, low)] {
            let info = pool.info(reg);
            assert!(!info.in_use);
            assert!(info.wide);
            assert_eq!(info.partner, partner);
        }
        assert!(PoolVerifier::new(&pool).verify().is_empty());
    }

    #[test]
    fn reallocating_a_freed_half_unpairs_both() {
        let mut pool = RegisterPool::<TestTarget>::new();
        let reg = pool.alloc_temp_wide();
        pool.free_temp(reg);
        pool.set_cursor(Bank::Core, 0);
        let taken = pool.alloc_temp();
        assert!(reg.regs().contains(&taken));
        for reg in reg.regs() {
            let info = pool.info(reg);
            assert!(!info.wide);
            assert_eq!(info.partner, reg);
        }
        assert!(PoolVerifier::new(&pool).verify().is_empty());
    }

    #[test]
    fn typed_temps_follow_the_class() {
        let mut pool = RegisterPool::<TestTarget>::new();
        assert!(matches!(
            pool.alloc_typed_temp(true, RegClass::Any),
            TestReg::F0 | TestReg::F1 | TestReg::F2 | TestReg::F3
        ));
        assert!(matches!(
            pool.alloc_typed_temp(true, RegClass::Core),
            TestReg::R0 | TestReg::R1 | TestReg::R2 | TestReg::R3
        ));
        assert!(pool.alloc_typed_temp_wide(false, RegClass::Fp).is_fp());
        assert!(!pool.alloc_typed_temp_wide(false, RegClass::Any).is_fp());
    }
}
