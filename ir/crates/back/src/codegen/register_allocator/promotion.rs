use std::ops::Index;

use index_vec::IndexVec;
use itertools::Itertools;
use tracing::{
    debug,
    info,
};

use crate::codegen::{
    machine::{
        abi::{
            FpSpillLayout,
            WideFpLayout,
        },
        isa::PhysicalRegister,
        method::{
            Location,
            Method,
        },
        reg::{
            RegStorage,
            VReg,
        },
        TargetMachine,
    },
    register_allocator::RegisterPool,
};

/// Bits of a core vmap table entry holding the virtual register.
const VREG_NUM_WIDTH: u32 = 16;

/// The callee-save registers a virtual register was promoted to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PromotionEntry<R> {
    pub core_reg: Option<R>,
    pub fp_reg: Option<R>,
    /// `fp_reg` holds the whole double starting at this virtual register.
    pub fp_double: bool,
    /// The high word of a double whose register is recorded on the previous virtual register.
    pub fp_high_word: bool,
}

impl<R> PromotionEntry<R> {
    /// Whether the entry can still receive a callee-save FP register.
    pub const fn fp_free(&self) -> bool {
        self.fp_reg.is_none() && !self.fp_high_word
    }
}

impl<R> Default for PromotionEntry<R> {
    fn default() -> Self {
        Self {
            core_reg: None,
            fp_reg: None,
            fp_double: false,
            fp_high_word: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromotionMap<R>(IndexVec<VReg, PromotionEntry<R>>);

impl<R: PhysicalRegister> PromotionMap<R> {
    fn new(num_vregs: usize) -> Self {
        Self(IndexVec::from_vec(vec![PromotionEntry::default(); num_vregs]))
    }

    pub fn iter_enumerated(&self) -> impl Iterator<Item = (VReg, &PromotionEntry<R>)> {
        self.0.iter_enumerated()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn entry_mut(&mut self, vreg: VReg) -> &mut PromotionEntry<R> {
        &mut self.0[vreg]
    }
}

impl<R> Index<VReg> for PromotionMap<R> {
    type Output = PromotionEntry<R>;

    fn index(&self, vreg: VReg) -> &Self::Output {
        &self.0[vreg]
    }
}

/// What the prologue has to save because of promotion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CalleeSaves<R> {
    pub core_spill_mask: u32,
    pub num_core_spills: u32,
    pub fp_spill_mask: u32,
    pub num_fp_spills: u32,
    /// `reg_num << 16 | vreg` for every promoted core register, in promotion order.
    pub core_vmap_table: Vec<u32>,
    /// The virtual register living in each FP spill slot.
    pub fp_vmap_table: Vec<Option<VReg>>,
    pub promoted: Vec<R>,
}

impl<R> Default for CalleeSaves<R> {
    fn default() -> Self {
        Self {
            core_spill_mask: 0,
            num_core_spills: 0,
            fp_spill_mask: 0,
            num_fp_spills: 0,
            core_vmap_table: Vec::new(),
            fp_vmap_table: Vec::new(),
            promoted: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Promotion<R> {
    pub map: PromotionMap<R>,
    pub callee_saves: CalleeSaves<R>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefCount {
    pub vreg: VReg,
    pub count: u32,
}

/// Reference counts per virtual register, one table per kind of register it could live in.
#[derive(Debug, Clone)]
pub struct RefCounts {
    pub core: Vec<RefCount>,
    pub fp_single: Vec<RefCount>,
    pub fp_double: Vec<RefCount>,
}

impl RefCounts {
    pub fn count<TM: TargetMachine>(method: &Method<TM>) -> Self {
        let empty = || -> IndexVec<VReg, RefCount> {
            (0..method.num_vregs())
                .map(|vreg| RefCount {
                    vreg: VReg::new(vreg),
                    count: 0,
                })
                .collect()
        };
        let (mut core, mut fp_single, mut fp_double) = (empty(), empty(), empty());
        for name in method.names() {
            let loc = &name.loc;
            if loc.fp {
                if loc.high_word {
                    // Counted with the low word.
                    continue;
                }
                if loc.wide {
                    fp_double[name.vreg].count += name.use_count;
                } else {
                    fp_single[name.vreg].count += name.use_count;
                }
            } else if !loc.cheap_const {
                core[name.vreg].count += name.use_count;
            }
        }
        Self {
            core: Self::ranked(core),
            fp_single: Self::ranked(fp_single),
            fp_double: Self::ranked(fp_double),
        }
    }

    fn ranked(counts: IndexVec<VReg, RefCount>) -> Vec<RefCount> {
        counts
            .into_iter()
            .sorted_by(|a, b| b.count.cmp(&a.count).then_with(|| a.vreg.cmp(&b.vreg)))
            .collect()
    }

    fn dump(&self) {
        for (kind, counts) in [
            ("core", &self.core),
            ("fp", &self.fp_single),
            ("double", &self.fp_double),
        ] {
            let counts = counts
                .iter()
                .filter(|count| count.count > 0)
                .map(|count| format!("{}:{}", count.vreg, count.count))
                .join(", ");
            debug!("{kind} counts: [{counts}]");
        }
    }
}

/// Assigns callee-save registers to the most referenced virtual registers of a method.
pub struct PromotionPlanner<'pool, TM: TargetMachine> {
    pool: &'pool mut RegisterPool<TM>,
    map: PromotionMap<TM::Reg>,
    callee_saves: CalleeSaves<TM::Reg>,
}

impl<'pool, TM: TargetMachine> PromotionPlanner<'pool, TM> {
    pub fn new(pool: &'pool mut RegisterPool<TM>) -> Self {
        Self {
            pool,
            map: PromotionMap::new(0),
            callee_saves: CalleeSaves::default(),
        }
    }

    /// Plans promotion for `method` and rewrites the location of every SSA name accordingly.
    pub fn run(mut self, method: &mut Method<TM>) -> Promotion<TM::Reg> {
        info!("Promoting registers of {}", method.name);
        let config = *self.pool.config();
        self.map = PromotionMap::new(method.num_vregs());
        self.adjust_spill_mask();
        if config.promote_regs {
            let counts = RefCounts::count(method);
            if config.verbose {
                counts.dump();
            }
            self.promote_doubles(&counts.fp_double, config.promotion_threshold);
            self.promote_singles(&counts.fp_single, config.promotion_threshold);
            self.promote_core(&counts.core, config.promotion_threshold);
        }
        self.update_locations(method);
        if config.verbose {
            self.dump_map();
        }
        Promotion {
            map: self.map,
            callee_saves: self.callee_saves,
        }
    }

    /// Registers every frame saves no matter what was promoted, like the return address.
    fn adjust_spill_mask(&mut self) {
        for reg in self.pool.descriptor().always_spilled {
            self.callee_saves.core_spill_mask |= 1 << reg.num();
            self.callee_saves.num_core_spills += 1;
        }
    }

    fn promote_doubles(&mut self, ranked: &[RefCount], threshold: u32) {
        for candidate in ranked.iter().take_while(|rc| rc.count >= threshold) {
            let (low, high) = (candidate.vreg, candidate.vreg + 1);
            if high.index() >= self.map.len() {
                continue;
            }
            if !(self.map[low].fp_free() && self.map[high].fp_free()) {
                continue;
            }
            // The halves may still be promoted as singles.
            if self.alloc_preserved_double(low).is_none() {
                debug!("No callee-save register pair left for {low}");
            }
        }
    }

    fn promote_singles(&mut self, ranked: &[RefCount], threshold: u32) {
        for candidate in ranked.iter().take_while(|rc| rc.count >= threshold) {
            if !self.map[candidate.vreg].fp_free() {
                continue;
            }
            if self.alloc_preserved_single(candidate.vreg).is_none() {
                break;
            }
        }
    }

    fn promote_core(&mut self, ranked: &[RefCount], threshold: u32) {
        for candidate in ranked.iter().take_while(|rc| rc.count >= threshold) {
            if self.map[candidate.vreg].core_reg.is_some() {
                continue;
            }
            if self.alloc_preserved_core(candidate.vreg).is_none() {
                break;
            }
        }
    }

    fn alloc_preserved_core(&mut self, vreg: VReg) -> Option<TM::Reg> {
        let reg = self
            .pool
            .core_regs
            .iter()
            .find(|info| !info.is_temp && !info.in_use)?
            .reg;
        self.pool.mark_in_use(reg);
        self.callee_saves.core_spill_mask |= 1 << reg.num();
        self.callee_saves.num_core_spills += 1;
        self.callee_saves
            .core_vmap_table
            .push((u32::from(reg.num()) << VREG_NUM_WIDTH) | (vreg.raw() & 0xffff));
        self.callee_saves.promoted.push(reg);
        self.map.entry_mut(vreg).core_reg = Some(reg);
        debug!("Promoted {vreg} to {}", reg.name());
        Some(reg)
    }

    fn alloc_preserved_single(&mut self, vreg: VReg) -> Option<TM::Reg> {
        let reg = self
            .pool
            .fp_regs
            .iter()
            .find(|info| !info.is_temp && !info.in_use)?
            .reg;
        self.record_fp_promotion(reg, vreg);
        Some(reg)
    }

    fn alloc_preserved_double(&mut self, vreg: VReg) -> Option<RegStorage<TM::Reg>> {
        match self.pool.descriptor().wide_fp {
            WideFpLayout::EvenOddPair => {
                let (low, high) = self
                    .pool
                    .fp_regs
                    .iter()
                    .tuple_windows()
                    .find(|(low, high)| {
                        !low.is_temp
                            && !low.in_use
                            && !high.is_temp
                            && !high.in_use
                            && low.reg.num() % 2 == 0
                            && high.reg.num() == low.reg.num() + 1
                    })
                    .map(|(low, high)| (low.reg, high.reg))?;
                self.record_fp_promotion(low, vreg);
                self.record_fp_promotion(high, vreg + 1);
                Some(RegStorage::Pair { low, high })
            }
            WideFpLayout::Solo => {
                let reg = self
                    .pool
                    .fp_regs
                    .iter()
                    .find(|info| !info.is_temp && !info.in_use)?
                    .reg;
                self.record_fp_promotion(reg, vreg);
                // The high word shares the frame slot pair, not the register.
                self.map.entry_mut(vreg).fp_double = true;
                self.map.entry_mut(vreg + 1).fp_high_word = true;
                Some(RegStorage::Solo64(reg))
            }
        }
    }

    fn record_fp_promotion(&mut self, reg: TM::Reg, vreg: VReg) {
        self.pool.mark_in_use(reg);
        self.mark_preserved_single(reg, vreg);
        self.callee_saves.promoted.push(reg);
        self.map.entry_mut(vreg).fp_reg = Some(reg);
        debug!("Promoted {vreg} to {}", reg.name());
    }

    fn mark_preserved_single(&mut self, reg: TM::Reg, vreg: VReg) {
        let saves = &mut self.callee_saves;
        match self.pool.descriptor().fp_spills {
            FpSpillLayout::Contiguous { base } => {
                let Some(slot) = reg.num().checked_sub(base) else {
                    self.pool.fatal(format_args!(
                        "{} lies below the callee-save FP block",
                        reg.name()
                    ));
                };
                let slot = usize::from(slot);
                if saves.fp_vmap_table.len() <= slot {
                    saves.fp_vmap_table.resize(slot + 1, None);
                }
                saves.fp_vmap_table[slot] = Some(vreg);
                // The whole block up to the highest promoted register gets saved.
                let num_spills = saves.fp_vmap_table.len() as u32;
                saves.num_fp_spills = num_spills;
                saves.fp_spill_mask = ((1 << num_spills) - 1) << base;
            }
            FpSpillLayout::Individual => {
                saves.fp_spill_mask |= 1 << reg.num();
                saves.num_fp_spills += 1;
                saves.fp_vmap_table.push(Some(vreg));
            }
        }
    }

    fn update_locations(&self, method: &mut Method<TM>) {
        let wide_fp = self.pool.descriptor().wide_fp;
        for name in method.names_mut().iter_mut() {
            let loc = &mut name.loc;
            if loc.high_word {
                continue;
            }
            let entry = self.map[name.vreg];
            if !loc.wide {
                let reg = if loc.fp { entry.fp_reg } else { entry.core_reg };
                if let Some(reg) = reg {
                    loc.location = Location::PhysReg(RegStorage::Solo32(reg));
                    loc.home = true;
                }
                continue;
            }
            let high_vreg = name.vreg + 1;
            if high_vreg.index() >= self.map.len() {
                continue;
            }
            let high_entry = self.map[high_vreg];
            let reg = if loc.fp {
                match (wide_fp, entry.fp_reg, high_entry.fp_reg) {
                    (WideFpLayout::EvenOddPair, Some(low), Some(high)) => (low.num() % 2 == 0
                        && high.num() == low.num() + 1)
                        .then(|| TM::fuse_double(low, high)),
                    (WideFpLayout::Solo, Some(reg), None) if entry.fp_double => {
                        Some(TM::fuse_double(reg, reg))
                    }
                    _ => None,
                }
            } else {
                match (entry.core_reg, high_entry.core_reg) {
                    (Some(low), Some(high)) => Some(RegStorage::Pair { low, high }),
                    _ => None,
                }
            };
            if let Some(reg) = reg {
                loc.location = Location::PhysReg(reg);
                loc.home = true;
            }
        }
    }

    fn dump_map(&self) {
        for (vreg, entry) in self.map.iter_enumerated() {
            let core = entry.core_reg.map_or("-", |reg| reg.name());
            let fp = if entry.fp_high_word {
                "(high word)"
            } else {
                entry.fp_reg.map_or("-", |reg| reg.name())
            };
            let double = if entry.fp_double { " (double)" } else { "" };
            debug!("{vreg}: core={core} fp={fp}{double}");
        }
    }
}

#[cfg(test)]
mod tests {
    use tracing_test::traced_test;

    use crate::{
        codegen::{
            machine::{
                method::{
                    Home,
                    Method,
                },
                reg::{
                    RegStorage,
                    VReg,
                },
                Bank,
                PhysicalRegister,
            },
            register_allocator::{
                promotion::RefCounts,
                PromotionPlanner,
                RegAllocConfig,
                RegisterPool,
            },
            targets::{
                arm::{
                    Thumb2,
                    Thumb2Reg,
                },
                mips::{
                    Mips,
                    MipsReg,
                },
                x86::{
                    X86Reg,
                    X86,
                },
            },
        },
        test_utils::{
            TestReg,
            TestTarget,
        },
    };

    fn v(vreg: usize) -> VReg {
        VReg::new(vreg)
    }

    #[test]
    #[traced_test]
    fn hottest_vreg_gets_the_only_callee_save() {
        let mut pool = RegisterPool::<TestTarget>::new();
        pool.mark_in_use(TestReg::R4);
        pool.mark_in_use(TestReg::R5);
        let mut method = Method::new("hot", 3);
        let cold = method.define(v(0), false);
        let hot = method.define(v(1), false);
        let warm = method.define(v(2), false);
        method.add_uses(cold, 1);
        method.add_uses(hot, 10);
        method.add_uses(warm, 5);
        let promotion = PromotionPlanner::new(&mut pool).run(&mut method);
        assert_eq!(promotion.map[v(1)].core_reg, Some(TestReg::R6));
        assert_eq!(promotion.map[v(0)].core_reg, None);
        assert_eq!(promotion.map[v(2)].core_reg, None);
        assert_eq!(method.home(hot), Home::Reg(TestReg::R6));
        assert_eq!(method.home(warm), Home::Stack);
        assert_eq!(promotion.callee_saves.core_spill_mask, 1 << 6);
        assert_eq!(promotion.callee_saves.core_vmap_table, vec![(6 << 16) | 1]);
    }

    #[test]
    fn ties_break_by_vreg_number() {
        let mut method = Method::<TestTarget>::new("ties", 4);
        for vreg in (0..4).rev() {
            let s_reg = method.define(v(vreg), false);
            method.add_uses(s_reg, 3);
        }
        let counts = RefCounts::count(&method);
        let order = counts.core.iter().map(|rc| rc.vreg.index()).collect::<Vec<_>>();
        assert_eq!(order, vec![0, 1, 2, 3]);
    }

    #[test]
    fn cheap_constants_are_not_counted_for_core() {
        let mut method = Method::<TestTarget>::new("consts", 2);
        let constant = method.define_cheap_const(v(0));
        method.add_uses(constant, 100);
        let counts = RefCounts::count(&method);
        assert!(counts.core.iter().all(|rc| rc.count == 0));
    }

    #[test]
    fn wide_fp_names_count_once_as_double() {
        let mut method = Method::<TestTarget>::new("doubles", 4);
        let low = method.define_wide(v(2), true);
        method.add_uses(low, 4);
        let high = method.high_sreg(low);
        method.add_uses(high, 4);
        let counts = RefCounts::count(&method);
        assert_eq!(counts.fp_double[0].vreg, v(2));
        assert_eq!(counts.fp_double[0].count, 4);
        assert!(counts.fp_single.iter().all(|rc| rc.count == 0));
    }

    #[test]
    fn below_threshold_stays_on_the_stack() {
        let mut config = RegAllocConfig::promotion_only();
        config.promotion_threshold = 3;
        let mut pool = RegisterPool::<TestTarget>::with_config(config);
        let mut method = Method::new("threshold", 2);
        let rare = method.define(v(0), false);
        method.add_uses(rare, 2);
        let never = method.define(v(1), false);
        let promotion = PromotionPlanner::new(&mut pool).run(&mut method);
        assert_eq!(method.home(rare), Home::Stack);
        assert_eq!(method.home(never), Home::Stack);
        assert!(promotion.callee_saves.promoted.is_empty());
    }

    #[test]
    fn disabled_promotion_only_records_fixed_spills() {
        let mut pool = RegisterPool::<Thumb2>::with_config(RegAllocConfig::all_disabled());
        let mut method = Method::new("o0", 1);
        let s_reg = method.define(v(0), false);
        method.add_uses(s_reg, 50);
        let promotion = PromotionPlanner::new(&mut pool).run(&mut method);
        assert_eq!(method.home(s_reg), Home::Stack);
        assert_eq!(
            promotion.callee_saves.core_spill_mask,
            1 << Thumb2Reg::Lr.num()
        );
        assert_eq!(promotion.callee_saves.num_core_spills, 1);
    }

    #[test]
    fn double_without_a_pair_falls_back_to_single() {
        let mut pool = RegisterPool::<TestTarget>::new();
        for reg in [TestReg::F4, TestReg::F5, TestReg::F6] {
            pool.mark_in_use(reg);
        }
        let mut method = Method::new("fallback", 2);
        let double = method.define_wide(v(0), true);
        method.add_uses(double, 8);
        let single = method.define(v(0), true);
        method.add_uses(single, 2);
        let promotion = PromotionPlanner::new(&mut pool).run(&mut method);
        assert_eq!(promotion.map[v(0)].fp_reg, Some(TestReg::F7));
        assert_eq!(promotion.map[v(1)].fp_reg, None);
        assert_eq!(method.home(double), Home::Stack);
        assert_eq!(method.home(single), Home::Reg(TestReg::F7));
    }

    #[test]
    fn promoted_double_uses_an_aligned_pair() {
        let mut pool = RegisterPool::<TestTarget>::new();
        pool.mark_in_use(TestReg::F4);
        let mut method = Method::new("pair", 2);
        let double = method.define_wide(v(0), true);
        method.add_uses(double, 8);
        let promotion = PromotionPlanner::new(&mut pool).run(&mut method);
        assert_eq!(promotion.map[v(0)].fp_reg, Some(TestReg::F6));
        assert_eq!(promotion.map[v(1)].fp_reg, Some(TestReg::F7));
        assert_eq!(method.home(double), Home::Pair(TestReg::F6, TestReg::F7));
        // Slots 0..=3 of the block based at f4 are saved even though f4 is not promoted.
        assert_eq!(promotion.callee_saves.num_fp_spills, 4);
        assert_eq!(promotion.callee_saves.fp_spill_mask, 0b1111 << 4);
        assert_eq!(
            promotion.callee_saves.fp_vmap_table,
            vec![None, None, Some(v(0)), Some(v(1))]
        );
    }

    #[test]
    fn arm_reports_promoted_doubles_as_d_registers() {
        let mut pool = RegisterPool::<Thumb2>::new();
        let mut method = Method::new("arm", 2);
        let double = method.define_wide(v(0), true);
        method.add_uses(double, 8);
        PromotionPlanner::new(&mut pool).run(&mut method);
        assert_eq!(
            method.loc(double).reg(),
            Some(RegStorage::Solo64(Thumb2Reg::D8))
        );
        assert!(pool.info(Thumb2Reg::S16).in_use);
        assert!(pool.info(Thumb2Reg::S17).in_use);
    }

    #[test]
    fn mips_reports_promoted_doubles_as_pairs() {
        let mut pool = RegisterPool::<Mips>::new();
        for reg in [MipsReg::S2, MipsReg::S3] {
            pool.mark_in_use(reg);
        }
        let mut method = Method::new("mips", 4);
        let wide = method.define_wide(v(0), false);
        method.add_uses(wide, 2);
        let high = method.high_sreg(wide);
        method.add_uses(high, 2);
        let promotion = PromotionPlanner::new(&mut pool).run(&mut method);
        let low_reg = promotion.map[v(0)].core_reg;
        let high_reg = promotion.map[v(1)].core_reg;
        assert_eq!(low_reg, Some(MipsReg::S4));
        assert_eq!(high_reg, Some(MipsReg::S5));
        assert_eq!(method.home(wide), Home::Pair(MipsReg::S4, MipsReg::S5));
        assert_ne!(promotion.callee_saves.core_spill_mask & (1 << MipsReg::Ra.num()), 0);
    }

    #[test]
    fn x86_promotes_doubles_into_one_register() {
        let mut pool = RegisterPool::<X86>::new();
        let mut method = Method::new("x86", 2);
        let double = method.define_wide(v(0), true);
        method.add_uses(double, 3);
        let promotion = PromotionPlanner::new(&mut pool).run(&mut method);
        assert!(promotion.map[v(0)].fp_reg.is_some());
        assert!(promotion.map[v(0)].fp_double);
        assert_eq!(promotion.map[v(1)].fp_reg, None);
        assert!(promotion.map[v(1)].fp_high_word);
        assert!(matches!(method.home(double), Home::Reg(X86Reg::Xmm6 | X86Reg::Xmm7)));
        assert_eq!(promotion.callee_saves.num_fp_spills, 1);
    }

    #[test]
    fn x86_double_high_word_keeps_narrow_floats_on_the_stack() {
        let mut pool = RegisterPool::<X86>::new();
        let mut method = Method::new("x86", 2);
        let double = method.define_wide(v(0), true);
        method.add_uses(double, 8);
        let low_float = method.define(v(0), true);
        method.add_uses(low_float, 2);
        let high_float = method.define(v(1), true);
        method.add_uses(high_float, 2);
        let promotion = PromotionPlanner::new(&mut pool).run(&mut method);
        let Home::Reg(reg) = method.home(double) else {
            panic!("double was not promoted");
        };
        assert_eq!(method.home(low_float), Home::Reg(reg));
        assert_eq!(method.home(high_float), Home::Stack);
        assert_eq!(promotion.map[v(1)].fp_reg, None);
        // The other callee-save xmm register stays unclaimed.
        assert_eq!(promotion.callee_saves.num_fp_spills, 1);
    }

    #[test]
    fn singles_stop_at_the_first_failure() {
        let mut pool = RegisterPool::<TestTarget>::new();
        let mut method = Method::new("singles", 6);
        for (vreg, uses) in [10, 9, 8, 7, 6].into_iter().enumerate() {
            let s_reg = method.define(v(vreg), true);
            method.add_uses(s_reg, uses);
        }
        let promotion = PromotionPlanner::new(&mut pool).run(&mut method);
        let promoted = (0..5)
            .filter(|vreg| promotion.map[v(*vreg)].fp_reg.is_some())
            .count();
        assert_eq!(promoted, 4);
        assert_eq!(promotion.map[v(4)].fp_reg, None);
        assert!(pool
            .bank(Bank::Fp)
            .iter()
            .all(|info| info.in_use || info.is_temp));
    }

    #[test]
    fn identical_counts_promote_identically() {
        let plan = || {
            let mut pool = RegisterPool::<TestTarget>::new();
            let mut method = Method::new("repeat", 8);
            for vreg in 0..8 {
                let s_reg = method.define(v(vreg), vreg % 3 == 0);
                method.add_uses(s_reg, 4);
            }
            PromotionPlanner::new(&mut pool).run(&mut method).map
        };
        let first = plan();
        for _ in 0..4 {
            assert_eq!(plan(), first);
        }
    }
}
