use std::{
    fmt::{
        Display,
        Formatter,
    },
    ops::Range,
};

use index_vec::IndexVec;
use itertools::Itertools;
use rustc_hash::FxHashMap;
use smallvec::{
    smallvec,
    SmallVec,
};
use tracing::{
    debug,
    error,
    info,
};

pub use config::RegAllocConfig;
pub use promotion::{
    CalleeSaves,
    Promotion,
    PromotionEntry,
    PromotionMap,
    PromotionPlanner,
};
pub use verifier::{
    PoolError,
    PoolVerifier,
};

use crate::codegen::machine::{
    abi::BankDescriptor,
    isa::PhysicalRegister,
    reg::{
        RegStorage,
        SReg,
    },
    Bank,
    LirId,
    TargetMachine,
};

pub mod config;
mod def_range;
mod flush;
mod liveness;
pub mod promotion;
mod temp;
pub mod verifier;

index_vec::define_index_type! {
    pub struct RegIdx = u16;

    DISPLAY_FORMAT = "{}";
}

/// Allocation state of a single physical register.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterInfo<R> {
    pub reg: R,
    /// The other half of a wide value. Equal to `reg` when not paired.
    pub partner: R,
    pub is_temp: bool,
    pub in_use: bool,
    /// The register holds the current value of `s_reg`.
    pub live: bool,
    /// The register holds a value newer than the frame slot of `s_reg`.
    pub dirty: bool,
    pub wide: bool,
    pub s_reg: Option<SReg>,
    /// Instructions that computed the cached value, nopped if the value turns out dead.
    pub def_range: Option<Range<LirId>>,
}

impl<R: PhysicalRegister> RegisterInfo<R> {
    pub const fn new(reg: R) -> Self {
        Self {
            reg,
            partner: reg,
            is_temp: false,
            in_use: false,
            live: false,
            dirty: false,
            wide: false,
            s_reg: None,
            def_range: None,
        }
    }

    pub fn is_paired(&self) -> bool {
        self.wide && self.partner != self.reg
    }

    pub fn is_available_temp(&self) -> bool {
        self.is_temp && !self.in_use
    }

    fn unpair(&mut self) {
        self.wide = false;
        self.partner = self.reg;
    }
}

impl<R: PhysicalRegister> Display for RegisterInfo<R> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{:>6}: temp={:<5} in_use={:<5} live={:<5} dirty={:<5} wide={:<5} partner={:<6} s_reg=",
            self.reg.name(),
            self.is_temp,
            self.in_use,
            self.live,
            self.dirty,
            self.wide,
            self.partner.name(),
        )?;
        match self.s_reg {
            Some(s_reg) => write!(f, "{s_reg}")?,
            None => write!(f, "-")?,
        }
        if let Some(def_range) = &self.def_range {
            write!(f, " def={}..{}", def_range.start, def_range.end)?;
        }
        Ok(())
    }
}

/// The per-method register pool.
///
/// Tracks for every allocatable register of the target whether it is a temp, whether it is
/// claimed and which SSA name's value it currently caches.
#[derive(Debug, Clone)]
pub struct RegisterPool<TM: TargetMachine> {
    core_regs: IndexVec<RegIdx, RegisterInfo<TM::Reg>>,
    fp_regs: IndexVec<RegIdx, RegisterInfo<TM::Reg>>,
    next_core_reg: usize,
    next_fp_reg: usize,
    reg_map: FxHashMap<TM::Reg, (Bank, RegIdx)>,
    descriptor: BankDescriptor<TM::Reg>,
    config: RegAllocConfig,
}

impl<TM: TargetMachine> Default for RegisterPool<TM> {
    fn default() -> Self {
        Self::new()
    }
}

impl<TM: TargetMachine> RegisterPool<TM> {
    pub fn new() -> Self {
        Self::with_config(RegAllocConfig::default())
    }

    pub fn with_config(config: RegAllocConfig) -> Self {
        let descriptor = TM::bank_descriptor();
        let mut reg_map = FxHashMap::default();
        let core_regs = Self::init_bank(Bank::Core, descriptor.core_regs, &mut reg_map);
        let fp_regs = Self::init_bank(Bank::Fp, descriptor.fp_regs, &mut reg_map);
        let mut pool = Self {
            core_regs,
            fp_regs,
            next_core_reg: descriptor.next_core_reg,
            next_fp_reg: descriptor.next_fp_reg,
            reg_map,
            descriptor,
            config,
        };
        for reg in descriptor.reserved {
            pool.mark_in_use(*reg);
        }
        for reg in descriptor.core_temps.iter().chain(descriptor.fp_temps) {
            pool.mark_temp(*reg);
        }
        debug!(
            "Initialized register pool for {} with {} core and {} fp registers",
            TM::arch(),
            pool.core_regs.len(),
            pool.fp_regs.len()
        );
        pool
    }

    fn init_bank(
        bank: Bank,
        regs: &[TM::Reg],
        reg_map: &mut FxHashMap<TM::Reg, (Bank, RegIdx)>,
    ) -> IndexVec<RegIdx, RegisterInfo<TM::Reg>> {
        let mut infos = IndexVec::with_capacity(regs.len());
        for reg in regs {
            let idx = infos.push(RegisterInfo::new(*reg));
            reg_map.insert(*reg, (bank, idx));
        }
        infos
    }

    pub const fn config(&self) -> &RegAllocConfig {
        &self.config
    }

    pub const fn descriptor(&self) -> &BankDescriptor<TM::Reg> {
        &self.descriptor
    }

    pub const fn bank(&self, bank: Bank) -> &IndexVec<RegIdx, RegisterInfo<TM::Reg>> {
        match bank {
            Bank::Core => &self.core_regs,
            Bank::Fp => &self.fp_regs,
        }
    }

    fn bank_mut(&mut self, bank: Bank) -> &mut IndexVec<RegIdx, RegisterInfo<TM::Reg>> {
        match bank {
            Bank::Core => &mut self.core_regs,
            Bank::Fp => &mut self.fp_regs,
        }
    }

    pub fn infos(&self) -> impl Iterator<Item = &RegisterInfo<TM::Reg>> {
        self.core_regs.iter().chain(self.fp_regs.iter())
    }

    fn infos_mut(&mut self) -> impl Iterator<Item = &mut RegisterInfo<TM::Reg>> {
        self.core_regs.iter_mut().chain(self.fp_regs.iter_mut())
    }

    pub fn try_info(&self, reg: TM::Reg) -> Option<&RegisterInfo<TM::Reg>> {
        let (bank, idx) = self.reg_map.get(&reg)?;
        Some(&self.bank(*bank)[*idx])
    }

    /// Returns the pool entry of `reg`.
    ///
    /// # Panics
    ///
    /// If `reg` is not tracked by the pool.
    pub fn info(&self, reg: TM::Reg) -> &RegisterInfo<TM::Reg> {
        match self.try_info(reg) {
            Some(info) => info,
            None => self.fatal(format_args!("{} is not part of the register pool", reg.name())),
        }
    }

    pub(crate) fn info_mut(&mut self, reg: TM::Reg) -> &mut RegisterInfo<TM::Reg> {
        match self.reg_map.get(&reg).copied() {
            Some((bank, idx)) => &mut self.bank_mut(bank)[idx],
            None => self.fatal(format_args!("{} is not part of the register pool", reg.name())),
        }
    }

    /// The pool entries backing `reg`.
    ///
    /// A double-width register the pool does not track is split into its single halves.
    pub fn storage_regs(&self, reg: RegStorage<TM::Reg>) -> SmallVec<[TM::Reg; 2]> {
        match reg {
            RegStorage::Solo64(reg) if !self.reg_map.contains_key(&reg) => {
                match TM::split_double(reg) {
                    Some((low, high)) => smallvec![low, high],
                    None => smallvec![reg],
                }
            }
            _ => reg.regs(),
        }
    }

    pub fn mark_temp(&mut self, reg: TM::Reg) {
        self.info_mut(reg).is_temp = true;
    }

    pub fn unmark_temp(&mut self, reg: TM::Reg) {
        self.info_mut(reg).is_temp = false;
    }

    pub fn mark_in_use(&mut self, reg: TM::Reg) {
        self.info_mut(reg).in_use = true;
    }

    /// Claims a specific temp, e.g. a fixed argument or return register.
    pub fn lock_temp(&mut self, reg: RegStorage<TM::Reg>) {
        for reg in self.storage_regs(reg) {
            let info = self.info_mut(reg);
            debug_assert!(info.is_temp, "{} is not a temp", reg.name());
            info.in_use = true;
            info.live = false;
            info.dirty = false;
        }
    }

    pub fn is_temp(&self, reg: RegStorage<TM::Reg>) -> bool {
        self.storage_regs(reg)
            .into_iter()
            .any(|reg| self.info(reg).is_temp)
    }

    pub fn is_promoted(&self, reg: RegStorage<TM::Reg>) -> bool {
        self.storage_regs(reg)
            .into_iter()
            .any(|reg| !self.info(reg).is_temp)
    }

    pub fn is_live(&self, reg: RegStorage<TM::Reg>) -> bool {
        self.storage_regs(reg)
            .into_iter()
            .any(|reg| self.info(reg).live)
    }

    pub fn is_dirty(&self, reg: RegStorage<TM::Reg>) -> bool {
        self.storage_regs(reg)
            .into_iter()
            .any(|reg| self.info(reg).dirty)
    }

    /// Releases every temp claim. Liveness information is kept.
    pub fn reset_pool(&mut self) {
        for info in self.infos_mut().filter(|info| info.is_temp) {
            info.in_use = false;
        }
    }

    pub fn lock_call_temps(&mut self) {
        for reg in self.descriptor.arg_regs {
            self.clobber_reg(*reg);
            self.lock_temp(RegStorage::Solo32(*reg));
        }
    }

    pub fn free_call_temps(&mut self) {
        for reg in self.descriptor.arg_regs {
            self.free_temp(RegStorage::Solo32(*reg));
        }
    }

    pub fn dump(&self) -> String {
        self.to_string()
    }

    pub fn log_pools(&self) {
        for line in self.dump().lines() {
            info!("{line}");
        }
    }

    /// Logs the pool and aborts. Used when an allocator invariant is broken.
    fn fatal(&self, message: impl Display) -> ! {
        error!("{message}");
        for line in self.dump().lines() {
            error!("{line}");
        }
        panic!("{message}");
    }

    fn debug_verify(&self) {
        if cfg!(debug_assertions) {
            let errors = PoolVerifier::new(self).verify();
            if !errors.is_empty() {
                self.fatal(format_args!(
                    "Register pool is inconsistent: {}",
                    errors.iter().join(", ")
                ));
            }
        }
    }
}

impl<TM: TargetMachine> Display for RegisterPool<TM> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Core registers:")?;
        for info in &self.core_regs {
            writeln!(f, "{info}")?;
        }
        writeln!(f, "FP registers:")?;
        for info in &self.fp_regs {
            writeln!(f, "{info}")?;
        }
        Ok(())
    }
}
