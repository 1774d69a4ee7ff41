use index_vec::IndexVec;

use crate::codegen::machine::{
    isa::PhysicalRegister,
    reg::{
        RegStorage,
        SReg,
        VReg,
    },
    TargetMachine,
};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Location<R> {
    /// The value lives in its frame slot.
    Frame,
    PhysReg(RegStorage<R>),
}

/// Where the value of an SSA name currently is, as seen by code generation.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RegLocation<R> {
    pub location: Location<R>,
    pub s_reg_low: Option<SReg>,
    pub wide: bool,
    pub fp: bool,
    /// Set on the second name of a wide value.
    pub high_word: bool,
    /// The register is the value's permanent home, i.e. it was promoted.
    pub home: bool,
    pub cheap_const: bool,
}

impl<R: PhysicalRegister> RegLocation<R> {
    pub fn frame(s_reg_low: SReg, fp: bool, wide: bool) -> Self {
        Self {
            location: Location::Frame,
            s_reg_low: Some(s_reg_low),
            wide,
            fp,
            high_word: false,
            home: false,
            cheap_const: false,
        }
    }

    /// A location for a value without an SSA name, such as a call result.
    pub fn in_reg(reg: RegStorage<R>, fp: bool) -> Self {
        Self {
            location: Location::PhysReg(reg),
            s_reg_low: None,
            wide: reg.is_wide(),
            fp,
            high_word: false,
            home: false,
            cheap_const: false,
        }
    }

    pub fn reg(&self) -> Option<RegStorage<R>> {
        match self.location {
            Location::Frame => None,
            Location::PhysReg(reg) => Some(reg),
        }
    }

    #[must_use]
    pub fn with_reg(mut self, reg: RegStorage<R>) -> Self {
        self.location = Location::PhysReg(reg);
        self
    }
}

/// The permanent home of an SSA name after promotion.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Home<R> {
    Stack,
    Reg(R),
    Pair(R, R),
}

#[derive(Debug, Clone)]
pub struct SsaName<R> {
    pub vreg: VReg,
    pub use_count: u32,
    pub loc: RegLocation<R>,
}

/// The per-method state the allocator works on.
#[derive(Debug, Clone)]
pub struct Method<TM: TargetMachine> {
    pub name: String,
    num_dalvik_regs: u32,
    num_compiler_temps: u32,
    names: IndexVec<SReg, SsaName<TM::Reg>>,
}

impl<TM: TargetMachine> Method<TM> {
    pub fn new(name: impl Into<String>, num_dalvik_regs: u32) -> Self {
        Self {
            name: name.into(),
            num_dalvik_regs,
            num_compiler_temps: 0,
            names: IndexVec::new(),
        }
    }

    pub fn new_compiler_temp(&mut self) -> VReg {
        let vreg = VReg::from_raw(self.num_dalvik_regs + self.num_compiler_temps);
        self.num_compiler_temps += 1;
        vreg
    }

    pub fn num_vregs(&self) -> usize {
        (self.num_dalvik_regs + self.num_compiler_temps) as usize
    }

    pub const fn num_dalvik_regs(&self) -> u32 {
        self.num_dalvik_regs
    }

    pub fn is_compiler_temp(&self, vreg: VReg) -> bool {
        vreg.raw() >= self.num_dalvik_regs
    }

    /// Defines a narrow value of `vreg` and returns its SSA name.
    ///
    /// # Panics
    ///
    /// If `vreg` lies outside the frame of the method.
    pub fn define(&mut self, vreg: VReg, fp: bool) -> SReg {
        assert!(
            vreg.index() < self.num_vregs(),
            "{vreg} is out of range for method {}",
            self.name
        );
        let s_reg = self.names.next_idx();
        self.names.push(SsaName {
            vreg,
            use_count: 0,
            loc: RegLocation::frame(s_reg, fp, false),
        })
    }

    /// Defines a 64-bit value occupying `low_vreg` and the vreg after it.
    ///
    /// Returns the low name. The high name is the one right after it.
    ///
    /// # Panics
    ///
    /// If the second virtual register lies outside the frame of the method.
    pub fn define_wide(&mut self, low_vreg: VReg, fp: bool) -> SReg {
        assert!(
            low_vreg.index() + 1 < self.num_vregs(),
            "wide value at {low_vreg} does not fit in method {}",
            self.name
        );
        let low = self.names.next_idx();
        self.names.push(SsaName {
            vreg: low_vreg,
            use_count: 0,
            loc: RegLocation::frame(low, fp, true),
        });
        let high = self.names.next_idx();
        let mut loc = RegLocation::frame(high, fp, true);
        loc.high_word = true;
        self.names.push(SsaName {
            vreg: low_vreg + 1,
            use_count: 0,
            loc,
        });
        low
    }

    /// Defines a name holding a constant that is cheaper to rematerialize than to keep in a register.
    pub fn define_cheap_const(&mut self, vreg: VReg) -> SReg {
        let s_reg = self.define(vreg, false);
        self.names[s_reg].loc.cheap_const = true;
        s_reg
    }

    pub fn add_uses(&mut self, s_reg: SReg, uses: u32) {
        self.names[s_reg].use_count += uses;
    }

    pub fn vreg_of(&self, s_reg: SReg) -> VReg {
        self.names[s_reg].vreg
    }

    pub fn loc(&self, s_reg: SReg) -> RegLocation<TM::Reg> {
        self.names[s_reg].loc
    }

    pub fn loc_mut(&mut self, s_reg: SReg) -> &mut RegLocation<TM::Reg> {
        &mut self.names[s_reg].loc
    }

    pub fn high_sreg(&self, low: SReg) -> SReg {
        let high = low + 1;
        debug_assert!(self.names[high].loc.high_word);
        high
    }

    pub fn names(&self) -> &IndexVec<SReg, SsaName<TM::Reg>> {
        &self.names
    }

    pub fn names_mut(&mut self) -> &mut IndexVec<SReg, SsaName<TM::Reg>> {
        &mut self.names
    }

    pub fn num_ssa_names(&self) -> usize {
        self.names.len()
    }

    pub fn home(&self, s_reg: SReg) -> Home<TM::Reg> {
        let loc = &self.names[s_reg].loc;
        if !loc.home {
            return Home::Stack;
        }
        match loc.location {
            Location::Frame => Home::Stack,
            Location::PhysReg(RegStorage::Solo32(reg) | RegStorage::Solo64(reg)) => Home::Reg(reg),
            Location::PhysReg(RegStorage::Pair { low, high }) => Home::Pair(low, high),
        }
    }
}
