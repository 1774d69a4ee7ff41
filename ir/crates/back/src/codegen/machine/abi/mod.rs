/// How a 64-bit floating point value occupies the FP bank.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Display)]
pub enum WideFpLayout {
    /// An even register followed by the next odd one.
    EvenOddPair,
    /// Any single FP register holds a double.
    Solo,
}

/// How promoted FP registers are recorded in the callee-save mask.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FpSpillLayout {
    /// Saved as one contiguous block starting at register number `base`.
    Contiguous { base: u8 },
    Individual,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Display)]
pub enum ReturnKind {
    Core,
    Wide,
    Float,
    Double,
}

/// Static description of a target's register file.
#[derive(Debug, Clone, Copy)]
pub struct BankDescriptor<R: 'static> {
    pub core_regs: &'static [R],
    pub fp_regs: &'static [R],
    /// Registers that are never handed out.
    pub reserved: &'static [R],
    pub core_temps: &'static [R],
    pub fp_temps: &'static [R],
    pub caller_save: &'static [R],
    pub arg_regs: &'static [R],
    /// Registers saved by every frame whether promoted or not.
    pub always_spilled: &'static [R],
    pub wide_fp: WideFpLayout,
    pub fp_spills: FpSpillLayout,
    /// Index into `core_regs` where the round-robin temp search starts.
    pub next_core_reg: usize,
    pub next_fp_reg: usize,
}
