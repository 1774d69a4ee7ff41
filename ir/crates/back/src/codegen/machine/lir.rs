use std::fmt::{
    Display,
    Formatter,
};

use index_vec::IndexVec;

use crate::codegen::machine::{
    isa::PhysicalRegister,
    reg::{
        RegStorage,
        VReg,
    },
};

index_vec::define_index_type! {
    pub struct LirId = u32;

    DISPLAY_FORMAT = "lir{}";
}

/// The code generation hooks the allocator calls back into.
pub trait Emitter<R> {
    /// Stores `src` into the frame slot of `vreg`.
    ///
    /// For a register pair the low half goes to `vreg` and the high half to the slot after it.
    fn store_vreg(&mut self, vreg: VReg, src: RegStorage<R>);

    fn load_vreg(&mut self, vreg: VReg, dest: RegStorage<R>);

    fn copy(&mut self, dest: RegStorage<R>, src: RegStorage<R>);

    /// Turns an already emitted instruction into a no-op.
    fn nop(&mut self, lir: LirId);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LirOp<R> {
    Store { vreg: VReg, src: RegStorage<R> },
    Load { vreg: VReg, dest: RegStorage<R> },
    Copy { dest: RegStorage<R>, src: RegStorage<R> },
    /// Any other instruction defining `dest`.
    Def { opcode: &'static str, dest: RegStorage<R> },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lir<R> {
    pub op: LirOp<R>,
    pub nop: bool,
}

/// A flat instruction list. Instructions are never removed, only marked as no-ops.
#[derive(Debug, Clone)]
pub struct LirBuffer<R> {
    instructions: IndexVec<LirId, Lir<R>>,
}

impl<R> Default for LirBuffer<R> {
    fn default() -> Self {
        Self {
            instructions: IndexVec::new(),
        }
    }
}

impl<R: PhysicalRegister> LirBuffer<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, op: LirOp<R>) -> LirId {
        self.instructions.push(Lir { op, nop: false })
    }

    /// The id the next pushed instruction will get.
    pub fn next_id(&self) -> LirId {
        self.instructions.next_idx()
    }

    pub fn get(&self, id: LirId) -> Option<&Lir<R>> {
        self.instructions.get(id)
    }

    pub fn is_nop(&self, id: LirId) -> bool {
        self.instructions.get(id).is_some_and(|lir| lir.nop)
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn live_instructions(&self) -> impl Iterator<Item = (LirId, &LirOp<R>)> {
        self.instructions
            .iter_enumerated()
            .filter(|(_, lir)| !lir.nop)
            .map(|(id, lir)| (id, &lir.op))
    }
}

impl<R: PhysicalRegister> Emitter<R> for LirBuffer<R> {
    fn store_vreg(&mut self, vreg: VReg, src: RegStorage<R>) {
        self.push(LirOp::Store { vreg, src });
    }

    fn load_vreg(&mut self, vreg: VReg, dest: RegStorage<R>) {
        self.push(LirOp::Load { vreg, dest });
    }

    fn copy(&mut self, dest: RegStorage<R>, src: RegStorage<R>) {
        self.push(LirOp::Copy { dest, src });
    }

    fn nop(&mut self, lir: LirId) {
        if let Some(lir) = self.instructions.get_mut(lir) {
            lir.nop = true;
        }
    }
}

impl<R: PhysicalRegister> Display for LirOp<R> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Store { vreg, src } => write!(f, "store {src} -> [{vreg}]"),
            Self::Load { vreg, dest } => write!(f, "{dest} = load [{vreg}]"),
            Self::Copy { dest, src } => write!(f, "{dest} = copy {src}"),
            Self::Def { opcode, dest } => write!(f, "{dest} = {opcode}"),
        }
    }
}

impl<R: PhysicalRegister> Display for LirBuffer<R> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        for (id, lir) in self.instructions.iter_enumerated() {
            if lir.nop {
                writeln!(f, "{id}: nop ; {}", lir.op)?;
            } else {
                writeln!(f, "{id}: {}", lir.op)?;
            }
        }
        Ok(())
    }
}
