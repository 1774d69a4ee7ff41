pub mod arm;
pub mod mips;
pub mod x86;
