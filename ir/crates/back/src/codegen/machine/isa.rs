use std::{
    fmt::Debug,
    hash::Hash,
};

use crate::codegen::machine::{
    Bank,
    Width,
};

pub trait PhysicalRegister:
    Debug + Clone + Copy + PartialEq + Eq + Hash + Ord + Sized + Send + Sync + 'static
{
    fn name(&self) -> &'static str;

    fn all() -> &'static [Self];

    fn bank(&self) -> Bank;

    /// The widest value this register can hold on its own.
    fn width(&self) -> Width;

    /// Hardware encoding of the register within its bank.
    ///
    /// Spill masks and pair alignment are computed from this number.
    fn num(&self) -> u8;

    fn is_fp(&self) -> bool {
        self.bank() == Bank::Fp
    }

    fn is_double(&self) -> bool {
        self.width() == Width::Double
    }

    fn from_name(name: &str) -> Option<Self> {
        Self::all().iter().copied().find(|reg| reg.name() == name)
    }
}
