use std::fmt::{
    Display,
    Formatter,
};

use crate::codegen::{
    machine::{
        isa::PhysicalRegister,
        TargetMachine,
    },
    register_allocator::RegisterPool,
};

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum PoolError<R> {
    /// `reg` names `partner` as its other half but not the other way round.
    AsymmetricPartner { reg: R, partner: R },
    /// The halves of a wide value disagree on being a temp or being claimed.
    PairMismatch { reg: R, partner: R },
    DirtyNotLive(R),
    StaleDefRange(R),
    /// The halves of a wide value cache unrelated SSA names.
    PairNamesApart { reg: R, partner: R },
}

impl<R: PhysicalRegister> Display for PoolError<R> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AsymmetricPartner { reg, partner } => write!(
                f,
                "{} is paired with {}, but not the other way round",
                reg.name(),
                partner.name()
            ),
            Self::PairMismatch { reg, partner } => write!(
                f,
                "{} and {} disagree on their temp or in-use state",
                reg.name(),
                partner.name()
            ),
            Self::DirtyNotLive(reg) => write!(f, "{} is dirty but not live", reg.name()),
            Self::StaleDefRange(reg) => {
                write!(f, "{} carries a def range without a live value", reg.name())
            }
            Self::PairNamesApart { reg, partner } => write!(
                f,
                "{} and {} cache unrelated SSA names",
                reg.name(),
                partner.name()
            ),
        }
    }
}

/// Checks the consistency of a register pool.
#[derive(Debug, Clone)]
pub struct PoolVerifier<'pool, TM: TargetMachine> {
    pool: &'pool RegisterPool<TM>,
}

impl<'pool, TM: TargetMachine> PoolVerifier<'pool, TM> {
    pub const fn new(pool: &'pool RegisterPool<TM>) -> Self {
        Self { pool }
    }

    pub fn verify(self) -> Vec<PoolError<TM::Reg>> {
        let mut errors = vec![];
        for info in self.pool.infos() {
            let reg = info.reg;
            if info.dirty && !info.live {
                errors.push(PoolError::DirtyNotLive(reg));
            }
            if info.def_range.is_some() && !(info.live && info.is_temp) {
                errors.push(PoolError::StaleDefRange(reg));
            }
            if !info.is_paired() {
                continue;
            }
            let partner = info.partner;
            let Some(partner_info) = self.pool.try_info(partner) else {
                errors.push(PoolError::AsymmetricPartner { reg, partner });
                continue;
            };
            if !partner_info.wide || partner_info.partner != reg {
                errors.push(PoolError::AsymmetricPartner { reg, partner });
                continue;
            }
            // Every pair is visited twice, report it once.
            if partner < reg {
                continue;
            }
            if info.is_temp != partner_info.is_temp
                || (info.is_temp && info.in_use != partner_info.in_use)
            {
                errors.push(PoolError::PairMismatch { reg, partner });
            }
            if let (Some(s_reg), Some(partner_sreg)) = (info.s_reg, partner_info.s_reg) {
                if s_reg.index().abs_diff(partner_sreg.index()) > 1 {
                    errors.push(PoolError::PairNamesApart { reg, partner });
                }
            }
        }
        errors
    }
}
