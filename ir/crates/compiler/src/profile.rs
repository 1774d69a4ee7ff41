use anyhow::{
    ensure,
    Result,
};
use quick_ralloc::codegen::machine::{
    Method,
    TargetMachine,
    VReg,
};
use serde::Deserialize;

/// Reference counts of a method as produced by the dataflow pass.
#[derive(Debug, Deserialize)]
pub struct MethodProfile {
    pub name: String,
    pub num_vregs: u32,
    #[serde(default)]
    pub compiler_temps: u32,
    pub names: Vec<NameProfile>,
}

#[derive(Debug, Deserialize)]
pub struct NameProfile {
    pub vreg: u32,
    #[serde(default)]
    pub fp: bool,
    #[serde(default)]
    pub wide: bool,
    #[serde(default, rename = "const")]
    pub cheap_const: bool,
    pub uses: u32,
    /// Uses of the high word of a wide value.
    #[serde(default)]
    pub high_uses: u32,
}

impl MethodProfile {
    pub fn build<TM: TargetMachine>(&self) -> Result<Method<TM>> {
        let mut method = Method::new(self.name.clone(), self.num_vregs);
        for _ in 0..self.compiler_temps {
            method.new_compiler_temp();
        }
        let num_vregs = method.num_vregs();
        for name in &self.names {
            let vreg = VReg::from_raw(name.vreg);
            ensure!(
                vreg.index() < num_vregs,
                "{vreg} is out of range, {} has {num_vregs} virtual registers",
                self.name
            );
            ensure!(
                !(name.wide && name.cheap_const),
                "{vreg} cannot be both wide and a constant"
            );
            if name.wide {
                ensure!(
                    vreg.index() + 1 < num_vregs,
                    "wide value at {vreg} runs past the last virtual register"
                );
                let low = method.define_wide(vreg, name.fp);
                method.add_uses(low, name.uses);
                let high = method.high_sreg(low);
                method.add_uses(high, name.high_uses);
            } else if name.cheap_const {
                let s_reg = method.define_cheap_const(vreg);
                method.add_uses(s_reg, name.uses);
            } else {
                let s_reg = method.define(vreg, name.fp);
                method.add_uses(s_reg, name.uses);
            }
        }
        Ok(method)
    }
}
