use std::path::PathBuf;

use anyhow::{
    bail,
    Context,
    Result,
};
use clap::{
    Parser,
    ValueEnum,
};
use quick_ralloc::codegen::{
    machine::{
        Home,
        PhysicalRegister,
        TargetMachine,
    },
    register_allocator::{
        PoolVerifier,
        PromotionPlanner,
        RegAllocConfig,
        RegisterPool,
    },
    targets::{
        arm::Thumb2,
        mips::Mips,
        x86::X86,
    },
};
use tracing::debug;

use crate::profile::MethodProfile;

mod profile;

#[derive(Parser, Debug)]
#[clap(name = "qra")]
#[command(version, about)]
struct Args {
    /// The method profile to plan register promotion for
    #[arg(value_parser = valid_profile_extension)]
    profile: PathBuf,
    #[arg(long, value_enum, default_value_t = TargetArg::Thumb2)]
    target: TargetArg,
    /// Only reserve the registers every frame saves
    #[arg(long)]
    no_promote: bool,
    /// Minimum reference count for promotion
    #[arg(long, default_value_t = 1)]
    threshold: u32,
    /// Print the register pool after planning
    #[arg(long)]
    dump_pool: bool,
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum TargetArg {
    Thumb2,
    Mips,
    X86,
}

fn valid_profile_extension(file_path: &str) -> Result<PathBuf, String> {
    let file_path = PathBuf::from(file_path);
    let extension = file_path.extension().ok_or("No file extension")?;
    if extension != "json" {
        return Err(format!(
            "Invalid file extension: {} (expected .json)",
            extension.to_string_lossy()
        ));
    }
    Ok(file_path)
}

fn main() -> Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_max_level(if args.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .init();
    let contents = std::fs::read_to_string(&args.profile)
        .with_context(|| format!("Failed to read {}", args.profile.display()))?;
    let profile: MethodProfile =
        serde_json::from_str(&contents).context("Failed to parse method profile")?;
    let config = RegAllocConfig {
        promote_regs: !args.no_promote,
        promotion_threshold: args.threshold,
        verbose: args.verbose,
        ..RegAllocConfig::o1()
    };
    match args.target {
        TargetArg::Thumb2 => plan::<Thumb2>(&profile, config, args.dump_pool),
        TargetArg::Mips => plan::<Mips>(&profile, config, args.dump_pool),
        TargetArg::X86 => plan::<X86>(&profile, config, args.dump_pool),
    }
}

fn plan<TM: TargetMachine>(
    profile: &MethodProfile,
    config: RegAllocConfig,
    dump_pool: bool,
) -> Result<()> {
    let start = std::time::Instant::now();
    let mut method = profile.build::<TM>()?;
    let mut pool = RegisterPool::<TM>::with_config(config);
    let promotion = PromotionPlanner::new(&mut pool).run(&mut method);
    debug!("Took {:?} to plan promotion", start.elapsed());

    println!("{} ({})", method.name, TM::arch());
    for (s_reg, name) in method.names().iter_enumerated() {
        let home = match method.home(s_reg) {
            Home::Stack => "stack".to_string(),
            Home::Reg(reg) => reg.name().to_string(),
            Home::Pair(low, high) => format!("{}:{}", low.name(), high.name()),
        };
        println!("  {s_reg:>4} {:>4} uses={:<4} -> {home}", name.vreg, name.use_count);
    }
    let saves = &promotion.callee_saves;
    println!(
        "core spill mask: {:#010x} ({} spills)",
        saves.core_spill_mask, saves.num_core_spills
    );
    println!(
        "fp spill mask:   {:#010x} ({} spills)",
        saves.fp_spill_mask, saves.num_fp_spills
    );
    let core_vmap = saves
        .core_vmap_table
        .iter()
        .map(|entry| format!("{entry:#x}"))
        .collect::<Vec<_>>();
    println!("core vmap: [{}]", core_vmap.join(", "));
    let fp_vmap = saves
        .fp_vmap_table
        .iter()
        .map(|vreg| vreg.map_or_else(|| "-".to_string(), |vreg| vreg.to_string()))
        .collect::<Vec<_>>();
    println!("fp vmap:   [{}]", fp_vmap.join(", "));
    if dump_pool {
        print!("{pool}");
    }
    let errors = PoolVerifier::new(&pool).verify();
    if !errors.is_empty() {
        for error in &errors {
            println!("{error}");
        }
        bail!("Register pool is inconsistent after promotion");
    }
    Ok(())
}
