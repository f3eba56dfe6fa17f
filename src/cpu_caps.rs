/*
    hardware capability query. detection never fails: anything we cannot
    detect is reported as absent and callers take the scalar path.
*/

use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CpuCaps {
    pub avx2: bool,
    pub neon: bool,
    pub threads: usize,
}

static CAPS: OnceLock<CpuCaps> = OnceLock::new();

fn detect() -> CpuCaps {
    // num_cpus::get() reports logical cpus, which is what the pool wants
    let threads = num_cpus::get().max(1);

    #[cfg(target_arch = "x86_64")]
    let avx2 = std::is_x86_feature_detected!("avx2");
    #[cfg(not(target_arch = "x86_64"))]
    let avx2 = false;

    #[cfg(target_arch = "aarch64")]
    let neon = std::arch::is_aarch64_feature_detected!("neon");
    #[cfg(not(target_arch = "aarch64"))]
    let neon = false;

    let caps = CpuCaps {
        avx2,
        neon,
        threads,
    };
    log::debug!(
        "cpu caps: {} threads, avx2={}, neon={}",
        caps.threads,
        caps.avx2,
        caps.neon
    );
    caps
}

pub fn caps() -> CpuCaps {
    *CAPS.get_or_init(detect)
}

pub fn has_avx2() -> bool {
    caps().avx2
}

pub fn has_neon() -> bool {
    caps().neon
}

// default worker count for a new pool
pub fn hw_threads() -> usize {
    caps().threads
}
