use serde::Serialize;
use sysinfo::System;

/// Resources of the machine generating load, reported alongside results so
/// runs from different workers can be compared.
#[derive(Debug, Clone, Default, Serialize)]
pub struct HostInfo {
    pub cpu_cores: u64,
    pub total_memory_bytes: u64,
    pub available_memory_bytes: u64,
}

pub fn get_hardware_info() -> HostInfo {
    let mut sys = System::new_all();
    sys.refresh_all();

    HostInfo {
        cpu_cores: sys.cpus().len() as u64,
        total_memory_bytes: sys.total_memory(),
        available_memory_bytes: sys.available_memory(),
    }
}
