//! Opens the GPU without a window system and reports the adapter. Useful on
//! CI machines and for driver triage.
//! Run: cargo run -p demos --bin headless_check

use glint_gpu::{GpuConfig, GpuContext};

fn main() {
    glint_shell::init_logging();
    match GpuContext::new_headless(&GpuConfig::default()) {
        Ok(gpu) => println!("headless Vulkan OK: {}", gpu.adapter_name()),
        Err(e) => {
            log::error!("headless Vulkan setup failed: {e}");
            std::process::exit(1);
        }
    }
}
