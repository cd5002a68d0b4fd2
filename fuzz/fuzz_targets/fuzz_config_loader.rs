#![no_main]
use libfuzzer_sys::fuzz_target;

// Parse and validate arbitrary TOML; errors are fine, panics are not.
fuzz_target!(|data: &str| {
    if let Ok(cfg) = gimbal_config::load_toml(data) {
        let _ = cfg.validate();
    }
});
