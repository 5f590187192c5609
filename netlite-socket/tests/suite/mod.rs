pub mod runner;
pub mod tcp_pingpong;
pub mod udp_pingpong;

/// Sets up `env_logger` once per test binary; `RUST_LOG` overrides the level.
pub fn init_logger() {
    let _ = env_logger::builder()
        .filter_level(log::LevelFilter::Info)
        .parse_default_env()
        .is_test(true)
        .try_init();
}
