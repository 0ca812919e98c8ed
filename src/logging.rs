/// Initialise the `log` facade with `env_logger`, defaulting to `info`
/// when `RUST_LOG` is unset - the same call the teacher's `main.rs` makes
/// before touching any other subsystem.
pub fn init() {
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));
}
