use std::sync::Once;

pub mod secrets;

static INIT_LOGGER: Once = Once::new();

/// Setup function that will only run once, even if called multiple times.
pub fn setup_logger() {
    INIT_LOGGER.call_once(|| {
        let _ = env_logger::Builder::from_env(
            env_logger::Env::default()
                .default_filter_or("boltz_core=info")
                .default_write_style_or("always"),
        )
        .is_test(true)
        .try_init();
    });
}
