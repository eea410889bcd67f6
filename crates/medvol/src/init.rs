//! Initialization of logging for medvol-rs.

/// Initializes medvol-rs.
///
/// Installs an `env_logger` backend unless the application already set up a
/// logger; verbosity is controlled through `RUST_LOG`. Calling this more
/// than once is harmless.
///
/// # Example
///
/// ```no_run
/// medvol::init();
/// ```
pub fn init() {
    let _ = env_logger::try_init();
    log::info!("medvol-rs initialized");
}
