//! Package identity baked in by cargo at compile time.

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub fn name() -> &'static str {
    env!("CARGO_PKG_NAME")
}

pub fn version_full() -> String {
    format!("{} {}", name(), version())
}
