// Build-time version from Cargo.toml

/// Package version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Package name (from Cargo.toml); also the default User-Agent product.
pub const NAME: &str = env!("CARGO_PKG_NAME");
