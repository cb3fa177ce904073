#[cfg(feature = "stockpile-base")]
pub use stockpile_base as base;

#[cfg(feature = "stockpile-loader")]
pub use stockpile_loader as loader;

#[cfg(feature = "stockpile-import")]
pub use stockpile_import as import;
