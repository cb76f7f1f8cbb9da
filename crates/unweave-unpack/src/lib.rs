//! Bundle detection, module extraction, and reconstruction.
//!
//! This crate turns a webpack or browserify bundle back into standalone
//! ES modules. Detection finds the bundle's runtime shape and pulls each
//! module factory out into its own program; reconstruction then rewrites
//! the CommonJS machinery inside every module into static `import` and
//! `export` declarations and strips the aliasing indirection minifiers
//! leave behind.
//!
//! The top-level entry points are [`unpack`] (detect and extract) and
//! [`unpack_and_reconstruct`] (detect, extract, and run the full
//! per-module pipeline).

pub mod browserify;
pub mod bundle;
pub mod detect;
pub mod exports;
pub mod import_export;
pub mod inline;
pub mod transform;
pub mod webpack;

pub use bundle::{
    Bundle, BundleKind, BundleSummary, Module, ModuleId, ModuleNames, ModuleSummary,
    reconstruct_module,
};
pub use detect::{Recognizer, UnpackError, recognizers, unpack, unpack_and_reconstruct};
pub use import_export::SynthesizeImportsExports;
pub use inline::{InlineAliases, InlineWrappers};
pub use transform::{Transform, TransformContext, TransformError, apply_transforms};
