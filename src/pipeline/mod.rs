//! Pipeline stages between stored bytes and painted pages.
//!
//! Each submodule implements one step and is testable on its own.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ decode ──▶ overlay ──▶ encode
//! (fetch)   (pdfium)   (elements)  (PNG)
//!              ▲
//!          extraction
//!       (*.extracted.json)
//! ```
//!
//! 1. [`input`]      fetch signed URLs and check the PDF magic
//! 2. [`decode`]     probe page geometry and rasterise pages; pdfium runs in
//!    `spawn_blocking`
//! 3. [`extraction`] load or request extracted content for a document
//! 4. [`overlay`]    scale extracted elements onto displayed pages, one
//!    element at a time
//! 5. [`encode`]     PNG / `data:` URI output for hosts

pub mod decode;
pub mod encode;
pub mod extraction;
pub mod input;
pub mod overlay;
