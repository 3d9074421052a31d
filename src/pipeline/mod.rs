//! Pipeline stages for release-note synthesis.
//!
//! Each submodule implements exactly one transformation step. Only
//! [`generate`] and [`input`] do I/O; everything else is a pure function of
//! its arguments and is tested as such.
//!
//! ## Data Flow
//!
//! ```text
//! description ──▶ classify ──▶ generate ──▶ normalize ──▶ assemble
//!  (free text)    (entries)   (per category) (tagged lines)  (DocumentModel)
//!                                                             ▲
//! logo / figures ──▶ input ──▶ image_fit ─────────────────────┘
//! ```
//!
//! 1. [`classify`]: assign each non-blank line a [`crate::Category`]:
//!    explicit `[tag]` markers first, then the keyword table
//! 2. [`generate`]: one bounded, retried call per category present; never
//!    fails on provider errors, falls back to deterministic text instead
//! 3. [`normalize`]: strip echoed tags and bullets, re-annotate lines
//! 4. [`input`]: turn a data URI, URL or path into image bytes
//! 5. [`image_fit`]: validate, scale into a bounding box, re-encode as PNG
//! 6. [`assemble`]: group lines into sections in display order, build the
//!    metadata table and header

pub mod assemble;
pub mod classify;
pub mod generate;
pub mod image_fit;
pub mod input;
pub mod normalize;
