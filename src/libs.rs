//! # Hi-C read-pair filtering libraries
//!
//! This libraries are a collection of functions and structures which
//! help removing technical artifacts from paired Hi-C reads before
//! a contact matrix is built from them.
//! They are used by the `hic_filter` tool which runs in three passes over
//! the same read-pair file:
//!  - counting how many read-ends fall onto every restriction fragment
//!  - classifying every pair into the artifact categories (self-circle, dangling-end, ...)
//!  - writing the subset of lines which were not flagged
//!
//! Subsequently the libraries are split into :
//!  - common: read-pair parsing and shared structures
//!  - error: the error type returned by all passes
//!  - fragments: fragment occurrence counting and the over-representation cutoff
//!  - classify: the artifact categories and the classification pass
//!  - apply: writing the filtered read-pair file and the mask table
//!

pub mod lib {
    /// read-pair parsing and structures used by all passes
    pub mod common;
    pub mod error;
    /// restriction fragment occurrences
    pub mod fragments;
    /// artifact categories and the classification pass
    pub mod classify;
    /// filtered output and persisted masks
    pub mod apply;
}
