// src/error.rs
//
// =============================================================================
// TOPOLOGY-SCHED: ERROR TAXONOMY
// =============================================================================
//
// The original Python source signals failure three different ways in three
// different places: a bare `return False` from `ParseLabels`, a raised
// `IndexError` from the middle of `SetPhysicalIdsFromMapping`, and a `None`
// return from its tail. This module unifies all of that into typed,
// `thiserror`-derived enums so every caller gets one `Result` shape per
// concern instead of three failure conventions to remember.

use thiserror::Error;

/// Failure discovering a node's resources from its label map (spec §7,
/// error kind 1). The node is excluded from scheduling; non-fatal for the
/// cluster as a whole.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DiscoveryError {
    #[error("missing required label `{0}`")]
    MissingLabel(&'static str),

    #[error("invalid label `{label}`: {reason}")]
    InvalidLabel { label: String, reason: String },

    #[error("core count {cores} does not divide evenly across {sockets} socket(s)")]
    InvalidSocketCoreRatio { sockets: u32, cores: u32 },
}

/// Failure during placement (spec §7, error kind 2). Always accompanied by
/// a full rollback of any reservations already made for the request before
/// this error is returned to the caller.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlacementError {
    #[error("requested {requested} cpu core(s) on numa {numa}, only found {found}")]
    InsufficientCpuBatch {
        requested: usize,
        found: usize,
        numa: u32,
    },

    #[error("no free gpu on numa {numa}")]
    NoFreeGpu { numa: u32 },

    #[error("no nic found at numa {numa}, ordinal {ordinal}")]
    NicNotFound { numa: u32, ordinal: u32 },

    #[error("no nic-group entry covers request core id {core_id}")]
    NicGroupMissing { core_id: u32 },

    #[error("mapping decision is missing a `{field}` entry for processing group {index}")]
    MappingTooShort { field: &'static str, index: usize },
}

/// Failure decoding a Linux-style range list (spec §4.1).
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RangeParseError {
    #[error("empty range token in `{0}`")]
    EmptyToken(String),

    #[error("invalid range {lo}-{hi}: lo > hi")]
    InvalidRange { lo: i64, hi: i64 },

    #[error("not a number: `{0}`")]
    NotANumber(String),
}
