//! Lossless conversion between grantha JSON documents and an editable
//! markdown form, with round-trip hash validation, citation resolution, and
//! multi-part document assembly.

pub mod abbrev;
pub mod abbreviations;
pub mod assembler;
pub mod classifier;
pub mod commands;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod export;
pub mod frontmatter;
pub mod hasher;
pub mod import;
pub mod integrity;
pub mod library;
pub mod markup;
pub mod resolver;
pub mod roundtrip;
pub mod scanner;
pub mod structure;
pub mod types;
pub mod watch;
