//! nft subcommands.

pub mod obj;
