/*!
# CLI module
Command line interface functionality that is specific to driver-profile.
*/

/// The main CLI module that contains the top-level CLI parser and help text
pub mod core;
/// The index CLI subcommand
pub mod index;
/// The profile CLI subcommand
pub mod profile;
