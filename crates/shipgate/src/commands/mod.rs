//! Command implementations

pub mod contributors;

pub mod info;

pub mod origin;

pub mod release_needed;
