//! Domain layer - Core scanning logic
//!
//! This module contains the scan entities, the detector services and the
//! ports through which detector data is loaded. Nothing here performs I/O
//! except through a [`repositories`] trait.

pub mod entities;
pub mod repositories;
pub mod services;
