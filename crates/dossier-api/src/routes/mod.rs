//! # Route Modules
//!
//! | Prefix | Module |
//! |--------|--------|
//! | `/exportateur/dossier/*`, `/exportateur/documents/*` | [`exporter`] |
//! | `/exportateur/documents-requis` | [`checklist`] |
//! | `/validation/*` | [`validation`] |
//! | `/paiement/*` | [`payment`] |

pub mod checklist;
pub mod exporter;
pub mod payment;
pub mod validation;
