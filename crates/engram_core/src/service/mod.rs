//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate repository calls into board-level APIs.
//! - Keep CLI layers decoupled from storage details.

pub mod board_service;
