//! Optional model-backed capability seam.
//!
//! A [`Capability`] implementation lets a host plug in an LLM or embedding
//! backend. Every method may decline by returning `None`, in which case the
//! engine falls back to its pure heuristics with the same observable
//! contract. The default implementation of every method declines, so a
//! backend only overrides what it actually provides.

use crate::knowledge::KnowledgeItem;
use crate::reason::Intent;

pub trait Capability: Send + Sync {
    /// Propose plan step descriptions for a query given retrieved knowledge.
    fn generate_plan(&self, _query: &str, _knowledge: &[KnowledgeItem]) -> Option<Vec<String>> {
        None
    }

    /// Produce a reflection summary from the messages and errors so far.
    fn reflect(&self, _messages: &[String], _errors: &[String]) -> Option<String> {
        None
    }

    /// Classify the scheduling intent of a query.
    fn understand_scheduling_intent(&self, _query: &str) -> Option<Intent> {
        None
    }

    /// Embed text into a vector for similarity search.
    fn embed(&self, _text: &str) -> Option<Vec<f32>> {
        None
    }
}

/// A capability backend that declines everything. Engine construction uses
/// this when the host supplies no backend.
#[derive(Debug, Default)]
pub struct NullCapability;

impl Capability for NullCapability {}
