//! Display scoping of the queue by professional profile.
//!
//! A receptionist only needs to see reception tickets, a physician care and
//! triage tickets, and so on. This narrows what a console shows; it is not an
//! access control mechanism.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ticket::{ProcedureType, Ticket};

/// Role and function of the professional operating a console.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfessionalProfile {
    /// Position, e.g. "nurse".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    /// Function within the unit, e.g. "triage".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_label: Option<String>,
}

impl ProfessionalProfile {
    pub fn new(role: Option<String>, function_label: Option<String>) -> Self {
        Self {
            role,
            function_label,
        }
    }

    /// Candidate labels in lookup order: function first, then role.
    ///
    /// A function label with no table entry falls through to the role
    /// instead of leaving the queue unfiltered, so a nurse working as
    /// "triage" is still scoped by "nurse".
    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.function_label
            .as_deref()
            .into_iter()
            .chain(self.role.as_deref())
            .filter(|label| !label.trim().is_empty())
    }
}

/// Maps profile labels to the procedure types shown to that profile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfilePolicy {
    table: HashMap<String, Vec<ProcedureType>>,
}

impl Default for ProfilePolicy {
    fn default() -> Self {
        use ProcedureType::{Care, Reception, Triage};

        let entries: [(&str, Vec<ProcedureType>); 12] = [
            ("receptionist", vec![Reception]),
            ("reception clerk", vec![Reception]),
            ("recepcionista", vec![Reception]),
            ("nurse", vec![Triage, Reception]),
            ("enfermeiro", vec![Triage, Reception]),
            ("physician", vec![Care, Triage]),
            ("doctor", vec![Care, Triage]),
            ("medico", vec![Care, Triage]),
            ("nursing technician", vec![Triage]),
            ("tecnico enfermagem", vec![Triage]),
            ("administrative", vec![Reception]),
            ("administrativo", vec![Reception]),
        ];

        Self::from_table(entries.into_iter().map(|(label, allowed)| (label.to_string(), allowed)))
    }
}

impl ProfilePolicy {
    /// Build a policy from `(label, allowed procedures)` pairs.
    pub fn from_table(entries: impl IntoIterator<Item = (String, Vec<ProcedureType>)>) -> Self {
        Self {
            table: entries
                .into_iter()
                .map(|(label, allowed)| (normalize_label(&label), allowed))
                .collect(),
        }
    }

    /// Allowed procedure types for a label. `None` for unknown labels and
    /// for labels mapped to an empty list.
    pub fn allowed(&self, label: &str) -> Option<&[ProcedureType]> {
        self.table
            .get(&normalize_label(label))
            .map(Vec::as_slice)
            .filter(|allowed| !allowed.is_empty())
    }

    /// Allowed procedure types for the first profile label that is known.
    pub fn allowed_for(&self, profile: &ProfessionalProfile) -> Option<&[ProcedureType]> {
        profile.labels().find_map(|label| self.allowed(label))
    }

    /// Keep only tickets whose procedure the label may see, preserving order.
    ///
    /// Unknown labels return the input unfiltered.
    pub fn filter_by_professional_profile(&self, tickets: &[Ticket], label: &str) -> Vec<Ticket> {
        filter_allowed(tickets, self.allowed(label))
    }

    /// Same as [`Self::filter_by_professional_profile`] for a full profile.
    pub fn filter_for_profile(&self, tickets: &[Ticket], profile: &ProfessionalProfile) -> Vec<Ticket> {
        filter_allowed(tickets, self.allowed_for(profile))
    }

    pub fn labels(&self) -> impl Iterator<Item = &str> {
        self.table.keys().map(String::as_str)
    }
}

/// Filter with the built-in label table.
pub fn filter_by_professional_profile(tickets: &[Ticket], label: &str) -> Vec<Ticket> {
    ProfilePolicy::default().filter_by_professional_profile(tickets, label)
}

fn filter_allowed(tickets: &[Ticket], allowed: Option<&[ProcedureType]>) -> Vec<Ticket> {
    match allowed {
        Some(allowed) => tickets
            .iter()
            .filter(|ticket| allowed.contains(&ticket.procedure))
            .cloned()
            .collect(),
        None => tickets.to_vec(),
    }
}

/// Lowercase, treat `_`/`-` as spaces, collapse whitespace.
fn normalize_label(label: &str) -> String {
    label
        .to_lowercase()
        .replace(['_', '-'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}
