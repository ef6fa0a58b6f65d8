// Mapping Resolver - Facts to Form Fields
//
// Concept: For every form field, in form order, decide which extracted
// fact(s) fill it, or record why none can.
//
// Algorithm (per field, first pass that fires wins):
// 1. Exact:       fact token equals the full field token (age_2 matches age_2)
// 2. Mirror:      an earlier field with the same base token was accepted and
//                 one of the two is numbered (age_2 repeats age, age repeats age_2)
// 3. Exact base:  numbered variant falls back to its base token (age_2 <- age)
// 4. Combination: all parts of a composite pattern present (first + last -> full_name)
// 5. Split:       field is a declared part of a split pattern (full_name -> last_name)
// 6. Fuzzy:       exactly one fact within containment / edit distance
// 7. Otherwise:   Unmapped(no_candidate); several fuzzy candidates -> Unmapped(ambiguous)
// Confidence gate: a chosen candidate below the threshold becomes
// Unmapped(low_confidence) and its facts stay available. A rejected composite
// lets the next composite pattern for the same target try.
//
// A fact spent by an accepted mapping is gone for all later fields. Split
// patterns reserve their source fact for their own declared parts only.

use crate::normalizer::NormalizedToken;
use crate::rules::MatchRules;
use crate::types::{
    Confidence, ExtractedFact, FactRef, FactSet, FieldRef, FormField, MappingEntry, SplitPart,
    UnmappedReason,
};
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Candidate pool state of one fact during a run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FactState {
    Available,
    Consumed,
    /// Held by the split pattern at this index
    Reserved(usize),
}

struct Candidate<'a> {
    fact: &'a ExtractedFact,
    /// Full token, variant suffix included ("phone_2" -> "contact_number_2")
    token: String,
    state: FactState,
}

/// First field accepted for a base token
struct AcceptedField {
    name: String,
    numbered: bool,
}

/// Per-run mutable state; discarded when `resolve` returns
struct ResolveRun<'a> {
    candidates: Vec<Candidate<'a>>,
    /// Base token -> first field accepted for it
    accepted: HashMap<String, AcceptedField>,
}

impl<'a> ResolveRun<'a> {
    fn available(&self) -> impl Iterator<Item = (usize, &Candidate<'a>)> + '_ {
        self.candidates
            .iter()
            .enumerate()
            .filter(|(_, c)| c.state == FactState::Available)
    }
}

/// Deterministic fact-to-field resolver
#[derive(Debug, Clone, Default)]
pub struct MappingResolver {
    rules: MatchRules,
}

impl MappingResolver {
    pub fn new(rules: MatchRules) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &MatchRules {
        &self.rules
    }

    /// Resolve every field, returning exactly one entry per field in field order
    pub fn resolve(&self, facts: &FactSet, fields: &[FormField]) -> Vec<MappingEntry> {
        let mut run = ResolveRun {
            candidates: facts
                .iter()
                .map(|fact| Candidate {
                    fact,
                    token: full_token(&self.rules.normalizer.normalize(&fact.name)),
                    state: FactState::Available,
                })
                .collect(),
            accepted: HashMap::new(),
        };

        let mut entries = Vec::with_capacity(fields.len());
        for field in fields {
            let token = self.rules.normalizer.normalize(&field.name);
            let entry = self.resolve_field(&mut run, field, &token);
            if entry.is_accepted() && !token.is_empty() {
                run.accepted
                    .entry(token.base.clone())
                    .or_insert_with(|| AcceptedField {
                        name: field.name.clone(),
                        numbered: token.variant.is_some(),
                    });
            }
            entries.push(entry);
        }

        let accepted = entries.iter().filter(|e| e.is_accepted()).count();
        info!(
            fields = fields.len(),
            facts = facts.len(),
            accepted,
            unmapped = fields.len() - accepted,
            "Mapping resolution complete"
        );
        entries
    }

    fn resolve_field(
        &self,
        run: &mut ResolveRun<'_>,
        field: &FormField,
        token: &NormalizedToken,
    ) -> MappingEntry {
        let target = FieldRef::from(field);

        if token.is_empty() {
            debug!(field = %field.name, "Field name has no matchable characters");
            return unmapped(target, UnmappedReason::NoCandidate);
        }

        let full = full_token(token);
        if let Some(entry) = self.exact_pass(run, &target, &full) {
            return entry;
        }
        if let Some(entry) = self.mirror_pass(run, &target, token) {
            return entry;
        }
        if full != token.base {
            if let Some(entry) = self.exact_pass(run, &target, &token.base) {
                return entry;
            }
        }
        if let Some(entry) = self.combination_pass(run, &target, token) {
            return entry;
        }
        if let Some(entry) = self.split_pass(run, &target, token) {
            return entry;
        }
        self.fuzzy_pass(run, target, token)
    }

    fn mirror_pass(
        &self,
        run: &ResolveRun<'_>,
        target: &FieldRef,
        token: &NormalizedToken,
    ) -> Option<MappingEntry> {
        let source = run.accepted.get(&token.base)?;
        // Two plain fields with one base each need their own fact
        if token.variant.is_none() && !source.numbered {
            return None;
        }
        debug!(field = %target.name, source = %source.name, "Mirrored earlier field");
        Some(MappingEntry::Mirrored {
            source_field: source.name.clone(),
            target_field: target.clone(),
        })
    }

    fn exact_pass(
        &self,
        run: &mut ResolveRun<'_>,
        target: &FieldRef,
        wanted: &str,
    ) -> Option<MappingEntry> {
        let matches: Vec<usize> = run
            .available()
            .filter(|(_, c)| c.token == wanted)
            .map(|(i, _)| i)
            .collect();

        let &chosen = matches.first()?;
        if matches.len() > 1 {
            let names: Vec<&str> = matches
                .iter()
                .map(|&i| run.candidates[i].fact.name.as_str())
                .collect();
            warn!(
                field = %target.name,
                candidates = ?names,
                chosen = %run.candidates[chosen].fact.name,
                "Multiple exact matches; first in fact order wins"
            );
        }

        let fact = run.candidates[chosen].fact;
        if let Some(rejected) = self.confidence_gate(target, &[fact]) {
            return Some(rejected);
        }
        run.candidates[chosen].state = FactState::Consumed;
        debug!(field = %target.name, fact = %fact.name, pass = "exact", "Mapped");
        Some(MappingEntry::Single {
            fact: FactRef::from(fact),
            target_field: target.clone(),
        })
    }

    fn combination_pass(
        &self,
        run: &mut ResolveRun<'_>,
        target: &FieldRef,
        token: &NormalizedToken,
    ) -> Option<MappingEntry> {
        let mut rejection = None;
        for pattern in self.rules.composites.iter().filter(|p| p.target == token.base) {
            // Partial satisfaction never fires
            let mut members: Vec<usize> = Vec::with_capacity(pattern.parts.len());
            for part in &pattern.parts {
                let found = run
                    .available()
                    .find(|(i, c)| &c.token == part && !members.contains(i))
                    .map(|(i, _)| i);
                match found {
                    Some(i) => members.push(i),
                    None => break,
                }
            }
            if members.len() != pattern.parts.len() {
                continue;
            }

            let facts: Vec<&ExtractedFact> =
                members.iter().map(|&i| run.candidates[i].fact).collect();
            // A weaker pattern may still fire with confident facts
            if let Some(rejected) = self.confidence_gate(target, &facts) {
                rejection.get_or_insert(rejected);
                continue;
            }
            for &i in &members {
                run.candidates[i].state = FactState::Consumed;
            }
            debug!(
                field = %target.name,
                parts = ?pattern.parts,
                pass = "combination",
                "Mapped"
            );
            return Some(MappingEntry::Combined {
                facts: facts.into_iter().map(FactRef::from).collect(),
                target_field: target.clone(),
                joiner: pattern.joiner.clone(),
            });
        }
        rejection
    }

    fn split_pass(
        &self,
        run: &mut ResolveRun<'_>,
        target: &FieldRef,
        token: &NormalizedToken,
    ) -> Option<MappingEntry> {
        for (index, pattern) in self.rules.splits.iter().enumerate() {
            let Some(select) = pattern.selector_for(&token.base) else {
                continue;
            };
            let Some(chosen) = run.candidates.iter().position(|c| {
                c.token == pattern.source
                    && (c.state == FactState::Available || c.state == FactState::Reserved(index))
            }) else {
                continue;
            };

            let fact = run.candidates[chosen].fact;
            if let Some(rejected) = self.confidence_gate(target, &[fact]) {
                return Some(rejected);
            }
            run.candidates[chosen].state = FactState::Reserved(index);
            debug!(
                field = %target.name,
                fact = %fact.name,
                select = ?select,
                pass = "split",
                "Mapped"
            );
            return Some(MappingEntry::Split {
                fact: FactRef::from(fact),
                target_field: target.clone(),
                part: SplitPart {
                    separator: pattern.separator.clone(),
                    select,
                },
            });
        }
        None
    }

    fn fuzzy_pass(
        &self,
        run: &mut ResolveRun<'_>,
        target: FieldRef,
        token: &NormalizedToken,
    ) -> MappingEntry {
        let matches: Vec<usize> = run
            .available()
            .filter(|(_, c)| self.rules.fuzzy.qualifies(&token.base, &c.token))
            .map(|(i, _)| i)
            .collect();

        match matches.as_slice() {
            [] => {
                debug!(field = %target.name, "No candidate");
                unmapped(target, UnmappedReason::NoCandidate)
            }
            [chosen] => {
                let fact = run.candidates[*chosen].fact;
                if let Some(rejected) = self.confidence_gate(&target, &[fact]) {
                    return rejected;
                }
                run.candidates[*chosen].state = FactState::Consumed;
                debug!(field = %target.name, fact = %fact.name, pass = "fuzzy", "Mapped");
                MappingEntry::Single {
                    fact: FactRef::from(fact),
                    target_field: target,
                }
            }
            several => {
                let candidates: Vec<String> = several
                    .iter()
                    .map(|&i| run.candidates[i].fact.name.clone())
                    .collect();
                warn!(
                    field = %target.name,
                    candidates = ?candidates,
                    "Ambiguous fuzzy match; field left for manual entry"
                );
                unmapped(target, UnmappedReason::Ambiguous { candidates })
            }
        }
    }

    /// Some(rejection) when the weakest member is below the threshold
    fn confidence_gate(&self, target: &FieldRef, facts: &[&ExtractedFact]) -> Option<MappingEntry> {
        let confidence: Confidence = facts
            .iter()
            .map(|f| f.confidence)
            .fold(1.0, f64::min);
        if confidence >= self.rules.confidence_threshold {
            return None;
        }
        warn!(
            field = %target.name,
            confidence,
            threshold = self.rules.confidence_threshold,
            "Candidate below confidence threshold; field left for manual entry"
        );
        Some(unmapped(
            target.clone(),
            UnmappedReason::LowConfidence {
                facts: facts.iter().map(|f| f.name.clone()).collect(),
                confidence,
            },
        ))
    }
}

fn unmapped(target_field: FieldRef, reason: UnmappedReason) -> MappingEntry {
    MappingEntry::Unmapped {
        target_field,
        reason,
    }
}

fn full_token(token: &NormalizedToken) -> String {
    match token.variant {
        Some(index) => format!("{}_{}", token.as_str(), index),
        None => token.base.clone(),
    }
}
