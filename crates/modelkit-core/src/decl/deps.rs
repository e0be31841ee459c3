//! # Dependency Graph Builder
//!
//! Derives `depends_to` for every field from the `depends_from` declarations
//! and rejects undeclared antecedents and cycles.
//!
//! `depends_to` of a field holds every field that transitively depends on
//! it, ordered so that a field comes after everything it depends on. Ties
//! are broken by declaration order, which keeps the result deterministic.

use super::FieldDecl;
use crate::types::ModelError;
use indexmap::IndexMap;

/// Builder for the reverse dependency relation of one type.
pub struct DependencyGraphBuilder;

impl DependencyGraphBuilder {
    /// Fill `depends_to` of every field in `fields`.
    ///
    /// # Errors
    ///
    /// - `UndeclaredDependency` when a `depends_from` entry names a field
    ///   that is not in `fields`
    /// - `CyclicDependency` when following `depends_from` leads back to a
    ///   field already on the chain; the chain is reported as `a -> b -> a`
    pub fn build(model: &str, fields: &mut IndexMap<String, FieldDecl>) -> Result<(), ModelError> {
        let antecedents: IndexMap<String, Vec<String>> = fields
            .iter()
            .map(|(name, decl)| (name.clone(), decl.antecedents().to_vec()))
            .collect();

        let mut dependents: IndexMap<String, Vec<String>> = IndexMap::new();
        for (name, from) in &antecedents {
            // Already reached as someone's antecedent: its chain was walked.
            if dependents.contains_key(name) || from.is_empty() {
                continue;
            }
            let mut chain = vec![name.clone()];
            Self::walk(model, &antecedents, from, &mut chain, &mut dependents)?;
        }

        let order: IndexMap<String, usize> = fields
            .keys()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();

        for (name, decl) in fields.iter_mut() {
            decl.depends_to = dependents
                .get(name)
                .map(|set| Self::sorted(set, &dependents, &order))
                .unwrap_or_default();
        }
        Ok(())
    }

    fn walk(
        model: &str,
        antecedents: &IndexMap<String, Vec<String>>,
        from: &[String],
        chain: &mut Vec<String>,
        dependents: &mut IndexMap<String, Vec<String>>,
    ) -> Result<(), ModelError> {
        for field in from {
            let Some(next) = antecedents.get(field) else {
                return Err(ModelError::UndeclaredDependency {
                    model: model.to_string(),
                    field: field.clone(),
                });
            };

            if chain.contains(field) {
                let mut cycle = chain.clone();
                cycle.push(field.clone());
                return Err(ModelError::CyclicDependency {
                    model: model.to_string(),
                    chain: cycle.join(" -> "),
                });
            }

            let entry = dependents.entry(field.clone()).or_default();
            for dependent in chain.iter() {
                if !entry.contains(dependent) {
                    entry.push(dependent.clone());
                }
            }

            if !next.is_empty() {
                chain.push(field.clone());
                Self::walk(model, antecedents, next, chain, dependents)?;
                chain.pop();
            }
        }
        Ok(())
    }

    /// Topologically order one dependent set.
    ///
    /// `a` must come after `b` when `a` is itself a dependent of `b`. The set
    /// is closed under that relation and acyclic, so a field with no
    /// remaining antecedent always exists.
    fn sorted(
        set: &[String],
        dependents: &IndexMap<String, Vec<String>>,
        order: &IndexMap<String, usize>,
    ) -> Vec<String> {
        let depends_on = |a: &str, b: &str| dependents.get(b).is_some_and(|d| d.iter().any(|x| x == a));

        let mut remaining: Vec<&String> = set.iter().collect();
        remaining.sort_by_key(|name| order.get(name.as_str()).copied().unwrap_or(usize::MAX));

        let mut sorted = Vec::with_capacity(remaining.len());
        while !remaining.is_empty() {
            let pick = remaining
                .iter()
                .position(|a| !remaining.iter().any(|b| a != b && depends_on(a.as_str(), b.as_str())))
                .unwrap_or(0);
            sorted.push(remaining.remove(pick).clone());
        }
        sorted
    }
}
