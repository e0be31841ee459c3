//! # Declaration Store
//!
//! Compiles and holds type declarations.

use super::{CompiledType, DefaultBehavior, DependencyGraphBuilder, FieldDecl, FieldKind, TypeDecl};
use crate::types::ModelError;
use indexmap::IndexMap;
use std::rc::Rc;

/// Compiled type declarations by name.
#[derive(Debug, Default)]
pub struct DeclarationStore {
    types: IndexMap<String, Rc<CompiledType>>,
}

impl DeclarationStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Compile and register a type declaration.
    ///
    /// Base fields come first, in base order; a field redeclared by the
    /// derived type keeps its base position and has its properties overlaid.
    /// Nothing is registered when compilation fails. Redeclaring a name
    /// replaces the previous declaration.
    ///
    /// # Errors
    ///
    /// `UnknownBaseType`, `UndeclaredDependency` or `CyclicDependency`.
    pub fn declare(&mut self, decl: TypeDecl) -> Result<Rc<CompiledType>, ModelError> {
        let TypeDecl {
            name,
            base,
            fields: own,
            behavior,
        } = decl;

        let base_type = match &base {
            Some(base_name) => Some(self.types.get(base_name).cloned().ok_or_else(|| {
                ModelError::UnknownBaseType {
                    model: name.clone(),
                    base: base_name.clone(),
                }
            })?),
            None => None,
        };

        let mut fields: IndexMap<String, FieldDecl> = base_type
            .as_ref()
            .map(|b| {
                b.fields()
                    .iter()
                    .map(|(n, d)| (n.clone(), FieldDecl::clone(d)))
                    .collect()
            })
            .unwrap_or_default();

        for (field_name, field_decl) in own {
            let merged = match fields.get(&field_name) {
                Some(inherited) => field_decl.merged_over(inherited),
                None => field_decl,
            };
            fields.insert(field_name, merged);
        }
        for decl in fields.values_mut() {
            decl.depends_to.clear();
        }

        DependencyGraphBuilder::build(&name, &mut fields)?;

        let behavior = behavior
            .or_else(|| base_type.as_ref().map(|b| Rc::clone(b.behavior())))
            .unwrap_or_else(|| Rc::new(DefaultBehavior));

        let id_field = fields
            .iter()
            .filter(|(_, d)| d.kind() == FieldKind::Id)
            .map(|(n, _)| n.clone())
            .last();

        let compiled = Rc::new(CompiledType {
            name: name.clone(),
            base,
            fields: fields.into_iter().map(|(n, d)| (n, Rc::new(d))).collect(),
            behavior,
            id_field,
        });
        self.types.insert(name, Rc::clone(&compiled));
        Ok(compiled)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<Rc<CompiledType>> {
        self.types.get(name).cloned()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    /// Declared type names, in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.types.keys().map(String::as_str)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    pub fn clear(&mut self) {
        self.types.clear();
    }
}
