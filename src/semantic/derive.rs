//! Type derivation: turns type syntax into semantic [`Type`] values

use std::collections::BTreeMap;

use crate::frontend::ast::{Ident, TypeExpr};
use crate::semantic::symbols::{ScopeArena, ScopeId, Symbol};
use crate::types::Type;
use crate::utils::{Error, Result};

/// Name given to struct types that are not declared through `type`
pub const ANONYMOUS_STRUCT: &str = "struct";

/// Derive a semantic type for `ty` as seen from `scope`
pub fn derive_type(scopes: &ScopeArena, scope: ScopeId, ty: &TypeExpr) -> Result<Type> {
    derive_named(scopes, scope, ty, None)
}

/// Derive the definition of `type <name> <ty>`; struct syntax takes the
/// alias name
pub fn derive_type_decl(scopes: &ScopeArena, scope: ScopeId, name: &str, ty: &TypeExpr) -> Result<Type> {
    let definition = derive_named(scopes, scope, ty, Some(name))?;
    Ok(Type::named(name, Some(definition)))
}

fn derive_named(scopes: &ScopeArena, scope: ScopeId, ty: &TypeExpr, name: Option<&str>) -> Result<Type> {
    match ty {
        TypeExpr::Primitive { prim, .. } => Ok(Type::primitive(*prim)),
        TypeExpr::Array { elem, .. } => Ok(Type::array(derive_type(scopes, scope, elem)?)),
        TypeExpr::Struct { fields, .. } => {
            let mut derived = BTreeMap::new();
            for field in fields {
                let field_ty = derive_type(scopes, scope, &field.ty)?;
                derived.insert(field.name.name.clone(), field_ty);
            }
            Ok(Type::Struct {
                name: name.unwrap_or(ANONYMOUS_STRUCT).to_string(),
                fields: derived,
            })
        }
        TypeExpr::Function { params, ret, .. } => {
            let params = params
                .iter()
                .map(|p| derive_type(scopes, scope, p))
                .collect::<Result<Vec<_>>>()?;
            let ret = match ret {
                Some(ret) => Some(derive_type(scopes, scope, ret)?),
                None => None,
            };
            Ok(Type::function(params, ret))
        }
        TypeExpr::Named(ident) => {
            let symbol = scopes.lookup(scope, &ident.name).ok_or_else(|| Error::TypeNotFound {
                name: ident.name.clone(),
                span: ident.span,
            })?;
            type_of_symbol(symbol, ident)
        }
        TypeExpr::Scoped { module, name, .. } => {
            let table = scopes
                .imported_table(scope, &module.name)
                .map_err(|_| Error::ModuleNotImported {
                    module: module.name.clone(),
                    span: module.span,
                })?;
            let symbol = scopes
                .lookup_local(table, &name.name)
                .ok_or_else(|| Error::TypeNotFoundInModule {
                    name: name.name.clone(),
                    module: module.name.clone(),
                    span: name.span,
                })?;
            type_of_symbol(symbol, name)
        }
    }
}

/// A type symbol without a resolved type yet stands for itself
fn type_of_symbol(symbol: &Symbol, ident: &Ident) -> Result<Type> {
    if !symbol.kind.is_type() {
        return Err(Error::NotAType {
            name: ident.name.clone(),
            span: ident.span,
        });
    }
    Ok(symbol
        .ty
        .clone()
        .unwrap_or_else(|| Type::named(ident.name.clone(), None)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::ast::FieldDecl;
    use crate::semantic::symbols::{declare_prelude, ScopeKind, SymbolKind};
    use crate::types::PrimitiveType;
    use crate::utils::Span;
    use pretty_assertions::assert_eq;

    fn setup() -> (ScopeArena, ScopeId) {
        let mut arena = ScopeArena::new();
        let builtins = arena.alloc(None, ScopeKind::Global);
        declare_prelude(&mut arena, builtins).unwrap();
        let root = arena.alloc(Some(builtins), ScopeKind::Global);
        (arena, root)
    }

    fn named(name: &str) -> TypeExpr {
        TypeExpr::Named(Ident::new(name, Span::dummy()))
    }

    fn prim(prim: PrimitiveType) -> TypeExpr {
        TypeExpr::Primitive { prim, span: Span::dummy() }
    }

    #[test]
    fn test_builtin_names_resolve_through_scope_chain() {
        let (arena, root) = setup();
        assert_eq!(
            derive_type(&arena, root, &named("bool")).unwrap(),
            Type::primitive(PrimitiveType::Bool)
        );
        let array = TypeExpr::Array {
            elem: Box::new(prim(PrimitiveType::U8)),
            span: Span::dummy(),
        };
        assert_eq!(derive_type(&arena, root, &array).unwrap().to_string(), "[]u8");
    }

    #[test]
    fn test_unknown_type() {
        let (arena, root) = setup();
        let err = derive_type(&arena, root, &named("Point")).unwrap_err();
        assert_eq!(err.to_string(), "type 'Point' not found in symbol table");
    }

    #[test]
    fn test_forward_reference_and_non_type() {
        let (mut arena, root) = setup();
        arena
            .declare(root, Symbol::new("Node", SymbolKind::Type, Span::dummy()))
            .unwrap();
        arena
            .declare(root, Symbol::new("count", SymbolKind::Var, Span::dummy()))
            .unwrap();

        assert_eq!(
            derive_type(&arena, root, &named("Node")).unwrap(),
            Type::named("Node", None)
        );
        assert!(matches!(
            derive_type(&arena, root, &named("count")),
            Err(Error::NotAType { .. })
        ));
    }

    #[test]
    fn test_struct_takes_alias_name() {
        let (arena, root) = setup();
        let body = TypeExpr::Struct {
            fields: vec![
                FieldDecl {
                    name: Ident::new("y", Span::dummy()),
                    ty: prim(PrimitiveType::F32),
                    span: Span::dummy(),
                },
                FieldDecl {
                    name: Ident::new("x", Span::dummy()),
                    ty: prim(PrimitiveType::F32),
                    span: Span::dummy(),
                },
            ],
            span: Span::dummy(),
        };
        let decl = derive_type_decl(&arena, root, "Point", &body).unwrap();
        assert_eq!(decl.to_string(), "Point");
        assert_eq!(decl.unwrap_alias().to_string(), "Point { x: f32, y: f32 }");
        assert_eq!(
            derive_type(&arena, root, &body).unwrap().name(),
            Some(ANONYMOUS_STRUCT)
        );
    }

    #[test]
    fn test_scoped_types() {
        let (mut arena, root) = setup();
        let geo = arena.alloc(None, ScopeKind::Global);
        arena
            .declare(
                geo,
                Symbol::new("Coord", SymbolKind::Type, Span::dummy())
                    .with_type(Type::named("Coord", Some(Type::primitive(PrimitiveType::I64)))),
            )
            .unwrap();

        let scoped = |module: &str, name: &str| TypeExpr::Scoped {
            module: Ident::new(module, Span::dummy()),
            name: Ident::new(name, Span::dummy()),
            span: Span::dummy(),
        };

        let err = derive_type(&arena, root, &scoped("geo", "Coord")).unwrap_err();
        assert_eq!(err.to_string(), "module 'geo' is not imported");

        arena.add_import(root, "geo", "lib/geo", geo).unwrap();
        assert_eq!(
            derive_type(&arena, root, &scoped("geo", "Coord")).unwrap(),
            Type::named("Coord", None)
        );
        let err = derive_type(&arena, root, &scoped("geo", "Angle")).unwrap_err();
        assert_eq!(err.to_string(), "type 'Angle' not found in imported module 'geo'");
    }

    #[test]
    fn test_function_type() {
        let (arena, root) = setup();
        let func = TypeExpr::Function {
            params: vec![prim(PrimitiveType::I32), named("str")],
            ret: Some(Box::new(prim(PrimitiveType::Bool))),
            span: Span::dummy(),
        };
        assert_eq!(
            derive_type(&arena, root, &func).unwrap().to_string(),
            "fn(i32, str) -> bool"
        );
    }
}
