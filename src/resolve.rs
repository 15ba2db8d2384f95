//! Type descriptor resolution.
//!
//! Resolution is two-pass: every record and enumeration is *declared* into a
//! [`TypeRegistry`] first, then annotations are resolved against it. Forward
//! references are therefore just names that happen to be declared later.
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::annotation::{self, Annotation};
use crate::error::{Result, SchemaError};
use crate::ir::{
    EnumMember, EnumType, FieldDefault, FieldDescriptor, FunctionSignature, ParamKind, Parameter,
    RecordType, TypeDescriptor,
};

// ————————————————————————————————————————————————————————————————————————————
// DECLARATIONS
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Declaration {
    Record(RecordDecl),
    Enumeration(EnumDecl),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordDecl {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<FieldDecl>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDecl {
    pub name: String,
    pub annotation: String,
    #[serde(default, skip_serializing_if = "FieldDefault::is_missing")]
    pub default: FieldDefault,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumDecl {
    pub name: String,
    pub members: Vec<EnumMember>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureDecl {
    pub name: String,
    #[serde(default)]
    pub params: Vec<ParamDecl>,
    /// Absent means the function returns nothing.
    #[serde(default)]
    pub returns: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParamDecl {
    pub name: String,
    #[serde(default)]
    pub annotation: Option<String>,
    #[serde(default, skip_serializing_if = "FieldDefault::is_missing")]
    pub default: FieldDefault,
    #[serde(default)]
    pub kind: ParamKind,
}

impl RecordDecl {
    pub fn new(name: impl Into<String>) -> Self {
        RecordDecl { name: name.into(), fields: Vec::new() }
    }

    pub fn field(mut self, name: impl Into<String>, annotation: impl Into<String>) -> Self {
        self.fields.push(FieldDecl {
            name: name.into(),
            annotation: annotation.into(),
            default: FieldDefault::Missing,
        });
        self
    }

    pub fn field_with_default(
        mut self,
        name: impl Into<String>,
        annotation: impl Into<String>,
        default: serde_json::Value,
    ) -> Self {
        self.fields.push(FieldDecl {
            name: name.into(),
            annotation: annotation.into(),
            default: FieldDefault::Value(default),
        });
        self
    }
}

impl ParamDecl {
    pub fn new(name: impl Into<String>, annotation: impl Into<String>) -> Self {
        ParamDecl {
            name: name.into(),
            annotation: Some(annotation.into()),
            default: FieldDefault::Missing,
            kind: ParamKind::Positional,
        }
    }

    pub fn with_default(mut self, default: serde_json::Value) -> Self {
        self.default = FieldDefault::Value(default);
        self
    }

    pub fn variadic(name: impl Into<String>, kind: ParamKind) -> Self {
        ParamDecl { name: name.into(), annotation: None, default: FieldDefault::Missing, kind }
    }
}

impl Declaration {
    pub fn name(&self) -> &str {
        match self {
            Declaration::Record(r) => &r.name,
            Declaration::Enumeration(e) => &e.name,
        }
    }
}

// ————————————————————————————————————————————————————————————————————————————
// REGISTRY
// ————————————————————————————————————————————————————————————————————————————

#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    decls: IndexMap<String, Declaration>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pass one: make a name known. Nothing is resolved yet.
    pub fn declare(&mut self, decl: Declaration) -> Result<()> {
        let name = decl.name().to_string();
        if builtin(&name).is_some() {
            return Err(SchemaError::unsupported_annotation(name, "shadows a builtin type name"));
        }
        if self.decls.contains_key(&name) {
            return Err(SchemaError::unsupported_annotation(name, "declared more than once"));
        }
        self.decls.insert(name, decl);
        Ok(())
    }

    pub fn declare_all(&mut self, decls: impl IntoIterator<Item = Declaration>) -> Result<()> {
        decls.into_iter().try_for_each(|d| self.declare(d))
    }

    pub fn is_declared(&self, name: &str) -> bool {
        self.decls.contains_key(name)
    }

    /// Pass two: textual annotation → descriptor.
    pub fn resolve(&self, annotation: &str) -> Result<TypeDescriptor> {
        let ann = annotation::parse(annotation)?;
        self.resolve_annotation(&ann, annotation, &mut Vec::new())
    }

    pub fn resolve_signature(&self, decl: &SignatureDecl) -> Result<FunctionSignature> {
        let mut params = Vec::with_capacity(decl.params.len());
        for p in &decl.params {
            let ty = match (&p.annotation, p.kind) {
                (Some(text), _) => self.resolve(text)?,
                (None, ParamKind::VarPositional | ParamKind::VarKeyword) => TypeDescriptor::Any,
                // untyped method receiver; not part of the request contract
                (None, ParamKind::Positional) if p.name == "self" => continue,
                (None, ParamKind::Positional) => {
                    return Err(SchemaError::unsupported_annotation(
                        p.name.clone(),
                        "parameter has no type annotation",
                    ));
                }
            };
            params.push(Parameter {
                name: p.name.clone(),
                ty,
                default: p.default.clone(),
                kind: p.kind,
            });
        }
        let returns = match &decl.returns {
            Some(text) => self.resolve(text)?,
            None => TypeDescriptor::None,
        };
        tracing::debug!(function = %decl.name, params = params.len(), "resolved signature");
        Ok(FunctionSignature { name: decl.name.clone(), params, returns })
    }

    fn resolve_annotation(&self, ann: &Annotation, src: &str, stack: &mut Vec<String>) -> Result<TypeDescriptor> {
        match ann {
            Annotation::Forward(text) => {
                let inner = annotation::parse(text)?;
                self.resolve_annotation(&inner, text, stack)
            }
            Annotation::Name(name) => self.resolve_name(name, src, stack),
            Annotation::Union(arms) => {
                let members = arms
                    .iter()
                    .map(|a| self.resolve_annotation(a, src, stack))
                    .collect::<Result<Vec<_>>>()?;
                Ok(TypeDescriptor::Union { members })
            }
            Annotation::Literal(_) => Err(SchemaError::unsupported_annotation(src, "literal value outside Literal[...]")),
            Annotation::Generic { head, args } => self.resolve_generic(head, args, src, stack),
        }
    }

    fn resolve_generic(&self, head: &str, args: &[Annotation], src: &str, stack: &mut Vec<String>) -> Result<TypeDescriptor> {
        if annotation::is_literal_head(head) {
            let values = args.iter().map(|a| match a {
                Annotation::Literal(v) => Ok(v.clone()),
                _ => Err(SchemaError::unsupported_annotation(src, "Literal[...] accepts values only")),
            });
            return Ok(TypeDescriptor::literal("Literal", values.collect::<Result<Vec<_>>>()?));
        }
        let arity = |n: usize| -> Result<()> {
            if args.len() == n {
                Ok(())
            } else {
                Err(SchemaError::unsupported_annotation(
                    src,
                    format!("{head}[...] takes {n} argument(s), got {}", args.len()),
                ))
            }
        };
        let mut resolved = args
            .iter()
            .map(|a| self.resolve_annotation(a, src, stack))
            .collect::<Result<Vec<_>>>()?;
        match strip_module(head) {
            "Optional" => {
                arity(1)?;
                Ok(TypeDescriptor::optional(resolved.remove(0)))
            }
            "Union" => {
                if resolved.len() == 1 {
                    Ok(resolved.remove(0))
                } else {
                    Ok(TypeDescriptor::Union { members: resolved })
                }
            }
            "list" | "List" | "Sequence" => {
                arity(1)?;
                Ok(TypeDescriptor::list(resolved.remove(0)))
            }
            "dict" | "Dict" | "Mapping" => {
                arity(2)?;
                let value = resolved.remove(1);
                Ok(TypeDescriptor::mapping(resolved.remove(0), value))
            }
            other => Err(SchemaError::unsupported_annotation(src, format!("`{other}` is not a supported generic"))),
        }
    }

    fn resolve_name(&self, name: &str, src: &str, stack: &mut Vec<String>) -> Result<TypeDescriptor> {
        if let Some(t) = builtin(name) {
            return Ok(t);
        }
        let decl = self
            .decls
            .get(name)
            .ok_or_else(|| SchemaError::unsupported_annotation(src, format!("unresolved name `{name}`")))?;
        if stack.iter().any(|n| n == name) {
            return Err(SchemaError::unsupported_annotation(
                src,
                format!("recursive reference to `{name}` ({} -> {name})", stack.join(" -> ")),
            ));
        }
        match decl {
            Declaration::Enumeration(e) => Ok(TypeDescriptor::Enumeration(EnumType {
                name: e.name.clone(),
                members: e.members.clone(),
            })),
            Declaration::Record(r) => {
                stack.push(name.to_string());
                let mut fields = Vec::with_capacity(r.fields.len());
                for f in &r.fields {
                    let ann = annotation::parse(&f.annotation)?;
                    let ty = self.resolve_annotation(&ann, &f.annotation, stack)?;
                    fields.push(FieldDescriptor { name: f.name.clone(), ty, default: f.default.clone() });
                }
                stack.pop();
                Ok(TypeDescriptor::Record(RecordType { name: r.name.clone(), fields }))
            }
        }
    }
}

fn strip_module(name: &str) -> &str {
    ["typing.", "typing_extensions.", "pathlib.", "builtins."]
        .iter()
        .find_map(|p| name.strip_prefix(p))
        .unwrap_or(name)
}

fn builtin(name: &str) -> Option<TypeDescriptor> {
    let t = match strip_module(name) {
        "str" => TypeDescriptor::string(),
        "bool" => TypeDescriptor::boolean(),
        "int" => TypeDescriptor::integer(),
        "float" => TypeDescriptor::number(),
        "None" | "NoneType" => TypeDescriptor::None,
        "Any" => TypeDescriptor::Any,
        "Path" | "PurePath" => TypeDescriptor::Path,
        "FileData" => TypeDescriptor::FileData,
        "list" | "List" => TypeDescriptor::list(TypeDescriptor::Any),
        "dict" | "Dict" => TypeDescriptor::mapping(TypeDescriptor::string(), TypeDescriptor::Any),
        _ => return None,
    };
    Some(t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registry() -> TypeRegistry {
        let mut reg = TypeRegistry::new();
        // Outer refers to Inner before Inner is declared.
        reg.declare(Declaration::Record(
            RecordDecl::new("Outer").field("inner", "\"Inner\"").field_with_default("tags", "list[str] | None", json!(null)),
        ))
        .unwrap();
        reg.declare(Declaration::Record(RecordDecl::new("Inner").field("x", "int")))
        .unwrap();
        reg.declare(Declaration::Enumeration(EnumDecl {
            name: "Color".into(),
            members: vec![EnumMember { label: "RED".into(), value: json!("red") }],
        }))
        .unwrap();
        reg
    }

    #[test]
    fn resolves_forward_references_after_declaration() {
        let t = registry().resolve("Outer").unwrap();
        let TypeDescriptor::Record(outer) = t else { panic!("expected record") };
        assert_eq!(outer.name, "Outer");
        let inner = &outer.field("inner").unwrap().ty;
        assert_eq!(inner, &TypeDescriptor::record("Inner", [FieldDescriptor::new("x", TypeDescriptor::integer())]));
        let tags = outer.field("tags").unwrap();
        assert_eq!(tags.ty.to_string(), "Union[list[str], None]");
        assert_eq!(tags.default, FieldDefault::Value(json!(null)));
    }

    #[test]
    fn resolves_builtins_and_generics() {
        let reg = registry();
        assert_eq!(reg.resolve("Optional[Color]").unwrap().to_string(), "Optional[Color]");
        assert_eq!(reg.resolve("typing.Dict[str, typing.Any]").unwrap().to_string(), "dict[str, Any]");
        assert_eq!(reg.resolve("dict").unwrap().to_string(), "dict[str, Any]");
        assert_eq!(reg.resolve("Union[int]").unwrap(), TypeDescriptor::integer());
        assert_eq!(reg.resolve("pathlib.Path").unwrap(), TypeDescriptor::Path);
        assert_eq!(reg.resolve("Literal['a', 'b']").unwrap(), TypeDescriptor::literal("Literal", [json!("a"), json!("b")]));
    }

    #[test]
    fn unresolved_and_recursive_references_fail() {
        let mut reg = registry();
        let err = reg.resolve("list[Missing]").unwrap_err();
        assert!(err.to_string().contains("unresolved name `Missing`"), "{err}");

        reg.declare(Declaration::Record(RecordDecl::new("Node").field("next", "Optional[\"Node\"]"))).unwrap();
        let err = reg.resolve("Node").unwrap_err();
        assert!(matches!(err, SchemaError::UnsupportedAnnotation { .. }));
        assert!(err.to_string().contains("recursive reference"), "{err}");

        assert!(reg.resolve("tuple[int, str]").is_err());
        assert!(reg.resolve("dict[str]").is_err());
    }

    #[test]
    fn duplicate_and_builtin_declarations_are_rejected() {
        let mut reg = registry();
        assert!(reg.declare(Declaration::Record(RecordDecl::new("Inner"))).is_err());
        assert!(reg.declare(Declaration::Record(RecordDecl::new("int"))).is_err());
    }

    #[test]
    fn signature_resolution_skips_untyped_receiver() {
        let reg = registry();
        let decl = SignatureDecl {
            name: "run".into(),
            params: vec![
                ParamDecl { name: "self".into(), annotation: None, default: FieldDefault::Missing, kind: ParamKind::Positional },
                ParamDecl::new("o", "Outer"),
                ParamDecl::new("n", "int").with_default(json!(3)),
                ParamDecl::variadic("kwargs", ParamKind::VarKeyword),
            ],
            returns: None,
        };
        let sig = reg.resolve_signature(&decl).unwrap();
        let names: Vec<_> = sig.params.iter().map(|p| p.display_name()).collect();
        assert_eq!(names, ["o", "n", "**kwargs"]);
        assert_eq!(sig.returns, TypeDescriptor::None);

        let untyped = SignatureDecl {
            name: "bad".into(),
            params: vec![ParamDecl { name: "x".into(), annotation: None, default: FieldDefault::Missing, kind: ParamKind::Positional }],
            returns: None,
        };
        assert!(matches!(reg.resolve_signature(&untyped), Err(SchemaError::UnsupportedAnnotation { .. })));
    }
}
