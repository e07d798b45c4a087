//! Structural parser: tree-sitter extraction of named entities
//!
//! Per language the parser recognizes a minimal canonical set: top-level
//! functions, type declarations, methods (as `Type::method`), module-level
//! variables and constants, and one anonymous chunk per contiguous import
//! block. Nested named entities yield their own chunks while the outer
//! entity keeps its full span.

use super::Chunk;
use crate::error::ParseError;
use crate::workspace::FileRole;
use tree_sitter::{Node, Parser};

/// Source languages with a structural grammar
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Language {
    Go,
    Python,
    JavaScript,
    TypeScript,
    Tsx,
}

impl Language {
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext {
            "go" => Some(Language::Go),
            "py" => Some(Language::Python),
            "js" | "jsx" | "mjs" => Some(Language::JavaScript),
            "ts" => Some(Language::TypeScript),
            "tsx" => Some(Language::Tsx),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Language::Go => "Go",
            Language::Python => "Python",
            Language::JavaScript => "JavaScript",
            Language::TypeScript => "TypeScript",
            Language::Tsx => "TSX",
        }
    }

    fn grammar(&self) -> tree_sitter::Language {
        match self {
            Language::Go => tree_sitter_go::LANGUAGE.into(),
            Language::Python => tree_sitter_python::LANGUAGE.into(),
            Language::JavaScript => tree_sitter_javascript::LANGUAGE.into(),
            Language::TypeScript => tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into(),
            Language::Tsx => tree_sitter_typescript::LANGUAGE_TSX.into(),
        }
    }

    fn is_import(&self, kind: &str) -> bool {
        match self {
            Language::Go => kind == "import_declaration",
            Language::Python => matches!(
                kind,
                "import_statement" | "import_from_statement" | "future_import_statement"
            ),
            Language::JavaScript | Language::TypeScript | Language::Tsx => {
                kind == "import_statement"
            }
        }
    }
}

/// What a chunk represents; drives the summary label
#[derive(Debug, Clone, Copy)]
enum EntityKind {
    Function,
    Type,
    Method,
    Variable,
    Constant,
}

impl EntityKind {
    fn label(&self) -> &'static str {
        match self {
            EntityKind::Function => "function",
            EntityKind::Type => "type",
            EntityKind::Method => "method",
            EntityKind::Variable => "variable",
            EntityKind::Constant => "constant",
        }
    }
}

/// One parser instance per language, exclusively owned by a single worker.
/// Tree-sitter parsers carry internal state and are not thread-safe.
pub struct SourceParser {
    language: Language,
    parser: Parser,
}

impl SourceParser {
    pub fn new(language: Language) -> Result<Self, ParseError> {
        let mut parser = Parser::new();
        parser
            .set_language(&language.grammar())
            .map_err(|e| ParseError::Grammar {
                language: language.name().to_string(),
                reason: e.to_string(),
            })?;
        Ok(Self { language, parser })
    }

    /// Parse one file into chunks. A file the grammar rejects entirely
    /// yields an empty list; the caller logs and moves on.
    pub fn parse(&mut self, file: &str, role: FileRole, source: &str, parsed_at: i64) -> Vec<Chunk> {
        let Some(tree) = self.parser.parse(source, None) else {
            tracing::warn!(file, "no syntax tree produced, skipping");
            return Vec::new();
        };

        let mut ctx = Extraction {
            file,
            role,
            source,
            parsed_at,
            chunks: Vec::new(),
        };

        let root = tree.root_node();
        let mut cursor = root.walk();
        // run of adjacent import nodes folded into one anonymous chunk
        let mut import_run: Option<(Node, Node)> = None;

        for child in root.named_children(&mut cursor) {
            if self.language.is_import(child.kind()) {
                import_run = match import_run {
                    Some((first, _)) => Some((first, child)),
                    None => Some((child, child)),
                };
                continue;
            }
            if let Some((first, last)) = import_run.take() {
                ctx.emit_imports(first, last);
            }

            match self.language {
                Language::Go => ctx.go_top_level(child),
                Language::Python => ctx.py_top_level(child),
                Language::JavaScript | Language::TypeScript | Language::Tsx => {
                    ctx.js_top_level(child, child)
                }
            }
        }
        if let Some((first, last)) = import_run.take() {
            ctx.emit_imports(first, last);
        }

        ctx.chunks
    }
}

struct Extraction<'a> {
    file: &'a str,
    role: FileRole,
    source: &'a str,
    parsed_at: i64,
    chunks: Vec<Chunk>,
}

impl<'a> Extraction<'a> {
    fn text(&self, node: Node) -> &'a str {
        &self.source[node.start_byte()..node.end_byte()]
    }

    fn name_of(&self, node: Node, field: &str) -> Option<String> {
        node.child_by_field_name(field)
            .map(|n| self.text(n).to_string())
    }

    fn span(&self, start: Node, end: Node) -> (u32, u32, u32, u32) {
        let s = start.start_position();
        let e = end.end_position();
        (
            s.row as u32 + 1,
            s.column as u32 + 1,
            e.row as u32 + 1,
            (e.column as u32).max(1),
        )
    }

    fn emit(&mut self, kind: EntityKind, path: String, span_node: Node) {
        let summary = format!("{} `{}`", kind.label(), path);
        let span = self.span(span_node, span_node);
        let source = self.text(span_node).to_string();
        self.chunks.push(Chunk::new(
            self.file, self.role, path, summary, source, span, self.parsed_at,
        ));
    }

    fn emit_imports(&mut self, first: Node, last: Node) {
        let span = self.span(first, last);
        let source = self.source[first.start_byte()..last.end_byte()].to_string();
        self.chunks.push(Chunk::new(
            self.file,
            self.role,
            String::new(),
            "imports".to_string(),
            source,
            span,
            self.parsed_at,
        ));
    }

    // --- Go ---

    fn go_top_level(&mut self, node: Node) {
        match node.kind() {
            "function_declaration" => {
                if let Some(name) = self.name_of(node, "name") {
                    self.emit(EntityKind::Function, name, node);
                }
            }
            "method_declaration" => {
                let receiver = node
                    .child_by_field_name("receiver")
                    .and_then(|r| first_of_kind(r, "type_identifier"))
                    .map(|n| self.text(n).to_string());
                if let (Some(recv), Some(name)) = (receiver, self.name_of(node, "name")) {
                    self.emit(EntityKind::Method, format!("{recv}::{name}"), node);
                }
            }
            "type_declaration" => {
                self.go_specs(node, &["type_spec", "type_alias"], EntityKind::Type)
            }
            "const_declaration" => self.go_specs(node, &["const_spec"], EntityKind::Constant),
            "var_declaration" => {
                self.go_specs(node, &["var_spec", "var_spec_list"], EntityKind::Variable)
            }
            _ => {}
        }
    }

    /// Go grouped declarations: a single spec keeps the whole declaration's
    /// span (including the keyword); grouped specs each get their own span.
    fn go_specs(&mut self, decl: Node, spec_kinds: &[&str], kind: EntityKind) {
        let mut specs = Vec::new();
        collect_specs(decl, spec_kinds, &mut specs);

        let single = specs.len() == 1;
        for spec in specs {
            if let Some(name) = self.name_of(spec, "name") {
                let span_node = if single { decl } else { spec };
                self.emit(kind, name, span_node);
            }
        }
    }

    // --- Python ---

    fn py_top_level(&mut self, node: Node) {
        match node.kind() {
            "function_definition" => {
                if let Some(name) = self.name_of(node, "name") {
                    self.emit(EntityKind::Function, name, node);
                }
            }
            "decorated_definition" => {
                if let Some(inner) = node.child_by_field_name("definition") {
                    match inner.kind() {
                        "function_definition" => {
                            if let Some(name) = self.name_of(inner, "name") {
                                self.emit(EntityKind::Function, name, node);
                            }
                        }
                        "class_definition" => self.py_class(inner, node, ""),
                        _ => {}
                    }
                }
            }
            "class_definition" => self.py_class(node, node, ""),
            "expression_statement" => {
                let mut cursor = node.walk();
                for child in node.named_children(&mut cursor) {
                    if child.kind() != "assignment" {
                        continue;
                    }
                    let Some(left) = child.child_by_field_name("left") else {
                        continue;
                    };
                    if left.kind() != "identifier" {
                        continue;
                    }
                    let name = self.text(left).to_string();
                    let kind = if is_screaming_case(&name) {
                        EntityKind::Constant
                    } else {
                        EntityKind::Variable
                    };
                    self.emit(kind, name, node);
                }
            }
            _ => {}
        }
    }

    fn py_class(&mut self, class_node: Node, span_node: Node, prefix: &str) {
        let Some(name) = self.name_of(class_node, "name") else {
            return;
        };
        let path = if prefix.is_empty() {
            name
        } else {
            format!("{prefix}::{name}")
        };
        self.emit(EntityKind::Type, path.clone(), span_node);

        let Some(body) = class_node.child_by_field_name("body") else {
            return;
        };
        let mut cursor = body.walk();
        for member in body.named_children(&mut cursor) {
            match member.kind() {
                "function_definition" => {
                    if let Some(method) = self.name_of(member, "name") {
                        self.emit(EntityKind::Method, format!("{path}::{method}"), member);
                    }
                }
                "decorated_definition" => {
                    if let Some(inner) = member.child_by_field_name("definition") {
                        match inner.kind() {
                            "function_definition" => {
                                if let Some(method) = self.name_of(inner, "name") {
                                    self.emit(
                                        EntityKind::Method,
                                        format!("{path}::{method}"),
                                        member,
                                    );
                                }
                            }
                            "class_definition" => self.py_class(inner, member, &path),
                            _ => {}
                        }
                    }
                }
                "class_definition" => self.py_class(member, member, &path),
                _ => {}
            }
        }
    }

    // --- JavaScript / TypeScript ---

    fn js_top_level(&mut self, node: Node, span_node: Node) {
        match node.kind() {
            // export wrappers keep the full statement span
            "export_statement" => {
                if let Some(decl) = node.child_by_field_name("declaration") {
                    self.js_top_level(decl, span_node);
                }
            }
            "function_declaration" | "generator_function_declaration" => {
                if let Some(name) = self.name_of(node, "name") {
                    self.emit(EntityKind::Function, name, span_node);
                }
            }
            "class_declaration" | "abstract_class_declaration" => {
                self.js_class(node, span_node);
            }
            "interface_declaration" | "type_alias_declaration" | "enum_declaration" => {
                if let Some(name) = self.name_of(node, "name") {
                    self.emit(EntityKind::Type, name, span_node);
                }
            }
            "lexical_declaration" | "variable_declaration" => {
                self.js_variables(node, span_node);
            }
            _ => {}
        }
    }

    fn js_class(&mut self, class_node: Node, span_node: Node) {
        let Some(name) = self.name_of(class_node, "name") else {
            return;
        };
        self.emit(EntityKind::Type, name.clone(), span_node);

        let Some(body) = class_node.child_by_field_name("body") else {
            return;
        };
        let mut cursor = body.walk();
        for member in body.named_children(&mut cursor) {
            if member.kind() == "method_definition"
                && let Some(method) = self.name_of(member, "name")
            {
                self.emit(EntityKind::Method, format!("{name}::{method}"), member);
            }
        }
    }

    fn js_variables(&mut self, decl: Node, span_node: Node) {
        let is_const = decl
            .child(0)
            .is_some_and(|kw| kw.kind() == "const");

        let mut declarators = Vec::new();
        let mut cursor = decl.walk();
        for child in decl.named_children(&mut cursor) {
            if child.kind() == "variable_declarator" {
                declarators.push(child);
            }
        }

        let single = declarators.len() == 1;
        for declarator in declarators {
            let Some(name_node) = declarator.child_by_field_name("name") else {
                continue;
            };
            // destructuring patterns have no single stable name
            if name_node.kind() != "identifier" {
                continue;
            }
            let name = self.text(name_node).to_string();

            let value_kind = declarator
                .child_by_field_name("value")
                .map(|v| v.kind().to_string());
            let kind = match value_kind.as_deref() {
                Some("arrow_function") | Some("function_expression") | Some("function") => {
                    EntityKind::Function
                }
                _ if is_const => EntityKind::Constant,
                _ => EntityKind::Variable,
            };

            let node = if single { span_node } else { declarator };
            self.emit(kind, name, node);
        }
    }
}

fn collect_specs<'t>(node: Node<'t>, kinds: &[&str], out: &mut Vec<Node<'t>>) {
    let mut cursor = node.walk();
    for child in node.named_children(&mut cursor) {
        if kinds.contains(&child.kind()) {
            if child.kind().ends_with("_list") {
                collect_specs(child, kinds, out);
            } else {
                out.push(child);
            }
        }
    }
}

fn first_of_kind<'t>(node: Node<'t>, kind: &str) -> Option<Node<'t>> {
    if node.kind() == kind {
        return Some(node);
    }
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if let Some(found) = first_of_kind(child, kind) {
            return Some(found);
        }
    }
    None
}

fn is_screaming_case(name: &str) -> bool {
    name.chars().any(|c| c.is_ascii_uppercase())
        && !name.chars().any(|c| c.is_ascii_lowercase())
}
